//! Mid-run user decision on validation warnings.
//!
//! The pipeline hands a [`WarningPrompt`] to a [`WarningPresenter`] and
//! suspends until one of the prompt's consuming methods is called. The wait
//! is unbounded; only cancellation of the run interrupts it.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::failure::StepError;
use super::types::ValidationWarning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningDecision {
    Continue,
    UseSafeMode,
}

/// A pending question to the user. Answer it exactly once; dropping it
/// unanswered cancels the run.
#[derive(Debug)]
pub struct WarningPrompt {
    pub file_name: String,
    pub warnings: Vec<ValidationWarning>,
    reply: oneshot::Sender<WarningDecision>,
}

impl WarningPrompt {
    pub fn continue_anyway(self) {
        let _ = self.reply.send(WarningDecision::Continue);
    }

    pub fn use_safe_mode(self) {
        let _ = self.reply.send(WarningDecision::UseSafeMode);
    }

    /// The run stopped waiting (cancelled or superseded).
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }
}

/// Shows warning prompts to the user.
pub trait WarningPresenter: Send + Sync {
    /// Must return without waiting for the answer.
    fn present(&self, prompt: WarningPrompt);
}

/// Continues past every warning (headless and batch use).
pub struct AutoContinue;

impl WarningPresenter for AutoContinue {
    fn present(&self, prompt: WarningPrompt) {
        tracing::info!(warnings = prompt.warnings.len(), "Continuing past validation warnings");
        prompt.continue_anyway();
    }
}

/// Forwards prompts to whoever holds the receiving end.
#[derive(Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<WarningPrompt>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WarningPrompt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WarningPresenter for ChannelPresenter {
    fn present(&self, prompt: WarningPrompt) {
        if self.tx.send(prompt).is_err() {
            tracing::warn!("Warning prompt receiver is gone, run will be cancelled");
        }
    }
}

/// Present `warnings` and wait for the answer or for `cancel`.
pub(crate) async fn request_decision(
    presenter: &dyn WarningPresenter,
    file_name: &str,
    warnings: Vec<ValidationWarning>,
    cancel: &CancellationToken,
) -> Result<WarningDecision, StepError> {
    let (reply, answer) = oneshot::channel();
    presenter.present(WarningPrompt {
        file_name: file_name.to_string(),
        warnings,
        reply,
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepError::Cancelled),
        decision = answer => decision.map_err(|_| StepError::Cancelled),
    }
}
