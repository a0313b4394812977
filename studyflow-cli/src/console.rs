//! Terminal side of the pipeline: event printing and interactive prompts.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use studyflow_core::pipeline::{
    PipelineError, PipelineEvent, PipelineObserver, WarningDecision, WarningPrompt,
};
use studyflow_core::StudySession;
use tokio::sync::{mpsc, Mutex};

/// Prints the pipeline log and lesson progress to stderr.
pub struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn on_event(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Log(line) => eprintln!("{}", line),
            PipelineEvent::Progress(progress) if progress.total > 1 => {
                eprintln!("  chunks: {}/{}", progress.done, progress.total)
            }
            _ => {}
        }
    }
}

/// What to do after a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Retry,
    SafeMode,
    Quit,
}

/// Lines typed by the user, read on a dedicated thread.
///
/// The reader thread is detached, so a pending read never keeps the
/// process alive after a cancelled run.
#[derive(Clone)]
pub struct StdinLines {
    lines: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl StdinLines {
    pub fn spawn() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else {
                    tracing::warn!("Failed to read answer from stdin");
                    return;
                };
                if tx.send(line).is_err() {
                    return;
                }
            }
        });
        Self {
            lines: Arc::new(Mutex::new(rx)),
        }
    }

    /// Read one answer. `None` on end of input.
    async fn ask(&self, question: &str) -> Option<String> {
        eprint!("{} ", question);
        let _ = io::stderr().flush();
        let line = self.lines.lock().await.recv().await?;
        Some(line.trim().to_lowercase())
    }
}

/// Answer validation warnings until the pipeline stops sending them.
///
/// A prompt left unanswered at end of input is dropped, which cancels the run.
pub async fn answer_warnings(
    mut prompts: mpsc::UnboundedReceiver<WarningPrompt>,
    input: StdinLines,
) {
    while let Some(prompt) = prompts.recv().await {
        eprintln!("\n{} may not be processed well:", prompt.file_name);
        for warning in &prompt.warnings {
            eprintln!("  - {}", warning);
        }

        let decision = loop {
            match input
                .ask("Continue anyway [c] or save in safe mode [s]?")
                .await
            {
                Some(answer) if answer.is_empty() || answer.starts_with('c') => {
                    break Some(WarningDecision::Continue)
                }
                Some(answer) if answer.starts_with('s') => break Some(WarningDecision::UseSafeMode),
                Some(_) => continue,
                None => break None,
            }
        };

        if prompt.is_abandoned() {
            continue;
        }
        match decision {
            Some(WarningDecision::Continue) => prompt.continue_anyway(),
            Some(WarningDecision::UseSafeMode) => prompt.use_safe_mode(),
            None => drop(prompt),
        }
    }
}

/// Offer the recoveries `error` allows.
pub async fn ask_recovery(error: &PipelineError, input: &StdinLines) -> Recovery {
    eprintln!("\nError: {}", error.message);
    if !error.retryable && !error.safe_mode {
        return Recovery::Quit;
    }

    let mut options = Vec::new();
    if error.retryable {
        options.push("[r]etry");
    }
    if error.safe_mode {
        options.push("[s]afe mode");
    }
    options.push("[q]uit");
    let question = format!("{}?", options.join(", "));

    loop {
        let Some(answer) = input.ask(&question).await else {
            return Recovery::Quit;
        };
        match answer.chars().next() {
            Some('r') if error.retryable => return Recovery::Retry,
            Some('s') if error.safe_mode => return Recovery::SafeMode,
            Some('q') => return Recovery::Quit,
            _ => continue,
        }
    }
}

pub fn print_session(session: &StudySession) {
    println!("{}  {}", session.id, session.title);
    println!(
        "  course: {}  method: {:?}  status: {}",
        session.course_name,
        session.study_method,
        session.status.as_str()
    );
    if let Some(context) = &session.academic_context {
        println!("  category: {}", context.category);
    }
    for (i, lesson) in session.micro_lessons.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, lesson.title);
    }
}
