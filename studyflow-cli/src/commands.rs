use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use studyflow_core::ai::provider::get_provider_families;
use studyflow_core::ai::ProviderConfig;
use studyflow_core::pdf::SourceDocument;
use studyflow_core::pipeline::{ChannelPresenter, WarningPrompt};
use studyflow_core::{
    Config, Course, IngestRequest, JsonSessionStore, RunOptions, RunOutcome, SessionStore,
    Settings, StudyAi, StudyMethod, StudyPipeline,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::console::{self, ConsoleObserver, Recovery, StdinLines};
use crate::AiArgs;

/// Loaded configuration shared by every command.
pub struct App {
    pub config: Config,
    pub settings: Settings,
    pub store: Arc<JsonSessionStore>,
}

impl App {
    pub fn load(data_dir: Option<PathBuf>, ai: &AiArgs) -> Result<Self> {
        let config = match data_dir {
            Some(dir) => Config::with_data_dir(dir),
            None => Config::load_or_default(),
        };
        config
            .ensure_dirs()
            .context("Failed to create data directories")?;
        tracing::debug!("Data directory: {:?}", config.data_dir);

        let settings = apply_overrides(Settings::load(&config.settings_file), ai)?;
        let store = Arc::new(JsonSessionStore::new(&config.sessions_dir));

        Ok(Self {
            config,
            settings,
            store,
        })
    }

    fn pipeline(&self) -> Result<(StudyPipeline, mpsc::UnboundedReceiver<WarningPrompt>)> {
        let ai = StudyAi::from_settings(&self.settings)?;
        let (presenter, prompts) = ChannelPresenter::new();
        let pipeline = StudyPipeline::new(ai, self.store.clone())
            .with_presenter(Arc::new(presenter))
            .with_observer(Arc::new(ConsoleObserver))
            .with_settings(self.settings.pipeline.clone());
        Ok((pipeline, prompts))
    }
}

/// Apply command-line AI flags on top of saved settings.
///
/// Flags that name no provider adjust the configured one; an API key or
/// model only carries over when the provider stays the same.
pub fn apply_overrides(mut settings: Settings, ai: &AiArgs) -> Result<Settings> {
    if ai.no_ai {
        settings.use_ai_api = false;
    }
    if ai.provider.is_none() && ai.api_key.is_none() && ai.model.is_none() {
        return Ok(settings);
    }

    let current = settings.provider.take();
    let tag = match (&ai.provider, &current) {
        (Some(tag), _) => tag.to_lowercase(),
        (None, Some(current)) => current.provider_type().to_string(),
        (None, None) => anyhow::bail!("No provider configured; pass --provider"),
    };
    let same = current.as_ref().filter(|c| c.provider_type() == tag);

    let api_key = ai
        .api_key
        .clone()
        .or_else(|| same.map(|c| c.api_key().to_string()))
        .with_context(|| format!("No API key for {}; pass --api-key", tag))?;
    let model = ai
        .model
        .clone()
        .or_else(|| same.map(|c| c.model_id().to_string()));

    settings.provider = Some(ProviderConfig::from_tag(&tag, api_key, model)?);
    Ok(settings)
}

/// Ctrl-C cancels the live run, or exits when nothing is running.
fn watch_interrupt(pipeline: StudyPipeline) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            if pipeline.cancel() {
                eprintln!("Cancelling...");
            } else {
                std::process::exit(130);
            }
        }
    })
}

/// Drive a run to a final outcome, offering retry or safe mode on failure.
async fn follow(
    pipeline: &StudyPipeline,
    input: &StdinLines,
    mut outcome: RunOutcome,
) -> Result<()> {
    loop {
        outcome = match outcome {
            RunOutcome::Completed(session) => {
                console::print_session(&session);
                return Ok(());
            }
            RunOutcome::SafeMode(session) => {
                console::print_session(&session);
                println!(
                    "Saved in safe mode. Run `studyflow generate {}` to create its lessons.",
                    session.id
                );
                return Ok(());
            }
            RunOutcome::Failed(error) => match console::ask_recovery(&error, input).await {
                Recovery::Retry => pipeline.retry().await,
                Recovery::SafeMode => pipeline.use_safe_mode().await,
                Recovery::Quit => anyhow::bail!("{}", error.message),
            },
            RunOutcome::Cancelled => {
                eprintln!("Cancelled.");
                return Ok(());
            }
            RunOutcome::Superseded | RunOutcome::Idle => return Ok(()),
        };
    }
}

pub async fn ingest(
    app: &App,
    pdf: PathBuf,
    course: &str,
    method: StudyMethod,
    safe_mode: bool,
) -> Result<()> {
    if !pdf.is_file() {
        anyhow::bail!("Not a file: {}", pdf.display());
    }

    let (pipeline, prompts) = app.pipeline()?;
    let input = StdinLines::spawn();
    let answers = tokio::spawn(console::answer_warnings(prompts, input.clone()));
    let interrupt = watch_interrupt(pipeline.clone());

    let request = IngestRequest {
        source: SourceDocument::from_path(&pdf),
        method,
        course: Course::named(&app.settings.user_id, course),
    };
    let outcome = pipeline
        .run(
            request,
            RunOptions {
                is_retry: false,
                use_safe_mode: safe_mode,
            },
        )
        .await;
    let result = follow(&pipeline, &input, outcome).await;

    interrupt.abort();
    answers.abort();
    result
}

pub async fn generate(app: &App, session_id: &str) -> Result<()> {
    let session = app.store.load_session(session_id).await?;
    if !session.is_pending_generation() {
        anyhow::bail!("Session {} already has its lessons", session_id);
    }

    let (pipeline, _prompts) = app.pipeline()?;
    let input = StdinLines::spawn();
    let interrupt = watch_interrupt(pipeline.clone());

    let outcome = pipeline.resume(session).await;
    let result = follow(&pipeline, &input, outcome).await;

    interrupt.abort();
    result
}

pub async fn sessions(app: &App, json: bool) -> Result<()> {
    let sessions = app.store.list_sessions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }
    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }
    for summary in sessions {
        println!(
            "{}  {:<18}  {:>3} lessons  {}  [{}]",
            summary.id,
            summary.status.as_str(),
            summary.lesson_count,
            summary.title,
            summary.course_name
        );
    }
    Ok(())
}

pub async fn discard(app: &App, session_id: &str) -> Result<()> {
    let session = app.store.load_session(session_id).await?;
    if !session.can_discard() {
        anyhow::bail!(
            "Session {} is {} and is kept; use `studyflow archive` to hide it",
            session_id,
            session.status.as_str()
        );
    }
    app.store.delete_session(session_id).await?;
    println!("Deleted {}", session_id);
    Ok(())
}

pub async fn complete(app: &App, session_id: &str) -> Result<()> {
    let mut session = app.store.load_session(session_id).await?;
    if session.is_pending_generation() {
        anyhow::bail!(
            "Session {} has no lessons yet; run `studyflow generate {}` first",
            session_id,
            session_id
        );
    }
    session.mark_completed();
    app.store.save_session(&session).await?;
    println!("Completed {}", session_id);
    Ok(())
}

pub async fn archive(app: &App, session_id: &str) -> Result<()> {
    let mut session = app.store.load_session(session_id).await?;
    session.archive();
    app.store.save_session(&session).await?;
    println!("Archived {}", session_id);
    Ok(())
}

pub fn configure(app: &App, ai: &AiArgs, enable_ai: bool) -> Result<()> {
    let mut settings = app.settings.clone();
    if enable_ai {
        if ai.no_ai {
            anyhow::bail!("--ai and --no-ai cannot be combined");
        }
        settings.use_ai_api = true;
    }
    settings.save(&app.config.settings_file)?;
    tracing::info!("Settings saved to {:?}", app.config.settings_file);

    println!("AI calls: {}", if settings.use_ai_api { "on" } else { "off (mock)" });
    match &settings.provider {
        Some(provider) => println!(
            "Provider: {} ({}), key {}",
            provider.provider_type(),
            provider.model_id(),
            mask(provider.api_key())
        ),
        None => {
            println!("Provider: none. Available:");
            for family in get_provider_families() {
                println!("  {:<8} {}", family.id, family.description);
            }
        }
    }
    Ok(())
}

fn mask(key: &str) -> String {
    let skip = key.chars().count().saturating_sub(4);
    format!("****{}", key.chars().skip(skip).collect::<String>())
}
