use std::path::PathBuf;

use clap::{Parser, Subcommand};
use studyflow_core::StudyMethod;

mod commands;
mod console;

#[derive(Parser, Debug)]
#[command(name = "studyflow")]
#[command(about = "Turn PDFs into micro-lessons from the terminal")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Override the data directory
    #[arg(long, global = true, env = "STUDYFLOW_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(flatten)]
    ai: AiArgs,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Per-invocation AI overrides; `configure` persists them.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AiArgs {
    /// AI provider (gemini, openai)
    #[arg(long, global = true, env = "STUDYFLOW_PROVIDER")]
    pub provider: Option<String>,

    /// API key for the provider
    #[arg(long, global = true, env = "STUDYFLOW_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(long, global = true, env = "STUDYFLOW_MODEL")]
    pub model: Option<String>,

    /// Use the offline mock instead of a remote model
    #[arg(long, global = true)]
    pub no_ai: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn a PDF into a study session
    Ingest {
        pdf: PathBuf,

        /// Course the session belongs to
        #[arg(long, default_value = "General")]
        course: String,

        /// Study method (pomodoro, long)
        #[arg(long, default_value = "pomodoro")]
        method: StudyMethod,

        /// Save the text without calling the AI
        #[arg(long)]
        safe_mode: bool,
    },
    /// Generate the lessons of a session saved in safe mode
    Generate { session_id: String },
    /// List saved sessions
    Sessions {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete a session
    Discard { session_id: String },
    /// Mark a session as studied
    Complete { session_id: String },
    /// Archive a session
    Archive { session_id: String },
    /// Save provider settings
    Configure {
        /// Enable remote AI calls
        #[arg(long)]
        ai: bool,
    },
}

/// Initialize logging with the given default directives
fn init_logging(directives: &[&str]) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        filter = filter.add_directive(directive.parse().unwrap());
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        init_logging(&["studyflow=debug"]);
    } else {
        init_logging(&["studyflow=warn"]);
    }

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");

    if let Err(e) = rt.block_on(run(args)) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let app = commands::App::load(args.data_dir, &args.ai)?;

    match args.command {
        Command::Ingest {
            pdf,
            course,
            method,
            safe_mode,
        } => commands::ingest(&app, pdf, &course, method, safe_mode).await,
        Command::Generate { session_id } => commands::generate(&app, &session_id).await,
        Command::Sessions { json } => commands::sessions(&app, json).await,
        Command::Discard { session_id } => commands::discard(&app, &session_id).await,
        Command::Complete { session_id } => commands::complete(&app, &session_id).await,
        Command::Archive { session_id } => commands::archive(&app, &session_id).await,
        Command::Configure { ai } => commands::configure(&app, &args.ai, ai),
    }
}
