//! jobpilot CLI
//!
//! Answers job-application questions and extracts skills from job
//! descriptions through an OpenAI-compatible backend.

#![allow(clippy::print_stdout, clippy::print_stderr)] // CLI program intentionally uses stdout

mod config;
mod console;
mod error;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jobpilot::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::config::{CliConfig, config_path, init_config_at, resolve_config};
use crate::console::ConsoleSink;
use crate::error::{CliError, Result};

/// jobpilot - AI answers for job applications
#[derive(Parser)]
#[command(name = "jobpilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "JOBPILOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the models the backend serves
    Models,

    /// Answer one application question
    Ask(AskArgs),

    /// Extract skills from a job description
    Skills(SkillsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the ask command
#[derive(Args)]
struct AskArgs {
    /// The question as shown on the form
    question: String,

    /// Form control the question uses
    #[arg(short = 't', long = "type", value_enum, default_value_t = QuestionKind::Text)]
    kind: QuestionKind,

    /// Answer option (repeat for each option)
    #[arg(short, long = "option")]
    options: Vec<String>,

    /// File holding the job description
    #[arg(short, long)]
    job_description_file: Option<PathBuf>,

    /// Short description of the company
    #[arg(long)]
    company: Option<String>,

    /// Stream the reply
    #[arg(short, long)]
    stream: bool,
}

/// Arguments for the skills command
#[derive(Args)]
struct SkillsArgs {
    /// File holding the job description (stdin if omitted)
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum QuestionKind {
    Text,
    Textarea,
    Single,
    Multiple,
}

impl From<QuestionKind> for QuestionType {
    fn from(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::Text => Self::Text,
            QuestionKind::Textarea => Self::TextArea,
            QuestionKind::Single => Self::SingleSelect,
            QuestionKind::Multiple => Self::MultipleSelect,
        }
    }
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging to stderr and `<logs_dir>/log.txt`.
///
/// Falls back to stderr alone when the log file cannot be opened.
fn init_logging(verbosity: u8, logs_dir: &Path) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "jobpilot={level},jobpilot_cli={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2);

    let log_file = std::fs::create_dir_all(logs_dir).and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(logs_dir.join("log.txt"))
    });

    match log_file {
        Ok(file) => builder
            .with_ansi(false)
            .with_writer(std::io::stderr.and(Arc::new(file)))
            .init(),
        Err(e) => {
            builder.with_writer(std::io::stderr).init();
            tracing::warn!(dir = %logs_dir.display(), error = %e, "cannot open log file, logging to stderr only");
        }
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let config = match resolve_config(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose, &CliConfig::default().logging.logs_dir);
            return Err(e.into());
        }
    };
    init_logging(cli.verbose, &config.logging.logs_dir);

    match cli.command {
        Commands::Models => cmd_models(config).await,
        Commands::Ask(args) => cmd_ask(args, config).await,
        Commands::Skills(args) => cmd_skills(args, config).await,
        Commands::Config(args) => cmd_config(args, cli.config, &config).await,
    }
}

/// List backend models.
async fn cmd_models(config: CliConfig) -> Result<()> {
    let connection = Connection::new(config.ai)?;
    let models = connection.list_models(&interruptible()).await?;
    let current = connection.model().to_lowercase();

    for model in models {
        let marker = if model.to_lowercase() == current { "*" } else { " " };
        println!("{marker} {model}");
    }
    connection.close();
    Ok(())
}

/// Answer one question.
async fn cmd_ask(args: AskArgs, config: CliConfig) -> Result<()> {
    let mut request = QuestionRequest::new(args.question).with_options(args.kind.into(), args.options);
    if let Some(path) = args.job_description_file {
        request = request.with_job_description(tokio::fs::read_to_string(path).await?);
    }
    if let Some(company) = args.company {
        request = request.with_about_company(company);
    }
    if let Some(info) = config.profile.user_information.clone() {
        request = request.with_user_information(info);
    }
    if args.stream {
        request = request.with_stream(true);
    }

    let session = open_session(config).await?;
    let answer = session.answer_question(&request).await;
    session.close();

    let answer = answer.ok_or_else(|| CliError::failed("no answer was produced"))?;
    println!("{answer}");
    Ok(())
}

/// Extract skills from a job description.
async fn cmd_skills(args: SkillsArgs, config: CliConfig) -> Result<()> {
    let job_description = match args.file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            use tokio::io::AsyncReadExt;
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let session = open_session(config).await?;
    let skills = session.extract_skills(&job_description).await;
    session.close();

    let skills = skills.ok_or_else(|| CliError::failed("skill extraction failed"))?;
    if is_sentinel(&skills) {
        tracing::warn!("model reply was not valid JSON");
    }
    println!("{}", serde_json::to_string_pretty(&skills)?);
    Ok(())
}

/// Connect and wrap the connection in a session whose calls stop on Ctrl+C.
async fn open_session(config: CliConfig) -> Result<AiSession> {
    let options = interruptible();
    let connection = Connection::create(config.ai, &options).await?;
    let alerts = AlertGate::new(Arc::new(ConsoleSink), config.alerts.show_ai_error_alerts);

    Ok(AiSession::new(connection, alerts).with_call_options(options))
}

/// Call options whose token fires on Ctrl+C.
fn interruptible() -> CallOptions {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });
    CallOptions::with_cancel(cancel)
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, config_path_arg: Option<PathBuf>, config: &CliConfig) -> Result<()> {
    let config_file = config_path_arg.unwrap_or_else(config_path);

    match args.command {
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
        ConfigCommands::Show => {
            if config_file.exists() {
                let content = tokio::fs::read_to_string(&config_file).await?;
                println!("{content}");
            } else {
                println!("Configuration file does not exist.");
                println!("Run 'jobpilot config init' to create one.");
            }
            println!("# effective backend: {:?}", config.ai);
        }
        ConfigCommands::Validate => {
            let issues = config.validate();
            if issues.is_empty() {
                println!("Configuration is valid");
            }
            for issue in &issues {
                println!("{issue}");
            }
            if !config.is_valid() {
                return Err(CliError::failed("configuration has errors"));
            }
        }
        ConfigCommands::Init { force } => {
            if config_file.exists() && !force {
                println!("Configuration already exists at: {}", config_file.display());
                println!("Use --force to overwrite.");
                return Ok(());
            }

            init_config_at(&config_file, force).await?;

            println!("Configuration created: {}", config_file.display());
            println!();
            println!("Next steps:");
            println!("  1. set endpoint_url and model_id under [ai]");
            println!("  2. export USE_AI=true LLM_API_KEY=<key>");
            println!("  3. jobpilot models");
        }
    }

    Ok(())
}
