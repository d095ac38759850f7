//! quizhub: operator CLI for the quizzes service.
//!
//! Every command prints one JSON document on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use catalog::HttpReferenceClient;
use clap::{Parser, Subcommand};
use configs::AppConfig;
use dotenvy::dotenv;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use service::errors::ServiceError;
use service::quiz::{Answer, QuizInput, QuizService};
use service::storage::JsonQuizRepository;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "quizhub", version, about = "Quizzes with category/tag references")]
struct Cli {
    /// Config file (default: $CONFIG_PATH or config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Category and tag choices offered by the category/tags service
    Options,
    /// All quizzes with resolved names
    List,
    /// One quiz with its questions
    Show { id: i64 },
    /// Create a quiz from a JSON file
    Create { file: PathBuf },
    /// Partially update a quiz from a JSON file
    Update { id: i64, file: PathBuf },
    Delete { id: i64 },
    /// Grade answers read from a JSON file
    Grade { id: i64, answers: PathBuf },
    /// Report quizzes whose references no longer resolve
    Audit,
}

/// `{"answers": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerSubmission {
    Wrapped { answers: Vec<Answer> },
    Bare(Vec<Answer>),
}

impl AnswerSubmission {
    fn into_answers(self) -> Vec<Answer> {
        match self {
            AnswerSubmission::Wrapped { answers } | AnswerSubmission::Bare(answers) => answers,
        }
    }
}

fn load_config(path: Option<&Path>) -> (AppConfig, Option<anyhow::Error>) {
    let loaded = match path {
        Some(path) => configs::load_from_file(&path.to_string_lossy()),
        None => configs::load_default(),
    };
    match loaded {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("{} is not valid JSON input", path.display()))
}

async fn run(command: Command, cfg: AppConfig) -> anyhow::Result<Value> {
    common::env::ensure_data_dir(&cfg.storage.quizzes_path).await?;
    let repo = Arc::new(JsonQuizRepository::open(&cfg.storage.quizzes_path).await?);
    let client = Arc::new(HttpReferenceClient::from_config(&cfg.references)?);
    let svc = QuizService::from_config(client, repo, &cfg.references);

    let out = match command {
        Command::Options => serde_json::to_value(svc.available_options().await)?,
        Command::List => serde_json::to_value(svc.list().await?)?,
        Command::Show { id } => serde_json::to_value(svc.detail(id).await?)?,
        Command::Create { file } => {
            let input: QuizInput = read_json(&file).await?;
            serde_json::to_value(svc.create(input).await?)?
        }
        Command::Update { id, file } => {
            let input: QuizInput = read_json(&file).await?;
            serde_json::to_value(svc.update(id, input).await?)?
        }
        Command::Delete { id } => {
            svc.delete(id).await?;
            json!({ "deleted": id })
        }
        Command::Grade { id, answers } => {
            let submission: AnswerSubmission = read_json(&answers).await?;
            serde_json::to_value(svc.grade(id, &submission.into_answers()).await?)?
        }
        Command::Audit => serde_json::to_value(svc.audit_references().await?)?,
    };
    Ok(out)
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => error!(service = "quizhub", event = "output_failed", error = %e, "cannot render output"),
    }
}

fn main() -> ExitCode {
    // .env first so RUST_LOG, CONFIG_PATH and the overrides below take effect
    dotenv().ok();
    let cli = Cli::parse();

    let (mut cfg, load_error) = load_config(cli.config.as_deref());
    common::utils::logging::init_logging(cfg.logging.json);
    if let Some(e) = load_error {
        warn!(service = "quizhub", event = "config_default", error = %e, "config file unavailable; using defaults");
    }
    if let Err(e) = cfg.normalize_and_validate() {
        error!(service = "quizhub", event = "config_invalid", error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    let run_id = Uuid::new_v4();
    std::panic::set_hook(Box::new(move |info| {
        error!(service = "quizhub", event = "panic", %run_id, message = %info, "unhandled panic occurred");
    }));

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "quizhub", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(
        service = "quizhub",
        event = "start",
        %run_id,
        command = ?cli.command,
        base_url = %cfg.references.base_url,
        version = env!("CARGO_PKG_VERSION"),
        "command starting"
    );

    match rt.block_on(run(cli.command, cfg)) {
        Ok(out) => {
            print_json(&out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.downcast_ref::<ServiceError>() {
                Some(service_error) => {
                    warn!(service = "quizhub", event = "command_failed", %run_id, error = %service_error, "command failed");
                    print_json(&service_error.to_body());
                }
                None => error!(service = "quizhub", event = "command_failed", %run_id, error = %format!("{e:#}"), "command failed"),
            }
            ExitCode::FAILURE
        }
    }
}
