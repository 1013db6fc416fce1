pub mod ask;
pub mod chat;
pub mod config;
pub mod migrate;
pub mod prune;

use std::sync::Arc;

use advisor_agent::{AdvisorRuntime, HttpLlmClient};
use advisor_core::config::{AppConfig, LoadOptions, LogFormat};
use advisor_core::errors::ApplicationError;
use advisor_core::store::{ConversationStore, InMemoryConversationStore};
use advisor_db::{connect_from_config, migrations, SqlConversationStore};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Failure raised inside a command's async block: error class, message, exit code.
pub(crate) type CommandFailure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with_data(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(
    command: &str,
    options: &LoadOptions,
) -> Result<AppConfig, CommandResult> {
    let config = AppConfig::load(options.clone()).map_err(|error| {
        let message = format!("configuration issue: {error}");
        CommandResult::failure(command, "config_validation", message, 2)
    })?;
    init_logging(&config);
    Ok(config)
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Logs go to stderr so command payloads on stdout stay machine-readable.
/// Later calls are no-ops once a subscriber is installed.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub(crate) async fn open_store(
    config: &AppConfig,
    ephemeral: bool,
) -> Result<Arc<dyn ConversationStore>, CommandFailure> {
    if ephemeral {
        return Ok(Arc::new(InMemoryConversationStore::new()));
    }

    let pool = connect_from_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(Arc::new(SqlConversationStore::new(pool)))
}

pub(crate) fn advisor_runtime(
    config: &AppConfig,
    store: Arc<dyn ConversationStore>,
) -> Result<AdvisorRuntime, CommandFailure> {
    let llm = HttpLlmClient::from_config(&config.llm)
        .map_err(|error| ("llm_init", format!("{error:#}"), 6u8))?;
    Ok(AdvisorRuntime::new(Arc::new(llm), store, &config.intake))
}

pub(crate) fn error_class(error: &ApplicationError) -> (&'static str, u8) {
    match error {
        ApplicationError::Domain(_) => ("domain", 9),
        ApplicationError::GenerationUnavailable(_) => ("generation_unavailable", 7),
        ApplicationError::Persistence(_) => ("persistence", 8),
        ApplicationError::Configuration(_) => ("config_validation", 2),
    }
}
