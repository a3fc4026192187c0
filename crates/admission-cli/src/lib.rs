//! # Admission Gate CLI
//!
//! Operator tool for admission webhook configuration.
//!
//! This module provides CLI commands for:
//! - Checking a webhook configuration before deploying it
//! - Reviewing a request file through the live webhook chain

use admission_core::{
    AdmissionConfig, AdmissionController, AdmissionError, ConfigError, DeniedError,
    DispatchContext, HttpTransportConfig, Request, WebhookCallError, WebhookRegistry,
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for CLI settings overrides
pub const SETTINGS_ENV_PREFIX: &str = "ADMISSION";

// ============================================================================
// CLI Structure
// ============================================================================

/// Admission Gate CLI - dynamic admission webhook tooling
#[derive(Parser)]
#[command(name = "admission-gate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check and exercise admission webhook configuration")]
#[command(
    long_about = "Admission Gate validates webhook configuration at boot time and runs requests through the configured mutating and validating webhooks"
)]
pub struct Cli {
    /// Webhook configuration file (YAML or JSON); falls back to ADMISSION_CONFIGURATION
    #[arg(short, long, env = "ADMISSION_GATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// CLI settings file
    #[arg(short, long, env = "ADMISSION_GATE_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate the webhook configuration and list the registered webhooks
    Check {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run a request file through the configured webhooks
    Review {
        /// JSON file holding the request
        #[arg(short, long)]
        request: PathBuf,

        /// Which dispatch stage to run
        #[arg(long, default_value = "admit")]
        stage: Stage,

        /// Overall deadline for the dispatch (e.g. 10s)
        #[arg(short, long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
}

/// Output format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Dispatch stages
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Stage {
    /// Mutating webhooks only
    Mutate,
    /// Validating webhooks only
    Validate,
    /// Mutating then validating webhooks
    Admit,
}

// ============================================================================
// CLI Settings
// ============================================================================

/// CLI settings layered from an optional file and `ADMISSION__*` variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// User agent sent to webhook servers
    pub user_agent: String,

    /// Connect timeout for webhook servers (e.g. `5s`)
    pub connect_timeout: String,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("admission-gate/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: "5s".to_string(),
        }
    }
}

impl CliSettings {
    /// HTTP transport settings derived from the CLI settings
    pub fn transport_config(&self) -> Result<HttpTransportConfig, CliError> {
        let connect_timeout = humantime::parse_duration(&self.connect_timeout).map_err(|e| {
            CliError::InvalidArgument {
                arg: "connect_timeout".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(HttpTransportConfig::default()
            .with_user_agent(self.user_agent.clone())
            .with_connect_timeout(connect_timeout))
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Request denied: {0}")]
    Denied(DeniedError),

    #[error("Webhook call failed: {0}")]
    Transport(WebhookCallError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AdmissionError> for CliError {
    fn from(error: AdmissionError) -> Self {
        match error {
            AdmissionError::Config(e) => Self::Configuration(e),
            AdmissionError::Denied(e) => Self::Denied(e),
            AdmissionError::Transport(e) => Self::Transport(e),
        }
    }
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Denied(_) => 2,
            Self::Transport(_) => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Io(_) => 5,
            Self::CommandFailed { .. } => 6,
        }
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let settings = load_settings(cli.settings.as_deref())?;
    let admission = load_admission_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { format } => execute_check_command(&admission, format),
        Commands::Review {
            request,
            stage,
            timeout,
        } => execute_review_command(&admission, &settings, &request, stage, timeout).await,
    }
}

fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if cli.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

/// Load CLI settings from an optional file and the environment
///
/// Later sources override earlier ones:
/// 1. Built-in defaults
/// 2. The settings file, when given
/// 3. Variables prefixed `ADMISSION__` (e.g. `ADMISSION__CONNECT_TIMEOUT=2s`)
pub fn load_settings(path: Option<&Path>) -> Result<CliSettings, CliError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(config::Environment::with_prefix(SETTINGS_ENV_PREFIX).separator("__"))
        .build()
        .and_then(|c| c.try_deserialize::<CliSettings>())
        .map_err(|e| {
            CliError::Configuration(ConfigError::ParseError {
                message: format!("Invalid CLI settings: {}", e),
            })
        })?;

    debug!(?settings, "Loaded CLI settings");
    Ok(settings)
}

/// Load webhook configuration from `path`, or the environment when absent
pub fn load_admission_config(path: Option<&Path>) -> Result<AdmissionConfig, CliError> {
    let config = match path {
        Some(path) => AdmissionConfig::load_from_file(path)?,
        None => AdmissionConfig::load_from_env()?,
    };

    Ok(config)
}

/// Summary of one registered webhook as printed by `check`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSummary {
    pub name: String,
    pub kind: String,
    pub failure_policy: String,
    pub timeout: String,
    pub url: String,
    pub rules: usize,
}

/// Describe every webhook of the registry, mutating ones first
pub fn summarize(registry: &WebhookRegistry) -> Vec<WebhookSummary> {
    registry
        .mutating()
        .iter()
        .chain(registry.validating().iter())
        .map(|webhook| WebhookSummary {
            name: webhook.name().to_string(),
            kind: webhook.kind().to_string(),
            failure_policy: webhook.failure_policy().to_string(),
            timeout: humantime::format_duration(webhook.timeout()).to_string(),
            url: webhook.client().url().to_string(),
            rules: webhook.rules().len(),
        })
        .collect()
}

/// Render the `check` report
pub fn render_check(summaries: &[WebhookSummary], format: &OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(summaries).map_err(|e| CliError::CommandFailed {
                message: format!("Failed to render JSON: {}", e),
            })
        }
        OutputFormat::Text => {
            let mut lines = vec![format!("Configuration OK: {} webhook(s)", summaries.len())];
            lines.extend(summaries.iter().map(|s| {
                format!(
                    "  {} [{}] policy={} timeout={} rules={} url={}",
                    s.name, s.kind, s.failure_policy, s.timeout, s.rules, s.url
                )
            }));
            Ok(lines.join("\n"))
        }
    }
}

fn execute_check_command(admission: &AdmissionConfig, format: OutputFormat) -> Result<(), CliError> {
    let registry = WebhookRegistry::from_config(admission)?;
    println!("{}", render_check(&summarize(&registry), &format)?);
    Ok(())
}

/// Read a JSON request file
pub fn read_request(path: &Path) -> Result<Request, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::InvalidArgument {
        arg: "request".to_string(),
        message: format!("{} is not a valid request: {}", path.display(), e),
    })
}

/// Run `request` through the configured webhooks and return the result
pub async fn review(
    controller: &AdmissionController,
    request: Request,
    stage: Stage,
    timeout: Option<Duration>,
) -> Result<Request, CliError> {
    let ctx = match timeout {
        Some(timeout) => DispatchContext::background().with_timeout(timeout),
        None => DispatchContext::background(),
    };

    let reviewed = match stage {
        Stage::Mutate => controller.mutate(&ctx, request).await?,
        Stage::Validate => {
            controller.validate(&ctx, &request).await?;
            request
        }
        Stage::Admit => controller.admit(&ctx, request).await?,
    };

    Ok(reviewed)
}

async fn execute_review_command(
    admission: &AdmissionConfig,
    settings: &CliSettings,
    request_path: &Path,
    stage: Stage,
    timeout: Option<Duration>,
) -> Result<(), CliError> {
    let controller = AdmissionController::from_config_with(admission, settings.transport_config()?)?;
    let request = read_request(request_path)?;

    info!(path = %request_path.display(), ?stage, "Reviewing request");
    let reviewed = review(&controller, request, stage, timeout).await?;

    let output = serde_json::to_string_pretty(&reviewed).map_err(|e| CliError::CommandFailed {
        message: format!("Failed to render JSON: {}", e),
    })?;
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
