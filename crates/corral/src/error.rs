//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use corral_core::CoreError;

/// Exit codes per the CLI conventions.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to backend at {url}")]
    #[diagnostic(
        code(corral::connection_failed),
        help(
            "Check that the backend is running and accessible.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed")]
    #[diagnostic(
        code(corral::auth_failed),
        help(
            "Verify your bearer token.\n\
             Set CORRAL_TOKEN, or run: corral config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No API token configured for profile '{profile}'")]
    #[diagnostic(
        code(corral::no_token),
        help(
            "Configure a token with: corral config set-token\n\
             Or set the CORRAL_TOKEN environment variable."
        )
    )]
    NoToken { profile: String },

    // ── Generation ───────────────────────────────────────────────────

    #[error("Rule generation is taking longer than usual")]
    #[diagnostic(
        code(corral::generation_timeout),
        help(
            "No result arrived within {seconds}s. The run may still finish\n\
             server-side -- retry, or raise the wait with --wait."
        )
    )]
    GenerationTimeout { seconds: u64 },

    #[error("Could not start rule generation: {message}")]
    #[diagnostic(
        code(corral::generation_dispatch),
        help("The dispatch request failed; nothing was subscribed. Retry when the backend is reachable.")
    )]
    GenerationDispatch { message: String },

    #[error("Rule generation failed: {message}")]
    #[diagnostic(code(corral::generation_failed))]
    GenerationFailed { message: String },

    #[error("This command needs a push-gateway configuration")]
    #[diagnostic(
        code(corral::no_push_config),
        help(
            "Add push settings to your profile:\n\
             corral config init --profile {profile} --api-url ... --push-key ... --push-cluster ..."
        )
    )]
    NoPushConfig { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(corral::not_found),
        help("Run: corral {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error: {message}")]
    #[diagnostic(code(corral::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(corral::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(corral::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: corral config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(corral::no_config),
        help(
            "Create one with: corral config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(corral::config))]
    Config(Box<figment::Error>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(corral::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoToken { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ApiError { status: Some(404), .. } => {
                exit_code::NOT_FOUND
            }
            Self::Timeout { .. } | Self::GenerationTimeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Dispatch { message } => CliError::GenerationDispatch { message },

            CoreError::ResultTimeout { timeout_secs } => CliError::GenerationTimeout {
                seconds: timeout_secs,
            },

            CoreError::Generation { message } => CliError::GenerationFailed { message },

            CoreError::PushChannelClosed => CliError::ConnectionFailed {
                url: "(push gateway)".into(),
                source: "push channel closed while waiting for a result".into(),
            },

            CoreError::Submission { name, message } => CliError::ApiError {
                message: format!("could not add '{name}': {message}"),
                status: None,
            },

            CoreError::SubmissionInFlight { name, state } => CliError::ApiError {
                message: format!("suggestion '{name}' is already {state}"),
                status: None,
            },

            CoreError::InvalidCel { message } => CliError::Validation {
                field: "cel".into(),
                reason: message,
            },

            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::RuleNotFound { identifier } => CliError::NotFound {
                resource_type: "rule".into(),
                identifier,
                list_command: "rules list".into(),
            },

            CoreError::Api { message, status } => CliError::ApiError { message, status },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                message,
                status: None,
            },
        }
    }
}

impl From<corral_config::ConfigError> for CliError {
    fn from(err: corral_config::ConfigError) -> Self {
        match err {
            corral_config::ConfigError::NoToken { profile } => CliError::NoToken { profile },
            corral_config::ConfigError::Validation { field, reason } => {
                CliError::Validation { field, reason }
            }
            corral_config::ConfigError::Figment(e) => CliError::Config(e),
            corral_config::ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: e.to_string(),
            },
            corral_config::ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
