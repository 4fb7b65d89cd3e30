// ── Core error types ──
//
// User-facing errors from corral-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<corral_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
///
/// Every variant is scoped to the single operation that raised it; none
/// is fatal to other in-flight work.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Generation protocol ──────────────────────────────────────────
    /// The dispatch call that starts a generation run failed (network
    /// error, non-success response, or a response without a task id).
    /// Never retried internally.
    #[error("Generation dispatch failed: {message}")]
    Dispatch { message: String },

    /// No `result` event arrived on the task channel before the
    /// deadline. Distinct from [`Dispatch`](Self::Dispatch) so callers
    /// can show a "taking longer than usual" state.
    #[error("Timed out after {timeout_secs}s waiting for generated rules")]
    ResultTimeout { timeout_secs: u64 },

    /// The backend pushed a generation failure, or the pushed payload
    /// could not be decoded into a suggestion batch.
    #[error("Rule generation failed: {message}")]
    Generation { message: String },

    /// The push connection went away while an operation was waiting on it.
    #[error("Push channel closed while waiting for a result")]
    PushChannelClosed,

    // ── Submission ───────────────────────────────────────────────────
    /// Persisting a suggestion as a rule failed. The suggestion stays
    /// eligible for a user-initiated retry.
    #[error("Failed to add suggestion '{name}': {message}")]
    Submission { name: String, message: String },

    /// The suggestion is already being submitted or was already added.
    #[error("Suggestion '{name}' is already {state}")]
    SubmissionInFlight { name: String, state: &'static str },

    // ── CEL ──────────────────────────────────────────────────────────
    /// The rule's CEL text could not be parsed into a query tree.
    #[error("Invalid CEL expression: {message}")]
    InvalidCel { message: String },

    // ── Connection / API ─────────────────────────────────────────────
    #[error("Cannot connect to backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Rule not found: {identifier}")]
    RuleNotFound { identifier: String },

    /// API error (wrapped, not exposed raw).
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<corral_api::Error> for CoreError {
    fn from(err: corral_api::Error) -> Self {
        match err {
            corral_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            corral_api::Error::InvalidToken(message) => {
                CoreError::AuthenticationFailed { message }
            }
            corral_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            corral_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            corral_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            corral_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            corral_api::Error::Api { message, status } => CoreError::Api {
                message,
                status: Some(status),
            },
            corral_api::Error::MissingTaskId => CoreError::Dispatch {
                message: "backend response did not include a task id".into(),
            },
            corral_api::Error::PushConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push gateway connection failed: {reason}"),
            },
            corral_api::Error::PushClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push gateway closed (code {code}): {reason}"),
            },
            corral_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
