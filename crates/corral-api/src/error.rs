use thiserror::Error;

/// Top-level error type for the `corral-api` crate.
///
/// Covers every failure mode across both API surfaces: the HTTP rules API
/// and the push gateway. `corral-core` maps these into user-facing
/// diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The backend rejected the bearer token (401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The bearer token could not be placed in a request header
    /// (contains non-ASCII or control characters).
    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Rules API ───────────────────────────────────────────────────
    /// Non-success response from the rules API, with the parsed
    /// `{"detail": ...}` error body when the backend provided one.
    #[error("API error (HTTP {status}): {message}")]
    Api { message: String, status: u16 },

    /// The generation dispatch response carried no usable task id.
    /// We fail fast here rather than subscribe to an undefined channel.
    #[error("Generation dispatch response did not include a task id")]
    MissingTaskId,

    // ── Push gateway ────────────────────────────────────────────────
    /// Push gateway connection failed.
    #[error("Push gateway connection failed: {0}")]
    PushConnect(String),

    /// Push gateway closed the connection.
    #[error("Push gateway closed (code {code}): {reason}")]
    PushClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the bearer token has
    /// expired or been revoked and a fresh one might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::PushConnect(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }
}
