use thiserror::Error;

/// Top-level error type for the `courtly-api` crate.
///
/// Covers every failure mode across both API surfaces: the REST client
/// and the WebSocket change feed. `courtly-core` maps these into its own
/// taxonomy (store availability, booking conflicts) for consumers.
#[derive(Debug, Error)]
pub enum Error {
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

    /// TLS handshake or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// Bearer token missing, invalid, or expired (HTTP 401).
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Authenticated but not allowed (HTTP 403).
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Resource does not exist (HTTP 404).
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Write conflicted with existing state (HTTP 409) -- for
    /// reservations this means another booking claimed the slot first.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Any other structured error from the service.
    #[error("Service error (HTTP {status}): {message}")]
    Service {
        status: u16,
        message: String,
        code: Option<String>,
    },

    // ── Change feed ─────────────────────────────────────────────────
    /// WebSocket connection to the change feed failed.
    #[error("Change feed connection failed: {0}")]
    FeedConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::FeedConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::NotFound { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the service rejected a write because the state
    /// already changed underneath it (slot taken, reservation already
    /// cancelled).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Extract the service error code, if available.
    pub fn service_error_code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
