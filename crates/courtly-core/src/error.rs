// ── Core error types ──
//
// User-facing errors from courtly-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<courtly_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid operating window: opens {open_hour}:00, closes {close_hour}:00")]
    InvalidWindow { open_hour: u32, close_hour: u32 },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the reservation service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The reservation store could not be read. Transient: retried on
    /// the next query change or refresh, never auto-looped.
    #[error("Reservation store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    // ── Authorization errors ─────────────────────────────────────────
    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // ── Booking errors ───────────────────────────────────────────────
    /// The service rejected the booking because someone else got the
    /// slot first. The board should be re-derived.
    #[error("Slot already taken: {message}")]
    SlotTaken { message: String },

    /// A draft tried to select a slot the board shows as unavailable.
    #[error("Slot {label} is not available")]
    SlotUnavailable { label: String },

    /// A draft was submitted without a slot selection.
    #[error("No slot selected")]
    NoSlotSelected,

    #[error("Court not found: {identifier}")]
    CourtNotFound { identifier: String },

    #[error("Reservation not found: {identifier}")]
    ReservationNotFound { identifier: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Operation rejected: {message}")]
    Rejected { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Service error: {message}")]
    Api {
        message: String,
        /// The service-specific error code (e.g., "SLOT_TAKEN").
        code: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// True when the operation failed because someone else holds the slot.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SlotTaken { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<courtly_api::Error> for CoreError {
    fn from(err: courtly_api::Error) -> Self {
        match err {
            courtly_api::Error::Unauthorized { message } => CoreError::Unauthorized { message },
            courtly_api::Error::Forbidden { message } => CoreError::Forbidden { message },
            courtly_api::Error::NotFound { message } => CoreError::NotFound { message },
            courtly_api::Error::Conflict { message } => CoreError::SlotTaken { message },
            courtly_api::Error::Transport(ref e) => {
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
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            courtly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            courtly_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            courtly_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            courtly_api::Error::FeedConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Change feed connection failed: {reason}"),
            },
            courtly_api::Error::Service {
                status,
                message,
                code,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            courtly_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
