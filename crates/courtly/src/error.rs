//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use courtly_config::ConfigError;
use courtly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NETWORK: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
    pub const INVALID_INPUT: i32 = 6;
    pub const CONFLICT: i32 = 7;
    pub const SERVER: i32 = 8;
    pub const TIMEOUT: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the reservation service at {url}")]
    #[diagnostic(
        code(courtly::connection_failed),
        help(
            "Check that the service is running and the URL is correct.\n\
             URL: {url}\n\
             For self-signed certificates, pass --insecure (-k)."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(courtly::timeout),
        help("Increase the timeout with --timeout or check service responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("Reservation store unavailable: {reason}")]
    #[diagnostic(
        code(courtly::store_unavailable),
        help("The availability board could not be derived. Retry, or check the server URL.")
    )]
    StoreUnavailable { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(courtly::auth_failed),
        help(
            "Verify your bearer token.\n\
             Store a fresh one with: courtly config set-token"
        )
    )]
    AuthFailed { message: String },

    #[error("Forbidden: {message}")]
    #[diagnostic(
        code(courtly::forbidden),
        help("Your role does not permit this operation. Staff or admin access may be required.")
    )]
    Forbidden { message: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(courtly::no_token),
        help(
            "Store one with: courtly config set-token --profile {profile}\n\
             Or set the COURTLY_TOKEN environment variable."
        )
    )]
    NoToken { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(courtly::not_found),
        help("Run: courtly {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Booking ──────────────────────────────────────────────────────

    #[error("Slot already taken: {message}")]
    #[diagnostic(
        code(courtly::slot_taken),
        help(
            "Someone else confirmed this slot first.\n\
             Re-run: courtly slots list to see the current board."
        )
    )]
    SlotTaken { message: String },

    #[error("Slot {label} is not available")]
    #[diagnostic(
        code(courtly::slot_unavailable),
        help("The slot is booked or already past. Run: courtly slots list to pick another.")
    )]
    SlotUnavailable { label: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Service error ({code}): {message}")]
    #[diagnostic(code(courtly::api_error))]
    ApiError {
        code: String,
        message: String,
        status: Option<u16>,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(courtly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(courtly::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: courtly config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No configuration found")]
    #[diagnostic(
        code(courtly::no_config),
        help(
            "Create one with: courtly config init\n\
             Expected at: {path}\n\
             Or pass --server to skip profiles entirely."
        )
    )]
    NoConfig { path: String },

    #[error("Invalid configuration for {field}: {reason}")]
    #[diagnostic(
        code(courtly::invalid_config),
        help("Edit the file shown by: courtly config path")
    )]
    InvalidConfig { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(courtly::config))]
    Config(Box<ConfigError>),

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StoreUnavailable { .. } => exit_code::NETWORK,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::Forbidden { .. } | Self::NoToken { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::SlotTaken { .. } | Self::SlotUnavailable { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::INVALID_INPUT,
            Self::ProfileNotFound { .. }
            | Self::NoConfig { .. }
            | Self::InvalidConfig { .. }
            | Self::Config(_) => exit_code::CONFIG,
            Self::ApiError { status, .. } if status.is_some_and(|s| s >= 500) => exit_code::SERVER,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidWindow {
                open_hour,
                close_hour,
            } => CliError::InvalidConfig {
                field: "open_hour/close_hour".into(),
                reason: format!("opens {open_hour}:00, closes {close_hour}:00"),
            },

            CoreError::Config { message } => CliError::InvalidConfig {
                field: "server".into(),
                reason: message,
            },

            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::StoreUnavailable { reason } => CliError::StoreUnavailable { reason },

            CoreError::Unauthorized { message } => CliError::AuthFailed { message },

            CoreError::Forbidden { message } => CliError::Forbidden { message },

            CoreError::SlotTaken { message } => CliError::SlotTaken { message },

            CoreError::SlotUnavailable { label } => CliError::SlotUnavailable { label },

            CoreError::NoSlotSelected => CliError::Validation {
                field: "start".into(),
                reason: "no slot selected".into(),
            },

            CoreError::CourtNotFound { identifier } => CliError::NotFound {
                resource_type: "court".into(),
                identifier,
                list_command: "courts list".into(),
            },

            CoreError::ReservationNotFound { identifier } => CliError::NotFound {
                resource_type: "reservation".into(),
                identifier,
                list_command: "reservations list".into(),
            },

            CoreError::NotFound { message } => CliError::NotFound {
                resource_type: "resource".into(),
                identifier: message,
                list_command: "courts list".into(),
            },

            CoreError::Rejected { message } => CliError::ApiError {
                code: "rejected".into(),
                message,
                status: None,
            },

            CoreError::Api {
                message,
                code,
                status,
            } => CliError::ApiError {
                code: code.unwrap_or_default(),
                message,
                status,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
                status: None,
            },
        }
    }
}

// Raw client errors funnel through the core taxonomy so both paths
// produce the same diagnostics.
impl From<courtly_core::ApiError> for CliError {
    fn from(err: courtly_core::ApiError) -> Self {
        CoreError::from(err).into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::InvalidConfig { field, reason },

            ConfigError::UnknownProfile { profile, available } => CliError::ProfileNotFound {
                name: profile,
                available,
            },

            ConfigError::NoToken { profile } => CliError::NoToken { profile },

            other => CliError::Config(Box::new(other)),
        }
    }
}
