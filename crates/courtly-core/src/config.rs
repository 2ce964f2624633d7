// ── Runtime service configuration ──
//
// These types describe *how* to reach a Courtly reservation service.
// They carry credential data and connection tuning, but never touch
// disk. The CLI constructs a `ServiceConfig` and hands it in.

use secrecy::SecretString;

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default.
    #[default]
    SystemDefaults,
    /// Skip verification (self-signed certs on club intranets).
    DangerAcceptInvalid,
}

/// Daily operating window of the facility, in whole hours.
///
/// `close_hour` may be 24, meaning the facility closes at midnight --
/// the last bookable slot then runs 23:00 to 24:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl OperatingWindow {
    pub fn new(open_hour: u32, close_hour: u32) -> Self {
        Self {
            open_hour,
            close_hour,
        }
    }

    /// Check `0 <= open <= close <= 24`.
    ///
    /// An equal open and close is a valid, zero-slot window (the
    /// facility is closed that day).
    pub fn validate(self) -> Result<Self, CoreError> {
        if self.open_hour > self.close_hour || self.close_hour > 24 {
            return Err(CoreError::InvalidWindow {
                open_hour: self.open_hour,
                close_hour: self.close_hour,
            });
        }
        Ok(self)
    }
}

impl Default for OperatingWindow {
    /// Evening window: 16:00 to midnight.
    fn default() -> Self {
        Self {
            open_hour: 16,
            close_hour: 24,
        }
    }
}

/// Configuration for connecting to a single reservation service.
///
/// Built by the CLI, passed to `AvailabilityController` -- core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service base URL (e.g., `https://courts.example.club`).
    pub base_url: String,
    /// Bearer token, when the deployment requires one.
    pub token: Option<SecretString>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: std::time::Duration,
    /// Operating window slots are derived from.
    pub window: OperatingWindow,
    /// Enable the WebSocket change feed.
    pub feed_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            token: None,
            tls: TlsVerification::default(),
            timeout: std::time::Duration::from_secs(30),
            window: OperatingWindow::default(),
            feed_enabled: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_evening() {
        let window = OperatingWindow::default();
        assert_eq!(window.open_hour, 16);
        assert_eq!(window.close_hour, 24);
        assert!(window.validate().is_ok());
    }

    #[test]
    fn zero_slot_window_is_valid() {
        assert!(OperatingWindow::new(10, 10).validate().is_ok());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = OperatingWindow::new(20, 16).validate().unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidWindow {
                open_hour: 20,
                close_hour: 16
            }
        ));
    }

    #[test]
    fn window_past_midnight_is_rejected() {
        assert!(OperatingWindow::new(16, 25).validate().is_err());
    }
}
