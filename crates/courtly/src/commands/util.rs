//! Shared helpers for command handlers.

use chrono::{Local, NaiveDate};

use courtly_core::{ApiError, BookingClient, Court, CourtId, SlotTime};

use crate::error::CliError;

/// Parse a `--date` value.
pub fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| CliError::Validation {
        field: "date".into(),
        reason: format!("expected YYYY-MM-DD, got '{raw}'"),
    })
}

/// Parse an optional `--date` value, defaulting to today.
pub fn parse_date_or_today(value: Option<&str>) -> Result<NaiveDate, CliError> {
    match value {
        Some(raw) => parse_date(raw),
        None => Ok(Local::now().date_naive()),
    }
}

/// Parse a `--start` value (`HH`, `HH:MM`, or `HH:MM:SS`).
pub fn parse_start(raw: &str) -> Result<SlotTime, CliError> {
    raw.parse::<SlotTime>().map_err(|e| CliError::Validation {
        field: "start".into(),
        reason: e.to_string(),
    })
}

/// Resolve a court given as an ID or a name.
///
/// Numeric identifiers go straight to the service; anything else is
/// matched case-insensitively against the catalog.
pub async fn resolve_court(client: &BookingClient, identifier: &str) -> Result<Court, CliError> {
    if let Ok(id) = identifier.parse::<CourtId>() {
        return match client.get_court(id).await {
            Err(ApiError::NotFound { .. }) => Err(court_not_found(identifier)),
            other => other.map_err(Into::into),
        };
    }

    let courts = client.list_courts().await?;
    courts
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(identifier))
        .ok_or_else(|| court_not_found(identifier))
}

fn court_not_found(identifier: &str) -> CliError {
    CliError::NotFound {
        resource_type: "court".into(),
        identifier: identifier.into(),
        list_command: "courts list".into(),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
