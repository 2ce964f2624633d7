//! Wire types for the Courtly reservation service.
//!
//! All types match the JSON bodies under `/api/v1/`. Field names are
//! snake_case on the wire, so no rename attributes are needed.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Identifiers ──────────────────────────────────────────────────────

/// Service-assigned court identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourtId(pub i64);

impl fmt::Display for CourtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CourtId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Service-assigned reservation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub i64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReservationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

// ── SlotTime ─────────────────────────────────────────────────────────

/// Seconds in a full day; also the exclusive-end bound `24:00:00`.
const SECONDS_PER_DAY: u32 = 86_400;

/// Wall-clock time of day with second granularity, `00:00:00` through
/// `24:00:00` inclusive.
///
/// Slot end bounds need `24:00:00` (the last slot of a full operating day
/// ends at midnight), which `chrono::NaiveTime` cannot represent, so this
/// wraps seconds-since-midnight instead. Displays and serializes as
/// `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotTime(u32);

impl SlotTime {
    /// Midnight at the start of the day.
    pub const MIDNIGHT: Self = Self(0);

    /// The exclusive end of the day, `24:00:00`.
    pub const END_OF_DAY: Self = Self(SECONDS_PER_DAY);

    /// Time at the top of the given hour. `hour` may be 24 (end of day).
    pub fn from_hour(hour: u32) -> Option<Self> {
        (hour <= 24).then(|| Self(hour * 3600))
    }

    /// Time from hour/minute/second components. `24:00:00` is the only
    /// valid value with `hour == 24`.
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        if minute >= 60 || second >= 60 {
            return None;
        }
        let total = hour
            .checked_mul(3600)?
            .checked_add(minute * 60)?
            .checked_add(second)?;
        (total <= SECONDS_PER_DAY).then_some(Self(total))
    }

    pub fn hour(self) -> u32 {
        self.0 / 3600
    }

    pub fn minute(self) -> u32 {
        (self.0 % 3600) / 60
    }

    pub fn second(self) -> u32 {
        self.0 % 60
    }

    /// Seconds since midnight (86400 for `24:00:00`).
    pub fn seconds_from_midnight(self) -> u32 {
        self.0
    }

    /// Project onto a calendar date to get a comparable timestamp.
    ///
    /// `24:00:00` maps to midnight at the start of the *following* day,
    /// preserving ordering across the day boundary.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        if self.0 == SECONDS_PER_DAY {
            let next = date
                .succ_opt()
                .expect("reservation dates are far from the calendar limits");
            next.and_time(NaiveTime::MIN)
        } else {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(self.0, 0)
                .expect("values below 86400 are valid times of day");
            date.and_time(time)
        }
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

/// Error returned when parsing a [`SlotTime`] from text fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day {input:?} (expected HH, HH:MM, or HH:MM:SS up to 24:00:00)")]
pub struct ParseSlotTimeError {
    input: String,
}

impl FromStr for SlotTime {
    type Err = ParseSlotTimeError;

    /// Accepts `HH:MM:SS`, `HH:MM`, or a bare `HH`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSlotTimeError {
            input: s.to_owned(),
        };

        let mut parts = s.split(':');
        let hour = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(err)?;
        let minute = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| err())?,
            None => 0,
        };
        let second = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| err())?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(err());
        }

        Self::from_hms(hour, minute, second).ok_or_else(err)
    }
}

impl Serialize for SlotTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Courts ───────────────────────────────────────────────────────────

/// Court overview — from `GET /api/v1/courts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    /// Sport played on this court: `"padel"`, `"tennis"`, `"futsal"`, etc.
    pub sport: String,
    #[serde(default)]
    pub surface: Option<String>,
    /// Price per one-hour slot, in the facility's currency.
    #[serde(default)]
    pub hourly_price: Option<f64>,
    /// Inactive courts are hidden from booking but keep their history.
    pub active: bool,
}

// ── Reservations ─────────────────────────────────────────────────────

/// Reservation lifecycle status. Only `confirmed` records occupy a slot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// A reservation — from `GET /api/v1/reservations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: ReservationId,
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub status: ReservationStatus,
    /// Opaque identity of the booking user.
    pub user_ref: String,
}

/// Creation payload — for `POST /api/v1/reservations`.
///
/// The service assigns the id and the initial status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReservation {
    pub court_id: CourtId,
    pub date: NaiveDate,
    pub start_time: SlotTime,
    pub end_time: SlotTime,
    pub user_ref: String,
}

/// Query-parameter filter for `GET /api/v1/reservations`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationFilter {
    pub date: Option<NaiveDate>,
    pub court: Option<CourtId>,
    pub status: Option<ReservationStatus>,
    pub user_ref: Option<String>,
}

impl ReservationFilter {
    /// Filter for the confirmed reservations occupying a (court, date) pair.
    pub fn confirmed_for(court: CourtId, date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            court: Some(court),
            status: Some(ReservationStatus::Confirmed),
            user_ref: None,
        }
    }

    /// Render as query parameters, skipping unset fields.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(date) = self.date {
            params.push(("date", date.to_string()));
        }
        if let Some(court) = self.court {
            params.push(("court_id", court.to_string()));
        }
        if let Some(status) = self.status {
            params.push(("status", status.to_string()));
        }
        if let Some(ref user_ref) = self.user_ref {
            params.push(("user_ref", user_ref.clone()));
        }
        params
    }
}

// ── Change feed payloads ─────────────────────────────────────────────

/// What happened to a reservation, as reported by the change feed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Cancelled,
}

/// Payload of a `reservation.changed` feed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationChange {
    pub action: ChangeAction,
    pub reservation: ReservationRecord,
}

// ── Health ───────────────────────────────────────────────────────────

/// Service liveness — from `GET /api/v1/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

// ── Tests ────────────────────────────────────────────────────────────
