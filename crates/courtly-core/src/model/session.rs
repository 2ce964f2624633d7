// ── Booking identity ──
//
// Every mutation is performed *as* someone. The service enforces the
// real rules; these types let clients fail fast before a round trip.

use courtly_api::ReservationRecord;
use serde::{Deserialize, Serialize};

/// Access level attached to a session.
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
pub enum Role {
    /// Facility administrator: full access.
    Admin,
    /// Front-desk staff: may manage any reservation.
    Staff,
    /// Regular member: may only manage their own reservations.
    Client,
}

/// Who reservations are created and cancelled as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_ref: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_ref: impl Into<String>, role: Role) -> Self {
        Self {
            user_ref: user_ref.into(),
            role,
        }
    }

    /// Whether this session may cancel the given reservation.
    ///
    /// Staff and admins may cancel anything; clients only what they
    /// booked themselves. The service applies the same rule -- this is
    /// a local pre-check, not the enforcement point.
    pub fn may_cancel(&self, reservation: &ReservationRecord) -> bool {
        match self.role {
            Role::Admin | Role::Staff => true,
            Role::Client => reservation.user_ref == self.user_ref,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use courtly_api::{CourtId, ReservationId, ReservationStatus, SlotTime};
    use std::str::FromStr;

    fn reservation_by(user_ref: &str) -> ReservationRecord {
        ReservationRecord {
            id: ReservationId(1),
            court_id: CourtId(3),
            date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            start_time: SlotTime::from_hour(19).unwrap(),
            end_time: SlotTime::from_hour(20).unwrap(),
            status: ReservationStatus::Confirmed,
            user_ref: user_ref.into(),
        }
    }

    #[test]
    fn staff_may_cancel_anything() {
        let session = Session::new("desk-1", Role::Staff);
        assert!(session.may_cancel(&reservation_by("someone-else")));
    }

    #[test]
    fn client_may_only_cancel_own() {
        let session = Session::new("u-3021", Role::Client);
        assert!(session.may_cancel(&reservation_by("u-3021")));
        assert!(!session.may_cancel(&reservation_by("u-9999")));
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(Role::Staff.to_string(), "staff");
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert!(Role::from_str("janitor").is_err());
    }
}
