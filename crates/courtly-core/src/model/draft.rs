// ── Booking draft ──
//
// The in-progress selection a booker builds up before committing:
// pick a court, pick a date, tap a slot. Court and date changes clear
// the slot pick, because the board underneath it changed.

use chrono::NaiveDate;
use courtly_api::{CourtId, NewReservation};

use crate::error::CoreError;
use crate::model::session::Session;
use crate::model::slot::TimeSlot;

/// An in-progress booking selection.
///
/// Field access goes through methods so the slot pick can't outlive the
/// (court, date) board it was made on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    court: CourtId,
    date: NaiveDate,
    slot: Option<TimeSlot>,
}

impl BookingDraft {
    pub fn new(court: CourtId, date: NaiveDate) -> Self {
        Self {
            court,
            date,
            slot: None,
        }
    }

    pub fn court(&self) -> CourtId {
        self.court
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn slot(&self) -> Option<&TimeSlot> {
        self.slot.as_ref()
    }

    /// Retarget the draft to another date. Clears the slot pick unless
    /// the date is unchanged.
    pub fn set_date(&mut self, date: NaiveDate) {
        if self.date != date {
            self.date = date;
            self.slot = None;
        }
    }

    /// Retarget the draft to another court. Clears the slot pick unless
    /// the court is unchanged.
    pub fn set_court(&mut self, court: CourtId) {
        if self.court != court {
            self.court = court;
            self.slot = None;
        }
    }

    /// Pick a slot off the board. Unavailable slots are rejected here,
    /// before any round trip.
    pub fn select_slot(&mut self, slot: TimeSlot) -> Result<(), CoreError> {
        if !slot.available {
            return Err(CoreError::SlotUnavailable {
                label: slot.label(),
            });
        }
        self.slot = Some(slot);
        Ok(())
    }

    pub fn clear_slot(&mut self) {
        self.slot = None;
    }

    /// Turn the draft into a reservation request for `session`.
    pub fn to_request(&self, session: &Session) -> Result<NewReservation, CoreError> {
        let slot = self.slot.ok_or(CoreError::NoSlotSelected)?;
        Ok(NewReservation {
            court_id: self.court,
            date: self.date,
            start_time: slot.start,
            end_time: slot.end,
            user_ref: session.user_ref.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::session::Role;
    use courtly_api::SlotTime;

    fn slot(hour: u32, available: bool) -> TimeSlot {
        TimeSlot {
            start: SlotTime::from_hour(hour).unwrap(),
            end: SlotTime::from_hour(hour + 1).unwrap(),
            available,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, day).unwrap()
    }

    #[test]
    fn date_change_clears_slot_pick() {
        let mut draft = BookingDraft::new(CourtId(3), date(12));
        draft.select_slot(slot(19, true)).unwrap();
        assert!(draft.slot().is_some());

        draft.set_date(date(13));
        assert!(draft.slot().is_none());
    }

    #[test]
    fn same_date_keeps_slot_pick() {
        let mut draft = BookingDraft::new(CourtId(3), date(12));
        draft.select_slot(slot(19, true)).unwrap();

        draft.set_date(date(12));
        assert!(draft.slot().is_some());
    }

    #[test]
    fn court_change_clears_slot_pick() {
        let mut draft = BookingDraft::new(CourtId(3), date(12));
        draft.select_slot(slot(19, true)).unwrap();

        draft.set_court(CourtId(4));
        assert!(draft.slot().is_none());
    }

    #[test]
    fn unavailable_slot_is_rejected() {
        let mut draft = BookingDraft::new(CourtId(3), date(12));
        let err = draft.select_slot(slot(19, false)).unwrap_err();
        assert!(matches!(err, CoreError::SlotUnavailable { .. }));
        assert!(draft.slot().is_none());
    }

    #[test]
    fn to_request_carries_the_session_user() {
        let mut draft = BookingDraft::new(CourtId(3), date(12));
        draft.select_slot(slot(19, true)).unwrap();

        let session = Session::new("u-3021", Role::Client);
        let request = draft.to_request(&session).unwrap();

        assert_eq!(request.court_id, CourtId(3));
        assert_eq!(request.date, date(12));
        assert_eq!(request.start_time, SlotTime::from_hour(19).unwrap());
        assert_eq!(request.end_time, SlotTime::from_hour(20).unwrap());
        assert_eq!(request.user_ref, "u-3021");
    }

    #[test]
    fn to_request_without_slot_fails() {
        let draft = BookingDraft::new(CourtId(3), date(12));
        let session = Session::new("u-3021", Role::Client);
        assert!(matches!(
            draft.to_request(&session),
            Err(CoreError::NoSlotSelected)
        ));
    }
}
