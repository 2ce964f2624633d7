// ── Slot derivation pipeline ──
//
// Pure functions from operating window + clock reading + confirmed
// reservations to the availability board. Both filters only ever flip
// slots from available to unavailable, so they can run in either order
// and never resurrect a blocked slot.

use chrono::{NaiveDate, NaiveDateTime};
use courtly_api::{ReservationRecord, ReservationStatus, SlotTime};

use crate::config::OperatingWindow;
use crate::error::CoreError;
use crate::model::{SlotQuery, TimeSlot};

/// Build the hourly grid for an operating window.
///
/// Slots run `open_hour..close_hour`, one per hour, all available. An
/// equal open and close yields an empty board (the facility is closed
/// that day); an inverted or out-of-range window is an error.
pub fn generate(window: OperatingWindow) -> Result<Vec<TimeSlot>, CoreError> {
    let OperatingWindow {
        open_hour,
        close_hour,
    } = window.validate()?;

    Ok((open_hour..close_hour)
        .map(|hour| TimeSlot {
            start: SlotTime::from_hour(hour).expect("hours in a validated window are at most 24"),
            end: SlotTime::from_hour(hour + 1)
                .expect("hours in a validated window are at most 24"),
            available: true,
        })
        .collect())
}

/// Gray out slots that already started.
///
/// Applies only when `date` is the calendar day of `reference_now`; any
/// other date -- future or past -- is left untouched. The boundary is
/// inclusive: a slot whose start equals the clock reading has started
/// and can no longer be booked.
pub fn apply_past_cutoff(slots: &mut [TimeSlot], date: NaiveDate, reference_now: NaiveDateTime) {
    if date != reference_now.date() {
        return;
    }
    for slot in &mut *slots {
        if slot.start.on(date) <= reference_now {
            slot.available = false;
        }
    }
}

/// Block slots claimed by confirmed reservations.
///
/// A reservation claims exactly the slot whose bounds it matches;
/// off-grid intervals (e.g. 19:30 to 20:30) block nothing. Pending and
/// cancelled reservations never block.
pub fn apply_reservations(slots: &mut [TimeSlot], reservations: &[ReservationRecord]) {
    for slot in &mut *slots {
        let claimed = reservations.iter().any(|r| {
            r.status == ReservationStatus::Confirmed
                && r.start_time == slot.start
                && r.end_time == slot.end
        });
        if claimed {
            slot.available = false;
        }
    }
}

/// Full pipeline: grid, past cutoff, reservation overlay.
pub fn derive(
    window: OperatingWindow,
    query: &SlotQuery,
    reservations: &[ReservationRecord],
) -> Result<Vec<TimeSlot>, CoreError> {
    let mut slots = generate(window)?;
    apply_past_cutoff(&mut slots, query.date, query.reference_now);
    apply_reservations(&mut slots, reservations);
    Ok(slots)
}
