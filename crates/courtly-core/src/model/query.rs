// ── Availability queries ──

use chrono::{NaiveDate, NaiveDateTime};
use courtly_api::CourtId;

/// What the consumer wants on the board: a facility date, a court, and
/// the clock reading used for the past-slot cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub court: CourtId,
    /// Clock reading that decides which of today's slots already
    /// started. Carried explicitly so derivations are reproducible.
    pub reference_now: NaiveDateTime,
}

impl SlotQuery {
    pub fn new(date: NaiveDate, court: CourtId, reference_now: NaiveDateTime) -> Self {
        Self {
            date,
            court,
            reference_now,
        }
    }

    /// The (date, court) pair this query is about.
    pub fn target(&self) -> SlotTarget {
        SlotTarget {
            date: self.date,
            court: self.court,
        }
    }
}

/// The (date, court) pair a board tracks.
///
/// Two queries with the same target differ only in their clock reading;
/// switching targets resets the board, re-stamping the clock does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotTarget {
    pub date: NaiveDate,
    pub court: CourtId,
}
