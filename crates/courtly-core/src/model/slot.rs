// ── Time slots ──

use courtly_api::SlotTime;
use serde::{Deserialize, Serialize};

/// One bookable interval on the availability board.
///
/// Slots are always one hour wide and aligned to the hour; the final
/// slot of a day ends at `24:00:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: SlotTime,
    pub end: SlotTime,
    pub available: bool,
}

impl TimeSlot {
    /// Label in the shape bookers see on the board, e.g. `19:00 - 20:00`.
    pub fn label(&self) -> String {
        format!(
            "{:02}:{:02} - {:02}:{:02}",
            self.start.hour(),
            self.start.minute(),
            self.end.hour(),
            self.end.minute()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn label_pads_hours() {
        let slot = TimeSlot {
            start: SlotTime::from_hour(9).unwrap(),
            end: SlotTime::from_hour(10).unwrap(),
            available: true,
        };
        assert_eq!(slot.label(), "09:00 - 10:00");
    }

    #[test]
    fn label_renders_midnight_close() {
        let slot = TimeSlot {
            start: SlotTime::from_hour(23).unwrap(),
            end: SlotTime::END_OF_DAY,
            available: false,
        };
        assert_eq!(slot.label(), "23:00 - 24:00");
    }
}
