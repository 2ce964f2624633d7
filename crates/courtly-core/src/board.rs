// ── Published availability board ──
//
// Snapshot types the controller publishes through its watch channel.
// Snapshots are cheap to clone: the slot list is behind an `Arc`.

use std::sync::Arc;

use courtly_api::SlotTime;

use crate::model::{SlotTarget, TimeSlot};

/// Lifecycle phase of the published board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoardStatus {
    /// No query selected.
    #[default]
    Idle,
    /// A derivation run is in flight. The board still shows the previous
    /// result when the target is unchanged.
    Loading,
    /// Slots reflect the service state as of this revision.
    Ready,
    /// The last run failed. The board keeps the most recent good slots,
    /// which may be stale.
    Failed { reason: String },
}

impl BoardStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Point-in-time availability snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotBoard {
    pub status: BoardStatus,
    /// What the slots describe. `None` only when `Idle`.
    pub target: Option<SlotTarget>,
    /// Ascending, contiguous hourly slots.
    pub slots: Arc<[TimeSlot]>,
    /// Bumped on every accepted publish; strictly increasing for the
    /// lifetime of a controller.
    pub revision: u64,
}

impl SlotBoard {
    /// The slot starting at `start`, if the board has one.
    pub fn slot_starting(&self, start: SlotTime) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.start == start)
    }

    /// How many slots are still bookable.
    pub fn available_count(&self) -> usize {
        self.slots.iter().filter(|s| s.available).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_board_is_idle_and_empty() {
        let board = SlotBoard::default();
        assert_eq!(board.status, BoardStatus::Idle);
        assert!(board.target.is_none());
        assert!(board.slots.is_empty());
        assert_eq!(board.revision, 0);
    }

    #[test]
    fn slot_starting_finds_by_start_time() {
        let slots: Arc<[TimeSlot]> = Arc::from(vec![
            TimeSlot {
                start: SlotTime::from_hour(19).unwrap(),
                end: SlotTime::from_hour(20).unwrap(),
                available: true,
            },
            TimeSlot {
                start: SlotTime::from_hour(20).unwrap(),
                end: SlotTime::from_hour(21).unwrap(),
                available: false,
            },
        ]);
        let board = SlotBoard {
            status: BoardStatus::Ready,
            target: None,
            slots,
            revision: 1,
        };

        let found = board.slot_starting(SlotTime::from_hour(20).unwrap()).unwrap();
        assert!(!found.available);
        assert!(board.slot_starting(SlotTime::from_hour(9).unwrap()).is_none());
        assert_eq!(board.available_count(), 1);
    }
}
