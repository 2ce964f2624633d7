// ── Domain model ──
//
// Types in this module are the canonical representation of booking
// concepts that consumers (CLI) depend on. Wire-level types live in
// courtly-api; this layer adds the concepts the service never sees:
// the availability board, queries, drafts, and booking identity.

pub mod draft;
pub mod query;
pub mod session;
pub mod slot;

// ── Re-exports ──────────────────────────────────────────────────────

pub use draft::BookingDraft;
pub use query::{SlotQuery, SlotTarget};
pub use session::{Role, Session};
pub use slot::TimeSlot;
