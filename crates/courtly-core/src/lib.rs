// courtly-core: Reactive availability layer between courtly-api and consumers (CLI).

pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod slots;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use board::{BoardStatus, SlotBoard};
pub use config::{OperatingWindow, ServiceConfig, TlsVerification};
pub use controller::{AvailabilityController, Clock, derive_once};
pub use error::CoreError;
pub use model::{BookingDraft, Role, Session, SlotQuery, SlotTarget, TimeSlot};
pub use stream::BoardStream;

// Re-export the client and wire types at the crate root so consumers
// need only this crate.
pub use courtly_api::{
    BookingClient, ChangeAction, Court, CourtId, Error as ApiError, FeedEvent, NewReservation,
    ReservationChange, ReservationFilter, ReservationId, ReservationRecord, ReservationStatus,
    SlotTime,
};
