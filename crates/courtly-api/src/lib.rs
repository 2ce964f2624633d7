// courtly-api: Async Rust client for the Courtly reservation service.

pub mod client;
pub mod error;
pub mod feed;
pub mod transport;
pub mod types;

pub use client::BookingClient;
pub use error::Error;
pub use feed::{FeedEvent, FeedFilter, FeedHandle, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
pub use types::{
    ChangeAction, Court, CourtId, NewReservation, ReservationChange, ReservationFilter,
    ReservationId, ReservationRecord, ReservationStatus, ServiceHealth, SlotTime,
};
