//! # booking-core
//!
//! Reservation model, record store and notification dispatch for the
//! ride-booking backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        booking-core                           │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌────────────────┐  │
//! │  │ Reservation  │  │ ReservationStore │  │   Dispatcher   │  │
//! │  │   + codecs   │──│ (memory / file)  │  │  (Notifier*)   │  │
//! │  └──────────────┘  └──────────────────┘  └────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ReservationStore` trait lets the volatile and durable stores be
//! swapped without touching the checkout or webhook flow.

pub mod codec;
pub mod error;
pub mod notify;
pub mod reservation;
pub mod store;

pub use codec::{EncodedMetadata, EncodedNote, ReservationChannel};
pub use error::{BookingError, Result};
pub use notify::{Dispatcher, Notifier};
pub use reservation::{ConfirmedReservation, PendingCheckout, ReservationPayload};
pub use store::{ExpiryPolicy, FileReservationStore, MemoryReservationStore, ReservationStore};
