//! Guest Data Client
//!
//! Reads the guest list from the remote guest sheet and submits attendance
//! answers to it.
//!
//! ## Architecture
//!
//! - **Client**: HTTP access with bounded retry on connection failures
//! - **Types**: canonical [`GuestRecord`] plus the raw wire shape it is
//!   normalized from
//! - **Error**: one error enum covering network, status and shape failures

mod client;
mod error;
mod types;

pub use client::GuestClient;
pub use error::{GuestError, GuestResult};
pub use types::{
    duplicate_ids, Cell, Flag, GuestRecord, GuestStatus, GuestSummary, NormalizeError, RawGuestRecord,
    RawId,
};
