//! # RSVP
//!
//! Guest-data client for a wedding RSVP site: reads the guest list from a
//! remote guest sheet and submits attendance answers to it.
//!
//! ## Modules
//!
//! - [`guests`]: guest sheet client and record normalization
//! - [`retry`]: bounded retry with backoff
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rsvp::{Config, GuestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::discover(None)?;
//!     let client = GuestClient::new(config.api.endpoint()?, config.api.retry_policy())?;
//!
//!     for guest in client.fetch_guests().await? {
//!         println!("{} ({})", guest.name, guest.status());
//!     }
//!
//!     let accepted = client.update_guest_response(42, "Alice", true).await?;
//!     println!("Update accepted: {}", accepted);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod guests;
pub mod retry;

pub use config::{generate_default_config, ApiConfig, Config, ConfigError, LoggingConfig};

pub use guests::{
    GuestClient, GuestError, GuestRecord, GuestResult, GuestStatus, GuestSummary, NormalizeError,
    RawGuestRecord,
};

pub use retry::{Backoff, RetryFailure, RetryPolicy};
