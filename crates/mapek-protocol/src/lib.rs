//! MAPE-K Protocol - Core types and key layout
//!
//! Defines the records the dashboard reads from the shared store, the
//! trust payload decoder, and the control messages it publishes to
//! device orchestrators.

pub mod command;
pub mod constants;
pub mod error;
pub mod keys;
pub mod trust;
pub mod types;

pub use command::*;
pub use constants::*;
pub use error::*;
pub use trust::{decode_trust_payload, TrustDecodeError};
pub use types::*;

/// Current wall-clock time as fractional unix seconds.
///
/// Producers write `time.time()`-style floats, so every comparison in the
/// dashboard happens in this unit.
pub fn unix_now_secs() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
