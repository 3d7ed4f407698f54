//! Queue state for a single EV charger shared by a set of parking spots.
//!
//! All operations are pure: they take a [`Station`] by reference and return
//! the next state, leaving persistence and scheduling to the caller.

mod format;
mod models;
mod simulator;

pub use crate::format::format_minutes;
pub use crate::models::*;
pub use crate::simulator::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Requested duration {minutes} min must be between 1 and 120 minutes")]
    InvalidDuration { minutes: f64 },
    #[error("Spot {spot_id} is already charging or waiting")]
    DuplicateSpot { spot_id: String },
    #[error("No request found for spot {spot_id}")]
    RequestNotFound { spot_id: String },
    #[error("Spot '{spot_id}' is not a valid parking spot")]
    UnknownSpot { spot_id: String },
}
