//! Core types for markerlock

mod config;
mod error;
mod event;
mod observation;
mod output;
mod pose;
mod reason;
mod snapshot;
mod state;

pub use config::TrackerConfig;
pub use error::MarkerError;
pub use event::MarkerEvent;
pub use observation::{Observation, ObservationBatch, MIN_QUATERNION_NORM};
pub use output::TickOutput;
pub use pose::{Orientation, Pose, Position};
pub use reason::ReasonCode;
pub use snapshot::LayoutSnapshot;
pub use state::{AggregationMode, LockerState, TrustMode};
