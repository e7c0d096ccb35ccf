//! Core modules for markerlock

pub mod lifecycle;
pub mod robust;
pub mod aggregator;
pub mod trust;
pub mod hit;
pub mod events;
pub mod session;
pub mod source;
pub mod snapshot;
pub mod api;

pub use lifecycle::{FrameEntry, MarkerLifecycleTracker, TrackedMarker};
pub use aggregator::{PoseAggregator, PoseHistory, PoseSample};
pub use trust::{TrustMonitor, TrustScore};
pub use hit::HitDetectionPipeline;
pub use events::{ChannelObserver, EventBus, EventObserver};
pub use session::MarkerSession;
pub use source::{ObservationSource, ReplaySource, SessionDriver, VecSource};
pub use snapshot::{
    fingerprint, load_and_validate_snapshot, load_snapshot, save_snapshot, validate_snapshot,
    SnapshotGenerator,
};
pub use api::{create_router, run_server};
