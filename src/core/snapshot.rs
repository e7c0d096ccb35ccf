//! Layout snapshots: persist a locked layout and its trust baseline
//!
//! Key invariant: a snapshot only exists for a Locked aggregator, and its
//! fingerprint covers every pose, known set and observation count.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::core::aggregator::PoseAggregator;
use crate::core::trust::TrustMonitor;
use crate::types::{LayoutSnapshot, MarkerError, Pose, ReasonCode};

/// Fixed-point scale for floats in the canonical encoding
const FINGERPRINT_SCALE: f64 = 1e9;

/// Snapshot generator
#[derive(Debug, Default)]
pub struct SnapshotGenerator;

impl SnapshotGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Capture the current layout
    ///
    /// Fails with `R501_SNAPSHOT_NOT_LOCKED` unless the aggregator is Locked.
    pub fn generate(
        &self,
        aggregator: &PoseAggregator,
        trust: &TrustMonitor,
    ) -> Result<LayoutSnapshot, MarkerError> {
        if !aggregator.state().is_locked() {
            return Err(MarkerError::Snapshot(ReasonCode::R501_SNAPSHOT_NOT_LOCKED));
        }

        let locked = aggregator.locked_poses().clone();
        let known_sets = trust.known_sets().clone();
        let observation_counts = trust.observation_counts().clone();
        let fingerprint = fingerprint(&locked, &known_sets, &observation_counts);

        let now = chrono::Utc::now();
        let id = format!(
            "{}_{:08x}",
            now.format("%Y%m%d_%H%M%S"),
            u32::from_be_bytes([fingerprint[0], fingerprint[1], fingerprint[2], fingerprint[3]])
        );

        Ok(LayoutSnapshot {
            id,
            created_unix: now.timestamp(),
            locked,
            known_sets,
            observation_counts,
            fingerprint,
        })
    }
}

/// SHA-256 over the canonical encoding of a layout
pub fn fingerprint(
    locked: &BTreeMap<String, Pose>,
    known_sets: &BTreeMap<String, BTreeSet<String>>,
    observation_counts: &BTreeMap<String, u32>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"MLAYOUT1");

    hasher.update((locked.len() as u32).to_le_bytes());
    for (id, pose) in locked {
        update_str(&mut hasher, id);
        let q = pose.orientation.coords;
        for v in pose.position.iter().chain(q.iter()) {
            hasher.update(fixed_point(*v).to_le_bytes());
        }
    }

    hasher.update((known_sets.len() as u32).to_le_bytes());
    for (id, members) in known_sets {
        update_str(&mut hasher, id);
        hasher.update((members.len() as u32).to_le_bytes());
        for member in members {
            update_str(&mut hasher, member);
        }
    }

    hasher.update((observation_counts.len() as u32).to_le_bytes());
    for (id, count) in observation_counts {
        update_str(&mut hasher, id);
        hasher.update(count.to_le_bytes());
    }

    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u32).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Floats are hashed as fixed-point so a JSON round trip cannot flip the fingerprint
fn fixed_point(v: f64) -> i64 {
    (v * FINGERPRINT_SCALE).round() as i64
}

/// Recompute the fingerprint and compare
pub fn validate_snapshot(snapshot: &LayoutSnapshot) -> Result<(), MarkerError> {
    let expected = fingerprint(
        &snapshot.locked,
        &snapshot.known_sets,
        &snapshot.observation_counts,
    );
    if expected != snapshot.fingerprint {
        log::warn!(
            "{} for layout {}",
            ReasonCode::R503_SNAPSHOT_FINGERPRINT_MISMATCH.code(),
            snapshot.id
        );
        return Err(MarkerError::Snapshot(
            ReasonCode::R503_SNAPSHOT_FINGERPRINT_MISMATCH,
        ));
    }
    Ok(())
}

/// Save snapshot as pretty JSON `layout_<id>.json` inside `dir`
pub fn save_snapshot(snapshot: &LayoutSnapshot, dir: impl AsRef<Path>) -> Result<String, MarkerError> {
    let dir = dir.as_ref();
    let path: PathBuf = dir.join(format!("layout_{}.json", snapshot.id));

    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, json)?;

    log::info!("layout {} saved to {}", snapshot.id, path.display());
    Ok(path.to_string_lossy().into_owned())
}

/// Load snapshot from JSON file
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<LayoutSnapshot, MarkerError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Load and check the fingerprint
pub fn load_and_validate_snapshot(path: impl AsRef<Path>) -> Result<LayoutSnapshot, MarkerError> {
    let snapshot = load_snapshot(path)?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================
