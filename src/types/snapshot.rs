//! Persisted layout: locked poses plus the learned co-visibility baseline

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::Pose;

/// A locked layout that can be stored and restored later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    /// Unique identifier
    pub id: String,
    /// When this snapshot was created (Unix timestamp)
    pub created_unix: i64,
    /// Locked pose per marker id
    pub locked: BTreeMap<String, Pose>,
    /// Known co-visible set per marker id
    pub known_sets: BTreeMap<String, BTreeSet<String>>,
    /// Setup-phase observation count per marker id
    pub observation_counts: BTreeMap<String, u32>,
    /// SHA-256 over the canonical layout bytes
    pub fingerprint: [u8; 32],
}

impl LayoutSnapshot {
    pub fn marker_count(&self) -> usize {
        self.locked.len()
    }

    /// Hex form of the fingerprint
    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
