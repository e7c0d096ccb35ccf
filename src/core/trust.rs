//! Trust monitor: learns co-visibility in Setup, scores live sightings in Gameplay
//!
//! Trust is pessimistic: the worst-matching known neighborhood bounds it, and
//! so does the share of visible ids no neighborhood has ever contained.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{MarkerError, MarkerEvent, Pose, ReasonCode, TrackerConfig, TrustMode};

/// Full breakdown of one trust computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub trust: f64,
    /// Smallest `|visible ∩ set| / |set|` over the eligible sets
    pub min_known_ratio: f64,
    /// Share of visible ids outside every eligible set
    pub unknown_fraction: f64,
    pub eligible_sets: usize,
}

#[derive(Debug)]
pub struct TrustMonitor {
    distance_threshold_meters: f64,
    min_observations_per_uuid: u32,
    trust_low_threshold: f64,
    trust_hysteresis: f64,
    mode: TrustMode,
    known_sets: BTreeMap<String, BTreeSet<String>>,
    observation_counts: BTreeMap<String, u32>,
    current_trust: f64,
    last_score: Option<TrustScore>,
}

impl TrustMonitor {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            distance_threshold_meters: config.distance_threshold_meters,
            min_observations_per_uuid: config.min_observations_per_uuid,
            trust_low_threshold: config.trust_low_threshold,
            trust_hysteresis: config.trust_hysteresis,
            mode: TrustMode::Idle,
            known_sets: BTreeMap::new(),
            observation_counts: BTreeMap::new(),
            current_trust: 1.0,
            last_score: None,
        }
    }

    pub fn mode(&self) -> TrustMode {
        self.mode
    }

    /// Published trust value
    pub fn current_trust(&self) -> f64 {
        self.current_trust
    }

    pub fn last_score(&self) -> Option<&TrustScore> {
        self.last_score.as_ref()
    }

    /// Enter Setup with an empty baseline (Idle or Setup only)
    pub fn begin_setup(&mut self) -> Result<(), MarkerError> {
        if self.mode == TrustMode::Gameplay {
            return Err(self.reject("begin_setup"));
        }
        self.known_sets.clear();
        self.observation_counts.clear();
        self.current_trust = 1.0;
        self.last_score = None;
        self.enter(TrustMode::Setup);
        Ok(())
    }

    /// Freeze the baseline and score `visible` right away (Setup only)
    pub fn begin_gameplay(&mut self, visible: &[String]) -> Result<Vec<MarkerEvent>, MarkerError> {
        if self.mode != TrustMode::Setup {
            return Err(self.reject("begin_gameplay"));
        }
        self.enter(TrustMode::Gameplay);
        Ok(self.evaluate(visible))
    }

    /// Back to Idle, forgetting the baseline; allowed from any mode
    pub fn reset(&mut self) {
        self.known_sets.clear();
        self.observation_counts.clear();
        self.current_trust = 1.0;
        self.last_score = None;
        self.enter(TrustMode::Idle);
    }

    /// Load a persisted baseline (Setup only)
    pub fn restore(
        &mut self,
        known_sets: BTreeMap<String, BTreeSet<String>>,
        observation_counts: BTreeMap<String, u32>,
    ) -> Result<(), MarkerError> {
        if self.mode != TrustMode::Setup {
            return Err(self.reject("restore"));
        }
        log::info!("restored baseline with {} known sets", known_sets.len());
        self.known_sets = known_sets;
        self.observation_counts = observation_counts;
        Ok(())
    }

    fn enter(&mut self, mode: TrustMode) {
        if self.mode != mode {
            log::info!("trust mode {} -> {}", self.mode, mode);
        }
        self.mode = mode;
    }

    fn reject(&self, call: &str) -> MarkerError {
        log::warn!(
            "{} {} while {}",
            ReasonCode::R401_TRANSITION_REJECTED.code(),
            call,
            self.mode
        );
        MarkerError::Rejected(ReasonCode::R401_TRANSITION_REJECTED)
    }

    /// Learn from one update of `id` (Setup only, otherwise ignored)
    ///
    /// `visible` maps every currently visible id to its pose. Ids within
    /// `distance_threshold_meters` (inclusive) join this id's known set.
    pub fn observe(&mut self, id: &str, pose: &Pose, visible: &BTreeMap<String, Pose>) {
        if self.mode != TrustMode::Setup {
            return;
        }
        *self.observation_counts.entry(id.to_string()).or_insert(0) += 1;

        let set = self.known_sets.entry(id.to_string()).or_default();
        set.insert(id.to_string());
        for (other, other_pose) in visible {
            if other != id && pose.distance_to(other_pose) <= self.distance_threshold_meters {
                set.insert(other.clone());
            }
        }
    }

    /// Rescore against `visible` (Gameplay only)
    ///
    /// Emits `TrustChanged` when the published value moves beyond the
    /// hysteresis band and `TrustLow` whenever it sits below the threshold.
    pub fn evaluate(&mut self, visible: &[String]) -> Vec<MarkerEvent> {
        if self.mode != TrustMode::Gameplay {
            return Vec::new();
        }
        let score = self.score(visible);
        self.last_score = Some(score);

        let mut events = Vec::new();
        if (score.trust - self.current_trust).abs() > self.trust_hysteresis {
            log::info!(
                "{} {:.3} -> {:.3}",
                ReasonCode::R301_TRUST_CHANGED.code(),
                self.current_trust,
                score.trust
            );
            self.current_trust = score.trust;
            events.push(MarkerEvent::TrustChanged {
                value: self.current_trust,
            });
        }
        if self.current_trust < self.trust_low_threshold {
            log::debug!(
                "{} {:.3} < {:.3}",
                ReasonCode::R302_TRUST_LOW.code(),
                self.current_trust,
                self.trust_low_threshold
            );
            events.push(MarkerEvent::TrustLow {
                value: self.current_trust,
            });
        }
        events
    }

    /// Pure trust computation for a visible id set
    pub fn score(&self, visible: &[String]) -> TrustScore {
        let visible: BTreeSet<&str> = visible.iter().map(String::as_str).collect();

        let eligible: Vec<&BTreeSet<String>> = self
            .known_sets
            .iter()
            .filter(|(id, _)| self.observation_count(id) >= self.min_observations_per_uuid)
            .map(|(_, set)| set)
            .collect();

        let union: BTreeSet<&str> = eligible
            .iter()
            .flat_map(|set| set.iter().map(String::as_str))
            .collect();

        let unknown_fraction = if visible.is_empty() {
            0.0
        } else {
            visible.difference(&union).count() as f64 / visible.len() as f64
        };

        if eligible.is_empty() {
            log::debug!("{}", ReasonCode::R303_NO_ELIGIBLE_SETS);
            return TrustScore {
                trust: 0.0,
                min_known_ratio: 0.0,
                unknown_fraction,
                eligible_sets: 0,
            };
        }

        let min_known_ratio = eligible
            .iter()
            .filter(|set| !set.is_empty())
            .map(|set| {
                let seen = set.iter().filter(|id| visible.contains(id.as_str())).count();
                seen as f64 / set.len() as f64
            })
            .fold(1.0, f64::min);

        let trust = min_known_ratio.min(1.0 - unknown_fraction).clamp(0.0, 1.0);
        TrustScore {
            trust,
            min_known_ratio,
            unknown_fraction,
            eligible_sets: eligible.len(),
        }
    }

    pub fn known_set(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.known_sets.get(id)
    }

    pub fn known_sets(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.known_sets
    }

    pub fn observation_count(&self, id: &str) -> u32 {
        self.observation_counts.get(id).copied().unwrap_or(0)
    }

    pub fn observation_counts(&self) -> &BTreeMap<String, u32> {
        &self.observation_counts
    }
}

// =============================================================================
// TESTS
// =============================================================================
