//! Marker lifecycle tracker: debounced Detected/Lost events from a noisy frame stream
//!
//! Per tick:
//! - unseen id → tracked, Detected fires at once (no cooldown on first sighting)
//! - tracked id → pose refreshed, no re-fire
//! - tracked id absent for more than `lost_timeout` → Lost fires once, entry removed
//!
//! An id re-entering within `detection_cooldown` of its Lost is tracked but its
//! Detected waits until the cooldown has elapsed, so Detected and Lost always alternate.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{MarkerEvent, Observation, Pose, ReasonCode, TrackerConfig};

/// One currently-or-recently visible id
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedMarker {
    pub id: String,
    /// Tick time of the first sighting of this entry
    pub first_seen_time: f64,
    /// Tick time of the latest sighting
    pub last_seen_time: f64,
    pub last_pose: Pose,
    /// Source capture time of the latest sighting
    pub last_capture_time: f64,
    /// Detected has been emitted for this entry
    pub event_fired: bool,
}

/// A validated observation accepted this tick
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEntry {
    pub id: String,
    pub pose: Pose,
    pub capture_time: f64,
}

/// Debounce state machine owning every TrackedMarker
#[derive(Debug)]
pub struct MarkerLifecycleTracker {
    detection_cooldown: f64,
    lost_timeout: f64,
    tracked: HashMap<String, TrackedMarker>,
    /// Tick time of the most recent Lost per id
    last_lost: HashMap<String, f64>,
    /// Accepted observations of the latest tick, first-appearance order
    frame: Vec<FrameEntry>,
    detection_count: u64,
    dropped_observations: u64,
}

impl MarkerLifecycleTracker {
    pub fn new(detection_cooldown: f64, lost_timeout: f64) -> Self {
        Self {
            detection_cooldown,
            lost_timeout,
            tracked: HashMap::new(),
            last_lost: HashMap::new(),
            frame: Vec::new(),
            detection_count: 0,
            dropped_observations: 0,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.detection_cooldown, config.lost_timeout)
    }

    /// Ingest one tick of observations and return the resulting events
    ///
    /// Detection and loss are both evaluated against the same set of ids
    /// accepted this tick, so an id can never be lost and re-detected in one tick.
    pub fn tick(&mut self, now: f64, observations: &[Observation]) -> Vec<MarkerEvent> {
        let cooldown = self.detection_cooldown;
        self.last_lost.retain(|_, lost_at| now - *lost_at < cooldown);

        let frame = self.snapshot(observations);
        let mut events = Vec::new();

        for entry in &frame {
            if let Some(event) = self.observe(now, entry) {
                events.push(event);
            }
        }
        let observed: HashSet<&str> = frame.iter().map(|e| e.id.as_str()).collect();

        let mut expired: Vec<String> = self
            .tracked
            .values()
            .filter(|m| !observed.contains(m.id.as_str()))
            .filter(|m| now - m.last_seen_time > self.lost_timeout)
            .map(|m| m.id.clone())
            .collect();
        expired.sort();

        for id in expired {
            let Some(marker) = self.tracked.remove(&id) else {
                continue;
            };
            if marker.event_fired {
                log::info!(
                    "{} {} (last seen {:.2}s, now {:.2}s)",
                    ReasonCode::R103_MARKER_LOST.code(),
                    id,
                    marker.last_seen_time,
                    now
                );
                self.last_lost.insert(id.clone(), now);
                events.push(MarkerEvent::Lost { id });
            } else {
                log::debug!("{} dropped before its deferred detection fired", id);
            }
        }

        self.frame = frame;
        events
    }

    /// Validate and deduplicate one batch; last observation of an id wins
    fn snapshot(&mut self, observations: &[Observation]) -> Vec<FrameEntry> {
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, FrameEntry> = HashMap::new();

        for obs in observations {
            let Some(pose) = obs.pose() else {
                self.dropped_observations += 1;
                log::debug!(
                    "{} id={:?}",
                    ReasonCode::R104_OBSERVATION_DROPPED.code(),
                    obs.id
                );
                continue;
            };
            if !latest.contains_key(&obs.id) {
                order.push(obs.id.clone());
            }
            latest.insert(
                obs.id.clone(),
                FrameEntry {
                    id: obs.id.clone(),
                    pose,
                    capture_time: obs.timestamp,
                },
            );
        }

        order
            .into_iter()
            .filter_map(|id| latest.remove(&id))
            .collect()
    }

    /// Update or create the entry for one accepted observation
    fn observe(&mut self, now: f64, entry: &FrameEntry) -> Option<MarkerEvent> {
        let cooling = self.in_cooldown(&entry.id, now);

        match self.tracked.get_mut(&entry.id) {
            Some(marker) => {
                marker.last_seen_time = now;
                marker.last_pose = entry.pose;
                marker.last_capture_time = entry.capture_time;

                if marker.event_fired || cooling {
                    return None;
                }
                marker.event_fired = true;
            }
            None => {
                self.tracked.insert(
                    entry.id.clone(),
                    TrackedMarker {
                        id: entry.id.clone(),
                        first_seen_time: now,
                        last_seen_time: now,
                        last_pose: entry.pose,
                        last_capture_time: entry.capture_time,
                        event_fired: !cooling,
                    },
                );
                if cooling {
                    log::debug!(
                        "{} {} at {:.2}s",
                        ReasonCode::R102_DETECTION_DEFERRED.code(),
                        entry.id,
                        now
                    );
                    return None;
                }
            }
        }

        self.detection_count += 1;
        log::info!(
            "{} #{} {} at {}",
            ReasonCode::R101_MARKER_DETECTED.code(),
            self.detection_count,
            entry.id,
            entry.pose.describe()
        );
        Some(MarkerEvent::Detected {
            id: entry.id.clone(),
            pose: entry.pose,
        })
    }

    fn in_cooldown(&self, id: &str, now: f64) -> bool {
        self.last_lost
            .get(id)
            .map(|lost_at| now - lost_at < self.detection_cooldown)
            .unwrap_or(false)
    }

    /// Accepted observations of the latest tick
    pub fn last_frame(&self) -> &[FrameEntry] {
        &self.frame
    }

    /// Is this id visible (tracked with Detected fired)?
    pub fn is_visible(&self, id: &str) -> bool {
        self.tracked.get(id).map(|m| m.event_fired).unwrap_or(false)
    }

    /// Visible ids in sorted order
    pub fn visible_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .tracked
            .values()
            .filter(|m| m.event_fired)
            .map(|m| m.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Last known pose of every visible id
    pub fn visible_poses(&self) -> BTreeMap<String, Pose> {
        self.tracked
            .values()
            .filter(|m| m.event_fired)
            .map(|m| (m.id.clone(), m.last_pose))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&TrackedMarker> {
        self.tracked.get(id)
    }

    /// Number of tracked entries, including deferred ones
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Ids whose re-detection is still held back by the cooldown
    pub fn cooling_count(&self) -> usize {
        self.last_lost.len()
    }

    /// Total Detected events emitted
    pub fn detection_count(&self) -> u64 {
        self.detection_count
    }

    pub fn dropped_observations(&self) -> u64 {
        self.dropped_observations
    }

    /// Forget every entry without emitting events
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.last_lost.clear();
        self.frame.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
