//! Pose aggregator: noisy samples in, one robust pose per marker out
//!
//! ScanThenLock collects every sample for `scan_duration`, then freezes an
//! IQR-filtered position and a mean orientation per id, all snapped to the
//! lowest computed height. LiveFollow places markers on detection and keeps
//! them on a smoothed pose built from the rolling history.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::core::robust::{average_orientation, blend_orientation, robust_position};
use crate::types::{
    AggregationMode, LockerState, MarkerEvent, Orientation, Pose, Position, ReasonCode,
    TrackerConfig,
};
use crate::MIN_SAMPLES_FOR_IQR;

/// One timestamped entry of a PoseHistory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub time: f64,
    pub pose: Pose,
}

/// Rolling window of the last `window` seconds of samples for one id
#[derive(Debug, Clone, PartialEq)]
pub struct PoseHistory {
    window: f64,
    samples: VecDeque<PoseSample>,
}

impl PoseHistory {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Append and purge everything older than `now - window`
    pub fn push(&mut self, now: f64, pose: Pose) {
        self.samples.push_back(PoseSample { time: now, pose });
        let cutoff = now - self.window;
        while let Some(front) = self.samples.front() {
            if front.time >= cutoff {
                break;
            }
            self.samples.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&PoseSample> {
        self.samples.back()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.samples.iter().map(|s| s.pose.position).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Owner of scan sets, histories and locked poses
#[derive(Debug)]
pub struct PoseAggregator {
    mode: AggregationMode,
    scan_duration: f64,
    history_seconds: f64,
    iqr_outlier_k: f64,
    orientation_blend: f64,
    min_locked_markers: usize,
    state: LockerState,
    /// ScanSampleSet per id, arrival order
    scan_sets: BTreeMap<String, Vec<Pose>>,
    history: HashMap<String, PoseHistory>,
    locked: BTreeMap<String, Pose>,
    /// LiveFollow placements
    placed: BTreeMap<String, Pose>,
    /// Last smoothed orientation per id (LiveFollow)
    smoothed: HashMap<String, Orientation>,
}

impl PoseAggregator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            mode: config.aggregation_mode,
            scan_duration: config.scan_duration,
            history_seconds: config.history_seconds,
            iqr_outlier_k: config.iqr_outlier_k,
            orientation_blend: config.orientation_blend,
            min_locked_markers: config.min_locked_markers,
            state: LockerState::Idle,
            scan_sets: BTreeMap::new(),
            history: HashMap::new(),
            locked: BTreeMap::new(),
            placed: BTreeMap::new(),
            smoothed: HashMap::new(),
        }
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn state(&self) -> LockerState {
        self.state
    }

    /// Clear every sample and pose, then open a scan window at `now`
    ///
    /// In LiveFollow there is no window: the aggregator is cleared and stays Idle.
    pub fn begin_collect(&mut self, now: f64) {
        self.clear();
        self.open_window(now);
    }

    /// Discard all partial scan sets at once and restart the window at `now`
    pub fn retry(&mut self, now: f64) {
        let discarded = self.scan_sets.len();
        self.scan_sets.clear();
        self.locked.clear();
        log::info!(
            "{} at {:.2}s ({} partial sets discarded)",
            ReasonCode::R204_SCAN_RESTARTED.code(),
            now,
            discarded
        );
        self.open_window(now);
    }

    /// Back to Idle with nothing learned
    pub fn reset(&mut self) {
        self.clear();
        self.state = LockerState::Idle;
    }

    fn clear(&mut self) {
        self.scan_sets.clear();
        self.history.clear();
        self.locked.clear();
        self.placed.clear();
        self.smoothed.clear();
    }

    fn open_window(&mut self, now: f64) {
        match self.mode {
            AggregationMode::ScanThenLock => {
                self.state = LockerState::Collecting { started_at: now };
                log::info!(
                    "{} at {:.2}s for {:.1}s",
                    ReasonCode::R201_SCAN_STARTED.code(),
                    now,
                    self.scan_duration
                );
            }
            AggregationMode::LiveFollow => {
                self.state = LockerState::Idle;
            }
        }
    }

    /// Record one accepted observation
    ///
    /// While collecting, the sample joins the id's scan set. In LiveFollow it
    /// extends the rolling history and a placed marker moves to its new
    /// smoothed pose.
    pub fn ingest(&mut self, now: f64, id: &str, pose: Pose) {
        if self.state.is_collecting() {
            self.scan_sets.entry(id.to_string()).or_default().push(pose);
        }

        if self.mode != AggregationMode::LiveFollow {
            return;
        }
        let window = self.history_seconds;
        self.history
            .entry(id.to_string())
            .or_insert_with(|| PoseHistory::new(window))
            .push(now, pose);

        if self.placed.contains_key(id) {
            let smoothed = self.live_pose(id, &pose);
            self.placed.insert(id.to_string(), smoothed);
        }
    }

    /// Drop the live state of a lost id: placement, smoothing and history
    ///
    /// Scan sets and locked poses are kept.
    pub fn forget(&mut self, id: &str) {
        if self.placed.remove(id).is_some() {
            log::debug!("{} placement dropped", id);
        }
        self.smoothed.remove(id);
        self.history.remove(id);
    }

    /// Close the scan window once its duration has elapsed
    pub fn tick(&mut self, now: f64) -> Vec<MarkerEvent> {
        match self.state {
            LockerState::Collecting { started_at } if now - started_at >= self.scan_duration => {
                self.finalize()
            }
            _ => Vec::new(),
        }
    }

    fn finalize(&mut self) -> Vec<MarkerEvent> {
        let scan_sets = std::mem::take(&mut self.scan_sets);
        let collected = scan_sets.values().filter(|s| !s.is_empty()).count();

        if collected < self.min_locked_markers {
            self.state = LockerState::Failed;
            log::warn!(
                "{} collected={} required={}",
                ReasonCode::R203_LOCK_FAILED.code(),
                collected,
                self.min_locked_markers
            );
            return vec![MarkerEvent::LockFailed { collected }];
        }

        let mut computed: BTreeMap<String, Pose> = BTreeMap::new();
        for (id, samples) in &scan_sets {
            let positions: Vec<Position> = samples.iter().map(|p| p.position).collect();
            let orientations: Vec<Orientation> = samples.iter().map(|p| p.orientation).collect();
            let (Some(position), Some(orientation)) = (
                robust_position(&positions, self.iqr_outlier_k),
                average_orientation(&orientations),
            ) else {
                continue;
            };
            computed.insert(id.clone(), Pose::new(position, orientation));
        }

        let floor = computed
            .values()
            .map(|p| p.height())
            .fold(f64::INFINITY, f64::min);

        let mut events = Vec::with_capacity(computed.len());
        for (id, mut pose) in computed {
            pose.position.y = floor;
            log::info!(
                "{} {} at {} from {} samples",
                ReasonCode::R202_POSE_LOCKED.code(),
                id,
                pose.describe(),
                scan_sets.get(&id).map(|s| s.len()).unwrap_or(0)
            );
            self.locked.insert(id.clone(), pose);
            events.push(MarkerEvent::Locked { id, pose });
        }

        self.state = LockerState::Locked;
        events
    }

    /// LiveFollow placement on detection
    pub fn place(&mut self, id: &str, pose: Pose) -> MarkerEvent {
        self.smoothed.insert(id.to_string(), pose.orientation);
        self.placed.insert(id.to_string(), pose);
        log::debug!("{} {} at {}", ReasonCode::R205_MARKER_PLACED.code(), id, pose.describe());
        MarkerEvent::Placed {
            id: id.to_string(),
            pose,
        }
    }

    /// Smoothed pose for `id` given its latest sample
    ///
    /// Position: robust mean over the rolling history, or `latest` below three
    /// samples. Orientation: slerp from the previous smoothed orientation
    /// toward `latest` by `orientation_blend`.
    pub fn live_pose(&mut self, id: &str, latest: &Pose) -> Pose {
        let position = self
            .history
            .get(id)
            .filter(|h| h.len() >= MIN_SAMPLES_FOR_IQR)
            .and_then(|h| robust_position(&h.positions(), self.iqr_outlier_k))
            .unwrap_or(latest.position);

        let previous = self
            .smoothed
            .get(id)
            .copied()
            .unwrap_or(latest.orientation);
        let orientation = blend_orientation(&previous, &latest.orientation, self.orientation_blend);
        self.smoothed.insert(id.to_string(), orientation);

        Pose::new(position, orientation)
    }

    /// Install previously locked poses (layout restore)
    pub fn restore(&mut self, locked: BTreeMap<String, Pose>) {
        self.clear();
        self.locked = locked;
        self.state = LockerState::Locked;
    }

    pub fn locked_pose(&self, id: &str) -> Option<&Pose> {
        self.locked.get(id)
    }

    pub fn locked_poses(&self) -> &BTreeMap<String, Pose> {
        &self.locked
    }

    pub fn locked_count(&self) -> usize {
        self.locked.len()
    }

    pub fn placed_pose(&self, id: &str) -> Option<&Pose> {
        self.placed.get(id)
    }

    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    /// Samples collected for `id` in the open scan window
    pub fn sample_count(&self, id: &str) -> usize {
        self.scan_sets.get(id).map(|s| s.len()).unwrap_or(0)
    }

    pub fn history(&self, id: &str) -> Option<&PoseHistory> {
        self.history.get(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
