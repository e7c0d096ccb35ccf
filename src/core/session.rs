//! One tracking session: owns every subsystem and runs the tick pipeline
//!
//! Per tick, in order:
//! 1. lifecycle tracker → Detected / Lost
//! 2. hits on Lost, re-engagement on Detected
//! 3. aggregator ingestion, LiveFollow placement (each placement is a target)
//! 4. trust learning (Setup) from visible ids only
//! 5. scan window timer → Locked / LockFailed, engagement of locked ids
//! 6. pending auto-retry
//! 7. auto-gameplay gate
//! 8. trust scoring (Gameplay)
//!
//! Observers only see the tick's events once all eight steps are done.

use chrono::Utc;

use crate::core::aggregator::PoseAggregator;
use crate::core::events::{EventBus, EventObserver};
use crate::core::hit::HitDetectionPipeline;
use crate::core::lifecycle::MarkerLifecycleTracker;
use crate::core::trust::TrustMonitor;
use crate::types::{
    AggregationMode, LayoutSnapshot, LockerState, MarkerError, MarkerEvent, Observation,
    TickOutput, TrackerConfig, TrustMode,
};

#[derive(Debug)]
pub struct MarkerSession {
    config: TrackerConfig,
    tracker: MarkerLifecycleTracker,
    aggregator: PoseAggregator,
    trust: TrustMonitor,
    hits: HitDetectionPipeline,
    bus: EventBus,
    /// Tick time at which a failed scan restarts
    retry_at: Option<f64>,
}

impl MarkerSession {
    pub fn new(config: TrackerConfig) -> Result<Self, MarkerError> {
        config.validate()?;
        Ok(Self {
            tracker: MarkerLifecycleTracker::from_config(&config),
            aggregator: PoseAggregator::new(&config),
            trust: TrustMonitor::new(&config),
            hits: HitDetectionPipeline::new(),
            bus: EventBus::new(),
            retry_at: None,
            config,
        })
    }

    /// Register an observer for every event published from now on
    pub fn subscribe(&mut self, observer: Box<dyn EventObserver>) {
        self.bus.subscribe(observer);
    }

    /// Advance the session to `now` with this tick's observations
    pub fn tick(&mut self, now: f64, observations: &[Observation]) -> TickOutput {
        let mut events = self.tracker.tick(now, observations);

        let mut followups = Vec::new();
        for event in &events {
            match event {
                MarkerEvent::Lost { id } => {
                    if let Some(hit) = self.hits.on_lost(now, id) {
                        followups.push(hit);
                    }
                    self.aggregator.forget(id);
                }
                MarkerEvent::Detected { id, .. } => {
                    let has_target = self.aggregator.locked_pose(id).is_some()
                        || self.aggregator.placed_pose(id).is_some();
                    if self.config.respawn_on_redetect && has_target && self.hits.engage(id) {
                        log::info!("{} re-engaged on detection", id);
                    }
                }
                _ => {}
            }
        }
        events.extend(followups);

        let frame = self.tracker.last_frame().to_vec();
        for entry in &frame {
            self.aggregator.ingest(now, &entry.id, entry.pose);
        }
        if self.aggregator.mode() == AggregationMode::LiveFollow {
            let detected: Vec<MarkerEvent> = events
                .iter()
                .filter_map(|e| match e {
                    MarkerEvent::Detected { id, pose } => {
                        self.hits.engage(id);
                        Some(self.aggregator.place(id, *pose))
                    }
                    _ => None,
                })
                .collect();
            events.extend(detected);
        }

        let visible = self.tracker.visible_poses();
        for entry in frame.iter().filter(|e| visible.contains_key(&e.id)) {
            self.trust.observe(&entry.id, &entry.pose, &visible);
        }

        for event in self.aggregator.tick(now) {
            match &event {
                MarkerEvent::Locked { id, .. } => {
                    self.hits.engage(id);
                }
                MarkerEvent::LockFailed { .. } if self.config.auto_retry_on_fail => {
                    let at = now + self.config.retry_delay_seconds;
                    log::info!("scan retry scheduled at {:.2}s", at);
                    self.retry_at = Some(at);
                }
                _ => {}
            }
            events.push(event);
        }

        if let Some(at) = self.retry_at {
            if now >= at {
                self.retry_at = None;
                if let Err(e) = self.retry(now) {
                    log::warn!("scheduled retry skipped: {}", e);
                }
            }
        }

        let visible_ids = self.tracker.visible_ids();
        if self.should_begin_gameplay() {
            match self.trust.begin_gameplay(&visible_ids) {
                Ok(trust_events) => events.extend(trust_events),
                Err(e) => log::warn!("auto gameplay skipped: {}", e),
            }
        } else {
            events.extend(self.trust.evaluate(&visible_ids));
        }

        self.bus.publish(&events);

        TickOutput {
            timestamp: Utc::now(),
            time: now,
            events,
            trust: self.trust.current_trust(),
            trust_mode: self.trust.mode(),
            locker_state: self.aggregator.state(),
            visible_count: visible_ids.len(),
            locked_count: self.aggregator.locked_count(),
        }
    }

    fn should_begin_gameplay(&self) -> bool {
        self.config.auto_begin_gameplay
            && self.trust.mode() == TrustMode::Setup
            && self.aggregator.state().is_locked()
            && self.trust.current_trust() >= self.config.trust_low_threshold
    }

    // =========================================================================
    // Control surface
    // =========================================================================

    /// Start learning: open a scan window and restart the trust baseline
    pub fn begin_setup(&mut self, now: f64) -> Result<(), MarkerError> {
        self.trust.begin_setup()?;
        self.begin_collect(now);
        Ok(())
    }

    /// Open a fresh scan window, dropping every previous pose
    pub fn begin_collect(&mut self, now: f64) {
        self.aggregator.begin_collect(now);
        self.hits.clear();
        self.retry_at = None;
    }

    /// Freeze the baseline and start scoring
    pub fn begin_gameplay(&mut self) -> Result<Vec<MarkerEvent>, MarkerError> {
        let visible = self.tracker.visible_ids();
        let events = self.trust.begin_gameplay(&visible)?;
        self.bus.publish(&events);
        Ok(events)
    }

    /// Restart a failed (or unwanted) collection together with the trust setup
    pub fn retry(&mut self, now: f64) -> Result<(), MarkerError> {
        self.trust.begin_setup()?;
        self.aggregator.retry(now);
        self.hits.clear();
        self.retry_at = None;
        Ok(())
    }

    /// Return every subsystem to Idle with nothing learned
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.aggregator.reset();
        self.trust.reset();
        self.hits.clear();
        self.hits.reset_statistics();
        self.retry_at = None;
        log::info!("session reset");
    }

    /// Install a persisted layout: locked poses plus trust baseline
    pub fn restore_layout(&mut self, snapshot: &LayoutSnapshot) -> Result<(), MarkerError> {
        self.trust.begin_setup()?;
        self.trust.restore(
            snapshot.known_sets.clone(),
            snapshot.observation_counts.clone(),
        )?;
        self.aggregator.restore(snapshot.locked.clone());
        self.hits.clear();
        for id in snapshot.locked.keys() {
            self.hits.engage(id);
        }
        self.retry_at = None;
        log::info!(
            "layout {} restored with {} markers",
            snapshot.id,
            snapshot.marker_count()
        );
        Ok(())
    }

    // =========================================================================
    // Read access
    // =========================================================================

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn tracker(&self) -> &MarkerLifecycleTracker {
        &self.tracker
    }

    pub fn aggregator(&self) -> &PoseAggregator {
        &self.aggregator
    }

    pub fn trust(&self) -> &TrustMonitor {
        &self.trust
    }

    pub fn hits(&self) -> &HitDetectionPipeline {
        &self.hits
    }

    pub fn trust_mode(&self) -> TrustMode {
        self.trust.mode()
    }

    pub fn locker_state(&self) -> LockerState {
        self.aggregator.state()
    }

    pub fn current_trust(&self) -> f64 {
        self.trust.current_trust()
    }

    pub fn pending_retry(&self) -> Option<f64> {
        self.retry_at
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::core::events::ChannelObserver;

    fn config() -> TrackerConfig {
        TrackerConfig {
            scan_duration: 1.0,
            ..TrackerConfig::default()
        }
    }

    fn obs(id: &str, x: f64, t: f64) -> Observation {
        Observation::at(id, x, 0.0, 0.0, t)
    }

    fn kinds(output: &TickOutput) -> Vec<&'static str> {
        output.events.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = TrackerConfig {
            lost_timeout: 0.0,
            ..TrackerConfig::default()
        };
        let err = MarkerSession::new(bad).unwrap_err();
        assert!(matches!(err, MarkerError::InvalidConfig { field: "lost_timeout", .. }));
    }

    #[test]
    fn test_scan_locks_and_enters_gameplay() {
        let mut session = MarkerSession::new(config()).unwrap();
        session.begin_setup(0.0).unwrap();

        let mut last = None;
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            last = Some(session.tick(t, &[obs("A", 0.0, t), obs("B", 0.5, t)]));
        }
        let last = last.unwrap();

        assert_eq!(kinds(&last), vec!["Locked", "Locked"]);
        assert_eq!(last.locker_state, LockerState::Locked);
        assert_eq!(last.trust_mode, TrustMode::Gameplay);
        assert_eq!(last.trust, 1.0);
        assert!(session.hits().is_engaged("A"));
    }

    #[test]
    fn test_manual_gameplay_when_auto_disabled() {
        let config = TrackerConfig {
            auto_begin_gameplay: false,
            ..config()
        };
        let mut session = MarkerSession::new(config).unwrap();
        session.begin_setup(0.0).unwrap();
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            session.tick(t, &[obs("A", 0.0, t)]);
        }
        assert_eq!(session.trust_mode(), TrustMode::Setup);
        session.begin_gameplay().unwrap();
        assert_eq!(session.trust_mode(), TrustMode::Gameplay);
    }

    #[test]
    fn test_lost_locked_marker_is_a_hit() {
        let mut session = MarkerSession::new(config()).unwrap();
        session.begin_setup(0.0).unwrap();
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            session.tick(t, &[obs("A", 0.0, t)]);
        }

        let mut hit_events = Vec::new();
        for i in 11..=25 {
            let out = session.tick(i as f64 / 10.0, &[]);
            hit_events.extend(out.events.into_iter().filter(|e| e.kind() == "HitSuccess"));
        }
        assert_eq!(hit_events, vec![MarkerEvent::HitSuccess { id: "A".to_string() }]);
        assert_eq!(session.hits().total_hits(), 1);
        assert!(!session.hits().is_engaged("A"));

        // detected again after the cooldown: target respawns
        session.tick(3.0, &[obs("A", 0.0, 3.0)]);
        assert!(session.hits().is_engaged("A"));
    }

    #[test]
    fn test_failed_scan_retries_after_delay() {
        let mut session = MarkerSession::new(config()).unwrap();
        session.begin_setup(0.0).unwrap();

        let out = session.tick(1.0, &[]);
        assert_eq!(kinds(&out), vec!["LockFailed"]);
        assert_eq!(session.pending_retry(), Some(3.0));

        session.tick(2.0, &[]);
        assert_eq!(session.locker_state(), LockerState::Failed);

        session.tick(3.0, &[]);
        assert_eq!(session.locker_state(), LockerState::Collecting { started_at: 3.0 });
        assert_eq!(session.pending_retry(), None);
    }

    #[test]
    fn test_no_retry_when_disabled() {
        let config = TrackerConfig {
            auto_retry_on_fail: false,
            ..config()
        };
        let mut session = MarkerSession::new(config).unwrap();
        session.begin_setup(0.0).unwrap();
        session.tick(1.0, &[]);
        session.tick(10.0, &[]);
        assert_eq!(session.locker_state(), LockerState::Failed);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut session = MarkerSession::new(config()).unwrap();
        session.begin_setup(0.0).unwrap();
        session.tick(0.0, &[obs("A", 0.0, 0.0)]);
        session.reset();

        assert_eq!(session.trust_mode(), TrustMode::Idle);
        assert_eq!(session.locker_state(), LockerState::Idle);
        assert_eq!(session.tracker().tracked_count(), 0);
        assert_eq!(session.current_trust(), 1.0);
        assert!(session.begin_gameplay().is_err());
    }

    #[test]
    fn test_retry_rejected_during_gameplay() {
        let mut session = MarkerSession::new(config()).unwrap();
        session.begin_setup(0.0).unwrap();
        session.begin_gameplay().unwrap();
        assert!(session.retry(1.0).is_err());
        assert!(session.begin_setup(1.0).is_err());
    }

    #[test]
    fn test_live_follow_places_on_detection() {
        let config = TrackerConfig {
            aggregation_mode: AggregationMode::LiveFollow,
            ..config()
        };
        let mut session = MarkerSession::new(config).unwrap();
        session.begin_setup(0.0).unwrap();
        let out = session.tick(0.0, &[obs("A", 2.0, 0.0)]);
        assert_eq!(kinds(&out), vec!["Detected", "Placed"]);
        assert_eq!(session.aggregator().placed_count(), 1);
    }

    #[test]
    fn test_live_follow_loss_is_a_hit_and_respawns() {
        let config = TrackerConfig {
            aggregation_mode: AggregationMode::LiveFollow,
            ..config()
        };
        let mut session = MarkerSession::new(config).unwrap();
        session.begin_setup(0.0).unwrap();

        let mut all = Vec::new();
        for i in 0..=30 {
            let t = i as f64 / 10.0;
            let frame = if i <= 5 { vec![obs("A", 1.0, t)] } else { vec![] };
            let out = session.tick(t, &frame);
            all.extend(out.events.into_iter().filter(|e| e.id() == Some("A")));
        }
        let sequence: Vec<&str> = all.iter().map(|e| e.kind()).collect();
        assert_eq!(sequence, vec!["Detected", "Placed", "Lost", "HitSuccess"]);
        assert_eq!(session.hits().total_hits(), 1);
        assert!(!session.hits().is_engaged("A"));
        assert!(session.aggregator().placed_pose("A").is_none());

        let out = session.tick(3.1, &[obs("A", 1.5, 3.1)]);
        assert_eq!(kinds(&out), vec!["Detected", "Placed"]);
        assert!(session.hits().is_engaged("A"));
    }

    #[test]
    fn test_deferred_ids_do_not_feed_trust() {
        let config = TrackerConfig {
            scan_duration: 10.0,
            ..TrackerConfig::default()
        };
        let mut session = MarkerSession::new(config).unwrap();
        session.begin_setup(0.0).unwrap();

        session.tick(0.0, &[obs("A", 0.0, 0.0)]);
        session.tick(1.1, &[]);
        assert_eq!(session.trust().observation_count("A"), 1);

        // back within the cooldown: tracked but not yet visible
        session.tick(1.2, &[obs("A", 0.0, 1.2)]);
        session.tick(1.3, &[obs("A", 0.0, 1.3)]);
        assert!(!session.tracker().is_visible("A"));
        assert_eq!(session.trust().observation_count("A"), 1);

        session.tick(1.7, &[obs("A", 0.0, 1.7)]);
        assert!(session.tracker().is_visible("A"));
        assert_eq!(session.trust().observation_count("A"), 2);
    }

    #[test]
    fn test_observers_receive_tick_events() {
        let (tx, rx) = mpsc::channel();
        let mut session = MarkerSession::new(config()).unwrap();
        session.subscribe(Box::new(ChannelObserver::new(tx)));

        session.tick(0.0, &[obs("A", 0.0, 0.0)]);
        let received: Vec<MarkerEvent> = rx.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind(), "Detected");
    }
}
