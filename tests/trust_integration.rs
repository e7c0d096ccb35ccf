//! Integration tests for the trust monitor
//!
//! Scoring examples, mode transitions and the level-triggered low signal

use approx::assert_relative_eq;
use markerlock::core::TrustMonitor;
use markerlock::types::{MarkerEvent, Pose, ReasonCode, TrackerConfig, TrustMode};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Learn a layout where every listed id sits within reach of every other
fn learn_cluster(monitor: &mut TrustMonitor, list: &[&str], rounds: usize) {
    let visible: BTreeMap<String, Pose> = list
        .iter()
        .enumerate()
        .map(|(i, id)| (id.to_string(), Pose::at(0.01 * i as f64, 0.0, 0.0)))
        .collect();
    for _ in 0..rounds {
        for (id, pose) in &visible {
            monitor.observe(id, pose, &visible);
        }
    }
}

#[test]
fn test_partial_known_set_scores_two_thirds() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A", "B", "C"], 3);

    let events = monitor.begin_gameplay(&ids(&["A", "B"])).unwrap();
    let score = monitor.last_score().copied().unwrap();

    assert_relative_eq!(score.min_known_ratio, 2.0 / 3.0);
    assert_relative_eq!(score.unknown_fraction, 0.0);
    assert_relative_eq!(monitor.current_trust(), 2.0 / 3.0);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "TrustChanged");
}

#[test]
fn test_unknown_id_caps_trust() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A"], 5);

    let score = monitor.score(&ids(&["A", "X"]));
    assert_relative_eq!(score.min_known_ratio, 1.0);
    assert_relative_eq!(score.unknown_fraction, 0.5);
    assert_relative_eq!(score.trust, 0.5);

    // a weaker known ratio still wins when it is lower
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A", "B", "C"], 3);
    let score = monitor.score(&ids(&["A", "X"]));
    assert_relative_eq!(score.unknown_fraction, 0.5);
    assert_relative_eq!(score.trust, 1.0 / 3.0);
}

#[test]
fn test_pessimistic_aggregation_over_neighborhoods() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();

    // two separate clusters, far apart
    let mut visible = BTreeMap::new();
    visible.insert("A".to_string(), Pose::at(0.0, 0.0, 0.0));
    visible.insert("B".to_string(), Pose::at(0.5, 0.0, 0.0));
    visible.insert("C".to_string(), Pose::at(10.0, 0.0, 0.0));
    visible.insert("D".to_string(), Pose::at(10.5, 0.0, 0.0));
    for _ in 0..3 {
        for (id, pose) in &visible {
            monitor.observe(id, pose, &visible);
        }
    }

    let score = monitor.score(&ids(&["A", "B", "C"]));
    assert_eq!(score.eligible_sets, 4);
    assert_relative_eq!(score.min_known_ratio, 0.5);
    assert_relative_eq!(score.trust, 0.5);
}

#[test]
fn test_ineligible_sets_are_ignored() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A", "B"], 3);

    // Z seen only twice: below the eligibility threshold
    let mut visible = BTreeMap::new();
    visible.insert("Z".to_string(), Pose::at(50.0, 0.0, 0.0));
    for _ in 0..2 {
        monitor.observe("Z", &Pose::at(50.0, 0.0, 0.0), &visible);
    }

    let score = monitor.score(&ids(&["A", "B"]));
    assert_eq!(score.eligible_sets, 2);
    assert_relative_eq!(score.trust, 1.0);
}

#[test]
fn test_reset_then_setup_twice_is_idempotent() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A", "B"], 4);
    monitor.begin_gameplay(&ids(&["A"])).unwrap();

    monitor.reset();
    monitor.begin_setup().unwrap();
    let first = (monitor.known_sets().clone(), monitor.current_trust());
    monitor.begin_setup().unwrap();
    let second = (monitor.known_sets().clone(), monitor.current_trust());

    assert_eq!(first, second);
    assert!(second.0.is_empty());
    assert_eq!(second.1, 1.0);
    assert_eq!(monitor.mode(), TrustMode::Setup);
}

#[test]
fn test_gameplay_to_setup_rejected() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A"], 3);
    monitor.begin_gameplay(&ids(&["A"])).unwrap();

    let err = monitor.begin_setup().unwrap_err();
    assert_eq!(err.reason(), ReasonCode::R401_TRANSITION_REJECTED);
    assert_eq!(monitor.known_sets().len(), 1);
    assert_eq!(monitor.mode(), TrustMode::Gameplay);
}

#[test]
fn test_known_sets_frozen_in_gameplay() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A"], 3);
    monitor.begin_gameplay(&ids(&["A"])).unwrap();

    learn_cluster(&mut monitor, &["A", "B"], 10);
    assert_eq!(monitor.known_set("A").map(|s| s.len()), Some(1));
    assert_eq!(monitor.observation_count("A"), 3);
}

#[test]
fn test_low_trust_signal_is_level_triggered() {
    let mut monitor = TrustMonitor::new(&TrackerConfig::default());
    monitor.begin_setup().unwrap();
    learn_cluster(&mut monitor, &["A", "B", "C", "D"], 3);
    monitor.begin_gameplay(&ids(&["A", "B", "C", "D"])).unwrap();

    let mut low = 0;
    for _ in 0..5 {
        low += monitor
            .evaluate(&ids(&["A"]))
            .iter()
            .filter(|e| matches!(e, MarkerEvent::TrustLow { .. }))
            .count();
    }
    assert_eq!(low, 5);

    let recovered = monitor.evaluate(&ids(&["A", "B", "C", "D"]));
    assert_eq!(recovered, vec![MarkerEvent::TrustChanged { value: 1.0 }]);
}

#[test]
fn test_jitter_inside_band_publishes_nothing() {
    let config = TrackerConfig {
        trust_hysteresis: 0.05,
        ..TrackerConfig::default()
    };
    let mut monitor = TrustMonitor::new(&config);
    monitor.begin_setup().unwrap();
    let cluster: Vec<String> = (0..30).map(|i| format!("M{:02}", i)).collect();
    let names: Vec<&str> = cluster.iter().map(String::as_str).collect();
    learn_cluster(&mut monitor, &names, 3);
    monitor.begin_gameplay(&cluster).unwrap();

    // one of thirty missing: 29/30 is within 0.05 of 1.0
    let events = monitor.evaluate(&cluster[1..]);
    assert!(events.is_empty());
    assert_eq!(monitor.current_trust(), 1.0);
}
