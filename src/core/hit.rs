//! Hit detection: a Lost event on an engaged marker is a hit

use std::collections::BTreeSet;

use crate::types::{MarkerEvent, ReasonCode};

/// Maps losses of engaged markers to `HitSuccess`
///
/// Debouncing is left entirely to the lifecycle tracker, which already
/// guarantees one Lost per disappearance.
#[derive(Debug, Default)]
pub struct HitDetectionPipeline {
    engaged: BTreeSet<String>,
    total_hits: u64,
    last_hit_time: Option<f64>,
}

impl HitDetectionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as having an in-play target; true if newly engaged
    pub fn engage(&mut self, id: &str) -> bool {
        self.engaged.insert(id.to_string())
    }

    pub fn disengage(&mut self, id: &str) -> bool {
        self.engaged.remove(id)
    }

    pub fn is_engaged(&self, id: &str) -> bool {
        self.engaged.contains(id)
    }

    pub fn engaged_ids(&self) -> impl Iterator<Item = &str> {
        self.engaged.iter().map(String::as_str)
    }

    /// Handle one Lost event
    pub fn on_lost(&mut self, now: f64, id: &str) -> Option<MarkerEvent> {
        if !self.engaged.remove(id) {
            return None;
        }
        self.total_hits += 1;
        self.last_hit_time = Some(now);
        log::info!(
            "{} {} (hit #{} at {:.2}s)",
            ReasonCode::R304_HIT_SUCCESS.code(),
            id,
            self.total_hits,
            now
        );
        Some(MarkerEvent::HitSuccess { id: id.to_string() })
    }

    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    pub fn last_hit_time(&self) -> Option<f64> {
        self.last_hit_time
    }

    pub fn reset_statistics(&mut self) {
        self.total_hits = 0;
        self.last_hit_time = None;
    }

    /// Drop every engagement
    pub fn clear(&mut self) {
        self.engaged.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unengaged_loss_is_not_a_hit() {
        let mut hits = HitDetectionPipeline::new();
        assert_eq!(hits.on_lost(1.0, "A"), None);
        assert_eq!(hits.total_hits(), 0);
    }

    #[test]
    fn test_engaged_loss_hits_once() {
        let mut hits = HitDetectionPipeline::new();
        assert!(hits.engage("A"));
        assert!(!hits.engage("A"));

        assert_eq!(
            hits.on_lost(2.5, "A"),
            Some(MarkerEvent::HitSuccess { id: "A".to_string() })
        );
        assert!(!hits.is_engaged("A"));
        assert_eq!(hits.on_lost(3.0, "A"), None);
        assert_eq!(hits.total_hits(), 1);
        assert_eq!(hits.last_hit_time(), Some(2.5));
    }

    #[test]
    fn test_reset_statistics_keeps_engagements() {
        let mut hits = HitDetectionPipeline::new();
        hits.engage("A");
        hits.engage("B");
        hits.on_lost(1.0, "A");
        hits.reset_statistics();

        assert_eq!(hits.total_hits(), 0);
        assert_eq!(hits.last_hit_time(), None);
        assert_eq!(hits.engaged_ids().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_disengage() {
        let mut hits = HitDetectionPipeline::new();
        hits.engage("A");
        assert!(hits.disengage("A"));
        assert_eq!(hits.on_lost(1.0, "A"), None);
    }
}
