//! Output structures for terminal display and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LockerState, MarkerEvent, TrustMode};

/// Result of one tick of the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickOutput {
    /// Wall-clock stamp
    pub timestamp: DateTime<Utc>,
    /// Logical tick time (seconds)
    pub time: f64,
    /// Events finalized during this tick, in pipeline order
    pub events: Vec<MarkerEvent>,
    /// Published trust after this tick
    pub trust: f64,
    pub trust_mode: TrustMode,
    pub locker_state: LockerState,
    /// Ids currently visible per the lifecycle tracker
    pub visible_count: usize,
    pub locked_count: usize,
}

impl TickOutput {
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.trust_mode.color_code();
        let reset = TrustMode::color_reset();
        let emoji = self.trust_mode.emoji();

        let mut out = format!(
            "{}{} t={:.2}s | mode={} | locker={} | trust={:.3} | visible={} | locked={}{}",
            color,
            emoji,
            self.time,
            self.trust_mode,
            self.locker_state,
            self.trust,
            self.visible_count,
            self.locked_count,
            reset
        );
        for event in &self.events {
            out.push_str(&format!("\n  {}└─ {}{}", event_color(event), event, reset));
        }
        out
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        let events: Vec<String> = self.events.iter().map(|e| e.to_string()).collect();
        format!(
            "t={:.3} | mode={} | locker={} | trust={:.3} | visible={} | locked={} | events=[{}]",
            self.time,
            self.trust_mode,
            self.locker_state,
            self.trust,
            self.visible_count,
            self.locked_count,
            events.join("; ")
        )
    }
}

fn event_color(event: &MarkerEvent) -> &'static str {
    match event {
        MarkerEvent::Detected { .. } | MarkerEvent::Placed { .. } => "\x1b[36m", // Cyan
        MarkerEvent::Locked { .. } | MarkerEvent::HitSuccess { .. } => "\x1b[32m", // Green
        MarkerEvent::Lost { .. } | MarkerEvent::TrustChanged { .. } => "\x1b[90m", // Gray
        MarkerEvent::LockFailed { .. } | MarkerEvent::TrustLow { .. } => "\x1b[31m", // Red
    }
}
