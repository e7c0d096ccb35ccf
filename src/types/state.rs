//! Mode definitions for the trust monitor and the pose locker

use serde::{Deserialize, Serialize};

/// The three modes of the trust monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustMode {
    /// Nothing learned, nothing scored
    #[default]
    Idle,
    /// Learning co-visibility neighborhoods
    Setup,
    /// Known sets frozen, trust recomputed every tick
    Gameplay,
}

impl TrustMode {
    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            TrustMode::Idle => "\x1b[90m",     // Gray
            TrustMode::Setup => "\x1b[33m",    // Yellow
            TrustMode::Gameplay => "\x1b[32m", // Green
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            TrustMode::Idle => "⏳",
            TrustMode::Setup => "🔶",
            TrustMode::Gameplay => "🎯",
        }
    }
}

impl std::fmt::Display for TrustMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrustMode::Idle => "IDLE",
            TrustMode::Setup => "SETUP",
            TrustMode::Gameplay => "GAMEPLAY",
        };
        write!(f, "{}", name)
    }
}

/// Scan-then-lock progress of the pose aggregator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockerState {
    /// No scan window open
    #[default]
    Idle,
    /// Accumulating samples since `started_at`
    Collecting { started_at: f64 },
    /// Poses frozen
    Locked,
    /// Window closed with too few markers
    Failed,
}

impl LockerState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockerState::Locked)
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self, LockerState::Collecting { .. })
    }
}

impl std::fmt::Display for LockerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockerState::Idle => write!(f, "IDLE"),
            LockerState::Collecting { started_at } => write!(f, "COLLECTING(since {:.2}s)", started_at),
            LockerState::Locked => write!(f, "LOCKED"),
            LockerState::Failed => write!(f, "FAILED"),
        }
    }
}

/// How observed poses become marker placements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Collect for a fixed window, then freeze robust poses
    #[default]
    ScanThenLock,
    /// Place on detection and follow with smoothing
    LiveFollow,
}
