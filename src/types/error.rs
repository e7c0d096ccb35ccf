//! Error type for fallible control, configuration and persistence calls

use crate::types::ReasonCode;

#[derive(thiserror::Error, Debug)]
pub enum MarkerError {
    /// Control call refused by a state machine
    #[error("{0}")]
    Rejected(ReasonCode),
    #[error("invalid config field `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("observation source missing")]
    SourceMissing,
    #[error("snapshot: {0}")]
    Snapshot(ReasonCode),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MarkerError {
    /// Reason code for logs and API responses
    pub fn reason(&self) -> ReasonCode {
        match self {
            Self::Rejected(code) | Self::Snapshot(code) => *code,
            Self::InvalidConfig { .. } => ReasonCode::R402_CONFIG_INVALID,
            Self::SourceMissing => ReasonCode::R403_SOURCE_MISSING,
            Self::Io(_) | Self::Json(_) => ReasonCode::R502_SNAPSHOT_IO_FAILED,
        }
    }
}
