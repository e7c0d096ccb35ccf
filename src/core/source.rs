//! Observation sources and the driver that feeds them to a session

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::session::MarkerSession;
use crate::types::{MarkerError, ObservationBatch, TickOutput};

/// Supplier of one observation batch per tick; None once exhausted
pub trait ObservationSource {
    fn next_batch(&mut self) -> Option<ObservationBatch>;
}

/// In-memory batches, yielded in order
#[derive(Debug, Default)]
pub struct VecSource {
    batches: VecDeque<ObservationBatch>,
}

impl VecSource {
    pub fn new(batches: Vec<ObservationBatch>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl ObservationSource for VecSource {
    fn next_batch(&mut self) -> Option<ObservationBatch> {
        self.batches.pop_front()
    }
}

/// JSON-lines log, one `ObservationBatch` per line
///
/// Blank lines are ignored; lines that fail to parse are skipped with a warning.
pub struct ReplaySource {
    reader: Box<dyn BufRead>,
    line_number: usize,
    skipped: usize,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MarkerError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader(reader: impl BufRead + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            line_number: 0,
            skipped: 0,
        }
    }

    /// Lines skipped so far because they did not parse
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl ObservationSource for ReplaySource {
    fn next_batch(&mut self) -> Option<ObservationBatch> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("replay read failed after line {}: {}", self.line_number, e);
                    return None;
                }
            }
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<ObservationBatch>(trimmed) {
                Ok(batch) => return Some(batch),
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("skipping replay line {}: {}", self.line_number, e);
                }
            }
        }
    }
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("line_number", &self.line_number)
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// Pulls batches from a source and ticks the session with them
///
/// Started without a source, the driver reports the fault once and then
/// stays disabled instead of failing on every step.
pub struct SessionDriver {
    session: MarkerSession,
    source: Option<Box<dyn ObservationSource>>,
    disabled: bool,
    ticks: u64,
}

impl SessionDriver {
    pub fn new(session: MarkerSession, source: Option<Box<dyn ObservationSource>>) -> Self {
        Self {
            session,
            source,
            disabled: false,
            ticks: 0,
        }
    }

    /// Error if no source is attached
    pub fn ensure_source(&self) -> Result<(), MarkerError> {
        match self.source {
            Some(_) => Ok(()),
            None => Err(MarkerError::SourceMissing),
        }
    }

    /// Run one tick; None when disabled or the source is exhausted
    pub fn step(&mut self) -> Option<TickOutput> {
        if self.disabled {
            return None;
        }
        if let Err(e) = self.ensure_source() {
            log::error!("{}: {}, driver disabled", e.reason().code(), e);
            self.disabled = true;
            return None;
        }

        let batch = self.source.as_mut()?.next_batch()?;
        self.ticks += 1;
        Some(self.session.tick(batch.time, &batch.observations))
    }

    /// Step until the source runs dry, handing every output to `on_tick`
    pub fn run(&mut self, mut on_tick: impl FnMut(&TickOutput)) -> u64 {
        let start = self.ticks;
        while let Some(output) = self.step() {
            on_tick(&output);
        }
        self.ticks - start
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn session(&self) -> &MarkerSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MarkerSession {
        &mut self.session
    }

    pub fn into_session(self) -> MarkerSession {
        self.session
    }
}

// =============================================================================
// TESTS
// =============================================================================
