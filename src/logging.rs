// src/logging.rs
//
// Telemetry sinks for rollout harnesses.
// - EpisodeSink: trait used by rollout drivers
// - NoopSink:    discards all records
// - FileSink:    writes one JSON line per transition for offline analysis
//
// The environment itself never logs; sinks are wired up by the callers
// that drive episodes.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use serde::{Deserialize, Serialize};

/// One environment transition, flattened for offline analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub episode: u32,
    pub step: u32,
    pub reward: f64,
    pub done: bool,
    /// Size of the offered action set, absent on terminal transitions.
    pub action_set_size: Option<usize>,
    pub primal_bound: f64,
    pub dual_bound: f64,
    pub n_nodes: u64,
}

/// Abstract sink for per-transition telemetry.
pub trait EpisodeSink {
    fn log_transition(&mut self, record: &TransitionRecord);
}

/// Sink that discards all records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EpisodeSink for NoopSink {
    fn log_transition(&mut self, _record: &TransitionRecord) {
        // intentionally no-op
    }
}

/// JSONL file sink.
///
/// Each transition is written as a single JSON object on its own line.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create a new sink writing to `path`.
    pub fn create(path: &str) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EpisodeSink for FileSink {
    fn log_transition(&mut self, record: &TransitionRecord) {
        // If logging fails we don't want to interrupt the rollout, so
        // I/O errors are deliberately ignored.
        if let Ok(line) = serde_json::to_string(record) {
            let _ = self.writer.write_all(line.as_bytes());
            let _ = self.writer.write_all(b"\n");
            let _ = self.writer.flush();
        }
    }
}
