//! Stage-boundary events.

use std::fmt;
use std::time::Duration;

/// Per-file processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Parsing the source container.
    Decoding,
    /// Computing color statistics.
    Analyzing,
    /// Building the palette and remapping pixels.
    Quantizing,
    /// Filter search over indexed encodes.
    Encoding,
    /// Budgeted generic recompression.
    Recompressing,
    /// Size-regression guard.
    Comparing,
    /// Lossy WebP sibling.
    WebP,
    /// Direct re-encode of the decoded buffer after a stage failure.
    Fallback,
    /// Finished with an optimized artifact.
    Done,
    /// No output could be produced.
    Failed,
}

impl Stage {
    /// Lowercase name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Decoding => "decoding",
            Stage::Analyzing => "analyzing",
            Stage::Quantizing => "quantizing",
            Stage::Encoding => "encoding",
            Stage::Recompressing => "recompressing",
            Stage::Comparing => "comparing",
            Stage::WebP => "webp",
            Stage::Fallback => "fallback",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One completed stage of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEvent {
    /// Input file name.
    pub file: String,
    /// Stage that just finished.
    pub stage: Stage,
    /// Wall time spent in the stage.
    pub duration: Duration,
    /// Bytes entering the stage.
    pub bytes_in: usize,
    /// Bytes leaving the stage.
    pub bytes_out: usize,
}

/// Receiver for [`StageEvent`]s.
pub trait EventSink: Send + Sync {
    /// Called at every stage boundary.
    fn record(&self, event: &StageEvent);
}

/// Forwards events to the `log` facade at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: &StageEvent) {
        log::debug!(
            "{}: {} in {:.2?} ({} -> {} bytes)",
            event.file,
            event.stage,
            event.duration,
            event.bytes_in,
            event.bytes_out
        );
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &StageEvent) {}
}
