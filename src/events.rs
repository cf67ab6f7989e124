/// Structured pipeline events.
///
/// Components never log into ambient state directly for things the report
/// needs to count; they emit a `PipelineEvent` into an injected `EventSink`.
/// `TracingSink` turns events into log lines, `EventCounters` tallies them
/// for the translation report, and `MemorySink` keeps them for tests.
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    ChunkTransformed {
        file: String,
        chunk_index: usize,
        elapsed: Duration,
    },
    ChunkFailed {
        file: String,
        chunk_index: usize,
        reason: String,
    },
    DriftRejected {
        file: String,
        chunk_index: usize,
        original_lines: usize,
        transformed_lines: usize,
    },
    FirstLineRestored {
        file: String,
        chunk_index: usize,
    },
    FileMerged {
        file: String,
        chunks: usize,
    },
    MergeFailed {
        file: String,
        reason: String,
    },
    FileValidated {
        file: String,
        valid: bool,
        errors: usize,
    },
}

/// Receiver of pipeline events. Must be shareable across transform tasks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards every event to `tracing` at a level matching its severity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::ChunkTransformed {
                file,
                chunk_index,
                elapsed,
            } => debug!("{file}#{chunk_index} transformed in {elapsed:?}"),
            PipelineEvent::ChunkFailed {
                file,
                chunk_index,
                reason,
            } => error!("{file}#{chunk_index} transform failed, keeping original: {reason}"),
            PipelineEvent::DriftRejected {
                file,
                chunk_index,
                original_lines,
                transformed_lines,
            } => warn!(
                "{file}#{chunk_index} line count drifted {original_lines} -> {transformed_lines}, keeping original"
            ),
            PipelineEvent::FirstLineRestored { file, chunk_index } => {
                warn!("{file}#{chunk_index} first line changed, restored")
            }
            PipelineEvent::FileMerged { file, chunks } => {
                debug!("Merged {chunks} chunks into {file}")
            }
            PipelineEvent::MergeFailed { file, reason } => {
                error!("Failed to merge {file}: {reason}")
            }
            PipelineEvent::FileValidated { file, valid, errors } => {
                if valid {
                    info!("{file}: valid")
                } else {
                    warn!("{file}: {errors} validation errors")
                }
            }
        }
    }
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

/// Lock-free tallies of the events the report cares about.
#[derive(Debug, Default)]
pub struct EventCounters {
    transformed: AtomicUsize,
    failed: AtomicUsize,
    drift_rejected: AtomicUsize,
    first_line_restored: AtomicUsize,
    merge_failed: AtomicUsize,
}

/// Point-in-time copy of `EventCounters`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuardStats {
    pub transformed_chunks: usize,
    pub failed_chunks: usize,
    pub drift_rejections: usize,
    pub first_line_restorations: usize,
    pub merge_failures: usize,
}

impl EventCounters {
    #[must_use]
    pub fn snapshot(&self) -> GuardStats {
        GuardStats {
            transformed_chunks: self.transformed.load(Ordering::Relaxed),
            failed_chunks: self.failed.load(Ordering::Relaxed),
            drift_rejections: self.drift_rejected.load(Ordering::Relaxed),
            first_line_restorations: self.first_line_restored.load(Ordering::Relaxed),
            merge_failures: self.merge_failed.load(Ordering::Relaxed),
        }
    }
}

impl EventSink for EventCounters {
    fn emit(&self, event: PipelineEvent) {
        let counter = match event {
            PipelineEvent::ChunkTransformed { .. } => &self.transformed,
            PipelineEvent::ChunkFailed { .. } => &self.failed,
            PipelineEvent::DriftRejected { .. } => &self.drift_rejected,
            PipelineEvent::FirstLineRestored { .. } => &self.first_line_restored,
            PipelineEvent::MergeFailed { .. } => &self.merge_failed,
            PipelineEvent::FileMerged { .. } | PipelineEvent::FileValidated { .. } => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Broadcasts each event to every inner sink.
pub struct FanoutSink {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: PipelineEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn failed(index: usize) -> PipelineEvent {
        PipelineEvent::ChunkFailed {
            file: "a.py".to_string(),
            chunk_index: index,
            reason: "boom".to_string(),
        }
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::default();
        sink.emit(failed(2));
        sink.emit(failed(0));
        assert_eq!(sink.events(), vec![failed(2), failed(0)]);
    }

    #[test]
    fn test_counters_tally_by_kind() {
        let counters = EventCounters::default();
        counters.emit(failed(0));
        counters.emit(PipelineEvent::DriftRejected {
            file: "a.py".to_string(),
            chunk_index: 1,
            original_lines: 20,
            transformed_lines: 2,
        });
        counters.emit(PipelineEvent::FileMerged {
            file: "a.py".to_string(),
            chunks: 2,
        });

        let stats = counters.snapshot();
        assert_eq!(stats.failed_chunks, 1);
        assert_eq!(stats.drift_rejections, 1);
        assert_eq!(stats.transformed_chunks, 0);
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let memory = Arc::new(MemorySink::default());
        let counters = Arc::new(EventCounters::default());
        let fanout = FanoutSink::new(vec![memory.clone(), counters.clone()]);

        fanout.emit(failed(3));

        assert_eq!(memory.events().len(), 1);
        assert_eq!(counters.snapshot().failed_chunks, 1);
    }
}
