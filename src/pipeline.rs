/// Concurrent chunk transformation.
///
/// Every chunk becomes one spawned task. A semaphore caps how many backend
/// calls are outstanding; the permit is held for the call and dropped when
/// the task finishes, whatever the outcome. `run` returns only after every
/// task has resolved, so merging never starts on a half-finished file.
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::chunker::ChunkRecord;
use crate::chunker::store::ChunkStore;
use crate::events::{EventSink, PipelineEvent};
use crate::guard::{GuardAction, LocalGuard};
use crate::sanitize::sanitize;
use crate::transform::{TransformContext, Transformer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct PipelineOutput {
    /// Final chunks in input order. Failed chunks carry their original content.
    pub records: Vec<ChunkRecord>,
    pub stats: PipelineStats,
}

pub struct TransformPipeline {
    transformer: Arc<dyn Transformer>,
    context: Arc<TransformContext>,
    guard: Arc<LocalGuard>,
    max_concurrent: usize,
    events: Arc<dyn EventSink>,
    output: Option<Arc<ChunkStore>>,
}

impl TransformPipeline {
    pub fn new(
        transformer: Arc<dyn Transformer>,
        context: TransformContext,
        guard: LocalGuard,
        max_concurrent: usize,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transformer,
            context: Arc::new(context),
            guard: Arc::new(guard),
            max_concurrent: max_concurrent.max(1),
            events,
            output: None,
        }
    }

    /// Persist every finished chunk into `store`.
    #[must_use]
    pub fn with_output_store(mut self, store: ChunkStore) -> Self {
        self.output = Some(Arc::new(store));
        self
    }

    pub async fn run(&self, chunks: Vec<ChunkRecord>) -> PipelineOutput {
        let started = Instant::now();
        let attempted = chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        info!(
            "Transforming {attempted} chunks with {} (max {} in flight)",
            self.transformer.name(),
            self.max_concurrent
        );

        let mut handles = Vec::with_capacity(attempted);
        for chunk in chunks.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let transformer = Arc::clone(&self.transformer);
            let context = Arc::clone(&self.context);
            let guard = Arc::clone(&self.guard);
            let events = Arc::clone(&self.events);
            let output = self.output.clone();

            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquisition only fails
                // if that invariant is broken; degrade to the original then.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (chunk, false);
                };
                let (record, ok) =
                    transform_chunk(chunk, transformer.as_ref(), &context, &guard, events.as_ref())
                        .await;
                if let Some(store) = output {
                    if let Err(e) = store.save(&record) {
                        error!(
                            "Failed to store {}#{}: {e:#}",
                            record.original_file, record.chunk_index
                        );
                    }
                }
                (record, ok)
            }));
        }

        let mut records = Vec::with_capacity(attempted);
        let mut succeeded = 0;
        for (handle, original) in handles.into_iter().zip(chunks) {
            match handle.await {
                Ok((record, ok)) => {
                    succeeded += usize::from(ok);
                    records.push(record);
                }
                Err(e) => {
                    self.events.emit(PipelineEvent::ChunkFailed {
                        file: original.original_file.clone(),
                        chunk_index: original.chunk_index,
                        reason: format!("task aborted: {e}"),
                    });
                    if let Some(store) = &self.output {
                        if let Err(e) = store.save(&original) {
                            error!(
                                "Failed to store {}#{}: {e:#}",
                                original.original_file, original.chunk_index
                            );
                        }
                    }
                    records.push(original);
                }
            }
        }

        let stats = PipelineStats {
            attempted,
            succeeded,
            duration: started.elapsed(),
        };
        info!(
            "Transformed {}/{} chunks in {:.2?}",
            stats.succeeded, stats.attempted, stats.duration
        );
        PipelineOutput { records, stats }
    }
}

/// Run one chunk through backend, sanitizer and guard. Returns the final
/// record and whether the backend call succeeded.
async fn transform_chunk(
    mut chunk: ChunkRecord,
    transformer: &dyn Transformer,
    context: &TransformContext,
    guard: &LocalGuard,
    events: &dyn EventSink,
) -> (ChunkRecord, bool) {
    let started = Instant::now();
    let raw = match transformer.process(&chunk.content, context).await {
        Ok(raw) => raw,
        Err(e) => {
            events.emit(PipelineEvent::ChunkFailed {
                file: chunk.original_file.clone(),
                chunk_index: chunk.chunk_index,
                reason: e.to_string(),
            });
            return (chunk, false);
        }
    };

    let outcome = guard.check(&chunk.content, &sanitize(&raw));
    match outcome.action {
        GuardAction::Accepted => {}
        GuardAction::DriftRejected {
            original_lines,
            transformed_lines,
        } => events.emit(PipelineEvent::DriftRejected {
            file: chunk.original_file.clone(),
            chunk_index: chunk.chunk_index,
            original_lines,
            transformed_lines,
        }),
        GuardAction::FirstLineRestored => events.emit(PipelineEvent::FirstLineRestored {
            file: chunk.original_file.clone(),
            chunk_index: chunk.chunk_index,
        }),
    }

    events.emit(PipelineEvent::ChunkTransformed {
        file: chunk.original_file.clone(),
        chunk_index: chunk.chunk_index,
        elapsed: started.elapsed(),
    });
    chunk.content = outcome.text;
    (chunk, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{LineEnding, split};
    use crate::events::{EventCounters, MemorySink};
    use crate::merger::merge;
    use crate::transform::{MockTransformer, TransformError};

    fn numbered(n: usize) -> String {
        (0..n).map(|i| format!("line {i}\n")).collect()
    }

    fn pipeline(
        transformer: Arc<dyn Transformer>,
        max_concurrent: usize,
        events: Arc<dyn EventSink>,
    ) -> TransformPipeline {
        TransformPipeline::new(
            transformer,
            TransformContext::default(),
            LocalGuard::default(),
            max_concurrent,
            events,
        )
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mock = Arc::new(MockTransformer::identity().with_latency(Duration::from_millis(20)));
        let chunks = split("a.py", &numbered(40), 2);
        assert_eq!(chunks.len(), 20);

        let out = pipeline(mock.clone(), 3, Arc::new(MemorySink::default()))
            .run(chunks)
            .await;

        assert_eq!(out.stats.attempted, 20);
        assert_eq!(out.stats.succeeded, 20);
        assert_eq!(mock.calls(), 20);
        assert!(mock.peak_in_flight() <= 3, "peak {}", mock.peak_in_flight());
        assert!(mock.peak_in_flight() >= 2);
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_original() {
        let original = numbered(10);
        let mock = Arc::new(MockTransformer::from_fn(|content| {
            if content.contains("---CHUNK_START_0001---") && content.contains("---CHUNK_END_0001---") {
                Err(TransformError::MalformedResponse("boom".to_string()))
            } else {
                Ok(content.replace("line ", "line no. "))
            }
        }));
        let sink = Arc::new(MemorySink::default());

        let out = pipeline(mock, 4, sink.clone())
            .run(split("a.py", &original, 4))
            .await;
        assert_eq!(out.stats.succeeded, 2);

        let merged = merge(out.records, LineEnding::Lf).unwrap();
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(
            &lines[0..4],
            ["line no. 0", "line no. 1", "line no. 2", "line no. 3"]
        );
        assert_eq!(&lines[4..8], ["line 4", "line 5", "line 6", "line 7"]);
        assert_eq!(&lines[8..10], ["line no. 8", "line no. 9"]);

        assert!(sink.events().iter().any(|e| matches!(
            e,
            PipelineEvent::ChunkFailed { chunk_index: 1, .. }
        )));
    }

    #[tokio::test]
    async fn test_drift_rejected_chunk_keeps_original() {
        let original = numbered(12);
        let mock = Arc::new(MockTransformer::from_fn(|_| Ok("only one line".to_string())));
        let counters = Arc::new(EventCounters::default());

        let out = pipeline(mock, 2, counters.clone())
            .run(split("a.py", &original, 100))
            .await;

        assert_eq!(out.records[0].content, original);
        assert_eq!(counters.snapshot().drift_rejections, 1);
        assert_eq!(counters.snapshot().transformed_chunks, 1);
    }

    #[tokio::test]
    async fn test_fenced_response_is_sanitized() {
        let mock = Arc::new(MockTransformer::from_fn(|content| {
            Ok(format!("```python\n{content}```"))
        }));
        let out = pipeline(mock, 1, Arc::new(MemorySink::default()))
            .run(split("a.py", "x = 1\ny = 2\n", 10))
            .await;
        assert_eq!(out.records[0].content, "x = 1\ny = 2");
    }

    #[tokio::test]
    async fn test_output_store_receives_every_chunk() {
        let temp = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(temp.path()).unwrap();
        let mock = Arc::new(MockTransformer::identity());

        pipeline(mock, 2, Arc::new(MemorySink::default()))
            .with_output_store(store.clone())
            .run(split("pkg/a.py", &numbered(9), 4))
            .await;

        let stored = store.load_file_chunks("pkg/a.py").unwrap();
        assert_eq!(stored.len(), 3);
        // The guard drops the final terminator; the translator restores it.
        assert_eq!(merge(stored, LineEnding::Lf).unwrap(), numbered(9).trim_end());
    }
}
