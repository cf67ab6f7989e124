/// Mock transformer for tests and offline runs.
///
/// Either echoes its input or applies a caller-supplied function, and keeps
/// track of how many calls it served and how many overlapped at most.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{TransformContext, TransformError, Transformer};

type TransformFn = dyn Fn(&str) -> Result<String, TransformError> + Send + Sync;

pub struct MockTransformer {
    func: Arc<TransformFn>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransformer {
    /// A transformer that returns its input unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Self::from_fn(|content| Ok(content.to_string()))
    }

    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&str) -> Result<String, TransformError> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockTransformer {
    fn default() -> Self {
        Self::identity()
    }
}

#[async_trait]
impl Transformer for MockTransformer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process(
        &self,
        content: &str,
        _ctx: &TransformContext,
    ) -> Result<String, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = (self.func)(content);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity() {
        let mock = MockTransformer::identity();
        let out = mock.process("a\nb\n", &TransformContext::default()).await.unwrap();
        assert_eq!(out, "a\nb\n");
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_from_fn_error() {
        let mock = MockTransformer::from_fn(|_| {
            Err(TransformError::MalformedResponse("boom".to_string()))
        });
        let result = mock.process("x", &TransformContext::default()).await;
        assert!(result.is_err());
    }
}
