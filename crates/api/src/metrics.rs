use query::ResponseSource;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    rejected_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    relevant_queries: AtomicUsize,
    generated_responses: AtomicUsize,
    fallback_responses: AtomicUsize,
    intent_requests: AtomicUsize,

    // Timing (in microseconds)
    total_request_time_us: AtomicU64,
    total_generation_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            rejected_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            relevant_queries: AtomicUsize::new(0),
            generated_responses: AtomicUsize::new(0),
            fallback_responses: AtomicUsize::new(0),
            intent_requests: AtomicUsize::new(0),
            total_request_time_us: AtomicU64::new(0),
            total_generation_time_us: AtomicU64::new(0),
        })
    }

    /// A prompt that was answered, by generation or fallback.
    pub fn record_response(
        &self,
        duration: Duration,
        generation_time: Duration,
        relevant: bool,
        source: ResponseSource,
    ) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        self.total_request_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_generation_time_us
            .fetch_add(generation_time.as_micros() as u64, Ordering::Relaxed);

        if relevant {
            self.relevant_queries.fetch_add(1, Ordering::Relaxed);
        }
        let counter = match source {
            ResponseSource::Generated => &self.generated_responses,
            ResponseSource::KnowledgeBase => &self.fallback_responses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// A request answered with a 500.
    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_intent(&self) {
        self.intent_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let answered = &self.successful_requests;
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: answered.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            relevant_queries: self.relevant_queries.load(Ordering::Relaxed),
            generated_responses: self.generated_responses.load(Ordering::Relaxed),
            fallback_responses: self.fallback_responses.load(Ordering::Relaxed),
            intent_requests: self.intent_requests.load(Ordering::Relaxed),
            avg_request_time_ms: self.avg_time_ms(&self.total_request_time_us, answered),
            avg_generation_time_ms: self.avg_time_ms(&self.total_generation_time_us, answered),
        }
    }

    fn avg_time_ms(&self, total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
        let total = total_us.load(Ordering::Relaxed) as f64;
        let cnt = count.load(Ordering::Relaxed) as f64;
        if cnt > 0.0 {
            total / cnt / 1000.0 // Convert to ms
        } else {
            0.0
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub rejected_requests: usize,
    pub failed_requests: usize,
    pub relevant_queries: usize,
    pub generated_responses: usize,
    pub fallback_responses: usize,
    pub intent_requests: usize,
    pub avg_request_time_ms: f64,
    pub avg_generation_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts_and_averages() {
        let metrics = Metrics::new();
        metrics.record_response(
            Duration::from_millis(10),
            Duration::from_millis(8),
            true,
            ResponseSource::Generated,
        );
        metrics.record_response(
            Duration::from_millis(30),
            Duration::from_millis(2),
            false,
            ResponseSource::KnowledgeBase,
        );
        metrics.record_rejected();
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.rejected_requests, 1);
        assert_eq!(snapshot.relevant_queries, 1);
        assert_eq!(snapshot.generated_responses, 1);
        assert_eq!(snapshot.fallback_responses, 1);
        assert!((snapshot.avg_request_time_ms - 20.0).abs() < 1e-9);
        assert!((snapshot.avg_generation_time_ms - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.avg_request_time_ms, 0.0);
    }
}
