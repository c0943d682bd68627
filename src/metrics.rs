//! Request counters and latency statistics for the prediction service.

use crate::types::category::{RiskCategory, CATEGORY_COUNT};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is discarded
const LATENCY_WINDOW: usize = 10_000;

/// Runtime metrics collector for the prediction endpoint
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions: AtomicU64,
    /// Requests rejected for missing or invalid input
    pub validation_rejections: AtomicU64,
    /// Requests that arrived before a model was loaded
    pub unavailable_rejections: AtomicU64,
    /// Internal inference failures
    pub internal_failures: AtomicU64,
    /// Predictions by category code
    by_category: [AtomicU64; CATEGORY_COUNT],
    /// Prediction latency (in microseconds)
    latencies: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions: AtomicU64::new(0),
            validation_rejections: AtomicU64::new(0),
            unavailable_rejections: AtomicU64::new(0),
            internal_failures: AtomicU64::new(0),
            by_category: Default::default(),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, category: RiskCategory, latency: Duration) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
        self.by_category[category.index()].fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    pub fn record_validation_rejection(&self) {
        self.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.unavailable_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_internal_failure(&self) {
        self.internal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Predictions per category, in category order
    pub fn category_counts(&self) -> [u64; CATEGORY_COUNT] {
        let mut counts = [0; CATEGORY_COUNT];
        for (count, counter) in counts.iter_mut().zip(&self.by_category) {
            *count = counter.load(Ordering::Relaxed);
        }
        counts
    }

    /// Latency percentiles over the retained window
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(times) => times.clone(),
            Err(_) => return LatencyStats::default(),
        };
        if sorted.is_empty() {
            return LatencyStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sorted.iter().sum::<u64>() / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Successful predictions per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        let predictions = self.predictions.load(Ordering::Relaxed);
        let latency = self.latency_stats();

        info!(
            predictions,
            throughput = format!("{:.1} req/s", self.throughput()),
            validation_rejections = self.validation_rejections.load(Ordering::Relaxed),
            unavailable_rejections = self.unavailable_rejections.load(Ordering::Relaxed),
            internal_failures = self.internal_failures.load(Ordering::Relaxed),
            "Prediction service summary"
        );
        info!(
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            max_us = latency.max_us,
            "Prediction latency"
        );

        for (category, count) in RiskCategory::ALL.iter().zip(self.category_counts()) {
            let pct = if predictions > 0 {
                count as f64 / predictions as f64 * 100.0
            } else {
                0.0
            };
            info!("  {:<10} {:>8} ({:>5.1}%)", category.short_name(), count, pct);
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Prediction latency statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Run until the task is dropped. Interval must be non-zero.
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
