//! Request metrics and periodic summaries for the viability service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by the HTTP handlers
pub struct ServiceMetrics {
    /// Successful predictions
    pub predictions_served: AtomicU64,
    /// Successful training runs
    pub training_runs: AtomicU64,
    /// Requests rejected with a 4xx status
    pub client_errors: AtomicU64,
    /// Requests failed with a 5xx status
    pub server_errors: AtomicU64,
    /// Successful predictions per model format
    predictions_by_format: RwLock<HashMap<String, u64>>,
    /// Prediction latencies (in microseconds)
    prediction_times: RwLock<Vec<u64>>,
    /// Training durations (in milliseconds)
    training_times: RwLock<Vec<u64>>,
    /// Predicted percentage buckets: 0-10, 10-20, ..., 90-100
    percentage_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            training_runs: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            predictions_by_format: RwLock::new(HashMap::new()),
            prediction_times: RwLock::new(Vec::with_capacity(1000)),
            training_times: RwLock::new(Vec::new()),
            percentage_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, format: &str, latency: Duration, percentage: f64) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.prediction_times.write() {
            push_bounded(&mut times, latency.as_micros() as u64);
        }

        if let Ok(mut by_format) = self.predictions_by_format.write() {
            *by_format.entry(format.to_string()).or_insert(0) += 1;
        }

        if let Ok(mut buckets) = self.percentage_buckets.write() {
            buckets[bucket_for(percentage)] += 1;
        }
    }

    pub fn record_training(&self, duration: Duration) {
        self.training_runs.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut times) = self.training_times.write() {
            push_bounded(&mut times, duration.as_millis() as u64);
        }
    }

    /// Record a failed request by its HTTP status
    pub fn record_failure(&self, status: u16) {
        if status >= 500 {
            self.server_errors.fetch_add(1, Ordering::Relaxed);
        } else {
            self.client_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        let times = self
            .prediction_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Mean training duration in milliseconds
    pub fn get_avg_training_ms(&self) -> u64 {
        let times = self
            .training_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return 0;
        }
        times.iter().sum::<u64>() / times.len() as u64
    }

    /// Predictions per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_percentage_distribution(&self) -> [u64; 10] {
        *self
            .percentage_buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_predictions_by_format(&self) -> HashMap<String, u64> {
        self.predictions_by_format
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let served = self.predictions_served.load(Ordering::Relaxed);
        let client_errors = self.client_errors.load(Ordering::Relaxed);
        let server_errors = self.server_errors.load(Ordering::Relaxed);
        let training_runs = self.training_runs.load(Ordering::Relaxed);

        let latency = self.get_latency_stats();
        let throughput = self.get_throughput();
        let by_format = self.get_predictions_by_format();
        let distribution = self.get_percentage_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            VIABILITY SERVICE - METRICS SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions Served:     {:>8}  │  Throughput: {:>6.2} req/s ║",
            served, throughput
        );
        info!(
            "║ Client Errors (4xx):    {:>8}  │  Server Errors (5xx): {:>4} ║",
            client_errors, server_errors
        );
        info!(
            "║ Training Runs:          {:>8}  │  Mean Duration: {:>7} ms ║",
            training_runs,
            self.get_avg_training_ms()
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Prediction Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Format:                                       ║");
        for (format, count) in &by_format {
            let pct = if served > 0 {
                (*count as f64 / served as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:16}: {:>6} ({:>5.1}%)                          ║", format, count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predicted Viability Distribution:                            ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}%: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Samples kept per timing series; the oldest half is dropped past this
const MAX_SAMPLES: usize = 10_000;

fn push_bounded(times: &mut Vec<u64>, sample: u64) {
    times.push(sample);
    if times.len() > MAX_SAMPLES {
        times.drain(0..MAX_SAMPLES / 2);
    }
}

/// Values outside 0-100 land in the edge buckets
fn bucket_for(percentage: f64) -> usize {
    if percentage.is_nan() {
        return 0;
    }
    (percentage / 10.0).clamp(0.0, 9.0) as usize
}

/// Prediction latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Logs a summary every `interval_secs`
pub struct MetricsReporter {
    metrics: std::sync::Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction("tree_ensemble", Duration::from_micros(100), 55.0);
        metrics.record_prediction("gradient_boosted", Duration::from_micros(300), 99.9);
        metrics.record_failure(400);
        metrics.record_failure(401);
        metrics.record_failure(500);
        metrics.record_training(Duration::from_millis(40));

        assert_eq!(metrics.predictions_served.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.client_errors.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.server_errors.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.training_runs.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_avg_training_ms(), 40);
        assert_eq!(metrics.get_predictions_by_format()["tree_ensemble"], 1);

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean_us, 200);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_percentage_buckets() {
        let metrics = ServiceMetrics::new();
        for pct in [0.0, 9.99, 10.0, 100.0, 250.0, -3.0] {
            metrics.record_prediction("generic", Duration::from_micros(1), pct);
        }
        let dist = metrics.get_percentage_distribution();
        assert_eq!(dist[0], 3);
        assert_eq!(dist[1], 1);
        assert_eq!(dist[9], 2);
    }

    #[test]
    fn test_training_times_are_bounded() {
        let metrics = ServiceMetrics::new();
        for _ in 0..MAX_SAMPLES + 1 {
            metrics.record_training(Duration::from_millis(7));
        }

        let kept = metrics.training_times.read().unwrap().len();
        assert_eq!(kept, MAX_SAMPLES / 2 + 1);
        assert_eq!(
            metrics.training_runs.load(Ordering::Relaxed),
            MAX_SAMPLES as u64 + 1
        );
        assert_eq!(metrics.get_avg_training_ms(), 7);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_latency_stats().count, 0);
        assert_eq!(metrics.get_avg_training_ms(), 0);
    }
}
