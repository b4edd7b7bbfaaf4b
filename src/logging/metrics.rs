//! Timing measurements for aligner calls with summary statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Measurements kept before the oldest half is discarded
const MAX_MEASUREMENTS: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMeasurement {
    pub operation: String,
    pub duration_ms: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub correlation_id: Option<Uuid>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Statistical summary of the measurements of one operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub operation: String,
    pub count: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Outcome summary of one aligner across recorded calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignerMetrics {
    pub aligner: String,
    pub total_calls: usize,
    pub failed_calls: usize,
    /// Mean comparator score over calls that reported one
    pub mean_score: Option<f64>,
    pub timing: PerformanceStats,
}

/// Thread-safe measurement store
#[derive(Debug, Default)]
pub struct MetricsCollector {
    measurements: Mutex<Vec<PerformanceMeasurement>>,
    enabled: bool,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            measurements: Mutex::new(Vec::new()),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, operation: &str, duration: Duration, correlation_id: Option<Uuid>) {
        self.record_with_metadata(operation, duration, correlation_id, HashMap::new());
    }

    pub fn record_with_metadata(
        &self,
        operation: &str,
        duration: Duration,
        correlation_id: Option<Uuid>,
        metadata: HashMap<String, serde_json::Value>,
    ) {
        if !self.enabled {
            return;
        }

        let measurement = PerformanceMeasurement {
            operation: operation.to_string(),
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: chrono::Utc::now(),
            correlation_id,
            metadata,
        };

        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.push(measurement);
            if measurements.len() > MAX_MEASUREMENTS {
                measurements.drain(0..MAX_MEASUREMENTS / 2);
            }
        }
    }

    pub fn get_measurements(&self, operation: &str) -> Vec<PerformanceMeasurement> {
        self.filtered(|m| m.operation == operation)
    }

    pub fn get_measurements_by_correlation(&self, correlation_id: Uuid) -> Vec<PerformanceMeasurement> {
        self.filtered(|m| m.correlation_id == Some(correlation_id))
    }

    fn filtered<F>(&self, keep: F) -> Vec<PerformanceMeasurement>
    where
        F: Fn(&PerformanceMeasurement) -> bool,
    {
        match self.measurements.lock() {
            Ok(measurements) => measurements.iter().filter(|m| keep(m)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn calculate_stats(&self, operation: &str) -> Option<PerformanceStats> {
        let durations: Vec<f64> = self
            .get_measurements(operation)
            .iter()
            .map(|m| m.duration_ms)
            .collect();
        summarize(operation, durations)
    }

    /// Call counts, failures and scores recorded under `aligner`
    pub fn aligner_metrics(&self, aligner: &str) -> Option<AlignerMetrics> {
        let measurements = self.get_measurements(aligner);
        let timing = summarize(aligner, measurements.iter().map(|m| m.duration_ms).collect())?;

        let failed_calls = measurements
            .iter()
            .filter(|m| m.metadata.get("success").and_then(|v| v.as_bool()) == Some(false))
            .count();
        let scores: Vec<f64> = measurements
            .iter()
            .filter_map(|m| m.metadata.get("score").and_then(|v| v.as_f64()))
            .collect();
        let mean_score = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        Some(AlignerMetrics {
            aligner: aligner.to_string(),
            total_calls: measurements.len(),
            failed_calls,
            mean_score,
            timing,
        })
    }

    pub fn clear(&self) {
        if let Ok(mut measurements) = self.measurements.lock() {
            measurements.clear();
        }
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn export_to_json(&self) -> Result<String, serde_json::Error> {
        match self.measurements.lock() {
            Ok(measurements) => serde_json::to_string_pretty(&*measurements),
            Err(_) => Ok("[]".to_string()),
        }
    }
}

/// Mean, spread and percentiles of a set of durations
pub fn summarize(operation: &str, mut durations: Vec<f64>) -> Option<PerformanceStats> {
    if durations.is_empty() {
        return None;
    }
    durations.sort_by(|a, b| a.total_cmp(b));

    let count = durations.len();
    let mean = durations.iter().sum::<f64>() / count as f64;
    let variance = durations.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / count as f64;
    let median = if count % 2 == 0 {
        (durations[count / 2 - 1] + durations[count / 2]) / 2.0
    } else {
        durations[count / 2]
    };
    let percentile = |p: f64| durations[(((count as f64) * p) as usize).min(count - 1)];

    Some(PerformanceStats {
        operation: operation.to_string(),
        count,
        mean_ms: mean,
        median_ms: median,
        std_dev_ms: variance.sqrt(),
        min_ms: durations[0],
        max_ms: durations[count - 1],
        p95_ms: percentile(0.95),
        p99_ms: percentile(0.99),
    })
}

/// Measures one operation and reports it to a collector when stopped
pub struct Timer {
    start: Instant,
    operation: String,
    correlation_id: Option<Uuid>,
    collector: Option<Arc<MetricsCollector>>,
    metadata: HashMap<String, serde_json::Value>,
}

impl Timer {
    pub fn start(operation: &str, correlation_id: Option<Uuid>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            correlation_id,
            collector: None,
            metadata: HashMap::new(),
        }
    }

    pub fn start_with_collector(
        operation: &str,
        correlation_id: Option<Uuid>,
        collector: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            collector: Some(collector),
            ..Self::start(operation, correlation_id)
        }
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn add_metadata(&mut self, key: &str, value: serde_json::Value) {
        self.metadata.insert(key.to_string(), value);
    }

    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();

        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis(),
            correlation_id = ?self.correlation_id,
            "Timer completed"
        );

        if let Some(collector) = &self.collector {
            collector.record_with_metadata(&self.operation, duration, self.correlation_id, self.metadata);
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_collector() {
        let collector = MetricsCollector::new(true);
        let correlation_id = Uuid::new_v4();

        collector.record("translational", Duration::from_millis(100), Some(correlation_id));
        collector.record("translational", Duration::from_millis(150), Some(correlation_id));
        collector.record("translational", Duration::from_millis(200), None);

        assert_eq!(collector.get_measurements("translational").len(), 3);
        assert_eq!(collector.get_measurements_by_correlation(correlation_id).len(), 2);

        let stats = collector.calculate_stats("translational").unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean_ms - 150.0).abs() < 1.0);
        assert!((stats.median_ms - 150.0).abs() < 1.0);
        assert!(collector.calculate_stats("rotational").is_none());
    }

    #[test]
    fn test_timer_records_metadata() {
        let collector = Arc::new(MetricsCollector::new(true));

        let timer = Timer::start_with_collector("rotational", None, collector.clone())
            .with_metadata("score", serde_json::json!(-0.5))
            .with_metadata("success", serde_json::json!(true));
        thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();

        assert!(duration >= Duration::from_millis(10));
        assert_eq!(collector.measurement_count(), 1);

        let metrics = collector.aligner_metrics("rotational").unwrap();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.failed_calls, 0);
        assert_eq!(metrics.mean_score, Some(-0.5));
    }

    #[test]
    fn test_disabled_collector() {
        let collector = MetricsCollector::new(false);
        collector.record("refine", Duration::from_millis(100), None);
        assert_eq!(collector.measurement_count(), 0);
        assert_eq!(collector.export_to_json().unwrap(), "[]");
    }

    #[test]
    fn test_summarize_percentiles() {
        let stats = summarize("x", (1..=100).map(|v| v as f64).collect()).unwrap();
        assert_eq!(stats.min_ms, 1.0);
        assert_eq!(stats.max_ms, 100.0);
        assert_eq!(stats.p95_ms, 96.0);
        assert_eq!(stats.p99_ms, 100.0);
        assert!(summarize("x", Vec::new()).is_none());
    }
}
