use crate::data::Image;
use crate::logging::{MetricsCollector, PerformanceStats};
use crate::pipeline::{AlgorithmConfig, AlignerRegistry, AlignmentReport};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Runs several registered aligners on one image pair
pub struct BenchmarkRunner {
    pub aligners: Vec<String>,
    pub comparator: String,
    pub comparator_config: AlgorithmConfig,
    pub aligner_configs: BTreeMap<String, AlgorithmConfig>,
    pub iterations: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BenchmarkOutcome {
    /// Report of the last iteration of every aligner that succeeded
    pub reports: Vec<AlignmentReport>,
    /// Aligner name and error message of every failed run
    pub failures: Vec<(String, String)>,
    pub stats: Vec<PerformanceStats>,
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchmarkRunner {
    pub fn new() -> Self {
        Self {
            aligners: Vec::new(),
            comparator: "ccc".to_string(),
            comparator_config: AlgorithmConfig::new(),
            aligner_configs: BTreeMap::new(),
            iterations: 1,
        }
    }

    pub fn add_aligner(&mut self, name: &str) {
        self.aligners.push(name.to_string());
    }

    pub fn with_comparator(mut self, name: &str, config: AlgorithmConfig) -> Self {
        self.comparator = name.to_string();
        self.comparator_config = config;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn run_benchmark(&self, registry: &AlignerRegistry, image: &Image, reference: &Image) -> BenchmarkOutcome {
        let collector = Arc::new(MetricsCollector::new(true));
        let registry = registry.clone().with_metrics(collector.clone());
        let mut outcome = BenchmarkOutcome::default();

        for name in &self.aligners {
            let config = self.aligner_configs.get(name).cloned().unwrap_or_default();
            let mut last = None;
            for _ in 0..self.iterations {
                match registry.align_with_report(
                    name,
                    image,
                    Some(reference),
                    &self.comparator,
                    &self.comparator_config,
                    &config,
                ) {
                    Ok((_, report)) => last = Some(report),
                    Err(e) => {
                        tracing::error!(aligner = %name, error = %e, "Aligner failed");
                        outcome.failures.push((name.clone(), e.to_string()));
                        last = None;
                        break;
                    }
                }
            }
            if let Some(report) = last {
                outcome.reports.push(report);
            }
            if let Some(stats) = collector.calculate_stats(name) {
                outcome.stats.push(stats);
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ImageTransformer;
    use crate::data::SyntheticImage;

    #[test]
    fn test_benchmark_collects_reports_and_failures() {
        let registry = AlignerRegistry::with_defaults();
        let reference = SyntheticImage::phantom(32).render();
        let image = ImageTransformer::translate_int(&reference, [2, -1, 0]);

        let mut runner = BenchmarkRunner::new().with_iterations(2);
        runner.add_aligner("translational");
        runner.add_aligner("no_such_aligner");
        let outcome = runner.run_benchmark(&registry, &image, &reference);

        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].aligner, "translational");
        assert!(outcome.reports[0].score < -0.99);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.stats.len(), 1);
        assert_eq!(outcome.stats[0].count, 2);
    }
}
