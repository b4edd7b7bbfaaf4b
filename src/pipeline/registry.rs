use super::composite::CoarseToFineAligner;
use super::traits::{AlgorithmConfig, Aligner, Comparator, Comparison, ParameterInfo};
use super::types::{Alignment, AlignmentReport};
use crate::algorithms::{
    RefineAligner, RotateFlipAligner, RotatePrecenterAligner, RotateTranslateAligner,
    RotateTranslateFlipAligner, RotationalAligner, RtfExhaustiveAligner, RtfSlowExhaustiveAligner,
    TranslationalAligner,
};
use crate::analysis::comparators::{CccComparator, DotComparator, SqEuclideanComparator};
use crate::data::Image;
use crate::error::{AlignError, Result};
use crate::logging::{self, AlignerSpan, MetricsCollector, Timer};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type AlignerFactory = fn() -> Box<dyn Aligner>;
pub type ComparatorFactory = fn() -> Box<dyn Comparator>;

/// Prefix that wraps an aligner in simplex refinement
pub const REFINED_PREFIX: &str = "refined:";

/// Comparators by name
#[derive(Clone, Default)]
pub struct ComparatorRegistry {
    factories: BTreeMap<String, ComparatorFactory>,
}

impl ComparatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("ccc", || Box::new(CccComparator));
        registry.register("dot", || Box::new(DotComparator));
        registry.register("sqeuclidean", || Box::new(SqEuclideanComparator));
        registry
    }

    pub fn register(&mut self, name: &str, factory: ComparatorFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn resolve(&self, name: &str) -> Result<Box<dyn Comparator>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| AlignError::not_found(format!("comparator '{}'", name)))
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

/// Aligners by name, plus the comparators they are scored with.
///
/// Built once by the embedding application and passed to call sites.
#[derive(Clone, Default)]
pub struct AlignerRegistry {
    factories: BTreeMap<String, AlignerFactory>,
    comparators: ComparatorRegistry,
    metrics: Option<Arc<MetricsCollector>>,
}

impl AlignerRegistry {
    /// Registry without any aligners and with the built-in comparators
    pub fn new() -> Self {
        Self {
            comparators: ComparatorRegistry::with_defaults(),
            ..Self::default()
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("translational", || Box::new(TranslationalAligner));
        registry.register("rotational", || Box::new(RotationalAligner));
        registry.register("rotate_precenter", || Box::new(RotatePrecenterAligner));
        registry.register("rotate_translate", || Box::new(RotateTranslateAligner));
        registry.register("rotate_flip", || Box::new(RotateFlipAligner));
        registry.register("rotate_translate_flip", || Box::new(RotateTranslateFlipAligner));
        registry.register("rtf_exhaustive", || Box::new(RtfExhaustiveAligner));
        registry.register("rtf_slow_exhaustive", || Box::new(RtfSlowExhaustiveAligner));
        registry.register("refine", || Box::new(RefineAligner));
        registry
    }

    /// Record every `align` call in `collector`
    pub fn with_metrics(mut self, collector: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(collector);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    pub fn register(&mut self, name: &str, factory: AlignerFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn comparators(&self) -> &ComparatorRegistry {
        &self.comparators
    }

    pub fn comparators_mut(&mut self) -> &mut ComparatorRegistry {
        &mut self.comparators
    }

    /// Look up an aligner. `refined:<name>` yields `<name>` followed by
    /// simplex refinement.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Aligner>> {
        if let Some(inner) = name.strip_prefix(REFINED_PREFIX) {
            return self.resolve_refined(inner);
        }
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| AlignError::not_found(format!("aligner '{}'", name)))
    }

    pub fn resolve_refined(&self, name: &str) -> Result<Box<dyn Aligner>> {
        let coarse = self.resolve(name)?;
        Ok(Box::new(CoarseToFineAligner::new(coarse)))
    }

    /// Registered names mapped to the configuration keys they accept
    pub fn list(&self) -> BTreeMap<String, Vec<ParameterInfo>> {
        self.factories
            .iter()
            .map(|(name, factory)| (name.clone(), factory().get_parameters()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Uniform call: resolve both names, run the aligner inside a span and
    /// record its duration.
    pub fn align(
        &self,
        aligner: &str,
        image: &Image,
        reference: Option<&Image>,
        comparator: &str,
        comparator_config: &AlgorithmConfig,
        aligner_config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        self.align_with_report(aligner, image, reference, comparator, comparator_config, aligner_config)
            .map(|(alignment, _)| alignment)
    }

    /// As [`Self::align`], also returning a report with the final
    /// comparator score when a reference is given
    pub fn align_with_report(
        &self,
        aligner: &str,
        image: &Image,
        reference: Option<&Image>,
        comparator: &str,
        comparator_config: &AlgorithmConfig,
        aligner_config: &AlgorithmConfig,
    ) -> Result<(Alignment, AlignmentReport)> {
        let strategy = self.resolve(aligner)?;
        let metric = self.comparators.resolve(comparator)?;
        let comparison = Comparison::new(metric.as_ref(), comparator_config);

        let correlation_id = logging::get_correlation_id().unwrap_or_else(logging::new_correlation_id);
        let span = AlignerSpan::new(aligner, image, comparator, Some(correlation_id));
        let _entered = span.enter();
        let mut timer = match &self.metrics {
            Some(collector) => Timer::start_with_collector(aligner, Some(correlation_id), collector.clone()),
            None => Timer::start(aligner, Some(correlation_id)),
        };

        let outcome = strategy.align(image, reference, &comparison, aligner_config).and_then(|alignment| {
            let score = match reference {
                Some(reference) => Some(comparison.score(&alignment.image, reference)?),
                None => None,
            };
            Ok((alignment, score))
        });

        match outcome {
            Ok((alignment, score)) => {
                span.record_result(&alignment.transform, score);
                timer.add_metadata("success", serde_json::json!(true));
                if let Some(score) = score.filter(|s| s.is_finite()) {
                    timer.add_metadata("score", serde_json::json!(score));
                }
                let elapsed = timer.stop();

                let mut report = AlignmentReport::new(aligner, comparator, alignment.transform)
                    .with_execution_time(elapsed.as_secs_f64() * 1000.0)
                    .with_metadata("correlation_id", correlation_id.to_string())
                    .with_metadata("extents", image.describe_dims());
                if let Some(score) = score {
                    report = report.with_score(score);
                }
                Ok((alignment, report))
            }
            Err(e) => {
                span.record_failure(&e);
                timer.add_metadata("success", serde_json::json!(false));
                timer.stop();
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for AlignerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignerRegistry")
            .field("aligners", &self.names())
            .field("comparators", &self.comparators.names())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let registry = AlignerRegistry::with_defaults();
        let names = registry.names();
        for expected in [
            "translational",
            "rotational",
            "rotate_translate",
            "rotate_flip",
            "rotate_translate_flip",
            "rtf_exhaustive",
            "rtf_slow_exhaustive",
            "refine",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
        assert_eq!(
            registry.comparators().names(),
            vec!["ccc", "dot", "sqeuclidean"]
        );
    }

    #[test]
    fn test_unknown_names() {
        let registry = AlignerRegistry::with_defaults();
        assert!(matches!(registry.resolve("phase"), Err(AlignError::NotFound(_))));
        assert!(matches!(
            registry.resolve("refined:phase"),
            Err(AlignError::NotFound(_))
        ));
        assert!(matches!(
            registry.comparators().resolve("mutual_information"),
            Err(AlignError::NotFound(_))
        ));
    }

    #[test]
    fn test_refined_lookup() {
        let registry = AlignerRegistry::with_defaults();
        let aligner = registry.resolve("refined:rotate_translate").unwrap();
        assert_eq!(aligner.name(), "refined:rotate_translate");
    }

    #[test]
    fn test_list_declares_keys() {
        let listing = AlignerRegistry::with_defaults().list();
        let keys = |name: &str| -> Vec<String> {
            listing[name].iter().map(|p| p.name.clone()).collect()
        };
        assert_eq!(keys("translational"), vec!["max_shift", "no_zero", "snap_to_int"]);
        assert_eq!(keys("rotational"), vec!["rfp_mode"]);
        assert_eq!(keys("rtf_slow_exhaustive"), vec!["max_shift", "ang_step", "trans_step"]);
        assert!(keys("refine").contains(&"initial".to_string()));
    }
}
