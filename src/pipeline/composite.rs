use super::traits::{AlgorithmConfig, Aligner, Comparison, ComplexityClass, ParameterInfo};
use super::types::Alignment;
use crate::algorithms::RefineAligner;
use crate::data::Image;
use crate::error::Result;
use crate::logging::{self, PipelineSpan};

/// Coarse-to-fine alignment strategy: any aligner, then simplex
/// refinement seeded with its pose.
///
/// The refine stage starts from the untouched input and re-applies the
/// whole pose, so interpolation is done once.
pub struct CoarseToFineAligner {
    coarse: Box<dyn Aligner>,
    fine: RefineAligner,
    name: String,
}

impl CoarseToFineAligner {
    pub fn new(coarse: Box<dyn Aligner>) -> Self {
        let name = format!("refined:{}", coarse.name());
        Self {
            coarse,
            fine: RefineAligner::new(),
            name,
        }
    }

    pub fn coarse(&self) -> &dyn Aligner {
        self.coarse.as_ref()
    }
}

impl Aligner for CoarseToFineAligner {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Coarse aligner followed by simplex refinement"
    }

    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment> {
        let correlation_id = logging::get_correlation_id();

        let coarse_span = PipelineSpan::new(self.coarse.name(), correlation_id);
        let coarse = {
            let _entered = coarse_span.enter();
            self.coarse.align(image, reference, comparison, config)
        };
        let coarse = match coarse {
            Ok(alignment) => {
                coarse_span.record_completion(&alignment.transform, true);
                alignment
            }
            Err(e) => {
                tracing::warn!(parent: coarse_span.span(), error = %e, "Coarse stage failed");
                return Err(e);
            }
        };

        let mut fine_config = config.clone();
        fine_config.set_param("initial", serde_json::to_value(coarse.transform)?);

        let fine_span = PipelineSpan::new(self.fine.name(), correlation_id);
        let _entered = fine_span.enter();
        let fine = self.fine.align(image, reference, comparison, &fine_config)?;
        fine_span.record_completion(&fine.transform, true);
        Ok(fine)
    }

    fn estimated_complexity(&self) -> ComplexityClass {
        self.coarse.estimated_complexity()
    }

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        let mut params = self.coarse.get_parameters();
        let extra: Vec<ParameterInfo> = self
            .fine
            .get_parameters()
            .into_iter()
            .filter(|p| p.name != "initial" && !params.iter().any(|q| q.name == p.name))
            .collect();
        params.extend(extra);
        params
    }
}
