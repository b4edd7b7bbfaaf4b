//! Structured spans for aligner calls and composite stages.

use crate::data::Image;
use crate::pipeline::Transform;
use std::time::Instant;
use tracing::{span, Level, Span};
use uuid::Uuid;

/// Span covering one aligner call
pub struct AlignerSpan {
    span: Span,
    start_time: Instant,
    aligner: String,
}

impl AlignerSpan {
    pub fn new(aligner: &str, image: &Image, comparator: &str, correlation_id: Option<Uuid>) -> Self {
        let extents = image.describe_dims();
        let span = if let Some(corr_id) = correlation_id {
            span!(
                Level::INFO,
                "aligner_call",
                aligner = aligner,
                comparator = comparator,
                extents = %extents,
                correlation_id = %corr_id
            )
        } else {
            span!(
                Level::INFO,
                "aligner_call",
                aligner = aligner,
                comparator = comparator,
                extents = %extents
            )
        };

        Self {
            span,
            start_time: Instant::now(),
            aligner: aligner.to_string(),
        }
    }

    /// An intermediate pose worth keeping in the trace
    pub fn record_candidate(&self, stage: &str, transform: &Transform, score: f32) {
        tracing::debug!(
            parent: &self.span,
            stage = stage,
            angle = transform.angle(),
            tx = transform.tx(),
            ty = transform.ty(),
            mirror = transform.is_mirrored(),
            score = score,
            "Candidate pose"
        );
    }

    pub fn record_result(&self, transform: &Transform, score: Option<f32>) {
        let duration = self.start_time.elapsed();
        tracing::info!(
            parent: &self.span,
            aligner = %self.aligner,
            angle = format!("{:.3}°", transform.angle()),
            translation = format!("({:.2}, {:.2}, {:.2})", transform.tx(), transform.ty(), transform.tz()),
            mirror = transform.is_mirrored(),
            score = score,
            execution_time_ms = duration.as_millis(),
            "Alignment completed"
        );
    }

    pub fn record_failure(&self, error: &dyn std::error::Error) {
        let duration = self.start_time.elapsed();
        tracing::warn!(
            parent: &self.span,
            aligner = %self.aligner,
            error = %error,
            execution_time_ms = duration.as_millis(),
            "Alignment failed"
        );
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Span for one stage of a composite aligner
pub struct PipelineSpan {
    span: Span,
    start_time: Instant,
    stage_name: String,
}

impl PipelineSpan {
    pub fn new(stage_name: &str, correlation_id: Option<Uuid>) -> Self {
        let span = if let Some(corr_id) = correlation_id {
            span!(
                Level::INFO,
                "pipeline_stage",
                stage = stage_name,
                correlation_id = %corr_id
            )
        } else {
            span!(Level::INFO, "pipeline_stage", stage = stage_name)
        };

        Self {
            span,
            start_time: Instant::now(),
            stage_name: stage_name.to_string(),
        }
    }

    pub fn record_completion(&self, transform: &Transform, success: bool) {
        let duration = self.start_time.elapsed();
        tracing::info!(
            parent: &self.span,
            stage = %self.stage_name,
            success = success,
            angle = transform.angle(),
            tx = transform.tx(),
            ty = transform.ty(),
            execution_time_ms = duration.as_millis(),
            "Pipeline stage completed"
        );
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}
