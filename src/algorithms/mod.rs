pub mod correlation;
pub mod exhaustive;
pub mod flip;
pub mod footprint;
pub mod refine;
pub mod rotate_precenter;
pub mod rotate_translate;
pub mod rotational;
pub mod simplex;
pub mod slow_exhaustive;
pub mod translational;

pub use correlation::{calc_ccf, max_location_wrap, row_correlation, zero_corner_circulant, Peak};
pub use exhaustive::RtfExhaustiveAligner;
pub use flip::{RotateFlipAligner, RotateTranslateFlipAligner};
pub use footprint::{rotational_footprint, unwrap, FootprintMode, PolarParams};
pub use refine::{RefineAligner, RefineMode};
pub use rotate_precenter::RotatePrecenterAligner;
pub use rotate_translate::RotateTranslateAligner;
pub use rotational::RotationalAligner;
pub use simplex::{minimize, SimplexOptions, SimplexResult};
pub use slow_exhaustive::RtfSlowExhaustiveAligner;
pub use translational::{TranslationalAligner, TranslationalSettings};

/// Pose visited during a search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Degrees
    pub angle: f32,
    pub dx: f32,
    pub dy: f32,
    pub mirror: bool,
    pub score: f32,
}

/// True when score `a` strictly beats `b`. Lower wins, NaN never wins and
/// always loses to a number.
pub(crate) fn beats(a: f32, b: f32) -> bool {
    !a.is_nan() && (b.is_nan() || a < b)
}

/// First candidate with the lowest score, in iteration order
pub(crate) fn best_candidate<I>(candidates: I) -> Option<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    candidates.into_iter().fold(None, |best, c| match best {
        Some(b) if !beats(c.score, b.score) => Some(b),
        _ => Some(c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(angle: f32, score: f32) -> Candidate {
        Candidate {
            angle,
            dx: 0.0,
            dy: 0.0,
            mirror: false,
            score,
        }
    }

    #[test]
    fn test_beats() {
        assert!(beats(1.0, 2.0));
        assert!(!beats(2.0, 2.0));
        assert!(beats(5.0, f32::NAN));
        assert!(!beats(f32::NAN, 5.0));
        assert!(!beats(f32::NAN, f32::NAN));
    }

    #[test]
    fn test_best_candidate_first_minimum_wins() {
        let best = best_candidate(vec![
            candidate(1.0, f32::NAN),
            candidate(2.0, 0.5),
            candidate(3.0, 0.25),
            candidate(4.0, 0.25),
        ])
        .unwrap();
        assert_eq!(best.angle, 3.0);
        assert!(best_candidate(Vec::new()).is_none());
    }
}
