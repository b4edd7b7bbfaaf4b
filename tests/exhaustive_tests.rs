use rigid_align::algorithms::{RtfExhaustiveAligner, RtfSlowExhaustiveAligner};
use rigid_align::analysis::{residual_error, CccComparator};
use rigid_align::*;

fn run(aligner: &dyn Aligner, image: &Image, reference: &Image, config: &AlgorithmConfig) -> Result<Alignment> {
    let comparator = CccComparator;
    let comparator_config = AlgorithmConfig::new();
    aligner.align(image, Some(reference), &Comparison::new(&comparator, &comparator_config), config)
}

#[test]
fn test_exhaustive_is_deterministic() {
    let reference = SyntheticImage::random(48, 48, 6, 21).with_noise(0.05, 4).render();
    let image = ImageTransformer::apply(&reference, &Transform::new_2d(40.0, 2.0, 1.0, false));
    let config = AlgorithmConfig::new().with_param("max_shift", 4);

    let first = run(&RtfExhaustiveAligner, &image, &reference, &config).unwrap();
    let second = run(&RtfExhaustiveAligner, &image, &reference, &config).unwrap();

    let tuple = |t: &Transform| (t.angle().to_bits(), t.tx().to_bits(), t.ty().to_bits(), t.is_mirrored());
    assert_eq!(tuple(&first.transform), tuple(&second.transform));
    assert_eq!(first.image.data(), second.image.data());
}

#[test]
fn test_slow_exhaustive_is_deterministic() {
    let reference = SyntheticImage::random(32, 32, 5, 8).with_noise(0.05, 2).render();
    let image = ImageTransformer::apply(&reference, &Transform::new_2d(25.0, 1.0, -1.0, false));
    let config = AlgorithmConfig::new();

    let first = run(&RtfSlowExhaustiveAligner, &image, &reference, &config).unwrap();
    let second = run(&RtfSlowExhaustiveAligner, &image, &reference, &config).unwrap();

    let tuple = |t: &Transform| (t.angle().to_bits(), t.tx().to_bits(), t.ty().to_bits(), t.is_mirrored());
    assert_eq!(tuple(&first.transform), tuple(&second.transform));
    assert_eq!(first.image.data(), second.image.data());
}

#[test]
fn test_exhaustive_default_fits_small_image() {
    let reference = SyntheticImage::phantom(32).render();
    let image = ImageTransformer::rotate(&reference, 30.0);

    let result = run(&RtfExhaustiveAligner, &image, &reference, &AlgorithmConfig::new()).unwrap();
    let t = &result.transform;
    assert!(t.angle().is_finite());
    assert!(t.tx().abs() <= 4.0 && t.ty().abs() <= 4.0, "{:?}", t);
}

#[test]
fn test_exhaustive_rejects_oversized_max_shift() {
    let reference = SyntheticImage::phantom(32).render();
    let config = AlgorithmConfig::new().with_param("max_shift", 4);
    let err = run(&RtfExhaustiveAligner, &reference, &reference, &config).unwrap_err();
    match err {
        AlignError::InvalidConfiguration(message) => assert!(message.contains("too large"), "{}", message),
        other => panic!("unexpected error {:?}", other),
    }

    let tiny = SyntheticImage::phantom(16).render();
    let err = run(&RtfExhaustiveAligner, &tiny, &tiny, &AlgorithmConfig::new()).unwrap_err();
    assert!(matches!(err, AlignError::InvalidConfiguration(_)));
}

#[test]
fn test_exhaustive_recovers_pose() {
    let reference = SyntheticImage::phantom(64).render();
    let applied = Transform::new_2d(-60.0, 3.0, -2.0, false);
    let image = ImageTransformer::apply(&reference, &applied);

    let result = run(&RtfExhaustiveAligner, &image, &reference, &AlgorithmConfig::new()).unwrap();
    let residual = residual_error(&applied, &result.transform);
    assert!(residual.within(2.0, 5.0), "residual {:?}", residual);
}

#[test]
fn test_exhaustive_search_reports_polar_score() {
    let reference = SyntheticImage::phantom(64).render();
    let comparator = CccComparator;
    let config = AlgorithmConfig::new();
    let comparison = Comparison::new(&comparator, &config);

    let best = RtfExhaustiveAligner::search(&reference, &reference, &comparison, 4).unwrap();
    assert_eq!((best.dx, best.dy), (0.0, 0.0));
    assert!(!best.mirror);
    assert!(best.score < -0.99);
}

#[test]
fn test_exhaustive_rejects_small_max_shift() {
    let reference = SyntheticImage::phantom(32).render();
    let config = AlgorithmConfig::new().with_param("max_shift", 1);
    for aligner in [&RtfExhaustiveAligner as &dyn Aligner, &RtfSlowExhaustiveAligner] {
        let err = run(aligner, &reference, &reference, &config).unwrap_err();
        assert!(matches!(err, AlignError::InvalidConfiguration(_)), "{}", aligner.name());
    }
}

#[test]
fn test_exhaustive_zero_max_shift_is_literal() {
    let reference = SyntheticImage::phantom(32).render();
    let config = AlgorithmConfig::new().with_param("max_shift", 0);
    let registry = AlignerRegistry::with_defaults();
    let listing = registry.list();
    for aligner in [&RtfExhaustiveAligner as &dyn Aligner, &RtfSlowExhaustiveAligner] {
        let err = run(aligner, &reference, &reference, &config).unwrap_err();
        assert!(matches!(err, AlignError::InvalidConfiguration(_)), "{}", aligner.name());

        let help = &listing[aligner.name()]
            .iter()
            .find(|p| p.name == "max_shift")
            .unwrap()
            .description;
        assert!(help.contains("0 is"), "{}", help);
    }
}

#[test]
fn test_slow_exhaustive_rejects_bad_steps() {
    let reference = SyntheticImage::phantom(32).render();
    for config in [
        AlgorithmConfig::new().with_param("trans_step", 0.0),
        AlgorithmConfig::new().with_param("ang_step", -1.0),
    ] {
        let err = run(&RtfSlowExhaustiveAligner, &reference, &reference, &config).unwrap_err();
        assert!(matches!(err, AlignError::InvalidConfiguration(_)));
    }
}

#[test]
fn test_slow_exhaustive_self_alignment() {
    let reference = SyntheticImage::phantom(32).render();
    let result = run(&RtfSlowExhaustiveAligner, &reference, &reference, &AlgorithmConfig::new()).unwrap();
    let residual = residual_error(&Transform::identity(), &result.transform);
    assert!(residual.within(1.0, 1.0), "residual {:?}", residual);
}

#[test]
fn test_slow_exhaustive_detects_mirror() {
    let reference = SyntheticImage::phantom(32).render();
    let image = ImageTransformer::flip_x(&reference);
    let result = run(&RtfSlowExhaustiveAligner, &image, &reference, &AlgorithmConfig::new()).unwrap();
    assert!(result.transform.is_mirrored());
}

#[test]
fn test_exhaustive_requires_reference() {
    let image = SyntheticImage::phantom(32).render();
    let comparator = CccComparator;
    let config = AlgorithmConfig::new();
    let err = RtfExhaustiveAligner
        .align(&image, None, &Comparison::new(&comparator, &config), &config)
        .unwrap_err();
    assert!(matches!(err, AlignError::MissingInput(_)));
}
