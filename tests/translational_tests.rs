use rigid_align::algorithms::{TranslationalAligner, TranslationalSettings};
use rigid_align::analysis::CccComparator;
use rigid_align::data::single_pixel;
use rigid_align::*;

fn ccc_comparison<'a>(comparator: &'a CccComparator, config: &'a AlgorithmConfig) -> Comparison<'a> {
    Comparison::new(comparator, config)
}

#[test]
fn test_single_pixel_scenario() {
    let image = single_pixel(64, 64, 40, 40, 1.0);
    let reference = single_pixel(64, 64, 32, 32, 1.0);
    let comparator = CccComparator;
    let config = AlgorithmConfig::new();
    let comparison = ccc_comparison(&comparator, &config);

    let result = TranslationalAligner.align(&image, Some(&reference), &comparison, &config).unwrap();

    // The transform is the correction that moves the image onto the reference
    assert_eq!(result.transform.translation(), [-8.0, -8.0, 0.0]);
    assert_eq!(result.image.get_2d(32, 32), 1.0);
    assert_eq!(result.image.transform_attr(), Some(&result.transform));

    let matched = comparison.score(&result.image, &reference).unwrap();
    let perfect = comparison.score(&reference, &reference).unwrap();
    assert!((matched - perfect).abs() < 1e-6);
}

#[test]
fn test_never_worse_than_identity() {
    let reference = SyntheticImage::phantom(64).render();
    let image = ImageTransformer::translate_int(&reference, [3, -5, 0]);
    let comparator = CccComparator;
    let config = AlgorithmConfig::new();
    let comparison = ccc_comparison(&comparator, &config);

    let result = TranslationalAligner.align(&image, Some(&reference), &comparison, &config).unwrap();
    let aligned = comparison.score(&result.image, &reference).unwrap();
    let identity = comparison.score(&image, &reference).unwrap();
    assert!(aligned <= identity);
    assert_eq!(result.transform.translation(), [-3.0, 5.0, 0.0]);
}

#[test]
fn test_self_alignment_is_zero() {
    let image = SyntheticImage::random(48, 48, 5, 11).render();
    let comparator = CccComparator;
    let config = AlgorithmConfig::new();
    let comparison = ccc_comparison(&comparator, &config);

    let result = TranslationalAligner.align(&image, Some(&image), &comparison, &config).unwrap();
    assert!(result.transform.is_identity());
}

#[test]
fn test_no_zero_excludes_trivial_peak() {
    let image = SyntheticImage::random(32, 32, 4, 5).render();
    let config = AlgorithmConfig::new().with_param("no_zero", true);
    let settings = TranslationalSettings::resolve(&image, &config).unwrap();
    let shift = TranslationalAligner::find_translation(&image, Some(&image), &settings).unwrap();
    assert_ne!(shift, [0.0, 0.0, 0.0]);
}

#[test]
fn test_single_sample_axis_reports_zero() {
    // 1 x 32 column: the x search window collapses to nothing
    let mut image = Image::new_2d(1, 32);
    let mut reference = Image::new_2d(1, 32);
    image.set_2d(0, 20, 1.0);
    reference.set_2d(0, 17, 1.0);
    let config = AlgorithmConfig::new().with_param("max_shift", 10);
    let settings = TranslationalSettings::resolve(&image, &config).unwrap();
    assert_eq!(settings.max_shift[0], 0);

    let shift = TranslationalAligner::find_translation(&image, Some(&reference), &settings).unwrap();
    assert_eq!(shift[0], 0.0);
    assert_eq!(shift[1], -3.0);
}

#[test]
fn test_dimension_mismatch() {
    let image = Image::new_2d(32, 32);
    let reference = Image::new_2d(32, 16);
    let comparator = CccComparator;
    let config = AlgorithmConfig::new();
    let comparison = ccc_comparison(&comparator, &config);

    let err = TranslationalAligner.align(&image, Some(&reference), &comparison, &config).unwrap_err();
    assert!(matches!(err, AlignError::DimensionMismatch(_)));
}

#[test]
fn test_self_centring_keeps_half_sample_offsets() {
    // Odd extent: the one-way offset of 3.5 samples is reported as is
    // unless snapping is requested
    let image = single_pixel(33, 33, 20, 16, 1.0);
    let comparator = CccComparator;
    let config = AlgorithmConfig::new().with_param("max_shift", 12);
    let comparison = ccc_comparison(&comparator, &config);

    let result = TranslationalAligner.align(&image, None, &comparison, &config).unwrap();
    assert_eq!(result.transform.tx(), -3.5);
    assert_eq!(result.transform.ty(), 0.5);

    let snapped_config = config.clone().with_param("snap_to_int", true);
    let snapped = TranslationalAligner.align(&image, None, &comparison, &snapped_config).unwrap();
    assert_eq!(snapped.transform.tx(), -3.0);
    assert_eq!(snapped.transform.ty(), 1.0);
}
