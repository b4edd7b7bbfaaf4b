use rigid_align::analysis::residual_error;
use rigid_align::logging::MetricsCollector;
use rigid_align::*;
use std::sync::Arc;

#[test]
fn test_list_names_every_aligner_with_keys() {
    let registry = AlignerRegistry::with_defaults();
    let listing = registry.list();
    assert_eq!(listing.len(), registry.names().len());

    let keys: Vec<&str> = listing["rotate_translate"].iter().map(|p| p.name.as_str()).collect();
    assert_eq!(keys, vec!["max_shift", "no_zero", "rfp_mode"]);
    assert!(listing["rotate_precenter"].is_empty());
}

#[test]
fn test_unknown_aligner_and_comparator() {
    let registry = AlignerRegistry::with_defaults();
    let image = SyntheticImage::phantom(32).render();
    let empty = AlgorithmConfig::new();

    let err = registry.align("orb", &image, Some(&image), "ccc", &empty, &empty).unwrap_err();
    assert!(matches!(err, AlignError::NotFound(_)));

    let err = registry
        .align("translational", &image, Some(&image), "mutual_information", &empty, &empty)
        .unwrap_err();
    assert!(matches!(err, AlignError::NotFound(_)));
}

#[test]
fn test_align_by_name_records_metrics() {
    let collector = Arc::new(MetricsCollector::new(true));
    let registry = AlignerRegistry::with_defaults().with_metrics(collector.clone());
    let reference = SyntheticImage::phantom(64).render();
    let image = ImageTransformer::translate_int(&reference, [4, 2, 0]);
    let empty = AlgorithmConfig::new();

    let (alignment, report) = registry
        .align_with_report("translational", &image, Some(&reference), "ccc", &empty, &empty)
        .unwrap();
    assert_eq!(alignment.transform.translation(), [-4.0, -2.0, 0.0]);
    assert_eq!(report.aligner, "translational");
    assert_eq!(report.comparator, "ccc");
    assert!(report.score < -0.99);
    assert!(report.metadata.contains_key("correlation_id"));

    let err = registry.align("rotational", &image, None, "ccc", &empty, &empty);
    assert!(err.is_err());

    assert_eq!(collector.measurement_count(), 2);
    let metrics = collector.aligner_metrics("rotational").unwrap();
    assert_eq!(metrics.failed_calls, 1);
    let metrics = collector.aligner_metrics("translational").unwrap();
    assert_eq!(metrics.total_calls, 1);
    assert_eq!(metrics.failed_calls, 0);
}

#[test]
fn test_refined_prefix_wraps_any_aligner() {
    let registry = AlignerRegistry::with_defaults();
    let reference = SyntheticImage::phantom(64).render();
    let applied = Transform::new_2d(33.0, 1.5, -2.5, false);
    let image = ImageTransformer::apply(&reference, &applied);
    let empty = AlgorithmConfig::new();

    let coarse = registry
        .align_with_report("rotate_translate", &image, Some(&reference), "ccc", &empty, &empty)
        .unwrap()
        .1;
    let (alignment, refined) = registry
        .align_with_report("refined:rotate_translate", &image, Some(&reference), "ccc", &empty, &empty)
        .unwrap();

    assert_eq!(refined.aligner, "refined:rotate_translate");
    assert!(refined.score <= coarse.score + 0.01);
    let residual = residual_error(&applied, &alignment.transform);
    assert!(residual.within(1.5, 3.0), "residual {:?}", residual);
}

#[test]
fn test_registry_is_shareable_across_threads() {
    let registry = Arc::new(AlignerRegistry::with_defaults());
    let reference = Arc::new(SyntheticImage::phantom(32).render());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let reference = Arc::clone(&reference);
            std::thread::spawn(move || {
                let image = ImageTransformer::translate_int(&reference, [i, -i, 0]);
                let empty = AlgorithmConfig::new();
                registry
                    .align("translational", &image, Some(&reference), "ccc", &empty, &empty)
                    .map(|a| a.transform.translation())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let translation = handle.join().unwrap().unwrap();
        assert_eq!(translation, [-(i as f32), i as f32, 0.0]);
    }
}
