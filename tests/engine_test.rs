//! End-to-end scenarios for the optimization engine: realistic palettes
//! through the public `optimize` entry point, checking the response
//! invariants that every caller relies on.

use std::time::Instant;

use paintmix::{
    optimize, AccuracyRating, Algorithm, LabColor, MixError, OpticalProperties,
    OptimizationRequest, Paint, VolumeConstraints,
};

fn paint(id: &str, name: &str, l: f64, a: f64, b: f64) -> Paint {
    let mut p = Paint::from_lab(id, name, LabColor::new(l, a, b));
    p.optical = OpticalProperties::new(0.5, 0.5);
    p.opacity = 0.9;
    p
}

fn studio_palette() -> Vec<Paint> {
    vec![
        paint("tw", "Titanium White", 96.0, -0.5, 1.2),
        paint("ib", "Ivory Black", 12.0, 0.3, -0.4),
        paint("cr", "Cadmium Red", 45.0, 58.0, 48.0),
        paint("cy", "Cadmium Yellow", 83.0, 5.0, 85.0),
        paint("ub", "Ultramarine Blue", 30.0, 20.0, -55.0),
        paint("vg", "Viridian Green", 50.0, -42.0, 10.0),
        paint("bs", "Burnt Sienna", 38.0, 26.0, 30.0),
        paint("yo", "Yellow Ochre", 65.0, 12.0, 45.0),
        paint("ac", "Alizarin Crimson", 35.0, 50.0, 15.0),
        paint("cb", "Cobalt Blue", 38.0, 8.0, -45.0),
        paint("ru", "Raw Umber", 32.0, 8.0, 18.0),
        paint("pg", "Phthalo Green", 42.0, -45.0, -8.0),
    ]
}

fn request(target: LabColor, paints: Vec<Paint>) -> OptimizationRequest {
    let mut req = OptimizationRequest::new(target, paints);
    req.seed = Some(1234);
    req.time_limit_ms = 10_000;
    req
}

#[test]
fn single_white_paint_matches_a_white_target() {
    // Scenario: near-white target with only Titanium White available.
    let target = LabColor::new(96.0, 0.0, 0.0);
    let req = request(target, vec![paint("tw", "Titanium White", 96.0, -0.5, 1.2)]);
    let result = optimize(&req).unwrap();

    assert_eq!(result.formula.paint_ratios.len(), 1);
    assert_eq!(result.formula.paint_ratios[0].paint_id, "tw");
    assert!((result.formula.paint_ratios[0].percentage - 100.0).abs() < 0.1);
    assert!(
        result.formula.delta_e < 2.5,
        "white-on-white dE {}",
        result.formula.delta_e
    );
    assert_ne!(result.formula.accuracy_rating, AccuracyRating::Poor);
}

#[test]
fn exact_mass_tone_target_rates_excellent() {
    let mass_tone = LabColor::new(96.0, -0.5, 1.2);
    let req = request(mass_tone, vec![paint("tw", "Titanium White", 96.0, -0.5, 1.2)]);
    let result = optimize(&req).unwrap();
    assert!(
        result.formula.delta_e < 1.0,
        "self-match dE {}",
        result.formula.delta_e
    );
    assert_eq!(result.formula.accuracy_rating, AccuracyRating::Excellent);
    assert!(result.metrics.target_met);
}

#[test]
fn red_and_yellow_mix_toward_orange() {
    // Scenario: a saturated orange from a red/yellow pair only.
    let target = LabColor::new(55.0, 35.0, 58.0);
    let req = request(
        target,
        vec![
            paint("cr", "Cadmium Red", 45.0, 58.0, 48.0),
            paint("cy", "Cadmium Yellow", 83.0, 5.0, 85.0),
        ],
    );
    let result = optimize(&req).unwrap();

    assert_eq!(result.formula.paint_ratios.len(), 2);
    for ratio in &result.formula.paint_ratios {
        assert!(
            ratio.percentage > 0.0,
            "{} dropped from the mix",
            ratio.paint_id
        );
    }
    assert!(
        result.formula.delta_e < 8.0,
        "orange dE {}",
        result.formula.delta_e
    );
}

#[test]
fn out_of_gamut_target_is_a_caveated_success() {
    // Scenario: neon green is unreachable from red and blue alone.
    let target = LabColor::new(88.0, -86.0, 83.0);
    let req = request(
        target,
        vec![
            paint("cr", "Cadmium Red", 45.0, 58.0, 48.0),
            paint("ub", "Ultramarine Blue", 30.0, 20.0, -55.0),
        ],
    );
    let result = optimize(&req).unwrap();

    assert!(!result.metrics.target_met);
    assert!(result.formula.delta_e > 2.0);
    // Still a full, well-formed formula.
    let pct: f64 = result
        .formula
        .paint_ratios
        .iter()
        .map(|r| r.percentage)
        .sum();
    assert!((pct - 100.0).abs() < 0.1);
}

#[test]
fn short_time_budget_returns_promptly_with_a_formula() {
    // Scenario: 200 ms budget over a 12-paint palette.
    let mut req = request(LabColor::new(55.0, 10.0, 20.0), studio_palette());
    req.time_limit_ms = 200;

    let started = Instant::now();
    let result = optimize(&req).unwrap();
    let wall = started.elapsed().as_millis();

    assert!(wall < 1_000, "took {wall} ms against a 200 ms budget");
    assert!(result.metrics.time_elapsed_ms <= 600);
    assert!(!result.formula.paint_ratios.is_empty());
    assert!(result.formula.paint_ratios.len() <= req.max_paint_count);
}

#[test]
fn oversupplied_palette_is_narrowed_by_diversity() {
    // Scenario: 15 paints, the first five nearly identical reds.
    let mut paints: Vec<Paint> = (0..5)
        .map(|i| {
            paint(
                &format!("red{i}"),
                &format!("Red {i}"),
                45.0,
                58.0 + 0.3 * i as f64,
                48.0,
            )
        })
        .collect();
    paints.extend(studio_palette().into_iter().take(10));

    let req = request(LabColor::new(55.0, 5.0, 10.0), paints);
    let result = optimize(&req).unwrap();

    assert!(result.formula.paint_ratios.len() <= 5);
    let reds = result
        .formula
        .paint_ratios
        .iter()
        .filter(|r| r.paint_id.starts_with("red"))
        .count();
    assert!(
        reds <= 2,
        "expected diverse selection, got {} near-duplicate reds",
        reds
    );
}

#[test]
fn small_palettes_keep_every_available_paint() {
    let req = request(
        LabColor::new(60.0, 0.0, 0.0),
        vec![
            paint("tw", "Titanium White", 96.0, -0.5, 1.2),
            paint("ib", "Ivory Black", 12.0, 0.3, -0.4),
            paint("yo", "Yellow Ochre", 65.0, 12.0, 45.0),
        ],
    );
    let result = optimize(&req).unwrap();
    assert_eq!(result.formula.paint_ratios.len(), 3);
}

#[test]
fn percentages_sum_to_one_hundred() {
    for target in [
        LabColor::new(60.0, 0.0, 0.0),
        LabColor::new(45.0, 30.0, 20.0),
        LabColor::new(75.0, -15.0, 40.0),
    ] {
        let result = optimize(&request(target, studio_palette())).unwrap();
        let pct: f64 = result
            .formula
            .paint_ratios
            .iter()
            .map(|r| r.percentage)
            .sum();
        assert!((pct - 100.0).abs() < 0.1, "sum {pct} for {target:?}");
    }
}

#[test]
fn total_volume_respects_the_requested_window() {
    let mut req = request(LabColor::new(50.0, 5.0, 5.0), studio_palette());
    req.volume_constraints = VolumeConstraints {
        min_total_volume_ml: 10.0,
        max_total_volume_ml: 50.0,
        allow_scaling: true,
    };
    let result = optimize(&req).unwrap();
    let total = result.formula.total_volume_ml;
    assert!(
        (10.0 - 1e-6..=50.0 + 1e-6).contains(&total),
        "total {total}"
    );
    let ratio_sum: f64 = result
        .formula
        .paint_ratios
        .iter()
        .map(|r| r.volume_ml)
        .sum();
    assert!((ratio_sum - total).abs() < 1e-6);
}

#[test]
fn best_delta_never_regresses_during_a_run() {
    let result = optimize(&request(LabColor::new(62.0, 12.0, 25.0), studio_palette())).unwrap();
    assert!(
        result.metrics.final_best_delta_e <= result.metrics.initial_best_delta_e,
        "final {} vs initial {}",
        result.metrics.final_best_delta_e,
        result.metrics.initial_best_delta_e
    );
    assert!(result.metrics.improvement_rate >= 0.0);
}

#[test]
fn accuracy_rating_is_consistent_with_delta_e() {
    let result = optimize(&request(LabColor::new(55.0, 8.0, 12.0), studio_palette())).unwrap();
    let expected = AccuracyRating::from_delta_e(result.formula.delta_e);
    assert_eq!(result.formula.accuracy_rating, expected);
}

#[test]
fn both_algorithms_produce_valid_results() {
    for algorithm in [Algorithm::DifferentialEvolution, Algorithm::TpeHybrid] {
        let mut req = request(LabColor::new(58.0, 6.0, 18.0), studio_palette());
        req.algorithm = algorithm;
        let result = optimize(&req).unwrap();
        assert_eq!(result.metrics.algorithm_used, algorithm.as_str());
        assert!(result.formula.delta_e.is_finite());
        assert!(!result.formula.paint_ratios.is_empty());
    }
}

#[test]
fn alternatives_are_ranked_and_bounded() {
    let result = optimize(&request(LabColor::new(50.0, 20.0, 10.0), studio_palette())).unwrap();
    assert!(result.alternatives.len() <= 3);
    for pair in result.alternatives.windows(2) {
        // Without a cost preference the trade-off score is nearly pure
        // accuracy, so the ordering must be close to ascending delta E.
        assert!(pair[0].delta_e <= pair[1].delta_e + 1.0);
    }
}

#[test]
fn grey_target_from_white_and_black() {
    let target = LabColor::new(60.0, 0.0, 0.0);
    let req = request(
        target,
        vec![
            paint("tw", "Titanium White", 96.0, -0.5, 1.2),
            paint("ib", "Ivory Black", 12.0, 0.3, -0.4),
        ],
    );
    let result = optimize(&req).unwrap();
    assert!(
        result.formula.delta_e < 3.0,
        "grey dE {}",
        result.formula.delta_e
    );
}

#[test]
fn malformed_requests_fail_fast() {
    // Empty paint list.
    let empty = OptimizationRequest::new(LabColor::new(50.0, 0.0, 0.0), vec![]);
    assert!(matches!(optimize(&empty), Err(MixError::Validation(_))));

    // Paint-count cap outside the supported range.
    let mut bad_count = request(
        LabColor::new(50.0, 0.0, 0.0),
        vec![
            paint("a", "a", 50.0, 0.0, 0.0),
            paint("b", "b", 60.0, 0.0, 0.0),
        ],
    );
    bad_count.max_paint_count = 9;
    assert!(matches!(optimize(&bad_count), Err(MixError::Validation(_))));

    // Inverted volume window.
    let mut bad_volume = request(
        LabColor::new(50.0, 0.0, 0.0),
        vec![
            paint("a", "a", 50.0, 0.0, 0.0),
            paint("b", "b", 60.0, 0.0, 0.0),
        ],
    );
    bad_volume.volume_constraints = VolumeConstraints {
        min_total_volume_ml: 100.0,
        max_total_volume_ml: 5.0,
        allow_scaling: true,
    };
    assert!(matches!(optimize(&bad_volume), Err(MixError::Validation(_))));
}

#[test]
fn uncalibrated_paints_still_optimize_via_lab_fallback() {
    let target = LabColor::new(55.0, 0.0, 0.0);
    let req = request(
        target,
        vec![
            Paint::from_lab("w", "White", LabColor::new(96.0, 0.0, 0.0)),
            Paint::from_lab("k", "Black", LabColor::new(10.0, 0.0, 0.0)),
        ],
    );
    let result = optimize(&req).unwrap();
    // Linear LAB averaging can hit any lightness between the two.
    assert!(
        result.formula.delta_e < 1.0,
        "fallback dE {}",
        result.formula.delta_e
    );
}

#[test]
fn concurrent_calls_share_a_catalog_safely() {
    // The paint catalog is read-only input; parallel optimizations need
    // no coordination.
    let paints = studio_palette();
    let targets = [
        LabColor::new(60.0, 0.0, 0.0),
        LabColor::new(45.0, 30.0, 20.0),
        LabColor::new(70.0, -20.0, 35.0),
    ];
    let handles: Vec<_> = targets
        .into_iter()
        .map(|target| {
            let catalog = paints.clone();
            std::thread::spawn(move || {
                let mut req = request(target, catalog);
                req.time_limit_ms = 3_000;
                optimize(&req).unwrap()
            })
        })
        .collect();
    for handle in handles {
        let result = handle.join().unwrap();
        assert!(result.formula.delta_e.is_finite());
        assert!(!result.formula.paint_ratios.is_empty());
    }
}

#[test]
fn seeded_requests_reproduce_their_formula() {
    let make = || {
        let mut req = request(LabColor::new(48.0, 22.0, 16.0), studio_palette());
        req.seed = Some(77);
        optimize(&req).unwrap()
    };
    let a = make();
    let b = make();
    assert_eq!(a.formula.delta_e, b.formula.delta_e);
    assert_eq!(a.formula.paint_ratios, b.formula.paint_ratios);
}
