//! End-to-end tests for the forward filter, learning and the description bridge.

use ef_core::exponential_family::{Multinomial, Normal};
use ef_core::learning::fit;
use ef_core::model::{DescriptionConverter, NetworkConverter, NetworkDescription};
use ef_core::{
    DistributionType, DynamicAssignment, DynamicBayesianNetwork, DynamicDag, DynamicInference,
    DynamicVariables, EngineState, Error, ForwardFilter, StateSpaceKind, UnivariateDistribution,
    Variable,
};
use ef_config::{InferenceConfig, LearningConfig};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const PRIOR: [f64; 2] = [0.3, 0.7];
const TRANSITION: [[f64; 2]; 2] = [[0.85, 0.15], [0.25, 0.75]];
const MEANS: [f64; 2] = [-1.0, 2.0];
const VARIANCES: [f64; 2] = [1.0, 0.5];

struct Model {
    net: Arc<DynamicBayesianNetwork>,
    s: Arc<Variable>,
    x: Arc<Variable>,
}

/// Two-state HMM with Gaussian emissions.
fn gaussian_hmm() -> Model {
    let mut vars = DynamicVariables::new();
    let s = vars.new_multinomial_variable("S", 2).unwrap();
    let x = vars.new_real_variable("X", DistributionType::Normal).unwrap();
    let vars = Arc::new(vars);
    let s_prev = Arc::clone(vars.interface_of(&s).unwrap());

    let mut dag = DynamicDag::new(Arc::clone(&vars));
    dag.add_parent_time0(&x, &s).unwrap();
    dag.add_parent_time_t(&x, &s).unwrap();
    dag.add_parent_time_t(&s, &s_prev).unwrap();
    let mut net = DynamicBayesianNetwork::new(dag).unwrap();

    let prior = Multinomial::with_probabilities(Arc::clone(&s), &PRIOR).unwrap();
    net.conditional_time0_mut(&s)
        .unwrap()
        .set_component(0, Box::new(prior))
        .unwrap();
    for k in 0..2 {
        let row = Multinomial::with_probabilities(Arc::clone(&s), &TRANSITION[k]).unwrap();
        net.conditional_time_t_mut(&s)
            .unwrap()
            .set_component(k, Box::new(row))
            .unwrap();
        let emission = Normal::with_mean_variance(Arc::clone(&x), MEANS[k], VARIANCES[k]).unwrap();
        net.conditional_time0_mut(&x)
            .unwrap()
            .set_component(k, Box::new(emission.clone()))
            .unwrap();
        net.conditional_time_t_mut(&x)
            .unwrap()
            .set_component(k, Box::new(emission))
            .unwrap();
    }
    Model {
        net: Arc::new(net),
        s,
        x,
    }
}

fn engine(model: &Model) -> ForwardFilter {
    let mut engine = ForwardFilter::new(InferenceConfig::default());
    engine.set_model(Arc::clone(&model.net)).unwrap();
    engine
}

/// Textbook forward recursion, normalised each step.
fn reference_forward(observations: &[f64]) -> [f64; 2] {
    let emission = |k: usize, x: f64| ef_math::normal_log_pdf(x, MEANS[k], VARIANCES[k]).exp();
    let mut alpha = [0.0; 2];
    for (t, &x) in observations.iter().enumerate() {
        let mut next = [0.0; 2];
        for (j, slot) in next.iter_mut().enumerate() {
            let predicted = if t == 0 {
                PRIOR[j]
            } else {
                (0..2).map(|i| alpha[i] * TRANSITION[i][j]).sum()
            };
            *slot = predicted * emission(j, x);
        }
        let z: f64 = next.iter().sum();
        alpha = [next[0] / z, next[1] / z];
    }
    alpha
}

fn probabilities(d: &UnivariateDistribution) -> Vec<f64> {
    d.probabilities().expect("multinomial posterior").to_vec()
}

// ============================================================================
// Filtering
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The filter reproduces the textbook forward algorithm.
    #[test]
    fn filter_matches_reference(observations in prop::collection::vec(-4.0..5.0f64, 1..12)) {
        let model = gaussian_hmm();
        let mut filter = engine(&model);
        for (t, x) in observations.iter().enumerate() {
            filter
                .add_dynamic_evidence(DynamicAssignment::new(t as u64).with_value(&model.x, *x))
                .unwrap();
        }
        filter.run_inference().unwrap();

        let expected = reference_forward(&observations);
        let got = probabilities(&filter.filtered_posterior(&model.s).unwrap());
        prop_assert!((got[0] - expected[0]).abs() < 1e-9, "{:?} vs {:?}", got, expected);
        prop_assert_eq!(filter.time_of_last_evidence(), Some(observations.len() as u64 - 1));
    }

    /// One batch and one run per slice end in the same belief.
    #[test]
    fn batch_equals_incremental(observations in prop::collection::vec(-4.0..5.0f64, 1..10)) {
        let model = gaussian_hmm();
        let mut batch = engine(&model);
        let mut incremental = engine(&model);
        for (t, x) in observations.iter().enumerate() {
            let slice = DynamicAssignment::new(t as u64).with_value(&model.x, *x);
            batch.add_dynamic_evidence(slice.clone()).unwrap();
            incremental.add_dynamic_evidence(slice).unwrap();
            incremental.run_inference().unwrap();
        }
        batch.run_inference().unwrap();

        let a = probabilities(&batch.filtered_posterior(&model.s).unwrap());
        let b = probabilities(&incremental.filtered_posterior(&model.s).unwrap());
        prop_assert!((a[0] - b[0]).abs() < 1e-12);
    }

    /// Zero steps ahead is the filtered posterior.
    #[test]
    fn predictive_identity(x in -4.0..5.0f64) {
        let model = gaussian_hmm();
        let mut filter = engine(&model);
        filter
            .add_dynamic_evidence(DynamicAssignment::new(0).with_value(&model.x, x))
            .unwrap();
        filter.run_inference().unwrap();
        for variable in [&model.s, &model.x] {
            prop_assert_eq!(
                filter.predictive_posterior(variable, 0).unwrap(),
                filter.filtered_posterior(variable).unwrap()
            );
        }
    }
}

#[test]
fn predictive_matches_evidence_free_steps() {
    let model = gaussian_hmm();
    let mut filter = engine(&model);
    filter
        .add_dynamic_evidence(DynamicAssignment::new(0).with_value(&model.x, 1.5))
        .unwrap();
    filter.run_inference().unwrap();
    let ahead = probabilities(&filter.predictive_posterior(&model.s, 4).unwrap());
    assert_eq!(filter.time_of_posterior(), Some(4));
    assert_eq!(filter.time_of_last_evidence(), Some(0));

    filter.add_dynamic_evidence(DynamicAssignment::new(4)).unwrap();
    filter.run_inference().unwrap();
    let walked = probabilities(&filter.filtered_posterior(&model.s).unwrap());
    assert!((ahead[1] - walked[1]).abs() < 1e-12);
}

#[test]
fn observation_posterior_is_a_mixture_of_emissions() {
    let model = gaussian_hmm();
    let mut filter = engine(&model);
    filter
        .add_dynamic_evidence(DynamicAssignment::new(0).with_value(&model.x, 0.5))
        .unwrap();
    filter.run_inference().unwrap();

    let alpha = reference_forward(&[0.5]);
    let predicted: Vec<f64> = (0..2)
        .map(|j| (0..2).map(|i| alpha[i] * TRANSITION[i][j]).sum())
        .collect();
    match filter.predictive_posterior(&model.x, 1).unwrap() {
        UnivariateDistribution::Mixture { weights, components } => {
            assert_eq!(components.len(), 2);
            for k in 0..2 {
                assert!((weights[k] - predicted[k]).abs() < 1e-12);
                match components[k] {
                    UnivariateDistribution::Normal { mean, variance } => {
                        assert!((mean - MEANS[k]).abs() < 1e-12);
                        assert!((variance - VARIANCES[k]).abs() < 1e-12);
                    }
                    ref other => panic!("unexpected component {other:?}"),
                }
            }
        }
        other => panic!("expected a mixture, got {other:?}"),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn lifecycle_errors() {
    let model = gaussian_hmm();
    let mut filter = ForwardFilter::default();
    assert_eq!(filter.state(), EngineState::Idle);
    assert!(matches!(filter.run_inference(), Err(Error::Precondition(_))));
    assert!(matches!(filter.filtered_posterior(&model.s), Err(Error::Precondition(_))));

    filter.set_model(Arc::clone(&model.net)).unwrap();
    assert!(matches!(filter.filtered_posterior(&model.s), Err(Error::NoPosterior)));
    // Nothing pending is a no-op
    filter.run_inference().unwrap();
    assert_eq!(filter.state(), EngineState::Ready);

    // Third variable of another set: its id is out of range for this model
    let stranger = {
        let mut vars = DynamicVariables::new();
        vars.new_multinomial_variable("A", 2).unwrap();
        vars.new_multinomial_variable("B", 2).unwrap();
        vars.new_multinomial_variable("C", 2).unwrap()
    };
    filter.add_dynamic_evidence(DynamicAssignment::new(0)).unwrap();
    filter.run_inference().unwrap();
    assert!(matches!(
        filter.filtered_posterior(&stranger),
        Err(Error::UnknownVariable(_))
    ));
    assert!(matches!(
        filter.add_dynamic_evidence(DynamicAssignment::new(1).with_value(&stranger, 0.0)),
        Err(Error::UnknownVariable(_))
    ));
    assert!(filter.set_model(Arc::clone(&model.net)).is_err());
    filter.reset().unwrap();
    filter.set_model(Arc::clone(&model.net)).unwrap();
    assert!(Arc::ptr_eq(filter.original_model().unwrap(), &model.net));
}

#[test]
fn horizon_limits_gaps_and_queries() {
    let model = gaussian_hmm();
    let mut filter = ForwardFilter::new(InferenceConfig {
        max_predictive_horizon: 5,
        ..InferenceConfig::default()
    });
    filter.set_model(Arc::clone(&model.net)).unwrap();
    assert!(filter.add_dynamic_evidence(DynamicAssignment::new(6)).is_err());
    filter.add_dynamic_evidence(DynamicAssignment::new(5)).unwrap();
    filter.run_inference().unwrap();
    assert!(filter.predictive_posterior(&model.s, 5).is_ok());
    assert!(matches!(
        filter.predictive_posterior(&model.s, 6),
        Err(Error::Precondition(_))
    ));
}

#[test]
fn gamma_evidence_outside_support_is_rejected() {
    let mut vars = DynamicVariables::new();
    let y = vars.new_real_variable("Y", DistributionType::Gamma).unwrap();
    let net = DynamicBayesianNetwork::new(DynamicDag::new(Arc::new(vars))).unwrap();
    let mut filter = ForwardFilter::default();
    filter.set_model(Arc::new(net)).unwrap();
    assert!(matches!(
        filter.add_dynamic_evidence(DynamicAssignment::new(0).with_value(&y, -1.0)),
        Err(Error::Precondition(_))
    ));
    filter
        .add_dynamic_evidence(DynamicAssignment::new(0).with_value(&y, 2.0))
        .unwrap();
    filter.run_inference().unwrap();
    assert_eq!(
        filter.filtered_posterior(&y).unwrap(),
        UnivariateDistribution::Degenerate { value: 2.0 }
    );
    // No finite parents: the prediction is the transition distribution itself
    assert_eq!(
        filter.predictive_posterior(&y, 1).unwrap(),
        UnivariateDistribution::Gamma {
            shape: 1.0,
            rate: 1.0,
        }
    );
}

// ============================================================================
// Learning
// ============================================================================

#[test]
fn learning_recovers_sampled_parameters() {
    let model = gaussian_hmm();
    let mut rng = StdRng::seed_from_u64(7);
    let sequences: Vec<Vec<DynamicAssignment>> = (0..400)
        .map(|_| model.net.sample_sequence(50, &mut rng).unwrap())
        .collect();

    let mut blank = (*model.net).clone();
    blank.random_initialization(&mut StdRng::seed_from_u64(1)).unwrap();
    let learned = fit(&blank, &sequences, &LearningConfig::default()).unwrap();

    let transition = learned.conditional_time_t(&model.s).unwrap();
    for (k, row) in TRANSITION.iter().enumerate() {
        let estimate = transition.component(k).unwrap().to_univariate_distribution().unwrap();
        let p = estimate.probabilities().unwrap();
        assert!((p[0] - row[0]).abs() < 0.03, "row {k}: {p:?}");
    }
    let emission = learned.conditional_time_t(&model.x).unwrap();
    for k in 0..2 {
        match emission.component(k).unwrap().to_univariate_distribution().unwrap() {
            UnivariateDistribution::Normal { mean, variance } => {
                assert!((mean - MEANS[k]).abs() < 0.05, "mean {mean}");
                assert!((variance - VARIANCES[k]).abs() < 0.08, "variance {variance}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

// ============================================================================
// Description bridge
// ============================================================================

#[test]
fn description_survives_a_file_round_trip() {
    let model = gaussian_hmm();
    let description = DescriptionConverter.from_model(&model.net).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&description).unwrap()).unwrap();
    let loaded: NetworkDescription = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(loaded, description);
    let rebuilt = Arc::new(DescriptionConverter.to_model(&loaded).unwrap());

    let originals = model.net.conditionals_time0().iter().chain(model.net.conditionals_time_t());
    let copies = rebuilt.conditionals_time0().iter().chain(rebuilt.conditionals_time_t());
    for (a, b) in originals.zip(copies) {
        for (ca, cb) in a.components().zip(b.components()) {
            let bits = |c: &[f64]| c.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
            assert_eq!(bits(ca.natural_parameters().as_slice()), bits(cb.natural_parameters().as_slice()));
        }
    }

    let observations = [0.3, 1.9, -0.7];
    let posterior = |net: Arc<DynamicBayesianNetwork>| {
        let x = Arc::clone(net.variables().variable_by_name("X").unwrap());
        let s = Arc::clone(net.variables().variable_by_name("S").unwrap());
        let mut filter = ForwardFilter::default();
        filter.set_model(net).unwrap();
        for (t, value) in observations.iter().enumerate() {
            filter
                .add_dynamic_evidence(DynamicAssignment::new(t as u64).with_value(&x, *value))
                .unwrap();
        }
        filter.run_inference().unwrap();
        probabilities(&filter.filtered_posterior(&s).unwrap())
    };
    let a = posterior(Arc::clone(&model.net));
    let b = posterior(rebuilt);
    assert!((a[0] - b[0]).abs() < 1e-12);
}

#[test]
fn discrete_only_caller_rejects_loaded_mixed_model() {
    let model = gaussian_hmm();
    let description = DescriptionConverter.from_model(&model.net).unwrap();
    let rebuilt = DescriptionConverter.to_model(&description).unwrap();

    let err = rebuilt
        .variables()
        .require_state_space(StateSpaceKind::Finite)
        .unwrap_err();
    match err {
        Error::Configuration { offending, .. } => assert_eq!(offending, vec!["X"]),
        other => panic!("unexpected error: {other}"),
    }
    let err = rebuilt
        .variables()
        .require_state_space(StateSpaceKind::Real)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { ref offending, .. } if offending == &["S"]));
}
