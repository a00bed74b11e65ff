//! Criterion benchmarks for exact forward filtering.
//!
//! Benchmarks `run_inference` over a chain of hidden multinomial variables
//! with Gaussian observations, for growing joint state spaces, plus
//! predictive posterior queries.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ef_core::{
    DistributionType, DynamicAssignment, DynamicBayesianNetwork, DynamicDag, DynamicInference,
    DynamicVariables, ForwardFilter, Variable,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────

/// `hidden` coupled multinomial chains with `states` states each, one
/// Gaussian observation per chain. Parameters are random but seeded.
fn coupled_chains(hidden: usize, states: usize) -> (Arc<DynamicBayesianNetwork>, Vec<Arc<Variable>>) {
    let mut vars = DynamicVariables::new();
    let chains: Vec<Arc<Variable>> = (0..hidden)
        .map(|i| vars.new_multinomial_variable(format!("H{i}"), states).expect("chain variable"))
        .collect();
    let observations: Vec<Arc<Variable>> = (0..hidden)
        .map(|i| vars.new_real_variable(format!("Y{i}"), DistributionType::Normal).expect("observation"))
        .collect();
    let vars = Arc::new(vars);

    let mut dag = DynamicDag::new(Arc::clone(&vars));
    for (i, (h, y)) in chains.iter().zip(&observations).enumerate() {
        dag.add_parent_time0(y, h).expect("edge");
        dag.add_parent_time_t(y, h).expect("edge");
        let own_past = vars.interface_of(h).expect("interface");
        dag.add_parent_time_t(h, own_past).expect("edge");
        if i > 0 {
            let neighbour_past = vars.interface_of(&chains[i - 1]).expect("interface");
            dag.add_parent_time_t(h, neighbour_past).expect("edge");
        }
    }
    let mut net = DynamicBayesianNetwork::new(dag).expect("network");
    net.random_initialization(&mut StdRng::seed_from_u64(42))
        .expect("random initialization");
    (Arc::new(net), observations)
}

fn evidence(observations: &[Arc<Variable>], length: usize) -> Vec<DynamicAssignment> {
    (0..length)
        .map(|t| {
            observations.iter().enumerate().fold(
                DynamicAssignment::new(t as u64),
                |slice, (i, y)| slice.with_value(y, ((t * 7 + i * 3) % 11) as f64 - 5.0),
            )
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_run_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_filter");

    for (hidden, states) in [(1, 2), (2, 3), (3, 4)] {
        let (net, observations) = coupled_chains(hidden, states);
        let slices = evidence(&observations, 50);
        let joint = states.pow(hidden as u32);
        group.bench_with_input(
            BenchmarkId::new("run_inference_50_slices", format!("joint_{joint}")),
            &slices,
            |b, slices| {
                b.iter(|| {
                    let mut filter = ForwardFilter::default();
                    filter.set_model(Arc::clone(&net)).expect("bind");
                    for slice in slices {
                        filter.add_dynamic_evidence(slice.clone()).expect("evidence");
                    }
                    filter.run_inference().expect("inference");
                    black_box(filter.time_of_last_evidence());
                })
            },
        );
    }

    let (net, observations) = coupled_chains(2, 3);
    let mut filter = ForwardFilter::default();
    filter.set_model(Arc::clone(&net)).expect("bind");
    for slice in evidence(&observations, 10) {
        filter.add_dynamic_evidence(slice).expect("evidence");
    }
    filter.run_inference().expect("inference");
    let target = &observations[1];
    group.bench_function("predictive_posterior_20_steps", |b| {
        b.iter(|| {
            let posterior = filter
                .predictive_posterior(black_box(target), 20)
                .expect("posterior");
            black_box(posterior.mean());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_run_inference);
criterion_main!(benches);
