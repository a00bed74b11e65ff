//! Maximum-likelihood parameter learning from fully observed sequences.
//!
//! Statistics are summed per conditional distribution and per parent
//! configuration. On commit every configuration that saw data gets
//! moments = mean statistic, mapped back to natural parameters by the
//! family. Multinomial cells are smoothed with a pseudo-count.

use crate::exponential_family::{ConditionalDistribution, MomentParameters, ParameterVector};
use crate::inference::DynamicAssignment;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::model::network::parent_states;
use crate::model::DynamicBayesianNetwork;
use crate::variables::DistributionType;
use ef_common::{Error, Result};
use ef_config::LearningConfig;

/// Summed statistics and observation counts, one entry per configuration.
#[derive(Debug, Clone)]
struct Accumulator {
    sums: Vec<ParameterVector>,
    counts: Vec<f64>,
}

impl Accumulator {
    fn for_conditional(cd: &ConditionalDistribution) -> Self {
        Self {
            sums: cd.components().map(|c| c.create_zero_sufficient_statistics()).collect(),
            counts: vec![0.0; cd.number_of_parent_configurations()],
        }
    }

    fn matches(&self, cd: &ConditionalDistribution) -> bool {
        self.counts.len() == cd.number_of_parent_configurations()
    }
}

#[derive(Debug, Clone)]
pub struct MaximumLikelihood {
    pseudocount: f64,
    ctx: LogContext,
    time0: Vec<Accumulator>,
    time_t: Vec<Accumulator>,
    sequences: usize,
}

impl MaximumLikelihood {
    /// Empty accumulators shaped after `model`.
    pub fn new(model: &DynamicBayesianNetwork, config: &LearningConfig) -> Result<Self> {
        if !config.multinomial_pseudocount.is_finite() || config.multinomial_pseudocount < 0.0 {
            return Err(Error::Config(format!(
                "multinomial_pseudocount must be finite and non-negative, got {}",
                config.multinomial_pseudocount
            )));
        }
        Ok(Self {
            pseudocount: config.multinomial_pseudocount,
            ctx: LogContext::generate(),
            time0: model
                .conditionals_time0()
                .iter()
                .map(Accumulator::for_conditional)
                .collect(),
            time_t: model
                .conditionals_time_t()
                .iter()
                .map(Accumulator::for_conditional)
                .collect(),
            sequences: 0,
        })
    }

    pub fn with_context(mut self, ctx: LogContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Number of sequences accumulated so far.
    pub fn number_of_sequences(&self) -> usize {
        self.sequences
    }

    /// Observations seen by configuration `configuration` of the transition
    /// distribution at `slot` (present-variable index).
    pub fn transition_count(&self, slot: usize, configuration: usize) -> Option<f64> {
        self.time_t.get(slot)?.counts.get(configuration).copied()
    }

    /// Add one sequence. Slices must be consecutive, start at time 0 and
    /// observe every variable. Nothing is accumulated when any slice fails.
    pub fn update_sequence(
        &mut self,
        model: &DynamicBayesianNetwork,
        sequence: &[DynamicAssignment],
    ) -> Result<()> {
        self.check_shape(model)?;
        check_timeline(sequence)?;

        let variables = model.variables();
        let mut time0 = self.time0.clone();
        let mut time_t = self.time_t.clone();
        let mut previous: Option<&DynamicAssignment> = None;
        for slice in sequence {
            let (conditionals, accumulators) = match previous {
                None => (model.conditionals_time0(), &mut time0),
                Some(_) => (model.conditionals_time_t(), &mut time_t),
            };
            for (cd, acc) in conditionals.iter().zip(accumulators.iter_mut()) {
                let value = slice.value(cd.variable()).ok_or_else(|| {
                    Error::Precondition(format!(
                        "slice {} has no value for {}",
                        slice.time_id(),
                        cd.variable().name()
                    ))
                })?;
                let states = parent_states(cd, variables, slice, previous)?;
                let c = cd.parent_configuration_index(&states)?;
                let local = cd.component(c)?.sufficient_statistics(value)?;
                acc.sums[c].sum(&local)?;
                acc.counts[c] += 1.0;
            }
            previous = Some(slice);
        }

        self.time0 = time0;
        self.time_t = time_t;
        self.sequences += 1;
        log_event!(
            self.ctx,
            DEBUG,
            event_names::LEARN_SEQUENCE_ADDED,
            Stage::Learn,
            "sequence accumulated",
            slices = sequence.len(),
            sequences = self.sequences
        );
        Ok(())
    }

    /// Write the estimates into `model`. Configurations without data keep
    /// their parameters. On error `model` is left untouched.
    pub fn commit(&self, model: &mut DynamicBayesianNetwork) -> Result<()> {
        self.check_shape(model)?;
        let mut staged = model.clone();
        let mut updated = 0usize;
        let variables = staged.variables().clone();
        for variable in variables.iter() {
            let slot = variable.index();
            updated += self.estimate(staged.conditional_time0_mut(variable)?, &self.time0[slot])?;
            updated += self.estimate(staged.conditional_time_t_mut(variable)?, &self.time_t[slot])?;
        }
        *model = staged;
        log_event!(
            self.ctx,
            INFO,
            event_names::LEARN_COMMITTED,
            Stage::Learn,
            "parameters committed",
            sequences = self.sequences,
            configurations = updated
        );
        Ok(())
    }

    fn estimate(&self, cd: &mut ConditionalDistribution, acc: &Accumulator) -> Result<usize> {
        let mut updated = 0;
        for (c, (sum, count)) in acc.sums.iter().zip(&acc.counts).enumerate() {
            if *count == 0.0 {
                continue;
            }
            let component = cd.component_mut(c)?;
            let moments = match component.distribution_type() {
                DistributionType::Multinomial => smoothed_frequencies(sum, *count, self.pseudocount),
                _ => mean_statistics(sum, *count),
            };
            component.set_moment_parameters(moments)?;
            updated += 1;
        }
        Ok(updated)
    }

    fn check_shape(&self, model: &DynamicBayesianNetwork) -> Result<()> {
        let fits = |accs: &[Accumulator], cds: &[ConditionalDistribution]| {
            accs.len() == cds.len() && accs.iter().zip(cds).all(|(a, cd)| a.matches(cd))
        };
        if fits(&self.time0, model.conditionals_time0()) && fits(&self.time_t, model.conditionals_time_t()) {
            Ok(())
        } else {
            Err(Error::Precondition(
                "model structure differs from the one the learner was built for".into(),
            ))
        }
    }
}

fn check_timeline(sequence: &[DynamicAssignment]) -> Result<()> {
    let first = sequence
        .first()
        .ok_or_else(|| Error::Precondition("cannot learn from an empty sequence".into()))?;
    if first.time_id() != 0 {
        return Err(Error::Precondition(format!(
            "sequence starts at time {}, expected 0",
            first.time_id()
        )));
    }
    for pair in sequence.windows(2) {
        if pair[1].time_id() != pair[0].time_id() + 1 {
            return Err(Error::Precondition(format!(
                "slices {} and {} are not consecutive",
                pair[0].time_id(),
                pair[1].time_id()
            )));
        }
        if pair[1].sequence_id() != pair[0].sequence_id() {
            return Err(Error::Precondition(format!(
                "slice {} belongs to another sequence",
                pair[1].time_id()
            )));
        }
    }
    Ok(())
}

fn mean_statistics(sum: &ParameterVector, count: f64) -> MomentParameters {
    let mut moments = sum.clone();
    moments.divide_by(count);
    moments
}

fn smoothed_frequencies(sum: &ParameterVector, count: f64, pseudocount: f64) -> MomentParameters {
    let total = count + pseudocount * sum.len() as f64;
    ParameterVector::from_vec(sum.iter().map(|s| (s + pseudocount) / total).collect())
}

/// Learn from `sequences` and return the re-estimated copy of `model`.
pub fn fit(
    model: &DynamicBayesianNetwork,
    sequences: &[Vec<DynamicAssignment>],
    config: &LearningConfig,
) -> Result<DynamicBayesianNetwork> {
    let mut learner = MaximumLikelihood::new(model, config)?;
    for sequence in sequences {
        learner.update_sequence(model, sequence)?;
    }
    let mut learned = model.clone();
    learner.commit(&mut learned)?;
    Ok(learned)
}
