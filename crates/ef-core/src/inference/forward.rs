//! Exact forward filtering.
//!
//! The belief at time t is a log-weight vector over the joint state of all
//! finite variables of the slice. One step combines the previous belief
//! with the transition distributions:
//!
//! ```text
//! log α_t(j) = log Σ_p exp(log α_{t-1}(p) + Σ_X log p(x_j | pa_X(j, p))) − log Z_t
//! ```
//!
//! where the inner sum runs over finite variables and over continuous
//! variables observed at t. Continuous variables are leaves, so unobserved
//! ones integrate to one and drop out. The first slice uses the time-0
//! distributions and has no predecessor.

use super::joint::JointSpace;
use super::{DynamicAssignment, DynamicInference, EngineState};
use crate::distribution::UnivariateDistribution;
use crate::exponential_family::ConditionalDistribution;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::model::DynamicBayesianNetwork;
use crate::variables::Variable;
use ef_common::{Error, Result, SequenceId, TimeId, VariableId};
use ef_config::{EngineConfig, InferenceConfig};
use ef_math::{log_add_exp, log_normalize, log_sum_exp};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sentinel stored in `posterior_time` before any successful query.
const NO_POSTERIOR_TIME: u64 = u64::MAX;

type Evidence = BTreeMap<VariableId, f64>;

/// A network bound to the engine with its joint enumeration.
#[derive(Debug)]
struct Bound {
    model: Arc<DynamicBayesianNetwork>,
    space: JointSpace,
    digits: Vec<Vec<usize>>,
}

/// Committed belief over one slice.
#[derive(Debug, Clone)]
struct SliceBelief {
    time: TimeId,
    log_weights: Vec<f64>,
    /// Belief over the previous slice; `None` at time 0.
    predecessor: Option<Vec<f64>>,
    evidence: Evidence,
}

impl Bound {
    fn new(model: Arc<DynamicBayesianNetwork>, max_joint_states: usize) -> Result<Self> {
        let space = JointSpace::new(model.variables(), max_joint_states)?;
        let digits = space.all_digits();
        Ok(Self {
            model,
            space,
            digits,
        })
    }

    fn parent_states(
        &self,
        cd: &ConditionalDistribution,
        current: &[usize],
        previous: Option<&[usize]>,
    ) -> Result<Vec<usize>> {
        cd.parents()
            .iter()
            .map(|parent| {
                let slot = self.space.slot_of(parent).ok_or_else(|| {
                    Error::Inference(format!("parent {} is not finite", parent.name()))
                })?;
                if parent.is_interface() {
                    previous.map(|digits| digits[slot]).ok_or_else(|| {
                        Error::Inference(format!("interface parent {} in the first slice", parent.name()))
                    })
                } else {
                    Ok(current[slot])
                }
            })
            .collect()
    }

    /// Sum of local log-factors of joint state `current` given `previous`.
    fn local(&self, current: &[usize], previous: Option<&[usize]>, evidence: &Evidence) -> Result<f64> {
        let conditionals = if previous.is_none() {
            self.model.conditionals_time0()
        } else {
            self.model.conditionals_time_t()
        };
        let mut total = 0.0;
        for cd in conditionals {
            let variable = cd.variable();
            let value = match self.space.slot_of(variable) {
                Some(slot) => current[slot] as f64,
                None => match evidence.get(&variable.id()) {
                    Some(value) => *value,
                    None => continue,
                },
            };
            let states = self.parent_states(cd, current, previous)?;
            total += cd.log_conditional_probability(value, &states)?;
            if total == f64::NEG_INFINITY {
                break;
            }
        }
        Ok(total)
    }

    /// (slot, state) pairs fixed by finite evidence.
    fn finite_evidence(&self, evidence: &Evidence) -> Vec<(usize, usize)> {
        evidence
            .iter()
            .filter_map(|(id, value)| {
                let variable = self.model.variables().get(*id)?;
                self.space.slot_of(variable).map(|slot| (slot, *value as usize))
            })
            .collect()
    }

    /// Belief at `time` from the belief one slice earlier (or the prior).
    fn step(&self, time: TimeId, predecessor: Option<&[f64]>, evidence: Evidence) -> Result<SliceBelief> {
        let fixed = self.finite_evidence(&evidence);
        let mut log_weights = vec![f64::NEG_INFINITY; self.space.size()];
        for (j, current) in self.digits.iter().enumerate() {
            if fixed.iter().any(|(slot, state)| current[*slot] != *state) {
                continue;
            }
            log_weights[j] = match predecessor {
                None => self.local(current, None, &evidence)?,
                Some(previous_weights) => {
                    let mut terms = Vec::with_capacity(previous_weights.len());
                    for (weight, previous) in previous_weights.iter().zip(&self.digits) {
                        if *weight == f64::NEG_INFINITY {
                            continue;
                        }
                        terms.push(weight + self.local(current, Some(previous), &evidence)?);
                    }
                    log_sum_exp(&terms)
                }
            };
        }

        let log_z = log_normalize(&mut log_weights);
        if log_z.is_nan() {
            return Err(Error::NumericalInstability(format!(
                "belief at time {} is not a number",
                time
            )));
        }
        if log_z == f64::NEG_INFINITY {
            return Err(Error::Inference(format!(
                "evidence at time {} has zero probability under the model",
                time
            )));
        }
        Ok(SliceBelief {
            time,
            log_weights,
            predecessor: predecessor.map(<[f64]>::to_vec),
            evidence,
        })
    }

    /// Evidence-free transitions until the belief reaches `until`.
    fn propagate(&self, mut belief: SliceBelief, until: TimeId) -> Result<SliceBelief> {
        while belief.time < until {
            belief = self.step(belief.time + 1, Some(&belief.log_weights), Evidence::new())?;
        }
        Ok(belief)
    }

    /// Fold one assignment into `belief`.
    fn advance(&self, belief: Option<SliceBelief>, assignment: &DynamicAssignment) -> Result<SliceBelief> {
        let time = assignment.time_id();
        let evidence: Evidence = assignment.values().collect();
        match belief {
            None if time == 0 => self.step(0, None, evidence),
            None => {
                let prior = self.step(0, None, Evidence::new())?;
                let before = self.propagate(prior, time - 1)?;
                self.step(time, Some(&before.log_weights), evidence)
            }
            Some(current) if current.time == time => {
                let mut merged = current.evidence;
                merged.extend(evidence);
                self.step(time, current.predecessor.as_deref(), merged)
            }
            Some(current) => {
                let before = self.propagate(current, time - 1)?;
                self.step(time, Some(&before.log_weights), evidence)
            }
        }
    }

    fn posterior_at(&self, belief: &SliceBelief, variable: &Variable) -> Result<UnivariateDistribution> {
        if let Some(slot) = self.space.slot_of(variable) {
            let states = variable.number_of_states().unwrap_or(0);
            let mut probabilities = vec![0.0; states];
            for (weight, digits) in belief.log_weights.iter().zip(&self.digits) {
                probabilities[digits[slot]] += weight.exp();
            }
            let total: f64 = probabilities.iter().sum();
            probabilities.iter_mut().for_each(|p| *p /= total);
            return Ok(UnivariateDistribution::Multinomial { probabilities });
        }
        if let Some(value) = belief.evidence.get(&variable.id()) {
            return Ok(UnivariateDistribution::Degenerate { value: *value });
        }

        let cd = match belief.predecessor {
            None => self.model.conditional_time0(variable)?,
            Some(_) => self.model.conditional_time_t(variable)?,
        };
        let mut config_weights = vec![f64::NEG_INFINITY; cd.number_of_parent_configurations()];
        let has_interface_parent = cd.parents().iter().any(|p| p.is_interface());
        match &belief.predecessor {
            Some(previous_weights) if has_interface_parent => {
                // Pairwise (t-1, t) belief; the filtered marginal alone cannot
                // supply interface parent states.
                for (current, weight) in self.digits.iter().zip(&belief.log_weights) {
                    if *weight == f64::NEG_INFINITY {
                        continue;
                    }
                    for (previous, previous_weight) in self.digits.iter().zip(previous_weights) {
                        if *previous_weight == f64::NEG_INFINITY {
                            continue;
                        }
                        let pair = previous_weight + self.local(current, Some(previous), &belief.evidence)?;
                        let states = self.parent_states(cd, current, Some(previous))?;
                        let c = cd.parent_configuration_index(&states)?;
                        config_weights[c] = log_add_exp(config_weights[c], pair);
                    }
                }
            }
            _ => {
                for (current, weight) in self.digits.iter().zip(&belief.log_weights) {
                    let states = self.parent_states(cd, current, None)?;
                    let c = cd.parent_configuration_index(&states)?;
                    config_weights[c] = log_add_exp(config_weights[c], *weight);
                }
            }
        }
        if log_normalize(&mut config_weights) == f64::NEG_INFINITY {
            return Err(Error::Inference(format!(
                "no parent configuration of {} has mass",
                variable.name()
            )));
        }

        let mut weights = Vec::new();
        let mut components = Vec::new();
        for (c, weight) in config_weights.iter().enumerate() {
            if *weight > f64::NEG_INFINITY {
                weights.push(weight.exp());
                components.push(cd.component(c)?.to_univariate_distribution()?);
            }
        }
        if components.len() == 1 {
            if let Some(only) = components.pop() {
                return Ok(only);
            }
        }
        Ok(UnivariateDistribution::Mixture {
            weights,
            components,
        })
    }
}

/// Exact filtering engine for networks whose finite slice state is small
/// enough to enumerate.
#[derive(Debug)]
pub struct ForwardFilter {
    config: InferenceConfig,
    ctx: LogContext,
    bound: Option<Bound>,
    pending: Vec<DynamicAssignment>,
    belief: Option<SliceBelief>,
    sequence: Option<SequenceId>,
    posterior_time: AtomicU64,
    state: EngineState,
}

impl Default for ForwardFilter {
    fn default() -> Self {
        Self::new(InferenceConfig::default())
    }
}

impl ForwardFilter {
    pub fn new(config: InferenceConfig) -> Self {
        Self::with_context(config, LogContext::generate())
    }

    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self::new(config.inference.clone())
    }

    /// Engine tagged with a caller-chosen run id.
    pub fn with_context(config: InferenceConfig, ctx: LogContext) -> Self {
        Self {
            config,
            ctx,
            bound: None,
            pending: Vec::new(),
            belief: None,
            sequence: None,
            posterior_time: AtomicU64::new(NO_POSTERIOR_TIME),
            state: EngineState::Idle,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.ctx.run_id
    }

    /// Number of assignments waiting for `run_inference`.
    pub fn pending_evidence(&self) -> usize {
        self.pending.len()
    }

    fn bound(&self) -> Result<&Bound> {
        self.bound
            .as_ref()
            .ok_or_else(|| Error::Precondition("no model bound; call set_model first".into()))
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.belief = None;
        self.sequence = None;
        self.posterior_time.store(NO_POSTERIOR_TIME, Ordering::Relaxed);
    }

    /// Latest time among pending and incorporated evidence.
    fn frontier(&self) -> Option<TimeId> {
        self.pending
            .last()
            .map(|a| a.time_id())
            .or_else(|| self.belief.as_ref().map(|b| b.time))
    }

    fn validate_evidence(&self, assignment: &DynamicAssignment) -> Result<()> {
        let bound = self.bound()?;
        if let Some(sequence) = self.sequence {
            if sequence != assignment.sequence_id() {
                return Err(Error::Precondition(format!(
                    "evidence belongs to sequence {}, engine is tracking sequence {}",
                    assignment.sequence_id(),
                    sequence
                )));
            }
        }

        let time = assignment.time_id();
        let frontier = self.frontier();
        if let Some(frontier) = frontier {
            if time < frontier {
                return Err(Error::Precondition(format!(
                    "time {} precedes the evidence frontier {}",
                    time, frontier
                )));
            }
        }
        let gap = time - frontier.unwrap_or(0);
        if gap > self.config.max_predictive_horizon {
            return Err(Error::Precondition(format!(
                "gap of {} slices exceeds max_predictive_horizon {}",
                gap, self.config.max_predictive_horizon
            )));
        }

        let variables = bound.model.variables();
        for (id, value) in assignment.values() {
            let variable = variables
                .get(id)
                .ok_or_else(|| Error::UnknownVariable(id.to_string()))?;
            if variable.is_interface() {
                return Err(Error::Precondition(format!(
                    "evidence must name present variables, got {}",
                    variable.name()
                )));
            }
            if variable.is_finite() {
                variable.state_index(value)?;
            } else {
                let family = bound.model.conditional_time0(variable)?.component(0)?;
                if !variable.state_space().contains(value) || !family.in_support(value) {
                    return Err(Error::Precondition(format!(
                        "{} is outside the support of {}",
                        value,
                        variable.name()
                    )));
                }
            }

            let pending = self
                .pending
                .iter()
                .filter(|a| a.time_id() == time)
                .filter_map(|a| a.value_by_id(id));
            let committed = self
                .belief
                .iter()
                .filter(|b| b.time == time)
                .filter_map(|b| b.evidence.get(&id).copied());
            if pending.chain(committed).any(|earlier| earlier != value) {
                return Err(Error::Precondition(format!(
                    "conflicting values for {} at time {}",
                    variable.name(),
                    time
                )));
            }
        }
        Ok(())
    }

    fn check_query_variable(&self, bound: &Bound, variable: &Variable) -> Result<()> {
        bound.model.variables().check_member(variable)?;
        if variable.is_interface() {
            return Err(Error::Precondition(format!(
                "posteriors are defined for present variables, got {}",
                variable.name()
            )));
        }
        Ok(())
    }

    fn record_query(&self, variable: &Variable, time: TimeId) {
        self.posterior_time.store(time, Ordering::Relaxed);
        log_event!(
            self.ctx,
            DEBUG,
            event_names::POSTERIOR_QUERIED,
            Stage::Query,
            "posterior computed",
            variable = variable.name(),
            time_id = time
        );
    }
}

impl DynamicInference for ForwardFilter {
    fn set_model(&mut self, model: Arc<DynamicBayesianNetwork>) -> Result<()> {
        if self.state == EngineState::Evidenced {
            return Err(Error::Precondition(
                "engine holds evidence; call reset before binding a new model".into(),
            ));
        }
        let bound = match Bound::new(model, self.config.max_joint_states) {
            Ok(bound) => bound,
            Err(err) => {
                log_event!(
                    self.ctx,
                    WARN,
                    event_names::MODEL_REJECTED,
                    Stage::Bind,
                    "model rejected",
                    error = tracing::field::display(&err)
                );
                return Err(err);
            }
        };
        log_event!(
            self.ctx,
            INFO,
            event_names::MODEL_BOUND,
            Stage::Bind,
            "model bound",
            variables = bound.model.variables().len(),
            finite_variables = bound.space.finite().len(),
            joint_states = bound.space.size()
        );
        self.bound = Some(bound);
        self.clear();
        self.state = EngineState::Ready;
        Ok(())
    }

    fn original_model(&self) -> Result<&Arc<DynamicBayesianNetwork>> {
        Ok(&self.bound()?.model)
    }

    fn add_dynamic_evidence(&mut self, assignment: DynamicAssignment) -> Result<()> {
        if let Err(err) = self.validate_evidence(&assignment) {
            log_event!(
                self.ctx,
                WARN,
                event_names::EVIDENCE_REJECTED,
                Stage::Evidence,
                "evidence rejected",
                time_id = assignment.time_id(),
                error = tracing::field::display(&err)
            );
            return Err(err);
        }
        self.sequence.get_or_insert(assignment.sequence_id());
        log_event!(
            self.ctx,
            DEBUG,
            event_names::EVIDENCE_ADDED,
            Stage::Evidence,
            "evidence queued",
            time_id = assignment.time_id(),
            observed = assignment.len()
        );
        self.pending.push(assignment);
        Ok(())
    }

    fn run_inference(&mut self) -> Result<()> {
        let bound = self
            .bound
            .as_ref()
            .ok_or_else(|| Error::Precondition("no model bound; call set_model first".into()))?;
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        log_event!(
            self.ctx,
            INFO,
            event_names::INFER_STARTED,
            Stage::Infer,
            "incorporating evidence",
            assignments = batch.len()
        );

        let mut belief = self.belief.clone();
        for assignment in &batch {
            match bound.advance(belief, assignment) {
                Ok(next) => {
                    log_event!(
                        self.ctx,
                        DEBUG,
                        event_names::INFER_SLICE_DONE,
                        Stage::Infer,
                        "slice filtered",
                        time_id = next.time
                    );
                    belief = Some(next);
                }
                Err(err) => {
                    log_event!(
                        self.ctx,
                        WARN,
                        event_names::INFER_FAILED,
                        Stage::Infer,
                        "inference failed; batch discarded",
                        time_id = assignment.time_id(),
                        error = tracing::field::display(&err)
                    );
                    return Err(err);
                }
            }
        }

        let time = belief.as_ref().map(|b| b.time);
        self.belief = belief;
        self.state = EngineState::Evidenced;
        log_event!(
            self.ctx,
            INFO,
            event_names::INFER_FINISHED,
            Stage::Infer,
            "evidence incorporated",
            time_id = time.unwrap_or_default()
        );
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        if self.state == EngineState::Idle {
            return Err(Error::Precondition("no model bound; nothing to reset".into()));
        }
        self.clear();
        self.state = EngineState::Ready;
        log_event!(self.ctx, INFO, event_names::ENGINE_RESET, Stage::Bind, "engine reset");
        Ok(())
    }

    fn filtered_posterior(&self, variable: &Variable) -> Result<UnivariateDistribution> {
        let bound = self.bound()?;
        self.check_query_variable(bound, variable)?;
        let belief = self.belief.as_ref().ok_or(Error::NoPosterior)?;
        let posterior = bound.posterior_at(belief, variable)?;
        self.record_query(variable, belief.time);
        Ok(posterior)
    }

    fn predictive_posterior(&self, variable: &Variable, steps: u64) -> Result<UnivariateDistribution> {
        if steps > self.config.max_predictive_horizon {
            return Err(Error::Precondition(format!(
                "{} steps exceeds max_predictive_horizon {}",
                steps, self.config.max_predictive_horizon
            )));
        }
        if steps == 0 {
            return self.filtered_posterior(variable);
        }
        let bound = self.bound()?;
        self.check_query_variable(bound, variable)?;
        let belief = self.belief.as_ref().ok_or(Error::NoPosterior)?;
        let target = belief
            .time
            .checked_add(steps)
            .ok_or_else(|| Error::Precondition("predictive time overflows".into()))?;
        let ahead = bound.propagate(belief.clone(), target)?;
        let posterior = bound.posterior_at(&ahead, variable)?;
        self.record_query(variable, target);
        Ok(posterior)
    }

    fn time_of_last_evidence(&self) -> Option<TimeId> {
        self.belief.as_ref().map(|b| b.time)
    }

    fn time_of_posterior(&self) -> Option<TimeId> {
        match self.posterior_time.load(Ordering::Relaxed) {
            NO_POSTERIOR_TIME => None,
            time => Some(time),
        }
    }

    fn state(&self) -> EngineState {
        self.state
    }
}
