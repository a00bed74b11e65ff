//! Random variables of a dynamic network.
//!
//! Every present variable has an interface twin standing for the same
//! quantity one slice earlier. Variables are immutable once created and are
//! shared through `Arc` by every distribution that mentions them.

use ef_common::{Error, Result, VariableId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Suffix appended to a present variable's name to name its interface twin.
pub const INTERFACE_SUFFIX: &str = "[t-1]";

/// Declared state space of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateSpaceType {
    /// Real line segment; bounds may be infinite.
    Real { lower: f64, upper: f64 },
    /// States `0..states`.
    Finite { states: usize },
}

/// Kind of a state space, ignoring its bounds or cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSpaceKind {
    Real,
    Finite,
}

impl fmt::Display for StateSpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateSpaceKind::Real => write!(f, "real"),
            StateSpaceKind::Finite => write!(f, "finite"),
        }
    }
}

impl StateSpaceType {
    /// The whole real line.
    pub fn real() -> Self {
        StateSpaceType::Real {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    pub fn kind(&self) -> StateSpaceKind {
        match self {
            StateSpaceType::Real { .. } => StateSpaceKind::Real,
            StateSpaceType::Finite { .. } => StateSpaceKind::Finite,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, StateSpaceType::Finite { .. })
    }

    /// Number of states of a finite space.
    pub fn number_of_states(&self) -> Option<usize> {
        match self {
            StateSpaceType::Finite { states } => Some(*states),
            StateSpaceType::Real { .. } => None,
        }
    }

    /// Whether `value` is a member of the space.
    pub fn contains(&self, value: f64) -> bool {
        match self {
            StateSpaceType::Real { lower, upper } => {
                !value.is_nan() && value >= *lower && value <= *upper
            }
            StateSpaceType::Finite { states } => {
                value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < *states as f64
            }
        }
    }
}

/// Exponential-family distribution attached to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    Multinomial,
    Normal,
    Gamma,
    TruncatedExponential,
}

impl DistributionType {
    /// Stable lowercase name, used in error messages and descriptions.
    pub fn name(self) -> &'static str {
        match self {
            DistributionType::Multinomial => "multinomial",
            DistributionType::Normal => "normal",
            DistributionType::Gamma => "gamma",
            DistributionType::TruncatedExponential => "truncated_exponential",
        }
    }

    /// The state-space kind this family is defined on.
    pub fn required_state_space(self) -> StateSpaceKind {
        match self {
            DistributionType::Multinomial => StateSpaceKind::Finite,
            DistributionType::Normal
            | DistributionType::Gamma
            | DistributionType::TruncatedExponential => StateSpaceKind::Real,
        }
    }

    /// Natural state space of a continuous family.
    pub fn default_state_space(self) -> Option<StateSpaceType> {
        match self {
            DistributionType::Multinomial => None,
            DistributionType::Normal => Some(StateSpaceType::real()),
            DistributionType::Gamma => Some(StateSpaceType::Real {
                lower: 0.0,
                upper: f64::INFINITY,
            }),
            DistributionType::TruncatedExponential => Some(StateSpaceType::Real {
                lower: 0.0,
                upper: 1.0,
            }),
        }
    }
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether a variable lives in the current slice or the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalRole {
    Present,
    Interface,
}

/// An immutable random variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    id: VariableId,
    index: usize,
    name: String,
    state_space: StateSpaceType,
    distribution: DistributionType,
    role: TemporalRole,
}

impl Variable {
    /// Unique id inside the owning variable set.
    pub fn id(&self) -> VariableId {
        self.id
    }

    /// Slot shared by a present variable and its interface twin.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state_space(&self) -> &StateSpaceType {
        &self.state_space
    }

    pub fn distribution_type(&self) -> DistributionType {
        self.distribution
    }

    pub fn role(&self) -> TemporalRole {
        self.role
    }

    pub fn is_interface(&self) -> bool {
        self.role == TemporalRole::Interface
    }

    pub fn is_finite(&self) -> bool {
        self.state_space.is_finite()
    }

    pub fn number_of_states(&self) -> Option<usize> {
        self.state_space.number_of_states()
    }

    /// Validate `value` as a state index of this finite variable.
    pub fn state_index(&self, value: f64) -> Result<usize> {
        match self.state_space {
            StateSpaceType::Finite { .. } if self.state_space.contains(value) => Ok(value as usize),
            StateSpaceType::Finite { states } => Err(Error::Precondition(format!(
                "value {} is not a state of {} (expected an integer in [0, {}))",
                value, self.name, states
            ))),
            StateSpaceType::Real { .. } => Err(Error::Precondition(format!(
                "{} is not a finite variable",
                self.name
            ))),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered set of present variables, each paired with its interface twin.
#[derive(Debug, Clone, Default)]
pub struct DynamicVariables {
    present: Vec<Arc<Variable>>,
    interface: Vec<Arc<Variable>>,
    by_name: HashMap<String, usize>,
}

impl DynamicVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable with an explicit state space.
    ///
    /// Present ids are even and interface ids odd, so both roles share one
    /// id space.
    pub fn new_variable(
        &mut self,
        name: impl Into<String>,
        distribution: DistributionType,
        state_space: StateSpaceType,
    ) -> Result<Arc<Variable>> {
        let name = name.into();
        if name.is_empty() || name.ends_with(INTERFACE_SUFFIX) {
            return Err(Error::configuration("invalid variable name", [name]));
        }
        if self.by_name.contains_key(&name) {
            return Err(Error::configuration("duplicate variable name", [name]));
        }
        if state_space.kind() != distribution.required_state_space() {
            return Err(Error::configuration(
                format!(
                    "{} requires a {} state space, got {}",
                    distribution,
                    distribution.required_state_space(),
                    state_space.kind()
                ),
                [name],
            ));
        }
        match state_space {
            StateSpaceType::Finite { states } if states == 0 => {
                return Err(Error::configuration("finite variable needs at least one state", [name]));
            }
            StateSpaceType::Real { lower, upper } if lower.is_nan() || upper.is_nan() || lower >= upper => {
                return Err(Error::configuration("real state space needs lower < upper", [name]));
            }
            _ => {}
        }

        let index = self.present.len();
        let present = Arc::new(Variable {
            id: VariableId(2 * index),
            index,
            name: name.clone(),
            state_space: state_space.clone(),
            distribution,
            role: TemporalRole::Present,
        });
        let interface = Arc::new(Variable {
            id: VariableId(2 * index + 1),
            index,
            name: format!("{}{}", name, INTERFACE_SUFFIX),
            state_space,
            distribution,
            role: TemporalRole::Interface,
        });
        self.present.push(Arc::clone(&present));
        self.interface.push(interface);
        self.by_name.insert(name, index);
        Ok(present)
    }

    /// Add a multinomial variable with `states` states.
    pub fn new_multinomial_variable(
        &mut self,
        name: impl Into<String>,
        states: usize,
    ) -> Result<Arc<Variable>> {
        self.new_variable(name, DistributionType::Multinomial, StateSpaceType::Finite { states })
    }

    /// Add a continuous variable on its family's natural state space.
    pub fn new_real_variable(
        &mut self,
        name: impl Into<String>,
        distribution: DistributionType,
    ) -> Result<Arc<Variable>> {
        let name = name.into();
        let state_space = distribution.default_state_space().ok_or_else(|| {
            Error::configuration(format!("{} is not a continuous family", distribution), [name.clone()])
        })?;
        self.new_variable(name, distribution, state_space)
    }

    /// Number of present variables.
    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Present variables in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Variable>> {
        self.present.iter()
    }

    /// Present variable at `index`.
    pub fn present(&self, index: usize) -> Option<&Arc<Variable>> {
        self.present.get(index)
    }

    /// Interface twin of the present variable at `index`.
    pub fn interface(&self, index: usize) -> Option<&Arc<Variable>> {
        self.interface.get(index)
    }

    /// Interface twin of `variable`.
    pub fn interface_of(&self, variable: &Variable) -> Result<&Arc<Variable>> {
        self.check_member(variable)?;
        self.interface
            .get(variable.index())
            .ok_or_else(|| Error::UnknownVariable(variable.name().to_string()))
    }

    /// Any variable (present or interface) by id.
    pub fn get(&self, id: VariableId) -> Option<&Arc<Variable>> {
        let index = id.index() / 2;
        if id.index() % 2 == 0 {
            self.present.get(index)
        } else {
            self.interface.get(index)
        }
    }

    /// Present variable by name.
    pub fn variable_by_name(&self, name: &str) -> Result<&Arc<Variable>> {
        self.by_name
            .get(name)
            .and_then(|i| self.present.get(*i))
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Whether `variable` (either role) belongs to this set.
    pub fn contains(&self, variable: &Variable) -> bool {
        self.get(variable.id()).is_some_and(|v| **v == *variable)
    }

    /// Fail with `UnknownVariable` unless `variable` belongs to this set.
    pub fn check_member(&self, variable: &Variable) -> Result<()> {
        if self.contains(variable) {
            Ok(())
        } else {
            Err(Error::UnknownVariable(variable.name().to_string()))
        }
    }

    /// Require every present variable to have a state space of `kind`.
    ///
    /// Nothing in the crate calls this on its own: the forward filter and
    /// the learners accept mixed finite/real models. Callers that only
    /// handle one kind (a purely discrete exporter, say) run it when they
    /// validate a model. The error names all offending variables.
    pub fn require_state_space(&self, kind: StateSpaceKind) -> Result<()> {
        let offending: Vec<String> = self
            .present
            .iter()
            .filter(|v| v.state_space().kind() != kind)
            .map(|v| v.name().to_string())
            .collect();
        if offending.is_empty() {
            Ok(())
        } else {
            Err(Error::configuration(
                format!("all variables must have a {} state space", kind),
                offending,
            ))
        }
    }
}
