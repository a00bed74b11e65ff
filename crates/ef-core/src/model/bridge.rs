//! Conversion between networks and external representations.
//!
//! [`NetworkConverter`] is the seam for foreign engines and file formats.
//! [`DescriptionConverter`] targets [`NetworkDescription`], a plain serde
//! value that any serde format can persist.

use super::dag::DynamicDag;
use super::network::DynamicBayesianNetwork;
use crate::exponential_family::{ConditionalDistribution, ParameterVector};
use crate::variables::{DistributionType, DynamicVariables, StateSpaceType, Variable};
use ef_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Two-way conversion between a network and an external representation.
pub trait NetworkConverter {
    type External;

    fn to_model(&self, external: &Self::External) -> Result<DynamicBayesianNetwork>;

    fn from_model(&self, model: &DynamicBayesianNetwork) -> Result<Self::External>;
}

/// Plain-data description of a dynamic network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescription {
    pub variables: Vec<VariableDescription>,
    pub time0: Vec<DistributionDescription>,
    pub time_t: Vec<DistributionDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescription {
    pub name: String,
    pub distribution: DistributionType,
    pub state_space: StateSpaceDescription,
}

/// State space with open bounds written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateSpaceDescription {
    Real {
        lower: Option<f64>,
        upper: Option<f64>,
    },
    Finite {
        states: usize,
    },
}

/// One conditional distribution: natural parameters per parent
/// configuration, in mixed-radix order with the last parent fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionDescription {
    pub variable: String,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
    /// `null` entries stand for −∞ (structural zeros).
    #[serde(with = "extended_reals")]
    pub natural_parameters: Vec<Vec<f64>>,
}

/// A parent named by its present variable; `interface` selects t-1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
    pub name: String,
    #[serde(default)]
    pub interface: bool,
}

impl From<&StateSpaceType> for StateSpaceDescription {
    fn from(space: &StateSpaceType) -> Self {
        match space {
            StateSpaceType::Real { lower, upper } => StateSpaceDescription::Real {
                lower: lower.is_finite().then_some(*lower),
                upper: upper.is_finite().then_some(*upper),
            },
            StateSpaceType::Finite { states } => StateSpaceDescription::Finite { states: *states },
        }
    }
}

impl From<&StateSpaceDescription> for StateSpaceType {
    fn from(space: &StateSpaceDescription) -> Self {
        match space {
            StateSpaceDescription::Real { lower, upper } => StateSpaceType::Real {
                lower: lower.unwrap_or(f64::NEG_INFINITY),
                upper: upper.unwrap_or(f64::INFINITY),
            },
            StateSpaceDescription::Finite { states } => StateSpaceType::Finite { states: *states },
        }
    }
}

/// Converter between [`DynamicBayesianNetwork`] and [`NetworkDescription`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptionConverter;

impl NetworkConverter for DescriptionConverter {
    type External = NetworkDescription;

    fn to_model(&self, description: &NetworkDescription) -> Result<DynamicBayesianNetwork> {
        let mut variables = DynamicVariables::new();
        for v in &description.variables {
            variables.new_variable(v.name.clone(), v.distribution, (&v.state_space).into())?;
        }
        let variables = Arc::new(variables);

        let mut dag = DynamicDag::new(Arc::clone(&variables));
        check_unique(&description.time0, "time0")?;
        check_unique(&description.time_t, "time_t")?;
        for d in &description.time0 {
            let child = variables.variable_by_name(&d.variable)?;
            for parent in &d.parents {
                dag.add_parent_time0(child, &resolve(&variables, parent)?)?;
            }
        }
        for d in &description.time_t {
            let child = variables.variable_by_name(&d.variable)?;
            for parent in &d.parents {
                dag.add_parent_time_t(child, &resolve(&variables, parent)?)?;
            }
        }

        let mut model = DynamicBayesianNetwork::new(dag)?;
        for d in &description.time0 {
            let child = Arc::clone(variables.variable_by_name(&d.variable)?);
            let cd = model.conditional_time0_mut(&child)?;
            apply_parameters(cd, d)?;
        }
        for d in &description.time_t {
            let child = Arc::clone(variables.variable_by_name(&d.variable)?);
            let cd = model.conditional_time_t_mut(&child)?;
            apply_parameters(cd, d)?;
        }
        Ok(model)
    }

    fn from_model(&self, model: &DynamicBayesianNetwork) -> Result<NetworkDescription> {
        let variables = model.variables();
        let describe = |cd: &ConditionalDistribution| {
            let parents = cd
                .parents()
                .iter()
                .map(|p| ParentRef {
                    name: present_name(variables, p),
                    interface: p.is_interface(),
                })
                .collect();
            DistributionDescription {
                variable: cd.variable().name().to_string(),
                parents,
                natural_parameters: cd
                    .components()
                    .map(|c| c.natural_parameters().as_slice().to_vec())
                    .collect(),
            }
        };
        Ok(NetworkDescription {
            variables: variables
                .iter()
                .map(|v| VariableDescription {
                    name: v.name().to_string(),
                    distribution: v.distribution_type(),
                    state_space: v.state_space().into(),
                })
                .collect(),
            time0: model.conditionals_time0().iter().map(describe).collect(),
            time_t: model.conditionals_time_t().iter().map(describe).collect(),
        })
    }
}

fn present_name(variables: &DynamicVariables, variable: &Variable) -> String {
    variables
        .present(variable.index())
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| variable.name().to_string())
}

fn resolve(variables: &DynamicVariables, parent: &ParentRef) -> Result<Arc<Variable>> {
    let present = variables.variable_by_name(&parent.name)?;
    if parent.interface {
        Ok(Arc::clone(variables.interface_of(present)?))
    } else {
        Ok(Arc::clone(present))
    }
}

fn check_unique(descriptions: &[DistributionDescription], slice: &str) -> Result<()> {
    let mut seen = HashSet::new();
    let duplicates: Vec<String> = descriptions
        .iter()
        .filter(|d| !seen.insert(d.variable.as_str()))
        .map(|d| d.variable.clone())
        .collect();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(Error::configuration(
            format!("variables described twice in {}", slice),
            duplicates,
        ))
    }
}

fn apply_parameters(
    cd: &mut ConditionalDistribution,
    description: &DistributionDescription,
) -> Result<()> {
    if description.natural_parameters.len() != cd.number_of_parent_configurations() {
        return Err(Error::DimensionMismatch {
            expected: cd.number_of_parent_configurations(),
            actual: description.natural_parameters.len(),
        });
    }
    for (i, natural) in description.natural_parameters.iter().enumerate() {
        cd.component_mut(i)?
            .set_natural_parameters(ParameterVector::from_vec(natural.clone()))?;
    }
    Ok(())
}

/// Serialises −∞ as `null` so descriptions survive JSON.
mod extended_reals {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(rows: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Vec<Option<f64>>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| (*v != f64::NEG_INFINITY).then_some(*v))
                    .collect()
            })
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let encoded = Vec::<Vec<Option<f64>>>::deserialize(deserializer)?;
        Ok(encoded
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NEG_INFINITY)).collect())
            .collect())
    }
}
