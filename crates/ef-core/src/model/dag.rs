//! Two-slice DAG: parent sets for time 0 and for the transition t-1 → t.

use crate::variables::{DynamicVariables, Variable};
use ef_common::{Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DynamicDag {
    variables: Arc<DynamicVariables>,
    parents_time0: Vec<Vec<Arc<Variable>>>,
    parents_time_t: Vec<Vec<Arc<Variable>>>,
}

impl DynamicDag {
    /// Empty DAG over `variables`.
    pub fn new(variables: Arc<DynamicVariables>) -> Self {
        let n = variables.len();
        Self {
            variables,
            parents_time0: vec![Vec::new(); n],
            parents_time_t: vec![Vec::new(); n],
        }
    }

    pub fn variables(&self) -> &Arc<DynamicVariables> {
        &self.variables
    }

    /// Add an edge `parent → child` inside the first slice.
    pub fn add_parent_time0(&mut self, child: &Variable, parent: &Arc<Variable>) -> Result<()> {
        if parent.is_interface() {
            return Err(Error::configuration(
                "time-0 parents must be present variables",
                [child.name(), parent.name()],
            ));
        }
        let slot = self.child_slot(child, parent)?;
        push_parent(&mut self.parents_time0[slot], child, parent)
    }

    /// Add an edge `parent → child` in the transition slice. `parent` may be
    /// an interface variable (the value at t-1).
    pub fn add_parent_time_t(&mut self, child: &Variable, parent: &Arc<Variable>) -> Result<()> {
        let slot = self.child_slot(child, parent)?;
        push_parent(&mut self.parents_time_t[slot], child, parent)
    }

    pub fn parents_time0(&self, child: &Variable) -> Result<&[Arc<Variable>]> {
        self.variables.check_member(child)?;
        Ok(&self.parents_time0[child.index()])
    }

    pub fn parents_time_t(&self, child: &Variable) -> Result<&[Arc<Variable>]> {
        self.variables.check_member(child)?;
        Ok(&self.parents_time_t[child.index()])
    }

    /// Reject cycles among present variables of either slice.
    pub fn validate(&self) -> Result<()> {
        self.topological_order_time0()?;
        self.topological_order_time_t()?;
        Ok(())
    }

    /// Present-variable indices of the first slice, parents before children.
    pub fn topological_order_time0(&self) -> Result<Vec<usize>> {
        topological_order(&self.variables, &self.parents_time0, "time 0")
    }

    /// Present-variable indices of the transition slice, parents before
    /// children. Interface parents impose no order.
    pub fn topological_order_time_t(&self) -> Result<Vec<usize>> {
        topological_order(&self.variables, &self.parents_time_t, "transition")
    }

    fn child_slot(&self, child: &Variable, parent: &Variable) -> Result<usize> {
        self.variables.check_member(child)?;
        self.variables.check_member(parent)?;
        if child.is_interface() {
            return Err(Error::configuration(
                "interface variables cannot have parents",
                [child.name()],
            ));
        }
        if child.id() == parent.id() {
            return Err(Error::configuration(
                "a variable cannot be its own parent",
                [child.name()],
            ));
        }
        Ok(child.index())
    }
}

fn push_parent(parents: &mut Vec<Arc<Variable>>, child: &Variable, parent: &Arc<Variable>) -> Result<()> {
    if parents.iter().any(|p| p.id() == parent.id()) {
        return Err(Error::configuration(
            "duplicate parent",
            [child.name(), parent.name()],
        ));
    }
    parents.push(Arc::clone(parent));
    Ok(())
}

/// Kahn's algorithm over present → present edges.
fn topological_order(
    variables: &DynamicVariables,
    parents: &[Vec<Arc<Variable>>],
    slice: &str,
) -> Result<Vec<usize>> {
    let n = parents.len();
    let mut in_degree = vec![0usize; n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (child, list) in parents.iter().enumerate() {
        for parent in list.iter().filter(|p| !p.is_interface()) {
            in_degree[child] += 1;
            children[parent.index()].push(child);
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &c in &children[i] {
            in_degree[c] -= 1;
            if in_degree[c] == 0 {
                queue.push_back(c);
            }
        }
    }

    if order.len() < n {
        let offending: Vec<String> = (0..n)
            .filter(|i| in_degree[*i] > 0)
            .filter_map(|i| variables.present(i).map(|v| v.name().to_string()))
            .collect();
        return Err(Error::configuration(
            format!("{} slice contains a cycle", slice),
            offending,
        ));
    }
    Ok(order)
}
