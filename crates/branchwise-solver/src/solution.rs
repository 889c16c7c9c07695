use std::collections::BTreeMap;

use crate::trace::SimplexTrace;

/// The result of solving an LP with the simplex engine
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal values for each variable, aligned with the model's variables
    pub values: Vec<f64>,
    /// Variable name to optimal value
    pub assignment: BTreeMap<String, f64>,
    /// Optimal objective value (only present when optimal)
    pub objective_value: Option<f64>,
    /// Number of pivots performed
    pub iterations: usize,
    pub trace: SimplexTrace,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// Solver encountered an error
    Error,
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SolutionStatus::Optimal => "optimal",
            SolutionStatus::Infeasible => "infeasible",
            SolutionStatus::Unbounded => "unbounded",
            SolutionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

impl Solution {
    pub fn infeasible(iterations: usize, trace: SimplexTrace) -> Self {
        Self {
            status: SolutionStatus::Infeasible,
            values: Vec::new(),
            assignment: BTreeMap::new(),
            objective_value: None,
            iterations,
            trace,
        }
    }

    pub fn unbounded(iterations: usize, trace: SimplexTrace) -> Self {
        Self {
            status: SolutionStatus::Unbounded,
            values: Vec::new(),
            assignment: BTreeMap::new(),
            objective_value: None,
            iterations,
            trace,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.assignment.get(name).copied()
    }
}

pub(crate) fn name_values<'a>(
    names: impl Iterator<Item = &'a str>,
    values: &[f64],
) -> BTreeMap<String, f64> {
    names
        .zip(values)
        .map(|(name, &v)| (name.to_string(), v))
        .collect()
}
