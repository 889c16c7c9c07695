use std::collections::BTreeMap;

use tracing::info;

use crate::branch_and_bound::BranchAndBound;
use crate::error::SolveError;
use crate::knapsack::{KnapsackBranchAndBound, KnapsackScheme};
use crate::model::Model;
use crate::search::{SearchResult, Traversal};
use crate::simplex::Simplex;
use crate::solution::{Solution, SolutionStatus};

/// Which engine to run
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Simplex for purely continuous models, knapsack search when the model
    /// qualifies, LP-based branch-and-bound otherwise
    #[default]
    Auto,
    Simplex,
    BranchAndBound,
    Knapsack,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "engine", rename_all = "snake_case"))]
#[derive(Debug, Clone)]
pub enum Outcome {
    Linear(Solution),
    Search(SearchResult),
}

impl Outcome {
    pub fn status(&self) -> SolutionStatus {
        match self {
            Outcome::Linear(s) => s.status,
            Outcome::Search(r) => r.status,
        }
    }

    pub fn objective_value(&self) -> Option<f64> {
        match self {
            Outcome::Linear(s) => s.objective_value,
            Outcome::Search(r) => r.best_objective,
        }
    }

    pub fn assignment(&self) -> &BTreeMap<String, f64> {
        match self {
            Outcome::Linear(s) => &s.assignment,
            Outcome::Search(r) => &r.assignment,
        }
    }
}

/// Front door that dispatches a model to the right engine
#[derive(Debug, Clone)]
pub struct Solver {
    method: Method,
    tolerance: f64,
    max_iterations: usize,
    record_snapshots: bool,
    traversal: Traversal,
    node_limit: Option<usize>,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            method: Method::Auto,
            tolerance: 1e-9,
            max_iterations: 10000,
            record_snapshots: true,
            traversal: Traversal::BreadthFirst,
            node_limit: None,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Only affects pure LP solves; relaxations inside a search never keep snapshots
    pub fn with_snapshots(mut self, record: bool) -> Self {
        self.record_snapshots = record;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn with_node_limit(mut self, limit: Option<usize>) -> Self {
        self.node_limit = limit;
        self
    }

    /// Method that `Auto` resolves to for this model
    pub fn resolve_method(&self, model: &Model) -> Method {
        match self.method {
            Method::Auto if !model.has_integral_variables() => Method::Simplex,
            Method::Auto if KnapsackScheme::from_model(model, self.tolerance).is_ok() => {
                Method::Knapsack
            }
            Method::Auto => Method::BranchAndBound,
            other => other,
        }
    }

    pub fn solve(&self, model: &Model) -> Result<Outcome, SolveError> {
        let method = self.resolve_method(model);
        info!(
            ?method,
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            "solving model"
        );

        let simplex = Simplex::new()
            .with_tolerance(self.tolerance)
            .with_max_iterations(self.max_iterations);

        match method {
            Method::Simplex | Method::Auto => simplex
                .with_snapshots(self.record_snapshots)
                .solve(model)
                .map(Outcome::Linear),
            Method::BranchAndBound => {
                let mut bnb = BranchAndBound::new()
                    .with_simplex(simplex.with_snapshots(false))
                    .with_tolerance(self.tolerance)
                    .with_traversal(self.traversal);
                if let Some(limit) = self.node_limit {
                    bnb = bnb.with_node_limit(limit);
                }
                bnb.solve(model).map(Outcome::Search)
            }
            Method::Knapsack => {
                let mut knapsack = KnapsackBranchAndBound::new()
                    .with_tolerance(self.tolerance)
                    .with_traversal(self.traversal);
                if let Some(limit) = self.node_limit {
                    knapsack = knapsack.with_node_limit(limit);
                }
                knapsack.solve(model).map(Outcome::Search)
            }
        }
    }
}
