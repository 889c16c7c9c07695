mod branch_and_bound;
mod error;
mod knapsack;
mod model;
pub mod search;
mod simplex;
mod solution;
mod solver;
mod trace;

pub use branch_and_bound::BranchAndBound;
pub use error::SolveError;
pub use knapsack::{Item, KnapsackBranchAndBound, KnapsackNode, KnapsackScheme};
pub use model::{Constraint, ConstraintOp, Model, Sense, Variable, VariableKind};
pub use search::{
    BranchDirection, Branching, FathomReason, IncumbentUpdate, NodeStatus, SearchConfig, SearchNode,
    SearchResult, Traversal,
};
pub use simplex::Simplex;
pub use solution::{Solution, SolutionStatus};
pub use solver::{Method, Outcome, Solver};
pub use trace::{PivotStep, SimplexTrace, TableauSnapshot};
