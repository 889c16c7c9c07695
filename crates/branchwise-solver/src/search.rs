//! Shared branch-and-bound skeleton.
//!
//! A [`BranchingScheme`] supplies the bound computation, the completeness test and
//! the two-way split; [`run`] owns the open-node queue, the incumbent and the
//! fathoming rules. Every node that was ever created is kept in an append-only
//! arena and written exactly once, after it has been solved.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::error::SolveError;
use crate::model::Sense;
use crate::solution::{SolutionStatus, name_values};

/// Order in which open nodes are taken off the queue
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    /// FIFO queue
    #[default]
    BreadthFirst,
    /// LIFO stack, down/exclude child first
    DepthFirst,
}

/// Settings shared by both search variants
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub tolerance: f64,
    pub traversal: Traversal,
    /// Maximum number of nodes to solve before giving up
    pub node_limit: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            traversal: Traversal::BreadthFirst,
            node_limit: None,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDirection {
    /// `x <= value` (exclude, for 0/1 items)
    Down,
    /// `x >= value` (include, for 0/1 items)
    Up,
}

/// The decision that created a node
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Branching {
    pub variable: String,
    pub direction: BranchDirection,
    pub value: f64,
}

impl std::fmt::Display for Branching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.direction {
            BranchDirection::Down => "<=",
            BranchDirection::Up => ">=",
        };
        write!(f, "{} {} {}", self.variable, op, self.value)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum FathomReason {
    /// Relaxation (or partial assignment) has no feasible point
    Infeasible(String),
    /// Relaxation is unbounded
    Unbounded,
    /// Bound cannot beat the incumbent that was current at the time
    Bound { incumbent: f64 },
    /// Node is a complete solution
    IntegerSolution,
}

impl std::fmt::Display for FathomReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FathomReason::Infeasible(reason) => write!(f, "infeasible: {}", reason),
            FathomReason::Unbounded => write!(f, "unbounded"),
            FathomReason::Bound { incumbent } => write!(f, "bound (incumbent {})", incumbent),
            FathomReason::IntegerSolution => write!(f, "integer solution"),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStatus {
    /// Queued, not solved yet
    Created,
    Fathomed(FathomReason),
    /// Expanded into two children; internal nodes are never revisited
    Branched,
}

/// Arena entry for one node of the search tree
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchNode {
    pub id: usize,
    pub parent: Option<usize>,
    pub depth: usize,
    pub branching: Option<Branching>,
    pub status: NodeStatus,
    /// Bound used for pruning (relaxation objective, or fractional knapsack bound)
    pub bound: Option<f64>,
    /// Objective of the node's own point
    pub objective: Option<f64>,
    pub values: Vec<f64>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct IncumbentUpdate {
    pub node: usize,
    pub objective: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub status: SolutionStatus,
    pub best_objective: Option<f64>,
    /// Best assignment, aligned with the model's variables (empty if none found)
    pub best_values: Vec<f64>,
    pub assignment: BTreeMap<String, f64>,
    /// Bound computed at the root node
    pub root_bound: Option<f64>,
    pub nodes: Vec<SearchNode>,
    pub explored_nodes: usize,
    /// Leaves pruned for any reason
    pub fathomed_nodes: usize,
    pub branched_nodes: usize,
    pub max_depth: usize,
    /// Every improvement of the incumbent, in discovery order
    pub incumbents: Vec<IncumbentUpdate>,
}

impl SearchResult {
    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn value_of(&self, name: &str) -> Option<f64> {
        self.assignment.get(name).copied()
    }

    /// Node ids from the root to `id`
    pub fn path_to(&self, id: usize) -> Vec<usize> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes.get(current).and_then(|n| n.parent) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }
}

/// Bound-side information for a node whose subproblem is not empty
#[derive(Debug, Clone)]
pub struct Bounded {
    pub bound: f64,
    pub objective: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub enum Evaluation {
    Infeasible(String),
    Unbounded,
    Bounded(Bounded),
}

/// Problem-specific half of a branch-and-bound search
pub trait BranchingScheme {
    /// Per-node state; owned by the queue, never shared between siblings
    type Node;

    fn sense(&self) -> Sense;

    /// Names used to label the best assignment
    fn variable_names(&self) -> Vec<String>;

    fn compute_bound(&self, node: &Self::Node) -> Result<Evaluation, SolveError>;

    /// Whether the node's own point is a solution of the full problem
    fn is_complete(&self, node: &Self::Node, bounded: &Bounded) -> bool;

    /// Splits a non-complete node into its two children
    fn branch(
        &self,
        node: &Self::Node,
        bounded: &Bounded,
    ) -> Result<[(Branching, Self::Node); 2], SolveError>;
}

/// Best complete solution seen so far
#[derive(Debug, Clone)]
pub struct Incumbent {
    sense: Sense,
    objective: Option<f64>,
    values: Vec<f64>,
    history: Vec<IncumbentUpdate>,
}

impl Incumbent {
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            objective: None,
            values: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    /// Whether a subproblem bounded by `bound` may still beat the incumbent
    pub fn can_improve(&self, bound: f64, tolerance: f64) -> bool {
        match (self.objective, self.sense) {
            (None, _) => true,
            (Some(best), Sense::Maximize) => bound > best + tolerance,
            (Some(best), Sense::Minimize) => bound < best - tolerance,
        }
    }

    /// Installs a candidate if it is strictly better; returns whether it was installed
    pub fn try_install(&mut self, objective: f64, values: &[f64], node: usize) -> bool {
        let better = match self.objective {
            None => true,
            Some(best) => self.sense.is_better(objective, best),
        };
        if better {
            self.objective = Some(objective);
            self.values = values.to_vec();
            self.history.push(IncumbentUpdate { node, objective });
        }
        better
    }
}

/// Accumulator threaded through one search
struct SearchState {
    nodes: Vec<SearchNode>,
    incumbent: Incumbent,
    explored: usize,
    fathomed: usize,
    branched: usize,
    max_depth: usize,
    root_bound: Option<f64>,
    root_unbounded: bool,
}

impl SearchState {
    fn create(
        &mut self,
        parent: Option<usize>,
        depth: usize,
        branching: Option<Branching>,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(SearchNode {
            id,
            parent,
            depth,
            branching,
            status: NodeStatus::Created,
            bound: None,
            objective: None,
            values: Vec::new(),
        });
        self.max_depth = self.max_depth.max(depth);
        id
    }

    fn into_result(self, status: SolutionStatus, names: &[String]) -> SearchResult {
        let Incumbent {
            objective,
            values,
            history,
            ..
        } = self.incumbent;

        SearchResult {
            status,
            best_objective: objective,
            assignment: name_values(names.iter().map(String::as_str), &values),
            best_values: values,
            root_bound: self.root_bound,
            nodes: self.nodes,
            explored_nodes: self.explored,
            fathomed_nodes: self.fathomed,
            branched_nodes: self.branched,
            max_depth: self.max_depth,
            incumbents: history,
        }
    }

    fn fathom(&mut self, id: usize, reason: FathomReason) {
        debug!(node = id, depth = self.nodes[id].depth, %reason, "fathomed");
        self.nodes[id].status = NodeStatus::Fathomed(reason);
        self.fathomed += 1;
    }
}

/// Runs the search from `root` until the open list is empty
pub fn run<S: BranchingScheme>(
    scheme: &S,
    root: S::Node,
    config: &SearchConfig,
) -> Result<SearchResult, SolveError> {
    let tol = config.tolerance;
    let mut state = SearchState {
        nodes: Vec::new(),
        incumbent: Incumbent::new(scheme.sense()),
        explored: 0,
        fathomed: 0,
        branched: 0,
        max_depth: 0,
        root_bound: None,
        root_unbounded: false,
    };

    let mut open = VecDeque::new();
    let root_id = state.create(None, 0, None);
    open.push_back((root_id, root));

    loop {
        let next = match config.traversal {
            Traversal::BreadthFirst => open.pop_front(),
            Traversal::DepthFirst => open.pop_back(),
        };
        let Some((id, node)) = next else {
            break;
        };

        if let Some(limit) = config.node_limit {
            if state.explored >= limit {
                let explored = state.explored;
                let partial = state.into_result(SolutionStatus::Error, &scheme.variable_names());
                return Err(SolveError::NodeLimitExceeded {
                    limit,
                    explored,
                    partial: Box::new(partial),
                });
            }
        }
        state.explored += 1;

        let bounded = match scheme.compute_bound(&node)? {
            Evaluation::Infeasible(reason) => {
                state.fathom(id, FathomReason::Infeasible(reason));
                continue;
            }
            Evaluation::Unbounded => {
                if id == root_id {
                    state.root_unbounded = true;
                }
                state.fathom(id, FathomReason::Unbounded);
                continue;
            }
            Evaluation::Bounded(bounded) => bounded,
        };

        let record = &mut state.nodes[id];
        record.bound = Some(bounded.bound);
        record.objective = Some(bounded.objective);
        record.values = bounded.values.clone();
        if id == root_id {
            state.root_bound = Some(bounded.bound);
        }

        if !state.incumbent.can_improve(bounded.bound, tol) {
            let incumbent = state.incumbent.objective().unwrap_or(bounded.bound);
            state.fathom(id, FathomReason::Bound { incumbent });
            continue;
        }

        if scheme.is_complete(&node, &bounded) {
            if state.incumbent.try_install(bounded.objective, &bounded.values, id) {
                debug!(node = id, objective = bounded.objective, "new incumbent");
            }
            state.fathom(id, FathomReason::IntegerSolution);
            continue;
        }

        let depth = state.nodes[id].depth;
        let children = scheme.branch(&node, &bounded)?;
        let mut created = Vec::with_capacity(2);
        for (branching, child) in children {
            debug!(parent = id, branch = %branching, "branching");
            let child_id = state.create(Some(id), depth + 1, Some(branching));
            created.push((child_id, child));
        }
        if config.traversal == Traversal::DepthFirst {
            created.reverse();
        }
        open.extend(created);

        state.nodes[id].status = NodeStatus::Branched;
        state.branched += 1;
    }

    let status = if state.incumbent.objective.is_some() {
        SolutionStatus::Optimal
    } else if state.root_unbounded {
        SolutionStatus::Unbounded
    } else {
        SolutionStatus::Infeasible
    };

    debug!(
        %status,
        explored = state.explored,
        fathomed = state.fathomed,
        best = ?state.incumbent.objective,
        "search finished"
    );

    Ok(state.into_result(status, &scheme.variable_names()))
}
