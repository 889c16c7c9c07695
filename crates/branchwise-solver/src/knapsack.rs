use std::collections::BTreeSet;

use crate::error::SolveError;
use crate::model::{ConstraintOp, Model, Sense, VariableKind};
use crate::search::{
    self, Bounded, BranchDirection, Branching, BranchingScheme, Evaluation, SearchConfig,
    SearchResult, Traversal,
};

/// Branch-and-bound for single-constraint 0/1 knapsack models.
///
/// Bounds come from the greedy fractional relaxation instead of a simplex solve.
#[derive(Debug, Clone, Default)]
pub struct KnapsackBranchAndBound {
    config: SearchConfig,
}

impl KnapsackBranchAndBound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.config.tolerance = tol;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.config.traversal = traversal;
        self
    }

    pub fn with_node_limit(mut self, limit: usize) -> Self {
        self.config.node_limit = Some(limit);
        self
    }

    pub fn solve(&self, model: &Model) -> Result<SearchResult, SolveError> {
        let scheme = KnapsackScheme::from_model(model, self.config.tolerance)?;
        let root = scheme.root();
        search::run(&scheme, root, &self.config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Position of the variable in the model
    pub index: usize,
    pub value: f64,
    pub weight: f64,
}

impl Item {
    fn ratio(&self) -> f64 {
        if self.weight > 0.0 {
            self.value / self.weight
        } else if self.value > 0.0 {
            f64::INFINITY
        } else if self.value < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }
    }
}

/// Partial assignment: items `0..depth` of the ratio order are decided
#[derive(Debug, Clone, PartialEq)]
pub struct KnapsackNode {
    pub depth: usize,
    /// Model indices of included items
    pub included: BTreeSet<usize>,
    /// Model indices of excluded items
    pub excluded: BTreeSet<usize>,
    pub weight: f64,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct KnapsackScheme {
    /// Free items sorted by value/weight, descending; ties by model index
    items: Vec<Item>,
    capacity: f64,
    names: Vec<String>,
    tolerance: f64,
    /// Items whose bounds already decide them
    fixed: KnapsackNode,
    /// Binary whose bounds admit neither 0 nor 1
    conflict: Option<String>,
}

impl KnapsackScheme {
    /// Extracts items from a model with one `<=` row, a maximize objective and only
    /// binary variables. Binaries whose bounds pin them to 0 or 1 are decided up front.
    pub fn from_model(model: &Model, tolerance: f64) -> Result<Self, SolveError> {
        model.validate()?;
        if model.sense != Sense::Maximize {
            return Err(SolveError::unsupported("knapsack objective must be maximize"));
        }
        if let Some(v) = model.variables.iter().find(|v| v.kind != VariableKind::Binary) {
            return Err(SolveError::unsupported(format!(
                "knapsack variable '{}' is {:?}, expected Binary",
                v.name, v.kind
            )));
        }
        let [constraint] = model.constraints.as_slice() else {
            return Err(SolveError::unsupported(format!(
                "knapsack needs exactly one constraint, found {}",
                model.num_constraints()
            )));
        };
        if constraint.op != ConstraintOp::Le {
            return Err(SolveError::unsupported(format!(
                "knapsack constraint '{}' must be '<=', found '{}'",
                constraint.name, constraint.op
            )));
        }
        if constraint.rhs < 0.0 {
            return Err(SolveError::unsupported(format!(
                "knapsack capacity {} is negative",
                constraint.rhs
            )));
        }
        if let Some(j) = constraint.coefficients.iter().position(|&w| w < 0.0) {
            return Err(SolveError::unsupported(format!(
                "knapsack weight of '{}' is negative",
                model.variables[j].name
            )));
        }

        let mut fixed = KnapsackNode {
            depth: 0,
            included: BTreeSet::new(),
            excluded: BTreeSet::new(),
            weight: 0.0,
            value: 0.0,
        };
        let mut conflict = None;
        let mut items = Vec::new();
        for (index, ((v, &value), &weight)) in model
            .variables
            .iter()
            .zip(&model.objective)
            .zip(&constraint.coefficients)
            .enumerate()
        {
            let (lower, upper) = (v.lower_bound(), v.upper_bound());
            let forced_in = lower > tolerance;
            let forced_out = upper < 1.0 - tolerance;
            match (forced_in, forced_out) {
                (true, true) => {
                    conflict.get_or_insert_with(|| {
                        format!(
                            "'{}' has bounds [{}, {}] that admit neither 0 nor 1",
                            v.name, lower, upper
                        )
                    });
                }
                (true, false) => {
                    fixed.included.insert(index);
                    fixed.weight += weight;
                    fixed.value += value;
                }
                (false, true) => {
                    fixed.excluded.insert(index);
                }
                (false, false) => items.push(Item { index, value, weight }),
            }
        }
        items.sort_by(|a, b| b.ratio().total_cmp(&a.ratio()).then(a.index.cmp(&b.index)));

        Ok(Self {
            items,
            capacity: constraint.rhs,
            names: model.variables.iter().map(|v| v.name.clone()).collect(),
            tolerance,
            fixed,
            conflict,
        })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Node with only the bound-fixed items decided
    pub fn root(&self) -> KnapsackNode {
        self.fixed.clone()
    }

    /// Decides the next free item in ratio order
    pub fn child(&self, node: &KnapsackNode, include: bool) -> Option<KnapsackNode> {
        let item = self.items.get(node.depth)?;
        let mut child = node.clone();
        child.depth += 1;
        if include {
            child.included.insert(item.index);
            child.weight += item.weight;
            child.value += item.value;
        } else {
            child.excluded.insert(item.index);
        }
        Some(child)
    }

    /// Fractional relaxation bound: decided value plus greedy fill of the undecided items
    pub fn upper_bound(&self, node: &KnapsackNode) -> f64 {
        let mut remaining = self.capacity - node.weight;
        let mut bound = node.value;
        for item in &self.items[node.depth..] {
            if item.value <= 0.0 {
                continue;
            }
            if item.weight <= remaining {
                remaining -= item.weight;
                bound += item.value;
            } else {
                bound += remaining / item.weight * item.value;
                break;
            }
        }
        bound
    }

    fn indicator(&self, node: &KnapsackNode) -> Vec<f64> {
        (0..self.names.len())
            .map(|j| if node.included.contains(&j) { 1.0 } else { 0.0 })
            .collect()
    }
}

impl BranchingScheme for KnapsackScheme {
    type Node = KnapsackNode;

    fn sense(&self) -> Sense {
        Sense::Maximize
    }

    fn variable_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn compute_bound(&self, node: &KnapsackNode) -> Result<Evaluation, SolveError> {
        if let Some(reason) = &self.conflict {
            return Ok(Evaluation::Infeasible(reason.clone()));
        }
        if node.weight > self.capacity + self.tolerance {
            return Ok(Evaluation::Infeasible(format!(
                "weight {} exceeds capacity {}",
                node.weight, self.capacity
            )));
        }
        Ok(Evaluation::Bounded(Bounded {
            bound: self.upper_bound(node),
            objective: node.value,
            values: self.indicator(node),
        }))
    }

    fn is_complete(&self, node: &KnapsackNode, _bounded: &Bounded) -> bool {
        node.depth == self.items.len()
    }

    fn branch(
        &self,
        node: &KnapsackNode,
        _bounded: &Bounded,
    ) -> Result<[(Branching, KnapsackNode); 2], SolveError> {
        let (Some(exclude), Some(include)) = (self.child(node, false), self.child(node, true))
        else {
            return Err(SolveError::NothingToBranch);
        };
        let name = &self.names[self.items[node.depth].index];
        Ok([
            (
                Branching {
                    variable: name.clone(),
                    direction: BranchDirection::Down,
                    value: 0.0,
                },
                exclude,
            ),
            (
                Branching {
                    variable: name.clone(),
                    direction: BranchDirection::Up,
                    value: 1.0,
                },
                include,
            ),
        ])
    }
}
