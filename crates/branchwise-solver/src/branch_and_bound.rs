use crate::error::SolveError;
use crate::model::{Constraint, ConstraintOp, Model, Sense, Variable, VariableKind};
use crate::search::{
    self, Bounded, BranchDirection, Branching, BranchingScheme, Evaluation, SearchConfig,
    SearchResult, Traversal,
};
use crate::simplex::Simplex;
use crate::solution::SolutionStatus;

/// Integer programming by LP-based branch-and-bound.
///
/// Each node owns a clone of the model with its branching constraints appended;
/// the relaxation of that clone is handed to [`Simplex`].
#[derive(Debug, Clone)]
pub struct BranchAndBound {
    simplex: Simplex,
    config: SearchConfig,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self {
            simplex: Simplex::new().with_snapshots(false),
            config: SearchConfig::default(),
        }
    }
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simplex used for node relaxations
    pub fn with_simplex(mut self, simplex: Simplex) -> Self {
        self.simplex = simplex;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.config.tolerance = tol;
        self.simplex = self.simplex.with_tolerance(tol);
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
        model.validate()?;
        if !model.has_integral_variables() {
            return Err(SolveError::NothingToBranch);
        }

        let scheme = IntegerScheme {
            integral: model
                .variables
                .iter()
                .enumerate()
                .filter(|(_, v)| v.kind.is_integral())
                .map(|(j, _)| j)
                .collect(),
            names: model.variables.iter().map(|v| v.name.clone()).collect(),
            sense: model.sense,
            simplex: &self.simplex,
            tolerance: self.config.tolerance,
        };
        search::run(&scheme, model.clone(), &self.config)
    }
}

struct IntegerScheme<'a> {
    integral: Vec<usize>,
    names: Vec<String>,
    sense: Sense,
    simplex: &'a Simplex,
    tolerance: f64,
}

impl IntegerScheme<'_> {
    fn is_integral_value(&self, x: f64) -> bool {
        (x - x.round()).abs() <= self.tolerance
    }

    /// Integral variable whose fractional part is closest to 0.5; ties go to the first
    fn most_fractional(&self, values: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &j in &self.integral {
            let x = values[j];
            if self.is_integral_value(x) {
                continue;
            }
            let distance = (x - x.floor() - 0.5).abs();
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((j, distance));
            }
        }
        best.map(|(j, _)| j)
    }
}

impl BranchingScheme for IntegerScheme<'_> {
    type Node = Model;

    fn sense(&self) -> Sense {
        self.sense
    }

    fn variable_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn compute_bound(&self, node: &Model) -> Result<Evaluation, SolveError> {
        let relaxed = match relax(node, self.tolerance) {
            Relaxation::Model(m) => m,
            Relaxation::Infeasible(reason) => return Ok(Evaluation::Infeasible(reason)),
        };

        let solution = self.simplex.solve(&relaxed)?;
        Ok(match (solution.status, solution.objective_value) {
            (SolutionStatus::Optimal, Some(objective)) => Evaluation::Bounded(Bounded {
                bound: objective,
                objective,
                values: solution.values,
            }),
            (SolutionStatus::Unbounded, _) => Evaluation::Unbounded,
            _ => Evaluation::Infeasible("relaxation has no feasible point".to_string()),
        })
    }

    fn is_complete(&self, _node: &Model, bounded: &Bounded) -> bool {
        self.integral
            .iter()
            .all(|&j| self.is_integral_value(bounded.values[j]))
    }

    fn branch(
        &self,
        node: &Model,
        bounded: &Bounded,
    ) -> Result<[(Branching, Model); 2], SolveError> {
        let j = self
            .most_fractional(&bounded.values)
            .ok_or(SolveError::NothingToBranch)?;
        let name = &self.names[j];
        let x = bounded.values[j];
        let (down, up) = (x.floor(), x.ceil());

        let mut unit = vec![0.0; node.num_variables()];
        unit[j] = 1.0;

        let down_child = node.with_constraint(Constraint::new(
            format!("branch_{}_le_{}", name, down),
            unit.clone(),
            ConstraintOp::Le,
            down,
        ));
        let up_child = node.with_constraint(Constraint::new(
            format!("branch_{}_ge_{}", name, up),
            unit,
            ConstraintOp::Ge,
            up,
        ));

        Ok([
            (
                Branching {
                    variable: name.clone(),
                    direction: BranchDirection::Down,
                    value: down,
                },
                down_child,
            ),
            (
                Branching {
                    variable: name.clone(),
                    direction: BranchDirection::Up,
                    value: up,
                },
                up_child,
            ),
        ])
    }
}

pub(crate) enum Relaxation {
    Model(Model),
    Infeasible(String),
}

/// Continuous relaxation of `model` in the form the simplex accepts.
///
/// Integer and binary variables become continuous (binary keeps `[0, 1]`), and
/// every single-variable constraint is folded into that variable's bounds.
/// Unrestricted variables without a finite lower bound are passed through
/// unchanged, so the simplex rejects them.
pub(crate) fn relax(model: &Model, tolerance: f64) -> Relaxation {
    let mut lower: Vec<f64> = model.variables.iter().map(Variable::lower_bound).collect();
    let mut upper: Vec<f64> = model.variables.iter().map(Variable::upper_bound).collect();
    let mut constraints = Vec::with_capacity(model.num_constraints());

    for c in &model.constraints {
        let Some((j, a)) = c.single_variable(tolerance) else {
            constraints.push(c.clone());
            continue;
        };
        let limit = c.rhs / a;
        match (c.op, a > 0.0) {
            (ConstraintOp::Le, true) | (ConstraintOp::Ge, false) => upper[j] = upper[j].min(limit),
            (ConstraintOp::Ge, true) | (ConstraintOp::Le, false) => lower[j] = lower[j].max(limit),
            (ConstraintOp::Eq, _) => {
                lower[j] = lower[j].max(limit);
                upper[j] = upper[j].min(limit);
            }
        }
    }

    let mut variables = Vec::with_capacity(model.num_variables());
    for (j, v) in model.variables.iter().enumerate() {
        if lower[j] > upper[j] + tolerance {
            return Relaxation::Infeasible(format!(
                "bounds on '{}' conflict: {} > {}",
                v.name, lower[j], upper[j]
            ));
        }
        let kind = if v.kind == VariableKind::Unrestricted && lower[j].is_infinite() {
            VariableKind::Unrestricted
        } else {
            VariableKind::Continuous
        };
        variables.push(Variable {
            name: v.name.clone(),
            kind,
            lower: lower[j].is_finite().then_some(lower[j]),
            upper: upper[j].is_finite().then_some(upper[j]),
        });
    }

    Relaxation::Model(Model {
        sense: model.sense,
        variables,
        objective: model.objective.clone(),
        constraints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{FathomReason, NodeStatus};

    fn integer_model(sense: Sense, objective: &[f64]) -> Model {
        let mut model = Model::new(sense);
        for (j, &c) in objective.iter().enumerate() {
            model.add_variable(Variable::new(format!("x{}", j + 1), VariableKind::Integer), c);
        }
        model
    }

    #[test]
    fn test_branches_on_fractional_root() {
        // max x1 + x2, x1 <= 3.5, x1 + x2 <= 5.5 (x1 integer, x2 continuous)
        let mut model = Model::new(Sense::Maximize);
        model.add_variable(Variable::new("x1", VariableKind::Integer), 1.0);
        model.add_variable(Variable::new("x2", VariableKind::Continuous), 0.0);
        model.add_constraint("cap", vec![1.0, 0.0], ConstraintOp::Le, 3.5);
        model.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Le, 5.5);

        let result = BranchAndBound::new().solve(&model).unwrap();

        let root = &result.nodes[0];
        assert!((root.values[0] - 3.5).abs() < 1e-9, "root x1 = {}", root.values[0]);
        assert_eq!(root.status, NodeStatus::Branched);

        let down = result.nodes[1].branching.as_ref().unwrap();
        let up = result.nodes[2].branching.as_ref().unwrap();
        assert_eq!((down.direction, down.value), (BranchDirection::Down, 3.0));
        assert_eq!((up.direction, up.value), (BranchDirection::Up, 4.0));
        assert!(matches!(
            result.nodes[2].status,
            NodeStatus::Fathomed(FathomReason::Infeasible(_))
        ));

        assert!(result.is_optimal());
        assert!((result.value_of("x1").unwrap() - 3.0).abs() < 1e-9);
        assert!((result.best_objective.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_classic_integer_program() {
        // max 5x1 + 4x2, 6x1 + 4x2 <= 24, x1 + 2x2 <= 6 -> LP (3, 1.5) z=21, IP z=20 at (4, 0)
        let mut model = integer_model(Sense::Maximize, &[5.0, 4.0]);
        model.add_constraint("c1", vec![6.0, 4.0], ConstraintOp::Le, 24.0);
        model.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Le, 6.0);

        let result = BranchAndBound::new().solve(&model).unwrap();

        assert!(result.is_optimal());
        assert!((result.root_bound.unwrap() - 21.0).abs() < 1e-6);
        let obj = result.best_objective.unwrap();
        assert!((obj - 20.0).abs() < 1e-6, "obj = {} (expected 20)", obj);
        assert!((result.best_values[0] - 4.0).abs() < 1e-6);
        assert!(result.best_values[1].abs() < 1e-6);
    }

    #[test]
    fn test_depth_first_finds_same_optimum() {
        let mut model = integer_model(Sense::Maximize, &[5.0, 4.0]);
        model.add_constraint("c1", vec![6.0, 4.0], ConstraintOp::Le, 24.0);
        model.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Le, 6.0);

        let bfs = BranchAndBound::new().solve(&model).unwrap();
        let dfs = BranchAndBound::new()
            .with_traversal(Traversal::DepthFirst)
            .solve(&model)
            .unwrap();

        assert!((bfs.best_objective.unwrap() - dfs.best_objective.unwrap()).abs() < 1e-6);
    }

    #[test]
    fn test_minimization() {
        // min -x1 - x2, 2x1 + 2x2 <= 7 -> best integer total is 3
        let mut model = integer_model(Sense::Minimize, &[-1.0, -1.0]);
        model.add_constraint("c", vec![2.0, 2.0], ConstraintOp::Le, 7.0);

        let result = BranchAndBound::new().solve(&model).unwrap();
        assert!(result.is_optimal());
        let obj = result.best_objective.unwrap();
        assert!((obj + 3.0).abs() < 1e-6, "obj = {} (expected -3)", obj);
        assert!(result.root_bound.unwrap() <= obj + 1e-9);
    }

    #[test]
    fn test_contradictory_bounds_are_infeasible() {
        // x1 <= -1 and x1 >= 0
        let mut model = integer_model(Sense::Maximize, &[1.0]);
        model.add_constraint("neg", vec![1.0], ConstraintOp::Le, -1.0);
        model.add_constraint("nonneg", vec![1.0], ConstraintOp::Ge, 0.0);

        let result = BranchAndBound::new().solve(&model).unwrap();
        assert_eq!(result.status, SolutionStatus::Infeasible);
        assert!(result.best_objective.is_none());
        assert_eq!(result.explored_nodes, 1);
    }

    #[test]
    fn test_no_integer_point_in_feasible_relaxation() {
        // 0.2 <= x <= 0.8 has LP points but no integer point
        let mut model = integer_model(Sense::Maximize, &[1.0]);
        model.add_constraint("lo", vec![1.0], ConstraintOp::Ge, 0.2);
        model.add_constraint("hi", vec![1.0], ConstraintOp::Le, 0.8);

        let result = BranchAndBound::new().solve(&model).unwrap();
        assert_eq!(result.status, SolutionStatus::Infeasible);
        assert!(result.root_bound.is_some());
    }

    #[test]
    fn test_unbounded_root() {
        let mut model = integer_model(Sense::Maximize, &[1.0, 0.0]);
        model.add_constraint("diff", vec![1.0, -1.0], ConstraintOp::Le, 1.0);

        let result = BranchAndBound::new().solve(&model).unwrap();
        assert_eq!(result.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_up_branch_into_mixed_sign_row() {
        // max x1 + x2, x1 - x2 <= 0.5, x1 + x2 <= 5.5; x1 >= k branches push 'diff' negative
        let mut model = integer_model(Sense::Maximize, &[1.0, 1.0]);
        model.add_constraint("diff", vec![1.0, -1.0], ConstraintOp::Le, 0.5);
        model.add_constraint("sum", vec![1.0, 1.0], ConstraintOp::Le, 5.5);

        for traversal in [Traversal::BreadthFirst, Traversal::DepthFirst] {
            let result = BranchAndBound::new().with_traversal(traversal).solve(&model).unwrap();

            assert!(result.is_optimal());
            let obj = result.best_objective.unwrap();
            assert!((obj - 5.0).abs() < 1e-6, "obj = {} (expected 5)", obj);
            assert!((result.root_bound.unwrap() - 5.5).abs() < 1e-6);
            assert!(model.is_feasible(&result.best_values, 1e-6));
            assert!(result.nodes.iter().all(|n| n.status != NodeStatus::Created));
        }
    }

    #[test]
    fn test_requires_integer_variable() {
        let mut model = Model::new(Sense::Maximize);
        model.add_variable(Variable::new("x", VariableKind::Continuous), 1.0);

        assert!(matches!(
            BranchAndBound::new().solve(&model),
            Err(SolveError::NothingToBranch)
        ));
    }

    #[test]
    fn test_multi_variable_ge_is_unsupported() {
        let mut model = integer_model(Sense::Minimize, &[1.0, 1.0]);
        model.add_constraint("cover", vec![1.0, 1.0], ConstraintOp::Ge, 2.0);

        assert!(matches!(
            BranchAndBound::new().solve(&model),
            Err(SolveError::ModelUnsupported(_))
        ));
    }

    #[test]
    fn test_most_fractional_prefers_half() {
        let simplex = Simplex::new();
        let scheme = IntegerScheme {
            integral: vec![0, 1, 2],
            names: vec!["a".into(), "b".into(), "c".into()],
            sense: Sense::Maximize,
            simplex: &simplex,
            tolerance: 1e-9,
        };
        assert_eq!(scheme.most_fractional(&[1.1, 2.6, 3.4]), Some(1));
        assert_eq!(scheme.most_fractional(&[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn test_relax_folds_branch_constraints() {
        let mut model = integer_model(Sense::Maximize, &[1.0]);
        model.add_constraint("branch_x1_ge_4", vec![1.0], ConstraintOp::Ge, 4.0);
        model.add_constraint("branch_x1_le_6", vec![1.0], ConstraintOp::Le, 6.0);

        let Relaxation::Model(relaxed) = relax(&model, 1e-9) else {
            panic!("relaxation should be feasible");
        };
        assert!(relaxed.constraints.is_empty());
        assert_eq!(relaxed.variables[0].kind, VariableKind::Continuous);
        assert_eq!(relaxed.variables[0].lower, Some(4.0));
        assert_eq!(relaxed.variables[0].upper, Some(6.0));
    }
}
