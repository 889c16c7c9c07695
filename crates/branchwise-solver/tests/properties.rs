//! Property-based tests for the simplex and branch-and-bound engines
//!
//! This module tests:
//! - LP optimality (feasibility and no improving single-variable move)
//! - Search optimum never beyond the root relaxation
//! - Fathoming reasons agree with recorded bounds
//! - Repeated searches build the same tree
//! - Knapsack bound soundness and agreement with enumeration

use branchwise_solver::{
    BranchAndBound, ConstraintOp, FathomReason, KnapsackBranchAndBound, KnapsackScheme, Model,
    NodeStatus, SearchResult, Sense, Simplex, SolutionStatus, Traversal, Variable, VariableKind,
};
use proptest::collection::vec;
use proptest::prelude::*;

const TOL: f64 = 1e-6;

fn build_model(
    kind: VariableKind,
    objective: &[i32],
    rows: &[Vec<i32>],
    rhs: &[i32],
    upper: f64,
) -> Model {
    let mut model = Model::new(Sense::Maximize);
    for (j, &c) in objective.iter().enumerate() {
        model.add_variable(
            Variable::new(format!("x{}", j + 1), kind).with_bounds(None, Some(upper)),
            c as f64,
        );
    }
    for (i, (row, &b)) in rows.iter().zip(rhs).enumerate() {
        model.add_constraint(
            format!("c{}", i + 1),
            row.iter().map(|&a| a as f64).collect(),
            ConstraintOp::Le,
            b as f64,
        );
    }
    model
}

prop_compose! {
    /// Bounded `<=` model with nonnegative right-hand sides
    fn row_data()(n in 1usize..4, m in 1usize..4)(
        objective in vec(-3i32..8, n),
        rows in vec(vec(-2i32..6, n), m),
        rhs in vec(0i32..30, m),
    ) -> (Vec<i32>, Vec<Vec<i32>>, Vec<i32>) {
        (objective, rows, rhs)
    }
}

prop_compose! {
    fn knapsack_items()(items in vec((1i32..50, 1i32..30), 1..8), capacity in 0i32..80)
        -> (Vec<(f64, f64)>, f64) {
        (items.into_iter().map(|(v, w)| (v as f64, w as f64)).collect(), capacity as f64)
    }
}

fn knapsack_model(items: &[(f64, f64)], capacity: f64) -> Model {
    let mut model = Model::new(Sense::Maximize);
    for (i, &(value, _)) in items.iter().enumerate() {
        model.add_variable(Variable::new(format!("item{}", i), VariableKind::Binary), value);
    }
    model.add_constraint(
        "capacity",
        items.iter().map(|&(_, w)| w).collect(),
        ConstraintOp::Le,
        capacity,
    );
    model
}

/// Best value over subsets of `items` within `capacity`
fn enumerate(items: &[(f64, f64)], capacity: f64) -> f64 {
    let mut best = 0.0f64;
    for mask in 0u32..(1 << items.len()) {
        let (mut v, mut w) = (0.0, 0.0);
        for (i, &(value, weight)) in items.iter().enumerate() {
            if mask & (1 << i) != 0 {
                v += value;
                w += weight;
            }
        }
        if w <= capacity + 1e-9 {
            best = best.max(v);
        }
    }
    best
}

#[cfg(test)]
mod simplex_properties {
    use super::*;

    proptest! {
        /// Optimal assignments satisfy every row and no single coordinate move improves them
        #[test]
        fn simplex_optimum_is_feasible_and_locally_optimal((objective, rows, rhs) in row_data()) {
            let model = build_model(VariableKind::Continuous, &objective, &rows, &rhs, 10.0);
            let solution = Simplex::new().solve(&model).unwrap();

            // Every variable is boxed, so the model is never unbounded; x = 0 is always feasible
            prop_assert_eq!(solution.status, SolutionStatus::Optimal);
            prop_assert!(model.is_feasible(&solution.values, TOL));

            let z = solution.objective_value.unwrap();
            prop_assert!((model.evaluate(&solution.values) - z).abs() < TOL);

            for j in 0..model.num_variables() {
                for delta in [1e-3, -1e-3] {
                    let mut moved = solution.values.clone();
                    moved[j] += delta;
                    if model.is_feasible(&moved, 1e-12) {
                        prop_assert!(model.evaluate(&moved) <= z + TOL);
                    }
                }
            }
        }

        /// Solving twice gives identical traces
        #[test]
        fn simplex_is_deterministic((objective, rows, rhs) in row_data()) {
            let model = build_model(VariableKind::Continuous, &objective, &rows, &rhs, 10.0);
            let first = Simplex::new().solve(&model).unwrap();
            let second = Simplex::new().solve(&model).unwrap();
            prop_assert_eq!(first.trace, second.trace);
            prop_assert_eq!(first.values, second.values);
        }
    }
}

#[cfg(test)]
mod search_properties {
    use super::*;

    fn assert_same_tree(first: &SearchResult, second: &SearchResult) -> Result<(), TestCaseError> {
        prop_assert_eq!(&first.nodes, &second.nodes);
        prop_assert_eq!(first.explored_nodes, second.explored_nodes);
        prop_assert_eq!(&first.incumbents, &second.incumbents);
        prop_assert_eq!(first.best_objective, second.best_objective);
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// The integer optimum never beats the root relaxation
        #[test]
        fn integer_optimum_within_root_bound((objective, rows, rhs) in row_data()) {
            let ip = build_model(VariableKind::Integer, &objective, &rows, &rhs, 4.0);
            let lp = build_model(VariableKind::Continuous, &objective, &rows, &rhs, 4.0);

            let result = BranchAndBound::new().solve(&ip).unwrap();
            let relaxation = Simplex::new().solve(&lp).unwrap();

            // x = 0 is integral and feasible
            prop_assert_eq!(result.status, SolutionStatus::Optimal);
            let best = result.best_objective.unwrap();
            prop_assert!(best <= relaxation.objective_value.unwrap() + TOL);
            let root_bound = result.root_bound.unwrap();
            prop_assert!((root_bound - relaxation.objective_value.unwrap()).abs() < TOL);
            prop_assert!(ip.is_feasible(&result.best_values, TOL));
            for x in &result.best_values {
                prop_assert!((x - x.round()).abs() < TOL);
            }
        }

        /// "bound" fathoms only happen when the node cannot beat the incumbent of the moment
        #[test]
        fn fathom_reasons_match_bounds((objective, rows, rhs) in row_data()) {
            let ip = build_model(VariableKind::Integer, &objective, &rows, &rhs, 4.0);
            let result = BranchAndBound::new().solve(&ip).unwrap();

            prop_assert_eq!(result.explored_nodes, result.fathomed_nodes + result.branched_nodes);
            for node in &result.nodes {
                match &node.status {
                    NodeStatus::Fathomed(FathomReason::Bound { incumbent }) => {
                        prop_assert!(node.bound.unwrap() <= incumbent + 1e-9);
                        prop_assert!(result.best_objective.unwrap() >= *incumbent);
                    }
                    NodeStatus::Fathomed(FathomReason::IntegerSolution) => {
                        let best = result.best_objective.unwrap();
                        prop_assert!(node.objective.unwrap() <= best + TOL);
                    }
                    NodeStatus::Fathomed(FathomReason::Infeasible(_)) => {
                        prop_assert!(node.bound.is_none());
                    }
                    NodeStatus::Branched => {
                        prop_assert!(node.bound.is_some());
                    }
                    NodeStatus::Fathomed(FathomReason::Unbounded) | NodeStatus::Created => {
                        prop_assert!(false, "unexpected status {:?}", node.status);
                    }
                }
            }
        }

        /// Breadth-first and depth-first traversals agree on the optimum
        #[test]
        fn traversal_order_does_not_change_optimum((objective, rows, rhs) in row_data()) {
            let ip = build_model(VariableKind::Integer, &objective, &rows, &rhs, 4.0);
            let bfs = BranchAndBound::new().solve(&ip).unwrap();
            let dfs = BranchAndBound::new()
                .with_traversal(Traversal::DepthFirst)
                .solve(&ip)
                .unwrap();
            prop_assert!((bfs.best_objective.unwrap() - dfs.best_objective.unwrap()).abs() < TOL);
        }

        /// Solving the same model twice gives the same nodes, fathoms and incumbents
        #[test]
        fn search_is_deterministic(
            (objective, rows, rhs) in row_data(),
            (items, capacity) in knapsack_items(),
            depth_first in any::<bool>(),
        ) {
            let traversal = if depth_first {
                Traversal::DepthFirst
            } else {
                Traversal::BreadthFirst
            };

            let ip = build_model(VariableKind::Integer, &objective, &rows, &rhs, 4.0);
            let bnb = BranchAndBound::new().with_traversal(traversal);
            assert_same_tree(&bnb.solve(&ip).unwrap(), &bnb.solve(&ip).unwrap())?;

            let model = knapsack_model(&items, capacity);
            let knapsack = KnapsackBranchAndBound::new().with_traversal(traversal);
            assert_same_tree(&knapsack.solve(&model).unwrap(), &knapsack.solve(&model).unwrap())?;
        }
    }
}

#[cfg(test)]
mod knapsack_properties {
    use super::*;

    proptest! {
        /// Fractional bound is at least the best completion of any partial assignment
        #[test]
        fn fractional_bound_is_sound(
            (items, capacity) in knapsack_items(),
            decisions in vec(any::<bool>(), 0..8),
        ) {
            let model = knapsack_model(&items, capacity);
            let scheme = KnapsackScheme::from_model(&model, 1e-9).unwrap();

            let mut node = scheme.root();
            for &include in decisions.iter().take(items.len()) {
                node = scheme.child(&node, include).unwrap();
            }
            prop_assume!(node.weight <= capacity);

            let undecided: Vec<(f64, f64)> = scheme.items()[node.depth..]
                .iter()
                .map(|item| (item.value, item.weight))
                .collect();
            let completion = node.value + enumerate(&undecided, capacity - node.weight);
            prop_assert!(scheme.upper_bound(&node) + 1e-9 >= completion);
        }

        /// Knapsack search and the generic LP-based search both match enumeration
        #[test]
        fn knapsack_matches_enumeration((items, capacity) in knapsack_items()) {
            let model = knapsack_model(&items, capacity);
            let expected = enumerate(&items, capacity);

            let knapsack = KnapsackBranchAndBound::new().solve(&model).unwrap();
            prop_assert!((knapsack.best_objective.unwrap() - expected).abs() < TOL);
            prop_assert!(model.is_feasible(&knapsack.best_values, TOL));

            let generic = BranchAndBound::new().solve(&model).unwrap();
            prop_assert!((generic.best_objective.unwrap() - expected).abs() < TOL);
        }
    }
}
