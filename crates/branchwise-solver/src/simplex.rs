use tracing::{debug, trace};

use crate::error::SolveError;
use crate::model::{ConstraintOp, Model, Sense, VariableKind};
use crate::solution::{Solution, SolutionStatus, name_values};
use crate::trace::{PivotStep, SimplexTrace, TableauSnapshot};

/// One-phase tableau simplex for models with `<=` rows and nonnegative variables
#[derive(Debug, Clone)]
pub struct Simplex {
    /// Maximum pivots before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
    /// Whether to copy the tableau into the trace after every pivot
    record_snapshots: bool,
}

impl Default for Simplex {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            record_snapshots: true,
        }
    }
}

impl Simplex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_snapshots(mut self, record: bool) -> Self {
        self.record_snapshots = record;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Solve the model, returning the optimum or an unbounded/infeasible status.
    ///
    /// Every variable must be continuous with a finite lower bound >= 0 and every
    /// constraint must be `<=` with a nonnegative right-hand side; anything else is
    /// rejected with [`SolveError::ModelUnsupported`].
    pub fn solve(&self, model: &Model) -> Result<Solution, SolveError> {
        model.validate()?;

        let form = match self.standard_form(model)? {
            Prepared::Ready(form) => form,
            Prepared::Infeasible(reason) => {
                debug!(%reason, "simplex: model infeasible before pivoting");
                return Ok(Solution::infeasible(0, SimplexTrace::default()));
            }
        };

        let mut tableau = Tableau::new(&form);
        let mut trace = SimplexTrace {
            columns: tableau.columns.clone(),
            ..SimplexTrace::default()
        };
        self.snapshot(&tableau, &mut trace);

        if let Repair::Infeasible(reason) = self.restore_feasibility(&mut tableau, &mut trace)? {
            debug!(%reason, iterations = tableau.pivots, "simplex: infeasible");
            return Ok(Solution::infeasible(tableau.pivots, trace));
        }

        match self.iterate(&mut tableau, &mut trace)? {
            PivotOutcome::Optimal => {}
            PivotOutcome::Unbounded => {
                debug!(iterations = tableau.pivots, "simplex: unbounded");
                return Ok(Solution::unbounded(tableau.pivots, trace));
            }
        }

        let solution = self.extract_solution(&tableau, &form, model, trace);
        debug!(
            iterations = solution.iterations,
            objective = ?solution.objective_value,
            "simplex: optimal"
        );
        Ok(solution)
    }

    /// Checks preconditions, shifts variables by their lower bounds and turns
    /// finite upper bounds into extra `<=` rows
    fn standard_form(&self, model: &Model) -> Result<Prepared, SolveError> {
        let n_vars = model.num_variables();
        let mut lower = Vec::with_capacity(n_vars);

        for v in &model.variables {
            if v.kind != VariableKind::Continuous {
                return Err(SolveError::unsupported(format!(
                    "variable '{}' is {:?}; simplex accepts continuous variables only",
                    v.name, v.kind
                )));
            }
            let lb = v.lower_bound();
            if !lb.is_finite() || lb < 0.0 {
                return Err(SolveError::unsupported(format!(
                    "variable '{}' has lower bound {}; simplex requires a lower bound >= 0",
                    v.name, lb
                )));
            }
            let ub = v.upper_bound();
            if ub < lb - self.tolerance {
                return Ok(Prepared::Infeasible(format!(
                    "variable '{}' has lower bound {} above upper bound {}",
                    v.name, lb, ub
                )));
            }
            lower.push(lb);
        }

        let mut rows = Vec::with_capacity(model.num_constraints());
        for c in &model.constraints {
            if c.op != ConstraintOp::Le {
                return Err(SolveError::unsupported(format!(
                    "constraint '{}' uses '{}'; only '<=' constraints are supported without preprocessing",
                    c.name, c.op
                )));
            }
            if c.rhs < 0.0 {
                return Err(SolveError::unsupported(format!(
                    "constraint '{}' has negative right-hand side {}",
                    c.name, c.rhs
                )));
            }

            // May go negative; such rows are repaired before the primal pivots start
            rows.push(Row {
                name: c.name.clone(),
                coefficients: c.coefficients.clone(),
                rhs: c.rhs - c.lhs(&lower),
            });
        }

        for (j, v) in model.variables.iter().enumerate() {
            let ub = v.upper_bound();
            if ub.is_finite() {
                let mut coefficients = vec![0.0; n_vars];
                coefficients[j] = 1.0;
                rows.push(Row {
                    name: format!("{}_upper", v.name),
                    coefficients,
                    rhs: (ub - lower[j]).max(0.0),
                });
            }
        }

        // Simplex maximizes, so for minimization we negate the coefficients
        let objective = model
            .objective
            .iter()
            .map(|&c| if model.sense == Sense::Minimize { -c } else { c })
            .collect();

        Ok(Prepared::Ready(StandardForm {
            variable_names: model.variables.iter().map(|v| v.name.clone()).collect(),
            objective,
            rows,
            lower,
        }))
    }

    /// Pivots rows with a negative right-hand side (left behind by lower-bound
    /// shifts) back to feasibility without touching rows that are already feasible.
    ///
    /// The first negative row is repaired, entering its leftmost negative column. The
    /// step is capped by the ratio test over the feasible rows, so every pivot either
    /// fixes the row or raises its right-hand side while the feasible rows stay
    /// feasible. A row without a negative entry cannot reach zero for any `x' >= 0`,
    /// and the model is infeasible.
    fn restore_feasibility(
        &self,
        tableau: &mut Tableau,
        trace: &mut SimplexTrace,
    ) -> Result<Repair, SolveError> {
        let rhs_col = tableau.rhs_col();
        loop {
            let Some(r) = (1..tableau.cells.len())
                .find(|&i| tableau.cells[i][rhs_col] < -self.tolerance)
            else {
                return Ok(Repair::Feasible);
            };

            let entering = tableau.cells[r][..rhs_col]
                .iter()
                .position(|&val| val < -self.tolerance);
            let Some(col) = entering else {
                let label = &tableau.columns[tableau.basis[r - 1]];
                return Ok(Repair::Infeasible(format!(
                    "row with basic {} has right-hand side {} and no negative coefficient",
                    label, tableau.cells[r][rhs_col]
                )));
            };

            // Step that brings row r to zero, unless a feasible row blocks earlier
            let mut ratio = tableau.cells[r][rhs_col] / tableau.cells[r][col];
            let mut pivot_row = r;
            for i in 1..tableau.cells.len() {
                let (val, rhs) = (tableau.cells[i][col], tableau.cells[i][rhs_col]);
                let blocks = val > self.tolerance && rhs >= -self.tolerance;
                if i != r && blocks && rhs / val < ratio - self.tolerance {
                    ratio = rhs / val;
                    pivot_row = i;
                }
            }

            if tableau.pivots >= self.max_iterations {
                return Err(SolveError::IterationLimitExceeded {
                    limit: self.max_iterations,
                    trace: Box::new(trace.clone()),
                });
            }
            let step = self.step(tableau, pivot_row, col, ratio);
            trace!(repair = true, "{}", step);
            self.pivot(tableau, pivot_row, col);
            trace.pivots.push(step);
            self.snapshot(tableau, trace);
        }
    }

    /// Pivots until optimal or unbounded
    fn iterate(
        &self,
        tableau: &mut Tableau,
        trace: &mut SimplexTrace,
    ) -> Result<PivotOutcome, SolveError> {
        loop {
            let Some(pivot_col) = self.find_pivot_column(tableau) else {
                return Ok(PivotOutcome::Optimal);
            };
            let Some((pivot_row, ratio)) = self.find_pivot_row(tableau, pivot_col) else {
                return Ok(PivotOutcome::Unbounded);
            };
            if tableau.pivots >= self.max_iterations {
                return Err(SolveError::IterationLimitExceeded {
                    limit: self.max_iterations,
                    trace: Box::new(trace.clone()),
                });
            }

            let step = self.step(tableau, pivot_row, pivot_col, ratio);
            trace!("{}", step);

            self.pivot(tableau, pivot_row, pivot_col);
            trace.pivots.push(step);
            self.snapshot(tableau, trace);
        }
    }

    fn step(&self, tableau: &Tableau, row: usize, col: usize, ratio: f64) -> PivotStep {
        PivotStep {
            iteration: tableau.pivots + 1,
            entering: tableau.columns[col].clone(),
            leaving: tableau.columns[tableau.basis[row - 1]].clone(),
            row,
            column: col,
            element: tableau.cells[row][col],
            ratio,
        }
    }

    /// Most negative objective-row entry; ties go to the leftmost column
    fn find_pivot_column(&self, tableau: &Tableau) -> Option<usize> {
        let obj_row = &tableau.cells[0];
        let n_cols = obj_row.len() - 1;

        let mut min_val = -self.tolerance;
        let mut min_col = None;

        for (j, &val) in obj_row.iter().enumerate().take(n_cols) {
            if val < min_val {
                min_val = val;
                min_col = Some(j);
            }
        }

        min_col
    }

    /// Minimum-ratio test; ties go to the first row
    fn find_pivot_row(&self, tableau: &Tableau, col: usize) -> Option<(usize, f64)> {
        let rhs_col = tableau.rhs_col();

        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;

        for i in 1..tableau.cells.len() {
            let val = tableau.cells[i][col];
            if val > self.tolerance {
                let ratio = tableau.cells[i][rhs_col] / val;
                if ratio < min_ratio - self.tolerance {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row.map(|row| (row, min_ratio))
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.cells.len();

        tableau.basis[row - 1] = col;
        tableau.pivots += 1;

        // Scale pivot row
        let pivot_val = tableau.cells[row][col];
        for v in tableau.cells[row].iter_mut() {
            *v /= pivot_val;
        }

        // Eliminate column in other rows
        let pivot_row = tableau.cells[row].clone();
        for i in 0..n_rows {
            if i == row {
                continue;
            }
            let factor = tableau.cells[i][col];
            if factor == 0.0 {
                continue;
            }
            for (v, &p) in tableau.cells[i].iter_mut().zip(&pivot_row) {
                *v -= factor * p;
                if v.abs() < self.tolerance {
                    *v = 0.0;
                }
            }
        }
    }

    fn snapshot(&self, tableau: &Tableau, trace: &mut SimplexTrace) {
        if !self.record_snapshots {
            return;
        }
        trace.snapshots.push(TableauSnapshot {
            iteration: tableau.pivots,
            basis: tableau.basis_labels(),
            cells: tableau.cells.clone(),
        });
    }

    fn extract_solution(
        &self,
        tableau: &Tableau,
        form: &StandardForm,
        model: &Model,
        trace: SimplexTrace,
    ) -> Solution {
        let values: Vec<f64> = tableau
            .structural_values(self.tolerance)
            .into_iter()
            .zip(&form.lower)
            .map(|(x, lb)| x + lb)
            .collect();

        // Row 0 holds z' for the shifted variables; add back the lower-bound offset
        let offset: f64 = form.objective.iter().zip(&form.lower).map(|(c, l)| c * l).sum();
        let z = tableau.objective_value() + offset;
        let objective_value = if model.sense == Sense::Minimize { -z } else { z };

        Solution {
            status: SolutionStatus::Optimal,
            assignment: name_values(form.variable_names.iter().map(String::as_str), &values),
            values,
            objective_value: Some(objective_value),
            iterations: tableau.pivots,
            trace,
        }
    }
}

struct Row {
    name: String,
    coefficients: Vec<f64>,
    rhs: f64,
}

/// Model rewritten as `max c'x' s.t. Ax' <= b, x' >= 0` with `x = x' + lower`
struct StandardForm {
    variable_names: Vec<String>,
    objective: Vec<f64>,
    rows: Vec<Row>,
    lower: Vec<f64>,
}

enum Prepared {
    Ready(StandardForm),
    Infeasible(String),
}

enum Repair {
    Feasible,
    Infeasible(String),
}

enum PivotOutcome {
    Optimal,
    Unbounded,
}

/// Dense `(m+1) x (n+m+1)` tableau; row 0 is the objective, the last column is the RHS
struct Tableau {
    cells: Vec<Vec<f64>>,
    /// Basic column of each constraint row (row `i + 1` of `cells`)
    basis: Vec<usize>,
    columns: Vec<String>,
    n_structural: usize,
    pivots: usize,
}

impl Tableau {
    fn new(form: &StandardForm) -> Self {
        let n = form.variable_names.len();
        let m = form.rows.len();
        let total_cols = n + m + 1;

        let mut cells = vec![vec![0.0; total_cols]; m + 1];
        for (j, &c) in form.objective.iter().enumerate() {
            cells[0][j] = -c;
        }
        for (i, row) in form.rows.iter().enumerate() {
            cells[i + 1][..n].copy_from_slice(&row.coefficients);
            cells[i + 1][n + i] = 1.0;
            cells[i + 1][total_cols - 1] = row.rhs;
        }

        let mut columns = form.variable_names.clone();
        columns.extend(form.rows.iter().map(|r| format!("s_{}", r.name)));
        columns.push("rhs".to_string());

        Self {
            cells,
            basis: (n..n + m).collect(),
            columns,
            n_structural: n,
            pivots: 0,
        }
    }

    fn rhs_col(&self) -> usize {
        self.cells[0].len() - 1
    }

    fn objective_value(&self) -> f64 {
        self.cells[0][self.rhs_col()]
    }

    fn basis_labels(&self) -> Vec<String> {
        std::iter::once("z".to_string())
            .chain(self.basis.iter().map(|&b| self.columns[b].clone()))
            .collect()
    }

    /// Row holding the single 1 of column `j`, if the column is a unit column
    fn unit_row(&self, j: usize, tolerance: f64) -> Option<usize> {
        let mut one_at = None;
        for (i, row) in self.cells.iter().enumerate() {
            let v = row[j];
            if (v - 1.0).abs() <= tolerance && i > 0 && one_at.is_none() {
                one_at = Some(i);
            } else if v.abs() > tolerance {
                return None;
            }
        }
        one_at
    }

    /// Basic structural variables read their row's RHS, everything else is zero
    fn structural_values(&self, tolerance: f64) -> Vec<f64> {
        let rhs_col = self.rhs_col();
        let mut claimed = vec![false; self.cells.len()];
        let mut values = vec![0.0; self.n_structural];
        for (j, value) in values.iter_mut().enumerate() {
            if let Some(i) = self.unit_row(j, tolerance) {
                if !claimed[i] {
                    claimed[i] = true;
                    *value = self.cells[i][rhs_col];
                }
            }
        }
        values
    }
}
