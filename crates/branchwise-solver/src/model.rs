use crate::error::SolveError;

/// Optimization direction
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

impl Sense {
    /// Whether `candidate` is strictly better than `current` under this sense
    pub fn is_better(self, candidate: f64, current: f64) -> bool {
        match self {
            Sense::Maximize => candidate > current,
            Sense::Minimize => candidate < current,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableKind {
    #[default]
    Continuous,
    Integer,
    Binary,
    /// Free variable, no implicit lower bound of zero
    Unrestricted,
}

impl VariableKind {
    pub fn is_integral(self) -> bool {
        matches!(self, VariableKind::Integer | VariableKind::Binary)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: VariableKind,
    /// Explicit lower bound. `None` means 0, or -inf for unrestricted variables.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lower: Option<f64>,
    /// Explicit upper bound. `None` means +inf, or 1 for binary variables.
    #[cfg_attr(feature = "serde", serde(default))]
    pub upper: Option<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            lower: None,
            upper: None,
        }
    }

    pub fn with_bounds(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Effective lower bound, taking the variable kind into account
    pub fn lower_bound(&self) -> f64 {
        match (self.lower, self.kind) {
            (Some(l), VariableKind::Binary) => l.max(0.0),
            (Some(l), _) => l,
            (None, VariableKind::Unrestricted) => f64::NEG_INFINITY,
            (None, _) => 0.0,
        }
    }

    /// Effective upper bound, taking the variable kind into account
    pub fn upper_bound(&self) -> f64 {
        match (self.upper, self.kind) {
            (Some(u), VariableKind::Binary) => u.min(1.0),
            (Some(u), _) => u,
            (None, VariableKind::Binary) => 1.0,
            (None, _) => f64::INFINITY,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (shown in traces)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

impl Constraint {
    pub fn new(
        name: impl Into<String>,
        coefficients: Vec<f64>,
        op: ConstraintOp,
        rhs: f64,
    ) -> Self {
        Self {
            name: name.into(),
            coefficients,
            op,
            rhs,
        }
    }

    /// Left-hand side evaluated at `values`
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.coefficients.iter().zip(values).map(|(a, x)| a * x).sum()
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs + tolerance,
            ConstraintOp::Ge => lhs >= self.rhs - tolerance,
            ConstraintOp::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }

    /// The single variable this constraint touches, if it touches exactly one
    pub(crate) fn single_variable(&self, tolerance: f64) -> Option<(usize, f64)> {
        let mut found = None;
        for (j, &a) in self.coefficients.iter().enumerate() {
            if a.abs() > tolerance {
                if found.is_some() {
                    return None;
                }
                found = Some((j, a));
            }
        }
        found
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    #[cfg_attr(feature = "serde", serde(rename = "<="))]
    Le,
    /// Greater than or equal (>=)
    #[cfg_attr(feature = "serde", serde(rename = ">="))]
    Ge,
    /// Equal (=)
    #[cfg_attr(feature = "serde", serde(rename = "="))]
    Eq,
}

impl std::fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintOp::Le => write!(f, "<="),
            ConstraintOp::Ge => write!(f, ">="),
            ConstraintOp::Eq => write!(f, "="),
        }
    }
}

/// A linear or integer programming model.
///
/// Search procedures never edit a model in place; they derive children through
/// [`Model::with_constraint`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub sense: Sense,
    pub variables: Vec<Variable>,
    /// Objective coefficients, aligned with `variables`
    pub objective: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constraints: Vec<Constraint>,
}

impl Model {
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            variables: Vec::new(),
            objective: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Adds a variable with the given objective coefficient and returns its index.
    ///
    /// Existing constraints are padded with a zero coefficient.
    pub fn add_variable(&mut self, variable: Variable, objective: f64) -> usize {
        self.variables.push(variable);
        self.objective.push(objective);
        for c in &mut self.constraints {
            c.coefficients.push(0.0);
        }
        self.variables.len() - 1
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        coefficients: Vec<f64>,
        op: ConstraintOp,
        rhs: f64,
    ) {
        self.constraints.push(Constraint::new(name, coefficients, op, rhs));
    }

    /// Clone of this model with one more constraint appended
    pub fn with_constraint(&self, constraint: Constraint) -> Self {
        let mut child = self.clone();
        child.constraints.push(constraint);
        child
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub fn has_integral_variables(&self) -> bool {
        self.variables.iter().any(|v| v.kind.is_integral())
    }

    /// Checks the alignment invariants between variables, objective and constraints
    pub fn validate(&self) -> Result<(), SolveError> {
        let n = self.variables.len();
        if self.objective.len() != n {
            return Err(SolveError::DimensionMismatch {
                context: "objective".to_string(),
                expected: n,
                found: self.objective.len(),
            });
        }
        for c in &self.constraints {
            if c.coefficients.len() != n {
                return Err(SolveError::DimensionMismatch {
                    context: format!("constraint '{}'", c.name),
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
        }
        Ok(())
    }

    /// Objective value at `values`
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, x)| c * x).sum()
    }

    /// Whether `values` satisfies every constraint and variable bound within `tolerance`
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let in_bounds = self.variables.iter().zip(values).all(|(v, &x)| {
            x >= v.lower_bound() - tolerance && x <= v.upper_bound() + tolerance
        });
        in_bounds && self.constraints.iter().all(|c| c.is_satisfied(values, tolerance))
    }
}
