/// Full record of a simplex run, in the order things happened
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimplexTrace {
    /// Column labels: structural variables, then slacks, then "rhs"
    pub columns: Vec<String>,
    /// Tableau after construction and after every pivot (empty when snapshots are disabled)
    pub snapshots: Vec<TableauSnapshot>,
    pub pivots: Vec<PivotStep>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TableauSnapshot {
    /// Number of pivots applied before this snapshot was taken
    pub iteration: usize,
    /// Row labels: "z" for the objective row, then the basic variable of each constraint row
    pub basis: Vec<String>,
    pub cells: Vec<Vec<f64>>,
}

/// One pivot: `entering` replaces `leaving` in the basis
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PivotStep {
    pub iteration: usize,
    pub entering: String,
    pub leaving: String,
    /// Tableau row index (1-based, row 0 is the objective)
    pub row: usize,
    pub column: usize,
    pub element: f64,
    /// Winning ratio of the minimum-ratio test
    pub ratio: f64,
}

impl std::fmt::Display for PivotStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pivot {}: {} enters, {} leaves (row {}, ratio {:.4}, element {:.4})",
            self.iteration, self.entering, self.leaving, self.row, self.ratio, self.element
        )
    }
}
