use thiserror::Error;

use crate::search::SearchResult;
use crate::trace::SimplexTrace;

#[derive(Error, Debug)]
pub enum SolveError {
    #[error("Model unsupported: {0}")]
    ModelUnsupported(String),
    #[error("Dimension mismatch in {context}: expected {expected} coefficients, found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },
    #[error("Iteration limit of {limit} exceeded after {} pivots (possible cycling)", .trace.pivots.len())]
    IterationLimitExceeded {
        limit: usize,
        /// Everything recorded up to the point the limit was hit
        trace: Box<SimplexTrace>,
    },
    #[error("Nothing to branch on: model has no integer or binary variables")]
    NothingToBranch,
    #[error("Node limit of {limit} reached after exploring {explored} nodes")]
    NodeLimitExceeded {
        limit: usize,
        explored: usize,
        /// Tree as it stood when the limit was hit; open nodes are still `Created`
        /// and the incumbent, if any, is in `best_values`
        partial: Box<SearchResult>,
    },
}

impl SolveError {
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::ModelUnsupported(msg.into())
    }
}
