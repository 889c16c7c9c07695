use std::path::Path;

use branchwise_solver::{Model, SolveError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// Reads a JSON model from disk and checks its dimensions
pub fn load_model(path: &Path) -> Result<Model, CliError> {
    let source = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_model(&source)
}

pub fn parse_model(source: &str) -> Result<Model, CliError> {
    let model: Model = serde_json::from_str(source)?;
    model.validate()?;
    Ok(model)
}
