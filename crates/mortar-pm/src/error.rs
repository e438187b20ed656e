use thiserror::Error;

use crate::solver::SolverError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Version(#[from] mortar_semver::VersionError),

    #[error(transparent)]
    Constraint(#[from] mortar_semver::ConstraintError),

    #[error("dependency resolution failed: {0}")]
    Solver(#[from] SolverError),
}

pub type Result<T> = std::result::Result<T, Error>;
