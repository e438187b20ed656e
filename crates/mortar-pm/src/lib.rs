//! Composer-compatible dependency resolution.
//!
//! The crate is organized around a small number of collaborating pieces:
//!
//! - [`package`]: immutable package descriptors, dependency links and
//!   version aliases
//! - [`repository`]: read-only package sources and the installed baseline
//! - [`lock`]: lock-file persistence
//! - [`solver`]: the core: a pool of candidate packages, a request of
//!   install/update/remove jobs, and a CDCL SAT solver that produces an
//!   ordered operation list or an explanation of why none exists

pub mod error;
pub mod lock;
pub mod package;
pub mod repository;
pub mod solver;

pub use error::{Error, Result};
pub use lock::{LockFile, LockedAlias, LockedPackage};
pub use package::{AliasPackage, Link, LinkKind, Package, Stability};
pub use repository::{ArrayRepository, InstalledRepository, Repository};
pub use solver::{
    Operation, Policy, Pool, PoolBuilder, Problems, Request, Solver, SolverError, Transaction,
};
