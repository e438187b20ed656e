//! SAT-based dependency resolution.
//!
//! The solver translates package metadata and a request into a boolean
//! constraint problem over package literals and runs a CDCL
//! (conflict-driven clause learning) search over it.
//!
//! # Architecture
//!
//! - [`Pool`]: registry of all candidate packages with stable ids
//! - [`Request`]: ordered list of install/update/remove jobs
//! - [`Policy`]: deterministic preference oracle used when branching
//! - [`RuleSet`] of [`Rule`]s: the generated clauses, interned by literal
//!   sequence
//! - [`Solver`]: assertions, unit propagation over two watched literals,
//!   policy-guided decisions, 1-UIP clause learning and backtracking
//! - [`Transaction`]: the solved set diffed against the installed baseline
//! - [`Problems`]: human-readable evidence when no solution exists
//!
//! # Example
//!
//! ```
//! use mortar_pm::package::Package;
//! use mortar_pm::repository::InstalledRepository;
//! use mortar_pm::solver::{Policy, Pool, Request, Solver};
//!
//! let mut pool = Pool::new();
//! pool.add_package(Package::new("vendor/log", "1.2.0"));
//!
//! let mut request = Request::new();
//! request.install("vendor/log", "^1.0");
//!
//! let policy = Policy::new();
//! let solver = Solver::new(&pool, &policy);
//! let transaction = solver.solve(&request, &InstalledRepository::new()).unwrap();
//! assert_eq!(transaction.new_installs().count(), 1);
//! ```

mod decisions;
mod policy;
mod pool;
mod problem;
mod request;
mod rule;
mod rule_generator;
mod rule_set;
#[allow(clippy::module_inception)]
mod solver;
mod transaction;
mod watch_graph;


pub use decisions::Decisions;
pub use policy::Policy;
pub use pool::{PackageId, Pool, PoolBuilder, PoolEntry};
pub use problem::{Problem, Problems};
pub use request::{Job, JobKind, Request};
pub use rule::{Literal, Rule, RuleId, RuleReason, RuleType};
pub use rule_generator::RuleGenerator;
pub use rule_set::RuleSet;
pub use solver::{Solver, SolverError};
pub use transaction::{Operation, Transaction, TransactionSummary};
pub use watch_graph::WatchGraph;
