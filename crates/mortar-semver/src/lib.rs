//! Composer-compatible semantic versioning.
//!
//! Provides version normalization into Composer's four-component internal
//! form, a total order over normalized versions, and constraint parsing and
//! matching for the constraint grammar used in package manifests
//! (`^1.2`, `~1.2.3`, `1.0.*`, `>=1.0 <2.0`, `dev-main`, `1.0 || 2.0`, ...).

pub mod constraint;
mod version;

pub use constraint::{Constraint, ConstraintError, Op};
pub use version::{compare, Stability, VersionError, VersionParser};

/// Check whether a pretty version satisfies a constraint expression.
///
/// Returns `false` when either side fails to parse.
pub fn satisfies(version: &str, constraint: &str) -> bool {
    let parser = VersionParser::new();
    let Ok(normalized) = parser.normalize(version) else {
        return false;
    };
    match Constraint::parse(constraint) {
        Ok(c) => c.matches(&normalized),
        Err(_) => false,
    }
}
