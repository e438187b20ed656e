// Repositories
//
// A repository is a read-only source of package records. The solver never
// talks to repositories directly; their contents are registered into a
// solver Pool, which records repository priority at that point.

mod array;
mod installed;

pub use array::ArrayRepository;
pub use installed::InstalledRepository;

use std::sync::Arc;

use crate::package::{AliasPackage, Package};

/// A read-only source of packages.
pub trait Repository {
    /// A stable, unique name for this repository; used for priorities and
    /// diagnostics.
    fn name(&self) -> &str;

    /// All packages, in publication order.
    fn packages(&self) -> &[Arc<Package>];

    /// Alias records carried alongside the packages.
    fn aliases(&self) -> &[Arc<AliasPackage>] {
        &[]
    }

    /// All versions of a package by name.
    fn find_packages(&self, name: &str) -> Vec<Arc<Package>> {
        let name = name.to_lowercase();
        self.packages()
            .iter()
            .filter(|p| p.name == name)
            .cloned()
            .collect()
    }

    /// A specific version of a package, matched against either the
    /// normalized or the pretty version.
    fn find_package(&self, name: &str, version: &str) -> Option<Arc<Package>> {
        let name = name.to_lowercase();
        self.packages()
            .iter()
            .find(|p| p.name == name && (p.version == version || p.pretty_version() == version))
            .cloned()
    }

    fn has_package(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.packages().iter().any(|p| p.name == name)
    }

    fn count(&self) -> usize {
        self.packages().len()
    }
}
