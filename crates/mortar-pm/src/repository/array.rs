use std::sync::Arc;

use crate::package::{AliasPackage, Package};

use super::Repository;

/// An in-memory repository.
///
/// Serves as the base for loaded repositories and as the test double; every
/// other repository kind eventually materializes into one of these before
/// pool construction.
#[derive(Debug, Clone, Default)]
pub struct ArrayRepository {
    name: String,
    packages: Vec<Arc<Package>>,
    aliases: Vec<Arc<AliasPackage>>,
}

impl ArrayRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
            aliases: Vec::new(),
        }
    }

    /// Adds a package, returning the shared handle.
    pub fn add_package(&mut self, package: Package) -> Arc<Package> {
        let package = Arc::new(package);
        self.packages.push(Arc::clone(&package));
        package
    }

    pub fn add_package_arc(&mut self, package: Arc<Package>) {
        self.packages.push(package);
    }

    /// Adds an alias record for a package already in this repository.
    pub fn add_alias(&mut self, alias: AliasPackage) -> Arc<AliasPackage> {
        let alias = Arc::new(alias);
        self.aliases.push(Arc::clone(&alias));
        alias
    }

    /// Convenience: registers `package` together with an alias version.
    pub fn add_aliased_package(
        &mut self,
        package: Package,
        alias_version: &str,
    ) -> (Arc<Package>, Arc<AliasPackage>) {
        let package = self.add_package(package);
        let alias = self.add_alias(AliasPackage::new(Arc::clone(&package), alias_version));
        (package, alias)
    }
}

impl Repository for ArrayRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn packages(&self) -> &[Arc<Package>] {
        &self.packages
    }

    fn aliases(&self) -> &[Arc<AliasPackage>] {
        &self.aliases
    }
}
