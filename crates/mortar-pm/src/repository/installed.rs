use std::sync::Arc;

use crate::lock::LockFile;
use crate::package::{AliasPackage, Package};

use super::{ArrayRepository, Repository};

/// The baseline set of installed packages.
///
/// The solver treats this repository's contents as what is currently on
/// disk: the transaction is the diff between it and the solved set, and the
/// rule generator emits keep-or-update rules for each of its packages.
#[derive(Debug, Clone, Default)]
pub struct InstalledRepository {
    inner: ArrayRepository,
}

impl InstalledRepository {
    pub fn new() -> Self {
        Self {
            inner: ArrayRepository::new("installed"),
        }
    }

    pub fn from_packages(packages: impl IntoIterator<Item = Package>) -> Self {
        let mut repo = Self::new();
        for package in packages {
            repo.add_package(package);
        }
        repo
    }

    /// Seeds the installed set from a lock file.
    pub fn from_lock(lock: &LockFile) -> Self {
        let mut repo = Self::new();
        for locked in &lock.packages {
            repo.add_package(locked.to_package());
        }
        for alias in &lock.aliases {
            let base = repo
                .inner
                .find_package(&alias.package, &alias.version)
                .unwrap_or_else(|| Arc::new(Package::new(&alias.package, &alias.version)));
            repo.inner.add_alias(AliasPackage::new(base, &alias.alias));
        }
        repo
    }

    pub fn add_package(&mut self, package: Package) -> Arc<Package> {
        self.inner.add_package(package)
    }

    pub fn add_alias(&mut self, alias: AliasPackage) -> Arc<AliasPackage> {
        self.inner.add_alias(alias)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.packages().is_empty()
    }
}

impl Repository for InstalledRepository {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn packages(&self) -> &[Arc<Package>] {
        self.inner.packages()
    }

    fn aliases(&self) -> &[Arc<AliasPackage>] {
        self.inner.aliases()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockedPackage;

    #[test]
    fn test_from_packages() {
        let repo = InstalledRepository::from_packages([
            Package::new("vendor/a", "1.0.0"),
            Package::new("vendor/b", "2.0.0"),
        ]);
        assert_eq!(repo.count(), 2);
        assert!(!repo.is_empty());
    }

    #[test]
    fn test_from_lock() {
        let mut lock = LockFile::default();
        lock.packages.push(LockedPackage {
            package: "vendor/a".to_string(),
            version: "1.0.0".to_string(),
            source_reference: Some("abc123".to_string()),
            require: Default::default(),
            time: None,
        });

        let repo = InstalledRepository::from_lock(&lock);
        assert_eq!(repo.count(), 1);
        let pkg = repo.find_package("vendor/a", "1.0.0").unwrap();
        assert_eq!(pkg.source_reference.as_deref(), Some("abc123"));
    }
}
