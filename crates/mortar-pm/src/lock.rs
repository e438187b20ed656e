//! Lock-file persistence.
//!
//! The lock file records the exact resolved set: one entry per package with
//! its version and source reference, plus the alias records that were in
//! effect. The installer shell reads it back to seed the installed
//! baseline for subsequent solves.

use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::package::{AliasPackage, Package};

/// One locked package entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockedPackage {
    pub package: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub require: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl LockedPackage {
    pub fn from_package(package: &Package) -> Self {
        Self {
            package: package.name.clone(),
            version: package.pretty_version().to_string(),
            source_reference: package.source_reference.clone(),
            require: package.require.clone(),
            time: package.time,
        }
    }

    pub fn to_package(&self) -> Package {
        let mut package = Package::new(&self.package, &self.version);
        package.source_reference = self.source_reference.clone();
        package.require = self
            .require
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        package.time = self.time;
        package
    }
}

/// One locked alias entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockedAlias {
    pub package: String,
    /// Version of the aliased package
    pub version: String,
    /// The version the alias presents
    pub alias: String,
    pub alias_normalized: String,
}

impl LockedAlias {
    pub fn from_alias(alias: &AliasPackage) -> Self {
        Self {
            package: alias.name().to_string(),
            version: alias.alias_of().pretty_version().to_string(),
            alias: alias.pretty_version().to_string(),
            alias_normalized: alias.version().to_string(),
        }
    }
}

/// The lock file as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockFile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_hash: String,
    #[serde(default)]
    pub packages: Vec<LockedPackage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<LockedAlias>,
}

impl LockFile {
    /// Builds a lock from a resolved package and alias set.
    pub fn from_resolution<'a>(
        packages: impl IntoIterator<Item = &'a Package>,
        aliases: impl IntoIterator<Item = &'a AliasPackage>,
    ) -> Self {
        let mut packages: Vec<LockedPackage> = packages
            .into_iter()
            .map(LockedPackage::from_package)
            .collect();
        packages.sort_by(|a, b| a.package.cmp(&b.package));

        let mut aliases: Vec<LockedAlias> =
            aliases.into_iter().map(LockedAlias::from_alias).collect();
        aliases.sort_by(|a, b| (&a.package, &a.alias).cmp(&(&b.package, &b.alias)));

        Self {
            content_hash: String::new(),
            packages,
            aliases,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_package() {
        let pkg = Package::new("vendor/a", "1.2.3")
            .with_require("vendor/b", "^1.0")
            .with_source_reference("abc123");

        let locked = LockedPackage::from_package(&pkg);
        assert_eq!(locked.version, "1.2.3");

        let back = locked.to_package();
        assert_eq!(back.name, "vendor/a");
        assert_eq!(back.version, "1.2.3.0");
        assert_eq!(back.require["vendor/b"], "^1.0");
        assert_eq!(back.source_reference.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_from_resolution_sorted() {
        let no_aliases: [&AliasPackage; 0] = [];
        let b = Package::new("vendor/b", "1.0.0");
        let a = Package::new("vendor/a", "1.0.0");
        let lock = LockFile::from_resolution([&b, &a], no_aliases);

        assert_eq!(lock.packages[0].package, "vendor/a");
        assert_eq!(lock.packages[1].package, "vendor/b");
    }

    #[test]
    fn test_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mortar.lock");

        let no_aliases: [&AliasPackage; 0] = [];
        let pkg = Package::new("vendor/a", "1.0.0");
        let lock = LockFile::from_resolution([&pkg], no_aliases);
        lock.write(&path).unwrap();

        let read = LockFile::read(&path).unwrap();
        assert_eq!(lock, read);
    }

    #[test]
    fn test_parses_composer_style_json() {
        let json = r#"{
            "content-hash": "d5ca",
            "packages": [
                {"package": "vendor/a", "version": "1.0.0", "source-reference": "ref1"}
            ],
            "aliases": [
                {"package": "vendor/a", "version": "dev-main", "alias": "1.0.0", "alias-normalized": "1.0.0.0"}
            ]
        }"#;
        let lock: LockFile = serde_json::from_str(json).unwrap();
        assert_eq!(lock.content_hash, "d5ca");
        assert_eq!(lock.packages.len(), 1);
        assert_eq!(lock.aliases[0].alias_normalized, "1.0.0.0");
    }
}
