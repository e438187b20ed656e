use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use mortar_semver::{Stability, VersionParser};

use super::{Link, LinkKind};

/// An immutable package descriptor.
///
/// Versions are stored in normalized form (`1.0` becomes `1.0.0.0`); the
/// version as written is kept as `pretty_version` for display. Names are
/// lowercase throughout; `pretty_name` keeps the original casing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Package {
    /// Package name (lowercase, vendor/package format)
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty_name: Option<String>,

    /// Normalized version
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty_version: Option<String>,

    /// Required dependencies (name -> constraint)
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub require: IndexMap<String, String>,

    /// Development dependencies
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub require_dev: IndexMap<String, String>,

    /// Conflicting packages
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub conflict: IndexMap<String, String>,

    /// Provided virtual packages
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub provide: IndexMap<String, String>,

    /// Replaced packages
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub replace: IndexMap<String, String>,

    /// Suggested companion packages
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub suggest: IndexMap<String, String>,

    /// VCS reference the package was resolved from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,

    /// Release date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl Package {
    /// Creates a package from a name and a pretty version.
    ///
    /// The version is normalized eagerly; a version that does not parse is
    /// kept verbatim so repositories with unusual versioning still load.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let version = version.into();
        let normalized = VersionParser::new()
            .normalize(&version)
            .unwrap_or_else(|_| version.clone());

        Self {
            name: name.to_lowercase(),
            pretty_name: Some(name),
            version: normalized,
            pretty_version: Some(version),
            require: IndexMap::new(),
            require_dev: IndexMap::new(),
            conflict: IndexMap::new(),
            provide: IndexMap::new(),
            replace: IndexMap::new(),
            suggest: IndexMap::new(),
            source_reference: None,
            time: None,
        }
    }

    /// Adds a runtime requirement; builder-style for tests and loaders.
    pub fn with_require(mut self, name: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.require
            .insert(name.into().to_lowercase(), constraint.into());
        self
    }

    pub fn with_conflict(mut self, name: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.conflict
            .insert(name.into().to_lowercase(), constraint.into());
        self
    }

    pub fn with_provide(mut self, name: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.provide
            .insert(name.into().to_lowercase(), constraint.into());
        self
    }

    pub fn with_replace(mut self, name: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.replace
            .insert(name.into().to_lowercase(), constraint.into());
        self
    }

    pub fn with_source_reference(mut self, reference: impl Into<String>) -> Self {
        self.source_reference = Some(reference.into());
        self
    }

    /// The version as written, falling back to the normalized form.
    pub fn pretty_version(&self) -> &str {
        self.pretty_version.as_deref().unwrap_or(&self.version)
    }

    /// `name version` for human-facing output.
    pub fn pretty_string(&self) -> String {
        format!("{} {}", self.name, self.pretty_version())
    }

    pub fn stability(&self) -> Stability {
        Stability::from_version(&self.version)
    }

    pub fn is_dev(&self) -> bool {
        self.stability() == Stability::Dev
    }

    /// All names under which this package satisfies requirements: its own
    /// name plus everything it provides or replaces.
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        names.extend(self.provide.keys().map(|n| n.to_lowercase()));
        names.extend(self.replace.keys().map(|n| n.to_lowercase()));
        names
    }

    /// Materializes the link table of one kind.
    pub fn links(&self, kind: LinkKind) -> Vec<Link> {
        let table = match kind {
            LinkKind::Require => &self.require,
            LinkKind::DevRequire => &self.require_dev,
            LinkKind::Provide => &self.provide,
            LinkKind::Conflict => &self.conflict,
            LinkKind::Replace => &self.replace,
        };
        table
            .iter()
            .map(|(target, constraint)| Link::new(&self.name, target, constraint, kind))
            .collect()
    }

    /// Replaces `self.version` constraints in the link tables with the
    /// package's own version. Manifests use this to pin replaced or
    /// provided names to whatever version the package itself carries.
    pub fn replace_self_version(&mut self) {
        let pinned = format!("={}", self.version);
        for table in [
            &mut self.require,
            &mut self.require_dev,
            &mut self.conflict,
            &mut self.provide,
            &mut self.replace,
        ] {
            for constraint in table.values_mut() {
                if constraint == "self.version" {
                    *constraint = pinned.clone();
                }
            }
        }
    }

    /// Platform packages describe the runtime, not installable code.
    pub fn is_platform(name: &str) -> bool {
        let lower = name.to_lowercase();
        lower == "php" || lower.starts_with("php-") || lower.starts_with("ext-") || lower.starts_with("lib-")
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes() {
        let pkg = Package::new("Vendor/Package", "v1.2");
        assert_eq!(pkg.name, "vendor/package");
        assert_eq!(pkg.pretty_name.as_deref(), Some("Vendor/Package"));
        assert_eq!(pkg.version, "1.2.0.0");
        assert_eq!(pkg.pretty_version(), "v1.2");
    }

    #[test]
    fn test_stability_from_version() {
        assert_eq!(Package::new("a", "1.0.0").stability(), Stability::Stable);
        assert_eq!(Package::new("a", "1.0.0-beta1").stability(), Stability::Beta);
        assert!(Package::new("a", "dev-main").is_dev());
    }

    #[test]
    fn test_names_include_provides_and_replaces() {
        let pkg = Package::new("vendor/impl", "1.0.0")
            .with_provide("vendor/interface", "1.0.0")
            .with_replace("vendor/legacy", "*");
        let names = pkg.names();
        assert_eq!(
            names,
            vec!["vendor/impl", "vendor/interface", "vendor/legacy"]
        );
    }

    #[test]
    fn test_links() {
        let pkg = Package::new("vendor/a", "1.0.0").with_require("vendor/b", "^2.0");
        let links = pkg.links(LinkKind::Require);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "vendor/b");
        assert_eq!(links[0].constraint, "^2.0");
    }

    #[test]
    fn test_replace_self_version() {
        let mut pkg = Package::new("vendor/a", "1.0.0");
        pkg.replace
            .insert("vendor/old".to_string(), "self.version".to_string());
        pkg.replace_self_version();
        assert_eq!(pkg.replace["vendor/old"], "=1.0.0.0");
    }

    #[test]
    fn test_is_platform() {
        assert!(Package::is_platform("php"));
        assert!(Package::is_platform("ext-json"));
        assert!(Package::is_platform("lib-icu"));
        assert!(!Package::is_platform("vendor/php-helper"));
    }

    #[test]
    fn test_serde_round_trip() {
        let pkg = Package::new("vendor/a", "1.0.0").with_require("vendor/b", "^1.0");
        let json = serde_json::to_string(&pkg).unwrap();
        let back: Package = serde_json::from_str(&json).unwrap();
        assert_eq!(pkg, back);
    }
}
