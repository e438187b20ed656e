use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use mortar_semver::{Stability, VersionParser};

use super::Package;

/// A version alias for a package.
///
/// An alias wraps another package record and presents a different version
/// while sharing source identity with it. Two situations create aliases:
///
/// 1. Branch aliases: `dev-main` published as `1.0.x-dev`
/// 2. Root aliases: `"vendor/package": "dev-main as 1.0.0"` in the root
///    manifest
///
/// The alias carries its own copies of the link tables because
/// `self.version` constraints must resolve to the alias version, not the
/// version of the aliased package.
#[derive(Debug, Clone)]
pub struct AliasPackage {
    alias_of: Arc<Package>,
    version: String,
    pretty_version: String,
    is_root_alias: bool,
    require: IndexMap<String, String>,
    conflict: IndexMap<String, String>,
    provide: IndexMap<String, String>,
    replace: IndexMap<String, String>,
}

impl AliasPackage {
    /// Creates an alias presenting `alias_of` under `version`.
    ///
    /// `version` may be pretty; it is normalized here.
    pub fn new(alias_of: Arc<Package>, version: impl Into<String>) -> Self {
        let pretty_version = version.into();
        let version = VersionParser::new()
            .normalize(&pretty_version)
            .unwrap_or_else(|_| pretty_version.clone());

        let pinned = format!("={version}");
        let rewrite = |table: &IndexMap<String, String>| {
            table
                .iter()
                .map(|(target, constraint)| {
                    let constraint = if constraint == "self.version" {
                        pinned.clone()
                    } else {
                        constraint.clone()
                    };
                    (target.clone(), constraint)
                })
                .collect()
        };

        Self {
            version,
            pretty_version,
            is_root_alias: false,
            require: rewrite(&alias_of.require),
            conflict: rewrite(&alias_of.conflict),
            provide: rewrite(&alias_of.provide),
            replace: rewrite(&alias_of.replace),
            alias_of,
        }
    }

    pub fn set_root_alias(&mut self, is_root_alias: bool) {
        self.is_root_alias = is_root_alias;
    }

    pub fn is_root_alias(&self) -> bool {
        self.is_root_alias
    }

    pub fn alias_of(&self) -> &Arc<Package> {
        &self.alias_of
    }

    pub fn name(&self) -> &str {
        &self.alias_of.name
    }

    /// Normalized alias version
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pretty_version(&self) -> &str {
        &self.pretty_version
    }

    pub fn pretty_string(&self) -> String {
        format!(
            "{} {} (alias of {})",
            self.name(),
            self.pretty_version,
            self.alias_of.pretty_version()
        )
    }

    pub fn stability(&self) -> Stability {
        Stability::from_version(&self.version)
    }

    pub fn require(&self) -> &IndexMap<String, String> {
        &self.require
    }

    pub fn conflict(&self) -> &IndexMap<String, String> {
        &self.conflict
    }

    pub fn provide(&self) -> &IndexMap<String, String> {
        &self.provide
    }

    pub fn replace(&self) -> &IndexMap<String, String> {
        &self.replace
    }
}

impl fmt::Display for AliasPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pretty_string())
    }
}

/// Splits an inline alias constraint (`"dev-main as 1.0.0"`) into the
/// requirement and the alias version. Returns `None` for plain constraints.
pub fn parse_inline_alias(constraint: &str) -> Option<(String, String)> {
    let (requirement, alias) = constraint.split_once(" as ")?;
    let requirement = requirement.trim();
    let alias = alias.trim();
    if requirement.is_empty() || alias.is_empty() {
        return None;
    }
    Some((requirement.to_string(), alias.to_string()))
}
