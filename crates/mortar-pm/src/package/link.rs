use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of relation a [`Link`] expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Require,
    DevRequire,
    Provide,
    Conflict,
    Replace,
}

impl LinkKind {
    pub fn description(&self) -> &'static str {
        match self {
            LinkKind::Require => "requires",
            LinkKind::DevRequire => "requires (for development)",
            LinkKind::Provide => "provides",
            LinkKind::Conflict => "conflicts with",
            LinkKind::Replace => "replaces",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A typed edge from one package to a package name with a constraint.
///
/// Links are the payload attached to requirement rules so diagnostics can
/// say exactly which declaration produced a clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Source package name (lowercase)
    pub source: String,
    /// Target package name (lowercase)
    pub target: String,
    /// Constraint expression as written in the manifest
    pub constraint: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
}

impl Link {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        constraint: impl Into<String>,
        kind: LinkKind,
    ) -> Self {
        Self {
            source: source.into().to_lowercase(),
            target: target.into().to_lowercase(),
            constraint: constraint.into(),
            kind,
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.source, self.kind, self.target, self.constraint
        )
    }
}
