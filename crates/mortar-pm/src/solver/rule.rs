use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::package::Link;

use super::pool::PackageId;

/// A literal in SAT terms: `+id` means "install package id", `-id` means
/// "do not install it". Negation is arithmetic negation; 0 is invalid.
pub type Literal = i32;

/// Identifier assigned to a rule by the [`super::RuleSet`].
pub type RuleId = u32;

/// Why a rule exists, together with the data needed to explain it.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleReason {
    /// An installed package may stay or move to one of its replacements
    InternalAllowUpdate { source: PackageId },
    /// A request job asked for one of these packages
    JobInstall { job: usize },
    /// A request job forbids this package
    JobRemove { job: usize },
    /// The source package declares a conflict
    PackageConflict { source: PackageId },
    /// The source package requires the link target
    PackageRequires { source: PackageId, link: Link },
    /// The source package replaces the other package's name
    PackageObsoletes { source: PackageId },
    /// Same as `PackageObsoletes`, but the replacer is already installed
    InstalledPackageObsoletes { source: PackageId },
    /// Two packages carry the same name
    PackageSameName,
    /// Same-name exclusion discovered through an alias
    PackageImplicitObsoletes { source: PackageId },
    /// Alias and aliased package install together
    PackageAlias { alias: Literal },
    /// Derived by conflict analysis
    Learned,
}

impl RuleReason {
    /// The request job this reason traces back to, if any.
    pub fn job(&self) -> Option<usize> {
        match self {
            RuleReason::JobInstall { job } | RuleReason::JobRemove { job } => Some(*job),
            _ => None,
        }
    }
}

/// Classification bucket, assigned when a rule enters the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    Package,
    Job,
    Learned,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Package => "package",
            RuleType::Job => "job",
            RuleType::Learned => "learned",
        }
    }
}

/// An immutable disjunction of literals.
///
/// Literals are sorted ascending and deduplicated at construction, so two
/// rules are equal exactly when their literal sequences are equal; the
/// reason and job are ignored for identity. The fingerprint is a fast
/// inequality check, full comparison breaks ties.
#[derive(Debug, Clone)]
pub struct Rule {
    literals: Vec<Literal>,
    reason: RuleReason,
    job: Option<usize>,
    rule_type: RuleType,
    id: RuleId,
    disabled: bool,
    hash: u64,
}

impl Rule {
    pub fn new(mut literals: Vec<Literal>, reason: RuleReason) -> Self {
        literals.sort_unstable();
        literals.dedup();

        let mut hasher = DefaultHasher::new();
        literals.hash(&mut hasher);
        let hash = hasher.finish();

        let job = reason.job();
        Self {
            literals,
            reason,
            job,
            rule_type: RuleType::Package,
            id: 0,
            disabled: false,
            hash,
        }
    }

    /// A single-literal rule.
    pub fn assertion(literal: Literal, reason: RuleReason) -> Self {
        Self::new(vec![literal], reason)
    }

    /// A requirement rule `(-source | target1 | target2 | ...)`.
    pub fn requires(source: PackageId, targets: &[PackageId], reason: RuleReason) -> Self {
        let mut literals = Vec::with_capacity(targets.len() + 1);
        literals.push(-source);
        literals.extend(targets.iter().copied());
        Self::new(literals, reason)
    }

    /// A binary exclusion `(-a | -b)`.
    pub fn exclude_pair(a: PackageId, b: PackageId, reason: RuleReason) -> Self {
        Self::new(vec![-a, -b], reason)
    }

    pub fn learned(literals: Vec<Literal>) -> Self {
        Self::new(literals, RuleReason::Learned)
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn reason(&self) -> &RuleReason {
        &self.reason
    }

    pub fn job(&self) -> Option<usize> {
        self.job
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub(super) fn set_rule_type(&mut self, rule_type: RuleType) {
        self.rule_type = rule_type;
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub(super) fn set_id(&mut self, id: RuleId) {
        self.id = id;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }

    pub fn is_assertion(&self) -> bool {
        self.literals.len() == 1
    }

    /// The distinguished empty clause; only ever produced for a job with no
    /// candidates, and immediately unsatisfiable.
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    /// Fingerprint of the literal sequence.
    pub fn literal_hash(&self) -> u64 {
        self.hash
    }

    /// Literal-sequence equality; the only notion of rule equality.
    pub fn equals_literals(&self, other: &Rule) -> bool {
        self.literals == other.literals
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.literals.iter().map(|l| l.to_string()).collect();
        write!(f, "({})", rendered.join(" | "))
    }
}
