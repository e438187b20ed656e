use std::fmt;

use super::pool::Pool;
use super::rule::{Rule, RuleReason};

/// Everything known about one reason the request cannot be satisfied.
///
/// A problem is a set of rules implicated by conflict analysis. Rules are
/// pure data; rendering resolves package ids through the pool only when a
/// description is requested.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    rules: Vec<Rule>,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: &Rule) {
        if self.rules.iter().any(|r| r.id() == rule.id()) {
            return;
        }
        self.rules.push(rule.clone());
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The request job this problem traces back to, if any of its rules
    /// carry one.
    pub fn job(&self) -> Option<usize> {
        self.rules.iter().find_map(|r| r.job())
    }

    pub fn describe(&self, pool: &Pool) -> String {
        let mut lines = Vec::new();
        for rule in &self.rules {
            let line = describe_rule(pool, rule);
            if !line.is_empty() {
                lines.push(format!("  - {line}"));
            }
        }
        lines.join("\n")
    }
}

/// Aggregated unsatisfiability evidence, one entry per independent cause.
#[derive(Debug, Clone, Default)]
pub struct Problems {
    problems: Vec<Problem>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }

    pub fn describe(&self, pool: &Pool) -> String {
        if self.problems.is_empty() {
            return "No problems found".to_string();
        }
        self.problems
            .iter()
            .enumerate()
            .map(|(i, p)| format!("Problem {}:\n{}", i + 1, p.describe(pool)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl fmt::Display for Problems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s) found", self.problems.len())
    }
}

fn literal_list(pool: &Pool, rule: &Rule) -> String {
    rule.literals()
        .iter()
        .map(|&l| pool.pretty_literal(l))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn pretty_id(pool: &Pool, id: i32) -> String {
    pool.entry(id)
        .map(|e| e.pretty_string())
        .unwrap_or_else(|| format!("package #{id}"))
}

/// Renders a rule through its reason.
fn describe_rule(pool: &Pool, rule: &Rule) -> String {
    match rule.reason() {
        RuleReason::JobInstall { .. } => {
            if rule.is_empty() {
                "Install command rule (no package satisfies the requested constraint)".to_string()
            } else {
                format!("Install command rule ({})", literal_list(pool, rule))
            }
        }
        RuleReason::JobRemove { .. } => {
            format!("Remove command rule ({})", literal_list(pool, rule))
        }
        RuleReason::PackageRequires { source, link } => {
            let source = pretty_id(pool, *source);
            let providers: Vec<String> = rule
                .literals()
                .iter()
                .filter(|&&l| l > 0)
                .map(|&l| pretty_id(pool, l))
                .collect();

            let head = format!("{source} requires {} ({})", link.target, link.constraint);
            if !providers.is_empty() {
                return format!("{head} -> satisfiable by {}.", providers.join(", "));
            }
            if let Some(ext) = link.target.strip_prefix("ext-") {
                return format!(
                    "{head} -> the requested PHP extension {ext} is missing or has the wrong version."
                );
            }
            if let Some(lib) = link.target.strip_prefix("lib-") {
                return format!(
                    "{head} -> the requested linked library {lib} is missing or has the wrong version."
                );
            }
            format!("{head} -> no matching package found.")
        }
        RuleReason::PackageConflict { source } => {
            let other = rule
                .literals()
                .iter()
                .map(|l| l.abs())
                .find(|id| id != source);
            match other {
                Some(other) => format!(
                    "{} conflicts with {}.",
                    pretty_id(pool, *source),
                    pretty_id(pool, other)
                ),
                None => format!("({})", literal_list(pool, rule)),
            }
        }
        RuleReason::PackageSameName => {
            let names: Vec<String> = rule
                .literals()
                .iter()
                .map(|l| pretty_id(pool, l.abs()))
                .collect();
            format!("Can only install one of: {}.", names.join(", "))
        }
        RuleReason::PackageObsoletes { source }
        | RuleReason::InstalledPackageObsoletes { source }
        | RuleReason::PackageImplicitObsoletes { source } => {
            let other = rule
                .literals()
                .iter()
                .map(|l| l.abs())
                .find(|id| id != source);
            match other {
                Some(other) => format!(
                    "{} replaces {} and cannot be installed with it.",
                    pretty_id(pool, *source),
                    pretty_id(pool, other)
                ),
                None => format!("({})", literal_list(pool, rule)),
            }
        }
        RuleReason::PackageAlias { alias } => {
            let base = rule
                .literals()
                .iter()
                .map(|l| l.abs())
                .find(|&id| id != alias.abs());
            match base {
                Some(base) => format!(
                    "{} is an alias of {} and must be installed with it.",
                    pretty_id(pool, alias.abs()),
                    pretty_id(pool, base)
                ),
                None => format!("({})", literal_list(pool, rule)),
            }
        }
        RuleReason::Learned => format!("Conclusion: ({})", literal_list(pool, rule)),
        RuleReason::InternalAllowUpdate { .. } => {
            format!("({})", literal_list(pool, rule))
        }
    }
}
