//! Version constraints.
//!
//! A [`Constraint`] is a pure predicate over normalized versions. The parser
//! accepts the constraint grammar used in package manifests: exact versions,
//! caret (`^1.2`) and tilde (`~1.2.3`) ranges, wildcards (`1.0.*`),
//! comparison operators, hyphen ranges (`1.0 - 2.0`), conjunction by
//! whitespace or comma, and disjunction by `||`.

use std::cmp::Ordering;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::version::{compare, VersionParser};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version constraint \"{0}\"")]
pub struct ConstraintError(pub String);

/// Comparison operators for single-version constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }

    /// Whether an ordering between candidate and reference version
    /// satisfies this operator.
    fn admits(&self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Lt => ordering == Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
            Op::Gt => ordering == Ordering::Greater,
            Op::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A predicate over normalized versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Matches every version (`*`).
    MatchAll,
    /// Matches no version; the identity of disjunction.
    MatchNone,
    /// A single comparison against a normalized version.
    Version { op: Op, version: String },
    /// Conjunction (`conjunctive`) or disjunction of sub-constraints.
    Multi {
        parts: Vec<Constraint>,
        conjunctive: bool,
    },
}

impl Constraint {
    /// An exact-match constraint for an already normalized version.
    pub fn exact(normalized: impl Into<String>) -> Self {
        Constraint::Version {
            op: Op::Eq,
            version: normalized.into(),
        }
    }

    /// Parses a constraint expression.
    pub fn parse(text: &str) -> Result<Self, ConstraintError> {
        lazy_static! {
            static ref OR_SPLIT: Regex = Regex::new(r"\s*\|\|?\s*").unwrap();
            static ref AND_SPLIT: Regex = Regex::new(r"[\s,]+").unwrap();
            static ref HYPHEN_RANGE: Regex =
                Regex::new(r"^(?P<from>[^\s]+) +- +(?P<to>[^\s]+)$").unwrap();
        }

        let text = text.trim();
        if text.is_empty() || text == "*" {
            return Ok(Constraint::MatchAll);
        }

        let mut or_parts = Vec::new();
        for group in OR_SPLIT.split(text) {
            let group = group.trim();
            if group.is_empty() {
                continue;
            }

            if let Some(caps) = HYPHEN_RANGE.captures(group) {
                or_parts.push(parse_hyphen_range(&caps["from"], &caps["to"])?);
                continue;
            }

            let mut and_parts = Vec::new();
            for token in AND_SPLIT.split(group) {
                if token.is_empty() {
                    continue;
                }
                and_parts.push(parse_single(token)?);
            }
            or_parts.push(conjoin(and_parts));
        }

        if or_parts.is_empty() {
            return Err(ConstraintError(text.to_string()));
        }
        Ok(disjoin(or_parts))
    }

    /// Evaluates the predicate against a normalized version.
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            Constraint::MatchAll => true,
            Constraint::MatchNone => false,
            Constraint::Version { op, version } => {
                // Branch versions only ever compare meaningfully for
                // (in)equality; a range never admits dev-foo.
                if normalized.starts_with("dev-") || version.starts_with("dev-") {
                    return match op {
                        Op::Eq => normalized == version,
                        Op::Ne => normalized != version,
                        _ => false,
                    };
                }
                op.admits(compare(normalized, version))
            }
            Constraint::Multi { parts, conjunctive } => {
                if *conjunctive {
                    parts.iter().all(|p| p.matches(normalized))
                } else {
                    parts.iter().any(|p| p.matches(normalized))
                }
            }
        }
    }

    /// Whether this constraint and another can be satisfied by a common
    /// version. Exact-versus-anything is decided precisely; overlapping
    /// ranges are decided by bound comparison where both sides expose
    /// bounds, and conservatively (`true`) otherwise.
    pub fn intersects(&self, other: &Constraint) -> bool {
        match (self, other) {
            (Constraint::MatchNone, _) | (_, Constraint::MatchNone) => false,
            (Constraint::MatchAll, _) | (_, Constraint::MatchAll) => true,
            (Constraint::Version { op: Op::Eq, version }, _) => other.matches(version),
            (_, Constraint::Version { op: Op::Eq, version }) => self.matches(version),
            (Constraint::Multi { parts, conjunctive: false }, _) => {
                parts.iter().any(|p| p.intersects(other))
            }
            (_, Constraint::Multi { parts, conjunctive: false }) => {
                parts.iter().any(|p| self.intersects(p))
            }
            _ => match (self.bounds(), other.bounds()) {
                (Some(a), Some(b)) => a.overlaps(&b),
                _ => true,
            },
        }
    }

    /// Interval bounds for a single comparison or a conjunction of
    /// comparisons; `None` when the shape is not a plain interval.
    fn bounds(&self) -> Option<Interval> {
        match self {
            Constraint::Version { op, version } => Interval::from_op(*op, version),
            Constraint::Multi { parts, conjunctive: true } => {
                let mut interval = Interval::unbounded();
                for part in parts {
                    interval = interval.intersect(part.bounds()?)?;
                }
                Some(interval)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::MatchAll => write!(f, "*"),
            Constraint::MatchNone => write!(f, "<none>"),
            Constraint::Version { op, version } => write!(f, "{op} {version}"),
            Constraint::Multi { parts, conjunctive } => {
                let sep = if *conjunctive { " " } else { " || " };
                let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "[{}]", rendered.join(sep))
            }
        }
    }
}

/// A half-open-ish version interval used for intersection tests.
#[derive(Debug, Clone)]
struct Interval {
    lower: Option<(String, bool)>, // (version, inclusive)
    upper: Option<(String, bool)>,
}

impl Interval {
    fn unbounded() -> Self {
        Interval { lower: None, upper: None }
    }

    fn from_op(op: Op, version: &str) -> Option<Self> {
        let v = version.to_string();
        match op {
            Op::Eq => Some(Interval {
                lower: Some((v.clone(), true)),
                upper: Some((v, true)),
            }),
            Op::Gt => Some(Interval { lower: Some((v, false)), upper: None }),
            Op::Ge => Some(Interval { lower: Some((v, true)), upper: None }),
            Op::Lt => Some(Interval { lower: None, upper: Some((v, false)) }),
            Op::Le => Some(Interval { lower: None, upper: Some((v, true)) }),
            Op::Ne => None,
        }
    }

    fn intersect(self, other: Interval) -> Option<Interval> {
        let lower = match (self.lower, other.lower) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => Some(match compare(&a.0, &b.0) {
                Ordering::Less => b,
                Ordering::Greater => a,
                Ordering::Equal => (a.0, a.1 && b.1),
            }),
        };
        let upper = match (self.upper, other.upper) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => Some(match compare(&a.0, &b.0) {
                Ordering::Less => a,
                Ordering::Greater => b,
                Ordering::Equal => (a.0, a.1 && b.1),
            }),
        };
        Some(Interval { lower, upper })
    }

    fn overlaps(&self, other: &Interval) -> bool {
        fn below(upper: &Option<(String, bool)>, lower: &Option<(String, bool)>) -> bool {
            // Is the interval ending at `upper` entirely below the one
            // starting at `lower`?
            match (upper, lower) {
                (Some((u, u_inc)), Some((l, l_inc))) => match compare(u, l) {
                    Ordering::Less => true,
                    Ordering::Equal => !(*u_inc && *l_inc),
                    Ordering::Greater => false,
                },
                _ => false,
            }
        }
        !below(&self.upper, &other.lower) && !below(&other.upper, &self.lower)
    }
}

/// Groups a conjunction, flattening the single-element case.
fn conjoin(mut parts: Vec<Constraint>) -> Constraint {
    match parts.len() {
        0 => Constraint::MatchAll,
        1 => parts.pop().unwrap(),
        _ => Constraint::Multi { parts, conjunctive: true },
    }
}

fn disjoin(mut parts: Vec<Constraint>) -> Constraint {
    match parts.len() {
        0 => Constraint::MatchNone,
        1 => parts.pop().unwrap(),
        _ => Constraint::Multi { parts, conjunctive: false },
    }
}

fn parse_single(token: &str) -> Result<Constraint, ConstraintError> {
    let parser = VersionParser::new();

    // Stability flags ("1.0@dev") only widen what the pool may pick; the
    // predicate itself ignores them.
    let token = token.split('@').next().unwrap_or(token);
    if token.is_empty() || token == "*" || token.eq_ignore_ascii_case("x") {
        return Ok(Constraint::MatchAll);
    }

    if let Some(rest) = token.strip_prefix('^') {
        return caret(rest);
    }
    if let Some(rest) = token.strip_prefix("~>").or_else(|| token.strip_prefix('~')) {
        return tilde(rest);
    }

    for (prefix, op) in [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("!=", Op::Ne),
        ("<>", Op::Ne),
        ("==", Op::Eq),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            let rest = rest.trim();
            let version = parser
                .normalize(rest)
                .map_err(|_| ConstraintError(token.to_string()))?;
            return Ok(Constraint::Version { op, version });
        }
    }

    // Branch versions (1.0.x-dev, dev-main handled below) are exact
    // matches against the normalized branch form
    if token.to_lowercase().ends_with("-dev") {
        let version = parser
            .normalize(token)
            .map_err(|_| ConstraintError(token.to_string()))?;
        return Ok(Constraint::exact(version));
    }

    // Wildcards like 1.0.* are ranges, not exact matches
    if token.contains(".*") || token.to_lowercase().contains(".x") {
        return wildcard(token);
    }

    let version = parser
        .normalize(token)
        .map_err(|_| ConstraintError(token.to_string()))?;
    Ok(Constraint::exact(version))
}

/// Numeric components as written in the constraint (before padding), plus
/// any stability suffix carried by the token.
fn written_parts(token: &str) -> Result<(Vec<u64>, Option<String>), ConstraintError> {
    let (number, suffix) = match token.find('-') {
        Some(i) => (&token[..i], Some(token[i + 1..].to_string())),
        None => (token, None),
    };
    let number = number.trim_start_matches(['v', 'V']);
    let mut parts = Vec::new();
    for p in number.split('.') {
        let n: u64 = p.parse().map_err(|_| ConstraintError(token.to_string()))?;
        parts.push(n);
    }
    if parts.is_empty() || parts.len() > 4 {
        return Err(ConstraintError(token.to_string()));
    }
    Ok((parts, suffix))
}

fn padded(parts: &[u64]) -> String {
    let mut full = [0u64; 4];
    full[..parts.len()].copy_from_slice(parts);
    format!("{}.{}.{}.{}", full[0], full[1], full[2], full[3])
}

fn range(lower: String, upper: String) -> Constraint {
    Constraint::Multi {
        parts: vec![
            Constraint::Version { op: Op::Ge, version: lower },
            Constraint::Version { op: Op::Lt, version: upper },
        ],
        conjunctive: true,
    }
}

/// `^1.2.3` allows everything up to the next breaking release.
fn caret(rest: &str) -> Result<Constraint, ConstraintError> {
    let (parts, suffix) = written_parts(rest)?;

    let mut lower = padded(&parts);
    match suffix {
        Some(s) => {
            lower.push('-');
            lower.push_str(&s);
        }
        // No suffix written: admit pre-releases of the lower bound itself
        None => lower.push_str("-dev"),
    }

    let mut upper_parts = vec![0u64; 4];
    if parts[0] > 0 || parts.len() == 1 {
        upper_parts[0] = parts[0] + 1;
    } else if parts[1] > 0 || parts.len() == 2 {
        upper_parts[0] = parts[0];
        upper_parts[1] = parts[1] + 1;
    } else {
        upper_parts[0] = parts[0];
        upper_parts[1] = parts[1];
        upper_parts[2] = parts[2] + 1;
    }
    let upper = format!("{}-dev", padded(&upper_parts));

    Ok(range(lower, upper))
}

/// `~1.2.3` allows the last written component to grow.
fn tilde(rest: &str) -> Result<Constraint, ConstraintError> {
    let (parts, suffix) = written_parts(rest)?;

    let mut lower = padded(&parts);
    match suffix {
        Some(s) => {
            lower.push('-');
            lower.push_str(&s);
        }
        None => lower.push_str("-dev"),
    }

    let mut upper_parts = parts.clone();
    if upper_parts.len() > 1 {
        upper_parts.pop();
    }
    *upper_parts.last_mut().unwrap() += 1;
    let upper = format!("{}-dev", padded(&upper_parts));

    Ok(range(lower, upper))
}

/// `1.0.*` is the range of everything sharing the written prefix.
fn wildcard(token: &str) -> Result<Constraint, ConstraintError> {
    let lowered = token.to_lowercase();
    let prefix: Vec<&str> = lowered
        .trim_start_matches('v')
        .split('.')
        .take_while(|p| *p != "*" && *p != "x")
        .collect();
    if prefix.is_empty() {
        return Ok(Constraint::MatchAll);
    }

    let mut parts = Vec::new();
    for p in &prefix {
        let n: u64 = p.parse().map_err(|_| ConstraintError(token.to_string()))?;
        parts.push(n);
    }
    if parts.len() >= 4 {
        return Err(ConstraintError(token.to_string()));
    }

    let lower = format!("{}-dev", padded(&parts));
    let mut upper_parts = parts.clone();
    *upper_parts.last_mut().unwrap() += 1;
    let upper = format!("{}-dev", padded(&upper_parts));

    Ok(range(lower, upper))
}

/// `1.0 - 2.0` is an inclusive range; an imprecise upper side widens to its
/// whole series (`2.0` means `<2.1`).
fn parse_hyphen_range(from: &str, to: &str) -> Result<Constraint, ConstraintError> {
    let (from_parts, from_suffix) = written_parts(from)?;
    let (to_parts, to_suffix) = written_parts(to)?;

    let mut lower = padded(&from_parts);
    match from_suffix {
        Some(s) => {
            lower.push('-');
            lower.push_str(&s);
        }
        None => lower.push_str("-dev"),
    }
    let lower = Constraint::Version { op: Op::Ge, version: lower };

    let upper = if to_suffix.is_none() && to_parts.len() < 3 {
        let mut upper_parts = to_parts.clone();
        *upper_parts.last_mut().unwrap() += 1;
        Constraint::Version {
            op: Op::Lt,
            version: format!("{}-dev", padded(&upper_parts)),
        }
    } else {
        let mut v = padded(&to_parts);
        if let Some(s) = to_suffix {
            v.push('-');
            v.push_str(&s);
        }
        Constraint::Version { op: Op::Le, version: v }
    };

    Ok(Constraint::Multi {
        parts: vec![lower, upper],
        conjunctive: true,
    })
}
