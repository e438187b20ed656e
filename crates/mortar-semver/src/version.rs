//! Version normalization and comparison.
//!
//! Pretty versions (`v1.2`, `2.0.1-beta2`, `dev-main`, `1.0.x-dev`) are
//! normalized into Composer's internal four-component form
//! (`1.2.0.0`, `2.0.1.0-beta2`, `9999999-dev`, `1.0.9999999.9999999-dev`)
//! which admits a total order.

use std::cmp::Ordering;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version string \"{0}\"")]
pub struct VersionError(pub String);

/// Package stability levels, derived from the version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stability {
    /// Development version (branches, `-dev` suffixes)
    Dev,
    /// Alpha release
    Alpha,
    /// Beta release
    Beta,
    /// Release candidate
    RC,
    /// Stable release
    Stable,
}

impl Stability {
    /// Returns the stability priority (lower is more stable).
    pub fn priority(&self) -> u8 {
        match self {
            Stability::Stable => 0,
            Stability::RC => 5,
            Stability::Beta => 10,
            Stability::Alpha => 15,
            Stability::Dev => 20,
        }
    }

    /// Derives the stability from a version string (pretty or normalized).
    pub fn from_version(version: &str) -> Self {
        let lower = version.to_lowercase();
        if lower.starts_with("dev-") || lower.ends_with("-dev") || lower.ends_with(".dev") {
            return Stability::Dev;
        }
        match suffix_token(&lower) {
            Some("alpha") | Some("a") => Stability::Alpha,
            Some("beta") | Some("b") => Stability::Beta,
            Some("rc") => Stability::RC,
            _ => Stability::Stable,
        }
    }

    /// Parses a stability name (`"dev"`, `"beta"`, ...); unknown names are
    /// treated as stable.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" => Stability::Dev,
            "alpha" => Stability::Alpha,
            "beta" => Stability::Beta,
            "rc" => Stability::RC,
            _ => Stability::Stable,
        }
    }
}

impl Default for Stability {
    fn default() -> Self {
        Stability::Stable
    }
}

impl std::fmt::Display for Stability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stability::Dev => write!(f, "dev"),
            Stability::Alpha => write!(f, "alpha"),
            Stability::Beta => write!(f, "beta"),
            Stability::RC => write!(f, "RC"),
            Stability::Stable => write!(f, "stable"),
        }
    }
}

/// Extracts the trailing stability token of a version string, if any
/// (`"1.0.0-beta2"` yields `"beta"`).
fn suffix_token(lower: &str) -> Option<&str> {
    lazy_static! {
        static ref SUFFIX: Regex =
            Regex::new(r"[._-](stable|beta|b|rc|alpha|a|patch|pl|p)[._-]?\d*$").unwrap();
    }
    SUFFIX.captures(lower).map(|c| c.get(1).unwrap().as_str())
}

lazy_static! {
    // Plain numeric version with optional stability suffix and optional
    // trailing "-dev": v1.2.3.4-beta2, 2.0-rc1, 1.0.0-dev, ...
    static ref VERSION: Regex = Regex::new(
        r"(?i)^v?(\d{1,9})(?:\.(\d{1,9}))?(?:\.(\d{1,9}))?(?:\.(\d{1,9}))?(?:[._-]?(stable|beta|b|rc|alpha|a|patch|pl|p)[._-]?(\d{1,9})?)?([._-]?dev)?$"
    )
    .unwrap();

    // Branch-style version: 1.0.x-dev, 2.x, v1.*-dev
    static ref BRANCH: Regex =
        Regex::new(r"(?i)^v?(\d{1,9}|[x*])(?:\.(\d{1,9}|[x*]))?(?:\.(\d{1,9}|[x*]))?(?:\.(\d{1,9}|[x*]))?(?:[._-]?dev)?$").unwrap();
}

/// Normalizes pretty version strings.
///
/// The parser is stateless; it exists as a struct so callers can hold one
/// the way they would hold a configured parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionParser;

impl VersionParser {
    pub fn new() -> Self {
        VersionParser
    }

    /// Normalizes a pretty version into the internal four-component form.
    pub fn normalize(&self, version: &str) -> Result<String, VersionError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(VersionError(version.to_string()));
        }

        // Strip build metadata, it does not participate in ordering
        let version = version.split('+').next().unwrap_or(version);

        if let Some(branch) = version.strip_prefix("dev-").or_else(|| version.strip_prefix("DEV-")) {
            // Default branches normalize to the "latest" sentinel version
            if matches!(
                branch.to_lowercase().as_str(),
                "master" | "main" | "trunk" | "default" | "latest"
            ) {
                return Ok("9999999-dev".to_string());
            }
            return Ok(format!("dev-{branch}"));
        }

        if let Some(caps) = VERSION.captures(version) {
            let mut normalized = format!(
                "{}.{}.{}.{}",
                &caps[1],
                caps.get(2).map_or("0", |m| m.as_str()),
                caps.get(3).map_or("0", |m| m.as_str()),
                caps.get(4).map_or("0", |m| m.as_str()),
            );

            if let Some(stab) = caps.get(5) {
                let stab = expand_stability(stab.as_str());
                if stab != "stable" {
                    normalized.push('-');
                    normalized.push_str(stab);
                    if let Some(num) = caps.get(6) {
                        normalized.push_str(num.as_str());
                    }
                }
            } else if caps.get(7).is_some() {
                normalized.push_str("-dev");
            }

            return Ok(normalized);
        }

        // 1.0.x style branch versions
        if version.to_lowercase().contains('x')
            || version.contains('*')
            || version.to_lowercase().ends_with("-dev")
        {
            if let Some(caps) = BRANCH.captures(version) {
                let mut parts = Vec::with_capacity(4);
                for i in 1..=4 {
                    match caps.get(i) {
                        Some(m) if m.as_str() == "x" || m.as_str() == "X" || m.as_str() == "*" => {
                            parts.push("9999999".to_string())
                        }
                        Some(m) => parts.push(m.as_str().to_string()),
                        None => parts.push("9999999".to_string()),
                    }
                }
                return Ok(format!("{}-dev", parts.join(".")));
            }
        }

        Err(VersionError(version.to_string()))
    }

    /// Normalizes a branch name the way a checked-out branch would appear as
    /// a version (`main` becomes `9999999-dev`, `1.0` becomes
    /// `1.0.x-dev` normalized).
    pub fn normalize_branch(&self, branch: &str) -> String {
        let branch = branch.trim();
        if matches!(
            branch.to_lowercase().as_str(),
            "master" | "main" | "trunk" | "default" | "latest"
        ) {
            return "9999999-dev".to_string();
        }

        let parts: Vec<&str> = branch.split('.').collect();
        let numeric_ish = !parts.is_empty()
            && parts.len() <= 4
            && parts
                .iter()
                .all(|p| p.parse::<u64>().is_ok() || matches!(*p, "x" | "X" | "*"));
        if numeric_ish {
            let mut full = Vec::with_capacity(4);
            for i in 0..4 {
                match parts.get(i) {
                    Some(p) if p.parse::<u64>().is_ok() => full.push((*p).to_string()),
                    _ => full.push("9999999".to_string()),
                }
            }
            return format!("{}-dev", full.join("."));
        }

        format!("dev-{branch}")
    }
}

fn expand_stability(s: &str) -> &'static str {
    match s.to_lowercase().as_str() {
        "a" | "alpha" => "alpha",
        "b" | "beta" => "beta",
        "rc" => "RC",
        "p" | "pl" | "patch" => "patch",
        _ => "stable",
    }
}

/// Ordering rank of a stability suffix; releases without a suffix sit
/// between RC and patch.
fn suffix_rank(suffix: &str) -> (u8, u64) {
    let lower = suffix.to_lowercase();
    let (name, rank) = if lower.starts_with("dev") {
        ("dev", 0)
    } else if lower.starts_with("alpha") {
        ("alpha", 1)
    } else if lower.starts_with("beta") {
        ("beta", 2)
    } else if lower.starts_with("rc") {
        ("rc", 3)
    } else if lower.starts_with("patch") {
        ("patch", 5)
    } else {
        ("", 4)
    };
    let num: u64 = lower[name.len()..]
        .trim_start_matches(['.', '-'])
        .parse()
        .unwrap_or(0);
    (rank, num)
}

/// Compares two normalized versions.
///
/// Branch versions (`dev-foo`) order below every numeric version and
/// lexicographically among themselves; numeric versions compare by their
/// four components, then by stability suffix (dev < alpha < beta < RC <
/// stable < patch), then by suffix number.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (a.starts_with("dev-"), b.starts_with("dev-")) {
        (true, true) => return a.cmp(b),
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    let (a_num, a_suffix) = split_suffix(a);
    let (b_num, b_suffix) = split_suffix(b);

    let a_parts = numeric_parts(a_num);
    let b_parts = numeric_parts(b_num);
    for i in 0..a_parts.len().max(b_parts.len()) {
        let pa = a_parts.get(i).copied().unwrap_or(0);
        let pb = b_parts.get(i).copied().unwrap_or(0);
        match pa.cmp(&pb) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    suffix_rank(a_suffix).cmp(&suffix_rank(b_suffix))
}

fn split_suffix(v: &str) -> (&str, &str) {
    match v.find('-') {
        Some(i) => (&v[..i], &v[i + 1..]),
        None => (v, ""),
    }
}

fn numeric_parts(v: &str) -> Vec<u64> {
    v.split('.').filter_map(|p| p.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &str) -> String {
        VersionParser::new().normalize(v).unwrap()
    }

    #[test]
    fn test_normalize_plain() {
        assert_eq!(norm("1.0.0"), "1.0.0.0");
        assert_eq!(norm("1.2.3.4"), "1.2.3.4");
        assert_eq!(norm("1.0"), "1.0.0.0");
        assert_eq!(norm("10"), "10.0.0.0");
        assert_eq!(norm("v2.1.3"), "2.1.3.0");
    }

    #[test]
    fn test_normalize_stability_suffixes() {
        assert_eq!(norm("1.0.0-beta2"), "1.0.0.0-beta2");
        assert_eq!(norm("1.0.0-b2"), "1.0.0.0-beta2");
        assert_eq!(norm("1.0.0-alpha1"), "1.0.0.0-alpha1");
        assert_eq!(norm("1.0.0-RC1"), "1.0.0.0-RC1");
        assert_eq!(norm("1.0.0-rc1"), "1.0.0.0-RC1");
        assert_eq!(norm("1.0.0-stable"), "1.0.0.0");
        assert_eq!(norm("1.0.0-patch1"), "1.0.0.0-patch1");
        assert_eq!(norm("1.0.0-dev"), "1.0.0.0-dev");
    }

    #[test]
    fn test_normalize_build_metadata_stripped() {
        assert_eq!(norm("1.0.0+build.5"), "1.0.0.0");
    }

    #[test]
    fn test_normalize_branches() {
        assert_eq!(norm("dev-master"), "9999999-dev");
        assert_eq!(norm("dev-main"), "9999999-dev");
        assert_eq!(norm("dev-feature/x"), "dev-feature/x");
        assert_eq!(norm("1.0.x-dev"), "1.0.9999999.9999999-dev");
        assert_eq!(norm("2.x-dev"), "2.9999999.9999999.9999999-dev");
        assert_eq!(norm("1.0.*"), "1.0.9999999.9999999-dev");
    }

    #[test]
    fn test_normalize_invalid() {
        assert!(VersionParser::new().normalize("").is_err());
        assert!(VersionParser::new().normalize("not a version").is_err());
        assert!(VersionParser::new().normalize("1.0.0.0.0").is_err());
    }

    #[test]
    fn test_normalize_branch_name() {
        let parser = VersionParser::new();
        assert_eq!(parser.normalize_branch("main"), "9999999-dev");
        assert_eq!(parser.normalize_branch("1.0"), "1.0.9999999.9999999-dev");
        assert_eq!(parser.normalize_branch("feature-y"), "dev-feature-y");
    }

    #[test]
    fn test_compare_numeric() {
        assert_eq!(compare("1.0.0.0", "1.0.0.0"), Ordering::Equal);
        assert_eq!(compare("2.0.0.0", "1.9.9.9"), Ordering::Greater);
        assert_eq!(compare("1.10.0.0", "1.9.0.0"), Ordering::Greater);
        assert_eq!(compare("1.0.0.0", "1.0.0.1"), Ordering::Less);
    }

    #[test]
    fn test_compare_suffixes() {
        assert_eq!(compare("1.0.0.0-dev", "1.0.0.0-alpha1"), Ordering::Less);
        assert_eq!(compare("1.0.0.0-alpha2", "1.0.0.0-alpha10"), Ordering::Less);
        assert_eq!(compare("1.0.0.0-beta1", "1.0.0.0-RC1"), Ordering::Less);
        assert_eq!(compare("1.0.0.0-RC1", "1.0.0.0"), Ordering::Less);
        assert_eq!(compare("1.0.0.0-patch1", "1.0.0.0"), Ordering::Greater);
    }

    #[test]
    fn test_compare_branches() {
        assert_eq!(compare("dev-foo", "1.0.0.0"), Ordering::Less);
        assert_eq!(compare("9999999-dev", "2.0.0.0"), Ordering::Greater);
        assert_eq!(compare("dev-a", "dev-b"), Ordering::Less);
    }

    #[test]
    fn test_stability_from_version() {
        assert_eq!(Stability::from_version("1.0.0"), Stability::Stable);
        assert_eq!(Stability::from_version("1.0.0-beta2"), Stability::Beta);
        assert_eq!(Stability::from_version("1.0.0-alpha1"), Stability::Alpha);
        assert_eq!(Stability::from_version("1.0.0-RC1"), Stability::RC);
        assert_eq!(Stability::from_version("dev-main"), Stability::Dev);
        assert_eq!(Stability::from_version("1.0.x-dev"), Stability::Dev);
    }

    #[test]
    fn test_stability_priority_order() {
        assert!(Stability::Stable.priority() < Stability::RC.priority());
        assert!(Stability::RC.priority() < Stability::Beta.priority());
        assert!(Stability::Beta.priority() < Stability::Alpha.priority());
        assert!(Stability::Alpha.priority() < Stability::Dev.priority());
    }
}
