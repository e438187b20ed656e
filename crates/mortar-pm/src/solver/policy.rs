use std::cmp::Ordering;

use mortar_semver::compare;

use super::pool::{Pool, PackageId};

/// The preference oracle consulted when the solver branches.
///
/// Given the candidates of an open disjunction the policy returns them in
/// the order they should be tried. It never mutates anything and is fully
/// deterministic: ties always fall through to the pool id.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Prefer stable releases over pre-releases of a higher version
    pub prefer_stable: bool,
    /// Prefer the lowest admissible version (dependency-CI mode)
    pub prefer_lowest: bool,
    /// Prefer candidates that are already installed, unless the solve
    /// explicitly allows updating them
    pub prefer_installed: bool,
}

impl Policy {
    pub fn new() -> Self {
        Self {
            prefer_stable: true,
            prefer_lowest: false,
            prefer_installed: true,
        }
    }

    pub fn prefer_stable(mut self, prefer: bool) -> Self {
        self.prefer_stable = prefer;
        self
    }

    pub fn prefer_lowest(mut self, prefer: bool) -> Self {
        self.prefer_lowest = prefer;
        self
    }

    pub fn prefer_installed(mut self, prefer: bool) -> Self {
        self.prefer_installed = prefer;
        self
    }

    /// Ranks candidates, best first.
    ///
    /// `installed_first` is the caller's context: true when the candidates
    /// answer a requirement whose package is not update-allowed in this
    /// solve, so an installed candidate should win outright.
    pub fn select_preferred(
        &self,
        pool: &Pool,
        candidates: &[PackageId],
        installed_first: bool,
    ) -> Vec<PackageId> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(|&a, &b| self.compare_candidates(pool, a, b, installed_first));
        sorted
    }

    fn compare_candidates(
        &self,
        pool: &Pool,
        a: PackageId,
        b: PackageId,
        installed_first: bool,
    ) -> Ordering {
        if self.prefer_installed && installed_first {
            match pool.is_installed(b).cmp(&pool.is_installed(a)) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        // Root aliases exist because the user pinned them; they outrank
        // everything else of the same name
        match pool.is_root_alias(b).cmp(&pool.is_root_alias(a)) {
            Ordering::Equal => {}
            other => return other,
        }

        match pool.priority_of(a).cmp(&pool.priority_of(b)) {
            Ordering::Equal => {}
            other => return other,
        }

        let (entry_a, entry_b) = match (pool.entry(a), pool.entry(b)) {
            (Some(ea), Some(eb)) => (ea, eb),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return a.cmp(&b),
        };

        if self.prefer_stable {
            match entry_a
                .stability()
                .priority()
                .cmp(&entry_b.stability().priority())
            {
                Ordering::Equal => {}
                other => return other,
            }
        }

        let by_version = compare(entry_a.version(), entry_b.version());
        let by_version = if self.prefer_lowest {
            by_version
        } else {
            by_version.reverse()
        };
        match by_version {
            Ordering::Equal => {}
            other => return other,
        }

        // Same effective version: the concrete package over its alias
        match entry_a.is_alias().cmp(&entry_b.is_alias()) {
            Ordering::Equal => {}
            other => return other,
        }

        a.cmp(&b)
    }

    /// Candidates that can take an installed package's place: every other
    /// version of the same name plus packages replacing that name.
    pub fn find_update_candidates(&self, pool: &Pool, installed: PackageId) -> Vec<PackageId> {
        let Some(entry) = pool.entry(installed) else {
            return Vec::new();
        };
        let name = entry.name().to_string();

        let mut candidates: Vec<PackageId> = pool
            .what_provides(&name, None)
            .into_iter()
            .filter(|&id| id != installed)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;
    use mortar_semver::Stability;

    #[test]
    fn test_prefers_newest_by_default() {
        let mut pool = Pool::new();
        let v1 = pool.add_package(Package::new("a", "1.0.0"));
        let v2 = pool.add_package(Package::new("a", "2.0.0"));
        let v15 = pool.add_package(Package::new("a", "1.5.0"));

        let policy = Policy::new();
        assert_eq!(
            policy.select_preferred(&pool, &[v1, v2, v15], false),
            vec![v2, v15, v1]
        );
    }

    #[test]
    fn test_prefer_lowest() {
        let mut pool = Pool::new();
        let v1 = pool.add_package(Package::new("a", "1.0.0"));
        let v2 = pool.add_package(Package::new("a", "2.0.0"));

        let policy = Policy::new().prefer_lowest(true);
        assert_eq!(policy.select_preferred(&pool, &[v1, v2], false), vec![v1, v2]);
    }

    #[test]
    fn test_prefer_stable_over_newer_prerelease() {
        let mut pool = Pool::with_minimum_stability(Stability::Dev);
        let stable = pool.add_package(Package::new("a", "1.0.0"));
        let alpha = pool.add_package(Package::new("a", "1.0.1-alpha1"));

        let policy = Policy::new();
        assert_eq!(
            policy.select_preferred(&pool, &[stable, alpha], false),
            vec![stable, alpha]
        );

        // Without the stability preference the newer alpha wins
        let policy = Policy::new().prefer_stable(false);
        assert_eq!(
            policy.select_preferred(&pool, &[stable, alpha], false),
            vec![alpha, stable]
        );
    }

    #[test]
    fn test_repository_priority_wins() {
        use std::sync::Arc;

        let mut pool = Pool::new();
        let mirror = pool.add_package_full(
            Arc::new(Package::new("a", "1.2.0")),
            Some("mirror"),
            1,
            false,
        );
        let primary = pool.add_package_full(
            Arc::new(Package::new("a", "1.1.0")),
            Some("primary"),
            0,
            false,
        );

        let policy = Policy::new();
        // Lower priority number outranks the higher version
        assert_eq!(
            policy.select_preferred(&pool, &[mirror, primary], false),
            vec![primary, mirror]
        );
    }

    #[test]
    fn test_installed_first_in_lock_mode() {
        use std::sync::Arc;

        let mut pool = Pool::new();
        let newer = pool.add_package(Package::new("a", "2.0.0"));
        let installed = pool.add_package_full(
            Arc::new(Package::new("a", "1.0.0")),
            Some("installed"),
            0,
            true,
        );

        let policy = Policy::new();
        assert_eq!(
            policy.select_preferred(&pool, &[newer, installed], true),
            vec![installed, newer]
        );
        // In update mode the installed copy loses to the newer version
        assert_eq!(
            policy.select_preferred(&pool, &[newer, installed], false),
            vec![newer, installed]
        );
    }

    #[test]
    fn test_non_alias_before_alias_at_same_version() {
        let mut pool = Pool::with_minimum_stability(Stability::Dev);
        let base = pool.add_package(Package::new("a", "dev-feature"));
        let concrete = pool.add_package(Package::new("a", "1.0.0"));
        let alias = pool.add_alias(base, "1.0.0");

        let policy = Policy::new();
        let ranked = policy.select_preferred(&pool, &[alias, concrete], false);
        assert_eq!(ranked[0], concrete);
    }

    #[test]
    fn test_deterministic_tiebreak_by_id() {
        let mut pool = Pool::new();
        let first = pool.add_package(Package::new("a", "1.0.0"));
        let second = pool.add_package(Package::new("b", "1.0.0"));

        let policy = Policy::new();
        assert_eq!(
            policy.select_preferred(&pool, &[second, first], false),
            vec![first, second]
        );
    }

    #[test]
    fn test_find_update_candidates() {
        let mut pool = Pool::new();
        let installed = pool.add_package(Package::new("a", "1.0.0"));
        let newer = pool.add_package(Package::new("a", "2.0.0"));
        let replacer = pool.add_package(Package::new("b", "1.0.0").with_replace("a", "*"));
        pool.add_package(Package::new("c", "1.0.0"));

        let policy = Policy::new();
        let candidates = policy.find_update_candidates(&pool, installed);
        assert_eq!(candidates, vec![newer, replacer]);
    }
}
