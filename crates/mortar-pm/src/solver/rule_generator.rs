use std::collections::HashSet;

use crate::package::{Link, LinkKind};
use crate::repository::{InstalledRepository, Repository};

use super::policy::Policy;
use super::pool::{PackageId, Pool};
use super::request::{JobKind, Request};
use super::rule::{Rule, RuleReason, RuleType};
use super::rule_set::RuleSet;
use super::solver::SolverError;

/// Translates the pool, the request and the installed baseline into the
/// rule set the search runs on.
///
/// Every package reachable from the request contributes its requirement,
/// conflict, same-name, obsolete and alias rules; every job contributes a
/// job rule; every installed package not scheduled for removal contributes
/// a keep-or-update disjunction so the baseline survives unrelated solves.
pub struct RuleGenerator<'a> {
    pool: &'a Pool,
    policy: &'a Policy,
    rules: RuleSet,
    added: HashSet<PackageId>,
    same_name_done: HashSet<String>,
}

impl<'a> RuleGenerator<'a> {
    pub fn new(pool: &'a Pool, policy: &'a Policy) -> Self {
        Self {
            pool,
            policy,
            rules: RuleSet::new(),
            added: HashSet::new(),
            same_name_done: HashSet::new(),
        }
    }

    pub fn generate(
        mut self,
        request: &Request,
        installed: &InstalledRepository,
    ) -> Result<RuleSet, SolverError> {
        // Resolve the baseline up front so a pool missing its own installed
        // packages fails loudly instead of producing phantom removals
        let mut installed_ids = Vec::with_capacity(installed.count());
        for package in installed.packages() {
            let id = self
                .pool
                .find_package_id(&package.name, &package.version)
                .ok_or_else(|| {
                    SolverError::InvalidPool(format!(
                        "installed package {} is not registered in the pool",
                        package.pretty_string()
                    ))
                })?;
            installed_ids.push(id);
        }

        for (index, job) in request.jobs().iter().enumerate() {
            match job.kind {
                JobKind::Install => {
                    let Some(name) = job.name.as_deref() else {
                        continue;
                    };
                    let providers = self.pool.what_provides(name, job.constraint.as_deref());
                    for &id in &providers {
                        self.add_package_rules(id);
                    }
                    // An empty provider list yields the empty clause, which
                    // phase one reports against this job
                    self.rules.add(
                        Rule::new(providers, RuleReason::JobInstall { job: index }),
                        RuleType::Job,
                    );
                }
                JobKind::Remove => {
                    let Some(name) = job.name.as_deref() else {
                        continue;
                    };
                    for id in self.pool.what_provides(name, None) {
                        self.rules.add(
                            Rule::assertion(-id, RuleReason::JobRemove { job: index }),
                            RuleType::Job,
                        );
                    }
                }
                // Update jobs shape the keep-or-update rules below and the
                // policy context during branching; they emit nothing here
                JobKind::Update | JobKind::UpdateAll => {}
            }
        }

        for &id in &installed_ids {
            let Some(entry) = self.pool.entry(id) else {
                continue;
            };
            if request.is_remove_requested(entry.name()) {
                continue;
            }

            let candidates = self.policy.find_update_candidates(self.pool, id);
            self.add_package_rules(id);
            for &candidate in &candidates {
                self.add_package_rules(candidate);
            }

            let mut literals = vec![id];
            literals.extend(candidates);
            self.rules.add(
                Rule::new(literals, RuleReason::InternalAllowUpdate { source: id }),
                RuleType::Job,
            );
        }

        log::debug!(
            "generated {} rules ({} package, {} job) for {} reachable packages",
            self.rules.len(),
            self.rules.count_of_type(RuleType::Package),
            self.rules.count_of_type(RuleType::Job),
            self.added.len(),
        );

        Ok(self.rules)
    }

    /// Emits every package-level rule for `id` and recurses into the
    /// packages that can satisfy its requirements.
    fn add_package_rules(&mut self, id: PackageId) {
        if !self.added.insert(id) {
            return;
        }
        let Some(entry) = self.pool.entry(id) else {
            return;
        };

        // Alias and aliased package install together
        if let Some(base_id) = self.pool.alias_base(id) {
            self.rules.add(
                Rule::requires(id, &[base_id], RuleReason::PackageAlias { alias: id }),
                RuleType::Package,
            );
            let same_version = self
                .pool
                .entry(base_id)
                .map(|base| base.version() == entry.version())
                .unwrap_or(false);
            if same_version {
                self.rules.add(
                    Rule::requires(base_id, &[id], RuleReason::PackageAlias { alias: id }),
                    RuleType::Package,
                );
            }
            self.add_package_rules(base_id);
        }

        self.add_same_name_rules(entry.name());

        for (target, constraint) in entry.require() {
            let link = Link::new(entry.name(), target, constraint, LinkKind::Require);
            let providers = self.pool.what_provides(target, Some(constraint));
            // No providers leaves the bare exclusion (-id): installing this
            // package is impossible
            self.rules.add(
                Rule::requires(id, &providers, RuleReason::PackageRequires { source: id, link }),
                RuleType::Package,
            );
            for provider in providers {
                self.add_package_rules(provider);
            }
        }

        for (target, constraint) in entry.conflict() {
            for other in self.pool.what_provides(target, Some(constraint)) {
                if other != id {
                    self.rules.add(
                        Rule::exclude_pair(id, other, RuleReason::PackageConflict { source: id }),
                        RuleType::Package,
                    );
                }
            }
        }

        // Replacing a name obsoletes every package carrying it
        for target in entry.replace().keys() {
            for other in self.pool.ids_by_name(target) {
                if other == id {
                    continue;
                }
                let reason = if self.pool.is_installed(id) {
                    RuleReason::InstalledPackageObsoletes { source: id }
                } else {
                    RuleReason::PackageObsoletes { source: id }
                };
                self.rules
                    .add(Rule::exclude_pair(id, other, reason), RuleType::Package);
            }
        }
    }

    /// At most one package per name: pairwise exclusions over the name
    /// group, skipping alias/base pairs, which must coexist.
    fn add_same_name_rules(&mut self, name: &str) {
        let key = name.to_lowercase();
        if !self.same_name_done.insert(key) {
            return;
        }

        let ids = self.pool.ids_by_name(name);
        if ids.len() < 2 {
            return;
        }

        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                if self.pool.alias_base(a) == Some(b) || self.pool.alias_base(b) == Some(a) {
                    continue;
                }
                let reason = if self.pool.is_alias(a) || self.pool.is_alias(b) {
                    RuleReason::PackageImplicitObsoletes { source: a }
                } else {
                    RuleReason::PackageSameName
                };
                self.rules
                    .add(Rule::exclude_pair(a, b, reason), RuleType::Package);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Package;

    fn generate(pool: &Pool, request: &Request, installed: &InstalledRepository) -> RuleSet {
        RuleGenerator::new(pool, &Policy::new())
            .generate(request, installed)
            .unwrap()
    }

    #[test]
    fn test_install_job_rule_over_providers() {
        let mut pool = Pool::new();
        let a1 = pool.add_package(Package::new("vendor/a", "1.0.0"));
        let a2 = pool.add_package(Package::new("vendor/a", "1.5.0"));
        pool.add_package(Package::new("vendor/a", "2.0.0"));

        let mut request = Request::new();
        request.install("vendor/a", "^1.0");

        let rules = generate(&pool, &request, &InstalledRepository::new());

        let job_rule = rules
            .rules_of_type(RuleType::Job)
            .find(|r| matches!(r.reason(), RuleReason::JobInstall { .. }))
            .unwrap();
        assert_eq!(job_rule.literals(), &[a1, a2]);
    }

    #[test]
    fn test_install_job_without_candidates_is_empty_clause() {
        let pool = Pool::new();
        let mut request = Request::new();
        request.install("vendor/ghost", "^1.0");

        let rules = generate(&pool, &request, &InstalledRepository::new());
        assert!(rules.iter().any(|r| r.is_empty()));
    }

    #[test]
    fn test_requires_rule_and_recursion() {
        let mut pool = Pool::new();
        let a = pool.add_package(Package::new("vendor/a", "1.0.0").with_require("vendor/b", "^1.0"));
        let b = pool.add_package(Package::new("vendor/b", "1.0.0").with_require("vendor/c", "^1.0"));
        let c = pool.add_package(Package::new("vendor/c", "1.0.0"));

        let mut request = Request::new();
        request.install("vendor/a", "*");

        let rules = generate(&pool, &request, &InstalledRepository::new());

        let requires: Vec<_> = rules
            .iter()
            .filter(|r| matches!(r.reason(), RuleReason::PackageRequires { .. }))
            .collect();
        assert_eq!(requires.len(), 2);
        assert_eq!(requires[0].literals(), &[-a, b]);
        assert_eq!(requires[1].literals(), &[-b, c]);
    }

    #[test]
    fn test_requirement_without_providers_excludes_package() {
        let mut pool = Pool::new();
        let a =
            pool.add_package(Package::new("vendor/a", "1.0.0").with_require("ext-zip", "*"));

        let mut request = Request::new();
        request.install("vendor/a", "*");

        let rules = generate(&pool, &request, &InstalledRepository::new());
        assert!(rules
            .iter()
            .any(|r| r.literals() == [-a] && matches!(r.reason(), RuleReason::PackageRequires { .. })));
    }

    #[test]
    fn test_same_name_pairwise() {
        let mut pool = Pool::new();
        let v1 = pool.add_package(Package::new("vendor/a", "1.0.0"));
        let v2 = pool.add_package(Package::new("vendor/a", "1.1.0"));
        let v3 = pool.add_package(Package::new("vendor/a", "1.2.0"));

        let mut request = Request::new();
        request.install("vendor/a", "*");

        let rules = generate(&pool, &request, &InstalledRepository::new());
        let pairs: Vec<_> = rules
            .iter()
            .filter(|r| matches!(r.reason(), RuleReason::PackageSameName))
            .map(|r| r.literals().to_vec())
            .collect();

        assert_eq!(pairs.len(), 3);
        assert!(pairs.contains(&vec![-v2, -v1]));
        assert!(pairs.contains(&vec![-v3, -v1]));
        assert!(pairs.contains(&vec![-v3, -v2]));
    }

    #[test]
    fn test_conflict_rules() {
        let mut pool = Pool::new();
        let a =
            pool.add_package(Package::new("vendor/a", "1.0.0").with_conflict("vendor/b", "*"));
        let b = pool.add_package(Package::new("vendor/b", "1.0.0"));

        let mut request = Request::new();
        request.install("vendor/a", "*");
        request.install("vendor/b", "*");

        let rules = generate(&pool, &request, &InstalledRepository::new());
        assert!(rules.iter().any(|r| {
            r.literals() == [-b, -a] && matches!(r.reason(), RuleReason::PackageConflict { .. })
        }));
    }

    #[test]
    fn test_replace_emits_obsolete_rules() {
        let mut pool = Pool::new();
        let orig = pool.add_package(Package::new("vendor/orig", "1.0.0"));
        let fork =
            pool.add_package(Package::new("vendor/fork", "1.0.0").with_replace("vendor/orig", "*"));

        let mut request = Request::new();
        request.install("vendor/fork", "*");

        let rules = generate(&pool, &request, &InstalledRepository::new());
        assert!(rules.iter().any(|r| {
            r.literals() == [-fork, -orig]
                && matches!(r.reason(), RuleReason::PackageObsoletes { .. })
        }));
    }

    #[test]
    fn test_remove_job_excludes_providers() {
        let mut pool = Pool::new();
        let a = pool.add_package(Package::new("vendor/a", "1.0.0"));

        let mut request = Request::new();
        request.remove("vendor/a");

        let rules = generate(&pool, &request, &InstalledRepository::new());
        assert!(rules
            .iter()
            .any(|r| r.literals() == [-a] && matches!(r.reason(), RuleReason::JobRemove { .. })));
    }

    #[test]
    fn test_keep_or_update_rule_for_installed() {
        let mut pool = Pool::new();
        let installed_repo = InstalledRepository::from_packages([Package::new("vendor/a", "1.0.0")]);
        let old = pool.add_package_full(
            installed_repo.packages()[0].clone(),
            Some("installed"),
            -1,
            true,
        );
        let newer = pool.add_package(Package::new("vendor/a", "2.0.0"));

        let request = Request::new();
        let rules = generate(&pool, &request, &installed_repo);

        let keep = rules
            .iter()
            .find(|r| matches!(r.reason(), RuleReason::InternalAllowUpdate { .. }))
            .unwrap();
        assert_eq!(keep.literals(), &[old, newer]);
    }

    #[test]
    fn test_removed_installed_package_gets_no_keep_rule() {
        let mut pool = Pool::new();
        let installed_repo = InstalledRepository::from_packages([Package::new("vendor/a", "1.0.0")]);
        pool.add_package_full(installed_repo.packages()[0].clone(), Some("installed"), -1, true);

        let mut request = Request::new();
        request.remove("vendor/a");

        let rules = generate(&pool, &request, &installed_repo);
        assert!(!rules
            .iter()
            .any(|r| matches!(r.reason(), RuleReason::InternalAllowUpdate { .. })));
    }

    #[test]
    fn test_missing_installed_package_is_invalid_pool() {
        let pool = Pool::new();
        let installed = InstalledRepository::from_packages([Package::new("vendor/a", "1.0.0")]);

        let result = RuleGenerator::new(&pool, &Policy::new()).generate(&Request::new(), &installed);
        assert!(matches!(result, Err(SolverError::InvalidPool(_))));
    }

    #[test]
    fn test_alias_rules() {
        let mut pool = Pool::with_minimum_stability(mortar_semver::Stability::Dev);
        let base = pool.add_package(Package::new("vendor/a", "dev-feature-x"));
        let alias = pool.add_alias(base, "1.0.x-dev");

        let mut request = Request::new();
        request.install("vendor/a", "^1.0");

        let rules = generate(&pool, &request, &InstalledRepository::new());
        assert!(rules.iter().any(|r| {
            r.literals() == [-alias, base] && matches!(r.reason(), RuleReason::PackageAlias { .. })
        }));
        // Alias and base differ in version, so no inverse rule and no
        // same-name exclusion between them
        assert!(!rules.iter().any(|r| r.literals() == [-base, alias]));
        assert!(!rules.iter().any(|r| r.literals() == [-alias, -base]));
    }
}
