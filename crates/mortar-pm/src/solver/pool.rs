use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use mortar_semver::{Constraint, Stability};

use crate::package::{AliasPackage, Package};
use crate::repository::{InstalledRepository, Repository};

/// Identifier of a package inside a [`Pool`]. Ids are dense and start at 1;
/// 0 is reserved and never identifies a package.
pub type PackageId = i32;

/// An entry in the pool: a concrete package or an alias of one.
#[derive(Debug, Clone)]
pub enum PoolEntry {
    Package(Arc<Package>),
    Alias(Arc<AliasPackage>),
}

impl PoolEntry {
    pub fn name(&self) -> &str {
        match self {
            PoolEntry::Package(p) => &p.name,
            PoolEntry::Alias(a) => a.name(),
        }
    }

    /// Normalized version
    pub fn version(&self) -> &str {
        match self {
            PoolEntry::Package(p) => &p.version,
            PoolEntry::Alias(a) => a.version(),
        }
    }

    pub fn pretty_version(&self) -> &str {
        match self {
            PoolEntry::Package(p) => p.pretty_version(),
            PoolEntry::Alias(a) => a.pretty_version(),
        }
    }

    pub fn pretty_string(&self) -> String {
        match self {
            PoolEntry::Package(p) => p.pretty_string(),
            PoolEntry::Alias(a) => a.pretty_string(),
        }
    }

    pub fn stability(&self) -> Stability {
        match self {
            PoolEntry::Package(p) => p.stability(),
            PoolEntry::Alias(a) => a.stability(),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, PoolEntry::Alias(_))
    }

    pub fn as_package(&self) -> Option<&Arc<Package>> {
        match self {
            PoolEntry::Package(p) => Some(p),
            PoolEntry::Alias(_) => None,
        }
    }

    pub fn as_alias(&self) -> Option<&Arc<AliasPackage>> {
        match self {
            PoolEntry::Alias(a) => Some(a),
            PoolEntry::Package(_) => None,
        }
    }

    pub fn require(&self) -> &indexmap::IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.require,
            PoolEntry::Alias(a) => a.require(),
        }
    }

    pub fn conflict(&self) -> &indexmap::IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.conflict,
            PoolEntry::Alias(a) => a.conflict(),
        }
    }

    pub fn provide(&self) -> &indexmap::IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.provide,
            PoolEntry::Alias(a) => a.provide(),
        }
    }

    pub fn replace(&self) -> &indexmap::IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.replace,
            PoolEntry::Alias(a) => a.replace(),
        }
    }
}

/// The registry of all candidate packages for one solve.
///
/// Every package of every repository is registered exactly once and keeps
/// its id for the life of the pool. The pool is append-only while it is
/// built and read-only during solving, which is what makes the
/// `what_provides` cache sound.
pub struct Pool {
    entries: Vec<PoolEntry>,
    by_name: HashMap<String, Vec<PackageId>>,
    /// Ids of packages that provide or replace a given name
    providers: HashMap<String, Vec<PackageId>>,
    /// Repository priority per entry (lower wins)
    priorities: Vec<i32>,
    repos: Vec<Option<String>>,
    installed: Vec<bool>,
    alias_base: HashMap<PackageId, PackageId>,
    aliases_of: HashMap<PackageId, Vec<PackageId>>,
    minimum_stability: Stability,
    stability_flags: HashMap<String, Stability>,
    constraint_cache: RefCell<HashMap<String, Option<Constraint>>>,
    provides_cache: RefCell<HashMap<(String, String), Vec<PackageId>>>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("entries", &self.entries.len())
            .field("minimum_stability", &self.minimum_stability)
            .finish()
    }
}

impl Pool {
    pub fn new() -> Self {
        Self::with_minimum_stability(Stability::Stable)
    }

    pub fn with_minimum_stability(minimum_stability: Stability) -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            providers: HashMap::new(),
            priorities: Vec::new(),
            repos: Vec::new(),
            installed: Vec::new(),
            alias_base: HashMap::new(),
            aliases_of: HashMap::new(),
            minimum_stability,
            stability_flags: HashMap::new(),
            constraint_cache: RefCell::new(HashMap::new()),
            provides_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    pub fn minimum_stability(&self) -> Stability {
        self.minimum_stability
    }

    /// Allows a specific package below the global minimum stability.
    pub fn add_stability_flag(&mut self, package_name: &str, stability: Stability) {
        self.stability_flags
            .insert(package_name.to_lowercase(), stability);
    }

    fn effective_minimum_stability(&self, package_name: &str) -> Stability {
        self.stability_flags
            .get(&package_name.to_lowercase())
            .copied()
            .unwrap_or(self.minimum_stability)
    }

    fn meets_stability(&self, name: &str, stability: Stability) -> bool {
        stability.priority() <= self.effective_minimum_stability(name).priority()
    }

    /// Registers a package. Returns 0 when the package is filtered out by
    /// the stability settings; installed packages are never filtered.
    pub fn add_package(&mut self, package: Package) -> PackageId {
        self.add_package_full(Arc::new(package), None, 0, false)
    }

    pub fn add_package_from_repo(&mut self, package: Package, repo: &str) -> PackageId {
        self.add_package_full(Arc::new(package), Some(repo), 0, false)
    }

    pub fn add_package_full(
        &mut self,
        package: Arc<Package>,
        repo: Option<&str>,
        priority: i32,
        installed: bool,
    ) -> PackageId {
        if !installed && !self.meets_stability(&package.name, package.stability()) {
            return 0;
        }

        self.push_entry(PoolEntry::Package(package), repo, priority, installed)
    }

    /// Registers an alias record. The aliased package must already be in
    /// the pool; returns 0 otherwise.
    pub fn add_alias_package(
        &mut self,
        alias: Arc<AliasPackage>,
        repo: Option<&str>,
        priority: i32,
        installed: bool,
    ) -> PackageId {
        let base = alias.alias_of();
        let Some(base_id) = self.find_package_id(&base.name, &base.version) else {
            return 0;
        };

        let id = self.push_entry(PoolEntry::Alias(alias), repo, priority, installed);
        self.alias_base.insert(id, base_id);
        self.aliases_of.entry(base_id).or_default().push(id);
        id
    }

    /// Convenience for tests: alias an existing pool package by id.
    pub fn add_alias(&mut self, base_id: PackageId, alias_version: &str) -> PackageId {
        let Some(base) = self.entry(base_id).and_then(PoolEntry::as_package).cloned() else {
            return 0;
        };
        let repo = self.repos.get((base_id - 1) as usize).cloned().flatten();
        let priority = self.priority_of(base_id);
        let installed = self.is_installed(base_id);
        self.add_alias_package(
            Arc::new(AliasPackage::new(base, alias_version)),
            repo.as_deref(),
            priority,
            installed,
        )
    }

    fn push_entry(
        &mut self,
        entry: PoolEntry,
        repo: Option<&str>,
        priority: i32,
        installed: bool,
    ) -> PackageId {
        let id = (self.entries.len() + 1) as PackageId;
        let name = entry.name().to_lowercase();

        self.by_name.entry(name).or_default().push(id);
        for provided in entry.provide().keys() {
            self.providers
                .entry(provided.to_lowercase())
                .or_default()
                .push(id);
        }
        for replaced in entry.replace().keys() {
            self.providers
                .entry(replaced.to_lowercase())
                .or_default()
                .push(id);
        }

        self.entries.push(entry);
        self.repos.push(repo.map(str::to_string));
        self.priorities.push(priority);
        self.installed.push(installed);
        id
    }

    pub fn entry(&self, id: PackageId) -> Option<&PoolEntry> {
        if id <= 0 {
            return None;
        }
        self.entries.get((id - 1) as usize)
    }

    /// The concrete package behind an id; `None` for aliases.
    pub fn package(&self, id: PackageId) -> Option<&Arc<Package>> {
        self.entry(id).and_then(PoolEntry::as_package)
    }

    pub fn is_alias(&self, id: PackageId) -> bool {
        self.entry(id).map(PoolEntry::is_alias).unwrap_or(false)
    }

    pub fn is_root_alias(&self, id: PackageId) -> bool {
        self.entry(id)
            .and_then(PoolEntry::as_alias)
            .map(|a| a.is_root_alias())
            .unwrap_or(false)
    }

    pub fn alias_base(&self, id: PackageId) -> Option<PackageId> {
        self.alias_base.get(&id).copied()
    }

    pub fn aliases_of(&self, base_id: PackageId) -> Vec<PackageId> {
        self.aliases_of.get(&base_id).cloned().unwrap_or_default()
    }

    pub fn is_installed(&self, id: PackageId) -> bool {
        id > 0 && self.installed.get((id - 1) as usize).copied().unwrap_or(false)
    }

    pub fn priority_of(&self, id: PackageId) -> i32 {
        if id <= 0 {
            return 0;
        }
        self.priorities.get((id - 1) as usize).copied().unwrap_or(0)
    }

    pub fn repository_of(&self, id: PackageId) -> Option<&str> {
        self.repos.get((id - 1) as usize)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        1..=(self.entries.len() as PackageId)
    }

    /// All entries with exactly this package name.
    pub fn ids_by_name(&self, name: &str) -> Vec<PackageId> {
        self.by_name
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Finds a pool id by name and version (normalized or pretty).
    pub fn find_package_id(&self, name: &str, version: &str) -> Option<PackageId> {
        self.ids_by_name(name).into_iter().find(|&id| {
            self.entry(id)
                .map(|e| e.version() == version || e.pretty_version() == version)
                .unwrap_or(false)
        })
    }

    /// Every id whose package either carries this name with a version
    /// matching the constraint, or provides/replaces the name with a
    /// constraint that intersects it.
    ///
    /// Ordered by repository priority, then registration order. Results are
    /// cached; the cache is only sound because the pool is frozen during
    /// solving.
    pub fn what_provides(&self, name: &str, constraint: Option<&str>) -> Vec<PackageId> {
        let name = name.to_lowercase();
        let cache_key = (name.clone(), constraint.unwrap_or("*").to_string());
        if let Some(hit) = self.provides_cache.borrow().get(&cache_key) {
            return hit.clone();
        }

        let required = constraint.and_then(|c| self.parsed_constraint(c));

        let mut result = Vec::new();

        if let Some(ids) = self.by_name.get(&name) {
            for &id in ids {
                if self.version_matches(id, required.as_ref()) {
                    result.push(id);
                }
            }
        }

        if let Some(ids) = self.providers.get(&name) {
            for &id in ids {
                if result.contains(&id) {
                    continue;
                }
                if self.provider_matches(id, &name, required.as_ref()) {
                    result.push(id);
                }
            }
        }

        result.sort_by_key(|&id| (self.priority_of(id), id));

        self.provides_cache.borrow_mut().insert(cache_key, result.clone());
        result
    }

    fn version_matches(&self, id: PackageId, required: Option<&Constraint>) -> bool {
        let Some(required) = required else {
            return true;
        };
        match self.entry(id) {
            Some(entry) => required.matches(entry.version()),
            None => false,
        }
    }

    fn provider_matches(&self, id: PackageId, name: &str, required: Option<&Constraint>) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        let Some(required) = required else {
            return true;
        };

        let provided = entry
            .provide()
            .iter()
            .chain(entry.replace().iter())
            .find(|(target, _)| target.to_lowercase() == name)
            .map(|(_, constraint)| constraint.clone());

        match provided.and_then(|c| self.parsed_constraint(&c)) {
            Some(provided) => required.intersects(&provided),
            // An unparseable provided constraint is accepted rather than
            // silently hiding the provider
            None => true,
        }
    }

    fn parsed_constraint(&self, text: &str) -> Option<Constraint> {
        if let Some(cached) = self.constraint_cache.borrow().get(text) {
            return cached.clone();
        }
        let parsed = Constraint::parse(text).ok();
        self.constraint_cache
            .borrow_mut()
            .insert(text.to_string(), parsed.clone());
        parsed
    }

    /// The pool entry a literal talks about, ignoring its sign.
    pub fn literal_to_entry(&self, literal: i32) -> Option<&PoolEntry> {
        self.entry(literal.abs())
    }

    /// Renders a literal for diagnostics.
    pub fn pretty_literal(&self, literal: i32) -> String {
        let pretty = self
            .literal_to_entry(literal)
            .map(|e| e.pretty_string())
            .unwrap_or_else(|| format!("package #{}", literal.abs()));
        if literal < 0 {
            format!("don't install {pretty}")
        } else {
            format!("install {pretty}")
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent construction of a pool from repositories.
pub struct PoolBuilder {
    pool: Pool,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self { pool: Pool::new() }
    }

    pub fn minimum_stability(mut self, stability: Stability) -> Self {
        self.pool.minimum_stability = stability;
        self
    }

    pub fn stability_flag(mut self, package_name: &str, stability: Stability) -> Self {
        self.pool.add_stability_flag(package_name, stability);
        self
    }

    /// Registers every package and alias of a repository under the given
    /// priority (lower wins).
    pub fn add_repository(mut self, repo: &dyn Repository, priority: i32) -> Self {
        for package in repo.packages() {
            self.pool
                .add_package_full(Arc::clone(package), Some(repo.name()), priority, false);
        }
        for alias in repo.aliases() {
            self.pool
                .add_alias_package(Arc::clone(alias), Some(repo.name()), priority, false);
        }
        self
    }

    /// Registers the installed baseline. Installed packages bypass the
    /// stability filter; preferring them over newer candidates is the
    /// policy's call, not a priority edge, so updates stay possible.
    pub fn add_installed(mut self, repo: &InstalledRepository) -> Self {
        for package in repo.packages() {
            self.pool
                .add_package_full(Arc::clone(package), Some(repo.name()), 0, true);
        }
        for alias in repo.aliases() {
            self.pool
                .add_alias_package(Arc::clone(alias), Some(repo.name()), 0, true);
        }
        self
    }

    pub fn add_package(mut self, package: Package) -> Self {
        self.pool.add_package(package);
        self
    }

    pub fn build(self) -> Pool {
        self.pool
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assigns_dense_ids() {
        let mut pool = Pool::new();
        assert_eq!(pool.add_package(Package::new("vendor/a", "1.0.0")), 1);
        assert_eq!(pool.add_package(Package::new("vendor/b", "1.0.0")), 2);
        assert_eq!(pool.len(), 2);
        assert!(pool.entry(0).is_none());
        assert!(pool.entry(3).is_none());
    }

    #[test]
    fn test_what_provides_by_name_and_constraint() {
        let mut pool = Pool::new();
        let a1 = pool.add_package(Package::new("vendor/a", "1.0.0"));
        let a2 = pool.add_package(Package::new("vendor/a", "2.0.0"));
        pool.add_package(Package::new("vendor/b", "1.0.0"));

        assert_eq!(pool.what_provides("vendor/a", None), vec![a1, a2]);
        assert_eq!(pool.what_provides("vendor/a", Some("^2.0")), vec![a2]);
        assert_eq!(pool.what_provides("vendor/a", Some("^3.0")), Vec::<PackageId>::new());
        assert!(pool.what_provides("vendor/unknown", None).is_empty());
    }

    #[test]
    fn test_what_provides_includes_providers_and_replacers() {
        let mut pool = Pool::new();
        let provider =
            pool.add_package(Package::new("vendor/impl", "1.0.0").with_provide("vendor/api", "1.0.0"));
        let replacer = pool
            .add_package(Package::new("vendor/fork", "1.0.0").with_replace("vendor/orig", ">=1.0"));

        assert_eq!(pool.what_provides("vendor/api", Some("^1.0")), vec![provider]);
        assert!(pool.what_provides("vendor/api", Some("^2.0")).is_empty());
        assert_eq!(pool.what_provides("vendor/orig", Some("^1.5")), vec![replacer]);
        assert!(pool.what_provides("vendor/orig", Some("0.9.0")).is_empty());
    }

    #[test]
    fn test_what_provides_cached_results_stay_deterministic() {
        let mut pool = Pool::new();
        pool.add_package(Package::new("vendor/a", "1.0.0"));

        let first = pool.what_provides("vendor/a", Some("^1.0"));
        let second = pool.what_provides("vendor/a", Some("^1.0"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_priority_orders_results() {
        let mut pool = Pool::new();
        let low = pool.add_package_full(
            Arc::new(Package::new("vendor/a", "1.0.0")),
            Some("packagist"),
            1,
            false,
        );
        let high = pool.add_package_full(
            Arc::new(Package::new("vendor/a", "1.1.0")),
            Some("private"),
            0,
            false,
        );

        assert_eq!(pool.what_provides("vendor/a", None), vec![high, low]);
    }

    #[test]
    fn test_stability_filtering() {
        let mut pool = Pool::new();
        assert_ne!(pool.add_package(Package::new("vendor/a", "1.0.0")), 0);
        assert_eq!(pool.add_package(Package::new("vendor/a", "2.0.0-beta1")), 0);
        assert_eq!(pool.add_package(Package::new("vendor/a", "dev-main")), 0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_stability_flag_overrides_minimum() {
        let mut pool = Pool::new();
        pool.add_stability_flag("vendor/edge", Stability::Dev);

        assert_ne!(pool.add_package(Package::new("vendor/edge", "dev-main")), 0);
        assert_eq!(pool.add_package(Package::new("vendor/other", "dev-main")), 0);
    }

    #[test]
    fn test_installed_bypasses_stability() {
        let mut pool = Pool::new();
        let id = pool.add_package_full(
            Arc::new(Package::new("vendor/a", "dev-main")),
            Some("installed"),
            -1,
            true,
        );
        assert_ne!(id, 0);
        assert!(pool.is_installed(id));
    }

    #[test]
    fn test_alias_registration() {
        let mut pool = Pool::with_minimum_stability(Stability::Dev);
        let base = pool.add_package(Package::new("vendor/a", "dev-feature-x"));
        let alias = pool.add_alias(base, "1.0.x-dev");

        assert_ne!(alias, 0);
        assert!(pool.is_alias(alias));
        assert_eq!(pool.alias_base(alias), Some(base));
        assert_eq!(pool.aliases_of(base), vec![alias]);

        // The alias answers for constraints its base cannot satisfy
        assert_eq!(pool.what_provides("vendor/a", Some("^1.0")), vec![alias]);
    }

    #[test]
    fn test_builder_from_repositories() {
        use crate::repository::ArrayRepository;

        let mut repo = ArrayRepository::new("packagist");
        repo.add_package(Package::new("vendor/a", "1.0.0"));

        let installed = InstalledRepository::from_packages([Package::new("vendor/b", "1.0.0")]);

        let pool = Pool::builder()
            .add_installed(&installed)
            .add_repository(&repo, 1)
            .build();

        assert_eq!(pool.len(), 2);
        let b = pool.find_package_id("vendor/b", "1.0.0").unwrap();
        assert!(pool.is_installed(b));
        assert_eq!(pool.repository_of(b), Some("installed"));
    }

    #[test]
    fn test_pretty_literal() {
        let mut pool = Pool::new();
        let id = pool.add_package(Package::new("vendor/a", "1.0.0"));
        assert_eq!(pool.pretty_literal(id), "install vendor/a 1.0.0");
        assert_eq!(pool.pretty_literal(-id), "don't install vendor/a 1.0.0");
    }
}
