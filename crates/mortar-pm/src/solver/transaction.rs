use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::package::{AliasPackage, Package};

/// A single step of the install plan.
#[derive(Debug, Clone)]
pub enum Operation {
    Install(Arc<Package>),
    Update {
        from: Arc<Package>,
        to: Arc<Package>,
    },
    Remove(Arc<Package>),
    /// The alias itself has no files; this records that requirements
    /// against the alias version are satisfied
    MarkAliasInstalled(Arc<AliasPackage>),
}

/// The ordered diff between the installed baseline and a solved set.
///
/// Removals come first, ordered so dependents leave before their
/// dependencies; installs and updates follow dependencies-first; alias
/// marks trail the installs they belong to. Name matches between the two
/// sides coalesce into updates.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn from_packages(
        present: &[Arc<Package>],
        present_aliases: &[Arc<AliasPackage>],
        result_packages: Vec<Arc<Package>>,
        result_aliases: Vec<Arc<AliasPackage>>,
    ) -> Self {
        let present_by_name: HashMap<String, Arc<Package>> = present
            .iter()
            .map(|p| (p.name.clone(), Arc::clone(p)))
            .collect();

        let mut kept: HashSet<String> = HashSet::new();
        let mut incoming: Vec<Operation> = Vec::new();

        for package in &result_packages {
            match present_by_name.get(&package.name) {
                Some(old) => {
                    kept.insert(package.name.clone());
                    if needs_update(old, package) {
                        incoming.push(Operation::Update {
                            from: Arc::clone(old),
                            to: Arc::clone(package),
                        });
                    }
                }
                None => incoming.push(Operation::Install(Arc::clone(package))),
            }
        }

        let removed: Vec<Arc<Package>> = present
            .iter()
            .filter(|p| !kept.contains(&p.name))
            .cloned()
            .collect();

        let present_alias_keys: HashSet<(String, String)> = present_aliases
            .iter()
            .map(|a| (a.name().to_string(), a.version().to_string()))
            .collect();

        let mut operations = Vec::new();

        // Dependents go away before the packages they depend on
        let removed_refs: Vec<&Arc<Package>> = removed.iter().collect();
        let mut remove_order = dependency_order(&removed_refs);
        remove_order.reverse();
        for index in remove_order {
            operations.push(Operation::Remove(Arc::clone(removed_refs[index])));
        }

        // Installs and updates land dependencies-first
        let incoming_targets: Vec<&Arc<Package>> = incoming
            .iter()
            .map(|op| match op {
                Operation::Install(p) => p,
                Operation::Update { to, .. } => to,
                _ => unreachable!("incoming holds installs and updates only"),
            })
            .collect();
        for index in dependency_order(&incoming_targets) {
            operations.push(incoming[index].clone());
        }

        for alias in result_aliases {
            let key = (alias.name().to_string(), alias.version().to_string());
            if !present_alias_keys.contains(&key) {
                operations.push(Operation::MarkAliasInstalled(alias));
            }
        }

        Self { operations }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Packages entering the installed set, updates included.
    pub fn installs(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Install(p) => Some(p),
            Operation::Update { to, .. } => Some(to),
            _ => None,
        })
    }

    /// Pure installs only.
    pub fn new_installs(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Install(p) => Some(p),
            _ => None,
        })
    }

    pub fn updates(&self) -> impl Iterator<Item = (&Arc<Package>, &Arc<Package>)> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Update { from, to } => Some((from, to)),
            _ => None,
        })
    }

    pub fn removals(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Remove(p) => Some(p),
            _ => None,
        })
    }

    pub fn alias_installs(&self) -> impl Iterator<Item = &Arc<AliasPackage>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::MarkAliasInstalled(a) => Some(a),
            _ => None,
        })
    }

    pub fn summary(&self) -> TransactionSummary {
        let mut summary = TransactionSummary::default();
        for op in &self.operations {
            match op {
                Operation::Install(_) => summary.installs += 1,
                Operation::Update { .. } => summary.updates += 1,
                Operation::Remove(_) => summary.removals += 1,
                Operation::MarkAliasInstalled(_) => summary.alias_installs += 1,
            }
        }
        summary
    }
}

fn needs_update(present: &Package, target: &Package) -> bool {
    if present.version != target.version {
        return true;
    }
    match (&present.source_reference, &target.source_reference) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

/// Indices of `packages` ordered dependencies-first (Kahn). Platform
/// requirements are ignored; cycles fall back to input order.
fn dependency_order(packages: &[&Arc<Package>]) -> Vec<usize> {
    if packages.len() <= 1 {
        return (0..packages.len()).collect();
    }

    // Requirements may point at provided or replaced names, so index every
    // name a package answers for; the first carrier wins
    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    for (i, package) in packages.iter().enumerate() {
        for name in package.names() {
            index_by_name.entry(name).or_insert(i);
        }
    }

    let mut in_degree = vec![0usize; packages.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); packages.len()];

    for (index, package) in packages.iter().enumerate() {
        for dep_name in package.require.keys() {
            if Package::is_platform(dep_name) {
                continue;
            }
            if let Some(&dep_index) = index_by_name.get(&dep_name.to_lowercase()) {
                if dep_index != index {
                    dependents[dep_index].push(index);
                    in_degree[index] += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..packages.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(packages.len());

    while let Some(index) = queue.pop_front() {
        order.push(index);
        for &dependent in &dependents[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() != packages.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        order.extend((0..packages.len()).filter(|i| !placed.contains(i)));
    }

    order
}

/// Counts per operation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub installs: usize,
    pub updates: usize,
    pub removals: usize,
    pub alias_installs: usize,
}

impl fmt::Display for TransactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.installs > 0 {
            parts.push(format!("{} install(s)", self.installs));
        }
        if self.updates > 0 {
            parts.push(format!("{} update(s)", self.updates));
        }
        if self.removals > 0 {
            parts.push(format!("{} removal(s)", self.removals));
        }
        if parts.is_empty() {
            write!(f, "nothing to do")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(package: Package) -> Arc<Package> {
        Arc::new(package)
    }

    #[test]
    fn test_fresh_install() {
        let tx = Transaction::from_packages(
            &[],
            &[],
            vec![arc(Package::new("vendor/a", "1.0.0"))],
            vec![],
        );
        assert_eq!(tx.new_installs().count(), 1);
        assert_eq!(tx.removals().count(), 0);
    }

    #[test]
    fn test_same_version_is_noop() {
        let present = vec![arc(Package::new("vendor/a", "1.0.0"))];
        let tx = Transaction::from_packages(
            &present,
            &[],
            vec![arc(Package::new("vendor/a", "1.0.0"))],
            vec![],
        );
        assert!(tx.is_empty());
    }

    #[test]
    fn test_version_change_coalesces_into_update() {
        let present = vec![arc(Package::new("vendor/a", "1.0.0"))];
        let tx = Transaction::from_packages(
            &present,
            &[],
            vec![arc(Package::new("vendor/a", "2.0.0"))],
            vec![],
        );

        let updates: Vec<_> = tx.updates().collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0.version, "1.0.0.0");
        assert_eq!(updates[0].1.version, "2.0.0.0");
        assert_eq!(tx.new_installs().count(), 0);
        assert_eq!(tx.removals().count(), 0);
    }

    #[test]
    fn test_source_reference_change_is_update() {
        let present = vec![arc(
            Package::new("vendor/a", "dev-feature-x").with_source_reference("aaa"),
        )];
        let tx = Transaction::from_packages(
            &present,
            &[],
            vec![arc(
                Package::new("vendor/a", "dev-feature-x").with_source_reference("bbb"),
            )],
            vec![],
        );
        assert_eq!(tx.updates().count(), 1);
    }

    #[test]
    fn test_missing_package_removed() {
        let present = vec![arc(Package::new("vendor/a", "1.0.0"))];
        let tx = Transaction::from_packages(&present, &[], vec![], vec![]);
        assert_eq!(tx.removals().count(), 1);
    }

    #[test]
    fn test_installs_ordered_dependencies_first() {
        // c -> b -> a, handed over in reverse
        let c = Package::new("vendor/c", "1.0.0").with_require("vendor/b", "^1.0");
        let b = Package::new("vendor/b", "1.0.0").with_require("vendor/a", "^1.0");
        let a = Package::new("vendor/a", "1.0.0");

        let tx = Transaction::from_packages(&[], &[], vec![arc(c), arc(b), arc(a)], vec![]);

        let names: Vec<&str> = tx.new_installs().map(|p| p.name.as_str()).collect();
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("vendor/a") < pos("vendor/b"));
        assert!(pos("vendor/b") < pos("vendor/c"));
    }

    #[test]
    fn test_removals_ordered_dependents_first() {
        let a = arc(Package::new("vendor/a", "1.0.0").with_require("vendor/b", "^1.0"));
        let b = arc(Package::new("vendor/b", "1.0.0"));

        let tx = Transaction::from_packages(&[Arc::clone(&b), Arc::clone(&a)], &[], vec![], vec![]);

        let names: Vec<&str> = tx.removals().map(|p| p.name.as_str()).collect();
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("vendor/a") < pos("vendor/b"));
    }

    #[test]
    fn test_removals_precede_installs() {
        let present = vec![arc(Package::new("vendor/old", "1.0.0"))];
        let tx = Transaction::from_packages(
            &present,
            &[],
            vec![arc(Package::new("vendor/new", "1.0.0"))],
            vec![],
        );

        assert!(matches!(tx.operations[0], Operation::Remove(_)));
        assert!(matches!(tx.operations[1], Operation::Install(_)));
    }

    #[test]
    fn test_alias_marks_trail_installs() {
        let base = arc(Package::new("vendor/a", "dev-main"));
        let alias = Arc::new(AliasPackage::new(Arc::clone(&base), "1.0.x-dev"));

        let tx = Transaction::from_packages(&[], &[], vec![base], vec![alias]);

        assert_eq!(tx.len(), 2);
        assert!(matches!(tx.operations[0], Operation::Install(_)));
        assert!(matches!(tx.operations[1], Operation::MarkAliasInstalled(_)));
    }

    #[test]
    fn test_existing_alias_not_remarked() {
        let base = arc(Package::new("vendor/a", "dev-main"));
        let alias = Arc::new(AliasPackage::new(Arc::clone(&base), "1.0.x-dev"));

        let tx = Transaction::from_packages(
            &[Arc::clone(&base)],
            &[Arc::clone(&alias)],
            vec![base],
            vec![alias],
        );
        assert!(tx.is_empty());
    }

    #[test]
    fn test_dependency_cycle_falls_back_to_input_order() {
        let a = arc(Package::new("vendor/a", "1.0.0").with_require("vendor/b", "*"));
        let b = arc(Package::new("vendor/b", "1.0.0").with_require("vendor/a", "*"));

        let tx = Transaction::from_packages(&[], &[], vec![Arc::clone(&a), b], vec![]);
        assert_eq!(tx.new_installs().count(), 2);
        assert_eq!(tx.new_installs().next().unwrap().name, "vendor/a");
    }

    #[test]
    fn test_summary() {
        let present = vec![arc(Package::new("vendor/old", "1.0.0"))];
        let tx = Transaction::from_packages(
            &present,
            &[],
            vec![arc(Package::new("vendor/new", "1.0.0"))],
            vec![],
        );

        let summary = tx.summary();
        assert_eq!(summary.installs, 1);
        assert_eq!(summary.removals, 1);
        assert_eq!(summary.to_string(), "1 install(s), 1 removal(s)");
    }
}
