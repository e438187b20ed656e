use super::pool::PackageId;
use super::rule::{Literal, RuleId};

/// The current partial assignment.
///
/// The decision map stores, per package id, a signed level: positive means
/// installed, negative means forbidden, zero means undecided. Level 0 is
/// reserved for assertions forced before search begins, so the map stores
/// `level + 1` to keep zero free as the undecided marker.
///
/// The decision queue mirrors the map in assignment order and carries the
/// rule that caused each assignment (`None` for branch decisions).
#[derive(Debug)]
pub struct Decisions {
    map: Vec<i32>,
    causes: Vec<Option<RuleId>>,
    queue: Vec<(Literal, Option<RuleId>)>,
    level: u32,
}

impl Decisions {
    /// Creates a tracker sized for a pool of `package_count` ids.
    pub fn new(package_count: usize) -> Self {
        Self {
            map: vec![0; package_count + 1],
            causes: vec![None; package_count + 1],
            queue: Vec::with_capacity(package_count),
            level: 0,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn increment_level(&mut self) -> u32 {
        self.level += 1;
        self.level
    }

    fn slot(&self, id: PackageId) -> i32 {
        debug_assert!(id > 0, "literal with id 0");
        self.map.get(id as usize).copied().unwrap_or(0)
    }

    /// Records a decision at the current level.
    ///
    /// Returns `false` when the literal contradicts an existing decision;
    /// deciding the same polarity twice is a no-op.
    pub fn decide(&mut self, literal: Literal, cause: Option<RuleId>) -> bool {
        let id = literal.unsigned_abs() as usize;
        debug_assert!(id > 0 && id < self.map.len(), "literal out of pool range");

        let existing = self.map[id];
        if existing != 0 {
            return (existing > 0) == (literal > 0);
        }

        let stored = (self.level + 1) as i32;
        self.map[id] = if literal > 0 { stored } else { -stored };
        self.causes[id] = cause;
        self.queue.push((literal, cause));
        true
    }

    /// True when the literal agrees with the current assignment.
    pub fn satisfied(&self, literal: Literal) -> bool {
        let stored = self.slot(literal.abs());
        stored != 0 && (stored > 0) == (literal > 0)
    }

    /// True when the literal contradicts the current assignment.
    pub fn conflicting(&self, literal: Literal) -> bool {
        let stored = self.slot(literal.abs());
        stored != 0 && (stored > 0) != (literal > 0)
    }

    pub fn decided(&self, id: PackageId) -> bool {
        self.slot(id) != 0
    }

    pub fn undecided(&self, id: PackageId) -> bool {
        !self.decided(id)
    }

    pub fn decided_install(&self, id: PackageId) -> bool {
        self.slot(id) > 0
    }

    /// Decision level of a literal's package, if decided.
    pub fn level_of(&self, literal: Literal) -> Option<u32> {
        let stored = self.slot(literal.abs());
        if stored == 0 {
            None
        } else {
            Some(stored.unsigned_abs() - 1)
        }
    }

    /// The rule that forced a literal's package, if it was propagated.
    pub fn cause_of(&self, literal: Literal) -> Option<RuleId> {
        let id = literal.unsigned_abs() as usize;
        self.causes.get(id).copied().flatten()
    }

    /// Pops every decision above `target_level`.
    pub fn revert_to_level(&mut self, target_level: u32) {
        let cutoff = (target_level + 1) as i32;
        while let Some(&(literal, _)) = self.queue.last() {
            let id = literal.unsigned_abs() as usize;
            if self.map[id].abs() <= cutoff {
                break;
            }
            self.map[id] = 0;
            self.causes[id] = None;
            self.queue.pop();
        }
        self.level = target_level;
    }

    /// Package ids decided true, in id order.
    pub fn installed_packages(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.map
            .iter()
            .enumerate()
            .filter(|(_, &stored)| stored > 0)
            .map(|(id, _)| id as PackageId)
    }

    pub fn queue(&self) -> &[(Literal, Option<RuleId>)] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_and_query() {
        let mut decisions = Decisions::new(4);

        assert!(decisions.decide(1, Some(7)));
        assert!(decisions.satisfied(1));
        assert!(!decisions.satisfied(-1));
        assert!(decisions.conflicting(-1));
        assert!(decisions.decided_install(1));
        assert_eq!(decisions.cause_of(1), Some(7));

        assert!(decisions.decide(-2, None));
        assert!(decisions.satisfied(-2));
        assert!(!decisions.decided_install(2));
        assert_eq!(decisions.cause_of(2), None);

        assert!(decisions.undecided(3));
    }

    #[test]
    fn test_conflicting_decide_rejected() {
        let mut decisions = Decisions::new(2);
        assert!(decisions.decide(1, None));
        assert!(!decisions.decide(-1, None));
        // Re-deciding the same polarity is fine
        assert!(decisions.decide(1, None));
        assert_eq!(decisions.len(), 1);
    }

    #[test]
    fn test_levels() {
        let mut decisions = Decisions::new(4);
        decisions.decide(1, Some(0)); // assertion at level 0
        decisions.increment_level();
        decisions.decide(2, None);
        decisions.increment_level();
        decisions.decide(-3, Some(1));

        assert_eq!(decisions.level_of(1), Some(0));
        assert_eq!(decisions.level_of(2), Some(1));
        assert_eq!(decisions.level_of(3), Some(2));
        assert_eq!(decisions.level_of(4), None);
    }

    #[test]
    fn test_revert_to_level() {
        let mut decisions = Decisions::new(4);
        decisions.decide(1, None); // level 0
        decisions.increment_level();
        decisions.decide(2, None);
        decisions.increment_level();
        decisions.decide(3, None);
        decisions.decide(-4, Some(0));

        decisions.revert_to_level(1);

        assert!(decisions.decided(1));
        assert!(decisions.decided(2));
        assert!(decisions.undecided(3));
        assert!(decisions.undecided(4));
        assert_eq!(decisions.level(), 1);
        assert_eq!(decisions.len(), 2);

        decisions.revert_to_level(0);
        assert!(decisions.decided(1));
        assert!(decisions.undecided(2));
    }

    #[test]
    fn test_installed_packages() {
        let mut decisions = Decisions::new(4);
        decisions.decide(1, None);
        decisions.decide(-2, None);
        decisions.decide(3, None);

        let installed: Vec<_> = decisions.installed_packages().collect();
        assert_eq!(installed, vec![1, 3]);
    }
}
