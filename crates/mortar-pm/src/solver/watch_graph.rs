use super::rule::{Literal, Rule, RuleId};
use super::rule_set::RuleSet;

/// Two-watched-literals index.
///
/// Every rule with at least two literals watches two of them, initially the
/// first two. A rule is only inspected when one of its watched literals
/// becomes false; the watch then migrates to another non-false literal if
/// one exists. Unit rules are handled by the assertion phase and are never
/// watched.
#[derive(Debug, Default)]
pub struct WatchGraph {
    /// Indexed by encoded literal; each entry lists the rules watching it
    /// together with the other literal they watch.
    watches: Vec<Vec<Watch>>,
}

#[derive(Debug, Clone, Copy)]
struct Watch {
    rule: RuleId,
    other: Literal,
}

/// Dense index for a signed literal.
fn literal_index(literal: Literal) -> usize {
    let id = literal.unsigned_abs() as usize;
    if literal > 0 {
        id * 2
    } else {
        id * 2 + 1
    }
}

impl WatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut graph = Self::new();
        for rule in rules.iter() {
            if !rule.is_disabled() {
                graph.watch_rule(rule);
            }
        }
        graph
    }

    /// Starts watching the first two literals of a rule. No-op for units
    /// and the empty clause.
    pub fn watch_rule(&mut self, rule: &Rule) {
        let literals = rule.literals();
        if literals.len() < 2 {
            return;
        }

        let (a, b) = (literals[0], literals[1]);
        self.entry(a).push(Watch { rule: rule.id(), other: b });
        self.entry(b).push(Watch { rule: rule.id(), other: a });
    }

    fn entry(&mut self, literal: Literal) -> &mut Vec<Watch> {
        let idx = literal_index(literal);
        if idx >= self.watches.len() {
            self.watches.resize_with(idx + 1, Vec::new);
        }
        &mut self.watches[idx]
    }

    fn watchers(&self, literal: Literal) -> &[Watch] {
        match self.watches.get(literal_index(literal)) {
            Some(list) => list,
            None => &[],
        }
    }

    fn move_watch(&mut self, rule: RuleId, from: Literal, to: Literal, other: Literal) {
        let idx = literal_index(from);
        if let Some(list) = self.watches.get_mut(idx) {
            list.retain(|w| w.rule != rule);
        }
        self.entry(to).push(Watch { rule, other });
    }

    /// Propagates the consequences of `literal` having been decided true.
    ///
    /// `state(l)` reports the current assignment of a literal: `Some(true)`
    /// satisfied, `Some(false)` violated, `None` undecided. Returns the
    /// unit implications discovered, or the first conflicting rule.
    pub fn propagate<F>(
        &mut self,
        literal: Literal,
        rules: &RuleSet,
        mut state: F,
    ) -> Result<Vec<(Literal, RuleId)>, RuleId>
    where
        F: FnMut(Literal) -> Option<bool>,
    {
        // Deciding +L falsifies -L and vice versa
        let falsified = -literal;
        let mut units = Vec::new();

        let watchers: Vec<Watch> = self.watchers(falsified).to_vec();
        for watch in watchers {
            let Some(rule) = rules.get(watch.rule) else {
                continue;
            };
            if rule.is_disabled() {
                continue;
            }

            if state(watch.other) == Some(true) {
                continue;
            }

            // Look for a replacement watch among the unwatched literals
            let mut migrated = false;
            for &candidate in rule.literals() {
                if candidate == falsified || candidate == watch.other {
                    continue;
                }
                if state(candidate) != Some(false) {
                    self.move_watch(watch.rule, falsified, candidate, watch.other);
                    migrated = true;
                    break;
                }
            }
            if migrated {
                continue;
            }

            // No replacement: the rule is unit on the other watch, or a
            // conflict if that is false as well
            match state(watch.other) {
                None => units.push((watch.other, watch.rule)),
                Some(false) => return Err(watch.rule),
                Some(true) => {}
            }
        }

        Ok(units)
    }
}
