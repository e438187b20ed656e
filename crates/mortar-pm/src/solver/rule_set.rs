use std::collections::HashMap;

use super::rule::{Rule, RuleId, RuleType};

/// Indexed container of rules.
///
/// Rules are stored in insertion order, bucketed by type, and interned by
/// literal-sequence identity: adding a duplicate returns the existing id.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    by_type: HashMap<RuleType, Vec<RuleId>>,
    /// literal fingerprint -> rule ids with that fingerprint
    by_hash: HashMap<u64, Vec<RuleId>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule under the given type bucket, interning duplicates.
    pub fn add(&mut self, mut rule: Rule, rule_type: RuleType) -> RuleId {
        let hash = rule.literal_hash();
        if let Some(candidates) = self.by_hash.get(&hash) {
            for &existing_id in candidates {
                if let Some(existing) = self.get(existing_id) {
                    if existing.equals_literals(&rule) {
                        return existing_id;
                    }
                }
            }
        }

        let id = self.rules.len() as RuleId;
        rule.set_id(id);
        rule.set_rule_type(rule_type);

        self.by_type.entry(rule_type).or_default().push(id);
        self.by_hash.entry(hash).or_default().push(id);
        self.rules.push(rule);
        id
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    pub fn get_mut(&mut self, id: RuleId) -> Option<&mut Rule> {
        self.rules.get_mut(id as usize)
    }

    pub fn disable(&mut self, id: RuleId) {
        if let Some(rule) = self.get_mut(id) {
            rule.disable();
        }
    }

    /// All rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn as_slice(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rules_of_type(&self, rule_type: RuleType) -> impl Iterator<Item = &Rule> {
        self.by_type
            .get(&rule_type)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.get(id))
    }

    /// Unit rules, in insertion order.
    pub fn assertions(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.is_assertion())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn count_of_type(&self, rule_type: RuleType) -> usize {
        self.by_type.get(&rule_type).map_or(0, Vec::len)
    }
}
