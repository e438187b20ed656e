use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::package::{AliasPackage, Package};
use crate::repository::{InstalledRepository, Repository};

use super::decisions::Decisions;
use super::policy::Policy;
use super::pool::{PackageId, Pool, PoolEntry};
use super::problem::{Problem, Problems};
use super::request::Request;
use super::rule::{Literal, Rule, RuleId, RuleReason, RuleType};
use super::rule_generator::RuleGenerator;
use super::rule_set::RuleSet;
use super::transaction::Transaction;
use super::watch_graph::WatchGraph;

/// Iteration backstop; a correct rule set converges long before this.
const MAX_ITERATIONS: u64 = 1_000_000;

#[derive(Error, Debug)]
pub enum SolverError {
    /// The request cannot be satisfied; the payload explains why.
    /// Render it with [`Problems::describe`] against the pool.
    #[error("unsatisfiable request: {0}")]
    Unsolvable(Problems),

    /// The caller-imposed deadline passed mid-solve. No partial result is
    /// produced.
    #[error("dependency resolution was cancelled")]
    Cancelled,

    /// The pool violates a structural invariant; indicates a broken
    /// builder, not bad user input
    #[error("invalid pool: {0}")]
    InvalidPool(String),
}

/// The dependency solver.
///
/// Translates the request into rules (see [`RuleGenerator`]), applies the
/// forced assertions, then runs conflict-driven clause learning until every
/// open disjunction is satisfied or an unsatisfiable core is found. On
/// success the decided set is diffed against the installed baseline into a
/// [`Transaction`].
///
/// The solve is single-threaded and synchronous; two runs over identical
/// inputs produce identical operation lists.
pub struct Solver<'a> {
    pool: &'a Pool,
    policy: &'a Policy,
    deadline: Option<Instant>,
}

impl<'a> Solver<'a> {
    pub fn new(pool: &'a Pool, policy: &'a Policy) -> Self {
        Self {
            pool,
            policy,
            deadline: None,
        }
    }

    /// Aborts the solve with [`SolverError::Cancelled`] once `deadline`
    /// passes. Checked at the top of every search iteration.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn solve(
        &self,
        request: &Request,
        installed: &InstalledRepository,
    ) -> Result<Transaction, SolverError> {
        let generation_start = Instant::now();
        let rules = RuleGenerator::new(self.pool, self.policy).generate(request, installed)?;
        log::info!(
            "generated {} rules for {} jobs in {:?}",
            rules.len(),
            request.jobs().len(),
            generation_start.elapsed()
        );

        let mut state = SolverState::new(rules, self.pool.len());

        self.check_empty_rules(&state)?;
        self.apply_assertions(&mut state)?;

        let search_start = Instant::now();
        self.search(&mut state, request)?;
        log::info!(
            "resolved dependencies in {:?} ({} decisions, {} learned rules)",
            search_start.elapsed(),
            state.decisions.len(),
            state.rules.count_of_type(RuleType::Learned)
        );

        Ok(self.build_transaction(&state, installed))
    }

    /// Phase one: any empty clause makes the request unsatisfiable before
    /// search even starts.
    fn check_empty_rules(&self, state: &SolverState) -> Result<(), SolverError> {
        let mut problems = Problems::new();
        for rule in state.rules.iter() {
            if rule.is_empty() && !rule.is_disabled() {
                let mut problem = Problem::new();
                problem.add_rule(rule);
                problems.add(problem);
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SolverError::Unsolvable(problems))
        }
    }

    /// Phase two: unit rules are forced at level 0. A contradiction between
    /// two unit rules is already a complete explanation.
    fn apply_assertions(&self, state: &mut SolverState) -> Result<(), SolverError> {
        let assertions: Vec<RuleId> = state
            .rules
            .assertions()
            .filter(|r| !r.is_disabled())
            .map(Rule::id)
            .collect();

        for id in assertions {
            let Some(rule) = state.rules.get(id) else {
                continue;
            };
            let literal = rule.literals()[0];

            if state.decisions.conflicting(literal) {
                let mut problem = Problem::new();
                problem.add_rule(rule);
                if let Some(cause) = state.decisions.cause_of(literal) {
                    if let Some(cause_rule) = state.rules.get(cause) {
                        problem.add_rule(cause_rule);
                    }
                }
                let mut problems = Problems::new();
                problems.add(problem);
                return Err(SolverError::Unsolvable(problems));
            }

            state.decisions.decide(literal, Some(id));
        }
        Ok(())
    }

    /// Phase three: unit propagation, policy-guided branching, and 1-UIP
    /// clause learning on conflicts.
    fn search(&self, state: &mut SolverState, request: &Request) -> Result<(), SolverError> {
        let mut iterations: u64 = 0;
        loop {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                log::warn!("solver exceeded {MAX_ITERATIONS} iterations, aborting");
                return Err(SolverError::Cancelled);
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    log::debug!("deadline exceeded after {iterations} iterations");
                    return Err(SolverError::Cancelled);
                }
            }

            if let Err(conflict) = state.propagate() {
                if state.decisions.level() == 0 {
                    // Conflicts among globally forced literals cannot be
                    // backtracked away
                    return Err(SolverError::Unsolvable(
                        self.analyze_unsolvable(state, conflict),
                    ));
                }
                self.learn_from_conflict(state, conflict);
                continue;
            }

            let Some((candidates, installed_first)) = self.select_next(state, request) else {
                return Ok(());
            };

            let ranked = self
                .policy
                .select_preferred(self.pool, &candidates, installed_first);
            let choice = ranked[0];
            state.decisions.increment_level();
            state.decisions.decide(choice, None);
        }
    }

    /// Finds the first still-open disjunction worth branching on: job
    /// rules, keep-or-update rules, then requirement rules whose source is
    /// part of the install set.
    fn select_next(
        &self,
        state: &SolverState,
        request: &Request,
    ) -> Option<(Vec<PackageId>, bool)> {
        let decisions = &state.decisions;

        for rule in state.rules.as_slice() {
            if rule.is_disabled() {
                continue;
            }

            match rule.reason() {
                RuleReason::JobInstall { job } => {
                    if let Some(candidates) = open_candidates(decisions, rule) {
                        let installed_first = request
                            .jobs()
                            .get(*job)
                            .and_then(|j| j.name.as_deref())
                            .map(|name| !request.is_update_allowed(name))
                            .unwrap_or(true);
                        return Some((candidates, installed_first));
                    }
                }
                RuleReason::InternalAllowUpdate { source } => {
                    if let Some(candidates) = open_candidates(decisions, rule) {
                        let installed_first = self
                            .pool
                            .entry(*source)
                            .map(|e| !request.is_update_allowed(e.name()))
                            .unwrap_or(true);
                        return Some((candidates, installed_first));
                    }
                }
                RuleReason::PackageRequires { source, link } => {
                    if !decisions.decided_install(*source) {
                        continue;
                    }
                    if let Some(candidates) = open_candidates(decisions, rule) {
                        let installed_first = !request.is_update_allowed(&link.target);
                        return Some((candidates, installed_first));
                    }
                }
                _ => {}
            }
        }

        None
    }

    /// 1-UIP conflict analysis.
    ///
    /// Starting from the conflicting clause, resolves against the cause of
    /// the most recent implication at the current level until exactly one
    /// literal of that level remains (the unique implication point). The
    /// learned clause is the negated UIP plus the contributing literals
    /// from earlier levels; the backtrack level is the deepest of those.
    fn analyze(&self, state: &SolverState, conflict: RuleId) -> (Literal, u32, Vec<Literal>) {
        let decisions = &state.decisions;
        let queue = decisions.queue();
        let current_level = decisions.level();

        let mut seen: HashSet<PackageId> = HashSet::new();
        let mut others: Vec<Literal> = Vec::new();
        let mut backtrack_level = 0u32;
        let mut at_current = 0usize;
        let mut uip: Option<Literal> = None;
        let mut idx = queue.len();
        let mut rule = state.rules.get(conflict);

        'resolving: loop {
            if let Some(r) = rule {
                for &lit in r.literals() {
                    // The implied literal of a reason rule is the one being
                    // resolved on; skip anything currently satisfied
                    if decisions.satisfied(lit) {
                        continue;
                    }
                    let Some(level) = decisions.level_of(lit) else {
                        continue;
                    };
                    if level == 0 {
                        continue;
                    }
                    if !seen.insert(lit.abs()) {
                        continue;
                    }
                    if level == current_level {
                        at_current += 1;
                    } else {
                        others.push(lit);
                        backtrack_level = backtrack_level.max(level);
                    }
                }
            }

            // Walk the trail backwards to the latest assignment that
            // appears in the resolvent; queue order guarantees it belongs
            // to the current level while any remain
            loop {
                if idx == 0 {
                    break 'resolving;
                }
                idx -= 1;
                let (lit, _) = queue[idx];
                if !seen.remove(&lit.abs()) {
                    continue;
                }

                at_current = at_current.saturating_sub(1);
                if at_current == 0 {
                    uip = Some(-lit);
                    break 'resolving;
                }

                rule = decisions
                    .cause_of(lit)
                    .and_then(|cause| state.rules.get(cause));
                continue 'resolving;
            }
        }

        let uip = uip.unwrap_or_else(|| {
            // Degenerate resolvent; negate the branch decision instead
            backtrack_level = current_level.saturating_sub(1);
            queue
                .iter()
                .rev()
                .find(|(lit, cause)| {
                    cause.is_none() && decisions.level_of(*lit) == Some(current_level)
                })
                .map(|(lit, _)| -lit)
                .unwrap_or(0)
        });
        debug_assert!(uip != 0, "conflict analysis found no UIP");

        let mut literals = Vec::with_capacity(others.len() + 1);
        literals.push(uip);
        literals.extend(others);

        (uip, backtrack_level, literals)
    }

    fn learn_from_conflict(&self, state: &mut SolverState, conflict: RuleId) {
        let (uip, backtrack_level, literals) = self.analyze(state, conflict);
        log::debug!(
            "conflict on rule {}: learned {} literal(s), backtracking {} -> {}",
            conflict,
            literals.len(),
            state.decisions.level(),
            backtrack_level
        );

        state.decisions.revert_to_level(backtrack_level);
        state.reset_propagate_index();

        let before = state.rules.len();
        let learned_id = state.rules.add(Rule::learned(literals), RuleType::Learned);
        if state.rules.len() > before {
            if let Some(learned) = state.rules.get(learned_id) {
                state.watch_graph.watch_rule(learned);
            }
        }
        state.decisions.decide(uip, Some(learned_id));
    }

    /// Collects the rules implicated in a level-0 conflict by chasing
    /// decision causes from the conflicting clause.
    fn analyze_unsolvable(&self, state: &SolverState, conflict: RuleId) -> Problems {
        let mut problem = Problem::new();
        let mut seen_rules: HashSet<RuleId> = HashSet::new();
        let mut seen_packages: HashSet<PackageId> = HashSet::new();
        let mut pending = vec![conflict];

        while let Some(rule_id) = pending.pop() {
            if !seen_rules.insert(rule_id) {
                continue;
            }
            let Some(rule) = state.rules.get(rule_id) else {
                continue;
            };
            problem.add_rule(rule);

            for &lit in rule.literals() {
                if !seen_packages.insert(lit.abs()) {
                    continue;
                }
                if let Some(cause) = state.decisions.cause_of(lit) {
                    pending.push(cause);
                }
            }
        }

        let mut problems = Problems::new();
        problems.add(problem);
        problems
    }

    /// Turns the final assignment into operations against the baseline.
    fn build_transaction(&self, state: &SolverState, installed: &InstalledRepository) -> Transaction {
        let mut packages: Vec<Arc<Package>> = Vec::new();
        let mut aliases: Vec<Arc<AliasPackage>> = Vec::new();
        let mut seen_packages: HashSet<(String, String)> = HashSet::new();
        let mut seen_aliases: HashSet<PackageId> = HashSet::new();

        for id in state.decisions.installed_packages() {
            match self.pool.entry(id) {
                Some(PoolEntry::Package(package)) => {
                    let key = (package.name.clone(), package.version.clone());
                    if seen_packages.insert(key) {
                        packages.push(Arc::clone(package));
                    }
                    // Branch aliases ride along with their base unless the
                    // solve explicitly forbade them
                    for alias_id in self.pool.aliases_of(id) {
                        if state.decisions.conflicting(alias_id) {
                            continue;
                        }
                        if let Some(PoolEntry::Alias(alias)) = self.pool.entry(alias_id) {
                            if seen_aliases.insert(alias_id) {
                                aliases.push(Arc::clone(alias));
                            }
                        }
                    }
                }
                Some(PoolEntry::Alias(alias)) => {
                    if seen_aliases.insert(id) {
                        aliases.push(Arc::clone(alias));
                    }
                }
                None => {}
            }
        }

        Transaction::from_packages(installed.packages(), installed.aliases(), packages, aliases)
    }
}

/// Candidates of a not-yet-satisfied disjunction: its undecided positive
/// literals. `None` when the rule is already satisfied or has nothing left
/// to decide.
fn open_candidates(decisions: &Decisions, rule: &Rule) -> Option<Vec<PackageId>> {
    let mut candidates = Vec::new();
    for &lit in rule.literals() {
        if decisions.satisfied(lit) {
            return None;
        }
        if lit > 0 && decisions.undecided(lit) {
            candidates.push(lit);
        }
    }
    if candidates.is_empty() {
        None
    } else {
        Some(candidates)
    }
}

/// Mutable search state: the rule set (learned rules append to it), the
/// assignment, the watch index, and the propagation cursor into the
/// decision queue.
struct SolverState {
    rules: RuleSet,
    decisions: Decisions,
    watch_graph: WatchGraph,
    propagate_index: usize,
}

impl SolverState {
    fn new(rules: RuleSet, pool_size: usize) -> Self {
        let watch_graph = WatchGraph::from_rules(&rules);
        Self {
            rules,
            decisions: Decisions::new(pool_size),
            watch_graph,
            propagate_index: 0,
        }
    }

    fn reset_propagate_index(&mut self) {
        self.propagate_index = self.decisions.len();
    }

    /// Unit propagation to fixed point; `Err` carries the conflicting rule.
    fn propagate(&mut self) -> Result<(), RuleId> {
        let Self {
            rules,
            decisions,
            watch_graph,
            propagate_index,
        } = self;

        while *propagate_index < decisions.len() {
            let (literal, _) = decisions.queue()[*propagate_index];
            *propagate_index += 1;

            let units = {
                let assignment = &*decisions;
                watch_graph.propagate(literal, rules, |lit| {
                    if assignment.satisfied(lit) {
                        Some(true)
                    } else if assignment.conflicting(lit) {
                        Some(false)
                    } else {
                        None
                    }
                })?
            };

            for (unit, rule_id) in units {
                if decisions.conflicting(unit) {
                    return Err(rule_id);
                }
                if !decisions.satisfied(unit) {
                    decisions.decide(unit, Some(rule_id));
                }
            }
        }

        Ok(())
    }
}
