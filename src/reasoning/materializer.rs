//! Parallel seminaive materialization
//!
//! Each round evaluates every rule once per body atom, with that atom
//! restricted to the previous round's delta, on the store's worker pool.
//! Derived triples are buffered per task and merged single-threaded at the
//! barrier, where equality merges are applied and merged-away triples are
//! rewritten to representative form.
//!
//! Deletions are handled by overdeleting everything with a derivation that
//! used a removed fact or rule, then rederiving what still has one and
//! running the ordinary forward rounds from there.

use super::evaluator::{EvalContext, RulePlan};
use super::program::ProgramChange;
use super::rule::Rule;
use super::{RuleError, RuleResult};
use crate::dictionary::{Dictionary, OWL_NOTHING, OWL_SAME_AS, RDF_TYPE};
use crate::equality::{EqualityManager, EqualityMode};
use crate::rdf::{ResourceId, TermKind, Triple};
use crate::storage::{FactStore, TripleTable};
use rayon::prelude::*;
use rayon::ThreadPool;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Delta triples per parallel work unit
const SEED_CHUNK: usize = 1024;

/// Summary of one `materialize` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializationStats {
    /// Seminaive rounds executed
    pub rounds: usize,
    /// Rule firings, including ones that produced known triples
    pub derivations: usize,
    /// Triples added to the representative table
    pub inserted: usize,
    /// Equivalence-class merges
    pub merges: usize,
    /// Merges that derived owl:Nothing
    pub clashes: usize,
    /// Triples overdeleted after fact or rule deletions
    pub deleted: usize,
    /// Overdeleted triples that still had a derivation
    pub rederived: usize,
    /// Whether the closure was rebuilt from the explicit facts
    pub recomputed: bool,
}

pub(crate) struct Materializer<'a> {
    facts: &'a mut FactStore,
    equality: &'a mut EqualityManager,
    dictionary: &'a Dictionary,
    pool: &'a ThreadPool,
    mode: EqualityMode,
    stats: MaterializationStats,
}

impl<'a> Materializer<'a> {
    pub(crate) fn new(
        facts: &'a mut FactStore,
        equality: &'a mut EqualityManager,
        dictionary: &'a Dictionary,
        pool: &'a ThreadPool,
        mode: EqualityMode,
    ) -> Self {
        Self {
            facts,
            equality,
            dictionary,
            pool,
            mode,
            stats: MaterializationStats::default(),
        }
    }

    /// Rebuild the closure from the explicit facts in a fresh equality epoch
    pub(crate) fn recompute(mut self, rules: &[Arc<Rule>]) -> RuleResult<MaterializationStats> {
        self.equality.reset();
        self.facts.reset_derived();
        self.stats.recomputed = true;

        let seeds: Vec<Triple> = self.facts.idb().iter().copied().collect();
        let full = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.body().is_empty())
            .map(|(i, _)| i)
            .collect();
        self.run(rules, seeds, full)
    }

    /// Extend the closure with pending facts and newly activated rules
    pub(crate) fn extend(
        mut self,
        rules: &[Arc<Rule>],
        added_rules: &[Arc<Rule>],
    ) -> RuleResult<MaterializationStats> {
        let seeds = self.facts.take_pending();
        let full = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| added_rules.contains(rule))
            .map(|(i, _)| i)
            .collect();
        self.run(rules, seeds, full)
    }

    /// Update the closure after `removed` explicit facts and the rule changes
    /// in `change`. Only valid while no equivalence classes have been merged.
    pub(crate) fn retract(
        mut self,
        rules: &[Arc<Rule>],
        change: &ProgramChange,
        removed: &[Triple],
    ) -> RuleResult<MaterializationStats> {
        let old_rules: Vec<Arc<Rule>> = rules
            .iter()
            .filter(|rule| !change.added.contains(rule))
            .chain(&change.deleted)
            .cloned()
            .collect();

        let mut deleted = TripleTable::new();
        let mut delta = TripleTable::new();
        {
            let idb = self.facts.idb();
            let mut derived = Vec::new();
            let ctx = EvalContext::new(self.dictionary, &*self.equality);
            for rule in &change.deleted {
                RulePlan::new(rule, |id| id, None).evaluate_full(ctx, idb, &mut derived);
            }
            for &triple in removed.iter().chain(&derived) {
                if idb.contains(&triple) && deleted.insert(triple) {
                    delta.insert(triple);
                }
            }
        }

        let no_full = FxHashSet::default();
        while !delta.is_empty() {
            self.stats.rounds += 1;
            let mut next = TripleTable::new();
            let mut overdelete = |triple: Triple| {
                if self.facts.idb().contains(&triple) && deleted.insert(triple) {
                    next.insert(triple);
                }
            };
            if self.mode.is_enabled() {
                for triple in delta.iter() {
                    for id in triple.to_array() {
                        overdelete(Triple::new(id, OWL_SAME_AS, id));
                    }
                }
            }
            let plans = self.plan_round(&old_rules, &no_full);
            for triple in self.evaluate(&plans, &delta) {
                overdelete(triple);
            }
            debug!(round = self.stats.rounds, delta = delta.len(), overdeleted = next.len(), "overdelete round complete");
            delta = next;
        }

        for triple in deleted.iter() {
            self.facts.idb_mut().remove(triple);
        }
        self.stats.deleted = deleted.len();

        let candidates: Vec<Triple> = deleted.iter().copied().collect();
        let rederived: Vec<Triple> = {
            let checks: Vec<RulePlan> = rules.iter().map(|rule| RulePlan::for_head(rule, |id| id)).collect();
            let ctx = EvalContext::new(self.dictionary, &*self.equality);
            let this = &self;
            self.pool.install(|| {
                candidates
                    .par_iter()
                    .copied()
                    .filter(|triple| this.still_holds(triple, &checks, ctx))
                    .collect()
            })
        };
        for &triple in &rederived {
            self.facts.idb_mut().insert(triple);
        }
        self.stats.rederived = rederived.len();
        debug!(deleted = self.stats.deleted, rederived = self.stats.rederived, "rederivation complete");

        let pending = self.facts.take_pending();
        let mut seeds = rederived;
        seeds.extend(pending.into_iter().filter(|triple| self.facts.idb().contains(triple)));
        let full = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| change.added.contains(rule))
            .map(|(i, _)| i)
            .collect();
        self.run(rules, seeds, full)
    }

    /// Whether an overdeleted triple has a derivation from what is left
    fn still_holds(&self, triple: &Triple, checks: &[RulePlan], ctx: EvalContext<'_>) -> bool {
        if self.facts.edb().contains(triple) {
            return true;
        }
        let idb = self.facts.idb();
        if self.mode.is_enabled() && triple.predicate == OWL_SAME_AS && triple.subject == triple.object {
            return !idb.mentioning(triple.subject).is_empty();
        }
        checks.iter().any(|plan| plan.proves(triple, ctx, idb))
    }

    fn run(
        &mut self,
        rules: &[Arc<Rule>],
        seeds: Vec<Triple>,
        mut full: FxHashSet<usize>,
    ) -> RuleResult<MaterializationStats> {
        let mut previous_constants = self.normalized_constants(rules);
        let mut delta: TripleTable = seeds.iter().copied().collect();
        let mut merges = Vec::new();
        if self.mode.is_enabled() {
            for &triple in &seeds {
                self.on_new_triple(triple, &mut delta, &mut merges);
            }
            self.apply_merges(&mut delta, &mut merges)?;
        }

        loop {
            // Rules whose constants changed representative must be re-run in full
            let constants = self.normalized_constants(rules);
            for (i, (now, before)) in constants.iter().zip(&previous_constants).enumerate() {
                if now != before {
                    full.insert(i);
                }
            }
            previous_constants = constants;

            if delta.is_empty() && full.is_empty() {
                break;
            }
            self.stats.rounds += 1;

            let plans = self.plan_round(rules, &full);
            let derived = self.evaluate(&plans, &delta);
            full.clear();
            self.stats.derivations += derived.len();

            let inserted_before = self.stats.inserted;
            let merges_before = self.stats.merges;
            let mut next = TripleTable::new();
            for triple in derived {
                self.insert_derived(triple, &mut next, &mut merges);
            }
            self.apply_merges(&mut next, &mut merges)?;

            debug!(
                round = self.stats.rounds,
                delta = delta.len(),
                plans = plans.len(),
                inserted = self.stats.inserted - inserted_before,
                merges = self.stats.merges - merges_before,
                "seminaive round complete"
            );
            delta = next;
        }

        if cfg!(debug_assertions) {
            self.check_consistency()?;
        }
        Ok(std::mem::take(&mut self.stats))
    }

    fn normalized_constants(&self, rules: &[Arc<Rule>]) -> Vec<Vec<ResourceId>> {
        rules
            .iter()
            .map(|rule| {
                rule.constants()
                    .map(|c| self.equality.representative_of(c))
                    .collect()
            })
            .collect()
    }

    fn plan_round(&self, rules: &[Arc<Rule>], full: &FxHashSet<usize>) -> Vec<RulePlan> {
        let equality = &*self.equality;
        let normalize = |id: ResourceId| equality.representative_of(id);
        let mut plans = Vec::new();
        for (i, rule) in rules.iter().enumerate() {
            if full.contains(&i) {
                plans.push(RulePlan::new(rule, normalize, None));
            } else {
                for pivot in 0..rule.body().len() {
                    plans.push(RulePlan::new(rule, normalize, Some(pivot)));
                }
            }
        }
        plans
    }

    fn evaluate(&self, plans: &[RulePlan], delta: &TripleTable) -> Vec<Triple> {
        let store = self.facts.idb();
        let ctx = EvalContext::new(self.dictionary, &*self.equality);
        let batches: Vec<Vec<Triple>> = self.pool.install(|| {
            plans
                .par_iter()
                .map(|plan| {
                    let mut out = Vec::new();
                    if plan.pivot().is_none() {
                        plan.evaluate_full(ctx, store, &mut out);
                        return out;
                    }
                    let seeds = plan.seeds(delta);
                    if seeds.len() <= SEED_CHUNK {
                        plan.evaluate_seeds(&seeds, ctx, store, delta, &mut out);
                        return out;
                    }
                    seeds
                        .par_chunks(SEED_CHUNK)
                        .map(|chunk| {
                            let mut out = Vec::new();
                            plan.evaluate_seeds(chunk, ctx, store, delta, &mut out);
                            out
                        })
                        .collect::<Vec<_>>()
                        .concat()
                })
                .collect()
        });
        batches.concat()
    }

    fn insert_derived(
        &mut self,
        triple: Triple,
        next: &mut TripleTable,
        merges: &mut Vec<(ResourceId, ResourceId)>,
    ) {
        let triple = self.equality.normalize(triple);
        if self.facts.idb_mut().insert(triple) {
            next.insert(triple);
            self.stats.inserted += 1;
            if self.mode.is_enabled() {
                self.on_new_triple(triple, next, merges);
            }
        }
    }

    /// Queue merges for an owl:sameAs triple and add reflexive equalities
    fn on_new_triple(
        &mut self,
        triple: Triple,
        next: &mut TripleTable,
        merges: &mut Vec<(ResourceId, ResourceId)>,
    ) {
        let same_as = self.equality.representative_of(OWL_SAME_AS);
        if triple.predicate == same_as && triple.subject != triple.object {
            merges.push((triple.subject, triple.object));
        }
        for id in triple.to_array() {
            let reflexive = Triple::new(id, same_as, id);
            if self.facts.idb_mut().insert(reflexive) {
                next.insert(reflexive);
                self.stats.inserted += 1;
                self.on_new_triple(reflexive, next, merges);
            }
        }
    }

    fn apply_merges(
        &mut self,
        next: &mut TripleTable,
        merges: &mut Vec<(ResourceId, ResourceId)>,
    ) -> RuleResult<()> {
        while let Some((a, b)) = merges.pop() {
            let rep_a = self.equality.representative_of(a);
            let rep_b = self.equality.representative_of(b);
            if rep_a == rep_b {
                continue;
            }

            let kind_a = self.dictionary.kind_of(rep_a)?;
            let kind_b = self.dictionary.kind_of(rep_b)?;
            let clash = kind_a == TermKind::Literal
                || kind_b == TermKind::Literal
                || (self.mode == EqualityMode::Una
                    && kind_a == TermKind::Iri
                    && kind_b == TermKind::Iri);

            let is_blank = |id: ResourceId| {
                (id == rep_a && kind_a == TermKind::BlankNode)
                    || (id == rep_b && kind_b == TermKind::BlankNode)
            };
            let Some(merge) = self.equality.merge_by(rep_a, rep_b, is_blank) else {
                continue;
            };
            self.stats.merges += 1;

            for stale in self.facts.idb().mentioning(merge.absorbed) {
                self.facts.idb_mut().remove(&stale);
                next.remove(&stale);
                self.insert_derived(stale, next, merges);
            }

            if clash {
                self.stats.clashes += 1;
                warn!(
                    representative = %merge.representative,
                    absorbed = %merge.absorbed,
                    "equality clash, deriving owl:Nothing"
                );
                self.insert_derived(
                    Triple::new(merge.representative, RDF_TYPE, OWL_NOTHING),
                    next,
                    merges,
                );
            }
        }
        Ok(())
    }

    /// Every explicit triple is represented and every derived triple is normal
    fn check_consistency(&self) -> RuleResult<()> {
        for triple in self.facts.edb().iter() {
            if !self.facts.idb().contains(&self.equality.normalize(*triple)) {
                return Err(RuleError::InconsistentState(format!(
                    "explicit triple {} missing from the closure",
                    triple
                )));
            }
        }
        for triple in self.facts.idb().iter() {
            if self.equality.normalize(*triple) != *triple {
                return Err(RuleError::InconsistentState(format!(
                    "derived triple {} is not in representative form",
                    triple
                )));
            }
        }
        Ok(())
    }
}
