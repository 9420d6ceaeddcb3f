//! Rule body evaluation
//!
//! A [`RulePlan`] is one unit of seminaive work: a rule whose body is
//! joined either with one atom (the pivot) restricted to the current delta,
//! or naively over the whole store. FILTER and BIND conditions run at the
//! first join depth where their inputs are bound.

use super::rule::Rule;
use crate::dictionary::Dictionary;
use crate::equality::EqualityManager;
use crate::expression::{schedule, Builtin, Evaluator};
use crate::rdf::{ResourceId, Triple};
use crate::storage::{order_by_boundness, TriplePattern, TripleTable};

/// What conditions need while a round runs
#[derive(Clone, Copy)]
pub(crate) struct EvalContext<'a> {
    evaluator: Evaluator<'a>,
    equality: &'a EqualityManager,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(dictionary: &'a Dictionary, equality: &'a EqualityManager) -> Self {
        Self {
            evaluator: Evaluator::new(dictionary),
            equality,
        }
    }
}

/// Rule prepared for one round: constants normalized, join order fixed
#[derive(Debug, Clone)]
pub(crate) struct RulePlan {
    head: TriplePattern,
    body: Vec<TriplePattern>,
    builtins: Vec<Builtin>,
    variable_count: usize,
    pivot: Option<usize>,
    /// Non-pivot atoms in join order
    order: Vec<usize>,
    /// Builtins to run before each join depth; the last stage runs before the head
    stages: Vec<Vec<usize>>,
}

impl RulePlan {
    /// Plan with `pivot` matched against the delta, or a naive plan for `None`
    pub(crate) fn new(
        rule: &Rule,
        normalize: impl Fn(ResourceId) -> ResourceId,
        pivot: Option<usize>,
    ) -> Self {
        let mut bound = vec![false; rule.variable_count()];
        if let Some(p) = pivot {
            for v in rule.body()[p].variables() {
                bound[v] = true;
            }
        }
        Self::with_bound(rule, normalize, pivot, bound)
    }

    /// Plan for checking whether the rule derives a given triple in one step
    pub(crate) fn for_head(rule: &Rule, normalize: impl Fn(ResourceId) -> ResourceId) -> Self {
        let mut bound = vec![false; rule.variable_count()];
        for v in rule.head().variables() {
            bound[v] = true;
        }
        Self::with_bound(rule, normalize, None, bound)
    }

    fn with_bound(
        rule: &Rule,
        normalize: impl Fn(ResourceId) -> ResourceId,
        pivot: Option<usize>,
        bound: Vec<bool>,
    ) -> Self {
        let head = rule.head().map_constants(&normalize);
        let body: Vec<TriplePattern> = rule
            .body()
            .iter()
            .map(|atom| atom.map_constants(&normalize))
            .collect();
        let builtins: Vec<Builtin> = rule
            .builtins()
            .iter()
            .map(|builtin| builtin.map_resources(&normalize))
            .collect();

        let candidates: Vec<usize> = (0..body.len()).filter(|&i| Some(i) != pivot).collect();
        let order = order_by_boundness(&body, &candidates, &mut bound.clone());
        let mut bound = bound;
        let stages = schedule(&builtins, |p| body[p].variables().collect(), &order, &mut bound);

        Self {
            head,
            body,
            builtins,
            variable_count: rule.variable_count(),
            pivot,
            order,
            stages,
        }
    }

    pub(crate) fn pivot(&self) -> Option<&TriplePattern> {
        self.pivot.map(|p| &self.body[p])
    }

    /// Delta triples the pivot can bind to
    pub(crate) fn seeds(&self, delta: &TripleTable) -> Vec<Triple> {
        match self.pivot() {
            Some(pivot) => delta.matching(pivot.key(&vec![None; self.variable_count])),
            None => Vec::new(),
        }
    }

    /// Derive from each delta triple matching the pivot
    pub(crate) fn evaluate_seeds(
        &self,
        seeds: &[Triple],
        ctx: EvalContext<'_>,
        store: &TripleTable,
        delta: &TripleTable,
        out: &mut Vec<Triple>,
    ) {
        let Some(pivot) = self.pivot() else {
            return;
        };
        let mut bindings = vec![None; self.variable_count];
        for seed in seeds {
            if let Some(mask) = pivot.bind(seed, &mut bindings) {
                self.extend(0, &mut bindings, ctx, store, delta, out);
                pivot.unbind(mask, &mut bindings);
            }
        }
    }

    /// Naive evaluation over the whole store
    pub(crate) fn evaluate_full(&self, ctx: EvalContext<'_>, store: &TripleTable, out: &mut Vec<Triple>) {
        let mut bindings = vec![None; self.variable_count];
        let empty = TripleTable::new();
        self.extend(0, &mut bindings, ctx, store, &empty, out);
    }

    /// Whether the body, with the head bound to `triple`, matches `store`.
    /// Only meaningful on a [`RulePlan::for_head`] plan.
    pub(crate) fn proves(&self, triple: &Triple, ctx: EvalContext<'_>, store: &TripleTable) -> bool {
        let mut bindings = vec![None; self.variable_count];
        if self.head.bind(triple, &mut bindings).is_none() {
            return false;
        }
        self.satisfiable(0, &mut bindings, ctx, store)
    }

    fn satisfiable(
        &self,
        depth: usize,
        bindings: &mut Vec<Option<ResourceId>>,
        ctx: EvalContext<'_>,
        store: &TripleTable,
    ) -> bool {
        let mut assigned = Vec::new();
        let found = self.apply_stage(depth, bindings, ctx, &mut assigned)
            && (depth == self.order.len() || {
                let atom = &self.body[self.order[depth]];
                store.matching(atom.key(bindings)).iter().any(|triple| {
                    match atom.bind(triple, bindings) {
                        Some(mask) => {
                            let found = self.satisfiable(depth + 1, bindings, ctx, store);
                            atom.unbind(mask, bindings);
                            found
                        }
                        None => false,
                    }
                })
            });
        for v in assigned {
            bindings[v] = None;
        }
        found
    }

    fn extend(
        &self,
        depth: usize,
        bindings: &mut Vec<Option<ResourceId>>,
        ctx: EvalContext<'_>,
        store: &TripleTable,
        delta: &TripleTable,
        out: &mut Vec<Triple>,
    ) {
        let mut assigned = Vec::new();
        if self.apply_stage(depth, bindings, ctx, &mut assigned) {
            self.join(depth, bindings, ctx, store, delta, out);
        }
        for v in assigned {
            bindings[v] = None;
        }
    }

    fn join(
        &self,
        depth: usize,
        bindings: &mut Vec<Option<ResourceId>>,
        ctx: EvalContext<'_>,
        store: &TripleTable,
        delta: &TripleTable,
        out: &mut Vec<Triple>,
    ) {
        if depth == self.order.len() {
            if let Some(derived) = self.head.instantiate(bindings) {
                out.push(derived);
            }
            return;
        }

        let index = self.order[depth];
        let atom = &self.body[index];
        // Atoms before the pivot only see facts from earlier rounds
        let old_only = self.pivot.map_or(false, |p| index < p);
        store.for_each_matching(atom.key(bindings), |triple| {
            if old_only && delta.contains(&triple) {
                return;
            }
            if let Some(mask) = atom.bind(&triple, bindings) {
                self.extend(depth + 1, bindings, ctx, store, delta, out);
                atom.unbind(mask, bindings);
            }
        });
    }

    /// Run the builtins of one stage; `false` when a condition rejects the
    /// bindings. Variables bound here are recorded in `assigned`.
    fn apply_stage(
        &self,
        depth: usize,
        bindings: &mut [Option<ResourceId>],
        ctx: EvalContext<'_>,
        assigned: &mut Vec<usize>,
    ) -> bool {
        for &b in &self.stages[depth] {
            match &self.builtins[b] {
                Builtin::Filter(expression) => {
                    if !ctx.evaluator.holds(expression, bindings) {
                        return false;
                    }
                }
                Builtin::Bind { expression, variable } => {
                    let Some(value) = ctx.evaluator.bind(expression, bindings) else {
                        return false;
                    };
                    let value = ctx.equality.representative_of(value);
                    match bindings[*variable] {
                        Some(existing) if existing != value => return false,
                        Some(_) => {}
                        None => {
                            bindings[*variable] = Some(value);
                            assigned.push(*variable);
                        }
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{BinaryOp, Condition, Expression};
    use crate::rdf::Term;
    use crate::reasoning::{Atom, RuleTerm};

    const R: ResourceId = ResourceId(10);

    fn t(s: u64, o: u64) -> Triple {
        Triple::new(ResourceId(s), R, ResourceId(o))
    }

    fn transitive() -> Rule {
        Rule::new(
            Atom::new(RuleTerm::var("x"), R, RuleTerm::var("z")),
            vec![
                Atom::new(RuleTerm::var("x"), R, RuleTerm::var("y")),
                Atom::new(RuleTerm::var("y"), R, RuleTerm::var("z")),
            ],
        )
        .unwrap()
    }

    fn sorted(mut triples: Vec<Triple>) -> Vec<Triple> {
        triples.sort();
        triples.dedup();
        triples
    }

    #[test]
    fn test_full_evaluation() {
        let store: TripleTable = [t(1, 2), t(2, 3)].into_iter().collect();
        let (dictionary, equality) = (Dictionary::new(), EqualityManager::new());
        let plan = RulePlan::new(&transitive(), |id| id, None);
        let mut out = Vec::new();
        plan.evaluate_full(EvalContext::new(&dictionary, &equality), &store, &mut out);
        assert_eq!(out, vec![t(1, 3)]);
    }

    #[test]
    fn test_pivots_exclude_delta_before_pivot() {
        // Store {1→2, 2→3}, delta {2→3}: each derivation is found by exactly one pivot
        let store: TripleTable = [t(1, 2), t(2, 3)].into_iter().collect();
        let delta: TripleTable = [t(2, 3)].into_iter().collect();
        let seeds: Vec<Triple> = delta.iter().copied().collect();
        let rule = transitive();
        let (dictionary, equality) = (Dictionary::new(), EqualityManager::new());
        let ctx = EvalContext::new(&dictionary, &equality);

        let mut out = Vec::new();
        for pivot in 0..2 {
            RulePlan::new(&rule, |id| id, Some(pivot)).evaluate_seeds(&seeds, ctx, &store, &delta, &mut out);
        }
        assert_eq!(out, vec![t(1, 3)]);
    }

    #[test]
    fn test_constants_are_normalized() {
        let store: TripleTable = [t(1, 2), t(2, 3)].into_iter().collect();
        let rule = Rule::new(
            Atom::new(RuleTerm::var("x"), R, ResourceId(4)),
            vec![Atom::new(RuleTerm::var("x"), R, ResourceId(99))],
        )
        .unwrap();
        // 99 has been merged into 3
        let plan = RulePlan::new(&rule, |id| if id == ResourceId(99) { ResourceId(3) } else { id }, None);
        let (dictionary, equality) = (Dictionary::new(), EqualityManager::new());
        let mut out = Vec::new();
        plan.evaluate_full(EvalContext::new(&dictionary, &equality), &store, &mut out);
        assert_eq!(sorted(out), vec![t(2, 4)]);
    }

    #[test]
    fn test_filter_and_bind_conditions() {
        let dictionary = Dictionary::new();
        let equality = EqualityManager::new();
        let ctx = EvalContext::new(&dictionary, &equality);
        let ids = dictionary
            .resolve(&[Term::iri("ann"), Term::iri("bob"), Term::iri("age"), Term::iri("next"), Term::integer(30), Term::integer(12), Term::integer(18)])
            .unwrap();
        let (ann, bob, age, next, thirty, twelve, eighteen) = (ids[0], ids[1], ids[2], ids[3], ids[4], ids[5], ids[6]);
        let store: TripleTable = [Triple::new(ann, age, thirty), Triple::new(bob, age, twelve)].into_iter().collect();

        // [?x, next, ?n] :- [?x, age, ?a], FILTER(?a >= 18), BIND(?a + 1 AS ?n)
        let a = || Expression::leaf(RuleTerm::var("a"));
        let rule = Rule::with_conditions(
            Atom::new(RuleTerm::var("x"), next, RuleTerm::var("n")),
            vec![Atom::new(RuleTerm::var("x"), age, RuleTerm::var("a"))],
            vec![
                Condition::Filter(Expression::binary(a(), BinaryOp::Ge, Expression::leaf(eighteen))),
                Condition::Bind {
                    expression: Expression::binary(a(), BinaryOp::Add, Expression::leaf(bob)),
                    variable: "n".to_string(),
                },
            ],
        );
        // An IRI is not a number, so every BIND fails
        let failing = rule.unwrap();
        let mut out = Vec::new();
        RulePlan::new(&failing, |id| id, None).evaluate_full(ctx, &store, &mut out);
        assert!(out.is_empty());

        let one = dictionary.resolve_one(&Term::integer(1)).unwrap();
        let rule = Rule::with_conditions(
            Atom::new(RuleTerm::var("x"), next, RuleTerm::var("n")),
            vec![Atom::new(RuleTerm::var("x"), age, RuleTerm::var("a"))],
            vec![
                Condition::Filter(Expression::binary(a(), BinaryOp::Ge, Expression::leaf(eighteen))),
                Condition::Bind {
                    expression: Expression::binary(a(), BinaryOp::Add, Expression::leaf(one)),
                    variable: "n".to_string(),
                },
            ],
        )
        .unwrap();
        let mut out = Vec::new();
        RulePlan::new(&rule, |id| id, None).evaluate_full(ctx, &store, &mut out);
        let thirty_one = dictionary.try_resolve(&Term::integer(31)).unwrap().unwrap();
        assert_eq!(out, vec![Triple::new(ann, next, thirty_one)]);

        // The same derivation checked from the head
        let check = RulePlan::for_head(&rule, |id| id);
        assert!(check.proves(&Triple::new(ann, next, thirty_one), ctx, &store));
        assert!(!check.proves(&Triple::new(bob, next, thirty_one), ctx, &store));
        assert!(!check.proves(&Triple::new(ann, next, thirty), ctx, &store));
    }
}
