//! Windowed pull iterator over query answers
//!
//! The join runs as an explicit depth-first cursor so it can stop after a
//! window of answers and resume later. The store's read lock is held only
//! while a window is filled.

use super::planner::QueryPlan;
use crate::equality::EqualityManager;
use crate::expression::{Builtin, Evaluator};
use crate::rdf::{Prefixes, ResourceId, Term, Triple};
use crate::storage::{FactStore, QueryDomain, TriplePattern, TripleTable};
use crate::store::{SharedStore, StoreError, StoreResult};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unopened,
    Open,
    Disposed,
}

/// One answer tuple and the number of join paths it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
struct Row {
    values: Vec<ResourceId>,
    multiplicity: usize,
}

/// Triples of one domain, as seen by the join
struct Source<'a> {
    table: &'a TripleTable,
    exclude: Option<&'a TripleTable>,
}

impl<'a> Source<'a> {
    fn new(facts: &'a FactStore, domain: QueryDomain) -> Self {
        match domain {
            QueryDomain::Edb => Self {
                table: facts.edb(),
                exclude: None,
            },
            QueryDomain::Idb | QueryDomain::IdbRep => Self {
                table: facts.idb(),
                exclude: None,
            },
            QueryDomain::IdbRepNoEdb => Self {
                table: facts.idb(),
                exclude: Some(facts.edb()),
            },
        }
    }

    fn matching(&self, pattern: &TriplePattern, bindings: &[Option<ResourceId>]) -> Vec<Triple> {
        let mut triples = self.table.matching(pattern.key(bindings));
        if let Some(exclude) = self.exclude {
            triples.retain(|t| !exclude.contains(t));
        }
        triples
    }
}

struct Frame {
    candidates: Vec<Triple>,
    next: usize,
    /// Bindings made by the current candidate
    mask: Option<u8>,
}

/// Resumable nested-loop join
struct JoinCursor {
    patterns: Vec<TriplePattern>,
    bindings: Vec<Option<ResourceId>>,
    filters: Vec<Builtin>,
    stages: Vec<Vec<usize>>,
    frames: Vec<Frame>,
    started: bool,
    finished: bool,
}

impl JoinCursor {
    fn new(
        patterns: Vec<TriplePattern>,
        bindings: Vec<Option<ResourceId>>,
        filters: Vec<Builtin>,
        stages: Vec<Vec<usize>>,
        satisfiable: bool,
    ) -> Self {
        Self {
            patterns,
            bindings,
            filters,
            stages,
            frames: Vec::new(),
            started: false,
            finished: !satisfiable,
        }
    }

    /// Filters scheduled after `depth` patterns; always true without an evaluator
    fn passes(&self, depth: usize, evaluator: Option<Evaluator<'_>>) -> bool {
        let (Some(evaluator), Some(stage)) = (evaluator, self.stages.get(depth)) else {
            return true;
        };
        stage
            .iter()
            .all(|&f| evaluator.holds(self.filters[f].expression(), &self.bindings))
    }

    /// Move to the next complete binding; `false` once the join is exhausted.
    /// Filters are tested only when `evaluator` is given.
    fn next_match(&mut self, source: &Source<'_>, evaluator: Option<Evaluator<'_>>) -> bool {
        if self.finished {
            return false;
        }
        if !self.started {
            self.started = true;
            if !self.passes(0, evaluator) {
                self.finished = true;
                return false;
            }
            // An empty body has exactly one (empty) answer
            if self.patterns.is_empty() {
                return true;
            }
            let candidates = source.matching(&self.patterns[0], &self.bindings);
            self.frames.push(Frame {
                candidates,
                next: 0,
                mask: None,
            });
        }

        while let Some(depth) = self.frames.len().checked_sub(1) {
            let pattern = self.patterns[depth];
            let frame = &mut self.frames[depth];
            if let Some(mask) = frame.mask.take() {
                pattern.unbind(mask, &mut self.bindings);
            }
            if frame.next == frame.candidates.len() {
                self.frames.pop();
                continue;
            }
            let triple = frame.candidates[frame.next];
            frame.next += 1;

            if let Some(mask) = pattern.bind(&triple, &mut self.bindings) {
                frame.mask = Some(mask);
                if !self.passes(depth + 1, evaluator) {
                    continue;
                }
                if depth + 1 == self.patterns.len() {
                    return true;
                }
                let candidates = source.matching(&self.patterns[depth + 1], &self.bindings);
                self.frames.push(Frame {
                    candidates,
                    next: 0,
                    mask: None,
                });
            }
        }
        self.finished = true;
        false
    }
}

/// Pull-based cursor over the answers of a compiled query.
///
/// `open` positions the iterator at the first answer, `advance` at the next
/// one. Both return the current multiplicity, which is 0 once the answers
/// are exhausted.
pub struct TupleIterator {
    shared: Arc<SharedStore>,
    plan: QueryPlan,
    domain: QueryDomain,
    prefixes: Prefixes,
    window_size: usize,
    status: Status,
    cursor: Option<JoinCursor>,
    window: VecDeque<Row>,
    current: Option<Row>,
    /// Tuples already returned by a DISTINCT query
    seen: FxHashSet<Vec<ResourceId>>,
}

impl TupleIterator {
    pub(crate) fn new(
        shared: Arc<SharedStore>,
        plan: QueryPlan,
        domain: QueryDomain,
        prefixes: Prefixes,
        window_size: usize,
    ) -> Self {
        Self {
            shared,
            plan,
            domain,
            prefixes,
            window_size,
            status: Status::Unopened,
            cursor: None,
            window: VecDeque::new(),
            current: None,
            seen: FxHashSet::default(),
        }
    }

    /// Start, or restart, evaluation and position at the first answer
    pub fn open(&mut self) -> StoreResult<usize> {
        self.check_not_disposed()?;
        let cursor = {
            let state = self.shared.read()?;
            let (patterns, bindings, filters) = match self.domain {
                QueryDomain::Edb => self.plan.normalized(|id| id),
                _ => self.plan.normalized(|id| state.equality.representative_of(id)),
            };
            let stages = self.plan.stages().to_vec();
            JoinCursor::new(patterns, bindings, filters, stages, self.plan.is_satisfiable())
        };

        self.cursor = Some(cursor);
        self.window.clear();
        self.seen.clear();
        self.current = None;
        self.status = Status::Open;
        self.step()
    }

    /// Move to the next answer
    pub fn advance(&mut self) -> StoreResult<usize> {
        self.check_open()?;
        self.step()
    }

    /// Multiplicity of the current answer, 0 when exhausted
    pub fn multiplicity(&self) -> StoreResult<usize> {
        self.check_open()?;
        Ok(self.current.as_ref().map_or(0, |row| row.multiplicity))
    }

    pub fn is_exhausted(&self) -> StoreResult<bool> {
        Ok(self.multiplicity()? == 0)
    }

    /// Number of projected variables
    pub fn arity(&self) -> usize {
        self.plan.answer().len()
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.plan.answer_names()
    }

    pub fn domain(&self) -> QueryDomain {
        self.domain
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Resource bound to the `index`-th projected variable
    pub fn resource(&self, index: usize) -> StoreResult<ResourceId> {
        self.check_open()?;
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| StoreError::InvalidArgument("iterator is exhausted".to_string()))?;
        row.values.get(index).copied().ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "index {} out of range for {} answer variables",
                index,
                row.values.len()
            ))
        })
    }

    /// Term bound to the `index`-th projected variable
    pub fn ground_term(&self, index: usize) -> StoreResult<Term> {
        let id = self.resource(index)?;
        Ok(self.shared.dictionary.term_of(id)?)
    }

    /// `ground_term` rendered through the query's prefixes
    pub fn render(&self, index: usize) -> StoreResult<String> {
        Ok(self.prefixes.render(&self.ground_term(index)?))
    }

    /// Open if needed and drain every remaining answer
    pub fn rows(&mut self) -> StoreResult<Vec<(Vec<ResourceId>, usize)>> {
        let mut multiplicity = match self.status {
            Status::Unopened => self.open()?,
            _ => self.multiplicity()?,
        };
        let mut rows = Vec::new();
        while multiplicity > 0 {
            if let Some(row) = &self.current {
                rows.push((row.values.clone(), row.multiplicity));
            }
            multiplicity = self.advance()?;
        }
        Ok(rows)
    }

    /// Release the iterator; later calls fail with `UseAfterDispose`
    pub fn dispose(&mut self) {
        self.status = Status::Disposed;
        self.cursor = None;
        self.window = VecDeque::new();
        self.current = None;
        self.seen = FxHashSet::default();
    }

    fn check_not_disposed(&self) -> StoreResult<()> {
        if self.status == Status::Disposed || self.shared.is_disposed() {
            return Err(StoreError::UseAfterDispose);
        }
        Ok(())
    }

    fn check_open(&self) -> StoreResult<()> {
        self.check_not_disposed()?;
        if self.status == Status::Unopened {
            return Err(StoreError::InconsistentState(
                "iterator has not been opened".to_string(),
            ));
        }
        Ok(())
    }

    fn step(&mut self) -> StoreResult<usize> {
        if self.window.is_empty() {
            self.fill()?;
        }
        self.current = self.window.pop_front();
        Ok(self.current.as_ref().map_or(0, |row| row.multiplicity))
    }

    fn fill(&mut self) -> StoreResult<()> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(());
        };
        if cursor.finished {
            return Ok(());
        }

        let state = self.shared.read()?;
        let source = Source::new(&state.facts, self.domain);
        let expansion = (self.domain == QueryDomain::Idb && state.equality.merge_count() > 0)
            .then_some(&state.equality);
        let evaluator = Evaluator::new(&self.shared.dictionary);
        let seen = self.plan.is_distinct().then_some(&mut self.seen);
        let mut emitter = Emitter {
            plan: &self.plan,
            expansion,
            evaluator,
            seen,
            window: &mut self.window,
        };

        // Over expanded classes, filters see each member, so the emitter tests them
        let join_filters = expansion.is_none().then_some(evaluator);
        while emitter.window.len() < self.window_size && cursor.next_match(&source, join_filters) {
            emitter.emit(&cursor.bindings);
        }
        Ok(())
    }
}

/// Turns complete join bindings into answer rows
struct Emitter<'a> {
    plan: &'a QueryPlan,
    /// Set in the IDB domain when classes are non-trivial
    expansion: Option<&'a EqualityManager>,
    evaluator: Evaluator<'a>,
    seen: Option<&'a mut FxHashSet<Vec<ResourceId>>>,
    window: &'a mut VecDeque<Row>,
}

impl Emitter<'_> {
    fn emit(&mut self, bindings: &[Option<ResourceId>]) {
        let answer = self.plan.answer();
        let Some(values) = answer.iter().map(|&v| bindings[v]).collect::<Option<Vec<_>>>() else {
            return;
        };

        let Some(equality) = self.expansion else {
            self.push(values, 1);
            return;
        };

        let parameters = self.plan.parameters();
        let filter_variables = self.plan.filter_variables();
        // Projected and filtered variables enumerate class members; every
        // other variable ranges over its whole class
        let mut enumerated: Vec<usize> = Vec::new();
        let mut choices: Vec<Vec<ResourceId>> = Vec::new();
        let mut multiplicity = 1;
        for (v, value) in bindings.iter().enumerate() {
            let Some(id) = *value else { continue };
            if parameters[v].is_some() {
                continue;
            }
            if answer.contains(&v) || filter_variables.contains(&v) {
                enumerated.push(v);
                choices.push(equality.class_members(id));
            } else {
                multiplicity *= equality.class_size(id);
            }
        }

        let mut local: Vec<Option<ResourceId>> = bindings
            .iter()
            .zip(parameters)
            .map(|(value, fixed)| (*fixed).or(*value))
            .collect();
        let mut positions = vec![0usize; choices.len()];
        loop {
            for (i, &v) in enumerated.iter().enumerate() {
                local[v] = Some(choices[i][positions[i]]);
            }
            let accepted = self
                .plan
                .filters()
                .iter()
                .all(|filter| self.evaluator.holds(filter.expression(), &local));
            if accepted {
                let row = answer.iter().filter_map(|&v| local[v]).collect();
                self.push(row, multiplicity);
            }

            // Odometer
            let mut i = choices.len();
            loop {
                if i == 0 {
                    return;
                }
                i -= 1;
                positions[i] += 1;
                if positions[i] < choices[i].len() {
                    break;
                }
                positions[i] = 0;
            }
        }
    }

    fn push(&mut self, values: Vec<ResourceId>, multiplicity: usize) {
        match self.seen.as_deref_mut() {
            Some(seen) => {
                if seen.insert(values.clone()) {
                    self.window.push_back(Row {
                        values,
                        multiplicity: 1,
                    });
                }
            }
            None => self.window.push_back(Row {
                values,
                multiplicity,
            }),
        }
    }
}
