//! Data store facade
//!
//! A [`DataStore`] owns one dictionary, the fact tables, the equality
//! manager, the rule program and a worker pool. Fact and rule changes go
//! through the ingestion pathways; `materialize` brings the derived closure
//! up to date; queries are compiled into [`TupleIterator`]s that share the
//! store's state.
//!
//! # Example
//!
//! ```rust
//! use deductive_store::{DataStore, QueryDomain, StoreConfig, UpdateType};
//! use deductive_store::rdf::Prefixes;
//!
//! let store = DataStore::new(StoreConfig::default()).unwrap();
//! store
//!     .import_text(
//!         "<a> <R> <b> . <b> <R> <c> .\n\
//!          [?x, <R>, ?z] :- [?x, <R>, ?y], [?y, <R>, ?z] .",
//!         &Prefixes::default(),
//!         UpdateType::Add,
//!     )
//!     .unwrap();
//! store.materialize(false).unwrap();
//! assert_eq!(store.count(QueryDomain::Idb).unwrap(), 3);
//! ```

pub mod config;
mod error;

pub use config::{ConfigError, ConfigResult, StoreConfig};
pub use error::{StoreError, StoreResult};

use crate::dictionary::{Dictionary, DictionaryError};
use crate::equality::EqualityManager;
use crate::expression::Condition;
use crate::formats::{parse_document, ParsedAtom, ParsedTerm, Statement};
use crate::query::{
    parse_query, ConjunctiveQuery, QueryAtom, QueryError, QueryOptions, QueryPlan, QueryTerm, TupleIterator,
};
use crate::rdf::{Datatype, Prefixes, Resource, ResourceId, Term, Triple};
use crate::reasoning::{Atom, MaterializationStats, Materializer, Rule, RuleError, RuleProgram, RuleTerm};
use crate::storage::{FactStore, QueryDomain};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// How an ingested fact or rule is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateType {
    /// Apply now: facts are visible at once, rules on the next materialization
    #[default]
    Add,
    /// Stage for the next materialization
    ScheduleForAddition,
    /// Stage a removal for the next materialization
    ScheduleForDeletion,
}

/// Store lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Empty,
    /// Facts or rules changed since the last materialization
    Populated,
    Materialized,
    Disposed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Empty => "empty",
            Lifecycle::Populated => "populated",
            Lifecycle::Materialized => "materialized",
            Lifecycle::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// What `import_text` added or staged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub facts: usize,
    pub rules: usize,
}

/// Mutable store state, guarded by one lock
#[derive(Debug)]
pub(crate) struct StoreState {
    pub(crate) facts: FactStore,
    pub(crate) equality: EqualityManager,
    pub(crate) program: RuleProgram,
    staged_fact_deletions: Vec<Triple>,
    materialized: bool,
    lifecycle: Lifecycle,
    /// Set when materialization broke an invariant
    poisoned: Option<String>,
}

impl StoreState {
    fn new(lifecycle: Lifecycle) -> Self {
        Self {
            facts: FactStore::new(),
            equality: EqualityManager::new(),
            program: RuleProgram::new(),
            staged_fact_deletions: Vec::new(),
            materialized: false,
            lifecycle,
            poisoned: None,
        }
    }

    fn touch(&mut self) {
        self.lifecycle = Lifecycle::Populated;
    }
}

/// State shared between a store, its dictionary handles and its iterators
#[derive(Debug)]
pub(crate) struct SharedStore {
    pub(crate) dictionary: Dictionary,
    state: RwLock<StoreState>,
    disposed: AtomicBool,
}

impl SharedStore {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn check_live(&self) -> StoreResult<()> {
        if self.is_disposed() {
            return Err(StoreError::UseAfterDispose);
        }
        Ok(())
    }

    fn check_usable(state: &StoreState) -> StoreResult<()> {
        if let Some(reason) = &state.poisoned {
            return Err(StoreError::InconsistentState(format!(
                "store must be reinitialized: {}",
                reason
            )));
        }
        if state.lifecycle == Lifecycle::Uninitialized {
            return Err(StoreError::InconsistentState("store is not initialized".to_string()));
        }
        Ok(())
    }

    /// Read access for an initialized, healthy store
    pub(crate) fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.check_live()?;
        let state = self.read_raw()?;
        Self::check_usable(&state)?;
        Ok(state)
    }

    /// Fails unless the store is live, initialized and healthy
    pub(crate) fn check_ready(&self) -> StoreResult<()> {
        self.check_live()?;
        let state = self.read_raw()?;
        Self::check_usable(&state)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.check_live()?;
        let state = self.write_raw()?;
        Self::check_usable(&state)?;
        Ok(state)
    }

    fn read_raw(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| StoreError::InconsistentState("store lock poisoned".to_string()))
    }

    fn write_raw(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| StoreError::InconsistentState("store lock poisoned".to_string()))
    }
}

/// Handle onto a store's dictionary; invalid once the store is disposed
#[derive(Debug, Clone)]
pub struct DictionaryHandle {
    shared: Arc<SharedStore>,
}

impl DictionaryHandle {
    pub fn resolve(&self, terms: &[Term]) -> StoreResult<Vec<ResourceId>> {
        self.shared.check_live()?;
        Ok(self.shared.dictionary.resolve(terms)?)
    }

    pub fn resolve_one(&self, term: &Term) -> StoreResult<ResourceId> {
        self.shared.check_live()?;
        Ok(self.shared.dictionary.resolve_one(term)?)
    }

    pub fn try_resolve(&self, term: &Term) -> StoreResult<Option<ResourceId>> {
        self.shared.check_live()?;
        Ok(self.shared.dictionary.try_resolve(term)?)
    }

    pub fn term_of(&self, id: ResourceId) -> StoreResult<Term> {
        self.shared.check_live()?;
        Ok(self.shared.dictionary.term_of(id)?)
    }

    pub fn len(&self) -> StoreResult<usize> {
        self.shared.check_live()?;
        Ok(self.shared.dictionary.len()?)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory deductive RDF store
pub struct DataStore {
    shared: Arc<SharedStore>,
    pool: rayon::ThreadPool,
    config: StoreConfig,
}

impl DataStore {
    /// Create an initialized, empty store
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        Self::build(config, Lifecycle::Empty)
    }

    /// Create a store that rejects every operation until `initialize`
    pub fn uninitialized(config: StoreConfig) -> StoreResult<Self> {
        Self::build(config, Lifecycle::Uninitialized)
    }

    fn build(config: StoreConfig, lifecycle: Lifecycle) -> StoreResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("materializer-{}", i))
            .build()?;
        info!(
            equality = %config.equality,
            threads = pool.current_num_threads(),
            "created data store"
        );
        Ok(Self {
            shared: Arc::new(SharedStore {
                dictionary: Dictionary::new(),
                state: RwLock::new(StoreState::new(lifecycle)),
                disposed: AtomicBool::new(false),
            }),
            pool,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Discard all facts, rules and equalities. Resource IDs stay valid.
    pub fn initialize(&self) -> StoreResult<()> {
        self.shared.check_live()?;
        let mut state = self.shared.write_raw()?;
        *state = StoreState::new(Lifecycle::Empty);
        info!("data store initialized");
        Ok(())
    }

    /// Release all resources; later calls on the store, its iterators and
    /// its dictionary handles fail with `UseAfterDispose`
    pub fn dispose(&self) -> StoreResult<()> {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::UseAfterDispose);
        }
        if let Ok(mut state) = self.shared.state.write() {
            *state = StoreState::new(Lifecycle::Disposed);
        }
        if let Err(e) = self.shared.dictionary.release() {
            warn!("failed to release dictionary: {}", e);
        }
        info!("data store disposed");
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.shared.is_disposed() {
            return Lifecycle::Disposed;
        }
        match self.shared.read_raw() {
            Ok(state) => state.lifecycle,
            Err(_) => Lifecycle::Disposed,
        }
    }

    pub fn dictionary(&self) -> StoreResult<DictionaryHandle> {
        self.shared.check_live()?;
        Ok(DictionaryHandle {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn resolve(&self, terms: &[Term]) -> StoreResult<Vec<ResourceId>> {
        self.shared.check_ready()?;
        Ok(self.shared.dictionary.resolve(terms)?)
    }

    pub fn term_of(&self, id: ResourceId) -> StoreResult<Term> {
        self.shared.check_ready()?;
        Ok(self.shared.dictionary.term_of(id)?)
    }

    // ------------------------------------------------------------------
    // Fact ingestion
    // ------------------------------------------------------------------

    /// Add, or stage the deletion of, resolved triples
    pub fn add_triples(&self, triples: &[Triple], update: UpdateType) -> StoreResult<usize> {
        let ids: Vec<ResourceId> = triples.iter().flat_map(Triple::to_array).collect();
        self.shared
            .dictionary
            .check_ids(&ids)
            .map_err(unknown_resource)?;

        let mut state = self.shared.write()?;
        let changed = match update {
            UpdateType::Add | UpdateType::ScheduleForAddition => {
                let StoreState { facts, equality, .. } = &mut *state;
                facts.add_explicit(triples, equality)
            }
            UpdateType::ScheduleForDeletion => {
                let staged: Vec<Triple> = triples
                    .iter()
                    .filter(|t| state.facts.edb().contains(t) && !state.staged_fact_deletions.contains(t))
                    .copied()
                    .collect();
                state.staged_fact_deletions.extend_from_slice(&staged);
                staged.len()
            }
        };
        if changed > 0 {
            state.touch();
        }
        debug!(?update, triples = triples.len(), changed, "facts ingested");
        Ok(changed)
    }

    /// Flat `s, p, o, s, p, o, ...` sequence of resource IDs
    pub fn add_triples_by_resource_ids(&self, ids: &[ResourceId], update: UpdateType) -> StoreResult<usize> {
        let triples = triples_from_flat(ids)?;
        self.add_triples(&triples, update)
    }

    /// Flat sequence of (lexical form, datatype) resources
    pub fn add_triples_by_resources(&self, resources: &[Resource], update: UpdateType) -> StoreResult<usize> {
        let terms = resources
            .iter()
            .map(|resource| {
                resource.to_term().ok_or_else(|| {
                    StoreError::InvalidArgument(format!(
                        "resource \"{}\" has no valid datatype",
                        resource.lexical_form
                    ))
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        self.add_triples_by_terms(&terms, update)
    }

    /// Flat sequence of ground terms
    pub fn add_triples_by_terms(&self, terms: &[Term], update: UpdateType) -> StoreResult<usize> {
        self.shared.check_ready()?;
        let ids = self.shared.dictionary.resolve(terms)?;
        self.add_triples_by_resource_ids(&ids, update)
    }

    /// Parallel arrays of lexical forms and datatype identifiers
    pub fn add_triples_by_lexical_forms<S: AsRef<str>>(
        &self,
        lexical_forms: &[S],
        datatypes: &[Datatype],
        update: UpdateType,
    ) -> StoreResult<usize> {
        if lexical_forms.len() != datatypes.len() {
            return Err(StoreError::InvalidArgument(format!(
                "{} lexical forms but {} datatypes",
                lexical_forms.len(),
                datatypes.len()
            )));
        }
        let resources: Vec<Resource> = lexical_forms
            .iter()
            .zip(datatypes)
            .map(|(lexical_form, &datatype)| Resource::new(lexical_form.as_ref(), datatype))
            .collect();
        self.add_triples_by_resources(&resources, update)
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// Stage rules for addition or deletion; returns how many changed the program
    pub fn add_rules(&self, rules: &[Rule], update: UpdateType) -> StoreResult<usize> {
        let ids: Vec<ResourceId> = rules.iter().flat_map(Rule::constants).collect();
        self.shared
            .dictionary
            .check_ids(&ids)
            .map_err(unknown_resource)?;

        let mut state = self.shared.write()?;
        let mut changed = 0;
        for rule in rules {
            let staged = match update {
                UpdateType::Add | UpdateType::ScheduleForAddition => {
                    state.program.schedule_addition(rule.clone())
                }
                UpdateType::ScheduleForDeletion => state.program.schedule_deletion(rule.clone()),
            };
            if staged {
                changed += 1;
            }
        }
        if changed > 0 {
            state.touch();
        }
        debug!(?update, rules = rules.len(), changed, "rules staged");
        Ok(changed)
    }

    /// Active rules, in the order they were added
    pub fn rules(&self) -> StoreResult<Vec<Arc<Rule>>> {
        Ok(self.shared.read()?.program.active())
    }

    /// Active rules in the text syntax
    pub fn rules_text(&self, prefixes: &Prefixes) -> StoreResult<Vec<String>> {
        self.rules()?
            .iter()
            .map(|rule| Ok(rule.to_text(&self.shared.dictionary, prefixes)?))
            .collect()
    }

    /// Compile a parsed rule, resolving its constants
    pub fn compile_rule(
        &self,
        head: &ParsedAtom,
        body: &[ParsedAtom],
        conditions: &[Condition<ParsedTerm>],
    ) -> StoreResult<Rule> {
        self.shared.check_ready()?;
        let head = self.resolve_atom(head)?;
        let body = body
            .iter()
            .map(|atom| self.resolve_atom(atom))
            .collect::<StoreResult<Vec<_>>>()?;
        let mut resolve = |term: &ParsedTerm| self.resolve_term(term);
        let conditions = conditions
            .iter()
            .map(|condition| {
                Ok(match condition {
                    Condition::Filter(expression) => Condition::Filter(expression.try_map(&mut resolve)?),
                    Condition::Bind { expression, variable } => Condition::Bind {
                        expression: expression.try_map(&mut resolve)?,
                        variable: variable.clone(),
                    },
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Rule::with_conditions(head, body, conditions)?)
    }

    fn resolve_term(&self, term: &ParsedTerm) -> StoreResult<RuleTerm> {
        Ok(match term {
            ParsedTerm::Variable(name) => RuleTerm::Variable(name.clone()),
            ParsedTerm::Term(term) => RuleTerm::Constant(self.shared.dictionary.resolve_one(term)?),
        })
    }

    fn resolve_atom(&self, atom: &ParsedAtom) -> StoreResult<Atom> {
        Ok(Atom::new(
            self.resolve_term(&atom.subject)?,
            self.resolve_term(&atom.predicate)?,
            self.resolve_term(&atom.object)?,
        ))
    }

    // ------------------------------------------------------------------
    // Text import
    // ------------------------------------------------------------------

    /// Import facts and rules written in the text syntax.
    ///
    /// The whole document is parsed and every rule compiled before anything
    /// is added, so a bad document leaves the store unchanged.
    pub fn import_text(&self, text: &str, prefixes: &Prefixes, update: UpdateType) -> StoreResult<ImportSummary> {
        self.shared.check_ready()?;
        let mut prefixes = prefixes.clone();
        let statements = parse_document(text, &mut prefixes)?;

        let mut fact_terms = Vec::new();
        let mut rules = Vec::new();
        for statement in &statements {
            match statement {
                Statement::Fact(terms) => fact_terms.extend(terms.iter().cloned()),
                Statement::Rule { head, body, conditions } => {
                    rules.push(self.compile_rule(head, body, conditions)?)
                }
            }
        }

        let summary = ImportSummary {
            facts: self.add_triples_by_terms(&fact_terms, update)?,
            rules: self.add_rules(&rules, update)?,
        };
        info!(
            statements = statements.len(),
            facts = summary.facts,
            rules = summary.rules,
            "imported text"
        );
        Ok(summary)
    }

    pub fn import_file(&self, path: impl AsRef<Path>, prefixes: &Prefixes, update: UpdateType) -> StoreResult<ImportSummary> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = text.len(), "importing file");
        self.import_text(&text, prefixes, update)
    }

    /// The facts of `domain` and the active rules as a document
    /// `import_text` reads back, abbreviated with `prefixes`
    pub fn export(&self, domain: QueryDomain, prefixes: &Prefixes) -> StoreResult<String> {
        let mut text = String::new();
        for (prefix, iri) in prefixes.iter() {
            text.push_str(&format!("@prefix {}: <{}> .\n", prefix, iri));
        }

        let all = ConjunctiveQuery::new(vec![QueryAtom::new(
            QueryTerm::var("s"),
            QueryTerm::var("p"),
            QueryTerm::var("o"),
        )])
        .distinct();
        let mut iterator = self.compile_query(&all, &QueryOptions::new(domain))?;
        let rows = iterator.rows()?;
        for (values, _) in &rows {
            let terms = values
                .iter()
                .map(|&id| Ok(prefixes.render(&self.shared.dictionary.term_of(id)?)))
                .collect::<StoreResult<Vec<_>>>()?;
            text.push_str(&format!("{} .\n", terms.join(" ")));
        }

        let rules = self.rules_text(prefixes)?;
        for rule in &rules {
            text.push_str(rule);
            text.push('\n');
        }
        debug!(%domain, facts = rows.len(), rules = rules.len(), "exported store");
        Ok(text)
    }

    pub fn export_file(&self, path: impl AsRef<Path>, domain: QueryDomain, prefixes: &Prefixes) -> StoreResult<()> {
        let path = path.as_ref();
        let text = self.export(domain, prefixes)?;
        std::fs::write(path, &text)?;
        info!(path = %path.display(), bytes = text.len(), "exported store");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Materialization
    // ------------------------------------------------------------------

    /// Bring the derived closure up to date.
    ///
    /// With `incremental` set, a store that was materialized before only
    /// evaluates what the new facts and rules contribute, and staged
    /// deletions are handled by overdeleting and rederiving. The first call,
    /// a non-incremental call, or deletions after equivalence classes were
    /// merged recompute the closure from the explicit facts.
    pub fn materialize(&self, incremental: bool) -> StoreResult<MaterializationStats> {
        let mut state = self.shared.write()?;

        let deletions = std::mem::take(&mut state.staged_fact_deletions);
        state.facts.remove_explicit(&deletions);
        let change = state.program.commit();
        let rules = state.program.active();
        let has_deletions = !deletions.is_empty() || !change.deleted.is_empty();
        let recompute = !incremental
            || !state.materialized
            || (has_deletions && state.equality.merge_count() > 0);

        let StoreState { facts, equality, .. } = &mut *state;
        let materializer = Materializer::new(facts, equality, &self.shared.dictionary, &self.pool, self.config.equality);
        let result = if recompute {
            materializer.recompute(&rules)
        } else if has_deletions {
            materializer.retract(&rules, &change, &deletions)
        } else {
            materializer.extend(&rules, &change.added)
        };

        match result {
            Ok(stats) => {
                state.materialized = true;
                state.lifecycle = Lifecycle::Materialized;
                info!(
                    recomputed = stats.recomputed,
                    rounds = stats.rounds,
                    derived = stats.inserted,
                    deleted = stats.deleted,
                    rederived = stats.rederived,
                    merges = stats.merges,
                    clashes = stats.clashes,
                    rules = rules.len(),
                    "materialization complete"
                );
                Ok(stats)
            }
            Err(e) => {
                warn!("materialization failed, store poisoned: {}", e);
                state.poisoned = Some(e.to_string());
                Err(match e {
                    RuleError::InconsistentState(message) => StoreError::InconsistentState(message),
                    other => StoreError::Rule(other),
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    pub fn count(&self, domain: QueryDomain) -> StoreResult<usize> {
        let state = self.shared.read()?;
        Ok(state.facts.count(domain, &state.equality))
    }

    pub fn contains(&self, triple: &Triple, domain: QueryDomain) -> StoreResult<bool> {
        let state = self.shared.read()?;
        Ok(state.facts.contains(triple, domain, &state.equality))
    }

    pub fn representative_of(&self, id: ResourceId) -> StoreResult<ResourceId> {
        Ok(self.shared.read()?.equality.representative_of(id))
    }

    /// Members of the equivalence class of `id`
    pub fn equivalents_of(&self, id: ResourceId) -> StoreResult<Vec<ResourceId>> {
        Ok(self.shared.read()?.equality.class_members(id))
    }

    /// Compile a query into an unopened iterator
    pub fn compile_query(&self, query: &ConjunctiveQuery, options: &QueryOptions) -> StoreResult<TupleIterator> {
        self.shared.check_ready()?;
        let window_size = options.window_size.unwrap_or(self.config.default_window_size);
        if window_size == 0 {
            return Err(QueryError::InvalidWindowSize.into());
        }
        let plan = QueryPlan::compile(query, &self.shared.dictionary, &options.parameters)?;
        debug!(domain = %options.domain, window_size, query = %query, "compiled query");
        Ok(TupleIterator::new(
            Arc::clone(&self.shared),
            plan,
            options.domain,
            options.prefixes.clone(),
            window_size,
        ))
    }

    /// Parse and compile a `SELECT` query
    pub fn compile_query_text(&self, text: &str, options: &QueryOptions) -> StoreResult<TupleIterator> {
        let mut prefixes = options.prefixes.clone();
        let query = parse_query(text, &mut prefixes).map_err(QueryError::from)?;
        let options = QueryOptions {
            prefixes,
            ..options.clone()
        };
        self.compile_query(&query, &options)
    }
}

impl Drop for DataStore {
    fn drop(&mut self) {
        if !self.shared.is_disposed() {
            let _ = self.dispose();
        }
    }
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

fn unknown_resource(error: DictionaryError) -> StoreError {
    match error {
        DictionaryError::UnknownResource(id) => StoreError::UnknownResource(id),
        other => StoreError::Dictionary(other),
    }
}

fn triples_from_flat(ids: &[ResourceId]) -> StoreResult<Vec<Triple>> {
    if ids.len() % 3 != 0 {
        return Err(StoreError::InvalidArgument(format!(
            "{} resource IDs do not form whole triples",
            ids.len()
        )));
    }
    Ok(ids
        .chunks_exact(3)
        .map(|chunk| Triple::new(chunk[0], chunk[1], chunk[2]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::EqualityMode;

    fn store() -> DataStore {
        DataStore::new(StoreConfig::default().with_threads(2)).unwrap()
    }

    #[test]
    fn test_lifecycle_transitions() {
        let store = store();
        assert_eq!(store.lifecycle(), Lifecycle::Empty);

        store
            .add_triples_by_terms(&[Term::iri("a"), Term::iri("p"), Term::iri("b")], UpdateType::Add)
            .unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Populated);

        store.materialize(true).unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Materialized);

        store.initialize().unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Empty);
        assert_eq!(store.count(QueryDomain::Edb).unwrap(), 0);

        store.dispose().unwrap();
        assert_eq!(store.lifecycle(), Lifecycle::Disposed);
        assert!(matches!(store.dispose(), Err(StoreError::UseAfterDispose)));
    }

    #[test]
    fn test_flat_ids_must_form_triples() {
        let store = store();
        let ids = store.resolve(&[Term::iri("a"), Term::iri("p")]).unwrap();
        assert!(matches!(
            store.add_triples_by_resource_ids(&ids, UpdateType::Add),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.add_triples_by_resource_ids(&[ids[0], ids[1], ResourceId(9999)], UpdateType::Add),
            Err(StoreError::UnknownResource(ResourceId(9999)))
        ));
    }

    #[test]
    fn test_bad_document_changes_nothing() {
        let store = store();
        let result = store.import_text(
            "<a> <p> <b> .\n[?x, <p>, ?w] :- [?x, <p>, ?y] .",
            &Prefixes::default(),
            UpdateType::Add,
        );
        assert!(matches!(result, Err(StoreError::Rule(RuleError::UnsafeRule { .. }))));
        assert_eq!(store.count(QueryDomain::Edb).unwrap(), 0);
        assert!(store.rules().unwrap().is_empty());
    }

    #[test]
    fn test_equivalents_after_merge() {
        let store = DataStore::new(StoreConfig::default().with_equality(EqualityMode::NoUna)).unwrap();
        store
            .import_text("<a> owl:sameAs <b> .", &Prefixes::default(), UpdateType::Add)
            .unwrap();
        store.materialize(false).unwrap();

        let ids = store.resolve(&[Term::iri("a"), Term::iri("b")]).unwrap();
        assert_eq!(store.representative_of(ids[1]).unwrap(), ids[0]);
        let mut members = store.equivalents_of(ids[0]).unwrap();
        members.sort();
        assert_eq!(members, ids);
    }

    #[test]
    fn test_export_reads_back() {
        let store = store();
        let document = "@prefix ex: <http://example.org/> .\n\
             ex:a ex:age 41 . ex:a ex:name \"Ann\"@en . ex:a ex:knows _:b .\n\
             [?x, ex:adult, true] :- [?x, ex:age, ?a], FILTER(?a >= 18) .\n\
             [?x, ex:label, ?l] :- [?x, ex:name, ?n], BIND(UCASE(STR(?n)) AS ?l) .";
        store.import_text(document, &Prefixes::new(), UpdateType::Add).unwrap();
        store.materialize(false).unwrap();

        let mut prefixes = Prefixes::new();
        prefixes.declare("ex", "http://example.org/");
        let text = store.export(QueryDomain::Edb, &prefixes).unwrap();
        assert!(text.starts_with("@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .\n"));
        assert!(text.contains("ex:a ex:name \"Ann\"@en .\n"));

        let copy = DataStore::new(StoreConfig::default().with_threads(2)).unwrap();
        let summary = copy.import_text(&text, &Prefixes::empty(), UpdateType::Add).unwrap();
        assert_eq!(summary, ImportSummary { facts: 3, rules: 2 });
        copy.materialize(false).unwrap();
        assert_eq!(copy.count(QueryDomain::Idb).unwrap(), store.count(QueryDomain::Idb).unwrap());
        assert_eq!(copy.count(QueryDomain::Idb).unwrap(), 5);
        assert_eq!(copy.rules_text(&prefixes).unwrap(), store.rules_text(&prefixes).unwrap());
    }
}
