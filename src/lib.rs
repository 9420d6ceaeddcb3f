//! Deductive RDF Store
//!
//! An in-memory triple store with a forward-chaining rule engine that keeps
//! a materialized closure of the explicit facts, with optional owl:sameAs
//! equality reasoning and windowed conjunctive queries.
//!
//! # Architecture
//!
//! - `dictionary`: validating term ↔ resource ID interner
//! - `storage`: explicit and derived triple tables with SPO/POS/OSP indexes
//! - `equality`: union-find equivalence classes with deterministic representatives
//! - `expression`: FILTER and BIND expressions and built-in functions
//! - `reasoning`: Horn rules and parallel seminaive materialization
//! - `query`: conjunctive queries and the pull-based tuple iterator
//! - `store`: the `DataStore` facade, lifecycle and configuration
//! - `formats`: text syntax for facts, rules and queries
//!
//! # Capabilities
//!
//! - ✅ Dictionary encoding with lexical validation of XSD literals
//! - ✅ EDB, IDB, IDBrep and IDBrepNoEDB provenance domains
//! - ✅ Seminaive materialization on a rayon worker pool
//! - ✅ Incremental materialization after fact or rule additions
//! - ✅ owl:sameAs reasoning with and without the unique name assumption
//! - ✅ Scheduled deletion of facts and rules (overdelete/rederive, or recomputation under merges)
//! - ✅ FILTER and BIND conditions in rule bodies, FILTER in queries
//! - ✅ Export of facts and rules in the text syntax
//! - ✅ Windowed query iteration with join-path multiplicities
//!
//! ## Example Usage
//!
//! ```rust
//! use deductive_store::{DataStore, EqualityMode, QueryDomain, QueryOptions, StoreConfig, UpdateType};
//! use deductive_store::rdf::Prefixes;
//!
//! let store = DataStore::new(StoreConfig::default().with_equality(EqualityMode::NoUna)).unwrap();
//! store
//!     .import_text(
//!         "<alice> <knows> <bob> . <alice> <knows> <robert> .\n\
//!          [?y1, owl:sameAs, ?y2] :- [?x, <knows>, ?y1], [?x, <knows>, ?y2] .",
//!         &Prefixes::default(),
//!         UpdateType::Add,
//!     )
//!     .unwrap();
//! store.materialize(false).unwrap();
//!
//! // bob and robert collapse into one representative
//! let mut answers = store
//!     .compile_query_text("SELECT ?y WHERE { <alice> <knows> ?y }", &QueryOptions::new(QueryDomain::IdbRep))
//!     .unwrap();
//! assert_eq!(answers.rows().unwrap().len(), 1);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod dictionary;
pub mod equality;
pub mod expression;
pub mod formats;
pub mod query;
pub mod rdf;
pub mod reasoning;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use dictionary::{Dictionary, DictionaryError, DictionaryResult};

pub use equality::{EqualityManager, EqualityMode};

pub use expression::{BinaryOp, Condition, Expression, ExpressionError, Function, UnaryOp};

pub use formats::{parse_document, ParseError, ParseResult, Statement};

pub use query::{
    parse_query, ConjunctiveQuery, Projection, QueryAtom, QueryError, QueryOptions, QueryResult,
    QueryTerm, TupleIterator,
};

pub use rdf::{Datatype, Prefixes, Resource, ResourceId, Term, TermKind, Triple};

pub use reasoning::{Atom, MaterializationStats, Rule, RuleError, RuleResult, RuleTerm};

pub use storage::{FactStore, QueryDomain};

pub use store::{
    ConfigError, DataStore, DictionaryHandle, ImportSummary, Lifecycle, StoreConfig, StoreError,
    StoreResult, UpdateType,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
