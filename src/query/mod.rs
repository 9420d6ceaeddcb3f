//! Query engine
//!
//! Conjunctive triple-pattern queries with FILTERs over one provenance domain:
//! - `ast`: the query structure collaborators build or parse
//! - `parser`: `SELECT` text syntax
//! - `planner`: constant resolution, most-bound-first join order and filter placement
//! - `iterator`: windowed pull cursor reporting answer multiplicities

pub mod ast;
pub mod iterator;
pub mod parser;
pub mod planner;

pub use ast::{ConjunctiveQuery, Projection, QueryAtom, QueryTerm};
pub use iterator::TupleIterator;
pub use parser::parse_query;
pub use planner::QueryPlan;

use crate::dictionary::DictionaryError;
use crate::formats::ParseError;
use crate::rdf::{Prefixes, ResourceId};
use crate::storage::QueryDomain;
use std::collections::HashMap;
use thiserror::Error;

/// Query compilation errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Projected variable or parameter that the query does not mention
    #[error("Variable ?{0} does not occur in the query")]
    UnknownVariable(String),

    #[error("Window size must be positive")]
    InvalidWindowSize,

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// How a query is compiled
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub domain: QueryDomain,
    /// Answers fetched per window; the store default when `None`
    pub window_size: Option<usize>,
    /// Used to parse query text and to render answers
    pub prefixes: Prefixes,
    /// Variables bound before evaluation
    pub parameters: HashMap<String, ResourceId>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            domain: QueryDomain::Idb,
            window_size: None,
            prefixes: Prefixes::default(),
            parameters: HashMap::new(),
        }
    }
}

impl QueryOptions {
    pub fn new(domain: QueryDomain) -> Self {
        Self {
            domain,
            ..Self::default()
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    pub fn with_prefixes(mut self, prefixes: Prefixes) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub fn with_parameter(mut self, variable: impl Into<String>, value: ResourceId) -> Self {
        self.parameters.insert(variable.into(), value);
        self
    }
}
