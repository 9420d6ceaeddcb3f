use super::config::ConfigError;
use crate::dictionary::DictionaryError;
use crate::formats::ParseError;
use crate::query::QueryError;
use crate::rdf::ResourceId;
use crate::reasoning::RuleError;
use thiserror::Error;

/// Data store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The store, or the store an iterator or handle came from, was disposed
    #[error("Data store used after dispose")]
    UseAfterDispose,

    /// Lifecycle violation or broken internal invariant
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
