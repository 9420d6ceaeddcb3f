//! Rule-based reasoning
//!
//! Rules are Horn clauses over triple patterns. The [`RuleProgram`] holds
//! the active rule set plus staged changes; materialization computes the
//! closure of the explicit facts under the active rules with parallel
//! seminaive evaluation, optionally treating `owl:sameAs` as equality.

mod evaluator;
mod materializer;
mod program;
mod rule;

pub use materializer::MaterializationStats;
pub(crate) use materializer::Materializer;
pub use program::{ProgramChange, RuleProgram};
pub use rule::{Atom, Rule, RuleTerm};

use crate::dictionary::DictionaryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("variable ?{variable} is not bound by the rule body")]
    UnsafeRule { variable: String },

    #[error("dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),

    #[error("materialization left the store inconsistent: {0}")]
    InconsistentState(String),
}

pub type RuleResult<T> = Result<T, RuleError>;
