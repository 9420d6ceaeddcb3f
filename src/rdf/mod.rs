//! RDF data model
//!
//! Terms, resource IDs, triples, well-known vocabulary and prefix handling.
//!
//! # Example
//!
//! ```rust
//! use deductive_store::rdf::{Prefixes, Term};
//!
//! let prefixes = Prefixes::default();
//! let same_as = prefixes.expand("owl:sameAs").unwrap();
//! assert_eq!(prefixes.render(&Term::iri(same_as)), "owl:sameAs");
//! ```

mod namespace;
mod types;
pub mod vocab;

pub use namespace::{PrefixError, PrefixResult, Prefixes};
pub use types::{Datatype, Resource, ResourceId, Term, TermKind, Triple};
