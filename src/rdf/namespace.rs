//! Namespace prefixes for compact IRI notation
//!
//! Used by the text front-end to expand `prefix:local` names and by query
//! iterators to render terms back to text.

use super::types::{literal_ref, Term};
use super::vocab;
use indexmap::IndexMap;
use oxrdf::LiteralRef as OxLiteralRef;
use thiserror::Error;

/// Prefix errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// Not of the form `prefix:local`
    #[error("Invalid prefixed name: {0}")]
    InvalidPrefixedName(String),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

/// Ordered prefix → namespace IRI mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    prefixes: IndexMap<String, String>,
}

impl Prefixes {
    /// Prefixes with no declarations
    pub fn empty() -> Self {
        Self {
            prefixes: IndexMap::new(),
        }
    }

    /// rdf, rdfs, owl and xsd
    pub fn new() -> Self {
        let mut prefixes = Self::empty();
        prefixes.declare("rdf", vocab::RDF_NS);
        prefixes.declare("rdfs", vocab::RDFS_NS);
        prefixes.declare("owl", vocab::OWL_NS);
        prefixes.declare("xsd", vocab::XSD_NS);
        prefixes
    }

    /// Declare a prefix, returning the namespace it replaced
    pub fn declare(&mut self, prefix: impl Into<String>, iri: impl Into<String>) -> Option<String> {
        self.prefixes.insert(prefix.into(), iri.into())
    }

    /// Get the namespace IRI for a prefix
    pub fn get_iri(&self, prefix: &str) -> PrefixResult<&str> {
        self.prefixes
            .get(prefix)
            .map(|s| s.as_str())
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Expand `prefix:local` to a full IRI
    pub fn expand(&self, prefixed_name: &str) -> PrefixResult<String> {
        let (prefix, local) = prefixed_name
            .split_once(':')
            .ok_or_else(|| PrefixError::InvalidPrefixedName(prefixed_name.to_string()))?;
        let iri = self.get_iri(prefix)?;
        Ok(format!("{}{}", iri, local))
    }

    /// Compact an IRI with the longest matching namespace
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, namespace)| !namespace.is_empty() && iri.starts_with(namespace.as_str()))
            .max_by_key(|(_, namespace)| namespace.len())
            .and_then(|(prefix, namespace)| {
                let local = &iri[namespace.len()..];
                is_simple_local_name(local).then(|| format!("{}:{}", prefix, local))
            })
    }

    /// Render a term, abbreviating IRIs and datatypes where a prefix applies
    pub fn render(&self, term: &Term) -> String {
        match term {
            Term::Iri(iri) => self.compact(iri).unwrap_or_else(|| term.to_string()),
            Term::Literal { lexical_form, datatype } => {
                let literal = literal_ref(lexical_form, datatype);
                match self.compact(datatype) {
                    Some(datatype) if !literal.is_plain() => format!(
                        "{}^^{}",
                        OxLiteralRef::new_simple_literal(lexical_form),
                        datatype
                    ),
                    _ => literal.to_string(),
                }
            }
            Term::BlankNode(_) => term.to_string(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, iri)| (p.as_str(), iri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl Default for Prefixes {
    fn default() -> Self {
        Self::new()
    }
}

fn is_simple_local_name(local: &str) -> bool {
    !local.ends_with('.')
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
