//! Term dictionary
//!
//! Canonicalizing interner between [`Term`]s and dense [`ResourceId`]s.
//! Safe for concurrent resolution: lookups share a read lock and fresh IDs
//! are assigned under the write lock, re-checking for a concurrent insert.

mod datatype;

use crate::rdf::{vocab, ResourceId, Term, TermKind};
use rustc_hash::FxHashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// rdf:type, interned at construction
pub const RDF_TYPE: ResourceId = ResourceId(0);
/// owl:sameAs, interned at construction
pub const OWL_SAME_AS: ResourceId = ResourceId(1);
/// owl:Nothing, interned at construction
pub const OWL_NOTHING: ResourceId = ResourceId(2);

const BUILTIN_IRIS: [&str; 3] = [vocab::RDF_TYPE, vocab::OWL_SAME_AS, vocab::OWL_NOTHING];

/// Dictionary errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    /// Lexical form does not belong to the datatype's lexical space
    #[error("Malformed literal \"{lexical_form}\"^^<{datatype}>")]
    MalformedTerm { lexical_form: String, datatype: String },

    /// Not a valid IRI reference
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    /// Not a valid blank node label
    #[error("Invalid blank node label: {0}")]
    InvalidBlankNode(String),

    /// ID never issued by this dictionary
    #[error("Unknown resource ID: {0}")]
    UnknownResource(ResourceId),

    /// A thread panicked while holding the dictionary lock
    #[error("Dictionary lock poisoned")]
    Poisoned,
}

pub type DictionaryResult<T> = Result<T, DictionaryError>;

#[derive(Debug, Default)]
struct DictionaryInner {
    ids: FxHashMap<Term, ResourceId>,
    terms: Vec<Term>,
}

impl DictionaryInner {
    fn intern(&mut self, term: &Term) -> ResourceId {
        if let Some(&id) = self.ids.get(term) {
            return id;
        }
        let id = ResourceId(self.terms.len() as u64);
        self.terms.push(term.clone());
        self.ids.insert(term.clone(), id);
        id
    }
}

/// Bidirectional term ↔ resource ID mapping
#[derive(Debug)]
pub struct Dictionary {
    inner: RwLock<DictionaryInner>,
}

impl Dictionary {
    /// Create a dictionary with the built-in vocabulary at its fixed IDs
    pub fn new() -> Self {
        let mut inner = DictionaryInner::default();
        for iri in BUILTIN_IRIS {
            inner.intern(&Term::iri(iri));
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    fn read(&self) -> DictionaryResult<RwLockReadGuard<'_, DictionaryInner>> {
        self.inner.read().map_err(|_| DictionaryError::Poisoned)
    }

    fn write(&self) -> DictionaryResult<RwLockWriteGuard<'_, DictionaryInner>> {
        self.inner.write().map_err(|_| DictionaryError::Poisoned)
    }

    /// Resolve a batch of terms, interning unseen ones.
    ///
    /// The whole batch is validated first, so a malformed term leaves the
    /// dictionary untouched.
    pub fn resolve(&self, terms: &[Term]) -> DictionaryResult<Vec<ResourceId>> {
        for term in terms {
            datatype::validate(term)?;
        }

        let mut ids = Vec::with_capacity(terms.len());
        let mut missing = Vec::new();
        {
            let inner = self.read()?;
            for (position, term) in terms.iter().enumerate() {
                match inner.ids.get(term) {
                    Some(&id) => ids.push(id),
                    None => {
                        ids.push(ResourceId(u64::MAX));
                        missing.push(position);
                    }
                }
            }
        }

        if !missing.is_empty() {
            let mut inner = self.write()?;
            for position in missing {
                ids[position] = inner.intern(&terms[position]);
            }
        }
        Ok(ids)
    }

    /// Resolve a single term
    pub fn resolve_one(&self, term: &Term) -> DictionaryResult<ResourceId> {
        datatype::validate(term)?;
        if let Some(&id) = self.read()?.ids.get(term) {
            return Ok(id);
        }
        Ok(self.write()?.intern(term))
    }

    /// Look a term up without interning it
    pub fn try_resolve(&self, term: &Term) -> DictionaryResult<Option<ResourceId>> {
        Ok(self.read()?.ids.get(term).copied())
    }

    /// Reverse lookup
    pub fn term_of(&self, id: ResourceId) -> DictionaryResult<Term> {
        self.read()?
            .terms
            .get(id.index())
            .cloned()
            .ok_or(DictionaryError::UnknownResource(id))
    }

    /// Reverse lookup of a batch under one lock acquisition
    pub fn terms_of(&self, ids: &[ResourceId]) -> DictionaryResult<Vec<Term>> {
        let inner = self.read()?;
        ids.iter()
            .map(|&id| {
                inner
                    .terms
                    .get(id.index())
                    .cloned()
                    .ok_or(DictionaryError::UnknownResource(id))
            })
            .collect()
    }

    pub fn kind_of(&self, id: ResourceId) -> DictionaryResult<TermKind> {
        self.read()?
            .terms
            .get(id.index())
            .map(Term::kind)
            .ok_or(DictionaryError::UnknownResource(id))
    }

    /// Fail with `UnknownResource` on the first ID this dictionary never issued
    pub fn check_ids(&self, ids: &[ResourceId]) -> DictionaryResult<()> {
        let issued = self.read()?.terms.len();
        match ids.iter().find(|id| id.index() >= issued) {
            Some(&id) => Err(DictionaryError::UnknownResource(id)),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> DictionaryResult<usize> {
        Ok(self.read()?.terms.len())
    }

    pub fn is_empty(&self) -> DictionaryResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every term, releasing memory. Only used on disposal.
    pub(crate) fn release(&self) -> DictionaryResult<()> {
        let mut inner = self.write()?;
        inner.ids = FxHashMap::default();
        inner.terms = Vec::new();
        Ok(())
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}
