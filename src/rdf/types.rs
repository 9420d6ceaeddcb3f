//! RDF term and triple types
//!
//! Terms are the lexical view of the data. Everything below the dictionary
//! works on dense [`ResourceId`]s instead.

use super::vocab;
use oxrdf::{
    BlankNodeRef as OxBlankNodeRef,
    LiteralRef as OxLiteralRef,
    NamedNodeRef as OxNamedNodeRef,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense integer handle for one term within one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Create a resource ID from its raw value
    pub const fn new(id: u64) -> Self {
        ResourceId(id)
    }

    /// Get the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u64> for ResourceId {
    fn from(id: u64) -> Self {
        ResourceId(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Datatype identifiers used by the lexical-form ingestion pathway.
///
/// The numbering is part of the external API, so it must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Datatype {
    Invalid = 0,
    IriReference = 1,
    BlankNode = 2,
    XsdString = 3,
    RdfPlainLiteral = 4,
    XsdInteger = 5,
    XsdFloat = 6,
    XsdDouble = 7,
    XsdBoolean = 8,
    XsdDateTime = 9,
    XsdTime = 10,
    XsdDate = 11,
    XsdGYearMonth = 12,
    XsdGYear = 13,
    XsdGMonthDay = 14,
    XsdGDay = 15,
    XsdGMonth = 16,
    XsdDuration = 17,
}

impl Datatype {
    const ALL: [Datatype; 18] = [
        Datatype::Invalid,
        Datatype::IriReference,
        Datatype::BlankNode,
        Datatype::XsdString,
        Datatype::RdfPlainLiteral,
        Datatype::XsdInteger,
        Datatype::XsdFloat,
        Datatype::XsdDouble,
        Datatype::XsdBoolean,
        Datatype::XsdDateTime,
        Datatype::XsdTime,
        Datatype::XsdDate,
        Datatype::XsdGYearMonth,
        Datatype::XsdGYear,
        Datatype::XsdGMonthDay,
        Datatype::XsdGDay,
        Datatype::XsdGMonth,
        Datatype::XsdDuration,
    ];

    /// Numeric identifier
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look a datatype up by its numeric identifier
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Datatype IRI of a literal datatype
    pub fn iri(self) -> Option<&'static str> {
        let iri = match self {
            Datatype::Invalid | Datatype::IriReference | Datatype::BlankNode => return None,
            Datatype::XsdString => vocab::XSD_STRING,
            Datatype::RdfPlainLiteral => vocab::RDF_PLAIN_LITERAL,
            Datatype::XsdInteger => vocab::XSD_INTEGER,
            Datatype::XsdFloat => vocab::XSD_FLOAT,
            Datatype::XsdDouble => vocab::XSD_DOUBLE,
            Datatype::XsdBoolean => vocab::XSD_BOOLEAN,
            Datatype::XsdDateTime => vocab::XSD_DATE_TIME,
            Datatype::XsdTime => vocab::XSD_TIME,
            Datatype::XsdDate => vocab::XSD_DATE,
            Datatype::XsdGYearMonth => vocab::XSD_G_YEAR_MONTH,
            Datatype::XsdGYear => vocab::XSD_G_YEAR,
            Datatype::XsdGMonthDay => vocab::XSD_G_MONTH_DAY,
            Datatype::XsdGDay => vocab::XSD_G_DAY,
            Datatype::XsdGMonth => vocab::XSD_G_MONTH,
            Datatype::XsdDuration => vocab::XSD_DURATION,
        };
        Some(iri)
    }

    /// Map a datatype IRI back to its identifier, if it has one
    pub fn from_iri(iri: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|dt| dt.iri() == Some(iri))
    }
}

/// Coarse classification of a term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    Iri,
    BlankNode,
    Literal,
}

/// An RDF term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// IRI reference, stored without angle brackets
    Iri(String),
    /// Blank node label, stored without the `_:` prefix
    BlankNode(String),
    /// Typed literal
    Literal {
        lexical_form: String,
        datatype: String,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank_node(label: impl Into<String>) -> Self {
        Term::BlankNode(label.into())
    }

    pub fn literal(lexical_form: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            lexical_form: lexical_form.into(),
            datatype: datatype.into(),
        }
    }

    /// xsd:string literal
    pub fn string(value: impl Into<String>) -> Self {
        Term::literal(value, vocab::XSD_STRING)
    }

    /// xsd:integer literal
    pub fn integer(value: i64) -> Self {
        Term::literal(value.to_string(), vocab::XSD_INTEGER)
    }

    pub fn kind(&self) -> TermKind {
        match self {
            Term::Iri(_) => TermKind::Iri,
            Term::BlankNode(_) => TermKind::BlankNode,
            Term::Literal { .. } => TermKind::Literal,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_blank_node(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// IRI, blank node label or literal lexical form
    pub fn lexical_form(&self) -> &str {
        match self {
            Term::Iri(iri) => iri,
            Term::BlankNode(label) => label,
            Term::Literal { lexical_form, .. } => lexical_form,
        }
    }

    /// Datatype identifier; literals with an unregistered datatype IRI map to `Invalid`
    pub fn datatype(&self) -> Datatype {
        match self {
            Term::Iri(_) => Datatype::IriReference,
            Term::BlankNode(_) => Datatype::BlankNode,
            Term::Literal { datatype, .. } => Datatype::from_iri(datatype).unwrap_or(Datatype::Invalid),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "{}", OxNamedNodeRef::new_unchecked(iri)),
            Term::BlankNode(label) => write!(f, "{}", OxBlankNodeRef::new_unchecked(label)),
            Term::Literal { lexical_form, datatype } => {
                write!(f, "{}", literal_ref(lexical_form, datatype))
            }
        }
    }
}

/// N-Triples view of a literal. `text@lang` plain literals become
/// language-tagged; an empty tag leaves a simple literal.
pub(crate) fn literal_ref<'a>(lexical_form: &'a str, datatype: &'a str) -> OxLiteralRef<'a> {
    if datatype == vocab::RDF_PLAIN_LITERAL {
        return match lexical_form.rfind('@') {
            Some(at) if at + 1 < lexical_form.len() => {
                OxLiteralRef::new_language_tagged_literal_unchecked(
                    &lexical_form[..at],
                    &lexical_form[at + 1..],
                )
            }
            Some(at) => OxLiteralRef::new_simple_literal(&lexical_form[..at]),
            None => OxLiteralRef::new_simple_literal(lexical_form),
        };
    }
    OxLiteralRef::new_typed_literal(lexical_form, OxNamedNodeRef::new_unchecked(datatype))
}

/// Flat (lexical form, datatype) description of a term
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub lexical_form: String,
    pub datatype: Datatype,
}

impl Resource {
    pub fn new(lexical_form: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            lexical_form: lexical_form.into(),
            datatype,
        }
    }

    /// Convert to a term; `None` for the invalid datatype
    pub fn to_term(&self) -> Option<Term> {
        match self.datatype {
            Datatype::Invalid => None,
            Datatype::IriReference => Some(Term::Iri(self.lexical_form.clone())),
            Datatype::BlankNode => Some(Term::BlankNode(self.lexical_form.clone())),
            literal => literal
                .iri()
                .map(|iri| Term::literal(self.lexical_form.clone(), iri)),
        }
    }
}

impl From<&Term> for Resource {
    fn from(term: &Term) -> Self {
        Resource::new(term.lexical_form(), term.datatype())
    }
}

/// A fact: (subject, predicate, object) over resource IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: ResourceId,
    pub predicate: ResourceId,
    pub object: ResourceId,
}

impl Triple {
    pub fn new(subject: ResourceId, predicate: ResourceId, object: ResourceId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn from_array(ids: [ResourceId; 3]) -> Self {
        Self::new(ids[0], ids[1], ids[2])
    }

    pub fn to_array(&self) -> [ResourceId; 3] {
        [self.subject, self.predicate, self.object]
    }

    /// Whether the ID occurs in any position
    pub fn mentions(&self, id: ResourceId) -> bool {
        self.subject == id || self.predicate == id || self.object == id
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.subject, self.predicate, self.object)
    }
}
