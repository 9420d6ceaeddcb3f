//! Conjunctive query representation

use crate::expression::Expression;
use crate::rdf::{ResourceId, Term};
use std::fmt;

/// Query atom position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryTerm {
    Variable(String),
    /// Ground term, looked up in the dictionary at compile time
    Constant(Term),
    /// Already-resolved resource
    Resource(ResourceId),
}

impl QueryTerm {
    pub fn var(name: impl Into<String>) -> Self {
        QueryTerm::Variable(name.into())
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            QueryTerm::Variable(name) => Some(name),
            _ => None,
        }
    }
}

impl From<Term> for QueryTerm {
    fn from(term: Term) -> Self {
        QueryTerm::Constant(term)
    }
}

impl From<ResourceId> for QueryTerm {
    fn from(id: ResourceId) -> Self {
        QueryTerm::Resource(id)
    }
}

/// Triple pattern of a query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryAtom {
    pub subject: QueryTerm,
    pub predicate: QueryTerm,
    pub object: QueryTerm,
}

impl QueryAtom {
    pub fn new(
        subject: impl Into<QueryTerm>,
        predicate: impl Into<QueryTerm>,
        object: impl Into<QueryTerm>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub fn terms(&self) -> [&QueryTerm; 3] {
        [&self.subject, &self.predicate, &self.object]
    }
}

/// Answer variables of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every variable, in order of first occurrence
    All,
    Variables(Vec<String>),
}

/// `SELECT [DISTINCT] projection WHERE { atoms FILTER(...)* }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConjunctiveQuery {
    pub distinct: bool,
    pub projection: Projection,
    pub atoms: Vec<QueryAtom>,
    /// Conditions every answer must satisfy; their variables must occur in `atoms`
    pub filters: Vec<Expression<QueryTerm>>,
}

impl ConjunctiveQuery {
    /// `SELECT *` over the atoms
    pub fn new(atoms: Vec<QueryAtom>) -> Self {
        Self {
            distinct: false,
            projection: Projection::All,
            atoms,
            filters: Vec::new(),
        }
    }

    /// Project the named variables
    pub fn select<S: Into<String>>(variables: impl IntoIterator<Item = S>, atoms: Vec<QueryAtom>) -> Self {
        Self {
            distinct: false,
            projection: Projection::Variables(variables.into_iter().map(Into::into).collect()),
            atoms,
            filters: Vec::new(),
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn with_filter(mut self, filter: Expression<QueryTerm>) -> Self {
        self.filters.push(filter);
        self
    }

    /// All variables in order of first occurrence
    pub fn variables(&self) -> Vec<String> {
        let mut variables: Vec<String> = Vec::new();
        for atom in &self.atoms {
            for name in atom.terms().into_iter().filter_map(QueryTerm::as_variable) {
                if !variables.iter().any(|v| v == name) {
                    variables.push(name.to_string());
                }
            }
        }
        variables
    }

    /// Projected variables, expanding `*`
    pub fn answer_variables(&self) -> Vec<String> {
        match &self.projection {
            Projection::All => self.variables(),
            Projection::Variables(variables) => variables.clone(),
        }
    }
}

impl fmt::Display for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTerm::Variable(name) => write!(f, "?{}", name),
            QueryTerm::Constant(term) => write!(f, "{}", term),
            QueryTerm::Resource(id) => write!(f, "{}", id),
        }
    }
}

impl fmt::Display for ConjunctiveQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        match &self.projection {
            Projection::All => f.write_str("*")?,
            Projection::Variables(variables) => {
                let names: Vec<String> = variables.iter().map(|v| format!("?{}", v)).collect();
                f.write_str(&names.join(" "))?;
            }
        }
        let items: Vec<String> = self
            .atoms
            .iter()
            .map(|a| format!("{} {} {}", a.subject, a.predicate, a.object))
            .chain(self.filters.iter().map(|filter| format!("FILTER({})", filter)))
            .collect();
        write!(f, " WHERE {{ {} }}", items.join(" . "))
    }
}
