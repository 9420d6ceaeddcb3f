//! Horn rules over triple patterns

use super::{RuleError, RuleResult};
use crate::dictionary::{Dictionary, DictionaryResult, OWL_SAME_AS};
use crate::expression::{Builtin, Condition, Expression, Operand};
use crate::rdf::{Prefixes, ResourceId};
use crate::storage::{PatternTerm, TriplePattern};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Rule atom position as written by callers: named variables or constants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleTerm {
    Variable(String),
    Constant(ResourceId),
}

impl RuleTerm {
    pub fn var(name: impl Into<String>) -> Self {
        RuleTerm::Variable(name.into())
    }
}

impl From<ResourceId> for RuleTerm {
    fn from(id: ResourceId) -> Self {
        RuleTerm::Constant(id)
    }
}

/// (subject, predicate, object) atom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub subject: RuleTerm,
    pub predicate: RuleTerm,
    pub object: RuleTerm,
}

impl Atom {
    pub fn new(
        subject: impl Into<RuleTerm>,
        predicate: impl Into<RuleTerm>,
        object: impl Into<RuleTerm>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// Variable numbering while a rule is compiled
#[derive(Default)]
struct Numbering {
    variables: HashMap<String, usize>,
    names: Vec<String>,
}

impl Numbering {
    /// Slot of `name`; allocates one when `allocate` is set, otherwise an
    /// unknown name is returned as the error
    fn variable(&mut self, name: &str, allocate: bool) -> Result<usize, String> {
        match self.variables.get(name) {
            Some(&v) => Ok(v),
            None if allocate => {
                let v = self.names.len();
                self.variables.insert(name.to_string(), v);
                self.names.push(name.to_string());
                Ok(v)
            }
            None => Err(name.to_string()),
        }
    }

    fn term(&mut self, term: &RuleTerm, allocate: bool) -> Result<PatternTerm, String> {
        match term {
            RuleTerm::Constant(id) => Ok(PatternTerm::Constant(*id)),
            RuleTerm::Variable(name) => self.variable(name, allocate).map(PatternTerm::Variable),
        }
    }

    fn atom(&mut self, atom: &Atom, allocate: bool) -> Result<TriplePattern, String> {
        Ok(TriplePattern::new(
            self.term(&atom.subject, allocate)?,
            self.term(&atom.predicate, allocate)?,
            self.term(&atom.object, allocate)?,
        ))
    }

    fn expression(&mut self, expression: &Expression<RuleTerm>) -> Result<Expression<Operand>, String> {
        expression.try_map(&mut |leaf: &RuleTerm| match leaf {
            RuleTerm::Constant(id) => Ok(Operand::Resource(*id)),
            RuleTerm::Variable(name) => self.variable(name, false).map(Operand::Variable),
        })
    }
}

/// A range-restricted rule `head :- body`, optionally with FILTER and BIND
/// conditions.
///
/// Variables are numbered by first occurrence in the body atoms, then BIND
/// outputs in order, so rules that differ only in variable names compare
/// equal.
#[derive(Debug, Clone)]
pub struct Rule {
    head: TriplePattern,
    body: Vec<TriplePattern>,
    builtins: Vec<Builtin>,
    variable_names: Vec<String>,
}

impl Rule {
    /// Compile a rule, rejecting heads with variables the body does not bind
    pub fn new(head: Atom, body: Vec<Atom>) -> RuleResult<Self> {
        Self::with_conditions(head, body, Vec::new())
    }

    /// Compile a rule with conditions.
    ///
    /// Every variable a condition reads must be bound by a body atom or an
    /// earlier BIND. A BIND to a variable that is already bound tests the
    /// two values for equality.
    pub fn with_conditions(head: Atom, body: Vec<Atom>, conditions: Vec<Condition<RuleTerm>>) -> RuleResult<Self> {
        let mut numbering = Numbering::default();
        let unsafe_rule = |variable: String| RuleError::UnsafeRule { variable };

        let body = body
            .iter()
            .map(|atom| numbering.atom(atom, true))
            .collect::<Result<Vec<_>, _>>()
            .map_err(unsafe_rule)?;

        let mut builtins = Vec::with_capacity(conditions.len());
        for condition in &conditions {
            builtins.push(match condition {
                Condition::Filter(expression) => {
                    Builtin::Filter(numbering.expression(expression).map_err(unsafe_rule)?)
                }
                Condition::Bind { expression, variable } => {
                    let expression = numbering.expression(expression).map_err(unsafe_rule)?;
                    let variable = numbering.variable(variable, true).map_err(unsafe_rule)?;
                    Builtin::Bind { expression, variable }
                }
            });
        }

        let head = numbering.atom(&head, false).map_err(unsafe_rule)?;
        Ok(Self {
            head,
            body,
            builtins,
            variable_names: numbering.names,
        })
    }

    pub fn head(&self) -> &TriplePattern {
        &self.head
    }

    pub fn body(&self) -> &[TriplePattern] {
        &self.body
    }

    /// Compiled FILTER and BIND conditions, in body order
    pub fn builtins(&self) -> &[Builtin] {
        &self.builtins
    }

    pub fn variable_count(&self) -> usize {
        self.variable_names.len()
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    /// Whether the head asserts owl:sameAs
    pub fn derives_equality(&self) -> bool {
        self.head.predicate == PatternTerm::Constant(OWL_SAME_AS)
    }

    /// All constants in head, body and conditions
    pub fn constants(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.head
            .constants()
            .chain(self.body.iter().flat_map(|atom| atom.constants()))
            .chain(self.builtins.iter().flat_map(|builtin| builtin.resources()))
    }

    /// Render in the text syntax, e.g. `[?x, <R>, ?z] :- [?x, <R>, ?y], [?y, <R>, ?z] .`
    pub fn to_text(&self, dictionary: &Dictionary, prefixes: &Prefixes) -> DictionaryResult<String> {
        let render_constant = |id: ResourceId| -> DictionaryResult<String> {
            Ok(prefixes.render(&dictionary.term_of(id)?))
        };
        let render_atom = |atom: &TriplePattern| -> DictionaryResult<String> {
            let mut parts = Vec::with_capacity(3);
            for term in atom.terms() {
                parts.push(match term {
                    PatternTerm::Variable(v) => format!("?{}", self.variable_names[v]),
                    PatternTerm::Constant(id) => render_constant(id)?,
                });
            }
            Ok(format!("[{}]", parts.join(", ")))
        };
        let mut render_operand = |operand: &Operand| -> DictionaryResult<String> {
            match operand {
                Operand::Variable(v) => Ok(format!("?{}", self.variable_names[*v])),
                Operand::Resource(id) => render_constant(*id),
                Operand::Term(term) => Ok(prefixes.render(term)),
            }
        };

        let head = render_atom(&self.head)?;
        let mut items = self
            .body
            .iter()
            .map(render_atom)
            .collect::<DictionaryResult<Vec<_>>>()?;
        for builtin in &self.builtins {
            items.push(match builtin {
                Builtin::Filter(expression) => format!("FILTER({})", expression.render(&mut render_operand)?),
                Builtin::Bind { expression, variable } => format!(
                    "BIND({} AS ?{})",
                    expression.render(&mut render_operand)?,
                    self.variable_names[*variable]
                ),
            });
        }
        if items.is_empty() {
            return Ok(format!("{} :- .", head));
        }
        Ok(format!("{} :- {} .", head, items.join(", ")))
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.body == other.body && self.builtins == other.builtins
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.head.hash(state);
        self.body.hash(state);
        self.builtins.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let term = |t: PatternTerm| match t {
            PatternTerm::Variable(v) => format!("?{}", self.variable_names[v]),
            PatternTerm::Constant(id) => id.to_string(),
        };
        let atom = |a: &TriplePattern| {
            format!("[{}, {}, {}]", term(a.subject), term(a.predicate), term(a.object))
        };
        let mut operand = |o: &Operand| {
            Ok::<_, fmt::Error>(match o {
                Operand::Variable(v) => format!("?{}", self.variable_names[*v]),
                Operand::Resource(id) => id.to_string(),
                Operand::Term(term) => term.to_string(),
            })
        };
        let mut body: Vec<String> = self.body.iter().map(atom).collect();
        for builtin in &self.builtins {
            body.push(match builtin {
                Builtin::Filter(expression) => format!("FILTER({})", expression.render(&mut operand)?),
                Builtin::Bind { expression, variable } => format!(
                    "BIND({} AS ?{})",
                    expression.render(&mut operand)?,
                    self.variable_names[*variable]
                ),
            });
        }
        write!(f, "{} :- {} .", atom(&self.head), body.join(", "))
    }
}
