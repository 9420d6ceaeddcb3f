//! Triple patterns shared by rule bodies and queries

use crate::rdf::{ResourceId, Triple};

/// Lookup key: bound positions are `Some`
pub type TripleKey = [Option<ResourceId>; 3];

/// One position of a triple pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    /// Index into a binding vector
    Variable(usize),
    Constant(ResourceId),
}

impl PatternTerm {
    #[inline]
    fn value(&self, bindings: &[Option<ResourceId>]) -> Option<ResourceId> {
        match *self {
            PatternTerm::Variable(v) => bindings[v],
            PatternTerm::Constant(id) => Some(id),
        }
    }

    pub fn variable(&self) -> Option<usize> {
        match *self {
            PatternTerm::Variable(v) => Some(v),
            PatternTerm::Constant(_) => None,
        }
    }
}

/// (subject, predicate, object) pattern over variables and constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn terms(&self) -> [PatternTerm; 3] {
        [self.subject, self.predicate, self.object]
    }

    pub fn variables(&self) -> impl Iterator<Item = usize> {
        self.terms().into_iter().filter_map(|t| t.variable())
    }

    pub fn constants(&self) -> impl Iterator<Item = ResourceId> {
        self.terms().into_iter().filter_map(|t| match t {
            PatternTerm::Constant(id) => Some(id),
            PatternTerm::Variable(_) => None,
        })
    }

    /// Rewrite constants through `f`, leaving variables alone
    pub fn map_constants(&self, mut f: impl FnMut(ResourceId) -> ResourceId) -> Self {
        let mut map = |term: PatternTerm| match term {
            PatternTerm::Constant(id) => PatternTerm::Constant(f(id)),
            variable => variable,
        };
        Self::new(map(self.subject), map(self.predicate), map(self.object))
    }

    /// Index lookup key under the current bindings
    #[inline]
    pub fn key(&self, bindings: &[Option<ResourceId>]) -> TripleKey {
        [
            self.subject.value(bindings),
            self.predicate.value(bindings),
            self.object.value(bindings),
        ]
    }

    /// Number of positions that are constants or bound variables
    pub fn bound_positions(&self, bound: &[bool]) -> usize {
        self.terms()
            .iter()
            .filter(|t| match t {
                PatternTerm::Constant(_) => true,
                PatternTerm::Variable(v) => bound[*v],
            })
            .count()
    }

    /// Bind the pattern's unbound variables to `triple`.
    ///
    /// Returns the bitmask of positions whose variable got bound, or `None`
    /// if the triple does not match; on `None` the bindings are unchanged.
    #[inline]
    pub fn bind(&self, triple: &Triple, bindings: &mut [Option<ResourceId>]) -> Option<u8> {
        let mut mask = 0u8;
        for (position, (term, value)) in self.terms().iter().zip(triple.to_array()).enumerate() {
            let ok = match *term {
                PatternTerm::Constant(id) => id == value,
                PatternTerm::Variable(v) => match bindings[v] {
                    Some(bound) => bound == value,
                    None => {
                        bindings[v] = Some(value);
                        mask |= 1 << position;
                        true
                    }
                },
            };
            if !ok {
                self.unbind(mask, bindings);
                return None;
            }
        }
        Some(mask)
    }

    /// Undo a successful [`bind`](Self::bind)
    #[inline]
    pub fn unbind(&self, mask: u8, bindings: &mut [Option<ResourceId>]) {
        for (position, term) in self.terms().iter().enumerate() {
            if mask & (1 << position) != 0 {
                if let PatternTerm::Variable(v) = term {
                    bindings[*v] = None;
                }
            }
        }
    }

    /// Instantiate under complete bindings
    pub fn instantiate(&self, bindings: &[Option<ResourceId>]) -> Option<Triple> {
        Some(Triple::new(
            self.subject.value(bindings)?,
            self.predicate.value(bindings)?,
            self.object.value(bindings)?,
        ))
    }
}

/// Greedy join order: repeatedly pick the pattern with the most bound
/// positions, breaking ties by original position.
///
/// `bound` holds the variables bound before the first pattern runs and is
/// updated with every variable the chosen patterns bind.
pub fn order_by_boundness(
    patterns: &[TriplePattern],
    candidates: &[usize],
    bound: &mut [bool],
) -> Vec<usize> {
    let mut remaining: Vec<usize> = candidates.to_vec();
    let mut order = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let (slot, _) = remaining
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                patterns[**a]
                    .bound_positions(bound)
                    .cmp(&patterns[**b].bound_positions(bound))
                    .then(ib.cmp(ia))
            })
            .unwrap_or((0, &remaining[0]));
        let chosen = remaining.remove(slot);
        for v in patterns[chosen].variables() {
            bound[v] = true;
        }
        order.push(chosen);
    }
    order
}
