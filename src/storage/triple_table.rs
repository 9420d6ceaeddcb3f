//! Indexed triple table
//!
//! Implements:
//! - SPO index (Subject-Predicate-Object)
//! - POS index (Predicate-Object-Subject)
//! - OSP index (Object-Subject-Predicate)
//!
//! Every combination of bound positions is served from one of the three.

use super::pattern::TripleKey;
use crate::rdf::{ResourceId, Triple};
use rustc_hash::{FxHashMap, FxHashSet};

type Index = FxHashMap<ResourceId, FxHashMap<ResourceId, FxHashSet<ResourceId>>>;

/// Set of triples with SPO/POS/OSP indexes
#[derive(Debug, Clone, Default)]
pub struct TripleTable {
    /// All triples (primary storage)
    triples: FxHashSet<Triple>,

    /// Subject -> Predicate -> Objects
    spo: Index,

    /// Predicate -> Object -> Subjects
    pos: Index,

    /// Object -> Subject -> Predicates
    osp: Index,
}

fn index_insert(index: &mut Index, a: ResourceId, b: ResourceId, c: ResourceId) {
    index.entry(a).or_default().entry(b).or_default().insert(c);
}

fn index_remove(index: &mut Index, a: ResourceId, b: ResourceId, c: ResourceId) {
    if let Some(second) = index.get_mut(&a) {
        if let Some(third) = second.get_mut(&b) {
            third.remove(&c);
            if third.is_empty() {
                second.remove(&b);
            }
        }
        if second.is_empty() {
            index.remove(&a);
        }
    }
}

impl TripleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple, returning whether it was new
    pub fn insert(&mut self, triple: Triple) -> bool {
        if !self.triples.insert(triple) {
            return false;
        }
        let Triple {
            subject: s,
            predicate: p,
            object: o,
        } = triple;
        index_insert(&mut self.spo, s, p, o);
        index_insert(&mut self.pos, p, o, s);
        index_insert(&mut self.osp, o, s, p);
        true
    }

    /// Remove a triple, returning whether it was present
    pub fn remove(&mut self, triple: &Triple) -> bool {
        if !self.triples.remove(triple) {
            return false;
        }
        let &Triple {
            subject: s,
            predicate: p,
            object: o,
        } = triple;
        index_remove(&mut self.spo, s, p, o);
        index_remove(&mut self.pos, p, o, s);
        index_remove(&mut self.osp, o, s, p);
        true
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn clear(&mut self) {
        self.triples.clear();
        self.spo.clear();
        self.pos.clear();
        self.osp.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Visit every triple matching the key
    pub fn for_each_matching(&self, key: TripleKey, mut f: impl FnMut(Triple)) {
        match key {
            [Some(s), Some(p), Some(o)] => {
                let triple = Triple::new(s, p, o);
                if self.triples.contains(&triple) {
                    f(triple);
                }
            }
            [Some(s), Some(p), None] => {
                if let Some(objects) = self.spo.get(&s).and_then(|m| m.get(&p)) {
                    objects.iter().for_each(|&o| f(Triple::new(s, p, o)));
                }
            }
            [Some(s), None, Some(o)] => {
                if let Some(predicates) = self.osp.get(&o).and_then(|m| m.get(&s)) {
                    predicates.iter().for_each(|&p| f(Triple::new(s, p, o)));
                }
            }
            [Some(s), None, None] => {
                if let Some(by_predicate) = self.spo.get(&s) {
                    for (&p, objects) in by_predicate {
                        objects.iter().for_each(|&o| f(Triple::new(s, p, o)));
                    }
                }
            }
            [None, Some(p), Some(o)] => {
                if let Some(subjects) = self.pos.get(&p).and_then(|m| m.get(&o)) {
                    subjects.iter().for_each(|&s| f(Triple::new(s, p, o)));
                }
            }
            [None, Some(p), None] => {
                if let Some(by_object) = self.pos.get(&p) {
                    for (&o, subjects) in by_object {
                        subjects.iter().for_each(|&s| f(Triple::new(s, p, o)));
                    }
                }
            }
            [None, None, Some(o)] => {
                if let Some(by_subject) = self.osp.get(&o) {
                    for (&s, predicates) in by_subject {
                        predicates.iter().for_each(|&p| f(Triple::new(s, p, o)));
                    }
                }
            }
            [None, None, None] => self.triples.iter().for_each(|&t| f(t)),
        }
    }

    /// Collect the triples matching the key
    pub fn matching(&self, key: TripleKey) -> Vec<Triple> {
        let mut result = Vec::new();
        self.for_each_matching(key, |t| result.push(t));
        result
    }

    /// Every triple mentioning `id` in any position, without duplicates
    pub fn mentioning(&self, id: ResourceId) -> Vec<Triple> {
        let mut result: Vec<Triple> = Vec::new();
        self.for_each_matching([Some(id), None, None], |t| result.push(t));
        self.for_each_matching([None, Some(id), None], |t| {
            if t.subject != id {
                result.push(t)
            }
        });
        self.for_each_matching([None, None, Some(id)], |t| {
            if t.subject != id && t.predicate != id {
                result.push(t)
            }
        });
        result
    }
}

impl FromIterator<Triple> for TripleTable {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut table = TripleTable::new();
        for triple in iter {
            table.insert(triple);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: u64, p: u64, o: u64) -> Triple {
        Triple::new(ResourceId(s), ResourceId(p), ResourceId(o))
    }

    fn sample() -> TripleTable {
        [t(1, 10, 2), t(1, 10, 3), t(2, 10, 3), t(1, 11, 3), t(3, 11, 1)]
            .into_iter()
            .collect()
    }

    fn sorted(mut triples: Vec<Triple>) -> Vec<Triple> {
        triples.sort();
        triples
    }

    #[test]
    fn test_insert_is_set_semantics() {
        let mut table = TripleTable::new();
        assert!(table.insert(t(1, 2, 3)));
        assert!(!table.insert(t(1, 2, 3)));
        assert_eq!(table.len(), 1);
        assert!(table.contains(&t(1, 2, 3)));
    }

    #[test]
    fn test_matching_every_key_shape() {
        let table = sample();
        let id = |n| Some(ResourceId(n));

        assert_eq!(table.matching([id(1), id(10), id(2)]), vec![t(1, 10, 2)]);
        assert_eq!(
            sorted(table.matching([id(1), id(10), None])),
            vec![t(1, 10, 2), t(1, 10, 3)]
        );
        assert_eq!(
            sorted(table.matching([id(1), None, id(3)])),
            vec![t(1, 10, 3), t(1, 11, 3)]
        );
        assert_eq!(table.matching([id(1), None, None]).len(), 3);
        assert_eq!(
            sorted(table.matching([None, id(10), id(3)])),
            vec![t(1, 10, 3), t(2, 10, 3)]
        );
        assert_eq!(table.matching([None, id(11), None]).len(), 2);
        assert_eq!(table.matching([None, None, id(3)]).len(), 3);
        assert_eq!(table.matching([None, None, None]).len(), 5);
        assert!(table.matching([id(9), None, None]).is_empty());
    }

    #[test]
    fn test_remove_cleans_indexes() {
        let mut table = sample();
        assert!(table.remove(&t(3, 11, 1)));
        assert!(!table.remove(&t(3, 11, 1)));
        assert!(table.matching([Some(ResourceId(3)), None, None]).is_empty());
        assert_eq!(table.matching([None, Some(ResourceId(11)), None]), vec![t(1, 11, 3)]);
        assert!(table.osp.get(&ResourceId(1)).is_none());
    }

    #[test]
    fn test_mentioning_has_no_duplicates() {
        let mut table = sample();
        table.insert(t(1, 1, 1));
        let mentions = sorted(table.mentioning(ResourceId(1)));
        assert_eq!(
            mentions,
            vec![t(1, 1, 1), t(1, 10, 2), t(1, 10, 3), t(1, 11, 3), t(3, 11, 1)]
        );
    }
}
