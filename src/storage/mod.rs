//! Fact store
//!
//! Two indexed triple tables: the explicit (EDB) triples as asserted, and
//! the derived closure in representative form. The four provenance domains
//! are views over these two tables and the equality manager.

pub mod pattern;
mod triple_table;

pub use pattern::{order_by_boundness, PatternTerm, TripleKey, TriplePattern};
pub use triple_table::TripleTable;

use crate::equality::EqualityManager;
use crate::rdf::Triple;
use std::fmt;
use std::str::FromStr;

/// Provenance domain a count, membership test or query ranges over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryDomain {
    /// Explicitly asserted triples
    Edb,
    /// Full derived extension, including non-representative terms
    Idb,
    /// Derived triples collapsed to class representatives
    IdbRep,
    /// Representative triples that are not explicit
    IdbRepNoEdb,
}

impl QueryDomain {
    pub const ALL: [QueryDomain; 4] = [
        QueryDomain::Edb,
        QueryDomain::Idb,
        QueryDomain::IdbRep,
        QueryDomain::IdbRepNoEdb,
    ];
}

impl fmt::Display for QueryDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryDomain::Edb => "EDB",
            QueryDomain::Idb => "IDB",
            QueryDomain::IdbRep => "IDBrep",
            QueryDomain::IdbRepNoEdb => "IDBrepNoEDB",
        })
    }
}

impl FromStr for QueryDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "edb" => Ok(QueryDomain::Edb),
            "idb" => Ok(QueryDomain::Idb),
            "idbrep" => Ok(QueryDomain::IdbRep),
            "idbrepnoedb" => Ok(QueryDomain::IdbRepNoEdb),
            other => Err(format!("unknown query domain '{}'", other)),
        }
    }
}

/// Explicit and derived triples
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    edb: TripleTable,
    /// Derived closure, every triple in representative form
    idb: TripleTable,
    /// Representative triples added since the last materialization
    pending: Vec<Triple>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add explicit triples, returning how many were new to the EDB.
    ///
    /// Each new triple also enters the derived table in normalized form.
    pub fn add_explicit(&mut self, triples: &[Triple], equality: &EqualityManager) -> usize {
        let mut added = 0;
        for &triple in triples {
            if self.edb.insert(triple) {
                added += 1;
                let normalized = equality.normalize(triple);
                if self.idb.insert(normalized) {
                    self.pending.push(normalized);
                }
            }
        }
        added
    }

    /// Remove explicit triples; derived consequences stay until the next recomputation
    pub fn remove_explicit(&mut self, triples: &[Triple]) -> usize {
        triples.iter().filter(|t| self.edb.remove(t)).count()
    }

    pub fn count(&self, domain: QueryDomain, equality: &EqualityManager) -> usize {
        match domain {
            QueryDomain::Edb => self.edb.len(),
            QueryDomain::IdbRep => self.idb.len(),
            QueryDomain::IdbRepNoEdb => self.idb.iter().filter(|t| !self.edb.contains(t)).count(),
            QueryDomain::Idb => {
                if equality.merge_count() == 0 {
                    return self.idb.len();
                }
                self.idb
                    .iter()
                    .map(|t| {
                        equality.class_size(t.subject)
                            * equality.class_size(t.predicate)
                            * equality.class_size(t.object)
                    })
                    .sum()
            }
        }
    }

    pub fn contains(&self, triple: &Triple, domain: QueryDomain, equality: &EqualityManager) -> bool {
        match domain {
            QueryDomain::Edb => self.edb.contains(triple),
            QueryDomain::Idb => self.idb.contains(&equality.normalize(*triple)),
            QueryDomain::IdbRep => self.idb.contains(triple),
            QueryDomain::IdbRepNoEdb => self.idb.contains(triple) && !self.edb.contains(triple),
        }
    }

    pub fn edb(&self) -> &TripleTable {
        &self.edb
    }

    /// Derived table (representative form)
    pub fn idb(&self) -> &TripleTable {
        &self.idb
    }

    pub(crate) fn idb_mut(&mut self) -> &mut TripleTable {
        &mut self.idb
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Triple> {
        std::mem::take(&mut self.pending)
    }

    /// Rebuild the derived table from the EDB alone, for recomputation
    pub(crate) fn reset_derived(&mut self) {
        self.idb = self.edb.clone();
        self.pending.clear();
    }

    pub fn clear(&mut self) {
        self.edb.clear();
        self.idb.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::ResourceId;

    fn t(s: u64, p: u64, o: u64) -> Triple {
        Triple::new(ResourceId(s), ResourceId(p), ResourceId(o))
    }

    #[test]
    fn test_add_explicit_counts_new_triples() {
        let mut store = FactStore::new();
        let eq = EqualityManager::new();

        assert_eq!(store.add_explicit(&[t(1, 2, 3), t(1, 2, 3), t(3, 2, 1)], &eq), 2);
        assert_eq!(store.add_explicit(&[t(1, 2, 3)], &eq), 0);
        for domain in [QueryDomain::Edb, QueryDomain::Idb, QueryDomain::IdbRep] {
            assert_eq!(store.count(domain, &eq), 2);
        }
        assert_eq!(store.count(QueryDomain::IdbRepNoEdb, &eq), 0);
        assert_eq!(store.take_pending().len(), 2);
    }

    #[test]
    fn test_domains_under_equality() {
        let mut store = FactStore::new();
        let mut eq = EqualityManager::new();
        store.add_explicit(&[t(5, 9, 6)], &eq);

        // 5 = 7: the representative triple stands for two naive triples
        eq.merge(ResourceId(7), ResourceId(5));
        assert_eq!(store.count(QueryDomain::Idb, &eq), 2);
        assert_eq!(store.count(QueryDomain::IdbRep, &eq), 1);
        assert!(store.contains(&t(7, 9, 6), QueryDomain::Idb, &eq));
        assert!(!store.contains(&t(7, 9, 6), QueryDomain::IdbRep, &eq));
        assert!(!store.contains(&t(7, 9, 6), QueryDomain::Edb, &eq));

        store.idb_mut().insert(t(5, 9, 5));
        assert_eq!(store.count(QueryDomain::IdbRepNoEdb, &eq), 1);
        assert!(store.contains(&t(5, 9, 5), QueryDomain::IdbRepNoEdb, &eq));
    }

    #[test]
    fn test_reset_derived_keeps_edb() {
        let mut store = FactStore::new();
        let eq = EqualityManager::new();
        store.add_explicit(&[t(1, 2, 3)], &eq);
        store.idb_mut().insert(t(3, 2, 1));

        store.reset_derived();
        assert_eq!(store.count(QueryDomain::IdbRep, &eq), 1);
        assert!(!store.has_pending());

        assert_eq!(store.remove_explicit(&[t(1, 2, 3), t(9, 9, 9)]), 1);
        store.clear();
        assert_eq!(store.count(QueryDomain::Idb, &eq), 0);
    }
}
