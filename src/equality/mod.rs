//! Equality manager
//!
//! Arena-indexed union-find over resource IDs. Trees are balanced by size;
//! each tree root separately records the class representative, so the
//! representative policy does not constrain the tree shape. Members of a
//! class form a circular list for expansion.
//!
//! Representative policy: the lowest-ID member that is not a blank node,
//! or the lowest ID when every member is a blank node. The policy is a total
//! order on members, so the outcome does not depend on merge order.

use crate::rdf::{ResourceId, Triple};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How owl:sameAs is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EqualityMode {
    /// owl:sameAs is an ordinary predicate
    #[default]
    #[serde(rename = "off")]
    Off,
    /// owl:sameAs merges equivalence classes
    #[serde(rename = "noUNA")]
    NoUna,
    /// As `NoUna`; merging two distinct IRIs is a clash
    #[serde(rename = "UNA")]
    Una,
}

impl EqualityMode {
    pub fn is_enabled(self) -> bool {
        self != EqualityMode::Off
    }
}

impl FromStr for EqualityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(EqualityMode::Off),
            "nouna" => Ok(EqualityMode::NoUna),
            "una" => Ok(EqualityMode::Una),
            other => Err(format!("unknown equality mode '{}'", other)),
        }
    }
}

impl fmt::Display for EqualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EqualityMode::Off => "off",
            EqualityMode::NoUna => "noUNA",
            EqualityMode::Una => "UNA",
        })
    }
}

/// Outcome of a merge that joined two distinct classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Merge {
    /// Representative of the merged class
    pub representative: ResourceId,
    /// Former representative that lost its status
    pub absorbed: ResourceId,
}

/// Union-find over resource IDs. IDs beyond the arena are singletons.
#[derive(Debug, Clone, Default)]
pub struct EqualityManager {
    parent: Vec<usize>,
    /// Class size, valid at tree roots
    size: Vec<usize>,
    /// Class representative, valid at tree roots
    representative: Vec<ResourceId>,
    /// Next member in the class's circular list
    next: Vec<usize>,
    merges: usize,
}

impl EqualityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every class to a singleton
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of successful merges this epoch
    pub fn merge_count(&self) -> usize {
        self.merges
    }

    fn ensure(&mut self, id: ResourceId) {
        let needed = id.index() + 1;
        for slot in self.parent.len()..needed {
            self.parent.push(slot);
            self.size.push(1);
            self.representative.push(ResourceId(slot as u64));
            self.next.push(slot);
        }
    }

    fn root(&self, id: ResourceId) -> Option<usize> {
        let mut node = id.index();
        if node >= self.parent.len() {
            return None;
        }
        while self.parent[node] != node {
            node = self.parent[node];
        }
        Some(node)
    }

    fn root_compressing(&mut self, id: ResourceId) -> usize {
        self.ensure(id);
        let mut node = id.index();
        while self.parent[node] != node {
            let grandparent = self.parent[self.parent[node]];
            self.parent[node] = grandparent;
            node = grandparent;
        }
        node
    }

    /// Canonical member of the class of `id`
    #[inline]
    pub fn representative_of(&self, id: ResourceId) -> ResourceId {
        match self.root(id) {
            Some(root) => self.representative[root],
            None => id,
        }
    }

    pub fn is_representative(&self, id: ResourceId) -> bool {
        self.representative_of(id) == id
    }

    pub fn are_equal(&self, a: ResourceId, b: ResourceId) -> bool {
        self.representative_of(a) == self.representative_of(b)
    }

    /// Replace every position by its representative
    #[inline]
    pub fn normalize(&self, triple: Triple) -> Triple {
        if self.merges == 0 {
            return triple;
        }
        Triple::new(
            self.representative_of(triple.subject),
            self.representative_of(triple.predicate),
            self.representative_of(triple.object),
        )
    }

    pub fn class_size(&self, id: ResourceId) -> usize {
        match self.root(id) {
            Some(root) => self.size[root],
            None => 1,
        }
    }

    /// All members of the class of `id`, starting with `id`
    pub fn class_members(&self, id: ResourceId) -> Vec<ResourceId> {
        if id.index() >= self.next.len() {
            return vec![id];
        }
        let start = id.index();
        let mut members = vec![id];
        let mut node = self.next[start];
        while node != start {
            members.push(ResourceId(node as u64));
            node = self.next[node];
        }
        members
    }

    /// Merge with the default policy, treating no ID as a blank node
    pub fn merge(&mut self, a: ResourceId, b: ResourceId) -> Option<Merge> {
        self.merge_by(a, b, |_| false)
    }

    /// Union the classes of `a` and `b`.
    ///
    /// `is_blank` is consulted for the two current representatives only.
    /// Returns `None` if they were already equal.
    pub fn merge_by(
        &mut self,
        a: ResourceId,
        b: ResourceId,
        is_blank: impl Fn(ResourceId) -> bool,
    ) -> Option<Merge> {
        let root_a = self.root_compressing(a);
        let root_b = self.root_compressing(b);
        if root_a == root_b {
            return None;
        }

        let rep_a = self.representative[root_a];
        let rep_b = self.representative[root_b];
        let a_wins = match (is_blank(rep_a), is_blank(rep_b)) {
            (false, true) => true,
            (true, false) => false,
            _ => rep_a < rep_b,
        };
        let (winner, loser) = if a_wins { (rep_a, rep_b) } else { (rep_b, rep_a) };

        let (big, small) = if self.size[root_a] >= self.size[root_b] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.representative[big] = winner;

        // Splicing two circular lists: swap the successors of one node in each
        self.next.swap(root_a, root_b);

        self.merges += 1;
        Some(Merge {
            representative: winner,
            absorbed: loser,
        })
    }
}
