//! Active rule set with staged additions and deletions

use super::rule::Rule;
use indexmap::IndexSet;
use std::sync::Arc;

/// Rules activated and retired by one commit
#[derive(Debug, Clone, Default)]
pub struct ProgramChange {
    pub added: Vec<Arc<Rule>>,
    pub deleted: Vec<Arc<Rule>>,
}

impl ProgramChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Rules changes staged for the next materialization
#[derive(Debug, Clone, Default)]
pub struct RuleProgram {
    active: IndexSet<Arc<Rule>>,
    staged_additions: IndexSet<Arc<Rule>>,
    staged_deletions: IndexSet<Arc<Rule>>,
}

impl RuleProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a rule for addition; `false` if it is already active or staged
    pub fn schedule_addition(&mut self, rule: Rule) -> bool {
        let rule = Arc::new(rule);
        if self.staged_deletions.shift_remove(&rule) {
            return true;
        }
        if self.active.contains(&rule) {
            return false;
        }
        self.staged_additions.insert(rule)
    }

    /// Stage a rule for deletion; `false` if it is neither active nor staged
    pub fn schedule_deletion(&mut self, rule: Rule) -> bool {
        let rule = Arc::new(rule);
        if self.staged_additions.shift_remove(&rule) {
            return true;
        }
        if !self.active.contains(&rule) {
            return false;
        }
        self.staged_deletions.insert(rule)
    }

    pub fn has_staged_additions(&self) -> bool {
        !self.staged_additions.is_empty()
    }

    pub fn has_staged_deletions(&self) -> bool {
        !self.staged_deletions.is_empty()
    }

    /// Apply staged changes
    pub fn commit(&mut self) -> ProgramChange {
        let deleted: Vec<Arc<Rule>> = self.staged_deletions.drain(..).collect();
        for rule in &deleted {
            self.active.shift_remove(rule);
        }
        let added: Vec<Arc<Rule>> = self.staged_additions.drain(..).collect();
        for rule in &added {
            self.active.insert(Arc::clone(rule));
        }
        ProgramChange { added, deleted }
    }

    /// Active rules in insertion order
    pub fn active(&self) -> Vec<Arc<Rule>> {
        self.active.iter().cloned().collect()
    }

    /// Active rules followed by staged additions, minus staged deletions
    pub fn effective(&self) -> Vec<Arc<Rule>> {
        self.active
            .iter()
            .filter(|rule| !self.staged_deletions.contains(*rule))
            .chain(self.staged_additions.iter())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
        self.staged_additions.clear();
        self.staged_deletions.clear();
    }
}
