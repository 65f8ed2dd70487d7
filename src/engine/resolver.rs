//! Snapshot-local to destination id mapping for one import run.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

use crate::snapshot::{LocalId, Table};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    destination: String,
    /// The destination row existed before this run.
    existing: bool,
}

/// Write-once map of `(table, local id) -> destination id`.
#[derive(Debug, Default)]
pub struct ReferenceResolver {
    entries: HashMap<(Table, LocalId), Entry>,
    skipped: HashSet<(Table, LocalId)>,
    completed: BTreeSet<Table>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a local id to a row inserted by this run.
    pub fn record(&mut self, table: Table, local: &LocalId, destination: impl Into<String>) -> bool {
        self.insert(table, local, destination.into(), false)
    }

    /// Map a local id to a row that was already in the destination.
    pub fn record_existing(
        &mut self,
        table: Table,
        local: &LocalId,
        destination: impl Into<String>,
    ) -> bool {
        self.insert(table, local, destination.into(), true)
    }

    fn insert(&mut self, table: Table, local: &LocalId, destination: String, existing: bool) -> bool {
        let key = (table, local.clone());
        if let Some(current) = self.entries.get(&key) {
            if current.destination != destination {
                warn!(
                    %table, local = %local, kept = %current.destination, ignored = %destination,
                    "local id mapped twice; keeping the first mapping"
                );
            }
            return false;
        }
        self.entries.insert(key, Entry { destination, existing });
        true
    }

    pub fn resolve(&self, table: Table, local: &LocalId) -> Option<&str> {
        self.entries
            .get(&(table, local.clone()))
            .map(|e| e.destination.as_str())
    }

    /// True when the local id resolved to a pre-existing destination row.
    pub fn was_matched(&self, table: Table, local: &LocalId) -> bool {
        self.entries
            .get(&(table, local.clone()))
            .is_some_and(|e| e.existing)
    }

    /// Remember a record that was deliberately not imported.
    pub fn mark_skipped(&mut self, table: Table, local: &LocalId) {
        self.skipped.insert((table, local.clone()));
    }

    pub fn is_skipped(&self, table: Table, local: &LocalId) -> bool {
        self.skipped.contains(&(table, local.clone()))
    }

    pub fn mark_completed(&mut self, table: Table) {
        self.completed.insert(table);
    }

    pub fn is_completed(&self, table: Table) -> bool {
        self.completed.contains(&table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
