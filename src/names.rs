//! Deferred name resolution.
//!
//! Many records refer to strings by their index in a string table (combat
//! log entries name their attacker and target through `CombatLogNames`,
//! for instance). Tables grow while the stream is decoded, so a record can
//! reference an index before the entry that defines it has been seen.
//! [`NameTables`] therefore only accumulates entries during traversal;
//! lookups go through a [`NameResolver`] built once traversal has finished.
//!
//! # Example
//!
//! ```
//! use replay_extract::names::NameTables;
//!
//! let mut tables = NameTables::new();
//! tables.insert("CombatLogNames", 5, "npc_dota_hero_axe");
//!
//! let resolver = tables.resolver(None);
//! assert_eq!(resolver.name("CombatLogNames", 5), "npc_dota_hero_axe");
//! assert_eq!(resolver.name("CombatLogNames", 6), "unknown_6");
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::source::{EventSource, TableEntry};

/// Table holding the names referenced by combat log entries.
pub const COMBAT_LOG_NAMES: &str = "CombatLogNames";

/// Append-only string tables observed during a traversal.
#[derive(Debug, Clone, Default)]
pub struct NameTables {
    tables: BTreeMap<String, HashMap<u32, String>>,
}

impl NameTables {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry. A later entry for the same index replaces the
    /// earlier one, matching how the game rewrites table slots.
    pub fn insert(&mut self, table: &str, index: u32, key: &str) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(index, key.to_string());
    }

    /// Records a table update record.
    pub fn observe(&mut self, entry: &TableEntry) {
        self.insert(&entry.table, entry.index, &entry.key);
    }

    /// Names of all tables that received at least one entry.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Total number of entries across all tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    /// Returns true if no entry has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a resolver over the tables as they stand now.
    ///
    /// When `source` is given, indices missing from the observed tables are
    /// looked up in the source's own tables, which may hold entries that
    /// were never delivered as records.
    #[must_use]
    pub fn resolver<'a>(&'a self, source: Option<&'a dyn EventSource>) -> NameResolver<'a> {
        NameResolver {
            tables: self,
            source,
        }
    }

    fn get(&self, table: &str, index: u32) -> Option<&str> {
        self.tables.get(table)?.get(&index).map(String::as_str)
    }
}

/// Post-traversal lookup of table indices.
#[derive(Clone, Copy)]
pub struct NameResolver<'a> {
    tables: &'a NameTables,
    source: Option<&'a dyn EventSource>,
}

impl std::fmt::Debug for NameResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameResolver")
            .field("tables", &self.tables)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl NameResolver<'_> {
    /// Looks up an index, returning `None` if no table knows it.
    #[must_use]
    pub fn lookup(&self, table: &str, index: u32) -> Option<String> {
        if let Some(name) = self.tables.get(table, index) {
            return Some(name.to_string());
        }
        self.source?.lookup_string(table, index)
    }

    /// Looks up an index, substituting `unknown_<index>` when absent.
    #[must_use]
    pub fn name(&self, table: &str, index: u32) -> String {
        self.lookup(table, index)
            .unwrap_or_else(|| placeholder(index))
    }
}

/// Placeholder used for indices that never appeared in their table.
#[must_use]
pub fn placeholder(index: u32) -> String {
    format!("unknown_{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Recording, SourceOpener};

    #[test]
    fn test_insert_and_resolve() {
        let mut tables = NameTables::new();
        assert!(tables.is_empty());
        tables.insert(COMBAT_LOG_NAMES, 1, "npc_dota_hero_axe");
        tables.insert(COMBAT_LOG_NAMES, 1, "npc_dota_hero_lina");
        tables.insert("ModifierNames", 0, "modifier_stunned");

        assert_eq!(tables.len(), 2);
        assert_eq!(
            tables.table_names().collect::<Vec<_>>(),
            vec!["CombatLogNames", "ModifierNames"]
        );

        let resolver = tables.resolver(None);
        assert_eq!(resolver.name(COMBAT_LOG_NAMES, 1), "npc_dota_hero_lina");
        assert_eq!(resolver.lookup("ModifierNames", 1), None);
    }

    #[test]
    fn test_placeholder() {
        let tables = NameTables::new();
        assert_eq!(tables.resolver(None).name(COMBAT_LOG_NAMES, 42), "unknown_42");
    }

    #[test]
    fn test_falls_back_to_source_tables() {
        let recording = Recording::new().with_table_entry(COMBAT_LOG_NAMES, 9, "npc_dota_roshan");
        let source = recording.open().unwrap();

        let mut tables = NameTables::new();
        tables.insert(COMBAT_LOG_NAMES, 3, "npc_dota_hero_axe");
        let resolver = tables.resolver(Some(source.as_ref()));

        assert_eq!(resolver.name(COMBAT_LOG_NAMES, 3), "npc_dota_hero_axe");
        assert_eq!(resolver.name(COMBAT_LOG_NAMES, 9), "npc_dota_roshan");
        assert_eq!(resolver.name(COMBAT_LOG_NAMES, 10), "unknown_10");
    }
}
