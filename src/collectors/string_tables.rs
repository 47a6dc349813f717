//! String table contents as they stand at the end of the stream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{EventRecord, KindSet, Payload, Record, RecordKind, TableEntry};

/// String table collector options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringTablesConfig {
    /// Tables to capture; empty captures every table.
    pub table_names: Vec<String>,
    /// Include entry values alongside keys.
    pub include_values: bool,
    /// Maximum distinct entries per table; 0 is unbounded.
    pub max_entries: usize,
}

/// One string table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringTableData {
    /// Table the entry belongs to.
    pub table_name: String,
    /// Entry index.
    pub index: u32,
    /// Entry key.
    pub key: String,
    /// Entry value, when values were requested and present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Captured string tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StringTablesResult {
    /// Entries grouped by table, in index order.
    pub tables: BTreeMap<String, Vec<StringTableData>>,
    /// Captured table names, in the order they first appeared.
    pub table_names: Vec<String>,
    /// Number of entries across all tables.
    pub total_entries: usize,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug)]
pub(crate) struct StringTablesCollector {
    config: StringTablesConfig,
    tables: BTreeMap<String, BTreeMap<u32, StringTableData>>,
    order: Vec<String>,
}

impl StringTablesCollector {
    pub fn new(config: &StringTablesConfig) -> Self {
        Self {
            config: config.clone(),
            tables: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    fn wants(&self, table: &str) -> bool {
        self.config.table_names.is_empty() || self.config.table_names.iter().any(|t| t == table)
    }

    fn table_mut(&mut self, name: &str) -> &mut BTreeMap<u32, StringTableData> {
        if !self.tables.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.tables.entry(name.to_string()).or_default()
    }

    fn add(&mut self, entry: &TableEntry) {
        let limit = self.config.max_entries;
        let value = if self.config.include_values {
            entry.value.clone()
        } else {
            None
        };
        let table = self.table_mut(&entry.table);
        if limit != 0 && table.len() >= limit && !table.contains_key(&entry.index) {
            return;
        }
        table.insert(
            entry.index,
            StringTableData {
                table_name: entry.table.clone(),
                index: entry.index,
                key: entry.key.clone(),
                value,
            },
        );
    }
}

impl Collect for StringTablesCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::Table, RecordKind::CreateStringTable]);
    type Output = StringTablesResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        match &record.event {
            EventRecord::Table(entry) if self.wants(&entry.table) => self.add(entry),
            EventRecord::Message(msg) => {
                if let Payload::CreateStringTable(created) = &msg.payload {
                    if self.wants(&created.name) {
                        self.table_mut(&created.name);
                    }
                }
            }
            _ => {}
        }
    }

    fn finalize(self, _ctx: &FinalizeContext<'_>) -> StringTablesResult {
        let tables: BTreeMap<String, Vec<StringTableData>> = self
            .tables
            .into_iter()
            .map(|(name, entries)| (name, entries.into_values().collect()))
            .collect();
        StringTablesResult {
            total_entries: tables.values().map(Vec::len).sum(),
            tables,
            table_names: self.order,
            status: CollectorStatus::ok(),
        }
    }
}
