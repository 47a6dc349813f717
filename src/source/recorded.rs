//! In-memory event source.
//!
//! [`Recording`] holds an already-decoded record sequence and acts as a
//! [`SourceOpener`]; every [`Recording::open`] yields an independent
//! [`RecordedSource`] positioned at the first record. Clones share the
//! record buffer and a traversal counter, which makes the recording usable
//! as a probe for how many times a query actually walked the stream.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::record::{
    EntityEvent, EntityHandle, EntityOp, EventRecord, Payload, PropMap, ProtocolMessage, Record,
    TableEntry,
};
use super::{EventSource, Handler, KindSet, SourceOpener};
use crate::error::{ExtractError, Result};

/// String tables keyed by table name, then entry index.
type Tables = HashMap<String, HashMap<u32, String>>;

/// An injected decode failure.
#[derive(Debug, Clone)]
struct Failure {
    after: usize,
    reason: String,
}

/// A reusable, cheaply cloneable record sequence.
///
/// # Example
///
/// ```
/// use replay_extract::source::{EntityHandle, EntityOp, Recording, SourceOpener};
///
/// let recording = Recording::new()
///     .entity(1, EntityHandle::from_parts(3, 1), "CDOTAGamerulesProxy", EntityOp::Created, [])
///     .entity(2, EntityHandle::from_parts(3, 1), "CDOTAGamerulesProxy", EntityOp::Updated,
///         [("m_pGameRules.m_flGameStartTime", 95.0_f32.into())]);
///
/// assert_eq!(recording.len(), 2);
/// let _source = recording.open().unwrap();
/// assert_eq!(recording.traversals(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Recording {
    records: Arc<Vec<Record>>,
    preloaded: Arc<Tables>,
    failure: Option<Failure>,
    traversals: Arc<AtomicUsize>,
}

impl Recording {
    /// Creates an empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording from an existing record sequence.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records: Arc::new(records),
            ..Self::default()
        }
    }

    /// Appends a record.
    #[must_use]
    pub fn push(mut self, record: Record) -> Self {
        Arc::make_mut(&mut self.records).push(record);
        self
    }

    /// Appends an entity op.
    #[must_use]
    pub fn entity<'a>(
        self,
        tick: u32,
        handle: EntityHandle,
        class_name: &str,
        op: EntityOp,
        deltas: impl IntoIterator<Item = (&'a str, super::PropValue)>,
    ) -> Self {
        let deltas: PropMap = deltas
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self.push(Record::new(
            tick,
            EventRecord::Entity(EntityEvent {
                handle,
                class_name: class_name.to_string(),
                op,
                deltas,
            }),
        ))
    }

    /// Appends a protocol message under its canonical type name.
    #[must_use]
    pub fn message(self, tick: u32, payload: Payload) -> Self {
        self.push(Record::new(
            tick,
            EventRecord::Message(ProtocolMessage::new(payload)),
        ))
    }

    /// Appends a string table update.
    #[must_use]
    pub fn table(self, tick: u32, table: &str, index: u32, key: &str) -> Self {
        self.push(Record::new(
            tick,
            EventRecord::Table(TableEntry {
                table: table.to_string(),
                index,
                key: key.to_string(),
                value: None,
            }),
        ))
    }

    /// Adds a string table entry that every opened source knows from the
    /// start, without a corresponding record in the stream.
    #[must_use]
    pub fn with_table_entry(mut self, table: &str, index: u32, key: &str) -> Self {
        Arc::make_mut(&mut self.preloaded)
            .entry(table.to_string())
            .or_default()
            .insert(index, key.to_string());
        self
    }

    /// Makes every traversal fail after delivering `after` records.
    #[must_use]
    pub fn fail_after(mut self, after: usize, reason: &str) -> Self {
        self.failure = Some(Failure {
            after,
            reason: reason.to_string(),
        });
        self
    }

    /// Number of records in the recording.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the recording has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records, in stream order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of traversals started on sources opened from this recording
    /// or any of its clones.
    #[must_use]
    pub fn traversals(&self) -> usize {
        self.traversals.load(Ordering::SeqCst)
    }
}

impl SourceOpener for Recording {
    fn open(&self) -> Result<Box<dyn EventSource>> {
        Ok(Box::new(RecordedSource {
            records: Arc::clone(&self.records),
            tables: (*self.preloaded).clone(),
            failure: self.failure.clone(),
            traversals: Arc::clone(&self.traversals),
            started: false,
            tick: 0,
            net_tick: 0,
        }))
    }
}

/// A single-use source over a [`Recording`].
#[derive(Debug)]
pub struct RecordedSource {
    records: Arc<Vec<Record>>,
    tables: Tables,
    failure: Option<Failure>,
    traversals: Arc<AtomicUsize>,
    started: bool,
    tick: u32,
    net_tick: u32,
}

impl EventSource for RecordedSource {
    fn start(&mut self, kinds: KindSet, handler: &mut Handler<'_>) -> Result<()> {
        if self.started {
            return Err(ExtractError::SourceReused);
        }
        self.started = true;
        self.traversals.fetch_add(1, Ordering::SeqCst);

        let records = Arc::clone(&self.records);
        for (position, record) in records.iter().enumerate() {
            if let Some(failure) = &self.failure {
                if position == failure.after {
                    return Err(ExtractError::source(self.tick, failure.reason.clone()));
                }
            }

            self.tick = record.tick;
            self.net_tick = record.net_tick;
            if let EventRecord::Table(entry) = &record.event {
                self.tables
                    .entry(entry.table.clone())
                    .or_default()
                    .insert(entry.index, entry.key.clone());
            }

            if kinds.contains(record.kind()) && handler(record).is_break() {
                return Ok(());
            }
        }

        if let Some(failure) = &self.failure {
            if failure.after >= records.len() {
                return Err(ExtractError::source(self.tick, failure.reason.clone()));
            }
        }
        Ok(())
    }

    fn tick(&self) -> u32 {
        self.tick
    }

    fn net_tick(&self) -> u32 {
        self.net_tick
    }

    fn lookup_string(&self, table: &str, index: u32) -> Option<String> {
        self.tables.get(table)?.get(&index).cloned()
    }
}
