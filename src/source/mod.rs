//! The event source seam.
//!
//! An [`EventSource`] decodes a replay exactly once, front to back, and
//! hands each record of a subscribed kind to a single handler. It cannot
//! rewind: every query that needs to observe the stream again opens a fresh
//! source through a [`SourceOpener`].
//!
//! Two sources ship with the crate:
//!
//! - [`Recording`] / [`RecordedSource`] - an in-memory record sequence
//! - [`DumpOpener`] / [`DumpSource`] - a JSON-lines record dump, optionally
//!   gzip-compressed
//!
//! # Example
//!
//! ```
//! use std::ops::ControlFlow;
//! use replay_extract::source::{KindSet, Recording, SourceOpener};
//!
//! let recording = Recording::new()
//!     .table(10, "CombatLogNames", 1, "npc_dota_hero_axe");
//! let mut source = recording.open().unwrap();
//!
//! let mut seen = 0;
//! source.start(KindSet::ALL, &mut |_record| {
//!     seen += 1;
//!     ControlFlow::Continue(())
//! }).unwrap();
//!
//! assert_eq!(seen, 1);
//! assert_eq!(source.tick(), 10);
//! assert_eq!(source.lookup_string("CombatLogNames", 1).as_deref(), Some("npc_dota_hero_axe"));
//! ```

pub mod dump;
pub mod record;
pub mod recorded;

use std::ops::ControlFlow;

use crate::error::Result;

pub use dump::{DumpOpener, DumpSource};
pub use record::{
    CombatLogRecord, CreateStringTable, EntityEvent, EntityHandle, EntityOp, EventRecord,
    FileHeader, FileInfo, GameEventDescriptor, GameEventKey, GameEventKeyDescriptor,
    GameEventList, GameEventRecord, HeroSelect, KindSet, ModifierRecord, Payload, PlayerInfo,
    ProjectileRecord, PropMap, PropValue, ProtocolMessage, Record, RecordKind, ServerInfo,
    TableEntry, INVALID_HANDLE,
};
pub use recorded::{RecordedSource, Recording};

/// Handler invoked once per delivered record.
///
/// Returning [`ControlFlow::Break`] stops the traversal early; the source
/// then returns `Ok(())` from [`EventSource::start`].
pub type Handler<'a> = dyn FnMut(&Record) -> ControlFlow<()> + 'a;

/// A forward-only, single-use decoder of replay records.
pub trait EventSource: Send {
    /// Drives the traversal, delivering every record whose kind is in
    /// `kinds` to `handler` in stream order.
    ///
    /// # Errors
    ///
    /// - `ExtractError::Source` if decoding fails part way through
    /// - `ExtractError::SourceReused` if the source was already started
    fn start(&mut self, kinds: KindSet, handler: &mut Handler<'_>) -> Result<()>;

    /// Tick of the most recently decoded record.
    fn tick(&self) -> u32;

    /// Network tick of the most recently decoded record.
    fn net_tick(&self) -> u32;

    /// Looks up a string table key by index, as of the current position.
    fn lookup_string(&self, table: &str, index: u32) -> Option<String>;
}

/// Opens fresh sources positioned at the start of the same replay.
pub trait SourceOpener {
    /// Opens a new source.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying replay cannot be opened.
    fn open(&self) -> Result<Box<dyn EventSource>>;
}

impl<F> SourceOpener for F
where
    F: Fn() -> Result<Box<dyn EventSource>>,
{
    fn open(&self) -> Result<Box<dyn EventSource>> {
        self()
    }
}
