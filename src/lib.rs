//! # Replay Extract
//!
//! Structured data extraction over forward-only game replay event streams.
//!
//! A replay decoder yields a strictly sequential stream of records: entity
//! deltas, protocol messages and string table updates. It cannot rewind.
//! This library builds random-access-like queries on top of it:
//!
//! - **Single-pass parse**: many independent collectors share one traversal
//! - **Entity reconstruction**: deltas are folded into point-in-time state
//!   with hero/player linkage and decoded world positions
//! - **Keyframe index and seek**: sparse checkpoints, snapshots and range
//!   queries by replaying from the start
//! - **Streaming**: one traversal on a background thread, pulled through a
//!   bounded queue
//!
//! ## Quick Start
//!
//! ```
//! use replay_extract::collectors::CombatLogConfig;
//! use replay_extract::config::ParseConfig;
//! use replay_extract::error::Result;
//! use replay_extract::source::{CombatLogRecord, Payload, Recording};
//!
//! fn run() -> Result<()> {
//!     let recording = Recording::new()
//!         .message(10, Payload::CombatLog(CombatLogRecord {
//!             attacker_name: 5,
//!             ..CombatLogRecord::default()
//!         }))
//!         .table(50, "CombatLogNames", 5, "npc_dota_hero_axe");
//!
//!     let config = ParseConfig {
//!         combat_log: Some(CombatLogConfig::default()),
//!         ..ParseConfig::default()
//!     };
//!     let result = replay_extract::parse(&recording, &config)?;
//!
//!     let log = result.combat_log.unwrap();
//!     // Names are resolved after the traversal, so the later table entry
//!     // still applies.
//!     assert_eq!(log.entries[0].attacker_name, "npc_dota_hero_axe");
//!     Ok(())
//! }
//! # run().unwrap();
//! ```
//!
//! ## Module Overview
//!
//! - [`error`] - Error types and result alias
//! - [`source`] - The event source seam, records, and bundled sources
//! - [`format`] - Record dump encoding detection
//! - [`names`] - Deferred string table resolution
//! - [`time`] - Tick, game time and world coordinate conversions
//! - [`entities`] - Entity state reconstruction and hero snapshots
//! - [`collectors`] - The collectors a parse can run
//! - [`config`] - Request configuration and validation
//! - [`session`] - The single-pass parse session
//! - [`index`] - Keyframe index, snapshot and range queries
//! - [`stream`] - Background streaming sessions
//!
//! ## Time Reference
//!
//! The server runs at 30 ticks per second. Game time is measured from the
//! match start (the horn), so it is negative during the pre-game phase and
//! reported as 0.0 when the start was never observed.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collectors;
pub mod config;
pub mod entities;
pub mod error;
pub mod format;
pub mod index;
pub mod names;
pub mod session;
pub mod source;
pub mod stream;
pub mod time;

// Re-export commonly used types at the crate root
pub use config::{ParseConfig, RangeConfig, SnapshotConfig, StreamConfig};
pub use entities::{EntitySnapshot, HeroSnapshot, Reconstructor};
pub use error::{ExtractError, Result};
pub use index::{
    build_index, find_keyframe, range_query, snapshot_at, Keyframe, KeyframeIndex, KeyframeMatch,
    RangeResult,
};
pub use session::{parse, ParseResult, ParseSession};
pub use source::{DumpOpener, EventSource, Recording, SourceOpener};
pub use stream::{StreamEvent, StreamPoll, StreamSession, StreamState};
