//! Facts about the traversal itself.

use serde::{Deserialize, Serialize};

use super::header::game_build_from_directory;
use super::{Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{EventRecord, KindSet, Payload, Record, RecordKind};

/// Parser info collector options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserInfoConfig {
    /// Whether parser info is collected.
    pub enabled: bool,
}

impl Default for ParserInfoConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Build, final position, tables and entity count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParserInfoResult {
    /// Game build from the server's game directory, 0 if unknown.
    pub game_build: u32,
    /// Network protocol announced by the server.
    pub protocol: i32,
    /// Final tick.
    pub tick: u32,
    /// Final network tick.
    pub net_tick: u32,
    /// Names of created string tables, in creation order.
    pub string_tables: Vec<String>,
    /// Entities alive at the end of the stream.
    pub entity_count: usize,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug, Default)]
pub(crate) struct ParserInfoCollector {
    game_build: u32,
    protocol: i32,
    string_tables: Vec<String>,
}

impl ParserInfoCollector {
    pub fn new(_config: &ParserInfoConfig) -> Self {
        Self::default()
    }
}

impl Collect for ParserInfoCollector {
    // Entity ops are read only so the live entity count is maintained.
    const KINDS: KindSet = KindSet::of(&[
        RecordKind::ServerInfo,
        RecordKind::CreateStringTable,
        RecordKind::Entity,
    ]);
    type Output = ParserInfoResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        let EventRecord::Message(msg) = &record.event else {
            return;
        };
        match &msg.payload {
            Payload::ServerInfo(info) => {
                self.game_build = game_build_from_directory(&info.game_dir);
                self.protocol = info.protocol;
            }
            Payload::CreateStringTable(table) => self.string_tables.push(table.name.clone()),
            _ => {}
        }
    }

    fn finalize(self, ctx: &FinalizeContext<'_>) -> ParserInfoResult {
        ParserInfoResult {
            game_build: self.game_build,
            protocol: self.protocol,
            tick: ctx.tick,
            net_tick: ctx.net_tick,
            string_tables: self.string_tables,
            entity_count: ctx.entities.store().len(),
            status: CollectorStatus::ok(),
        }
    }
}
