//! The single-pass parse session.
//!
//! A [`ParseSession`] opens one source, subscribes to the union of the kinds
//! its enabled collectors read, and walks the stream exactly once. Entity
//! ops are folded into a shared [`Reconstructor`] and table updates into
//! shared [`NameTables`] before (or, for deletes, after) the collectors see
//! them. Once the traversal has finished every collector is finalized
//! against the end-of-stream state.
//!
//! # Example
//!
//! ```
//! use replay_extract::config::ParseConfig;
//! use replay_extract::collectors::StringTablesConfig;
//! use replay_extract::source::Recording;
//! use replay_extract::session::parse;
//!
//! let recording = Recording::new()
//!     .table(5, "CombatLogNames", 1, "npc_dota_hero_axe")
//!     .table(6, "CombatLogNames", 2, "npc_dota_hero_lina");
//!
//! let config = ParseConfig {
//!     string_tables: Some(StringTablesConfig::default()),
//!     ..ParseConfig::default()
//! };
//! let result = parse(&recording, &config).unwrap();
//!
//! assert!(result.success);
//! assert_eq!(result.string_tables.unwrap().total_entries, 2);
//! assert_eq!(recording.traversals(), 1);
//! ```

use std::ops::ControlFlow;

use serde::Serialize;

use crate::collectors::{
    AttacksResult, CombatLogResult, EntityDeathsResult, EntitySnapshotsResult, FinalizeContext,
    GameEventsResult, GameInfoResult, HeaderResult, MessagesResult, ModifiersResult,
    ParserInfoResult, Registry, StringTablesResult,
};
use crate::config::ParseConfig;
use crate::entities::Reconstructor;
use crate::error::{ExtractError, Result};
use crate::names::NameTables;
use crate::source::{EntityOp, EventRecord, Payload, Record, SourceOpener};
use crate::time::COMBAT_LOG_GAME_STATE;

/// Results of one parse, one optional section per collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct ParseResult {
    /// False if the traversal failed; every section is then absent.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_info: Option<GameInfoResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combat_log: Option<CombatLogResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntitySnapshotsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_events: Option<GameEventsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<ModifiersResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_tables: Option<StringTablesResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<MessagesResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_info: Option<ParserInfoResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attacks: Option<AttacksResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_deaths: Option<EntityDeathsResult>,
}

impl ParseResult {
    /// A failed parse carrying only the error message.
    #[must_use]
    pub fn failure(err: &ExtractError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// One parse request over one source.
pub struct ParseSession<'a> {
    opener: &'a dyn SourceOpener,
    config: ParseConfig,
}

impl std::fmt::Debug for ParseSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseSession")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> ParseSession<'a> {
    /// Creates a session that will open its source from `opener`.
    #[must_use]
    pub fn new(opener: &'a dyn SourceOpener, config: ParseConfig) -> Self {
        Self { opener, config }
    }

    /// Validates the config, then runs every enabled collector over one
    /// traversal.
    ///
    /// # Errors
    ///
    /// - `ExtractError::Config` if the config is rejected; the source is
    ///   not opened
    /// - any error from opening the source
    /// - `ExtractError::Source` if decoding fails; no partial results are
    ///   returned
    pub fn run(self) -> Result<ParseResult> {
        self.config.validate()?;

        let mut registry = Registry::from_config(&self.config);
        let kinds = registry.kinds();
        let mut source = self.opener.open()?;
        tracing::info!(collectors = registry.len(), kinds = kinds.len(), "parse started");

        let mut entities = Reconstructor::new();
        let mut tables = NameTables::new();
        let mut records = 0_u64;

        let outcome = source.start(kinds, &mut |record: &Record| {
            records += 1;
            match &record.event {
                EventRecord::Entity(event) if event.op == EntityOp::Deleted => {
                    registry.observe(&entities, record);
                    entities.apply(record.tick, event);
                }
                EventRecord::Entity(event) => {
                    entities.apply(record.tick, event);
                    registry.observe(&entities, record);
                }
                EventRecord::Table(entry) => {
                    tables.observe(entry);
                    registry.observe(&entities, record);
                }
                EventRecord::Message(msg) => {
                    if let Payload::CombatLog(entry) = &msg.payload {
                        if entry.log_type == COMBAT_LOG_GAME_STATE {
                            entities.observe_game_state(record.tick, entry.value, entry.timestamp);
                        }
                    }
                    registry.observe(&entities, record);
                }
            }
            ControlFlow::Continue(())
        });

        if let Err(err) = outcome {
            tracing::warn!(error = %err, records, "parse failed");
            return Err(err);
        }

        let ctx = FinalizeContext {
            names: tables.resolver(Some(source.as_ref())),
            entities: &entities,
            tick: source.tick(),
            net_tick: source.net_tick(),
        };
        let mut result = ParseResult {
            success: true,
            ..ParseResult::default()
        };
        registry.finalize(&ctx, &mut result);

        tracing::info!(
            records,
            tick = ctx.tick,
            game_start_tick = entities.clock().start_tick_or_zero(),
            "parse finished"
        );
        Ok(result)
    }
}

/// Runs a single-pass parse with `config` over a fresh source.
///
/// # Errors
///
/// See [`ParseSession::run`].
pub fn parse(opener: &dyn SourceOpener, config: &ParseConfig) -> Result<ParseResult> {
    ParseSession::new(opener, config.clone()).run()
}
