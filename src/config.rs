//! Request configuration for every query the crate runs.
//!
//! All configs deserialize from JSON with every field optional: an absent
//! section disables its collector, and absent or zero limits mean
//! unbounded. Each config has a `validate` step that runs before any source
//! is opened.
//!
//! # Example
//!
//! ```
//! use replay_extract::config::ParseConfig;
//!
//! let config = ParseConfig::from_json(r#"{"combat_log": {"max_entries": 100}, "header": {}}"#).unwrap();
//! assert!(config.combat_log.is_some());
//! assert!(config.header.as_ref().unwrap().enabled);
//! assert!(config.entities.is_none());
//! ```

use serde::{Deserialize, Serialize};

use crate::collectors::{
    AttacksConfig, CombatLogConfig, EntityDeathsConfig, EntitySnapshotsConfig, GameEventsConfig,
    GameInfoConfig, HeaderConfig, MessagesConfig, ModifiersConfig, ParserInfoConfig,
    StringTablesConfig,
};
use crate::entities::{CaptureOptions, HERO_NAME_PREFIX};
use crate::error::{ExtractError, Result};
use crate::source::{KindSet, RecordKind};

/// Default cap on events emitted by a streaming session.
pub const DEFAULT_STREAM_MAX_EVENTS: usize = 1_000_000;

fn check_hero_names(field: &str, names: &[String]) -> Result<()> {
    match names.iter().find(|n| !n.starts_with(HERO_NAME_PREFIX)) {
        Some(bad) => Err(ExtractError::config(format!(
            "{field}: '{bad}' is not a {HERO_NAME_PREFIX}* name"
        ))),
        None => Ok(()),
    }
}

fn check_no_empty(field: &str, values: &[String]) -> Result<()> {
    if values.iter().any(String::is_empty) {
        return Err(ExtractError::config(format!("{field} contains an empty name")));
    }
    Ok(())
}

// ============================================================================
// Single-pass parse
// ============================================================================

/// Which collectors a parse runs, and how each is configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ParseConfig {
    pub header: Option<HeaderConfig>,
    pub game_info: Option<GameInfoConfig>,
    pub combat_log: Option<CombatLogConfig>,
    pub entities: Option<EntitySnapshotsConfig>,
    pub game_events: Option<GameEventsConfig>,
    pub modifiers: Option<ModifiersConfig>,
    pub string_tables: Option<StringTablesConfig>,
    pub messages: Option<MessagesConfig>,
    pub parser_info: Option<ParserInfoConfig>,
    pub attacks: Option<AttacksConfig>,
    pub entity_deaths: Option<EntityDeathsConfig>,
}

impl ParseConfig {
    /// Header, match info and parser info with default options.
    #[must_use]
    pub fn basic() -> Self {
        Self {
            header: Some(HeaderConfig::default()),
            game_info: Some(GameInfoConfig::default()),
            parser_info: Some(ParserInfoConfig::default()),
            ..Self::default()
        }
    }

    /// Parses a config from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Json` for malformed JSON and
    /// `ExtractError::Config` if the config is rejected by
    /// [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects contradictory or malformed options.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Config` naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if let Some(deaths) = &self.entity_deaths {
            if deaths.heroes_only && deaths.creeps_only {
                return Err(ExtractError::config(
                    "entity_deaths: heroes_only and creeps_only are exclusive",
                ));
            }
        }
        if let Some(modifiers) = &self.modifiers {
            if modifiers.auras_only && modifiers.debuffs_only {
                return Err(ExtractError::config(
                    "modifiers: auras_only and debuffs_only are exclusive",
                ));
            }
        }
        if let Some(entities) = &self.entities {
            if entities.interval_ticks == 0 && entities.target_ticks.is_empty() {
                return Err(ExtractError::config(
                    "entities: interval_ticks must be positive when no target_ticks are given",
                ));
            }
            check_hero_names("entities.target_heroes", &entities.target_heroes)?;
        }
        if let Some(tables) = &self.string_tables {
            check_no_empty("string_tables.table_names", &tables.table_names)?;
        }
        if let Some(events) = &self.game_events {
            check_no_empty("game_events.event_names", &events.event_names)?;
        }
        Ok(())
    }
}

// ============================================================================
// Seek queries
// ============================================================================

/// A point-in-time snapshot request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Tick to capture at.
    pub target_tick: u32,
    /// Include illusions and clones.
    pub include_illusions: bool,
    /// Include alive lane and neutral creeps.
    pub include_creeps: bool,
    /// Only report these heroes (`npc_dota_hero_*` names).
    pub target_heroes: Vec<String>,
}

impl SnapshotConfig {
    /// Rejects malformed hero names.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Config` for a hero name without the
    /// `npc_dota_hero_` prefix.
    pub fn validate(&self) -> Result<()> {
        check_hero_names("target_heroes", &self.target_heroes)
    }

    pub(crate) fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            include_illusions: self.include_illusions,
            include_creeps: self.include_creeps,
            target_heroes: self.target_heroes.clone(),
            raw_classes: Vec::new(),
        }
    }
}

/// A tick-range query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// First tick of the range, inclusive.
    pub start_tick: u32,
    /// Last tick of the range, inclusive.
    pub end_tick: u32,
    /// Buffer raw messages other than combat log entries.
    pub include_messages: bool,
    /// Maximum combat log entries and messages kept each; 0 is unbounded.
    pub max_events: usize,
}

impl RangeConfig {
    /// Rejects an inverted range.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Config` if `start_tick > end_tick`.
    pub fn validate(&self) -> Result<()> {
        if self.start_tick > self.end_tick {
            return Err(ExtractError::config(format!(
                "start_tick {} is after end_tick {}",
                self.start_tick, self.end_tick
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Streaming
// ============================================================================

/// What a streaming session emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Emit combat log entries.
    pub combat_log: bool,
    /// Emit entity ops.
    pub entities: bool,
    /// Emit every other protocol message.
    pub messages: bool,
    /// Emit game events.
    pub game_events: bool,
    /// Emit modifier entries.
    pub modifiers: bool,
    /// Emit only events whose type name contains one of these fragments;
    /// empty emits all.
    pub filter_types: Vec<String>,
    /// Stop after this many events; 0 is unbounded.
    pub max_events: usize,
    /// Emit at most one entity event per entity per this many ticks; 0
    /// emits every op.
    pub interval_tick: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            combat_log: false,
            entities: false,
            messages: false,
            game_events: false,
            modifiers: false,
            filter_types: Vec::new(),
            max_events: DEFAULT_STREAM_MAX_EVENTS,
            interval_tick: 0,
        }
    }
}

impl StreamConfig {
    /// Record kinds the session subscribes to.
    #[must_use]
    pub fn kinds(&self) -> KindSet {
        let mut kinds = KindSet::EMPTY;
        if self.combat_log {
            kinds.insert(RecordKind::CombatLog);
        }
        if self.entities {
            kinds.insert(RecordKind::Entity);
        }
        if self.messages {
            kinds = kinds.union(KindSet::MESSAGES);
        }
        if self.game_events {
            kinds.insert(RecordKind::GameEventList);
            kinds.insert(RecordKind::GameEvent);
        }
        if self.modifiers {
            kinds.insert(RecordKind::Modifier);
        }
        kinds
    }

    /// Rejects a session that would emit nothing.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Config` if no event kind is enabled or a
    /// filter fragment is empty.
    pub fn validate(&self) -> Result<()> {
        if self.kinds().is_empty() {
            return Err(ExtractError::config("stream: no event kinds enabled"));
        }
        check_no_empty("stream.filter_types", &self.filter_types)
    }
}
