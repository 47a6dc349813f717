//! Collectors that share one traversal of the event stream.
//!
//! Each collector declares the record kinds it reads, accumulates what it
//! needs while the stream is walked, and turns that into its result in a
//! finalize step that runs once the traversal has completed. Collectors
//! never see each other's state: the [`Registry`] hands every record to
//! each collector that asked for its kind, in registration order, and each
//! collector applies its own filters and caps.
//!
//! Collectors that reference string tables (combat log) or the match clock
//! (attacks, entity deaths) keep raw records during traversal and resolve
//! them in finalize, when every table entry and the match start are known.

pub mod attacks;
pub mod combat_log;
pub mod entity_deaths;
pub mod entity_snapshots;
pub mod game_events;
pub mod game_info;
pub mod header;
pub mod messages;
pub mod modifiers;
pub mod parser_info;
pub mod string_tables;

use serde::Serialize;

use crate::config::ParseConfig;
use crate::entities::Reconstructor;
use crate::names::NameResolver;
use crate::session::ParseResult;
use crate::source::{KindSet, Record};

pub use attacks::{AttackEvent, AttacksConfig, AttacksResult};
pub use combat_log::{combat_log_type_name, CombatLogConfig, CombatLogEntry, CombatLogResult};
pub use entity_deaths::{EntityDeath, EntityDeathsConfig, EntityDeathsResult};
pub use entity_snapshots::{EntitySnapshotsConfig, EntitySnapshotsResult, DEFAULT_INTERVAL_TICKS};
pub use game_events::{GameEventData, GameEventsConfig, GameEventsResult};
pub use game_info::{GameInfoConfig, GameInfoResult};
pub use header::{game_build_from_directory, HeaderConfig, HeaderResult};
pub use messages::{MessageEvent, MessagesConfig, MessagesResult};
pub use modifiers::{ModifierEntry, ModifiersConfig, ModifiersResult};
pub use parser_info::{ParserInfoConfig, ParserInfoResult};
pub use string_tables::{StringTableData, StringTablesConfig, StringTablesResult};

/// One independent data extraction over a traversal.
pub(crate) trait Collect {
    /// Record kinds this collector reads.
    const KINDS: KindSet;

    /// What the collector produces.
    type Output;

    /// Observes one record of a declared kind.
    ///
    /// Entity deletes are observed before the entity leaves `entities`;
    /// every other entity op after it has been applied.
    fn observe(&mut self, entities: &Reconstructor, record: &Record);

    /// Builds the result once the traversal has finished.
    fn finalize(self, ctx: &FinalizeContext<'_>) -> Self::Output;
}

/// State available to collectors after the traversal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FinalizeContext<'a> {
    /// Resolver over every table entry observed.
    pub names: NameResolver<'a>,
    /// Entity state at the end of the stream.
    pub entities: &'a Reconstructor,
    /// Final tick reached.
    pub tick: u32,
    /// Final network tick reached.
    pub net_tick: u32,
}

/// Success flag and error message carried by every collector result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectorStatus {
    /// True if the collector produced a usable result.
    pub success: bool,
    /// Why the result is unusable, when it is not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectorStatus {
    /// A successful result.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A result whose source data never appeared in the stream.
    #[must_use]
    pub fn missing(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
        }
    }
}

impl Default for CollectorStatus {
    fn default() -> Self {
        Self::ok()
    }
}

/// A capped item buffer.
///
/// Once full, further pushes are dropped; the traversal itself carries on
/// so that sibling collectors keep receiving records.
#[derive(Debug, Clone)]
pub(crate) struct Bounded<T> {
    items: Vec<T>,
    limit: usize,
    name: &'static str,
    reported: bool,
}

impl<T> Bounded<T> {
    /// Creates a buffer holding at most `limit` items; 0 means unbounded.
    pub fn new(name: &'static str, limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
            name,
            reported: false,
        }
    }

    /// Returns true if no further item will be accepted.
    pub fn is_full(&self) -> bool {
        self.limit != 0 && self.items.len() >= self.limit
    }

    /// Appends an item unless the cap has been reached.
    ///
    /// Returns true if the item was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            if !self.reported {
                tracing::debug!(collector = self.name, limit = self.limit, "collector cap reached");
                self.reported = true;
            }
            return false;
        }
        self.items.push(item);
        true
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The held items.
    pub fn into_inner(self) -> Vec<T> {
        self.items
    }
}

/// An enabled collector.
#[derive(Debug)]
enum Slot {
    Header(header::HeaderCollector),
    GameInfo(game_info::GameInfoCollector),
    CombatLog(combat_log::CombatLogCollector),
    Entities(entity_snapshots::EntitySnapshotsCollector),
    GameEvents(game_events::GameEventsCollector),
    Modifiers(modifiers::ModifiersCollector),
    StringTables(string_tables::StringTablesCollector),
    Messages(messages::MessagesCollector),
    ParserInfo(parser_info::ParserInfoCollector),
    Attacks(attacks::AttacksCollector),
    EntityDeaths(entity_deaths::EntityDeathsCollector),
}

impl Slot {
    fn kinds(&self) -> KindSet {
        match self {
            Slot::Header(_) => header::HeaderCollector::KINDS,
            Slot::GameInfo(_) => game_info::GameInfoCollector::KINDS,
            Slot::CombatLog(_) => combat_log::CombatLogCollector::KINDS,
            Slot::Entities(_) => entity_snapshots::EntitySnapshotsCollector::KINDS,
            Slot::GameEvents(_) => game_events::GameEventsCollector::KINDS,
            Slot::Modifiers(_) => modifiers::ModifiersCollector::KINDS,
            Slot::StringTables(_) => string_tables::StringTablesCollector::KINDS,
            Slot::Messages(_) => messages::MessagesCollector::KINDS,
            Slot::ParserInfo(_) => parser_info::ParserInfoCollector::KINDS,
            Slot::Attacks(_) => attacks::AttacksCollector::KINDS,
            Slot::EntityDeaths(_) => entity_deaths::EntityDeathsCollector::KINDS,
        }
    }

    fn observe(&mut self, entities: &Reconstructor, record: &Record) {
        match self {
            Slot::Header(c) => c.observe(entities, record),
            Slot::GameInfo(c) => c.observe(entities, record),
            Slot::CombatLog(c) => c.observe(entities, record),
            Slot::Entities(c) => c.observe(entities, record),
            Slot::GameEvents(c) => c.observe(entities, record),
            Slot::Modifiers(c) => c.observe(entities, record),
            Slot::StringTables(c) => c.observe(entities, record),
            Slot::Messages(c) => c.observe(entities, record),
            Slot::ParserInfo(c) => c.observe(entities, record),
            Slot::Attacks(c) => c.observe(entities, record),
            Slot::EntityDeaths(c) => c.observe(entities, record),
        }
    }

    fn finalize(self, ctx: &FinalizeContext<'_>, result: &mut ParseResult) {
        match self {
            Slot::Header(c) => result.header = Some(c.finalize(ctx)),
            Slot::GameInfo(c) => result.game_info = Some(c.finalize(ctx)),
            Slot::CombatLog(c) => result.combat_log = Some(c.finalize(ctx)),
            Slot::Entities(c) => result.entities = Some(c.finalize(ctx)),
            Slot::GameEvents(c) => result.game_events = Some(c.finalize(ctx)),
            Slot::Modifiers(c) => result.modifiers = Some(c.finalize(ctx)),
            Slot::StringTables(c) => result.string_tables = Some(c.finalize(ctx)),
            Slot::Messages(c) => result.messages = Some(c.finalize(ctx)),
            Slot::ParserInfo(c) => result.parser_info = Some(c.finalize(ctx)),
            Slot::Attacks(c) => result.attacks = Some(c.finalize(ctx)),
            Slot::EntityDeaths(c) => result.entity_deaths = Some(c.finalize(ctx)),
        }
    }
}

/// The enabled collectors of one session.
#[derive(Debug)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
}

impl Registry {
    /// Instantiates one collector per enabled config section.
    pub fn from_config(config: &ParseConfig) -> Self {
        let mut slots = Vec::new();

        if let Some(c) = config.header.as_ref().filter(|c| c.enabled) {
            slots.push(Slot::Header(header::HeaderCollector::new(c)));
        }
        if let Some(c) = config.game_info.as_ref().filter(|c| c.enabled) {
            slots.push(Slot::GameInfo(game_info::GameInfoCollector::new(c)));
        }
        if let Some(c) = &config.combat_log {
            slots.push(Slot::CombatLog(combat_log::CombatLogCollector::new(c)));
        }
        if let Some(c) = &config.entities {
            slots.push(Slot::Entities(entity_snapshots::EntitySnapshotsCollector::new(c)));
        }
        if let Some(c) = &config.game_events {
            slots.push(Slot::GameEvents(game_events::GameEventsCollector::new(c)));
        }
        if let Some(c) = &config.modifiers {
            slots.push(Slot::Modifiers(modifiers::ModifiersCollector::new(c)));
        }
        if let Some(c) = &config.string_tables {
            slots.push(Slot::StringTables(string_tables::StringTablesCollector::new(c)));
        }
        if let Some(c) = &config.messages {
            slots.push(Slot::Messages(messages::MessagesCollector::new(c)));
        }
        if let Some(c) = config.parser_info.as_ref().filter(|c| c.enabled) {
            slots.push(Slot::ParserInfo(parser_info::ParserInfoCollector::new(c)));
        }
        if let Some(c) = &config.attacks {
            slots.push(Slot::Attacks(attacks::AttacksCollector::new(c)));
        }
        if let Some(c) = &config.entity_deaths {
            slots.push(Slot::EntityDeaths(entity_deaths::EntityDeathsCollector::new(c)));
        }

        Self { slots }
    }

    /// Union of the kinds every enabled collector reads.
    pub fn kinds(&self) -> KindSet {
        self.slots
            .iter()
            .fold(KindSet::EMPTY, |acc, slot| acc.union(slot.kinds()))
    }

    /// Number of enabled collectors.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Hands a record to every collector that reads its kind.
    pub fn observe(&mut self, entities: &Reconstructor, record: &Record) {
        let kind = record.kind();
        for slot in &mut self.slots {
            if slot.kinds().contains(kind) {
                slot.observe(entities, record);
            }
        }
    }

    /// Finalizes every collector into `result`.
    pub fn finalize(self, ctx: &FinalizeContext<'_>, result: &mut ParseResult) {
        for slot in self.slots {
            slot.finalize(ctx, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RecordKind;

    #[test]
    fn test_bounded_caps_items() {
        let mut buf = Bounded::new("test", 2);
        assert!(buf.push(1));
        assert!(buf.push(2));
        assert!(buf.is_full());
        assert!(!buf.push(3));
        assert_eq!(buf.into_inner(), vec![1, 2]);
    }

    #[test]
    fn test_bounded_zero_is_unbounded() {
        let mut buf = Bounded::new("test", 0);
        for i in 0..1000 {
            assert!(buf.push(i));
        }
        assert!(!buf.is_full());
        assert_eq!(buf.len(), 1000);
    }

    #[test]
    fn test_empty_config_has_no_collectors() {
        let registry = Registry::from_config(&ParseConfig::default());
        assert_eq!(registry.len(), 0);
        assert!(registry.kinds().is_empty());
    }

    #[test]
    fn test_disabled_sections_are_skipped() {
        let config = ParseConfig {
            header: Some(HeaderConfig { enabled: false }),
            parser_info: Some(ParserInfoConfig { enabled: false }),
            ..ParseConfig::default()
        };
        assert_eq!(Registry::from_config(&config).len(), 0);
    }

    #[test]
    fn test_kinds_are_union_of_collectors() {
        let config = ParseConfig {
            header: Some(HeaderConfig::default()),
            modifiers: Some(ModifiersConfig::default()),
            ..ParseConfig::default()
        };
        let registry = Registry::from_config(&config);
        let kinds = registry.kinds();
        assert!(kinds.contains(RecordKind::FileHeader));
        assert!(kinds.contains(RecordKind::Modifier));
        assert!(!kinds.contains(RecordKind::Entity));
        assert_eq!(kinds.len(), 2);
    }

    #[test]
    fn test_collector_status() {
        assert!(CollectorStatus::ok().success);
        let missing = CollectorStatus::missing("no header");
        assert!(!missing.success);
        assert_eq!(missing.error.as_deref(), Some("no header"));
    }
}
