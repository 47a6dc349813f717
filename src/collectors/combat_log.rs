//! Combat log capture with deferred name resolution.
//!
//! Combat log entries name their participants by index into the
//! `CombatLogNames` string table, and that table is still growing while
//! entries arrive. Entries are therefore stored raw during the traversal;
//! names, type names and game times are filled in by finalize.

use serde::{Deserialize, Serialize};

use super::{Bounded, Collect, CollectorStatus, FinalizeContext};
use crate::entities::{Reconstructor, HERO_NAME_PREFIX};
use crate::names::{NameResolver, COMBAT_LOG_NAMES};
use crate::source::{CombatLogRecord, EventRecord, KindSet, Payload, Record, RecordKind};
use crate::time::{GameClock, COMBAT_LOG_GAME_STATE};

/// Names of the combat log type codes, indexed by code.
const TYPE_NAMES: [&str; 45] = [
    "DOTA_COMBATLOG_DAMAGE",
    "DOTA_COMBATLOG_HEAL",
    "DOTA_COMBATLOG_MODIFIER_ADD",
    "DOTA_COMBATLOG_MODIFIER_REMOVE",
    "DOTA_COMBATLOG_DEATH",
    "DOTA_COMBATLOG_ABILITY",
    "DOTA_COMBATLOG_ITEM",
    "DOTA_COMBATLOG_LOCATION",
    "DOTA_COMBATLOG_GOLD",
    "DOTA_COMBATLOG_GAME_STATE",
    "DOTA_COMBATLOG_XP",
    "DOTA_COMBATLOG_PURCHASE",
    "DOTA_COMBATLOG_BUYBACK",
    "DOTA_COMBATLOG_ABILITY_TRIGGER",
    "DOTA_COMBATLOG_PLAYERSTATS",
    "DOTA_COMBATLOG_MULTIKILL",
    "DOTA_COMBATLOG_KILLSTREAK",
    "DOTA_COMBATLOG_TEAM_BUILDING_KILL",
    "DOTA_COMBATLOG_FIRST_BLOOD",
    "DOTA_COMBATLOG_MODIFIER_STACK_EVENT",
    "DOTA_COMBATLOG_NEUTRAL_CAMP_STACK",
    "DOTA_COMBATLOG_PICKUP_RUNE",
    "DOTA_COMBATLOG_REVEALED_INVISIBLE",
    "DOTA_COMBATLOG_HERO_SAVED",
    "DOTA_COMBATLOG_MANA_RESTORED",
    "DOTA_COMBATLOG_HERO_LEVELUP",
    "DOTA_COMBATLOG_BOTTLE_HEAL_ALLY",
    "DOTA_COMBATLOG_ENDGAME_STATS",
    "DOTA_COMBATLOG_INTERRUPT_CHANNEL",
    "DOTA_COMBATLOG_ALLIED_GOLD",
    "DOTA_COMBATLOG_AEGIS_TAKEN",
    "DOTA_COMBATLOG_MANA_DAMAGE",
    "DOTA_COMBATLOG_PHYSICAL_DAMAGE_PREVENTED",
    "DOTA_COMBATLOG_UNIT_SUMMONED",
    "DOTA_COMBATLOG_ATTACK_EVADE",
    "DOTA_COMBATLOG_TREE_CUT",
    "DOTA_COMBATLOG_SUCCESSFUL_SCAN",
    "DOTA_COMBATLOG_END_KILLSTREAK",
    "DOTA_COMBATLOG_BLOODSTONE_CHARGE",
    "DOTA_COMBATLOG_CRITICAL_DAMAGE",
    "DOTA_COMBATLOG_SPELL_ABSORB",
    "DOTA_COMBATLOG_UNIT_TELEPORTED",
    "DOTA_COMBATLOG_KILL_EATER_EVENT",
    "DOTA_COMBATLOG_NEUTRAL_ITEM_EARNED",
    "DOTA_COMBATLOG_STAT_TRACKING",
];

/// Returns the symbolic name of a combat log type code.
///
/// # Example
///
/// ```
/// use replay_extract::collectors::combat_log_type_name;
///
/// assert_eq!(combat_log_type_name(4), "DOTA_COMBATLOG_DEATH");
/// assert_eq!(combat_log_type_name(99), "unknown_99");
/// ```
#[must_use]
pub fn combat_log_type_name(code: i32) -> String {
    usize::try_from(code)
        .ok()
        .and_then(|i| TYPE_NAMES.get(i))
        .map_or_else(|| format!("unknown_{code}"), |name| (*name).to_string())
}

/// Combat log collector options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatLogConfig {
    /// Type codes to keep; empty keeps every type.
    pub types: Vec<i32>,
    /// Maximum entries captured; 0 is unbounded.
    pub max_entries: usize,
    /// Keep only entries involving a hero.
    pub heroes_only: bool,
}

/// A combat log entry with its names resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct CombatLogEntry {
    pub tick: u32,
    pub net_tick: u32,
    #[serde(rename = "type")]
    pub log_type: i32,
    pub type_name: String,
    pub target_name: String,
    pub target_source_name: String,
    pub attacker_name: String,
    pub damage_source_name: String,
    pub inflictor_name: String,
    pub is_attacker_illusion: bool,
    pub is_attacker_hero: bool,
    pub is_target_illusion: bool,
    pub is_target_hero: bool,
    pub is_visible_radiant: bool,
    pub is_visible_dire: bool,
    pub is_target_building: bool,
    pub is_ultimate_ability: bool,
    pub value: i32,
    /// `value` read as a name index, when the table has it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    pub health: i32,
    pub timestamp: f32,
    /// Seconds since the match start, or 0 if the start was never seen.
    pub game_time: f32,
    pub stun_duration: f32,
    pub slow_duration: f32,
    pub ability_level: i32,
    pub xp: i32,
    pub gold: i32,
    pub last_hits: i32,
    pub attacker_team: i32,
    pub target_team: i32,
    pub location_x: f32,
    pub location_y: f32,
    pub assist_players: Vec<i32>,
    pub damage_type: i32,
    pub modifier_duration: f32,
    pub stack_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier_ability_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier_purge_ability_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier_purge_npc_name: Option<String>,
}

impl CombatLogEntry {
    /// Returns true if a hero is on either side of the entry.
    #[must_use]
    pub fn involves_hero(&self) -> bool {
        self.is_attacker_hero
            || self.is_target_hero
            || self.attacker_name.contains(HERO_NAME_PREFIX)
            || self.target_name.contains(HERO_NAME_PREFIX)
    }
}

/// Resolved combat log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombatLogResult {
    /// Entries in stream order.
    pub entries: Vec<CombatLogEntry>,
    /// Number of entries returned.
    pub total_entries: usize,
    /// Server clock value at the match start, 0 if never seen.
    pub game_start_time: f32,
    /// Tick of the match start, 0 if never seen.
    pub game_start_tick: u32,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

/// A combat log record held back until names can be resolved.
#[derive(Debug, Clone)]
pub(crate) struct RawEntry {
    pub tick: u32,
    pub net_tick: u32,
    pub record: CombatLogRecord,
}

#[derive(Debug)]
pub(crate) struct CombatLogCollector {
    config: CombatLogConfig,
    raw: Bounded<RawEntry>,
    clock: GameClock,
}

impl CombatLogCollector {
    pub fn new(config: &CombatLogConfig) -> Self {
        Self {
            config: config.clone(),
            raw: Bounded::new("combat_log", config.max_entries),
            clock: GameClock::new(),
        }
    }
}

pub(crate) fn resolve(clock: &GameClock, names: &NameResolver<'_>, raw: RawEntry) -> CombatLogEntry {
    let RawEntry {
        tick,
        net_tick,
        record: m,
    } = raw;
    let name = |index: u32| names.name(COMBAT_LOG_NAMES, index);
    let known = |index: Option<u32>| {
        index
            .filter(|i| *i > 0)
            .and_then(|i| names.lookup(COMBAT_LOG_NAMES, i))
    };
    let game_time = clock
        .start_time()
        .map_or(0.0, |start| m.timestamp - start);

    CombatLogEntry {
        tick,
        net_tick,
        log_type: m.log_type,
        type_name: combat_log_type_name(m.log_type),
        target_name: name(m.target_name),
        target_source_name: name(m.target_source_name),
        attacker_name: name(m.attacker_name),
        damage_source_name: name(m.damage_source_name),
        inflictor_name: name(m.inflictor_name),
        is_attacker_illusion: m.is_attacker_illusion,
        is_attacker_hero: m.is_attacker_hero,
        is_target_illusion: m.is_target_illusion,
        is_target_hero: m.is_target_hero,
        is_visible_radiant: m.is_visible_radiant,
        is_visible_dire: m.is_visible_dire,
        is_target_building: m.is_target_building,
        is_ultimate_ability: m.is_ultimate_ability,
        value: m.value,
        value_name: u32::try_from(m.value)
            .ok()
            .and_then(|i| names.lookup(COMBAT_LOG_NAMES, i)),
        health: m.health,
        timestamp: m.timestamp,
        game_time,
        stun_duration: m.stun_duration,
        slow_duration: m.slow_duration,
        ability_level: m.ability_level,
        xp: m.xp,
        gold: m.gold,
        last_hits: m.last_hits,
        attacker_team: m.attacker_team,
        target_team: m.target_team,
        location_x: m.location_x,
        location_y: m.location_y,
        assist_players: m.assist_players,
        damage_type: m.damage_type,
        modifier_duration: m.modifier_duration,
        stack_count: m.stack_count,
        modifier_ability_name: known(m.modifier_ability),
        modifier_purge_ability_name: known(m.modifier_purge_ability),
        modifier_purge_npc_name: known(m.modifier_purge_npc),
    }
}

impl Collect for CombatLogCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::CombatLog, RecordKind::Table]);
    type Output = CombatLogResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        let EventRecord::Message(msg) = &record.event else {
            return;
        };
        let Payload::CombatLog(entry) = &msg.payload else {
            return;
        };

        if entry.log_type == COMBAT_LOG_GAME_STATE {
            self.clock
                .observe_game_state(record.tick, entry.value, entry.timestamp);
        }

        if !self.config.types.is_empty() && !self.config.types.contains(&entry.log_type) {
            return;
        }
        self.raw.push(RawEntry {
            tick: record.tick,
            net_tick: record.net_tick,
            record: entry.clone(),
        });
    }

    fn finalize(self, ctx: &FinalizeContext<'_>) -> CombatLogResult {
        let Self { config, raw, clock } = self;
        let entries: Vec<CombatLogEntry> = raw
            .into_inner()
            .into_iter()
            .map(|r| resolve(&clock, &ctx.names, r))
            .filter(|e| !config.heroes_only || e.involves_hero())
            .collect();

        CombatLogResult {
            total_entries: entries.len(),
            entries,
            game_start_time: clock.start_time().unwrap_or(0.0),
            game_start_tick: clock.start_tick_or_zero(),
            status: CollectorStatus::ok(),
        }
    }
}
