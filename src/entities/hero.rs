//! Point-in-time views derived from live entity state.
//!
//! Everything here is recomputed from scratch on each capture: nothing is
//! patched incrementally, so a snapshot never carries state from an earlier
//! one.

use std::collections::BTreeMap;

use serde::Serialize;

use super::store::{EntityState, EntityStore};
use crate::source::PropMap;
use crate::time::world_coord;

/// Class name prefix of hero units.
pub const HERO_CLASS_PREFIX: &str = "CDOTA_Unit_Hero_";

/// Unit name prefix used by combat log and game info hero names.
pub const HERO_NAME_PREFIX: &str = "npc_dota_hero_";

/// Number of ability slots on a hero.
pub const ABILITY_SLOTS: usize = 24;

/// Number of inventory slots on a hero (main, backpack, stash, TP, neutral).
pub const ITEM_SLOTS: usize = 17;

/// Ability slot that holds the ultimate.
pub const ULTIMATE_SLOT: usize = 5;

/// Talent tiers, in the order their ability slots appear.
pub const TALENT_TIERS: [u32; 4] = [10, 15, 20, 25];

/// Shared utility abilities that every hero carries.
const SHARED_ABILITIES: [&str; 5] = [
    "Capture",
    "Portal_Warp",
    "Lamp_Use",
    "Plus_HighFive",
    "Plus_GuildBanner",
];

/// State of one learned ability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbilitySnapshot {
    /// Ability slot on the hero.
    pub slot: usize,
    /// Ability class name.
    pub name: String,
    /// Learned level.
    pub level: i32,
    /// Remaining cooldown, in seconds.
    pub cooldown: f32,
    /// Full cooldown length, in seconds.
    pub max_cooldown: f32,
    /// Mana cost.
    pub mana_cost: i32,
    /// Current charges.
    pub charges: i32,
    /// True for the ultimate slot.
    pub is_ultimate: bool,
}

/// A learned talent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TalentChoice {
    /// Hero level that unlocks the tier.
    pub tier: u32,
    /// Ability slot of the talent.
    pub slot: usize,
    /// True for the left option of the tier.
    pub is_left: bool,
    /// Talent class name.
    pub name: String,
}

/// An item in a hero's inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    /// Inventory slot.
    pub slot: usize,
    /// Item class name.
    pub name: String,
    /// Current charges.
    pub charges: i32,
    /// Remaining cooldown, in seconds.
    pub cooldown: f32,
}

/// Complete state of one hero at a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct HeroSnapshot {
    // Identity
    pub entity_id: u32,
    pub player_id: i32,
    pub hero_id: i32,
    pub hero_name: String,
    pub team: i32,

    // Position
    pub x: f32,
    pub y: f32,
    pub z: f32,

    // Vitals
    pub level: i32,
    pub health: i32,
    pub max_health: i32,
    pub mana: f32,
    pub max_mana: f32,
    pub is_alive: bool,

    // Economy
    pub gold: i32,
    pub net_worth: i32,
    pub last_hits: i32,
    pub denies: i32,
    pub xp: i32,
    pub camps_stacked: i32,

    // KDA
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,

    // Combat
    pub armor: f32,
    pub magic_resistance: f32,
    pub damage_min: i32,
    pub damage_max: i32,
    pub attack_range: i32,

    // Attributes
    pub strength: f32,
    pub agility: f32,
    pub intellect: f32,

    pub ability_points: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub abilities: Vec<AbilitySnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub talents: Vec<TalentChoice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inventory: Vec<ItemSnapshot>,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_illusion: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_clone: bool,
}

/// Score of one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeamState {
    /// Team number (2 = Radiant, 3 = Dire).
    pub team_id: i32,
    /// Kill score.
    pub score: i32,
}

/// Position and health of one lane or neutral creep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct CreepSnapshot {
    pub entity_id: u32,
    pub class_name: String,
    pub name: String,
    pub team: i32,
    pub x: f32,
    pub y: f32,
    pub health: i32,
    pub max_health: i32,
    pub is_lane: bool,
    pub is_neutral: bool,
}

/// Everything captured at one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    /// Tick of the capture.
    pub tick: u32,
    /// Network tick of the capture.
    pub net_tick: u32,
    /// Seconds since the match start (negative before it).
    pub game_time: f32,
    /// Heroes, roster-linked first in slot order, then any illusions.
    pub heroes: Vec<HeroSnapshot>,
    /// Team scores.
    pub teams: Vec<TeamState>,
    /// Alive creeps, when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub creeps: Vec<CreepSnapshot>,
    /// Full property maps of selected classes, keyed `<class>_<index>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_entities: Option<BTreeMap<String, PropMap>>,
}

/// Returns true if `class_name` is a hero unit class.
#[must_use]
pub fn is_hero_class(class_name: &str) -> bool {
    class_name.starts_with(HERO_CLASS_PREFIX)
}

/// Converts a hero class name to its unit name.
///
/// `CDOTA_Unit_Hero_AntiMage` becomes `npc_dota_hero_anti_mage`; classes
/// that are not heroes yield an empty string.
///
/// ```
/// use replay_extract::entities::hero_name_from_class;
///
/// assert_eq!(hero_name_from_class("CDOTA_Unit_Hero_AntiMage"), "npc_dota_hero_anti_mage");
/// assert_eq!(hero_name_from_class("CDOTA_Unit_Hero_Shadow_Demon"), "npc_dota_hero_shadow_demon");
/// assert_eq!(hero_name_from_class("CDOTA_BaseNPC_Creep"), "");
/// ```
#[must_use]
pub fn hero_name_from_class(class_name: &str) -> String {
    let Some(suffix) = class_name.strip_prefix(HERO_CLASS_PREFIX) else {
        return String::new();
    };
    let mut snake = String::with_capacity(HERO_NAME_PREFIX.len() + suffix.len() + 4);
    snake.push_str(HERO_NAME_PREFIX);
    for (i, ch) in suffix.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 && !snake.ends_with('_') {
                snake.push('_');
            }
            snake.push(ch.to_ascii_lowercase());
        } else if ch == '_' {
            if !snake.ends_with('_') {
                snake.push('_');
            }
        } else {
            snake.push(ch);
        }
    }
    snake
}

/// Returns true if a unit name such as `npc_dota_hero_shadow_shaman`
/// refers to the hero class `CDOTA_Unit_Hero_ShadowShaman`.
///
/// Comparison ignores case and underscores.
#[must_use]
pub fn hero_name_matches_class(hero_name: &str, class_name: &str) -> bool {
    let (Some(name), Some(class)) = (
        hero_name.strip_prefix(HERO_NAME_PREFIX),
        class_name.strip_prefix(HERO_CLASS_PREFIX),
    ) else {
        return false;
    };
    let normalize = |s: &str| -> String {
        s.chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    normalize(name) == normalize(class)
}

/// Reads a world position from an entity's body component, if present.
fn position_axis(entity: &EntityState, axis: char) -> Option<f32> {
    let cell = entity.get_i64(&format!("CBodyComponent.m_cell{axis}"))?;
    let offset = entity.get_f32(&format!("CBodyComponent.m_vec{axis}"))?;
    Some(world_coord(cell, offset))
}

/// Roster and team-data fields for one player slot.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SlotStats {
    pub hero_id: i32,
    pub level: i32,
    pub kills: i32,
    pub deaths: i32,
    pub assists: i32,
    pub last_hits: i32,
    pub denies: i32,
    pub gold: i32,
    pub net_worth: i32,
    pub xp: i32,
    pub camps_stacked: i32,
}

impl SlotStats {
    /// Gathers slot fields from the roster entity and the team data entity.
    pub(crate) fn read(
        roster: Option<&EntityState>,
        team_data: Option<&EntityState>,
        slot: usize,
    ) -> Self {
        let mut stats = SlotStats::default();
        if let Some(roster) = roster {
            let field = |name: &str| roster.get_i32(&format!("m_vecPlayerTeamData.{slot:04}.{name}"));
            stats.hero_id = field("m_nSelectedHeroID").unwrap_or(0);
            stats.level = field("m_iLevel").unwrap_or(0);
            stats.kills = field("m_iKills").unwrap_or(0);
            stats.deaths = field("m_iDeaths").unwrap_or(0);
            stats.assists = field("m_iAssists").unwrap_or(0);
        }
        if let Some(data) = team_data {
            let team_slot = slot % 5;
            let field = |name: &str| data.get_i32(&format!("m_vecDataTeam.{team_slot:04}.{name}"));
            stats.last_hits = field("m_iLastHitCount").unwrap_or(0);
            stats.denies = field("m_iDenyCount").unwrap_or(0);
            stats.net_worth = field("m_iNetWorth").unwrap_or(0);
            stats.gold = field("m_iReliableGold")
                .unwrap_or(0)
                .saturating_add(field("m_iUnreliableGold").unwrap_or(0));
            stats.xp = field("m_iTotalEarnedXP").unwrap_or(0);
            stats.camps_stacked = field("m_iCampsStacked").unwrap_or(0);
        }
        stats
    }
}

/// Team a roster slot belongs to when the entity does not say.
#[must_use]
pub fn slot_team(slot: usize) -> i32 {
    if slot < 5 {
        2
    } else {
        3
    }
}

/// Extracts the hero schema from a hero entity.
///
/// `team` is the fallback team; the entity's own `m_iTeamNum` wins when
/// present.
pub(crate) fn extract_hero(
    entity: &EntityState,
    store: &EntityStore,
    player_id: i32,
    team: i32,
    stats: &SlotStats,
) -> HeroSnapshot {
    let health = entity.get_i32("m_iHealth");
    let (abilities, talents) = extract_abilities(entity, store);

    HeroSnapshot {
        entity_id: entity.index(),
        player_id,
        hero_id: stats.hero_id,
        hero_name: hero_name_from_class(&entity.class_name),
        team: entity.get_i32("m_iTeamNum").unwrap_or(team),

        x: position_axis(entity, 'X').unwrap_or(0.0),
        y: position_axis(entity, 'Y').unwrap_or(0.0),
        z: position_axis(entity, 'Z').unwrap_or(0.0),

        level: entity.get_i32("m_iCurrentLevel").unwrap_or(stats.level),
        health: health.unwrap_or(0),
        max_health: entity.get_i32("m_iMaxHealth").unwrap_or(0),
        mana: entity.get_f32("m_flMana").unwrap_or(0.0),
        max_mana: entity.get_f32("m_flMaxMana").unwrap_or(0.0),
        is_alive: health.map_or(true, |h| h > 0),

        gold: stats.gold,
        net_worth: stats.net_worth,
        last_hits: stats.last_hits,
        denies: stats.denies,
        xp: stats.xp,
        camps_stacked: stats.camps_stacked,

        kills: stats.kills,
        deaths: stats.deaths,
        assists: stats.assists,

        armor: entity.get_f32("m_flPhysicalArmorValue").unwrap_or(0.0),
        magic_resistance: entity.get_f32("m_flMagicalResistanceValue").unwrap_or(0.0),
        damage_min: entity.get_i32("m_iDamageMin").unwrap_or(0),
        damage_max: entity.get_i32("m_iDamageMax").unwrap_or(0),
        attack_range: entity.get_i32("m_iAttackRange").unwrap_or(0),

        strength: entity.get_f32("m_flStrengthTotal").unwrap_or(0.0),
        agility: entity.get_f32("m_flAgilityTotal").unwrap_or(0.0),
        intellect: entity.get_f32("m_flIntellectTotal").unwrap_or(0.0),

        ability_points: entity.get_i32("m_iAbilityPoints").unwrap_or(0),
        abilities,
        talents,
        inventory: extract_inventory(entity, store),

        is_illusion: false,
        is_clone: false,
    }
}

/// Resolves ability handles into learned abilities and talents.
fn extract_abilities(
    hero: &EntityState,
    store: &EntityStore,
) -> (Vec<AbilitySnapshot>, Vec<TalentChoice>) {
    let mut abilities = Vec::new();
    let mut talent_slots: Vec<(usize, &EntityState)> = Vec::new();

    for slot in 0..ABILITY_SLOTS {
        let Some(ability) = hero
            .get_handle(&format!("m_vecAbilities.{slot:04}"))
            .and_then(|h| store.find_by_handle(h))
        else {
            continue;
        };
        let name = &ability.class_name;
        let level = ability.get_i32("m_iLevel").unwrap_or(0);

        if name.contains("Special_Bonus") {
            talent_slots.push((slot, ability));
            continue;
        }
        if level == 0 && ability.get_bool("m_bHidden").unwrap_or(false) {
            continue;
        }
        if SHARED_ABILITIES.iter().any(|shared| name.contains(shared)) {
            continue;
        }

        abilities.push(AbilitySnapshot {
            slot,
            name: name.clone(),
            level,
            cooldown: ability.get_f32("m_fCooldown").unwrap_or(0.0),
            max_cooldown: ability.get_f32("m_flCooldownLength").unwrap_or(0.0),
            mana_cost: ability.get_i32("m_iManaCost").unwrap_or(0),
            charges: ability.get_i32("m_nAbilityCurrentCharges").unwrap_or(0),
            is_ultimate: slot == ULTIMATE_SLOT,
        });
    }

    // Slots are visited in order, so pairs already line up by tier.
    let talents = talent_slots
        .chunks(2)
        .zip(TALENT_TIERS)
        .flat_map(|(pair, tier)| {
            pair.iter().enumerate().filter_map(move |(i, (slot, ability))| {
                (ability.get_i32("m_iLevel").unwrap_or(0) > 0).then(|| TalentChoice {
                    tier,
                    slot: *slot,
                    is_left: i == 0,
                    name: ability.class_name.clone(),
                })
            })
        })
        .collect();

    (abilities, talents)
}

/// Resolves item handles into inventory entries.
fn extract_inventory(hero: &EntityState, store: &EntityStore) -> Vec<ItemSnapshot> {
    (0..ITEM_SLOTS)
        .filter_map(|slot| {
            let item = hero
                .get_handle(&format!("m_hItems.{slot:04}"))
                .and_then(|h| store.find_by_handle(h))?;
            Some(ItemSnapshot {
                slot,
                name: item.class_name.clone(),
                charges: item.get_i32("m_iCurrentCharges").unwrap_or(0),
                cooldown: item.get_f32("m_fCooldown").unwrap_or(0.0),
            })
        })
        .collect()
}

/// Extracts a creep, or `None` if it is dead.
pub(crate) fn extract_creep(entity: &EntityState) -> Option<CreepSnapshot> {
    let health = entity.get_i32("m_iHealth").unwrap_or(0);
    if health <= 0 {
        return None;
    }
    Some(CreepSnapshot {
        entity_id: entity.index(),
        class_name: entity.class_name.clone(),
        name: entity.get_str("m_iszUnitName").unwrap_or_default().to_string(),
        team: entity.get_i32("m_iTeamNum").unwrap_or(0),
        x: position_axis(entity, 'X').unwrap_or(0.0),
        y: position_axis(entity, 'Y').unwrap_or(0.0),
        health,
        max_health: entity.get_i32("m_iMaxHealth").unwrap_or(0),
        is_lane: entity.class_name.contains("Creep_Lane"),
        is_neutral: entity.class_name.contains("Creep_Neutral"),
    })
}

/// Last known world position of any entity, as `(x, y)`.
pub(crate) fn entity_position(entity: &EntityState) -> (f32, f32) {
    (
        position_axis(entity, 'X').unwrap_or(0.0),
        position_axis(entity, 'Y').unwrap_or(0.0),
    )
}
