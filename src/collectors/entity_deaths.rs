//! Unit removals: heroes, creeps and buildings leaving the world.
//!
//! Deletes are observed before the reconstructor drops the entity, so the
//! last known state is still available for classification.

use serde::{Deserialize, Serialize};

use super::{Bounded, Collect, CollectorStatus, FinalizeContext};
use crate::entities::hero::entity_position;
use crate::entities::{hero_name_from_class, is_hero_class, Reconstructor};
use crate::source::{EntityOp, EventRecord, KindSet, Record, RecordKind};
use crate::time::format_game_time;

const BUILDING_CLASSES: [&str; 5] = ["Tower", "Barracks", "Fort", "Building", "Effigy"];

/// Entity death collector options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDeathsConfig {
    /// Maximum events captured; 0 is unbounded.
    pub max_events: usize,
    /// Keep only hero removals.
    pub heroes_only: bool,
    /// Keep only creep removals.
    pub creeps_only: bool,
    /// Keep creep removals alongside heroes and buildings.
    pub include_creeps: bool,
}

/// One unit removal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct EntityDeath {
    pub tick: u32,
    pub entity_id: u32,
    pub class_name: String,
    /// Unit name, for example `npc_dota_creep_goodguys_melee`.
    pub name: String,
    pub team: i32,
    /// Last known position.
    pub x: f32,
    pub y: f32,
    pub health: i32,
    pub max_health: i32,
    pub is_hero: bool,
    pub is_creep: bool,
    pub is_building: bool,
    pub is_neutral: bool,
    pub game_time: f32,
    pub game_time_str: String,
}

/// Captured removals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityDeathsResult {
    /// Events in stream order.
    pub events: Vec<EntityDeath>,
    /// Number of events captured.
    pub total_events: usize,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug)]
pub(crate) struct EntityDeathsCollector {
    config: EntityDeathsConfig,
    events: Bounded<EntityDeath>,
}

impl EntityDeathsCollector {
    pub fn new(config: &EntityDeathsConfig) -> Self {
        Self {
            config: config.clone(),
            events: Bounded::new("entity_deaths", config.max_events),
        }
    }

    fn wants(&self, death: &EntityDeath) -> bool {
        if self.config.heroes_only {
            return death.is_hero;
        }
        if self.config.creeps_only {
            return death.is_creep;
        }
        !death.is_creep || self.config.include_creeps
    }
}

impl Collect for EntityDeathsCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::Entity, RecordKind::CombatLog]);
    type Output = EntityDeathsResult;

    fn observe(&mut self, entities: &Reconstructor, record: &Record) {
        let EventRecord::Entity(event) = &record.event else {
            return;
        };
        if event.op != EntityOp::Deleted {
            return;
        }
        let Some(entity) = entities.entity(event.handle.index()) else {
            return;
        };

        let class = entity.class_name.as_str();
        let is_hero = is_hero_class(class);
        let is_creep = class.contains("Creep");
        let is_building = BUILDING_CLASSES.iter().any(|b| class.contains(b));
        if !is_hero && !is_creep && !is_building {
            return;
        }

        let name = match entity.get_str("m_iszUnitName") {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if is_hero => hero_name_from_class(class),
            _ => String::new(),
        };
        let (x, y) = entity_position(entity);
        let death = EntityDeath {
            tick: record.tick,
            entity_id: entity.index(),
            class_name: entity.class_name.clone(),
            name,
            team: entity.get_i32("m_iTeamNum").unwrap_or(0),
            x,
            y,
            health: entity.get_i32("m_iHealth").unwrap_or(0),
            max_health: entity.get_i32("m_iMaxHealth").unwrap_or(0),
            is_hero,
            is_creep,
            is_building,
            is_neutral: class.contains("Creep_Neutral"),
            game_time: 0.0,
            game_time_str: String::new(),
        };
        if self.wants(&death) {
            self.events.push(death);
        }
    }

    fn finalize(self, ctx: &FinalizeContext<'_>) -> EntityDeathsResult {
        let clock = ctx.entities.clock();
        let mut events = self.events.into_inner();
        for event in &mut events {
            event.game_time = clock.game_time(event.tick);
            event.game_time_str = format_game_time(event.game_time);
        }
        EntityDeathsResult {
            total_events: events.len(),
            events,
            status: CollectorStatus::ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameTables;
    use crate::source::{EntityEvent, EntityHandle, PropMap, PropValue};

    fn created(index: u32, class: &str, props: &[(&str, PropValue)]) -> EntityEvent {
        EntityEvent {
            handle: EntityHandle::from_parts(index, 1),
            class_name: class.to_string(),
            op: EntityOp::Created,
            deltas: props.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
        }
    }

    fn deleted(index: u32) -> EntityEvent {
        EntityEvent {
            handle: EntityHandle::from_parts(index, 1),
            class_name: String::new(),
            op: EntityOp::Deleted,
            deltas: PropMap::new(),
        }
    }

    /// Creates a hero, a lane creep, a neutral, a tower and an ability, then
    /// deletes them all.
    fn run(config: &EntityDeathsConfig) -> EntityDeathsResult {
        let mut entities = Reconstructor::new();
        let mut collector = EntityDeathsCollector::new(config);
        let units = [
            created(
                10,
                "CDOTA_Unit_Hero_Juggernaut",
                &[("m_iTeamNum", 2.into()), ("m_iMaxHealth", 620.into())],
            ),
            created(
                11,
                "CDOTA_BaseNPC_Creep_Lane",
                &[("m_iszUnitName", "npc_dota_creep_badguys_melee".into()), ("m_iTeamNum", 3.into())],
            ),
            created(12, "CDOTA_BaseNPC_Creep_Neutral", &[]),
            created(
                13,
                "CDOTA_BaseNPC_Tower",
                &[
                    ("CBodyComponent.m_cellX", 130.into()),
                    ("CBodyComponent.m_vecX", 64.0_f32.into()),
                ],
            ),
            created(14, "CDOTA_Ability_Juggernaut_BladeFury", &[]),
        ];
        for unit in &units {
            entities.apply(1, unit);
        }
        for index in 10..=14 {
            let event = deleted(index);
            let record = Record::new(3000, EventRecord::Entity(event.clone()));
            collector.observe(&entities, &record);
            entities.apply(3000, &event);
        }
        entities.observe_game_state(2100, 5, 0.0);

        let tables = NameTables::new();
        collector.finalize(&FinalizeContext {
            names: tables.resolver(None),
            entities: &entities,
            tick: 3000,
            net_tick: 3000,
        })
    }

    #[test]
    fn test_default_skips_creeps() {
        let result = run(&EntityDeathsConfig::default());
        assert_eq!(result.total_events, 2);
        let hero = &result.events[0];
        assert!(hero.is_hero);
        assert_eq!(hero.name, "npc_dota_hero_juggernaut");
        assert_eq!(hero.team, 2);
        assert_eq!(hero.max_health, 620);
        assert_eq!(hero.game_time_str, "0:30");
        let tower = &result.events[1];
        assert!(tower.is_building);
        assert!((tower.x - 320.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_include_creeps() {
        let result = run(&EntityDeathsConfig {
            include_creeps: true,
            ..EntityDeathsConfig::default()
        });
        assert_eq!(result.total_events, 4);
        assert_eq!(result.events[1].name, "npc_dota_creep_badguys_melee");
        assert!(result.events[2].is_neutral);
    }

    #[test]
    fn test_heroes_only_and_creeps_only() {
        let heroes = run(&EntityDeathsConfig {
            heroes_only: true,
            ..EntityDeathsConfig::default()
        });
        assert_eq!(heroes.total_events, 1);

        let creeps = run(&EntityDeathsConfig {
            creeps_only: true,
            max_events: 1,
            ..EntityDeathsConfig::default()
        });
        assert_eq!(creeps.total_events, 1);
        assert!(creeps.events[0].is_creep);
    }
}
