//! Entity state reconstruction.
//!
//! [`Reconstructor`] consumes entity ops in stream order and keeps enough
//! bookkeeping to materialize a hero-centric [`EntitySnapshot`] at any
//! point of the traversal:
//!
//! - the game-rules entity, whose start-time field fixes the match clock
//! - the player-resource (roster) entity, whose per-slot hero handles are
//!   the authoritative player → hero link
//! - the team data entities, which carry per-slot economy
//! - the set of live hero-classed entities, by entity index
//!
//! Missing pieces are never errors: until the roster has been seen a
//! capture simply has no heroes.

use std::collections::{BTreeMap, BTreeSet};

use super::hero::{
    entity_position, extract_creep, extract_hero, hero_name_matches_class, is_hero_class,
    slot_team, EntitySnapshot, SlotStats, TeamState,
};
use super::store::{EntityState, EntityStore};
use crate::source::{EntityEvent, EntityHandle, EntityOp};
use crate::time::GameClock;

/// Class name fragment of the game-rules proxy entity.
pub const GAME_RULES_CLASS: &str = "CDOTAGamerulesProxy";

/// Class name fragment of the roster entity.
pub const PLAYER_RESOURCE_CLASS: &str = "CDOTA_PlayerResource";

/// Class name fragment of the Radiant team data entity.
pub const DATA_RADIANT_CLASS: &str = "CDOTA_DataRadiant";

/// Class name fragment of the Dire team data entity.
pub const DATA_DIRE_CLASS: &str = "CDOTA_DataDire";

/// Class name of team entities.
pub const TEAM_CLASS: &str = "CDOTATeam";

/// Property holding the match start time on the game-rules entity.
pub const GAME_START_TIME_FIELD: &str = "m_pGameRules.m_flGameStartTime";

/// Number of player slots in a standard match.
pub const PLAYER_SLOTS: usize = 10;

/// What a capture should include beyond roster-linked heroes and teams.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Also include hero-classed entities that no roster slot points at.
    pub include_illusions: bool,
    /// Include alive lane and neutral creeps.
    pub include_creeps: bool,
    /// Only include heroes matching one of these unit names. Empty keeps
    /// every hero.
    pub target_heroes: Vec<String>,
    /// Dump the full property map of entities whose class contains one of
    /// these fragments.
    pub raw_classes: Vec<String>,
}

impl CaptureOptions {
    fn wants_hero(&self, class_name: &str) -> bool {
        self.target_heroes.is_empty()
            || self
                .target_heroes
                .iter()
                .any(|name| hero_name_matches_class(name, class_name))
    }
}

/// What an applied op meant for the tracked entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// The op touched the roster entity.
    pub roster_updated: bool,
    /// The op established the match start tick.
    pub game_started: bool,
}

/// Rebuilds point-in-time entity state from entity deltas.
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    store: EntityStore,
    clock: GameClock,
    game_rules: Option<u32>,
    roster: Option<u32>,
    data_radiant: Option<u32>,
    data_dire: Option<u32>,
    heroes: BTreeSet<u32>,
    links: [Option<EntityHandle>; PLAYER_SLOTS],
}

impl Reconstructor {
    /// Creates an empty reconstructor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one entity op observed at `tick`.
    pub fn apply(&mut self, tick: u32, event: &EntityEvent) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        let index = event.handle.index();

        if event.op == EntityOp::Deleted {
            self.store.apply(tick, event);
            self.heroes.remove(&index);
            for slot in [
                &mut self.game_rules,
                &mut self.roster,
                &mut self.data_radiant,
                &mut self.data_dire,
            ] {
                if *slot == Some(index) {
                    *slot = None;
                }
            }
            return outcome;
        }

        self.store.apply(tick, event);
        let class = event.class_name.as_str();

        if is_hero_class(class) {
            self.heroes.insert(index);
        } else if class.contains(GAME_RULES_CLASS) {
            self.game_rules = Some(index);
            if let Some(start) = event.deltas.get(GAME_START_TIME_FIELD).and_then(|v| v.as_f32()) {
                outcome.game_started = self.clock.observe_rules_start_time(tick, start);
                if outcome.game_started {
                    tracing::debug!(tick, start, "game start detected from game rules");
                }
            }
        } else if class.contains(PLAYER_RESOURCE_CLASS) {
            self.roster = Some(index);
            self.refresh_links(index);
            outcome.roster_updated = true;
        } else if class.contains(DATA_RADIANT_CLASS) {
            self.data_radiant = Some(index);
        } else if class.contains(DATA_DIRE_CLASS) {
            self.data_dire = Some(index);
        }
        outcome
    }

    fn refresh_links(&mut self, roster_index: u32) {
        let Some(roster) = self.store.get(roster_index) else {
            return;
        };
        for (slot, link) in self.links.iter_mut().enumerate() {
            let key = format!("m_vecPlayerTeamData.{slot:04}.m_hSelectedHero");
            *link = roster.get_handle(&key).filter(|h| h.is_valid());
        }
    }

    /// Records a combat-log game-state signal.
    ///
    /// Returns true if it established the match start.
    pub fn observe_game_state(&mut self, tick: u32, state: i32, timestamp: f32) -> bool {
        self.clock.observe_game_state(tick, state, timestamp)
    }

    /// The match clock.
    #[must_use]
    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// The live entity store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Returns true once the roster entity has been observed.
    #[must_use]
    pub fn has_roster(&self) -> bool {
        self.roster.is_some()
    }

    /// Hero handle linked to each player slot.
    #[must_use]
    pub fn links(&self) -> &[Option<EntityHandle>; PLAYER_SLOTS] {
        &self.links
    }

    /// Indices of live hero-classed entities.
    pub fn hero_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.heroes.iter().copied()
    }

    /// Looks up a live entity by index.
    #[must_use]
    pub fn entity(&self, index: u32) -> Option<&EntityState> {
        self.store.get(index)
    }

    /// Materializes the current state.
    #[must_use]
    pub fn capture(&self, tick: u32, net_tick: u32, options: &CaptureOptions) -> EntitySnapshot {
        let roster = self.roster.and_then(|i| self.store.get(i));
        let radiant = self.data_radiant.and_then(|i| self.store.get(i));
        let dire = self.data_dire.and_then(|i| self.store.get(i));

        let mut heroes = Vec::with_capacity(PLAYER_SLOTS);
        let mut linked = BTreeSet::new();

        for (slot, link) in self.links.iter().enumerate() {
            let Some(hero) = link
                .and_then(|h| self.store.find_by_handle(h))
                .filter(|e| self.heroes.contains(&e.index()))
            else {
                continue;
            };
            linked.insert(hero.index());
            if !options.wants_hero(&hero.class_name) {
                continue;
            }
            let team = slot_team(slot);
            let team_data = if team == 2 { radiant } else { dire };
            let stats = SlotStats::read(roster, team_data, slot);
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let player_id = slot as i32;
            heroes.push(extract_hero(hero, &self.store, player_id, team, &stats));
        }

        if options.include_illusions {
            for index in self.heroes.difference(&linked) {
                let Some(entity) = self.store.get(*index) else {
                    continue;
                };
                if !options.wants_hero(&entity.class_name) {
                    continue;
                }
                heroes.push(self.extract_unlinked_hero(entity));
            }
        }

        let mut teams: Vec<TeamState> = self
            .store
            .with_class(TEAM_CLASS)
            .filter_map(|e| {
                let team_id = e.get_i32("m_iTeamNum")?;
                matches!(team_id, 2 | 3).then(|| TeamState {
                    team_id,
                    score: e.get_i32("m_iScore").unwrap_or(0),
                })
            })
            .collect();
        teams.sort_by_key(|t| t.team_id);

        let creeps = if options.include_creeps {
            self.store
                .iter()
                .filter(|e| {
                    e.class_name.contains("CDOTA_BaseNPC_Creep_Lane")
                        || e.class_name.contains("CDOTA_BaseNPC_Creep_Neutral")
                })
                .filter_map(extract_creep)
                .collect()
        } else {
            Vec::new()
        };

        let raw_entities = (!options.raw_classes.is_empty()).then(|| {
            self.store
                .iter()
                .filter(|e| {
                    options
                        .raw_classes
                        .iter()
                        .any(|c| e.class_name.contains(c.as_str()))
                })
                .map(|e| (format!("{}_{}", e.class_name, e.index()), e.props.clone()))
                .collect::<BTreeMap<_, _>>()
        });

        EntitySnapshot {
            tick,
            net_tick,
            game_time: self.clock.game_time(tick),
            heroes,
            teams,
            creeps,
            raw_entities,
        }
    }

    /// Builds a hero entry for an entity no roster slot points at.
    fn extract_unlinked_hero(&self, entity: &EntityState) -> super::HeroSnapshot {
        let player_id = entity.get_i32("m_iPlayerID").map_or(-1, |id| id / 2);
        let team = entity.get_i32("m_iTeamNum").unwrap_or(0);
        let mut hero = extract_hero(entity, &self.store, player_id, team, &SlotStats::default());

        let replicating = entity
            .get_handle("m_hReplicatingOtherHeroModel")
            .is_some_and(EntityHandle::is_valid);
        hero.is_illusion = entity.get_bool("m_bIsIllusion").unwrap_or(false);
        // An extra hero body with neither signal is still not the real hero.
        hero.is_clone = replicating || !hero.is_illusion;
        hero
    }

    /// Last known position of a live entity.
    #[must_use]
    pub fn position_of(&self, index: u32) -> Option<(f32, f32)> {
        self.store.get(index).map(entity_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PropValue;

    fn op(handle: EntityHandle, class: &str, op: EntityOp, deltas: &[(&str, PropValue)]) -> EntityEvent {
        EntityEvent {
            handle,
            class_name: class.to_string(),
            op,
            deltas: deltas.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
        }
    }

    fn hero_handle(slot: u32) -> EntityHandle {
        EntityHandle::from_parts(200 + slot, 1)
    }

    /// A reconstructor with `n` roster-linked Axe heroes.
    fn with_heroes(n: u32) -> Reconstructor {
        let mut r = Reconstructor::new();
        for slot in 0..n {
            r.apply(
                10,
                &op(hero_handle(slot), "CDOTA_Unit_Hero_Axe", EntityOp::Created, &[("m_iHealth", 600.into())]),
            );
        }
        let keys: Vec<String> = (0..n)
            .map(|s| format!("m_vecPlayerTeamData.{s:04}.m_hSelectedHero"))
            .collect();
        let deltas: Vec<(&str, PropValue)> = keys
            .iter()
            .zip(0..n)
            .map(|(k, s)| (k.as_str(), hero_handle(s).into()))
            .collect();
        r.apply(20, &op(EntityHandle::from_parts(5, 0), "CDOTA_PlayerResource", EntityOp::Updated, &deltas));
        r
    }

    #[test]
    fn test_no_roster_means_no_heroes() {
        let mut r = Reconstructor::new();
        r.apply(1, &op(hero_handle(0), "CDOTA_Unit_Hero_Axe", EntityOp::Created, &[]));
        assert!(!r.has_roster());
        let snap = r.capture(1, 1, &CaptureOptions::default());
        assert!(snap.heroes.is_empty());
    }

    #[test]
    fn test_roster_links_heroes() {
        let r = with_heroes(10);
        assert!(r.has_roster());
        let snap = r.capture(20, 20, &CaptureOptions::default());
        assert_eq!(snap.heroes.len(), 10);
        assert_eq!(snap.heroes[0].player_id, 0);
        assert_eq!(snap.heroes[0].team, 2);
        assert_eq!(snap.heroes[7].team, 3);
    }

    #[test]
    fn test_illusions_excluded_unless_requested() {
        let mut r = with_heroes(2);
        r.apply(
            30,
            &op(
                EntityHandle::from_parts(400, 1),
                "CDOTA_Unit_Hero_Axe",
                EntityOp::Created,
                &[("m_bIsIllusion", true.into()), ("m_iPlayerID", 2.into())],
            ),
        );
        r.apply(
            30,
            &op(
                EntityHandle::from_parts(401, 1),
                "CDOTA_Unit_Hero_Axe",
                EntityOp::Created,
                &[("m_hReplicatingOtherHeroModel", hero_handle(0).into())],
            ),
        );

        let plain = r.capture(30, 30, &CaptureOptions::default());
        assert_eq!(plain.heroes.len(), 2);

        let options = CaptureOptions {
            include_illusions: true,
            ..CaptureOptions::default()
        };
        let full = r.capture(30, 30, &options);
        assert_eq!(full.heroes.len(), 4);
        let illusion = &full.heroes[2];
        assert!(illusion.is_illusion && !illusion.is_clone);
        assert_eq!(illusion.player_id, 1);
        let clone = &full.heroes[3];
        assert!(clone.is_clone && !clone.is_illusion);
        assert_eq!(clone.player_id, -1);
    }

    #[test]
    fn test_unflagged_extra_hero_defaults_to_clone() {
        let mut r = with_heroes(1);
        r.apply(5, &op(EntityHandle::from_parts(402, 1), "CDOTA_Unit_Hero_Lina", EntityOp::Created, &[]));
        let options = CaptureOptions {
            include_illusions: true,
            ..CaptureOptions::default()
        };
        let snap = r.capture(5, 5, &options);
        assert!(snap.heroes[1].is_clone);
    }

    #[test]
    fn test_deleted_hero_drops_from_capture() {
        let mut r = with_heroes(3);
        r.apply(40, &op(hero_handle(1), "CDOTA_Unit_Hero_Axe", EntityOp::Deleted, &[]));
        let snap = r.capture(40, 40, &CaptureOptions::default());
        assert_eq!(snap.heroes.len(), 2);
        assert_eq!(r.hero_indices().count(), 2);
    }

    #[test]
    fn test_game_start_from_rules_entity() {
        let mut r = Reconstructor::new();
        let rules = EntityHandle::from_parts(2, 0);
        let first = r.apply(100, &op(rules, "CDOTAGamerulesProxy", EntityOp::Created, &[(GAME_START_TIME_FIELD, 0.0_f32.into())]));
        assert!(!first.game_started);
        let started = r.apply(900, &op(rules, "CDOTAGamerulesProxy", EntityOp::Updated, &[(GAME_START_TIME_FIELD, 30.0_f32.into())]));
        assert!(started.game_started);
        let later = r.apply(1000, &op(rules, "CDOTAGamerulesProxy", EntityOp::Updated, &[(GAME_START_TIME_FIELD, 31.0_f32.into())]));
        assert!(!later.game_started);

        assert_eq!(r.clock().start_tick(), Some(900));
        let snap = r.capture(0, 0, &CaptureOptions::default());
        assert!((snap.game_time + 30.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_target_heroes_filter() {
        let mut r = Reconstructor::new();
        r.apply(1, &op(hero_handle(0), "CDOTA_Unit_Hero_Axe", EntityOp::Created, &[]));
        r.apply(1, &op(hero_handle(1), "CDOTA_Unit_Hero_ShadowShaman", EntityOp::Created, &[]));
        r.apply(
            2,
            &op(
                EntityHandle::from_parts(5, 0),
                "CDOTA_PlayerResource",
                EntityOp::Created,
                &[
                    ("m_vecPlayerTeamData.0000.m_hSelectedHero", hero_handle(0).into()),
                    ("m_vecPlayerTeamData.0001.m_hSelectedHero", hero_handle(1).into()),
                ],
            ),
        );
        let options = CaptureOptions {
            target_heroes: vec!["npc_dota_hero_shadow_shaman".to_string()],
            ..CaptureOptions::default()
        };
        let snap = r.capture(2, 2, &options);
        assert_eq!(snap.heroes.len(), 1);
        assert_eq!(snap.heroes[0].hero_name, "npc_dota_hero_shadow_shaman");
    }

    #[test]
    fn test_economy_from_team_data() {
        let mut r = with_heroes(7);
        r.apply(
            50,
            &op(
                EntityHandle::from_parts(6, 0),
                "CDOTA_DataDire",
                EntityOp::Created,
                &[
                    ("m_vecDataTeam.0001.m_iReliableGold", 300.into()),
                    ("m_vecDataTeam.0001.m_iUnreliableGold", 150.into()),
                    ("m_vecDataTeam.0001.m_iLastHitCount", 42.into()),
                ],
            ),
        );
        let snap = r.capture(50, 50, &CaptureOptions::default());
        let slot6 = &snap.heroes[6];
        assert_eq!(slot6.player_id, 6);
        assert_eq!(slot6.gold, 450);
        assert_eq!(slot6.last_hits, 42);
        assert_eq!(snap.heroes[1].gold, 0);
    }

    #[test]
    fn test_teams_and_creeps_and_raw() {
        let mut r = Reconstructor::new();
        r.apply(1, &op(EntityHandle::from_parts(60, 0), "CDOTATeam", EntityOp::Created, &[("m_iTeamNum", 3.into()), ("m_iScore", 12.into())]));
        r.apply(1, &op(EntityHandle::from_parts(61, 0), "CDOTATeam", EntityOp::Created, &[("m_iTeamNum", 2.into()), ("m_iScore", 9.into())]));
        r.apply(1, &op(EntityHandle::from_parts(62, 0), "CDOTATeam", EntityOp::Created, &[("m_iTeamNum", 1.into())]));
        r.apply(1, &op(EntityHandle::from_parts(70, 0), "CDOTA_BaseNPC_Creep_Lane", EntityOp::Created, &[("m_iHealth", 100.into())]));

        let options = CaptureOptions {
            include_creeps: true,
            raw_classes: vec!["CDOTATeam".to_string()],
            ..CaptureOptions::default()
        };
        let snap = r.capture(1, 1, &options);
        assert_eq!(
            snap.teams,
            vec![
                TeamState { team_id: 2, score: 9 },
                TeamState { team_id: 3, score: 12 }
            ]
        );
        assert_eq!(snap.creeps.len(), 1);
        let raw = snap.raw_entities.unwrap();
        assert_eq!(raw.len(), 3);
        assert!(raw.contains_key("CDOTATeam_60"));
    }
}
