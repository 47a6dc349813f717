//! Entity state reconstruction and hero-centric snapshots.
//!
//! The event source only ever reports deltas: an entity is created with an
//! initial property set, then receives partial updates until it is deleted.
//! This module folds those deltas into live state ([`EntityStore`]) and
//! derives coherent point-in-time views from it ([`Reconstructor::capture`]).
//!
//! # Example
//!
//! ```
//! use replay_extract::entities::{CaptureOptions, Reconstructor};
//! use replay_extract::source::{EntityEvent, EntityHandle, EntityOp, PropMap};
//!
//! let hero = EntityHandle::from_parts(300, 1);
//! let mut reconstructor = Reconstructor::new();
//!
//! reconstructor.apply(10, &EntityEvent {
//!     handle: hero,
//!     class_name: "CDOTA_Unit_Hero_Axe".to_string(),
//!     op: EntityOp::Created,
//!     deltas: PropMap::new(),
//! });
//!
//! let mut roster = PropMap::new();
//! roster.insert("m_vecPlayerTeamData.0000.m_hSelectedHero".to_string(), hero.into());
//! reconstructor.apply(11, &EntityEvent {
//!     handle: EntityHandle::from_parts(5, 0),
//!     class_name: "CDOTA_PlayerResource".to_string(),
//!     op: EntityOp::Created,
//!     deltas: roster,
//! });
//!
//! let snapshot = reconstructor.capture(11, 11, &CaptureOptions::default());
//! assert_eq!(snapshot.heroes.len(), 1);
//! assert_eq!(snapshot.heroes[0].hero_name, "npc_dota_hero_axe");
//! ```

pub mod hero;
pub mod reconstructor;
pub mod store;

pub use hero::{
    hero_name_from_class, hero_name_matches_class, is_hero_class, slot_team, AbilitySnapshot,
    CreepSnapshot, EntitySnapshot, HeroSnapshot, ItemSnapshot, TalentChoice, TeamState,
    HERO_CLASS_PREFIX, HERO_NAME_PREFIX,
};
pub use reconstructor::{ApplyOutcome, CaptureOptions, Reconstructor, PLAYER_SLOTS};
pub use store::{EntityState, EntityStore};
