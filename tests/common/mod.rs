//! Shared fixtures for integration tests.
//!
//! [`match_recording`] builds a small but complete match: ten roster-linked
//! heroes, two unlinked hero bodies, a horn at [`START_TICK`], periodic
//! roster updates, combat log traffic whose names only arrive later, and one
//! hero removal near the end.

#![allow(dead_code)]

use replay_extract::source::{
    CombatLogRecord, EntityHandle, EntityOp, FileHeader, FileInfo, ModifierRecord, Payload,
    ProjectileRecord, PropValue, Recording,
};

/// Tick of the match start.
pub const START_TICK: u32 = 900;

/// Tick of the last record.
pub const LAST_TICK: u32 = 6400;

/// Tick at which the slot 9 hero is removed.
pub const DEATH_TICK: u32 = 6300;

/// Roster entity handle.
pub const ROSTER: EntityHandle = EntityHandle(5);

/// Spacing of periodic roster and hero updates.
pub const UPDATE_EVERY: u32 = 600;

/// Hero classes by player slot.
pub const HERO_CLASSES: [&str; 10] = [
    "CDOTA_Unit_Hero_Axe",
    "CDOTA_Unit_Hero_Lina",
    "CDOTA_Unit_Hero_Juggernaut",
    "CDOTA_Unit_Hero_Pudge",
    "CDOTA_Unit_Hero_Sven",
    "CDOTA_Unit_Hero_Zuus",
    "CDOTA_Unit_Hero_Tiny",
    "CDOTA_Unit_Hero_Lion",
    "CDOTA_Unit_Hero_Riki",
    "CDOTA_Unit_Hero_Viper",
];

/// Hero handle for a player slot.
pub fn hero_handle(slot: usize) -> EntityHandle {
    EntityHandle::from_parts(300 + slot as u32, 1)
}

fn game_rules() -> EntityHandle {
    EntityHandle::from_parts(3, 1)
}

fn damage(attacker: u32, target: u32, value: i32, tick: u32) -> Payload {
    Payload::CombatLog(CombatLogRecord {
        log_type: 0,
        attacker_name: attacker,
        target_name: target,
        is_attacker_hero: true,
        is_target_hero: true,
        value,
        timestamp: tick as f32 / 30.0,
        ..CombatLogRecord::default()
    })
}

fn game_state(value: i32, tick: u32) -> Payload {
    Payload::CombatLog(CombatLogRecord {
        log_type: 9,
        value,
        timestamp: tick as f32 / 30.0,
        ..CombatLogRecord::default()
    })
}

/// Builds the match fixture. Records are in ascending tick order.
pub fn match_recording() -> Recording {
    let mut recording = Recording::new()
        .message(
            1,
            Payload::FileHeader(FileHeader {
                map_name: "dota".to_string(),
                game_directory: "/opt/srcds/dota/dota_v6120/dota".to_string(),
                network_protocol: 47,
                ..FileHeader::default()
            }),
        )
        .entity(2, game_rules(), "CDOTAGamerulesProxy", EntityOp::Created, [
            ("m_pGameRules.m_flGameStartTime", PropValue::from(0.0_f32)),
        ]);

    for (slot, class) in HERO_CLASSES.iter().enumerate() {
        let team = if slot < 5 { 2 } else { 3 };
        recording = recording.entity(3, hero_handle(slot), class, EntityOp::Created, [
            ("m_iHealth", PropValue::from(600)),
            ("m_iMaxHealth", PropValue::from(600)),
            ("m_iTeamNum", PropValue::from(team)),
            ("CBodyComponent.m_cellX", PropValue::from(128 + slot as i32)),
            ("CBodyComponent.m_vecX", PropValue::from(0.0_f32)),
            ("CBodyComponent.m_cellY", PropValue::from(128)),
            ("CBodyComponent.m_vecY", PropValue::from(0.0_f32)),
        ]);
    }

    // Two bodies of slot 0's hero that no roster slot points at.
    for (offset, illusion) in [(0, true), (1, false)] {
        recording = recording.entity(
            3,
            EntityHandle::from_parts(320 + offset, 1),
            HERO_CLASSES[0],
            EntityOp::Created,
            [("m_iHealth", PropValue::from(600)), ("m_bIsIllusion", PropValue::from(illusion))],
        );
    }

    let links: Vec<(String, EntityHandle)> = (0..10)
        .map(|slot| {
            (
                format!("m_vecPlayerTeamData.{slot:04}.m_hSelectedHero"),
                hero_handle(slot),
            )
        })
        .collect();
    recording = recording
        .entity(
            4,
            ROSTER,
            "CDOTA_PlayerResource",
            EntityOp::Created,
            links.iter().map(|(k, h)| (k.as_str(), PropValue::from(*h))),
        )
        .message(10, damage(5, 6, 120, 10))
        .table(50, "CombatLogNames", 5, "npc_dota_hero_axe")
        .table(50, "CombatLogNames", 6, "npc_dota_hero_lina");

    let mut tick = UPDATE_EVERY;
    while tick <= 6000 {
        if tick == START_TICK + UPDATE_EVERY / 2 {
            recording = recording
                .entity(START_TICK, game_rules(), "CDOTAGamerulesProxy", EntityOp::Updated, [
                    ("m_pGameRules.m_flGameStartTime", PropValue::from(30.0_f32)),
                ])
                .message(START_TICK, game_state(5, START_TICK));
        }
        recording = recording
            .entity(tick, hero_handle(0), HERO_CLASSES[0], EntityOp::Updated, [
                ("CBodyComponent.m_vecX", PropValue::from((tick / UPDATE_EVERY) as f32)),
            ])
            .entity(tick, ROSTER, "CDOTA_PlayerResource", EntityOp::Updated, [])
            .message(tick, damage(5, 6, tick as i32 / 10, tick))
            .message(
                tick,
                Payload::Modifier(ModifierRecord {
                    parent: hero_handle(1).index(),
                    duration: 5.0,
                    is_debuff: true,
                    ..ModifierRecord::default()
                }),
            )
            .message(
                tick,
                Payload::Projectile(ProjectileRecord {
                    source: hero_handle(0),
                    target: hero_handle(1),
                    move_speed: 900,
                    dodgeable: true,
                    is_attack: true,
                    launch_tick: tick,
                }),
            );
        tick += UPDATE_EVERY;
    }

    recording
        .entity(DEATH_TICK, hero_handle(9), HERO_CLASSES[9], EntityOp::Deleted, [])
        .message(
            LAST_TICK,
            Payload::FileInfo(FileInfo {
                playback_ticks: LAST_TICK as i32,
                match_id: 7_000_000_001,
                game_mode: 22,
                game_winner: 2,
                ..FileInfo::default()
            }),
        )
}
