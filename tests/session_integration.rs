//! Integration tests for single-pass parse sessions over a full match.

mod common;

use common::{match_recording, DEATH_TICK, START_TICK};
use replay_extract::collectors::{
    AttacksConfig, CombatLogConfig, EntityDeathsConfig, EntitySnapshotsConfig, GameEventsConfig,
    GameInfoConfig, HeaderConfig, MessagesConfig, ModifiersConfig, ParserInfoConfig,
    StringTablesConfig,
};
use replay_extract::config::ParseConfig;
use replay_extract::error::ExtractError;
use replay_extract::session::parse;
use replay_extract::time::{format_game_time, tick_to_game_time};

/// Every collector enabled with default options.
fn all_collectors() -> ParseConfig {
    ParseConfig {
        header: Some(HeaderConfig::default()),
        game_info: Some(GameInfoConfig::default()),
        combat_log: Some(CombatLogConfig::default()),
        entities: Some(EntitySnapshotsConfig::default()),
        game_events: Some(GameEventsConfig::default()),
        modifiers: Some(ModifiersConfig::default()),
        string_tables: Some(StringTablesConfig::default()),
        messages: Some(MessagesConfig::default()),
        parser_info: Some(ParserInfoConfig::default()),
        attacks: Some(AttacksConfig::default()),
        entity_deaths: Some(EntityDeathsConfig::default()),
    }
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_all_collectors_share_one_traversal() {
    let recording = match_recording();
    let result = parse(&recording, &all_collectors()).unwrap();

    assert!(result.success);
    assert_eq!(recording.traversals(), 1);
    assert!(result.header.is_some());
    assert!(result.game_info.is_some());
    assert!(result.combat_log.is_some());
    assert!(result.entities.is_some());
    assert!(result.game_events.is_some());
    assert!(result.modifiers.is_some());
    assert!(result.string_tables.is_some());
    assert!(result.messages.is_some());
    assert!(result.parser_info.is_some());
    assert!(result.attacks.is_some());
    assert!(result.entity_deaths.is_some());
}

#[test]
fn test_source_failure_fails_whole_parse() {
    let recording = match_recording().fail_after(20, "corrupt packet");
    let err = parse(&recording, &all_collectors()).unwrap_err();
    match err {
        ExtractError::Source { reason, .. } => assert!(reason.contains("corrupt packet")),
        other => panic!("expected source error, got {other:?}"),
    }
}

// ============================================================================
// Isolation
// ============================================================================

#[test]
fn test_combat_log_unaffected_by_siblings() {
    let recording = match_recording();
    let alone = parse(
        &recording,
        &ParseConfig {
            combat_log: Some(CombatLogConfig::default()),
            ..ParseConfig::default()
        },
    )
    .unwrap();
    let together = parse(&recording, &all_collectors()).unwrap();

    assert_eq!(alone.combat_log, together.combat_log);
    assert_eq!(recording.traversals(), 2);
}

#[test]
fn test_snapshots_unaffected_by_siblings() {
    let recording = match_recording();
    let alone = parse(
        &recording,
        &ParseConfig {
            entities: Some(EntitySnapshotsConfig::default()),
            ..ParseConfig::default()
        },
    )
    .unwrap();
    let together = parse(&recording, &all_collectors()).unwrap();

    assert_eq!(alone.entities, together.entities);
}

#[test]
fn test_full_buffer_does_not_starve_siblings() {
    let recording = match_recording();
    let config = ParseConfig {
        combat_log: Some(CombatLogConfig::default()),
        messages: Some(MessagesConfig {
            max_messages: 1,
            ..MessagesConfig::default()
        }),
        ..ParseConfig::default()
    };
    let result = parse(&recording, &config).unwrap();

    assert_eq!(result.messages.unwrap().messages.len(), 1);
    // One early entry, one per update tick and the horn.
    assert_eq!(result.combat_log.unwrap().total_entries, 12);
}

// ============================================================================
// Names
// ============================================================================

#[test]
fn test_names_resolved_after_traversal() {
    let recording = match_recording();
    let config = ParseConfig {
        combat_log: Some(CombatLogConfig::default()),
        ..ParseConfig::default()
    };
    let log = parse(&recording, &config).unwrap().combat_log.unwrap();

    // The first entry precedes the table update that names its units.
    let first = &log.entries[0];
    assert_eq!(first.tick, 10);
    assert_eq!(first.attacker_name, "npc_dota_hero_axe");
    assert_eq!(first.target_name, "npc_dota_hero_lina");
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn test_snapshots_follow_roster_updates() {
    let recording = match_recording();
    let config = ParseConfig {
        entities: Some(EntitySnapshotsConfig::default()),
        ..ParseConfig::default()
    };
    let result = parse(&recording, &config).unwrap().entities.unwrap();

    let ticks: Vec<u32> = result.snapshots.iter().map(|s| s.tick).collect();
    assert_eq!(ticks, vec![1800, 3600, 5400]);
    assert_eq!(result.snapshot_count, 3);
    assert_eq!(result.game_start_tick, START_TICK);

    for snapshot in &result.snapshots {
        assert_eq!(snapshot.heroes.len(), 10);
        assert!(snapshot.heroes.iter().all(|h| !h.is_illusion && !h.is_clone));
    }
}

#[test]
fn test_illusions_only_when_requested() {
    let recording = match_recording();
    let config = ParseConfig {
        entities: Some(EntitySnapshotsConfig {
            include_illusions: true,
            ..EntitySnapshotsConfig::default()
        }),
        ..ParseConfig::default()
    };
    let result = parse(&recording, &config).unwrap().entities.unwrap();
    let heroes = &result.snapshots[0].heroes;

    assert_eq!(heroes.len(), 12);
    assert_eq!(heroes.iter().filter(|h| h.is_illusion).count(), 1);
    assert_eq!(heroes.iter().filter(|h| h.is_clone).count(), 1);
    assert!(heroes[..10].iter().all(|h| !h.is_illusion && !h.is_clone));
}

#[test]
fn test_snapshot_positions_and_slots() {
    let recording = match_recording();
    let config = ParseConfig {
        entities: Some(EntitySnapshotsConfig {
            target_ticks: vec![3600],
            ..EntitySnapshotsConfig::default()
        }),
        ..ParseConfig::default()
    };
    let result = parse(&recording, &config).unwrap().entities.unwrap();
    assert_eq!(result.snapshots.len(), 1);

    let snapshot = &result.snapshots[0];
    assert_eq!(snapshot.tick, 3600);
    for (slot, hero) in snapshot.heroes.iter().enumerate() {
        assert_eq!(hero.player_id, slot as i32);
        assert_eq!(hero.team, if slot < 5 { 2 } else { 3 });
    }
    // Slot 0 moved to vec 6 at tick 3600; the others stand on their cells.
    assert!((snapshot.heroes[0].x - 6.0).abs() < 1e-3);
    assert!((snapshot.heroes[3].x - 384.0).abs() < 1e-3);
    assert!(snapshot.heroes[3].y.abs() < 1e-3);
}

#[test]
fn test_entity_death_reported_with_game_time() {
    let recording = match_recording();
    let config = ParseConfig {
        entity_deaths: Some(EntityDeathsConfig::default()),
        ..ParseConfig::default()
    };
    let deaths = parse(&recording, &config).unwrap().entity_deaths.unwrap();

    assert_eq!(deaths.total_events, 1);
    let death = &deaths.events[0];
    assert_eq!(death.tick, DEATH_TICK);
    assert!(death.is_hero);
    assert_eq!(death.team, 3);
    assert!((death.game_time - 180.0).abs() < 1e-3);
    assert_eq!(death.game_time_str, "3:00");
}

// ============================================================================
// Game time
// ============================================================================

#[test]
fn test_game_time_derivation() {
    assert!((tick_to_game_time(900, 0) - 30.0).abs() < 1e-6);
    assert!((tick_to_game_time(0, 900) + 30.0).abs() < 1e-6);
    assert_eq!(format_game_time(tick_to_game_time(0, 900)), "-0:30");
}

#[test]
fn test_combat_log_game_time_from_horn() {
    let recording = match_recording();
    let config = ParseConfig {
        combat_log: Some(CombatLogConfig::default()),
        ..ParseConfig::default()
    };
    let log = parse(&recording, &config).unwrap().combat_log.unwrap();

    assert_eq!(log.game_start_tick, START_TICK);
    assert!((log.game_start_time - 30.0).abs() < 1e-3);

    let before = log.entries.iter().find(|e| e.tick == 600).unwrap();
    assert!((before.game_time + 10.0).abs() < 1e-3);
    let after = log.entries.iter().find(|e| e.tick == 1800).unwrap();
    assert!((after.game_time - 30.0).abs() < 1e-3);
}
