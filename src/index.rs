//! Keyframe index and seek queries.
//!
//! Event sources are forward-only, so "seeking" means replaying from the
//! start. The index built by [`build_index`] records sparse checkpoints
//! (tick, network tick, game time) in one full traversal; callers use
//! [`find_keyframe`] to map a target onto the nearest checkpoint at or
//! before it, and [`snapshot_at`] / [`range_query`] to materialize state or
//! events around a point. Each query opens a fresh source and stops the
//! traversal as soon as it has what it needs.
//!
//! # Example
//!
//! ```
//! use replay_extract::index::{build_index, find_keyframe};
//! use replay_extract::source::{EntityHandle, EntityOp, Recording};
//!
//! let team = EntityHandle::from_parts(2, 1);
//! let mut recording = Recording::new().entity(0, team, "CDOTATeam", EntityOp::Created, []);
//! for tick in (100..=1000).step_by(100) {
//!     recording = recording.entity(tick, team, "CDOTATeam", EntityOp::Updated, []);
//! }
//!
//! let index = build_index(&recording, 300).unwrap();
//! let ticks: Vec<u32> = index.keyframes.iter().map(|k| k.tick).collect();
//! assert_eq!(ticks, vec![300, 600, 900]);
//!
//! let found = find_keyframe(&index, 650).unwrap();
//! assert_eq!(found.keyframe.tick, 600);
//! assert!(!found.exact);
//! ```

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::collectors::combat_log::{resolve, RawEntry};
use crate::collectors::{Bounded, CombatLogEntry, MessageEvent};
use crate::config::{RangeConfig, SnapshotConfig};
use crate::entities::{EntitySnapshot, Reconstructor};
use crate::error::Result;
use crate::names::NameTables;
use crate::source::{EntityOp, EventRecord, KindSet, Payload, Record, RecordKind, SourceOpener};
use crate::time::COMBAT_LOG_GAME_STATE;

/// Default spacing between keyframes: one minute of game time.
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 1800;

/// Kinds every seek traversal reads: entity ops for state and the clock,
/// combat log entries for the game-state signal.
const SEEK_KINDS: KindSet = KindSet::of(&[RecordKind::Entity, RecordKind::CombatLog]);

/// Feeds one record into the reconstructor.
fn track(entities: &mut Reconstructor, record: &Record) {
    match &record.event {
        EventRecord::Entity(event) => {
            entities.apply(record.tick, event);
        }
        EventRecord::Message(msg) => {
            if let Payload::CombatLog(entry) = &msg.payload {
                if entry.log_type == COMBAT_LOG_GAME_STATE {
                    entities.observe_game_state(record.tick, entry.value, entry.timestamp);
                }
            }
        }
        EventRecord::Table(_) => {}
    }
}

// ============================================================================
// Index
// ============================================================================

/// A seek checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Tick of the entity update that produced the checkpoint.
    pub tick: u32,
    /// Network tick at that point.
    pub net_tick: u32,
    /// Seconds since the match start, 0.0 if the start was never seen.
    pub game_time: f32,
}

/// Checkpoints from one full traversal, in ascending tick order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeIndex {
    /// Checkpoints; consecutive ticks are at least `interval_ticks` apart.
    pub keyframes: Vec<Keyframe>,
    /// Spacing the index was built with.
    pub interval_ticks: u32,
    /// Last tick of the stream.
    pub total_ticks: u32,
    /// Match start tick, 0 if never seen.
    pub game_start_tick: u32,
}

/// The checkpoint chosen for a target tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyframeMatch {
    /// The checkpoint.
    pub keyframe: Keyframe,
    /// True if the checkpoint tick equals the target.
    pub exact: bool,
}

/// Builds a keyframe index in one full traversal.
///
/// A checkpoint is taken on an entity update whenever at least
/// `interval_ticks` have passed since the previous one, counting the first
/// gap from tick 0. An interval of 0 uses [`DEFAULT_KEYFRAME_INTERVAL`].
///
/// # Errors
///
/// Returns the source error if decoding fails; no partial index is kept.
pub fn build_index(opener: &dyn SourceOpener, interval_ticks: u32) -> Result<KeyframeIndex> {
    let interval = if interval_ticks == 0 {
        DEFAULT_KEYFRAME_INTERVAL
    } else {
        interval_ticks
    };

    let mut source = opener.open()?;
    let mut entities = Reconstructor::new();
    let mut keyframes: Vec<Keyframe> = Vec::new();
    let mut last = 0_u32;

    source.start(SEEK_KINDS, &mut |record: &Record| {
        track(&mut entities, record);
        if let EventRecord::Entity(event) = &record.event {
            if event.op == EntityOp::Updated && record.tick.saturating_sub(last) >= interval {
                keyframes.push(Keyframe {
                    tick: record.tick,
                    net_tick: record.net_tick,
                    game_time: 0.0,
                });
                last = record.tick;
            }
        }
        ControlFlow::Continue(())
    })?;

    let clock = entities.clock();
    for keyframe in &mut keyframes {
        keyframe.game_time = clock.game_time(keyframe.tick);
    }

    let index = KeyframeIndex {
        keyframes,
        interval_ticks: interval,
        total_ticks: source.tick(),
        game_start_tick: clock.start_tick_or_zero(),
    };
    tracing::info!(
        keyframes = index.keyframes.len(),
        interval,
        total_ticks = index.total_ticks,
        game_start_tick = index.game_start_tick,
        "index built"
    );
    Ok(index)
}

/// Finds the greatest checkpoint at or before `target_tick`.
///
/// A target before the first checkpoint maps to the first checkpoint. An
/// empty index yields `None`.
#[must_use]
pub fn find_keyframe(index: &KeyframeIndex, target_tick: u32) -> Option<KeyframeMatch> {
    let after = index.keyframes.partition_point(|k| k.tick <= target_tick);
    let keyframe = *index.keyframes.get(after.saturating_sub(1))?;
    Some(KeyframeMatch {
        keyframe,
        exact: keyframe.tick == target_tick,
    })
}

// ============================================================================
// Snapshot
// ============================================================================

/// Captures entity state at the first entity op at or after
/// `config.target_tick`.
///
/// The source is replayed from the start and stopped right after that op
/// has been applied. A target past the end of the stream captures the final
/// state.
///
/// # Errors
///
/// - `ExtractError::Config` if the config is rejected
/// - the source error if decoding fails before the target is reached
pub fn snapshot_at(opener: &dyn SourceOpener, config: &SnapshotConfig) -> Result<EntitySnapshot> {
    config.validate()?;

    let target = config.target_tick;
    let mut source = opener.open()?;
    let mut entities = Reconstructor::new();
    let mut stop: Option<(u32, u32)> = None;

    source.start(SEEK_KINDS, &mut |record: &Record| {
        track(&mut entities, record);
        if matches!(record.event, EventRecord::Entity(_)) && record.tick >= target {
            stop = Some((record.tick, record.net_tick));
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    })?;

    let (tick, net_tick) = stop.unwrap_or((source.tick(), source.net_tick()));
    tracing::debug!(target, tick, reached = stop.is_some(), "snapshot captured");
    Ok(entities.capture(tick, net_tick, &config.capture_options()))
}

// ============================================================================
// Range
// ============================================================================

/// Events inside a tick range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeResult {
    /// Requested first tick.
    pub start_tick: u32,
    /// Requested last tick.
    pub end_tick: u32,
    /// Tick of the first record inside the range, 0 if none.
    pub actual_start_tick: u32,
    /// Tick of the last record inside the range, 0 if none.
    pub actual_end_tick: u32,
    /// Combat log entries inside the range, names resolved.
    pub combat_log: Vec<CombatLogEntry>,
    /// Other messages inside the range, when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<MessageEvent>,
    /// Entity ops inside the range.
    pub entity_ops: usize,
}

/// Replays from the start and collects events with
/// `start_tick <= tick <= end_tick`, stopping at the first record past the
/// range.
///
/// # Errors
///
/// - `ExtractError::Config` if the range is inverted
/// - the source error if decoding fails before the range ends
pub fn range_query(opener: &dyn SourceOpener, config: &RangeConfig) -> Result<RangeResult> {
    config.validate()?;

    let mut kinds = SEEK_KINDS.union(KindSet::of(&[RecordKind::Table]));
    if config.include_messages {
        kinds = kinds.union(KindSet::MESSAGES);
    }

    let mut source = opener.open()?;
    let mut entities = Reconstructor::new();
    let mut tables = NameTables::new();
    let mut raw: Bounded<RawEntry> = Bounded::new("range_combat_log", config.max_events);
    let mut messages: Bounded<MessageEvent> = Bounded::new("range_messages", config.max_events);
    let mut entity_ops = 0;
    let mut first: Option<u32> = None;
    let mut last = 0;

    source.start(kinds, &mut |record: &Record| {
        if record.tick > config.end_tick {
            return ControlFlow::Break(());
        }
        track(&mut entities, record);
        if let EventRecord::Table(entry) = &record.event {
            tables.observe(entry);
        }
        if record.tick < config.start_tick {
            return ControlFlow::Continue(());
        }

        first.get_or_insert(record.tick);
        last = record.tick;
        match &record.event {
            EventRecord::Entity(_) => entity_ops += 1,
            EventRecord::Message(msg) => match &msg.payload {
                Payload::CombatLog(entry) => {
                    raw.push(RawEntry {
                        tick: record.tick,
                        net_tick: record.net_tick,
                        record: entry.clone(),
                    });
                }
                payload if config.include_messages => {
                    messages.push(MessageEvent {
                        type_name: msg.type_name.clone(),
                        tick: record.tick,
                        net_tick: record.net_tick,
                        data: payload.to_json(),
                    });
                }
                _ => {}
            },
            EventRecord::Table(_) => {}
        }
        ControlFlow::Continue(())
    })?;

    let names = tables.resolver(Some(source.as_ref()));
    let clock = entities.clock();
    let combat_log = raw
        .into_inner()
        .into_iter()
        .map(|entry| resolve(clock, &names, entry))
        .collect();

    Ok(RangeResult {
        start_tick: config.start_tick,
        end_tick: config.end_tick,
        actual_start_tick: first.unwrap_or(0),
        actual_end_tick: if first.is_some() { last } else { 0 },
        combat_log,
        messages: messages.into_inner(),
        entity_ops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::source::{CombatLogRecord, EntityHandle, Recording};

    fn updates(ticks: &[u32]) -> Recording {
        let team = EntityHandle::from_parts(2, 1);
        let mut recording = Recording::new().entity(0, team, "CDOTATeam", EntityOp::Created, []);
        for &tick in ticks {
            recording = recording.entity(tick, team, "CDOTATeam", EntityOp::Updated, []);
        }
        recording
    }

    fn index_of(ticks: &[u32]) -> KeyframeIndex {
        KeyframeIndex {
            keyframes: ticks
                .iter()
                .map(|&tick| Keyframe {
                    tick,
                    net_tick: tick,
                    game_time: 0.0,
                })
                .collect(),
            interval_ticks: 100,
            total_ticks: ticks.last().copied().unwrap_or(0),
            game_start_tick: 0,
        }
    }

    // ========================================================================
    // Index
    // ========================================================================

    #[test]
    fn test_first_gap_counts_from_tick_zero() {
        let ticks: Vec<u32> = (100..=1000).step_by(100).collect();
        let index = build_index(&updates(&ticks), 300).unwrap();
        let keyframes: Vec<u32> = index.keyframes.iter().map(|k| k.tick).collect();
        assert_eq!(keyframes, vec![300, 600, 900]);
        assert_eq!(index.total_ticks, 1000);

        let late = build_index(&updates(&[5000, 5010]), 1800).unwrap();
        assert_eq!(late.keyframes.len(), 1);
        assert_eq!(late.keyframes[0].tick, 5000);

        let short = build_index(&updates(&[10, 1000]), 1800).unwrap();
        assert!(short.keyframes.is_empty());
        assert_eq!(short.total_ticks, 1000);
    }

    #[test]
    fn test_zero_interval_uses_default() {
        let index = build_index(&updates(&[10, 1000, 1810, 3620]), 0).unwrap();
        assert_eq!(index.interval_ticks, DEFAULT_KEYFRAME_INTERVAL);
        let ticks: Vec<u32> = index.keyframes.iter().map(|k| k.tick).collect();
        assert_eq!(ticks, vec![1810, 3620]);
    }

    #[test]
    fn test_game_time_recomputed_from_start() {
        let recording = updates(&[300, 600, 1200]).message(
            1200,
            Payload::CombatLog(CombatLogRecord {
                log_type: COMBAT_LOG_GAME_STATE,
                value: 5,
                ..CombatLogRecord::default()
            }),
        );
        let index = build_index(&recording, 300).unwrap();
        assert_eq!(index.game_start_tick, 1200);
        let times: Vec<f32> = index.keyframes.iter().map(|k| k.game_time).collect();
        assert_eq!(times, vec![-30.0, -20.0, 0.0]);
    }

    #[test]
    fn test_index_error_keeps_nothing() {
        let recording = updates(&[100, 200, 300]).fail_after(2, "bad frame");
        let err = build_index(&recording, 1).unwrap_err();
        assert!(matches!(err, ExtractError::Source { .. }));
    }

    #[test]
    fn test_find_keyframe() {
        let index = index_of(&[100, 200, 300]);
        let hit = find_keyframe(&index, 200).unwrap();
        assert_eq!(hit.keyframe.tick, 200);
        assert!(hit.exact);

        assert_eq!(find_keyframe(&index, 299).unwrap().keyframe.tick, 200);
        assert_eq!(find_keyframe(&index, 10_000).unwrap().keyframe.tick, 300);

        let before = find_keyframe(&index, 50).unwrap();
        assert_eq!(before.keyframe.tick, 100);
        assert!(!before.exact);

        assert!(find_keyframe(&KeyframeIndex::default(), 50).is_none());
    }

    // ========================================================================
    // Snapshot and range
    // ========================================================================

    #[test]
    fn test_snapshot_stops_at_target() {
        let recording = updates(&[100, 200, 300, 400]);
        let snapshot = snapshot_at(
            &recording,
            &SnapshotConfig {
                target_tick: 250,
                ..SnapshotConfig::default()
            },
        )
        .unwrap();
        assert_eq!(snapshot.tick, 300);

        let past_end = snapshot_at(
            &recording,
            &SnapshotConfig {
                target_tick: 9999,
                ..SnapshotConfig::default()
            },
        )
        .unwrap();
        assert_eq!(past_end.tick, 400);
    }

    #[test]
    fn test_range_counts_and_bounds() {
        let team = EntityHandle::from_parts(2, 1);
        let hit = |value: i32| {
            Payload::CombatLog(CombatLogRecord {
                log_type: 0,
                attacker_name: 3,
                value,
                ..CombatLogRecord::default()
            })
        };
        let recording = Recording::new()
            .entity(100, team, "CDOTATeam", EntityOp::Created, [])
            .message(150, hit(150))
            .entity(200, team, "CDOTATeam", EntityOp::Updated, [])
            .message(250, hit(250))
            .table(260, "CombatLogNames", 3, "npc_dota_hero_axe")
            .entity(300, team, "CDOTATeam", EntityOp::Updated, [])
            .entity(400, team, "CDOTATeam", EntityOp::Updated, [])
            .entity(500, team, "CDOTATeam", EntityOp::Updated, [])
            .message(600, hit(600));

        let result = range_query(
            &recording,
            &RangeConfig {
                start_tick: 200,
                end_tick: 400,
                ..RangeConfig::default()
            },
        )
        .unwrap();
        assert_eq!(result.entity_ops, 3);
        assert_eq!(result.actual_start_tick, 200);
        assert_eq!(result.actual_end_tick, 400);
        assert_eq!(result.combat_log.len(), 1);
        assert_eq!(result.combat_log[0].tick, 250);
        assert_eq!(result.combat_log[0].attacker_name, "npc_dota_hero_axe");
        assert!(result.messages.is_empty());
    }

    #[test]
    fn test_range_with_messages_and_cap() {
        let recording = Recording::new()
            .message(10, Payload::ServerInfo(crate::source::ServerInfo::default()))
            .message(20, Payload::ServerInfo(crate::source::ServerInfo::default()))
            .message(30, Payload::ServerInfo(crate::source::ServerInfo::default()));
        let result = range_query(
            &recording,
            &RangeConfig {
                start_tick: 0,
                end_tick: 100,
                include_messages: true,
                max_events: 2,
            },
        )
        .unwrap();
        assert_eq!(result.messages.len(), 2);
        assert_eq!(result.messages[0].type_name, "CSVCMsg_ServerInfo");
        assert_eq!(result.actual_end_tick, 30);
    }

    #[test]
    fn test_range_rejects_inverted() {
        let err = range_query(
            &Recording::new(),
            &RangeConfig {
                start_tick: 5,
                end_tick: 1,
                ..RangeConfig::default()
            },
        )
        .unwrap_err();
        assert!(err.is_config());
    }
}
