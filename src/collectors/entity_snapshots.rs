//! Periodic hero-centric entity snapshots.
//!
//! Captures are attempted whenever the roster entity is updated, since that
//! is when per-player data is consistent. A capture happens if the
//! configured interval has elapsed since the previous one, or if the next
//! requested target tick has been reached.

use serde::{Deserialize, Serialize};

use super::{Bounded, Collect, CollectorStatus, FinalizeContext};
use crate::entities::reconstructor::PLAYER_RESOURCE_CLASS;
use crate::entities::{CaptureOptions, EntitySnapshot, Reconstructor};
use crate::source::{EntityOp, EventRecord, KindSet, Record, RecordKind};

/// Default capture interval: one minute of game time.
pub const DEFAULT_INTERVAL_TICKS: u32 = 1800;

/// Entity snapshot collector options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySnapshotsConfig {
    /// Minimum ticks between interval captures.
    pub interval_ticks: u32,
    /// Maximum snapshots kept; 0 is unbounded.
    pub max_snapshots: usize,
    /// Explicit capture ticks. When given, the interval is ignored.
    pub target_ticks: Vec<u32>,
    /// Only report these heroes (`npc_dota_hero_*` names).
    pub target_heroes: Vec<String>,
    /// Include illusions and clones.
    pub include_illusions: bool,
    /// Include alive lane and neutral creeps.
    pub include_creeps: bool,
    /// Dump raw property maps for `entity_classes`.
    pub include_raw: bool,
    /// Class name fragments whose entities are dumped when `include_raw`
    /// is set.
    pub entity_classes: Vec<String>,
}

impl Default for EntitySnapshotsConfig {
    fn default() -> Self {
        Self {
            interval_ticks: DEFAULT_INTERVAL_TICKS,
            max_snapshots: 0,
            target_ticks: Vec::new(),
            target_heroes: Vec::new(),
            include_illusions: false,
            include_creeps: false,
            include_raw: false,
            entity_classes: Vec::new(),
        }
    }
}

impl EntitySnapshotsConfig {
    pub(crate) fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            include_illusions: self.include_illusions,
            include_creeps: self.include_creeps,
            target_heroes: self.target_heroes.clone(),
            raw_classes: if self.include_raw {
                self.entity_classes.clone()
            } else {
                Vec::new()
            },
        }
    }
}

/// Captured snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntitySnapshotsResult {
    /// Snapshots in tick order.
    pub snapshots: Vec<EntitySnapshot>,
    /// Number of snapshots.
    pub snapshot_count: usize,
    /// Last tick of the stream.
    pub total_ticks: u32,
    /// Match start tick, 0 if never seen.
    pub game_start_tick: u32,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug)]
pub(crate) struct EntitySnapshotsCollector {
    interval: u32,
    targets: Vec<u32>,
    next_target: usize,
    options: CaptureOptions,
    snapshots: Bounded<EntitySnapshot>,
    last_capture_tick: u32,
}

impl EntitySnapshotsCollector {
    pub fn new(config: &EntitySnapshotsConfig) -> Self {
        let mut targets = config.target_ticks.clone();
        targets.sort_unstable();
        targets.dedup();
        Self {
            interval: config.interval_ticks,
            targets,
            next_target: 0,
            options: config.capture_options(),
            snapshots: Bounded::new("entities", config.max_snapshots),
            last_capture_tick: 0,
        }
    }

    fn due(&mut self, tick: u32) -> bool {
        if self.targets.is_empty() {
            return tick >= self.last_capture_tick.saturating_add(self.interval);
        }
        match self.targets.get(self.next_target) {
            Some(target) if tick >= *target => {
                self.next_target += 1;
                true
            }
            _ => false,
        }
    }
}

impl Collect for EntitySnapshotsCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::Entity, RecordKind::CombatLog]);
    type Output = EntitySnapshotsResult;

    fn observe(&mut self, entities: &Reconstructor, record: &Record) {
        let EventRecord::Entity(event) = &record.event else {
            return;
        };
        if event.op != EntityOp::Updated || !event.class_name.contains(PLAYER_RESOURCE_CLASS) {
            return;
        }
        if self.snapshots.is_full() || !self.due(record.tick) {
            return;
        }

        let snapshot = entities.capture(record.tick, record.net_tick, &self.options);
        if snapshot.heroes.is_empty() {
            return;
        }
        self.snapshots.push(snapshot);
        self.last_capture_tick = record.tick;
    }

    fn finalize(self, ctx: &FinalizeContext<'_>) -> EntitySnapshotsResult {
        let clock = ctx.entities.clock();
        let mut snapshots = self.snapshots.into_inner();
        for snapshot in &mut snapshots {
            snapshot.game_time = clock.game_time(snapshot.tick);
        }

        EntitySnapshotsResult {
            snapshot_count: snapshots.len(),
            snapshots,
            total_ticks: ctx.tick,
            game_start_tick: clock.start_tick_or_zero(),
            status: CollectorStatus::ok(),
        }
    }
}
