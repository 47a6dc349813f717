//! Attack projectiles.

use serde::{Deserialize, Serialize};

use super::{Bounded, Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{EntityHandle, EventRecord, KindSet, Payload, Record, RecordKind};
use crate::time::format_game_time;

/// Attack collector options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttacksConfig {
    /// Maximum events captured; 0 is unbounded.
    pub max_events: usize,
}

/// One attack projectile launch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackEvent {
    /// Tick of the launch message.
    pub tick: u32,
    /// Entity index of the attacker.
    pub source_index: u32,
    /// Entity index of the target.
    pub target_index: u32,
    /// Raw attacker handle.
    pub source_handle: EntityHandle,
    /// Raw target handle.
    pub target_handle: EntityHandle,
    /// Projectile move speed.
    pub projectile_speed: i32,
    /// Whether the projectile can be dodged.
    pub dodgeable: bool,
    /// Tick the projectile was launched at.
    pub launch_tick: u32,
    /// Seconds since the match start.
    pub game_time: f32,
    /// `game_time` as a clock string.
    pub game_time_str: String,
}

/// Captured attacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttacksResult {
    /// Events in stream order.
    pub events: Vec<AttackEvent>,
    /// Number of events captured.
    pub total_events: usize,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug)]
pub(crate) struct AttacksCollector {
    events: Bounded<AttackEvent>,
}

impl AttacksCollector {
    pub fn new(config: &AttacksConfig) -> Self {
        Self {
            events: Bounded::new("attacks", config.max_events),
        }
    }
}

impl Collect for AttacksCollector {
    // Entity and combat log records feed the match clock used at finalize.
    const KINDS: KindSet = KindSet::of(&[
        RecordKind::Projectile,
        RecordKind::Entity,
        RecordKind::CombatLog,
    ]);
    type Output = AttacksResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        let EventRecord::Message(msg) = &record.event else {
            return;
        };
        let Payload::Projectile(projectile) = &msg.payload else {
            return;
        };
        if !projectile.is_attack {
            return;
        }
        self.events.push(AttackEvent {
            tick: record.tick,
            source_index: projectile.source.index(),
            target_index: projectile.target.index(),
            source_handle: projectile.source,
            target_handle: projectile.target,
            projectile_speed: projectile.move_speed,
            dodgeable: projectile.dodgeable,
            launch_tick: projectile.launch_tick,
            game_time: 0.0,
            game_time_str: String::new(),
        });
    }

    fn finalize(self, ctx: &FinalizeContext<'_>) -> AttacksResult {
        let clock = ctx.entities.clock();
        let mut events = self.events.into_inner();
        for event in &mut events {
            event.game_time = clock.game_time(event.tick);
            event.game_time_str = format_game_time(event.game_time);
        }
        AttacksResult {
            total_events: events.len(),
            events,
            status: CollectorStatus::ok(),
        }
    }
}
