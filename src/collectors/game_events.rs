//! Legacy game events, decoded against their descriptor list.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Bounded, Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{
    EventRecord, GameEventKey, GameEventList, GameEventRecord, KindSet, Payload, Record, RecordKind,
};

/// Game event collector options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameEventsConfig {
    /// Keep events whose name contains this fragment; empty keeps all.
    pub event_filter: String,
    /// Keep only these exact event names; empty keeps all.
    pub event_names: Vec<String>,
    /// Maximum events captured; 0 is unbounded.
    pub max_events: usize,
    /// Report every descriptor name in `event_types`.
    pub capture_types: bool,
}

/// One decoded game event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameEventData {
    /// Event name from the descriptor list.
    pub name: String,
    /// Tick the event was decoded at.
    pub tick: u32,
    /// Network tick the event was decoded at.
    pub net_tick: u32,
    /// Key name → typed value.
    pub fields: BTreeMap<String, Value>,
}

/// Captured game events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameEventsResult {
    /// Events in stream order.
    pub events: Vec<GameEventData>,
    /// Descriptor names, if requested.
    pub event_types: Vec<String>,
    /// Number of events captured.
    pub total_events: usize,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug)]
struct Descriptor {
    name: String,
    keys: Vec<String>,
}

/// Event id → name and key layout, learned from descriptor lists.
#[derive(Debug, Default)]
pub(crate) struct Descriptors {
    by_id: HashMap<i32, Descriptor>,
}

impl Descriptors {
    /// Registers every descriptor in `list`.
    pub fn learn(&mut self, list: &GameEventList) {
        for d in &list.descriptors {
            self.by_id.insert(
                d.event_id,
                Descriptor {
                    name: d.name.clone(),
                    keys: d.keys.iter().map(|k| k.name.clone()).collect(),
                },
            );
        }
    }

    /// Names an event, preferring the name it carries itself.
    pub fn name(&self, event: &GameEventRecord) -> Option<String> {
        event
            .event_name
            .clone()
            .or_else(|| self.by_id.get(&event.event_id).map(|d| d.name.clone()))
    }

    /// Decodes an event's positional keys into named, typed fields.
    pub fn fields(&self, event: &GameEventRecord) -> BTreeMap<String, Value> {
        let key_names = self
            .by_id
            .get(&event.event_id)
            .map_or(&[][..], |d| d.keys.as_slice());
        event
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let field = key_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("field_{i}"));
                key_value(key).map(|v| (field, v))
            })
            .collect()
    }
}

/// Converts one positional key to JSON according to its wire type.
fn key_value(key: &GameEventKey) -> Option<Value> {
    let value = match key.key_type {
        1 => Value::from(key.val_string.clone().unwrap_or_default()),
        2 => Value::from(key.val_float.unwrap_or_default()),
        3 => Value::from(key.val_long.unwrap_or_default()),
        4 => Value::from(key.val_short.unwrap_or_default()),
        5 => Value::from(key.val_byte.unwrap_or_default()),
        6 => Value::from(key.val_bool.unwrap_or_default()),
        7 => Value::from(key.val_uint64.unwrap_or_default()),
        _ => return None,
    };
    Some(value)
}

#[derive(Debug)]
pub(crate) struct GameEventsCollector {
    config: GameEventsConfig,
    descriptors: Descriptors,
    event_types: Vec<String>,
    events: Bounded<GameEventData>,
}

impl GameEventsCollector {
    pub fn new(config: &GameEventsConfig) -> Self {
        Self {
            config: config.clone(),
            descriptors: Descriptors::default(),
            event_types: Vec::new(),
            events: Bounded::new("game_events", config.max_events),
        }
    }

    fn wants(&self, name: &str) -> bool {
        (self.config.event_filter.is_empty() || name.contains(&self.config.event_filter))
            && (self.config.event_names.is_empty()
                || self.config.event_names.iter().any(|n| n == name))
    }
}

impl Collect for GameEventsCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::GameEventList, RecordKind::GameEvent]);
    type Output = GameEventsResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        let EventRecord::Message(msg) = &record.event else {
            return;
        };
        match &msg.payload {
            Payload::GameEventList(list) => {
                if self.config.capture_types {
                    self.event_types
                        .extend(list.descriptors.iter().map(|d| d.name.clone()));
                }
                self.descriptors.learn(list);
            }
            Payload::GameEvent(event) => {
                if self.events.is_full() {
                    return;
                }
                let Some(name) = self.descriptors.name(event) else {
                    return;
                };
                if !self.wants(&name) {
                    return;
                }
                let fields = self.descriptors.fields(event);

                self.events.push(GameEventData {
                    name,
                    tick: record.tick,
                    net_tick: record.net_tick,
                    fields,
                });
            }
            _ => {}
        }
    }

    fn finalize(self, _ctx: &FinalizeContext<'_>) -> GameEventsResult {
        let events = self.events.into_inner();
        GameEventsResult {
            total_events: events.len(),
            events,
            event_types: self.event_types,
            status: CollectorStatus::ok(),
        }
    }
}
