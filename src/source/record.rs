//! Typed records delivered by an event source.
//!
//! A traversal yields a strictly ordered sequence of [`Record`]s. Each one
//! carries the tick it was decoded at and one of three event shapes: an
//! entity delta, a protocol message, or a string-table update.
//!
//! Records are plain serde types so they can be captured to and replayed
//! from JSON-lines dumps:
//!
//! ```
//! use replay_extract::source::{EventRecord, Record, RecordKind};
//!
//! let line = r#"{"tick":30,"net_tick":31,"event":{"table":{"table":"CombatLogNames","index":5,"key":"npc_dota_hero_axe"}}}"#;
//! let record: Record = serde_json::from_str(line).unwrap();
//! assert_eq!(record.kind(), RecordKind::Table);
//! assert!(matches!(record.event, EventRecord::Table(_)));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Mask selecting the entity index from a handle.
pub const HANDLE_INDEX_MASK: u64 = 0x3FFF;

/// Number of low bits of a handle occupied by the entity index.
pub const HANDLE_INDEX_BITS: u32 = 14;

/// Handle value the game writes into empty handle fields.
pub const INVALID_HANDLE: u64 = 0x00FF_FFFF;

/// Property name → value deltas carried by an entity op.
pub type PropMap = BTreeMap<String, PropValue>;

/// A single decoded record and the position it was decoded at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Server tick of the record.
    pub tick: u32,
    /// Network tick of the record.
    #[serde(default)]
    pub net_tick: u32,
    /// The event itself.
    pub event: EventRecord,
}

impl Record {
    /// Creates a record with `net_tick` equal to `tick`.
    #[must_use]
    pub fn new(tick: u32, event: EventRecord) -> Self {
        Self {
            tick,
            net_tick: tick,
            event,
        }
    }

    /// Returns the dispatch kind of this record.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match &self.event {
            EventRecord::Entity(_) => RecordKind::Entity,
            EventRecord::Table(_) => RecordKind::Table,
            EventRecord::Message(msg) => msg.payload.kind(),
        }
    }
}

/// The three shapes of event an event source produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRecord {
    /// An entity was created, updated or deleted.
    Entity(EntityEvent),
    /// A protocol message was decoded.
    Message(ProtocolMessage),
    /// A string table gained or changed an entry.
    Table(TableEntry),
}

// ============================================================================
// Entities
// ============================================================================

/// An opaque entity reference: entity index in the low bits, serial above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityHandle(pub u64);

impl EntityHandle {
    /// Builds a handle from its index and serial parts.
    #[must_use]
    pub fn from_parts(index: u32, serial: u32) -> Self {
        Self((u64::from(serial) << HANDLE_INDEX_BITS) | (u64::from(index) & HANDLE_INDEX_MASK))
    }

    /// Entity index the handle points at.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn index(self) -> u32 {
        (self.0 & HANDLE_INDEX_MASK) as u32
    }

    /// Generation counter used to detect index reuse.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn serial(self) -> u32 {
        (self.0 >> HANDLE_INDEX_BITS) as u32
    }

    /// Returns false for the empty-field sentinels (zero and `0xFFFFFF`).
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 != 0 && self.0 != INVALID_HANDLE
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index(), self.serial())
    }
}

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityOp {
    /// The entity entered the world; its deltas are the full initial state.
    Created,
    /// Some properties changed.
    Updated,
    /// The entity left the world.
    Deleted,
}

/// An entity create/update/delete with its property deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    /// Handle of the entity.
    pub handle: EntityHandle,
    /// Network class name, for example `CDOTA_Unit_Hero_Axe`.
    pub class_name: String,
    /// The operation.
    pub op: EntityOp,
    /// Changed properties. Empty for deletes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deltas: PropMap,
}

/// A decoded entity property value.
///
/// Values are kept in the widest form of their family; accessors coerce
/// between numeric families the way the game's own field readers do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    /// Boolean field.
    Bool(bool),
    /// Signed integer field.
    Int(i64),
    /// Unsigned integer that does not fit an `i64`.
    UInt(u64),
    /// Floating point field.
    Float(f64),
    /// String field.
    Str(String),
}

impl PropValue {
    /// Integer view of the value. Floats truncate, booleans map to 0/1.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            PropValue::UInt(v) => i64::try_from(*v).ok(),
            PropValue::Float(v) => Some(*v as i64),
            PropValue::Bool(v) => Some(i64::from(*v)),
            PropValue::Str(_) => None,
        }
    }

    /// Unsigned view of the value, used for handles.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropValue::UInt(v) => Some(*v),
            PropValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Float view of the value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PropValue::Float(v) => Some(*v as f32),
            PropValue::Int(v) => Some(*v as f32),
            PropValue::UInt(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Boolean view of the value. Integers are true when non-zero.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(v) => Some(*v),
            PropValue::Int(v) => Some(*v != 0),
            PropValue::UInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// String view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

impl From<i32> for PropValue {
    fn from(v: i32) -> Self {
        PropValue::Int(i64::from(v))
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        PropValue::Int(i64::from(v))
    }
}

impl From<u64> for PropValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(PropValue::UInt(v), PropValue::Int)
    }
}

impl From<f32> for PropValue {
    fn from(v: f32) -> Self {
        PropValue::Float(f64::from(v))
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Str(v.to_string())
    }
}

impl From<EntityHandle> for PropValue {
    fn from(v: EntityHandle) -> Self {
        PropValue::from(v.0)
    }
}

// ============================================================================
// String tables
// ============================================================================

/// A string table entry observed during traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Table name, for example `CombatLogNames`.
    pub table: String,
    /// Entry index within the table.
    pub index: u32,
    /// Entry key; this is the string index lookups resolve to.
    pub key: String,
    /// Optional entry value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

// ============================================================================
// Protocol messages
// ============================================================================

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    /// Message type name, for example `CMsgDOTACombatLogEntry`.
    pub type_name: String,
    /// Decoded body.
    pub payload: Payload,
}

impl ProtocolMessage {
    /// Wraps a payload under its canonical type name.
    #[must_use]
    pub fn new(payload: Payload) -> Self {
        Self {
            type_name: payload.type_name().to_string(),
            payload,
        }
    }
}

/// Message bodies the collectors interpret, plus an opaque fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Demo file header.
    FileHeader(FileHeader),
    /// Demo file trailer with match info and draft.
    FileInfo(FileInfo),
    /// One combat log entry with name-table indices.
    CombatLog(CombatLogRecord),
    /// Game event descriptor list.
    GameEventList(GameEventList),
    /// A game event instance.
    GameEvent(GameEventRecord),
    /// Modifier (buff/debuff) applied to a unit.
    Modifier(ModifierRecord),
    /// Projectile launch.
    Projectile(ProjectileRecord),
    /// Server info sent at connection.
    ServerInfo(ServerInfo),
    /// A string table was created.
    CreateStringTable(CreateStringTable),
    /// Any message the collectors do not interpret.
    Opaque(serde_json::Value),
}

impl Payload {
    /// Canonical message type name for this payload.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::FileHeader(_) => "CDemoFileHeader",
            Payload::FileInfo(_) => "CDemoFileInfo",
            Payload::CombatLog(_) => "CMsgDOTACombatLogEntry",
            Payload::GameEventList(_) => "CMsgSource1LegacyGameEventList",
            Payload::GameEvent(_) => "CMsgSource1LegacyGameEvent",
            Payload::Modifier(_) => "CDOTAUserMsg_ModifierBuff",
            Payload::Projectile(_) => "CDOTAUserMsg_TE_Projectile",
            Payload::ServerInfo(_) => "CSVCMsg_ServerInfo",
            Payload::CreateStringTable(_) => "CSVCMsg_CreateStringTable",
            Payload::Opaque(_) => "Opaque",
        }
    }

    /// The message body as untagged JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            Payload::FileHeader(m) => serde_json::to_value(m),
            Payload::FileInfo(m) => serde_json::to_value(m),
            Payload::CombatLog(m) => serde_json::to_value(m),
            Payload::GameEventList(m) => serde_json::to_value(m),
            Payload::GameEvent(m) => serde_json::to_value(m),
            Payload::Modifier(m) => serde_json::to_value(m),
            Payload::Projectile(m) => serde_json::to_value(m),
            Payload::ServerInfo(m) => serde_json::to_value(m),
            Payload::CreateStringTable(m) => serde_json::to_value(m),
            Payload::Opaque(v) => return v.clone(),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Dispatch kind of this payload.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Payload::FileHeader(_) => RecordKind::FileHeader,
            Payload::FileInfo(_) => RecordKind::FileInfo,
            Payload::CombatLog(_) => RecordKind::CombatLog,
            Payload::GameEventList(_) => RecordKind::GameEventList,
            Payload::GameEvent(_) => RecordKind::GameEvent,
            Payload::Modifier(_) => RecordKind::Modifier,
            Payload::Projectile(_) => RecordKind::Projectile,
            Payload::ServerInfo(_) => RecordKind::ServerInfo,
            Payload::CreateStringTable(_) => RecordKind::CreateStringTable,
            Payload::Opaque(_) => RecordKind::OtherMessage,
        }
    }
}

/// Demo file header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct FileHeader {
    pub map_name: String,
    pub server_name: String,
    pub client_name: String,
    pub game_directory: String,
    pub network_protocol: i32,
    pub demo_file_stamp: String,
    pub build_num: i32,
    pub game: String,
    pub server_start_tick: i32,
}

/// Match summary written at the end of a demo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct FileInfo {
    pub playback_time: f32,
    pub playback_ticks: i32,
    pub playback_frames: i32,
    pub match_id: u64,
    pub game_mode: i32,
    pub game_winner: i32,
    pub league_id: u32,
    pub end_time: u32,
    pub radiant_team_id: u32,
    pub dire_team_id: u32,
    pub radiant_team_tag: String,
    pub dire_team_tag: String,
    pub players: Vec<PlayerInfo>,
    pub picks_bans: Vec<HeroSelect>,
}

/// A player entry in the match summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct PlayerInfo {
    pub hero_name: String,
    pub player_name: String,
    pub is_fake_client: bool,
    pub steam_id: u64,
    pub game_team: i32,
}

/// A draft pick or ban.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeroSelect {
    /// True for a pick, false for a ban.
    pub is_pick: bool,
    /// Team (2 = Radiant, 3 = Dire).
    pub team: u32,
    /// Hero id.
    pub hero_id: i32,
}

/// A combat log entry as decoded, with names still as table indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct CombatLogRecord {
    #[serde(rename = "type")]
    pub log_type: i32,
    pub target_name: u32,
    pub target_source_name: u32,
    pub attacker_name: u32,
    pub damage_source_name: u32,
    pub inflictor_name: u32,
    pub is_attacker_illusion: bool,
    pub is_attacker_hero: bool,
    pub is_target_illusion: bool,
    pub is_target_hero: bool,
    pub is_visible_radiant: bool,
    pub is_visible_dire: bool,
    pub is_target_building: bool,
    pub is_ultimate_ability: bool,
    pub value: i32,
    pub health: i32,
    pub timestamp: f32,
    pub stun_duration: f32,
    pub slow_duration: f32,
    pub ability_level: i32,
    pub xp: i32,
    pub gold: i32,
    pub last_hits: i32,
    pub attacker_team: i32,
    pub target_team: i32,
    pub location_x: f32,
    pub location_y: f32,
    pub assist_players: Vec<i32>,
    pub damage_type: i32,
    pub modifier_duration: f32,
    pub stack_count: i32,
    pub modifier_ability: Option<u32>,
    pub modifier_purge_ability: Option<u32>,
    pub modifier_purge_npc: Option<u32>,
}

/// Game event descriptor list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameEventList {
    /// One descriptor per event type.
    pub descriptors: Vec<GameEventDescriptor>,
}

/// Names an event id and its key layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GameEventDescriptor {
    pub event_id: i32,
    pub name: String,
    pub keys: Vec<GameEventKeyDescriptor>,
}

/// Type and name of one game event key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GameEventKeyDescriptor {
    #[serde(rename = "type")]
    pub key_type: i32,
    pub name: String,
}

/// A game event instance; keys are positional and typed by `key_type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GameEventRecord {
    pub event_id: i32,
    pub event_name: Option<String>,
    pub keys: Vec<GameEventKey>,
}

/// One positional game event value. Only the field matching `key_type` is
/// meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GameEventKey {
    #[serde(rename = "type")]
    pub key_type: i32,
    pub val_string: Option<String>,
    pub val_float: Option<f32>,
    pub val_long: Option<i32>,
    pub val_short: Option<i32>,
    pub val_byte: Option<i32>,
    pub val_bool: Option<bool>,
    pub val_uint64: Option<u64>,
}

/// A modifier applied to a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ModifierRecord {
    pub parent: u32,
    pub caster: u32,
    pub ability: u32,
    pub modifier_class: i32,
    pub serial_num: i32,
    pub index: i32,
    pub creation_time: f32,
    pub duration: f32,
    pub stack_count: i32,
    pub is_aura: bool,
    pub is_debuff: bool,
}

/// A projectile launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ProjectileRecord {
    pub source: EntityHandle,
    pub target: EntityHandle,
    pub move_speed: i32,
    pub dodgeable: bool,
    pub is_attack: bool,
    pub launch_tick: u32,
}

/// Server info sent at connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ServerInfo {
    pub protocol: i32,
    pub max_classes: i32,
    pub game_dir: String,
    pub map_name: String,
}

/// A string table was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateStringTable {
    /// Table name.
    pub name: String,
}

// ============================================================================
// Kinds
// ============================================================================

/// Dispatch kinds a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum RecordKind {
    Entity = 0,
    Table,
    FileHeader,
    FileInfo,
    CombatLog,
    GameEventList,
    GameEvent,
    Modifier,
    Projectile,
    ServerInfo,
    CreateStringTable,
    OtherMessage,
}

impl RecordKind {
    /// Every kind, in declaration order.
    pub const ALL: [RecordKind; 12] = [
        RecordKind::Entity,
        RecordKind::Table,
        RecordKind::FileHeader,
        RecordKind::FileInfo,
        RecordKind::CombatLog,
        RecordKind::GameEventList,
        RecordKind::GameEvent,
        RecordKind::Modifier,
        RecordKind::Projectile,
        RecordKind::ServerInfo,
        RecordKind::CreateStringTable,
        RecordKind::OtherMessage,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of [`RecordKind`]s.
///
/// ```
/// use replay_extract::source::{KindSet, RecordKind};
///
/// let kinds = KindSet::of(&[RecordKind::Entity, RecordKind::CombatLog]);
/// assert!(kinds.contains(RecordKind::CombatLog));
/// assert!(!kinds.contains(RecordKind::Table));
/// assert_eq!(kinds.union(KindSet::MESSAGES).len(), 11);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindSet(u16);

impl KindSet {
    /// No kinds.
    pub const EMPTY: KindSet = KindSet(0);

    /// Every protocol message kind.
    pub const MESSAGES: KindSet = KindSet::of(&[
        RecordKind::FileHeader,
        RecordKind::FileInfo,
        RecordKind::CombatLog,
        RecordKind::GameEventList,
        RecordKind::GameEvent,
        RecordKind::Modifier,
        RecordKind::Projectile,
        RecordKind::ServerInfo,
        RecordKind::CreateStringTable,
        RecordKind::OtherMessage,
    ]);

    /// Every kind.
    pub const ALL: KindSet = KindSet::of(&RecordKind::ALL);

    /// Builds a set from a list of kinds.
    #[must_use]
    pub const fn of(kinds: &[RecordKind]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        KindSet(bits)
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: KindSet) -> Self {
        KindSet(self.0 | other.0)
    }

    /// Adds one kind.
    pub fn insert(&mut self, kind: RecordKind) {
        self.0 |= kind.bit();
    }

    /// Returns true if `kind` is in the set.
    #[must_use]
    pub const fn contains(self, kind: RecordKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of kinds in the set.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the kinds in the set.
    pub fn iter(self) -> impl Iterator<Item = RecordKind> {
        RecordKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}
