//! Live entity state, keyed by entity index.

use std::collections::BTreeMap;

use crate::source::{EntityEvent, EntityHandle, EntityOp, PropMap, PropValue};

/// Current state of one live entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    /// Handle the entity was last seen under.
    pub handle: EntityHandle,
    /// Network class name.
    pub class_name: String,
    /// Every property received so far.
    pub props: PropMap,
    /// Tick of the most recent op touching this entity.
    pub last_seen_tick: u32,
}

impl EntityState {
    /// Entity index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.handle.index()
    }

    /// Raw property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    /// Integer property.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropValue::as_i64)
    }

    /// Integer property narrowed to `i32`, saturating on overflow.
    #[must_use]
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get_i64(key).map(|v| {
            i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX })
        })
    }

    /// Float property.
    #[must_use]
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(PropValue::as_f32)
    }

    /// Boolean property.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropValue::as_bool)
    }

    /// String property.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropValue::as_str)
    }

    /// Handle property.
    #[must_use]
    pub fn get_handle(&self, key: &str) -> Option<EntityHandle> {
        self.get(key).and_then(PropValue::as_u64).map(EntityHandle)
    }
}

/// Index → state map maintained from entity ops.
///
/// Created replaces whatever occupied the index, Updated merges deltas
/// into the existing state (creating it if the create was never seen) and
/// Deleted removes the entry.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: BTreeMap<u32, EntityState>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one entity op observed at `tick`.
    ///
    /// Returns the removed state for deletes.
    pub fn apply(&mut self, tick: u32, event: &EntityEvent) -> Option<EntityState> {
        let index = event.handle.index();
        match event.op {
            EntityOp::Deleted => self.entities.remove(&index),
            EntityOp::Created => {
                self.entities.insert(
                    index,
                    EntityState {
                        handle: event.handle,
                        class_name: event.class_name.clone(),
                        props: event.deltas.clone(),
                        last_seen_tick: tick,
                    },
                );
                None
            }
            EntityOp::Updated => {
                let state = self.entities.entry(index).or_insert_with(|| EntityState {
                    handle: event.handle,
                    class_name: event.class_name.clone(),
                    props: PropMap::new(),
                    last_seen_tick: tick,
                });
                state.handle = event.handle;
                if !event.class_name.is_empty() {
                    state.class_name.clone_from(&event.class_name);
                }
                state.last_seen_tick = tick;
                for (key, value) in &event.deltas {
                    state.props.insert(key.clone(), value.clone());
                }
                None
            }
        }
    }

    /// Looks up by entity index.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&EntityState> {
        self.entities.get(&index)
    }

    /// Resolves a handle, rejecting it when the index has since been
    /// reused by an entity with a different serial.
    #[must_use]
    pub fn find_by_handle(&self, handle: EntityHandle) -> Option<&EntityState> {
        if !handle.is_valid() {
            return None;
        }
        self.get(handle.index())
            .filter(|state| state.handle.serial() == handle.serial())
    }

    /// Iterates live entities in index order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    /// Iterates live entities whose class name contains `pattern`.
    pub fn with_class<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = &'a EntityState> {
        self.iter().filter(move |e| e.class_name.contains(pattern))
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(handle: EntityHandle, op: EntityOp, deltas: &[(&str, PropValue)]) -> EntityEvent {
        EntityEvent {
            handle,
            class_name: "CDOTA_BaseNPC_Creep_Lane".to_string(),
            op,
            deltas: deltas
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_create_update_delete() {
        let mut store = EntityStore::new();
        let h = EntityHandle::from_parts(40, 2);

        store.apply(10, &event(h, EntityOp::Created, &[("m_iHealth", 550.into())]));
        store.apply(
            20,
            &event(h, EntityOp::Updated, &[("m_iMaxHealth", 550.into()), ("m_iHealth", 300.into())]),
        );

        let state = store.get(40).unwrap();
        assert_eq!(state.get_i32("m_iHealth"), Some(300));
        assert_eq!(state.get_i32("m_iMaxHealth"), Some(550));
        assert_eq!(state.last_seen_tick, 20);

        let removed = store.apply(30, &event(h, EntityOp::Deleted, &[])).unwrap();
        assert_eq!(removed.get_i32("m_iHealth"), Some(300));
        assert!(store.is_empty());
    }

    #[test]
    fn test_created_replaces_previous_state() {
        let mut store = EntityStore::new();
        store.apply(
            1,
            &event(EntityHandle::from_parts(7, 1), EntityOp::Created, &[("m_iHealth", 10.into())]),
        );
        store.apply(
            2,
            &event(EntityHandle::from_parts(7, 2), EntityOp::Created, &[("m_iMaxHealth", 20.into())]),
        );
        let state = store.get(7).unwrap();
        assert_eq!(state.get_i32("m_iHealth"), None);
        assert_eq!(state.handle.serial(), 2);
    }

    #[test]
    fn test_find_by_handle_checks_serial() {
        let mut store = EntityStore::new();
        store.apply(1, &event(EntityHandle::from_parts(7, 3), EntityOp::Created, &[]));

        assert!(store.find_by_handle(EntityHandle::from_parts(7, 3)).is_some());
        assert!(store.find_by_handle(EntityHandle::from_parts(7, 2)).is_none());
        assert!(store.find_by_handle(EntityHandle(crate::source::INVALID_HANDLE)).is_none());
    }

    #[test]
    fn test_update_without_create() {
        let mut store = EntityStore::new();
        store.apply(5, &event(EntityHandle::from_parts(9, 0), EntityOp::Updated, &[("m_iTeamNum", 2.into())]));
        assert_eq!(store.get(9).unwrap().get_i32("m_iTeamNum"), Some(2));
        assert_eq!(store.with_class("Creep_Lane").count(), 1);
        assert_eq!(store.with_class("Hero").count(), 0);
    }

    #[test]
    fn test_typed_getters() {
        let mut store = EntityStore::new();
        store.apply(
            1,
            &event(
                EntityHandle::from_parts(1, 0),
                EntityOp::Created,
                &[
                    ("m_flMana", 75.5_f32.into()),
                    ("m_bIsIllusion", true.into()),
                    ("m_iszUnitName", "npc_dota_creep_goodguys_melee".into()),
                    ("m_hOwner", EntityHandle::from_parts(3, 1).into()),
                    ("m_iBig", PropValue::Int(i64::from(i32::MAX) + 1)),
                ],
            ),
        );
        let state = store.get(1).unwrap();
        assert_eq!(state.get_f32("m_flMana"), Some(75.5));
        assert_eq!(state.get_bool("m_bIsIllusion"), Some(true));
        assert_eq!(state.get_str("m_iszUnitName"), Some("npc_dota_creep_goodguys_melee"));
        assert_eq!(state.get_handle("m_hOwner"), Some(EntityHandle::from_parts(3, 1)));
        assert_eq!(state.get_i32("m_iBig"), Some(i32::MAX));
    }
}
