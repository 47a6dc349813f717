//! Modifier (buff and debuff) table entries.

use serde::{Deserialize, Serialize};

use super::{Bounded, Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{EventRecord, KindSet, ModifierRecord, Payload, Record, RecordKind};

/// Modifier collector options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifiersConfig {
    /// Maximum modifiers captured; 0 is unbounded.
    pub max_modifiers: usize,
    /// Keep only auras.
    pub auras_only: bool,
    /// Keep only debuffs.
    pub debuffs_only: bool,
}

/// One modifier entry with the tick it was observed at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifierEntry {
    /// Tick of the entry.
    pub tick: u32,
    /// Network tick of the entry.
    pub net_tick: u32,
    /// The modifier as recorded.
    #[serde(flatten)]
    pub modifier: ModifierRecord,
}

/// Captured modifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModifiersResult {
    /// Entries in stream order.
    pub modifiers: Vec<ModifierEntry>,
    /// Number of entries captured.
    pub total_modifiers: usize,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug)]
pub(crate) struct ModifiersCollector {
    config: ModifiersConfig,
    modifiers: Bounded<ModifierEntry>,
}

impl ModifiersCollector {
    pub fn new(config: &ModifiersConfig) -> Self {
        Self {
            config: config.clone(),
            modifiers: Bounded::new("modifiers", config.max_modifiers),
        }
    }
}

impl Collect for ModifiersCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::Modifier]);
    type Output = ModifiersResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        let EventRecord::Message(msg) = &record.event else {
            return;
        };
        let Payload::Modifier(modifier) = &msg.payload else {
            return;
        };
        if (self.config.auras_only && !modifier.is_aura)
            || (self.config.debuffs_only && !modifier.is_debuff)
        {
            return;
        }
        self.modifiers.push(ModifierEntry {
            tick: record.tick,
            net_tick: record.net_tick,
            modifier: modifier.clone(),
        });
    }

    fn finalize(self, _ctx: &FinalizeContext<'_>) -> ModifiersResult {
        let modifiers = self.modifiers.into_inner();
        ModifiersResult {
            total_modifiers: modifiers.len(),
            modifiers,
            status: CollectorStatus::ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameTables;
    use crate::source::ProtocolMessage;

    fn modifier(tick: u32, is_aura: bool, is_debuff: bool) -> Record {
        Record::new(
            tick,
            EventRecord::Message(ProtocolMessage::new(Payload::Modifier(ModifierRecord {
                parent: 300,
                is_aura,
                is_debuff,
                duration: -1.0,
                ..ModifierRecord::default()
            }))),
        )
    }

    fn run(config: &ModifiersConfig) -> ModifiersResult {
        let entities = Reconstructor::new();
        let mut collector = ModifiersCollector::new(config);
        collector.observe(&entities, &modifier(1, true, false));
        collector.observe(&entities, &modifier(2, false, true));
        collector.observe(&entities, &modifier(3, false, false));
        let tables = NameTables::new();
        collector.finalize(&FinalizeContext {
            names: tables.resolver(None),
            entities: &entities,
            tick: 3,
            net_tick: 3,
        })
    }

    #[test]
    fn test_all_modifiers() {
        let result = run(&ModifiersConfig::default());
        assert_eq!(result.total_modifiers, 3);
        assert_eq!(result.modifiers[1].tick, 2);
    }

    #[test]
    fn test_auras_only() {
        let result = run(&ModifiersConfig {
            auras_only: true,
            ..ModifiersConfig::default()
        });
        assert_eq!(result.total_modifiers, 1);
        assert!(result.modifiers[0].modifier.is_aura);
    }

    #[test]
    fn test_debuffs_only_with_cap() {
        let result = run(&ModifiersConfig {
            debuffs_only: true,
            max_modifiers: 5,
            ..ModifiersConfig::default()
        });
        assert_eq!(result.total_modifiers, 1);
        assert_eq!(result.modifiers[0].tick, 2);

        let capped = run(&ModifiersConfig {
            max_modifiers: 2,
            ..ModifiersConfig::default()
        });
        assert_eq!(capped.total_modifiers, 2);
    }
}
