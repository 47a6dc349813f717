//! Raw capture of every protocol message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Bounded, Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{EventRecord, KindSet, Record};

/// Raw message collector options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Keep messages whose type name contains this fragment; empty keeps
    /// all.
    pub filter: String,
    /// Maximum messages captured; 0 is unbounded.
    pub max_messages: usize,
}

/// One captured message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEvent {
    /// Message type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Tick of the message.
    pub tick: u32,
    /// Network tick of the message.
    pub net_tick: u32,
    /// Message body.
    pub data: Value,
}

/// Captured messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessagesResult {
    /// Messages in stream order.
    pub messages: Vec<MessageEvent>,
    /// Number of messages captured.
    pub total_messages: usize,
    /// Number of messages that passed the filter, captured or not.
    pub filtered_count: usize,
    /// Collector status.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

#[derive(Debug)]
pub(crate) struct MessagesCollector {
    filter: String,
    messages: Bounded<MessageEvent>,
    matched: usize,
}

impl MessagesCollector {
    pub fn new(config: &MessagesConfig) -> Self {
        Self {
            filter: config.filter.clone(),
            messages: Bounded::new("messages", config.max_messages),
            matched: 0,
        }
    }
}

impl Collect for MessagesCollector {
    const KINDS: KindSet = KindSet::MESSAGES;
    type Output = MessagesResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        let EventRecord::Message(msg) = &record.event else {
            return;
        };
        if !self.filter.is_empty() && !msg.type_name.contains(&self.filter) {
            return;
        }
        self.matched += 1;
        if self.messages.is_full() {
            return;
        }
        self.messages.push(MessageEvent {
            type_name: msg.type_name.clone(),
            tick: record.tick,
            net_tick: record.net_tick,
            data: msg.payload.to_json(),
        });
    }

    fn finalize(self, _ctx: &FinalizeContext<'_>) -> MessagesResult {
        let messages = self.messages.into_inner();
        MessagesResult {
            total_messages: messages.len(),
            messages,
            filtered_count: self.matched,
            status: CollectorStatus::ok(),
        }
    }
}
