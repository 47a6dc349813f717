//! Pull-based streaming over a background traversal.
//!
//! [`StreamSession::open`] opens the source on the caller's thread, then
//! hands it to a single producer thread that walks the stream and pushes
//! one [`StreamEvent`] per matching record into a bounded queue. The
//! consumer pulls with [`StreamSession::next`] (non-blocking) or
//! [`StreamSession::next_timeout`] (blocking with a deadline). The producer
//! blocks while the queue is full and stops at the next record boundary
//! once the session is closed.
//!
//! Names cannot be resolved mid-stream, so combat log events carry raw
//! table indices.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use replay_extract::config::StreamConfig;
//! use replay_extract::source::{EntityHandle, EntityOp, Recording};
//! use replay_extract::stream::{StreamPoll, StreamSession};
//!
//! let recording = Recording::new()
//!     .entity(1, EntityHandle::from_parts(7, 1), "CDOTATeam", EntityOp::Created, []);
//! let config = StreamConfig { entities: true, ..StreamConfig::default() };
//!
//! let mut session = StreamSession::open(&recording, config).unwrap();
//! let mut events = 0;
//! loop {
//!     match session.next_timeout(Duration::from_secs(5)) {
//!         StreamPoll::Event(_) => events += 1,
//!         StreamPoll::Pending => continue,
//!         StreamPoll::Done { success, .. } => {
//!             assert!(success);
//!             break;
//!         }
//!     }
//! }
//! assert_eq!(events, 1);
//! session.close();
//! ```

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::collectors::combat_log_type_name;
use crate::collectors::game_events::Descriptors;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::source::{EventRecord, EventSource, Payload, Record, SourceOpener};

/// Capacity of the producer → consumer queue.
pub const QUEUE_CAPACITY: usize = 1000;

/// What kind of record an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum StreamKind {
    CombatLog,
    Entity,
    GameEvent,
    Modifier,
    Message,
}

/// One emitted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEvent {
    /// Source record kind.
    pub kind: StreamKind,
    /// Tick of the record.
    pub tick: u32,
    /// Network tick of the record.
    pub net_tick: u32,
    /// Combat log type name, entity class, game event name or message type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Event body.
    pub data: Value,
}

/// Result of pulling from a session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPoll {
    /// The next event in stream order.
    Event(StreamEvent),
    /// No event is ready yet; the producer is still running.
    Pending,
    /// No more events will arrive.
    Done {
        /// False if the traversal failed.
        success: bool,
        /// The traversal error, if any.
        error: Option<String>,
    },
}

/// Lifecycle of a session as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// The producer is still traversing.
    Running,
    /// The producer has finished; queued events remain.
    Draining,
    /// Every event has been consumed.
    Completed,
    /// The session was closed.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Completion {
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    closed: AtomicBool,
    outcome: Mutex<Option<Completion>>,
}

impl Shared {
    fn outcome(&self) -> Option<Completion> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn finish(&self, completion: Completion) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(completion);
    }
}

/// A background traversal exposed as a pollable queue.
///
/// Methods take `&mut self`: a session has one consumer.
#[derive(Debug)]
pub struct StreamSession {
    receiver: Option<Receiver<StreamEvent>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    drained: bool,
    closed: bool,
}

impl StreamSession {
    /// Validates `config`, opens a source and starts the producer thread.
    ///
    /// # Errors
    ///
    /// - `ExtractError::Config` if the config is rejected
    /// - any error from opening the source
    /// - `ExtractError::Io` if the producer thread cannot be spawned
    pub fn open(opener: &dyn SourceOpener, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        let source = opener.open()?;

        let (sender, receiver) = mpsc::sync_channel(QUEUE_CAPACITY);
        let shared = Arc::new(Shared::default());
        let producer_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("replay-stream".to_string())
            .spawn(move || produce(source, &config, &sender, &producer_shared))?;

        tracing::debug!("stream session opened");
        Ok(Self {
            receiver: Some(receiver),
            shared,
            worker: Some(worker),
            drained: false,
            closed: false,
        })
    }

    /// Returns the next event without blocking.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> StreamPoll {
        let Some(receiver) = &self.receiver else {
            return self.done();
        };
        match receiver.try_recv() {
            Ok(event) => StreamPoll::Event(event),
            Err(TryRecvError::Empty) => StreamPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.drained = true;
                self.done()
            }
        }
    }

    /// Waits up to `timeout` for the next event.
    pub fn next_timeout(&mut self, timeout: Duration) -> StreamPoll {
        let Some(receiver) = &self.receiver else {
            return self.done();
        };
        match receiver.recv_timeout(timeout) {
            Ok(event) => StreamPoll::Event(event),
            Err(RecvTimeoutError::Timeout) => StreamPoll::Pending,
            Err(RecvTimeoutError::Disconnected) => {
                self.drained = true;
                self.done()
            }
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        if self.closed {
            StreamState::Closed
        } else if self.drained {
            StreamState::Completed
        } else if self.shared.outcome().is_some() {
            StreamState::Draining
        } else {
            StreamState::Running
        }
    }

    /// Stops the producer and discards queued events. Safe to call more
    /// than once; later calls do nothing.
    ///
    /// Does not wait for the traversal: the producer notices the flag at
    /// its next delivered record and exits on its own.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.closed.store(true, Ordering::SeqCst);
        // Dropping the receiver unblocks a producer waiting on a full queue.
        self.receiver = None;
        match self.worker.take() {
            Some(worker) if worker.is_finished() => {
                if worker.join().is_err() {
                    tracing::warn!("stream producer panicked");
                    self.shared.finish(Completion {
                        success: false,
                        error: Some("stream producer panicked".to_string()),
                    });
                }
                tracing::debug!("stream session closed");
            }
            // Dropping the handle detaches the producer.
            Some(_) => tracing::debug!("stream session closed, producer detached"),
            None => tracing::debug!("stream session closed"),
        }
    }

    fn done(&self) -> StreamPoll {
        let Completion { success, error } = self.shared.outcome().unwrap_or(Completion {
            success: true,
            error: None,
        });
        StreamPoll::Done { success, error }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Converts records into events, applying kind, interval and type filters.
struct EventBuilder<'a> {
    config: &'a StreamConfig,
    descriptors: Descriptors,
    last_entity_tick: HashMap<u32, u32>,
}

impl<'a> EventBuilder<'a> {
    fn new(config: &'a StreamConfig) -> Self {
        Self {
            config,
            descriptors: Descriptors::default(),
            last_entity_tick: HashMap::new(),
        }
    }

    fn build(&mut self, record: &Record) -> Option<StreamEvent> {
        let (kind, type_name, data) = match &record.event {
            EventRecord::Entity(event) => {
                if !self.config.entities || !self.entity_due(event.handle.index(), record.tick) {
                    return None;
                }
                let data = json!({
                    "index": event.handle.index(),
                    "serial": event.handle.serial(),
                    "op": event.op,
                    "deltas": event.deltas,
                });
                (StreamKind::Entity, event.class_name.clone(), data)
            }
            EventRecord::Table(_) => return None,
            EventRecord::Message(msg) => match &msg.payload {
                Payload::CombatLog(entry) if self.config.combat_log => (
                    StreamKind::CombatLog,
                    combat_log_type_name(entry.log_type),
                    msg.payload.to_json(),
                ),
                Payload::GameEventList(list) if self.config.game_events => {
                    self.descriptors.learn(list);
                    return None;
                }
                Payload::GameEvent(event) if self.config.game_events => {
                    let name = self.descriptors.name(event)?;
                    let fields = self.descriptors.fields(event);
                    (StreamKind::GameEvent, name, json!(fields))
                }
                Payload::Modifier(_) if self.config.modifiers => (
                    StreamKind::Modifier,
                    msg.type_name.clone(),
                    msg.payload.to_json(),
                ),
                _ if self.config.messages => (
                    StreamKind::Message,
                    msg.type_name.clone(),
                    msg.payload.to_json(),
                ),
                _ => return None,
            },
        };

        if !self.config.filter_types.is_empty()
            && !self.config.filter_types.iter().any(|f| type_name.contains(f))
        {
            return None;
        }
        Some(StreamEvent {
            kind,
            tick: record.tick,
            net_tick: record.net_tick,
            type_name,
            data,
        })
    }

    fn entity_due(&mut self, index: u32, tick: u32) -> bool {
        let interval = self.config.interval_tick;
        if interval == 0 {
            return true;
        }
        match self.last_entity_tick.get(&index) {
            Some(&last) if tick.saturating_sub(last) < interval => false,
            _ => {
                self.last_entity_tick.insert(index, tick);
                true
            }
        }
    }
}

fn produce(
    mut source: Box<dyn EventSource>,
    config: &StreamConfig,
    sender: &SyncSender<StreamEvent>,
    shared: &Shared,
) {
    tracing::debug!(kinds = config.kinds().len(), "stream producer started");
    let mut builder = EventBuilder::new(config);
    let mut emitted = 0_usize;

    let outcome = source.start(config.kinds(), &mut |record: &Record| {
        if shared.closed.load(Ordering::SeqCst) {
            return ControlFlow::Break(());
        }
        let Some(event) = builder.build(record) else {
            return ControlFlow::Continue(());
        };
        if sender.send(event).is_err() {
            return ControlFlow::Break(());
        }
        emitted += 1;
        if config.max_events != 0 && emitted >= config.max_events {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });

    let completion = match outcome {
        Ok(()) => Completion {
            success: true,
            error: None,
        },
        Err(err) => {
            tracing::warn!(error = %err, emitted, "stream producer failed");
            Completion {
                success: false,
                error: Some(err.to_string()),
            }
        }
    };
    tracing::debug!(emitted, tick = source.tick(), "stream producer finished");
    shared.finish(completion);
}
