//! # Scene Events
//!
//! Lifecycle notifications emitted by a [`super::Scene`] into an
//! [`EventSink`] handed to it at construction. Sinks are plain collaborators;
//! there is no global event bus.
//!
//! `Created` is emitted by `create_entity` itself. `Activated`,
//! `Deactivated` and `Destroyed` are emitted while the tick pass applies
//! them, in application order.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use super::entity::EntityId;

/// Entity lifecycle events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneEvent {
    /// An entity id was handed out.
    Created {
        /// The new entity.
        entity: EntityId,
        /// Layer passed at creation.
        layer: u8,
    },
    /// An entity became active.
    Activated(EntityId),
    /// An entity became inactive.
    Deactivated(EntityId),
    /// An entity was reclaimed; its id is now stale.
    Destroyed(EntityId),
}

impl SceneEvent {
    /// The entity the event is about.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        match *self {
            Self::Created { entity, .. }
            | Self::Activated(entity)
            | Self::Deactivated(entity)
            | Self::Destroyed(entity) => entity,
        }
    }
}

/// Receiver of scene lifecycle events.
pub trait EventSink: Send {
    /// Called once per event, on the scene's thread.
    fn emit(&mut self, event: SceneEvent);
}

/// Sink that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    #[inline]
    fn emit(&mut self, _event: SceneEvent) {}
}

/// Sink forwarding events over a bounded channel.
///
/// Sending never blocks the tick: when the channel is full the event is
/// dropped and counted.
pub struct ChannelSink {
    sender: Sender<SceneEvent>,
    dropped: u64,
}

impl ChannelSink {
    /// Creates a sink and its receiving end.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum events in flight before new ones are dropped
    #[must_use]
    pub fn new(capacity: usize) -> (Self, SceneEventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender, dropped: 0 }, SceneEventReceiver { receiver })
    }

    /// Number of events dropped because the channel was full or closed.
    #[inline]
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: SceneEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped += 1;
            }
        }
    }
}

/// Receiving end of a [`ChannelSink`].
#[derive(Clone)]
pub struct SceneEventReceiver {
    receiver: Receiver<SceneEvent>,
}

impl SceneEventReceiver {
    /// Receives all pending events (non-blocking).
    pub fn drain(&self) -> Vec<SceneEvent> {
        self.receiver.try_iter().collect()
    }

    /// Receives one event (non-blocking).
    #[inline]
    pub fn try_recv(&self) -> Option<SceneEvent> {
        self.receiver.try_recv().ok()
    }

    /// Returns the number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Cloneable in-memory event log. Every clone appends to the same list.
#[derive(Clone, Debug, Default)]
pub struct SharedEventLog {
    events: Arc<Mutex<Vec<SceneEvent>>>,
}

impl SharedEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out every event logged so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SceneEvent> {
        self.events.lock().clone()
    }

    /// Takes every event logged so far, leaving the log empty.
    #[must_use]
    pub fn take(&self) -> Vec<SceneEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of events logged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for SharedEventLog {
    fn emit(&mut self, event: SceneEvent) {
        self.events.lock().push(event);
    }
}
