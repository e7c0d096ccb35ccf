//! Observer list for pushing finalized events out of a session

use std::sync::mpsc::Sender;

use crate::types::MarkerEvent;

/// Receives every event a session publishes
pub trait EventObserver: Send + Sync {
    fn on_event(&mut self, event: &MarkerEvent);
}

impl<F> EventObserver for F
where
    F: FnMut(&MarkerEvent) + Send + Sync,
{
    fn on_event(&mut self, event: &MarkerEvent) {
        self(event)
    }
}

/// Forwards events into an mpsc channel
///
/// Once the receiver is dropped the observer goes quiet.
pub struct ChannelObserver {
    sender: Sender<MarkerEvent>,
    closed: bool,
}

impl ChannelObserver {
    pub fn new(sender: Sender<MarkerEvent>) -> Self {
        Self {
            sender,
            closed: false,
        }
    }
}

impl EventObserver for ChannelObserver {
    fn on_event(&mut self, event: &MarkerEvent) {
        if self.closed {
            return;
        }
        if self.sender.send(event.clone()).is_err() {
            log::debug!("event receiver dropped, channel observer closed");
            self.closed = true;
        }
    }
}

/// Owned list of observers; subscriptions live as long as the bus
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn EventObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn EventObserver>) {
        self.observers.push(observer);
    }

    /// Deliver each event to every observer, in subscription order
    pub fn publish(&mut self, events: &[MarkerEvent]) {
        for event in events {
            for observer in self.observers.iter_mut() {
                observer.on_event(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
