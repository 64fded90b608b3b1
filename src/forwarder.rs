//! Decode-and-notify stage shared by the MIDI, serial and OSC channels.
//!
//! An [`EventForwarder`] records the last event as debug text (what the panel's debug
//! area displays), then notifies every registered listener synchronously, in
//! registration order. There is no buffering: an event nobody listens to is dropped
//! once recorded.

use crate::error::Result;
use crate::eventbus::{EventFilter, EventKind, ListenerId, MessageBus, MessageListener};

/// Text shown in a panel's debug area for the most recent event.
pub trait DebugRecord {
    fn debug_text(&self) -> String;
}

impl DebugRecord for String {
    fn debug_text(&self) -> String {
        self.clone()
    }
}

/// Fixed-shape payload decoding.
pub trait Decode: Sized {
    fn decode(raw: &[u8]) -> Result<Self>;
}

pub struct EventForwarder<E> {
    bus: MessageBus<E>,
    debug: String,
    forwarded: u64,
    dropped: u64,
}

impl<E> EventForwarder<E> {
    pub fn new() -> Self {
        Self {
            bus: MessageBus::new(),
            debug: String::new(),
            forwarded: 0,
            dropped: 0,
        }
    }

    pub fn add_listener(
        &mut self,
        listener: impl MessageListener<E> + 'static,
        filter: EventFilter<E>,
    ) -> ListenerId {
        self.bus.add_listener(listener, filter)
    }

    pub fn bus_mut(&mut self) -> &mut MessageBus<E> {
        &mut self.bus
    }

    /// Debug text of the last forwarded event.
    pub fn debug(&self) -> &str {
        &self.debug
    }

    /// Events that reached at least one listener.
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Events recorded but delivered to nobody.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<E: DebugRecord + EventKind> EventForwarder<E> {
    /// Record `event` for display and notify listeners. Returns the delivery count.
    pub fn forward(&mut self, event: &E) -> usize {
        self.debug = event.debug_text();
        #[cfg(feature = "debug-log")]
        log::debug!("forward: {}", self.debug.trim_end().replace('\n', ", "));
        let delivered = self.bus.emit(event);
        if delivered == 0 {
            self.dropped += 1;
            log::trace!("no listener for event, dropped after recording");
        } else {
            self.forwarded += 1;
        }
        delivered
    }
}

impl<E: DebugRecord + Decode + EventKind> EventForwarder<E> {
    /// Decode a raw payload and forward it.
    pub fn on_message(&mut self, raw: &[u8]) -> Result<E> {
        let event = E::decode(raw)?;
        self.forward(&event);
        Ok(event)
    }
}

impl<E> Default for EventForwarder<E> {
    fn default() -> Self {
        Self::new()
    }
}
