use std::fmt;

/// Trait for reacting to decoded messages from a channel (MIDI, serial, OSC).
pub trait MessageListener<E>: Send {
    fn on_message(&mut self, event: &E);
}

impl<E, F> MessageListener<E> for F
where
    F: FnMut(&E) + Send,
{
    fn on_message(&mut self, event: &E) {
        self(event)
    }
}

/// Handle returned by [`MessageBus::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Kind tag an event can be filtered on (the status high nibble for MIDI).
///
/// Events without kinds keep the default and only match `All`/`Custom` filters.
pub trait EventKind {
    fn event_kind(&self) -> Option<u8> {
        None
    }
}

impl EventKind for String {}

/// Determines which events a listener wants to receive.
pub enum EventFilter<E> {
    All,
    /// Events whose [`EventKind::event_kind`] equals this tag.
    Kind(u8),
    Custom(fn(&E) -> bool),
}

impl<E: EventKind> EventFilter<E> {
    fn passes(&self, event: &E) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kind(kind) => event.event_kind() == Some(*kind),
            EventFilter::Custom(f) => f(event),
        }
    }
}

impl<E> Clone for EventFilter<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for EventFilter<E> {}

impl<E> fmt::Debug for EventFilter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFilter::All => f.write_str("All"),
            EventFilter::Kind(kind) => write!(f, "Kind({kind:#04x})"),
            EventFilter::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Metadata-wrapped listener with filter and mute flag.
struct ListenerEntry<E> {
    id: ListenerId,
    listener: Box<dyn MessageListener<E>>,
    enabled: bool,
    filter: EventFilter<E>,
}

/// Listener registry for one message type.
///
/// Listeners are notified synchronously, in registration order.
pub struct MessageBus<E> {
    next_id: u64,
    listeners: Vec<ListenerEntry<E>>,
}

impl<E> MessageBus<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Registers a listener with a filter.
    pub fn add_listener(
        &mut self,
        listener: impl MessageListener<E> + 'static,
        filter: EventFilter<E>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(ListenerEntry {
            id,
            listener: Box::new(listener),
            enabled: true,
            filter,
        });
        id
    }

    /// Enables a previously registered listener.
    pub fn enable(&mut self, id: ListenerId) {
        if let Some(entry) = self.listeners.iter_mut().find(|e| e.id == id) {
            entry.enabled = true;
        }
    }

    /// Disables (mutes) a listener without removing it.
    pub fn disable(&mut self, id: ListenerId) {
        if let Some(entry) = self.listeners.iter_mut().find(|e| e.id == id) {
            entry.enabled = false;
        }
    }

    /// Unregisters a listener entirely. Returns `false` if the id was unknown.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|e| e.id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: EventKind> MessageBus<E> {
    /// Emits one event to all active and matching listeners.
    ///
    /// Returns how many listeners received it.
    pub fn emit(&mut self, event: &E) -> usize {
        let mut delivered = 0;
        for entry in self.listeners.iter_mut() {
            if !entry.enabled || !entry.filter.passes(event) {
                continue;
            }
            entry.listener.on_message(event);
            delivered += 1;
        }
        delivered
    }

    /// Emits a batch of events to matching listeners.
    pub fn emit_all(&mut self, events: &[E]) -> usize {
        events.iter().map(|e| self.emit(e)).sum()
    }
}

impl<E> Default for MessageBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
