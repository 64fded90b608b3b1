use crate::eventbus::MessageListener;
use std::fmt::Debug;

/// A simple listener that logs every forwarded message through the `log` facade.
pub struct LogListener {
    label: String,
}

impl LogListener {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl<E: Debug> MessageListener<E> for LogListener {
    fn on_message(&mut self, event: &E) {
        log::debug!("[{}] {:?}", self.label, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventbus::{EventFilter, MessageBus};
    use crate::midi::MidiMessage;

    #[test]
    fn logs_without_consuming() {
        let mut bus: MessageBus<MidiMessage> = MessageBus::new();
        bus.add_listener(LogListener::new("midi"), EventFilter::All);
        let msg = MidiMessage::decode(&[0xB0, 7, 100]).unwrap();
        assert_eq!(bus.emit(&msg), 1);
    }
}
