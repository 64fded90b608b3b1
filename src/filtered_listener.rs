use crate::eventbus::MessageListener;

/// Wraps a listener and filters events based on a user-supplied predicate.
///
/// Unlike [`EventFilter`](crate::eventbus::EventFilter) the predicate may capture state,
/// e.g. a MIDI channel picked at runtime.
pub struct FilteredListener<E> {
    predicate: Box<dyn Fn(&E) -> bool + Send + Sync>,
    inner: Box<dyn MessageListener<E>>,
}

impl<E> FilteredListener<E> {
    pub fn new(
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
        inner: impl MessageListener<E> + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            inner: Box::new(inner),
        }
    }
}

impl<E> MessageListener<E> for FilteredListener<E> {
    fn on_message(&mut self, event: &E) {
        if (self.predicate)(event) {
            self.inner.on_message(event);
        }
    }
}
