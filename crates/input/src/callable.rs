use minvr_events::{EventPrototype, VrEvent};
use minvr_router::PolledInputDevice;

/// Turns application calls into events.
///
/// Only the names given at construction can be produced. Produced events are
/// held until the next poll, so they enter the queue with the rest of that
/// tick's input.
#[derive(Debug, Clone, Default)]
pub struct CallableEventProducer {
    names: Vec<String>,
    pending: Vec<VrEvent>,
}

impl CallableEventProducer {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            pending: Vec::new(),
        }
    }

    pub fn event_names(&self) -> &[String] {
        &self.names
    }

    /// Queue a no-payload event. Returns false, and logs a warning, if `name`
    /// is not one of the declared names.
    pub fn produce_event(&mut self, name: &str) -> bool {
        if !self.names.iter().any(|n| n == name) {
            tracing::warn!(
                event = name,
                known = %self.names.join(", "),
                "refusing to produce undeclared event"
            );
            return false;
        }
        self.pending.push(VrEvent::named(name));
        true
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl PolledInputDevice for CallableEventProducer {
    fn poll_for_events(&mut self, queue: &mut Vec<VrEvent>) {
        queue.append(&mut self.pending);
    }

    fn event_prototypes(&self) -> Vec<EventPrototype> {
        self.names.iter().map(EventPrototype::named).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_declared_events_on_poll() {
        let mut producer = CallableEventProducer::new(["Reset", "Next"]);
        assert!(producer.produce_event("Next"));
        assert!(producer.produce_event("Reset"));
        assert_eq!(producer.pending(), 2);

        let mut queue = Vec::new();
        producer.poll_for_events(&mut queue);
        assert_eq!(queue, [VrEvent::named("Next"), VrEvent::named("Reset")]);
        assert_eq!(producer.pending(), 0);
    }

    #[test]
    fn rejects_unknown_names() {
        let mut producer = CallableEventProducer::new(["Reset"]);
        assert!(!producer.produce_event("Explode"));
        assert_eq!(producer.pending(), 0);
    }

    #[test]
    fn prototypes_have_no_payload() {
        let producer = CallableEventProducer::new(["Reset"]);
        assert_eq!(producer.event_prototypes(), [EventPrototype::named("Reset")]);
    }
}
