use minvr_events::VrEvent;
use minvr_router::{DispatchContext, EventListener, ListenerResult};

/// An event as seen by the recorder, tagged with its tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub tick: u64,
    pub event: VrEvent,
}

/// Listener that keeps a log of every event it is sent.
///
/// Register it at a low priority to see the queue before anything reacts to
/// it, or a high one to see it last. Derived events are recorded too.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Vec<RecordedEvent>,
    limit: Option<usize>,
    dropped: usize,
    ticks: u64,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` events; later ones are counted but not stored.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(|r| r.event.name()).collect()
    }

    /// Events not stored because the limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Ticks that have ended since the recorder was registered.
    pub fn ticks_seen(&self) -> u64 {
        self.ticks
    }

    pub fn drain_events(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventListener for EventRecorder {
    fn on_event(&mut self, event: &VrEvent, ctx: &mut DispatchContext) -> ListenerResult {
        tracing::debug!(tick = ctx.tick(), %event, "recorded");
        if self.limit.is_some_and(|limit| self.events.len() >= limit) {
            self.dropped += 1;
            return Ok(());
        }
        self.events.push(RecordedEvent {
            tick: ctx.tick(),
            event: event.clone(),
        });
        Ok(())
    }

    fn end_of_tick(&mut self) -> ListenerResult {
        self.ticks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minvr_router::{shared, EventManager, QueuePosition, DEFAULT_LISTENER_PRIORITY};

    #[test]
    fn records_events_with_ticks() {
        let mut router = EventManager::new();
        let rec = shared(EventRecorder::new());
        router.register_listener(rec.clone(), DEFAULT_LISTENER_PRIORITY);

        router.queue_event(QueuePosition::Back, VrEvent::named("A")).unwrap();
        router.dispatch_tick();
        router.queue_event(QueuePosition::Back, VrEvent::int("B", 3)).unwrap();
        router.dispatch_tick();

        let rec = rec.borrow();
        assert_eq!(rec.names(), ["A", "B"]);
        assert_eq!(rec.events()[0].tick, 0);
        assert_eq!(rec.events()[1].tick, 1);
        assert_eq!(rec.ticks_seen(), 2);
    }

    #[test]
    fn limit_counts_overflow() {
        let mut rec = EventRecorder::with_limit(1);
        let mut ctx = DispatchContext::new(0);
        rec.on_event(&VrEvent::named("A"), &mut ctx).unwrap();
        rec.on_event(&VrEvent::named("B"), &mut ctx).unwrap();
        assert_eq!(rec.names(), ["A"]);
        assert_eq!(rec.dropped(), 1);
        assert_eq!(rec.drain_events().len(), 1);
        assert!(rec.events().is_empty());
    }
}
