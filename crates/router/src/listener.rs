use std::cell::RefCell;
use std::rc::Rc;

use minvr_events::VrEvent;

/// Error type a listener may report from its callbacks.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

pub type ListenerResult = Result<(), ListenerError>;

/// Listener priority used when the caller has no ordering preference.
pub const DEFAULT_LISTENER_PRIORITY: i32 = 10;

/// Receives every event dispatched by the [`EventManager`](crate::EventManager).
pub trait EventListener {
    /// Called once per dispatched event, in queue order.
    fn on_event(&mut self, event: &VrEvent, ctx: &mut DispatchContext) -> ListenerResult;

    /// Called once per tick after the whole queue has been delivered.
    fn end_of_tick(&mut self) -> ListenerResult {
        Ok(())
    }
}

/// Shared handle to a listener. Registration identity is the allocation.
pub type SharedListener = Rc<RefCell<dyn EventListener>>;

/// Wraps a listener, device or filter so it can be registered while the
/// caller keeps access to it.
///
/// The returned handle coerces to [`SharedListener`] (or the matching device
/// and filter handles) on clone.
pub fn shared<T: 'static>(value: T) -> Rc<RefCell<T>> {
    Rc::new(RefCell::new(value))
}

pub(crate) fn same_listener(a: &SharedListener, b: &SharedListener) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Per-event context handed to listeners.
///
/// Listeners use it to insert derived events, which the router delivers right
/// after the event being processed and before the next queued one.
#[derive(Debug, Default)]
pub struct DispatchContext {
    tick: u64,
    derived: Vec<VrEvent>,
}

impl DispatchContext {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            derived: Vec::new(),
        }
    }

    /// Tick the event belongs to.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn insert_derived(&mut self, event: VrEvent) {
        self.derived.push(event);
    }

    pub fn derived(&self) -> &[VrEvent] {
        &self.derived
    }

    pub(crate) fn take_derived(&mut self) -> Vec<VrEvent> {
        std::mem::take(&mut self.derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl EventListener for Noop {
        fn on_event(&mut self, _event: &VrEvent, _ctx: &mut DispatchContext) -> ListenerResult {
            Ok(())
        }
    }

    #[test]
    fn identity_is_the_allocation() {
        let a = shared(Noop);
        let b = shared(Noop);
        let a1: SharedListener = a.clone();
        let a2: SharedListener = a;
        let b1: SharedListener = b;
        assert!(same_listener(&a1, &a2));
        assert!(!same_listener(&a1, &b1));
    }

    struct Idle;

    impl crate::device::PolledInputDevice for Idle {
        fn poll_for_events(&mut self, _queue: &mut Vec<VrEvent>) {}
    }

    #[test]
    fn shared_wraps_devices_too() {
        let device = shared(Idle);
        let handle: crate::device::SharedDevice = device.clone();
        assert_eq!(Rc::strong_count(&device), 2);
        drop(handle);
        assert_eq!(Rc::strong_count(&device), 1);
    }

    #[test]
    fn derived_events_are_collected_in_order() {
        let mut ctx = DispatchContext::new(4);
        ctx.insert_derived(VrEvent::named("A"));
        ctx.insert_derived(VrEvent::named("B"));
        assert_eq!(ctx.tick(), 4);
        let names: Vec<_> = ctx.take_derived().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, ["A", "B"]);
        assert!(ctx.derived().is_empty());
    }
}
