use std::cell::RefCell;
use std::rc::Rc;

use minvr_events::{EventPrototype, VrEvent};

/// An input source polled once per tick.
pub trait PolledInputDevice {
    /// Append every event produced since the previous poll, oldest first.
    fn poll_for_events(&mut self, queue: &mut Vec<VrEvent>);

    /// Events this device can produce. Used for discovery only.
    fn event_prototypes(&self) -> Vec<EventPrototype> {
        Vec::new()
    }
}

pub type SharedDevice = Rc<RefCell<dyn PolledInputDevice>>;

pub(crate) fn same_device(a: &SharedDevice, b: &SharedDevice) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
