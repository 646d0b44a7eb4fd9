//! Event Router: per-tick event queue, input polling, filters and prioritized dispatch.
//!
//! # Invariants
//! - All polling for a tick happens before any dispatch in that tick.
//! - Within a tick every listener sees events in the same relative order.
//! - One event is fully delivered to a listener before the next listener runs.
//! - A failing listener never prevents delivery to the others.

mod device;
mod filter;
mod listener;
mod manager;

pub use device::{PolledInputDevice, SharedDevice};
pub use filter::{
    AliasStrategy, EventAlias, EventFilter, ModifiedEventFilter, SharedFilter,
    MODIFIER_FILTER_PRIORITY,
};
pub use listener::{
    shared, DispatchContext, EventListener, ListenerError, ListenerResult, SharedListener,
    DEFAULT_LISTENER_PRIORITY,
};
pub use manager::{EventManager, QueuePosition, RouterConfig, RouterError, TickReport};

pub fn crate_info() -> &'static str {
    "minvr-router v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("router"));
    }
}
