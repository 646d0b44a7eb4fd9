use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use minvr_events::{EventPrototype, VrEvent};
use serde::{Deserialize, Serialize};

use crate::device::{same_device, SharedDevice};
use crate::filter::{same_filter, SharedFilter};
use crate::listener::{same_listener, DispatchContext, ListenerResult, SharedListener};

/// Errors from router configuration calls.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("queue position {index} is past the end of the queue (len {len})")]
    QueuePositionOutOfRange { index: usize, len: usize },
    #[error("event {name} is declared as both {first} and {second}")]
    PrototypeConflict {
        name: String,
        first: String,
        second: String,
    },
    #[error("all events mapped to alias {alias} must have the same data type")]
    AliasTypeMismatch { alias: String },
}

/// Router tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Upper bound on derived events delivered on behalf of one queued event.
    pub max_derived_events: usize,
    /// Trace every processed event at debug level.
    pub log_events: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_derived_events: 1024,
            log_events: false,
        }
    }
}

/// Where [`EventManager::queue_event`] places an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    /// Seen first by every listener this tick.
    Front,
    Back,
    Index(usize),
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Events delivered to listeners after filtering, derived events excluded.
    pub events_dispatched: usize,
    pub derived_events: usize,
    pub derived_dropped: usize,
    pub listener_faults: usize,
}

struct Registration {
    listener: SharedListener,
    priority: i32,
    enabled: bool,
}

/// Owns the per-tick event queue and delivers it to prioritized listeners.
///
/// Listeners run in ascending priority, insertion order among equals. Each
/// event reaches every listener before the next event is delivered. The set
/// of listeners is captured when a dispatch starts, so registry changes take
/// effect from the next dispatch.
pub struct EventManager {
    config: RouterConfig,
    listeners: Vec<Registration>,
    devices: Vec<SharedDevice>,
    filters: Vec<(i32, SharedFilter)>,
    queue: Vec<VrEvent>,
    tick: u64,
}

impl EventManager {
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
            devices: Vec::new(),
            filters: Vec::new(),
            queue: Vec::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // --- Listeners ---

    /// Register a listener. Returns false if it is already registered.
    pub fn register_listener(&mut self, listener: SharedListener, priority: i32) -> bool {
        if self.is_registered(&listener) {
            return false;
        }
        let at = self.listeners.partition_point(|r| r.priority <= priority);
        self.listeners.insert(
            at,
            Registration {
                listener,
                priority,
                enabled: true,
            },
        );
        tracing::debug!(priority, total = self.listeners.len(), "listener registered");
        true
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister_listener(&mut self, listener: &SharedListener) -> bool {
        let before = self.listeners.len();
        self.listeners
            .retain(|r| !same_listener(&r.listener, listener));
        before != self.listeners.len()
    }

    /// Enable or disable a registered listener without losing its slot.
    pub fn set_listener_enabled(&mut self, listener: &SharedListener, enabled: bool) -> bool {
        match self
            .listeners
            .iter_mut()
            .find(|r| same_listener(&r.listener, listener))
        {
            Some(r) => {
                r.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, listener: &SharedListener) -> bool {
        self.listeners
            .iter()
            .any(|r| same_listener(&r.listener, listener))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // --- Devices ---

    pub fn add_polled_input_device(&mut self, device: SharedDevice) -> bool {
        if self.devices.iter().any(|d| same_device(d, &device)) {
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn remove_polled_input_device(&mut self, device: &SharedDevice) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| !same_device(d, device));
        before != self.devices.len()
    }

    /// Let every device append its events, in device registration order.
    /// Returns the number of events collected.
    pub fn poll_input_devices(&mut self) -> usize {
        let before = self.queue.len();
        for device in &self.devices {
            match device.try_borrow_mut() {
                Ok(mut d) => d.poll_for_events(&mut self.queue),
                Err(_) => tracing::warn!("input device is busy; skipped this tick"),
            }
        }
        self.queue.len() - before
    }

    /// Prototypes declared by all devices, in device order.
    ///
    /// Two devices declaring the same name with different types is an error.
    pub fn event_prototypes(&self) -> Result<Vec<EventPrototype>, RouterError> {
        let mut all: Vec<EventPrototype> = Vec::new();
        for device in &self.devices {
            let Ok(d) = device.try_borrow() else {
                continue;
            };
            for proto in d.event_prototypes() {
                if let Some(prev) = all
                    .iter()
                    .find(|p| p.name() == proto.name() && p.data_type() != proto.data_type())
                {
                    return Err(RouterError::PrototypeConflict {
                        name: proto.name().to_string(),
                        first: prev.to_string(),
                        second: proto.to_string(),
                    });
                }
                if !all.contains(&proto) {
                    all.push(proto);
                }
            }
        }
        Ok(all)
    }

    // --- Filters ---

    /// Add a filter after every filter registered so far.
    pub fn add_event_filter(&mut self, filter: SharedFilter) -> bool {
        let priority = self.filters.iter().map(|(p, _)| *p).max().unwrap_or(0) + 1;
        self.add_event_filter_with_priority(filter, priority)
    }

    /// Add a filter at an explicit priority; lower runs first, and a new
    /// filter runs before existing filters of the same priority.
    pub fn add_event_filter_with_priority(&mut self, filter: SharedFilter, priority: i32) -> bool {
        if self.filters.iter().any(|(_, f)| same_filter(f, &filter)) {
            return false;
        }
        let at = self.filters.partition_point(|(p, _)| *p < priority);
        self.filters.insert(at, (priority, filter));
        true
    }

    pub fn remove_event_filter(&mut self, filter: &SharedFilter) -> bool {
        let before = self.filters.len();
        self.filters.retain(|(_, f)| !same_filter(f, filter));
        before != self.filters.len()
    }

    // --- Queue ---

    pub fn queue_event(&mut self, position: QueuePosition, event: VrEvent) -> Result<(), RouterError> {
        match position {
            QueuePosition::Front => self.queue.insert(0, event),
            QueuePosition::Back => self.queue.push(event),
            QueuePosition::Index(index) => {
                if index > self.queue.len() {
                    return Err(RouterError::QueuePositionOutOfRange {
                        index,
                        len: self.queue.len(),
                    });
                }
                self.queue.insert(index, event);
            }
        }
        Ok(())
    }

    /// The pending queue for this tick.
    pub fn event_queue(&self) -> &[VrEvent] {
        &self.queue
    }

    /// Replace the pending queue wholesale, e.g. with a cluster-canonical one.
    pub fn set_event_queue(&mut self, queue: Vec<VrEvent>) {
        self.queue = queue;
    }

    pub fn take_event_queue(&mut self) -> Vec<VrEvent> {
        std::mem::take(&mut self.queue)
    }

    // --- Dispatch ---

    /// Deliver one event right away to all enabled listeners.
    pub fn process_event(&mut self, event: VrEvent) -> TickReport {
        let listeners = self.snapshot();
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };
        self.deliver(event, &listeners, &mut report);
        report
    }

    /// Deliver the whole pending queue, then notify listeners that the tick ended.
    ///
    /// The queue is empty afterwards. Faults inside listeners are logged and
    /// counted; they never stop delivery to the remaining listeners.
    pub fn dispatch_tick(&mut self) -> TickReport {
        let _span = tracing::debug_span!("dispatch_tick", tick = self.tick).entered();
        let listeners = self.snapshot();
        let queue = std::mem::take(&mut self.queue);
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        for event in queue {
            self.deliver(event, &listeners, &mut report);
        }

        for listener in &listeners {
            let outcome = guarded(|| match listener.try_borrow_mut() {
                Ok(mut l) => l.end_of_tick(),
                Err(_) => Err("listener is already borrowed".into()),
            });
            if let Err(reason) = outcome {
                tracing::warn!(%reason, "listener failed at end of tick");
                report.listener_faults += 1;
            }
        }

        tracing::trace!(
            events = report.events_dispatched,
            derived = report.derived_events,
            faults = report.listener_faults,
            "tick dispatched"
        );
        self.tick += 1;
        report
    }

    fn snapshot(&self) -> Vec<SharedListener> {
        self.listeners
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.listener.clone())
            .collect()
    }

    fn run_filters(&self, event: VrEvent) -> Vec<VrEvent> {
        let mut results = Vec::new();
        let mut caught = false;
        for (_, filter) in &self.filters {
            let Ok(mut f) = filter.try_borrow_mut() else {
                tracing::warn!(%event, "event filter is busy; skipped");
                continue;
            };
            let mut out = Vec::new();
            if f.filter_event(&event, &mut out) {
                caught = true;
                results.append(&mut out);
            }
        }
        if !caught {
            results.push(event);
        }
        results
    }

    fn deliver(&self, event: VrEvent, listeners: &[SharedListener], report: &mut TickReport) {
        for filtered in self.run_filters(event) {
            report.events_dispatched += 1;
            let mut ctx = DispatchContext::new(self.tick);
            self.send(&filtered, listeners, &mut ctx, report);

            let mut pending: VecDeque<VrEvent> = ctx.take_derived().into();
            let mut budget = self.config.max_derived_events;
            while let Some(derived) = pending.pop_front() {
                if budget == 0 {
                    let dropped = pending.len() + 1;
                    tracing::warn!(
                        source = %filtered,
                        dropped,
                        "derived event limit reached; dropping the rest"
                    );
                    report.derived_dropped += dropped;
                    break;
                }
                budget -= 1;
                report.derived_events += 1;
                self.send(&derived, listeners, &mut ctx, report);
                pending.extend(ctx.take_derived());
            }
        }
    }

    fn send(
        &self,
        event: &VrEvent,
        listeners: &[SharedListener],
        ctx: &mut DispatchContext,
        report: &mut TickReport,
    ) {
        if self.config.log_events {
            tracing::debug!(%event, "processing event");
        }
        for listener in listeners {
            let outcome = guarded(|| match listener.try_borrow_mut() {
                Ok(mut l) => l.on_event(event, ctx),
                Err(_) => Err("listener is already borrowed".into()),
            });
            if let Err(reason) = outcome {
                tracing::warn!(%event, %reason, "listener failed");
                report.listener_faults += 1;
            }
        }
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a listener callback, turning both errors and panics into a message.
fn guarded(f: impl FnOnce() -> ListenerResult) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(match payload.downcast_ref::<&str>() {
            Some(msg) => format!("panicked: {msg}"),
            None => match payload.downcast_ref::<String>() {
                Some(msg) => format!("panicked: {msg}"),
                None => "panicked".to_string(),
            },
        }),
    }
}
