use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use minvr_events::{EventData, EventPrototype, VrEvent};
use minvr_router::{DispatchContext, EventListener, ListenerResult};

use crate::condition::Condition;
use crate::token::TokenRegistry;

/// Stable handle to a state. Never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "state#{}", self.0)
    }
}

/// Stable handle to an arc. Never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArcId(u32);

impl std::fmt::Display for ArcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "arc#{}", self.0)
    }
}

/// Errors from FSM construction and mutation.
#[derive(Debug, thiserror::Error)]
pub enum FsmError {
    #[error("unknown state {0}")]
    UnknownState(StateId),
    #[error("unknown arc {0}")]
    UnknownArc(ArcId),
    #[error("no state named {0:?}")]
    UnknownStateName(String),
    #[error("state name {0:?} is already in use")]
    DuplicateStateName(String),
    #[error("cannot remove the start state {0}")]
    RemoveStartState(StateId),
    #[error("cannot remove the current state {0}")]
    RemoveCurrentState(StateId),
}

pub type StateCallback = Box<dyn FnMut()>;

/// Called when an arc is traversed, with the payload that triggered it.
pub type TriggerCallback = Box<dyn FnMut(&EventData)>;

/// What makes an arc fire.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// A dispatched event matching the prototype.
    Event(EventPrototype),
    /// An explicit [`Fsm::fire_trigger`] call with this name.
    Manual(String),
}

impl Trigger {
    fn label(&self) -> &str {
        match self {
            Trigger::Event(p) => p.name(),
            Trigger::Manual(name) => name,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Event(p) => write!(f, "{p}"),
            Trigger::Manual(name) => write!(f, "trigger {name}"),
        }
    }
}

/// Description of an arc to add with [`Fsm::add_arc`].
pub struct ArcSpec {
    from: StateId,
    to: StateId,
    trigger: Trigger,
    callback: Option<TriggerCallback>,
    condition: Option<Condition>,
    require_token: Option<String>,
    release_token: Option<String>,
}

impl ArcSpec {
    pub fn new(from: StateId, to: StateId, trigger: Trigger) -> Self {
        Self {
            from,
            to,
            trigger,
            callback: None,
            condition: None,
            require_token: None,
            release_token: None,
        }
    }

    pub fn on_event(from: StateId, to: StateId, prototype: EventPrototype) -> Self {
        Self::new(from, to, Trigger::Event(prototype))
    }

    pub fn manual(from: StateId, to: StateId, name: impl Into<String>) -> Self {
        Self::new(from, to, Trigger::Manual(name.into()))
    }

    pub fn with_callback(mut self, callback: impl FnMut(&EventData) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Token that must be acquired for the arc to fire.
    pub fn require_token(mut self, name: impl Into<String>) -> Self {
        self.require_token = Some(name.into());
        self
    }

    /// Token released when the arc fires.
    pub fn release_token(mut self, name: impl Into<String>) -> Self {
        self.release_token = Some(name.into());
        self
    }
}

/// A transition the FSM has taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub arc: ArcId,
    pub from: StateId,
    pub to: StateId,
    /// Event or manual trigger name.
    pub trigger: String,
}

struct State {
    name: String,
    on_enter: Vec<StateCallback>,
    on_update: Vec<StateCallback>,
    on_exit: Vec<StateCallback>,
}

impl State {
    fn new(name: String) -> Self {
        Self {
            name,
            on_enter: Vec::new(),
            on_update: Vec::new(),
            on_exit: Vec::new(),
        }
    }
}

struct FsmArc {
    from: StateId,
    to: StateId,
    trigger: Trigger,
    callback: Option<TriggerCallback>,
    condition: Option<Condition>,
    require_token: Option<String>,
    release_token: Option<String>,
}

enum Incoming<'a> {
    Event(&'a VrEvent),
    Manual(&'a str),
}

impl Incoming<'_> {
    fn matches(&self, trigger: &Trigger) -> bool {
        match (self, trigger) {
            (Incoming::Event(event), Trigger::Event(proto)) => proto.matches(event),
            (Incoming::Manual(name), Trigger::Manual(wanted)) => *name == wanted.as_str(),
            _ => false,
        }
    }
}

/// Event-driven finite state machine.
///
/// States and arcs live in ordered maps keyed by ids drawn from increasing
/// counters, so map order is registration order and removing one entry never
/// disturbs another's id or endpoints. The FSM always has at least one state
/// and its start and current states always exist.
///
/// Per event, the first arc (in registration order) leaving the current state
/// whose trigger matches and whose guards pass is traversed; later arcs are
/// not considered for that event.
pub struct Fsm {
    name: String,
    tokens: TokenRegistry,
    states: BTreeMap<StateId, State>,
    arcs: BTreeMap<ArcId, FsmArc>,
    next_state: u32,
    next_arc: u32,
    start: StateId,
    current: StateId,
    transitions: Vec<Transition>,
}

impl Fsm {
    /// Create an FSM whose only state is the start state, named `start_state`.
    pub fn new(name: impl Into<String>, start_state: impl Into<String>, tokens: TokenRegistry) -> Self {
        let start = StateId(0);
        let mut states = BTreeMap::new();
        states.insert(start, State::new(start_state.into()));
        Self {
            name: name.into(),
            tokens,
            states,
            arcs: BTreeMap::new(),
            next_state: 1,
            next_arc: 0,
            start,
            current: start,
            transitions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    // --- States ---

    pub fn add_state(&mut self, name: impl Into<String>) -> Result<StateId, FsmError> {
        let name = name.into();
        if self.state_id(&name).is_some() {
            return Err(FsmError::DuplicateStateName(name));
        }
        let id = StateId(self.next_state);
        self.next_state += 1;
        self.states.insert(id, State::new(name));
        Ok(id)
    }

    /// Add a state with one callback of each kind.
    pub fn add_state_with_callbacks(
        &mut self,
        name: impl Into<String>,
        on_enter: impl FnMut() + 'static,
        on_update: impl FnMut() + 'static,
        on_exit: impl FnMut() + 'static,
    ) -> Result<StateId, FsmError> {
        let id = self.add_state(name)?;
        self.on_enter(id, on_enter)?;
        self.on_update(id, on_update)?;
        self.on_exit(id, on_exit)?;
        Ok(id)
    }

    pub fn on_enter(&mut self, id: StateId, callback: impl FnMut() + 'static) -> Result<(), FsmError> {
        self.state_mut(id)?.on_enter.push(Box::new(callback));
        Ok(())
    }

    pub fn on_update(&mut self, id: StateId, callback: impl FnMut() + 'static) -> Result<(), FsmError> {
        self.state_mut(id)?.on_update.push(Box::new(callback));
        Ok(())
    }

    pub fn on_exit(&mut self, id: StateId, callback: impl FnMut() + 'static) -> Result<(), FsmError> {
        self.state_mut(id)?.on_exit.push(Box::new(callback));
        Ok(())
    }

    /// Remove a state and every arc starting or ending in it.
    ///
    /// Returns the ids of the removed arcs. The start and current states
    /// cannot be removed.
    pub fn remove_state(&mut self, id: StateId) -> Result<Vec<ArcId>, FsmError> {
        if !self.states.contains_key(&id) {
            return Err(FsmError::UnknownState(id));
        }
        if id == self.start {
            return Err(FsmError::RemoveStartState(id));
        }
        if id == self.current {
            return Err(FsmError::RemoveCurrentState(id));
        }
        self.states.remove(&id);
        let dangling: Vec<ArcId> = self
            .arcs
            .iter()
            .filter(|(_, arc)| arc.from == id || arc.to == id)
            .map(|(arc_id, _)| *arc_id)
            .collect();
        for arc_id in &dangling {
            self.arcs.remove(arc_id);
        }
        tracing::debug!(fsm = %self.name, state = %id, arcs_removed = dangling.len(), "state removed");
        Ok(dangling)
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| *id)
    }

    pub fn state_exists(&self, name: &str) -> bool {
        self.state_id(name).is_some()
    }

    pub fn state_name(&self, id: StateId) -> Result<&str, FsmError> {
        self.states
            .get(&id)
            .map(|s| s.name.as_str())
            .ok_or(FsmError::UnknownState(id))
    }

    fn state_mut(&mut self, id: StateId) -> Result<&mut State, FsmError> {
        self.states.get_mut(&id).ok_or(FsmError::UnknownState(id))
    }

    /// State names in registration order.
    pub fn state_names(&self) -> Vec<&str> {
        self.states.values().map(|s| s.name.as_str()).collect()
    }

    pub fn state_ids(&self) -> Vec<StateId> {
        self.states.keys().copied().collect()
    }

    // --- Arcs ---

    pub fn add_arc(&mut self, spec: ArcSpec) -> Result<ArcId, FsmError> {
        for endpoint in [spec.from, spec.to] {
            if !self.states.contains_key(&endpoint) {
                return Err(FsmError::UnknownState(endpoint));
            }
        }
        let id = ArcId(self.next_arc);
        self.next_arc += 1;
        self.arcs.insert(
            id,
            FsmArc {
                from: spec.from,
                to: spec.to,
                trigger: spec.trigger,
                callback: spec.callback,
                condition: spec.condition,
                require_token: spec.require_token,
                release_token: spec.release_token,
            },
        );
        Ok(id)
    }

    pub fn remove_arc(&mut self, id: ArcId) -> Result<(), FsmError> {
        self.arcs
            .remove(&id)
            .map(|_| ())
            .ok_or(FsmError::UnknownArc(id))
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    /// Arc ids in registration order.
    pub fn arc_ids(&self) -> Vec<ArcId> {
        self.arcs.keys().copied().collect()
    }

    pub fn arc_endpoints(&self, id: ArcId) -> Result<(StateId, StateId), FsmError> {
        self.arcs
            .get(&id)
            .map(|a| (a.from, a.to))
            .ok_or(FsmError::UnknownArc(id))
    }

    pub fn arc_trigger(&self, id: ArcId) -> Result<&Trigger, FsmError> {
        self.arcs
            .get(&id)
            .map(|a| &a.trigger)
            .ok_or(FsmError::UnknownArc(id))
    }

    /// `"From-->To"` for logs and inspectors.
    pub fn arc_to_string(&self, id: ArcId) -> Result<String, FsmError> {
        let (from, to) = self.arc_endpoints(id)?;
        Ok(format!("{}-->{}", self.state_name(from)?, self.state_name(to)?))
    }

    // --- Runtime ---

    pub fn current_state(&self) -> StateId {
        self.current
    }

    pub fn current_state_name(&self) -> &str {
        self.states
            .get(&self.current)
            .map_or("", |s| s.name.as_str())
    }

    pub fn start_state(&self) -> StateId {
        self.start
    }

    pub fn set_start_state(&mut self, id: StateId) -> Result<(), FsmError> {
        if !self.states.contains_key(&id) {
            return Err(FsmError::UnknownState(id));
        }
        self.start = id;
        Ok(())
    }

    /// Jump back to the start state without running callbacks.
    pub fn reset(&mut self) {
        self.current = self.start;
    }

    /// Offer one dispatched event to the FSM. Returns the transition taken, if any.
    pub fn handle_event(&mut self, event: &VrEvent) -> Option<Transition> {
        self.advance(Incoming::Event(event), event.data())
    }

    /// Fire the manual trigger `name` with a payload for the arc callback.
    pub fn fire_trigger(&mut self, name: &str, payload: &EventData) -> Option<Transition> {
        self.advance(Incoming::Manual(name), payload)
    }

    /// Run the update callbacks of the current state.
    pub fn update(&mut self) {
        if let Some(state) = self.states.get_mut(&self.current) {
            for cb in &mut state.on_update {
                cb();
            }
        }
    }

    /// Transitions recorded since the last drain.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn drain_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    fn advance(&mut self, incoming: Incoming<'_>, payload: &EventData) -> Option<Transition> {
        let arc_id = self.select_arc(&incoming)?;
        self.traverse(arc_id, payload)
    }

    fn select_arc(&self, incoming: &Incoming<'_>) -> Option<ArcId> {
        for (id, arc) in &self.arcs {
            if arc.from != self.current || !incoming.matches(&arc.trigger) {
                continue;
            }
            if let Some(cond) = &arc.condition {
                if !cond.is_true() {
                    tracing::debug!(fsm = %self.name, arc = %id, condition = cond.name(), "condition not met");
                    continue;
                }
            }
            if let Some(token) = &arc.require_token {
                if !self.tokens.try_acquire(token) {
                    tracing::debug!(fsm = %self.name, arc = %id, token = token.as_str(), "token unavailable");
                    continue;
                }
            }
            return Some(*id);
        }
        None
    }

    /// Take arc `arc_id` out of the current state.
    ///
    /// If an exit or arc callback panics, the move still completes: the
    /// arc's token is released, `current` becomes the target and the
    /// transition is logged before the panic resumes. Enter callbacks are
    /// skipped in that case.
    fn traverse(&mut self, arc_id: ArcId, payload: &EventData) -> Option<Transition> {
        let (from, to, trigger) = {
            let arc = self.arcs.get(&arc_id)?;
            (arc.from, arc.to, arc.trigger.label().to_string())
        };
        tracing::debug!(
            fsm = %self.name,
            from = self.state_name(from).unwrap_or("?"),
            to = self.state_name(to).unwrap_or("?"),
            %trigger,
            "traversing arc"
        );

        let leaving = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_exit_callbacks(from, arc_id, payload)
        }));

        if let Some(token) = self.arcs.get(&arc_id).and_then(|a| a.release_token.as_deref()) {
            self.tokens.release(token);
        }
        self.current = to;
        let transition = Transition {
            arc: arc_id,
            from,
            to,
            trigger,
        };
        self.transitions.push(transition.clone());

        if let Err(cause) = leaving {
            tracing::warn!(fsm = %self.name, arc = %arc_id, "callback panicked while leaving state");
            panic::resume_unwind(cause);
        }
        if let Some(state) = self.states.get_mut(&to) {
            for cb in &mut state.on_enter {
                cb();
            }
        }
        Some(transition)
    }

    fn run_exit_callbacks(&mut self, from: StateId, arc_id: ArcId, payload: &EventData) {
        if let Some(state) = self.states.get_mut(&from) {
            for cb in &mut state.on_exit {
                cb();
            }
        }
        if let Some(cb) = self.arcs.get_mut(&arc_id).and_then(|a| a.callback.as_mut()) {
            cb(payload);
        }
    }
}

impl std::fmt::Debug for Fsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fsm")
            .field("name", &self.name)
            .field("current", &self.current_state_name())
            .field("states", &self.states.len())
            .field("arcs", &self.arcs.len())
            .finish()
    }
}

impl EventListener for Fsm {
    fn on_event(&mut self, event: &VrEvent, _ctx: &mut DispatchContext) -> ListenerResult {
        self.handle_event(event);
        Ok(())
    }

    fn end_of_tick(&mut self) -> ListenerResult {
        self.update();
        Ok(())
    }
}
