use minvr_fsm::{ArcId, Fsm, StateId};

/// FSM inspector for developer tooling.
///
/// Read-only queries against a state machine for debugging and logs.
pub struct FsmInspector;

impl FsmInspector {
    pub fn summary(fsm: &Fsm) -> FsmSummary {
        FsmSummary {
            name: fsm.name().to_string(),
            current: fsm.current_state_name().to_string(),
            start: fsm
                .state_name(fsm.start_state())
                .unwrap_or_default()
                .to_string(),
            state_count: fsm.num_states(),
            arc_count: fsm.num_arcs(),
            held_tokens: fsm.tokens().held(),
        }
    }

    /// A state with its outgoing arcs, or `None` if the id is stale.
    pub fn inspect_state(fsm: &Fsm, id: StateId) -> Option<StateInfo> {
        let name = fsm.state_name(id).ok()?.to_string();
        let outgoing = Self::list_arcs(fsm)
            .into_iter()
            .filter(|arc| arc.from == name)
            .collect();
        Some(StateInfo {
            id,
            name,
            is_current: fsm.current_state() == id,
            outgoing,
        })
    }

    /// Every arc in registration order.
    pub fn list_arcs(fsm: &Fsm) -> Vec<ArcInfo> {
        fsm.arc_ids()
            .into_iter()
            .filter_map(|id| {
                let (from, to) = fsm.arc_endpoints(id).ok()?;
                Some(ArcInfo {
                    id,
                    from: fsm.state_name(from).ok()?.to_string(),
                    to: fsm.state_name(to).ok()?.to_string(),
                    trigger: fsm.arc_trigger(id).ok()?.to_string(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FsmSummary {
    pub name: String,
    pub current: String,
    pub start: String,
    pub state_count: usize,
    pub arc_count: usize,
    /// Held tokens across the whole registry, sorted.
    pub held_tokens: Vec<String>,
}

impl std::fmt::Display for FsmSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FSM {}: current={} start={} states={} arcs={} tokens=[{}]",
            self.name,
            self.current,
            self.start,
            self.state_count,
            self.arc_count,
            self.held_tokens.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub struct StateInfo {
    pub id: StateId,
    pub name: String,
    pub is_current: bool,
    pub outgoing: Vec<ArcInfo>,
}

#[derive(Debug, Clone)]
pub struct ArcInfo {
    pub id: ArcId,
    pub from: String,
    pub to: String,
    pub trigger: String,
}

impl std::fmt::Display for ArcInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-->{} on {}", self.from, self.to, self.trigger)
    }
}
