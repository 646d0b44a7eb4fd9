//! Finite state machines driven by router events.
//!
//! # Invariants
//! - An FSM always has at least one state; its start and current states exist.
//! - State and arc ids are never reused, and removing one never changes another.
//! - At most one arc is traversed per event: the first in registration order
//!   whose trigger matches and whose condition and token guards pass.
//! - Traversal runs exit callbacks, then the arc callback, then enter callbacks,
//!   including for arcs that loop back to the same state.

mod condition;
mod config;
mod machine;
mod token;

pub use condition::{Condition, ConditionSet};
pub use config::{ArcDefinition, ConfigError, FsmDefinition};
pub use machine::{
    ArcId, ArcSpec, Fsm, FsmError, StateCallback, StateId, Transition, Trigger, TriggerCallback,
};
pub use token::TokenRegistry;

pub fn crate_info() -> &'static str {
    "minvr-fsm v0.1.0"
}
