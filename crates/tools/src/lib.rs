//! Developer Tooling: FSM inspector and event recorder.
//!
//! # Invariants
//! - Tools only observe; they never change FSM state or the event queue.

pub mod inspector;
pub mod recorder;

pub use inspector::{ArcInfo, FsmInspector, FsmSummary, StateInfo};
pub use recorder::{EventRecorder, RecordedEvent};

pub fn crate_info() -> &'static str {
    "minvr-tools v0.1.0"
}
