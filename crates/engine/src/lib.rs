//! Engine Context: frame driver over the event router and the cluster protocol.
//!
//! # Invariants
//! - Every node of a cluster dispatches the same synchronized events in the
//!   same order each frame; node-local events follow them.
//! - The delta-time event, when enabled, is the first event of every frame.
//! - No frame is dispatched after shutdown.

mod cluster;
mod config;
mod engine;

pub use cluster::{ClusterError, ClusterNode, StandaloneNode};
pub use config::EngineConfig;
pub use engine::{EngineError, VrEngine};

pub fn crate_info() -> &'static str {
    "minvr-engine v0.1.0"
}
