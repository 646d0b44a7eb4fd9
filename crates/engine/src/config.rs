use std::path::Path;

use minvr_router::RouterConfig;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Engine settings, usually loaded from YAML. Every field has a default.
///
/// ```yaml
/// emit_delta_time: true
/// delta_time_event_name: FrameStart
/// router:
///   max_derived_events: 256
///   log_events: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Put a float event carrying the frame's delta time at the front of each queue.
    pub emit_delta_time: bool,
    pub delta_time_event_name: String,
    pub router: RouterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            emit_delta_time: true,
            delta_time_event_name: "FrameStart".into(),
            router: RouterConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&data)
    }
}
