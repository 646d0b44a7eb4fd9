use glam::{Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::data::{DataType, EventData, ObjectRef};
use crate::prototype::EventPrototype;

/// Errors decoding events from their JSON wire form.
#[derive(Debug, thiserror::Error)]
pub enum EventCodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A named event with a typed payload.
///
/// Events are immutable once built. Names are hierarchical by convention
/// (`"Mouse/Position"`, `"Wand/Trigger/Down"`), and a `(name, type)` pair is
/// treated as the identity of an event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VrEvent {
    name: String,
    #[serde(default)]
    data: EventData,
}

impl VrEvent {
    pub fn new(name: impl Into<String>, data: EventData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// An event without payload.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, EventData::None)
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, EventData::Bool(value))
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, EventData::Int(value))
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, EventData::Float(value))
    }

    pub fn vec2(name: impl Into<String>, value: Vec2) -> Self {
        Self::new(name, EventData::Vector2(value))
    }

    pub fn vec3(name: impl Into<String>, value: Vec3) -> Self {
        Self::new(name, EventData::Vector3(value))
    }

    pub fn vec4(name: impl Into<String>, value: Vec4) -> Self {
        Self::new(name, EventData::Vector4(value))
    }

    pub fn quat(name: impl Into<String>, value: Quat) -> Self {
        Self::new(name, EventData::Quaternion(value))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, EventData::String(value.into()))
    }

    pub fn object(name: impl Into<String>, value: ObjectRef) -> Self {
        Self::new(name, EventData::Object(value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &EventData {
        &self.data
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn matches(&self, prototype: &EventPrototype) -> bool {
        prototype.matches(self)
    }

    /// Same payload under a new name. Used by alias filters.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: self.data.clone(),
        }
    }

    /// Whether the event can be replicated to other cluster nodes.
    ///
    /// Object references are local to one process; events carrying them must
    /// be regenerated on each node from the primary input instead.
    pub fn is_cluster_safe(&self) -> bool {
        !matches!(self.data, EventData::Object(_))
    }

    pub fn to_json(&self) -> Result<String, EventCodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EventCodecError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl std::fmt::Display for VrEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.data_type())
    }
}
