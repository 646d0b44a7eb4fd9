use glam::{Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque reference to an application object living on the local node.
///
/// The id means nothing to another process, so events carrying one are never
/// shared across a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef(pub Uuid);

impl ObjectRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

/// Type tag of an event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    None,
    Bool,
    Int,
    Float,
    Vector2,
    Vector3,
    Vector4,
    Quaternion,
    String,
    Object,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::None,
        DataType::Bool,
        DataType::Int,
        DataType::Float,
        DataType::Vector2,
        DataType::Vector3,
        DataType::Vector4,
        DataType::Quaternion,
        DataType::String,
        DataType::Object,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataType::None => "none",
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Vector2 => "vector2",
            DataType::Vector3 => "vector3",
            DataType::Vector4 => "vector4",
            DataType::Quaternion => "quaternion",
            DataType::String => "string",
            DataType::Object => "object",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Event payload. The variant is the type tag used for matching.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventData {
    #[default]
    None,
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Quaternion(Quat),
    String(String),
    Object(ObjectRef),
}

impl EventData {
    pub fn data_type(&self) -> DataType {
        match self {
            EventData::None => DataType::None,
            EventData::Bool(_) => DataType::Bool,
            EventData::Int(_) => DataType::Int,
            EventData::Float(_) => DataType::Float,
            EventData::Vector2(_) => DataType::Vector2,
            EventData::Vector3(_) => DataType::Vector3,
            EventData::Vector4(_) => DataType::Vector4,
            EventData::Quaternion(_) => DataType::Quaternion,
            EventData::String(_) => DataType::String,
            EventData::Object(_) => DataType::Object,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventData::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            EventData::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            EventData::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            EventData::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            EventData::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            EventData::Vector4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_quat(&self) -> Option<Quat> {
        match self {
            EventData::Quaternion(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EventData::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            EventData::Object(v) => Some(*v),
            _ => None,
        }
    }
}
