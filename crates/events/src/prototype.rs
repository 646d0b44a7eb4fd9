use serde::{Deserialize, Serialize};

use crate::data::DataType;
use crate::event::VrEvent;

/// A `(name, type)` pattern used to select events without carrying data.
///
/// A missing type is a wildcard: the prototype then matches any event with
/// the same name regardless of payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPrototype {
    name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    data_type: Option<DataType>,
}

impl EventPrototype {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type),
        }
    }

    /// Prototype for an event without payload.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, DataType::None)
    }

    /// Prototype matching every payload type.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` for a wildcard prototype.
    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    pub fn is_wildcard(&self) -> bool {
        self.data_type.is_none()
    }

    pub fn matches(&self, event: &VrEvent) -> bool {
        self.name == event.name()
            && self.data_type.is_none_or(|ty| ty == event.data_type())
    }
}

impl std::fmt::Display for EventPrototype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.data_type {
            Some(ty) => write!(f, "{} ({ty})", self.name),
            None => write!(f, "{} (*)", self.name),
        }
    }
}
