//! Event Model: typed, named events and the prototypes that match them.
//!
//! # Invariants
//! - An event's type tag is derived from its payload variant, never stored apart.
//! - A prototype matches an event iff the names are equal and the prototype
//!   type is a wildcard or equal to the event type.

mod data;
mod event;
mod prototype;

pub use data::{DataType, EventData, ObjectRef};
pub use event::{EventCodecError, VrEvent};
pub use prototype::EventPrototype;

pub fn crate_info() -> &'static str {
    "minvr-events v0.1.0"
}
