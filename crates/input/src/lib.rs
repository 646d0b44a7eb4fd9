//! Input producers and converters feeding the event router.
//!
//! # Invariants
//! - Devices only append to the queue during polling; they never dispatch.
//! - Converters emit their output as derived events, delivered right after the
//!   event that caused them.

pub mod callable;
pub mod convert;
pub mod scripted;

pub use callable::CallableEventProducer;
pub use convert::{ButtonsToFloat, FloatToButtons, FloatToButtonsConfig, CONVERTER_PRIORITY};
pub use scripted::{ScriptError, ScriptedDevice};

pub fn crate_info() -> &'static str {
    "minvr-input v0.1.0"
}
