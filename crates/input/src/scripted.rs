use std::collections::VecDeque;
use std::path::Path;

use minvr_events::{EventPrototype, VrEvent};
use minvr_router::PolledInputDevice;

/// Errors loading an event script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Replays a fixed script of events, one frame per poll.
///
/// A script is a list of frames; each frame is the list of events the device
/// reports on that tick. Once the script runs out the device reports nothing.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDevice {
    frames: VecDeque<Vec<VrEvent>>,
    prototypes: Vec<EventPrototype>,
}

impl ScriptedDevice {
    pub fn new(frames: impl IntoIterator<Item = Vec<VrEvent>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            prototypes: Vec::new(),
        }
    }

    /// Parse a JSON script: an array of frames, each an array of events.
    ///
    /// ```json
    /// [[{"name": "Go"}], [], [{"name": "Trigger", "data": {"type": "float", "value": 0.5}}]]
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let frames: Vec<Vec<VrEvent>> = serde_json::from_str(json)?;
        Ok(Self::new(frames))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&data)
    }

    /// Declare the events this device produces.
    pub fn with_prototypes(mut self, prototypes: Vec<EventPrototype>) -> Self {
        self.prototypes = prototypes;
        self
    }

    pub fn push_frame(&mut self, frame: Vec<VrEvent>) {
        self.frames.push_back(frame);
    }

    /// Frames not yet polled.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn is_finished(&self) -> bool {
        self.frames.is_empty()
    }
}

impl PolledInputDevice for ScriptedDevice {
    fn poll_for_events(&mut self, queue: &mut Vec<VrEvent>) {
        if let Some(frame) = self.frames.pop_front() {
            tracing::trace!(events = frame.len(), remaining = self.frames.len(), "scripted frame");
            queue.extend(frame);
        }
    }

    fn event_prototypes(&self) -> Vec<EventPrototype> {
        self.prototypes.clone()
    }
}
