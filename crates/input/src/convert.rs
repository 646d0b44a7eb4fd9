use minvr_events::{DataType, EventPrototype, VrEvent};
use minvr_router::{DispatchContext, EventListener, ListenerResult, DEFAULT_LISTENER_PRIORITY};
use serde::{Deserialize, Serialize};

/// Converters run just ahead of default listeners so their derived events
/// are in flight before ordinary consumers see the source event.
pub const CONVERTER_PRIORITY: i32 = DEFAULT_LISTENER_PRIORITY - 1;

/// Turns a pair of button events into a float event.
#[derive(Debug, Clone)]
pub struct ButtonsToFloat {
    down: EventPrototype,
    up: EventPrototype,
    float_name: String,
    down_value: f32,
    up_value: f32,
}

impl ButtonsToFloat {
    /// Emit `float_name` with 1.0 on `down` and 0.0 on `up`.
    pub fn new(down: EventPrototype, up: EventPrototype, float_name: impl Into<String>) -> Self {
        Self {
            down,
            up,
            float_name: float_name.into(),
            down_value: 1.0,
            up_value: 0.0,
        }
    }

    pub fn with_values(mut self, down_value: f32, up_value: f32) -> Self {
        self.down_value = down_value;
        self.up_value = up_value;
        self
    }

    pub fn event_prototypes(&self) -> Vec<EventPrototype> {
        vec![EventPrototype::new(&self.float_name, DataType::Float)]
    }
}

impl EventListener for ButtonsToFloat {
    fn on_event(&mut self, event: &VrEvent, ctx: &mut DispatchContext) -> ListenerResult {
        let value = if self.down.matches(event) {
            self.down_value
        } else if self.up.matches(event) {
            self.up_value
        } else {
            return Ok(());
        };
        ctx.insert_derived(VrEvent::float(&self.float_name, value));
        Ok(())
    }
}

/// Settings for [`FloatToButtons`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatToButtonsConfig {
    pub down_event: String,
    pub up_event: String,
    /// Raw value mapped to 0.0 by the normalized event.
    pub min_value: f32,
    /// Raw value mapped to 1.0 by the normalized event.
    pub max_value: f32,
    pub threshold: f32,
    /// Name of the normalized float event, or `None` to skip it.
    pub normalized_event: Option<String>,
}

impl Default for FloatToButtonsConfig {
    fn default() -> Self {
        Self {
            down_event: "_Tool/FirstBtn/Down".into(),
            up_event: "_Tool/FirstBtn/Up".into(),
            min_value: 0.0,
            max_value: 1.0,
            threshold: 0.1,
            normalized_event: Some("_Tool/FirstBtn/NormalizedValue".into()),
        }
    }
}

/// Turns an analog float event into button down/up events.
///
/// Down fires when the value rises from below the threshold to at or above
/// it; up fires when it falls from above the threshold to at or below it. The
/// first value seen only seeds the comparison.
#[derive(Debug, Clone)]
pub struct FloatToButtons {
    source: EventPrototype,
    config: FloatToButtonsConfig,
    last: Option<f32>,
}

impl FloatToButtons {
    pub fn new(source_name: impl Into<String>, config: FloatToButtonsConfig) -> Self {
        if config.max_value == config.min_value {
            tracing::warn!(
                value = config.min_value,
                "min and max are equal; normalized values collapse to 0 or 1"
            );
        }
        Self {
            source: EventPrototype::new(source_name, DataType::Float),
            config,
            last: None,
        }
    }

    pub fn config(&self) -> &FloatToButtonsConfig {
        &self.config
    }

    pub fn event_prototypes(&self) -> Vec<EventPrototype> {
        let mut prototypes = vec![
            EventPrototype::named(&self.config.down_event),
            EventPrototype::named(&self.config.up_event),
        ];
        if let Some(name) = &self.config.normalized_event {
            prototypes.push(EventPrototype::new(name, DataType::Float));
        }
        prototypes
    }

    fn normalize(&self, value: f32) -> f32 {
        let span = self.config.max_value - self.config.min_value;
        let t = (value - self.config.min_value) / span;
        if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
    }
}

impl EventListener for FloatToButtons {
    fn on_event(&mut self, event: &VrEvent, ctx: &mut DispatchContext) -> ListenerResult {
        if !self.source.matches(event) {
            return Ok(());
        }
        let Some(value) = event.data().as_float() else {
            return Ok(());
        };

        let threshold = self.config.threshold;
        if let Some(last) = self.last {
            if last < threshold && value >= threshold {
                ctx.insert_derived(VrEvent::named(&self.config.down_event));
            } else if last > threshold && value <= threshold {
                ctx.insert_derived(VrEvent::named(&self.config.up_event));
            }
        }
        self.last = Some(value);

        if let Some(name) = &self.config.normalized_event {
            ctx.insert_derived(VrEvent::float(name, self.normalize(value)));
        }
        Ok(())
    }
}
