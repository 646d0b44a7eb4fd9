use std::cell::RefCell;
use std::rc::Rc;

use minvr_events::{EventPrototype, VrEvent};

use crate::manager::RouterError;

/// Rewrites events just before they reach listeners.
///
/// A filter that catches an event returns `true` and writes its replacement
/// (zero, one or several events) to `out`. Returning `false` lets the event
/// pass through untouched.
pub trait EventFilter {
    fn filter_event(&mut self, event: &VrEvent, out: &mut Vec<VrEvent>) -> bool;
}

pub type SharedFilter = Rc<RefCell<dyn EventFilter>>;

pub(crate) fn same_filter(a: &SharedFilter, b: &SharedFilter) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// How an [`EventAlias`] treats a matching event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasStrategy {
    /// Replace the original with a renamed copy.
    #[default]
    RenameOriginal,
    /// Keep the original and add a renamed copy after it.
    RenameClone,
}

/// Filter that gives one or more events a common alias name.
#[derive(Debug, Clone)]
pub struct EventAlias {
    alias: String,
    strategy: AliasStrategy,
    originals: Vec<EventPrototype>,
}

impl EventAlias {
    /// All originals must share one data type, since listeners of the alias
    /// expect a single payload kind.
    pub fn new(
        alias: impl Into<String>,
        strategy: AliasStrategy,
        originals: Vec<EventPrototype>,
    ) -> Result<Self, RouterError> {
        let alias = alias.into();
        if let Some(first) = originals.first() {
            if originals.iter().any(|p| p.data_type() != first.data_type()) {
                return Err(RouterError::AliasTypeMismatch { alias });
            }
        }
        Ok(Self {
            alias,
            strategy,
            originals,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn strategy(&self) -> AliasStrategy {
        self.strategy
    }

    /// The alias event this filter produces, typed after the originals.
    pub fn event_prototypes(&self) -> Vec<EventPrototype> {
        match self.originals.first() {
            Some(first) => vec![match first.data_type() {
                Some(ty) => EventPrototype::new(self.alias.clone(), ty),
                None => EventPrototype::any(self.alias.clone()),
            }],
            None => Vec::new(),
        }
    }
}

impl EventFilter for EventAlias {
    fn filter_event(&mut self, event: &VrEvent, out: &mut Vec<VrEvent>) -> bool {
        if !self.originals.iter().any(|p| p.matches(event)) {
            return false;
        }
        if self.strategy == AliasStrategy::RenameClone {
            out.push(event.clone());
        }
        out.push(event.renamed(self.alias.clone()));
        true
    }
}

/// Priority [`ModifiedEventFilter`] is usually registered at, ahead of
/// aliases added with [`add_event_filter`](crate::EventManager::add_event_filter).
pub const MODIFIER_FILTER_PRIORITY: i32 = -1;

/// Filter that renames a base event while a modifier is held.
///
/// The modifier is switched by an on/off event pair, for example a key's
/// down and up events. While it is on, matching base events are renamed to
/// their own name plus a suffix (`/Modified` by default). Modifier events
/// themselves always pass through.
#[derive(Debug, Clone)]
pub struct ModifiedEventFilter {
    base: EventPrototype,
    modifier_on: EventPrototype,
    modifier_off: EventPrototype,
    suffix: String,
    strategy: AliasStrategy,
    active: bool,
}

impl ModifiedEventFilter {
    pub fn new(base: EventPrototype, modifier_on: EventPrototype, modifier_off: EventPrototype) -> Self {
        Self {
            base,
            modifier_on,
            modifier_off,
            suffix: "/Modified".into(),
            strategy: AliasStrategy::RenameOriginal,
            active: false,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_strategy(mut self, strategy: AliasStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn is_modifier_on(&self) -> bool {
        self.active
    }

    pub fn modified_name(&self) -> String {
        format!("{}{}", self.base.name(), self.suffix)
    }

    pub fn event_prototypes(&self) -> Vec<EventPrototype> {
        vec![match self.base.data_type() {
            Some(ty) => EventPrototype::new(self.modified_name(), ty),
            None => EventPrototype::any(self.modified_name()),
        }]
    }
}

impl EventFilter for ModifiedEventFilter {
    fn filter_event(&mut self, event: &VrEvent, out: &mut Vec<VrEvent>) -> bool {
        if self.modifier_on.matches(event) {
            self.active = true;
        } else if self.modifier_off.matches(event) {
            self.active = false;
        }

        if !self.active || !self.base.matches(event) {
            return false;
        }
        if self.strategy == AliasStrategy::RenameClone {
            out.push(event.clone());
        }
        out.push(event.renamed(format!("{}{}", event.name(), self.suffix)));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minvr_events::DataType;

    fn alias(strategy: AliasStrategy) -> EventAlias {
        EventAlias::new(
            "Select",
            strategy,
            vec![
                EventPrototype::named("Mouse/Left/Down"),
                EventPrototype::named("Wand/Trigger/Down"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rename_original_replaces_event() {
        let mut f = alias(AliasStrategy::RenameOriginal);
        let mut out = Vec::new();
        assert!(f.filter_event(&VrEvent::named("Wand/Trigger/Down"), &mut out));
        assert_eq!(out, vec![VrEvent::named("Select")]);
    }

    #[test]
    fn rename_clone_keeps_original_first() {
        let mut f = alias(AliasStrategy::RenameClone);
        let mut out = Vec::new();
        assert!(f.filter_event(&VrEvent::named("Mouse/Left/Down"), &mut out));
        assert_eq!(
            out,
            vec![VrEvent::named("Mouse/Left/Down"), VrEvent::named("Select")]
        );
    }

    #[test]
    fn unrelated_events_pass() {
        let mut f = alias(AliasStrategy::RenameOriginal);
        let mut out = Vec::new();
        assert!(!f.filter_event(&VrEvent::named("Mouse/Right/Down"), &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn mixed_types_rejected() {
        let err = EventAlias::new(
            "Pointer",
            AliasStrategy::RenameOriginal,
            vec![
                EventPrototype::new("Mouse/Position", DataType::Vector2),
                EventPrototype::new("Wand/Position", DataType::Vector3),
            ],
        );
        assert!(matches!(err, Err(RouterError::AliasTypeMismatch { .. })));
    }

    #[test]
    fn alias_prototype_follows_originals() {
        let f = EventAlias::new(
            "Pointer",
            AliasStrategy::RenameOriginal,
            vec![EventPrototype::new("Mouse/Position", DataType::Vector2)],
        )
        .unwrap();
        assert_eq!(
            f.event_prototypes(),
            vec![EventPrototype::new("Pointer", DataType::Vector2)]
        );
    }

    fn shift_click() -> ModifiedEventFilter {
        ModifiedEventFilter::new(
            EventPrototype::named("Mouse/Left/Down"),
            EventPrototype::named("Kbd/Shift/Down"),
            EventPrototype::named("Kbd/Shift/Up"),
        )
    }

    #[test]
    fn base_event_renamed_only_while_modifier_on() {
        let mut f = shift_click();
        let click = VrEvent::named("Mouse/Left/Down");
        let mut out = Vec::new();

        assert!(!f.filter_event(&click, &mut out));
        assert!(!f.filter_event(&VrEvent::named("Kbd/Shift/Down"), &mut out));
        assert!(f.is_modifier_on());
        assert!(f.filter_event(&click, &mut out));
        assert_eq!(out, vec![VrEvent::named("Mouse/Left/Down/Modified")]);

        out.clear();
        assert!(!f.filter_event(&VrEvent::named("Kbd/Shift/Up"), &mut out));
        assert!(!f.filter_event(&click, &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn modified_clone_keeps_original() {
        let mut f = shift_click()
            .with_suffix("+Shift")
            .with_strategy(AliasStrategy::RenameClone);
        let mut out = Vec::new();
        f.filter_event(&VrEvent::named("Kbd/Shift/Down"), &mut out);
        assert!(f.filter_event(&VrEvent::named("Mouse/Left/Down"), &mut out));
        assert_eq!(
            out,
            vec![VrEvent::named("Mouse/Left/Down"), VrEvent::named("Mouse/Left/Down+Shift")]
        );
        assert_eq!(f.event_prototypes(), vec![EventPrototype::named("Mouse/Left/Down+Shift")]);
    }
}
