use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named boolean flag an arc can require before it is traversed.
///
/// Clones share the flag, so application code keeps one handle and flips it
/// while the FSM holds another.
#[derive(Debug, Clone)]
pub struct Condition {
    name: String,
    value: Arc<AtomicBool>,
}

impl Condition {
    pub fn new(name: impl Into<String>, initial: bool) -> Self {
        Self {
            name: name.into(),
            value: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_true(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }
}

/// Conditions available to FSM definitions loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    conditions: BTreeMap<String, Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, replacing any previous one with the same name.
    pub fn insert(&mut self, condition: Condition) {
        self.conditions.insert(condition.name.clone(), condition);
    }

    pub fn get(&self, name: &str) -> Option<&Condition> {
        self.conditions.get(name)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_value() {
        let c = Condition::new("armed", false);
        let view = c.clone();
        c.set(true);
        assert!(view.is_true());
    }

    #[test]
    fn set_lookup_by_name() {
        let mut set = ConditionSet::new();
        set.insert(Condition::new("armed", true));
        assert_eq!(set.len(), 1);
        assert!(set.get("armed").is_some_and(Condition::is_true));
        assert!(set.get("missing").is_none());
    }
}
