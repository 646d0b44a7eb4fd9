use std::path::Path;

use minvr_events::EventPrototype;
use serde::{Deserialize, Serialize};

use crate::condition::ConditionSet;
use crate::machine::{ArcSpec, Fsm, FsmError, Trigger};
use crate::token::TokenRegistry;

/// Errors from loading or building an FSM definition.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("start state {0:?} is not listed in states")]
    MissingStartState(String),
    #[error("arc {from}-->{to} has neither an event nor a trigger")]
    MissingTrigger { from: String, to: String },
    #[error("arc {from}-->{to} has both an event and a trigger")]
    AmbiguousTrigger { from: String, to: String },
    #[error("arc {from}-->{to} uses unknown condition {condition:?}")]
    UnknownCondition {
        from: String,
        to: String,
        condition: String,
    },
    #[error(transparent)]
    Fsm(#[from] FsmError),
}

/// One arc of an [`FsmDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcDefinition {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventPrototype>,
    /// Manual trigger name, exclusive with `event`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Declarative FSM description, usually loaded from YAML.
///
/// ```yaml
/// name: grab
/// start: Idle
/// states: [Idle, Dragging]
/// arcs:
///   - from: Idle
///     to: Dragging
///     event: { name: Wand_Trigger_Down }
///     require_token: drag
///   - from: Dragging
///     to: Idle
///     event: { name: Wand_Trigger_Up }
///     release_token: drag
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmDefinition {
    pub name: String,
    pub start: String,
    pub states: Vec<String>,
    #[serde(default)]
    pub arcs: Vec<ArcDefinition>,
}

impl FsmDefinition {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&data)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the definition and build the FSM it describes.
    pub fn build(&self, tokens: TokenRegistry, conditions: &ConditionSet) -> Result<Fsm, ConfigError> {
        if !self.states.iter().any(|s| *s == self.start) {
            return Err(ConfigError::MissingStartState(self.start.clone()));
        }
        let mut fsm = Fsm::new(&self.name, &self.start, tokens);
        let mut start_seen = false;
        for state in &self.states {
            if *state == self.start && !start_seen {
                start_seen = true;
                continue;
            }
            fsm.add_state(state)?;
        }

        for arc in &self.arcs {
            let from = lookup(&fsm, &arc.from)?;
            let to = lookup(&fsm, &arc.to)?;
            let trigger = match (&arc.event, &arc.trigger) {
                (Some(proto), None) => Trigger::Event(proto.clone()),
                (None, Some(name)) => Trigger::Manual(name.clone()),
                (None, None) => {
                    return Err(ConfigError::MissingTrigger {
                        from: arc.from.clone(),
                        to: arc.to.clone(),
                    });
                }
                (Some(_), Some(_)) => {
                    return Err(ConfigError::AmbiguousTrigger {
                        from: arc.from.clone(),
                        to: arc.to.clone(),
                    });
                }
            };

            let mut spec = ArcSpec::new(from, to, trigger);
            if let Some(name) = &arc.condition {
                let condition = conditions
                    .get(name)
                    .ok_or_else(|| ConfigError::UnknownCondition {
                        from: arc.from.clone(),
                        to: arc.to.clone(),
                        condition: name.clone(),
                    })?;
                spec = spec.with_condition(condition.clone());
            }
            if let Some(token) = &arc.require_token {
                spec = spec.require_token(token);
            }
            if let Some(token) = &arc.release_token {
                spec = spec.release_token(token);
            }
            fsm.add_arc(spec)?;
        }

        tracing::debug!(
            fsm = %self.name,
            states = fsm.num_states(),
            arcs = fsm.num_arcs(),
            "fsm built from definition"
        );
        Ok(fsm)
    }
}

fn lookup(fsm: &Fsm, name: &str) -> Result<crate::machine::StateId, FsmError> {
    fsm.state_id(name)
        .ok_or_else(|| FsmError::UnknownStateName(name.to_string()))
}

impl Fsm {
    /// Build an FSM from a declarative definition.
    pub fn from_definition(
        definition: &FsmDefinition,
        tokens: TokenRegistry,
        conditions: &ConditionSet,
    ) -> Result<Self, ConfigError> {
        definition.build(tokens, conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use minvr_events::{DataType, VrEvent};
    use std::io::Write;

    const GRAB: &str = r#"
name: grab
start: Idle
states: [Idle, Dragging]
arcs:
  - from: Idle
    to: Dragging
    event: { name: Wand_Trigger_Down }
    require_token: drag
  - from: Dragging
    to: Idle
    event: { name: Wand_Trigger_Up, type: none }
    release_token: drag
"#;

    #[test]
    fn parses_yaml() {
        let def = FsmDefinition::from_yaml_str(GRAB).unwrap();
        assert_eq!(def.name, "grab");
        assert_eq!(def.states, ["Idle", "Dragging"]);
        assert_eq!(def.arcs.len(), 2);
        assert!(def.arcs[0].event.as_ref().unwrap().is_wildcard());
        assert_eq!(
            def.arcs[1].event.as_ref().unwrap().data_type(),
            Some(DataType::None)
        );
    }

    #[test]
    fn built_fsm_runs() {
        let tokens = TokenRegistry::new();
        let def = FsmDefinition::from_yaml_str(GRAB).unwrap();
        let mut fsm = Fsm::from_definition(&def, tokens.clone(), &ConditionSet::new()).unwrap();
        assert_eq!(fsm.current_state_name(), "Idle");
        assert_eq!(fsm.num_arcs(), 2);

        fsm.handle_event(&VrEvent::named("Wand_Trigger_Down"));
        assert_eq!(fsm.current_state_name(), "Dragging");
        assert!(tokens.is_held("drag"));
        fsm.handle_event(&VrEvent::named("Wand_Trigger_Up"));
        assert_eq!(fsm.current_state_name(), "Idle");
        assert!(!tokens.is_held("drag"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GRAB.as_bytes()).unwrap();
        let def = FsmDefinition::load(file.path()).unwrap();
        assert_eq!(def.start, "Idle");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsmDefinition::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn yaml_survives_reserialization() {
        let def = FsmDefinition::from_yaml_str(GRAB).unwrap();
        let again = FsmDefinition::from_yaml_str(&def.to_yaml_string().unwrap()).unwrap();
        assert_eq!(def, again);
    }

    #[test]
    fn start_must_be_listed() {
        let def = FsmDefinition::from_yaml_str("name: x\nstart: Nowhere\nstates: [A]\n").unwrap();
        let err = def.build(TokenRegistry::new(), &ConditionSet::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingStartState(s) if s == "Nowhere"));
    }

    #[test]
    fn unknown_arc_endpoint() {
        let yaml = "name: x\nstart: A\nstates: [A]\narcs:\n  - { from: A, to: B, trigger: go }\n";
        let def = FsmDefinition::from_yaml_str(yaml).unwrap();
        let err = def.build(TokenRegistry::new(), &ConditionSet::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Fsm(FsmError::UnknownStateName(n)) if n == "B"));
    }

    #[test]
    fn duplicate_state_rejected() {
        let def = FsmDefinition::from_yaml_str("name: x\nstart: A\nstates: [A, B, B]\n").unwrap();
        let err = def.build(TokenRegistry::new(), &ConditionSet::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Fsm(FsmError::DuplicateStateName(_))));
    }

    #[test]
    fn repeated_start_state_rejected() {
        let def = FsmDefinition::from_yaml_str("name: x\nstart: Idle\nstates: [Idle, B, Idle]\n").unwrap();
        let err = def.build(TokenRegistry::new(), &ConditionSet::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Fsm(FsmError::DuplicateStateName(ref n)) if n == "Idle"));
    }

    #[test]
    fn trigger_must_be_exactly_one() {
        let none = "name: x\nstart: A\nstates: [A]\narcs:\n  - { from: A, to: A }\n";
        let both = "name: x\nstart: A\nstates: [A]\narcs:\n  - { from: A, to: A, trigger: t, event: { name: E } }\n";
        let build = |yaml: &str| {
            FsmDefinition::from_yaml_str(yaml)
                .unwrap()
                .build(TokenRegistry::new(), &ConditionSet::new())
        };
        assert!(matches!(build(none), Err(ConfigError::MissingTrigger { .. })));
        assert!(matches!(build(both), Err(ConfigError::AmbiguousTrigger { .. })));
    }

    #[test]
    fn conditions_resolve_by_name() {
        let yaml = "name: x\nstart: A\nstates: [A, B]\narcs:\n  - { from: A, to: B, trigger: go, condition: armed }\n";
        let def = FsmDefinition::from_yaml_str(yaml).unwrap();
        let err = def.build(TokenRegistry::new(), &ConditionSet::new()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCondition { condition, .. } if condition == "armed"));

        let armed = Condition::new("armed", false);
        let mut conditions = ConditionSet::new();
        conditions.insert(armed.clone());
        let mut fsm = def.build(TokenRegistry::new(), &conditions).unwrap();
        assert!(fsm.fire_trigger("go", &Default::default()).is_none());
        armed.set(true);
        assert!(fsm.fire_trigger("go", &Default::default()).is_some());
        assert_eq!(fsm.current_state_name(), "B");
    }
}
