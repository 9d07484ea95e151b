/*!
The scripted fallback agent: a named graph of [`states::StateRuntime`]s with per-state
transitions keyed by [`states::ExitToken`]. Used in place of [`crate::agent::TdAgent`] when no
trained model is configured, or as the agent that bootstraps a fresh one's early trajectories.
*/

pub mod states;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::Validate;
use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::protocol::message::RobotCommand;
use crate::robot::status::RobotStatus;
use states::{ExitToken, StateRuntime, StateSpec};

/// One named node of the state graph: its behaviour plus where each exit token sends it next.
/// An exit token with no matching transition simply keeps the machine in the current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateNodeSpec {
    pub state: StateSpec,
    #[serde(default)]
    pub transitions: HashMap<ExitToken, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    pub initial: String,
    pub states: HashMap<String, StateNodeSpec>,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self { initial: String::new(), states: HashMap::new() }
    }
}

impl Validate for StateMachineConfig {
    fn validate(&self) -> WheellyResult<()> {
        if !self.states.contains_key(&self.initial) {
            return Err(WheellyError::new(
                WheellyErrorKind::ConfigInvalid,
                format!("state machine's initial state '{}' is not declared", self.initial),
            ));
        }
        for (name, node) in &self.states {
            for target in node.transitions.values() {
                if !self.states.contains_key(target) {
                    return Err(WheellyError::new(
                        WheellyErrorKind::ConfigInvalid,
                        format!("state '{name}' transitions to undeclared state '{target}'"),
                    ));
                }
            }
        }
        Ok(())
    }
}

pub struct StateMachine {
    config: StateMachineConfig,
    current_name: String,
    current: StateRuntime,
}

impl StateMachine {
    pub fn new(config: StateMachineConfig) -> WheellyResult<Self> {
        config.validate()?;
        let current = StateRuntime::on_entry(&config.states[&config.initial].state);
        let current_name = config.initial.clone();
        Ok(Self { config, current_name, current })
    }

    pub fn current_state_name(&self) -> &str {
        &self.current_name
    }

    /// One scripted-agent tick: run the current state, follow a declared transition if the exit
    /// token names one, and return the command the (possibly now-new) state issues this cycle.
    pub fn tick(&mut self, status: &RobotStatus, now_ms: u64) -> RobotCommand {
        let (token, command) = self.current.step(status, now_ms);
        if let Some(target) = self.config.states[&self.current_name].transitions.get(&token) {
            self.current_name = target.clone();
            self.current = StateRuntime::on_entry(&self.config.states[&self.current_name].state);
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StateMachineConfig {
        let mut states = HashMap::new();
        let mut halt_transitions = HashMap::new();
        halt_transitions.insert(ExitToken::Timeout, "explore".to_string());
        states.insert("halt".to_string(), StateNodeSpec { state: StateSpec::Halt, transitions: halt_transitions });
        states.insert("explore".to_string(), StateNodeSpec { state: StateSpec::Explore, transitions: HashMap::new() });
        StateMachineConfig { initial: "halt".to_string(), states }
    }

    #[test]
    fn rejects_config_with_undeclared_initial_state() {
        let mut cfg = config();
        cfg.initial = "missing".to_string();
        assert!(StateMachine::new(cfg).is_err());
    }

    #[test]
    fn stays_in_current_state_when_exit_token_has_no_transition() {
        let mut machine = StateMachine::new(config()).unwrap();
        machine.tick(&RobotStatus::initial(0), 0);
        assert_eq!(machine.current_state_name(), "halt");
    }
}
