/*!
The RL-facing view of the controller. This module owns
no state of its own; it is a pure projection from [`Controller`] to the agent's vector interface.
*/

use serde::{Deserialize, Serialize};

use crate::config::Validate;
use crate::constants::{MAX_DISTANCE, MAX_PPS};
use crate::controller::Controller;
use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::protocol::message::{DirectionCode, RobotCommand};
use crate::tensor::Tensor2;

/// One categorical action head's chosen class, keyed by head name.
pub type ActionChoice = std::collections::HashMap<String, usize>;

/// `env.yml`: the handful of parameters the observation/reward/action
/// projection needs that are not already implied by `agent.yml`'s action-head widths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Width of the `sensor` action head's evenly spaced `[-90, 90]` degree classes.
    #[serde(rename = "numSensorDirections")]
    pub num_sensor_directions: usize,
    /// How long a translated `mt` command stays valid before the controller re-issues it.
    #[serde(rename = "commandDeadlineMs")]
    pub command_deadline_ms: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self { num_sensor_directions: 5, command_deadline_ms: 1_000 }
    }
}

impl Validate for EnvironmentConfig {
    fn validate(&self) -> WheellyResult<()> {
        if self.num_sensor_directions < 2 {
            return Err(WheellyError::new(WheellyErrorKind::ConfigInvalid, "numSensorDirections must be >= 2"));
        }
        Ok(())
    }
}

/// Build the observation row the agent's network forwards: heading/sensor direction normalized
/// to `[-1, 1]`, echo distance normalized to `[0, 1]`, and wheel speeds normalized to `[-1, 1]`.
pub fn observe(controller: &Controller) -> Tensor2 {
    let status = *controller.status();
    Tensor2::row_vector(&[
        status.heading_deg as f32 / 180.,
        status.sensor_dir_deg as f32 / 90.,
        status.echo_distance / MAX_DISTANCE,
        status.left_speed / MAX_PPS,
        status.right_speed / MAX_PPS,
        if status.front_clear { 1. } else { 0. },
        if status.rear_clear { 1. } else { 0. },
    ])
}

/// Reward shaping: encourage forward progress, penalize contact. A minimal, legible signal —
/// the agent's own `avgReward` baseline does the heavy lifting, not this function's shape.
pub fn reward(controller: &Controller) -> f32 {
    let status = *controller.status();
    let forward_progress = (status.left_speed + status.right_speed) / (2. * MAX_PPS);
    let contact_penalty = if status.is_blocked() { -1.0 } else if !status.front_clear || !status.rear_clear { -0.5 } else { 0. };
    forward_progress + contact_penalty
}

/// Translate the agent's two action heads (`direction`, `sensor`) into the wire command the
/// controller should refresh.
pub fn choice_to_command(choice: &ActionChoice, deadline_ms: u64, num_sensor_directions: usize) -> RobotCommand {
    if let Some(&direction) = choice.get("direction") {
        if direction == 0 {
            return RobotCommand::Halt;
        }
        return RobotCommand::Move { deadline_ms, direction: direction as DirectionCode };
    }
    if let Some(&sensor_class) = choice.get("sensor") {
        let span = 180. / (num_sensor_directions.max(1) - 1).max(1) as f32;
        let deg = (-90. + span * sensor_class as f32).round() as i32;
        return RobotCommand::Scan { sensor_dir_deg: deg.clamp(-90, 90) };
    }
    RobotCommand::Halt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::backend::SimBackend;
    use crate::controller::ControllerConfig;
    use crate::physics::PhysicsWorld;
    use crate::radar::ObstacleMap;

    #[test]
    fn observation_is_bounded() {
        let world = PhysicsWorld::new(ObstacleMap::new(0.2), 1, 0., 0.);
        let sim = SimBackend::new(world, 5., 0., 1);
        let controller = Controller::with_simulator(ControllerConfig::default(), sim);
        let obs = observe(&controller);
        for v in obs.as_slice() {
            assert!(v.abs() <= 1.0001, "{v} out of bounds");
        }
    }

    #[test]
    fn fresh_controller_has_no_contact_penalty() {
        let world = PhysicsWorld::new(ObstacleMap::new(0.2), 1, 0., 0.);
        let sim = SimBackend::new(world, 5., 0., 1);
        let controller = Controller::with_simulator(ControllerConfig::default(), sim);
        assert_eq!(reward(&controller), 0.);
    }

    #[test]
    fn direction_zero_halts() {
        let mut choice = ActionChoice::new();
        choice.insert("direction".to_string(), 0);
        assert_eq!(choice_to_command(&choice, 1000, 5), RobotCommand::Halt);
    }
}
