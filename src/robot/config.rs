/*!
`robot.yml`: which backend the controller drives — the physics [`crate::physics::PhysicsWorld`]
simulator, or the real firmware over [`crate::protocol::transport::Transport`]. The two variants
below are the minimum each backend in [`crate::controller::backend`] needs to construct itself.
*/

use serde::{Deserialize, Serialize};

use crate::config::Validate;
use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RobotConfig {
    #[serde(rename = "simulator")]
    Simulator {
        #[serde(default)]
        obstacles: Vec<(f32, f32)>,
        #[serde(default)]
        seed: u64,
        #[serde(rename = "maxAngularSpeed", default = "default_max_angular_speed")]
        max_angular_speed: f32,
        #[serde(rename = "errSensorSigma", default)]
        err_sensor_sigma: f32,
        #[serde(rename = "errSigmaSigma", default)]
        err_sigma_sigma: f32,
    },
    #[serde(rename = "real")]
    Real {
        address: String,
        #[serde(rename = "maxConnectAttempts", default = "default_max_connect_attempts")]
        max_connect_attempts: u32,
        #[serde(rename = "retryDelayMs", default = "default_retry_delay_ms")]
        retry_delay_ms: u64,
    },
}

fn default_max_angular_speed() -> f32 {
    crate::constants::MAX_ANGULAR_VELOCITY
}

fn default_max_connect_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Validate for RobotConfig {
    fn validate(&self) -> WheellyResult<()> {
        match self {
            RobotConfig::Simulator { max_angular_speed, .. } if *max_angular_speed <= 0. => {
                Err(WheellyError::new(WheellyErrorKind::ConfigInvalid, "maxAngularSpeed must be > 0"))
            }
            RobotConfig::Real { address, .. } if address.trim().is_empty() => {
                Err(WheellyError::new(WheellyErrorKind::ConfigInvalid, "real robot address must not be empty"))
            }
            RobotConfig::Real { max_connect_attempts: 0, .. } => {
                Err(WheellyError::new(WheellyErrorKind::ConfigInvalid, "maxConnectAttempts must be > 0"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_real_address() {
        let config = RobotConfig::Real { address: " ".into(), max_connect_attempts: 5, retry_delay_ms: 100 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_default_simulator_config() {
        let config = RobotConfig::Simulator { obstacles: Vec::new(), seed: 1, max_angular_speed: 5., err_sensor_sigma: 0., err_sigma_sigma: 0. };
        assert!(config.validate().is_ok());
    }
}
