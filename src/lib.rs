/*!
Wheelly: a reinforcement-learning controller, 2-D physics simulator, and TD(λ) actor-critic
agent for a two-wheel autonomous robot.

The crate has three independently testable components tied together by a fixed-interval
controller loop:
- [`physics`] simulates differential-drive kinematics, contact detection, and a directional
  range-finder, standing in for the real Wheelly firmware during training.
- [`controller`] drives either the simulator or the real robot over [`protocol`], maintains the
  [`robot::RobotStatus`] snapshot and [`radar::RadarMap`], and projects both into the RL
  [`controller::environment`] interface.
- [`agent`] and [`network`] implement the TD(λ) policy/critic network that picks actions and
  trains on completed trajectories; [`state_machine`] is the scripted fallback policy.

[`kpi`] and [`agent::persistence`] handle training telemetry and model persistence; [`config`]
and [`errors`] are the shared configuration-loading and error-handling scaffolding every other
module builds on.
*/

pub mod agent;
pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod kpi;
pub mod logger;
pub mod network;
pub mod physics;
pub mod protocol;
pub mod radar;
pub mod recordable;
pub mod robot;
pub mod state_machine;
pub mod tensor;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
