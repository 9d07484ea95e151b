/*!
Physical and protocol constants shared across the controller, simulator, and agent. Kept as
named constants rather than inlined literals so invariant tests can cite them directly.
*/

/// Side length of an obstacle-map grid cell, in metres.
pub const GRID_SIZE: f32 = 0.2;

/// Robot body radius, in metres.
pub const ROBOT_RADIUS: f32 = 0.15;

/// Robot mass, in kilograms.
pub const ROBOT_MASS: f32 = 0.785;

/// Side length of a static square obstacle, in metres.
pub const OBSTACLE_SIZE: f32 = 0.2;

/// Distance between the two wheels, in metres.
pub const TRACK: f32 = 0.136;

/// Wheel-encoder pulses per metre of linear travel.
pub const DISTANCE_PER_PULSE: f32 = 1. / 40.;

/// Maximum wheel speed, in pulses per second.
pub const MAX_PPS: f32 = 60.;

/// Maximum angular velocity the controller will command, in rad/s.
pub const MAX_ANGULAR_VELOCITY: f32 = 5.;

/// Maximum body-frame force the physics impulse solver will apply, in newtons.
pub const MAX_FORCE: f32 = 2.;

/// Maximum body-frame torque the physics impulse solver will apply, in newton-metres.
pub const MAX_TORQUE: f32 = 0.5;

/// Maximum range of the directional range-finder, in metres.
pub const MAX_DISTANCE: f32 = 3.;

/// Maximum signal distance accepted by the radar map.
pub const MAX_SIGNAL_DISTANCE: f32 = 3.;

/// Half-angle of the range-finder's acceptance cone, in degrees.
pub const SENSOR_RECEPTIVE_ANGLE_DEG: f32 = 15.;

/// Default obstacle-map receptive distance, in metres.
pub const DEFAULT_RECEPTIVE_DISTANCE: f32 = 0.2;

/// Velocity/position solver iteration counts.
pub const VELOCITY_ITERATIONS: u32 = 10;
pub const POSITION_ITERATIONS: u32 = 10;

/// Default controller tick interval, in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u32 = 10;

/// Default motion/scan command refresh period, in milliseconds.
pub const DEFAULT_COMMAND_INTERVAL_MS: u32 = 600;

/// Default RL reaction interval, in milliseconds.
pub const DEFAULT_REACTION_INTERVAL_MS: u32 = 300;

/// Default motion/proxy message emission cadence, in milliseconds.
pub const DEFAULT_MOTION_INTERVAL_MS: u32 = 500;
pub const DEFAULT_PROXY_INTERVAL_MS: u32 = 500;

/// Contact half-angle from forward/rear considered "front"/"rear" blocked.
pub const CONTACT_HALF_ANGLE_DEG: f32 = 89.5;

/// Time rounding resolution used by the discrete-event parts of the controller, in seconds.
pub const TIME_ROUND: f32 = 1e-4;

/// Default session wall-clock duration, in seconds.
pub const DEFAULT_SESSION_SECONDS: u64 = 43_200;

/// Index offset from a trajectory step to its bootstrap successor (`values[i + NEXT_STATE_OFFSET]`).
pub const NEXT_STATE_OFFSET: usize = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_distance_round_trips_a_metre() {
        let pulses = 1.0 / DISTANCE_PER_PULSE;
        assert!((pulses * DISTANCE_PER_PULSE - 1.0).abs() < 1e-6);
    }
}
