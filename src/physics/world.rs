/*!
[`PhysicsWorld`]: the fixed-step impulse solver. A `dt`-asserted integration step applies a
command, perturbs it with reseeded Gaussian process noise, and advances a single owned body
state through an explicit force/torque impulse solve.
*/

use crate::constants::{MAX_FORCE, MAX_TORQUE, ROBOT_MASS, ROBOT_RADIUS};
use crate::physics::body::{wheel_setpoints, BodyState};
use crate::physics::contact::{self, ContactState};
use crate::radar::ObstacleMap;
use crate::robot::status::normalize_heading_deg;
use crate::tensor::rng::DeterministicRng;

/// Moment of inertia of a uniform disk: `I = 1/2 m r^2`.
fn moment_of_inertia() -> f32 {
    0.5 * ROBOT_MASS * ROBOT_RADIUS * ROBOT_RADIUS
}

pub struct PhysicsWorld {
    pub body: BodyState,
    pub obstacles: ObstacleMap,
    pub contacts: ContactState,
    rng: DeterministicRng,
    step_index: u64,
    err_sensor_sigma: f32,
    err_sigma_sigma: f32,
}

impl PhysicsWorld {
    pub fn new(obstacles: ObstacleMap, seed: u64, err_sensor_sigma: f32, err_sigma_sigma: f32) -> Self {
        Self {
            body: BodyState::at_origin(),
            obstacles,
            contacts: ContactState::clear(),
            rng: DeterministicRng::new(seed),
            step_index: 0,
            err_sensor_sigma,
            err_sigma_sigma,
        }
    }

    /// Advance the world by `dt` seconds toward `desired_heading_deg` at `target_forward_pps`.
    /// Returns the contact state transition, if front or rear clearance flipped this step.
    pub fn step(&mut self, dt: f32, desired_heading_deg: f32, target_forward_pps: f32, max_angular_speed: f32) -> Option<ContactState> {
        assert!(dt >= 0., "physics step requires dt >= 0, got {dt}");
        self.step_index += 1;

        if self.contacts.front_clear && self.contacts.rear_clear {
            self.integrate_free(dt, desired_heading_deg, target_forward_pps, max_angular_speed);
        } else {
            // A blocked sensor halts motion immediately.
            self.body.linear_velocity = 0.;
            self.body.angular_velocity = 0.;
            self.body.left_speed = 0.;
            self.body.right_speed = 0.;
        }

        let new_contacts = contact::detect((self.body.x, self.body.y), self.body.heading_deg, &self.obstacles);
        let transitioned = new_contacts != self.contacts;
        self.contacts = new_contacts;
        if !new_contacts.front_clear || !new_contacts.rear_clear {
            self.body.linear_velocity = 0.;
            self.body.angular_velocity = 0.;
            self.body.left_speed = 0.;
            self.body.right_speed = 0.;
        }
        transitioned.then_some(new_contacts)
    }

    fn integrate_free(&mut self, dt: f32, desired_heading_deg: f32, target_forward_pps: f32, max_angular_speed: f32) {
        use crate::constants::DISTANCE_PER_PULSE;

        // Heading error.
        let heading_error = angle_diff_deg(self.body.heading_deg, desired_heading_deg);
        // Setpoints and wheel decomposition.
        let (left_sp, right_sp, angular_setpoint) = wheel_setpoints(heading_error, target_forward_pps, max_angular_speed);

        // Forward velocity target vs actual, force clipped and perturbed.
        let target_linear = (left_sp + right_sp) / 2. * DISTANCE_PER_PULSE;
        let force_noise = 1. + self.rng.normal(self.step_index, 0., self.err_sensor_sigma);
        let force = ((ROBOT_MASS * (target_linear - self.body.linear_velocity) / dt.max(1e-6))
            .clamp(-MAX_FORCE, MAX_FORCE))
            * force_noise;

        // Torque target vs actual, clipped and perturbed.
        let target_angular = angular_setpoint.to_radians();
        let torque_noise = 1. + self.rng.normal(self.step_index + 1_000_000, 0., self.err_sigma_sigma);
        let torque = ((moment_of_inertia() * (target_angular - self.body.angular_velocity) / dt.max(1e-6))
            .clamp(-MAX_TORQUE, MAX_TORQUE))
            * torque_noise;

        // Advance.
        self.body.linear_velocity += force / ROBOT_MASS * dt;
        self.body.angular_velocity += torque / moment_of_inertia() * dt;
        let heading_rad = self.body.heading_deg.to_radians();
        self.body.x += self.body.linear_velocity * heading_rad.cos() * dt;
        self.body.y += self.body.linear_velocity * heading_rad.sin() * dt;
        self.body.heading_deg = normalize_heading_deg(
            (self.body.heading_deg + self.body.angular_velocity.to_degrees() * dt).round() as i32,
        ) as f32;
        self.body.left_speed = left_sp;
        self.body.right_speed = right_sp;
    }
}

fn angle_diff_deg(a: f32, b: f32) -> f32 {
    let mut diff = (a - b) % 360.;
    if diff > 180. {
        diff -= 360.;
    } else if diff < -180. {
        diff += 360.;
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halt_and_turn_moves_heading_toward_target() {
        let mut world = PhysicsWorld::new(ObstacleMap::new(0.2), 1, 0., 0.);
        world.step(0.5, 90., 0., 5.);
        assert!(world.body.heading_deg > 0.);
        assert_eq!(world.body.left_speed, -world.body.right_speed);
    }

    #[test]
    fn contact_halts_the_robot_on_the_next_step() {
        let mut obstacles = ObstacleMap::new(0.2);
        obstacles.insert_obstacle(0.3, 0.0);
        let mut world = PhysicsWorld::new(obstacles, 1, 0., 0.);
        world.body.x = 0.2;
        for _ in 0..20 {
            world.step(0.05, 0., 30., 5.);
        }
        assert!(!world.contacts.front_clear);
        assert_eq!(world.body.left_speed, 0.);
        assert_eq!(world.body.right_speed, 0.);
    }

    #[test]
    #[should_panic]
    fn negative_dt_panics() {
        let mut world = PhysicsWorld::new(ObstacleMap::new(0.2), 1, 0., 0.);
        world.step(-0.1, 0., 0., 5.);
    }
}
