//! Contact detection against the static obstacle grid and the front/rear half-angle test.

use crate::constants::{CONTACT_HALF_ANGLE_DEG, OBSTACLE_SIZE, ROBOT_RADIUS};
use crate::radar::ObstacleMap;

/// The two contact sensors, independently tracked: front and rear clear flags are carried
/// separately rather than collapsed into one "blocked" boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactState {
    pub front_clear: bool,
    pub rear_clear: bool,
}

impl ContactState {
    pub fn clear() -> Self {
        Self { front_clear: true, rear_clear: true }
    }
}

/// Closest point on the axis-aligned square obstacle centred at `centre` to `point`.
fn closest_point_on_obstacle(point: (f32, f32), centre: (f32, f32)) -> (f32, f32) {
    let half = OBSTACLE_SIZE / 2.;
    (
        point.0.clamp(centre.0 - half, centre.0 + half),
        point.1.clamp(centre.1 - half, centre.1 + half),
    )
}

/// Evaluate contacts between the robot circle and every static obstacle, returning the new
/// [`ContactState`]. `heading_deg` is the robot's current heading.
pub fn detect(position: (f32, f32), heading_deg: f32, obstacles: &ObstacleMap) -> ContactState {
    let mut front_clear = true;
    let mut rear_clear = true;

    for centre in obstacles.obstacle_centres() {
        let closest = closest_point_on_obstacle(position, centre);
        let dx = closest.0 - position.0;
        let dy = closest.1 - position.1;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist > ROBOT_RADIUS {
            continue;
        }
        // Contact point relative bearing, projected into body frame.
        let bearing = dy.atan2(dx).to_degrees();
        let relative = angle_diff_deg(bearing, heading_deg);
        if relative.abs() <= CONTACT_HALF_ANGLE_DEG {
            front_clear = false;
        }
        if (180. - relative.abs()).abs() <= 180. - CONTACT_HALF_ANGLE_DEG {
            rear_clear = false;
        }
    }

    ContactState { front_clear, rear_clear }
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
    fn front_obstacle_blocks_front_only() {
        let mut obstacles = ObstacleMap::new(0.2);
        obstacles.insert_obstacle(0.3, 0.0);
        let state = detect((0.2, 0.0), 0., &obstacles);
        assert!(!state.front_clear);
        assert!(state.rear_clear);
    }

    #[test]
    fn no_nearby_obstacle_leaves_both_sensors_clear() {
        let obstacles = ObstacleMap::new(0.2);
        let state = detect((0., 0.), 0., &obstacles);
        assert!(state.front_clear);
        assert!(state.rear_clear);
    }

    #[test]
    fn obstacle_behind_robot_blocks_rear_only() {
        let mut obstacles = ObstacleMap::new(0.2);
        obstacles.insert_obstacle(-0.25, 0.0);
        let state = detect((0., 0.), 0., &obstacles);
        assert!(state.front_clear);
        assert!(!state.rear_clear);
    }
}
