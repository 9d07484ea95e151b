/*!
Directional range-finder sensor: cast a ray from `position` at `ray_dir_deg`, find the nearest
obstacle centre within the receptive angle, and report a noisy distance reading.
*/

use crate::constants::{MAX_DISTANCE, SENSOR_RECEPTIVE_ANGLE_DEG};
use crate::radar::ObstacleMap;
use crate::tensor::rng::DeterministicRng;

/// `0.0` conventionally means "no echo" on the wire, matching [`crate::protocol::message::ProxyMessage`].
pub fn sense(
    position: (f32, f32),
    ray_dir_deg: f32,
    obstacles: &ObstacleMap,
    rng: &DeterministicRng,
    step_index: u64,
    err_sensor_sigma: f32,
) -> f32 {
    let ray = ray_dir_deg.to_radians();
    let ray_dir = (ray.cos(), ray.sin());

    let mut nearest: Option<f32> = None;
    for centre in obstacles.obstacle_centres() {
        let to_obstacle = (centre.0 - position.0, centre.1 - position.1);
        let dist = (to_obstacle.0.powi(2) + to_obstacle.1.powi(2)).sqrt();
        if dist < 1e-6 || dist > MAX_DISTANCE {
            continue;
        }
        let bearing = to_obstacle.1.atan2(to_obstacle.0).to_degrees();
        let angle_diff = angle_diff_deg(bearing, ray_dir_deg);
        if angle_diff.abs() > SENSOR_RECEPTIVE_ANGLE_DEG {
            continue;
        }
        // Project onto the ray to approximate "distance along the ray" for a centred obstacle.
        let along_ray = to_obstacle.0 * ray_dir.0 + to_obstacle.1 * ray_dir.1;
        if along_ray <= 0. {
            continue;
        }
        if nearest.map_or(true, |n| dist < n) {
            nearest = Some(dist);
        }
    }

    match nearest {
        None => 0.,
        Some(dist) => {
            let noise = rng.normal(step_index, 0., err_sensor_sigma);
            let reported = dist - crate::constants::GRID_SIZE / 2. + noise;
            reported.clamp(0., MAX_DISTANCE)
        }
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
    fn detects_obstacle_directly_ahead() {
        let mut obstacles = ObstacleMap::new(0.2);
        obstacles.insert_obstacle(1.0, 0.0);
        let rng = DeterministicRng::new(1);
        let distance = sense((0., 0.), 0., &obstacles, &rng, 0, 0.);
        assert!((distance - (1.0 - 0.1)).abs() < 1e-3);
    }

    #[test]
    fn no_obstacle_in_cone_reports_no_echo() {
        let mut obstacles = ObstacleMap::new(0.2);
        obstacles.insert_obstacle(0.0, 1.0);
        let rng = DeterministicRng::new(1);
        let distance = sense((0., 0.), 0., &obstacles, &rng, 0, 0.);
        assert_eq!(distance, 0.);
    }

    #[test]
    fn distance_is_clamped_to_max_distance() {
        let mut obstacles = ObstacleMap::new(0.2);
        obstacles.insert_obstacle(100.0, 0.0);
        let rng = DeterministicRng::new(1);
        let distance = sense((0., 0.), 0., &obstacles, &rng, 0, 0.);
        assert_eq!(distance, 0.);
    }
}
