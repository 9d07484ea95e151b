/*!
[`RadarMap`]: the agent's belief grid, built from [`SensorSignal`]s projected by the controller
and decayed by [`RadarMap::clean`].
*/

use std::collections::HashMap;

use crate::constants::MAX_SIGNAL_DISTANCE;
use crate::radar::map_sector::MapSector;
use crate::radar::obstacle_map::CellIndex;

/// A projected echo or no-echo reading, ready to update the radar map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSignal {
    pub sensor_location: (f32, f32),
    pub sensor_dir_deg: f32,
    pub distance: f32,
    pub is_echo: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct RadarMap {
    grid_size: f32,
    receptive_distance: f32,
    min_distance: f32,
    echo_persistence_ms: u64,
    sectors: HashMap<CellIndex, MapSector>,
}

impl RadarMap {
    pub fn new(grid_size: f32, receptive_distance: f32, min_distance: f32, echo_persistence_ms: u64) -> Self {
        Self {
            grid_size,
            receptive_distance,
            min_distance,
            echo_persistence_ms,
            sectors: HashMap::new(),
        }
    }

    fn cell_index(&self, x: f32, y: f32) -> CellIndex {
        ((x / self.grid_size).round() as i32, (y / self.grid_size).round() as i32)
    }

    fn cell_centre(&self, idx: CellIndex) -> (f32, f32) {
        (idx.0 as f32 * self.grid_size, idx.1 as f32 * self.grid_size)
    }

    /// Current belief for a sector; unknown if never touched (`timestamp == 0` means unknown).
    pub fn sector_at(&self, x: f32, y: f32) -> MapSector {
        let idx = self.cell_index(x, y);
        self.sectors
            .get(&idx)
            .copied()
            .unwrap_or_else(|| MapSector::unknown(self.cell_centre(idx)))
    }

    /// Project one signal into every sector within range whose bearing lies in the signal's
    /// angular cone; a sector within that cone is marked "known" with the signal's timestamp,
    /// and "filled" only if it also lies within `receptiveDistance` of the echo's actual hit
    /// point.
    pub fn update(&mut self, signal: &SensorSignal) {
        let hit_point = if signal.is_echo && signal.distance > 0. {
            let rad = signal.sensor_dir_deg.to_radians();
            Some((
                signal.sensor_location.0 + signal.distance * rad.cos(),
                signal.sensor_location.1 + signal.distance * rad.sin(),
            ))
        } else {
            None
        };

        if signal.distance < self.min_distance || signal.distance > MAX_SIGNAL_DISTANCE {
            return;
        }

        let radius_cells = (MAX_SIGNAL_DISTANCE / self.grid_size).ceil() as i32;
        let centre_idx = self.cell_index(signal.sensor_location.0, signal.sensor_location.1);

        for dx in -radius_cells..=radius_cells {
            for dy in -radius_cells..=radius_cells {
                let idx = (centre_idx.0 + dx, centre_idx.1 + dy);
                let centre = self.cell_centre(idx);
                let sector_distance = distance(signal.sensor_location, centre);

                let in_cone = if sector_distance <= self.receptive_distance {
                    // Inside the receptive sphere is always in-direction.
                    true
                } else {
                    let bearing = bearing_deg(signal.sensor_location, centre);
                    let tolerance = (self.receptive_distance / sector_distance).asin().to_degrees();
                    angle_diff_deg(signal.sensor_dir_deg, bearing).abs() <= tolerance
                };
                if !in_cone {
                    continue;
                }

                let filled = hit_point
                    .map(|hp| distance(hp, centre) <= self.receptive_distance)
                    .unwrap_or(false);
                self.sectors.insert(idx, MapSector { location: centre, timestamp: signal.timestamp, filled });
            }
        }
    }

    /// Zero out (revert to unknown) every sector whose timestamp predates `now_ms - echoPersistence`.
    pub fn clean(&mut self, now_ms: u64) {
        let threshold = now_ms.saturating_sub(self.echo_persistence_ms);
        for sector in self.sectors.values_mut() {
            if sector.timestamp != 0 && sector.timestamp < threshold {
                sector.timestamp = 0;
                sector.filled = false;
            }
        }
    }

    pub fn known_sector_count(&self) -> usize {
        self.sectors.values().filter(|s| !s.is_unknown()).count()
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn bearing_deg(from: (f32, f32), to: (f32, f32)) -> f32 {
    (to.1 - from.1).atan2(to.0 - from.0).to_degrees()
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
    fn echo_fills_the_hit_sector_only() {
        let mut map = RadarMap::new(0.2, 0.1, 0., 10_000);
        let signal = SensorSignal {
            sensor_location: (0., 0.),
            sensor_dir_deg: 0.,
            distance: 1.0,
            is_echo: true,
            timestamp: 42,
        };
        map.update(&signal);

        let hit = map.sector_at(1.0, 0.0);
        assert_eq!(hit.timestamp, 42);
        assert!(hit.filled);

        let off_cone = map.sector_at(1.0, 0.3);
        assert!(off_cone.is_unknown());
    }

    #[test]
    fn clean_zeroes_stale_timestamps_only() {
        let mut map = RadarMap::new(0.2, 0.1, 0., 1_000);
        map.update(&SensorSignal {
            sensor_location: (0., 0.),
            sensor_dir_deg: 0.,
            distance: 1.0,
            is_echo: true,
            timestamp: 500,
        });
        map.clean(1_000);
        assert!(!map.sector_at(1.0, 0.0).is_unknown());
        map.clean(2_000);
        assert!(map.sector_at(1.0, 0.0).is_unknown());
    }

    #[test]
    fn timestamp_never_decreases_except_by_clean() {
        let mut map = RadarMap::new(0.2, 0.1, 0., 10_000);
        let mut signal = SensorSignal {
            sensor_location: (0., 0.),
            sensor_dir_deg: 0.,
            distance: 1.0,
            is_echo: true,
            timestamp: 100,
        };
        map.update(&signal);
        let first = map.sector_at(1.0, 0.0).timestamp;
        signal.timestamp = 200;
        map.update(&signal);
        let second = map.sector_at(1.0, 0.0).timestamp;
        assert!(second >= first);
    }
}
