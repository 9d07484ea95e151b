/*!
[`ObstacleMap`]: the simulator's ground-truth world, a grid of [`crate::constants::GRID_SIZE`]
cells over which static square obstacles are placed. This is consulted by the physics
simulator for collision and range-finding; it is distinct from [`super::radar_map::RadarMap`],
the agent's belief grid built from noisy echoes of this same geometry.
*/

use std::collections::HashSet;

/// Integer `(col, row)` cell index.
pub type CellIndex = (i32, i32);

#[derive(Debug, Clone)]
pub struct ObstacleMap {
    grid_size: f32,
    cells: HashSet<CellIndex>,
}

impl ObstacleMap {
    pub fn new(grid_size: f32) -> Self {
        Self { grid_size, cells: HashSet::new() }
    }

    pub fn grid_size(&self) -> f32 {
        self.grid_size
    }

    /// Nearest grid multiple to `(x, y)`, so a point placed exactly on a grid coordinate lands
    /// on that cell's own centre rather than a half-cell away from it.
    pub fn cell_index(&self, x: f32, y: f32) -> CellIndex {
        ((x / self.grid_size).round() as i32, (y / self.grid_size).round() as i32)
    }

    pub fn cell_centre(&self, idx: CellIndex) -> (f32, f32) {
        (idx.0 as f32 * self.grid_size, idx.1 as f32 * self.grid_size)
    }

    pub fn insert_obstacle(&mut self, x: f32, y: f32) {
        self.cells.insert(self.cell_index(x, y));
    }

    pub fn is_obstacle(&self, x: f32, y: f32) -> bool {
        self.cells.contains(&self.cell_index(x, y))
    }

    /// World-space centres of every static obstacle, for the range-finder's nearest-hit search.
    pub fn obstacle_centres(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.cells.iter().map(move |idx| self.cell_centre(*idx))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_centre_round_trips_through_index() {
        let map = ObstacleMap::new(0.2);
        let idx = map.cell_index(0.4, -0.2);
        let centre = map.cell_centre(idx);
        assert!((centre.0 - 0.4).abs() < 1e-6);
        assert!((centre.1 - (-0.2)).abs() < 1e-6);
    }

    #[test]
    fn insert_and_query_obstacle() {
        let mut map = ObstacleMap::new(0.2);
        map.insert_obstacle(1.0, 0.0);
        assert!(map.is_obstacle(1.05, 0.05));
        assert!(!map.is_obstacle(2.0, 2.0));
    }
}
