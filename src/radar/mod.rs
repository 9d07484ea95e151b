//! Obstacle geometry and the radar belief grid built from it.

pub mod map_sector;
pub mod obstacle_map;
pub mod radar_map;

pub use map_sector::MapSector;
pub use obstacle_map::ObstacleMap;
pub use radar_map::{RadarMap, SensorSignal};
