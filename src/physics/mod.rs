//! The 2-D rigid-body simulator: differential-drive kinematics, contact
//! detection, and a directional range-finder, all behind [`world::PhysicsWorld`].

pub mod body;
pub mod contact;
pub mod sensor;
pub mod world;

pub use contact::ContactState;
pub use world::PhysicsWorld;
