/*!
The fixed-interval controller tick: poll the backend, decode status, feed the radar
map, refresh the pending motion command, and halt on contact. [`environment`] builds the RL
observation/reward interface on top of this.
*/

pub mod backend;
pub mod environment;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Validate;
use crate::constants::{
    DEFAULT_COMMAND_INTERVAL_MS, DEFAULT_REACTION_INTERVAL_MS, DEFAULT_TICK_INTERVAL_MS,
};
use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::logger::{is_enabled, InternalLog};
use crate::protocol::message::{ContactsMessage, MotionMessage, ProxyMessage, RobotCommand};
use crate::radar::{RadarMap, SensorSignal};
use crate::robot::RobotStatus;
use backend::{BackendEvent, RealBackend, SimBackend};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub tick_interval_ms: u32,
    pub command_interval_ms: u32,
    pub reaction_interval_ms: u32,
    pub grid_size: f32,
    pub receptive_distance: f32,
    pub min_signal_distance: f32,
    pub echo_persistence_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            command_interval_ms: DEFAULT_COMMAND_INTERVAL_MS,
            reaction_interval_ms: DEFAULT_REACTION_INTERVAL_MS,
            grid_size: crate::constants::GRID_SIZE,
            receptive_distance: crate::constants::DEFAULT_RECEPTIVE_DISTANCE,
            min_signal_distance: 0.,
            echo_persistence_ms: 30_000,
        }
    }
}

impl Validate for ControllerConfig {
    fn validate(&self) -> WheellyResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(WheellyError::new(WheellyErrorKind::ConfigInvalid, "tick_interval_ms must be > 0"));
        }
        if self.reaction_interval_ms < self.tick_interval_ms {
            return Err(WheellyError::new(
                WheellyErrorKind::ConfigInvalid,
                "reaction_interval_ms must be >= tick_interval_ms",
            ));
        }
        Ok(())
    }
}

enum Backend {
    Simulated(SimBackend),
    Real(RealBackend),
}

pub struct Controller {
    config: ControllerConfig,
    backend: Backend,
    status: RobotStatus,
    radar: RadarMap,
    pending_command: Option<RobotCommand>,
    last_command_sent_ms: u64,
}

impl Controller {
    pub fn with_simulator(config: ControllerConfig, sim: SimBackend) -> Self {
        let radar = RadarMap::new(config.grid_size, config.receptive_distance, config.min_signal_distance, config.echo_persistence_ms);
        Self {
            config,
            backend: Backend::Simulated(sim),
            status: RobotStatus::initial(0),
            radar,
            pending_command: None,
            last_command_sent_ms: 0,
        }
    }

    pub fn with_real_robot(config: ControllerConfig, real: RealBackend) -> Self {
        let radar = RadarMap::new(config.grid_size, config.receptive_distance, config.min_signal_distance, config.echo_persistence_ms);
        Self {
            config,
            backend: Backend::Real(real),
            status: RobotStatus::initial(0),
            radar,
            pending_command: None,
            last_command_sent_ms: 0,
        }
    }

    pub fn status(&self) -> &RobotStatus {
        &self.status
    }

    pub fn radar(&self) -> &RadarMap {
        &self.radar
    }

    pub fn set_pending_command(&mut self, command: RobotCommand) {
        self.pending_command = Some(command);
    }

    /// One controller tick.
    pub fn tick(&mut self) -> WheellyResult<()> {
        let events = match &mut self.backend {
            Backend::Simulated(sim) => {
                if let Some(command) = self.pending_command.clone() {
                    sim.set_command(command);
                }
                sim.advance(self.config.tick_interval_ms)?
            }
            Backend::Real(real) => real.poll()?,
        };

        for event in events {
            self.apply_event(event);
        }

        self.radar.clean(self.status.simulation_time_ms);

        if self.status.is_blocked() {
            self.halt_now()?;
        } else if let Some(command) = &self.pending_command {
            let due = self.status.simulation_time_ms.saturating_sub(self.last_command_sent_ms)
                >= self.config.command_interval_ms as u64;
            if due {
                self.send(command.clone())?;
            }
        }
        Ok(())
    }

    fn apply_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Motion(m) => self.apply_motion(m),
            BackendEvent::Proxy(p) => self.apply_proxy(p),
            BackendEvent::Contacts(c) => self.apply_contacts(c),
        }
    }

    fn apply_motion(&mut self, msg: MotionMessage) {
        if is_enabled(InternalLog::ControllerTick) {
            log::debug!("motion: {msg:?}");
        }
        let clock = crate::protocol::clock::ClockConverter::default();
        self.status = RobotStatus::from_motion(&self.status, &msg, &clock);
        if msg.echo_distance > 0. {
            self.project_echo(msg.x, msg.y, self.status.heading_deg as f32 + msg.sensor_dir_deg as f32, msg.echo_distance, msg.remote_time);
        }
    }

    fn apply_proxy(&mut self, msg: ProxyMessage) {
        if is_enabled(InternalLog::RadarUpdates) {
            log::debug!("proxy: {msg:?}");
        }
        let x = msg.x_pulses * crate::constants::DISTANCE_PER_PULSE;
        let y = msg.y_pulses * crate::constants::DISTANCE_PER_PULSE;
        if msg.echo_delay > 0 {
            let distance = msg.echo_delay as f32 * crate::constants::DISTANCE_PER_PULSE;
            self.project_echo(x, y, (msg.echo_yaw_deg + msg.sensor_dir_deg) as f32, distance, msg.remote_time);
        }
    }

    fn project_echo(&mut self, sensor_x: f32, sensor_y: f32, sensor_dir_deg: f32, distance: f32, timestamp: u64) {
        self.radar.update(&SensorSignal {
            sensor_location: (sensor_x, sensor_y),
            sensor_dir_deg,
            distance,
            is_echo: true,
            timestamp,
        });
    }

    fn apply_contacts(&mut self, msg: ContactsMessage) {
        if is_enabled(InternalLog::ControllerTick) {
            info!("contacts: front={} rear={}", msg.front_clear, msg.rear_clear);
        }
        self.status = self.status.with_contacts(msg.front_clear, msg.rear_clear, msg.remote_time);
    }

    fn send(&mut self, command: RobotCommand) -> WheellyResult<()> {
        match &self.backend {
            Backend::Simulated(_) => {} // the simulator reads `pending_command` directly each tick.
            Backend::Real(real) => real.send(command)?,
        }
        self.last_command_sent_ms = self.status.simulation_time_ms;
        Ok(())
    }

    fn halt_now(&mut self) -> WheellyResult<()> {
        warn!("contact blocked, halting");
        self.pending_command = None;
        self.send(RobotCommand::Halt)
    }

    /// `readStatus(reactionInterval)`: tick repeatedly until simulated time has advanced by at
    /// least `reactionInterval`, returning the status reached.
    pub fn react(&mut self) -> WheellyResult<RobotStatus> {
        let t0 = self.status.simulation_time_ms;
        loop {
            self.tick()?;
            if self.status.simulation_time_ms >= t0 + self.config.reaction_interval_ms as u64 {
                return Ok(self.status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicsWorld;
    use crate::radar::ObstacleMap;

    fn make_controller() -> Controller {
        let world = PhysicsWorld::new(ObstacleMap::new(0.2), 1, 0., 0.);
        let sim = SimBackend::new(world, 5., 0., 1);
        Controller::with_simulator(ControllerConfig::default(), sim)
    }

    #[test]
    fn react_advances_simulation_time_by_at_least_reaction_interval() {
        let mut controller = make_controller();
        let t0 = controller.status.simulation_time_ms;
        let status = controller.react().unwrap();
        assert!(status.simulation_time_ms >= t0 + controller.config.reaction_interval_ms as u64);
    }

    #[test]
    fn contact_halts_and_clears_pending_command() {
        let mut obstacles = ObstacleMap::new(0.2);
        obstacles.insert_obstacle(0.2, 0.0);
        let world = PhysicsWorld::new(obstacles, 1, 0., 0.);
        let sim = SimBackend::new(world, 5., 0., 1);
        let mut controller = Controller::with_simulator(ControllerConfig::default(), sim);
        controller.set_pending_command(RobotCommand::Move { deadline_ms: 10_000, direction: 3 });
        for _ in 0..50 {
            controller.tick().unwrap();
        }
        assert!(controller.pending_command.is_none() || controller.status.is_blocked() || !controller.status.front_clear);
    }
}
