/*!
The two ways the controller can drive a robot: the 2-D simulator, or the real firmware over the
reconnecting TCP transport. Both funnel into the same [`BackendEvent`] stream so the controller
tick does not need to know which one it is driving.
*/

use crate::constants::{
    DEFAULT_MOTION_INTERVAL_MS, DEFAULT_PROXY_INTERVAL_MS, DISTANCE_PER_PULSE, MAX_PPS,
};
use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::physics::world::PhysicsWorld;
use crate::protocol::message::{ContactsMessage, MotionMessage, ProxyMessage, RobotCommand, RobotMessage};
use crate::protocol::transport::Transport;

#[derive(Debug, Clone)]
pub enum BackendEvent {
    Motion(MotionMessage),
    Proxy(ProxyMessage),
    Contacts(ContactsMessage),
}

/// Decoded direction code `[0,8]` into a desired heading in degrees, compass-style with `0` =
/// hold current heading.
fn direction_to_heading_deg(code: u8, current_heading_deg: f32) -> f32 {
    if code == 0 {
        current_heading_deg
    } else {
        ((code as i32 - 1) * 45) as f32
    }
}

pub struct SimBackend {
    pub world: PhysicsWorld,
    pub max_angular_speed: f32,
    pub sensor_dir_deg: i32,
    now_ms: u64,
    last_motion_emit_ms: u64,
    last_proxy_emit_ms: u64,
    current_command: RobotCommand,
    command_deadline_ms: u64,
    err_sensor_sigma: f32,
    echo_rng: crate::tensor::rng::DeterministicRng,
}

impl SimBackend {
    pub fn new(world: PhysicsWorld, max_angular_speed: f32, err_sensor_sigma: f32, seed: u64) -> Self {
        Self {
            world,
            max_angular_speed,
            sensor_dir_deg: 0,
            now_ms: 0,
            last_motion_emit_ms: 0,
            last_proxy_emit_ms: 0,
            current_command: RobotCommand::Halt,
            command_deadline_ms: 0,
            err_sensor_sigma,
            echo_rng: crate::tensor::rng::DeterministicRng::new(seed),
        }
    }

    pub fn set_command(&mut self, command: RobotCommand) {
        if let RobotCommand::Move { deadline_ms, .. } = &command {
            self.command_deadline_ms = *deadline_ms;
        }
        if let RobotCommand::Scan { sensor_dir_deg } = &command {
            self.sensor_dir_deg = *sensor_dir_deg;
        }
        self.current_command = command;
    }

    pub fn advance(&mut self, dt_ms: u32) -> WheellyResult<Vec<BackendEvent>> {
        let dt = dt_ms as f32 / 1000.;
        let (desired_heading, forward_pps) = match &self.current_command {
            RobotCommand::Halt => (self.world.body.heading_deg, 0.),
            RobotCommand::Move { direction, .. } if self.now_ms < self.command_deadline_ms => {
                (direction_to_heading_deg(*direction, self.world.body.heading_deg), MAX_PPS)
            }
            _ => (self.world.body.heading_deg, 0.),
        };
        let contact_transition = self.world.step(dt, desired_heading, forward_pps, self.max_angular_speed);
        self.now_ms += dt_ms as u64;

        let mut events = Vec::new();
        if let Some(c) = contact_transition {
            events.push(BackendEvent::Contacts(ContactsMessage {
                remote_time: self.now_ms,
                front_clear: c.front_clear,
                rear_clear: c.rear_clear,
            }));
        }
        if self.now_ms.saturating_sub(self.last_motion_emit_ms) >= DEFAULT_MOTION_INTERVAL_MS as u64 {
            self.last_motion_emit_ms = self.now_ms;
            events.push(BackendEvent::Motion(MotionMessage {
                remote_time: self.now_ms,
                x: self.world.body.x,
                y: self.world.body.y,
                heading_deg: self.world.body.normalized_heading_deg(),
                sensor_dir_deg: self.sensor_dir_deg,
                echo_distance: crate::physics::sensor::sense(
                    (self.world.body.x, self.world.body.y),
                    self.world.body.heading_deg + self.sensor_dir_deg as f32,
                    &self.world.obstacles,
                    &self.echo_rng,
                    self.now_ms,
                    self.err_sensor_sigma,
                ),
                left_speed: self.world.body.left_speed,
                right_speed: self.world.body.right_speed,
                motion_stopped: self.world.body.linear_velocity.abs() < 1e-4 && self.world.body.angular_velocity.abs() < 1e-4,
                front_clear: self.world.contacts.front_clear,
                rear_clear: self.world.contacts.rear_clear,
            }));
        }
        if self.now_ms.saturating_sub(self.last_proxy_emit_ms) >= DEFAULT_PROXY_INTERVAL_MS as u64 {
            self.last_proxy_emit_ms = self.now_ms;
            events.push(BackendEvent::Proxy(ProxyMessage {
                remote_time: self.now_ms,
                sensor_dir_deg: self.sensor_dir_deg,
                echo_delay: 0,
                x_pulses: self.world.body.x / DISTANCE_PER_PULSE,
                y_pulses: self.world.body.y / DISTANCE_PER_PULSE,
                echo_yaw_deg: self.world.body.normalized_heading_deg(),
            }));
        }
        Ok(events)
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

pub struct RealBackend {
    transport: Transport,
}

impl RealBackend {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn send(&self, command: RobotCommand) -> WheellyResult<()> {
        self.transport.send(command)
    }

    pub fn poll(&self) -> WheellyResult<Vec<BackendEvent>> {
        if matches!(self.transport.poll_state(), Some(crate::protocol::transport::ConnectionState::Closed)) {
            return Err(WheellyError::new(WheellyErrorKind::TransportIo, "transport closed"));
        }
        Ok(self
            .transport
            .try_recv_all()
            .into_iter()
            .filter_map(|timed| match timed.message {
                RobotMessage::Motion(m) => Some(BackendEvent::Motion(m)),
                RobotMessage::Proxy(p) => Some(BackendEvent::Proxy(p)),
                RobotMessage::Contacts(c) => Some(BackendEvent::Contacts(c)),
                RobotMessage::Supply(_) | RobotMessage::ClockReply(_) => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar::ObstacleMap;

    #[test]
    fn direction_codes_map_to_compass_headings() {
        assert_eq!(direction_to_heading_deg(0, 42.), 42.);
        assert_eq!(direction_to_heading_deg(1, 0.), 0.);
        assert_eq!(direction_to_heading_deg(3, 0.), 90.);
    }

    #[test]
    fn sim_backend_emits_motion_events_on_cadence() {
        let world = PhysicsWorld::new(ObstacleMap::new(0.2), 1, 0., 0.);
        let mut backend = SimBackend::new(world, 5., 0., 1);
        let mut saw_motion = false;
        for _ in 0..100 {
            let events = backend.advance(10).unwrap();
            if events.iter().any(|e| matches!(e, BackendEvent::Motion(_))) {
                saw_motion = true;
            }
        }
        assert!(saw_motion);
    }
}
