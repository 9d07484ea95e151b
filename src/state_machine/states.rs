/*!
Built-in states for the fallback scripted agent: `Halt`, `MoveTo`, `Explore`, and `AutoScan`. Each
is a small `step(status, now_ms) -> (ExitToken, RobotCommand)` state, mirroring the tagged-variant
approach [`crate::network::layer::Layer`] takes for its own fixed set of kinds rather than a trait
object per state.
*/

use serde::{Deserialize, Serialize};
use wheelly_macros::EnumToString;

use crate::protocol::message::RobotCommand;
use crate::robot::status::RobotStatus;

/// The well-known exit tokens a state's `step` can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumToString)]
pub enum ExitToken {
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "blocked")]
    Blocked,
    #[serde(rename = "frontBlocked")]
    FrontBlocked,
    #[serde(rename = "rearBlocked")]
    RearBlocked,
    #[serde(rename = "none")]
    None,
}

/// The built-in state kinds, parsed from `agent.yml`'s state-machine config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StateSpec {
    #[serde(rename = "halt")]
    Halt,
    #[serde(rename = "moveTo")]
    MoveTo { x: f32, y: f32, #[serde(rename = "stopDistance")] stop_distance: f32 },
    #[serde(rename = "explore")]
    Explore,
    #[serde(rename = "autoScan")]
    AutoScan {
        #[serde(rename = "minDir")]
        min_dir: i32,
        #[serde(rename = "maxDir")]
        max_dir: i32,
        #[serde(rename = "sensorDirNumber")]
        sensor_dir_number: u32,
        #[serde(rename = "scanInterval")]
        scan_interval_ms: u64,
    },
}

/// The running instance of a [`StateSpec`]: the spec plus whatever per-visit counters it needs
/// (e.g. `AutoScan`'s triangular-wave index), reset on `on_entry`.
#[derive(Debug, Clone, EnumToString)]
pub enum StateRuntime {
    Halt,
    MoveTo { x: f32, y: f32, stop_distance: f32 },
    Explore,
    AutoScan { min_dir: i32, max_dir: i32, sensor_dir_number: u32, scan_interval_ms: u64, step_index: i64, ascending: bool, last_scan_ms: u64 },
}

impl StateRuntime {
    pub fn on_entry(spec: &StateSpec) -> Self {
        match spec {
            StateSpec::Halt => Self::Halt,
            StateSpec::MoveTo { x, y, stop_distance } => Self::MoveTo { x: *x, y: *y, stop_distance: *stop_distance },
            StateSpec::Explore => Self::Explore,
            StateSpec::AutoScan { min_dir, max_dir, sensor_dir_number, scan_interval_ms } => Self::AutoScan {
                min_dir: *min_dir,
                max_dir: *max_dir,
                sensor_dir_number: *sensor_dir_number,
                scan_interval_ms: *scan_interval_ms,
                step_index: 0,
                ascending: true,
                last_scan_ms: 0,
            },
        }
    }

    /// One state tick: decide the command to issue and whether this state is done.
    pub fn step(&mut self, status: &RobotStatus, now_ms: u64) -> (ExitToken, RobotCommand) {
        match self {
            Self::Halt => (ExitToken::None, RobotCommand::Halt),
            Self::MoveTo { x, y, stop_distance } => {
                let dx = *x - status.x;
                let dy = *y - status.y;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance <= *stop_distance {
                    return (ExitToken::Completed, RobotCommand::Halt);
                }
                if status.is_blocked() {
                    return (ExitToken::Blocked, RobotCommand::Halt);
                }
                if !status.front_clear {
                    return (ExitToken::FrontBlocked, RobotCommand::Halt);
                }
                if !status.rear_clear {
                    return (ExitToken::RearBlocked, RobotCommand::Halt);
                }
                let heading_deg = dy.atan2(dx).to_degrees().round() as i32;
                let direction = direction_code_for_heading(heading_deg);
                (ExitToken::None, RobotCommand::Move { deadline_ms: now_ms + 1_000, direction })
            }
            Self::Explore => {
                if status.is_blocked() {
                    return (ExitToken::Blocked, RobotCommand::Halt);
                }
                if !status.front_clear {
                    return (ExitToken::FrontBlocked, RobotCommand::Halt);
                }
                if !status.rear_clear {
                    return (ExitToken::RearBlocked, RobotCommand::Halt);
                }
                // straight ahead until something in the environment forces a transition.
                (ExitToken::None, RobotCommand::Move { deadline_ms: now_ms + 1_000, direction: 1 })
            }
            Self::AutoScan { min_dir, max_dir, sensor_dir_number, scan_interval_ms, step_index, ascending, last_scan_ms } => {
                if now_ms.saturating_sub(*last_scan_ms) < *scan_interval_ms {
                    return (ExitToken::None, RobotCommand::Scan { sensor_dir_deg: triangular_wave_deg(*min_dir, *max_dir, *sensor_dir_number, *step_index) });
                }
                *last_scan_ms = now_ms;
                let steps = (*sensor_dir_number).max(1) as i64;
                if *ascending {
                    *step_index += 1;
                    if *step_index >= steps - 1 {
                        *ascending = false;
                    }
                } else {
                    *step_index -= 1;
                    if *step_index <= 0 {
                        *ascending = true;
                    }
                }
                (ExitToken::None, RobotCommand::Scan { sensor_dir_deg: triangular_wave_deg(*min_dir, *max_dir, *sensor_dir_number, *step_index) })
            }
        }
    }
}

/// The `sensorDirNumber`-step position along `[minDir, maxDir]` for the current wave index.
fn triangular_wave_deg(min_dir: i32, max_dir: i32, sensor_dir_number: u32, step_index: i64) -> i32 {
    let steps = (sensor_dir_number.max(1) as i64 - 1).max(1);
    let span = (max_dir - min_dir) as i64;
    (min_dir as i64 + span * step_index.clamp(0, steps) / steps) as i32
}

/// Compass heading in `[0, 360)` degrees into the controller's 8-point `mt` direction code; see
/// [`crate::controller::backend::direction_to_heading_deg`] for the inverse.
fn direction_code_for_heading(heading_deg: i32) -> u8 {
    let normalized = ((heading_deg % 360) + 360) % 360;
    (1 + (normalized as f32 / 45.).round() as u8 % 8).min(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_at(x: f32, y: f32) -> RobotStatus {
        RobotStatus { x, y, ..RobotStatus::initial(0) }
    }

    #[test]
    fn move_to_completes_within_stop_distance() {
        let mut state = StateRuntime::on_entry(&StateSpec::MoveTo { x: 0., y: 0., stop_distance: 0.1 });
        let (token, _) = state.step(&status_at(0.05, 0.0), 0);
        assert_eq!(token, ExitToken::Completed);
    }

    #[test]
    fn move_to_reports_blocked_exit_tokens() {
        let mut state = StateRuntime::on_entry(&StateSpec::MoveTo { x: 1., y: 0., stop_distance: 0.1 });
        let mut status = status_at(0., 0.);
        status.front_clear = false;
        let (token, command) = state.step(&status, 0);
        assert_eq!(token, ExitToken::FrontBlocked);
        assert_eq!(command, RobotCommand::Halt);
    }

    #[test]
    fn auto_scan_sweeps_back_and_forth() {
        let mut state = StateRuntime::on_entry(&StateSpec::AutoScan { min_dir: -90, max_dir: 90, sensor_dir_number: 3, scan_interval_ms: 100 });
        let status = status_at(0., 0.);
        let (_, first) = state.step(&status, 0);
        let (_, second) = state.step(&status, 100);
        assert_ne!(first, second);
    }

    #[test]
    fn halt_never_moves() {
        let mut state = StateRuntime::on_entry(&StateSpec::Halt);
        let (token, command) = state.step(&status_at(0., 0.), 0);
        assert_eq!(token, ExitToken::None);
        assert_eq!(command, RobotCommand::Halt);
    }
}
