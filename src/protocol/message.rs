/*!
Line codec for the robot's wire protocol: outgoing commands (`ha`, `mt`, `sc`, `qs`, `ck`) and
robot-originated status lines (`st`, `px`, `ct`, `sv`, `ck`).

Every wire line is ASCII, space-separated, `\n`-terminated (the terminator is stripped by the
transport before it reaches this module). A line whose tag is known but whose field count does
not match raises [`WheellyErrorKind::ProtocolFormat`] rather than panicking, so the caller can
drop just the offending line and keep the session running.
*/

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};

fn format_error(line: &str, what: impl std::fmt::Display) -> WheellyError {
    WheellyError::new(WheellyErrorKind::ProtocolFormat, format!("{what} (line: {line:?})"))
}

fn field<'a>(fields: &[&'a str], idx: usize, line: &str) -> WheellyResult<&'a str> {
    fields.get(idx).copied().ok_or_else(|| format_error(line, format!("missing field {idx}")))
}

fn parse_f32(fields: &[&str], idx: usize, line: &str) -> WheellyResult<f32> {
    field(fields, idx, line)?.parse::<f32>().map_err(|e| format_error(line, e))
}

fn parse_i32(fields: &[&str], idx: usize, line: &str) -> WheellyResult<i32> {
    field(fields, idx, line)?.parse::<i32>().map_err(|e| format_error(line, e))
}

fn parse_u64(fields: &[&str], idx: usize, line: &str) -> WheellyResult<u64> {
    field(fields, idx, line)?.parse::<u64>().map_err(|e| format_error(line, e))
}

fn parse_bool01(fields: &[&str], idx: usize, line: &str) -> WheellyResult<bool> {
    match field(fields, idx, line)? {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(format_error(line, format!("expected 0/1, got {other:?}"))),
    }
}

fn check_arity(fields: &[&str], expected: usize, line: &str) -> WheellyResult<()> {
    if fields.len() != expected {
        return Err(format_error(line, format!("expected {expected} fields, got {}", fields.len())));
    }
    Ok(())
}

/// Composite motion+proxy status line (`st`): the fields of [`crate::robot::RobotStatus`] that
/// the firmware reports on every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionMessage {
    pub remote_time: u64,
    pub x: f32,
    pub y: f32,
    pub heading_deg: i32,
    pub sensor_dir_deg: i32,
    pub echo_distance: f32,
    pub left_speed: f32,
    pub right_speed: f32,
    pub motion_stopped: bool,
    pub front_clear: bool,
    pub rear_clear: bool,
}

/// Sensor echo line (`px`): `px <remoteTime> <sensorDir> <echoDelay> <xPulses> <yPulses>
/// <echoYaw>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyMessage {
    pub remote_time: u64,
    pub sensor_dir_deg: i32,
    pub echo_delay: u32,
    pub x_pulses: f32,
    pub y_pulses: f32,
    pub echo_yaw_deg: i32,
}

/// Contact transition line (`ct`).
#[derive(Debug, Clone, PartialEq)]
pub struct ContactsMessage {
    pub remote_time: u64,
    pub front_clear: bool,
    pub rear_clear: bool,
}

/// Supply-voltage line (`sv`); carried through for diagnostics only, never consumed by the RL
/// loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyMessage {
    pub remote_time: u64,
    pub voltage: f32,
}

/// Clock-sync reply (`ck`): echoes the `local_ms` sent in the request plus the robot's own
/// remote clock reading, so [`crate::protocol::clock::ClockConverter`] can fit a round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockReplyMessage {
    pub echoed_local_time: u64,
    pub remote_time: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RobotMessage {
    Motion(MotionMessage),
    Proxy(ProxyMessage),
    Contacts(ContactsMessage),
    Supply(SupplyMessage),
    ClockReply(ClockReplyMessage),
}

/// Decode one robot-originated status line. Unknown tags and arity mismatches both raise
/// [`WheellyErrorKind::ProtocolFormat`]; the caller (the controller tick) drops the line and
/// continues.
pub fn decode_line(line: &str) -> WheellyResult<RobotMessage> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let tag = *fields.first().ok_or_else(|| format_error(line, "empty line"))?;
    let rest = &fields[1..];
    match tag {
        "st" => {
            check_arity(rest, 10, line)?;
            Ok(RobotMessage::Motion(MotionMessage {
                remote_time: parse_u64(rest, 0, line)?,
                x: parse_f32(rest, 1, line)?,
                y: parse_f32(rest, 2, line)?,
                heading_deg: parse_i32(rest, 3, line)?,
                sensor_dir_deg: parse_i32(rest, 4, line)?,
                echo_distance: parse_f32(rest, 5, line)?,
                left_speed: parse_f32(rest, 6, line)?,
                right_speed: parse_f32(rest, 7, line)?,
                motion_stopped: parse_bool01(rest, 8, line)?,
                front_clear: parse_bool01(rest, 9, line)?,
                rear_clear: true,
            }))
        }
        "px" => {
            check_arity(rest, 6, line)?;
            Ok(RobotMessage::Proxy(ProxyMessage {
                remote_time: parse_u64(rest, 0, line)?,
                sensor_dir_deg: parse_i32(rest, 1, line)?,
                echo_delay: parse_u64(rest, 2, line)? as u32,
                x_pulses: parse_f32(rest, 3, line)?,
                y_pulses: parse_f32(rest, 4, line)?,
                echo_yaw_deg: parse_i32(rest, 5, line)?,
            }))
        }
        "ct" => {
            check_arity(rest, 3, line)?;
            Ok(RobotMessage::Contacts(ContactsMessage {
                remote_time: parse_u64(rest, 0, line)?,
                front_clear: parse_bool01(rest, 1, line)?,
                rear_clear: parse_bool01(rest, 2, line)?,
            }))
        }
        "sv" => {
            check_arity(rest, 2, line)?;
            Ok(RobotMessage::Supply(SupplyMessage {
                remote_time: parse_u64(rest, 0, line)?,
                voltage: parse_f32(rest, 1, line)?,
            }))
        }
        "ck" => {
            check_arity(rest, 2, line)?;
            Ok(RobotMessage::ClockReply(ClockReplyMessage {
                echoed_local_time: parse_u64(rest, 0, line)?,
                remote_time: parse_u64(rest, 1, line)?,
            }))
        }
        other => Err(format_error(line, format!("unknown tag {other:?}"))),
    }
}

/// Direction code accepted by `mt`, in `[0, 8]`.
pub type DirectionCode = u8;

#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    Halt,
    Move { deadline_ms: u64, direction: DirectionCode },
    Scan { sensor_dir_deg: i32 },
    QueryStatus,
    ClockSync { local_ms: u64 },
}

impl RobotCommand {
    /// Encode as the exact wire line, without the trailing `\n` (the transport appends it).
    pub fn encode(&self) -> String {
        match self {
            RobotCommand::Halt => "ha".to_string(),
            RobotCommand::Move { deadline_ms, direction } => format!("mt {deadline_ms} {direction}"),
            RobotCommand::Scan { sensor_dir_deg } => format!("sc {sensor_dir_deg}"),
            RobotCommand::QueryStatus => "qs".to_string(),
            RobotCommand::ClockSync { local_ms } => format!("ck {local_ms}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_proxy_line() {
        let msg = decode_line("px 100 30 1500 0.5 0.25 45").unwrap();
        assert_eq!(
            msg,
            RobotMessage::Proxy(ProxyMessage {
                remote_time: 100,
                sensor_dir_deg: 30,
                echo_delay: 1500,
                x_pulses: 0.5,
                y_pulses: 0.25,
                echo_yaw_deg: 45,
            })
        );
    }

    #[test]
    fn rejects_proxy_with_wrong_arity() {
        let err = decode_line("px 100 30 1500 0.5 0.25").unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::ProtocolFormat);
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = decode_line("zz 1 2 3").unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::ProtocolFormat);
    }

    #[test]
    fn decodes_contacts() {
        let msg = decode_line("ct 42 1 0").unwrap();
        assert_eq!(msg, RobotMessage::Contacts(ContactsMessage { remote_time: 42, front_clear: true, rear_clear: false }));
    }

    #[test]
    fn decodes_clock_reply() {
        let msg = decode_line("ck 10 1234").unwrap();
        assert_eq!(msg, RobotMessage::ClockReply(ClockReplyMessage { echoed_local_time: 10, remote_time: 1234 }));
    }

    #[test]
    fn commands_encode_to_wire_lines() {
        assert_eq!(RobotCommand::Halt.encode(), "ha");
        assert_eq!(RobotCommand::Move { deadline_ms: 500, direction: 3 }.encode(), "mt 500 3");
        assert_eq!(RobotCommand::Scan { sensor_dir_deg: -45 }.encode(), "sc -45");
        assert_eq!(RobotCommand::QueryStatus.encode(), "qs");
        assert_eq!(RobotCommand::ClockSync { local_ms: 99 }.encode(), "ck 99");
    }

    #[test]
    fn round_trips_every_message_kind() {
        for line in ["st 1 0.0 0.0 0 0 0.0 0.0 0.0 0 1", "px 100 30 1500 0.5 0.25 45", "ct 42 1 0", "sv 1 7.4", "ck 10 1234"] {
            assert!(decode_line(line).is_ok(), "failed to decode {line:?}");
        }
    }
}
