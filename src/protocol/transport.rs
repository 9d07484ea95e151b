/*!
TCP transport to the robot firmware: a reader thread and a writer thread around a
[`std::net::TcpStream`], joined to the rest of the controller through bounded `mpsc` channels.
One thread reads lines off the wire into a channel, a second drains an outgoing command channel
onto the socket. Reconnection is bounded-retry rather than infinite, since the controller needs
to give up and fall back rather than hang forever on a dead link.
*/

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::errors::{WheellyError, WheellyErrorKind, WheellyResult};
use crate::logger::{is_enabled, InternalLog};
use crate::protocol::message::{decode_line, RobotCommand, RobotMessage};

/// Connection lifecycle, surfaced to the controller so it can decide whether to keep issuing
/// commands or fall back to a halt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// One inbound line tagged with the local arrival time, so [`crate::protocol::clock::ClockConverter`]
/// has a receive timestamp to pair with each `ck` reply.
#[derive(Debug, Clone)]
pub struct TimedMessage {
    pub local_time_ms: u64,
    pub message: RobotMessage,
}

/// A reconnecting line transport. `incoming` yields decoded messages as they arrive; `send`
/// enqueues a command line for the writer thread. Dropping the handle closes both threads.
#[derive(Debug)]
pub struct Transport {
    outgoing_tx: Sender<RobotCommand>,
    incoming_rx: Receiver<TimedMessage>,
    state_rx: Receiver<ConnectionState>,
    _reader: JoinHandle<()>,
    _writer: JoinHandle<()>,
}

impl Transport {
    /// Connect to `addr`, retrying up to `max_attempts` times with `retry_delay` between
    /// attempts before giving up with [`WheellyErrorKind::TransportIo`].
    pub fn connect(
        addr: &str,
        max_attempts: u32,
        retry_delay: Duration,
        now_ms: impl Fn() -> u64 + Send + 'static,
    ) -> WheellyResult<Self> {
        let stream = connect_with_retry(addr, max_attempts, retry_delay)?;
        let reader_stream = stream.try_clone().map_err(io_err)?;
        let writer_stream = stream;

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<RobotCommand>();
        let (incoming_tx, incoming_rx) = mpsc::channel::<TimedMessage>();
        let (state_tx, state_rx) = mpsc::channel::<ConnectionState>();

        let _ = state_tx.send(ConnectionState::Connected);

        let reader_state_tx = state_tx.clone();
        let reader = thread::spawn(move || {
            reader_loop(reader_stream, incoming_tx, reader_state_tx, now_ms);
        });
        let writer = thread::spawn(move || {
            writer_loop(writer_stream, outgoing_rx, state_tx);
        });

        Ok(Self { outgoing_tx, incoming_rx, state_rx, _reader: reader, _writer: writer })
    }

    pub fn send(&self, command: RobotCommand) -> WheellyResult<()> {
        self.outgoing_tx
            .send(command)
            .map_err(|e| WheellyError::new(WheellyErrorKind::TransportIo, format!("writer thread gone: {e}")))
    }

    /// Drain any messages decoded since the last call; never blocks.
    pub fn try_recv_all(&self) -> Vec<TimedMessage> {
        self.incoming_rx.try_iter().collect()
    }

    /// Latest connection-state transition, if any occurred since the last call.
    pub fn poll_state(&self) -> Option<ConnectionState> {
        self.state_rx.try_iter().last()
    }
}

fn io_err(e: std::io::Error) -> WheellyError {
    WheellyError::new(WheellyErrorKind::TransportIo, e.to_string())
}

fn connect_with_retry(addr: &str, max_attempts: u32, retry_delay: Duration) -> WheellyResult<TcpStream> {
    let mut last_err = None;
    for attempt in 1..=max_attempts.max(1) {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                info!("connected to {addr} on attempt {attempt}");
                return Ok(stream);
            }
            Err(e) => {
                warn!("connect attempt {attempt}/{max_attempts} to {addr} failed: {e}");
                last_err = Some(e);
                thread::sleep(retry_delay);
            }
        }
    }
    Err(WheellyError::new(
        WheellyErrorKind::TransportIo,
        format!("could not connect to {addr} after {max_attempts} attempts: {}", last_err.map(|e| e.to_string()).unwrap_or_default()),
    ))
}

fn reader_loop(stream: TcpStream, incoming_tx: Sender<TimedMessage>, state_tx: Sender<ConnectionState>, now_ms: impl Fn() -> u64) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if is_enabled(InternalLog::ProtocolFrames) {
                    debug!("<- {line}");
                }
                match decode_line(&line) {
                    Ok(message) => {
                        let _ = incoming_tx.send(TimedMessage { local_time_ms: now_ms(), message });
                    }
                    Err(e) => warn!("dropping malformed line: {e}"),
                }
            }
            Err(e) => {
                warn!("transport read error, closing: {e}");
                break;
            }
        }
    }
    let _ = state_tx.send(ConnectionState::Closed);
}

fn writer_loop(mut stream: TcpStream, outgoing_rx: Receiver<RobotCommand>, state_tx: Sender<ConnectionState>) {
    for command in outgoing_rx.iter() {
        let line = command.encode();
        if is_enabled(InternalLog::ProtocolFrames) {
            debug!("-> {line}");
        }
        if let Err(e) = writeln!(stream, "{line}") {
            warn!("transport write error, closing: {e}");
            let _ = state_tx.send(ConnectionState::Closed);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn round_trips_a_command_and_a_status_line_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(socket.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line.trim_end(), "qs");
            let mut writer = socket;
            writeln!(writer, "ct 1 1 0").unwrap();
        });

        let clock = Arc::new(AtomicU64::new(0));
        let clock_clone = clock.clone();
        let transport = Transport::connect(&addr.to_string(), 3, Duration::from_millis(10), move || clock_clone.fetch_add(1, Ordering::SeqCst)).unwrap();

        transport.send(RobotCommand::QueryStatus).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut received = Vec::new();
        while received.is_empty() && std::time::Instant::now() < deadline {
            received.extend(transport.try_recv_all());
            thread::sleep(Duration::from_millis(10));
        }
        server.join().unwrap();

        assert_eq!(received.len(), 1);
        match &received[0].message {
            RobotMessage::Contacts(c) => {
                assert_eq!(c.remote_time, 1);
                assert!(c.front_clear);
                assert!(!c.rear_clear);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn connect_fails_after_exhausting_retries() {
        // Port 0 never accepts connections back, so every attempt fails fast.
        let err = Transport::connect("127.0.0.1:1", 2, Duration::from_millis(5), || 0).unwrap_err();
        assert_eq!(err.kind(), WheellyErrorKind::TransportIo);
    }
}
