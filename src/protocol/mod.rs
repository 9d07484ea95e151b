//! Wire protocol: line codec, clock synchronization, and the reconnecting TCP transport.

pub mod clock;
pub mod message;
pub mod transport;

pub use clock::{ClockConverter, ClockSample};
pub use message::{decode_line, DirectionCode, RobotCommand, RobotMessage};
pub use transport::{ConnectionState, TimedMessage, Transport};
