/*!
Error type shared by every module. Recovery policy for each kind depends on the caller's
context; this module only carries the tag and a human-readable message, it does not decide
whether a kind is fatal — callers decide that at the point they observe the error.
*/

use std::{
    error::Error,
    fmt::{Debug, Display},
};

use wheelly_macros::EnumToString;

/// One entry per failure category this crate can raise, plus two catch-alls for bugs that no
/// other variant covers (`ImplementationError`, `MathError`).
#[derive(Debug, Clone, PartialEq, EnumToString)]
pub enum WheellyErrorKind {
    /// Schema/constraint validation failed while loading a YAML config.
    ConfigInvalid,
    /// A status line from the robot did not match any known tag/arity.
    ProtocolFormat,
    /// Socket read/write/connect failed.
    TransportIo,
    /// A `ck` round trip timed out before a fresh `ClockConverter` could be fitted.
    ClockUnsynced,
    /// Both front and rear contacts are blocked.
    ContactBlocked,
    /// A layer's declared input/output shape does not match its wiring.
    NetworkShapeMismatch,
    /// `agent.bin`'s header or a field's byte length is inconsistent.
    ModelLoadCorrupt,
    /// NaN/Inf appeared in a gradient or trace during training.
    TrainNumericFailure,
    /// I/O failed while writing `agent.bin` or its backup.
    AgentSaveFailure,
    /// Invariant broken by a bug in this crate, not by input data.
    ImplementationError,
    /// A numeric precondition (e.g. division by a distance of zero) was violated.
    MathError,
}

#[derive(Clone)]
pub struct WheellyError {
    kind: WheellyErrorKind,
    what: String,
}

impl WheellyError {
    pub fn new(kind: WheellyErrorKind, what: impl Into<String>) -> Self {
        Self { kind, what: what.into() }
    }

    pub fn kind(&self) -> WheellyErrorKind {
        self.kind.clone()
    }

    /// True for the kinds that abort the process rather than just skipping a tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            WheellyErrorKind::ConfigInvalid
                | WheellyErrorKind::NetworkShapeMismatch
                | WheellyErrorKind::ModelLoadCorrupt
        )
    }

    pub fn chain(self, what: impl Into<String>) -> Self {
        Self { kind: self.kind, what: format!("{}\n↪ {}", self.what, what.into()) }
    }
}

impl Display for WheellyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wheelly error: {}", self.kind)
    }
}

impl Debug for WheellyError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "wheelly error of kind {}: {}", self.kind, self.what)
    }
}

impl Error for WheellyError {}

pub type WheellyResult<T> = Result<T, WheellyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_kind_only() {
        let e = WheellyError::new(WheellyErrorKind::ProtocolFormat, "bad line");
        assert_eq!(format!("{}", e), "wheelly error: ProtocolFormat");
        assert!(format!("{:?}", e).contains("bad line"));
    }

    #[test]
    fn fatal_kinds_abort_others_do_not() {
        assert!(WheellyError::new(WheellyErrorKind::ConfigInvalid, "").is_fatal());
        assert!(WheellyError::new(WheellyErrorKind::NetworkShapeMismatch, "").is_fatal());
        assert!(WheellyError::new(WheellyErrorKind::ModelLoadCorrupt, "").is_fatal());
        assert!(!WheellyError::new(WheellyErrorKind::ProtocolFormat, "").is_fatal());
        assert!(!WheellyError::new(WheellyErrorKind::TransportIo, "").is_fatal());
    }

    #[test]
    fn chain_appends_context() {
        let e = WheellyError::new(WheellyErrorKind::MathError, "div by zero").chain("in radar");
        assert!(format!("{:?}", e).contains("in radar"));
    }
}
