/*!
Logging setup: `env_logger` is initialized from a [`LoggerConfig`], plus a set of fine-grained
`InternalLog` channels that gate `debug!` call sites too chatty to always enable (protocol
frames, radar updates, training steps).
*/

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

static INTERNAL_LOG_LEVEL: RwLock<Vec<InternalLog>> = RwLock::new(Vec::new());

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "level", content = "internal")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Internal(Vec<InternalLog>),
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug | LogLevel::Internal(_) => log::LevelFilter::Debug,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Debug channels gated by [`is_enabled`], independent from the `log` crate's level filter.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub enum InternalLog {
    All,
    ProtocolFrames,
    ClockSync,
    RadarUpdates,
    ControllerTick,
    TrainingSteps,
    AgentPersistence,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_level: LogLevel,
}

/// Initialize `env_logger` at `config.log_level` and arm any requested [`InternalLog`] channels.
/// Safe to call more than once; only the first call takes effect, matching `env_logger::try_init`.
pub fn init_log(config: &LoggerConfig) {
    let _ = env_logger::Builder::new()
        .filter_level(config.log_level.clone().into())
        .try_init();
    if let LogLevel::Internal(v) = &config.log_level {
        *INTERNAL_LOG_LEVEL.write().unwrap() = v.clone();
    }
}

pub fn is_enabled(channel: InternalLog) -> bool {
    if channel == InternalLog::All {
        return true;
    }
    let enabled = INTERNAL_LOG_LEVEL.read().unwrap();
    enabled.contains(&InternalLog::All) || enabled.contains(&channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_channel_enables_everything() {
        *INTERNAL_LOG_LEVEL.write().unwrap() = vec![InternalLog::All];
        assert!(is_enabled(InternalLog::RadarUpdates));
        assert!(is_enabled(InternalLog::TrainingSteps));
        *INTERNAL_LOG_LEVEL.write().unwrap() = Vec::new();
    }

    #[test]
    fn specific_channel_only_enables_itself() {
        *INTERNAL_LOG_LEVEL.write().unwrap() = vec![InternalLog::RadarUpdates];
        assert!(is_enabled(InternalLog::RadarUpdates));
        assert!(!is_enabled(InternalLog::TrainingSteps));
        *INTERNAL_LOG_LEVEL.write().unwrap() = Vec::new();
    }
}
