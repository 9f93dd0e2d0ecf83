//! Core data model: output events, exit classification, harness configuration.

use std::fmt;
use std::time::Duration;

/// Default inactivity timeout applied when nothing else is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 100;
/// Default per-read chunk size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Event label pushed when a managed SUT process has been started.
pub const STARTED_LABEL: &str = "!Started";

/// How a system-under-test process left the `Running` state.
///
/// Terminal: once recorded, a `Sut` handle never transitions again. A new
/// process requires a new handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitKind {
    /// Clean exit with status zero.
    Stopped,
    /// Non-zero exit status, or a fault observed while monitoring.
    Crashed { detail: String },
    /// Forcibly killed by the harness.
    Terminated,
}

impl ExitKind {
    /// The lifecycle event label announced on the adapter's event queue.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopped => "!Stopped",
            Self::Crashed { .. } => "!Crashed",
            Self::Terminated => "!Terminated",
        }
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped (exit status 0)"),
            Self::Crashed { detail } => write!(f, "crashed ({detail})"),
            Self::Terminated => write!(f, "terminated by harness"),
        }
    }
}

/// A discrete, labeled unit of SUT-observable behavior.
///
/// Produced either by a classifier match against raw output or by a
/// process-lifecycle transition. Consumed strictly in FIFO order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputEvent {
    pub label: String,
}

impl OutputEvent {
    /// Event for a classifier match.
    pub fn classified(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Event announcing process start.
    pub fn started() -> Self {
        Self {
            label: STARTED_LABEL.to_string(),
        }
    }

    /// Event announcing how the process left the running state.
    pub fn lifecycle(kind: &ExitKind) -> Self {
        Self {
            label: kind.label().to_string(),
        }
    }
}

impl fmt::Display for OutputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Harness-wide knobs, read once at startup.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// Stop reading once no new byte has arrived for this long.
    pub inactivity_timeout: Duration,
    /// Per-read chunk size in bytes.
    pub buffer_size: usize,
    /// Mirror IN/OUT lines to the harness's own log at info level.
    pub echo: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            buffer_size: DEFAULT_BUFFER_SIZE,
            echo: false,
        }
    }
}

impl HarnessConfig {
    /// Build a config from `PIPEBOX_TIMEOUT_MS`, `PIPEBOX_BUFFER` and
    /// `PIPEBOX_ECHO`, falling back to defaults for anything absent or
    /// unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = read_env_parsed::<u64>("PIPEBOX_TIMEOUT_MS") {
            config.inactivity_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = read_env_parsed::<usize>("PIPEBOX_BUFFER") {
            config.buffer_size = bytes.max(1);
        }
        if let Some(echo) = read_env_parsed::<bool>("PIPEBOX_ECHO") {
            config.echo = echo;
        }
        config
    }
}

fn read_env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_kind_labels() {
        assert_eq!(ExitKind::Stopped.label(), "!Stopped");
        assert_eq!(
            ExitKind::Crashed {
                detail: "exit status 2".to_string()
            }
            .label(),
            "!Crashed"
        );
        assert_eq!(ExitKind::Terminated.label(), "!Terminated");
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = HarnessConfig::default();
        assert_eq!(config.inactivity_timeout, Duration::from_millis(100));
        assert_eq!(config.buffer_size, 8192);
        assert!(!config.echo);
    }
}
