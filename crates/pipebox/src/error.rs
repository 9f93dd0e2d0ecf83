//! Error taxonomy for the harness.
//!
//! `ProcessTerminated` is the only error that is expected to interrupt an
//! otherwise-completing run: it propagates out of any in-flight interaction
//! with the system under test. Assertion failures never surface here; they
//! only move counters (see [`crate::oracle`]). Protocol-level problems are
//! answered on the wire by the adapter and never become `Err` values.

use crate::model::ExitKind;
use miette::Diagnostic;
use thiserror::Error;

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The system under test exited, crashed, or was killed. Carries the
    /// exit classification captured by the process monitor when available.
    #[error("system under test terminated: {kind}")]
    ProcessTerminated { kind: ExitKind },

    /// Spawning or piping the system under test failed. Unrecoverable.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation on an otherwise healthy pipe failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A classifier pattern did not compile.
    #[error("invalid pattern for classifier '{label}': {source}")]
    Pattern {
        label: String,
        #[source]
        source: Box<regex::Error>,
    },

    /// An adapter spec file could not be read or parsed.
    #[error("failed to load adapter spec '{path}': {message}")]
    Spec { path: String, message: String },
}

impl HarnessError {
    pub fn terminated(kind: ExitKind) -> Self {
        Self::ProcessTerminated { kind }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn spec(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Spec {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True when the error means the SUT is gone and scripted interaction
    /// cannot meaningfully continue.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::ProcessTerminated { .. })
    }
}

impl Diagnostic for HarnessError {}
