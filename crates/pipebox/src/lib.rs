//! pipebox: a black-box harness for interactive console programs.
//!
//! The harness spawns a system under test (SUT) with redirected stdio,
//! feeds it lines of input, and captures its output under a bounded
//! inactivity timeout. On top of that sit two consumers: a scripted
//! [`oracle`] that sequences input/read/assert steps, and a line-protocol
//! [`adapter`] that exposes the SUT to an external model-based test
//! generator as a stream of classified, labeled events.

#![forbid(unsafe_code)]
// Library documentation is in progress. Public API types have docs;
// internal types will be documented in future releases.
#![allow(missing_docs)]

pub mod adapter;
pub mod classify;
pub mod error;
pub mod model;
pub mod oracle;
pub mod session;

pub use crate::error::{HarnessError, HarnessResult};
pub use crate::model::{ExitKind, HarnessConfig, OutputEvent};
