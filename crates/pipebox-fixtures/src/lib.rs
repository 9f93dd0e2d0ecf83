//! Scripted console programs used to exercise the pipebox harness.
//!
//! Each binary in `src/bin/` plays one SUT role: a menu-driven greeter, a
//! line echoer, a crasher, a slow producer, and a parameterized exit code.
//! The integration tests in `tests/` drive them through the real harness.

use pipebox::model::HarnessConfig;
use pipebox::session::SutConfig;
use std::time::Duration;

/// Build a `SutConfig` for a fixture binary with a short inactivity timeout
/// suitable for tests.
#[must_use]
pub fn fixture_config(binary: &str, args: &[&str]) -> SutConfig {
    SutConfig {
        command: binary.to_string(),
        args: args.iter().map(|arg| (*arg).to_string()).collect(),
        cwd: None,
        harness: HarnessConfig {
            inactivity_timeout: Duration::from_millis(200),
            ..HarnessConfig::default()
        },
    }
}
