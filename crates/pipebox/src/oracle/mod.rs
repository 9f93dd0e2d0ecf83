//! Scripted assertion oracle over a [`Sut`].
//!
//! The oracle sequences harness operations (input, read, assert) to realize
//! a test script and accumulates pass/fail counts. Assertion failures are
//! recoverable and only move counters; a dead SUT is fatal and aborts the
//! script through [`HarnessError::ProcessTerminated`].

pub mod walker;

use crate::error::{HarnessError, HarnessResult};
use crate::session::Sut;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pass/fail tallies, shared across threads.
///
/// Incremented synchronously by assertion calls; reset at the start of a
/// run; never decremented. Also fed by classifier group checks, which may
/// run on the adapter's pump thread.
#[derive(Debug, Default)]
pub struct Counters {
    passed: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, passed: bool) {
        if passed {
            self.passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn passed(&self) -> usize {
        self.passed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.passed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

/// Final result of a scripted run.
#[derive(Debug)]
pub enum ScriptOutcome {
    /// The script ran to completion. Individual assertions may still have
    /// failed; check the counts.
    Completed { passed: usize, failed: usize },
    /// The SUT died (or the harness faulted) before the script finished.
    Aborted {
        cause: HarnessError,
        passed: usize,
        failed: usize,
    },
}

impl ScriptOutcome {
    /// True when the run should be reported as failed overall.
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Completed { failed, .. } => *failed > 0,
            Self::Aborted { .. } => true,
        }
    }

    pub fn passed(&self) -> usize {
        match self {
            Self::Completed { passed, .. } | Self::Aborted { passed, .. } => *passed,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            Self::Completed { failed, .. } | Self::Aborted { failed, .. } => *failed,
        }
    }
}

impl fmt::Display for ScriptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { passed, failed } => {
                write!(f, "tests failed: {failed}; tests succeeded: {passed}")
            }
            Self::Aborted {
                cause,
                passed,
                failed,
            } => write!(
                f,
                "run aborted ({cause}); tests failed: {failed}; tests succeeded: {passed}"
            ),
        }
    }
}

/// Drives one SUT through a test script.
pub struct Oracle {
    sut: Sut,
    counters: Arc<Counters>,
}

impl Oracle {
    pub fn new(sut: Sut) -> Self {
        Self {
            sut,
            counters: Arc::new(Counters::new()),
        }
    }

    /// Share the counters, e.g. with a classifier set.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// Present the SUT with one line of input.
    pub fn input(&mut self, line: &str) -> HarnessResult<()> {
        self.sut.input(line)
    }

    /// Present the SUT with a single character as a line of input.
    pub fn input_char(&mut self, input: char) -> HarnessResult<()> {
        self.sut.input(&input.to_string())
    }

    /// Read all output lines within the configured inactivity timeout.
    pub fn read_lines(&mut self) -> HarnessResult<Vec<String>> {
        let lines = self.sut.output()?;
        echo_lines(&lines);
        Ok(lines)
    }

    /// Read all output lines within an explicit timeout.
    pub fn read_lines_within(&mut self, timeout: Duration) -> HarnessResult<Vec<String>> {
        let lines = self.sut.output_within(timeout)?;
        echo_lines(&lines);
        Ok(lines)
    }

    /// Check a named predicate: pass increments the pass counter, failure
    /// increments the fail counter and logs the description.
    pub fn check(&self, description: &str, holds: bool) -> bool {
        self.counters.record(holds);
        if !holds {
            tracing::warn!(target: "pipebox::oracle", "TEST:  {description} failed.");
        }
        holds
    }

    /// Unnamed variant of [`check`](Self::check).
    pub fn check_that(&self, holds: bool) -> bool {
        self.check("Test", holds)
    }

    pub fn sut(&mut self) -> &mut Sut {
        &mut self.sut
    }
}

fn echo_lines(lines: &[String]) {
    let mut iter = lines.iter();
    if let Some(first) = iter.next() {
        tracing::debug!(target: "pipebox::io", "OUT:   {first}");
        for line in iter {
            tracing::debug!(target: "pipebox::io", "       {line}");
        }
    }
}

/// Run a scripted interaction against the SUT and report the outcome.
///
/// The SUT is always stopped afterwards. A `ProcessTerminated` escaping the
/// script turns into `Aborted`, distinct from individual assertion failures
/// which merely show up in the counts.
pub fn run_script<F>(sut: Sut, script: F) -> ScriptOutcome
where
    F: FnOnce(&mut Oracle) -> HarnessResult<()>,
{
    let mut oracle = Oracle::new(sut);
    oracle.counters.reset();
    let result = script(&mut oracle);
    let passed = oracle.counters.passed();
    let failed = oracle.counters.failed();
    oracle.sut.stop();
    match result {
        Ok(()) => ScriptOutcome::Completed { passed, failed },
        Err(cause) => ScriptOutcome::Aborted {
            cause,
            passed,
            failed,
        },
    }
}
