//! Subprocess lifecycle management for the system under test.
//!
//! [`Sut`] owns one spawned console process: its piped stdin/stdout, a
//! background monitor thread that classifies how the process exits, and the
//! timed reader used to capture output. States run `NotStarted -> Running ->
//! {Stopped, Crashed, Terminated}`; terminal states are final and a fresh
//! process needs a fresh handle.
//!
//! Liveness is the authoritative crash signal. Pipe-level end-of-stream and
//! process exit are observed asynchronously and can race, so every I/O
//! operation checks the monitor's liveness flag first and fails with
//! [`HarnessError::ProcessTerminated`] instead of hanging or surfacing an
//! ambiguous broken-pipe error.

pub mod reader;

use crate::error::{HarnessError, HarnessResult};
use crate::model::{ExitKind, HarnessConfig};
use crate::session::reader::{split_lines, ReadBatch, TimedReader};
#[cfg(unix)]
use nix::fcntl::{fcntl, FcntlArg, OFlag};
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use std::io::Write;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How long `stop` waits after SIGTERM before escalating to SIGKILL.
const STOP_GRACE: Duration = Duration::from_millis(300);
/// How long `stop` waits for the monitor to observe the SIGKILL.
const KILL_WAIT: Duration = Duration::from_millis(200);
/// How long an EOF waits for the monitor to classify the exit.
const EXIT_CLASSIFY_WAIT: Duration = Duration::from_millis(250);
/// Monitor poll interval while the process is running.
const MONITOR_POLL: Duration = Duration::from_millis(10);

/// Configuration for spawning a system under test.
#[derive(Clone, Debug)]
pub struct SutConfig {
    /// Command to execute.
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Optional working directory.
    pub cwd: Option<String>,
    /// Timeout/buffer/echo knobs.
    pub harness: HarnessConfig,
}

impl SutConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            cwd: None,
            harness: HarnessConfig::default(),
        }
    }
}

/// Shared between the monitor thread (single writer) and everyone else.
///
/// `exit` is written exactly once, before `alive` is released to false, so a
/// reader that observes `alive == false` always finds the exit kind present.
#[derive(Debug)]
struct MonitorState {
    alive: AtomicBool,
    kill_requested: AtomicBool,
    exit: Mutex<Option<ExitKind>>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            kill_requested: AtomicBool::new(false),
            exit: Mutex::new(None),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn exit_kind(&self) -> Option<ExitKind> {
        self.exit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn record_exit(&self, kind: ExitKind) {
        let mut slot = self
            .exit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(kind);
        }
        drop(slot);
        self.alive.store(false, Ordering::Release);
    }

    fn wait_dead(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_alive() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(MONITOR_POLL);
        }
        true
    }

    /// Wait briefly for the exit classification. Falls back to `Terminated`
    /// when the pipe is gone but no exit was observed in time.
    fn wait_exit(&self, grace: Duration) -> ExitKind {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(kind) = self.exit_kind() {
                return kind;
            }
            if Instant::now() >= deadline {
                return ExitKind::Terminated;
            }
            std::thread::sleep(MONITOR_POLL);
        }
    }
}

/// SIGTERM the process, escalating to SIGKILL after a grace period. No-op
/// once the monitor has seen it exit.
fn force_down(monitor: &MonitorState, pid: u32) {
    if !monitor.is_alive() {
        return;
    }
    monitor.kill_requested.store(true, Ordering::Release);
    signal_process(pid, TermSignal::Term);
    if !monitor.wait_dead(STOP_GRACE) {
        signal_process(pid, TermSignal::Kill);
        monitor.wait_dead(KILL_WAIT);
    }
}

/// The output half of a [`Sut`], detachable so a background task can pump
/// output while the foreground keeps writing input.
#[derive(Debug)]
pub struct SutReader {
    reader: TimedReader<ChildStdout>,
    monitor: Arc<MonitorState>,
    pid: u32,
}

impl SutReader {
    /// Capture available output, bounded by `inactivity_timeout`.
    pub fn read_available(&mut self, inactivity_timeout: Duration) -> std::io::Result<ReadBatch> {
        let monitor = &self.monitor;
        self.reader
            .read_available(inactivity_timeout, || monitor.is_alive())
    }

    pub fn is_alive(&self) -> bool {
        self.monitor.is_alive()
    }

    /// Exit classification, once the monitor has recorded it.
    pub fn exit_kind(&self) -> Option<ExitKind> {
        self.monitor.exit_kind()
    }

    /// Wait briefly for the monitor to classify the exit. Falls back to
    /// `Terminated` when the pipe is gone but no exit was observed in time.
    pub fn wait_exit_kind(&self, grace: Duration) -> ExitKind {
        self.monitor.wait_exit(grace)
    }

    /// Resolve the terminal classification after end of output.
    ///
    /// A process that is still running with its output stream closed is
    /// forced down first, so the reported exit reflects a real one rather
    /// than a guess about a live process.
    pub fn resolve_exit(&self, grace: Duration) -> ExitKind {
        force_down(&self.monitor, self.pid);
        self.monitor.wait_exit(grace)
    }
}

/// Handle to a running system under test.
#[derive(Debug)]
pub struct Sut {
    command: String,
    pid: u32,
    stdin: Option<ChildStdin>,
    reader: Option<SutReader>,
    monitor: Arc<MonitorState>,
    monitor_thread: Option<JoinHandle<()>>,
    config: HarnessConfig,
}

impl Sut {
    /// Spawn the process with piped stdio and start the exit monitor.
    ///
    /// The child's stdout is switched to non-blocking mode so the timed
    /// reader can poll it without parking.
    pub fn spawn(config: SutConfig) -> HarnessResult<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| HarnessError::Spawn {
            command: config.command.clone(),
            source,
        })?;
        let pid = child.id();

        let stdin = child.stdin.take().ok_or_else(|| {
            HarnessError::io(
                "child stdin missing",
                std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            )
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            HarnessError::io(
                "child stdout missing",
                std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            )
        })?;
        set_nonblocking(&stdout)?;

        let monitor = Arc::new(MonitorState::new());
        let monitor_state = Arc::clone(&monitor);
        let monitor_thread = std::thread::spawn(move || monitor_loop(child, &monitor_state));

        tracing::debug!(command = %config.command, pid, "spawned system under test");

        Ok(Self {
            command: config.command,
            pid,
            stdin: Some(stdin),
            reader: Some(SutReader {
                reader: TimedReader::new(stdout, config.harness.buffer_size),
                monitor: Arc::clone(&monitor),
                pid,
            }),
            monitor,
            monitor_thread: Some(monitor_thread),
            config: config.harness,
        })
    }

    /// Fail with `ProcessTerminated` once the process has exited.
    pub fn check_liveness(&self) -> HarnessResult<()> {
        if self.monitor.is_alive() {
            return Ok(());
        }
        Err(HarnessError::terminated(self.exit_kind().unwrap_or(
            ExitKind::Crashed {
                detail: "exit status not yet classified".to_string(),
            },
        )))
    }

    pub fn is_alive(&self) -> bool {
        self.monitor.is_alive()
    }

    /// Exit classification, present once the process has left `Running`.
    pub fn exit_kind(&self) -> Option<ExitKind> {
        self.monitor.exit_kind()
    }

    /// Write one line to the process's stdin and flush immediately.
    ///
    /// A write can hit the pipe after the process has exited but before the
    /// monitor's next poll notices; that broken pipe is reported as
    /// `ProcessTerminated`, not as a raw I/O error.
    pub fn input(&mut self, line: &str) -> HarnessResult<()> {
        self.check_liveness()?;
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            HarnessError::io(
                "child stdin closed",
                std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            )
        })?;
        if let Err(source) = writeln!(stdin, "{line}").and_then(|()| stdin.flush()) {
            if source.kind() == std::io::ErrorKind::BrokenPipe {
                let kind = self.monitor.wait_exit(EXIT_CLASSIFY_WAIT);
                return Err(HarnessError::terminated(kind));
            }
            return Err(HarnessError::io("write to SUT", source));
        }
        if self.config.echo {
            tracing::info!(target: "pipebox::io", "IN:    {line}");
        } else {
            tracing::debug!(target: "pipebox::io", "IN:    {line}");
        }
        Ok(())
    }

    /// Read all lines the process produces within the configured timeout.
    pub fn output(&mut self) -> HarnessResult<Vec<String>> {
        self.output_within(self.config.inactivity_timeout)
    }

    /// Read all lines the process produces within `timeout`.
    ///
    /// An empty batch from a live process means "no output yet", not
    /// failure. Nothing captured on a closed pipe or a dead process reports
    /// `ProcessTerminated` instead; captured output is always returned
    /// first, so death surfaces on the following call.
    pub fn output_within(&mut self, timeout: Duration) -> HarnessResult<Vec<String>> {
        self.check_liveness()?;
        let reader = self.reader.as_mut().ok_or_else(|| {
            HarnessError::io(
                "output reader detached",
                std::io::Error::from(std::io::ErrorKind::NotConnected),
            )
        })?;
        let batch = reader
            .read_available(timeout)
            .map_err(|source| HarnessError::io("read from SUT", source))?;
        if batch.data.is_empty() && (batch.eof || !reader.is_alive()) {
            let kind = reader.wait_exit_kind(EXIT_CLASSIFY_WAIT);
            return Err(HarnessError::terminated(kind));
        }
        Ok(split_lines(&batch.data))
    }

    /// Detach the output half for a background consumer. At most once.
    pub fn take_reader(&mut self) -> HarnessResult<SutReader> {
        self.reader.take().ok_or_else(|| {
            HarnessError::io(
                "output reader already detached",
                std::io::Error::from(std::io::ErrorKind::NotConnected),
            )
        })
    }

    /// Force-terminate the process if still running. Idempotent.
    ///
    /// Sends SIGTERM, waits a short grace period, escalates to SIGKILL, and
    /// joins the monitor thread so the exit kind is recorded before return.
    pub fn stop(&mut self) {
        if self.monitor.is_alive() {
            force_down(&self.monitor, self.pid);
            tracing::debug!(command = %self.command, pid = self.pid, "stopped system under test");
        }
        // Closing stdin releases the pipe so a blocked SUT read sees EOF.
        self.stdin = None;
        if let Some(handle) = self.monitor_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Sut {
    /// Best-effort cleanup; errors cannot propagate out of drop.
    fn drop(&mut self) {
        self.stop();
    }
}

fn monitor_loop(mut child: Child, state: &MonitorState) {
    let kind = loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if state.kill_requested.load(Ordering::Acquire) {
                    break ExitKind::Terminated;
                }
                if status.success() {
                    break ExitKind::Stopped;
                }
                break ExitKind::Crashed {
                    detail: status.to_string(),
                };
            }
            Ok(None) => std::thread::sleep(MONITOR_POLL),
            Err(err) => {
                break ExitKind::Crashed {
                    detail: format!("wait failed: {err}"),
                }
            }
        }
    };
    tracing::debug!(%kind, "system under test exited");
    state.record_exit(kind);
}

enum TermSignal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_process(pid: u32, which: TermSignal) {
    let signal = match which {
        TermSignal::Term => Signal::SIGTERM,
        TermSignal::Kill => Signal::SIGKILL,
    };
    // Process IDs are always positive and fit in i32
    #[allow(clippy::cast_possible_wrap)]
    let pid = Pid::from_raw(pid as i32);
    match kill(pid, signal) {
        // ESRCH means process already gone, which is fine
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(err) => tracing::debug!(%err, "failed to signal process"),
    }
}

#[cfg(not(unix))]
fn signal_process(_pid: u32, _which: TermSignal) {}

#[cfg(unix)]
fn set_nonblocking(stdout: &ChildStdout) -> HarnessResult<()> {
    use std::os::fd::AsRawFd;

    let fd = stdout.as_raw_fd();
    let flags = OFlag::from_bits_truncate(
        fcntl(fd, FcntlArg::F_GETFL)
            .map_err(|err| HarnessError::io("get fd flags", std::io::Error::from(err)))?,
    );
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
        .map_err(|err| HarnessError::io("set nonblocking", std::io::Error::from(err)))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_nonblocking(_stdout: &ChildStdout) -> HarnessResult<()> {
    Ok(())
}
