//! Line-oriented adapter protocol between a model-based test generator and
//! a managed SUT.
//!
//! The adapter reads one command per line from its own stdin (`C_IOKIND`,
//! `C_INPUT`, `C_OUTPUT`, `C_QUIT`) and answers one reply per line on
//! stdout. A background pump thread reads the SUT's output, feeds it through
//! the classifier set, and publishes labeled events into a blocking FIFO
//! queue that `C_OUTPUT` polls with a bounded wait.
//!
//! Protocol state machine: *Idle* (no managed SUT; only `?Start` is
//! meaningful) -> *Running* -> *Stopped* (after `C_QUIT` or a fatal internal
//! error). Parse failures and unknown events are answered on the wire and
//! never change state. Diagnostic text goes to the log, never to protocol
//! stdout.

pub mod queue;
pub mod spec;

use crate::classify::ClassifierSet;
use crate::error::{HarnessError, HarnessResult};
use crate::model::{HarnessConfig, OutputEvent};
use crate::oracle::Counters;
use crate::session::{Sut, SutConfig, SutReader};
use queue::EventQueue;
use spec::{AdapterSpec, InputVocabulary};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Input label that starts the managed SUT.
const START_EVENT: &str = "?Start";
/// Reply for input/output commands issued against the wrong state.
const INPUT_ERROR: &str = "A_INPUT_ERROR";
/// Reply that terminates the adapter loop.
const QUIT_REPLY: &str = "A_QUIT";
/// How long the pump waits for the exit classification after EOF.
const EXIT_EVENT_WAIT: Duration = Duration::from_millis(500);

/// Runtime configuration for one adapter process.
#[derive(Clone, Debug)]
pub struct AdapterConfig {
    /// SUT command, vocabulary, classifiers and output timeout.
    pub spec: AdapterSpec,
    /// Timed-reader and echo settings for the managed SUT.
    pub harness: HarnessConfig,
}

/// Serve the adapter protocol on this process's stdin/stdout.
pub fn run_adapter(config: AdapterConfig) -> HarnessResult<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_adapter_with_io(config, stdin.lock(), stdout.lock())
}

/// Serve the adapter protocol over explicit streams.
///
/// Returns when `C_QUIT` is answered, the command stream ends, or an
/// internal error aborts the loop (reported on the wire as
/// `A_ERROR InternalError ...` before propagating).
pub fn run_adapter_with_io<R, W>(config: AdapterConfig, input: R, mut output: W) -> HarnessResult<()>
where
    R: BufRead,
    W: Write,
{
    let mut adapter = Adapter::new(config)?;
    for line in input.lines() {
        let line = line.map_err(|err| HarnessError::io("read adapter command", err))?;
        match adapter.dispatch(&line) {
            Ok(reply) => {
                write_reply(&mut output, &reply)?;
                if reply == QUIT_REPLY {
                    adapter.shutdown();
                    return Ok(());
                }
            }
            Err(err) => {
                write_reply(&mut output, &format!("A_ERROR InternalError {err}"))?;
                adapter.shutdown();
                return Err(err);
            }
        }
    }
    adapter.shutdown();
    Ok(())
}

fn write_reply<W: Write>(output: &mut W, reply: &str) -> HarnessResult<()> {
    // The trailing space is load-bearing: the consuming tool requires it.
    writeln!(output, "{reply} ").map_err(|err| HarnessError::io("write adapter reply", err))?;
    output
        .flush()
        .map_err(|err| HarnessError::io("flush adapter reply", err))
}

struct ManagedSut {
    sut: Sut,
    pump: Option<JoinHandle<()>>,
}

struct Adapter {
    command: String,
    args: Vec<String>,
    cwd: Option<String>,
    vocabulary: InputVocabulary,
    classifiers: Arc<ClassifierSet>,
    counters: Arc<Counters>,
    timeout: Duration,
    harness: HarnessConfig,
    /// One queue for the adapter's lifetime: events from a crashed SUT stay
    /// deliverable across a restart.
    queue: Arc<EventQueue>,
    managed: Option<ManagedSut>,
}

impl Adapter {
    fn new(config: AdapterConfig) -> HarnessResult<Self> {
        let classifiers = Arc::new(config.spec.compile_classifiers()?);
        let vocabulary = config.spec.vocabulary();
        Ok(Self {
            command: config.spec.command,
            args: config.spec.args,
            cwd: config.spec.cwd,
            vocabulary,
            classifiers,
            counters: Arc::new(Counters::new()),
            timeout: Duration::from_millis(config.spec.timeout_ms),
            harness: config.harness,
            queue: Arc::new(EventQueue::new()),
            managed: None,
        })
    }

    fn dispatch(&mut self, line: &str) -> HarnessResult<String> {
        let parsed = match parse_command(line) {
            Ok(parsed) => parsed,
            Err(message) => return Ok(format!("A_ERROR UnknownCommand {message}")),
        };
        match parsed.name {
            "C_IOKIND" => Ok(self.handle_iokind(&parsed.args)),
            "C_INPUT" => self.handle_input(&parsed.args),
            "C_OUTPUT" => Ok(self.handle_output(&parsed.args)),
            "C_QUIT" => Ok(QUIT_REPLY.to_string()),
            other => Ok(format!("A_ERROR UnknownCommand Unknown command: {other}")),
        }
    }

    /// Heuristic io-direction query: "output" as soon as an event is queued.
    fn handle_iokind(&self, args: &HashMap<&str, &str>) -> String {
        let pending = !self.queue.is_empty();
        let mut reply = String::from("A_IOKIND");
        match args.get("iokind").copied() {
            None => {
                reply.push_str(" iokind=");
                reply.push_str(if pending { "output" } else { "input" });
            }
            Some(kind @ ("input" | "output")) => {
                reply.push_str(" iokind=");
                reply.push_str(kind);
            }
            Some(other) => return format!("A_ERROR UnknownIOKind {other}"),
        }
        append_channel(&mut reply, args);
        reply
    }

    fn handle_input(&mut self, args: &HashMap<&str, &str>) -> HarnessResult<String> {
        let Some(event) = args.get("event").copied() else {
            return Ok("A_ERROR MissingArgument event".to_string());
        };
        if event == START_EVENT {
            // A dead instance may be replaced; a live one may not.
            if let Some(managed) = &self.managed {
                if managed.sut.is_alive() {
                    return Ok(INPUT_ERROR.to_string());
                }
                self.shutdown();
            }
            self.start_sut()?;
        } else {
            let Some(send) = self.vocabulary.resolve(event).map(str::to_owned) else {
                return Ok(format!("A_ERROR ParseErrorEvent Unknown event: {event}"));
            };
            let Some(managed) = self.managed.as_mut() else {
                return Ok(INPUT_ERROR.to_string());
            };
            match managed.sut.input(&send) {
                Ok(()) => {}
                // Writing to a dead SUT is the same protocol-level failure
                // as writing before start.
                Err(HarnessError::ProcessTerminated { .. }) => {
                    return Ok(INPUT_ERROR.to_string());
                }
                Err(err) => return Err(err),
            }
        }
        let mut reply = format!("A_INPUT event={event}");
        append_channel(&mut reply, args);
        Ok(reply)
    }

    fn handle_output(&self, args: &HashMap<&str, &str>) -> String {
        if self.managed.is_none() {
            return INPUT_ERROR.to_string();
        }
        let mut reply = String::from("A_OUTPUT ");
        match self.queue.poll(self.timeout) {
            Some(event) => {
                reply.push_str("event=");
                reply.push_str(&event.label);
            }
            None => reply.push_str("suspension=1"),
        }
        append_channel(&mut reply, args);
        reply
    }

    fn start_sut(&mut self) -> HarnessResult<()> {
        let mut sut = Sut::spawn(SutConfig {
            command: self.command.clone(),
            args: self.args.clone(),
            cwd: self.cwd.clone(),
            harness: self.harness.clone(),
        })?;
        let reader = sut.take_reader()?;
        // Announce the start before the pump can classify any output.
        self.queue.push(OutputEvent::started());

        let pump_queue = Arc::clone(&self.queue);
        let classifiers = Arc::clone(&self.classifiers);
        let counters = Arc::clone(&self.counters);
        // Read in short slices so events surface well within one C_OUTPUT wait.
        let slice = (self.timeout / 10).max(Duration::from_millis(1));
        let pump = std::thread::spawn(move || {
            pump_events(reader, &classifiers, &counters, &pump_queue, slice);
        });

        self.managed = Some(ManagedSut {
            sut,
            pump: Some(pump),
        });
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(mut managed) = self.managed.take() {
            managed.sut.stop();
            if let Some(pump) = managed.pump.take() {
                let _ = pump.join();
            }
        }
    }
}

/// Background task: drain SUT output through the classifiers into the queue,
/// then announce how the process went away.
fn pump_events(
    mut reader: SutReader,
    classifiers: &ClassifierSet,
    counters: &Counters,
    queue: &EventQueue,
    slice: Duration,
) {
    let mut buffer = String::new();
    loop {
        match reader.read_available(slice) {
            Ok(batch) => {
                if !batch.data.is_empty() {
                    append_normalized(&mut buffer, &batch.data);
                    while let Some(event) = classifiers.classify(&mut buffer, counters) {
                        queue.push(event);
                    }
                }
                if batch.eof || (batch.data.is_empty() && !reader.is_alive()) {
                    break;
                }
            }
            Err(err) => {
                tracing::debug!(target: "pipebox::adapter", %err, "pump read failed");
                break;
            }
        }
    }
    while let Some(event) = classifiers.classify(&mut buffer, counters) {
        queue.push(event);
    }
    if !buffer.is_empty() {
        tracing::debug!(
            target: "pipebox::adapter",
            unclassified = %buffer,
            "unclassified output at shutdown"
        );
    }
    // A SUT that closed its output but kept running is taken down here, so
    // the announced lifecycle event always reflects a real exit.
    let kind = reader.resolve_exit(EXIT_EVENT_WAIT);
    queue.push(OutputEvent::lifecycle(&kind));
}

/// Carriage returns never reach the classifiers; patterns are written
/// against bare `\n`.
fn append_normalized(buffer: &mut String, data: &str) {
    buffer.extend(data.chars().filter(|&c| c != '\r'));
}

/// Echo the caller's channel argument back on the reply, tab-separated.
fn append_channel(reply: &mut String, args: &HashMap<&str, &str>) {
    if let Some(channel) = args.get("channel").copied() {
        reply.push_str("\tchannel=");
        reply.push_str(channel);
    }
}

struct ParsedCommand<'a> {
    name: &'a str,
    args: HashMap<&'a str, &'a str>,
}

/// Parse `NAME key=value<TAB>key=value`. The command name is separated by
/// spaces or tabs; arguments are tab-separated `key=value` pairs.
fn parse_command(line: &str) -> Result<ParsedCommand<'_>, String> {
    let (name, rest) = match line.find([' ', '\t']) {
        Some(index) => {
            let (name, rest) = line.split_at(index);
            (name, rest.trim_start_matches([' ', '\t']))
        }
        None => (line, ""),
    };
    let mut args = HashMap::new();
    if !rest.is_empty() {
        for raw in rest.split('\t') {
            let Some((key, value)) = raw.split_once('=') else {
                return Err("Unable to parse arguments".to_string());
            };
            args.insert(key, value);
        }
    }
    Ok(ParsedCommand { name, args })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parse_command_without_arguments() {
        let parsed = parse_command("C_QUIT").unwrap();
        assert_eq!(parsed.name, "C_QUIT");
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn parse_command_with_arguments() {
        let parsed = parse_command("C_INPUT event=?Yes\tchannel=3").unwrap();
        assert_eq!(parsed.name, "C_INPUT");
        assert_eq!(parsed.args.get("event").copied(), Some("?Yes"));
        assert_eq!(parsed.args.get("channel").copied(), Some("3"));
    }

    #[test]
    fn parse_command_rejects_argument_without_equals() {
        assert!(parse_command("C_INPUT event").is_err());
    }

    #[test]
    fn parse_command_accepts_value_containing_equals() {
        let parsed = parse_command("C_INPUT event=a=b").unwrap();
        assert_eq!(parsed.args.get("event").copied(), Some("a=b"));
    }
}
