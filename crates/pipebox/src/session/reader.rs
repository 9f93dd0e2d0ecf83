//! Inactivity-bounded reading from a non-blocking byte stream.
//!
//! The reader consumes whatever is available, resetting its deadline on every
//! chunk, and gives up after `inactivity_timeout` of silence. An empty result
//! is a normal outcome ("no output yet"), not an error.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

/// How long to sleep between polls of an empty stream.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One read attempt's worth of captured output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadBatch {
    /// Raw captured text (lossy UTF-8).
    pub data: String,
    /// The stream reported end-of-data during this attempt.
    pub eof: bool,
}

/// Reads from a stream until an inactivity timeout elapses with no new data,
/// or the stream closes.
///
/// The stream must be in non-blocking mode: an empty pipe must report
/// `WouldBlock` rather than parking the thread.
#[derive(Debug)]
pub struct TimedReader<R: Read> {
    stream: R,
    buffer_size: usize,
}

impl<R: Read> TimedReader<R> {
    pub fn new(stream: R, buffer_size: usize) -> Self {
        Self {
            stream,
            buffer_size: buffer_size.max(1),
        }
    }

    /// Capture everything the stream produces until `inactivity_timeout`
    /// passes without a new byte, end-of-data is reached, or `producer_alive`
    /// reports the other end has terminated.
    ///
    /// The deadline resets on every received chunk, so a slow-but-steady
    /// producer is drained completely. Against a silent stream this returns
    /// an empty batch after roughly `inactivity_timeout`.
    pub fn read_available(
        &mut self,
        inactivity_timeout: Duration,
        producer_alive: impl Fn() -> bool,
    ) -> std::io::Result<ReadBatch> {
        let mut collected: Vec<u8> = Vec::new();
        let mut eof = false;
        let mut deadline = Instant::now() + inactivity_timeout;

        loop {
            let mut chunk = vec![0u8; self.buffer_size];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(count) => {
                    chunk.truncate(count);
                    collected.extend_from_slice(&chunk);
                    deadline = Instant::now() + inactivity_timeout;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if !producer_alive() {
                        break;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let remaining = deadline.saturating_duration_since(now);
                    std::thread::sleep(remaining.min(POLL_INTERVAL));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(ReadBatch {
            data: String::from_utf8_lossy(&collected).into_owned(),
            eof,
        })
    }
}

/// Split captured output into lines, accepting both `\r\n` and bare `\n`.
///
/// A trailing fragment without a terminator is returned as the final line;
/// trailing empty lines are dropped, matching how a console prompt without a
/// newline still counts as output.
pub fn split_lines(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = raw
        .split('\n')
        .map(|part| part.strip_suffix('\r').unwrap_or(part).to_owned())
        .collect();
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}
