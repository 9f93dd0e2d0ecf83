//! Console fixture: emits numbered lines with a delay between each, to
//! exercise inactivity-timeout resets in the timed reader.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)] // Fixtures speak on stdout by design

use std::io::{self, Write};
use std::time::Duration;

fn main() -> io::Result<()> {
    let count: u32 = std::env::args()
        .nth(1)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(3);
    let mut stdout = io::stdout();

    for index in 1..=count {
        writeln!(stdout, "drip {index}")?;
        stdout.flush()?;
        std::thread::sleep(Duration::from_millis(30));
    }

    Ok(())
}
