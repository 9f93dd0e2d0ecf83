//! Console fixture: echoes every input line back as `got: <line>`.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)] // Fixtures speak on stdout by design

use std::io::{self, BufRead, Write};

fn main() -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        writeln!(stdout, "got: {line}")?;
        stdout.flush()?;
    }

    Ok(())
}
