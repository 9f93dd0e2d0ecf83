//! Console fixture: announces itself, then crashes (exit 2) on any input.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)] // Fixtures speak on stdout by design
#![allow(clippy::exit)] // The whole point of this fixture

use std::io::{self, BufRead, Write};

fn main() -> io::Result<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "armed")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    std::process::exit(2);
}
