//! Console fixture: greets, then answers y/n prompts until told to quit.
//! Stands in for a menu-driven interactive program.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::print_stdout)] // Fixtures speak on stdout by design

use std::io::{self, BufRead, Write};

fn main() -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    writeln!(stdout, "Welcome to Greeter")?;
    writeln!(stdout, "Ready to start? (y/n)")?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "y" => writeln!(stdout, "Starting!")?,
            "n" | "q" => {
                writeln!(stdout, "Thank you for playing! Bye!")?;
                stdout.flush()?;
                return Ok(());
            }
            _ => writeln!(stdout, "Error in reading your input.")?,
        }
        stdout.flush()?;
    }

    Ok(())
}
