//! Console fixture: exits immediately with the code given as first argument.

// Test fixtures require special allowances - they are not production code
#![allow(clippy::exit)] // The whole point of this fixture

fn main() {
    let code: i32 = std::env::args()
        .nth(1)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);
    std::process::exit(code);
}
