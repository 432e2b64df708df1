#![warn(clippy::pedantic)]

//! Reads lines from stdin, sorts them with the root collator, prints them.

use std::io::{self, BufRead, Write};

use unicol_engine::Collator;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines: Vec<String> = Vec::new();
    for line in stdin.lock().lines() {
        lines.push(line?);
    }

    let collator = Collator::root()?;
    let mut failure = None;
    lines.sort_by(|a, b| match collator.compare(a, b) {
        Ok(ordering) => ordering,
        Err(err) => {
            failure.get_or_insert(err);
            std::cmp::Ordering::Equal
        }
    });
    if let Some(err) = failure {
        return Err(err.into());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in &lines {
        writeln!(out, "{line}")?;
    }

    Ok(())
}
