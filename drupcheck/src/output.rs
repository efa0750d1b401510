//! Unified routines to print data.

use atty::{self, Stream};
use std::io::{self, Write};

/// Check whether we are writing to a terminal.
pub fn is_a_tty() -> bool {
    atty::is(Stream::Stdout)
}

/// Check whether diagnostics go to a terminal.
pub fn stderr_is_a_tty() -> bool {
    atty::is(Stream::Stderr)
}

/// Write the fatal-error diagnostic line to stderr, in bold red when that
/// is a terminal. The single entry point for both the [`fatal!`](../macro.fatal.html)
/// macro and failure reports that append more context before aborting.
pub fn fatal_diagnostic(message: &str) {
    let stderr = io::stderr();
    let mut handle = stderr.lock();
    if stderr_is_a_tty() {
        let _ = writeln!(
            handle,
            "\x1b[1mchecker: \x1b[31mfatal error: \x1b[0m{}",
            message
        );
    } else {
        let _ = writeln!(handle, "checker: fatal error: {}", message);
    }
    let _ = handle.flush();
}

/// Ratio of `a` in `b`, as a percentage for statistics lines.
pub fn percent(a: usize, b: usize) -> f64 {
    if b == 0 {
        0.0
    } else {
        100.0 * a as f64 / b as f64
    }
}
