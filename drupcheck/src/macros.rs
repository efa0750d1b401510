//! Macros and other utility code

/// All regular output goes through this macro.
///
/// When the consumer of our output is gone we terminate quietly instead of
/// panicking on the broken pipe.
#[macro_export]
macro_rules! puts {
    ($($arg:tt)*) => ({
        use std::io::Write;
        match write!(std::io::stdout(), $($arg)*) {
            Ok(()) => (),
            Err(ref err) if err.kind() == std::io::ErrorKind::BrokenPipe => std::process::exit(141),
            Err(ref err) =>  panic!("{}", err),
        };
    })
}

/// Print to stdout, prefixed by "c [checker] ".
#[macro_export]
macro_rules! comment {
    ($($arg:tt)*) => ({
        $crate::puts!("c [checker] ");
        $crate::puts!($($arg)*);
        $crate::puts!("\n");
    })
}

/// Report a fatal error and abort.
///
/// The diagnostic goes to stderr; the panic carries the same message so the
/// release profile (`panic = "abort"`) terminates the process while tests
/// can still observe the failure.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => ({
        let message = format!($($arg)*);
        $crate::output::fatal_diagnostic(&message);
        panic!("{}", message);
    })
}

/// Check an internal invariant at runtime.
///
/// In contrast to `assert!` this can be compiled out, through
/// [`CHECK_INVARIANTS`](config/constant.CHECK_INVARIANTS.html).
#[macro_export]
macro_rules! invariant {
    ($($arg:tt)*) => ({
        if $crate::config::CHECK_INVARIANTS {
            assert!($($arg)*);
        }
    })
}

/// Check a function precondition at runtime; the counterpart of
/// [invariant](macro.invariant.html) for caller obligations, gated by
/// [`CHECK_PRECONDITIONS`](config/constant.CHECK_PRECONDITIONS.html).
#[macro_export]
macro_rules! requires {
    ($($arg:tt)*) => ({
        if $crate::config::CHECK_PRECONDITIONS {
            assert!($($arg)*);
        }
    })
}
