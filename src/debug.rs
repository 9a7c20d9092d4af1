//! Structured debug output over the platform's UART.
//!
//! Mirrors the four severities the original firmware writes
//! (`DBG_ERR`/`DBG_WARN`/`DBG_INFO`/`DBG_VERB`) as `ERROR:`/`WARN:`/`INFO:`/
//! `VERBOSE:` prefixed lines. Under `cfg(test)` the sink is `std::print!` so
//! the whole trust engine is exercisable on the host without a UART.

use core::fmt::{self, Write};

/// Anything that can receive raw debug bytes. Implemented by the platform's
/// UART driver on real hardware.
pub trait DebugSink {
    fn write_byte(&mut self, b: u8);
}

pub struct Writer<'a, S: DebugSink>(pub &'a mut S);

impl<'a, S: DebugSink> Write for Writer<'a, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.0.write_byte(b);
        }
        Ok(())
    }
}

#[cfg(all(not(test), feature = "hardware"))]
#[macro_export]
macro_rules! dbg_print {
    ($sink:expr, $($args:tt)+) => ({
        use core::fmt::Write;
        let _ = write!($crate::debug::Writer($sink), $($args)+);
    });
}

#[cfg(any(test, not(feature = "hardware")))]
#[macro_export]
macro_rules! dbg_print {
    ($sink:expr, $($args:tt)+) => ({
        let _ = &$sink;
        #[cfg(test)]
        std::print!($($args)+);
    });
}

/// `error!(sink, "...", args)` writes an `ERROR: ...` line.
#[macro_export]
macro_rules! error {
    ($sink:expr, $fmt:expr) => ($crate::dbg_print!($sink, concat!("ERROR: ", $fmt, "\r\n")));
    ($sink:expr, $fmt:expr, $($args:tt)+) => (
        $crate::dbg_print!($sink, concat!("ERROR: ", $fmt, "\r\n"), $($args)+)
    );
}

#[macro_export]
macro_rules! warn_log {
    ($sink:expr, $fmt:expr) => ($crate::dbg_print!($sink, concat!("WARN: ", $fmt, "\r\n")));
    ($sink:expr, $fmt:expr, $($args:tt)+) => (
        $crate::dbg_print!($sink, concat!("WARN: ", $fmt, "\r\n"), $($args)+)
    );
}

#[macro_export]
macro_rules! info {
    ($sink:expr, $fmt:expr) => ($crate::dbg_print!($sink, concat!("INFO: ", $fmt, "\r\n")));
    ($sink:expr, $fmt:expr, $($args:tt)+) => (
        $crate::dbg_print!($sink, concat!("INFO: ", $fmt, "\r\n"), $($args)+)
    );
}

#[macro_export]
macro_rules! verbose {
    ($sink:expr, $fmt:expr) => ($crate::dbg_print!($sink, concat!("VERBOSE: ", $fmt, "\r\n")));
    ($sink:expr, $fmt:expr, $($args:tt)+) => (
        $crate::dbg_print!($sink, concat!("VERBOSE: ", $fmt, "\r\n"), $($args)+)
    );
}
