//! Console devices backing the keyboard and display.
//!
//! The CPU only talks to a `ConsoleDevice`: a character source it can poll
//! with a bounded wait and a character sink. `TerminalConsole` drives the
//! host terminal in raw mode, `StreamConsole` covers piped or redirected
//! stdio, and `ScriptedConsole` replays canned input and captures output
//! for tests.

pub mod scripted;
pub mod signal;
pub mod stream;
pub mod terminal;

use std::time::Duration;

use thiserror::Error;

pub use scripted::ScriptedConsole;
pub use signal::InterruptFlag;
pub use stream::StreamConsole;
pub use terminal::{RawModeGuard, TerminalConsole};

/// Character I/O as seen by the machine.
pub trait ConsoleDevice {
    /// Wait up to `timeout` for input. Returns true if a character can be
    /// read without blocking.
    fn poll(&mut self, timeout: Duration) -> Result<bool, ConsoleError>;

    /// Block until one character is available and return it.
    fn read_char(&mut self) -> Result<u8, ConsoleError>;

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError>;

    fn flush(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }

    /// Report a pending user interrupt without blocking.
    fn check_interrupt(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }

    /// Flush output and hand the host device back in its original mode.
    fn restore(&mut self) -> Result<(), ConsoleError> {
        self.flush()
    }

    fn write_str(&mut self, s: &str) -> Result<(), ConsoleError> {
        for b in s.bytes() {
            self.write_char(b)?;
        }
        Ok(())
    }
}

/// Errors that can occur on a console device.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("interrupted by user")]
    Interrupted,

    #[error("input exhausted")]
    EndOfInput,

    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),
}
