//! Host terminal console, using crossterm raw mode.
//!
//! Raw mode turns off line buffering, echo and the terminal's own signal
//! keys, so Ctrl-C arrives as a key event and is reported as
//! `ConsoleError::Interrupted`. SIGINT and SIGTERM sent from elsewhere are
//! caught and reported the same way. The previous terminal mode is restored
//! when the `RawModeGuard` is released or dropped.

use std::collections::VecDeque;
use std::io::{self, stdout, ErrorKind, IsTerminal, Stdout, Write};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::warn;

use crate::console::signal::InterruptFlag;
use crate::console::{ConsoleDevice, ConsoleError};

/// Longest wait on terminal events between checks for a caught signal.
const SIGNAL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Holds the terminal in raw mode for as long as it lives.
pub struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    /// Save the current terminal mode and switch to raw mode.
    pub fn acquire() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self { enabled: true })
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }

    /// Restore the saved terminal mode. Safe to call more than once.
    pub fn release(&mut self) -> io::Result<()> {
        if std::mem::take(&mut self.enabled) {
            disable_raw_mode()?;
        }
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("failed to restore terminal mode: {e}");
        }
    }
}

/// Console on the process's controlling terminal.
pub struct TerminalConsole {
    guard: RawModeGuard,
    interrupts: InterruptFlag,
    // Keys read while polling or checking for interrupts, not yet consumed.
    pending: VecDeque<u8>,
    out: Stdout,
}

impl TerminalConsole {
    /// Put the terminal in raw mode and start catching interrupt signals.
    ///
    /// Fails if stdin is not a terminal or raw mode can't be entered; use a
    /// `StreamConsole` on stdin and stdout instead.
    pub fn open() -> io::Result<Self> {
        if !io::stdin().is_terminal() {
            return Err(io::Error::new(ErrorKind::Other, "stdin is not a terminal"));
        }

        // Raw mode first: if it fails, signals keep their default action.
        let guard = RawModeGuard::acquire()?;
        let interrupts = InterruptFlag::new();
        interrupts.register_signals()?;

        Ok(Self {
            guard,
            interrupts,
            pending: VecDeque::new(),
            out: stdout(),
        })
    }

    /// Read one event and translate it to a character, if it is a key press.
    fn next_key(&mut self) -> Result<Option<u8>, ConsoleError> {
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => translate_key(key),
            _ => Ok(None),
        }
    }
}

fn translate_key(key: KeyEvent) -> Result<Option<u8>, ConsoleError> {
    let ch = match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Err(ConsoleError::Interrupted);
        }
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() => {
            (c.to_ascii_lowercase() as u8) & 0x1F
        }
        KeyCode::Char(c) if c.is_ascii() => c as u8,
        KeyCode::Enter => b'\n',
        KeyCode::Tab => b'\t',
        KeyCode::Backspace => 0x08,
        KeyCode::Esc => 0x1B,
        _ => return Ok(None),
    };
    Ok(Some(ch))
}

impl ConsoleDevice for TerminalConsole {
    fn poll(&mut self, timeout: Duration) -> Result<bool, ConsoleError> {
        self.interrupts.check()?;
        if !self.pending.is_empty() {
            return Ok(true);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if event::poll(remaining.min(SIGNAL_CHECK_INTERVAL))? {
                if let Some(ch) = self.next_key()? {
                    self.pending.push_back(ch);
                    return Ok(true);
                }
            }
            self.interrupts.check()?;
            if remaining.is_zero() {
                return Ok(false);
            }
        }
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        self.interrupts.check()?;
        if let Some(ch) = self.pending.pop_front() {
            return Ok(ch);
        }
        loop {
            if event::poll(SIGNAL_CHECK_INTERVAL)? {
                if let Some(ch) = self.next_key()? {
                    return Ok(ch);
                }
            }
            self.interrupts.check()?;
        }
    }

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
        // Raw mode disables output post-processing.
        if ch == b'\n' && self.guard.is_active() {
            self.out.write_all(b"\r\n")?;
        } else {
            self.out.write_all(&[ch])?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.out.flush()?;
        Ok(())
    }

    fn check_interrupt(&mut self) -> Result<(), ConsoleError> {
        self.interrupts.check()?;
        while event::poll(Duration::ZERO)? {
            if let Some(ch) = self.next_key()? {
                self.pending.push_back(ch);
            }
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<(), ConsoleError> {
        self.out.flush()?;
        self.guard.release()?;
        Ok(())
    }
}
