//! Console over plain byte streams.
//!
//! Used when there is no interactive terminal: stdin is a pipe or a file,
//! or raw mode can't be entered. Input is taken a byte at a time with no
//! timeout, so `poll` reports a character ready until the stream ends.

use std::io::{self, ErrorKind, Read, Stdin, Stdout, Write};
use std::time::Duration;

use crate::console::{ConsoleDevice, ConsoleError};

/// A console reading from `R` and writing to `W`.
pub struct StreamConsole<R, W> {
    input: R,
    output: W,
    // Read by `poll`, not yet consumed.
    peeked: Option<u8>,
    at_eof: bool,
}

impl StreamConsole<Stdin, Stdout> {
    /// Console on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> StreamConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            peeked: None,
            at_eof: false,
        }
    }

    /// Consume the console, returning the output stream.
    pub fn into_output(self) -> W {
        self.output
    }

    fn next_byte(&mut self) -> Result<Option<u8>, ConsoleError> {
        if self.at_eof {
            return Ok(None);
        }

        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => {
                    self.at_eof = true;
                    return Ok(None);
                }
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: Read, W: Write> ConsoleDevice for StreamConsole<R, W> {
    fn poll(&mut self, _timeout: Duration) -> Result<bool, ConsoleError> {
        if self.peeked.is_none() {
            self.peeked = self.next_byte()?;
        }
        Ok(self.peeked.is_some())
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        match self.peeked.take() {
            Some(ch) => Ok(ch),
            None => self.next_byte()?.ok_or(ConsoleError::EndOfInput),
        }
    }

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
        self.output.write_all(&[ch])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.output.flush()?;
        Ok(())
    }
}
