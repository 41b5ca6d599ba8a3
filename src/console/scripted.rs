//! In-memory console for tests.

use std::collections::VecDeque;
use std::time::Duration;

use crate::console::{ConsoleDevice, ConsoleError};

/// A console fed from a script of input bytes, capturing all output.
///
/// `poll` never waits: input is either queued or it isn't.
#[derive(Default, Debug)]
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
    interrupt_pending: bool,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: &[u8]) -> Self {
        let mut console = Self::new();
        console.write_input(input);
        console
    }

    pub fn write_input(&mut self, vals: &[u8]) {
        self.input.extend(vals.iter().copied());
    }

    /// Make the next input operation fail with `ConsoleError::Interrupted`.
    pub fn interrupt(&mut self) {
        self.interrupt_pending = true;
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    fn take_interrupt(&mut self) -> Result<(), ConsoleError> {
        if std::mem::take(&mut self.interrupt_pending) {
            return Err(ConsoleError::Interrupted);
        }
        Ok(())
    }
}

impl ConsoleDevice for ScriptedConsole {
    fn poll(&mut self, _timeout: Duration) -> Result<bool, ConsoleError> {
        self.take_interrupt()?;
        Ok(!self.input.is_empty())
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        self.take_interrupt()?;
        self.input.pop_front().ok_or(ConsoleError::EndOfInput)
    }

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
        self.output.push(ch);
        Ok(())
    }

    fn check_interrupt(&mut self) -> Result<(), ConsoleError> {
        self.take_interrupt()
    }
}
