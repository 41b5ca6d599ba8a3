//! Host interrupt signals.
//!
//! SIGINT and SIGTERM would otherwise end the process while the terminal is
//! still in raw mode. Once routed here they only raise a flag, which the
//! console reports as `ConsoleError::Interrupted` at its next check.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::console::ConsoleError;

/// A pending-interrupt flag shared with the signal handlers.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise this flag on SIGINT and SIGTERM instead of terminating.
    pub fn register_signals(&self) -> io::Result<()> {
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&self.raised))?;
        }
        Ok(())
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Consume a pending interrupt, reporting it as an error.
    pub fn check(&self) -> Result<(), ConsoleError> {
        if self.raised.swap(false, Ordering::SeqCst) {
            return Err(ConsoleError::Interrupted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raised_flag_reported_once() {
        let flag = InterruptFlag::new();
        flag.check().unwrap();

        flag.clone().raise();

        assert!(matches!(flag.check(), Err(ConsoleError::Interrupted)));
        flag.check().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_sigterm_raises_flag() {
        let flag = InterruptFlag::new();
        flag.register_signals().unwrap();

        signal_hook::low_level::raise(SIGTERM).unwrap();

        assert!(matches!(flag.check(), Err(ConsoleError::Interrupted)));
    }
}
