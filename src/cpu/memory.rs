//! LC-3 memory subsystem.
//!
//! 65,536 sixteen-bit words, addressed by a 16-bit address. Two addresses
//! near the top of memory are the memory-mapped keyboard: reading KBSR polls
//! the console and latches any pending character into KBDR.

use std::time::Duration;

use log::{debug, warn};

use crate::console::{ConsoleDevice, ConsoleError};
use crate::image::Image;

/// The number of words in the address space.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Keyboard status register. Bit 15 is set when a character is ready.
pub const KBSR: u16 = 0xFE00;

/// Keyboard data register. Holds the last character latched by a KBSR read.
pub const KBDR: u16 = 0xFE02;

const KBSR_READY: u16 = 1 << 15;

/// Default bounded wait for input on a KBSR read.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

/// LC-3 memory: 64K words.
#[derive(Clone)]
pub struct Memory {
    cells: Vec<u16>,
    poll_timeout: Duration,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Set how long a KBSR read waits for input before reporting "not ready".
    pub fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = timeout;
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Read a word as the CPU sees it.
    ///
    /// Reading KBSR polls `console`; if a character is pending it is read
    /// into KBDR and the ready bit is set, otherwise KBSR becomes 0.
    pub fn read<C>(&mut self, addr: u16, console: &mut C) -> Result<u16, ConsoleError>
    where
        C: ConsoleDevice + ?Sized,
    {
        if addr == KBSR {
            if console.poll(self.poll_timeout)? {
                let ch = console.read_char()?;
                self.cells[KBSR as usize] = KBSR_READY;
                self.cells[KBDR as usize] = ch as u16;
            } else {
                self.cells[KBSR as usize] = 0;
            }
        }
        Ok(self.cells[addr as usize])
    }

    /// Read a word with no device side effects.
    #[inline]
    pub fn peek(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    /// Write a word. Every address is writable.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy an image into memory starting at its origin.
    ///
    /// Loading stops before the last address (0xFFFF), which is never
    /// written. Returns the number of words written.
    pub fn load_image(&mut self, image: &Image) -> usize {
        let origin = image.origin as usize;
        let room = (MEMORY_SIZE - 1).saturating_sub(origin);
        let count = image.len().min(room);

        self.cells[origin..origin + count].copy_from_slice(&image.words[..count]);

        if count < image.len() {
            warn!(
                "image truncated: {} of {} words loaded at {:#06x}",
                count,
                image.len(),
                image.origin
            );
        }
        debug!("loaded {} words at {:#06x}", count, image.origin);
        count
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        let mut console = ScriptedConsole::new();

        mem.write(0x3000, 0xBEEF);
        assert_eq!(mem.read(0x3000, &mut console).unwrap(), 0xBEEF);
        assert_eq!(mem.peek(0x3000), 0xBEEF);
        assert_eq!(mem.peek(0x3001), 0);
    }

    #[test]
    fn test_kbsr_without_input() {
        let mut mem = Memory::new();
        let mut console = ScriptedConsole::new();
        mem.write(KBSR, 0x1234);

        assert_eq!(mem.read(KBSR, &mut console).unwrap(), 0);
        assert_eq!(mem.peek(KBDR), 0);
    }

    #[test]
    fn test_kbsr_latches_pending_char() {
        let mut mem = Memory::new();
        let mut console = ScriptedConsole::with_input(b"q");

        let status = mem.read(KBSR, &mut console).unwrap();
        assert_ne!(status & 0x8000, 0);
        assert_eq!(mem.read(KBDR, &mut console).unwrap(), b'q' as u16);

        // The character was consumed; the next poll finds nothing.
        assert_eq!(mem.read(KBSR, &mut console).unwrap(), 0);
        assert_eq!(mem.peek(KBDR), b'q' as u16);
    }

    #[test]
    fn test_peek_kbsr_has_no_side_effect() {
        let mut mem = Memory::new();
        mem.write(KBSR, 0x8000);
        assert_eq!(mem.peek(KBSR), 0x8000);
    }

    #[test]
    fn test_load_image() {
        let mut mem = Memory::new();
        let image = Image { origin: 0x3000, words: vec![0x1234, 0x5678] };

        assert_eq!(mem.load_image(&image), 2);
        assert_eq!(mem.peek(0x3000), 0x1234);
        assert_eq!(mem.peek(0x3001), 0x5678);
    }

    #[test]
    fn test_load_image_stops_before_last_address() {
        let mut mem = Memory::new();
        let image = Image { origin: 0xFFFD, words: vec![1, 2, 3, 4] };

        assert_eq!(mem.load_image(&image), 2);
        assert_eq!(mem.peek(0xFFFD), 1);
        assert_eq!(mem.peek(0xFFFE), 2);
        assert_eq!(mem.peek(0xFFFF), 0);
        assert_eq!(mem.peek(0x0000), 0);
    }

    #[test]
    fn test_load_image_at_last_address_loads_nothing() {
        let mut mem = Memory::new();
        let image = Image { origin: 0xFFFF, words: vec![7] };

        assert_eq!(mem.load_image(&image), 0);
        assert_eq!(mem.peek(0xFFFF), 0);
    }
}
