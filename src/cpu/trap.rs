//! Trap service routines.
//!
//! On real hardware these live in the operating system image. Here they
//! are built into the CPU and talk to the console device directly.

use log::{debug, warn};

use crate::console::ConsoleDevice;
use crate::cpu::execute::{Cpu, CpuError, CpuState};
use crate::cpu::registers::Reg;

/// Prompt printed by the IN trap.
pub const IN_PROMPT: &str = "Enter a character: ";

/// Trap vectors with a built-in service routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapVector {
    /// Read a character, no echo
    Getc = 0x20,
    /// Write the character in R0
    Out = 0x21,
    /// Write a string of one character per word
    Puts = 0x22,
    /// Prompt for and echo a character
    In = 0x23,
    /// Write a string of two characters per word
    Putsp = 0x24,
    /// Stop the machine
    Halt = 0x25,
}

impl TrapVector {
    pub fn from_u8(vector: u8) -> Option<Self> {
        match vector {
            0x20 => Some(TrapVector::Getc),
            0x21 => Some(TrapVector::Out),
            0x22 => Some(TrapVector::Puts),
            0x23 => Some(TrapVector::In),
            0x24 => Some(TrapVector::Putsp),
            0x25 => Some(TrapVector::Halt),
            _ => None,
        }
    }
}

impl<C: ConsoleDevice> Cpu<C> {
    /// Run the service routine for `vector`. R7 has already been linked.
    pub(crate) fn trap(&mut self, vector: u8) -> Result<(), CpuError> {
        let Some(trap) = TrapVector::from_u8(vector) else {
            warn!("ignoring unknown trap vector {vector:#04x} at {:#06x}", self.regs.pc.wrapping_sub(1));
            return Ok(());
        };

        match trap {
            TrapVector::Getc => {
                let ch = self.console.read_char()?;
                self.regs.write_and_update(Reg::R0, ch as u16);
            }

            TrapVector::Out => {
                self.console.write_char(self.regs.read(Reg::R0) as u8)?;
                self.console.flush()?;
            }

            TrapVector::Puts => {
                let start = self.regs.read(Reg::R0);
                for addr in string_addrs(start) {
                    let word = self.mem.peek(addr);
                    if word == 0 {
                        break;
                    }
                    self.console.write_char(word as u8)?;
                }
                self.console.flush()?;
            }

            TrapVector::In => {
                self.console.write_str(IN_PROMPT)?;
                self.console.flush()?;
                let ch = self.console.read_char()?;
                self.console.write_char(ch)?;
                self.console.write_char(b'\n')?;
                self.console.flush()?;
                self.regs.write_and_update(Reg::R0, ch as u16);
            }

            TrapVector::Putsp => {
                let start = self.regs.read(Reg::R0);
                for addr in string_addrs(start) {
                    let word = self.mem.peek(addr);
                    let low = (word & 0xFF) as u8;
                    if low == 0 {
                        break;
                    }
                    self.console.write_char(low)?;
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        self.console.write_char(high)?;
                    }
                }
                self.console.flush()?;
            }

            TrapVector::Halt => {
                self.console.write_str("HALT\n")?;
                self.console.flush()?;
                self.state = CpuState::Halted;
                debug!("halted after {} instructions", self.cycles + 1);
            }
        }

        Ok(())
    }
}

/// Every address once, starting at `start` and wrapping, so an
/// unterminated string can't loop forever.
fn string_addrs(start: u16) -> impl Iterator<Item = u16> {
    (0..=u16::MAX).map(move |i| start.wrapping_add(i))
}
