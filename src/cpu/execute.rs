//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use std::time::Duration;

use log::debug;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::console::{ConsoleDevice, ConsoleError};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode, Operand};
use crate::cpu::memory::{Memory, DEFAULT_POLL_TIMEOUT};
use crate::cpu::registers::{Reg, Registers};
use crate::image::Image;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed TRAP HALT).
    Halted,
    /// CPU stopped on a fatal error.
    Error,
}

/// Tunables for a machine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuConfig {
    /// Bounded wait for input when a program reads KBSR.
    pub keyboard_poll_timeout: Duration,
    /// Check the console for a user interrupt every this many instructions.
    /// 0 disables the check.
    pub interrupt_check_interval: u64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            keyboard_poll_timeout: DEFAULT_POLL_TIMEOUT,
            interrupt_check_interval: 4096,
        }
    }
}

/// Register-level view of a machine, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub registers: Registers,
    pub state: CpuState,
    pub cycles: u64,
}

/// The LC-3 CPU, with its memory and console.
pub struct Cpu<C: ConsoleDevice> {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Keyboard and display.
    pub console: C,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions executed.
    pub cycles: u64,
    config: CpuConfig,
}

impl<C: ConsoleDevice> Cpu<C> {
    /// Create a CPU in its power-on state, attached to `console`.
    pub fn new(console: C) -> Self {
        Self::with_config(console, CpuConfig::default())
    }

    pub fn with_config(console: C, config: CpuConfig) -> Self {
        let mut mem = Memory::new();
        mem.set_poll_timeout(config.keyboard_poll_timeout);
        Self {
            regs: Registers::new(),
            mem,
            console,
            state: CpuState::Running,
            cycles: 0,
            config,
        }
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Reset registers, memory and state. The console is left alone.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
    }

    /// Load a program image into memory. Returns the number of words loaded.
    pub fn load_image(&mut self, image: &Image) -> usize {
        self.mem.load_image(image)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. Any error
    /// other than `NotRunning` leaves the CPU in `CpuState::Error`.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        self.try_step().map_err(|e| self.fail(e))
    }

    fn try_step(&mut self) -> Result<Instruction, CpuError> {
        // Fetch
        let pc = self.regs.pc;
        let word = self.mem.read(pc, &mut self.console)?;

        // Offsets are relative to the incremented PC
        self.regs.advance_pc();

        // Decode
        let instr = decode::decode(word).map_err(|e| match e {
            DecodeError::Illegal { opcode, word } => CpuError::IllegalInstruction { opcode, word, pc },
        })?;

        // Execute
        self.execute(instr)?;

        self.cycles += 1;
        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.check_interrupt()?;
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.check_interrupt()?;
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    fn check_interrupt(&mut self) -> Result<(), CpuError> {
        let interval = self.config.interrupt_check_interval;
        if interval == 0 || self.cycles % interval != 0 {
            return Ok(());
        }
        self.console.check_interrupt().map_err(|e| self.fail(e.into()))
    }

    fn fail(&mut self, err: CpuError) -> CpuError {
        debug!("stopping at pc {:#06x} after {} instructions: {err}", self.regs.pc, self.cycles);
        self.state = CpuState::Error;
        err
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            // ==================== Operate ====================

            Instruction::Add { dr, sr1, src2 } => {
                let value = self.regs.read(sr1).wrapping_add(self.operand(src2));
                self.regs.write_and_update(dr, value);
            }

            Instruction::And { dr, sr1, src2 } => {
                let value = self.regs.read(sr1) & self.operand(src2);
                self.regs.write_and_update(dr, value);
            }

            Instruction::Not { dr, sr } => {
                let value = !self.regs.read(sr);
                self.regs.write_and_update(dr, value);
            }

            // ==================== Control ====================

            Instruction::Br { mask, offset } => {
                if mask & self.regs.cond.bits() != 0 {
                    self.regs.pc = self.pc_relative(offset);
                }
            }

            Instruction::Jmp { base } => {
                self.regs.pc = self.regs.read(base);
            }

            Instruction::Jsr { offset } => {
                let target = self.pc_relative(offset);
                self.regs.write(Reg::R7, self.regs.pc);
                self.regs.pc = target;
            }

            Instruction::Jsrr { base } => {
                // Read before linking, so JSRR R7 jumps to the old R7.
                let target = self.regs.read(base);
                self.regs.write(Reg::R7, self.regs.pc);
                self.regs.pc = target;
            }

            Instruction::Trap { vector } => {
                let saved = self.regs.read(Reg::R7);
                self.regs.write(Reg::R7, self.regs.pc);
                if let Err(e) = self.trap(vector) {
                    self.regs.write(Reg::R7, saved);
                    return Err(e);
                }
            }

            // ==================== Data movement ====================

            Instruction::Ld { dr, offset } => {
                let value = self.load(self.pc_relative(offset))?;
                self.regs.write_and_update(dr, value);
            }

            Instruction::Ldi { dr, offset } => {
                let pointer = self.load(self.pc_relative(offset))?;
                let value = self.load(pointer)?;
                self.regs.write_and_update(dr, value);
            }

            Instruction::Ldr { dr, base, offset } => {
                let value = self.load(self.base_relative(base, offset))?;
                self.regs.write_and_update(dr, value);
            }

            Instruction::Lea { dr, offset } => {
                let addr = self.pc_relative(offset);
                self.regs.write_and_update(dr, addr);
            }

            Instruction::St { sr, offset } => {
                self.mem.write(self.pc_relative(offset), self.regs.read(sr));
            }

            Instruction::Sti { sr, offset } => {
                let pointer = self.load(self.pc_relative(offset))?;
                self.mem.write(pointer, self.regs.read(sr));
            }

            Instruction::Str { sr, base, offset } => {
                self.mem.write(self.base_relative(base, offset), self.regs.read(sr));
            }
        }

        Ok(())
    }

    #[inline]
    fn operand(&self, src: Operand) -> u16 {
        match src {
            Operand::Reg(reg) => self.regs.read(reg),
            Operand::Imm(imm) => imm,
        }
    }

    #[inline]
    fn pc_relative(&self, offset: u16) -> u16 {
        self.regs.pc.wrapping_add(offset)
    }

    #[inline]
    fn base_relative(&self, base: Reg, offset: u16) -> u16 {
        self.regs.read(base).wrapping_add(offset)
    }

    /// Read memory as the CPU does, including device side effects.
    fn load(&mut self, addr: u16) -> Result<u16, CpuError> {
        Ok(self.mem.read(addr, &mut self.console)?)
    }

    /// Capture registers and execution state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.regs.clone(),
            state: self.state,
            cycles: self.cycles,
        }
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl<C: ConsoleDevice> std::fmt::Debug for Cpu<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("illegal instruction {word:#06x} ({opcode:?}) at {pc:#06x}")]
    IllegalInstruction { opcode: Opcode, word: u16, pc: u16 },

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Console(ConsoleError),
}

impl From<ConsoleError> for CpuError {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::Interrupted => CpuError::Interrupted,
            other => CpuError::Console(other),
        }
    }
}
