//! # LC-3 Emulator
//!
//! An emulator of the LC-3, a 16-bit instructional RISC computer.
//!
//! A program image is loaded into a 64K-word address space and run from
//! 0x3000 until it executes TRAP HALT or hits an illegal instruction.
//! Keyboard and display go through a [`ConsoleDevice`], so the same machine
//! runs against a real terminal or a scripted console in tests.

pub mod console;
pub mod cpu;
pub mod image;

// Re-export commonly used types
pub use console::{ConsoleDevice, ConsoleError, ScriptedConsole, StreamConsole, TerminalConsole};
pub use cpu::{Cpu, CpuConfig, CpuError, CpuState, Instruction, Memory, Reg, Registers};
pub use image::{Image, ImageError};
