//! CPU emulation for the LC-3.
//!
//! This module implements the LC-3 architecture:
//! - 65,536 sixteen-bit memory words with a memory-mapped keyboard
//! - 8 general-purpose registers, a program counter and an N/Z/P flag
//! - 15 instructions plus six built-in trap routines

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trap;

pub use memory::{Memory, KBDR, KBSR};
pub use registers::{Condition, Reg, Registers, PC_START};
pub use decode::{decode, encode, sign_extend, DecodeError, Instruction, Opcode, Operand};
pub use execute::{Cpu, CpuConfig, CpuError, CpuState, Snapshot};
pub use trap::TrapVector;
