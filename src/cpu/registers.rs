//! LC-3 CPU registers.
//!
//! The LC-3 has:
//! - R0-R7: eight 16-bit general-purpose registers
//! - PC: 16-bit program counter
//! - COND: condition flag, exactly one of N, Z or P

use serde::{Serialize, Deserialize};

/// Address at which execution starts.
pub const PC_START: u16 = 0x3000;

/// Number of general-purpose registers.
pub const NUM_REGS: usize = 8;

/// A general-purpose register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Reg {
    pub const ALL: [Reg; NUM_REGS] = [
        Reg::R0, Reg::R1, Reg::R2, Reg::R3,
        Reg::R4, Reg::R5, Reg::R6, Reg::R7,
    ];

    /// Register selected by the low 3 bits of `bits`.
    #[inline]
    pub fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0x7) as usize]
    }

    /// The 3-bit field value of this register.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// The condition flag.
///
/// Modelled as a single value rather than three bits, so exactly one of
/// N, Z, P is set at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// P: last result was positive
    Positive = 0b001,
    /// Z: last result was zero
    Zero = 0b010,
    /// N: last result was negative (high bit set)
    Negative = 0b100,
}

impl Condition {
    /// Classify a 16-bit result.
    pub fn from_value(value: u16) -> Self {
        if value == 0 {
            Condition::Zero
        } else if value >> 15 != 0 {
            Condition::Negative
        } else {
            Condition::Positive
        }
    }

    /// The NZP bit pattern, as tested by BR.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }
}

/// The LC-3 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    gpr: [u16; NUM_REGS],

    /// Program counter
    pub pc: u16,

    /// Condition flag, set by every register-defining instruction
    pub cond: Condition,
}

impl Registers {
    /// Create a register file ready to run: PC at `PC_START`, flag Z.
    pub fn new() -> Self {
        Self {
            gpr: [0; NUM_REGS],
            pc: PC_START,
            cond: Condition::Zero,
        }
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn read(&self, reg: Reg) -> u16 {
        self.gpr[reg.index()]
    }

    #[inline]
    pub fn write(&mut self, reg: Reg, value: u16) {
        self.gpr[reg.index()] = value;
    }

    /// Set the condition flag from the current value of `reg`.
    pub fn update_flags(&mut self, reg: Reg) {
        self.cond = Condition::from_value(self.read(reg));
    }

    /// Write `value` to `reg` and set the condition flag from it.
    pub fn write_and_update(&mut self, reg: Reg, value: u16) {
        self.write(reg, value);
        self.update_flags(reg);
    }

    /// Increment the program counter by 1, wrapping.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_state() {
        let regs = Registers::new();
        assert_eq!(regs.pc, PC_START);
        assert_eq!(regs.cond, Condition::Zero);
        for reg in Reg::ALL {
            assert_eq!(regs.read(reg), 0);
        }
    }

    #[test]
    fn test_update_flags() {
        let mut regs = Registers::new();

        regs.write(Reg::R3, 0);
        regs.update_flags(Reg::R3);
        assert_eq!(regs.cond, Condition::Zero);

        regs.write(Reg::R3, 0x8000);
        regs.update_flags(Reg::R3);
        assert_eq!(regs.cond, Condition::Negative);

        regs.write(Reg::R3, 0x7FFF);
        regs.update_flags(Reg::R3);
        assert_eq!(regs.cond, Condition::Positive);
    }

    #[test]
    fn test_reg_from_bits_masks() {
        assert_eq!(Reg::from_bits(0b101), Reg::R5);
        assert_eq!(Reg::from_bits(0b1111), Reg::R7);
        assert_eq!(Reg::R6.bits(), 6);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.pc = 0xFFFF;

        let old = regs.advance_pc();
        assert_eq!(old, 0xFFFF);
        assert_eq!(regs.pc, 0x0000);
    }

    proptest! {
        #[test]
        fn prop_exactly_one_flag(reg in 0u16..8, value: u16) {
            let reg = Reg::from_bits(reg);
            let mut regs = Registers::new();
            regs.write_and_update(reg, value);

            let bits = regs.cond.bits();
            prop_assert_eq!(bits.count_ones(), 1);

            let expected = if value == 0 {
                Condition::Zero
            } else if value & 0x8000 != 0 {
                Condition::Negative
            } else {
                Condition::Positive
            };
            prop_assert_eq!(regs.cond, expected);
        }
    }
}
