//! Instruction decoder for the LC-3.
//!
//! Every instruction is one 16-bit word. The top 4 bits select the opcode;
//! the remaining 12 bits hold register fields, mode bits and PC-relative
//! or base-relative offsets whose layout depends on the opcode.

use crate::cpu::registers::Reg;
use thiserror::Error;

/// Sign-extend the low `bit_count` bits of `value` to 16 bits.
///
/// The low `bit_count` bits are read as a two's-complement quantity;
/// any bits above them in `value` are ignored. A width of 0, or of 16 and
/// above, returns `value` unchanged.
pub fn sign_extend(value: u16, bit_count: u32) -> u16 {
    if bit_count == 0 || bit_count >= 16 {
        return value;
    }
    let shift = 16 - bit_count;
    (((value << shift) as i16) >> shift) as u16
}

/// The 16 opcode values, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Br = 0,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    /// Return from interrupt; unused without privilege levels
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    /// Reserved
    Res,
    Lea,
    Trap,
}

impl Opcode {
    /// Extract the opcode from bits [15:12] of an instruction word.
    pub fn from_word(word: u16) -> Self {
        match word >> 12 {
            0x0 => Opcode::Br,
            0x1 => Opcode::Add,
            0x2 => Opcode::Ld,
            0x3 => Opcode::St,
            0x4 => Opcode::Jsr,
            0x5 => Opcode::And,
            0x6 => Opcode::Ldr,
            0x7 => Opcode::Str,
            0x8 => Opcode::Rti,
            0x9 => Opcode::Not,
            0xA => Opcode::Ldi,
            0xB => Opcode::Sti,
            0xC => Opcode::Jmp,
            0xD => Opcode::Res,
            0xE => Opcode::Lea,
            _ => Opcode::Trap,
        }
    }

    #[inline]
    fn bits(self) -> u16 {
        (self as u16) << 12
    }
}

/// Second source operand of ADD and AND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Register mode (bit 5 clear)
    Reg(Reg),
    /// Immediate mode (bit 5 set), already sign-extended from 5 bits
    Imm(u16),
}

/// Decoded LC-3 instruction.
///
/// All offsets and immediates are stored sign-extended to 16 bits and are
/// applied with wrapping addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    // ==================== Operate ====================

    /// DR := SR1 + SR2/imm5
    Add { dr: Reg, sr1: Reg, src2: Operand },

    /// DR := SR1 & SR2/imm5
    And { dr: Reg, sr1: Reg, src2: Operand },

    /// DR := !SR
    Not { dr: Reg, sr: Reg },

    // ==================== Control ====================

    /// If `mask & COND != 0` then PC := PC + offset9
    Br { mask: u16, offset: u16 },

    /// PC := BaseR (RET when BaseR is R7)
    Jmp { base: Reg },

    /// R7 := PC; PC := PC + offset11
    Jsr { offset: u16 },

    /// R7 := PC; PC := BaseR
    Jsrr { base: Reg },

    /// R7 := PC; run the service routine for `vector`
    Trap { vector: u8 },

    // ==================== Data movement ====================

    /// DR := mem[PC + offset9]
    Ld { dr: Reg, offset: u16 },

    /// DR := mem[mem[PC + offset9]]
    Ldi { dr: Reg, offset: u16 },

    /// DR := mem[BaseR + offset6]
    Ldr { dr: Reg, base: Reg, offset: u16 },

    /// DR := PC + offset9
    Lea { dr: Reg, offset: u16 },

    /// mem[PC + offset9] := SR
    St { sr: Reg, offset: u16 },

    /// mem[mem[PC + offset9]] := SR
    Sti { sr: Reg, offset: u16 },

    /// mem[BaseR + offset6] := SR
    Str { sr: Reg, base: Reg, offset: u16 },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Add { .. } => Opcode::Add,
            Instruction::And { .. } => Opcode::And,
            Instruction::Not { .. } => Opcode::Not,
            Instruction::Br { .. } => Opcode::Br,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Jsr { .. } | Instruction::Jsrr { .. } => Opcode::Jsr,
            Instruction::Trap { .. } => Opcode::Trap,
            Instruction::Ld { .. } => Opcode::Ld,
            Instruction::Ldi { .. } => Opcode::Ldi,
            Instruction::Ldr { .. } => Opcode::Ldr,
            Instruction::Lea { .. } => Opcode::Lea,
            Instruction::St { .. } => Opcode::St,
            Instruction::Sti { .. } => Opcode::Sti,
            Instruction::Str { .. } => Opcode::Str,
        }
    }
}

// Field extractors. Bit positions are fixed across opcodes.

#[inline]
fn reg_11_9(word: u16) -> Reg {
    Reg::from_bits(word >> 9)
}

#[inline]
fn reg_8_6(word: u16) -> Reg {
    Reg::from_bits(word >> 6)
}

#[inline]
fn reg_2_0(word: u16) -> Reg {
    Reg::from_bits(word)
}

#[inline]
fn offset(word: u16, bits: u32) -> u16 {
    sign_extend(word & ((1 << bits) - 1), bits)
}

fn operand(word: u16) -> Operand {
    if (word >> 5) & 0x1 != 0 {
        Operand::Imm(offset(word, 5))
    } else {
        Operand::Reg(reg_2_0(word))
    }
}

/// Decode one instruction word.
///
/// RTI and the reserved opcode have no meaning on this machine and are
/// rejected.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let opcode = Opcode::from_word(word);

    let instruction = match opcode {
        Opcode::Add => Instruction::Add { dr: reg_11_9(word), sr1: reg_8_6(word), src2: operand(word) },
        Opcode::And => Instruction::And { dr: reg_11_9(word), sr1: reg_8_6(word), src2: operand(word) },
        Opcode::Not => Instruction::Not { dr: reg_11_9(word), sr: reg_8_6(word) },
        Opcode::Br => Instruction::Br { mask: (word >> 9) & 0x7, offset: offset(word, 9) },
        Opcode::Jmp => Instruction::Jmp { base: reg_8_6(word) },
        Opcode::Jsr => {
            if (word >> 11) & 0x1 != 0 {
                Instruction::Jsr { offset: offset(word, 11) }
            } else {
                Instruction::Jsrr { base: reg_8_6(word) }
            }
        }
        Opcode::Trap => Instruction::Trap { vector: (word & 0xFF) as u8 },
        Opcode::Ld => Instruction::Ld { dr: reg_11_9(word), offset: offset(word, 9) },
        Opcode::Ldi => Instruction::Ldi { dr: reg_11_9(word), offset: offset(word, 9) },
        Opcode::Ldr => Instruction::Ldr { dr: reg_11_9(word), base: reg_8_6(word), offset: offset(word, 6) },
        Opcode::Lea => Instruction::Lea { dr: reg_11_9(word), offset: offset(word, 9) },
        Opcode::St => Instruction::St { sr: reg_11_9(word), offset: offset(word, 9) },
        Opcode::Sti => Instruction::Sti { sr: reg_11_9(word), offset: offset(word, 9) },
        Opcode::Str => Instruction::Str { sr: reg_11_9(word), base: reg_8_6(word), offset: offset(word, 6) },
        Opcode::Rti | Opcode::Res => return Err(DecodeError::Illegal { opcode, word }),
    };

    Ok(instruction)
}

/// Encode an instruction back to its word.
///
/// Offsets are truncated to their field width, so any value produced by
/// `decode` encodes back to the word it came from.
pub fn encode(instr: &Instruction) -> u16 {
    let op = instr.opcode().bits();
    let dr = |r: &Reg| r.bits() << 9;
    let base = |r: &Reg| r.bits() << 6;
    let field = |v: &u16, bits: u32| v & ((1 << bits) - 1);
    let src2 = |s: &Operand| match s {
        Operand::Reg(r) => r.bits(),
        Operand::Imm(v) => 0x20 | field(v, 5),
    };

    match instr {
        Instruction::Add { dr: d, sr1, src2: s } => op | dr(d) | base(sr1) | src2(s),
        Instruction::And { dr: d, sr1, src2: s } => op | dr(d) | base(sr1) | src2(s),
        Instruction::Not { dr: d, sr } => op | dr(d) | base(sr) | 0x3F,
        Instruction::Br { mask, offset } => op | ((mask & 0x7) << 9) | field(offset, 9),
        Instruction::Jmp { base: b } => op | base(b),
        Instruction::Jsr { offset } => op | 0x0800 | field(offset, 11),
        Instruction::Jsrr { base: b } => op | base(b),
        Instruction::Trap { vector } => op | *vector as u16,
        Instruction::Ld { dr: d, offset } => op | dr(d) | field(offset, 9),
        Instruction::Ldi { dr: d, offset } => op | dr(d) | field(offset, 9),
        Instruction::Ldr { dr: d, base: b, offset } => op | dr(d) | base(b) | field(offset, 6),
        Instruction::Lea { dr: d, offset } => op | dr(d) | field(offset, 9),
        Instruction::St { sr, offset } => op | dr(sr) | field(offset, 9),
        Instruction::Sti { sr, offset } => op | dr(sr) | field(offset, 9),
        Instruction::Str { sr, base: b, offset } => op | dr(sr) | base(b) | field(offset, 6),
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("illegal opcode {opcode:?} in word {word:#06x}")]
    Illegal { opcode: Opcode, word: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0b11111, 5), 0xFFFF);
        assert_eq!(sign_extend(0b01111, 5), 0x000F);
        assert_eq!(sign_extend(0b10000, 5), 0xFFF0);
        assert_eq!(sign_extend(0x1FF, 9), 0xFFFF);
        assert_eq!(sign_extend(0x100, 9), 0xFF00);
        assert_eq!(sign_extend(0x3FF, 11), 0x03FF);
        assert_eq!(sign_extend(0x8000, 16), 0x8000);
    }

    #[test]
    fn test_sign_extend_degenerate_widths() {
        assert_eq!(sign_extend(0x1234, 0), 0x1234);
        assert_eq!(sign_extend(0xFFFF, 0), 0xFFFF);
        assert_eq!(sign_extend(0x8001, 17), 0x8001);
    }

    #[test]
    fn test_decode_add() {
        // ADD R2, R0, R1
        assert_eq!(
            decode(0x1401).unwrap(),
            Instruction::Add { dr: Reg::R2, sr1: Reg::R0, src2: Operand::Reg(Reg::R1) }
        );
        // ADD R0, R0, #-1
        assert_eq!(
            decode(0x103F).unwrap(),
            Instruction::Add { dr: Reg::R0, sr1: Reg::R0, src2: Operand::Imm(0xFFFF) }
        );
    }

    #[test]
    fn test_decode_control() {
        // BRnzp #-1
        assert_eq!(decode(0x0FFF).unwrap(), Instruction::Br { mask: 0b111, offset: 0xFFFF });
        // RET
        assert_eq!(decode(0xC1C0).unwrap(), Instruction::Jmp { base: Reg::R7 });
        // JSR #0x400 (negative 11-bit offset)
        assert_eq!(decode(0x4C00).unwrap(), Instruction::Jsr { offset: 0xFC00 });
        // JSRR R3
        assert_eq!(decode(0x40C0).unwrap(), Instruction::Jsrr { base: Reg::R3 });
        // HALT
        assert_eq!(decode(0xF025).unwrap(), Instruction::Trap { vector: 0x25 });
    }

    #[test]
    fn test_decode_memory() {
        // LDR R1, R2, #-32
        assert_eq!(
            decode(0x62A0).unwrap(),
            Instruction::Ldr { dr: Reg::R1, base: Reg::R2, offset: 0xFFE0 }
        );
        // STI R4, #5
        assert_eq!(decode(0xB805).unwrap(), Instruction::Sti { sr: Reg::R4, offset: 5 });
        // LEA R0, #0xFF
        assert_eq!(decode(0xE0FF).unwrap(), Instruction::Lea { dr: Reg::R0, offset: 0xFF });
    }

    #[test]
    fn test_decode_illegal() {
        assert_eq!(
            decode(0x8000),
            Err(DecodeError::Illegal { opcode: Opcode::Rti, word: 0x8000 })
        );
        assert_eq!(
            decode(0xDABC),
            Err(DecodeError::Illegal { opcode: Opcode::Res, word: 0xDABC })
        );
    }

    #[test]
    fn test_encode_known_words() {
        assert_eq!(encode(&Instruction::Trap { vector: 0x25 }), 0xF025);
        assert_eq!(encode(&Instruction::Not { dr: Reg::R1, sr: Reg::R2 }), 0x92BF);
        assert_eq!(encode(&Instruction::Br { mask: 0b010, offset: 0xFFFE }), 0x05FE);
    }

    proptest! {
        #[test]
        fn prop_sign_extend_matches_signed_cast(value: u16, bits in 1u32..=16) {
            let low = value & (((1u32 << bits) - 1) as u16);
            let expected = if bits == 16 {
                low as i16 as i32
            } else if low >> (bits - 1) & 1 != 0 {
                low as i32 - (1i32 << bits)
            } else {
                low as i32
            };
            prop_assert_eq!(sign_extend(value, bits) as i16 as i32, expected);
        }

        #[test]
        fn prop_legal_words_reencode(word: u16) {
            if let Ok(instr) = decode(word) {
                // NOT and JMP/JSRR carry don't-care bits; compare after decode.
                prop_assert_eq!(decode(encode(&instr)).unwrap(), instr);
            }
        }
    }
}
