use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;
use thiserror::Error;

use crate::reg::{Reg, REG_UNUSED};

/// Command mnemonic, valued as the full first instruction byte
/// (`[opcode:4 | modifier:4]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, Display)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum Mnemonic {
    Halt = 0x00,
    Int = 0x10,
    Iret = 0x20,
    Call = 0x30,
    Ret = 0x40,
    Jmp = 0x50,
    Jeq = 0x51,
    Jne = 0x52,
    Jgt = 0x53,
    Xchg = 0x60,
    Add = 0x70,
    Sub = 0x71,
    Mul = 0x72,
    Div = 0x73,
    Cmp = 0x74,
    Not = 0x80,
    And = 0x81,
    Or = 0x82,
    Xor = 0x83,
    Test = 0x84,
    Shl = 0x90,
    Shr = 0x91,
    Ldr = 0xA0,
    Str = 0xB0,
}

/// Encoding family of a mnemonic; decides how many bytes follow the
/// first one and which fields they carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// `halt`, `iret`, `ret` — one byte.
    ZeroOp,
    /// `int`, `not` — two bytes, `rSrc` fixed to the unused marker.
    RegOnly,
    /// `xchg` and the arithmetic/bitwise commands — two bytes.
    TwoReg,
    /// `call` and the jump commands — three or five bytes.
    Jump,
    /// `ldr`/`str` (and their `pop`/`push` spellings) — three or five bytes.
    LoadStore,
}

impl Mnemonic {
    pub fn family(self) -> Family {
        use Mnemonic::*;
        match self {
            Halt | Iret | Ret => Family::ZeroOp,
            Int | Not => Family::RegOnly,
            Xchg | Add | Sub | Mul | Div | Cmp | And | Or | Xor | Test | Shl | Shr => {
                Family::TwoReg
            }
            Call | Jmp | Jeq | Jne | Jgt => Family::Jump,
            Ldr | Str => Family::LoadStore,
        }
    }
}

/// Addressing mode nibble of the third instruction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AddrMode {
    Immed = 0,
    RegDir = 1,
    RegInd = 2,
    RegIndDisp = 3,
    MemDir = 4,
    RegDirDisp = 5,
}

impl AddrMode {
    /// Modes that extend the instruction with a 16-bit big-endian payload.
    pub fn has_payload(self) -> bool {
        !matches!(self, AddrMode::RegDir | AddrMode::RegInd)
    }

    /// Modes whose operand evaluation reads `rSrc`.
    pub fn uses_src_reg(self) -> bool {
        matches!(
            self,
            AddrMode::RegDir | AddrMode::RegInd | AddrMode::RegIndDisp | AddrMode::RegDirDisp
        )
    }
}

/// Source-register update nibble of the third instruction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum UpdateMode {
    None = 0,
    PreDec = 1,
    PreInc = 2,
    PostDec = 3,
    PostInc = 4,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Wrong command operation code: 0x{0:02x}.")]
    Opcode(u8),

    #[error("Wrong command specified modificator for operation code: 0x{0:02x}.")]
    Modifier(u8),

    #[error("Wrong command specified addressing mode: {0}.")]
    Addressing(u8),

    #[error("Wrong command specified update type: {0}.")]
    Update(u8),

    #[error("Wrong command specified register indices [rDst = {r_dst}, rSrc = {r_src}].")]
    Register { r_dst: u8, r_src: u8 },
}

/// One decoded (or to-be-encoded) command.
///
/// Fields beyond the family's encoded length hold their zero values:
/// `r_dst`/`r_src` are [REG_UNUSED] for zero-operand commands, `update`
/// is `None` and `mode` is `Immed` for the two-byte forms, and `payload`
/// is 0 whenever the mode carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub r_dst: u8,
    pub r_src: u8,
    pub update: UpdateMode,
    pub mode: AddrMode,
    pub payload: u16,
}

impl Instruction {
    pub fn zero_op(mnemonic: Mnemonic) -> Self {
        Instruction {
            mnemonic,
            r_dst: REG_UNUSED,
            r_src: REG_UNUSED,
            update: UpdateMode::None,
            mode: AddrMode::Immed,
            payload: 0,
        }
    }

    pub fn reg_only(mnemonic: Mnemonic, r_dst: u8) -> Self {
        Instruction {
            r_dst,
            ..Instruction::zero_op(mnemonic)
        }
    }

    pub fn two_reg(mnemonic: Mnemonic, r_dst: u8, r_src: u8) -> Self {
        Instruction {
            r_dst,
            r_src,
            ..Instruction::zero_op(mnemonic)
        }
    }

    pub fn with_operand(
        mnemonic: Mnemonic,
        r_dst: u8,
        r_src: u8,
        update: UpdateMode,
        mode: AddrMode,
        payload: u16,
    ) -> Self {
        Instruction {
            mnemonic,
            r_dst,
            r_src,
            update,
            mode,
            payload: if mode.has_payload() { payload } else { 0 },
        }
    }

    /// `push r` is surface syntax for `str` with pre-decrement on `sp`.
    pub fn push(r: u8) -> Self {
        Instruction::with_operand(
            Mnemonic::Str,
            r,
            Reg::SP.nibble(),
            UpdateMode::PreDec,
            AddrMode::RegInd,
            0,
        )
    }

    /// `pop r` is surface syntax for `ldr` with post-increment on `sp`.
    pub fn pop(r: u8) -> Self {
        Instruction::with_operand(
            Mnemonic::Ldr,
            r,
            Reg::SP.nibble(),
            UpdateMode::PostInc,
            AddrMode::RegInd,
            0,
        )
    }

    /// Encoded length in bytes.
    pub fn size(&self) -> u32 {
        match self.mnemonic.family() {
            Family::ZeroOp => 1,
            Family::RegOnly | Family::TwoReg => 2,
            Family::Jump | Family::LoadStore => {
                if self.mode.has_payload() {
                    5
                } else {
                    3
                }
            }
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.mnemonic.into());
        match self.mnemonic.family() {
            Family::ZeroOp => {}
            Family::RegOnly | Family::TwoReg => {
                out.push(self.r_dst << 4 | self.r_src);
            }
            Family::Jump | Family::LoadStore => {
                out.push(self.r_dst << 4 | self.r_src);
                out.push(u8::from(self.update) << 4 | u8::from(self.mode));
                if self.mode.has_payload() {
                    out.extend_from_slice(&self.payload.to_be_bytes());
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size() as usize);
        self.encode(&mut out);
        out
    }

    /// Decodes one command, pulling bytes from `fetch` exactly as they
    /// are consumed. The emulator hands in a closure that reads the byte
    /// at `pc` and advances `pc`.
    pub fn decode<F: FnMut() -> u8>(mut fetch: F) -> Result<Instruction, DecodeError> {
        let first = fetch();
        let mnemonic = Mnemonic::try_from(first).map_err(|_| {
            // A known opcode nibble with a bad modifier reads differently
            // from a byte that matches no command at all.
            if first >> 4 <= 0xB {
                DecodeError::Modifier(first)
            } else {
                DecodeError::Opcode(first)
            }
        })?;

        let mut inst = Instruction::zero_op(mnemonic);
        match mnemonic.family() {
            Family::ZeroOp => {}
            Family::RegOnly => {
                let byte = fetch();
                inst.r_dst = byte >> 4;
                inst.r_src = byte & 0x0F;
                if inst.r_dst > Reg::Psw.nibble() || inst.r_src != REG_UNUSED {
                    return Err(DecodeError::Register {
                        r_dst: inst.r_dst,
                        r_src: inst.r_src,
                    });
                }
            }
            Family::TwoReg => {
                let byte = fetch();
                inst.r_dst = byte >> 4;
                inst.r_src = byte & 0x0F;
                if inst.r_dst > Reg::Psw.nibble() || inst.r_src > Reg::Psw.nibble() {
                    return Err(DecodeError::Register {
                        r_dst: inst.r_dst,
                        r_src: inst.r_src,
                    });
                }
            }
            Family::Jump | Family::LoadStore => {
                let byte = fetch();
                inst.r_dst = byte >> 4;
                inst.r_src = byte & 0x0F;

                let byte = fetch();
                let update = byte >> 4;
                let mode = byte & 0x0F;
                inst.mode = AddrMode::try_from(mode).map_err(|_| DecodeError::Addressing(mode))?;

                if mnemonic.family() == Family::Jump {
                    // Jump commands never update the source register.
                    if update != u8::from(UpdateMode::None) {
                        return Err(DecodeError::Update(update));
                    }
                } else {
                    if inst.r_dst > Reg::Psw.nibble() {
                        return Err(DecodeError::Register {
                            r_dst: inst.r_dst,
                            r_src: inst.r_src,
                        });
                    }
                    if inst.mode == AddrMode::RegDirDisp
                        || (mnemonic == Mnemonic::Str && inst.mode == AddrMode::Immed)
                    {
                        return Err(DecodeError::Addressing(mode));
                    }
                    // Update nibbles outside the defined codes are inert.
                    inst.update = UpdateMode::try_from(update).unwrap_or(UpdateMode::None);
                }

                if inst.mode.uses_src_reg() && inst.r_src > Reg::Psw.nibble() {
                    return Err(DecodeError::Register {
                        r_dst: inst.r_dst,
                        r_src: inst.r_src,
                    });
                }

                if inst.mode.has_payload() {
                    inst.payload = u16::from_be_bytes([fetch(), fetch()]);
                }
            }
        }
        Ok(inst)
    }

    pub fn decode_bytes(bytes: &[u8]) -> Result<Instruction, DecodeError> {
        let mut it = bytes.iter().copied();
        Instruction::decode(|| it.next().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_roundtrip {
        ($($name:ident: $inst:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let inst: Instruction = $inst;
                    let bytes = inst.to_bytes();
                    assert_eq!(bytes.len() as u32, inst.size());
                    let back = Instruction::decode_bytes(&bytes).unwrap();
                    assert_eq!(inst, back);
                }
            )*
        }
    }

    test_roundtrip! {
        rt_halt: Instruction::zero_op(Mnemonic::Halt),
        rt_iret: Instruction::zero_op(Mnemonic::Iret),
        rt_ret: Instruction::zero_op(Mnemonic::Ret),
        rt_int: Instruction::reg_only(Mnemonic::Int, 3),
        rt_not: Instruction::reg_only(Mnemonic::Not, 8),
        rt_xchg: Instruction::two_reg(Mnemonic::Xchg, 1, 2),
        rt_add: Instruction::two_reg(Mnemonic::Add, 0, 7),
        rt_cmp: Instruction::two_reg(Mnemonic::Cmp, 5, 8),
        rt_shl: Instruction::two_reg(Mnemonic::Shl, 2, 3),
        rt_jmp_immed: Instruction::with_operand(
            Mnemonic::Jmp, 0xF, 0xF, UpdateMode::None, AddrMode::Immed, 0x1234),
        rt_jmp_regdir: Instruction::with_operand(
            Mnemonic::Jmp, 0xF, 3, UpdateMode::None, AddrMode::RegDir, 0),
        rt_call_pcrel: Instruction::with_operand(
            Mnemonic::Call, 0xF, 7, UpdateMode::None, AddrMode::RegDirDisp, 0xFFFE),
        rt_jeq_memdir: Instruction::with_operand(
            Mnemonic::Jeq, 0xF, 0xF, UpdateMode::None, AddrMode::MemDir, 0x0100),
        rt_ldr_immed: Instruction::with_operand(
            Mnemonic::Ldr, 0, 0xF, UpdateMode::None, AddrMode::Immed, 5),
        rt_ldr_reginddisp: Instruction::with_operand(
            Mnemonic::Ldr, 2, 4, UpdateMode::None, AddrMode::RegIndDisp, 0x00FF),
        rt_str_memdir: Instruction::with_operand(
            Mnemonic::Str, 1, 0xF, UpdateMode::None, AddrMode::MemDir, 0x0104),
        rt_push: Instruction::push(0),
        rt_pop: Instruction::pop(8),
    }

    #[test]
    fn push_pop_encoding() {
        // push/pop share the str/ldr opcode with a fixed update on sp.
        assert_eq!(Instruction::push(2).to_bytes(), vec![0xB0, 0x26, 0x12]);
        assert_eq!(Instruction::pop(1).to_bytes(), vec![0xA0, 0x16, 0x42]);
    }

    #[test]
    fn decode_rejects_bad_first_byte() {
        assert_eq!(
            Instruction::decode_bytes(&[0xC0]),
            Err(DecodeError::Opcode(0xC0))
        );
        assert_eq!(
            Instruction::decode_bytes(&[0x01]),
            Err(DecodeError::Modifier(0x01))
        );
        assert_eq!(
            Instruction::decode_bytes(&[0x55]),
            Err(DecodeError::Modifier(0x55))
        );
    }

    #[test]
    fn decode_rejects_bad_registers() {
        // Two-register command with an out-of-range nibble.
        assert!(matches!(
            Instruction::decode_bytes(&[0x70, 0x9F]),
            Err(DecodeError::Register { .. })
        ));
        // int requires the unused marker in rSrc.
        assert!(matches!(
            Instruction::decode_bytes(&[0x10, 0x30]),
            Err(DecodeError::Register { .. })
        ));
    }

    #[test]
    fn decode_rejects_bad_modes() {
        // regdir_disp is a jump-only mode.
        assert_eq!(
            Instruction::decode_bytes(&[0xA0, 0x0F, 0x05]),
            Err(DecodeError::Addressing(5))
        );
        // str may not take an immediate operand.
        assert_eq!(
            Instruction::decode_bytes(&[0xB0, 0x0F, 0x00]),
            Err(DecodeError::Addressing(0))
        );
        // Jumps carry no source-register update.
        assert_eq!(
            Instruction::decode_bytes(&[0x50, 0xFF, 0x10]),
            Err(DecodeError::Update(1))
        );
        assert_eq!(
            Instruction::decode_bytes(&[0x50, 0xFF, 0x06]),
            Err(DecodeError::Addressing(6))
        );
    }

    #[test]
    fn payload_is_big_endian() {
        let inst = Instruction::with_operand(
            Mnemonic::Ldr,
            0,
            0xF,
            UpdateMode::None,
            AddrMode::Immed,
            0x0104,
        );
        assert_eq!(inst.to_bytes(), vec![0xA0, 0x0F, 0x00, 0x01, 0x04]);
    }
}
