use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{Display, EnumString};

/// Register operand of an assembler command.
///
/// `r6` doubles as the stack pointer and `r7` as the program counter.
/// `psw` is addressable like a general register and encodes as nibble 8.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive, EnumString, Display,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    Psw,
}

/// Register nibble marking an unused field in the second instruction byte.
pub const REG_UNUSED: u8 = 0xF;

impl Reg {
    pub const SP: Reg = Reg::R6;
    pub const PC: Reg = Reg::R7;

    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<Self>().ok()
    }

    pub fn nibble(self) -> u8 {
        self.into()
    }
}
