use thiserror::Error;

use hyp_arch::inst::DecodeError;

/// Emulation stops at the first error.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("{0} opening failed.")]
    OpenFailed(String),

    #[error("Program segment overlaps with memory reserved for registers.")]
    SegmentOverlap,

    #[error("Division with zero is undefined.")]
    DivisionByZero,

    #[error("Unrecognised or unsuitable addressing mode: {0}.")]
    UnsuitableAddressing(u8),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
