//! Emulator for linked HYP-16 program images: a 64 KiB byte-addressable
//! memory, eight 16-bit general registers plus `psw`, and a synchronous
//! fetch-decode-execute loop.

pub mod error;
pub mod machine;

pub use error::EmuError;
pub use machine::Machine;
