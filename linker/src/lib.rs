//! Linker for HYP-16 relocatable objects: aggregates same-named
//! sections across input modules in command-line order, assigns base
//! addresses, resolves externs and applies relocation records, then
//! emits an executable program image.

pub mod error;
pub mod linker;

pub use error::LinkError;
pub use linker::Linker;
