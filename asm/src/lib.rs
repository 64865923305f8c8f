//! Two-pass assembler for the HYP-16 architecture.
//!
//! One traversal performs symbol discovery and byte emission together;
//! references to symbols that are not yet in the table become forward
//! references and are resolved by a terminal backpatching phase.

pub mod assembler;
pub mod cleaner;
pub mod dump;
pub mod error;
pub mod parser;

pub use assembler::Assembler;
pub use error::AsmError;

use hyp_arch::object::ObjectFile;

/// Assembles a complete source text, returning the relocatable object
/// or every recorded diagnostic as `(source line, error)` pairs.
pub fn assemble_source(source: &str) -> Result<ObjectFile, Vec<(usize, AsmError)>> {
    let lines = cleaner::clean_source(source);
    let mut assembler = Assembler::new();
    if assembler.run_pass(&lines) {
        assembler.backpatch();
    }
    if assembler.has_errors() {
        Err(assembler.into_errors())
    } else {
        Ok(assembler.into_object())
    }
}
