use thiserror::Error;

use hyp_arch::object::ObjectError;

/// Linking stops at the first error.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{0} opening failed.")]
    OpenFailed(String),

    #[error("Multiple definitions of {0} symbol.")]
    MultipleDefinitions(String),

    #[error("Unresolved definition of {0} symbol.")]
    UnresolvedExtern(String),

    #[error("Section {0} overlaps with memory reserved for registers.")]
    SectionOverlap(String),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
