use color_print::cprintln;
use thiserror::Error;

/// Everything the assembler can object to. Each error is recorded
/// against the original source line and reported after the pass; any
/// recorded error suppresses artifact emission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("Symbol as label has to be defined in a section.")]
    LabelOutsideSection,

    #[error("Symbol is previously defined.")]
    Redefinition,

    #[error("Symbol with the same name is already imported.")]
    ImportConflict,

    #[error("Symbol with the same name has an external definition.")]
    ExternConflict,

    #[error("Symbol is previously defined locally.")]
    ImportOfLocal,

    #[error("Directive {0} is not specified within a section.")]
    DirectiveOutsideSection(&'static str),

    #[error("Command is not specified within a section. {0}")]
    CommandOutsideSection(String),

    #[error("The addressing mode is not supported. {0}")]
    AddressingUnsupported(String),

    #[error("The assembler command is not supported. {0}")]
    UnknownCommand(String),

    #[error("Symbol {0} is not in the symbol table.")]
    UnresolvedSymbol(String),
}

/// Print diagnostics the way the tools report them: the error text plus
/// the input location it was recorded against.
pub fn print_diags(path: &str, errors: &[(usize, AsmError)]) {
    cprintln!("<red,bold>Assembling & backpatching errors:</>");
    for (line, error) in errors {
        cprintln!("<red,bold>error</>: {}", error);
        cprintln!("  <blue>--></> {}:{}", path, line);
    }
}
