use thiserror::Error;

use luna_core::asm::AsmError;
use luna_core::vm::{ExecutionError, FormatError};

/// Any failure on the way from assembly text to returned values.
#[derive(Debug, Error)]
pub enum Error {
    /// Assembly failed; keeps the text so the span can be shown.
    #[error("{error}")]
    Assembly { error: AsmError, text: String },

    #[error("invalid module: {0}")]
    Format(#[from] FormatError),

    #[error("execution failed at {0}")]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn assembly(error: AsmError, text: impl Into<String>) -> Self {
        Error::Assembly {
            error,
            text: text.into(),
        }
    }
}
