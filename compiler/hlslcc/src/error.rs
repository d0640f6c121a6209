//! Driver-level errors.

use hlslcc_diagnostic::{ErrorCode, SourceError};

/// Why a compilation produced no code.
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum CompileError {
    /// Lexing, parsing or lowering rejected the source.
    #[error("{0}")]
    Source(SourceError),
    /// The shader uses something the Metal target cannot provide.
    #[error("{0}")]
    Restriction(SourceError),
    /// A compiler invariant failed.
    #[error("{0}")]
    Internal(SourceError),
}

impl From<SourceError> for CompileError {
    fn from(error: SourceError) -> Self {
        let code = error.code();
        if code.is_platform_restriction() {
            CompileError::Restriction(error)
        } else if code.is_internal() {
            CompileError::Internal(error)
        } else {
            CompileError::Source(error)
        }
    }
}

impl CompileError {
    pub fn source_error(&self) -> &SourceError {
        match self {
            CompileError::Source(e) | CompileError::Restriction(e) | CompileError::Internal(e) => e,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.source_error().code()
    }

    /// The diagnostic log of the failed compilation, one line per error.
    pub fn log(&self) -> String {
        format!("{self}\n")
    }
}
