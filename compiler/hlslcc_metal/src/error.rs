use std::fmt;

use hlslcc_diagnostic::{ErrorCode, SourceError};

/// Failure while printing MSL.
#[derive(Debug, thiserror::Error)]
pub(crate) enum WriteError {
    #[error(transparent)]
    Format(#[from] fmt::Error),
    /// IR the writer has no spelling for.
    #[error("{0}")]
    Unprintable(String),
}

pub(crate) type WriteResult = Result<(), WriteError>;

impl From<WriteError> for SourceError {
    fn from(error: WriteError) -> Self {
        hlslcc_diagnostic::internal_error(ErrorCode::E9001, error.to_string())
    }
}

/// Shorthand for [`WriteError::Unprintable`].
pub(crate) fn unprintable(message: impl Into<String>) -> WriteError {
    WriteError::Unprintable(message.into())
}
