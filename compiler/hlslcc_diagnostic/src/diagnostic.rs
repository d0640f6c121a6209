use std::fmt;

use hlslcc_syntax::{SourceFiles, SourceLocation};

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic with its source position already resolved to a file name.
///
/// Resolving at creation keeps diagnostics independent of the token stream
/// and name tables, which are gone by the time the log is printed.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    /// File name, empty when the diagnostic has no position.
    pub file: String,
    /// 1-based line; 0 when the diagnostic has no position.
    pub line: u32,
    pub notes: Vec<String>,
}

impl Diagnostic {
    fn new_with_severity(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            file: String::new(),
            line: 0,
            notes: Vec::new(),
        }
    }

    pub fn error(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    pub fn warning(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach a position, resolving its file through `files`.
    pub fn at(mut self, files: &SourceFiles, loc: SourceLocation) -> Self {
        self.file = files.name(loc.file).to_owned();
        self.line = loc.line;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Promote to the error type carried through `Result`.
    pub fn into_error(self) -> SourceError {
        SourceError(Box::new(self))
    }
}

impl fmt::Display for Diagnostic {
    /// `file(line): error E1001: message`, the form shader tooling greps for.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}({}): ", self.file, self.line)?;
        }
        write!(f, "{} {}: {}", self.severity, self.code, self.message)?;
        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }
        Ok(())
    }
}

/// The first fatal error of a compilation.
///
/// Boxed so `Result<T, SourceError>` stays pointer-sized on the error side.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SourceError(Box<Diagnostic>);

impl SourceError {
    pub fn code(&self) -> ErrorCode {
        self.0.code
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn line(&self) -> u32 {
        self.0.line
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.0
    }
}

impl From<Diagnostic> for SourceError {
    fn from(diagnostic: Diagnostic) -> Self {
        diagnostic.into_error()
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for SourceError {}

/// Create an "unexpected token" error.
pub fn unexpected_token(
    files: &SourceFiles,
    loc: SourceLocation,
    expected: &str,
    found: &str,
) -> SourceError {
    Diagnostic::error(ErrorCode::E1001)
        .with_message(format!("expected {expected}, found '{found}'"))
        .at(files, loc)
        .into_error()
}

/// Create an "expected token" error for a specific missing punctuation.
pub fn expected_token(files: &SourceFiles, loc: SourceLocation, token: &str) -> SourceError {
    Diagnostic::error(ErrorCode::E1003)
        .with_message(format!("expected '{token}'"))
        .at(files, loc)
        .into_error()
}

/// Create an "unknown identifier" error.
pub fn unknown_identifier(files: &SourceFiles, loc: SourceLocation, name: &str) -> SourceError {
    Diagnostic::error(ErrorCode::E2001)
        .with_message(format!("undeclared identifier '{name}'"))
        .at(files, loc)
        .into_error()
}

/// Create an internal error with no source position.
pub fn internal_error(code: ErrorCode, message: impl Into<String>) -> SourceError {
    Diagnostic::error(code)
        .with_message(message)
        .with_note("this is a bug in the cross-compiler")
        .into_error()
}

#[cfg(test)]
mod tests {
    use hlslcc_syntax::FileId;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn located_error_format() {
        let files = SourceFiles::new("Shader.usf");
        let err = unexpected_token(
            &files,
            SourceLocation::new(FileId::PRIMARY, 14),
            "';'",
            "}",
        );
        assert_eq!(
            err.to_string(),
            "Shader.usf(14): error E1001: expected ';', found '}'"
        );
        assert_eq!(err.code(), ErrorCode::E1001);
    }

    #[test]
    fn internal_error_has_no_position() {
        let err = internal_error(ErrorCode::E9001, "unprintable rvalue");
        assert_eq!(
            err.to_string(),
            "error E9001: unprintable rvalue\n  = note: this is a bug in the cross-compiler"
        );
    }

    #[test]
    fn warning_display() {
        let files = SourceFiles::new("a.usf");
        let warning = Diagnostic::warning(ErrorCode::W0001)
            .with_message("skipped unrecognized character '@'")
            .at(&files, SourceLocation::new(FileId::PRIMARY, 3));
        assert!(!warning.is_error());
        assert_eq!(
            warning.to_string(),
            "a.usf(3): warning W0001: skipped unrecognized character '@'"
        );
    }
}
