//! Diagnostics for the cross-compiler.
//!
//! Every stage reports at most one fatal problem: the first error aborts the
//! compilation. That error travels up as a [`SourceError`] through `?` and
//! ends up as the diagnostic log handed back to the caller.
//!
//! Warnings (skipped characters in the lexer) are plain [`Diagnostic`]
//! values collected alongside a successful result.

mod diagnostic;
mod error_code;

pub use diagnostic::{
    expected_token, internal_error, unexpected_token, unknown_identifier, Diagnostic, Severity,
    SourceError,
};
pub use error_code::ErrorCode;
