//! HLSL lexer.
//!
//! Turns preprocessed HLSL text into a flat [`TokenStream`]. Lexing never
//! fails: characters that start no token are skipped and recorded in
//! [`TokenStream::anomalies`] so the driver can surface them as warnings.
//!
//! # Token classes
//!
//! - Identifiers `[A-Za-z_][A-Za-z0-9_]*`, then resolved against the keyword
//!   and built-in type tables
//! - Unsigned integers (decimal or `0x` hex, optional `u` suffix)
//! - Floats (`1.0`, `.5`, `1e-3`, `2.0f`, `1h`)
//! - Symbols, by longest match through a shared prefix trie
//!
//! # Directives
//!
//! `#line N "file"` sets the attribution of the following line. Every other
//! directive is skipped up to the end of its physical line.

mod cursor;
mod keywords;
mod scanner;
mod symbols;

pub use hlslcc_syntax::{Token, TokenKind, TokenStream};

/// Lex `source`, attributing tokens to `filename` until a `#line` says
/// otherwise.
pub fn lex(source: &str, filename: &str) -> TokenStream {
    let stream = scanner::Scanner::new(source, filename).run();
    tracing::debug!(
        file = filename,
        tokens = stream.tokens.len(),
        anomalies = stream.anomalies.len(),
        "lexed"
    );
    stream
}

#[cfg(test)]
mod tests;
