//! Token cursor for navigating the token stream.
//!
//! The stream carries no end-of-file token; reading past the last token
//! yields [`TokenKind::Eof`] attributed to the last real token's location.

use hlslcc_syntax::{Name, SourceLocation, Token, TokenKind};

/// Cursor over an immutable token slice.
///
/// Backtracking is `position()` followed later by `set_position()`.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    /// Current position in the token stream.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Roll back (or forward) to a saved position.
    pub fn set_position(&mut self, pos: usize) {
        debug_assert!(
            pos <= self.tokens.len(),
            "cursor position {} out of bounds (max {})",
            pos,
            self.tokens.len()
        );
        self.pos = pos;
    }

    #[inline]
    pub fn current(&self) -> TokenKind {
        self.peek(0)
    }

    /// Kind `offset` tokens ahead of the current one.
    #[inline]
    pub fn peek(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    pub fn current_loc(&self) -> SourceLocation {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.loc)
            .unwrap_or_default()
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Whether the current token is `kind`, comparing payloads too.
    #[inline]
    pub fn check(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    #[inline]
    pub fn check_ident(&self) -> bool {
        matches!(self.current(), TokenKind::Identifier(_))
    }

    /// Consume and return the current token kind.
    pub fn advance(&mut self) -> TokenKind {
        let kind = self.current();
        if !self.is_at_end() {
            self.pos += 1;
        }
        kind
    }

    /// Consume the current token if it is `kind`.
    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume an identifier and return its name.
    pub fn eat_ident(&mut self) -> Option<Name> {
        match self.current() {
            TokenKind::Identifier(name) => {
                self.pos += 1;
                Some(name)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use hlslcc_syntax::{FileId, NameTable};

    use super::*;

    fn token(kind: TokenKind, line: u32) -> Token {
        Token {
            kind,
            loc: SourceLocation::new(FileId::PRIMARY, line),
        }
    }

    #[test]
    fn eof_past_end_keeps_last_location() {
        let tokens = [token(TokenKind::Semicolon, 3)];
        let mut cursor = Cursor::new(&tokens);
        assert!(cursor.eat(TokenKind::Semicolon));
        assert!(cursor.is_at_end());
        assert_eq!(cursor.current(), TokenKind::Eof);
        assert_eq!(cursor.current_loc().line, 3);
        assert_eq!(cursor.advance(), TokenKind::Eof);
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn save_and_restore() {
        let mut names = NameTable::new();
        let a = names.intern("a");
        let tokens = [
            token(TokenKind::Identifier(a), 1),
            token(TokenKind::Equal, 1),
        ];
        let mut cursor = Cursor::new(&tokens);
        let saved = cursor.position();
        assert_eq!(cursor.eat_ident(), Some(a));
        assert!(cursor.check(TokenKind::Equal));
        cursor.set_position(saved);
        assert!(cursor.check_ident());
    }
}
