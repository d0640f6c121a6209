//! The HLSL scanner.
//!
//! Dispatches on the current byte to a focused method per token class.
//! Whitespace, comments and preprocessor directives produce no tokens;
//! `#line` directives re-anchor the line/file used for attribution.

use hlslcc_syntax::{
    FileId, LexAnomaly, SourceFiles, SourceLocation, Token, TokenKind, TokenStream,
};

use crate::cursor::Cursor;
use crate::{keywords, symbols};

pub(crate) struct Scanner<'a> {
    cursor: Cursor<'a>,
    line: u32,
    file: FileId,
    out: TokenStream,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(source: &'a str, filename: &str) -> Self {
        Scanner {
            cursor: Cursor::new(source),
            line: 1,
            file: FileId::PRIMARY,
            out: TokenStream {
                files: SourceFiles::new(filename),
                ..TokenStream::default()
            },
        }
    }

    pub(crate) fn run(mut self) -> TokenStream {
        while !self.cursor.is_eof() {
            self.next();
        }
        self.out
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.file, self.line)
    }

    fn push(&mut self, kind: TokenKind) {
        let loc = self.loc();
        self.out.tokens.push(Token { kind, loc });
    }

    fn next(&mut self) {
        match self.cursor.current() {
            b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.cursor.advance(),
            b'\n' => {
                self.cursor.advance();
                self.line += 1;
            }
            b'/' if self.cursor.peek() == b'/' => self.cursor.skip_to_newline(),
            b'/' if self.cursor.peek() == b'*' => self.block_comment(),
            b'#' => self.directive(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),
            b'0'..=b'9' => self.number(),
            b'.' if self.cursor.peek().is_ascii_digit() => self.number(),
            b'"' => self.string(),
            _ => self.symbol(),
        }
    }

    /// Skip `/* ... */`. An unterminated comment runs to end of input.
    fn block_comment(&mut self) {
        self.cursor.advance_n(2);
        while !self.cursor.is_eof() {
            match self.cursor.current() {
                b'*' if self.cursor.peek() == b'/' => {
                    self.cursor.advance_n(2);
                    return;
                }
                b'\n' => self.line += 1,
                _ => {}
            }
            self.cursor.advance();
        }
    }

    /// `#line N ["file"]` re-anchors attribution; other directives are
    /// skipped to the end of the physical line.
    fn directive(&mut self) {
        self.cursor.advance();
        self.skip_blanks();
        let start = self.cursor.pos();
        self.cursor.eat_while(|b| b.is_ascii_alphabetic());
        let name = self.cursor.slice_from(start);
        if name == "line" {
            self.line_directive();
        } else {
            tracing::trace!(directive = name, line = self.line, "skipping directive");
        }
        self.cursor.skip_to_newline();
    }

    fn line_directive(&mut self) {
        self.skip_blanks();
        let start = self.cursor.pos();
        self.cursor.eat_while(|b| b.is_ascii_digit());
        let Ok(number) = self.cursor.slice_from(start).parse::<u32>() else {
            return;
        };
        self.skip_blanks();
        if self.cursor.current() == b'"' {
            self.cursor.advance();
            let start = self.cursor.pos();
            self.cursor.eat_while(|b| b != b'"' && b != b'\n');
            let file = self.cursor.slice_from(start);
            self.file = self.out.files.intern(file);
        }
        // The newline that ends the directive advances to `number`.
        self.line = number.saturating_sub(1);
    }

    fn skip_blanks(&mut self) {
        self.cursor.eat_while(|b| b == b' ' || b == b'\t');
    }

    fn identifier(&mut self) {
        let start = self.cursor.pos();
        self.cursor
            .eat_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        let text = self.cursor.slice_from(start);
        let kind = match keywords::lookup(text) {
            Some(kind) => kind,
            None => TokenKind::Identifier(self.out.names.intern(text)),
        };
        self.push(kind);
    }

    /// Unsigned integer or float literal. A sign is never part of it.
    fn number(&mut self) {
        let start = self.cursor.pos();
        if self.cursor.current() == b'0' && matches!(self.cursor.peek(), b'x' | b'X') {
            self.cursor.advance_n(2);
            let digits = self.cursor.pos();
            self.cursor.eat_while(|b| b.is_ascii_hexdigit());
            let value = u32::from_str_radix(self.cursor.slice_from(digits), 16).unwrap_or(u32::MAX);
            self.integer_suffix();
            self.push(TokenKind::UnsignedIntegerConstant(value));
            return;
        }

        self.cursor.eat_while(|b| b.is_ascii_digit());
        let mut is_float = false;
        if self.cursor.current() == b'.' {
            is_float = true;
            self.cursor.advance();
            self.cursor.eat_while(|b| b.is_ascii_digit());
        }
        if self.at_exponent() {
            is_float = true;
            self.cursor.advance();
            if matches!(self.cursor.current(), b'+' | b'-') {
                self.cursor.advance();
            }
            self.cursor.eat_while(|b| b.is_ascii_digit());
        }
        let text = self.cursor.slice_from(start);

        if matches!(self.cursor.current(), b'f' | b'F' | b'h' | b'H') {
            is_float = true;
            self.cursor.advance();
        }

        if is_float {
            let value = text.parse::<f32>().unwrap_or(0.0);
            self.push(TokenKind::FloatConstant(value));
        } else {
            let value = text.parse::<u32>().unwrap_or(u32::MAX);
            self.integer_suffix();
            self.push(TokenKind::UnsignedIntegerConstant(value));
        }
    }

    fn at_exponent(&self) -> bool {
        if !matches!(self.cursor.current(), b'e' | b'E') {
            return false;
        }
        match self.cursor.peek() {
            b'0'..=b'9' => true,
            b'+' | b'-' => self.cursor.peek2().is_ascii_digit(),
            _ => false,
        }
    }

    fn integer_suffix(&mut self) {
        if matches!(self.cursor.current(), b'u' | b'U' | b'l' | b'L') {
            self.cursor.advance();
        }
    }

    /// String literals only occur in directives and attributes the compiler
    /// does not interpret; the whole literal is skipped as one anomaly.
    fn string(&mut self) {
        self.anomaly('"');
        self.cursor.advance();
        self.cursor.eat_while(|b| b != b'"' && b != b'\n');
        if self.cursor.current() == b'"' {
            self.cursor.advance();
        }
    }

    fn symbol(&mut self) {
        match symbols::trie().longest_match(self.cursor.rest()) {
            Some((kind, len)) => {
                self.cursor.advance_n(len);
                self.push(kind);
            }
            None => {
                let c = self.cursor.current_char().unwrap_or('\u{fffd}');
                self.anomaly(c);
                self.cursor.advance_n(c.len_utf8());
            }
        }
    }

    fn anomaly(&mut self, character: char) {
        let loc = self.loc();
        tracing::warn!(
            file = self.out.files.name(loc.file),
            line = loc.line,
            character = %character.escape_default(),
            "skipping unrecognized character"
        );
        self.out.anomalies.push(LexAnomaly { character, loc });
    }
}
