//! Backtracking recursive-descent parser for HLSL.
//!
//! Produces a [`TranslationUnit`] whose nodes live in an `AstArena`.
//!
//! # Strategy
//!
//! Productions are grouped into ordered rule tables (`grammar`). Each rule
//! is tried in turn by [`Parser::try_rules`]; a rule that declines rewinds
//! the cursor to where it started, so alternatives sharing a prefix (a
//! declaration and an expression statement both starting with an
//! identifier) are resolved by ordering alone. There is no memoization;
//! HLSL's ambiguous prefixes are a few tokens long.
//!
//! Identifiers are classified as type names or not through a scope chain
//! that follows `{}` nesting.
//!
//! The first error aborts the parse.

mod cursor;
mod grammar;
mod outcome;
mod scope;

pub use cursor::Cursor;
pub use outcome::{ParseOutcome, ParseResult, Rule, Trigger};

use hlslcc_diagnostic::{Diagnostic, ErrorCode, SourceError};
use hlslcc_syntax::ast::{Expression, Statement, TopLevel, TranslationUnit};
use hlslcc_syntax::{
    AstArena, ExprId, Name, NameTable, SourceFiles, SourceLocation, StmtId, TokenKind,
    TokenStream,
};

use crate::scope::ScopeStack;

/// Parser state.
pub struct Parser<'a> {
    cursor: Cursor<'a>,
    arena: AstArena,
    names: &'a NameTable,
    files: &'a SourceFiles,
    scopes: ScopeStack,
}

impl<'a> Parser<'a> {
    pub fn new(stream: &'a TokenStream) -> Self {
        Parser {
            cursor: Cursor::new(&stream.tokens),
            arena: AstArena::new(),
            names: &stream.names,
            files: &stream.files,
            scopes: ScopeStack::new(),
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.cursor.is_at_end()
    }

    pub fn arena(&self) -> &AstArena {
        &self.arena
    }

    #[inline]
    fn current(&self) -> TokenKind {
        self.cursor.current()
    }

    #[inline]
    fn check(&self, kind: TokenKind) -> bool {
        self.cursor.check(kind)
    }

    #[inline]
    fn eat(&mut self, kind: TokenKind) -> bool {
        self.cursor.eat(kind)
    }

    #[inline]
    fn loc(&self) -> SourceLocation {
        self.cursor.current_loc()
    }

    fn alloc_expr(&mut self, expr: Expression) -> ExprId {
        self.arena.alloc_expr(expr)
    }

    fn alloc_stmt(&mut self, stmt: Statement) -> StmtId {
        self.arena.alloc_stmt(stmt)
    }

    /// Whether `name` is a struct type in the current scope chain.
    pub fn is_type_name(&self, name: Name) -> bool {
        self.scopes.is_type(name)
    }

    // ── Errors ──

    /// Source text of the current token, for messages.
    fn describe_current(&self) -> String {
        match self.current() {
            TokenKind::Identifier(name) => self.names.resolve(name).to_owned(),
            TokenKind::Eof => "end of file".to_owned(),
            other => other.to_string(),
        }
    }

    fn error(&self, code: ErrorCode, message: impl Into<String>) -> SourceError {
        Diagnostic::error(code)
            .with_message(message)
            .at(self.files, self.loc())
            .into_error()
    }

    fn unexpected(&self, expected: &str) -> SourceError {
        hlslcc_diagnostic::unexpected_token(
            self.files,
            self.loc(),
            expected,
            &self.describe_current(),
        )
    }

    /// Consume `kind` or fail with "expected 'kind'".
    fn expect(&mut self, kind: TokenKind) -> Result<(), SourceError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{kind}'")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Name, SourceError> {
        match self.cursor.eat_ident() {
            Some(name) => Ok(name),
            None => Err(self.error(
                ErrorCode::E1004,
                format!("expected {what}, found '{}'", self.describe_current()),
            )),
        }
    }

    // ── Rule dispatch ──

    /// Try `rules` in order.
    ///
    /// For each rule: run its prefix (attributes), check its trigger, run
    /// its body. `Matched` and errors return immediately; `NotMatched`
    /// rewinds the cursor, and the types declared since, to where the
    /// attempt started. When nothing
    /// matches and `required` is set, the error names `category`.
    pub fn try_rules<T>(
        &mut self,
        rules: &[Rule<T>],
        category: &str,
        required: bool,
    ) -> ParseResult<T> {
        for rule in rules {
            let saved = self.cursor.position();
            let declared = self.scopes.mark();
            let attributes = match rule.prefix {
                Some(prefix) => prefix(self)?,
                None => Vec::new(),
            };
            if rule.triggered_by(self.current()) {
                if let ParseOutcome::Matched(value) = (rule.body)(self, attributes)? {
                    return Ok(ParseOutcome::Matched(value));
                }
            }
            self.cursor.set_position(saved);
            self.scopes.rewind(declared);
        }
        if required {
            return Err(self.error(
                ErrorCode::E1010,
                format!("expected {category}, found '{}'", self.describe_current()),
            ));
        }
        Ok(ParseOutcome::NotMatched)
    }

    /// Run `f` inside a fresh scope; the scope is left on every path.
    fn in_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scopes.push();
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn into_unit(self, declarations: Vec<TopLevel>) -> TranslationUnit {
        TranslationUnit {
            arena: self.arena,
            declarations,
            names: self.names.clone(),
            files: self.files.clone(),
        }
    }
}

/// Parse a whole token stream.
pub fn parse(stream: &TokenStream) -> Result<TranslationUnit, SourceError> {
    parse_with(stream, |_, _| {})
}

/// Parse a whole token stream, calling `on_declaration` for each top-level
/// construct as soon as it has been parsed.
pub fn parse_with(
    stream: &TokenStream,
    mut on_declaration: impl FnMut(&TopLevel, &AstArena),
) -> Result<TranslationUnit, SourceError> {
    let mut parser = Parser::new(stream);
    let mut declarations = Vec::new();
    while !parser.is_at_end() {
        let outcome = parser.try_rules(grammar::TOP_LEVEL_RULES, "declaration", true)?;
        if let ParseOutcome::Matched(Some(item)) = outcome {
            on_declaration(&item, &parser.arena);
            declarations.push(item);
        }
    }
    tracing::debug!(
        declarations = declarations.len(),
        exprs = parser.arena.expr_count(),
        stmts = parser.arena.stmt_count(),
        "parsed"
    );
    Ok(parser.into_unit(declarations))
}

#[cfg(test)]
mod tests;
