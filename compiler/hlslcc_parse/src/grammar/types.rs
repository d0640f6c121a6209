//! Type specifiers.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_syntax::ast::{StructSpecifier, TypeName, TypeSpecifier};
use hlslcc_syntax::TokenKind;

use super::DeclFlags;
use crate::outcome::{ParseOutcome, ParseResult};
use crate::Parser;

impl Parser<'_> {
    /// Whether the current token can begin a type.
    pub(crate) fn at_type_start(&self) -> bool {
        match self.current() {
            TokenKind::Void
            | TokenKind::Numeric(_)
            | TokenKind::Texture(_)
            | TokenKind::Sampler(_)
            | TokenKind::Double
            | TokenKind::Struct => true,
            TokenKind::Identifier(name) => self.is_type_name(name),
            _ => false,
        }
    }

    /// Whether `struct [Name] [: Base] {` starts here.
    pub(crate) fn at_struct_definition(&self) -> bool {
        if !self.check(TokenKind::Struct) {
            return false;
        }
        let mut offset = 1;
        if matches!(self.cursor.peek(offset), TokenKind::Identifier(_)) {
            offset += 1;
        }
        if self.cursor.peek(offset) == TokenKind::Colon {
            offset += 2;
        }
        self.cursor.peek(offset) == TokenKind::LeftBrace
    }

    /// Parse a type. Declines without consuming if the current token does
    /// not begin one.
    pub(crate) fn parse_type_specifier(
        &mut self,
        allow_struct_definition: bool,
    ) -> ParseResult<TypeSpecifier> {
        let loc = self.loc();
        let name = match self.current() {
            TokenKind::Void => TypeName::Void,
            TokenKind::Numeric(ty) => TypeName::Numeric(ty),
            TokenKind::Sampler(kind) => TypeName::Sampler(kind),
            TokenKind::Double => TypeName::Double,
            TokenKind::Texture(kind) => {
                self.cursor.advance();
                let mut spec = TypeSpecifier::new(TypeName::Texture(kind), loc);
                self.parse_template_arguments(&mut spec)?;
                return Ok(ParseOutcome::Matched(spec));
            }
            TokenKind::Struct => {
                let name = self.parse_struct_specifier(allow_struct_definition)?;
                return Ok(ParseOutcome::Matched(TypeSpecifier::new(name, loc)));
            }
            TokenKind::Identifier(name) if self.is_type_name(name) => TypeName::Named(name),
            _ => return Ok(ParseOutcome::NotMatched),
        };
        self.cursor.advance();
        Ok(ParseOutcome::Matched(TypeSpecifier::new(name, loc)))
    }

    /// `<float4>` or `<float4, 8>` after a texture or buffer keyword.
    fn parse_template_arguments(&mut self, spec: &mut TypeSpecifier) -> Result<(), SourceError> {
        if !self.eat(TokenKind::Lower) {
            return Ok(());
        }
        let inner = match self.parse_type_specifier(false)? {
            ParseOutcome::Matched(inner) => inner,
            ParseOutcome::NotMatched => {
                return Err(self.error(
                    ErrorCode::E1005,
                    format!("expected element type, found '{}'", self.describe_current()),
                ))
            }
        };
        spec.inner = Some(Box::new(inner));
        if self.eat(TokenKind::Comma) {
            match self.cursor.advance() {
                TokenKind::UnsignedIntegerConstant(count) => spec.sample_count = Some(count),
                _ => return Err(self.unexpected("sample count")),
            }
        }
        self.expect(TokenKind::Greater)
    }

    /// `struct [Name] [: Base] [{ members }]`.
    ///
    /// A definition declares `Name` as a type in the current scope before
    /// the body is parsed.
    fn parse_struct_specifier(
        &mut self,
        allow_definition: bool,
    ) -> Result<TypeName, SourceError> {
        let loc = self.loc();
        self.cursor.advance();
        let name = self.cursor.eat_ident();
        let parent = if self.eat(TokenKind::Colon) {
            Some(self.expect_ident("base struct name")?)
        } else {
            None
        };

        if !self.check(TokenKind::LeftBrace) {
            return match name {
                Some(name) => Ok(TypeName::Named(name)),
                None => Err(self.unexpected("'{'")),
            };
        }
        if !allow_definition {
            return Err(self.error(
                ErrorCode::E1012,
                "struct definitions are not allowed here",
            ));
        }
        if let Some(name) = name {
            self.scopes.declare_type(name);
        }

        self.cursor.advance();
        let members = self.in_scope(|p| {
            let mut members = Vec::new();
            while !p.eat(TokenKind::RightBrace) {
                if p.is_at_end() {
                    return Err(p.error(ErrorCode::E1003, "unclosed struct body, expected '}'"));
                }
                match p.parse_general_declaration(DeclFlags::STRUCT_MEMBER)? {
                    ParseOutcome::Matched(list) => members.push(list),
                    ParseOutcome::NotMatched => return Err(p.unexpected("struct member")),
                }
                p.expect(TokenKind::Semicolon)?;
            }
            Ok::<_, SourceError>(members)
        })?;

        Ok(TypeName::Struct(Box::new(StructSpecifier {
            name,
            parent,
            members,
            loc,
        })))
    }
}
