//! The general declaration routine.
//!
//! Globals, locals, parameters, struct members and cbuffer members share
//! one production, parametrized by which qualifiers and declarator
//! features the context permits.

use bitflags::bitflags;
use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_syntax::ast::{
    Declaration, DeclaratorList, Expression, FullySpecifiedType, TypeName, TypeQualifier,
};
use hlslcc_syntax::{ExprId, Name, TokenKind};

use crate::outcome::{ParseOutcome, ParseResult};
use crate::Parser;

bitflags! {
    /// What a declaration context accepts.
    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    pub(crate) struct DeclFlags: u32 {
        const STATIC = 1 << 0;
        const CONST = 1 << 1;
        const UNIFORM = 1 << 2;
        const IN_OUT = 1 << 3;
        const MATRIX_ORDER = 1 << 4;
        const INTERPOLATION = 1 << 5;
        const SHARED = 1 << 6;
        const PRECISE = 1 << 7;
        const SEMANTIC = 1 << 8;
        const INITIALIZER = 1 << 9;
        const MULTIPLE = 1 << 10;
        const UNSIZED_ARRAY = 1 << 11;
        const STRUCT_DEFINITION = 1 << 12;

        const GLOBAL = Self::STATIC.bits() | Self::CONST.bits() | Self::UNIFORM.bits()
            | Self::MATRIX_ORDER.bits() | Self::SHARED.bits() | Self::PRECISE.bits()
            | Self::SEMANTIC.bits() | Self::INITIALIZER.bits() | Self::MULTIPLE.bits()
            | Self::UNSIZED_ARRAY.bits() | Self::STRUCT_DEFINITION.bits();
        const LOCAL = Self::STATIC.bits() | Self::CONST.bits() | Self::MATRIX_ORDER.bits()
            | Self::PRECISE.bits() | Self::INITIALIZER.bits() | Self::MULTIPLE.bits()
            | Self::STRUCT_DEFINITION.bits();
        const STRUCT_MEMBER = Self::CONST.bits() | Self::MATRIX_ORDER.bits()
            | Self::INTERPOLATION.bits() | Self::PRECISE.bits() | Self::SEMANTIC.bits()
            | Self::MULTIPLE.bits();
        const CBUFFER_MEMBER = Self::CONST.bits() | Self::MATRIX_ORDER.bits()
            | Self::PRECISE.bits() | Self::SEMANTIC.bits() | Self::MULTIPLE.bits()
            | Self::STRUCT_DEFINITION.bits();
        const PARAMETER = Self::CONST.bits() | Self::UNIFORM.bits() | Self::IN_OUT.bits()
            | Self::MATRIX_ORDER.bits() | Self::INTERPOLATION.bits() | Self::PRECISE.bits()
            | Self::SEMANTIC.bits() | Self::INITIALIZER.bits();
    }
}

/// The qualifier a keyword sets and the context flag that permits it.
fn qualifier_of(kind: TokenKind) -> Option<(TypeQualifier, DeclFlags)> {
    Some(match kind {
        TokenKind::Const => (TypeQualifier::CONST, DeclFlags::CONST),
        TokenKind::Static => (TypeQualifier::STATIC, DeclFlags::STATIC),
        TokenKind::Uniform => (TypeQualifier::UNIFORM, DeclFlags::UNIFORM),
        TokenKind::In => (TypeQualifier::IN, DeclFlags::IN_OUT),
        TokenKind::Out => (TypeQualifier::OUT, DeclFlags::IN_OUT),
        TokenKind::InOut => (TypeQualifier::INOUT, DeclFlags::IN_OUT),
        TokenKind::RowMajor => (TypeQualifier::ROW_MAJOR, DeclFlags::MATRIX_ORDER),
        TokenKind::ColumnMajor => (TypeQualifier::COLUMN_MAJOR, DeclFlags::MATRIX_ORDER),
        TokenKind::NoInterpolation => (TypeQualifier::NO_INTERPOLATION, DeclFlags::INTERPOLATION),
        TokenKind::Linear => (TypeQualifier::LINEAR, DeclFlags::INTERPOLATION),
        TokenKind::Centroid => (TypeQualifier::CENTROID, DeclFlags::INTERPOLATION),
        TokenKind::NoPerspective => (TypeQualifier::NO_PERSPECTIVE, DeclFlags::INTERPOLATION),
        TokenKind::Sample => (TypeQualifier::SAMPLE, DeclFlags::INTERPOLATION),
        TokenKind::GroupShared => (TypeQualifier::SHARED, DeclFlags::SHARED),
        TokenKind::Precise => (TypeQualifier::PRECISE, DeclFlags::PRECISE),
        _ => return None,
    })
}

impl Parser<'_> {
    /// Parse `qualifiers type declarator {, declarator}`.
    ///
    /// Declines without consuming when no type follows the (empty)
    /// qualifier list, or when the type is not followed by a name; either
    /// way the caller may try an expression next. The trailing `;` is left
    /// to the caller. A bare struct definition yields an empty list.
    pub(crate) fn parse_general_declaration(
        &mut self,
        flags: DeclFlags,
    ) -> ParseResult<DeclaratorList> {
        let loc = self.loc();
        let qualifier = self.parse_qualifiers(flags)?;

        let specifier = match self.parse_type_specifier(flags.contains(DeclFlags::STRUCT_DEFINITION))? {
            ParseOutcome::Matched(specifier) => specifier,
            ParseOutcome::NotMatched if qualifier.is_empty() => return Ok(ParseOutcome::NotMatched),
            ParseOutcome::NotMatched => {
                return Err(self.error(
                    ErrorCode::E1005,
                    format!("expected type after qualifiers, found '{}'", self.describe_current()),
                ))
            }
        };
        let defines_struct = matches!(specifier.name, TypeName::Struct(_));
        let ty = FullySpecifiedType {
            qualifier,
            specifier,
        };

        if defines_struct && self.check(TokenKind::Semicolon) {
            return Ok(ParseOutcome::Matched(DeclaratorList {
                ty,
                declarations: Vec::new(),
                loc,
            }));
        }

        let mut declarations = Vec::new();
        loop {
            let decl_loc = self.loc();
            let Some(identifier) = self.cursor.eat_ident() else {
                if declarations.is_empty() && qualifier.is_empty() && !defines_struct {
                    return Ok(ParseOutcome::NotMatched);
                }
                return Err(self.error(
                    ErrorCode::E1004,
                    format!("expected identifier, found '{}'", self.describe_current()),
                ));
            };
            let mut declaration = Declaration::new(identifier, decl_loc);
            declaration.array_dims = self.parse_array_dims(flags.contains(DeclFlags::UNSIZED_ARRAY))?;
            if flags.contains(DeclFlags::SEMANTIC) {
                self.parse_semantics(&mut declaration)?;
            }
            if self.check(TokenKind::Equal) {
                if !flags.contains(DeclFlags::INITIALIZER) {
                    return Err(self.error(ErrorCode::E1012, "initializer not allowed here"));
                }
                self.cursor.advance();
                declaration.initializer = Some(self.parse_initializer()?);
            }
            declarations.push(declaration);

            if !(flags.contains(DeclFlags::MULTIPLE) && self.eat(TokenKind::Comma)) {
                break;
            }
        }

        Ok(ParseOutcome::Matched(DeclaratorList {
            ty,
            declarations,
            loc,
        }))
    }

    fn parse_qualifiers(&mut self, flags: DeclFlags) -> Result<TypeQualifier, SourceError> {
        let mut qualifier = TypeQualifier::empty();
        let mut saw_inout = false;
        while let Some((flag, needs)) = qualifier_of(self.current()) {
            let kind = self.current();
            if !flags.contains(needs) {
                return Err(self.error(ErrorCode::E1012, format!("'{kind}' is not allowed here")));
            }
            let conflict = match kind {
                TokenKind::InOut if saw_inout => Some(ErrorCode::E1006),
                TokenKind::InOut if qualifier.intersects(TypeQualifier::INOUT) => {
                    Some(ErrorCode::E1007)
                }
                TokenKind::In | TokenKind::Out if saw_inout => Some(ErrorCode::E1007),
                _ if qualifier.contains(flag) => Some(ErrorCode::E1006),
                _ => None,
            };
            match conflict {
                Some(ErrorCode::E1007) => {
                    return Err(self.error(
                        ErrorCode::E1007,
                        "'inout' cannot be combined with 'in' or 'out'",
                    ))
                }
                Some(code) => {
                    return Err(self.error(code, format!("duplicate qualifier '{kind}'")));
                }
                None => {}
            }
            saw_inout |= kind == TokenKind::InOut;
            qualifier |= flag;
            self.cursor.advance();
        }
        Ok(qualifier)
    }

    /// `[N]` repeated. `[]` only where unsized arrays are allowed.
    fn parse_array_dims(&mut self, allow_unsized: bool) -> Result<Vec<Option<ExprId>>, SourceError> {
        let mut dims = Vec::new();
        while self.check(TokenKind::LeftSquareBracket) {
            self.cursor.advance();
            if self.eat(TokenKind::RightSquareBracket) {
                if !allow_unsized {
                    return Err(self.error(ErrorCode::E1009, "array dimension required"));
                }
                dims.push(None);
                continue;
            }
            let dim = self.parse_assignment_expression()?;
            self.expect(TokenKind::RightSquareBracket)?;
            dims.push(Some(dim));
        }
        Ok(dims)
    }

    /// `: SEMANTIC`, `: register(x)` and `: packoffset(...)`, in any order.
    fn parse_semantics(&mut self, declaration: &mut Declaration) -> Result<(), SourceError> {
        while self.eat(TokenKind::Colon) {
            match self.current() {
                TokenKind::Register => {
                    self.cursor.advance();
                    declaration.register = Some(self.parse_register()?);
                }
                TokenKind::PackOffset => {
                    self.cursor.advance();
                    self.expect(TokenKind::LeftParenthesis)?;
                    while !self.eat(TokenKind::RightParenthesis) {
                        if self.is_at_end() {
                            return Err(self.unexpected("')'"));
                        }
                        self.cursor.advance();
                    }
                }
                TokenKind::Identifier(name) => {
                    self.cursor.advance();
                    declaration.semantic = Some(name);
                }
                _ => return Err(self.unexpected("semantic")),
            }
        }
        Ok(())
    }

    /// The body of `register(b0)` or `register(t1, space0)`, after the
    /// keyword. Only the first argument is kept.
    pub(crate) fn parse_register(&mut self) -> Result<Name, SourceError> {
        self.expect(TokenKind::LeftParenthesis)?;
        let register = self.expect_ident("register name")?;
        if self.eat(TokenKind::Comma) {
            self.expect_ident("register space")?;
        }
        self.expect(TokenKind::RightParenthesis)?;
        Ok(register)
    }

    /// `= expr` or `= { a, { b, c }, }`, after the `=`.
    fn parse_initializer(&mut self) -> Result<ExprId, SourceError> {
        if !self.check(TokenKind::LeftBrace) {
            return self.parse_assignment_expression();
        }
        let loc = self.loc();
        self.cursor.advance();
        let mut elements = Vec::new();
        while !self.eat(TokenKind::RightBrace) {
            elements.push(self.parse_initializer()?);
            if !self.eat(TokenKind::Comma) {
                self.expect(TokenKind::RightBrace)?;
                break;
            }
        }
        Ok(self.alloc_expr(Expression::initializer_list(elements, loc)))
    }
}
