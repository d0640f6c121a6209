//! Expressions.
//!
//! Binary operators use precedence climbing; everything above them
//! (assignment, conditional, sequence) and below them (unary, postfix,
//! primary) is plain recursive descent.
//!
//! | Level | Operators |
//! |-------|-----------|
//! | 1 | `\|\|` |
//! | 2 | `&&` |
//! | 3 | `\|` |
//! | 4 | `^` |
//! | 5 | `&` |
//! | 6 | `==` `!=` |
//! | 7 | `<` `>` `<=` `>=` |
//! | 8 | `<<` `>>` |
//! | 9 | `+` `-` |
//! | 10 | `*` `/` `%` |

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_stack::ensure_sufficient_stack;
use hlslcc_syntax::ast::{Expression, Literal, Operator, TypeName, TypeSpecifier};
use hlslcc_syntax::{ExprId, TokenKind};

use crate::outcome::ParseOutcome;
use crate::Parser;

fn binary_operator(kind: TokenKind) -> Option<(Operator, u8)> {
    Some(match kind {
        TokenKind::OrOr => (Operator::LogicOr, 1),
        TokenKind::AndAnd => (Operator::LogicAnd, 2),
        TokenKind::Or => (Operator::BitOr, 3),
        TokenKind::Xor => (Operator::BitXor, 4),
        TokenKind::And => (Operator::BitAnd, 5),
        TokenKind::EqualEqual => (Operator::Equal, 6),
        TokenKind::NotEqual => (Operator::NotEqual, 6),
        TokenKind::Lower => (Operator::Less, 7),
        TokenKind::Greater => (Operator::Greater, 7),
        TokenKind::LowerEqual => (Operator::LessEqual, 7),
        TokenKind::GreaterEqual => (Operator::GreaterEqual, 7),
        TokenKind::LowerLower => (Operator::LeftShift, 8),
        TokenKind::GreaterGreater => (Operator::RightShift, 8),
        TokenKind::Plus => (Operator::Add, 9),
        TokenKind::Minus => (Operator::Sub, 9),
        TokenKind::Times => (Operator::Mul, 10),
        TokenKind::Div => (Operator::Div, 10),
        TokenKind::Mod => (Operator::Mod, 10),
        _ => return None,
    })
}

fn assignment_operator(kind: TokenKind) -> Option<Operator> {
    Some(match kind {
        TokenKind::Equal => Operator::Assign,
        TokenKind::PlusEqual => Operator::AddAssign,
        TokenKind::MinusEqual => Operator::SubAssign,
        TokenKind::TimesEqual => Operator::MulAssign,
        TokenKind::DivEqual => Operator::DivAssign,
        TokenKind::ModEqual => Operator::ModAssign,
        TokenKind::LSAssign => Operator::LeftShiftAssign,
        TokenKind::RSAssign => Operator::RightShiftAssign,
        TokenKind::AndEqual => Operator::AndAssign,
        TokenKind::XorEqual => Operator::XorAssign,
        TokenKind::OrEqual => Operator::OrAssign,
        _ => return None,
    })
}

fn prefix_operator(kind: TokenKind) -> Option<Operator> {
    Some(match kind {
        TokenKind::Plus => Operator::Plus,
        TokenKind::Minus => Operator::Neg,
        TokenKind::Not => Operator::LogicNot,
        TokenKind::Neg => Operator::BitNot,
        TokenKind::PlusPlus => Operator::PreInc,
        TokenKind::MinusMinus => Operator::PreDec,
        _ => return None,
    })
}

impl Parser<'_> {
    /// Full expression, including the comma operator.
    pub(crate) fn parse_expression(&mut self) -> Result<ExprId, SourceError> {
        let first = self.parse_assignment_expression()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let loc = self.loc();
        let mut elements = vec![first];
        while self.eat(TokenKind::Comma) {
            elements.push(self.parse_assignment_expression()?);
        }
        let mut sequence = Expression::initializer_list(elements, loc);
        sequence.op = Operator::Sequence;
        Ok(self.alloc_expr(sequence))
    }

    /// Assignment (right associative) or anything tighter.
    pub(crate) fn parse_assignment_expression(&mut self) -> Result<ExprId, SourceError> {
        ensure_sufficient_stack(|| {
            let lhs = self.parse_conditional()?;
            let Some(op) = assignment_operator(self.current()) else {
                return Ok(lhs);
            };
            let loc = self.loc();
            self.cursor.advance();
            let rhs = self.parse_assignment_expression()?;
            Ok(self.alloc_expr(Expression::binary(op, lhs, rhs, loc)))
        })
    }

    fn parse_conditional(&mut self) -> Result<ExprId, SourceError> {
        let condition = self.parse_binary(1)?;
        if !self.check(TokenKind::Question) {
            return Ok(condition);
        }
        let loc = self.loc();
        self.cursor.advance();
        let then = self.parse_assignment_expression()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_assignment_expression()?;
        Ok(self.alloc_expr(Expression::conditional(condition, then, otherwise, loc)))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<ExprId, SourceError> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, precedence)) = binary_operator(self.current()) {
            if precedence < min_precedence {
                break;
            }
            let loc = self.loc();
            self.cursor.advance();
            let rhs = self.parse_binary(precedence + 1)?;
            lhs = self.alloc_expr(Expression::binary(op, lhs, rhs, loc));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ExprId, SourceError> {
        ensure_sufficient_stack(|| {
            let loc = self.loc();
            if let Some(op) = prefix_operator(self.current()) {
                self.cursor.advance();
                let operand = self.parse_unary()?;
                return Ok(self.alloc_expr(Expression::unary(op, operand, loc)));
            }
            if self.check(TokenKind::LeftParenthesis) {
                if let Some(cast) = self.try_parse_cast()? {
                    return Ok(cast);
                }
            }
            self.parse_postfix()
        })
    }

    /// `(type) unary`. Rewinds and returns `None` if the parenthesis does
    /// not hold exactly a type.
    fn try_parse_cast(&mut self) -> Result<Option<ExprId>, SourceError> {
        let saved = self.position();
        let loc = self.loc();
        self.cursor.advance();
        if !self.at_type_start() || self.check(TokenKind::Struct) {
            self.cursor.set_position(saved);
            return Ok(None);
        }
        let ty = match self.parse_type_specifier(false)? {
            ParseOutcome::Matched(ty) if self.check(TokenKind::RightParenthesis) => ty,
            _ => {
                self.cursor.set_position(saved);
                return Ok(None);
            }
        };
        self.cursor.advance();
        let operand = self.parse_unary()?;
        Ok(Some(self.alloc_expr(Expression::cast(ty, operand, loc))))
    }

    fn parse_postfix(&mut self) -> Result<ExprId, SourceError> {
        let mut expr = self.parse_primary()?;
        loop {
            let loc = self.loc();
            match self.current() {
                TokenKind::Dot => {
                    self.cursor.advance();
                    let field = self.expect_ident("field or swizzle")?;
                    expr = self.alloc_expr(Expression::field(expr, field, loc));
                }
                TokenKind::LeftSquareBracket => {
                    self.cursor.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RightSquareBracket)?;
                    expr = self.alloc_expr(Expression::binary(Operator::ArrayIndex, expr, index, loc));
                }
                TokenKind::LeftParenthesis
                    if matches!(
                        self.arena[expr].op,
                        Operator::Identifier | Operator::FieldSelection
                    ) =>
                {
                    let arguments = self.parse_call_arguments()?;
                    expr = self.alloc_expr(Expression::call(expr, arguments, loc));
                }
                TokenKind::PlusPlus => {
                    self.cursor.advance();
                    expr = self.alloc_expr(Expression::unary(Operator::PostInc, expr, loc));
                }
                TokenKind::MinusMinus => {
                    self.cursor.advance();
                    expr = self.alloc_expr(Expression::unary(Operator::PostDec, expr, loc));
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `( [arg {, arg}] )`
    fn parse_call_arguments(&mut self) -> Result<Vec<ExprId>, SourceError> {
        self.expect(TokenKind::LeftParenthesis)?;
        let mut arguments = Vec::new();
        if self.eat(TokenKind::RightParenthesis) {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.parse_assignment_expression()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParenthesis)?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Result<ExprId, SourceError> {
        let loc = self.loc();
        let expr = match self.current() {
            TokenKind::Identifier(name) => Expression::identifier(name, loc),
            TokenKind::UnsignedIntegerConstant(value) => Expression::literal(Literal::Uint(value), loc),
            TokenKind::FloatConstant(value) => Expression::literal(Literal::Float(value), loc),
            TokenKind::True => Expression::literal(Literal::Bool(true), loc),
            TokenKind::False => Expression::literal(Literal::Bool(false), loc),
            TokenKind::LeftParenthesis => {
                self.cursor.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParenthesis)?;
                return Ok(inner);
            }
            TokenKind::Numeric(ty) => {
                self.cursor.advance();
                let arguments = self.parse_call_arguments()?;
                let spec = TypeSpecifier::new(TypeName::Numeric(ty), loc);
                return Ok(self.alloc_expr(Expression::constructor(spec, arguments, loc)));
            }
            _ => {
                return Err(self.error(
                    ErrorCode::E1002,
                    format!("expected expression, found '{}'", self.describe_current()),
                ))
            }
        };
        self.cursor.advance();
        Ok(self.alloc_expr(expr))
    }
}
