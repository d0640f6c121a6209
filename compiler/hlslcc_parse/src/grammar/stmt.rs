//! Statements.
//!
//! Rules are tried in table order. Keyword-led statements come first; a
//! local declaration is attempted before the expression statement so that
//! `S s;` declares while `s.x = 1;` assigns.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_stack::ensure_sufficient_stack;
use hlslcc_syntax::ast::{
    Attribute, CaseLabel, CaseStatement, Statement, StmtKind, SwitchBody,
};
use hlslcc_syntax::{ExprId, SourceLocation, StmtId, TokenKind};

use super::{parse_attributes, DeclFlags};
use crate::outcome::{matched_or_decline, ParseOutcome, ParseResult, Rule};
use crate::Parser;

pub(crate) const STATEMENT_RULES: &[Rule<StmtId>] = &[
    Rule::on(TokenKind::LeftBrace, compound_statement).with_prefix(parse_attributes),
    Rule::on(TokenKind::Return, return_statement).with_prefix(parse_attributes),
    Rule::on(TokenKind::Do, do_while_statement).with_prefix(parse_attributes),
    Rule::on(TokenKind::While, while_statement).with_prefix(parse_attributes),
    Rule::on(TokenKind::For, for_statement).with_prefix(parse_attributes),
    Rule::on(TokenKind::If, if_statement).with_prefix(parse_attributes),
    Rule::on(TokenKind::Switch, switch_statement).with_prefix(parse_attributes),
    Rule::on(TokenKind::Semicolon, empty_statement),
    Rule::on(TokenKind::Break, jump_statement),
    Rule::on(TokenKind::Continue, jump_statement),
    Rule::on(TokenKind::Discard, jump_statement),
    Rule::any(declaration_statement).with_prefix(parse_attributes),
    Rule::any(expression_statement).with_prefix(parse_attributes),
];

/// `for` initializers: a declaration or an expression, with its `;`.
const FOR_INIT_RULES: &[Rule<StmtId>] = &[
    Rule::any(declaration_statement),
    Rule::any(expression_statement),
];

impl Parser<'_> {
    /// One statement; no rule matching is an error.
    pub(crate) fn parse_statement(&mut self) -> Result<StmtId, SourceError> {
        ensure_sufficient_stack(|| match self.try_rules(STATEMENT_RULES, "statement", true)? {
            ParseOutcome::Matched(stmt) => Ok(stmt),
            ParseOutcome::NotMatched => Err(self.unexpected("statement")),
        })
    }

    /// A statement that opens its own scope, as the branches and bodies of
    /// control flow do.
    fn parse_scoped_statement(&mut self) -> Result<StmtId, SourceError> {
        self.in_scope(Parser::parse_statement)
    }

    /// Statements up to the closing `}`, which is consumed.
    pub(crate) fn parse_block_items(&mut self) -> Result<Vec<StmtId>, SourceError> {
        let mut statements = Vec::new();
        while !self.eat(TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(self.error(ErrorCode::E1003, "unclosed block, expected '}'"));
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn finish_statement(
        &mut self,
        kind: StmtKind,
        attributes: Vec<Attribute>,
        loc: SourceLocation,
    ) -> ParseResult<StmtId> {
        Ok(ParseOutcome::Matched(self.alloc_stmt(Statement {
            kind,
            attributes,
            loc,
        })))
    }

    fn expect_parenthesized(&mut self) -> Result<ExprId, SourceError> {
        self.expect(TokenKind::LeftParenthesis)?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RightParenthesis)?;
        Ok(expr)
    }
}

// ── Rule bodies ──

fn compound_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    let statements = p.in_scope(Parser::parse_block_items)?;
    p.finish_statement(StmtKind::Compound(statements), attributes, loc)
}

fn return_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    let value = if p.check(TokenKind::Semicolon) {
        None
    } else {
        Some(p.parse_expression()?)
    };
    p.expect(TokenKind::Semicolon)?;
    p.finish_statement(StmtKind::Return(value), attributes, loc)
}

fn do_while_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    let body = p.parse_scoped_statement()?;
    p.expect(TokenKind::While)?;
    let condition = p.expect_parenthesized()?;
    p.expect(TokenKind::Semicolon)?;
    p.finish_statement(StmtKind::DoWhile { body, condition }, attributes, loc)
}

fn while_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    let condition = p.expect_parenthesized()?;
    let body = p.parse_scoped_statement()?;
    p.finish_statement(StmtKind::While { condition, body }, attributes, loc)
}

fn for_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    p.expect(TokenKind::LeftParenthesis)?;
    let kind = p.in_scope(|p| {
        let init = if p.eat(TokenKind::Semicolon) {
            None
        } else {
            p.try_rules(FOR_INIT_RULES, "for initializer", true)?
                .into_option()
        };
        let condition = if p.check(TokenKind::Semicolon) {
            None
        } else {
            Some(p.parse_expression()?)
        };
        p.expect(TokenKind::Semicolon)?;
        let step = if p.check(TokenKind::RightParenthesis) {
            None
        } else {
            Some(p.parse_expression()?)
        };
        p.expect(TokenKind::RightParenthesis)?;
        let body = p.parse_scoped_statement()?;
        Ok::<_, SourceError>(StmtKind::For {
            init,
            condition,
            step,
            body,
        })
    })?;
    p.finish_statement(kind, attributes, loc)
}

fn if_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    let condition = p.expect_parenthesized()?;
    let then_branch = p.parse_scoped_statement()?;
    let else_branch = if p.eat(TokenKind::Else) {
        Some(p.parse_scoped_statement()?)
    } else {
        None
    };
    p.finish_statement(
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        },
        attributes,
        loc,
    )
}

fn switch_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    let condition = p.expect_parenthesized()?;
    p.expect(TokenKind::LeftBrace)?;
    let body = p.in_scope(parse_switch_body)?;
    p.finish_statement(StmtKind::Switch { condition, body }, attributes, loc)
}

/// Case labels and statements up to the closing `}`.
///
/// Consecutive labels share one [`CaseStatement`]; a label after
/// statements starts a new one.
fn parse_switch_body(p: &mut Parser<'_>) -> Result<SwitchBody, SourceError> {
    let mut body = SwitchBody::default();
    let mut saw_default = false;
    while !p.eat(TokenKind::RightBrace) {
        let label = match p.current() {
            TokenKind::Eof => {
                return Err(p.error(ErrorCode::E1003, "unclosed switch body, expected '}'"))
            }
            TokenKind::Case => {
                p.cursor.advance();
                let value = p.parse_assignment_expression()?;
                p.expect(TokenKind::Colon)?;
                CaseLabel::Case(value)
            }
            TokenKind::Default => {
                if saw_default {
                    return Err(p.error(
                        ErrorCode::E1008,
                        "multiple 'default' labels in one switch",
                    ));
                }
                saw_default = true;
                p.cursor.advance();
                p.expect(TokenKind::Colon)?;
                CaseLabel::Default
            }
            _ => {
                let statement = p.parse_statement()?;
                match body.cases.last_mut() {
                    Some(case) => case.statements.push(statement),
                    None => return Err(p.unexpected("'case'")),
                }
                continue;
            }
        };
        match body.cases.last_mut() {
            Some(case) if case.statements.is_empty() => case.labels.push(label),
            _ => body.cases.push(CaseStatement {
                labels: vec![label],
                statements: Vec::new(),
            }),
        }
    }
    Ok(body)
}

fn empty_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    p.cursor.advance();
    p.finish_statement(StmtKind::Expression(None), attributes, loc)
}

fn jump_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    let kind = match p.cursor.advance() {
        TokenKind::Break => StmtKind::Break,
        TokenKind::Continue => StmtKind::Continue,
        _ => StmtKind::Discard,
    };
    p.expect(TokenKind::Semicolon)?;
    p.finish_statement(kind, attributes, loc)
}

fn declaration_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    let list = matched_or_decline!(p.parse_general_declaration(DeclFlags::LOCAL));
    p.expect(TokenKind::Semicolon)?;
    p.finish_statement(StmtKind::Declaration(list), attributes, loc)
}

fn expression_statement(p: &mut Parser<'_>, attributes: Vec<Attribute>) -> ParseResult<StmtId> {
    let loc = p.loc();
    let expr = p.parse_expression()?;
    p.expect(TokenKind::Semicolon)?;
    p.finish_statement(StmtKind::Expression(Some(expr)), attributes, loc)
}
