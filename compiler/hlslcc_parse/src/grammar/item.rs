//! Top-level constructs.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_syntax::ast::{
    Attribute, CBufferDeclaration, FullySpecifiedType, FunctionDefinition, FunctionPrototype,
    Parameter, TopLevel, TypeQualifier,
};
use hlslcc_syntax::{StmtId, TokenKind};

use super::{parse_attributes, DeclFlags};
use crate::outcome::{matched_or_decline, ParseOutcome, ParseResult, Rule};
use crate::Parser;

/// `None` results are constructs that produce no node (a stray `;`).
pub(crate) const TOP_LEVEL_RULES: &[Rule<Option<TopLevel>>] = &[
    Rule::on(TokenKind::CBuffer, cbuffer_declaration),
    Rule::on(TokenKind::Semicolon, stray_semicolon),
    Rule::any(function_definition).with_prefix(parse_attributes),
    Rule::any(global_declaration),
];

fn stray_semicolon(p: &mut Parser<'_>, _: Vec<Attribute>) -> ParseResult<Option<TopLevel>> {
    p.cursor.advance();
    Ok(ParseOutcome::Matched(None))
}

/// `cbuffer Name [: register(bN)] { members } [;]`
fn cbuffer_declaration(p: &mut Parser<'_>, _: Vec<Attribute>) -> ParseResult<Option<TopLevel>> {
    let loc = p.loc();
    p.cursor.advance();
    let name = p.expect_ident("cbuffer name")?;
    let mut register = None;
    while p.eat(TokenKind::Colon) {
        p.expect(TokenKind::Register)?;
        register = Some(p.parse_register()?);
    }
    p.expect(TokenKind::LeftBrace)?;
    let members = p.in_scope(|p| {
        let mut members = Vec::new();
        while !p.eat(TokenKind::RightBrace) {
            if p.is_at_end() {
                return Err(p.error(ErrorCode::E1003, "unclosed cbuffer, expected '}'"));
            }
            match p.parse_general_declaration(DeclFlags::CBUFFER_MEMBER)? {
                ParseOutcome::Matched(list) => members.push(list),
                ParseOutcome::NotMatched => return Err(p.unexpected("cbuffer member")),
            }
            p.expect(TokenKind::Semicolon)?;
        }
        Ok::<_, SourceError>(members)
    })?;
    p.eat(TokenKind::Semicolon);
    Ok(ParseOutcome::Matched(Some(TopLevel::CBuffer(
        CBufferDeclaration {
            name,
            register,
            members,
            loc,
        },
    ))))
}

/// Function definition or forward declaration.
///
/// Speculative until `name (` has been seen, so `float4 x;` and struct
/// definitions fall through to the global declaration rule.
fn function_definition(
    p: &mut Parser<'_>,
    attributes: Vec<Attribute>,
) -> ParseResult<Option<TopLevel>> {
    let loc = p.loc();
    let mut qualifier = TypeQualifier::empty();
    loop {
        let flag = match p.current() {
            TokenKind::Static => TypeQualifier::STATIC,
            TokenKind::Inline => TypeQualifier::INLINE,
            TokenKind::Precise => TypeQualifier::PRECISE,
            TokenKind::Const => TypeQualifier::CONST,
            _ => break,
        };
        qualifier |= flag;
        p.cursor.advance();
    }
    if p.at_struct_definition() {
        return Ok(ParseOutcome::NotMatched);
    }
    let specifier = matched_or_decline!(p.parse_type_specifier(false));
    let Some(name) = p.cursor.eat_ident() else {
        return Ok(ParseOutcome::NotMatched);
    };
    if !p.eat(TokenKind::LeftParenthesis) {
        return Ok(ParseOutcome::NotMatched);
    }

    let (parameters, return_semantic, body) = p.in_scope(|p| {
        let parameters = parse_parameters(p)?;
        let return_semantic = if p.eat(TokenKind::Colon) {
            Some(p.expect_ident("return semantic")?)
        } else {
            None
        };
        let body: Option<Vec<StmtId>> = if p.eat(TokenKind::Semicolon) {
            None
        } else {
            p.expect(TokenKind::LeftBrace)?;
            Some(p.parse_block_items()?)
        };
        Ok::<_, SourceError>((parameters, return_semantic, body))
    })?;

    Ok(ParseOutcome::Matched(Some(TopLevel::Function(
        FunctionDefinition {
            prototype: FunctionPrototype {
                return_type: FullySpecifiedType {
                    qualifier,
                    specifier,
                },
                name,
                parameters,
                return_semantic,
                attributes,
                loc,
            },
            body,
        },
    ))))
}

/// Parameters after `(`, through the closing `)`.
fn parse_parameters(p: &mut Parser<'_>) -> Result<Vec<Parameter>, SourceError> {
    let mut parameters = Vec::new();
    if p.eat(TokenKind::RightParenthesis) {
        return Ok(parameters);
    }
    if p.check(TokenKind::Void) && p.cursor.peek(1) == TokenKind::RightParenthesis {
        p.cursor.advance();
        p.cursor.advance();
        return Ok(parameters);
    }
    loop {
        let list = match p.parse_general_declaration(DeclFlags::PARAMETER)? {
            ParseOutcome::Matched(list) => list,
            ParseOutcome::NotMatched => {
                return Err(p.error(
                    ErrorCode::E1005,
                    format!("expected parameter type, found '{}'", p.describe_current()),
                ))
            }
        };
        let Some(declaration) = list.declarations.into_iter().next() else {
            return Err(p.error(ErrorCode::E1004, "expected parameter name"));
        };
        parameters.push(Parameter {
            ty: list.ty,
            declaration,
        });
        if !p.eat(TokenKind::Comma) {
            break;
        }
    }
    p.expect(TokenKind::RightParenthesis)?;
    Ok(parameters)
}

fn global_declaration(p: &mut Parser<'_>, _: Vec<Attribute>) -> ParseResult<Option<TopLevel>> {
    let list = matched_or_decline!(p.parse_general_declaration(DeclFlags::GLOBAL));
    p.expect(TokenKind::Semicolon)?;
    Ok(ParseOutcome::Matched(Some(TopLevel::Declaration(list))))
}
