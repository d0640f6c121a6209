//! Attribute lists: `[numthreads(8, 8, 1)]`, `[unroll]`, `[unroll(4)]`.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_syntax::ast::Attribute;
use hlslcc_syntax::TokenKind;

use crate::Parser;

/// Consume zero or more bracketed attributes.
///
/// Used as the prefix matcher of function and statement rules. A `[` that
/// is not followed by an attribute name is a hard error.
pub(crate) fn parse_attributes(p: &mut Parser<'_>) -> Result<Vec<Attribute>, SourceError> {
    let mut attributes = Vec::new();
    while p.check(TokenKind::LeftSquareBracket) {
        let loc = p.loc();
        p.cursor.advance();
        let Some(name) = p.cursor.eat_ident() else {
            return Err(p.error(
                ErrorCode::E1011,
                format!("expected attribute name, found '{}'", p.describe_current()),
            ));
        };
        let mut arguments = Vec::new();
        if p.eat(TokenKind::LeftParenthesis) {
            if !p.check(TokenKind::RightParenthesis) {
                loop {
                    arguments.push(p.parse_assignment_expression()?);
                    if !p.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            p.expect(TokenKind::RightParenthesis)?;
        }
        p.expect(TokenKind::RightSquareBracket)?;
        attributes.push(Attribute {
            name,
            arguments,
            loc,
        });
    }
    Ok(attributes)
}
