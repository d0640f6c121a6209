#![allow(clippy::unwrap_used, clippy::expect_used)]

use hlslcc_syntax::{NumericType, ScalarKind, SourceLocation};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::symbols::SYMBOLS;

fn kinds(source: &str) -> Vec<TokenKind> {
    lex(source, "test.usf").kinds().collect()
}

fn lines(source: &str) -> Vec<u32> {
    lex(source, "test.usf")
        .tokens
        .iter()
        .map(|t| t.loc.line)
        .collect()
}

/// `float4 x; x = 1.0;` produces the seven expected tokens.
#[test]
fn global_declaration_and_assignment() {
    let stream = lex("float4 x; x = 1.0;", "test.usf");
    let x = TokenKind::Identifier(stream.names.get("x").unwrap());
    assert_eq!(
        stream.kinds().collect::<Vec<_>>(),
        vec![
            TokenKind::Numeric(NumericType::vector(ScalarKind::Float, 4)),
            x,
            TokenKind::Semicolon,
            x,
            TokenKind::Equal,
            TokenKind::FloatConstant(1.0),
            TokenKind::Semicolon,
        ]
    );
    assert!(stream.anomalies.is_empty());
}

/// `<<=` is a single token, never `<` + `<=` or `<<` + `=`.
#[test]
fn shift_assign_is_longest_match() {
    assert_eq!(kinds("<<="), vec![TokenKind::LSAssign]);
    assert_eq!(kinds(">>="), vec![TokenKind::RSAssign]);
    assert_eq!(
        kinds("<<<="),
        vec![TokenKind::LowerLower, TokenKind::LowerEqual]
    );
}

#[test]
fn comments_are_skipped() {
    assert_eq!(
        kinds("a // trailing ; \n /* block ; \n */ ;"),
        kinds("a ;")
    );
}

/// An unterminated block comment swallows the rest of the input quietly.
#[test]
fn unterminated_block_comment_runs_to_eof() {
    let stream = lex("return; /* never closed\n float4 x;", "test.usf");
    assert_eq!(
        stream.kinds().collect::<Vec<_>>(),
        vec![TokenKind::Return, TokenKind::Semicolon]
    );
    assert!(stream.anomalies.is_empty());
}

#[test]
fn numeric_literals() {
    assert_eq!(
        kinds("42 0x1F 7u 1.5 .25 2.f 3e2 1e-1 4h"),
        vec![
            TokenKind::UnsignedIntegerConstant(42),
            TokenKind::UnsignedIntegerConstant(31),
            TokenKind::UnsignedIntegerConstant(7),
            TokenKind::FloatConstant(1.5),
            TokenKind::FloatConstant(0.25),
            TokenKind::FloatConstant(2.0),
            TokenKind::FloatConstant(300.0),
            TokenKind::FloatConstant(0.1),
            TokenKind::FloatConstant(4.0),
        ]
    );
}

/// A leading minus is an operator, not part of the literal.
#[test]
fn minus_is_not_part_of_literal() {
    assert_eq!(
        kinds("-1.0"),
        vec![TokenKind::Minus, TokenKind::FloatConstant(1.0)]
    );
}

#[test]
fn line_tracking() {
    assert_eq!(lines("a\nb\n\nc"), vec![1, 2, 4]);
    assert_eq!(lines("/* x\n y */ a"), vec![2]);
}

/// `#line` re-anchors the following line and may switch files.
#[test]
fn line_directive() {
    let stream = lex("a\n#line 100 \"Common.ush\"\nb\nc\n#pragma once\nd", "Main.usf");
    let locs: Vec<SourceLocation> = stream.tokens.iter().map(|t| t.loc).collect();
    assert_eq!(locs[0].line, 1);
    assert_eq!(stream.files.name(locs[0].file), "Main.usf");
    assert_eq!(locs[1].line, 100);
    assert_eq!(stream.files.name(locs[1].file), "Common.ush");
    assert_eq!(locs[2].line, 101);
    assert_eq!(locs[3].line, 103);
    assert_eq!(stream.len(), 4);
}

/// Unknown characters are skipped but recorded.
#[test]
fn anomalies_are_recorded() {
    let stream = lex("a @ b\n$", "test.usf");
    assert_eq!(stream.len(), 2);
    let skipped: Vec<(char, u32)> = stream
        .anomalies
        .iter()
        .map(|a| (a.character, a.loc.line))
        .collect();
    assert_eq!(skipped, vec![('@', 1), ('$', 2)]);
}

#[test]
fn keywords_and_types() {
    assert_eq!(
        kinds("static const uint cbuffer Texture2D SamplerState"),
        vec![
            TokenKind::Static,
            TokenKind::Const,
            TokenKind::Numeric(NumericType::scalar(ScalarKind::Uint)),
            TokenKind::CBuffer,
            TokenKind::Texture(hlslcc_syntax::TextureKind::Texture2D),
            TokenKind::Sampler(hlslcc_syntax::SamplerKind::SamplerState),
        ]
    );
}

fn symbol_strategy() -> impl Strategy<Value = Vec<TokenKind>> {
    prop::collection::vec(prop::sample::select(SYMBOLS.to_vec()), 1..24)
}

proptest! {
    /// Printing symbols separated by spaces and re-lexing yields the same
    /// sequence.
    #[test]
    fn symbol_round_trip(symbols in symbol_strategy()) {
        let text = symbols
            .iter()
            .filter_map(|k| k.fixed_text())
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert_eq!(kinds(&text), symbols);
    }

    /// Rendering a lexed stream and lexing it again is stable.
    #[test]
    fn render_round_trip(idents in prop::collection::vec("[a-z_][a-z0-9_]{0,6}", 1..8)) {
        let source = idents.join(" + ");
        let first = lex(&source, "a.usf");
        let second = lex(&first.render(), "a.usf");
        prop_assert_eq!(first.render(), second.render());
    }
}
