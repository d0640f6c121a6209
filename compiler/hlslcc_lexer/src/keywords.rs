//! Keyword and built-in type name resolution.
//!
//! Identifiers are scanned first and then looked up here. Numeric type
//! names are decoded structurally (`half3`, `float4x4`, `min16float2`)
//! rather than listed one by one.

use hlslcc_syntax::{NumericType, SamplerKind, ScalarKind, TextureKind, TokenKind};

/// Resolve `ident` to a keyword or built-in type token.
pub(crate) fn lookup(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "void" => TokenKind::Void,
        "struct" => TokenKind::Struct,
        "cbuffer" => TokenKind::CBuffer,
        "const" => TokenKind::Const,
        "static" => TokenKind::Static,
        "uniform" => TokenKind::Uniform,
        "in" => TokenKind::In,
        "out" => TokenKind::Out,
        "inout" => TokenKind::InOut,
        "row_major" => TokenKind::RowMajor,
        "column_major" => TokenKind::ColumnMajor,
        "nointerpolation" => TokenKind::NoInterpolation,
        "linear" => TokenKind::Linear,
        "centroid" => TokenKind::Centroid,
        "noperspective" => TokenKind::NoPerspective,
        "sample" => TokenKind::Sample,
        "groupshared" => TokenKind::GroupShared,
        "precise" => TokenKind::Precise,
        "inline" => TokenKind::Inline,
        "register" => TokenKind::Register,
        "packoffset" => TokenKind::PackOffset,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "discard" => TokenKind::Discard,
        "return" => TokenKind::Return,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "double" => TokenKind::Double,
        "SamplerState" | "sampler" => TokenKind::Sampler(SamplerKind::SamplerState),
        "SamplerComparisonState" => TokenKind::Sampler(SamplerKind::SamplerComparisonState),
        _ => {
            if let Some(texture) = TextureKind::ALL.iter().find(|t| t.keyword() == ident) {
                return Some(TokenKind::Texture(*texture));
            }
            return numeric_type(ident).map(TokenKind::Numeric);
        }
    };
    Some(kind)
}

/// Scalar spellings, longest first so `uint` is not read as `u` + `int`.
const SCALAR_PREFIXES: &[(&str, ScalarKind)] = &[
    ("min16float", ScalarKind::Half),
    ("min10float", ScalarKind::Half),
    ("min16uint", ScalarKind::Uint),
    ("min16int", ScalarKind::Int),
    ("min12int", ScalarKind::Int),
    ("float", ScalarKind::Float),
    ("dword", ScalarKind::Uint),
    ("bool", ScalarKind::Bool),
    ("half", ScalarKind::Half),
    ("uint", ScalarKind::Uint),
    ("int", ScalarKind::Int),
];

fn dimension(byte: u8) -> Option<u8> {
    match byte {
        b'1'..=b'4' => Some(byte - b'0'),
        _ => None,
    }
}

/// Decode `<scalar>`, `<scalar>N` or `<scalar>NxM`.
fn numeric_type(ident: &str) -> Option<NumericType> {
    let (prefix, scalar) = SCALAR_PREFIXES
        .iter()
        .find(|(prefix, _)| ident.starts_with(prefix))?;
    match ident.as_bytes().get(prefix.len()..)? {
        [] => Some(NumericType::scalar(*scalar)),
        [n] => match dimension(*n)? {
            1 => Some(NumericType::scalar(*scalar)),
            n => Some(NumericType::vector(*scalar, n)),
        },
        [r, b'x', c] => Some(NumericType::matrix(*scalar, dimension(*r)?, dimension(*c)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_spellings() {
        assert_eq!(
            lookup("float4"),
            Some(TokenKind::Numeric(NumericType::vector(ScalarKind::Float, 4)))
        );
        assert_eq!(
            lookup("half3x4"),
            Some(TokenKind::Numeric(NumericType::matrix(ScalarKind::Half, 3, 4)))
        );
        assert_eq!(
            lookup("uint"),
            Some(TokenKind::Numeric(NumericType::scalar(ScalarKind::Uint)))
        );
        assert_eq!(
            lookup("float1"),
            Some(TokenKind::Numeric(NumericType::scalar(ScalarKind::Float)))
        );
        assert_eq!(
            lookup("min16float2"),
            Some(TokenKind::Numeric(NumericType::vector(ScalarKind::Half, 2)))
        );
    }

    #[test]
    fn near_misses_are_identifiers() {
        assert_eq!(lookup("float5"), None);
        assert_eq!(lookup("float4x"), None);
        assert_eq!(lookup("floaty"), None);
        assert_eq!(lookup("integer"), None);
        assert_eq!(lookup("Color"), None);
    }

    #[test]
    fn resource_keywords() {
        assert_eq!(
            lookup("RWTexture2D"),
            Some(TokenKind::Texture(TextureKind::RWTexture2D))
        );
        assert_eq!(
            lookup("sampler"),
            Some(TokenKind::Sampler(SamplerKind::SamplerState))
        );
        assert_eq!(lookup("cbuffer"), Some(TokenKind::CBuffer));
    }
}
