//! Token types produced by the lexer.
//!
//! `TokenKind` is a closed enum: punctuation and operators, keywords, and
//! the built-in type names (every scalar/vector/matrix spelling of
//! bool/int/uint/half/float, every texture, buffer and sampler object).
//! Payload-carrying kinds (`Identifier`, `UnsignedIntegerConstant`,
//! `FloatConstant`) store the payload inline so the whole token is `Copy`.

use std::fmt;

use crate::{Name, NameTable, SourceFiles, SourceLocation};

// ── Built-in numeric types ──

/// Element type of a built-in numeric type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Half,
    Float,
}

impl ScalarKind {
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Half => "half",
            ScalarKind::Float => "float",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ScalarKind::Half | ScalarKind::Float)
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Uint)
    }
}

/// Dimensions of a built-in numeric type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Shape {
    Scalar,
    /// 2, 3 or 4 components.
    Vector(u8),
    /// HLSL `rows x cols`.
    Matrix { rows: u8, cols: u8 },
}

/// A built-in numeric type such as `half3` or `float4x4`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct NumericType {
    pub scalar: ScalarKind,
    pub shape: Shape,
}

impl NumericType {
    pub const fn scalar(scalar: ScalarKind) -> Self {
        NumericType {
            scalar,
            shape: Shape::Scalar,
        }
    }

    pub const fn vector(scalar: ScalarKind, len: u8) -> Self {
        NumericType {
            scalar,
            shape: Shape::Vector(len),
        }
    }

    pub const fn matrix(scalar: ScalarKind, rows: u8, cols: u8) -> Self {
        NumericType {
            scalar,
            shape: Shape::Matrix { rows, cols },
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scalar.name())?;
        match self.shape {
            Shape::Scalar => Ok(()),
            Shape::Vector(n) => write!(f, "{n}"),
            Shape::Matrix { rows, cols } => write!(f, "{rows}x{cols}"),
        }
    }
}

// ── Resource object types ──

/// Texture and buffer object keywords.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TextureKind {
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    Buffer,
    StructuredBuffer,
    ByteAddressBuffer,
    RWBuffer,
    RWTexture1D,
    RWTexture1DArray,
    RWTexture2D,
    RWTexture2DArray,
    RWTexture3D,
    RWStructuredBuffer,
    RWByteAddressBuffer,
}

impl TextureKind {
    pub const ALL: [TextureKind; 20] = [
        TextureKind::Texture1D,
        TextureKind::Texture1DArray,
        TextureKind::Texture2D,
        TextureKind::Texture2DArray,
        TextureKind::Texture2DMS,
        TextureKind::Texture2DMSArray,
        TextureKind::Texture3D,
        TextureKind::TextureCube,
        TextureKind::TextureCubeArray,
        TextureKind::Buffer,
        TextureKind::StructuredBuffer,
        TextureKind::ByteAddressBuffer,
        TextureKind::RWBuffer,
        TextureKind::RWTexture1D,
        TextureKind::RWTexture1DArray,
        TextureKind::RWTexture2D,
        TextureKind::RWTexture2DArray,
        TextureKind::RWTexture3D,
        TextureKind::RWStructuredBuffer,
        TextureKind::RWByteAddressBuffer,
    ];

    pub const fn keyword(self) -> &'static str {
        match self {
            TextureKind::Texture1D => "Texture1D",
            TextureKind::Texture1DArray => "Texture1DArray",
            TextureKind::Texture2D => "Texture2D",
            TextureKind::Texture2DArray => "Texture2DArray",
            TextureKind::Texture2DMS => "Texture2DMS",
            TextureKind::Texture2DMSArray => "Texture2DMSArray",
            TextureKind::Texture3D => "Texture3D",
            TextureKind::TextureCube => "TextureCube",
            TextureKind::TextureCubeArray => "TextureCubeArray",
            TextureKind::Buffer => "Buffer",
            TextureKind::StructuredBuffer => "StructuredBuffer",
            TextureKind::ByteAddressBuffer => "ByteAddressBuffer",
            TextureKind::RWBuffer => "RWBuffer",
            TextureKind::RWTexture1D => "RWTexture1D",
            TextureKind::RWTexture1DArray => "RWTexture1DArray",
            TextureKind::RWTexture2D => "RWTexture2D",
            TextureKind::RWTexture2DArray => "RWTexture2DArray",
            TextureKind::RWTexture3D => "RWTexture3D",
            TextureKind::RWStructuredBuffer => "RWStructuredBuffer",
            TextureKind::RWByteAddressBuffer => "RWByteAddressBuffer",
        }
    }

    /// Unordered-access (`RW*`) objects.
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            TextureKind::RWBuffer
                | TextureKind::RWTexture1D
                | TextureKind::RWTexture1DArray
                | TextureKind::RWTexture2D
                | TextureKind::RWTexture2DArray
                | TextureKind::RWTexture3D
                | TextureKind::RWStructuredBuffer
                | TextureKind::RWByteAddressBuffer
        )
    }

    /// Buffer objects index elements rather than texels.
    pub const fn is_buffer(self) -> bool {
        matches!(
            self,
            TextureKind::Buffer
                | TextureKind::StructuredBuffer
                | TextureKind::ByteAddressBuffer
                | TextureKind::RWBuffer
                | TextureKind::RWStructuredBuffer
                | TextureKind::RWByteAddressBuffer
        )
    }

    /// Multisampled textures take a sample count template argument.
    pub const fn is_multisampled(self) -> bool {
        matches!(self, TextureKind::Texture2DMS | TextureKind::Texture2DMSArray)
    }
}

/// Sampler object keywords.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SamplerKind {
    SamplerState,
    SamplerComparisonState,
}

impl SamplerKind {
    pub const fn keyword(self) -> &'static str {
        match self {
            SamplerKind::SamplerState => "SamplerState",
            SamplerKind::SamplerComparisonState => "SamplerComparisonState",
        }
    }
}

// ── Token kinds ──

/// Every token the lexer can produce.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum TokenKind {
    // Operators and punctuation
    Plus,
    PlusEqual,
    PlusPlus,
    Minus,
    MinusEqual,
    MinusMinus,
    Times,
    TimesEqual,
    Div,
    DivEqual,
    Mod,
    ModEqual,
    LeftParenthesis,
    RightParenthesis,
    LeftSquareBracket,
    RightSquareBracket,
    LeftBrace,
    RightBrace,
    Equal,
    EqualEqual,
    Not,
    NotEqual,
    Lower,
    LowerEqual,
    LowerLower,
    /// `<<=`
    LSAssign,
    Greater,
    GreaterEqual,
    GreaterGreater,
    /// `>>=`
    RSAssign,
    And,
    AndAnd,
    AndEqual,
    Or,
    OrOr,
    OrEqual,
    Xor,
    XorEqual,
    /// `~`
    Neg,
    Question,
    Colon,
    ColonColon,
    Semicolon,
    Comma,
    Dot,

    // Keywords
    Void,
    Struct,
    CBuffer,
    Const,
    Static,
    Uniform,
    In,
    Out,
    InOut,
    RowMajor,
    ColumnMajor,
    NoInterpolation,
    Linear,
    Centroid,
    NoPerspective,
    Sample,
    GroupShared,
    Precise,
    Inline,
    Register,
    PackOffset,
    If,
    Else,
    For,
    While,
    Do,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Discard,
    Return,
    True,
    False,
    /// Lexed so that lowering can reject it with a clear message.
    Double,

    // Built-in types
    Numeric(NumericType),
    Texture(TextureKind),
    Sampler(SamplerKind),

    // Payload kinds
    Identifier(Name),
    UnsignedIntegerConstant(u32),
    FloatConstant(f32),

    /// Synthesized by the parser cursor past the last token; never stored.
    Eof,
}

impl TokenKind {
    /// Fixed source text of operator, punctuation and keyword tokens.
    ///
    /// Returns `None` for kinds whose text depends on a payload or on a
    /// built-in type spelling.
    pub const fn fixed_text(self) -> Option<&'static str> {
        let text = match self {
            TokenKind::Plus => "+",
            TokenKind::PlusEqual => "+=",
            TokenKind::PlusPlus => "++",
            TokenKind::Minus => "-",
            TokenKind::MinusEqual => "-=",
            TokenKind::MinusMinus => "--",
            TokenKind::Times => "*",
            TokenKind::TimesEqual => "*=",
            TokenKind::Div => "/",
            TokenKind::DivEqual => "/=",
            TokenKind::Mod => "%",
            TokenKind::ModEqual => "%=",
            TokenKind::LeftParenthesis => "(",
            TokenKind::RightParenthesis => ")",
            TokenKind::LeftSquareBracket => "[",
            TokenKind::RightSquareBracket => "]",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::Not => "!",
            TokenKind::NotEqual => "!=",
            TokenKind::Lower => "<",
            TokenKind::LowerEqual => "<=",
            TokenKind::LowerLower => "<<",
            TokenKind::LSAssign => "<<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::GreaterGreater => ">>",
            TokenKind::RSAssign => ">>=",
            TokenKind::And => "&",
            TokenKind::AndAnd => "&&",
            TokenKind::AndEqual => "&=",
            TokenKind::Or => "|",
            TokenKind::OrOr => "||",
            TokenKind::OrEqual => "|=",
            TokenKind::Xor => "^",
            TokenKind::XorEqual => "^=",
            TokenKind::Neg => "~",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::ColonColon => "::",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Void => "void",
            TokenKind::Struct => "struct",
            TokenKind::CBuffer => "cbuffer",
            TokenKind::Const => "const",
            TokenKind::Static => "static",
            TokenKind::Uniform => "uniform",
            TokenKind::In => "in",
            TokenKind::Out => "out",
            TokenKind::InOut => "inout",
            TokenKind::RowMajor => "row_major",
            TokenKind::ColumnMajor => "column_major",
            TokenKind::NoInterpolation => "nointerpolation",
            TokenKind::Linear => "linear",
            TokenKind::Centroid => "centroid",
            TokenKind::NoPerspective => "noperspective",
            TokenKind::Sample => "sample",
            TokenKind::GroupShared => "groupshared",
            TokenKind::Precise => "precise",
            TokenKind::Inline => "inline",
            TokenKind::Register => "register",
            TokenKind::PackOffset => "packoffset",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Discard => "discard",
            TokenKind::Return => "return",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Double => "double",
            TokenKind::Texture(kind) => kind.keyword(),
            TokenKind::Sampler(kind) => kind.keyword(),
            TokenKind::Numeric(_)
            | TokenKind::Identifier(_)
            | TokenKind::UnsignedIntegerConstant(_)
            | TokenKind::FloatConstant(_)
            | TokenKind::Eof => return None,
        };
        Some(text)
    }

    /// Whether two kinds are the same variant, ignoring payloads.
    #[inline]
    pub fn same_variant(self, other: TokenKind) -> bool {
        std::mem::discriminant(&self) == std::mem::discriminant(&other)
    }

    /// Tokens that begin a type in declaration position.
    pub fn is_builtin_type(self) -> bool {
        matches!(
            self,
            TokenKind::Void
                | TokenKind::Numeric(_)
                | TokenKind::Texture(_)
                | TokenKind::Sampler(_)
                | TokenKind::Double
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.fixed_text() {
            return f.write_str(text);
        }
        match self {
            TokenKind::Numeric(ty) => write!(f, "{ty}"),
            TokenKind::Identifier(_) => f.write_str("identifier"),
            TokenKind::UnsignedIntegerConstant(v) => write!(f, "{v}"),
            TokenKind::FloatConstant(v) => write!(f, "{v:?}"),
            _ => f.write_str("end of file"),
        }
    }
}

// ── Tokens and streams ──

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLocation,
}

/// A character the scanner could not classify and skipped.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct LexAnomaly {
    pub character: char,
    pub loc: SourceLocation,
}

/// Output of lexing one translation unit.
///
/// There is no end-of-file token; the parser cursor reports `Eof` once it
/// runs past the last entry.
#[derive(Clone, Debug, Default)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub names: NameTable,
    pub files: SourceFiles,
    pub anomalies: Vec<LexAnomaly>,
}

impl TokenStream {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = TokenKind> + '_ {
        self.tokens.iter().map(|t| t.kind)
    }

    /// Source-like text of a single token, resolving identifier payloads.
    pub fn text_of(&self, kind: TokenKind) -> String {
        match kind {
            TokenKind::Identifier(name) => self.names.resolve(name).to_owned(),
            other => other.to_string(),
        }
    }

    /// Re-print the whole stream, one space between tokens.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&self.text_of(token.kind));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_display() {
        assert_eq!(NumericType::scalar(ScalarKind::Half).to_string(), "half");
        assert_eq!(NumericType::vector(ScalarKind::Float, 4).to_string(), "float4");
        assert_eq!(
            NumericType::matrix(ScalarKind::Float, 3, 4).to_string(),
            "float3x4"
        );
    }

    #[test]
    fn same_variant_ignores_payload() {
        let mut names = NameTable::new();
        let a = TokenKind::Identifier(names.intern("a"));
        let b = TokenKind::Identifier(names.intern("b"));
        assert!(a.same_variant(b));
        assert!(!a.same_variant(TokenKind::Semicolon));
    }

    #[test]
    fn resource_classification() {
        assert!(TextureKind::RWTexture2D.is_writable());
        assert!(!TextureKind::Texture2D.is_writable());
        assert!(TextureKind::RWBuffer.is_buffer());
        assert!(TextureKind::Texture2DMS.is_multisampled());
        assert_eq!(
            TokenKind::Texture(TextureKind::TextureCube).fixed_text(),
            Some("TextureCube")
        );
    }
}
