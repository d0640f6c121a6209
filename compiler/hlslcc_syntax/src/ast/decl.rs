//! Types, declarations, structs, cbuffers and functions.

use bitflags::bitflags;

use crate::{
    ExprId, Name, NameTable, NumericType, SamplerKind, SourceLocation, StmtId, TextureKind,
};

bitflags! {
    /// Storage, parameter and interpolation qualifiers of a declaration.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TypeQualifier: u32 {
        const CONST = 1 << 0;
        const STATIC = 1 << 1;
        const UNIFORM = 1 << 2;
        const IN = 1 << 3;
        const OUT = 1 << 4;
        const INOUT = Self::IN.bits() | Self::OUT.bits();
        const ROW_MAJOR = 1 << 5;
        const COLUMN_MAJOR = 1 << 6;
        const NO_INTERPOLATION = 1 << 7;
        const LINEAR = 1 << 8;
        const CENTROID = 1 << 9;
        const NO_PERSPECTIVE = 1 << 10;
        const SAMPLE = 1 << 11;
        const SHARED = 1 << 12;
        const PRECISE = 1 << 13;
        const INLINE = 1 << 14;
    }
}

/// The base of a type specifier.
#[derive(Clone, PartialEq, Debug)]
pub enum TypeName {
    Void,
    Numeric(NumericType),
    Texture(TextureKind),
    Sampler(SamplerKind),
    /// `double`, kept so lowering can reject it.
    Double,
    /// A previously declared struct.
    Named(Name),
    /// `struct [Name] { ... }` written in place.
    Struct(Box<StructSpecifier>),
}

/// A type as written, e.g. `Texture2DMS<float4, 4>`.
#[derive(Clone, PartialEq, Debug)]
pub struct TypeSpecifier {
    pub name: TypeName,
    /// Template element type of textures and buffers.
    pub inner: Option<Box<TypeSpecifier>>,
    /// Sample count of multisampled textures.
    pub sample_count: Option<u32>,
    pub loc: SourceLocation,
}

impl TypeSpecifier {
    pub fn new(name: TypeName, loc: SourceLocation) -> Self {
        TypeSpecifier {
            name,
            inner: None,
            sample_count: None,
            loc,
        }
    }

    /// HLSL spelling, used when synthesizing source.
    pub fn to_hlsl(&self, names: &NameTable) -> String {
        let mut out = match &self.name {
            TypeName::Void => "void".to_owned(),
            TypeName::Numeric(ty) => ty.to_string(),
            TypeName::Texture(kind) => kind.keyword().to_owned(),
            TypeName::Sampler(kind) => kind.keyword().to_owned(),
            TypeName::Double => "double".to_owned(),
            TypeName::Named(name) => names.resolve(*name).to_owned(),
            TypeName::Struct(spec) => match spec.name {
                Some(name) => names.resolve(name).to_owned(),
                None => "struct".to_owned(),
            },
        };
        if let Some(inner) = &self.inner {
            out.push('<');
            out.push_str(&inner.to_hlsl(names));
            if let Some(count) = self.sample_count {
                out.push_str(&format!(", {count}"));
            }
            out.push('>');
        }
        out
    }
}

/// Qualifiers plus type.
#[derive(Clone, PartialEq, Debug)]
pub struct FullySpecifiedType {
    pub qualifier: TypeQualifier,
    pub specifier: TypeSpecifier,
}

/// One declarator: `name[dims] : SEMANTIC : register(r) = init`.
#[derive(Clone, PartialEq, Debug)]
pub struct Declaration {
    pub identifier: Name,
    /// `None` entries are unsized dimensions (`a[]`).
    pub array_dims: Vec<Option<ExprId>>,
    pub semantic: Option<Name>,
    pub register: Option<Name>,
    pub initializer: Option<ExprId>,
    pub loc: SourceLocation,
}

impl Declaration {
    pub fn new(identifier: Name, loc: SourceLocation) -> Self {
        Declaration {
            identifier,
            array_dims: Vec::new(),
            semantic: None,
            register: None,
            initializer: None,
            loc,
        }
    }
}

/// `type a, b[2], c = 1;`
///
/// A bare struct definition (`struct S { ... };`) is a list with no
/// declarators.
#[derive(Clone, PartialEq, Debug)]
pub struct DeclaratorList {
    pub ty: FullySpecifiedType,
    pub declarations: Vec<Declaration>,
    pub loc: SourceLocation,
}

#[derive(Clone, PartialEq, Debug)]
pub struct StructSpecifier {
    pub name: Option<Name>,
    /// `struct Derived : Base`
    pub parent: Option<Name>,
    pub members: Vec<DeclaratorList>,
    pub loc: SourceLocation,
}

#[derive(Clone, PartialEq, Debug)]
pub struct CBufferDeclaration {
    pub name: Name,
    pub register: Option<Name>,
    pub members: Vec<DeclaratorList>,
    pub loc: SourceLocation,
}

/// `[name(args)]` before a function or statement.
#[derive(Clone, PartialEq, Debug)]
pub struct Attribute {
    pub name: Name,
    pub arguments: Vec<ExprId>,
    pub loc: SourceLocation,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Parameter {
    pub ty: FullySpecifiedType,
    pub declaration: Declaration,
}

#[derive(Clone, PartialEq, Debug)]
pub struct FunctionPrototype {
    pub return_type: FullySpecifiedType,
    pub name: Name,
    pub parameters: Vec<Parameter>,
    pub return_semantic: Option<Name>,
    pub attributes: Vec<Attribute>,
    pub loc: SourceLocation,
}

/// A function definition, or a forward declaration when `body` is `None`.
#[derive(Clone, PartialEq, Debug)]
pub struct FunctionDefinition {
    pub prototype: FunctionPrototype,
    pub body: Option<Vec<StmtId>>,
}
