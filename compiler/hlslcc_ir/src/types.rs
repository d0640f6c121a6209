//! IR types and the per-module type table.
//!
//! Types are interned: structurally equal types share one [`TypeId`], so
//! passes compare types with `==` on ids. The first six ids are fixed.

use std::fmt;

use hlslcc_syntax::{ScalarKind, TextureKind};
use rustc_hash::FxHashMap;

/// Index into a [`TypeTable`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT: TypeId = TypeId(2);
    pub const UINT: TypeId = TypeId(3);
    pub const HALF: TypeId = TypeId(4);
    pub const FLOAT: TypeId = TypeId(5);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
    /// Semantic of stage-in/stage-out members (`ATTRIBUTE0`, `var_TEXCOORD0`,
    /// `SV_Target0`).
    pub semantic: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TextureType {
    pub kind: TextureKind,
    /// Element type from the template argument, `float4` by default.
    pub element: TypeId,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum Type {
    Void,
    Scalar(ScalarKind),
    /// 2 to 4 components.
    Vector(ScalarKind, u8),
    /// HLSL `rows x cols`: `rows` row vectors of `cols` components.
    Matrix {
        scalar: ScalarKind,
        rows: u8,
        cols: u8,
    },
    Array {
        element: TypeId,
        length: u32,
    },
    Struct(StructType),
    Texture(TextureType),
    SamplerState {
        comparison: bool,
    },
    /// `Buffer`, `StructuredBuffer` and their RW forms: a typed pointer.
    Buffer {
        element: TypeId,
        writable: bool,
    },
}

/// Interned types of one module.
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    index: FxHashMap<Type, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = TypeTable {
            types: Vec::new(),
            index: FxHashMap::default(),
        };
        for ty in [
            Type::Void,
            Type::Scalar(ScalarKind::Bool),
            Type::Scalar(ScalarKind::Int),
            Type::Scalar(ScalarKind::Uint),
            Type::Scalar(ScalarKind::Half),
            Type::Scalar(ScalarKind::Float),
        ] {
            table.intern(ty);
        }
        table
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.index.get(&ty) {
            return id;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "a shader never declares 2^32 types"
        )]
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.index.insert(ty, id);
        id
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ── Constructors ──

    pub fn scalar(&mut self, kind: ScalarKind) -> TypeId {
        self.intern(Type::Scalar(kind))
    }

    /// `kind` with `size` components; size 1 is the scalar.
    pub fn vector(&mut self, kind: ScalarKind, size: u8) -> TypeId {
        if size <= 1 {
            self.scalar(kind)
        } else {
            self.intern(Type::Vector(kind, size))
        }
    }

    pub fn matrix(&mut self, kind: ScalarKind, rows: u8, cols: u8) -> TypeId {
        self.intern(Type::Matrix {
            scalar: kind,
            rows,
            cols,
        })
    }

    pub fn array(&mut self, element: TypeId, length: u32) -> TypeId {
        self.intern(Type::Array { element, length })
    }

    /// Same shape as `ty` with a different element kind.
    pub fn with_scalar(&mut self, ty: TypeId, kind: ScalarKind) -> TypeId {
        match *self.get(ty) {
            Type::Scalar(_) => self.scalar(kind),
            Type::Vector(_, n) => self.vector(kind, n),
            Type::Matrix { rows, cols, .. } => self.matrix(kind, rows, cols),
            _ => ty,
        }
    }

    /// Row type of a matrix, element type of an array, scalar of a vector.
    pub fn element(&mut self, ty: TypeId) -> Option<TypeId> {
        match *self.get(ty) {
            Type::Vector(kind, _) => Some(self.scalar(kind)),
            Type::Matrix { scalar, cols, .. } => Some(self.vector(scalar, cols)),
            Type::Array { element, .. } | Type::Buffer { element, .. } => Some(element),
            _ => None,
        }
    }

    // ── Queries ──

    pub fn scalar_kind(&self, ty: TypeId) -> Option<ScalarKind> {
        match *self.get(ty) {
            Type::Scalar(kind) | Type::Vector(kind, _) | Type::Matrix { scalar: kind, .. } => {
                Some(kind)
            }
            _ => None,
        }
    }

    /// Component count of a scalar or vector; 0 for anything else.
    pub fn vector_size(&self, ty: TypeId) -> u8 {
        match *self.get(ty) {
            Type::Scalar(_) => 1,
            Type::Vector(_, n) => n,
            _ => 0,
        }
    }

    /// Scalar count of a numeric type.
    pub fn components(&self, ty: TypeId) -> u32 {
        match *self.get(ty) {
            Type::Scalar(_) => 1,
            Type::Vector(_, n) => u32::from(n),
            Type::Matrix { rows, cols, .. } => u32::from(rows) * u32::from(cols),
            _ => 0,
        }
    }

    pub fn is_scalar(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Scalar(_))
    }

    pub fn is_vector(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Vector(..))
    }

    pub fn is_matrix(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Matrix { .. })
    }

    pub fn is_numeric(&self, ty: TypeId) -> bool {
        self.scalar_kind(ty).is_some()
    }

    pub fn is_boolean(&self, ty: TypeId) -> bool {
        self.scalar_kind(ty) == Some(ScalarKind::Bool)
    }

    pub fn is_float(&self, ty: TypeId) -> bool {
        self.scalar_kind(ty).is_some_and(ScalarKind::is_float)
    }

    pub fn is_array(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Array { .. })
    }

    pub fn is_texture(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::Texture(_))
    }

    pub fn is_sampler_state(&self, ty: TypeId) -> bool {
        matches!(self.get(ty), Type::SamplerState { .. })
    }

    /// Textures, samplers and buffers: values that only exist as bindings.
    pub fn is_opaque(&self, ty: TypeId) -> bool {
        match self.get(ty) {
            Type::Texture(_) | Type::SamplerState { .. } | Type::Buffer { .. } => true,
            Type::Array { element, .. } => self.is_opaque(*element),
            _ => false,
        }
    }

    pub fn struct_type(&self, ty: TypeId) -> Option<&StructType> {
        match self.get(ty) {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Index and type of the field called `name`.
    pub fn field(&self, ty: TypeId, name: &str) -> Option<(usize, TypeId)> {
        self.struct_type(ty)?
            .fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (i, f.ty))
    }

    /// Array dimensions outermost first and the innermost element type.
    pub fn array_dims(&self, mut ty: TypeId) -> (Vec<u32>, TypeId) {
        let mut dims = Vec::new();
        while let Type::Array { element, length } = *self.get(ty) {
            dims.push(length);
            ty = element;
        }
        (dims, ty)
    }

    /// HLSL spelling, for diagnostics.
    pub fn name(&self, ty: TypeId) -> String {
        match self.get(ty) {
            Type::Void => "void".to_owned(),
            Type::Scalar(kind) => kind.name().to_owned(),
            Type::Vector(kind, n) => format!("{}{n}", kind.name()),
            Type::Matrix { scalar, rows, cols } => format!("{}{rows}x{cols}", scalar.name()),
            Type::Array { element, length } => format!("{}[{length}]", self.name(*element)),
            Type::Struct(s) => s.name.clone(),
            Type::Texture(t) => format!("{}<{}>", t.kind.keyword(), self.name(t.element)),
            Type::SamplerState { comparison: false } => "SamplerState".to_owned(),
            Type::SamplerState { comparison: true } => "SamplerComparisonState".to_owned(),
            Type::Buffer { element, writable } => format!(
                "{}StructuredBuffer<{}>",
                if *writable { "RW" } else { "" },
                self.name(*element)
            ),
        }
    }
}
