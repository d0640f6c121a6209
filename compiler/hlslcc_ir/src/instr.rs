//! Rvalues and instructions.
//!
//! An instruction list is a tree: `If`, `Loop` and `Switch` own their nested
//! blocks. Rvalues are owned trees as well; the only shared identity in the
//! IR is [`VarId`], which every pass uses as its hash key.

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::{FuncId, TypeId, VarId};

// ── Constants ──

/// One scalar component of a constant.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ConstValue {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
}

impl ConstValue {
    pub fn as_f32(self) -> f32 {
        match self {
            ConstValue::Bool(b) => f32::from(u8::from(b)),
            #[expect(clippy::cast_precision_loss, reason = "HLSL int to float conversion")]
            ConstValue::Int(i) => i as f32,
            #[expect(clippy::cast_precision_loss, reason = "HLSL uint to float conversion")]
            ConstValue::Uint(u) => u as f32,
            ConstValue::Float(f) => f,
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "HLSL float to int conversion truncates"
    )]
    pub fn as_i64(self) -> i64 {
        match self {
            ConstValue::Bool(b) => i64::from(b),
            ConstValue::Int(i) => i64::from(i),
            ConstValue::Uint(u) => i64::from(u),
            ConstValue::Float(f) => f as i64,
        }
    }

    pub fn is_true(self) -> bool {
        match self {
            ConstValue::Bool(b) => b,
            ConstValue::Int(i) => i != 0,
            ConstValue::Uint(u) => u != 0,
            ConstValue::Float(f) => f != 0.0,
        }
    }
}

// ── Swizzles and write masks ──

/// Component selection such as `.zyx`; up to four components, each 0..4.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Swizzle {
    components: [u8; 4],
    count: u8,
}

impl Swizzle {
    /// `None` for more than four components or an index past `w`.
    pub fn new(components: &[u8]) -> Option<Self> {
        if components.is_empty() || components.len() > 4 || components.iter().any(|&c| c > 3) {
            return None;
        }
        let mut out = [0; 4];
        out[..components.len()].copy_from_slice(components);
        #[expect(clippy::cast_possible_truncation, reason = "length checked above")]
        let count = components.len() as u8;
        Some(Swizzle {
            components: out,
            count,
        })
    }

    /// `.x`, `.xy`, ... of the given length.
    pub fn identity(count: u8) -> Self {
        Swizzle {
            components: [0, 1, 2, 3],
            count: count.clamp(1, 4),
        }
    }

    /// A single component.
    pub fn single(component: u8) -> Self {
        Swizzle {
            components: [component.min(3), 0, 0, 0],
            count: 1,
        }
    }

    /// Parse HLSL swizzle letters, `xyzw` or `rgba` (not mixed).
    pub fn parse(text: &str) -> Option<Self> {
        let rgba = text.chars().all(|c| "rgba".contains(c));
        let mut components = SmallVec::<[u8; 4]>::new();
        for c in text.chars() {
            let index = if rgba { "rgba".find(c) } else { "xyzw".find(c) }?;
            #[expect(clippy::cast_possible_truncation, reason = "index is below 4")]
            components.push(index as u8);
        }
        Swizzle::new(&components)
    }

    #[inline]
    pub fn len(self) -> u8 {
        self.count
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn get(self, i: usize) -> u8 {
        self.components[i]
    }

    pub fn components(&self) -> &[u8] {
        &self.components[..self.count as usize]
    }

    /// `.xyz` on a three-component value, `.xy` on two, ...
    pub fn is_identity_for(self, size: u8) -> bool {
        self.count == size && self.components().iter().enumerate().all(|(i, &c)| c as usize == i)
    }

    /// Selecting `self` from the result of `inner`, as one swizzle.
    pub fn compose(self, inner: Swizzle) -> Swizzle {
        let mut components = [0; 4];
        for (i, &c) in self.components().iter().enumerate() {
            components[i] = inner.components[c as usize];
        }
        Swizzle {
            components,
            count: self.count,
        }
    }

    /// Channels read.
    pub fn mask(self) -> WriteMask {
        self.components()
            .iter()
            .fold(WriteMask::empty(), |m, &c| m | WriteMask::channel(c))
    }

    /// `.xyzw` letters.
    pub fn letters(self) -> String {
        self.components()
            .iter()
            .map(|&c| char::from(b"xyzw"[c as usize]))
            .collect()
    }
}

impl fmt::Debug for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.letters())
    }
}

bitflags! {
    /// Channels of a vector written by an assignment.
    ///
    /// Empty means the whole destination, which is how assignments to
    /// scalars, matrices, arrays and structs are written.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct WriteMask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const W = 1 << 3;
    }
}

impl WriteMask {
    pub fn channel(index: u8) -> Self {
        WriteMask::from_bits_truncate(1 << index.min(3))
    }

    /// The first `count` channels.
    pub fn first(count: u8) -> Self {
        WriteMask::from_bits_truncate((1u8 << count.min(4)) - 1)
    }

    pub fn count(self) -> u8 {
        #[expect(clippy::cast_possible_truncation, reason = "at most four bits set")]
        let n = self.bits().count_ones() as u8;
        n
    }

    /// Written channel indices, ascending.
    pub fn channels(self) -> impl Iterator<Item = u8> {
        (0..4u8).filter(move |&c| self.contains(WriteMask::channel(c)))
    }

    /// Swizzle naming the written channels, for printing `lhs.xz`.
    pub fn as_swizzle(self) -> Option<Swizzle> {
        let channels: SmallVec<[u8; 4]> = self.channels().collect();
        Swizzle::new(&channels)
    }
}

// ── Operators ──

/// Operators of [`RvalueKind::Expr`].
///
/// Built-in functions are operators too, so every pass treats `dot(a, b)`
/// exactly like `a + b`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ExprOp {
    // Unary
    Neg,
    LogicNot,
    BitNot,
    Abs,
    Sign,
    Rcp,
    Rsqrt,
    Sqrt,
    Exp,
    Exp2,
    Log,
    Log2,
    Saturate,
    Trunc,
    Ceil,
    Floor,
    Fract,
    Round,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Normalize,
    Length,
    Ddx,
    Ddy,
    Fwidth,
    IsNan,
    IsInf,
    Any,
    All,
    Transpose,
    Determinant,
    /// Numeric conversion to the result type.
    Convert,
    AsFloat,
    AsInt,
    AsUint,
    CountBits,
    ReverseBits,
    FirstBitHigh,
    FirstBitLow,
    // Binary
    Add,
    Sub,
    Mul,
    Div,
    /// Integer remainder.
    Mod,
    /// Floating-point remainder.
    FMod,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    LeftShift,
    RightShift,
    BitAnd,
    BitXor,
    BitOr,
    LogicAnd,
    LogicXor,
    LogicOr,
    Dot,
    Cross,
    Min,
    Max,
    Atan2,
    Pow,
    Step,
    Distance,
    Reflect,
    /// HLSL `mul(a, b)`.
    MatMul,
    Ldexp,
    // Ternary
    Lerp,
    Smoothstep,
    Clamp,
    Fma,
    Refract,
    /// Component-wise `c ? a : b`, operands `[c, a, b]`.
    Select,
    /// Vector, matrix or array constructor; any operand count.
    Construct,
}

impl ExprOp {
    pub const COUNT: usize = 84;

    pub const ALL: [ExprOp; Self::COUNT] = [
        ExprOp::Neg,
        ExprOp::LogicNot,
        ExprOp::BitNot,
        ExprOp::Abs,
        ExprOp::Sign,
        ExprOp::Rcp,
        ExprOp::Rsqrt,
        ExprOp::Sqrt,
        ExprOp::Exp,
        ExprOp::Exp2,
        ExprOp::Log,
        ExprOp::Log2,
        ExprOp::Saturate,
        ExprOp::Trunc,
        ExprOp::Ceil,
        ExprOp::Floor,
        ExprOp::Fract,
        ExprOp::Round,
        ExprOp::Sin,
        ExprOp::Cos,
        ExprOp::Tan,
        ExprOp::Asin,
        ExprOp::Acos,
        ExprOp::Atan,
        ExprOp::Sinh,
        ExprOp::Cosh,
        ExprOp::Tanh,
        ExprOp::Normalize,
        ExprOp::Length,
        ExprOp::Ddx,
        ExprOp::Ddy,
        ExprOp::Fwidth,
        ExprOp::IsNan,
        ExprOp::IsInf,
        ExprOp::Any,
        ExprOp::All,
        ExprOp::Transpose,
        ExprOp::Determinant,
        ExprOp::Convert,
        ExprOp::AsFloat,
        ExprOp::AsInt,
        ExprOp::AsUint,
        ExprOp::CountBits,
        ExprOp::ReverseBits,
        ExprOp::FirstBitHigh,
        ExprOp::FirstBitLow,
        ExprOp::Add,
        ExprOp::Sub,
        ExprOp::Mul,
        ExprOp::Div,
        ExprOp::Mod,
        ExprOp::FMod,
        ExprOp::Less,
        ExprOp::Greater,
        ExprOp::LessEqual,
        ExprOp::GreaterEqual,
        ExprOp::Equal,
        ExprOp::NotEqual,
        ExprOp::LeftShift,
        ExprOp::RightShift,
        ExprOp::BitAnd,
        ExprOp::BitXor,
        ExprOp::BitOr,
        ExprOp::LogicAnd,
        ExprOp::LogicXor,
        ExprOp::LogicOr,
        ExprOp::Dot,
        ExprOp::Cross,
        ExprOp::Min,
        ExprOp::Max,
        ExprOp::Atan2,
        ExprOp::Pow,
        ExprOp::Step,
        ExprOp::Distance,
        ExprOp::Reflect,
        ExprOp::MatMul,
        ExprOp::Ldexp,
        ExprOp::Lerp,
        ExprOp::Smoothstep,
        ExprOp::Clamp,
        ExprOp::Fma,
        ExprOp::Refract,
        ExprOp::Select,
        ExprOp::Construct,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Fixed operand count; `None` for [`ExprOp::Construct`].
    pub const fn arity(self) -> Option<usize> {
        let n = match self {
            ExprOp::Construct => return None,
            ExprOp::Lerp
            | ExprOp::Smoothstep
            | ExprOp::Clamp
            | ExprOp::Fma
            | ExprOp::Refract
            | ExprOp::Select => 3,
            ExprOp::Add
            | ExprOp::Sub
            | ExprOp::Mul
            | ExprOp::Div
            | ExprOp::Mod
            | ExprOp::FMod
            | ExprOp::Less
            | ExprOp::Greater
            | ExprOp::LessEqual
            | ExprOp::GreaterEqual
            | ExprOp::Equal
            | ExprOp::NotEqual
            | ExprOp::LeftShift
            | ExprOp::RightShift
            | ExprOp::BitAnd
            | ExprOp::BitXor
            | ExprOp::BitOr
            | ExprOp::LogicAnd
            | ExprOp::LogicXor
            | ExprOp::LogicOr
            | ExprOp::Dot
            | ExprOp::Cross
            | ExprOp::Min
            | ExprOp::Max
            | ExprOp::Atan2
            | ExprOp::Pow
            | ExprOp::Step
            | ExprOp::Distance
            | ExprOp::Reflect
            | ExprOp::MatMul
            | ExprOp::Ldexp => 2,
            _ => 1,
        };
        Some(n)
    }

    /// Derivatives depend on neighbouring invocations and must stay in
    /// uniform control flow, so they are never moved or merged.
    pub const fn is_pure(self) -> bool {
        !matches!(self, ExprOp::Ddx | ExprOp::Ddy | ExprOp::Fwidth)
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            ExprOp::Less
                | ExprOp::Greater
                | ExprOp::LessEqual
                | ExprOp::GreaterEqual
                | ExprOp::Equal
                | ExprOp::NotEqual
        )
    }
}

// ── Rvalues ──

/// Texture operation of [`TextureOp`].
#[derive(Clone, PartialEq, Debug)]
pub enum TextureOpKind {
    Sample,
    SampleLevel(Rvalue),
    SampleBias(Rvalue),
    SampleGrad { ddx: Rvalue, ddy: Rvalue },
    SampleCompare(Rvalue),
    SampleCompareLevelZero(Rvalue),
    /// Texel fetch; `lod` is absent for multisampled textures, which take
    /// `sample` instead.
    Read {
        lod: Option<Rvalue>,
        sample: Option<Rvalue>,
    },
    /// One `GetDimensions` output; `component` 0..3 is width, height,
    /// depth or array size, then [`Self::SIZE_MIP_LEVELS`] and
    /// [`Self::SIZE_SAMPLES`].
    Size { lod: Option<Rvalue>, component: u8 },
}

impl TextureOpKind {
    pub const SIZE_MIP_LEVELS: u8 = 4;
    pub const SIZE_SAMPLES: u8 = 5;
}

#[derive(Clone, PartialEq, Debug)]
pub struct TextureOp {
    pub texture: Rvalue,
    pub sampler: Option<Rvalue>,
    pub coordinate: Rvalue,
    pub kind: TextureOpKind,
    pub offset: Option<Rvalue>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum RvalueKind {
    /// Components in order; matrices row by row.
    Constant(SmallVec<[ConstValue; 4]>),
    Var(VarId),
    /// Array element, matrix row or buffer element.
    Index {
        base: Box<Rvalue>,
        index: Box<Rvalue>,
    },
    Field {
        base: Box<Rvalue>,
        field: usize,
    },
    Swizzle {
        base: Box<Rvalue>,
        swizzle: Swizzle,
    },
    Expr {
        op: ExprOp,
        operands: Vec<Rvalue>,
    },
    Texture(Box<TextureOp>),
}

/// A typed value tree.
#[derive(Clone, PartialEq, Debug)]
pub struct Rvalue {
    pub ty: TypeId,
    pub kind: RvalueKind,
}

impl Rvalue {
    pub fn new(ty: TypeId, kind: RvalueKind) -> Self {
        Rvalue { ty, kind }
    }

    pub fn var(var: VarId, ty: TypeId) -> Self {
        Rvalue::new(ty, RvalueKind::Var(var))
    }

    pub fn constant(ty: TypeId, values: impl IntoIterator<Item = ConstValue>) -> Self {
        Rvalue::new(ty, RvalueKind::Constant(values.into_iter().collect()))
    }

    pub fn float(value: f32) -> Self {
        Rvalue::constant(TypeId::FLOAT, [ConstValue::Float(value)])
    }

    pub fn int(value: i32) -> Self {
        Rvalue::constant(TypeId::INT, [ConstValue::Int(value)])
    }

    pub fn uint(value: u32) -> Self {
        Rvalue::constant(TypeId::UINT, [ConstValue::Uint(value)])
    }

    pub fn bool(value: bool) -> Self {
        Rvalue::constant(TypeId::BOOL, [ConstValue::Bool(value)])
    }

    pub fn expr(ty: TypeId, op: ExprOp, operands: Vec<Rvalue>) -> Self {
        Rvalue::new(ty, RvalueKind::Expr { op, operands })
    }

    pub fn index(self, index: Rvalue, ty: TypeId) -> Self {
        Rvalue::new(
            ty,
            RvalueKind::Index {
                base: Box::new(self),
                index: Box::new(index),
            },
        )
    }

    pub fn field(self, field: usize, ty: TypeId) -> Self {
        Rvalue::new(
            ty,
            RvalueKind::Field {
                base: Box::new(self),
                field,
            },
        )
    }

    /// Swizzle of `self`, folding swizzles of swizzles into one.
    pub fn swizzle(self, swizzle: Swizzle, ty: TypeId) -> Self {
        match self.kind {
            RvalueKind::Swizzle {
                base,
                swizzle: inner,
            } => Rvalue::new(
                ty,
                RvalueKind::Swizzle {
                    base,
                    swizzle: swizzle.compose(inner),
                },
            ),
            kind => Rvalue::new(
                ty,
                RvalueKind::Swizzle {
                    base: Box::new(Rvalue::new(self.ty, kind)),
                    swizzle,
                },
            ),
        }
    }

    pub fn as_var(&self) -> Option<VarId> {
        match self.kind {
            RvalueKind::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&[ConstValue]> {
        match &self.kind {
            RvalueKind::Constant(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, RvalueKind::Constant(_))
    }

    /// Variable at the root of an lvalue chain (`a.b[i].c` gives `a`).
    pub fn root_var(&self) -> Option<VarId> {
        match &self.kind {
            RvalueKind::Var(v) => Some(*v),
            RvalueKind::Index { base, .. }
            | RvalueKind::Field { base, .. }
            | RvalueKind::Swizzle { base, .. } => base.root_var(),
            _ => None,
        }
    }

    /// True when evaluating `self` twice gives the same result and has no
    /// effect.
    pub fn is_pure(&self) -> bool {
        let mut pure = true;
        self.walk(&mut |r| {
            if let RvalueKind::Expr { op, .. } = &r.kind {
                pure &= op.is_pure();
            }
        });
        pure
    }
}

// ── Instructions ──

/// `lhs.mask = rhs`, executed only when `condition` holds.
#[derive(Clone, PartialEq, Debug)]
pub struct Assignment {
    /// A variable, optionally followed by index and field selections.
    pub lhs: Rvalue,
    pub rhs: Rvalue,
    pub write_mask: WriteMask,
    pub condition: Option<Rvalue>,
}

impl Assignment {
    pub fn new(lhs: Rvalue, rhs: Rvalue) -> Self {
        Assignment {
            lhs,
            rhs,
            write_mask: WriteMask::empty(),
            condition: None,
        }
    }

    pub fn masked(lhs: Rvalue, rhs: Rvalue, write_mask: WriteMask) -> Self {
        Assignment {
            lhs,
            rhs,
            write_mask,
            condition: None,
        }
    }

    /// The assignment has a constant false condition and does nothing.
    pub fn is_dead(&self) -> bool {
        self.condition
            .as_ref()
            .and_then(Rvalue::as_constant)
            .is_some_and(|c| c.first().is_some_and(|v| !v.is_true()))
    }

    /// Destination when it is a whole variable rather than an element.
    pub fn whole_var(&self) -> Option<VarId> {
        self.lhs.as_var()
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum CaseLabel {
    Value(ConstValue),
    Default,
}

/// Labels and the statements that follow them; falls through when the
/// body does not end in `Break`.
#[derive(Clone, PartialEq, Debug)]
pub struct SwitchCase {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Instruction>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Instruction {
    /// Start of a local variable's lifetime.
    Declare(VarId),
    Assign(Assignment),
    /// Call of a user function. Arguments for `out` and `inout`
    /// parameters are lvalues.
    Call {
        callee: FuncId,
        args: Vec<Rvalue>,
        result: Option<Rvalue>,
    },
    If {
        condition: Rvalue,
        then_branch: Vec<Instruction>,
        else_branch: Vec<Instruction>,
    },
    /// Runs until a `Break`.
    Loop { body: Vec<Instruction> },
    Switch {
        selector: Rvalue,
        cases: Vec<SwitchCase>,
    },
    Break,
    Continue,
    Return(Option<Rvalue>),
    Discard,
    /// `texture[coordinate] = value` on a writable texture.
    TextureStore {
        texture: Rvalue,
        coordinate: Rvalue,
        value: Rvalue,
    },
    /// Group memory barrier with group sync.
    Barrier,
}

impl Instruction {
    pub fn assign(lhs: Rvalue, rhs: Rvalue) -> Self {
        Instruction::Assign(Assignment::new(lhs, rhs))
    }

    /// Nested instruction blocks, in execution order.
    pub fn blocks(&self) -> SmallVec<[&Vec<Instruction>; 2]> {
        match self {
            Instruction::If {
                then_branch,
                else_branch,
                ..
            } => SmallVec::from_iter([then_branch, else_branch]),
            Instruction::Loop { body } => SmallVec::from_iter([body]),
            Instruction::Switch { cases, .. } => cases.iter().map(|c| &c.body).collect(),
            _ => SmallVec::new(),
        }
    }

    pub fn blocks_mut(&mut self) -> SmallVec<[&mut Vec<Instruction>; 2]> {
        match self {
            Instruction::If {
                then_branch,
                else_branch,
                ..
            } => SmallVec::from_iter([then_branch, else_branch]),
            Instruction::Loop { body } => SmallVec::from_iter([body]),
            Instruction::Switch { cases, .. } => cases.iter_mut().map(|c| &mut c.body).collect(),
            _ => SmallVec::new(),
        }
    }
}
