//! Expression nodes.

use crate::{ExprId, Name, SourceLocation};

use super::TypeSpecifier;

/// Expression operator tag.
///
/// Slot usage of [`Expression::sub`] depends on the operator: unary
/// operators use slot 0, binary operators slots 0 and 1, `Conditional`
/// all three. Calls, constructors and initializer lists keep their
/// operands in [`Expression::arguments`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Operator {
    // Assignment
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    LeftShiftAssign,
    RightShiftAssign,
    AndAssign,
    XorAssign,
    OrAssign,

    Conditional,

    // Binary
    LogicOr,
    LogicAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    LeftShift,
    RightShift,
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Unary
    Plus,
    Neg,
    LogicNot,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,

    // Postfix and primary
    /// `sub[0].identifier`
    FieldSelection,
    /// `sub[0][sub[1]]`
    ArrayIndex,
    /// Callee in `sub[0]` (identifier or field selection), operands in
    /// `arguments`.
    FunctionCall,
    /// `float4(a, b)`: type in `type_specifier`, operands in `arguments`.
    Constructor,
    /// `(float)x`: type in `type_specifier`, operand in `sub[0]`.
    TypeCast,
    /// `{ a, b, c }`
    InitializerList,
    /// `a, b`
    Sequence,
    Identifier,
    UintConstant,
    FloatConstant,
    BoolConstant,
}

impl Operator {
    pub const fn is_assignment(self) -> bool {
        matches!(
            self,
            Operator::Assign
                | Operator::AddAssign
                | Operator::SubAssign
                | Operator::MulAssign
                | Operator::DivAssign
                | Operator::ModAssign
                | Operator::LeftShiftAssign
                | Operator::RightShiftAssign
                | Operator::AndAssign
                | Operator::XorAssign
                | Operator::OrAssign
        )
    }

    /// Binary operator applied by a compound assignment.
    pub const fn compound_binary(self) -> Option<Operator> {
        let op = match self {
            Operator::AddAssign => Operator::Add,
            Operator::SubAssign => Operator::Sub,
            Operator::MulAssign => Operator::Mul,
            Operator::DivAssign => Operator::Div,
            Operator::ModAssign => Operator::Mod,
            Operator::LeftShiftAssign => Operator::LeftShift,
            Operator::RightShiftAssign => Operator::RightShift,
            Operator::AndAssign => Operator::BitAnd,
            Operator::XorAssign => Operator::BitXor,
            Operator::OrAssign => Operator::BitOr,
            _ => return None,
        };
        Some(op)
    }

    pub const fn is_constant(self) -> bool {
        matches!(
            self,
            Operator::UintConstant | Operator::FloatConstant | Operator::BoolConstant
        )
    }

    /// HLSL spelling of operators that have one.
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Assign => "=",
            Operator::AddAssign => "+=",
            Operator::SubAssign => "-=",
            Operator::MulAssign => "*=",
            Operator::DivAssign => "/=",
            Operator::ModAssign => "%=",
            Operator::LeftShiftAssign => "<<=",
            Operator::RightShiftAssign => ">>=",
            Operator::AndAssign => "&=",
            Operator::XorAssign => "^=",
            Operator::OrAssign => "|=",
            Operator::Conditional => "?:",
            Operator::LogicOr => "||",
            Operator::LogicAnd => "&&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::BitAnd => "&",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::LeftShift => "<<",
            Operator::RightShift => ">>",
            Operator::Add | Operator::Plus => "+",
            Operator::Sub | Operator::Neg => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::LogicNot => "!",
            Operator::BitNot => "~",
            Operator::PreInc | Operator::PostInc => "++",
            Operator::PreDec | Operator::PostDec => "--",
            Operator::FieldSelection => ".",
            Operator::ArrayIndex => "[]",
            Operator::Sequence => ",",
            Operator::FunctionCall
            | Operator::Constructor
            | Operator::TypeCast
            | Operator::InitializerList
            | Operator::Identifier
            | Operator::UintConstant
            | Operator::FloatConstant
            | Operator::BoolConstant => "",
        }
    }
}

/// Literal payload, meaningful only for the constant operators.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub enum Literal {
    #[default]
    None,
    Uint(u32),
    Float(f32),
    Bool(bool),
}

/// An expression node.
#[derive(Clone, PartialEq, Debug)]
pub struct Expression {
    pub op: Operator,
    pub sub: [Option<ExprId>; 3],
    pub literal: Literal,
    /// Set for `Identifier` and `FieldSelection`.
    pub identifier: Option<Name>,
    pub arguments: Vec<ExprId>,
    pub type_specifier: Option<Box<TypeSpecifier>>,
    pub loc: SourceLocation,
}

impl Expression {
    fn bare(op: Operator, loc: SourceLocation) -> Self {
        Expression {
            op,
            sub: [None; 3],
            literal: Literal::None,
            identifier: None,
            arguments: Vec::new(),
            type_specifier: None,
            loc,
        }
    }

    pub fn unary(op: Operator, operand: ExprId, loc: SourceLocation) -> Self {
        let mut e = Self::bare(op, loc);
        e.sub[0] = Some(operand);
        e
    }

    pub fn binary(op: Operator, lhs: ExprId, rhs: ExprId, loc: SourceLocation) -> Self {
        let mut e = Self::bare(op, loc);
        e.sub = [Some(lhs), Some(rhs), None];
        e
    }

    pub fn conditional(cond: ExprId, then: ExprId, otherwise: ExprId, loc: SourceLocation) -> Self {
        let mut e = Self::bare(Operator::Conditional, loc);
        e.sub = [Some(cond), Some(then), Some(otherwise)];
        e
    }

    pub fn identifier(name: Name, loc: SourceLocation) -> Self {
        let mut e = Self::bare(Operator::Identifier, loc);
        e.identifier = Some(name);
        e
    }

    pub fn field(base: ExprId, field: Name, loc: SourceLocation) -> Self {
        let mut e = Self::unary(Operator::FieldSelection, base, loc);
        e.identifier = Some(field);
        e
    }

    pub fn literal(literal: Literal, loc: SourceLocation) -> Self {
        let op = match literal {
            Literal::Float(_) => Operator::FloatConstant,
            Literal::Bool(_) => Operator::BoolConstant,
            Literal::Uint(_) | Literal::None => Operator::UintConstant,
        };
        let mut e = Self::bare(op, loc);
        e.literal = literal;
        e
    }

    pub fn call(callee: ExprId, arguments: Vec<ExprId>, loc: SourceLocation) -> Self {
        let mut e = Self::unary(Operator::FunctionCall, callee, loc);
        e.arguments = arguments;
        e
    }

    pub fn constructor(ty: TypeSpecifier, arguments: Vec<ExprId>, loc: SourceLocation) -> Self {
        let mut e = Self::bare(Operator::Constructor, loc);
        e.type_specifier = Some(Box::new(ty));
        e.arguments = arguments;
        e
    }

    pub fn cast(ty: TypeSpecifier, operand: ExprId, loc: SourceLocation) -> Self {
        let mut e = Self::unary(Operator::TypeCast, operand, loc);
        e.type_specifier = Some(Box::new(ty));
        e
    }

    pub fn initializer_list(elements: Vec<ExprId>, loc: SourceLocation) -> Self {
        let mut e = Self::bare(Operator::InitializerList, loc);
        e.arguments = elements;
        e
    }

    #[inline]
    pub fn operand(&self, slot: usize) -> Option<ExprId> {
        self.sub.get(slot).copied().flatten()
    }
}
