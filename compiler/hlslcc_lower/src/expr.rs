//! Expressions, implicit conversions and assignments.
//!
//! Lowering an expression may emit instructions (assignments, temporaries
//! for `?:` and `x++`) into the current block and returns the rvalue that
//! reads its result. Conversions never emit; they only wrap or fold.

use std::collections::VecDeque;

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_ir::{
    Assignment, ConstValue, ExprOp, Instruction, Rvalue, RvalueKind, Swizzle, TextureOp,
    TextureOpKind, Type, TypeId, VarId, VarMode, WriteMask,
};
use hlslcc_stack::ensure_sufficient_stack;
use hlslcc_syntax::ast::{Literal, Operator, TypeSpecifier};
use hlslcc_syntax::{ExprId, NumericType, ScalarKind, Shape, SourceLocation};
use smallvec::SmallVec;

use crate::call::coordinate_size;
use crate::Lowerer;

/// Assignment destination.
pub(crate) enum Lvalue {
    /// A variable chain, optionally narrowed by a swizzle.
    Value {
        lhs: Rvalue,
        swizzle: Option<Swizzle>,
    },
    /// `rwtexture[coordinate]`.
    Texel { texture: Rvalue, coordinate: Rvalue },
}

/// Result of a call that returns nothing.
pub(crate) fn void_value() -> Rvalue {
    Rvalue::constant(TypeId::VOID, [])
}

const fn rank(kind: ScalarKind) -> u8 {
    match kind {
        ScalarKind::Bool => 0,
        ScalarKind::Int => 1,
        ScalarKind::Uint => 2,
        ScalarKind::Half => 3,
        ScalarKind::Float => 4,
    }
}

pub(crate) fn wider(a: ScalarKind, b: ScalarKind) -> ScalarKind {
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}

/// Shape of a binary operation's result, with HLSL's implicit truncation of
/// the longer operand.
pub(crate) fn common_shape(a: Shape, b: Shape) -> Option<Shape> {
    match (a, b) {
        (Shape::Scalar, s) | (s, Shape::Scalar) => Some(s),
        (Shape::Vector(n), Shape::Vector(m)) => Some(Shape::Vector(n.min(m))),
        (Shape::Matrix { rows: r1, cols: c1 }, Shape::Matrix { rows: r2, cols: c2 }) => {
            Some(Shape::Matrix {
                rows: r1.min(r2),
                cols: c1.min(c2),
            })
        }
        _ => None,
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "HLSL conversions wrap and truncate"
)]
fn fold_kind(value: ConstValue, kind: ScalarKind) -> ConstValue {
    match kind {
        ScalarKind::Bool => ConstValue::Bool(value.is_true()),
        ScalarKind::Int => ConstValue::Int(value.as_i64() as i32),
        ScalarKind::Uint => ConstValue::Uint(value.as_i64() as u32),
        ScalarKind::Half | ScalarKind::Float => ConstValue::Float(value.as_f32()),
    }
}

fn negate(value: ConstValue) -> ConstValue {
    match value {
        ConstValue::Bool(b) => ConstValue::Int(-i32::from(b)),
        ConstValue::Int(i) => ConstValue::Int(i.wrapping_neg()),
        ConstValue::Uint(u) => ConstValue::Uint(u.wrapping_neg()),
        ConstValue::Float(f) => ConstValue::Float(-f),
    }
}

fn is_lvalue_chain(value: &Rvalue) -> bool {
    match &value.kind {
        RvalueKind::Var(_) => true,
        RvalueKind::Index { base, .. } | RvalueKind::Field { base, .. } => is_lvalue_chain(base),
        _ => false,
    }
}

/// `_m01_m10` or `_12_21`, as zero-based (row, column) pairs.
fn matrix_elements(text: &str) -> Option<SmallVec<[(u8, u8); 4]>> {
    let mut out = SmallVec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let after = rest.strip_prefix('_')?;
        let (zero_based, digits) = match after.strip_prefix('m') {
            Some(d) => (true, d),
            None => (false, after),
        };
        let bytes = digits.as_bytes();
        if bytes.len() < 2 || !bytes[0].is_ascii_digit() || !bytes[1].is_ascii_digit() {
            return None;
        }
        let (row, col) = (bytes[0] - b'0', bytes[1] - b'0');
        let element = if zero_based {
            (row, col)
        } else {
            (row.checked_sub(1)?, col.checked_sub(1)?)
        };
        out.push(element);
        rest = &digits[2..];
    }
    (1..=4).contains(&out.len()).then_some(out)
}

impl Lowerer<'_> {
    pub(crate) fn lower_expr(&mut self, id: ExprId) -> Result<Rvalue, SourceError> {
        ensure_sufficient_stack(|| self.lower_expr_inner(id))
    }

    fn lower_expr_inner(&mut self, id: ExprId) -> Result<Rvalue, SourceError> {
        let unit = self.unit;
        let expr = &unit.arena[id];
        let loc = expr.loc;
        let operand = |slot: usize| {
            expr.operand(slot).ok_or_else(|| {
                hlslcc_diagnostic::internal_error(
                    ErrorCode::E9002,
                    format!("'{}' node without operand {slot}", expr.op.symbol()),
                )
            })
        };

        match expr.op {
            Operator::Identifier => {
                let name = expr.identifier.ok_or_else(|| {
                    hlslcc_diagnostic::internal_error(ErrorCode::E9002, "identifier without name")
                })?;
                match self.lookup_var(name) {
                    Some(var) => Ok(Rvalue::var(var, self.module[var].ty)),
                    None => Err(hlslcc_diagnostic::unknown_identifier(
                        &unit.files,
                        loc,
                        self.name(name),
                    )),
                }
            }
            Operator::UintConstant => Ok(match expr.literal {
                Literal::Uint(u) => match i32::try_from(u) {
                    Ok(i) => Rvalue::int(i),
                    Err(_) => Rvalue::uint(u),
                },
                _ => Rvalue::int(0),
            }),
            Operator::FloatConstant => Ok(match expr.literal {
                Literal::Float(f) => Rvalue::float(f),
                _ => Rvalue::float(0.0),
            }),
            Operator::BoolConstant => Ok(Rvalue::bool(matches!(expr.literal, Literal::Bool(true)))),

            Operator::FieldSelection => {
                let field = expr.identifier.ok_or_else(|| {
                    hlslcc_diagnostic::internal_error(ErrorCode::E9002, "field without name")
                })?;
                let base = self.lower_expr(operand(0)?)?;
                self.select_field(base, self.name(field), loc)
            }
            Operator::ArrayIndex => {
                let base = self.lower_expr(operand(0)?)?;
                let index = self.lower_expr(operand(1)?)?;
                self.index_value(base, index, loc)
            }
            Operator::FunctionCall => self.lower_call(operand(0)?, &expr.arguments, loc),
            Operator::Constructor => {
                let spec = expr.type_specifier.as_deref().ok_or_else(|| {
                    hlslcc_diagnostic::internal_error(ErrorCode::E9002, "constructor without type")
                })?;
                self.lower_constructor(spec, &expr.arguments, loc)
            }
            Operator::TypeCast => {
                let spec = expr.type_specifier.as_deref().ok_or_else(|| {
                    hlslcc_diagnostic::internal_error(ErrorCode::E9002, "cast without type")
                })?;
                self.lower_cast(spec, operand(0)?, loc)
            }
            Operator::InitializerList => Err(self.error(
                ErrorCode::E2008,
                loc,
                "initializer list is only allowed in a declaration",
            )),
            Operator::Sequence => {
                let mut last = void_value();
                for &item in &expr.arguments {
                    last = self.lower_expr(item)?;
                }
                Ok(last)
            }
            Operator::Conditional => {
                self.lower_conditional(operand(0)?, operand(1)?, operand(2)?, loc)
            }

            Operator::Plus => self.lower_expr(operand(0)?),
            Operator::Neg | Operator::LogicNot | Operator::BitNot => {
                let value = self.lower_expr(operand(0)?)?;
                self.unary(expr.op, value, loc)
            }
            Operator::PreInc | Operator::PreDec | Operator::PostInc | Operator::PostDec => {
                self.lower_increment(expr.op, operand(0)?, loc)
            }

            op if op.is_assignment() => {
                let target = self.lower_lvalue(operand(0)?, loc)?;
                let rhs = self.lower_expr(operand(1)?)?;
                let value = match op.compound_binary() {
                    Some(binary) => {
                        let current = self.read_target(&target);
                        self.binary(binary, current, rhs, loc)?
                    }
                    None => rhs,
                };
                self.store(&target, value, loc)
            }

            op => {
                let lhs = self.lower_expr(operand(0)?)?;
                let rhs = self.lower_expr(operand(1)?)?;
                self.binary(op, lhs, rhs, loc)
            }
        }
    }

    // ── Conversions ──

    fn conversion_error(&self, from: TypeId, to: TypeId, loc: SourceLocation) -> SourceError {
        self.error(
            ErrorCode::E2006,
            loc,
            format!(
                "cannot convert from '{}' to '{}'",
                self.type_name(from),
                self.type_name(to)
            ),
        )
    }

    /// Implicit or explicit conversion of `value` to `target`.
    pub(crate) fn convert(
        &mut self,
        value: Rvalue,
        target: TypeId,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        if value.ty == target {
            return Ok(value);
        }
        let (Some(from), Some(to)) = (self.numeric_of(value.ty), self.numeric_of(target)) else {
            return Err(self.conversion_error(value.ty, target, loc));
        };
        let same_kind = NumericType {
            scalar: from.scalar,
            shape: to.shape,
        };
        let reshaped = match (from.shape, to.shape) {
            (a, b) if a == b => value,
            (Shape::Scalar, _) => {
                let scalar_ty = self.module.types.scalar(to.scalar);
                let scalar = self.convert_kind(value, scalar_ty);
                return Ok(self.splat(scalar, target));
            }
            (Shape::Vector(_), Shape::Scalar) => {
                let ty = self.intern_numeric(same_kind);
                value.swizzle(Swizzle::single(0), ty)
            }
            (Shape::Vector(n), Shape::Vector(m)) if m < n => {
                let ty = self.intern_numeric(same_kind);
                value.swizzle(Swizzle::identity(m), ty)
            }
            (Shape::Matrix { cols, .. }, Shape::Scalar) => {
                let row_ty = self.module.types.vector(from.scalar, cols);
                let ty = self.intern_numeric(same_kind);
                value
                    .index(Rvalue::int(0), row_ty)
                    .swizzle(Swizzle::single(0), ty)
            }
            (Shape::Matrix { rows: r1, cols: c1 }, Shape::Matrix { rows: r2, cols: c2 })
                if r2 <= r1 && c2 <= c1 =>
            {
                let src_row = self.module.types.vector(from.scalar, c1);
                let dst_row = self.module.types.vector(from.scalar, c2);
                let rows = (0..r2)
                    .map(|r| {
                        let row = value.clone().index(Rvalue::int(i32::from(r)), src_row);
                        if c2 == c1 {
                            row
                        } else {
                            row.swizzle(Swizzle::identity(c2), dst_row)
                        }
                    })
                    .collect();
                let ty = self.intern_numeric(same_kind);
                Rvalue::expr(ty, ExprOp::Construct, rows)
            }
            _ => return Err(self.conversion_error(value.ty, target, loc)),
        };
        Ok(self.convert_kind(reshaped, target))
    }

    /// Change the element kind of a value whose shape already matches.
    pub(crate) fn convert_kind(&mut self, value: Rvalue, target: TypeId) -> Rvalue {
        if value.ty == target {
            return value;
        }
        let Some(kind) = self.module.types.scalar_kind(target) else {
            return value;
        };
        let from = value.ty;
        match value.kind {
            RvalueKind::Constant(values) => {
                Rvalue::constant(target, values.into_iter().map(|v| fold_kind(v, kind)))
            }
            other => Rvalue::expr(target, ExprOp::Convert, vec![Rvalue::new(from, other)]),
        }
    }

    /// Scalar replicated to every component of `target`.
    fn splat(&mut self, scalar: Rvalue, target: TypeId) -> Rvalue {
        if let Some(&value) = scalar.as_constant().and_then(<[ConstValue]>::first) {
            let components = self.module.types.components(target) as usize;
            return Rvalue::constant(target, std::iter::repeat(value).take(components));
        }
        match self.numeric_of(target) {
            // A one-argument matrix constructor is a diagonal matrix in
            // Metal, so splat each row.
            Some(NumericType {
                scalar: kind,
                shape: Shape::Matrix { rows, cols },
            }) => {
                let row_ty = self.module.types.vector(kind, cols);
                let row = Rvalue::expr(row_ty, ExprOp::Construct, vec![scalar]);
                Rvalue::expr(target, ExprOp::Construct, vec![row; usize::from(rows)])
            }
            _ => Rvalue::expr(target, ExprOp::Construct, vec![scalar]),
        }
    }

    /// Scalar boolean for `if`, loops and `?:`.
    pub(crate) fn condition(&mut self, value: Rvalue, loc: SourceLocation) -> Result<Rvalue, SourceError> {
        self.convert(value, TypeId::BOOL, loc)
    }

    /// Integer for array and buffer indexing.
    fn index_scalar(&mut self, index: Rvalue, loc: SourceLocation) -> Result<Rvalue, SourceError> {
        match *self.module.types.get(index.ty) {
            Type::Scalar(ScalarKind::Int | ScalarKind::Uint) => Ok(index),
            Type::Scalar(_) => self.convert(index, TypeId::INT, loc),
            _ => Err(self.error(
                ErrorCode::E2006,
                loc,
                format!("index of type '{}' is not a scalar", self.type_name(index.ty)),
            )),
        }
    }

    /// Every scalar of a numeric value, in component order.
    pub(crate) fn scalar_parts(&mut self, value: Rvalue) -> Vec<Rvalue> {
        match *self.module.types.get(value.ty) {
            Type::Vector(kind, n) => {
                let ty = self.module.types.scalar(kind);
                (0..n)
                    .map(|c| value.clone().swizzle(Swizzle::single(c), ty))
                    .collect()
            }
            Type::Matrix { scalar, rows, cols } => {
                let row_ty = self.module.types.vector(scalar, cols);
                let ty = self.module.types.scalar(scalar);
                (0..rows)
                    .flat_map(|r| {
                        let row = value.clone().index(Rvalue::int(i32::from(r)), row_ty);
                        (0..cols).map(move |c| row.clone().swizzle(Swizzle::single(c), ty))
                    })
                    .collect()
            }
            _ => vec![value],
        }
    }

    // ── Operators ──

    fn unary(&mut self, op: Operator, value: Rvalue, loc: SourceLocation) -> Result<Rvalue, SourceError> {
        let Some(numeric) = self.numeric_of(value.ty) else {
            return Err(self.error(
                ErrorCode::E2006,
                loc,
                format!(
                    "operator '{}' cannot be applied to '{}'",
                    op.symbol(),
                    self.type_name(value.ty)
                ),
            ));
        };
        match op {
            Operator::Neg => {
                let kind = if numeric.scalar == ScalarKind::Bool {
                    ScalarKind::Int
                } else {
                    numeric.scalar
                };
                let ty = self.module.types.with_scalar(value.ty, kind);
                let value = self.convert_kind(value, ty);
                if let Some(values) = value.as_constant() {
                    return Ok(Rvalue::constant(ty, values.iter().map(|&v| negate(v))));
                }
                Ok(Rvalue::expr(ty, ExprOp::Neg, vec![value]))
            }
            Operator::LogicNot => {
                let ty = self.module.types.with_scalar(value.ty, ScalarKind::Bool);
                let value = self.convert_kind(value, ty);
                if let Some(values) = value.as_constant() {
                    return Ok(Rvalue::constant(
                        ty,
                        values.iter().map(|v| ConstValue::Bool(!v.is_true())),
                    ));
                }
                Ok(Rvalue::expr(ty, ExprOp::LogicNot, vec![value]))
            }
            _ => {
                if !numeric.scalar.is_integer() {
                    return Err(self.error(
                        ErrorCode::E2006,
                        loc,
                        format!("operator '~' requires an integer, got '{}'", self.type_name(value.ty)),
                    ));
                }
                Ok(Rvalue::expr(value.ty, ExprOp::BitNot, vec![value]))
            }
        }
    }

    /// Binary operator with the usual arithmetic conversions.
    pub(crate) fn binary(
        &mut self,
        op: Operator,
        lhs: Rvalue,
        rhs: Rvalue,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let (Some(a), Some(b)) = (self.numeric_of(lhs.ty), self.numeric_of(rhs.ty)) else {
            return Err(self.operand_error(op, &lhs, &rhs, loc));
        };
        let Some(shape) = common_shape(a.shape, b.shape) else {
            return Err(self.operand_error(op, &lhs, &rhs, loc));
        };
        let mut kind = wider(a.scalar, b.scalar);
        let ir_op = match op {
            Operator::Add => ExprOp::Add,
            Operator::Sub => ExprOp::Sub,
            Operator::Mul => ExprOp::Mul,
            Operator::Div => ExprOp::Div,
            Operator::Mod if kind.is_float() => ExprOp::FMod,
            Operator::Mod => ExprOp::Mod,
            Operator::Less => ExprOp::Less,
            Operator::Greater => ExprOp::Greater,
            Operator::LessEqual => ExprOp::LessEqual,
            Operator::GreaterEqual => ExprOp::GreaterEqual,
            Operator::Equal => ExprOp::Equal,
            Operator::NotEqual => ExprOp::NotEqual,
            Operator::LeftShift => ExprOp::LeftShift,
            Operator::RightShift => ExprOp::RightShift,
            Operator::BitAnd if kind == ScalarKind::Bool => ExprOp::LogicAnd,
            Operator::BitOr if kind == ScalarKind::Bool => ExprOp::LogicOr,
            Operator::BitXor if kind == ScalarKind::Bool => ExprOp::LogicXor,
            Operator::BitAnd => ExprOp::BitAnd,
            Operator::BitOr => ExprOp::BitOr,
            Operator::BitXor => ExprOp::BitXor,
            Operator::LogicAnd => ExprOp::LogicAnd,
            Operator::LogicOr => ExprOp::LogicOr,
            other => {
                return Err(hlslcc_diagnostic::internal_error(
                    ErrorCode::E9002,
                    format!("'{}' is not a binary operator", other.symbol()),
                ))
            }
        };
        let logic = matches!(ir_op, ExprOp::LogicAnd | ExprOp::LogicOr | ExprOp::LogicXor);
        match ir_op {
            _ if logic => kind = ScalarKind::Bool,
            ExprOp::LeftShift
            | ExprOp::RightShift
            | ExprOp::BitAnd
            | ExprOp::BitOr
            | ExprOp::BitXor
                if !kind.is_integer() =>
            {
                return Err(self.error(
                    ErrorCode::E2006,
                    loc,
                    format!("operator '{}' requires integer operands", op.symbol()),
                ));
            }
            ExprOp::Add | ExprOp::Sub | ExprOp::Mul | ExprOp::Div | ExprOp::Mod
                if kind == ScalarKind::Bool =>
            {
                kind = ScalarKind::Int;
            }
            _ => {}
        }

        // Metal's matrix operators are linear algebra, HLSL's are
        // component-wise; split into rows unless both mean the same.
        if let Shape::Matrix { rows, cols } = shape {
            let both_matrices = a.shape != Shape::Scalar && b.shape != Shape::Scalar;
            let same_in_metal = match ir_op {
                ExprOp::Add | ExprOp::Sub => both_matrices,
                ExprOp::Mul => !both_matrices,
                _ => false,
            };
            if !same_in_metal {
                return self.binary_by_rows(op, lhs, rhs, (a, b), (kind, rows, cols), loc);
            }
        }

        let lhs = self.coerce(lhs, a, kind, shape, logic, loc)?;
        let rhs = self.coerce(rhs, b, kind, shape, logic, loc)?;
        let result_kind = if ir_op.is_comparison() || logic {
            ScalarKind::Bool
        } else {
            kind
        };
        let ty = self.intern_numeric(NumericType {
            scalar: result_kind,
            shape,
        });
        Ok(Rvalue::expr(ty, ir_op, vec![lhs, rhs]))
    }

    fn binary_by_rows(
        &mut self,
        op: Operator,
        lhs: Rvalue,
        rhs: Rvalue,
        (a, b): (NumericType, NumericType),
        (kind, rows, cols): (ScalarKind, u8, u8),
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let mut row_values = Vec::with_capacity(usize::from(rows));
        let mut row_ty = TypeId::VOID;
        for r in 0..rows {
            let left = self.matrix_row(&lhs, a, r);
            let right = self.matrix_row(&rhs, b, r);
            let value = self.binary(op, left, right, loc)?;
            let value = self.reshape_row(value, cols);
            row_ty = value.ty;
            row_values.push(value);
        }
        let result_kind = self.module.types.scalar_kind(row_ty).unwrap_or(kind);
        let ty = self.module.types.matrix(result_kind, rows, cols);
        Ok(Rvalue::expr(ty, ExprOp::Construct, row_values))
    }

    fn matrix_row(&mut self, value: &Rvalue, numeric: NumericType, row: u8) -> Rvalue {
        match numeric.shape {
            Shape::Matrix { cols, .. } => {
                let row_ty = self.module.types.vector(numeric.scalar, cols);
                value.clone().index(Rvalue::int(i32::from(row)), row_ty)
            }
            _ => value.clone(),
        }
    }

    fn reshape_row(&mut self, value: Rvalue, cols: u8) -> Rvalue {
        match *self.module.types.get(value.ty) {
            Type::Vector(kind, n) if n > cols => {
                let ty = self.module.types.vector(kind, cols);
                value.swizzle(Swizzle::identity(cols), ty)
            }
            _ => value,
        }
    }

    fn coerce(
        &mut self,
        value: Rvalue,
        from: NumericType,
        kind: ScalarKind,
        shape: Shape,
        splat: bool,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let shape = if from.shape == Shape::Scalar && !splat {
            Shape::Scalar
        } else {
            shape
        };
        let ty = self.intern_numeric(NumericType {
            scalar: kind,
            shape,
        });
        self.convert(value, ty, loc)
    }

    fn operand_error(&self, op: Operator, lhs: &Rvalue, rhs: &Rvalue, loc: SourceLocation) -> SourceError {
        self.error(
            ErrorCode::E2006,
            loc,
            format!(
                "operator '{}' cannot be applied to '{}' and '{}'",
                op.symbol(),
                self.type_name(lhs.ty),
                self.type_name(rhs.ty)
            ),
        )
    }

    // ── Selection ──

    pub(crate) fn select_field(
        &mut self,
        base: Rvalue,
        name: &str,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        if let Some((index, ty)) = self.module.types.field(base.ty, name) {
            return Ok(base.field(index, ty));
        }
        match *self.module.types.get(base.ty) {
            Type::Scalar(kind) | Type::Vector(kind, _) => {
                let size = self.module.types.vector_size(base.ty);
                let swizzle = Swizzle::parse(name)
                    .filter(|s| s.components().iter().all(|&c| c < size))
                    .ok_or_else(|| self.invalid_swizzle(name, base.ty, loc))?;
                if swizzle.is_identity_for(size) {
                    return Ok(base);
                }
                let ty = self.module.types.vector(kind, swizzle.len());
                Ok(base.swizzle(swizzle, ty))
            }
            Type::Matrix { scalar, rows, cols } => {
                let elements = matrix_elements(name)
                    .filter(|e| e.iter().all(|&(r, c)| r < rows && c < cols))
                    .ok_or_else(|| self.invalid_swizzle(name, base.ty, loc))?;
                let row_ty = self.module.types.vector(scalar, cols);
                let scalar_ty = self.module.types.scalar(scalar);
                let mut parts: Vec<Rvalue> = elements
                    .iter()
                    .map(|&(r, c)| {
                        base.clone()
                            .index(Rvalue::int(i32::from(r)), row_ty)
                            .swizzle(Swizzle::single(c), scalar_ty)
                    })
                    .collect();
                if parts.len() == 1 {
                    return Ok(parts.remove(0));
                }
                #[expect(clippy::cast_possible_truncation, reason = "at most four elements")]
                let count = parts.len() as u8;
                let ty = self.module.types.vector(scalar, count);
                Ok(Rvalue::expr(ty, ExprOp::Construct, parts))
            }
            Type::Struct(_) => Err(self.error(
                ErrorCode::E2007,
                loc,
                format!("'{}' has no field '{name}'", self.type_name(base.ty)),
            )),
            _ => Err(self.invalid_swizzle(name, base.ty, loc)),
        }
    }

    fn invalid_swizzle(&self, name: &str, ty: TypeId, loc: SourceLocation) -> SourceError {
        self.error(
            ErrorCode::E2003,
            loc,
            format!("invalid swizzle '{name}' on '{}'", self.type_name(ty)),
        )
    }

    pub(crate) fn index_value(
        &mut self,
        base: Rvalue,
        index: Rvalue,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let base_type = self.module.types.get(base.ty).clone();
        match base_type {
            Type::Texture(texture) => {
                let size = coordinate_size(texture.kind);
                let coord_ty = self.module.types.vector(ScalarKind::Int, size);
                let coordinate = self.convert(index, coord_ty, loc)?;
                let kind = if texture.kind.is_writable() {
                    TextureOpKind::Read {
                        lod: None,
                        sample: None,
                    }
                } else if texture.kind.is_multisampled() {
                    TextureOpKind::Read {
                        lod: None,
                        sample: Some(Rvalue::int(0)),
                    }
                } else {
                    TextureOpKind::Read {
                        lod: Some(Rvalue::int(0)),
                        sample: None,
                    }
                };
                Ok(Rvalue::new(
                    texture.element,
                    RvalueKind::Texture(Box::new(TextureOp {
                        texture: base,
                        sampler: None,
                        coordinate,
                        kind,
                        offset: None,
                    })),
                ))
            }
            Type::Array { element, .. } | Type::Buffer { element, .. } => {
                let index = self.index_scalar(index, loc)?;
                Ok(base.index(index, element))
            }
            Type::Vector(kind, _) => {
                let index = self.index_scalar(index, loc)?;
                let ty = self.module.types.scalar(kind);
                Ok(base.index(index, ty))
            }
            Type::Matrix { scalar, cols, .. } => {
                let index = self.index_scalar(index, loc)?;
                let ty = self.module.types.vector(scalar, cols);
                Ok(base.index(index, ty))
            }
            _ => Err(self.error(
                ErrorCode::E2008,
                loc,
                format!("'{}' cannot be indexed", self.type_name(base.ty)),
            )),
        }
    }

    // ── Conditional ──

    fn lower_conditional(
        &mut self,
        condition: ExprId,
        then_value: ExprId,
        else_value: ExprId,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let cond = self.lower_expr(condition)?;

        if let Type::Vector(_, n) = *self.module.types.get(cond.ty) {
            let a = self.lower_expr(then_value)?;
            let b = self.lower_expr(else_value)?;
            let ty = self.common_type(&a, &b, loc)?;
            let ty = match *self.module.types.get(ty) {
                Type::Scalar(kind) => self.module.types.vector(kind, n),
                _ => ty,
            };
            let a = self.convert(a, ty, loc)?;
            let b = self.convert(b, ty, loc)?;
            let cond_ty = self.module.types.with_scalar(ty, ScalarKind::Bool);
            let cond = self.convert(cond, cond_ty, loc)?;
            return Ok(Rvalue::expr(ty, ExprOp::Select, vec![cond, a, b]));
        }

        let cond = self.condition(cond, loc)?;
        let mut a = None;
        let mut then_code = self.in_block(|this| {
            a = Some(this.lower_expr(then_value)?);
            Ok(())
        })?;
        let mut b = None;
        let mut else_code = self.in_block(|this| {
            b = Some(this.lower_expr(else_value)?);
            Ok(())
        })?;
        let (Some(a), Some(b)) = (a, b) else {
            return Err(hlslcc_diagnostic::internal_error(
                ErrorCode::E9002,
                "conditional branch produced no value",
            ));
        };
        let ty = self.common_type(&a, &b, loc)?;
        let tmp = self.temp(ty);
        let result = Rvalue::var(tmp, ty);
        let a = self.convert(a, ty, loc)?;
        let b = self.convert(b, ty, loc)?;
        then_code.push(Instruction::assign(result.clone(), a));
        else_code.push(Instruction::assign(result.clone(), b));
        self.emit(Instruction::If {
            condition: cond,
            then_branch: then_code,
            else_branch: else_code,
        });
        Ok(result)
    }

    /// Result type of `c ? a : b`.
    fn common_type(&mut self, a: &Rvalue, b: &Rvalue, loc: SourceLocation) -> Result<TypeId, SourceError> {
        if a.ty == b.ty {
            return Ok(a.ty);
        }
        match (self.numeric_of(a.ty), self.numeric_of(b.ty)) {
            (Some(na), Some(nb)) => {
                let shape = common_shape(na.shape, nb.shape)
                    .ok_or_else(|| self.conversion_error(b.ty, a.ty, loc))?;
                Ok(self.intern_numeric(NumericType {
                    scalar: wider(na.scalar, nb.scalar),
                    shape,
                }))
            }
            _ => Err(self.conversion_error(b.ty, a.ty, loc)),
        }
    }

    // ── Assignment ──

    pub(crate) fn lower_lvalue(&mut self, id: ExprId, loc: SourceLocation) -> Result<Lvalue, SourceError> {
        let value = self.lower_expr(id)?;
        self.as_lvalue(value, loc)
    }

    pub(crate) fn as_lvalue(&self, value: Rvalue, loc: SourceLocation) -> Result<Lvalue, SourceError> {
        let value = match value.kind {
            RvalueKind::Texture(op) => {
                let writable = matches!(
                    self.module.types.get(op.texture.ty),
                    Type::Texture(t) if t.kind.is_writable()
                );
                return match op.kind {
                    TextureOpKind::Read { .. } if writable => Ok(Lvalue::Texel {
                        texture: op.texture,
                        coordinate: op.coordinate,
                    }),
                    _ => Err(self.error(
                        ErrorCode::E2009,
                        loc,
                        "texture is not writable",
                    )),
                };
            }
            RvalueKind::Swizzle { base, swizzle } => {
                let mut seen = WriteMask::empty();
                for &c in swizzle.components() {
                    let channel = WriteMask::channel(c);
                    if seen.contains(channel) {
                        return Err(self.error(
                            ErrorCode::E2009,
                            loc,
                            format!("swizzle '.{}' repeats a component", swizzle.letters()),
                        ));
                    }
                    seen |= channel;
                }
                self.check_writable(&base, loc)?;
                return Ok(Lvalue::Value {
                    lhs: *base,
                    swizzle: Some(swizzle),
                });
            }
            kind => Rvalue::new(value.ty, kind),
        };
        self.check_writable(&value, loc)?;
        Ok(Lvalue::Value {
            lhs: value,
            swizzle: None,
        })
    }

    fn check_writable(&self, value: &Rvalue, loc: SourceLocation) -> Result<(), SourceError> {
        if !is_lvalue_chain(value) {
            return Err(self.error(ErrorCode::E2009, loc, "expression is not assignable"));
        }
        if let Some(root) = value.root_var() {
            let var = &self.module[root];
            let writable_buffer = matches!(
                self.module.types.get(self.module.types.array_dims(var.ty).1),
                Type::Buffer { writable: true, .. }
            );
            if var.mode == VarMode::Uniform && !writable_buffer {
                return Err(self.error(
                    ErrorCode::E2009,
                    loc,
                    format!("cannot assign to uniform '{}'", var.name),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn read_target(&mut self, target: &Lvalue) -> Rvalue {
        match target {
            Lvalue::Value { lhs, swizzle: None } => lhs.clone(),
            Lvalue::Value {
                lhs,
                swizzle: Some(swizzle),
            } => {
                let kind = self.module.types.scalar_kind(lhs.ty).unwrap_or(ScalarKind::Float);
                let ty = self.module.types.vector(kind, swizzle.len());
                lhs.clone().swizzle(*swizzle, ty)
            }
            Lvalue::Texel {
                texture,
                coordinate,
            } => {
                let element = match self.module.types.get(texture.ty) {
                    Type::Texture(t) => t.element,
                    _ => TypeId::VOID,
                };
                Rvalue::new(
                    element,
                    RvalueKind::Texture(Box::new(TextureOp {
                        texture: texture.clone(),
                        sampler: None,
                        coordinate: coordinate.clone(),
                        kind: TextureOpKind::Read {
                            lod: None,
                            sample: None,
                        },
                        offset: None,
                    })),
                )
            }
        }
    }

    /// Assign `value` to `target` and return an rvalue reading the result.
    pub(crate) fn store(
        &mut self,
        target: &Lvalue,
        value: Rvalue,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        match target {
            Lvalue::Value { lhs, swizzle: None } => {
                let value = self.convert(value, lhs.ty, loc)?;
                self.emit(Instruction::assign(lhs.clone(), value));
                Ok(lhs.clone())
            }
            Lvalue::Value {
                lhs,
                swizzle: Some(swizzle),
            } => {
                let size = self.module.types.vector_size(lhs.ty);
                if size <= 1 {
                    let value = self.convert(value, lhs.ty, loc)?;
                    self.emit(Instruction::assign(lhs.clone(), value));
                    return Ok(lhs.clone());
                }
                let kind = self.module.types.scalar_kind(lhs.ty).unwrap_or(ScalarKind::Float);
                let part_ty = self.module.types.vector(kind, swizzle.len());
                let value = self.convert(value, part_ty, loc)?;

                // Reorder so component i of the rhs lands in the i-th written
                // channel, counting channels in x, y, z, w order.
                let mask = swizzle.mask();
                let order: SmallVec<[u8; 4]> = mask
                    .channels()
                    .filter_map(|channel| {
                        swizzle
                            .components()
                            .iter()
                            .position(|&c| c == channel)
                            .and_then(|p| u8::try_from(p).ok())
                    })
                    .collect();
                let rhs = match Swizzle::new(&order) {
                    Some(order) if swizzle.len() > 1 && !order.is_identity_for(swizzle.len()) => {
                        match value.as_constant() {
                            Some(values) => Rvalue::constant(
                                part_ty,
                                order.components().iter().map(|&i| values[usize::from(i)]),
                            ),
                            None => value.swizzle(order, part_ty),
                        }
                    }
                    _ => value,
                };
                let write_mask = if mask == WriteMask::first(size) {
                    WriteMask::empty()
                } else {
                    mask
                };
                self.emit(Instruction::Assign(Assignment::masked(lhs.clone(), rhs, write_mask)));
                Ok(lhs.clone().swizzle(*swizzle, part_ty))
            }
            Lvalue::Texel {
                texture,
                coordinate,
            } => {
                let element = match self.module.types.get(texture.ty) {
                    Type::Texture(t) => t.element,
                    _ => TypeId::VOID,
                };
                let value = self.convert(value, element, loc)?;
                self.emit(Instruction::TextureStore {
                    texture: texture.clone(),
                    coordinate: coordinate.clone(),
                    value: value.clone(),
                });
                Ok(value)
            }
        }
    }

    fn lower_increment(
        &mut self,
        op: Operator,
        operand: ExprId,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let target = self.lower_lvalue(operand, loc)?;
        let current = self.read_target(&target);
        let one = match self.module.types.scalar_kind(current.ty) {
            Some(ScalarKind::Int) => Rvalue::int(1),
            Some(ScalarKind::Uint) => Rvalue::uint(1),
            Some(ScalarKind::Half | ScalarKind::Float) => Rvalue::float(1.0),
            _ => {
                return Err(self.error(
                    ErrorCode::E2006,
                    loc,
                    format!(
                        "operator '{}' cannot be applied to '{}'",
                        op.symbol(),
                        self.type_name(current.ty)
                    ),
                ))
            }
        };
        let saved = if matches!(op, Operator::PostInc | Operator::PostDec) {
            let tmp = self.temp(current.ty);
            let saved = Rvalue::var(tmp, current.ty);
            self.emit(Instruction::assign(saved.clone(), current.clone()));
            Some(saved)
        } else {
            None
        };
        let step = if matches!(op, Operator::PreInc | Operator::PostInc) {
            Operator::Add
        } else {
            Operator::Sub
        };
        let next = self.binary(step, current, one, loc)?;
        let stored = self.store(&target, next, loc)?;
        Ok(saved.unwrap_or(stored))
    }

    // ── Constructors, casts and initializers ──

    fn lower_constructor(
        &mut self,
        spec: &TypeSpecifier,
        args: &[ExprId],
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let ty = self.resolve_type(spec)?;
        let values = args
            .iter()
            .map(|&a| self.lower_expr(a))
            .collect::<Result<Vec<_>, _>>()?;
        self.construct(ty, values, loc)
    }

    /// `T(values...)` for a numeric `T`, checking the component count.
    pub(crate) fn construct(
        &mut self,
        ty: TypeId,
        values: Vec<Rvalue>,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let Some(target) = self.numeric_of(ty) else {
            return Err(self.error(
                ErrorCode::E2008,
                loc,
                format!("'{}' has no constructor", self.type_name(ty)),
            ));
        };
        if let [single] = values.as_slice() {
            if let Some(from) = self.numeric_of(single.ty) {
                if from.shape == Shape::Scalar || from.shape == target.shape {
                    return self.convert(single.clone(), ty, loc);
                }
            }
        }

        let expected = self.module.types.components(ty);
        let mut total = 0;
        for value in &values {
            let n = self.module.types.components(value.ty);
            if n == 0 {
                return Err(self.conversion_error(value.ty, ty, loc));
            }
            total += n;
        }
        if total != expected {
            return Err(self.error(
                ErrorCode::E2004,
                loc,
                format!(
                    "'{}' constructor takes {expected} components, got {total}",
                    self.type_name(ty)
                ),
            ));
        }

        let flatten = match target.shape {
            Shape::Matrix { cols, .. } => {
                let all_scalars = values.iter().all(|v| self.module.types.is_scalar(v.ty));
                let all_rows = values
                    .iter()
                    .all(|v| self.module.types.vector_size(v.ty) == cols);
                !(all_scalars || all_rows)
            }
            _ => values.iter().any(|v| self.module.types.is_matrix(v.ty)),
        };
        let parts = if flatten {
            values
                .into_iter()
                .flat_map(|v| self.scalar_parts(v))
                .collect()
        } else {
            values
        };

        let mut operands = Vec::with_capacity(parts.len());
        for part in parts {
            let part_ty = self.module.types.with_scalar(part.ty, target.scalar);
            operands.push(self.convert(part, part_ty, loc)?);
        }
        if operands.iter().all(Rvalue::is_constant) {
            let values: Vec<ConstValue> = operands
                .iter()
                .filter_map(Rvalue::as_constant)
                .flatten()
                .copied()
                .collect();
            return Ok(Rvalue::constant(ty, values));
        }
        Ok(Rvalue::expr(ty, ExprOp::Construct, operands))
    }

    fn lower_cast(
        &mut self,
        spec: &TypeSpecifier,
        operand: ExprId,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let ty = self.resolve_type(spec)?;
        let value = self.lower_expr(operand)?;
        if value.ty == ty {
            return Ok(value);
        }
        if let (Some(from), Some(to)) = (self.numeric_of(value.ty), self.numeric_of(ty)) {
            let same_count =
                self.module.types.components(value.ty) == self.module.types.components(ty);
            if same_count && from.shape != to.shape && from.shape != Shape::Scalar {
                return self.construct(ty, vec![value], loc);
            }
            return self.convert(value, ty, loc);
        }
        // (S)0 fills every member of a struct or array.
        if self.module.types.is_scalar(value.ty) {
            let tmp = self.temp(ty);
            let result = Rvalue::var(tmp, ty);
            self.fill(result.clone(), &value, loc)?;
            return Ok(result);
        }
        Err(self.conversion_error(value.ty, ty, loc))
    }

    fn fill(&mut self, lhs: Rvalue, scalar: &Rvalue, loc: SourceLocation) -> Result<(), SourceError> {
        match self.module.types.get(lhs.ty).clone() {
            Type::Array { element, length } => {
                for i in 0..length {
                    let index = Rvalue::int(i32::try_from(i).unwrap_or(i32::MAX));
                    self.fill(lhs.clone().index(index, element), scalar, loc)?;
                }
                Ok(())
            }
            Type::Struct(s) => {
                for (i, field) in s.fields.iter().enumerate() {
                    self.fill(lhs.clone().field(i, field.ty), scalar, loc)?;
                }
                Ok(())
            }
            _ => {
                let value = self.convert(scalar.clone(), lhs.ty, loc)?;
                self.emit(Instruction::assign(lhs, value));
                Ok(())
            }
        }
    }

    /// Emit the assignments initializing `var` from `init`, which may be a
    /// brace list of any nesting.
    pub(crate) fn lower_initializer(&mut self, var: VarId, init: ExprId) -> Result<(), SourceError> {
        let unit = self.unit;
        let expr = &unit.arena[init];
        let ty = self.module[var].ty;
        let target = Rvalue::var(var, ty);
        if expr.op != Operator::InitializerList {
            let value = self.lower_expr(init)?;
            let value = self.convert(value, ty, expr.loc)?;
            self.emit(Instruction::assign(target, value));
            return Ok(());
        }

        let mut items = VecDeque::new();
        self.flatten_initializer(init, &mut items)?;
        self.distribute(target, &mut items, expr.loc)?;
        if !items.is_empty() {
            return Err(self.error(
                ErrorCode::E2004,
                expr.loc,
                format!("too many values initializing '{}'", self.module[var].name),
            ));
        }
        Ok(())
    }

    fn flatten_initializer(&mut self, id: ExprId, out: &mut VecDeque<Rvalue>) -> Result<(), SourceError> {
        let unit = self.unit;
        let expr = &unit.arena[id];
        if expr.op == Operator::InitializerList {
            for &element in &expr.arguments {
                self.flatten_initializer(element, out)?;
            }
        } else {
            out.push_back(self.lower_expr(id)?);
        }
        Ok(())
    }

    fn distribute(
        &mut self,
        lhs: Rvalue,
        items: &mut VecDeque<Rvalue>,
        loc: SourceLocation,
    ) -> Result<(), SourceError> {
        if items.front().is_some_and(|item| item.ty == lhs.ty) {
            if let Some(item) = items.pop_front() {
                self.emit(Instruction::assign(lhs, item));
                return Ok(());
            }
        }
        match self.module.types.get(lhs.ty).clone() {
            Type::Array { element, length } => {
                for i in 0..length {
                    let index = Rvalue::int(i32::try_from(i).unwrap_or(i32::MAX));
                    self.distribute(lhs.clone().index(index, element), items, loc)?;
                }
                return Ok(());
            }
            Type::Struct(s) => {
                for (i, field) in s.fields.iter().enumerate() {
                    self.distribute(lhs.clone().field(i, field.ty), items, loc)?;
                }
                return Ok(());
            }
            _ => {}
        }

        let needed = self.module.types.components(lhs.ty);
        if needed == 0 {
            let found = items.front().map_or(TypeId::VOID, |i| i.ty);
            return Err(self.conversion_error(found, lhs.ty, loc));
        }
        let mut parts = Vec::new();
        let mut count = 0;
        while count < needed {
            let item = items.pop_front().ok_or_else(|| {
                self.error(
                    ErrorCode::E2004,
                    loc,
                    format!("not enough values to initialize '{}'", self.type_name(lhs.ty)),
                )
            })?;
            let n = self.module.types.components(item.ty);
            if n == 0 {
                return Err(self.conversion_error(item.ty, lhs.ty, loc));
            }
            if count + n <= needed {
                count += n;
                parts.push(item);
            } else {
                for scalar in self.scalar_parts(item).into_iter().rev() {
                    items.push_front(scalar);
                }
            }
        }
        let value = if parts.len() == 1 {
            let part = parts.remove(0);
            self.convert(part, lhs.ty, loc)?
        } else {
            self.construct(lhs.ty, parts, loc)?
        };
        self.emit(Instruction::assign(lhs, value));
        Ok(())
    }
}
