//! Calls: user functions, intrinsics and object methods.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_ir::{
    ExprOp, FuncId, Instruction, Rvalue, RvalueKind, TextureOp, TextureOpKind, TextureType, Type,
    TypeId, VarMode,
};
use hlslcc_syntax::ast::Operator;
use hlslcc_syntax::{ExprId, Name, NumericType, ScalarKind, Shape, SourceLocation, TextureKind};

use crate::expr::{common_shape, void_value, wider, Lvalue};
use crate::Lowerer;

/// Result type of an intrinsic, from its converted operand type.
#[derive(Copy, Clone)]
enum ResultRule {
    /// The operand type.
    Same,
    /// The operand type, promoted to float.
    FloatSame,
    /// Float operands, scalar float result.
    FloatScalar,
    /// Float operands, boolean of the same shape.
    BoolSame,
    /// Boolean operands, scalar boolean result.
    BoolScalar,
    /// Unsigned operands and result.
    UintSame,
    /// Same shape, reinterpreted bits.
    Reinterpret(ScalarKind),
    Cross,
    Transpose,
    Refract,
    Ldexp,
}

const INTRINSICS: &[(&str, ExprOp, ResultRule)] = &[
    ("abs", ExprOp::Abs, ResultRule::Same),
    ("sign", ExprOp::Sign, ResultRule::Same),
    ("min", ExprOp::Min, ResultRule::Same),
    ("max", ExprOp::Max, ResultRule::Same),
    ("clamp", ExprOp::Clamp, ResultRule::Same),
    ("rcp", ExprOp::Rcp, ResultRule::FloatSame),
    ("rsqrt", ExprOp::Rsqrt, ResultRule::FloatSame),
    ("sqrt", ExprOp::Sqrt, ResultRule::FloatSame),
    ("exp", ExprOp::Exp, ResultRule::FloatSame),
    ("exp2", ExprOp::Exp2, ResultRule::FloatSame),
    ("log", ExprOp::Log, ResultRule::FloatSame),
    ("log2", ExprOp::Log2, ResultRule::FloatSame),
    ("saturate", ExprOp::Saturate, ResultRule::FloatSame),
    ("trunc", ExprOp::Trunc, ResultRule::FloatSame),
    ("ceil", ExprOp::Ceil, ResultRule::FloatSame),
    ("floor", ExprOp::Floor, ResultRule::FloatSame),
    ("frac", ExprOp::Fract, ResultRule::FloatSame),
    ("round", ExprOp::Round, ResultRule::FloatSame),
    ("sin", ExprOp::Sin, ResultRule::FloatSame),
    ("cos", ExprOp::Cos, ResultRule::FloatSame),
    ("tan", ExprOp::Tan, ResultRule::FloatSame),
    ("asin", ExprOp::Asin, ResultRule::FloatSame),
    ("acos", ExprOp::Acos, ResultRule::FloatSame),
    ("atan", ExprOp::Atan, ResultRule::FloatSame),
    ("sinh", ExprOp::Sinh, ResultRule::FloatSame),
    ("cosh", ExprOp::Cosh, ResultRule::FloatSame),
    ("tanh", ExprOp::Tanh, ResultRule::FloatSame),
    ("normalize", ExprOp::Normalize, ResultRule::FloatSame),
    ("ddx", ExprOp::Ddx, ResultRule::FloatSame),
    ("ddx_fine", ExprOp::Ddx, ResultRule::FloatSame),
    ("ddx_coarse", ExprOp::Ddx, ResultRule::FloatSame),
    ("ddy", ExprOp::Ddy, ResultRule::FloatSame),
    ("ddy_fine", ExprOp::Ddy, ResultRule::FloatSame),
    ("ddy_coarse", ExprOp::Ddy, ResultRule::FloatSame),
    ("fwidth", ExprOp::Fwidth, ResultRule::FloatSame),
    ("fmod", ExprOp::FMod, ResultRule::FloatSame),
    ("atan2", ExprOp::Atan2, ResultRule::FloatSame),
    ("pow", ExprOp::Pow, ResultRule::FloatSame),
    ("step", ExprOp::Step, ResultRule::FloatSame),
    ("reflect", ExprOp::Reflect, ResultRule::FloatSame),
    ("lerp", ExprOp::Lerp, ResultRule::FloatSame),
    ("smoothstep", ExprOp::Smoothstep, ResultRule::FloatSame),
    ("mad", ExprOp::Fma, ResultRule::FloatSame),
    ("fma", ExprOp::Fma, ResultRule::FloatSame),
    ("length", ExprOp::Length, ResultRule::FloatScalar),
    ("distance", ExprOp::Distance, ResultRule::FloatScalar),
    ("dot", ExprOp::Dot, ResultRule::FloatScalar),
    ("determinant", ExprOp::Determinant, ResultRule::FloatScalar),
    ("isnan", ExprOp::IsNan, ResultRule::BoolSame),
    ("isinf", ExprOp::IsInf, ResultRule::BoolSame),
    ("any", ExprOp::Any, ResultRule::BoolScalar),
    ("all", ExprOp::All, ResultRule::BoolScalar),
    ("countbits", ExprOp::CountBits, ResultRule::UintSame),
    ("reversebits", ExprOp::ReverseBits, ResultRule::UintSame),
    ("firstbithigh", ExprOp::FirstBitHigh, ResultRule::UintSame),
    ("firstbitlow", ExprOp::FirstBitLow, ResultRule::UintSame),
    ("asfloat", ExprOp::AsFloat, ResultRule::Reinterpret(ScalarKind::Float)),
    ("asint", ExprOp::AsInt, ResultRule::Reinterpret(ScalarKind::Int)),
    ("asuint", ExprOp::AsUint, ResultRule::Reinterpret(ScalarKind::Uint)),
    ("cross", ExprOp::Cross, ResultRule::Cross),
    ("transpose", ExprOp::Transpose, ResultRule::Transpose),
    ("refract", ExprOp::Refract, ResultRule::Refract),
    ("ldexp", ExprOp::Ldexp, ResultRule::Ldexp),
];

const BARRIERS: &[&str] = &[
    "GroupMemoryBarrier",
    "GroupMemoryBarrierWithGroupSync",
    "DeviceMemoryBarrier",
    "DeviceMemoryBarrierWithGroupSync",
    "AllMemoryBarrier",
    "AllMemoryBarrierWithGroupSync",
];

/// Components of a texture coordinate, array index included.
pub(crate) const fn coordinate_size(kind: TextureKind) -> u8 {
    match kind {
        TextureKind::Texture1D | TextureKind::RWTexture1D => 1,
        TextureKind::Texture1DArray
        | TextureKind::RWTexture1DArray
        | TextureKind::Texture2D
        | TextureKind::Texture2DMS
        | TextureKind::RWTexture2D => 2,
        TextureKind::Texture2DArray
        | TextureKind::Texture2DMSArray
        | TextureKind::RWTexture2DArray
        | TextureKind::Texture3D
        | TextureKind::RWTexture3D
        | TextureKind::TextureCube => 3,
        TextureKind::TextureCubeArray => 4,
        _ => 1,
    }
}

/// Components of a texture offset: the coordinate without its array index.
const fn offset_size(kind: TextureKind) -> u8 {
    match kind {
        TextureKind::Texture1D
        | TextureKind::RWTexture1D
        | TextureKind::Texture1DArray
        | TextureKind::RWTexture1DArray => 1,
        TextureKind::Texture3D | TextureKind::RWTexture3D => 3,
        _ => 2,
    }
}

const fn is_array(kind: TextureKind) -> bool {
    matches!(
        kind,
        TextureKind::Texture1DArray
            | TextureKind::Texture2DArray
            | TextureKind::Texture2DMSArray
            | TextureKind::TextureCubeArray
            | TextureKind::RWTexture1DArray
            | TextureKind::RWTexture2DArray
    )
}

/// `GetDimensions` size outputs, in order, as [`TextureOpKind::Size`]
/// components.
fn size_components(kind: TextureKind) -> &'static [u8] {
    match kind {
        TextureKind::Texture1D | TextureKind::RWTexture1D => &[0],
        TextureKind::Texture1DArray | TextureKind::RWTexture1DArray => &[0, 3],
        TextureKind::Texture2D
        | TextureKind::Texture2DMS
        | TextureKind::RWTexture2D
        | TextureKind::TextureCube => &[0, 1],
        TextureKind::Texture2DArray
        | TextureKind::Texture2DMSArray
        | TextureKind::RWTexture2DArray
        | TextureKind::TextureCubeArray => &[0, 1, 3],
        TextureKind::Texture3D | TextureKind::RWTexture3D => &[0, 1, 2],
        _ => &[0],
    }
}

impl Lowerer<'_> {
    pub(crate) fn lower_call(
        &mut self,
        callee: ExprId,
        args: &[ExprId],
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let unit = self.unit;
        let callee_expr = &unit.arena[callee];
        match (callee_expr.op, callee_expr.identifier) {
            (Operator::Identifier, Some(name)) => {
                if self.functions.contains_key(&name) {
                    return self.lower_user_call(name, args, loc);
                }
                self.lower_intrinsic(self.name(name), args, loc)
            }
            (Operator::FieldSelection, Some(method)) => {
                let object = callee_expr.operand(0).ok_or_else(|| {
                    hlslcc_diagnostic::internal_error(ErrorCode::E9002, "method call without object")
                })?;
                let object = self.lower_expr(object)?;
                self.lower_method(object, self.name(method), args, loc)
            }
            _ => Err(self.error(ErrorCode::E2008, loc, "expression is not callable")),
        }
    }

    fn lower_args(&mut self, args: &[ExprId]) -> Result<Vec<Rvalue>, SourceError> {
        args.iter().map(|&a| self.lower_expr(a)).collect()
    }

    fn arg_count_error(&self, name: &str, expected: usize, found: usize, loc: SourceLocation) -> SourceError {
        self.error(
            ErrorCode::E2004,
            loc,
            format!("'{name}' takes {expected} arguments, {found} given"),
        )
    }

    // ── User functions ──

    fn lower_user_call(
        &mut self,
        name: Name,
        arg_ids: &[ExprId],
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let args = self.lower_args(arg_ids)?;
        let func = self.pick_overload(name, &args).ok_or_else(|| {
            self.error(
                ErrorCode::E2010,
                loc,
                format!(
                    "no overload of '{}' takes {} arguments",
                    self.name(name),
                    args.len()
                ),
            )
        })?;

        let params = self.module[func].params.clone();
        let mut call_args = Vec::with_capacity(args.len());
        let mut copy_back = Vec::new();
        for (arg, param) in args.into_iter().zip(params) {
            let (param_ty, mode) = (self.module[param].ty, self.module[param].mode);
            if !mode.is_parameter_out() {
                call_args.push(self.convert(arg, param_ty, loc)?);
                continue;
            }
            let target = self.as_lvalue(arg, loc)?;
            match &target {
                Lvalue::Value { lhs, swizzle: None } if lhs.ty == param_ty => {
                    call_args.push(lhs.clone());
                }
                _ => {
                    let tmp = self.temp(param_ty);
                    let tmp_value = Rvalue::var(tmp, param_ty);
                    if mode == VarMode::InOut {
                        let current = self.read_target(&target);
                        let current = self.convert(current, param_ty, loc)?;
                        self.emit(Instruction::assign(tmp_value.clone(), current));
                    }
                    call_args.push(tmp_value.clone());
                    copy_back.push((target, tmp_value));
                }
            }
        }

        let return_type = self.module[func].return_type;
        let result = (return_type != TypeId::VOID).then(|| {
            let tmp = self.temp(return_type);
            Rvalue::var(tmp, return_type)
        });
        self.emit(Instruction::Call {
            callee: func,
            args: call_args,
            result: result.clone(),
        });
        for (target, value) in copy_back {
            self.store(&target, value, loc)?;
        }
        Ok(result.unwrap_or_else(void_value))
    }

    /// The overload with the right arity and the most exactly matching
    /// parameter types; the earliest declared wins ties.
    fn pick_overload(&self, name: Name, args: &[Rvalue]) -> Option<FuncId> {
        let overloads = self.functions.get(&name)?;
        let mut best: Option<(usize, FuncId)> = None;
        for &func in overloads {
            let params = &self.module[func].params;
            if params.len() != args.len() {
                continue;
            }
            let score = params
                .iter()
                .zip(args)
                .filter(|&(&p, a)| self.module[p].ty == a.ty)
                .count();
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, func));
            }
        }
        best.map(|(_, f)| f)
    }

    // ── Intrinsics ──

    fn lower_intrinsic(
        &mut self,
        name: &str,
        arg_ids: &[ExprId],
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        if BARRIERS.contains(&name) {
            self.emit(Instruction::Barrier);
            return Ok(void_value());
        }
        match name {
            "mul" => {
                let [a, b] = self.fixed_args::<2>(name, arg_ids, loc)?;
                return self.lower_mul(a, b, loc);
            }
            "clip" => {
                let [x] = self.fixed_args::<1>(name, arg_ids, loc)?;
                return self.lower_clip(x, loc);
            }
            "sincos" => {
                let [x, s, c] = self.fixed_args::<3>(name, arg_ids, loc)?;
                return self.lower_sincos(x, s, c, loc);
            }
            _ => {}
        }

        let Some(&(_, op, rule)) = INTRINSICS.iter().find(|(n, _, _)| *n == name) else {
            return Err(self.error(
                ErrorCode::E2010,
                loc,
                format!("unknown function '{name}'"),
            ));
        };
        let arity = op.arity().unwrap_or(arg_ids.len());
        if arg_ids.len() != arity {
            return Err(self.arg_count_error(name, arity, arg_ids.len(), loc));
        }
        let args = self.lower_args(arg_ids)?;
        self.apply_intrinsic(name, op, rule, args, loc)
    }

    fn fixed_args<const N: usize>(
        &mut self,
        name: &str,
        arg_ids: &[ExprId],
        loc: SourceLocation,
    ) -> Result<[Rvalue; N], SourceError> {
        if arg_ids.len() != N {
            return Err(self.arg_count_error(name, N, arg_ids.len(), loc));
        }
        let args = self.lower_args(arg_ids)?;
        args.try_into().map_err(|_| {
            hlslcc_diagnostic::internal_error(ErrorCode::E9002, "argument count changed")
        })
    }

    /// Numeric type every operand converts to: widest kind, common shape.
    fn operand_type(&mut self, name: &str, args: &[Rvalue], loc: SourceLocation) -> Result<NumericType, SourceError> {
        let mut common: Option<NumericType> = None;
        for arg in args {
            let Some(n) = self.numeric_of(arg.ty) else {
                return Err(self.error(
                    ErrorCode::E2006,
                    loc,
                    format!("'{name}' does not accept '{}'", self.type_name(arg.ty)),
                ));
            };
            common = Some(match common {
                None => n,
                Some(c) => NumericType {
                    scalar: wider(c.scalar, n.scalar),
                    shape: common_shape(c.shape, n.shape).ok_or_else(|| {
                        self.error(
                            ErrorCode::E2006,
                            loc,
                            format!("'{name}' called with incompatible argument shapes"),
                        )
                    })?,
                },
            });
        }
        common.ok_or_else(|| self.arg_count_error(name, 1, 0, loc))
    }

    fn convert_all(
        &mut self,
        args: Vec<Rvalue>,
        ty: TypeId,
        loc: SourceLocation,
    ) -> Result<Vec<Rvalue>, SourceError> {
        args.into_iter().map(|a| self.convert(a, ty, loc)).collect()
    }

    fn apply_intrinsic(
        &mut self,
        name: &str,
        op: ExprOp,
        rule: ResultRule,
        args: Vec<Rvalue>,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let common = self.operand_type(name, &args, loc)?;
        let float = |n: NumericType| NumericType {
            scalar: if n.scalar.is_float() {
                n.scalar
            } else {
                ScalarKind::Float
            },
            shape: n.shape,
        };
        let (operand_ty, result_ty) = match rule {
            ResultRule::Same => {
                let ty = self.intern_numeric(common);
                (ty, ty)
            }
            ResultRule::FloatSame => {
                let ty = self.intern_numeric(float(common));
                (ty, ty)
            }
            ResultRule::FloatScalar => {
                let n = float(common);
                let ty = self.intern_numeric(n);
                (ty, self.module.types.scalar(n.scalar))
            }
            ResultRule::BoolSame => {
                let ty = self.intern_numeric(float(common));
                (ty, self.module.types.with_scalar(ty, ScalarKind::Bool))
            }
            ResultRule::BoolScalar => {
                let ty = self.intern_numeric(NumericType {
                    scalar: ScalarKind::Bool,
                    shape: common.shape,
                });
                (ty, TypeId::BOOL)
            }
            ResultRule::UintSame => {
                let ty = self.intern_numeric(NumericType {
                    scalar: ScalarKind::Uint,
                    shape: common.shape,
                });
                (ty, ty)
            }
            ResultRule::Reinterpret(kind) => {
                let arg_ty = args.first().map_or(TypeId::VOID, |a| a.ty);
                let result = self.module.types.with_scalar(arg_ty, kind);
                return Ok(Rvalue::expr(result, op, args));
            }
            ResultRule::Cross => {
                let ty = self.module.types.vector(float(common).scalar, 3);
                (ty, ty)
            }
            ResultRule::Transpose => {
                let Shape::Matrix { rows, cols } = common.shape else {
                    return Err(self.error(
                        ErrorCode::E2006,
                        loc,
                        "'transpose' requires a matrix",
                    ));
                };
                let operand = self.intern_numeric(common);
                (operand, self.module.types.matrix(common.scalar, cols, rows))
            }
            ResultRule::Refract | ResultRule::Ldexp => {
                return self.apply_mixed(op, rule, args, loc);
            }
        };
        let operands = self.convert_all(args, operand_ty, loc)?;
        Ok(Rvalue::expr(result_ty, op, operands))
    }

    /// `refract(i, n, eta)` and `ldexp(x, e)`, whose operands differ in type.
    fn apply_mixed(
        &mut self,
        op: ExprOp,
        rule: ResultRule,
        args: Vec<Rvalue>,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let mut args = args.into_iter();
        let (Some(x), Some(y)) = (args.next(), args.next()) else {
            return Err(hlslcc_diagnostic::internal_error(ErrorCode::E9002, "missing operands"));
        };
        let kind = self
            .module
            .types
            .scalar_kind(x.ty)
            .filter(|k| k.is_float())
            .unwrap_or(ScalarKind::Float);
        let ty = self.module.types.with_scalar(x.ty, kind);
        let x = self.convert(x, ty, loc)?;
        match rule {
            ResultRule::Refract => {
                let y = self.convert(y, ty, loc)?;
                let eta_ty = self.module.types.scalar(kind);
                let eta = match args.next() {
                    Some(eta) => self.convert(eta, eta_ty, loc)?,
                    None => {
                        return Err(hlslcc_diagnostic::internal_error(
                            ErrorCode::E9002,
                            "missing operands",
                        ))
                    }
                };
                Ok(Rvalue::expr(ty, op, vec![x, y, eta]))
            }
            _ => {
                let exp_ty = self.module.types.with_scalar(ty, ScalarKind::Int);
                let y = self.convert(y, exp_ty, loc)?;
                Ok(Rvalue::expr(ty, op, vec![x, y]))
            }
        }
    }

    /// HLSL `mul`, with vectors as row vectors on the left and column
    /// vectors on the right.
    fn lower_mul(&mut self, a: Rvalue, b: Rvalue, loc: SourceLocation) -> Result<Rvalue, SourceError> {
        let (Some(na), Some(nb)) = (self.numeric_of(a.ty), self.numeric_of(b.ty)) else {
            return Err(self.error(ErrorCode::E2006, loc, "'mul' requires numeric arguments"));
        };
        let kind = wider(na.scalar, nb.scalar);
        let mismatch = || {
            format!(
                "'mul' cannot multiply '{na}' by '{nb}'",
            )
        };
        let result = match (na.shape, nb.shape) {
            (Shape::Scalar, _) | (_, Shape::Scalar) => {
                return self.binary(Operator::Mul, a, b, loc);
            }
            (Shape::Vector(n), Shape::Vector(m)) => {
                let ty = self.module.types.vector(kind, n.min(m));
                let a = self.convert(a, ty, loc)?;
                let b = self.convert(b, ty, loc)?;
                let scalar = self.module.types.scalar(kind);
                return Ok(Rvalue::expr(scalar, ExprOp::Dot, vec![a, b]));
            }
            (Shape::Vector(n), Shape::Matrix { rows, cols }) if n == rows => {
                NumericType::vector(kind, cols)
            }
            (Shape::Matrix { rows, cols }, Shape::Vector(n)) if n == cols => {
                NumericType::vector(kind, rows)
            }
            (Shape::Matrix { rows, cols: inner }, Shape::Matrix { rows: r2, cols })
                if inner == r2 =>
            {
                NumericType::matrix(kind, rows, cols)
            }
            _ => return Err(self.error(ErrorCode::E2006, loc, mismatch())),
        };
        let a_ty = self.module.types.with_scalar(a.ty, kind);
        let b_ty = self.module.types.with_scalar(b.ty, kind);
        let a = self.convert(a, a_ty, loc)?;
        let b = self.convert(b, b_ty, loc)?;
        let ty = self.intern_numeric(result);
        Ok(Rvalue::expr(ty, ExprOp::MatMul, vec![a, b]))
    }

    /// `clip(x)` discards when any component is negative.
    fn lower_clip(&mut self, x: Rvalue, loc: SourceLocation) -> Result<Rvalue, SourceError> {
        let negative = self.binary(Operator::Less, x, Rvalue::float(0.0), loc)?;
        let condition = if self.module.types.is_vector(negative.ty) {
            Rvalue::expr(TypeId::BOOL, ExprOp::Any, vec![negative])
        } else {
            negative
        };
        self.emit(Instruction::If {
            condition,
            then_branch: vec![Instruction::Discard],
            else_branch: Vec::new(),
        });
        Ok(void_value())
    }

    fn lower_sincos(
        &mut self,
        x: Rvalue,
        sin_out: Rvalue,
        cos_out: Rvalue,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let kind = self
            .module
            .types
            .scalar_kind(x.ty)
            .filter(|k| k.is_float())
            .unwrap_or(ScalarKind::Float);
        let ty = self.module.types.with_scalar(x.ty, kind);
        let x = self.convert(x, ty, loc)?;
        let x = if matches!(x.kind, RvalueKind::Var(_) | RvalueKind::Constant(_)) {
            x
        } else {
            let tmp = self.temp(ty);
            let value = Rvalue::var(tmp, ty);
            self.emit(Instruction::assign(value.clone(), x));
            value
        };
        let sin_target = self.as_lvalue(sin_out, loc)?;
        let cos_target = self.as_lvalue(cos_out, loc)?;
        self.store(&sin_target, Rvalue::expr(ty, ExprOp::Sin, vec![x.clone()]), loc)?;
        self.store(&cos_target, Rvalue::expr(ty, ExprOp::Cos, vec![x]), loc)?;
        Ok(void_value())
    }

    // ── Methods ──

    fn lower_method(
        &mut self,
        object: Rvalue,
        method: &str,
        arg_ids: &[ExprId],
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        match *self.module.types.get(object.ty) {
            Type::Texture(texture) => self.lower_texture_method(object, texture, method, arg_ids, loc),
            Type::Buffer { element, .. } if method == "Load" => {
                let [address] = self.fixed_args::<1>(method, arg_ids, loc)?;
                let index = self.buffer_index(&object, address, loc)?;
                Ok(object.index(index, element))
            }
            Type::Buffer {
                element,
                writable: true,
            } if method == "Store" => {
                let [address, value] = self.fixed_args::<2>(method, arg_ids, loc)?;
                let index = self.buffer_index(&object, address, loc)?;
                let target = Lvalue::Value {
                    lhs: object.index(index, element),
                    swizzle: None,
                };
                self.store(&target, value, loc)?;
                Ok(void_value())
            }
            _ => Err(self.unknown_method(object.ty, method, loc)),
        }
    }

    /// Element index of a buffer access; raw buffers are addressed in bytes
    /// but stored as words.
    fn buffer_index(
        &mut self,
        object: &Rvalue,
        address: Rvalue,
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let address = self.convert(address, TypeId::INT, loc)?;
        let raw = object
            .root_var()
            .is_some_and(|v| self.raw_buffers.contains(&v));
        Ok(if raw {
            Rvalue::expr(
                TypeId::INT,
                ExprOp::RightShift,
                vec![address, Rvalue::int(2)],
            )
        } else {
            address
        })
    }

    fn unknown_method(&self, ty: TypeId, method: &str, loc: SourceLocation) -> SourceError {
        self.error(
            ErrorCode::E2013,
            loc,
            format!("'{}' has no method '{method}'", self.type_name(ty)),
        )
    }

    fn lower_texture_method(
        &mut self,
        object: Rvalue,
        texture: TextureType,
        method: &str,
        arg_ids: &[ExprId],
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        if method == "GetDimensions" {
            return self.lower_get_dimensions(object, texture, arg_ids, loc);
        }
        // Sampling methods and their required argument count, offset excluded.
        let required = match method {
            "Sample" => 2,
            "SampleLevel" | "SampleBias" | "SampleCmp" | "SampleCmpLevelZero" => 3,
            "SampleGrad" => 4,
            "Load" if texture.kind.is_multisampled() => 2,
            "Load" => 1,
            _ => return Err(self.unknown_method(object.ty, method, loc)),
        };
        let has_offset = match arg_ids.len() {
            n if n == required => false,
            n if n == required + 1 => true,
            n => return Err(self.arg_count_error(method, required, n, loc)),
        };
        let mut args = self.lower_args(arg_ids)?.into_iter();
        let mut next = || {
            args.next().ok_or_else(|| {
                hlslcc_diagnostic::internal_error(ErrorCode::E9002, "argument count changed")
            })
        };

        let kind = texture.kind;
        let element_kind = self
            .module
            .types
            .scalar_kind(texture.element)
            .unwrap_or(ScalarKind::Float);
        let float_coord = self.module.types.vector(ScalarKind::Float, coordinate_size(kind));
        let int_coord = self.module.types.vector(ScalarKind::Int, coordinate_size(kind));
        let offset_ty = self.module.types.vector(ScalarKind::Int, offset_size(kind));
        let grad_ty = self.module.types.vector(
            ScalarKind::Float,
            coordinate_size(kind) - u8::from(is_array(kind)),
        );

        let (sampler, coordinate, op_kind, result_ty) = if method == "Load" {
            let raw = next()?;
            if texture.kind.is_multisampled() || texture.kind.is_writable() {
                let coordinate = self.convert(raw, int_coord, loc)?;
                let sample = if texture.kind.is_multisampled() {
                    Some(self.convert(next()?, TypeId::INT, loc)?)
                } else {
                    None
                };
                (None, coordinate, TextureOpKind::Read { lod: None, sample }, texture.element)
            } else {
                // The mip level rides in the last component.
                let size = coordinate_size(kind);
                let with_lod = self.module.types.vector(ScalarKind::Int, size + 1);
                let raw = self.convert(raw, with_lod, loc)?;
                let raw = self.spill(raw);
                let coordinate = raw
                    .clone()
                    .swizzle(hlslcc_ir::Swizzle::identity(size), int_coord);
                let lod = raw.swizzle(hlslcc_ir::Swizzle::single(size), TypeId::INT);
                (
                    None,
                    coordinate,
                    TextureOpKind::Read {
                        lod: Some(lod),
                        sample: None,
                    },
                    texture.element,
                )
            }
        } else {
            let sampler = next()?;
            let comparison = matches!(method, "SampleCmp" | "SampleCmpLevelZero");
            if !self.module.types.is_sampler_state(sampler.ty) {
                return Err(self.error(
                    ErrorCode::E2006,
                    loc,
                    format!("'{method}' expects a sampler, got '{}'", self.type_name(sampler.ty)),
                ));
            }
            let coordinate = self.convert(next()?, float_coord, loc)?;
            let float_scalar = TypeId::FLOAT;
            let op_kind = match method {
                "Sample" => TextureOpKind::Sample,
                "SampleLevel" => TextureOpKind::SampleLevel(self.convert(next()?, float_scalar, loc)?),
                "SampleBias" => TextureOpKind::SampleBias(self.convert(next()?, float_scalar, loc)?),
                "SampleCmp" => TextureOpKind::SampleCompare(self.convert(next()?, float_scalar, loc)?),
                "SampleCmpLevelZero" => {
                    TextureOpKind::SampleCompareLevelZero(self.convert(next()?, float_scalar, loc)?)
                }
                _ => {
                    let ddx = self.convert(next()?, grad_ty, loc)?;
                    let ddy = self.convert(next()?, grad_ty, loc)?;
                    TextureOpKind::SampleGrad { ddx, ddy }
                }
            };
            let result_ty = if comparison {
                self.module.types.scalar(element_kind)
            } else {
                texture.element
            };
            (Some(sampler), coordinate, op_kind, result_ty)
        };

        let offset = if has_offset {
            Some(self.convert(next()?, offset_ty, loc)?)
        } else {
            None
        };
        Ok(Rvalue::new(
            result_ty,
            RvalueKind::Texture(Box::new(TextureOp {
                texture: object,
                sampler,
                coordinate,
                kind: op_kind,
                offset,
            })),
        ))
    }

    /// A temporary holding `value` unless it is already cheap to repeat.
    fn spill(&mut self, value: Rvalue) -> Rvalue {
        if matches!(value.kind, RvalueKind::Var(_) | RvalueKind::Constant(_)) {
            return value;
        }
        let tmp = self.temp(value.ty);
        let spilled = Rvalue::var(tmp, value.ty);
        self.emit(Instruction::assign(spilled.clone(), value));
        spilled
    }

    /// `GetDimensions([mip,] out width [, out height ...] [, out levels])`.
    fn lower_get_dimensions(
        &mut self,
        object: Rvalue,
        texture: TextureType,
        arg_ids: &[ExprId],
        loc: SourceLocation,
    ) -> Result<Rvalue, SourceError> {
        let sizes = size_components(texture.kind);
        let mut outputs: Vec<u8> = sizes.to_vec();
        let with_mip = if texture.kind.is_multisampled() {
            outputs.push(TextureOpKind::SIZE_SAMPLES);
            false
        } else if texture.kind.is_writable() || arg_ids.len() == sizes.len() {
            false
        } else {
            outputs.push(TextureOpKind::SIZE_MIP_LEVELS);
            true
        };
        let expected = outputs.len() + usize::from(with_mip);
        if arg_ids.len() != expected {
            return Err(self.arg_count_error("GetDimensions", expected, arg_ids.len(), loc));
        }

        let mut args = self.lower_args(arg_ids)?.into_iter();
        let lod = if with_mip {
            match args.next() {
                Some(mip) => Some(self.convert(mip, TypeId::UINT, loc)?),
                None => None,
            }
        } else {
            None
        };
        for (component, out) in outputs.into_iter().zip(args) {
            let target = self.as_lvalue(out, loc)?;
            let size = Rvalue::new(
                TypeId::UINT,
                RvalueKind::Texture(Box::new(TextureOp {
                    texture: object.clone(),
                    sampler: None,
                    coordinate: Rvalue::uint(0),
                    kind: TextureOpKind::Size {
                        lod: lod.clone(),
                        component,
                    },
                    offset: None,
                })),
            );
            self.store(&target, size, loc)?;
        }
        Ok(void_value())
    }
}
