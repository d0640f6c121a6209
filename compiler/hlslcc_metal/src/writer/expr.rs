//! Expressions and texture operations.

use std::fmt::Write;

use hlslcc_ir::{ExprOp, Rvalue, RvalueKind, TextureOp, TextureOpKind, Type, TypeId};
use hlslcc_syntax::{ScalarKind, TextureKind};

use super::Writer;
use crate::error::{unprintable, WriteError, WriteResult};
use crate::MetalTarget;

/// How an operator is spelled: text before the first operand, between the
/// first and second, between the second and third, and after the last.
#[derive(Copy, Clone, Debug)]
struct Spelling {
    vector: [&'static str; 4],
    /// Used instead when the operands are scalars.
    scalar: Option<[&'static str; 4]>,
}

const fn call(prefix: &'static str) -> Spelling {
    Spelling {
        vector: [prefix, ",", ",", ")"],
        scalar: None,
    }
}

const fn infix(op: &'static str) -> Spelling {
    Spelling {
        vector: ["(", op, "", ")"],
        scalar: None,
    }
}

const fn wrap(prefix: &'static str, suffix: &'static str) -> Spelling {
    Spelling {
        vector: [prefix, "", "", suffix],
        scalar: None,
    }
}

/// Printed by [`Writer::special`] instead.
const SPECIAL: Spelling = wrap("", "");

const fn with_scalar(spelling: Spelling, scalar: [&'static str; 4]) -> Spelling {
    Spelling {
        vector: spelling.vector,
        scalar: Some(scalar),
    }
}

/// Indexed by [`ExprOp::index`].
const EXPR_TABLE: [Spelling; ExprOp::COUNT] = [
    wrap("(-", ")"),                                        // Neg
    with_scalar(call("not("), ["!(", "", "", ")"]),         // LogicNot
    wrap("(~", ")"),                                        // BitNot
    call("abs("),                                           // Abs
    call("sign("),                                          // Sign
    SPECIAL,                                                // Rcp
    call("rsqrt("),                                         // Rsqrt
    call("sqrt("),                                          // Sqrt
    call("exp("),                                           // Exp
    call("exp2("),                                          // Exp2
    call("log("),                                           // Log
    call("log2("),                                          // Log2
    call("saturate("),                                      // Saturate
    call("trunc("),                                         // Trunc
    call("ceil("),                                          // Ceil
    call("floor("),                                         // Floor
    call("fract("),                                         // Fract
    call("rint("),                                          // Round
    call("sin("),                                           // Sin
    call("cos("),                                           // Cos
    call("tan("),                                           // Tan
    call("asin("),                                          // Asin
    call("acos("),                                          // Acos
    call("atan("),                                          // Atan
    call("sinh("),                                          // Sinh
    call("cosh("),                                          // Cosh
    call("tanh("),                                          // Tanh
    call("normalize("),                                     // Normalize
    call("length("),                                        // Length
    call("dfdx("),                                          // Ddx
    call("dfdy("),                                          // Ddy
    call("fwidth("),                                        // Fwidth
    call("isnan("),                                         // IsNan
    call("isinf("),                                         // IsInf
    with_scalar(call("any("), ["(", "", "", ")"]),          // Any
    with_scalar(call("all("), ["(", "", "", ")"]),          // All
    call("transpose("),                                     // Transpose
    call("determinant("),                                   // Determinant
    SPECIAL,                                                // Convert
    SPECIAL,                                                // AsFloat
    SPECIAL,                                                // AsInt
    SPECIAL,                                                // AsUint
    call("popcount("),                                      // CountBits
    call("reverse_bits("),                                  // ReverseBits
    wrap("(31 - clz(", "))"),                               // FirstBitHigh
    call("ctz("),                                           // FirstBitLow
    infix("+"),                                             // Add
    infix("-"),                                             // Sub
    infix("*"),                                             // Mul
    infix("/"),                                             // Div
    Spelling {
        vector: ["((", ")%(", "", "))"],
        scalar: None,
    }, // Mod
    call("fmod("),                                          // FMod
    infix("<"),                                             // Less
    infix(">"),                                             // Greater
    infix("<="),                                            // LessEqual
    infix(">="),                                            // GreaterEqual
    infix("=="),                                            // Equal
    infix("!="),                                            // NotEqual
    infix("<<"),                                            // LeftShift
    infix(">>"),                                            // RightShift
    infix("&"),                                             // BitAnd
    infix("^"),                                             // BitXor
    infix("|"),                                             // BitOr
    with_scalar(SPECIAL, ["(", "&&", "", ")"]),             // LogicAnd
    with_scalar(SPECIAL, ["(", "!=", "", ")"]),             // LogicXor
    with_scalar(SPECIAL, ["(", "||", "", ")"]),             // LogicOr
    call("dot("),                                           // Dot
    call("cross("),                                         // Cross
    call("min("),                                           // Min
    call("max("),                                           // Max
    call("atan2("),                                         // Atan2
    call("pow("),                                           // Pow
    call("step("),                                          // Step
    call("distance("),                                      // Distance
    call("reflect("),                                       // Reflect
    SPECIAL,                                                // MatMul
    call("ldexp("),                                         // Ldexp
    call("mix("),                                           // Lerp
    call("smoothstep("),                                    // Smoothstep
    call("clamp("),                                         // Clamp
    call("fma("),                                           // Fma
    call("refract("),                                       // Refract
    SPECIAL,                                                // Select
    SPECIAL,                                                // Construct
];

fn is_special(op: ExprOp) -> bool {
    matches!(
        op,
        ExprOp::Rcp
            | ExprOp::Convert
            | ExprOp::AsFloat
            | ExprOp::AsInt
            | ExprOp::AsUint
            | ExprOp::MatMul
            | ExprOp::Select
            | ExprOp::Construct
    )
}

/// Spatial dimensions and whether an array slice follows them.
const fn texture_dims(kind: TextureKind) -> (u8, bool) {
    match kind {
        TextureKind::Texture1D | TextureKind::RWTexture1D => (1, false),
        TextureKind::Texture1DArray | TextureKind::RWTexture1DArray => (1, true),
        TextureKind::Texture2DArray
        | TextureKind::RWTexture2DArray
        | TextureKind::Texture2DMSArray => (2, true),
        TextureKind::Texture3D | TextureKind::RWTexture3D | TextureKind::TextureCube => (3, false),
        TextureKind::TextureCubeArray => (3, true),
        _ => (2, false),
    }
}

const fn is_cube(kind: TextureKind) -> bool {
    matches!(kind, TextureKind::TextureCube | TextureKind::TextureCubeArray)
}

const LETTERS: [char; 4] = ['x', 'y', 'z', 'w'];

impl Writer<'_> {
    pub(super) fn rvalue_string(&self, r: &Rvalue) -> Result<String, WriteError> {
        let mut out = String::new();
        self.rvalue(&mut out, r)?;
        Ok(out)
    }

    pub(super) fn rvalue(&self, out: &mut String, r: &Rvalue) -> WriteResult {
        match &r.kind {
            RvalueKind::Constant(values) => self.constant(out, r.ty, values, false),
            RvalueKind::Var(var) => {
                out.push_str(&self.var_name(*var));
                Ok(())
            }
            RvalueKind::Index { base, index } => {
                self.rvalue(out, base)?;
                if self.is_wrapped(base) {
                    out.push_str(".Inner");
                }
                out.push('[');
                match (&index.kind, self.module.types.scalar_kind(index.ty)) {
                    (RvalueKind::Constant(values), _) => self.constant(out, index.ty, values, true)?,
                    (_, Some(ScalarKind::Uint)) => {
                        out.push_str("int(");
                        self.rvalue(out, index)?;
                        out.push(')');
                    }
                    _ => self.rvalue(out, index)?,
                }
                out.push(']');
                Ok(())
            }
            RvalueKind::Field { base, field } => {
                self.rvalue(out, base)?;
                let name = self
                    .module
                    .types
                    .struct_type(base.ty)
                    .and_then(|s| s.fields.get(*field))
                    .map(|f| f.name.as_str())
                    .ok_or_else(|| unprintable("field of a non-struct value"))?;
                write!(out, ".{name}")?;
                Ok(())
            }
            RvalueKind::Swizzle { base, swizzle } => {
                if self.module.types.is_scalar(base.ty) {
                    if self.module.types.is_scalar(r.ty) {
                        return self.rvalue(out, base);
                    }
                    write!(out, "{}(", self.type_name(r.ty)?)?;
                    self.rvalue(out, base)?;
                    out.push(')');
                    return Ok(());
                }
                if base.is_constant() {
                    out.push('(');
                    self.rvalue(out, base)?;
                    out.push(')');
                } else {
                    self.rvalue(out, base)?;
                }
                write!(out, ".{}", swizzle.letters())?;
                Ok(())
            }
            RvalueKind::Expr { op, operands } => self.expression(out, r.ty, *op, operands),
            RvalueKind::Texture(op) => self.texture_op(out, r.ty, op),
        }
    }

    /// An array value whose type is printed as an `_mdarr_` wrapper: a
    /// multi-dimensional array or an element of one.
    pub(super) fn is_wrapped(&self, r: &Rvalue) -> bool {
        if !self.module.types.is_array(r.ty) {
            return false;
        }
        if self.is_md_array(r.ty) {
            return true;
        }
        match &r.kind {
            RvalueKind::Index { base, .. } => self.is_wrapped(base),
            _ => false,
        }
    }

    fn expression(&self, out: &mut String, ty: TypeId, op: ExprOp, operands: &[Rvalue]) -> WriteResult {
        if let Some(arity) = op.arity() {
            if operands.len() != arity {
                return Err(unprintable(format!(
                    "{op:?} with {} operands",
                    operands.len()
                )));
            }
        }
        let scalar = operands
            .first()
            .is_some_and(|o| self.module.types.is_scalar(o.ty));
        let spelling = &EXPR_TABLE[op.index()];
        if let (true, Some(parts)) = (scalar, spelling.scalar) {
            return self.spelled(out, parts, operands);
        }
        if is_special(op) || matches!(op, ExprOp::LogicAnd | ExprOp::LogicXor | ExprOp::LogicOr) {
            return self.special(out, ty, op, operands);
        }
        self.spelled(out, spelling.vector, operands)
    }

    fn spelled(&self, out: &mut String, parts: [&str; 4], operands: &[Rvalue]) -> WriteResult {
        out.push_str(parts[0]);
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                out.push_str(parts[i.min(2)]);
            }
            self.rvalue(out, operand)?;
        }
        out.push_str(parts[3]);
        Ok(())
    }

    fn special(&self, out: &mut String, ty: TypeId, op: ExprOp, operands: &[Rvalue]) -> WriteResult {
        let name = self.type_name(ty)?;
        match op {
            ExprOp::Rcp => {
                write!(out, "({name}(1.0)/")?;
                self.rvalue(out, &operands[0])?;
                out.push(')');
            }
            ExprOp::Convert => {
                write!(out, "{name}(")?;
                self.rvalue(out, &operands[0])?;
                out.push(')');
            }
            ExprOp::AsFloat | ExprOp::AsInt | ExprOp::AsUint => {
                write!(out, "as_type<{name}>(")?;
                self.rvalue(out, &operands[0])?;
                out.push(')');
            }
            ExprOp::MatMul => {
                // HLSL rows are Metal columns, so the product turns around.
                out.push('(');
                self.rvalue(out, &operands[1])?;
                out.push_str(" * ");
                self.rvalue(out, &operands[0])?;
                out.push(')');
            }
            ExprOp::Select => {
                let [condition, a, b] = operands else {
                    return Err(unprintable("select without three operands"));
                };
                if self.module.types.is_scalar(ty) {
                    out.push_str("((");
                    self.rvalue(out, condition)?;
                    out.push_str(")?(");
                    self.rvalue(out, a)?;
                    out.push_str("):(");
                    self.rvalue(out, b)?;
                    out.push_str("))");
                } else {
                    out.push_str("select(");
                    self.rvalue(out, b)?;
                    out.push_str(", ");
                    self.rvalue(out, a)?;
                    out.push_str(", ");
                    self.rvalue(out, condition)?;
                    out.push(')');
                }
            }
            ExprOp::Construct => {
                let (open, close) = match self.module.types.get(ty) {
                    Type::Struct(_) => ('{', '}'),
                    Type::Scalar(_) | Type::Vector(..) | Type::Matrix { .. } => ('(', ')'),
                    _ => {
                        return Err(unprintable(format!(
                            "constructor of '{}' outside an assignment",
                            self.module.types.name(ty)
                        )))
                    }
                };
                write!(out, "{name}{open}")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.rvalue(out, operand)?;
                }
                out.push(close);
            }
            ExprOp::LogicAnd | ExprOp::LogicOr | ExprOp::LogicXor => {
                let n = self.module.types.vector_size(ty);
                let (cast, join, wrap) = match op {
                    ExprOp::LogicAnd => ("uint", "*", ""),
                    ExprOp::LogicOr => ("uint", "+", ""),
                    _ => ("int", "-", "abs"),
                };
                write!(out, "bool{n}({wrap}({cast}{n}(")?;
                self.rvalue(out, &operands[0])?;
                write!(out, "){join}{cast}{n}(")?;
                self.rvalue(out, &operands[1])?;
                out.push_str(")))");
            }
            _ => return Err(unprintable(format!("no spelling for {op:?}"))),
        }
        Ok(())
    }

    // ── Textures ──

    fn texture_op(&self, out: &mut String, ty: TypeId, op: &TextureOp) -> WriteResult {
        let Type::Texture(texture) = self.module.types.get(op.texture.ty) else {
            return Err(unprintable("texture operation on a non-texture"));
        };
        let kind = texture.kind;
        let binding = op.texture.root_var().and_then(|v| self.resources.texture(v));
        let depth = binding.is_some_and(|b| b.compare);

        self.rvalue(out, &op.texture)?;
        let returns_vector = match &op.kind {
            TextureOpKind::Sample
            | TextureOpKind::SampleLevel(_)
            | TextureOpKind::SampleBias(_)
            | TextureOpKind::SampleGrad { .. } => {
                out.push_str(".sample(");
                self.sampler_argument(out, op)?;
                out.push_str(", ");
                self.sample_coordinate(out, kind, &op.coordinate)?;
                if kind != TextureKind::Texture1D {
                    match &op.kind {
                        TextureOpKind::SampleLevel(lod) => {
                            out.push_str(", level(");
                            self.rvalue(out, lod)?;
                            out.push(')');
                        }
                        TextureOpKind::SampleBias(bias) => {
                            out.push_str(", bias(");
                            self.rvalue(out, bias)?;
                            out.push(')');
                        }
                        TextureOpKind::SampleGrad { ddx, ddy } => {
                            let gradient = match texture_dims(kind) {
                                _ if is_cube(kind) => "gradientcube",
                                (3, _) => "gradient3d",
                                _ => "gradient2d",
                            };
                            write!(out, ", {gradient}(")?;
                            self.rvalue(out, ddx)?;
                            out.push_str(", ");
                            self.rvalue(out, ddy)?;
                            out.push(')');
                        }
                        _ => {}
                    }
                }
                self.offset_argument(out, kind, op)?;
                out.push(')');
                !depth
            }
            TextureOpKind::SampleCompare(reference) | TextureOpKind::SampleCompareLevelZero(reference) => {
                out.push_str(".sample_compare(");
                self.sampler_argument(out, op)?;
                out.push_str(", ");
                self.sample_coordinate(out, kind, &op.coordinate)?;
                out.push_str(", ");
                self.rvalue(out, reference)?;
                let level_zero = matches!(op.kind, TextureOpKind::SampleCompareLevelZero(_));
                let ios_cube = is_cube(kind) && self.options.target == MetalTarget::Ios;
                if level_zero && !ios_cube {
                    out.push_str(", level(0)");
                }
                self.offset_argument(out, kind, op)?;
                out.push(')');
                false
            }
            TextureOpKind::Read { lod, sample } => {
                if is_cube(kind) {
                    return Err(unprintable("texel fetch from a cube texture"));
                }
                out.push_str(".read(");
                self.texel_coordinate(out, kind, &op.coordinate)?;
                let extra = sample.as_ref().or(lod.as_ref().filter(|l| !is_zero(l)));
                if let Some(extra) = extra {
                    out.push_str(", ");
                    self.rvalue(out, extra)?;
                }
                out.push(')');
                !depth
            }
            TextureOpKind::Size { lod, component } => {
                self.size_query(out, kind, lod.as_ref(), *component)?;
                false
            }
        };

        let size = self.module.types.vector_size(ty);
        if returns_vector && (1..4).contains(&size) {
            let letters: String = LETTERS[..usize::from(size)].iter().collect();
            write!(out, ".{letters}")?;
        }
        Ok(())
    }

    fn sampler_argument(&self, out: &mut String, op: &TextureOp) -> WriteResult {
        let sampler = op
            .sampler
            .as_ref()
            .ok_or_else(|| unprintable("sampling without a sampler"))?;
        let inline = op
            .texture
            .root_var()
            .and_then(|v| self.resources.texture(v))
            .and_then(|b| b.inline_sampler());
        match inline {
            Some(slot) => write!(out, "s{slot}")?,
            None => self.rvalue(out, sampler)?,
        }
        Ok(())
    }

    /// A float coordinate, with the array slice split off as a `uint`.
    fn sample_coordinate(&self, out: &mut String, kind: TextureKind, coordinate: &Rvalue) -> WriteResult {
        let (dims, array) = texture_dims(kind);
        if !array {
            return self.rvalue(out, coordinate);
        }
        let base = self.component_base(coordinate)?;
        let spatial: String = LETTERS[..usize::from(dims)].iter().collect();
        let slice = LETTERS[usize::from(dims)];
        write!(out, "{base}.{spatial}, uint({base}.{slice})")?;
        Ok(())
    }

    /// An integer coordinate as the unsigned vector `read` and `write`
    /// take, array slice split off.
    fn texel_coordinate(&self, out: &mut String, kind: TextureKind, coordinate: &Rvalue) -> WriteResult {
        let (dims, array) = texture_dims(kind);
        let cast = if dims == 1 {
            "uint".to_owned()
        } else {
            format!("uint{dims}")
        };
        if !array {
            write!(out, "{cast}(")?;
            self.rvalue(out, coordinate)?;
            out.push(')');
            return Ok(());
        }
        let base = self.component_base(coordinate)?;
        let spatial: String = LETTERS[..usize::from(dims)].iter().collect();
        let slice = LETTERS[usize::from(dims)];
        write!(out, "{cast}({base}.{spatial}), uint({base}.{slice})")?;
        Ok(())
    }

    /// `coordinate` printed so a swizzle can follow it.
    fn component_base(&self, coordinate: &Rvalue) -> Result<String, WriteError> {
        let text = self.rvalue_string(coordinate)?;
        Ok(match coordinate.kind {
            RvalueKind::Var(_) | RvalueKind::Field { .. } | RvalueKind::Index { .. } => text,
            _ => format!("({text})"),
        })
    }

    fn offset_argument(&self, out: &mut String, kind: TextureKind, op: &TextureOp) -> WriteResult {
        let Some(offset) = &op.offset else {
            return Ok(());
        };
        if is_cube(kind) || kind == TextureKind::Texture1D || kind == TextureKind::Texture1DArray {
            tracing::debug!(?kind, "dropped texel offset Metal cannot express");
            return Ok(());
        }
        out.push_str(", ");
        self.rvalue(out, offset)
    }

    fn size_query(&self, out: &mut String, kind: TextureKind, lod: Option<&Rvalue>, component: u8) -> WriteResult {
        let (dims, array) = texture_dims(kind);
        let takes_lod = !kind.is_multisampled();
        let method = match component {
            TextureOpKind::SIZE_MIP_LEVELS => "get_num_mip_levels",
            TextureOpKind::SIZE_SAMPLES => "get_num_samples",
            c if c < dims && !(is_cube(kind) && c == 2) => ["get_width", "get_height", "get_depth"][usize::from(c)],
            c if array && c == dims - u8::from(is_cube(kind)) => "get_array_size",
            c => return Err(unprintable(format!("size component {c} of {kind:?}"))),
        };
        write!(out, ".{method}(")?;
        let per_level = matches!(method, "get_width" | "get_height" | "get_depth");
        if let (true, true, Some(lod)) = (per_level, takes_lod, lod) {
            if !is_zero(lod) {
                self.rvalue(out, lod)?;
            }
        }
        out.push(')');
        Ok(())
    }

    /// `texture.write(value, coordinate)` with the value widened to four
    /// components.
    pub(super) fn texture_store(&self, texture: &Rvalue, coordinate: &Rvalue, value: &Rvalue) -> Result<String, WriteError> {
        let Type::Texture(t) = self.module.types.get(texture.ty) else {
            return Err(unprintable("store to a non-texture"));
        };
        let kind = t.kind;
        let mut out = self.rvalue_string(texture)?;
        out.push_str(".write(");
        let size = self.module.types.vector_size(value.ty);
        match size {
            4 => self.rvalue(&mut out, value)?,
            1 => {
                let element = self
                    .module
                    .types
                    .scalar_kind(value.ty)
                    .ok_or_else(|| unprintable("non-numeric texel"))?;
                write!(out, "{}4(", element.name())?;
                self.rvalue(&mut out, value)?;
                out.push(')');
            }
            2 | 3 => {
                let base = self.component_base(value)?;
                let mut letters: String = LETTERS[..usize::from(size)].iter().collect();
                while letters.len() < 4 {
                    letters.push('x');
                }
                write!(out, "{base}.{letters}")?;
            }
            _ => return Err(unprintable("non-numeric texel")),
        }
        out.push_str(", ");
        self.texel_coordinate(&mut out, kind, coordinate)?;
        out.push(')');
        Ok(out)
    }
}

fn is_zero(r: &Rvalue) -> bool {
    r.as_constant()
        .and_then(|c| c.first())
        .is_some_and(|v| v.as_f32() == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_operator() {
        for op in ExprOp::ALL {
            let spelling = &EXPR_TABLE[op.index()];
            let printed_by_table = !spelling.vector[0].is_empty() || spelling.scalar.is_some();
            assert!(
                printed_by_table || is_special(op),
                "{op:?} has neither a spelling nor a special case"
            );
        }
    }
}
