//! Constant literals.

use std::fmt::Write;

use hlslcc_ir::{ConstValue, Type, TypeId};
use hlslcc_syntax::ScalarKind;

use super::Writer;
use crate::error::{unprintable, WriteResult};

/// `1.0`, `0.25`, `0.33333334`, `(1.0/0.0)`. Negative values are wrapped in
/// parentheses so they never merge with a preceding operator.
pub(crate) fn float(out: &mut String, value: f32) -> WriteResult {
    if value.is_nan() {
        out.push_str("(0.0/0.0)");
        return Ok(());
    }
    if value.is_infinite() {
        out.push_str(if value > 0.0 { "(1.0/0.0)" } else { "(-1.0/0.0)" });
        return Ok(());
    }
    let text = if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        let fixed = format!("{value:.8}");
        let trimmed = fixed.trim_end_matches('0');
        if trimmed.parse::<f32>().is_ok_and(|v| v == 0.0) {
            format!("{value:e}")
        } else {
            trimmed.to_owned()
        }
    };
    if value.is_sign_negative() && value != 0.0 {
        write!(out, "({text})")?;
    } else {
        out.push_str(&text);
    }
    Ok(())
}

/// One component; `index` drops the `u` suffix of unsigned values.
pub(crate) fn component(out: &mut String, value: ConstValue, index: bool) -> WriteResult {
    match value {
        ConstValue::Bool(b) => out.push_str(if b { "true" } else { "false" }),
        ConstValue::Int(i) if i < 0 => write!(out, "({i})")?,
        ConstValue::Int(i) => write!(out, "{i}")?,
        ConstValue::Uint(u) if index => write!(out, "{u}")?,
        ConstValue::Uint(u) => write!(out, "{u}u")?,
        ConstValue::Float(f) => float(out, f)?,
    }
    Ok(())
}

impl Writer<'_> {
    /// A constant of type `ty`; scalars print bare (half ones wrapped in
    /// `half(...)`), vectors and matrices as constructors.
    pub(super) fn constant(
        &self,
        out: &mut String,
        ty: TypeId,
        values: &[ConstValue],
        index: bool,
    ) -> WriteResult {
        match *self.module.types.get(ty) {
            Type::Scalar(kind) => {
                let value = values
                    .first()
                    .copied()
                    .ok_or_else(|| unprintable("constant without components"))?;
                if kind == ScalarKind::Half {
                    out.push_str("half(");
                    component(out, value, index)?;
                    out.push(')');
                } else {
                    component(out, value, index)?;
                }
            }
            Type::Vector(..) | Type::Matrix { .. } => {
                out.push_str(&self.type_name(ty)?);
                out.push('(');
                for (i, &value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    component(out, value, false)?;
                }
                out.push(')');
            }
            _ => {
                return Err(unprintable(format!(
                    "constant of type '{}'",
                    self.module.types.name(ty)
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    fn float_text(value: f32) -> String {
        let mut out = String::new();
        float(&mut out, value).unwrap();
        out
    }

    fn component_text(value: ConstValue, index: bool) -> String {
        let mut out = String::new();
        component(&mut out, value, index).unwrap();
        out
    }

    #[test]
    fn integral_floats_keep_one_decimal() {
        assert_eq!(float_text(1.0), "1.0");
        assert_eq!(float_text(0.0), "0.0");
        assert_eq!(float_text(256.0), "256.0");
        assert_eq!(float_text(-2.0), "(-2.0)");
    }

    #[test]
    fn fractional_floats_are_trimmed() {
        assert_eq!(float_text(0.5), "0.5");
        assert_eq!(float_text(0.1), "0.1");
        assert_eq!(float_text(0.333_333_34), "0.33333334");
        assert_eq!(float_text(-0.25), "(-0.25)");
    }

    #[test]
    fn tiny_floats_fall_back_to_exponent_form() {
        assert_eq!(float_text(1e-9), "1e-9");
    }

    #[test]
    fn non_finite_floats() {
        assert_eq!(float_text(f32::INFINITY), "(1.0/0.0)");
        assert_eq!(float_text(f32::NEG_INFINITY), "(-1.0/0.0)");
        assert_eq!(float_text(f32::NAN), "(0.0/0.0)");
    }

    #[test]
    fn integers_and_bools() {
        assert_eq!(component_text(ConstValue::Int(7), false), "7");
        assert_eq!(component_text(ConstValue::Int(-7), false), "(-7)");
        assert_eq!(component_text(ConstValue::Uint(3), false), "3u");
        assert_eq!(component_text(ConstValue::Uint(3), true), "3");
        assert_eq!(component_text(ConstValue::Bool(true), false), "true");
        assert_eq!(component_text(ConstValue::Bool(false), false), "false");
    }
}
