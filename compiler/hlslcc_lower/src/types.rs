//! Type specifiers, structs and array dimensions.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_ir::{StructField, StructType, TextureType, Type, TypeId};
use hlslcc_syntax::ast::{Literal, Operator, StructSpecifier, TypeName, TypeSpecifier};
use hlslcc_syntax::{ExprId, NumericType, SamplerKind, ScalarKind, Shape, SourceLocation, TextureKind};

use crate::Lowerer;

impl Lowerer<'_> {
    pub(crate) fn resolve_type(&mut self, spec: &TypeSpecifier) -> Result<TypeId, SourceError> {
        match &spec.name {
            TypeName::Void => Ok(TypeId::VOID),
            TypeName::Numeric(numeric) => self.numeric_type(*numeric, spec.loc),
            TypeName::Double => Err(self.error(
                ErrorCode::E3004,
                spec.loc,
                "double precision is not supported by Metal",
            )),
            TypeName::Sampler(kind) => Ok(self.module.types.intern(Type::SamplerState {
                comparison: *kind == SamplerKind::SamplerComparisonState,
            })),
            TypeName::Texture(kind) => self.resource_type(*kind, spec),
            TypeName::Named(name) => self.lookup_type(*name).ok_or_else(|| {
                self.error(
                    ErrorCode::E2002,
                    spec.loc,
                    format!("unknown type '{}'", self.name(*name)),
                )
            }),
            TypeName::Struct(definition) => self.lower_struct(definition),
        }
    }

    pub(crate) fn numeric_type(
        &mut self,
        numeric: NumericType,
        loc: SourceLocation,
    ) -> Result<TypeId, SourceError> {
        let types = &mut self.module.types;
        match numeric.shape {
            Shape::Scalar => Ok(types.scalar(numeric.scalar)),
            Shape::Vector(n) => Ok(types.vector(numeric.scalar, n)),
            Shape::Matrix { rows, cols } if rows >= 2 && cols >= 2 => {
                Ok(types.matrix(numeric.scalar, rows, cols))
            }
            Shape::Matrix { .. } => Err(self.error(
                ErrorCode::E2008,
                loc,
                format!("matrix type '{numeric}' has no Metal equivalent"),
            )),
        }
    }

    /// The HLSL shape of a numeric IR type.
    pub(crate) fn numeric_of(&self, ty: TypeId) -> Option<NumericType> {
        match *self.module.types.get(ty) {
            Type::Scalar(kind) => Some(NumericType::scalar(kind)),
            Type::Vector(kind, n) => Some(NumericType::vector(kind, n)),
            Type::Matrix { scalar, rows, cols } => Some(NumericType::matrix(scalar, rows, cols)),
            _ => None,
        }
    }

    pub(crate) fn intern_numeric(&mut self, numeric: NumericType) -> TypeId {
        let types = &mut self.module.types;
        match numeric.shape {
            Shape::Scalar => types.scalar(numeric.scalar),
            Shape::Vector(n) => types.vector(numeric.scalar, n),
            Shape::Matrix { rows, cols } => types.matrix(numeric.scalar, rows, cols),
        }
    }

    fn resource_type(&mut self, kind: TextureKind, spec: &TypeSpecifier) -> Result<TypeId, SourceError> {
        let default_element = match kind {
            TextureKind::ByteAddressBuffer | TextureKind::RWByteAddressBuffer => TypeId::UINT,
            _ => self.module.types.vector(ScalarKind::Float, 4),
        };
        let element = match &spec.inner {
            Some(inner) => self.resolve_type(inner)?,
            None => default_element,
        };
        let ty = if kind.is_buffer() {
            Type::Buffer {
                element,
                writable: kind.is_writable(),
            }
        } else {
            Type::Texture(TextureType { kind, element })
        };
        Ok(self.module.types.intern(ty))
    }

    fn lower_struct(&mut self, definition: &StructSpecifier) -> Result<TypeId, SourceError> {
        let mut fields = Vec::new();
        if let Some(parent) = definition.parent {
            let parent_ty = self.lookup_type(parent).ok_or_else(|| {
                self.error(
                    ErrorCode::E2002,
                    definition.loc,
                    format!("unknown base struct '{}'", self.name(parent)),
                )
            })?;
            if let Some(parent_struct) = self.module.types.struct_type(parent_ty) {
                fields.extend(parent_struct.fields.iter().cloned());
            }
        }
        for list in &definition.members {
            let base = self.resolve_type(&list.ty.specifier)?;
            for decl in &list.declarations {
                let ty = self.apply_array_dims(base, &decl.array_dims, decl.loc)?;
                fields.push(StructField {
                    name: self.name(decl.identifier).to_owned(),
                    ty,
                    semantic: decl.semantic.map(|s| self.name(s).to_owned()),
                });
            }
        }
        let name = match definition.name {
            Some(name) => self.name(name).to_owned(),
            None => {
                self.anonymous_structs += 1;
                format!("__anon_struct_{}", self.anonymous_structs)
            }
        };
        let ty = self
            .module
            .types
            .intern(Type::Struct(StructType { name, fields }));
        if let Some(name) = definition.name {
            self.declare_type(name, ty);
        }
        Ok(ty)
    }

    /// `base` wrapped in the declarator's array dimensions; `a[2][3]` is two
    /// arrays of three.
    pub(crate) fn apply_array_dims(
        &mut self,
        base: TypeId,
        dims: &[Option<ExprId>],
        loc: SourceLocation,
    ) -> Result<TypeId, SourceError> {
        let mut ty = base;
        for dim in dims.iter().rev() {
            let Some(expr) = *dim else {
                return Err(self.error(
                    ErrorCode::E2008,
                    loc,
                    "unsized arrays are not supported",
                ));
            };
            let length = self
                .eval_const_int(expr)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    self.error(
                        ErrorCode::E2011,
                        loc,
                        "array dimension must be a positive integer constant",
                    )
                })?;
            ty = self.module.types.array(ty, length);
        }
        Ok(ty)
    }

    /// Fold an integer constant expression: literals, arithmetic and
    /// references to `static const` integers with literal initializers.
    pub(crate) fn eval_const_int(&self, id: ExprId) -> Option<i64> {
        let arena = &self.unit.arena;
        let expr = arena.get_expr(id)?;
        let operand = |slot| expr.operand(slot).and_then(|e| self.eval_const_int(e));
        match expr.op {
            Operator::UintConstant => match expr.literal {
                Literal::Uint(u) => Some(i64::from(u)),
                _ => None,
            },
            #[expect(clippy::cast_possible_truncation, reason = "HLSL float to int truncates")]
            Operator::FloatConstant => match expr.literal {
                Literal::Float(f) => Some(f as i64),
                _ => None,
            },
            Operator::BoolConstant => match expr.literal {
                Literal::Bool(b) => Some(i64::from(b)),
                _ => None,
            },
            Operator::Plus => operand(0),
            Operator::Neg => operand(0).map(i64::wrapping_neg),
            Operator::BitNot => operand(0).map(|v| !v),
            Operator::TypeCast => operand(0),
            Operator::Add => Some(operand(0)?.wrapping_add(operand(1)?)),
            Operator::Sub => Some(operand(0)?.wrapping_sub(operand(1)?)),
            Operator::Mul => Some(operand(0)?.wrapping_mul(operand(1)?)),
            Operator::Div => operand(0)?.checked_div(operand(1)?),
            Operator::Mod => operand(0)?.checked_rem(operand(1)?),
            Operator::LeftShift => Some(operand(0)? << (operand(1)? & 63)),
            Operator::RightShift => Some(operand(0)? >> (operand(1)? & 63)),
            Operator::BitAnd => Some(operand(0)? & operand(1)?),
            Operator::BitOr => Some(operand(0)? | operand(1)?),
            Operator::BitXor => Some(operand(0)? ^ operand(1)?),
            Operator::Identifier => self.static_const_value(expr.identifier?),
            _ => None,
        }
    }

    /// Value of a global `static const int N = 4;`.
    fn static_const_value(&self, name: hlslcc_syntax::Name) -> Option<i64> {
        use hlslcc_syntax::ast::{TopLevel, TypeQualifier};
        self.unit.declarations.iter().rev().find_map(|item| match item {
            TopLevel::Declaration(list) if list.ty.qualifier.contains(TypeQualifier::CONST) => list
                .declarations
                .iter()
                .find(|d| d.identifier == name)
                .and_then(|d| d.initializer)
                .and_then(|init| self.eval_const_int(init)),
            _ => None,
        })
    }
}
