//! Register layout, in floats.
//!
//! A register is four floats. Matrix rows and array elements each start a
//! register; scalars and vectors inside a cbuffer share a register as long
//! as they do not straddle one.

use hlslcc_ir::{Type, TypeId, TypeTable};

/// Floats per register.
pub(crate) const REGISTER: u32 = 4;

pub(crate) const fn align_register(offset: u32) -> u32 {
    offset.div_ceil(REGISTER) * REGISTER
}

/// Floats spanned by `ty`, from its first float to its last. `None` for
/// types that cannot live in a register file.
pub(crate) fn size_in_floats(types: &TypeTable, ty: TypeId) -> Option<u32> {
    match *types.get(ty) {
        Type::Scalar(_) => Some(1),
        Type::Vector(_, n) => Some(u32::from(n)),
        Type::Matrix { rows, cols, .. } => {
            Some(u32::from(rows - 1) * REGISTER + u32::from(cols))
        }
        Type::Array { element, length } => {
            let size = size_in_floats(types, element)?;
            let stride = align_register(size);
            Some(length.saturating_sub(1) * stride + size)
        }
        _ => None,
    }
}

/// Whole registers spanned by `ty`.
pub(crate) fn registers(types: &TypeTable, ty: TypeId) -> Option<u32> {
    size_in_floats(types, ty).map(|size| align_register(size) / REGISTER)
}

/// Offsets of cbuffer members under HLSL packing rules, or `None` when a
/// member cannot be laid out.
pub(crate) fn cbuffer_offsets(types: &TypeTable, members: &[TypeId]) -> Option<Vec<u32>> {
    let mut offsets = Vec::with_capacity(members.len());
    let mut cursor = 0u32;
    for &ty in members {
        let size = size_in_floats(types, ty)?;
        let starts_register = matches!(types.get(ty), Type::Array { .. } | Type::Matrix { .. });
        if starts_register || cursor % REGISTER + size > REGISTER {
            cursor = align_register(cursor);
        }
        offsets.push(cursor);
        cursor += size;
    }
    Some(offsets)
}

#[cfg(test)]
mod tests {
    use hlslcc_syntax::ScalarKind;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn sizes() {
        let mut types = TypeTable::new();
        let float3 = types.vector(ScalarKind::Float, 3);
        let float4x4 = types.matrix(ScalarKind::Float, 4, 4);
        let float3x2 = types.matrix(ScalarKind::Float, 3, 2);
        let floats = types.array(TypeId::FLOAT, 3);
        assert_eq!(size_in_floats(&types, float3), Some(3));
        assert_eq!(size_in_floats(&types, float4x4), Some(16));
        assert_eq!(size_in_floats(&types, float3x2), Some(10));
        assert_eq!(size_in_floats(&types, floats), Some(9));
        assert_eq!(registers(&types, floats), Some(3));
        assert_eq!(size_in_floats(&types, TypeId::VOID), None);
    }

    #[test]
    fn cbuffer_members_do_not_straddle_registers() {
        let mut types = TypeTable::new();
        let float2 = types.vector(ScalarKind::Float, 2);
        let float3 = types.vector(ScalarKind::Float, 3);
        let float4 = types.vector(ScalarKind::Float, 4);
        let offsets = cbuffer_offsets(&types, &[float4, float3, TypeId::FLOAT, float2, float3]);
        assert_eq!(offsets, Some(vec![0, 4, 7, 8, 12]));
    }

    #[test]
    fn cbuffer_arrays_start_a_register() {
        let mut types = TypeTable::new();
        let floats = types.array(TypeId::FLOAT, 2);
        let offsets = cbuffer_offsets(&types, &[TypeId::FLOAT, floats, TypeId::FLOAT]);
        assert_eq!(offsets, Some(vec![0, 4, 9]));
    }
}
