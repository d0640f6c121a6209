//! Packing of uniforms into per-precision register arrays.
//!
//! Loose numeric uniforms (and, when flattening, the members of every
//! cbuffer the entry reads) are laid out in one `float4`-style array per
//! precision: `pu_h` (float), `pu_m` (half), `pu_i` (int) and `pu_u` (uint,
//! bools included). Each uniform starts a register. The arrays become
//! uniforms with a one-letter semantic naming their precision; the packed
//! uniforms turn into locals filled from the arrays at the top of `Main`.
//!
//! Flattened cbuffers are described to the runtime as copy ranges from the
//! cbuffer's HLSL layout into the arrays, merged where both sides are
//! contiguous.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_ir::visit::{read_vars, written_vars};
use hlslcc_ir::{
    ExprOp, Instruction, Module, Rvalue, Swizzle, Type, TypeId, VarId, VarMode, Variable,
};
use hlslcc_syntax::ScalarKind;
use rustc_hash::FxHashSet;

use crate::header::{PackedGlobal, PackedUb, PackedUbCopy, PackedUbMember};
use crate::layout::{align_register, cbuffer_offsets, registers, size_in_floats, REGISTER};

/// Precision characters in slot order.
pub(crate) const ARRAY_TYPES: [char; 5] = ['h', 'm', 'l', 'i', 'u'];

/// Fixed buffer slot of a packed array.
pub(crate) fn array_slot(array_type: char) -> Option<usize> {
    ARRAY_TYPES.iter().position(|&c| c == array_type)
}

fn array_type(kind: ScalarKind) -> char {
    match kind {
        ScalarKind::Float => 'h',
        ScalarKind::Half => 'm',
        ScalarKind::Int => 'i',
        ScalarKind::Uint | ScalarKind::Bool => 'u',
    }
}

fn array_element(array_type: char) -> ScalarKind {
    match array_type {
        'm' => ScalarKind::Half,
        'i' => ScalarKind::Int,
        'u' => ScalarKind::Uint,
        _ => ScalarKind::Float,
    }
}

/// What packing did to a module.
#[derive(Default, Debug)]
pub(crate) struct PackedUniforms {
    /// The `pu_*` arrays and their precision.
    pub arrays: Vec<(char, VarId)>,
    pub globals: Vec<PackedGlobal>,
    pub ubs: Vec<PackedUb>,
    pub copies: Vec<PackedUbCopy>,
    /// Uniform blocks whose members now live in the arrays.
    pub flattened: FxHashSet<usize>,
}

/// Insert `copy` into `ranges`, kept sorted by source buffer and offset,
/// merging it with neighbours it continues on both sides.
pub fn insert_range(ranges: &mut Vec<PackedUbCopy>, copy: PackedUbCopy) {
    let key = |c: &PackedUbCopy| (c.source_ub, c.source_offset);
    let at = ranges.partition_point(|r| key(r) < key(&copy));
    ranges.insert(at, copy);

    if at + 1 < ranges.len() && ranges[at].continued_by(&ranges[at + 1]) {
        let next = ranges.remove(at + 1);
        ranges[at].size += next.size;
    }
    if at > 0 && ranges[at - 1].continued_by(&ranges[at]) {
        let current = ranges.remove(at);
        ranges[at - 1].size += current.size;
    }
}

/// Next free float of each packed array.
#[derive(Default)]
struct Cursors([u32; ARRAY_TYPES.len()]);

impl Cursors {
    fn allocate(&mut self, array_type: char, size: u32) -> u32 {
        let slot = array_slot(array_type).unwrap_or(0);
        let offset = self.0[slot];
        self.0[slot] = align_register(offset + size);
        offset
    }
}

/// A uniform moved into an array: its variable and first float.
struct Placement {
    var: VarId,
    array_type: char,
    offset: u32,
}

/// Pack the module's uniforms; see the module docs.
pub(crate) fn pack_uniforms(
    module: &mut Module,
    flatten_uniform_buffers: bool,
) -> Result<PackedUniforms, SourceError> {
    let Some(entry) = module.entry else {
        return Err(hlslcc_diagnostic::internal_error(
            ErrorCode::E9001,
            "module has no entry function",
        ));
    };
    let used = {
        let body = &module[entry].body;
        let mut used = read_vars(body);
        used.extend(written_vars(body));
        used
    };

    let mut packed = PackedUniforms::default();
    let mut cursors = Cursors::default();
    let mut placements = Vec::new();

    for &var in &module.globals {
        let variable = &module[var];
        if variable.mode != VarMode::Uniform || variable.block.is_some() || !used.contains(&var) {
            continue;
        }
        let (Some(kind), Some(size)) = (
            innermost_kind(module, variable.ty),
            size_in_floats(&module.types, variable.ty),
        ) else {
            continue;
        };
        let array_type = array_type(kind);
        let offset = cursors.allocate(array_type, size);
        packed.globals.push(PackedGlobal {
            name: variable.name.clone(),
            array_type,
            offset,
            size,
        });
        placements.push(Placement {
            var,
            array_type,
            offset,
        });
    }

    if flatten_uniform_buffers {
        for (block, ub) in module.uniform_blocks.iter().enumerate() {
            if !ub.members.iter().any(|m| used.contains(m)) {
                continue;
            }
            let member_types: Vec<TypeId> = ub.members.iter().map(|&m| module[m].ty).collect();
            let kinds: Option<Vec<ScalarKind>> = member_types
                .iter()
                .map(|&ty| innermost_kind(module, ty))
                .collect();
            let (Some(offsets), Some(kinds)) = (cbuffer_offsets(&module.types, &member_types), kinds)
            else {
                continue;
            };

            #[expect(
                clippy::cast_possible_truncation,
                reason = "a shader never declares 2^32 cbuffers"
            )]
            let index = packed.ubs.len() as u32;
            let mut members = Vec::with_capacity(ub.members.len());
            for ((&member, &source_offset), (&ty, kind)) in ub
                .members
                .iter()
                .zip(&offsets)
                .zip(member_types.iter().zip(kinds))
            {
                let size = size_in_floats(&module.types, ty).unwrap_or(0);
                let array_type = array_type(kind);
                let dest_offset = cursors.allocate(array_type, size);
                members.push(PackedUbMember {
                    name: module[member].name.clone(),
                    offset: source_offset,
                    size,
                });
                insert_range(
                    &mut packed.copies,
                    PackedUbCopy {
                        source_ub: index,
                        source_offset,
                        dest_array_type: array_type,
                        dest_offset,
                        size,
                    },
                );
                if used.contains(&member) {
                    placements.push(Placement {
                        var: member,
                        array_type,
                        offset: dest_offset,
                    });
                }
            }
            packed.ubs.push(PackedUb {
                name: ub.name.clone(),
                index,
                members,
            });
            packed.flattened.insert(block);
        }
    }

    // ── Arrays ──
    for (slot, &array_type) in ARRAY_TYPES.iter().enumerate() {
        let floats = cursors.0[slot];
        if floats == 0 {
            continue;
        }
        let element = module.types.vector(array_element(array_type), 4);
        let ty = module.types.array(element, floats / REGISTER);
        let var = module.add_variable(
            Variable::new(format!("pu_{array_type}"), ty, VarMode::Uniform)
                .global()
                .with_semantic(array_type.to_string()),
        );
        module.globals.push(var);
        packed.arrays.push((array_type, var));
    }

    // ── Unpacking ──
    let moved: FxHashSet<VarId> = placements.iter().map(|p| p.var).collect();
    module.globals.retain(|v| !moved.contains(v));
    let mut prologue = Vec::with_capacity(placements.len() * 2);
    for placement in &placements {
        let Some(&(_, array)) = packed
            .arrays
            .iter()
            .find(|(c, _)| *c == placement.array_type)
        else {
            continue;
        };
        let variable = &mut module[placement.var];
        variable.mode = VarMode::Auto;
        variable.global = false;
        variable.block = None;
        let ty = variable.ty;
        prologue.push(Instruction::Declare(placement.var));
        unpack(
            module,
            array,
            Rvalue::var(placement.var, ty),
            placement.offset / REGISTER,
            &mut prologue,
        );
    }
    if !prologue.is_empty() {
        module[entry].body.splice(0..0, prologue);
    }

    tracing::debug!(
        globals = packed.globals.len(),
        ubs = packed.ubs.len(),
        copies = packed.copies.len(),
        arrays = packed.arrays.len(),
        "packed uniforms"
    );
    Ok(packed)
}

/// Element kind of a numeric type or an array of them.
fn innermost_kind(module: &Module, ty: TypeId) -> Option<ScalarKind> {
    let (_, element) = module.types.array_dims(ty);
    module.types.scalar_kind(element)
}

/// Assignments filling `lhs` from `array`, starting at `register`.
fn unpack(module: &mut Module, array: VarId, lhs: Rvalue, register: u32, out: &mut Vec<Instruction>) {
    let ty = lhs.ty;
    match *module.types.get(ty) {
        Type::Array { element, length } => {
            let stride = registers(&module.types, element).unwrap_or(1);
            for i in 0..length {
                let index = Rvalue::int(i32::try_from(i).unwrap_or(i32::MAX));
                unpack(module, array, lhs.clone().index(index, element), register + i * stride, out);
            }
        }
        Type::Matrix { rows, .. } => {
            let row_ty = module.types.element(ty).unwrap_or(ty);
            let mut operands = Vec::with_capacity(usize::from(rows));
            for row in 0..u32::from(rows) {
                operands.push(read_register(module, array, register + row, row_ty));
            }
            out.push(Instruction::assign(lhs, Rvalue::expr(ty, ExprOp::Construct, operands)));
        }
        _ => {
            let value = read_register(module, array, register, ty);
            out.push(Instruction::assign(lhs, value));
        }
    }
}

/// The first components of `array[register]`, converted to `ty`.
fn read_register(module: &mut Module, array: VarId, register: u32, ty: TypeId) -> Rvalue {
    let array_ty = module[array].ty;
    let element = module.types.element(array_ty).unwrap_or(array_ty);
    let size = module.types.vector_size(ty).max(1);
    let kind = module.types.scalar_kind(element).unwrap_or(ScalarKind::Float);
    let stored = module.types.vector(kind, size);

    let index = Rvalue::int(i32::try_from(register).unwrap_or(i32::MAX));
    let row = Rvalue::var(array, array_ty).index(index, element);
    let value = row.swizzle(Swizzle::identity(size), stored);
    if stored == ty {
        value
    } else {
        Rvalue::expr(ty, ExprOp::Convert, vec![value])
    }
}
