//! Buffer slot assignment.
//!
//! Packed arrays ask for a fixed slot by precision (`h` 0, `m` 1, `l` 2,
//! `i` 3, `u` 4). Everything else (cbuffers that stay whole, struct
//! uniforms and structured buffers) fills the remaining slots in
//! declaration order. Slots left empty stay empty so packed arrays keep
//! their index whatever else the shader binds.

use hlslcc_ir::visit::{read_vars, written_vars};
use hlslcc_ir::{Module, Type, VarId, VarMode};

use crate::pack::{array_slot, PackedUniforms};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BufferKind {
    /// A `pu_*` array.
    Packed { array_type: char, var: VarId },
    /// A cbuffer, by uniform block index.
    UniformBlock(usize),
    /// A loose uniform of struct type.
    Struct(VarId),
    /// A structured buffer.
    Storage { var: VarId, writable: bool },
}

/// Buffer slots, some of which may be empty.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Buffers {
    slots: Vec<Option<BufferKind>>,
}

impl Buffers {
    /// Buffers the entry function of `module` binds.
    pub(crate) fn collect(module: &Module, packed: &PackedUniforms) -> Buffers {
        let used = module
            .entry_function()
            .map(|f| {
                let mut used = read_vars(&f.body);
                used.extend(written_vars(&f.body));
                used
            })
            .unwrap_or_default();

        let mut requests = Vec::new();
        for &(array_type, var) in &packed.arrays {
            requests.push((array_slot(array_type), BufferKind::Packed { array_type, var }));
        }
        for (block, ub) in module.uniform_blocks.iter().enumerate() {
            if !packed.flattened.contains(&block) && ub.members.iter().any(|m| used.contains(m)) {
                requests.push((None, BufferKind::UniformBlock(block)));
            }
        }
        for &var in &module.globals {
            let variable = &module[var];
            if variable.mode != VarMode::Uniform || variable.block.is_some() || !used.contains(&var) {
                continue;
            }
            match *module.types.get(variable.ty) {
                Type::Struct(_) => requests.push((None, BufferKind::Struct(var))),
                Type::Buffer { writable, .. } => {
                    requests.push((None, BufferKind::Storage { var, writable }));
                }
                _ => {}
            }
        }
        Buffers::sort(requests)
    }

    /// Place buffers with a requested slot there, then fill the holes with
    /// the rest in order, then append whatever is left.
    pub fn sort(requests: Vec<(Option<usize>, BufferKind)>) -> Buffers {
        let mut slots: Vec<Option<BufferKind>> = vec![None; requests.len()];
        let mut rest = Vec::new();
        for (slot, kind) in requests {
            match slot {
                Some(slot) => {
                    if slots.len() <= slot {
                        slots.resize(slot + 1, None);
                    }
                    slots[slot] = Some(kind);
                }
                None => rest.push(kind),
            }
        }

        let mut rest = rest.into_iter();
        for slot in &mut slots {
            if slot.is_none() {
                match rest.next() {
                    Some(kind) => *slot = Some(kind),
                    None => break,
                }
            }
        }
        slots.extend(rest.map(Some));
        while slots.last().is_some_and(Option::is_none) {
            slots.pop();
        }
        Buffers { slots }
    }

    pub fn slots(&self) -> &[Option<BufferKind>] {
        &self.slots
    }

    /// Occupied slots in order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, BufferKind)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|kind| (i, kind)))
    }

    pub fn slot_of(&self, kind: BufferKind) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(kind))
    }
}
