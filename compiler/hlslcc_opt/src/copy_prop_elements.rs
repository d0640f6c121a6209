//! Per-channel copy propagation of scalars and vectors.
//!
//! `a.xy = b.zw;` makes `a.x` a copy of `b.z` and `a.y` a copy of `b.w`.
//! A later read such as `a.yx` becomes `b.wz` when every channel it consults
//! is a copy from the same variable. Writing some channels of `a` narrows
//! its entries to the channels left; writing any part of `b` drops every
//! entry copied from it.
//!
//! Control flow is handled the same way as whole-variable copies: branch
//! clones, loop seeds without anything the loop writes, and kills applied
//! to the enclosing block.

use hlslcc_ir::visit::{lvalue_reads_mut, written_vars};
use hlslcc_ir::{Instruction, Module, Rvalue, RvalueKind, Swizzle, VarId, VarMode, WriteMask};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug)]
struct Entry {
    lhs: VarId,
    rhs: VarId,
    /// Channels of `lhs` that still hold the copy.
    mask: WriteMask,
    /// Source channel of `rhs` for each channel of `lhs`.
    swizzle: [u8; 4],
}

#[derive(Clone, Default, Debug)]
struct Acp {
    entries: Vec<Entry>,
}

impl Acp {
    /// Write to channels `mask` of `var`; an empty mask is the whole
    /// variable.
    fn kill(&mut self, var: VarId, mask: WriteMask) {
        self.entries.retain_mut(|e| {
            if e.rhs == var {
                return false;
            }
            if e.lhs == var {
                if mask.is_empty() {
                    return false;
                }
                e.mask.remove(mask);
                return !e.mask.is_empty();
            }
            true
        });
    }

    fn without(&self, kills: &FxHashSet<VarId>) -> Acp {
        Acp {
            entries: self
                .entries
                .iter()
                .copied()
                .filter(|e| !kills.contains(&e.lhs) && !kills.contains(&e.rhs))
                .collect(),
        }
    }

    /// Source variable and channels for `channels` of `var`, when they all
    /// come from one variable.
    fn lookup(&self, var: VarId, channels: &[u8]) -> Option<(VarId, SmallVec<[u8; 4]>)> {
        let mut source = None;
        let mut out = SmallVec::new();
        for &channel in channels {
            let entry = self
                .entries
                .iter()
                .rev()
                .find(|e| e.lhs == var && e.mask.contains(WriteMask::channel(channel)))?;
            match source {
                None => source = Some(entry.rhs),
                Some(s) if s != entry.rhs => return None,
                Some(_) => {}
            }
            out.push(entry.swizzle[channel as usize]);
        }
        source.map(|s| (s, out))
    }
}

struct ElementProp<'m> {
    module: &'m Module,
    acp: Acp,
    kills: FxHashSet<VarId>,
    progress: bool,
}

/// Propagate channel copies through the entry function; true when anything
/// changed.
pub fn copy_propagation_elements(module: &mut Module) -> bool {
    crate::with_entry_body(module, |module, body| {
        let mut pass = ElementProp {
            module,
            acp: Acp::default(),
            kills: FxHashSet::default(),
            progress: false,
        };
        pass.block(body);
        tracing::debug!(progress = pass.progress, "per-channel copy propagation");
        pass.progress
    })
}

impl ElementProp<'_> {
    fn block(&mut self, block: &mut [Instruction]) {
        for instr in block {
            self.instruction(instr);
        }
    }

    fn instruction(&mut self, instr: &mut Instruction) {
        match instr {
            Instruction::Assign(assignment) => {
                self.rewrite(&mut assignment.rhs);
                lvalue_reads_mut(&mut assignment.lhs, &mut |r| self.rewrite(r));
                if let Some(condition) = &mut assignment.condition {
                    self.rewrite(condition);
                }
                let Some(root) = assignment.lhs.root_var() else {
                    return;
                };
                let whole = assignment.lhs.as_var().is_some();
                let mask = if whole {
                    assignment.write_mask
                } else {
                    WriteMask::empty()
                };
                self.kill(root, mask);

                if whole && assignment.condition.is_none() {
                    self.add_entry(root, assignment.write_mask, &assignment.rhs);
                }
            }
            Instruction::Call {
                callee,
                args,
                result,
            } => {
                let module = self.module;
                for (arg, &param) in args.iter_mut().zip(&module[*callee].params) {
                    if module[param].mode.is_parameter_out() {
                        lvalue_reads_mut(arg, &mut |r| self.rewrite(r));
                        if let Some(var) = arg.root_var() {
                            self.kills.insert(var);
                        }
                    } else {
                        self.rewrite(arg);
                    }
                }
                if let Some(var) = result.as_ref().and_then(Rvalue::root_var) {
                    self.kills.insert(var);
                }
                self.acp.entries.clear();
            }
            Instruction::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.rewrite(condition);
                let parent = self.acp.clone();
                let mut kills = FxHashSet::default();
                for branch in [then_branch, else_branch] {
                    self.acp = parent.clone();
                    kills.extend(self.nested(branch));
                }
                self.acp = parent;
                for var in kills {
                    self.kill(var, WriteMask::empty());
                }
            }
            Instruction::Loop { body } => {
                let writes = written_vars(body);
                let parent = std::mem::replace(&mut self.acp, Acp::default());
                self.acp = parent.without(&writes);
                let mut kills = self.nested(body);
                kills.extend(writes);
                self.acp = parent;
                for var in kills {
                    self.kill(var, WriteMask::empty());
                }
            }
            Instruction::Switch { selector, cases } => {
                self.rewrite(selector);
                let writes = cases
                    .iter()
                    .flat_map(|c| written_vars(&c.body))
                    .collect::<FxHashSet<_>>();
                let entry = self.acp.without(&writes);
                for case in cases.iter_mut() {
                    self.acp = entry.clone();
                    self.nested(&mut case.body);
                }
                self.acp = entry;
                for var in writes {
                    self.kill(var, WriteMask::empty());
                }
            }
            Instruction::Barrier => self.acp.entries.clear(),
            Instruction::Return(Some(value)) => self.rewrite(value),
            Instruction::TextureStore {
                texture,
                coordinate,
                value,
            } => {
                self.rewrite(texture);
                self.rewrite(coordinate);
                self.rewrite(value);
            }
            Instruction::Declare(var) => self.kill(*var, WriteMask::empty()),
            Instruction::Return(None)
            | Instruction::Break
            | Instruction::Continue
            | Instruction::Discard => {}
        }
    }

    fn nested(&mut self, block: &mut [Instruction]) -> FxHashSet<VarId> {
        let outer = std::mem::take(&mut self.kills);
        self.block(block);
        std::mem::replace(&mut self.kills, outer)
    }

    fn kill(&mut self, var: VarId, mask: WriteMask) {
        self.acp.kill(var, mask);
        self.kills.insert(var);
    }

    /// Size of a scalar or vector variable that can take part; 0 otherwise.
    fn channels(&self, var: VarId) -> u8 {
        let variable = &self.module[var];
        if variable.mode == VarMode::Shared {
            return 0;
        }
        self.module.types.vector_size(variable.ty)
    }

    fn add_entry(&mut self, lhs: VarId, mask: WriteMask, rhs: &Rvalue) {
        let size = self.channels(lhs);
        if size == 0 {
            return;
        }
        let (source, swizzle) = match &rhs.kind {
            RvalueKind::Var(v) => (*v, Swizzle::identity(self.channels(*v))),
            RvalueKind::Swizzle { base, swizzle } => match base.as_var() {
                Some(v) => (v, *swizzle),
                None => return,
            },
            _ => return,
        };
        if source == lhs || self.channels(source) == 0 {
            return;
        }
        let mask = if mask.is_empty() {
            WriteMask::first(size)
        } else {
            mask
        };
        if swizzle.len() != mask.count() {
            return;
        }
        let mut entry = Entry {
            lhs,
            rhs: source,
            mask,
            swizzle: [0; 4],
        };
        for (channel, &component) in mask.channels().zip(swizzle.components()) {
            entry.swizzle[channel as usize] = component;
        }
        self.acp.entries.push(entry);
    }

    /// Rewrite channel reads inside `value`.
    fn rewrite(&mut self, value: &mut Rvalue) {
        let replacement = match &value.kind {
            RvalueKind::Swizzle { base, swizzle } => base
                .as_var()
                .and_then(|v| self.replacement(v, swizzle.components(), value.ty)),
            RvalueKind::Var(v) => {
                let size = self.channels(*v);
                (size > 0)
                    .then(|| Swizzle::identity(size))
                    .and_then(|s| self.replacement(*v, s.components(), value.ty))
            }
            _ => None,
        };
        if let Some(replacement) = replacement {
            *value = replacement;
            self.progress = true;
            return;
        }
        if let RvalueKind::Swizzle { base, .. } = &value.kind {
            if base.as_var().is_some() {
                return;
            }
        }
        for child in value.children_mut() {
            self.rewrite(child);
        }
    }

    fn replacement(&self, var: VarId, channels: &[u8], ty: hlslcc_ir::TypeId) -> Option<Rvalue> {
        let (source, components) = self.acp.lookup(var, channels)?;
        let source_ty = self.module[source].ty;
        let swizzle = Swizzle::new(&components)?;
        if source_ty == ty && swizzle.is_identity_for(self.module.types.vector_size(source_ty)) {
            return Some(Rvalue::var(source, ty));
        }
        Some(Rvalue::var(source, source_ty).swizzle(swizzle, ty))
    }
}
