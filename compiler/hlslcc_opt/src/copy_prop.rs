//! Whole-variable copy propagation.
//!
//! After `a = b;` every read of `a` becomes a read of `b` until either
//! variable is written again. The available copies (the ACP) live in a
//! slot map kept in insertion order, with a per-variable index of the slots
//! that mention each variable so a kill touches only those entries.
//!
//! # Control flow
//!
//! - `if`: each branch starts from a clone of the ACP; whatever either
//!   branch kills is killed in the parent afterwards.
//! - Loops take two passes. The first only collects kills and starts from
//!   the parent's texture and sampler copies, which loops in practice never
//!   reassign. The second rewrites, starting from the parent's copies minus
//!   those kills, so a copy broken anywhere in the body is never used at the
//!   top of a later iteration. The loop's kills then apply to the parent.
//! - `switch` cases may fall through, so every case starts from the parent
//!   minus everything the switch writes.
//! - Calls clear the ACP after their by-value arguments are rewritten.

use hlslcc_ir::visit::{lvalue_reads_mut, written_vars};
use hlslcc_ir::{ConstValue, Instruction, Module, Rvalue, RvalueKind, TypeId, VarId, VarMode};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// `lhs` currently holds the value of `rhs`.
#[derive(Copy, Clone, Debug, PartialEq)]
struct Available {
    lhs: VarId,
    rhs: VarId,
}

#[derive(Clone, Default, Debug)]
struct Acp {
    slots: Vec<Option<Available>>,
    index: FxHashMap<VarId, SmallVec<[usize; 2]>>,
}

impl Acp {
    fn add(&mut self, copy: Available) {
        let slot = self.slots.len();
        self.slots.push(Some(copy));
        self.index.entry(copy.lhs).or_default().push(slot);
        if copy.rhs != copy.lhs {
            self.index.entry(copy.rhs).or_default().push(slot);
        }
    }

    /// Source of a copy into `var`.
    fn source(&self, var: VarId) -> Option<VarId> {
        self.index
            .get(&var)?
            .iter()
            .filter_map(|&slot| self.slots[slot])
            .find(|c| c.lhs == var)
            .map(|c| c.rhs)
    }

    /// Drop every copy mentioning `var`.
    fn kill(&mut self, var: VarId) {
        let Some(slots) = self.index.remove(&var) else {
            return;
        };
        for slot in slots {
            let Some(copy) = self.slots[slot].take() else {
                continue;
            };
            let other = if copy.lhs == var { copy.rhs } else { copy.lhs };
            if let Some(list) = self.index.get_mut(&other) {
                list.retain(|s| *s != slot);
                if list.is_empty() {
                    self.index.remove(&other);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    fn copies(&self) -> impl Iterator<Item = Available> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Copies of `self` that survive `kills`.
    fn without(&self, kills: &FxHashSet<VarId>) -> Acp {
        let mut out = Acp::default();
        for copy in self.copies() {
            if !kills.contains(&copy.lhs) && !kills.contains(&copy.rhs) {
                out.add(copy);
            }
        }
        out
    }
}

struct CopyProp<'m> {
    module: &'m Module,
    acp: Acp,
    /// Variables written since the current block started.
    kills: FxHashSet<VarId>,
    rewrite: bool,
    progress: bool,
}

/// Propagate whole-variable copies through the entry function; true when
/// anything changed.
pub fn copy_propagation(module: &mut Module) -> bool {
    crate::with_entry_body(module, |module, body| {
        let mut pass = CopyProp {
            module,
            acp: Acp::default(),
            kills: FxHashSet::default(),
            rewrite: true,
            progress: false,
        };
        pass.block(body);
        tracing::debug!(progress = pass.progress, "copy propagation");
        pass.progress
    })
}

impl CopyProp<'_> {
    fn block(&mut self, block: &mut [Instruction]) {
        for instr in block {
            self.instruction(instr);
        }
    }

    fn instruction(&mut self, instr: &mut Instruction) {
        match instr {
            Instruction::Assign(assignment) => {
                self.rewrite_reads(&mut assignment.rhs);
                lvalue_reads_mut(&mut assignment.lhs, &mut |r| self.rewrite_reads(r));
                if let Some(condition) = &mut assignment.condition {
                    self.rewrite_reads(condition);
                }
                let Some(root) = assignment.lhs.root_var() else {
                    return;
                };
                self.kill(root);

                let whole = assignment.lhs.as_var().filter(|_| {
                    assignment.condition.is_none() && assignment.write_mask.is_empty()
                });
                let (Some(lhs), Some(rhs)) = (whole, assignment.rhs.as_var()) else {
                    return;
                };
                if lhs == rhs {
                    // Self-assignment.
                    if self.rewrite {
                        assignment.condition = Some(Rvalue::constant(
                            TypeId::BOOL,
                            [ConstValue::Bool(false)],
                        ));
                        self.progress = true;
                    }
                } else if assignment.lhs.ty == assignment.rhs.ty
                    && self.module[lhs].mode != VarMode::Shared
                    && self.module[rhs].mode != VarMode::Shared
                {
                    self.acp.add(Available { lhs, rhs });
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
                        lvalue_reads_mut(arg, &mut |r| self.rewrite_reads(r));
                        if let Some(var) = arg.root_var() {
                            self.kills.insert(var);
                        }
                    } else {
                        self.rewrite_reads(arg);
                    }
                }
                if let Some(result) = result {
                    lvalue_reads_mut(result, &mut |r| self.rewrite_reads(r));
                    if let Some(var) = result.root_var() {
                        self.kills.insert(var);
                    }
                }
                self.acp.clear();
            }
            Instruction::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.rewrite_reads(condition);
                let parent = self.acp.clone();
                let mut kills = FxHashSet::default();
                for branch in [then_branch, else_branch] {
                    self.acp = parent.clone();
                    kills.extend(self.nested(branch));
                }
                self.acp = parent;
                for var in kills {
                    self.kill(var);
                }
            }
            Instruction::Loop { body } => self.visit_loop(body),
            Instruction::Switch { selector, cases } => {
                self.rewrite_reads(selector);
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
                    self.kill(var);
                }
            }
            Instruction::Barrier => self.acp.clear(),
            Instruction::Return(Some(value)) => self.rewrite_reads(value),
            Instruction::TextureStore {
                texture,
                coordinate,
                value,
            } => {
                self.rewrite_reads(texture);
                self.rewrite_reads(coordinate);
                self.rewrite_reads(value);
            }
            Instruction::Declare(var) => self.kill(*var),
            Instruction::Return(None)
            | Instruction::Break
            | Instruction::Continue
            | Instruction::Discard => {}
        }
    }

    fn visit_loop(&mut self, body: &mut Vec<Instruction>) {
        let parent = self.acp.clone();

        // Pass 1: kills only.
        let mut seed = Acp::default();
        for copy in parent.copies() {
            let ty = self.module[copy.lhs].ty;
            if self.module.types.is_texture(ty) || self.module.types.is_sampler_state(ty) {
                seed.add(copy);
            }
        }
        self.acp = seed;
        let rewrite = std::mem::replace(&mut self.rewrite, false);
        let mut kills = self.nested(body);
        self.rewrite = rewrite;
        kills.extend(written_vars(body));

        // Pass 2: rewrite with what the body never breaks.
        self.acp = parent.without(&kills);
        kills.extend(self.nested(body));

        self.acp = parent;
        for var in kills {
            self.kill(var);
        }
    }

    /// Process a nested block; returns the variables it wrote.
    fn nested(&mut self, block: &mut [Instruction]) -> FxHashSet<VarId> {
        let outer = std::mem::take(&mut self.kills);
        self.block(block);
        std::mem::replace(&mut self.kills, outer)
    }

    fn kill(&mut self, var: VarId) {
        self.acp.kill(var);
        self.kills.insert(var);
    }

    fn rewrite_reads(&mut self, value: &mut Rvalue) {
        if !self.rewrite {
            return;
        }
        let acp = &self.acp;
        let mut changed = false;
        value.walk_mut(&mut |r| {
            if let RvalueKind::Var(var) = &mut r.kind {
                if let Some(source) = acp.source(*var) {
                    *var = source;
                    changed = true;
                }
            }
        });
        self.progress |= changed;
    }
}
