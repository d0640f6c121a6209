//! Tree walks shared by the passes.
//!
//! A pass is a `match` over [`Instruction`]; these helpers cover the parts
//! every pass repeats: reaching all rvalues of one instruction, and telling
//! reads apart from the variable an assignment writes.

use rustc_hash::FxHashSet;

use crate::{Instruction, Rvalue, RvalueKind, TextureOpKind, VarId};

impl Rvalue {
    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Rvalue> {
        match &self.kind {
            RvalueKind::Constant(_) | RvalueKind::Var(_) => Vec::new(),
            RvalueKind::Index { base, index } => vec![base, index],
            RvalueKind::Field { base, .. } | RvalueKind::Swizzle { base, .. } => vec![base],
            RvalueKind::Expr { operands, .. } => operands.iter().collect(),
            RvalueKind::Texture(op) => {
                let mut out = vec![&op.texture];
                out.extend(op.sampler.as_ref());
                out.push(&op.coordinate);
                match &op.kind {
                    TextureOpKind::Sample => {}
                    TextureOpKind::SampleLevel(r)
                    | TextureOpKind::SampleBias(r)
                    | TextureOpKind::SampleCompare(r)
                    | TextureOpKind::SampleCompareLevelZero(r) => out.push(r),
                    TextureOpKind::SampleGrad { ddx, ddy } => {
                        out.push(ddx);
                        out.push(ddy);
                    }
                    TextureOpKind::Read { lod, sample } => {
                        out.extend(lod.as_ref());
                        out.extend(sample.as_ref());
                    }
                    TextureOpKind::Size { lod, .. } => out.extend(lod.as_ref()),
                }
                out.extend(op.offset.as_ref());
                out
            }
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut Rvalue> {
        match &mut self.kind {
            RvalueKind::Constant(_) | RvalueKind::Var(_) => Vec::new(),
            RvalueKind::Index { base, index } => vec![base, index],
            RvalueKind::Field { base, .. } | RvalueKind::Swizzle { base, .. } => vec![base],
            RvalueKind::Expr { operands, .. } => operands.iter_mut().collect(),
            RvalueKind::Texture(op) => {
                let op = &mut **op;
                let mut out = vec![&mut op.texture];
                out.extend(op.sampler.as_mut());
                out.push(&mut op.coordinate);
                match &mut op.kind {
                    TextureOpKind::Sample => {}
                    TextureOpKind::SampleLevel(r)
                    | TextureOpKind::SampleBias(r)
                    | TextureOpKind::SampleCompare(r)
                    | TextureOpKind::SampleCompareLevelZero(r) => out.push(r),
                    TextureOpKind::SampleGrad { ddx, ddy } => {
                        out.push(ddx);
                        out.push(ddy);
                    }
                    TextureOpKind::Read { lod, sample } => {
                        out.extend(lod.as_mut());
                        out.extend(sample.as_mut());
                    }
                    TextureOpKind::Size { lod, .. } => out.extend(lod.as_mut()),
                }
                out.extend(op.offset.as_mut());
                out
            }
        }
    }

    /// Pre-order walk.
    pub fn walk(&self, f: &mut impl FnMut(&Rvalue)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Post-order walk; `f` sees a node after its children were rewritten.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Rvalue)) {
        for child in self.children_mut() {
            child.walk_mut(f);
        }
        f(self);
    }

    /// Every variable mentioned anywhere in the tree.
    pub fn vars(&self, out: &mut FxHashSet<VarId>) {
        self.walk(&mut |r| {
            if let RvalueKind::Var(v) = r.kind {
                out.insert(v);
            }
        });
    }

    pub fn mentions(&self, var: VarId) -> bool {
        let mut found = false;
        self.walk(&mut |r| found |= r.as_var() == Some(var));
        found
    }
}

/// Rvalues read inside an lvalue chain: array indices, not the root.
pub fn lvalue_reads_mut(lhs: &mut Rvalue, f: &mut impl FnMut(&mut Rvalue)) {
    match &mut lhs.kind {
        RvalueKind::Index { base, index } => {
            lvalue_reads_mut(base, f);
            f(index);
        }
        RvalueKind::Field { base, .. } | RvalueKind::Swizzle { base, .. } => {
            lvalue_reads_mut(base, f);
        }
        _ => {}
    }
}

pub fn lvalue_reads(lhs: &Rvalue, f: &mut impl FnMut(&Rvalue)) {
    match &lhs.kind {
        RvalueKind::Index { base, index } => {
            lvalue_reads(base, f);
            f(index);
        }
        RvalueKind::Field { base, .. } | RvalueKind::Swizzle { base, .. } => lvalue_reads(base, f),
        _ => {}
    }
}

impl Instruction {
    /// Top-level rvalues this instruction reads, not descending into nested
    /// blocks. Call arguments are all reported; `out` arguments among them
    /// are lvalues.
    pub fn for_each_read(&self, f: &mut impl FnMut(&Rvalue)) {
        match self {
            Instruction::Assign(a) => {
                f(&a.rhs);
                lvalue_reads(&a.lhs, f);
                if let Some(c) = &a.condition {
                    f(c);
                }
            }
            Instruction::Call { args, result, .. } => {
                args.iter().for_each(&mut *f);
                if let Some(r) = result {
                    lvalue_reads(r, f);
                }
            }
            Instruction::If { condition, .. } => f(condition),
            Instruction::Switch { selector, .. } => f(selector),
            Instruction::Return(Some(value)) => f(value),
            Instruction::TextureStore {
                texture,
                coordinate,
                value,
            } => {
                f(texture);
                f(coordinate);
                f(value);
            }
            Instruction::Declare(_)
            | Instruction::Loop { .. }
            | Instruction::Break
            | Instruction::Continue
            | Instruction::Return(None)
            | Instruction::Discard
            | Instruction::Barrier => {}
        }
    }

    /// Mutable form of [`Instruction::for_each_read`], without call
    /// arguments, which passes handle themselves.
    pub fn for_each_read_mut(&mut self, f: &mut impl FnMut(&mut Rvalue)) {
        match self {
            Instruction::Assign(a) => {
                f(&mut a.rhs);
                lvalue_reads_mut(&mut a.lhs, f);
                if let Some(c) = &mut a.condition {
                    f(c);
                }
            }
            Instruction::Call { result, .. } => {
                if let Some(r) = result {
                    lvalue_reads_mut(r, f);
                }
            }
            Instruction::If { condition, .. } => f(condition),
            Instruction::Switch { selector, .. } => f(selector),
            Instruction::Return(Some(value)) => f(value),
            Instruction::TextureStore {
                texture,
                coordinate,
                value,
            } => {
                f(texture);
                f(coordinate);
                f(value);
            }
            Instruction::Declare(_)
            | Instruction::Loop { .. }
            | Instruction::Break
            | Instruction::Continue
            | Instruction::Return(None)
            | Instruction::Discard
            | Instruction::Barrier => {}
        }
    }
}

/// Visit every instruction of a block tree, parents before children.
pub fn walk_instructions(block: &[Instruction], f: &mut impl FnMut(&Instruction)) {
    for instr in block {
        f(instr);
        for nested in instr.blocks() {
            walk_instructions(nested, f);
        }
    }
}

/// Variables read anywhere in a block tree.
pub fn read_vars(block: &[Instruction]) -> FxHashSet<VarId> {
    let mut out = FxHashSet::default();
    walk_instructions(block, &mut |instr| {
        instr.for_each_read(&mut |r| r.vars(&mut out));
    });
    out
}

/// Variables written anywhere in a block tree, including through `out`
/// call arguments.
pub fn written_vars(block: &[Instruction]) -> FxHashSet<VarId> {
    let mut out = FxHashSet::default();
    walk_instructions(block, &mut |instr| match instr {
        Instruction::Assign(a) => out.extend(a.lhs.root_var()),
        Instruction::Call { args, result, .. } => {
            out.extend(args.iter().filter_map(Rvalue::root_var));
            out.extend(result.as_ref().and_then(Rvalue::root_var));
        }
        Instruction::TextureStore { texture, .. } => out.extend(texture.root_var()),
        _ => {}
    });
    out
}
