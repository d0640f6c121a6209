//! Common subexpression elimination within straight-line code.
//!
//! An expression tree of at least two operators that appears again later in
//! the same block, with none of its variables written in between, is
//! computed once into a temporary declared just before its first use.
//! Texture fetches and derivatives are never merged.
//!
//! One merge is made per block and run; the fixed point catches the rest.

use hlslcc_ir::{Instruction, Module, Rvalue, RvalueKind, VarId, VarMode, Variable};
use rustc_hash::FxHashSet;

/// Merge repeated expressions in the entry function; true when anything
/// changed.
pub fn common_subexpressions(module: &mut Module) -> bool {
    let progress = crate::with_entry_body(module, block);
    tracing::debug!(progress, "common subexpressions");
    progress
}

/// An expression seen earlier in the block and still valid.
struct Available {
    value: Rvalue,
    vars: FxHashSet<VarId>,
    instr: usize,
}

fn block(module: &mut Module, code: &mut Vec<Instruction>) -> bool {
    let mut available: Vec<Available> = Vec::new();
    let mut found = None;

    'scan: for (i, instr) in code.iter().enumerate() {
        let mut candidates = Vec::new();
        for_each_operand(instr, &mut |r| collect_candidates(r, &mut candidates));
        for candidate in candidates {
            if let Some(earlier) = available.iter().find(|a| a.value == *candidate) {
                found = Some((earlier.instr, i, earlier.value.clone()));
                break 'scan;
            }
            let mut vars = FxHashSet::default();
            candidate.vars(&mut vars);
            available.push(Available {
                value: candidate.clone(),
                vars,
                instr: i,
            });
        }

        if !instr.blocks().is_empty() {
            available.clear();
            continue;
        }
        if let Some(written) = written_root(instr) {
            available.retain(|a| !a.vars.contains(&written));
        }
    }

    let Some((first, last, value)) = found else {
        let mut progress = false;
        for instr in code.iter_mut() {
            for nested in instr.blocks_mut() {
                progress |= block(module, nested);
            }
        }
        return progress;
    };

    // Nothing between `first` and `last` writes an operand of `value`.
    let ty = value.ty;
    let temp = module.add_variable(Variable::new("cse", ty, VarMode::Temporary));
    let replacement = Rvalue::var(temp, ty);
    for instr in &mut code[first..=last] {
        for_each_operand_mut(instr, &mut |r| replace(r, &value, &replacement));
    }
    tracing::trace!(first, last, "merged common subexpression");
    code.splice(
        first..first,
        [
            Instruction::Declare(temp),
            Instruction::assign(replacement, value),
        ],
    );
    true
}

/// Variable written by a straight-line instruction.
fn written_root(instr: &Instruction) -> Option<VarId> {
    match instr {
        Instruction::Assign(a) => a.lhs.root_var(),
        Instruction::Declare(var) => Some(*var),
        _ => None,
    }
}

/// Operands that may be merged: those evaluated in full every time the
/// instruction runs.
fn for_each_operand<'a>(instr: &'a Instruction, f: &mut impl FnMut(&'a Rvalue)) {
    match instr {
        Instruction::Assign(a) => f(&a.rhs),
        Instruction::If { condition, .. } => f(condition),
        Instruction::Switch { selector, .. } => f(selector),
        Instruction::Return(Some(value)) => f(value),
        Instruction::TextureStore {
            coordinate, value, ..
        } => {
            f(coordinate);
            f(value);
        }
        _ => {}
    }
}

fn for_each_operand_mut(instr: &mut Instruction, f: &mut impl FnMut(&mut Rvalue)) {
    match instr {
        Instruction::Assign(a) => f(&mut a.rhs),
        Instruction::If { condition, .. } => f(condition),
        Instruction::Switch { selector, .. } => f(selector),
        Instruction::Return(Some(value)) => f(value),
        Instruction::TextureStore {
            coordinate, value, ..
        } => {
            f(coordinate);
            f(value);
        }
        _ => {}
    }
}

/// Mergeable subtrees of `value`, largest first.
fn collect_candidates<'a>(value: &'a Rvalue, out: &mut Vec<&'a Rvalue>) {
    if is_candidate(value) {
        out.push(value);
        return;
    }
    for child in value.children() {
        collect_candidates(child, out);
    }
}

fn is_candidate(value: &Rvalue) -> bool {
    if !matches!(value.kind, RvalueKind::Expr { .. }) {
        return false;
    }
    let mut operators = 0;
    let mut mergeable = true;
    value.walk(&mut |r| match &r.kind {
        RvalueKind::Expr { op, .. } => {
            operators += 1;
            mergeable &= op.is_pure();
        }
        RvalueKind::Texture(_) => mergeable = false,
        _ => {}
    });
    mergeable && operators >= 2
}

fn replace(r: &mut Rvalue, value: &Rvalue, replacement: &Rvalue) {
    if r == value {
        *r = replacement.clone();
        return;
    }
    for child in r.children_mut() {
        replace(child, value, replacement);
    }
}
