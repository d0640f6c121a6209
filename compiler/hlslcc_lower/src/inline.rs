//! Inlining of user function calls into the entry function.
//!
//! Metal entry functions are the only place resources are visible, so every
//! [`Instruction::Call`] reachable from the entry is replaced by a copy of
//! the callee's body:
//!
//! ```text
//! Declare(p0) ; p0 = arg0          in / inout parameters
//! Declare(p1)                      out parameters
//! <callee body, locals renamed>
//! arg1 = p1                        out / inout copy-back
//! ```
//!
//! A `return` that is not the callee's last instruction is rewritten into
//! a store to a `returned` flag and a `Break` out of a wrapper `Loop`. Loops
//! and switches nested in the callee that contain such a return are
//! followed by `if (returned) break;` so the break reaches the wrapper.

use hlslcc_diagnostic::{Diagnostic, ErrorCode, SourceError};
use hlslcc_ir::visit::walk_instructions;
use hlslcc_ir::{
    FuncId, Instruction, Rvalue, RvalueKind, TypeId, VarId, VarMode, Variable, Module,
};
use rustc_hash::FxHashMap;

/// Replace every call reachable from the entry function by the callee's
/// body. Recursion is an error.
pub fn inline_calls(module: &mut Module) -> Result<(), SourceError> {
    let Some(entry) = module.entry else {
        return Ok(());
    };
    let body = std::mem::take(&mut module[entry].body);
    let mut stack = vec![entry];
    let body = inline_block(module, body, &mut stack)?;
    module[entry].body = body;
    Ok(())
}

fn inline_block(
    module: &mut Module,
    block: Vec<Instruction>,
    stack: &mut Vec<FuncId>,
) -> Result<Vec<Instruction>, SourceError> {
    let mut out = Vec::with_capacity(block.len());
    for mut instr in block {
        if let Instruction::Call {
            callee,
            args,
            result,
        } = instr
        {
            let expanded = expand_call(module, callee, args, result, stack)?;
            out.extend(expanded);
            continue;
        }
        for nested in instr.blocks_mut() {
            let taken = std::mem::take(nested);
            *nested = inline_block(module, taken, stack)?;
        }
        out.push(instr);
    }
    Ok(out)
}

fn expand_call(
    module: &mut Module,
    callee: FuncId,
    args: Vec<Rvalue>,
    result: Option<Rvalue>,
    stack: &mut Vec<FuncId>,
) -> Result<Vec<Instruction>, SourceError> {
    if stack.contains(&callee) {
        return Err(Diagnostic::error(ErrorCode::E2014)
            .with_message(format!(
                "recursive call to '{}' cannot be inlined",
                module[callee].name
            ))
            .into_error());
    }
    let function = module[callee].clone();
    tracing::trace!(function = function.name.as_str(), "inlining");

    // Fresh copies of the callee's parameters and locals.
    let mut renames = FxHashMap::default();
    let mut locals = function.params.clone();
    walk_instructions(&function.body, &mut |instr| {
        if let Instruction::Declare(var) = instr {
            locals.push(*var);
        }
    });
    for var in locals {
        let original = &module[var];
        let mode = match original.mode {
            VarMode::Temporary => VarMode::Temporary,
            _ => VarMode::Auto,
        };
        let copy = Variable::new(original.name.clone(), original.ty, mode);
        let fresh = module.add_variable(copy);
        renames.insert(var, fresh);
    }
    let rename = |var: VarId| renames.get(&var).copied().unwrap_or(var);

    let mut code = Vec::new();
    for (&param, arg) in function.params.iter().zip(&args) {
        let local = rename(param);
        let ty = module[local].ty;
        code.push(Instruction::Declare(local));
        if module[param].mode != VarMode::Out {
            code.push(Instruction::assign(Rvalue::var(local, ty), arg.clone()));
        }
    }

    let mut body = function.body;
    for instr in &mut body {
        rename_instruction(instr, &rename);
    }

    // A trailing return needs no flag.
    let trailing = match body.last() {
        Some(Instruction::Return(_)) => body.pop(),
        _ => None,
    };
    if has_return(&body) {
        let flag = module.add_variable(Variable::new("returned", TypeId::BOOL, VarMode::Temporary));
        code.push(Instruction::Declare(flag));
        code.push(Instruction::assign(
            Rvalue::var(flag, TypeId::BOOL),
            Rvalue::bool(false),
        ));
        let mut wrapped = rewrite_returns(body, flag, result.as_ref());
        if let Some(Instruction::Return(value)) = trailing {
            store_result(&mut wrapped, result.as_ref(), value);
        }
        wrapped.push(Instruction::Break);
        code.push(Instruction::Loop { body: wrapped });
    } else {
        code.extend(body);
        if let Some(Instruction::Return(value)) = trailing {
            store_result(&mut code, result.as_ref(), value);
        }
    }

    for (&param, arg) in function.params.iter().zip(args) {
        if module[param].mode.is_parameter_out() {
            let local = rename(param);
            let ty = module[local].ty;
            code.push(Instruction::assign(arg, Rvalue::var(local, ty)));
        }
    }

    stack.push(callee);
    let code = inline_block(module, code, stack);
    stack.pop();
    code
}

fn store_result(code: &mut Vec<Instruction>, result: Option<&Rvalue>, value: Option<Rvalue>) {
    if let (Some(result), Some(value)) = (result, value) {
        code.push(Instruction::assign(result.clone(), value));
    }
}

fn has_return(block: &[Instruction]) -> bool {
    let mut found = false;
    walk_instructions(block, &mut |instr| {
        found |= matches!(instr, Instruction::Return(_));
    });
    found
}

/// Replace returns by `result = value; returned = true; break;`, adding
/// the flag test after nested loops and switches that return.
fn rewrite_returns(block: Vec<Instruction>, flag: VarId, result: Option<&Rvalue>) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(block.len());
    for mut instr in block {
        match instr {
            Instruction::Return(value) => {
                store_result(&mut out, result, value);
                out.push(Instruction::assign(
                    Rvalue::var(flag, TypeId::BOOL),
                    Rvalue::bool(true),
                ));
                out.push(Instruction::Break);
            }
            Instruction::Loop { .. } | Instruction::Switch { .. } => {
                let returns = has_return(std::slice::from_ref(&instr));
                for nested in instr.blocks_mut() {
                    let taken = std::mem::take(nested);
                    *nested = rewrite_returns(taken, flag, result);
                }
                out.push(instr);
                if returns {
                    out.push(Instruction::If {
                        condition: Rvalue::var(flag, TypeId::BOOL),
                        then_branch: vec![Instruction::Break],
                        else_branch: Vec::new(),
                    });
                }
            }
            _ => {
                for nested in instr.blocks_mut() {
                    let taken = std::mem::take(nested);
                    *nested = rewrite_returns(taken, flag, result);
                }
                out.push(instr);
            }
        }
    }
    out
}

// ── Renaming ──

fn rename_rvalue(value: &mut Rvalue, rename: &impl Fn(VarId) -> VarId) {
    value.walk_mut(&mut |r| {
        if let RvalueKind::Var(var) = &mut r.kind {
            *var = rename(*var);
        }
    });
}

fn rename_instruction(instr: &mut Instruction, rename: &impl Fn(VarId) -> VarId) {
    match instr {
        Instruction::Declare(var) => *var = rename(*var),
        Instruction::Assign(assignment) => {
            rename_rvalue(&mut assignment.lhs, rename);
            rename_rvalue(&mut assignment.rhs, rename);
            if let Some(condition) = &mut assignment.condition {
                rename_rvalue(condition, rename);
            }
        }
        Instruction::Call { args, result, .. } => {
            for arg in args {
                rename_rvalue(arg, rename);
            }
            if let Some(result) = result {
                rename_rvalue(result, rename);
            }
        }
        Instruction::If { condition, .. } => rename_rvalue(condition, rename),
        Instruction::Switch { selector, .. } => rename_rvalue(selector, rename),
        Instruction::Return(Some(value)) => rename_rvalue(value, rename),
        Instruction::TextureStore {
            texture,
            coordinate,
            value,
        } => {
            rename_rvalue(texture, rename);
            rename_rvalue(coordinate, rename);
            rename_rvalue(value, rename);
        }
        Instruction::Loop { .. }
        | Instruction::Return(None)
        | Instruction::Break
        | Instruction::Continue
        | Instruction::Discard
        | Instruction::Barrier => {}
    }
    for nested in instr.blocks_mut() {
        for instr in nested.iter_mut() {
            rename_instruction(instr, rename);
        }
    }
}
