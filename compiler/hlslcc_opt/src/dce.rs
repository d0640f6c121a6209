//! Dead code elimination.
//!
//! Removes, from the entry function:
//! - assignments whose condition is constant false
//! - assignments to locals and temporaries that are never read
//! - declarations of locals that are no longer mentioned at all
//!
//! With `remove_globals`, static globals and loose uniforms the entry no
//! longer mentions are dropped from the module's global list too. Uniforms
//! inside a cbuffer stay, since removing one would move its neighbours.

use hlslcc_ir::visit::{read_vars, walk_instructions};
use hlslcc_ir::{Instruction, Module, VarId, VarMode};
use rustc_hash::FxHashSet;

/// Remove dead code from the entry function; true when anything changed.
pub fn dead_code(module: &mut Module, remove_globals: bool) -> bool {
    let mut progress = crate::with_entry_body(module, |module, body| {
        let read = read_vars(body);
        let mut progress = remove_dead(module, body, &read);

        let mut mentioned = read;
        walk_instructions(body, &mut |instr| match instr {
            Instruction::Assign(a) => mentioned.extend(a.lhs.root_var()),
            Instruction::Call { args, result, .. } => {
                mentioned.extend(args.iter().filter_map(hlslcc_ir::Rvalue::root_var));
                mentioned.extend(result.as_ref().and_then(hlslcc_ir::Rvalue::root_var));
            }
            _ => {}
        });
        progress |= remove_declarations(body, &mentioned);
        progress
    });

    if remove_globals {
        progress |= remove_unused_globals(module);
    }
    tracing::debug!(progress, remove_globals, "dead code");
    progress
}

/// A write to `var` can go when nothing reads it afterwards.
fn removable(module: &Module, var: VarId, read: &FxHashSet<VarId>) -> bool {
    !read.contains(&var) && matches!(module[var].mode, VarMode::Temporary | VarMode::Auto)
}

fn remove_dead(module: &Module, block: &mut Vec<Instruction>, read: &FxHashSet<VarId>) -> bool {
    let before = block.len();
    block.retain(|instr| match instr {
        Instruction::Assign(a) => {
            !a.is_dead() && !a.lhs.root_var().is_some_and(|v| removable(module, v, read))
        }
        _ => true,
    });
    let mut progress = block.len() != before;
    for instr in block.iter_mut() {
        for nested in instr.blocks_mut() {
            progress |= remove_dead(module, nested, read);
        }
    }
    progress
}

fn remove_declarations(block: &mut Vec<Instruction>, mentioned: &FxHashSet<VarId>) -> bool {
    let before = block.len();
    block.retain(|instr| match instr {
        Instruction::Declare(var) => mentioned.contains(var),
        _ => true,
    });
    let mut progress = block.len() != before;
    for instr in block.iter_mut() {
        for nested in instr.blocks_mut() {
            progress |= remove_declarations(nested, mentioned);
        }
    }
    progress
}

fn remove_unused_globals(module: &mut Module) -> bool {
    let Some(body) = module.entry_function().map(|f| &f.body) else {
        return false;
    };
    let mut used = read_vars(body);
    walk_instructions(body, &mut |instr| {
        if let Instruction::Assign(a) = instr {
            used.extend(a.lhs.root_var());
        }
    });

    let before = module.globals.len();
    let globals = std::mem::take(&mut module.globals);
    let kept: Vec<VarId> = globals
        .into_iter()
        .filter(|&var| {
            let variable = &module[var];
            let droppable = match variable.mode {
                VarMode::Auto => true,
                VarMode::Uniform => variable.block.is_none(),
                _ => false,
            };
            !droppable || used.contains(&var)
        })
        .collect();
    module.globals = kept;
    let removed = before - module.globals.len();
    if removed > 0 {
        tracing::debug!(removed, "removed unused globals");
    }
    removed > 0
}
