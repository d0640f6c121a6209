//! IR optimizer: copy propagation, common subexpressions and dead code.
//!
//! # Module Structure
//!
//! - `copy_prop`: whole-variable copy propagation
//! - `copy_prop_elements`: per-channel copy propagation of vectors
//! - `cse`: common subexpressions within straight-line code
//! - `dce`: dead assignments, declarations and globals
//!
//! # Fixed point
//!
//! [`optimize_ir`] runs [`optimization_pass`] until no pass reports
//! progress, first without and then with removal of unused globals. Passes
//! only ever shrink or simplify the entry function, so the loop terminates.
//!
//! Passes cannot fail: anything they do not understand is left alone.

mod copy_prop;
mod copy_prop_elements;
mod cse;
mod dce;

use hlslcc_ir::Module;

pub use copy_prop::copy_propagation;
pub use copy_prop_elements::copy_propagation_elements;
pub use cse::common_subexpressions;
pub use dce::dead_code;

/// Optimize the entry function of `module` to a fixed point.
pub fn optimize_ir(module: &mut Module) {
    for remove_globals in [false, true] {
        let mut rounds = 0u32;
        while optimization_pass(module, remove_globals) {
            rounds += 1;
        }
        tracing::debug!(remove_globals, rounds, "optimizer reached a fixed point");
    }
}

/// One run of every pass; true when any of them changed the module.
pub fn optimization_pass(module: &mut Module, remove_globals: bool) -> bool {
    let mut progress = false;
    progress |= copy_propagation(module);
    progress |= copy_propagation_elements(module);
    progress |= common_subexpressions(module);
    progress |= dead_code(module, remove_globals);
    tracing::trace!(progress, remove_globals, "optimization pass");
    progress
}

/// Run `f` on the entry function's body with the rest of the module
/// available.
fn with_entry_body<R: Default>(
    module: &mut Module,
    f: impl FnOnce(&mut Module, &mut Vec<hlslcc_ir::Instruction>) -> R,
) -> R {
    let Some(entry) = module.entry else {
        return R::default();
    };
    let mut body = std::mem::take(&mut module[entry].body);
    let result = f(module, &mut body);
    module[entry].body = body;
    result
}

#[cfg(test)]
mod tests;
