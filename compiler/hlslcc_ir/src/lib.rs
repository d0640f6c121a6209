//! Typed intermediate representation for the cross-compiler.
//!
//! Lowering builds a [`Module`] from the syntax tree; the optimizer rewrites
//! it in place; the Metal back end prints it.
//!
//! # Module Structure
//!
//! - `types`: interned types ([`TypeTable`], [`TypeId`])
//! - `instr`: rvalues, operators, swizzles, write masks and instructions
//! - `module`: variables, functions, uniform blocks and the [`Module`]
//! - `visit`: walks shared by the passes
//!
//! # Design
//!
//! Nothing in the IR points at anything else. Variables are [`VarId`]s into
//! [`Module::variables`], types are [`TypeId`]s into [`Module::types`], and
//! rvalues and nested blocks are owned trees. A pass can therefore clone a
//! branch, rewrite it and drop it without any bookkeeping.

mod instr;
mod module;
mod types;
pub mod visit;

pub use instr::{
    Assignment, CaseLabel, ConstValue, ExprOp, Instruction, Rvalue, RvalueKind, Swizzle,
    SwitchCase, TextureOp, TextureOpKind, WriteMask,
};
pub use module::{
    EntryInterface, FuncId, Function, Module, ShaderStage, UniformBlock, VarId, VarMode, Variable,
};
pub use types::{StructField, StructType, TextureType, Type, TypeId, TypeTable};

#[cfg(test)]
mod tests;
