//! Lowering of an HLSL [`TranslationUnit`] to an IR [`Module`].
//!
//! # Module Structure
//!
//! - `types`: type specifiers, struct definitions, array dimensions and
//!   constant folding of dimension expressions
//! - `expr`: expressions, implicit conversions and assignments
//! - `call`: user function calls, intrinsics and texture methods
//! - `stmt`: statements and control flow
//! - `entry`: the synthesized `Main` wrapping the entry point
//! - `inline`: inlining of every user call into `Main`
//!
//! # Output shape
//!
//! After [`lower`], the module's entry function `Main` takes no parameters.
//! It reads shader inputs from the [`EntryInterface`](hlslcc_ir::EntryInterface)
//! variables, has every user function inlined into it, and returns the
//! stage-out struct. Static globals are initialized at the top of `Main`.

mod call;
mod entry;
mod expr;
mod inline;
mod stmt;
mod types;

use hlslcc_diagnostic::{Diagnostic, ErrorCode, SourceError};
use hlslcc_ir::{FuncId, Function, Instruction, Module, ShaderStage, TypeId, VarId, VarMode, Variable};
use hlslcc_syntax::ast::{
    CBufferDeclaration, DeclaratorList, FunctionDefinition, TopLevel, TranslationUnit, TypeName,
    TypeQualifier,
};
use hlslcc_syntax::{ExprId, Name, SourceLocation, TextureKind};
use rustc_hash::{FxHashMap, FxHashSet};

pub use inline::inline_calls;

/// Lower `unit` with `entry_point` as the shader's entry function.
pub fn lower(
    unit: &TranslationUnit,
    entry_point: &str,
    stage: ShaderStage,
) -> Result<Module, SourceError> {
    let mut lowerer = Lowerer::new(unit, stage);
    for item in &unit.declarations {
        match item {
            TopLevel::Declaration(list) => lowerer.lower_global_declaration(list)?,
            TopLevel::CBuffer(cbuffer) => lowerer.lower_cbuffer(cbuffer)?,
            TopLevel::Function(function) => lowerer.lower_function(function)?,
        }
    }
    lowerer.synthesize_entry(entry_point)?;
    let mut module = lowerer.module;
    inline_calls(&mut module)?;
    tracing::debug!(
        entry = entry_point,
        stage = stage.name(),
        variables = module.variables.len(),
        functions = module.functions.len(),
        "lowered"
    );
    Ok(module)
}

// ── Lowerer ──

#[derive(Default)]
struct Scope {
    vars: FxHashMap<Name, VarId>,
    types: FxHashMap<Name, TypeId>,
}

/// What a `continue` must run before jumping back to the top of the
/// enclosing loop, which in the IR is always an infinite `Loop`.
#[derive(Copy, Clone)]
enum ContinueAction {
    Nothing,
    /// The step expression of a `for`.
    Step(ExprId),
    /// The exit test of a `do ... while`.
    Condition(ExprId),
}

pub(crate) struct Lowerer<'a> {
    unit: &'a TranslationUnit,
    module: Module,
    scopes: Vec<Scope>,
    /// Overloads by name, in declaration order.
    functions: FxHashMap<Name, Vec<FuncId>>,
    /// Instruction lists being built; the last one receives emitted code.
    blocks: Vec<Vec<Instruction>>,
    /// Initializers of static globals, run at the top of `Main`.
    global_init: Vec<Instruction>,
    loops: Vec<ContinueAction>,
    return_type: TypeId,
    anonymous_structs: u32,
    /// `ByteAddressBuffer` globals, indexed by byte address.
    raw_buffers: FxHashSet<VarId>,
}

impl<'a> Lowerer<'a> {
    fn new(unit: &'a TranslationUnit, stage: ShaderStage) -> Self {
        Lowerer {
            unit,
            module: Module::new(stage),
            scopes: vec![Scope::default()],
            functions: FxHashMap::default(),
            blocks: Vec::new(),
            global_init: Vec::new(),
            loops: Vec::new(),
            return_type: TypeId::VOID,
            anonymous_structs: 0,
            raw_buffers: FxHashSet::default(),
        }
    }

    // ── Names and errors ──

    fn name(&self, name: Name) -> &'a str {
        self.unit.names.resolve(name)
    }

    fn error(&self, code: ErrorCode, loc: SourceLocation, message: impl Into<String>) -> SourceError {
        Diagnostic::error(code)
            .with_message(message)
            .at(&self.unit.files, loc)
            .into_error()
    }

    fn type_name(&self, ty: TypeId) -> String {
        self.module.types.name(ty)
    }

    // ── Scopes ──

    fn in_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scopes.push(Scope::default());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn declare_var(&mut self, name: Name, var: VarId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.vars.insert(name, var);
        }
    }

    fn declare_type(&mut self, name: Name, ty: TypeId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.types.insert(name, ty);
        }
    }

    fn lookup_var(&self, name: Name) -> Option<VarId> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(&name).copied())
    }

    fn lookup_type(&self, name: Name) -> Option<TypeId> {
        self.scopes.iter().rev().find_map(|s| s.types.get(&name).copied())
    }

    // ── Emission ──

    fn emit(&mut self, instr: Instruction) {
        if let Some(block) = self.blocks.last_mut() {
            block.push(instr);
        }
    }

    /// Run `f` with a fresh instruction list and return what it emitted.
    fn in_block(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), SourceError>,
    ) -> Result<Vec<Instruction>, SourceError> {
        self.blocks.push(Vec::new());
        let result = f(self);
        let block = self.blocks.pop().unwrap_or_default();
        result.map(|()| block)
    }

    /// A declared local.
    fn local(&mut self, name: impl Into<String>, ty: TypeId, mode: VarMode) -> VarId {
        let var = self.module.add_variable(Variable::new(name, ty, mode));
        self.emit(Instruction::Declare(var));
        var
    }

    /// A declared compiler temporary.
    fn temp(&mut self, ty: TypeId) -> VarId {
        self.local("tmp", ty, VarMode::Temporary)
    }

    // ── Top level ──

    fn lower_global_declaration(&mut self, list: &DeclaratorList) -> Result<(), SourceError> {
        let base = self.resolve_type(&list.ty.specifier)?;
        let qualifier = list.ty.qualifier;
        for decl in &list.declarations {
            let ty = self.apply_array_dims(base, &decl.array_dims, decl.loc)?;
            let mode = if qualifier.contains(TypeQualifier::SHARED) {
                VarMode::Shared
            } else if qualifier.intersects(TypeQualifier::STATIC | TypeQualifier::CONST)
                && !qualifier.contains(TypeQualifier::UNIFORM)
            {
                VarMode::Auto
            } else {
                VarMode::Uniform
            };
            let mut variable = Variable::new(self.name(decl.identifier), ty, mode).global();
            variable.semantic = decl.semantic.map(|s| self.name(s).to_owned());
            let var = self.module.add_variable(variable);
            self.module.globals.push(var);
            self.declare_var(decl.identifier, var);
            if matches!(
                list.ty.specifier.name,
                TypeName::Texture(TextureKind::ByteAddressBuffer | TextureKind::RWByteAddressBuffer)
            ) {
                self.raw_buffers.insert(var);
            }

            if let (Some(init), VarMode::Auto) = (decl.initializer, mode) {
                let code = self.in_block(|this| this.lower_initializer(var, init))?;
                self.global_init.extend(code);
            }
        }
        Ok(())
    }

    fn lower_cbuffer(&mut self, cbuffer: &CBufferDeclaration) -> Result<(), SourceError> {
        let block = self.module.uniform_blocks.len();
        let mut members = Vec::new();
        for list in &cbuffer.members {
            let base = self.resolve_type(&list.ty.specifier)?;
            for decl in &list.declarations {
                let ty = self.apply_array_dims(base, &decl.array_dims, decl.loc)?;
                let mut variable =
                    Variable::new(self.name(decl.identifier), ty, VarMode::Uniform).global();
                variable.block = Some(block);
                let var = self.module.add_variable(variable);
                self.module.globals.push(var);
                self.declare_var(decl.identifier, var);
                members.push(var);
            }
        }
        let register = cbuffer
            .register
            .and_then(|r| parse_register_slot(self.name(r)));
        self.module.uniform_blocks.push(hlslcc_ir::UniformBlock {
            name: self.name(cbuffer.name).to_owned(),
            members,
            register,
        });
        Ok(())
    }

    fn lower_function(&mut self, definition: &FunctionDefinition) -> Result<(), SourceError> {
        let proto = &definition.prototype;
        let return_type = self.resolve_type(&proto.return_type.specifier)?;

        self.in_scope(|this| {
            let mut params = Vec::with_capacity(proto.parameters.len());
            let mut param_types = Vec::with_capacity(proto.parameters.len());
            for param in &proto.parameters {
                let base = this.resolve_type(&param.ty.specifier)?;
                let decl = &param.declaration;
                let ty = this.apply_array_dims(base, &decl.array_dims, decl.loc)?;
                let q = param.ty.qualifier;
                let mode = if q.contains(TypeQualifier::INOUT) {
                    VarMode::InOut
                } else if q.contains(TypeQualifier::OUT) {
                    VarMode::Out
                } else {
                    VarMode::In
                };
                let mut variable = Variable::new(this.name(decl.identifier), ty, mode);
                variable.semantic = decl.semantic.map(|s| this.name(s).to_owned());
                let var = this.module.add_variable(variable);
                this.declare_var(decl.identifier, var);
                params.push(var);
                param_types.push(ty);
            }

            let func = match this.find_declared(proto.name, &param_types) {
                Some(existing) => {
                    this.module[existing].params = params;
                    existing
                }
                None => {
                    let func = this.module.add_function(Function {
                        name: this.name(proto.name).to_owned(),
                        return_type,
                        params,
                        body: Vec::new(),
                    });
                    this.functions.entry(proto.name).or_default().push(func);
                    func
                }
            };

            let Some(body) = &definition.body else {
                return Ok(());
            };
            this.return_type = return_type;
            let code = this.in_block(|this| {
                for &stmt in body {
                    this.lower_statement(stmt)?;
                }
                Ok(())
            })?;
            this.module[func].body = code;
            Ok(())
        })
    }

    /// A function with this name and parameter types declared earlier.
    fn find_declared(&self, name: Name, param_types: &[TypeId]) -> Option<FuncId> {
        self.functions.get(&name)?.iter().copied().find(|&f| {
            let function = &self.module[f];
            function.params.len() == param_types.len()
                && function
                    .params
                    .iter()
                    .zip(param_types)
                    .all(|(&p, &ty)| self.module[p].ty == ty)
        })
    }
}

/// Slot number of a `register(b3)` / `register(t0)` name.
pub(crate) fn parse_register_slot(register: &str) -> Option<u32> {
    let digits = register.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    digits.parse().ok()
}

#[cfg(test)]
mod tests;
