//! MSL text for a lowered, optimized and packed module.
//!
//! The module holds a single parameterless `Main` after lowering. The
//! writer prints the banner and header, every struct the function needs,
//! then `Main` itself with its interface turned into Metal parameters.

mod constant;
mod expr;
mod types;

use std::fmt::Write;

use hlslcc_ir::visit::walk_instructions;
use hlslcc_ir::{
    Assignment, CaseLabel, ExprOp, Instruction, Module, Rvalue, RvalueKind, ShaderStage,
    SwitchCase, Type, TypeId, VarId, VarMode, WriteMask,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::buffers::{BufferKind, Buffers};
use crate::error::{unprintable, WriteError, WriteResult};
use crate::header::CodeHeader;
use crate::resources::Resources;
use crate::MetalOptions;

pub(crate) struct Writer<'a> {
    module: &'a Module,
    options: MetalOptions,
    buffers: &'a Buffers,
    resources: &'a Resources,
    out: String,
    /// Printed names of globals (`g0`) and locals (`t0`).
    names: FxHashMap<VarId, String>,
    indent: usize,
    /// Stage-in and stage-out structs, whose fields carry attributes.
    stage_types: FxHashSet<TypeId>,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(
        module: &'a Module,
        options: MetalOptions,
        buffers: &'a Buffers,
        resources: &'a Resources,
    ) -> Self {
        let stage_types = [module.interface.stage_in, module.interface.stage_out]
            .into_iter()
            .flatten()
            .map(|var| module[var].ty)
            .collect();
        Writer {
            module,
            options,
            buffers,
            resources,
            out: String::new(),
            names: name_variables(module),
            indent: 0,
            stage_types,
        }
    }

    pub(crate) fn write(mut self, header: &CodeHeader) -> Result<String, WriteError> {
        let (major, minor) = crate::VERSION;
        writeln!(self.out, "// Compiled by HLSLCC {major}.{minor}")?;
        write!(self.out, "{header}")?;
        self.out
            .push_str("\n#include <metal_stdlib>\n\nusing namespace metal;\n\n");
        self.write_type_declarations()?;
        self.write_entry()?;
        Ok(self.out)
    }

    pub(super) fn var_name(&self, var: VarId) -> String {
        if let Some(name) = self.names.get(&var) {
            return name.clone();
        }
        let variable = &self.module[var];
        match variable.block {
            Some(block) if variable.mode == VarMode::Uniform => {
                format!("{}.{}", self.module.uniform_blocks[block].name, variable.name)
            }
            _ => variable.name.clone(),
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    // ── Entry ──

    fn write_entry(&mut self) -> WriteResult {
        let module = self.module;
        let entry = module
            .entry_function()
            .ok_or_else(|| unprintable("module without an entry function"))?;
        let qualifier = match module.stage {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Pixel => "fragment",
            ShaderStage::Compute => "kernel",
            stage => return Err(unprintable(format!("{} entry point", stage.name()))),
        };
        let ret = self.type_name(entry.return_type)?;
        let params = self.entry_parameters()?;
        write!(self.out, "{qualifier} {ret} {}(", entry.name)?;
        self.out.push_str(&params.join(",\n\t"));
        self.out.push_str(")\n{\n");

        self.indent = 1;
        for &var in &module.globals {
            let variable = &module[var];
            let storage = match variable.mode {
                VarMode::Shared => "threadgroup ",
                VarMode::Auto => "",
                _ => continue,
            };
            let decl = self.declaration(variable.ty, &self.var_name(var))?;
            self.line(&format!("{storage}{decl};"));
        }
        self.block(&entry.body)?;
        self.indent = 0;
        self.out.push_str("}\n");
        Ok(())
    }

    /// Stage-in, system values, buffers, then textures and samplers.
    fn entry_parameters(&self) -> Result<Vec<String>, WriteError> {
        let module = self.module;
        let mut params = Vec::new();
        if let Some(var) = module.interface.stage_in {
            let ty = self.type_name(module[var].ty)?;
            params.push(format!("{ty} {} [[ stage_in ]]", self.var_name(var)));
        }
        for &var in &module.interface.system_values {
            let variable = &module[var];
            let attribute = variable
                .semantic
                .as_deref()
                .ok_or_else(|| unprintable(format!("system value '{}' without an attribute", variable.name)))?;
            let ty = self.type_name(variable.ty)?;
            params.push(format!("{ty} {} [[ {attribute} ]]", self.var_name(var)));
        }
        for (slot, kind) in self.buffers.iter() {
            let param = match kind {
                BufferKind::Packed { var, .. } => {
                    let (_, element) = module.types.array_dims(module[var].ty);
                    format!(
                        "constant {}* {} [[ buffer({slot}) ]]",
                        self.type_name(element)?,
                        self.var_name(var)
                    )
                }
                BufferKind::UniformBlock(block) => {
                    let name = &module.uniform_blocks[block].name;
                    format!("constant {name}& {name} [[ buffer({slot}) ]]")
                }
                BufferKind::Struct(var) => format!(
                    "constant {}& {} [[ buffer({slot}) ]]",
                    self.type_name(module[var].ty)?,
                    self.var_name(var)
                ),
                BufferKind::Storage { var, writable } => format!(
                    "{} {}* {} [[ buffer({slot}) ]]",
                    if writable { "device" } else { "constant" },
                    self.type_name(module[var].ty)?,
                    self.var_name(var)
                ),
            };
            params.push(param);
        }
        for texture in &self.resources.textures {
            if let Some(slot) = texture.inline_sampler() {
                params.push(format!("sampler s{slot} [[ sampler({slot}) ]]"));
            }
            params.push(format!(
                "{} {} [[ texture({}) ]]",
                self.texture_type(texture)?,
                self.var_name(texture.var),
                texture.slot
            ));
        }
        for sampler in &self.resources.samplers {
            params.push(format!(
                "sampler {} [[ sampler({}) ]]",
                self.var_name(sampler.var),
                sampler.slot
            ));
        }
        Ok(params)
    }

    // ── Statements ──

    fn block(&mut self, code: &[Instruction]) -> WriteResult {
        for instr in code {
            self.instruction(instr)?;
        }
        Ok(())
    }

    fn nested(&mut self, code: &[Instruction]) -> WriteResult {
        self.line("{");
        self.indent += 1;
        self.block(code)?;
        self.indent -= 1;
        self.line("}");
        Ok(())
    }

    fn instruction(&mut self, instr: &Instruction) -> WriteResult {
        match instr {
            Instruction::Declare(var) => {
                let module = self.module;
                let variable = &module[*var];
                if !variable.global {
                    let decl = self.declaration(variable.ty, &self.var_name(*var))?;
                    self.line(&format!("{decl};"));
                }
            }
            Instruction::Assign(assignment) => self.assignment(assignment)?,
            Instruction::Call { .. } => {
                return Err(unprintable("function call left after inlining"));
            }
            Instruction::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.rvalue_string(condition)?;
                if let Some(text) = self.conditional_move(&condition, then_branch, else_branch)? {
                    self.line(&text);
                    return Ok(());
                }
                self.line(&format!("if ({condition})"));
                self.nested(then_branch)?;
                if !else_branch.is_empty() {
                    self.line("else");
                    self.nested(else_branch)?;
                }
            }
            Instruction::Loop { body } => {
                self.line("for (;;)");
                self.nested(body)?;
            }
            Instruction::Switch { selector, cases } => self.switch(selector, cases)?,
            Instruction::Break => self.line("break;"),
            Instruction::Continue => self.line("continue;"),
            Instruction::Return(None) => self.line("return;"),
            Instruction::Return(Some(value)) => {
                let value = self.rvalue_string(value)?;
                self.line(&format!("return {value};"));
            }
            Instruction::Discard => self.line("discard_fragment();"),
            Instruction::TextureStore {
                texture,
                coordinate,
                value,
            } => {
                let text = self.texture_store(texture, coordinate, value)?;
                self.line(&format!("{text};"));
            }
            Instruction::Barrier => self.line("threadgroup_barrier(mem_flags::mem_threadgroup);"),
        }
        Ok(())
    }

    fn switch(&mut self, selector: &Rvalue, cases: &[SwitchCase]) -> WriteResult {
        let selector = self.rvalue_string(selector)?;
        self.line(&format!("switch ({selector})"));
        self.line("{");
        for case in cases {
            for label in &case.labels {
                match label {
                    CaseLabel::Value(value) => {
                        let mut text = String::new();
                        constant::component(&mut text, *value, false)?;
                        self.line(&format!("case {text}:"));
                    }
                    CaseLabel::Default => self.line("default:"),
                }
            }
            self.indent += 1;
            self.block(&case.body)?;
            self.indent -= 1;
        }
        self.line("}");
        Ok(())
    }

    fn assignment(&mut self, assignment: &Assignment) -> WriteResult {
        if assignment.is_dead() {
            return Ok(());
        }
        if self.module.types.is_array(assignment.lhs.ty)
            && (!self.is_md_array(assignment.lhs.ty) || is_construct(&assignment.rhs))
        {
            return self.array_assignment(assignment);
        }
        let lhs = self.lvalue(&assignment.lhs, assignment.write_mask)?;
        let rhs = self.rvalue_string(&assignment.rhs)?;
        match &assignment.condition {
            Some(condition) => {
                let condition = self.rvalue_string(condition)?;
                self.line(&format!("if ({condition}) {lhs} = {rhs};"));
            }
            None => self.line(&format!("{lhs} = {rhs};")),
        }
        Ok(())
    }

    /// Metal cannot assign arrays, so each element is assigned on its own.
    fn array_assignment(&mut self, assignment: &Assignment) -> WriteResult {
        let Type::Array { element, length } = *self.module.types.get(assignment.lhs.ty) else {
            return Err(unprintable("array assignment to a non-array"));
        };
        for i in 0..length {
            #[expect(clippy::cast_possible_wrap, reason = "array lengths fit in an int")]
            let index = Rvalue::int(i as i32);
            let lhs = assignment.lhs.clone().index(index.clone(), element);
            let rhs = match &assignment.rhs.kind {
                RvalueKind::Expr {
                    op: ExprOp::Construct,
                    operands,
                } => operands
                    .get(i as usize)
                    .cloned()
                    .ok_or_else(|| unprintable("array constructor with too few elements"))?,
                RvalueKind::Var(_) | RvalueKind::Index { .. } | RvalueKind::Field { .. } => {
                    assignment.rhs.clone().index(index, element)
                }
                _ => return Err(unprintable("array value that is not a variable or constructor")),
            };
            self.assignment(&Assignment {
                lhs,
                rhs,
                write_mask: WriteMask::empty(),
                condition: assignment.condition.clone(),
            })?;
        }
        Ok(())
    }

    /// `lhs` followed by the written channels when they are not all of it.
    fn lvalue(&self, lhs: &Rvalue, mask: WriteMask) -> Result<String, WriteError> {
        let mut text = self.rvalue_string(lhs)?;
        let size = self.module.types.vector_size(lhs.ty);
        if size > 1 && !mask.is_empty() && mask != WriteMask::first(size) {
            if let Some(swizzle) = mask.as_swizzle() {
                text.push('.');
                text.push_str(&swizzle.letters());
            }
        }
        Ok(text)
    }

    /// `x = (c)?(a):(b);` for an `if` whose branches each only copy a
    /// variable or constant into the same destination.
    fn conditional_move(
        &self,
        condition: &str,
        then_branch: &[Instruction],
        else_branch: &[Instruction],
    ) -> Result<Option<String>, WriteError> {
        let ([Instruction::Assign(a)], [Instruction::Assign(b)]) = (then_branch, else_branch) else {
            return Ok(None);
        };
        let simple = |x: &Assignment| {
            x.condition.is_none()
                && x.whole_var().is_some()
                && matches!(x.rhs.kind, RvalueKind::Var(_) | RvalueKind::Constant(_))
        };
        if !simple(a)
            || !simple(b)
            || a.whole_var() != b.whole_var()
            || a.write_mask != b.write_mask
            || a.rhs.ty != b.rhs.ty
            || self.module.types.is_array(a.lhs.ty)
        {
            return Ok(None);
        }
        let lhs = self.lvalue(&a.lhs, a.write_mask)?;
        let then_value = self.rvalue_string(&a.rhs)?;
        let else_value = self.rvalue_string(&b.rhs)?;
        Ok(Some(format!(
            "{lhs} = ({condition})?({then_value}):({else_value});"
        )))
    }
}

fn is_construct(r: &Rvalue) -> bool {
    matches!(
        r.kind,
        RvalueKind::Expr {
            op: ExprOp::Construct,
            ..
        }
    )
}

/// `g0..` for static globals in declaration order, `t0..` for locals in
/// order of first appearance.
fn name_variables(module: &Module) -> FxHashMap<VarId, String> {
    let mut names = FxHashMap::default();
    let mut globals = 0;
    for &var in &module.globals {
        if module[var].mode == VarMode::Auto {
            names.insert(var, format!("g{globals}"));
            globals += 1;
        }
    }
    let Some(entry) = module.entry_function() else {
        return names;
    };
    let mut locals = 0;
    walk_instructions(&entry.body, &mut |instr| {
        let mut seen = Vec::new();
        match instr {
            Instruction::Declare(var) => seen.push(*var),
            Instruction::Assign(assignment) => seen.extend(assignment.lhs.root_var()),
            _ => {}
        }
        instr.for_each_read(&mut |value| {
            value.walk(&mut |r| {
                if let RvalueKind::Var(var) = r.kind {
                    seen.push(var);
                }
            });
        });
        for var in seen {
            let variable = &module[var];
            if !variable.global
                && matches!(variable.mode, VarMode::Auto | VarMode::Temporary)
                && !names.contains_key(&var)
            {
                names.insert(var, format!("t{locals}"));
                locals += 1;
            }
        }
    });
    names
}
