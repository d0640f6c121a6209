//! Synthesis of `Main`, the shader's real entry function.
//!
//! The user's entry point keeps its HLSL signature. `Main` takes no
//! parameters: it copies the stage-in struct and system values into locals
//! shaped like the user's parameters, calls the user function, and copies
//! every output with a semantic into the stage-out struct it returns.
//!
//! Stage struct members carry their Metal attribute in
//! [`StructField::semantic`](hlslcc_ir::StructField): `attribute(0)`,
//! `user(TEXCOORD0)`, `position`, `color(0)`, `depth(any)`.

use hlslcc_diagnostic::{ErrorCode, SourceError};
use hlslcc_ir::{
    FuncId, Function, Instruction, Rvalue, ShaderStage, StructField, StructType, Type, TypeId,
    VarId, VarMode, Variable,
};
use hlslcc_syntax::ast::{FunctionDefinition, TypeQualifier};
use hlslcc_syntax::{ScalarKind, SourceLocation};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::Lowerer;

/// Name of the synthesized entry function.
pub const MAIN: &str = "Main";

/// Inputs passed to `Main` as their own parameters: stage, HLSL semantic,
/// variable name, Metal attribute, element kind and component count.
const SYSTEM_INPUTS: &[(ShaderStage, &str, &str, &str, ScalarKind, u8)] = &[
    (ShaderStage::Vertex, "SV_VERTEXID", "gl_VertexID", "vertex_id", ScalarKind::Uint, 1),
    (ShaderStage::Vertex, "SV_INSTANCEID", "gl_InstanceID", "instance_id", ScalarKind::Uint, 1),
    (ShaderStage::Pixel, "SV_ISFRONTFACE", "gl_FrontFacing", "front_facing", ScalarKind::Bool, 1),
    (ShaderStage::Pixel, "SV_SAMPLEINDEX", "gl_SampleID", "sample_id", ScalarKind::Uint, 1),
    (ShaderStage::Pixel, "SV_COVERAGE", "gl_SampleMaskIn", "sample_mask", ScalarKind::Uint, 1),
    (
        ShaderStage::Compute,
        "SV_DISPATCHTHREADID",
        "gl_GlobalInvocationID",
        "thread_position_in_grid",
        ScalarKind::Uint,
        3,
    ),
    (
        ShaderStage::Compute,
        "SV_GROUPID",
        "gl_WorkGroupID",
        "threadgroup_position_in_grid",
        ScalarKind::Uint,
        3,
    ),
    (
        ShaderStage::Compute,
        "SV_GROUPTHREADID",
        "gl_LocalInvocationID",
        "thread_position_in_threadgroup",
        ScalarKind::Uint,
        3,
    ),
    (
        ShaderStage::Compute,
        "SV_GROUPINDEX",
        "gl_LocalInvocationIndex",
        "thread_index_in_threadgroup",
        ScalarKind::Uint,
        1,
    ),
];

#[derive(Copy, Clone, Debug)]
enum Step {
    Field(usize),
    Index(u32),
}

/// Where a leaf lives in the user function's signature.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Root {
    Param(usize),
    Return,
}

/// One scalar, vector or matrix with a semantic, reached from a parameter
/// or the return value through struct fields and array elements.
#[derive(Clone, Debug)]
struct Leaf {
    root: Root,
    path: SmallVec<[Step; 4]>,
    ty: TypeId,
    semantic: String,
}

/// Semantic name and index: `TEXCOORD3` is (`TEXCOORD`, 3), `COLOR` is
/// (`COLOR`, 0).
fn split_semantic(semantic: &str) -> (&str, u32) {
    let digits = semantic.len()
        - semantic
            .bytes()
            .rev()
            .take_while(u8::is_ascii_digit)
            .count();
    let (name, index) = semantic.split_at(digits);
    (name, index.parse().unwrap_or(0))
}

/// `TEXCOORD3` advanced by `offset` is `TEXCOORD(3 + offset)`.
fn offset_semantic(semantic: &str, offset: u32) -> String {
    if offset == 0 {
        return semantic.to_owned();
    }
    let (name, index) = split_semantic(semantic);
    format!("{name}{}", index + offset)
}

struct StageField {
    field: StructField,
    leaf: Leaf,
}

impl Lowerer<'_> {
    pub(crate) fn synthesize_entry(&mut self, entry_point: &str) -> Result<(), SourceError> {
        let unit = self.unit;
        let Some(definition) = unit
            .functions()
            .find(|f| f.body.is_some() && self.name(f.prototype.name) == entry_point)
        else {
            return Err(self.error(
                ErrorCode::E2005,
                SourceLocation::default(),
                format!("entry point '{entry_point}' not found"),
            ));
        };
        let proto = &definition.prototype;
        let loc = proto.loc;
        let user = self.user_entry(definition).ok_or_else(|| {
            hlslcc_diagnostic::internal_error(ErrorCode::E9002, "entry point was not lowered")
        })?;

        if self.module.stage == ShaderStage::Compute {
            self.module.numthreads = self.numthreads(definition);
        }

        let params = self.module[user].params.clone();
        let return_type = self.module[user].return_type;

        // ── Gather leaves ──
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        let mut uniforms = Vec::new();
        for (i, (param, &var)) in proto.parameters.iter().zip(&params).enumerate() {
            if param.ty.qualifier.contains(TypeQualifier::UNIFORM) {
                uniforms.push(i);
                continue;
            }
            let variable = &self.module[var];
            let (ty, mode) = (variable.ty, variable.mode);
            let semantic = variable.semantic.clone();
            if mode != VarMode::Out {
                self.collect_leaves(Root::Param(i), ty, semantic.as_deref(), &mut SmallVec::new(), &mut inputs, loc)?;
            }
            if mode.is_parameter_out() {
                self.collect_leaves(Root::Param(i), ty, semantic.as_deref(), &mut SmallVec::new(), &mut outputs, loc)?;
            }
        }
        if return_type != TypeId::VOID {
            let semantic = proto.return_semantic.map(|s| self.name(s).to_owned());
            self.collect_leaves(Root::Return, return_type, semantic.as_deref(), &mut SmallVec::new(), &mut outputs, loc)?;
        }

        // ── Interface ──
        let (stage_fields, system_inputs) = self.bind_inputs(inputs, loc)?;
        let out_fields = self.bind_outputs(outputs, loc)?;

        let stage_in = if stage_fields.is_empty() {
            None
        } else {
            let fields = stage_fields.iter().map(|f| f.field.clone()).collect();
            let ty = self.module.types.intern(Type::Struct(StructType {
                name: format!("{MAIN}_In"),
                fields,
            }));
            let var = self
                .module
                .add_variable(Variable::new("__main_in", ty, VarMode::In).global());
            Some((var, ty))
        };
        let out_ty = (!out_fields.is_empty()).then(|| {
            let fields = out_fields.iter().map(|f| f.field.clone()).collect();
            self.module.types.intern(Type::Struct(StructType {
                name: format!("{MAIN}_Out"),
                fields,
            }))
        });

        // ── Body ──
        let global_init = std::mem::take(&mut self.global_init);
        let mut system_vars = Vec::with_capacity(system_inputs.len());
        let mut stage_out = None;
        let body = self.in_block(|this| {
            for instr in global_init {
                this.emit(instr);
            }

            let mut args = Vec::with_capacity(params.len());
            for (i, &param) in params.iter().enumerate() {
                let (name, ty) = (this.module[param].name.clone(), this.module[param].ty);
                if uniforms.contains(&i) {
                    let var = this
                        .module
                        .add_variable(Variable::new(name, ty, VarMode::Uniform).global());
                    this.module.globals.push(var);
                    args.push(Rvalue::var(var, ty));
                } else {
                    let local = this.local(name, ty, VarMode::Auto);
                    args.push(Rvalue::var(local, ty));
                }
            }

            if let Some((var, ty)) = stage_in {
                for (index, stage) in stage_fields.iter().enumerate() {
                    let source = Rvalue::var(var, ty).field(index, stage.field.ty);
                    this.copy_to_leaf(&stage.leaf, &args, None, source, loc)?;
                }
            }
            for (leaf, name, attribute, ty) in system_inputs {
                let var = this.module.add_variable(
                    Variable::new(name, ty, VarMode::In)
                        .global()
                        .with_semantic(attribute),
                );
                system_vars.push(var);
                this.copy_to_leaf(&leaf, &args, None, Rvalue::var(var, ty), loc)?;
            }

            let result = (return_type != TypeId::VOID).then(|| {
                let tmp = this.temp(return_type);
                Rvalue::var(tmp, return_type)
            });
            this.emit(Instruction::Call {
                callee: user,
                args: args.clone(),
                result: result.clone(),
            });

            match out_ty {
                Some(ty) => {
                    let out = this.local("__main_out", ty, VarMode::Auto);
                    stage_out = Some(out);
                    for (index, stage) in out_fields.iter().enumerate() {
                        let value = this.leaf_value(&stage.leaf, &args, result.as_ref());
                        let value = this.convert(value, stage.field.ty, loc)?;
                        this.emit(Instruction::assign(
                            Rvalue::var(out, ty).field(index, stage.field.ty),
                            value,
                        ));
                    }
                    this.emit(Instruction::Return(Some(Rvalue::var(out, ty))));
                }
                None => this.emit(Instruction::Return(None)),
            }
            Ok(())
        })?;

        let main = self.module.add_function(Function {
            name: MAIN.to_owned(),
            return_type: out_ty.unwrap_or(TypeId::VOID),
            params: Vec::new(),
            body,
        });
        self.module.entry = Some(main);
        self.module.interface.stage_in = stage_in.map(|(var, _)| var);
        self.module.interface.stage_out = stage_out;
        self.module.interface.system_values = system_vars;
        tracing::debug!(
            entry = entry_point,
            inputs = stage_in.is_some(),
            outputs = out_fields.len(),
            "synthesized Main"
        );
        Ok(())
    }

    fn user_entry(&self, definition: &FunctionDefinition) -> Option<FuncId> {
        let arity = definition.prototype.parameters.len();
        self.functions
            .get(&definition.prototype.name)?
            .iter()
            .copied()
            .find(|&f| self.module[f].params.len() == arity && !self.module[f].body.is_empty())
            .or_else(|| {
                self.functions
                    .get(&definition.prototype.name)?
                    .iter()
                    .copied()
                    .find(|&f| self.module[f].params.len() == arity)
            })
    }

    fn numthreads(&self, definition: &FunctionDefinition) -> Option<[u32; 3]> {
        let attribute = definition
            .prototype
            .attributes
            .iter()
            .find(|a| self.name(a.name).eq_ignore_ascii_case("numthreads"))?;
        let mut sizes = [1u32; 3];
        for (slot, &arg) in sizes.iter_mut().zip(&attribute.arguments) {
            *slot = self
                .eval_const_int(arg)
                .and_then(|n| u32::try_from(n).ok())?;
        }
        Some(sizes)
    }

    // ── Leaves ──

    fn collect_leaves(
        &self,
        root: Root,
        ty: TypeId,
        semantic: Option<&str>,
        path: &mut SmallVec<[Step; 4]>,
        out: &mut Vec<Leaf>,
        loc: SourceLocation,
    ) -> Result<(), SourceError> {
        match self.module.types.get(ty) {
            Type::Struct(s) => {
                for (i, field) in s.fields.iter().enumerate() {
                    path.push(Step::Field(i));
                    let semantic = field.semantic.as_deref().or(semantic);
                    self.collect_leaves(root, field.ty, semantic, path, out, loc)?;
                    path.pop();
                }
                Ok(())
            }
            &Type::Array { element, length } => {
                let Some(semantic) = semantic else {
                    return Err(self.missing_semantic(loc));
                };
                for i in 0..length {
                    path.push(Step::Index(i));
                    let semantic = offset_semantic(semantic, i);
                    self.collect_leaves(root, element, Some(&semantic), path, out, loc)?;
                    path.pop();
                }
                Ok(())
            }
            _ => {
                let Some(semantic) = semantic else {
                    return Err(self.missing_semantic(loc));
                };
                out.push(Leaf {
                    root,
                    path: path.clone(),
                    ty,
                    semantic: semantic.to_ascii_uppercase(),
                });
                Ok(())
            }
        }
    }

    fn missing_semantic(&self, loc: SourceLocation) -> SourceError {
        self.error(
            ErrorCode::E2012,
            loc,
            "entry point parameter or return value without a semantic",
        )
    }

    /// Value of `leaf` read from the argument locals or the call result.
    fn leaf_value(&mut self, leaf: &Leaf, args: &[Rvalue], result: Option<&Rvalue>) -> Rvalue {
        let mut value = match leaf.root {
            Root::Param(i) => args[i].clone(),
            Root::Return => result.cloned().unwrap_or_else(crate::expr::void_value),
        };
        for step in &leaf.path {
            value = match *step {
                Step::Field(i) => {
                    let ty = self
                        .module
                        .types
                        .struct_type(value.ty)
                        .and_then(|s| s.fields.get(i))
                        .map_or(TypeId::VOID, |f| f.ty);
                    value.field(i, ty)
                }
                Step::Index(i) => {
                    let ty = self.module.types.element(value.ty).unwrap_or(TypeId::VOID);
                    value.index(Rvalue::int(i32::try_from(i).unwrap_or(i32::MAX)), ty)
                }
            };
        }
        value
    }

    fn copy_to_leaf(
        &mut self,
        leaf: &Leaf,
        args: &[Rvalue],
        result: Option<&Rvalue>,
        source: Rvalue,
        loc: SourceLocation,
    ) -> Result<(), SourceError> {
        let target = self.leaf_value(leaf, args, result);
        let value = self.convert(source, target.ty, loc)?;
        self.emit(Instruction::assign(target, value));
        Ok(())
    }

    // ── Bindings ──

    #[expect(clippy::type_complexity, reason = "local plumbing between two steps")]
    fn bind_inputs(
        &mut self,
        inputs: Vec<Leaf>,
        loc: SourceLocation,
    ) -> Result<(Vec<StageField>, Vec<(Leaf, &'static str, &'static str, TypeId)>), SourceError> {
        let stage = self.module.stage;
        let mut fields = Vec::new();
        let mut system = Vec::new();
        let mut seen = FxHashSet::default();

        // Explicit ATTRIBUTEn indices first, then the lowest free ones.
        let mut used_attributes: FxHashSet<u32> = inputs
            .iter()
            .filter_map(|l| {
                let (name, index) = split_semantic(&l.semantic);
                (name == "ATTRIBUTE").then_some(index)
            })
            .collect();
        let mut next_attribute = 0;

        for leaf in inputs {
            if !seen.insert(leaf.semantic.clone()) {
                return Err(self.duplicate_semantic(&leaf.semantic, loc));
            }
            if let Some(&(_, _, name, attribute, kind, size)) = SYSTEM_INPUTS
                .iter()
                .find(|s| s.0 == stage && s.1 == leaf.semantic)
            {
                let ty = self.module.types.vector(kind, size);
                system.push((leaf, name, attribute, ty));
                continue;
            }
            let (name, semantic, ty) = match stage {
                ShaderStage::Vertex => {
                    let (base, index) = split_semantic(&leaf.semantic);
                    let index = if base == "ATTRIBUTE" {
                        index
                    } else {
                        while used_attributes.contains(&next_attribute) {
                            next_attribute += 1;
                        }
                        used_attributes.insert(next_attribute);
                        next_attribute
                    };
                    (
                        format!("in_ATTRIBUTE{index}"),
                        format!("attribute({index})"),
                        leaf.ty,
                    )
                }
                ShaderStage::Pixel if leaf.semantic == "SV_POSITION" => (
                    "gl_FragCoord".to_owned(),
                    "position".to_owned(),
                    self.module.types.vector(ScalarKind::Float, 4),
                ),
                ShaderStage::Pixel => (
                    format!("var_{}", leaf.semantic),
                    format!("user({})", leaf.semantic),
                    leaf.ty,
                ),
                _ => {
                    return Err(self.error(
                        ErrorCode::E2012,
                        loc,
                        format!(
                            "semantic '{}' is not a {} shader input",
                            leaf.semantic,
                            stage.name()
                        ),
                    ))
                }
            };
            fields.push(StageField {
                field: StructField {
                    name,
                    ty,
                    semantic: Some(semantic),
                },
                leaf,
            });
        }
        Ok((fields, system))
    }

    fn bind_outputs(&mut self, outputs: Vec<Leaf>, loc: SourceLocation) -> Result<Vec<StageField>, SourceError> {
        let stage = self.module.stage;
        let mut fields = Vec::with_capacity(outputs.len());
        let mut seen = FxHashSet::default();
        for leaf in outputs {
            if !seen.insert(leaf.semantic.clone()) {
                return Err(self.duplicate_semantic(&leaf.semantic, loc));
            }
            let (base, index) = split_semantic(&leaf.semantic);
            let (name, semantic, ty) = match (stage, base) {
                (ShaderStage::Vertex, "SV_POSITION") => (
                    "gl_Position".to_owned(),
                    "position".to_owned(),
                    self.module.types.vector(ScalarKind::Float, 4),
                ),
                (ShaderStage::Vertex, _) => (
                    format!("var_{}", leaf.semantic),
                    format!("user({})", leaf.semantic),
                    leaf.ty,
                ),
                (ShaderStage::Pixel, "SV_TARGET" | "COLOR") => {
                    (format!("out_Target{index}"), format!("color({index})"), leaf.ty)
                }
                (ShaderStage::Pixel, "SV_DEPTH" | "DEPTH") => {
                    ("FragDepth".to_owned(), "depth(any)".to_owned(), TypeId::FLOAT)
                }
                (ShaderStage::Pixel, "SV_COVERAGE") => {
                    ("gl_SampleMask".to_owned(), "sample_mask".to_owned(), TypeId::UINT)
                }
                _ => {
                    return Err(self.error(
                        ErrorCode::E2012,
                        loc,
                        format!(
                            "semantic '{}' is not a {} shader output",
                            leaf.semantic,
                            stage.name()
                        ),
                    ))
                }
            };
            fields.push(StageField {
                field: StructField {
                    name,
                    ty,
                    semantic: Some(semantic),
                },
                leaf,
            });
        }
        Ok(fields)
    }

    fn duplicate_semantic(&self, semantic: &str, loc: SourceLocation) -> SourceError {
        self.error(
            ErrorCode::E2012,
            loc,
            format!("semantic '{semantic}' is used more than once"),
        )
    }
}
