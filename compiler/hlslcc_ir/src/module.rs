//! Variables, functions and the module that owns them.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::{Instruction, TypeId, TypeTable};

// ── Ids ──

/// Index of a [`Variable`] in [`Module::variables`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        VarId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarId({})", self.0)
    }
}

/// Index of a [`Function`] in [`Module::functions`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct FuncId(u32);

impl FuncId {
    #[inline]
    pub const fn new(index: u32) -> Self {
        FuncId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncId({})", self.0)
    }
}

// ── Variables ──

/// Storage class of a variable.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum VarMode {
    /// Locals and static globals.
    Auto,
    /// Compiler-introduced locals.
    Temporary,
    /// Set by the application: loose globals, cbuffer members, resources.
    Uniform,
    /// Function parameter or shader input.
    In,
    /// Function `out` parameter or shader output.
    Out,
    InOut,
    /// `groupshared`.
    Shared,
}

impl VarMode {
    pub const fn is_parameter_out(self) -> bool {
        matches!(self, VarMode::Out | VarMode::InOut)
    }
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    pub ty: TypeId,
    pub mode: VarMode,
    /// Declared at module scope.
    pub global: bool,
    pub semantic: Option<String>,
    /// Uniform block the variable is a member of.
    pub block: Option<usize>,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: TypeId, mode: VarMode) -> Self {
        Variable {
            name: name.into(),
            ty,
            mode,
            global: false,
            semantic: None,
            block: None,
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn with_semantic(mut self, semantic: impl Into<String>) -> Self {
        self.semantic = Some(semantic.into());
        self
    }
}

// ── Functions ──

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub return_type: TypeId,
    pub params: Vec<VarId>,
    pub body: Vec<Instruction>,
}

/// A `cbuffer`: its members are uniform variables tagged with the block.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    pub name: String,
    pub members: Vec<VarId>,
    /// `register(bN)` slot when given.
    pub register: Option<u32>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ShaderStage {
    #[default]
    Vertex,
    Pixel,
    Compute,
    Geometry,
    Hull,
    Domain,
}

impl ShaderStage {
    pub const fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Pixel => "pixel",
            ShaderStage::Compute => "compute",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Hull => "hull",
            ShaderStage::Domain => "domain",
        }
    }
}

/// The entry point's external interface, built by lowering.
#[derive(Clone, Debug, Default)]
pub struct EntryInterface {
    /// Struct-typed variable gathering the attribute or varying inputs.
    pub stage_in: Option<VarId>,
    /// Struct-typed variable returned from the entry point.
    pub stage_out: Option<VarId>,
    /// Inputs passed as their own parameters (`SV_VertexID`, ...).
    pub system_values: Vec<VarId>,
}

/// One lowered translation unit.
#[derive(Debug, Default)]
pub struct Module {
    pub types: TypeTable,
    pub variables: Vec<Variable>,
    pub functions: Vec<Function>,
    /// Module-scope variables in declaration order.
    pub globals: Vec<VarId>,
    pub uniform_blocks: Vec<UniformBlock>,
    pub entry: Option<FuncId>,
    pub interface: EntryInterface,
    pub stage: ShaderStage,
    /// `[numthreads(x, y, z)]` of a compute entry point.
    pub numthreads: Option<[u32; 3]>,
}

impl Module {
    pub fn new(stage: ShaderStage) -> Self {
        Module {
            stage,
            ..Module::default()
        }
    }

    pub fn add_variable(&mut self, var: Variable) -> VarId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "a shader never declares 2^32 variables"
        )]
        let id = VarId(self.variables.len() as u32);
        self.variables.push(var);
        id
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "a shader never declares 2^32 functions"
        )]
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| {
                #[expect(clippy::cast_possible_truncation, reason = "index of an existing function")]
                let id = FuncId(i as u32);
                id
            })
    }

    pub fn entry_function(&self) -> Option<&Function> {
        self.entry.map(|id| &self[id])
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "bounded by add_variable"
        )]
        let count = self.variables.len() as u32;
        (0..count).map(VarId)
    }
}

impl Index<VarId> for Module {
    type Output = Variable;

    fn index(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }
}

impl IndexMut<VarId> for Module {
    fn index_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id.index()]
    }
}

impl Index<FuncId> for Module {
    type Output = Function;

    fn index(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }
}

impl IndexMut<FuncId> for Module {
    fn index_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }
}
