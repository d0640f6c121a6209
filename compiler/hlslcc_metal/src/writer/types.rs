//! Type names and declarations.
//!
//! HLSL `floatRxC` prints as Metal `floatRxC`: Metal counts columns first,
//! so each HLSL row becomes a Metal column. Indexing a matrix therefore
//! still selects an HLSL row, and `mul` swaps its operands.
//!
//! Arrays of arrays cannot be copied in Metal, so every level of a
//! multi-dimensional array is wrapped in a struct with a single `Inner`
//! member: `float4 a[2][3]` becomes
//!
//! ```text
//! struct _mdarr_3_float4
//! {
//! 	float4 Inner[3];
//! };
//!
//! struct _mdarr_2_3_float4
//! {
//! 	_mdarr_3_float4 Inner[2];
//! };
//! ```

use std::fmt::Write;

use hlslcc_ir::visit::{read_vars, written_vars};
use hlslcc_ir::{Instruction, StructType, Type, TypeId};
use hlslcc_syntax::{ScalarKind, TextureKind};
use rustc_hash::FxHashSet;

use super::Writer;
use crate::buffers::BufferKind;
use crate::error::{unprintable, WriteError, WriteResult};
use crate::resources::TextureBinding;

impl Writer<'_> {
    pub(super) fn type_name(&self, ty: TypeId) -> Result<String, WriteError> {
        let types = &self.module.types;
        Ok(match types.get(ty) {
            Type::Void => "void".to_owned(),
            Type::Scalar(kind) => kind.name().to_owned(),
            Type::Vector(kind, n) => format!("{}{n}", kind.name()),
            Type::Matrix { scalar, rows, cols } => format!("{}{rows}x{cols}", scalar.name()),
            Type::Struct(s) => s.name.clone(),
            Type::Array { element, .. } => {
                if self.is_md_array(ty) {
                    self.wrapper_name(ty)?
                } else {
                    self.type_name(*element)?
                }
            }
            Type::SamplerState { .. } => "sampler".to_owned(),
            Type::Buffer { element, .. } => self.type_name(*element)?,
            Type::Texture(_) => return Err(unprintable("texture outside a parameter list")),
        })
    }

    pub(super) fn is_md_array(&self, ty: TypeId) -> bool {
        match self.module.types.get(ty) {
            Type::Array { element, .. } => self.module.types.is_array(*element),
            _ => false,
        }
    }

    /// `_mdarr_2_3_float4`.
    fn wrapper_name(&self, ty: TypeId) -> Result<String, WriteError> {
        let (dims, base) = self.module.types.array_dims(ty);
        let mut name = String::from("_mdarr_");
        for dim in dims {
            write!(name, "{dim}_")?;
        }
        name.push_str(&self.type_name(base)?);
        Ok(name)
    }

    /// `float4 name[3]`, `_mdarr_2_3_float4 name`, `float name`.
    pub(super) fn declaration(&self, ty: TypeId, name: &str) -> Result<String, WriteError> {
        match *self.module.types.get(ty) {
            Type::Array { element, length } if !self.is_md_array(ty) => {
                Ok(format!("{} {name}[{length}]", self.type_name(element)?))
            }
            _ => Ok(format!("{} {name}", self.type_name(ty)?)),
        }
    }

    /// `texture2d<float>`, `depth2d<float>`,
    /// `texture2d<float, access::read_write>`.
    pub(super) fn texture_type(&self, binding: &TextureBinding) -> Result<String, WriteError> {
        let ty = self.module[binding.var].ty;
        let Type::Texture(texture) = self.module.types.get(ty) else {
            return Err(unprintable("texture binding of a non-texture"));
        };
        let element = match self.module.types.scalar_kind(texture.element) {
            Some(kind @ (ScalarKind::Float | ScalarKind::Half | ScalarKind::Int | ScalarKind::Uint)) => {
                kind.name()
            }
            _ => return Err(unprintable("texture of a non-numeric element")),
        };
        if binding.compare {
            let base = match binding.kind {
                TextureKind::Texture2D => "depth2d",
                TextureKind::Texture2DArray => "depth2d_array",
                TextureKind::TextureCube => "depthcube",
                TextureKind::TextureCubeArray => "depthcube_array",
                kind => return Err(unprintable(format!("comparison sampling of {kind:?}"))),
            };
            return Ok(format!("{base}<float>"));
        }
        let base = match binding.kind {
            TextureKind::Texture1D | TextureKind::RWTexture1D => "texture1d",
            TextureKind::Texture1DArray | TextureKind::RWTexture1DArray => "texture1d_array",
            TextureKind::Texture2D | TextureKind::RWTexture2D => "texture2d",
            TextureKind::Texture2DArray | TextureKind::RWTexture2DArray => "texture2d_array",
            TextureKind::Texture2DMS => "texture2d_ms",
            TextureKind::Texture2DMSArray => "texture2d_ms_array",
            TextureKind::Texture3D | TextureKind::RWTexture3D => "texture3d",
            TextureKind::TextureCube => "texturecube",
            TextureKind::TextureCubeArray => "texturecube_array",
            kind => return Err(unprintable(format!("{kind:?} as a texture"))),
        };
        let access = if binding.writable {
            ", access::read_write"
        } else {
            ""
        };
        Ok(format!("{base}<{element}{access}>"))
    }

    // ── Declarations ──

    /// Structs, array wrappers and cbuffer layouts, dependencies first.
    pub(super) fn write_type_declarations(&mut self) -> WriteResult {
        let module = self.module;
        let mut roots = Vec::new();
        let mut vars = FxHashSet::default();
        if let Some(entry) = module.entry_function() {
            roots.push(entry.return_type);
            vars.extend(read_vars(&entry.body));
            vars.extend(written_vars(&entry.body));
            hlslcc_ir::visit::walk_instructions(&entry.body, &mut |instr| {
                if let Instruction::Declare(var) = instr {
                    vars.insert(*var);
                }
            });
        }
        vars.extend(module.globals.iter().copied());
        vars.extend(module.interface.stage_in);
        roots.extend(vars.iter().map(|&v| module[v].ty));

        let blocks: Vec<usize> = self
            .buffers
            .iter()
            .filter_map(|(_, kind)| match kind {
                BufferKind::UniformBlock(block) => Some(block),
                _ => None,
            })
            .collect();
        for &block in &blocks {
            roots.extend(module.uniform_blocks[block].members.iter().map(|&m| module[m].ty));
        }
        roots.sort_unstable();
        roots.dedup();

        let mut declared = FxHashSet::default();
        let mut wrappers = FxHashSet::default();
        for ty in roots {
            self.declare_type(ty, &mut declared, &mut wrappers)?;
        }
        for block in blocks {
            self.write_uniform_block(block)?;
        }
        Ok(())
    }

    fn declare_type(
        &mut self,
        ty: TypeId,
        declared: &mut FxHashSet<TypeId>,
        wrappers: &mut FxHashSet<TypeId>,
    ) -> WriteResult {
        if !declared.insert(ty) {
            return Ok(());
        }
        let module = self.module;
        match module.types.get(ty) {
            Type::Struct(s) => {
                for field in &s.fields {
                    self.declare_type(field.ty, declared, wrappers)?;
                }
                self.write_struct(ty, s)?;
            }
            &Type::Array { element, .. } => {
                self.declare_type(element, declared, wrappers)?;
                if self.is_md_array(ty) {
                    self.declare_wrapper(ty, wrappers)?;
                }
            }
            &Type::Buffer { element, .. } => self.declare_type(element, declared, wrappers)?,
            _ => {}
        }
        Ok(())
    }

    fn declare_wrapper(&mut self, ty: TypeId, wrappers: &mut FxHashSet<TypeId>) -> WriteResult {
        if !wrappers.insert(ty) {
            return Ok(());
        }
        let Type::Array { element, length } = *self.module.types.get(ty) else {
            return Ok(());
        };
        let inner = if self.module.types.is_array(element) {
            self.declare_wrapper(element, wrappers)?;
            self.wrapper_name(element)?
        } else {
            self.type_name(element)?
        };
        let name = self.wrapper_name(ty)?;
        write!(self.out, "struct {name}\n{{\n\t{inner} Inner[{length}];\n}};\n\n")?;
        Ok(())
    }

    fn write_struct(&mut self, ty: TypeId, s: &StructType) -> WriteResult {
        let stage = self.stage_types.contains(&ty);
        let mut text = format!("struct {}\n{{\n", s.name);
        for field in &s.fields {
            write!(text, "\t{}", self.declaration(field.ty, &field.name)?)?;
            if let (true, Some(attribute)) = (stage, &field.semantic) {
                write!(text, " [[ {attribute} ]]")?;
            }
            text.push_str(";\n");
        }
        text.push_str("};\n\n");
        self.out.push_str(&text);
        Ok(())
    }

    /// A cbuffer bound whole, with its members in HLSL register layout.
    fn write_uniform_block(&mut self, block: usize) -> WriteResult {
        let module = self.module;
        let ub = &module.uniform_blocks[block];
        let mut text = format!("struct {}\n{{\n", ub.name);
        for &member in &ub.members {
            let variable = &module[member];
            let packed = match *module.types.get(variable.ty) {
                Type::Vector(kind, 2 | 3) if kind != ScalarKind::Bool => "packed_",
                _ => "",
            };
            writeln!(text, "\t{packed}{};", self.declaration(variable.ty, &variable.name)?)?;
        }
        text.push_str("};\n\n");
        self.out.push_str(&text);
        Ok(())
    }
}
