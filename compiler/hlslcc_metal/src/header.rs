//! The metadata comments at the top of generated code.
//!
//! The runtime needs to know what a shader binds without parsing MSL, so
//! the generator describes its interface in `// @Key: entries` lines:
//!
//! ```text
//! // @Inputs: f4:in_ATTRIBUTE0,u1:gl_VertexID
//! // @Outputs: f4:gl_Position,f2:var_TEXCOORD0
//! // @UniformBlocks: View(1)
//! // @PackedGlobals: Scale(h:0,1),Offset(h:4,3)
//! // @PackedUB: Material(0): Color(0,4),Roughness(4,1)
//! // @PackedUBGlobalCopies: 0:0-h:8:5
//! // @Samplers: Albedo(0:1[LinearSampler])
//! // @UAVs: Output(g:1,1)
//! // @NumThreads: 8,8,1
//! ```
//!
//! [`CodeHeader`] is both what the generator prints and what
//! [`CodeHeader::parse`] reads back.

use std::fmt;

use hlslcc_ir::{Module, Type, TypeId, TypeTable};
use hlslcc_syntax::ScalarKind;
use rustc_hash::FxHashMap;

use crate::buffers::{BufferKind, Buffers};
use crate::layout::align_register;
use crate::pack::PackedUniforms;
use crate::resources::Resources;

// ── Entries ──

/// A stage input or output: type code (`f4`, `u1`, `f4x4`) and name.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct StageAttribute {
    pub ty: String,
    pub name: String,
}

/// A buffer the runtime binds as a whole.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct UniformBlockEntry {
    pub name: String,
    pub index: u32,
}

/// A loose uniform inside a packed array; offsets and sizes in floats.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PackedGlobal {
    pub name: String,
    pub array_type: char,
    pub offset: u32,
    pub size: u32,
}

/// A member of a flattened cbuffer at its HLSL offset.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PackedUbMember {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PackedUb {
    pub name: String,
    pub index: u32,
    pub members: Vec<PackedUbMember>,
}

/// `size` floats copied from flattened cbuffer `source_ub` into a packed
/// array.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PackedUbCopy {
    pub source_ub: u32,
    pub source_offset: u32,
    pub dest_array_type: char,
    pub dest_offset: u32,
    pub size: u32,
}

impl PackedUbCopy {
    /// `next` starts where `self` ends, on both sides.
    pub fn continued_by(&self, next: &PackedUbCopy) -> bool {
        self.source_ub == next.source_ub
            && self.dest_array_type == next.dest_array_type
            && self.source_offset + self.size == next.source_offset
            && self.dest_offset + self.size == next.dest_offset
    }
}

/// A texture, its slot and the sampler states it is sampled with.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SamplerEntry {
    pub name: String,
    pub offset: u32,
    pub count: u32,
    pub sampler_states: Vec<String>,
}

/// A writable resource.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct UavEntry {
    pub name: String,
    pub array_type: char,
    pub offset: u32,
    pub count: u32,
}

/// Array type letter of UAV entries.
const IMAGE_ARRAY_TYPE: char = 'g';

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CodeHeader {
    pub inputs: Vec<StageAttribute>,
    pub outputs: Vec<StageAttribute>,
    pub uniform_blocks: Vec<UniformBlockEntry>,
    pub packed_globals: Vec<PackedGlobal>,
    pub packed_ubs: Vec<PackedUb>,
    pub packed_ub_copies: Vec<PackedUbCopy>,
    pub samplers: Vec<SamplerEntry>,
    pub uavs: Vec<UavEntry>,
    pub num_threads: Option<[u32; 3]>,
}

/// A header line that does not parse.
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("malformed @{key} entry '{entry}'")]
    Malformed { key: &'static str, entry: String },
}

// ── Building ──

impl CodeHeader {
    pub(crate) fn build(
        module: &Module,
        packed: &PackedUniforms,
        buffers: &Buffers,
        resources: &Resources,
    ) -> CodeHeader {
        let types = &module.types;
        let mut header = CodeHeader::default();

        if let Some(var) = module.interface.stage_in {
            header.inputs = stage_attributes(types, module[var].ty);
        }
        for &var in &module.interface.system_values {
            let variable = &module[var];
            header.inputs.push(StageAttribute {
                ty: type_code(types, variable.ty),
                name: variable.name.clone(),
            });
        }
        if let Some(var) = module.interface.stage_out {
            header.outputs = stage_attributes(types, module[var].ty);
        }

        for (slot, kind) in buffers.iter() {
            let index = u32::try_from(slot).unwrap_or(u32::MAX);
            let name = match kind {
                BufferKind::UniformBlock(block) => module.uniform_blocks[block].name.clone(),
                BufferKind::Struct(var) | BufferKind::Storage { var, writable: false } => {
                    module[var].name.clone()
                }
                BufferKind::Storage {
                    var,
                    writable: true,
                } => {
                    header.uavs.push(UavEntry {
                        name: module[var].name.clone(),
                        array_type: IMAGE_ARRAY_TYPE,
                        offset: index,
                        count: 1,
                    });
                    continue;
                }
                BufferKind::Packed { .. } => continue,
            };
            header.uniform_blocks.push(UniformBlockEntry { name, index });
        }

        header.packed_globals.clone_from(&packed.globals);
        header.packed_ubs.clone_from(&packed.ubs);
        header.packed_ub_copies.clone_from(&packed.copies);

        for texture in &resources.textures {
            let mut sampler_states: Vec<String> = texture
                .samplers
                .iter()
                .map(|&s| module[s].name.clone())
                .collect();
            sampler_states.sort();
            let name = module[texture.var].name.clone();
            if texture.writable {
                header.uavs.push(UavEntry {
                    name,
                    array_type: IMAGE_ARRAY_TYPE,
                    offset: texture.slot,
                    count: 1,
                });
            } else {
                header.samplers.push(SamplerEntry {
                    name,
                    offset: texture.slot,
                    count: 1,
                    sampler_states,
                });
            }
        }

        header.num_threads = module.numthreads;
        header
    }

    /// Resources the runtime must provide for this shader.
    pub fn bindings(&self) -> ShaderBindings {
        let mut bindings = ShaderBindings {
            num_threads: self.num_threads,
            packed_ub_copies: self.packed_ub_copies.clone(),
            ..ShaderBindings::default()
        };
        for input in &self.inputs {
            if let Some(n) = numbered(&input.name, "in_ATTRIBUTE") {
                bindings.attribute_mask |= 1 << n;
            }
        }
        for output in &self.outputs {
            if let Some(n) = numbered(&output.name, "out_Target") {
                bindings.render_target_mask |= 1 << n;
            }
            bindings.writes_depth |= output.name == "FragDepth";
        }
        bindings.uniform_buffer_count = self
            .uniform_blocks
            .iter()
            .map(|b| b.index + 1)
            .max()
            .unwrap_or(0);

        let mut sizes: FxHashMap<char, u32> = FxHashMap::default();
        let mut grow = |array_type: char, end: u32| {
            let size = sizes.entry(array_type).or_default();
            *size = (*size).max(align_register(end));
        };
        for global in &self.packed_globals {
            grow(global.array_type, global.offset + global.size);
        }
        for copy in &self.packed_ub_copies {
            grow(copy.dest_array_type, copy.dest_offset + copy.size);
        }
        let mut sizes: Vec<(char, u32)> = sizes.into_iter().collect();
        sizes.sort_unstable();
        bindings.packed_global_array_sizes = sizes;

        bindings.sampler_count = self
            .samplers
            .iter()
            .map(|s| s.offset + s.count)
            .max()
            .unwrap_or(0);
        bindings.samplers.clone_from(&self.samplers);
        bindings.uavs.clone_from(&self.uavs);
        bindings
    }
}

/// Fields of a stage struct.
fn stage_attributes(types: &TypeTable, ty: TypeId) -> Vec<StageAttribute> {
    types
        .struct_type(ty)
        .map(|s| {
            s.fields
                .iter()
                .map(|f| StageAttribute {
                    ty: type_code(types, f.ty),
                    name: f.name.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `f4`, `u1`, `h3`, `f4x4`.
fn type_code(types: &TypeTable, ty: TypeId) -> String {
    let letter = |kind: ScalarKind| match kind {
        ScalarKind::Bool => 'b',
        ScalarKind::Int => 'i',
        ScalarKind::Uint => 'u',
        ScalarKind::Half => 'h',
        ScalarKind::Float => 'f',
    };
    match *types.get(ty) {
        Type::Scalar(kind) => format!("{}1", letter(kind)),
        Type::Vector(kind, n) => format!("{}{n}", letter(kind)),
        Type::Matrix { scalar, rows, cols } => format!("{}{rows}x{cols}", letter(scalar)),
        _ => String::from("?"),
    }
}

/// `n` when `name` is `prefix` followed by a number below 32.
fn numbered(name: &str, prefix: &str) -> Option<u32> {
    name.strip_prefix(prefix)?.parse().ok().filter(|&n| n < 32)
}

// ── Printing ──

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    key: &str,
    entries: &[T],
    mut entry: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    if entries.is_empty() {
        return Ok(());
    }
    write!(f, "// @{key}: ")?;
    for (i, e) in entries.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        entry(f, e)?;
    }
    f.write_str("\n")
}

impl fmt::Display for CodeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = |f: &mut fmt::Formatter<'_>, a: &StageAttribute| write!(f, "{}:{}", a.ty, a.name);
        write_list(f, "Inputs", &self.inputs, stage)?;
        write_list(f, "Outputs", &self.outputs, stage)?;
        write_list(f, "UniformBlocks", &self.uniform_blocks, |f, b| {
            write!(f, "{}({})", b.name, b.index)
        })?;
        write_list(f, "PackedGlobals", &self.packed_globals, |f, g| {
            write!(f, "{}({}:{},{})", g.name, g.array_type, g.offset, g.size)
        })?;
        for ub in &self.packed_ubs {
            write!(f, "// @PackedUB: {}({}): ", ub.name, ub.index)?;
            for (i, m) in ub.members.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}({},{})", m.name, m.offset, m.size)?;
            }
            f.write_str("\n")?;
        }
        write_list(f, "PackedUBGlobalCopies", &self.packed_ub_copies, |f, c| {
            write!(
                f,
                "{}:{}-{}:{}:{}",
                c.source_ub, c.source_offset, c.dest_array_type, c.dest_offset, c.size
            )
        })?;
        write_list(f, "Samplers", &self.samplers, |f, s| {
            write!(f, "{}({}:{}", s.name, s.offset, s.count)?;
            if !s.sampler_states.is_empty() {
                write!(f, "[{}]", s.sampler_states.join(","))?;
            }
            f.write_str(")")
        })?;
        write_list(f, "UAVs", &self.uavs, |f, u| {
            write!(f, "{}({}:{},{})", u.name, u.array_type, u.offset, u.count)
        })?;
        if let Some([x, y, z]) = self.num_threads {
            writeln!(f, "// @NumThreads: {x},{y},{z}")?;
        }
        Ok(())
    }
}

// ── Reading ──

impl CodeHeader {
    /// Read the metadata comments at the top of `source`. Reading stops at
    /// the first line that is not a comment; unknown keys are skipped.
    pub fn parse(source: &str) -> Result<CodeHeader, HeaderError> {
        let mut header = CodeHeader::default();
        for line in source.lines() {
            let Some(comment) = line.strip_prefix("//") else {
                break;
            };
            let Some((key, value)) = comment.trim_start().strip_prefix('@').and_then(|c| c.split_once(':'))
            else {
                continue;
            };
            let value = value.trim();
            match key {
                "Inputs" => header.inputs = entries(value, "Inputs", attribute)?,
                "Outputs" => header.outputs = entries(value, "Outputs", attribute)?,
                "UniformBlocks" => {
                    header.uniform_blocks = entries(value, "UniformBlocks", |e| {
                        let (name, index) = call_form(e)?;
                        Some(UniformBlockEntry {
                            name: name.to_owned(),
                            index: index.parse().ok()?,
                        })
                    })?;
                }
                "PackedGlobals" => {
                    header.packed_globals = entries(value, "PackedGlobals", |e| {
                        let (name, args) = call_form(e)?;
                        let (array_type, offset, size) = typed_range(args)?;
                        Some(PackedGlobal {
                            name: name.to_owned(),
                            array_type,
                            offset,
                            size,
                        })
                    })?;
                }
                "PackedUB" => header
                    .packed_ubs
                    .push(packed_ub(value).ok_or_else(|| malformed("PackedUB", value))?),
                "PackedUBGlobalCopies" => {
                    header.packed_ub_copies = entries(value, "PackedUBGlobalCopies", |e| {
                        let (source, dest) = e.split_once('-')?;
                        let (source_ub, source_offset) = source.split_once(':')?;
                        let mut dest = dest.split(':');
                        let dest_array_type = single_char(dest.next()?)?;
                        let dest_offset = dest.next()?.parse().ok()?;
                        let size = dest.next()?.parse().ok()?;
                        Some(PackedUbCopy {
                            source_ub: source_ub.parse().ok()?,
                            source_offset: source_offset.parse().ok()?,
                            dest_array_type,
                            dest_offset,
                            size,
                        })
                    })?;
                }
                "Samplers" => header.samplers = entries(value, "Samplers", sampler)?,
                "UAVs" => {
                    header.uavs = entries(value, "UAVs", |e| {
                        let (name, args) = call_form(e)?;
                        let (array_type, offset, count) = typed_range(args)?;
                        Some(UavEntry {
                            name: name.to_owned(),
                            array_type,
                            offset,
                            count,
                        })
                    })?;
                }
                "NumThreads" => {
                    let sizes: Vec<u32> = entries(value, "NumThreads", |e| e.parse().ok())?;
                    let sizes: [u32; 3] = sizes
                        .try_into()
                        .map_err(|_| malformed("NumThreads", value))?;
                    header.num_threads = Some(sizes);
                }
                _ => tracing::trace!(key, "skipped unknown header key"),
            }
        }
        Ok(header)
    }
}

fn malformed(key: &'static str, entry: &str) -> HeaderError {
    HeaderError::Malformed {
        key,
        entry: entry.to_owned(),
    }
}

/// Parse the comma-separated entries of `value`, ignoring commas inside
/// brackets and parentheses.
fn entries<T>(
    value: &str,
    key: &'static str,
    mut parse: impl FnMut(&str) -> Option<T>,
) -> Result<Vec<T>, HeaderError> {
    let mut out = Vec::new();
    if value.is_empty() {
        return Ok(out);
    }
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                let entry = value[start..i].trim();
                out.push(parse(entry).ok_or_else(|| malformed(key, entry))?);
                start = i + 1;
            }
            _ => {}
        }
    }
    let entry = value[start..].trim();
    out.push(parse(entry).ok_or_else(|| malformed(key, entry))?);
    Ok(out)
}

/// `Name(args)` split into `Name` and `args`.
fn call_form(entry: &str) -> Option<(&str, &str)> {
    let (name, rest) = entry.split_once('(')?;
    Some((name, rest.strip_suffix(')')?))
}

/// `t:offset,size`.
fn typed_range(args: &str) -> Option<(char, u32, u32)> {
    let (array_type, range) = args.split_once(':')?;
    let (offset, size) = range.split_once(',')?;
    Some((single_char(array_type)?, offset.parse().ok()?, size.parse().ok()?))
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn attribute(entry: &str) -> Option<StageAttribute> {
    let (ty, name) = entry.split_once(':')?;
    Some(StageAttribute {
        ty: ty.to_owned(),
        name: name.to_owned(),
    })
}

/// `Name(offset:count)` or `Name(offset:count[s1,s2])`.
fn sampler(entry: &str) -> Option<SamplerEntry> {
    let (name, args) = call_form(entry)?;
    let (range, states) = match args.split_once('[') {
        Some((range, states)) => (range, states.strip_suffix(']')?),
        None => (args, ""),
    };
    let (offset, count) = range.split_once(':')?;
    Some(SamplerEntry {
        name: name.to_owned(),
        offset: offset.parse().ok()?,
        count: count.parse().ok()?,
        sampler_states: states
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
    })
}

/// `Name(index): Member(offset,size),...`.
fn packed_ub(value: &str) -> Option<PackedUb> {
    let close = value.find(')')?;
    let (name, index) = call_form(&value[..=close])?;
    let members = value[close + 1..].trim_start().strip_prefix(':')?.trim();
    let members = entries(members, "PackedUB", |e| {
        let (name, args) = call_form(e)?;
        let (offset, size) = args.split_once(',')?;
        Some(PackedUbMember {
            name: name.to_owned(),
            offset: offset.parse().ok()?,
            size: size.parse().ok()?,
        })
    })
    .ok()?;
    Some(PackedUb {
        name: name.to_owned(),
        index: index.parse().ok()?,
        members,
    })
}

// ── Bindings ──

/// What a compiled shader expects from the runtime, derived from its
/// header.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ShaderBindings {
    /// Bit `n` set for each `in_ATTRIBUTEn` input.
    pub attribute_mask: u32,
    /// Bit `n` set for each `out_Targetn` output.
    pub render_target_mask: u32,
    pub writes_depth: bool,
    pub uniform_buffer_count: u32,
    /// Floats in each packed array, register aligned, by array type.
    pub packed_global_array_sizes: Vec<(char, u32)>,
    pub packed_ub_copies: Vec<PackedUbCopy>,
    pub sampler_count: u32,
    pub samplers: Vec<SamplerEntry>,
    pub uavs: Vec<UavEntry>,
    pub num_threads: Option<[u32; 3]>,
}
