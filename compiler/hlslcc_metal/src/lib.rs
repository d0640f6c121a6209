//! Metal Shading Language back end.
//!
//! # Module Structure
//!
//! - `layout`: register layout of uniforms and cbuffer members
//! - `pack`: packing of loose uniforms (and flattened cbuffers) into `pu_*`
//!   arrays
//! - `buffers`: buffer slot assignment
//! - `resources`: texture slots and sampler pairing
//! - `restrictions`: Metal binding limits and unsupported stages
//! - `header`: the `// @...` metadata comments, written and read back
//! - `writer`: MSL text
//!
//! # Output
//!
//! ```text
//! // Compiled by HLSLCC 0.1
//! // @Inputs: f4:in_ATTRIBUTE0
//! // @Outputs: f4:gl_Position
//! // @PackedGlobals: Scale(h:0,1)
//!
//! #include <metal_stdlib>
//!
//! using namespace metal;
//!
//! struct Main_In { ... };
//!
//! vertex Main_Out Main(Main_In __main_in [[ stage_in ]],
//! 	constant float4* pu_h [[ buffer(0) ]])
//! {
//! 	...
//! }
//! ```
//!
//! [`generate`] rewrites the module while packing uniforms, so it takes the
//! module by mutable reference; the IR is not meant to be reused afterwards.

mod buffers;
mod error;
mod header;
mod layout;
mod pack;
mod resources;
mod restrictions;
mod writer;

use hlslcc_diagnostic::SourceError;
use hlslcc_ir::Module;

pub use buffers::{BufferKind, Buffers};
pub use header::{
    CodeHeader, HeaderError, PackedGlobal, PackedUb, PackedUbCopy, PackedUbMember, SamplerEntry,
    ShaderBindings, StageAttribute, UavEntry, UniformBlockEntry,
};
pub use pack::insert_range;
pub use resources::Resources;
pub use restrictions::check_stage;

/// Version printed in the banner line.
pub const VERSION: (u32, u32) = (0, 1);

/// Platform whose binding limits and texture features apply.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum MetalTarget {
    #[default]
    MacOs,
    Ios,
}

impl MetalTarget {
    pub const fn name(self) -> &'static str {
        match self {
            MetalTarget::MacOs => "macos",
            MetalTarget::Ios => "ios",
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct MetalOptions {
    /// Pack cbuffer members into the `pu_*` arrays instead of binding each
    /// cbuffer as its own buffer.
    pub flatten_uniform_buffers: bool,
    pub target: MetalTarget,
}

/// Generate MSL for the entry function of `module`.
pub fn generate(module: &mut Module, options: MetalOptions) -> Result<String, SourceError> {
    restrictions::check_stage(module.stage)?;
    let packed = pack::pack_uniforms(module, options.flatten_uniform_buffers)?;
    let buffers = Buffers::collect(module, &packed);
    let resources = Resources::collect(module)?;
    restrictions::check_limits(&buffers, &resources, options.target)?;

    let header = CodeHeader::build(module, &packed, &buffers, &resources);
    let code = writer::Writer::new(module, options, &buffers, &resources).write(&header)?;
    tracing::debug!(
        stage = module.stage.name(),
        target = options.target.name(),
        buffers = buffers.slots().len(),
        textures = resources.textures.len(),
        bytes = code.len(),
        "generated Metal"
    );
    Ok(code)
}

#[cfg(test)]
mod tests;
