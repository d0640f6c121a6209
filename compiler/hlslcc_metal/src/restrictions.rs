//! What Metal cannot run.

use hlslcc_diagnostic::{Diagnostic, ErrorCode, SourceError};
use hlslcc_ir::ShaderStage;

use crate::buffers::Buffers;
use crate::resources::Resources;
use crate::MetalTarget;

pub(crate) const MAX_BUFFERS: usize = 31;
pub(crate) const MAX_SAMPLERS: u32 = 16;

pub(crate) const fn max_textures(target: MetalTarget) -> u32 {
    match target {
        MetalTarget::MacOs => 128,
        MetalTarget::Ios => 31,
    }
}

fn restriction(code: ErrorCode, message: String) -> SourceError {
    Diagnostic::error(code).with_message(message).into_error()
}

/// Metal has no geometry or tessellation stage of the HLSL kind.
pub fn check_stage(stage: ShaderStage) -> Result<(), SourceError> {
    match stage {
        ShaderStage::Vertex | ShaderStage::Pixel | ShaderStage::Compute => Ok(()),
        stage @ (ShaderStage::Geometry | ShaderStage::Hull | ShaderStage::Domain) => Err(restriction(
            ErrorCode::E3005,
            format!("{} shaders are not supported by Metal", stage.name()),
        )),
    }
}

pub(crate) fn check_limits(
    buffers: &Buffers,
    resources: &Resources,
    target: MetalTarget,
) -> Result<(), SourceError> {
    let used = buffers.slots().len();
    if used > MAX_BUFFERS {
        return Err(restriction(
            ErrorCode::E3001,
            format!("too many buffers: {used} used, Metal allows {MAX_BUFFERS}"),
        ));
    }
    let used = resources.texture_slots();
    let limit = max_textures(target);
    if used > limit {
        return Err(restriction(
            ErrorCode::E3002,
            format!(
                "too many textures: {used} used, {} allows {limit}",
                target.name()
            ),
        ));
    }
    let used = resources.sampler_slots();
    if used > MAX_SAMPLERS {
        return Err(restriction(
            ErrorCode::E3003,
            format!("too many samplers: {used} used, Metal allows {MAX_SAMPLERS}"),
        ));
    }
    Ok(())
}
