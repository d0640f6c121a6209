//! Texture slots and sampler pairing.
//!
//! Textures take slots in declaration order. Every texture operation pairs
//! its texture with the sampler state it uses. A texture sampled with one
//! sampler state only gets a sampler of its own at its own slot, declared
//! just before it as `sN`. Sampler states used with a texture that has
//! several take the lowest sampler slots left and are passed under their
//! own name.

use hlslcc_diagnostic::{Diagnostic, ErrorCode, SourceError};
use hlslcc_ir::visit::walk_instructions;
use hlslcc_ir::{Instruction, Module, RvalueKind, TextureOpKind, Type, VarId, VarMode};
use hlslcc_syntax::TextureKind;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Clone, Debug)]
pub struct TextureBinding {
    pub var: VarId,
    pub kind: TextureKind,
    pub slot: u32,
    /// Sampler states used with this texture, in first-use order.
    pub samplers: Vec<VarId>,
    /// Sampled with a comparison, so declared as a depth texture.
    pub compare: bool,
    pub writable: bool,
}

impl TextureBinding {
    /// Slot of the texture's own sampler, when it has one.
    pub fn inline_sampler(&self) -> Option<u32> {
        (self.samplers.len() == 1).then_some(self.slot)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SamplerBinding {
    pub var: VarId,
    pub slot: u32,
}

#[derive(Clone, Debug, Default)]
pub struct Resources {
    pub textures: Vec<TextureBinding>,
    /// Sampler states passed under their own name.
    pub samplers: Vec<SamplerBinding>,
}

impl Resources {
    pub(crate) fn collect(module: &Module) -> Result<Resources, SourceError> {
        let mut pairs: FxHashMap<VarId, Vec<VarId>> = FxHashMap::default();
        let mut compared = FxHashSet::default();
        if let Some(entry) = module.entry_function() {
            walk_instructions(&entry.body, &mut |instr| {
                instr.for_each_read(&mut |value| {
                    value.walk(&mut |r| {
                        let RvalueKind::Texture(op) = &r.kind else {
                            return;
                        };
                        let Some(texture) = op.texture.root_var() else {
                            return;
                        };
                        if matches!(
                            op.kind,
                            TextureOpKind::SampleCompare(_) | TextureOpKind::SampleCompareLevelZero(_)
                        ) {
                            compared.insert(texture);
                        }
                        if let Some(sampler) = op.sampler.as_ref().and_then(|s| s.root_var()) {
                            let list = pairs.entry(texture).or_default();
                            if !list.contains(&sampler) {
                                list.push(sampler);
                            }
                        }
                    });
                });
            });
        }

        let mut resources = Resources::default();
        let mut slot = 0u32;
        for &var in &module.globals {
            let variable = &module[var];
            if variable.mode != VarMode::Uniform {
                continue;
            }
            match module.types.get(variable.ty) {
                Type::Texture(texture) => {
                    resources.textures.push(TextureBinding {
                        var,
                        kind: texture.kind,
                        slot,
                        samplers: pairs.remove(&var).unwrap_or_default(),
                        compare: compared.contains(&var),
                        writable: texture.kind.is_writable(),
                    });
                    slot += 1;
                }
                Type::Array { .. } if module.types.is_opaque(variable.ty) => {
                    return Err(Diagnostic::error(ErrorCode::E2008)
                        .with_message(format!(
                            "arrays of textures or samplers are not supported: '{}'",
                            variable.name
                        ))
                        .into_error());
                }
                _ => {}
            }
        }

        let inline: FxHashSet<u32> = resources
            .textures
            .iter()
            .filter_map(TextureBinding::inline_sampler)
            .collect();
        let mut shared = Vec::new();
        for texture in &resources.textures {
            if texture.samplers.len() > 1 {
                for &sampler in &texture.samplers {
                    if !shared.contains(&sampler) {
                        shared.push(sampler);
                    }
                }
            }
        }
        let mut next = 0u32;
        for var in shared {
            while inline.contains(&next) {
                next += 1;
            }
            resources.samplers.push(SamplerBinding { var, slot: next });
            next += 1;
        }

        tracing::debug!(
            textures = resources.textures.len(),
            inline = inline.len(),
            shared = resources.samplers.len(),
            "bound textures and samplers"
        );
        Ok(resources)
    }

    pub fn texture(&self, var: VarId) -> Option<&TextureBinding> {
        self.textures.iter().find(|t| t.var == var)
    }

    /// Sampler slots used: one past the highest.
    pub fn sampler_slots(&self) -> u32 {
        let inline = self.textures.iter().filter_map(TextureBinding::inline_sampler);
        let shared = self.samplers.iter().map(|s| s.slot);
        inline.chain(shared).map(|s| s + 1).max().unwrap_or(0)
    }

    /// Texture slots used: one past the highest.
    pub fn texture_slots(&self) -> u32 {
        self.textures.iter().map(|t| t.slot + 1).max().unwrap_or(0)
    }
}
