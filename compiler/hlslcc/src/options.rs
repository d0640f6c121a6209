//! Compilation options.

use hlslcc_ir::ShaderStage;
use hlslcc_metal::{MetalOptions, MetalTarget};

/// What to compile and how.
///
/// ```
/// use hlslcc::{CompileOptions, MetalTarget, ShaderStage};
///
/// let options = CompileOptions::default()
///     .frequency(ShaderStage::Pixel)
///     .entry_point("MainPS")
///     .target(MetalTarget::Ios);
/// assert_eq!(options.entry_point, "MainPS");
/// ```
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct CompileOptions {
    pub frequency: ShaderStage,
    pub entry_point: String,
    /// Pack cbuffer members into the uniform arrays instead of binding each
    /// cbuffer as a buffer.
    pub flatten_uniform_buffers: bool,
    /// Run the IR optimizer before generating code.
    pub optimize: bool,
    pub target: MetalTarget,
    /// Name reported in diagnostics until a `#line` directive renames it.
    pub filename: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            frequency: ShaderStage::Vertex,
            entry_point: "Main".to_owned(),
            flatten_uniform_buffers: false,
            optimize: true,
            target: MetalTarget::MacOs,
            filename: "<source>".to_owned(),
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn frequency(mut self, frequency: ShaderStage) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub fn entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    #[must_use]
    pub fn flatten_uniform_buffers(mut self, flatten: bool) -> Self {
        self.flatten_uniform_buffers = flatten;
        self
    }

    #[must_use]
    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    #[must_use]
    pub fn target(mut self, target: MetalTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub(crate) fn metal(&self) -> MetalOptions {
        MetalOptions {
            flatten_uniform_buffers: self.flatten_uniform_buffers,
            target: self.target,
        }
    }
}
