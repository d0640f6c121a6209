//! HLSL to Metal Shading Language cross-compiler.
//!
//! # Pipeline
//!
//! ```text
//! HLSL text ─lex─▶ TokenStream ─parse─▶ TranslationUnit ─lower─▶ Module
//!     ─optimize─▶ Module ─generate─▶ MSL text with a `// @...` header
//! ```
//!
//! Every stage returns the first fatal error it meets; a failed compile
//! produces no code and a one-entry log (see [`CompileError::log`]).
//!
//! # Module Structure
//!
//! - `options`: [`CompileOptions`]
//! - `error`: [`CompileError`]
//! - `outputs`: [`remove_unused_outputs`], which rewrites HLSL source
//! - `commands`: handlers behind the `hlslcc` binary

pub mod commands;
mod error;
mod options;
mod outputs;

use rayon::prelude::*;

pub use error::CompileError;
pub use hlslcc_ir::ShaderStage;
pub use hlslcc_metal::{CodeHeader, HeaderError, MetalTarget, ShaderBindings};
pub use options::CompileOptions;
pub use outputs::{remove_unused_outputs, OutputsError, StrippedOutputs};

/// Compile one shader to MSL.
pub fn cross_compile(source: &str, options: &CompileOptions) -> Result<String, CompileError> {
    hlslcc_metal::check_stage(options.frequency)?;
    let stream = hlslcc_lexer::lex(source, &options.filename);
    for anomaly in &stream.anomalies {
        tracing::warn!(
            character = %anomaly.character,
            line = anomaly.loc.line,
            "skipped unrecognized character"
        );
    }
    let unit = hlslcc_parse::parse(&stream)?;
    let mut module = hlslcc_lower::lower(&unit, &options.entry_point, options.frequency)?;
    if options.optimize {
        hlslcc_opt::optimize_ir(&mut module);
    }
    let code = hlslcc_metal::generate(&mut module, options.metal())?;
    tracing::debug!(
        filename = %options.filename,
        entry = %options.entry_point,
        stage = options.frequency.name(),
        "compiled"
    );
    Ok(code)
}

/// Compile several shaders in parallel. Results keep the order of `jobs`.
pub fn compile_many<S>(jobs: &[(S, CompileOptions)]) -> Vec<Result<String, CompileError>>
where
    S: AsRef<str> + Sync,
{
    jobs.par_iter()
        .map(|(source, options)| cross_compile(source.as_ref(), options))
        .collect()
}

#[cfg(test)]
mod tests;
