//! Handlers behind the `hlslcc` binary.
//!
//! Each handler reports failures on stderr and exits with status 1, the way
//! a compiler driver does; the library functions they call never exit.

use std::path::Path;
use std::sync::Once;

use hlslcc_syntax::ast::TopLevel;

use crate::{cross_compile, remove_unused_outputs, CodeHeader, CompileOptions, MetalTarget, ShaderStage};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber when `RUST_LOG` is set, for example
/// `RUST_LOG=hlslcc_opt=debug`. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

fn fail(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => fail(&format!("cannot read '{path}': {e}")),
    }
}

fn write_output(path: Option<&str>, text: &str) {
    match path {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                fail(&format!("cannot write '{path}': {e}"));
            }
        }
        None => print!("{text}"),
    }
}

// ── compile ──

/// `--stage=`, `--entry=`, `--target=` and friends, with the file and `-o`
/// handled by the caller.
pub fn parse_compile_option(options: CompileOptions, arg: &str) -> Result<CompileOptions, String> {
    if let Some(entry) = arg.strip_prefix("--entry=") {
        return Ok(options.entry_point(entry));
    }
    if let Some(stage) = arg.strip_prefix("--stage=") {
        let stage = match stage {
            "vertex" | "vs" => ShaderStage::Vertex,
            "pixel" | "fragment" | "ps" => ShaderStage::Pixel,
            "compute" | "cs" => ShaderStage::Compute,
            "geometry" | "gs" => ShaderStage::Geometry,
            "hull" | "hs" => ShaderStage::Hull,
            "domain" | "ds" => ShaderStage::Domain,
            other => return Err(format!("unknown stage '{other}'")),
        };
        return Ok(options.frequency(stage));
    }
    if let Some(target) = arg.strip_prefix("--target=") {
        let target = match target {
            "macos" => MetalTarget::MacOs,
            "ios" => MetalTarget::Ios,
            other => return Err(format!("unknown target '{other}'")),
        };
        return Ok(options.target(target));
    }
    match arg {
        "--flatten-ub" => Ok(options.flatten_uniform_buffers(true)),
        "--no-opt" => Ok(options.optimize(false)),
        other => Err(format!("unknown option '{other}'")),
    }
}

pub fn compile_file(args: &[String]) {
    let mut options = CompileOptions::default();
    let mut file = None;
    let mut output = None;
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if arg == "-o" && i + 1 < args.len() {
            output = Some(args[i + 1].as_str());
            i += 2;
            continue;
        }
        if arg.starts_with('-') {
            options = parse_compile_option(options, arg).unwrap_or_else(|e| fail(&e));
        } else if file.is_none() {
            file = Some(arg);
        }
        i += 1;
    }
    let Some(path) = file else {
        fail("missing input file");
    };
    let options = options.filename(path);
    let source = read_file(path);
    match cross_compile(&source, &options) {
        Ok(code) => write_output(output, &code),
        Err(e) => {
            eprint!("{}", e.log());
            std::process::exit(1);
        }
    }
}

// ── inspection ──

pub fn lex_file(path: &str) {
    let source = read_file(path);
    let stream = hlslcc_lexer::lex(&source, path);
    println!("Tokens for '{path}' ({} tokens):", stream.len());
    for token in &stream.tokens {
        println!("  {:>4}  {}", token.loc.line, stream.text_of(token.kind));
    }
    for anomaly in &stream.anomalies {
        println!("  skipped {:?} on line {}", anomaly.character, anomaly.loc.line);
    }
}

pub fn parse_file(path: &str) {
    let source = read_file(path);
    let stream = hlslcc_lexer::lex(&source, path);
    let unit = match hlslcc_parse::parse(&stream) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let (mut functions, mut declarations, mut cbuffers) = (Vec::new(), 0, Vec::new());
    for item in &unit.declarations {
        match item {
            TopLevel::Function(f) => functions.push(unit.names.resolve(f.prototype.name)),
            TopLevel::Declaration(_) => declarations += 1,
            TopLevel::CBuffer(c) => cbuffers.push(unit.names.resolve(c.name)),
        }
    }
    println!("Parse result for '{path}':");
    println!("  Declarations: {declarations}");
    println!("  CBuffers: {}", cbuffers.join(", "));
    println!("  Functions: {}", functions.join(", "));
}

// ── strip-outputs ──

pub fn strip_outputs(args: &[String]) {
    let mut file = None;
    let mut entry = None;
    let mut used: Vec<String> = Vec::new();
    let mut system: Vec<String> = vec!["SV_POSITION".to_owned()];
    for arg in args {
        if let Some(value) = arg.strip_prefix("--entry=") {
            entry = Some(value);
        } else if let Some(value) = arg.strip_prefix("--used=") {
            used = split_list(value);
        } else if let Some(value) = arg.strip_prefix("--system=") {
            system = split_list(value);
        } else if arg.starts_with('-') {
            fail(&format!("unknown option '{arg}'"));
        } else if file.is_none() {
            file = Some(arg.as_str());
        }
    }
    let (Some(path), Some(entry)) = (file, entry) else {
        fail("usage: hlslcc strip-outputs <file> --entry=E --used=A,B [--system=X,Y]");
    };
    let source = read_file(path);
    let used: Vec<&str> = used.iter().map(String::as_str).collect();
    let system: Vec<&str> = system.iter().map(String::as_str).collect();
    match remove_unused_outputs(&source, &system, &used, entry) {
        Ok(Some(stripped)) => {
            eprintln!("entry point: {}", stripped.entry_point);
            print!("{}", stripped.source);
        }
        Ok(None) => eprintln!("every output of '{entry}' is used"),
        Err(e) => fail(&e.to_string()),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

// ── bindings ──

pub fn show_bindings(path: &str) {
    let code = read_file(path);
    let header = match CodeHeader::parse(&code) {
        Ok(header) => header,
        Err(e) => fail(&e.to_string()),
    };
    let bindings = header.bindings();
    let name = Path::new(path)
        .file_name()
        .map_or_else(|| path.to_owned(), |n| n.to_string_lossy().into_owned());
    println!("Bindings for '{name}':");
    println!("  Attribute mask: {:#x}", bindings.attribute_mask);
    println!("  Render target mask: {:#x}", bindings.render_target_mask);
    println!("  Writes depth: {}", bindings.writes_depth);
    println!("  Uniform buffers: {}", bindings.uniform_buffer_count);
    for (array_type, size) in &bindings.packed_global_array_sizes {
        println!("  Packed array {array_type}: {size} floats");
    }
    for copy in &bindings.packed_ub_copies {
        println!(
            "  Copy UB {} @{} -> {} @{} ({} floats)",
            copy.source_ub, copy.source_offset, copy.dest_array_type, copy.dest_offset, copy.size
        );
    }
    println!("  Samplers: {}", bindings.sampler_count);
    for sampler in &bindings.samplers {
        println!(
            "    {} @{} [{}]",
            sampler.name,
            sampler.offset,
            sampler.sampler_states.join(", ")
        );
    }
    for uav in &bindings.uavs {
        println!("  UAV {} @{}", uav.name, uav.offset);
    }
    if let Some([x, y, z]) = bindings.num_threads {
        println!("  Threads per group: {x}x{y}x{z}");
    }
}
