#![allow(clippy::unwrap_used, clippy::expect_used)]

use hlslcc_diagnostic::ErrorCode;
use pretty_assertions::assert_eq;

use super::*;

const PIXEL: &str = "float4 Tint;\n\
    float4 MainPS(float2 UV : TEXCOORD0) : SV_Target0\n\
    {\n\
        return float4(UV, 0.0, 1.0) * Tint;\n\
    }";

fn pixel_options() -> CompileOptions {
    CompileOptions::default()
        .frequency(ShaderStage::Pixel)
        .entry_point("MainPS")
        .filename("test.usf")
}

// ── Options ──

#[test]
fn default_options() {
    let options = CompileOptions::default();
    assert_eq!(options.frequency, ShaderStage::Vertex);
    assert_eq!(options.entry_point, "Main");
    assert!(!options.flatten_uniform_buffers);
    assert!(options.optimize);
    assert_eq!(options.target, MetalTarget::MacOs);
}

#[test]
fn builder_sets_every_field() {
    let options = CompileOptions::default()
        .frequency(ShaderStage::Compute)
        .entry_point("MainCS")
        .flatten_uniform_buffers(true)
        .optimize(false)
        .target(MetalTarget::Ios)
        .filename("Compute.usf");
    assert_eq!(
        options,
        CompileOptions {
            frequency: ShaderStage::Compute,
            entry_point: "MainCS".to_owned(),
            flatten_uniform_buffers: true,
            optimize: false,
            target: MetalTarget::Ios,
            filename: "Compute.usf".to_owned(),
        }
    );
}

#[test]
fn command_line_options_map_onto_the_builder() {
    let mut options = CompileOptions::default();
    for arg in ["--stage=pixel", "--entry=MainPS", "--target=ios", "--flatten-ub", "--no-opt"] {
        options = commands::parse_compile_option(options, arg).unwrap();
    }
    assert_eq!(options.frequency, ShaderStage::Pixel);
    assert_eq!(options.entry_point, "MainPS");
    assert_eq!(options.target, MetalTarget::Ios);
    assert!(options.flatten_uniform_buffers);
    assert!(!options.optimize);

    let err = commands::parse_compile_option(CompileOptions::default(), "--stage=tess").unwrap_err();
    assert_eq!(err, "unknown stage 'tess'");
    assert!(commands::parse_compile_option(CompileOptions::default(), "--fast").is_err());
}

// ── Compilation ──

#[test]
fn compiles_a_pixel_shader() {
    let code = cross_compile(PIXEL, &pixel_options()).unwrap();
    assert!(code.starts_with("// Compiled by HLSLCC"));
    assert!(code.contains("// @Inputs: f2:var_TEXCOORD0\n"));
    assert!(code.contains("// @Outputs: f4:out_Target0\n"));
    assert!(code.contains("fragment Main_Out Main("));
}

#[test]
fn unoptimized_output_still_compiles() {
    let code = cross_compile(PIXEL, &pixel_options().optimize(false)).unwrap();
    assert!(code.contains("fragment Main_Out Main("));
}

#[test]
fn syntax_errors_are_source_errors() {
    let err = cross_compile("float4 MainPS() : SV_Target0 { return 1.0 }", &pixel_options()).unwrap_err();
    assert!(matches!(err, CompileError::Source(_)), "{err:?}");
    assert!(err.code().is_parser_error());
    let log = err.log();
    assert!(log.starts_with("test.usf(1): error E1"), "{log}");
    assert!(log.ends_with('\n'));
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn missing_entry_point() {
    let options = pixel_options().entry_point("Missing");
    let err = cross_compile(PIXEL, &options).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E2005);
}

#[test]
fn unsupported_stage_is_a_restriction() {
    let options = pixel_options().frequency(ShaderStage::Geometry);
    let err = cross_compile(PIXEL, &options).unwrap_err();
    assert!(matches!(err, CompileError::Restriction(_)), "{err:?}");
    assert_eq!(err.code(), ErrorCode::E3005);
}

#[test]
fn internal_codes_classify_as_internal() {
    let err = CompileError::from(hlslcc_diagnostic::internal_error(ErrorCode::E9002, "broken"));
    assert!(matches!(err, CompileError::Internal(_)));
    assert_eq!(err.source_error().message(), "broken");
}

#[test]
fn compile_many_keeps_job_order() {
    let jobs = vec![
        (PIXEL, pixel_options()),
        ("float4 MainPS( : SV_Target0 {}", pixel_options()),
        (PIXEL, pixel_options().target(MetalTarget::Ios)),
    ];
    let results = compile_many(&jobs);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert_eq!(results[0], results[2]);
}

// ── Unused outputs ──

const OUT_PARAMS: &str = "void MainVS(in float4 P : ATTRIBUTE0, out float4 Pos : SV_POSITION, out float2 UV : TEXCOORD0)\n\
    {\n\
        Pos = P;\n\
        UV = P.xy;\n\
    }\n";

#[test]
fn nothing_to_remove() {
    let stripped = remove_unused_outputs(OUT_PARAMS, &["SV_POSITION"], &["TEXCOORD0"], "MainVS").unwrap();
    assert_eq!(stripped, None);
}

#[test]
fn semantics_compare_ignoring_case() {
    let stripped = remove_unused_outputs(OUT_PARAMS, &["SV_Position"], &["texcoord0"], "MainVS").unwrap();
    assert_eq!(stripped, None);
}

#[test]
fn unused_out_parameter_becomes_a_local() {
    let stripped = remove_unused_outputs(OUT_PARAMS, &["SV_POSITION"], &[], "MainVS")
        .unwrap()
        .unwrap();
    assert_eq!(stripped.entry_point, "MainVS__OPTIMIZED");
    assert_eq!(stripped.removed, vec!["TEXCOORD0".to_owned()]);
    assert!(stripped.source.starts_with(OUT_PARAMS));
    assert!(stripped.source.ends_with(
        "// Removed Outputs: TEXCOORD0\n\
         void MainVS__OPTIMIZED(in float4 P : ATTRIBUTE0, out float4 Pos : SV_POSITION)\n\
         {\n\
         \tfloat2 UV;\n\
         \tMainVS(P, Pos, UV);\n\
         }\n"
    ));
}

#[test]
fn unused_return_value_turns_void() {
    let stripped = remove_unused_outputs(PIXEL, &[], &[], "MainPS").unwrap().unwrap();
    assert_eq!(stripped.removed, vec!["SV_Target0".to_owned()]);
    assert!(stripped
        .source
        .contains("void MainPS__OPTIMIZED(float2 UV : TEXCOORD0)\n{\n\tMainPS(UV);\n}\n"));
}

#[test]
fn unknown_entry_point() {
    let err = remove_unused_outputs(OUT_PARAMS, &[], &[], "MainPS").unwrap_err();
    assert_eq!(err, OutputsError::EntryNotFound("MainPS".to_owned()));
}

#[test]
fn outputs_need_semantics() {
    let err = remove_unused_outputs("void MainVS(out float4 Pos) { Pos = 0; }", &[], &[], "MainVS").unwrap_err();
    assert!(matches!(err, OutputsError::Unsupported { .. }), "{err:?}");
}

#[test]
fn unparsable_source() {
    let err = remove_unused_outputs("void MainVS(", &[], &[], "MainVS").unwrap_err();
    assert!(matches!(err, OutputsError::Parse(_)));
}
