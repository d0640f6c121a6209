// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end scenarios through the public driver API.
//!
//! Each test starts from HLSL text and checks what a runtime or a build
//! tool would look at: tokens, generated MSL, the binding header, or the
//! rewritten source.

use hlslcc::{cross_compile, remove_unused_outputs, CodeHeader, CompileOptions, ShaderStage};
use pretty_assertions::assert_eq;

#[test]
fn tokens_of_a_declaration_and_assignment() {
    let stream = hlslcc_lexer::lex("float4 x; x = 1.0;", "scenario.usf");
    assert_eq!(stream.len(), 7);
    assert_eq!(stream.render(), "float4 x ; x = 1.0 ;");
    assert!(stream.anomalies.is_empty());
}

#[test]
fn cbuffer_member_read_by_a_pixel_shader() {
    let source = "cbuffer MyCB { float4 Color; };\n\
        float4 MainPS() : SV_Target0\n\
        {\n\
            return Color;\n\
        }\n";
    let options = CompileOptions::default()
        .frequency(ShaderStage::Pixel)
        .entry_point("MainPS");
    let code = cross_compile(source, &options).unwrap();
    assert!(code.contains("// @UniformBlocks: MyCB(0)\n"), "{code}");
    assert!(code.contains("constant MyCB& MyCB [[ buffer(0) ]]"), "{code}");

    let bindings = CodeHeader::parse(&code).unwrap().bindings();
    assert_eq!(bindings.uniform_buffer_count, 1);
    assert_eq!(bindings.render_target_mask, 1);
}

const VERTEX: &str = "struct VSOut\n\
    {\n\
    \tfloat4 Position : SV_POSITION;\n\
    \tfloat2 UV0 : TEXCOORD0;\n\
    \tfloat2 UV1 : TEXCOORD1;\n\
    };\n\
    \n\
    VSOut MainVS(float4 InPosition : ATTRIBUTE0)\n\
    {\n\
    \tVSOut Out;\n\
    \tOut.Position = InPosition;\n\
    \tOut.UV0 = InPosition.xy;\n\
    \tOut.UV1 = InPosition.zw;\n\
    \treturn Out;\n\
    }\n";

#[test]
fn unused_vertex_output_is_stripped_then_compiled() {
    let stripped = remove_unused_outputs(VERTEX, &["SV_POSITION"], &["TEXCOORD0"], "MainVS")
        .unwrap()
        .expect("TEXCOORD1 is unused");
    assert_eq!(stripped.entry_point, "MainVS__OPTIMIZED");
    assert_eq!(stripped.removed, vec!["TEXCOORD1".to_owned()]);
    assert_eq!(
        &stripped.source[VERTEX.len()..],
        "\n\
         struct VSOut__OPTIMIZED\n\
         {\n\
         \tfloat4 Position : SV_POSITION;\n\
         \tfloat2 UV0 : TEXCOORD0;\n\
         };\n\
         \n\
         // Removed Outputs: TEXCOORD1\n\
         VSOut__OPTIMIZED MainVS__OPTIMIZED(float4 InPosition : ATTRIBUTE0)\n\
         {\n\
         \tVSOut __original = MainVS(InPosition);\n\
         \tVSOut__OPTIMIZED __result;\n\
         \t__result.Position = __original.Position;\n\
         \t__result.UV0 = __original.UV0;\n\
         \treturn __result;\n\
         }\n"
    );

    let options = CompileOptions::default()
        .frequency(ShaderStage::Vertex)
        .entry_point(stripped.entry_point.as_str());
    let code = cross_compile(&stripped.source, &options).unwrap();
    assert!(code.contains("gl_Position [[ position ]]"), "{code}");
    assert!(code.contains("var_TEXCOORD0 [[ user(TEXCOORD0) ]]"), "{code}");
    assert!(!code.contains("TEXCOORD1"), "{code}");

    let bindings = CodeHeader::parse(&code).unwrap().bindings();
    assert_eq!(bindings.attribute_mask, 1);
}

#[test]
fn original_entry_still_compiles_next_to_the_wrapper() {
    let stripped = remove_unused_outputs(VERTEX, &["SV_POSITION"], &[], "MainVS")
        .unwrap()
        .unwrap();
    assert_eq!(stripped.removed, vec!["TEXCOORD0".to_owned(), "TEXCOORD1".to_owned()]);
    let options = CompileOptions::default().entry_point("MainVS");
    let code = cross_compile(&stripped.source, &options).unwrap();
    assert!(code.contains("var_TEXCOORD1"), "{code}");
}
