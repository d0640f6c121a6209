#![allow(clippy::unwrap_used, clippy::expect_used)]

use hlslcc_ir::visit::walk_instructions;
use hlslcc_ir::{RvalueKind, Type};
use pretty_assertions::assert_eq;

use super::*;

fn lower_source(source: &str, entry: &str, stage: ShaderStage) -> Result<Module, SourceError> {
    let stream = hlslcc_lexer::lex(source, "test.usf");
    let unit = hlslcc_parse::parse(&stream)?;
    lower(&unit, entry, stage)
}

fn lower_ok(source: &str, entry: &str, stage: ShaderStage) -> Module {
    match lower_source(source, entry, stage) {
        Ok(module) => module,
        Err(e) => panic!("lowering failed: {e}"),
    }
}

fn lower_err(source: &str, entry: &str, stage: ShaderStage) -> ErrorCode {
    match lower_source(source, entry, stage) {
        Ok(_) => panic!("expected a lowering error for {source:?}"),
        Err(e) => e.code(),
    }
}

fn main_body(module: &Module) -> &[Instruction] {
    &module.entry_function().expect("entry function").body
}

/// Field names and attributes of a stage struct.
fn stage_fields(module: &Module, ty: TypeId) -> Vec<(String, String)> {
    module
        .types
        .struct_type(ty)
        .expect("stage struct")
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.semantic.clone().unwrap_or_default()))
        .collect()
}

fn count(body: &[Instruction], pred: impl Fn(&Instruction) -> bool) -> usize {
    let mut n = 0;
    walk_instructions(body, &mut |i| {
        if pred(i) {
            n += 1;
        }
    });
    n
}

// ── Entry interface ──

#[test]
fn vertex_stage_structs() {
    let module = lower_ok(
        "struct VIn { float3 Pos : ATTRIBUTE0; float2 UV : ATTRIBUTE1; };\n\
         struct VOut { float4 Pos : SV_Position; float2 UV : TEXCOORD0; };\n\
         VOut MainVS(VIn i) { VOut o; o.Pos = float4(i.Pos, 1.0); o.UV = i.UV; return o; }",
        "MainVS",
        ShaderStage::Vertex,
    );
    let stage_in = module.interface.stage_in.expect("stage-in");
    assert_eq!(
        stage_fields(&module, module[stage_in].ty),
        vec![
            ("in_ATTRIBUTE0".to_owned(), "attribute(0)".to_owned()),
            ("in_ATTRIBUTE1".to_owned(), "attribute(1)".to_owned()),
        ]
    );
    let main = module.entry_function().unwrap();
    assert_eq!(main.name, "Main");
    assert!(main.params.is_empty());
    assert_eq!(
        stage_fields(&module, main.return_type),
        vec![
            ("gl_Position".to_owned(), "position".to_owned()),
            ("var_TEXCOORD0".to_owned(), "user(TEXCOORD0)".to_owned()),
        ]
    );
}

#[test]
fn vertex_inputs_without_attribute_semantics_get_free_slots() {
    let module = lower_ok(
        "float4 MainVS(float4 a : POSITION, float4 b : ATTRIBUTE0) : SV_Position { return a + b; }",
        "MainVS",
        ShaderStage::Vertex,
    );
    let stage_in = module.interface.stage_in.unwrap();
    assert_eq!(
        stage_fields(&module, module[stage_in].ty),
        vec![
            ("in_ATTRIBUTE1".to_owned(), "attribute(1)".to_owned()),
            ("in_ATTRIBUTE0".to_owned(), "attribute(0)".to_owned()),
        ]
    );
}

#[test]
fn pixel_outputs_map_to_color_and_depth() {
    let module = lower_ok(
        "void MainPS(float4 Pos : SV_Position, out float4 C0 : SV_Target0, \
         out float4 C1 : SV_Target1, out float D : SV_Depth) \
         { C0 = Pos; C1 = 1; D = 0.5; }",
        "MainPS",
        ShaderStage::Pixel,
    );
    let main = module.entry_function().unwrap();
    assert_eq!(
        stage_fields(&module, main.return_type),
        vec![
            ("out_Target0".to_owned(), "color(0)".to_owned()),
            ("out_Target1".to_owned(), "color(1)".to_owned()),
            ("FragDepth".to_owned(), "depth(any)".to_owned()),
        ]
    );
    let stage_in = module.interface.stage_in.unwrap();
    assert_eq!(
        stage_fields(&module, module[stage_in].ty),
        vec![("gl_FragCoord".to_owned(), "position".to_owned())]
    );
}

#[test]
fn front_facing_is_a_system_value() {
    let module = lower_ok(
        "float4 MainPS(bool Front : SV_IsFrontFace) : SV_Target0 { return Front ? 1 : 0; }",
        "MainPS",
        ShaderStage::Pixel,
    );
    assert!(module.interface.stage_in.is_none());
    let [var] = module.interface.system_values[..] else {
        panic!("expected one system value");
    };
    assert_eq!(module[var].name, "gl_FrontFacing");
    assert_eq!(module[var].semantic.as_deref(), Some("front_facing"));
}

#[test]
fn compute_system_values_and_numthreads() {
    let module = lower_ok(
        "RWTexture2D<float4> Out;\n\
         [numthreads(8, 4, 1)] void MainCS(uint3 Id : SV_DispatchThreadID, uint Index : SV_GroupIndex)\n\
         { Out[Id.xy] = float4(Index, 0, 0, 1); }",
        "MainCS",
        ShaderStage::Compute,
    );
    assert_eq!(module.numthreads, Some([8, 4, 1]));
    let attributes: Vec<_> = module
        .interface
        .system_values
        .iter()
        .map(|&v| module[v].semantic.clone().unwrap())
        .collect();
    assert_eq!(
        attributes,
        vec!["thread_position_in_grid", "thread_index_in_threadgroup"]
    );
    assert_eq!(
        count(main_body(&module), |i| matches!(i, Instruction::TextureStore { .. })),
        1
    );
}

#[test]
fn entry_errors() {
    assert_eq!(
        lower_err("float4 F() : SV_Target0 { return 0; }", "Missing", ShaderStage::Pixel),
        ErrorCode::E2005
    );
    assert_eq!(
        lower_err("float4 F(float4 x) : SV_Target0 { return x; }", "F", ShaderStage::Pixel),
        ErrorCode::E2012
    );
    assert_eq!(
        lower_err(
            "void F(out float4 a : SV_Target0, out float4 b : SV_Target0) { a = 0; b = 1; }",
            "F",
            ShaderStage::Pixel
        ),
        ErrorCode::E2012
    );
    assert_eq!(
        lower_err("[numthreads(1,1,1)] float4 F() : SV_Target0 { return 0; }", "F", ShaderStage::Compute),
        ErrorCode::E2012
    );
}

#[test]
fn uniform_entry_parameter_becomes_global() {
    let module = lower_ok(
        "float4 MainPS(uniform float4 Tint, float4 C : TEXCOORD0) : SV_Target0 { return C * Tint; }",
        "MainPS",
        ShaderStage::Pixel,
    );
    let tint = module
        .globals
        .iter()
        .copied()
        .find(|&v| module[v].name == "Tint")
        .expect("Tint global");
    assert_eq!(module[tint].mode, VarMode::Uniform);
}

// ── Globals ──

#[test]
fn cbuffer_members_form_a_uniform_block() {
    let module = lower_ok(
        "cbuffer View : register(b2) { float4x4 ViewProj; float3 Eye; };\n\
         float4 MainVS(float4 P : ATTRIBUTE0) : SV_Position { return mul(P, ViewProj) + Eye.x; }",
        "MainVS",
        ShaderStage::Vertex,
    );
    let [block] = &module.uniform_blocks[..] else {
        panic!("expected one uniform block");
    };
    assert_eq!(block.name, "View");
    assert_eq!(block.register, Some(2));
    let names: Vec<_> = block.members.iter().map(|&v| module[v].name.as_str()).collect();
    assert_eq!(names, vec!["ViewProj", "Eye"]);
    assert!(block.members.iter().all(|&v| module[v].block == Some(0)));
}

#[test]
fn static_globals_are_initialized_in_main() {
    let module = lower_ok(
        "static float Scale = 2.0;\n\
         float4 MainPS() : SV_Target0 { return Scale; }",
        "MainPS",
        ShaderStage::Pixel,
    );
    let scale = module
        .globals
        .iter()
        .copied()
        .find(|&v| module[v].name == "Scale")
        .unwrap();
    assert_eq!(module[scale].mode, VarMode::Auto);
    let Some(Instruction::Assign(first)) = main_body(&module).first() else {
        panic!("expected the static initializer first");
    };
    assert_eq!(first.lhs.as_var(), Some(scale));
}

#[test]
fn byte_address_buffer_is_a_uint_buffer() {
    let module = lower_ok(
        "ByteAddressBuffer Data;\n\
         [numthreads(1,1,1)] void MainCS(uint3 Id : SV_DispatchThreadID) { uint v = Data.Load(Id.x * 4); }",
        "MainCS",
        ShaderStage::Compute,
    );
    let data = module.globals.iter().copied().find(|&v| module[v].name == "Data").unwrap();
    assert_eq!(
        *module.types.get(module[data].ty),
        Type::Buffer {
            element: TypeId::UINT,
            writable: false
        }
    );
}

// ── Inlining ──

#[test]
fn helpers_are_inlined_into_main() {
    let module = lower_ok(
        "float Square(float x) { return x * x; }\n\
         void Twice(inout float v) { v = v * 2; }\n\
         float4 MainPS(float4 C : TEXCOORD0) : SV_Target0 { float s = Square(C.x); Twice(s); return s; }",
        "MainPS",
        ShaderStage::Pixel,
    );
    let body = main_body(&module);
    assert_eq!(count(body, |i| matches!(i, Instruction::Call { .. })), 0);
    // Straight-line helpers need no return wrapper.
    assert_eq!(count(body, |i| matches!(i, Instruction::Loop { .. })), 0);
}

#[test]
fn early_return_uses_a_wrapper_loop() {
    let module = lower_ok(
        "float Pick(float x) { if (x > 0) { return 1; } for (int i = 0; i < 4; i++) { if (x < i) return 2; } return 3; }\n\
         float4 MainPS(float4 C : TEXCOORD0) : SV_Target0 { return Pick(C.x); }",
        "MainPS",
        ShaderStage::Pixel,
    );
    let body = main_body(&module);
    assert_eq!(count(body, |i| matches!(i, Instruction::Call { .. })), 0);
    // The wrapper plus the user's for loop.
    assert_eq!(count(body, |i| matches!(i, Instruction::Loop { .. })), 2);
    let returned = module
        .variables
        .iter()
        .filter(|v| v.name == "returned")
        .count();
    assert_eq!(returned, 1);
}

#[test]
fn recursion_is_rejected() {
    assert_eq!(
        lower_err(
            "float F(float x) { return F(x); }\n\
             float4 MainPS(float4 C : TEXCOORD0) : SV_Target0 { return F(C.x); }",
            "MainPS",
            ShaderStage::Pixel
        ),
        ErrorCode::E2014
    );
}

// ── Expressions ──

#[test]
fn unknown_identifier_is_reported() {
    assert_eq!(
        lower_err("float4 MainPS() : SV_Target0 { return Missing; }", "MainPS", ShaderStage::Pixel),
        ErrorCode::E2001
    );
}

#[test]
fn bad_swizzle_is_reported() {
    assert_eq!(
        lower_err(
            "float4 MainPS(float2 C : TEXCOORD0) : SV_Target0 { return C.xyz.x; }",
            "MainPS",
            ShaderStage::Pixel
        ),
        ErrorCode::E2003
    );
}

#[test]
fn unknown_struct_field_is_reported() {
    assert_eq!(
        lower_err(
            "struct S { float4 A; };\n\
             float4 MainPS(float4 C : TEXCOORD0) : SV_Target0 { S s; s.A = C; return s.B; }",
            "MainPS",
            ShaderStage::Pixel
        ),
        ErrorCode::E2007
    );
}

#[test]
fn constant_constructor_is_folded() {
    let module = lower_ok(
        "float4 MainPS() : SV_Target0 { return float4(1, 2, 3, 4); }",
        "MainPS",
        ShaderStage::Pixel,
    );
    let mut folded = false;
    walk_instructions(main_body(&module), &mut |i| {
        if let Instruction::Assign(a) = i {
            if let RvalueKind::Constant(values) = &a.rhs.kind {
                folded |= values.len() == 4;
            }
        }
    });
    assert!(folded);
}

#[test]
fn switch_lowers_case_labels() {
    let module = lower_ok(
        "float4 MainPS(int K : TEXCOORD0) : SV_Target0 {\n\
           float r = 0;\n\
           switch (K) { case 0: r = 1; break; case 1: case 2: r = 2; break; default: r = 3; }\n\
           return r; }",
        "MainPS",
        ShaderStage::Pixel,
    );
    let mut labels = Vec::new();
    walk_instructions(main_body(&module), &mut |i| {
        if let Instruction::Switch { cases, .. } = i {
            labels.extend(cases.iter().map(|c| c.labels.len()));
        }
    });
    assert_eq!(labels, vec![1, 2, 1]);
}

#[test]
fn continue_outside_loop_is_an_error() {
    assert_eq!(
        lower_err("float4 MainPS() : SV_Target0 { continue; return 0; }", "MainPS", ShaderStage::Pixel),
        ErrorCode::E2008
    );
}

#[test]
fn register_slot_parsing() {
    assert_eq!(parse_register_slot("b3"), Some(3));
    assert_eq!(parse_register_slot("t12"), Some(12));
    assert_eq!(parse_register_slot("s"), None);
}
