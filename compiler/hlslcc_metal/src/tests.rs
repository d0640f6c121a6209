#![allow(clippy::unwrap_used, clippy::expect_used)]

use hlslcc_diagnostic::ErrorCode;
use hlslcc_ir::{
    ConstValue, Function, Instruction, Rvalue, ShaderStage, TypeId, VarId, VarMode, Variable,
};
use hlslcc_syntax::ScalarKind;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn compile(source: &str, entry: &str, stage: ShaderStage, options: MetalOptions) -> Result<String, SourceError> {
    let stream = hlslcc_lexer::lex(source, "test.usf");
    let unit = hlslcc_parse::parse(&stream)?;
    let mut module = hlslcc_lower::lower(&unit, entry, stage)?;
    hlslcc_opt::optimize_ir(&mut module);
    generate(&mut module, options)
}

fn compile_ok(source: &str, entry: &str, stage: ShaderStage) -> String {
    match compile(source, entry, stage, MetalOptions::default()) {
        Ok(code) => code,
        Err(e) => panic!("compilation failed: {e}"),
    }
}

fn assert_contains(code: &str, expected: &str) {
    assert!(code.contains(expected), "expected {expected:?} in:\n{code}");
}

/// `module` with a `Main` that declares `locals` and then runs `body`.
fn with_main(
    mut module: Module,
    locals: &[(&str, TypeId)],
    body: impl FnOnce(&[VarId]) -> Vec<Instruction>,
) -> Module {
    let vars: Vec<VarId> = locals
        .iter()
        .map(|&(name, ty)| module.add_variable(Variable::new(name, ty, VarMode::Auto)))
        .collect();
    let mut code: Vec<Instruction> = vars.iter().map(|&v| Instruction::Declare(v)).collect();
    code.extend(body(&vars));
    let main = module.add_function(Function {
        name: "Main".to_owned(),
        return_type: TypeId::VOID,
        params: Vec::new(),
        body: code,
    });
    module.entry = Some(main);
    module
}

// ── Whole shaders ──

const VERTEX: &str = "float4 Scale;\n\
    void MainVS(in float4 Position : ATTRIBUTE0, out float4 OutPosition : SV_Position)\n\
    {\n\
        OutPosition = Position * Scale;\n\
    }";

#[test]
fn vertex_shader_packs_loose_uniforms() {
    let code = compile_ok(VERTEX, "MainVS", ShaderStage::Vertex);
    assert!(code.starts_with("// Compiled by HLSLCC 0.1\n"));
    assert_contains(&code, "// @Inputs: f4:in_ATTRIBUTE0\n");
    assert_contains(&code, "// @Outputs: f4:gl_Position\n");
    assert_contains(&code, "// @PackedGlobals: Scale(h:0,4)\n");
    assert_contains(&code, "#include <metal_stdlib>\n\nusing namespace metal;\n");
    assert_contains(&code, "\tfloat4 in_ATTRIBUTE0 [[ attribute(0) ]];\n");
    assert_contains(&code, "\tfloat4 gl_Position [[ position ]];\n");
    assert_contains(
        &code,
        "vertex Main_Out Main(Main_In __main_in [[ stage_in ]],\n\tconstant float4* pu_h [[ buffer(0) ]])\n{\n",
    );
    assert_contains(&code, "pu_h[0]");
    assert!(code.ends_with("}\n"));
}

#[test]
fn header_reads_back_from_generated_code() {
    let code = compile_ok(VERTEX, "MainVS", ShaderStage::Vertex);
    let header = CodeHeader::parse(&code).unwrap();
    assert_eq!(header.inputs.len(), 1);
    assert_eq!(header.packed_globals.len(), 1);
    assert_contains(&code, &header.to_string());

    let bindings = header.bindings();
    assert_eq!(bindings.attribute_mask, 1);
    assert_eq!(bindings.render_target_mask, 0);
    assert!(!bindings.writes_depth);
    assert_eq!(bindings.packed_global_array_sizes, vec![('h', 4)]);
}

const CBUFFER: &str = "cbuffer MyCB { float4 Color; float Unused; };\n\
    float4 MainPS() : SV_Target0 { return Color; }";

#[test]
fn cbuffer_binds_as_a_struct() {
    let code = compile_ok(CBUFFER, "MainPS", ShaderStage::Pixel);
    assert_contains(&code, "// @Outputs: f4:out_Target0\n");
    assert_contains(&code, "// @UniformBlocks: MyCB(0)\n");
    assert_contains(&code, "struct MyCB\n{\n\tfloat4 Color;\n\tfloat Unused;\n};\n");
    assert_contains(&code, "constant MyCB& MyCB [[ buffer(0) ]]");
    assert_contains(&code, "MyCB.Color");
    assert_contains(&code, "\tfloat4 out_Target0 [[ color(0) ]];\n");

    let bindings = CodeHeader::parse(&code).unwrap().bindings();
    assert_eq!(bindings.uniform_buffer_count, 1);
    assert_eq!(bindings.render_target_mask, 1);
}

#[test]
fn flattened_cbuffer_becomes_copy_ranges() {
    let options = MetalOptions {
        flatten_uniform_buffers: true,
        ..MetalOptions::default()
    };
    let code = compile(CBUFFER, "MainPS", ShaderStage::Pixel, options).unwrap();
    assert_contains(&code, "// @PackedUB: MyCB(0): Color(0,4),Unused(4,1)\n");
    assert_contains(&code, "// @PackedUBGlobalCopies: 0:0-h:0:5\n");
    assert_contains(&code, "constant float4* pu_h [[ buffer(0) ]]");
    assert!(!code.contains("@UniformBlocks"));
    assert!(!code.contains("struct MyCB"));

    let bindings = CodeHeader::parse(&code).unwrap().bindings();
    assert_eq!(bindings.packed_global_array_sizes, vec![('h', 8)]);
    assert_eq!(bindings.packed_ub_copies.len(), 1);
}

#[test]
fn texture_with_one_sampler_gets_an_inline_sampler() {
    let code = compile_ok(
        "Texture2D Tex;\nSamplerState Samp;\n\
         float4 MainPS(float2 UV : TEXCOORD0) : SV_Target0 { return Tex.Sample(Samp, UV); }",
        "MainPS",
        ShaderStage::Pixel,
    );
    assert_contains(&code, "// @Inputs: f2:var_TEXCOORD0\n");
    assert_contains(&code, "// @Samplers: Tex(0:1[Samp])\n");
    assert_contains(&code, "\tsampler s0 [[ sampler(0) ]],\n\ttexture2d<float> Tex [[ texture(0) ]])");
    assert_contains(&code, "Tex.sample(s0, ");

    let bindings = CodeHeader::parse(&code).unwrap().bindings();
    assert_eq!(bindings.sampler_count, 1);
    assert_eq!(bindings.samplers[0].sampler_states, vec!["Samp".to_owned()]);
}

#[test]
fn compute_shader_writes_a_uav() {
    let code = compile_ok(
        "RWTexture2D<float4> Out;\n\
         [numthreads(8, 4, 1)] void MainCS(uint3 Id : SV_DispatchThreadID) { Out[Id.xy] = float4(1, 0, 0, 1); }",
        "MainCS",
        ShaderStage::Compute,
    );
    assert_contains(&code, "// @UAVs: Out(g:0,1)\n");
    assert_contains(&code, "// @NumThreads: 8,4,1\n");
    assert_contains(&code, "kernel void Main(");
    assert_contains(&code, "uint3 gl_GlobalInvocationID [[ thread_position_in_grid ]]");
    assert_contains(&code, "texture2d<float, access::read_write> Out [[ texture(0) ]]");
    assert_contains(&code, "Out.write(");

    let header = CodeHeader::parse(&code).unwrap();
    assert_eq!(header.num_threads, Some([8, 4, 1]));
    assert_eq!(header.uavs.len(), 1);
}

// ── Restrictions ──

#[test]
fn geometry_shaders_are_rejected() {
    let mut module = Module::new(ShaderStage::Geometry);
    let err = generate(&mut module, MetalOptions::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E3005);
}

fn many_textures(count: usize) -> String {
    let mut source = String::new();
    for i in 0..count {
        source.push_str(&format!("Texture2D T{i};\n"));
    }
    source.push_str("float4 MainPS(float2 UV : TEXCOORD0) : SV_Target0\n{\n\tfloat4 r = 0;\n");
    for i in 0..count {
        source.push_str(&format!("\tr += T{i}.Load(int3(0, 0, 0));\n"));
    }
    source.push_str("\treturn r;\n}\n");
    source
}

#[test]
fn texture_limit_depends_on_the_target() {
    let source = many_textures(32);
    let ios = MetalOptions {
        target: MetalTarget::Ios,
        ..MetalOptions::default()
    };
    let err = compile(&source, "MainPS", ShaderStage::Pixel, ios).unwrap_err();
    assert_eq!(err.code(), ErrorCode::E3002);
    assert!(compile(&source, "MainPS", ShaderStage::Pixel, MetalOptions::default()).is_ok());
}

// ── Statements ──

#[test]
fn if_with_one_copy_per_branch_becomes_a_conditional_move() {
    let mut module = Module::new(ShaderStage::Pixel);
    let float4 = module.types.vector(ScalarKind::Float, 4);
    let mut module = with_main(module, &[("c", TypeId::BOOL), ("x", float4)], |vars| {
        let x = Rvalue::var(vars[1], float4);
        let one = Rvalue::constant(float4, [ConstValue::Float(1.0); 4]);
        let zero = Rvalue::constant(float4, [ConstValue::Float(0.0); 4]);
        vec![Instruction::If {
            condition: Rvalue::var(vars[0], TypeId::BOOL),
            then_branch: vec![Instruction::assign(x.clone(), one)],
            else_branch: vec![Instruction::assign(x, zero)],
        }]
    });
    let code = generate(&mut module, MetalOptions::default()).unwrap();
    assert_contains(
        &code,
        "\tt1 = (t0)?(float4(1.0,1.0,1.0,1.0)):(float4(0.0,0.0,0.0,0.0));\n",
    );
    assert!(!code.contains("if ("));
}

#[test]
fn if_with_other_statements_stays_an_if() {
    let module = Module::new(ShaderStage::Pixel);
    let mut module = with_main(module, &[("c", TypeId::BOOL), ("x", TypeId::FLOAT)], |vars| {
        let x = Rvalue::var(vars[1], TypeId::FLOAT);
        vec![Instruction::If {
            condition: Rvalue::var(vars[0], TypeId::BOOL),
            then_branch: vec![
                Instruction::assign(x, Rvalue::float(1.0)),
                Instruction::Discard,
            ],
            else_branch: Vec::new(),
        }]
    });
    let code = generate(&mut module, MetalOptions::default()).unwrap();
    assert_contains(
        &code,
        "\tif (t0)\n\t{\n\t\tt1 = 1.0;\n\t\tdiscard_fragment();\n\t}\n",
    );
    assert!(!code.contains("else"));
}

#[test]
fn multi_dimensional_arrays_are_wrapped() {
    let mut module = Module::new(ShaderStage::Pixel);
    let float4 = module.types.vector(ScalarKind::Float, 4);
    let row = module.types.array(float4, 3);
    let grid = module.types.array(row, 2);
    let mut module = with_main(module, &[("a", grid)], |vars| {
        let element = Rvalue::var(vars[0], grid)
            .index(Rvalue::int(1), row)
            .index(Rvalue::int(2), float4);
        vec![Instruction::assign(
            element,
            Rvalue::constant(float4, [ConstValue::Float(1.0); 4]),
        )]
    });
    let code = generate(&mut module, MetalOptions::default()).unwrap();
    assert_contains(&code, "struct _mdarr_3_float4\n{\n\tfloat4 Inner[3];\n};\n");
    assert_contains(&code, "struct _mdarr_2_3_float4\n{\n\t_mdarr_3_float4 Inner[2];\n};\n");
    assert_contains(&code, "\t_mdarr_2_3_float4 t0;\n");
    assert_contains(&code, "\tt0.Inner[1].Inner[2] = float4(1.0,1.0,1.0,1.0);\n");
}

// ── Buffer slots ──

fn packed(array_type: char, var: u32) -> BufferKind {
    BufferKind::Packed {
        array_type,
        var: VarId::new(var),
    }
}

#[test]
fn fixed_slots_stay_put_and_others_fill_holes() {
    let buffers = Buffers::sort(vec![
        (Some(0), packed('h', 0)),
        (None, BufferKind::UniformBlock(0)),
        (Some(3), packed('i', 1)),
    ]);
    assert_eq!(
        buffers.slots(),
        &[
            Some(packed('h', 0)),
            Some(BufferKind::UniformBlock(0)),
            None,
            Some(packed('i', 1)),
        ]
    );
    assert_eq!(buffers.slot_of(packed('i', 1)), Some(3));
}

#[test]
fn unfixed_buffers_fill_from_slot_zero() {
    let buffers = Buffers::sort(vec![
        (Some(4), packed('u', 0)),
        (None, BufferKind::UniformBlock(0)),
        (None, BufferKind::UniformBlock(1)),
    ]);
    let slots: Vec<usize> = buffers.iter().map(|(slot, _)| slot).collect();
    assert_eq!(slots, vec![0, 1, 4]);
    assert_eq!(buffers.slot_of(BufferKind::UniformBlock(1)), Some(1));
}

#[test]
fn sorting_is_deterministic() {
    let requests = vec![
        (None, BufferKind::Struct(VarId::new(7))),
        (Some(1), packed('m', 2)),
        (None, BufferKind::UniformBlock(3)),
    ];
    assert_eq!(Buffers::sort(requests.clone()), Buffers::sort(requests));
}

// ── Copy ranges ──

fn copy(source_offset: u32, dest_offset: u32, size: u32) -> PackedUbCopy {
    PackedUbCopy {
        source_ub: 0,
        source_offset,
        dest_array_type: 'h',
        dest_offset,
        size,
    }
}

#[test]
fn adjacent_ranges_merge() {
    let mut ranges = Vec::new();
    insert_range(&mut ranges, copy(0, 0, 4));
    insert_range(&mut ranges, copy(4, 4, 4));
    assert_eq!(ranges, vec![copy(0, 0, 8)]);
}

#[test]
fn gap_on_either_side_keeps_ranges_apart() {
    let mut ranges = Vec::new();
    insert_range(&mut ranges, copy(0, 0, 4));
    insert_range(&mut ranges, copy(8, 4, 4));
    insert_range(&mut ranges, copy(12, 12, 4));
    assert_eq!(ranges, vec![copy(0, 0, 4), copy(8, 4, 4), copy(12, 12, 4)]);
}

#[test]
fn middle_range_joins_both_neighbours() {
    let mut ranges = Vec::new();
    insert_range(&mut ranges, copy(0, 0, 4));
    insert_range(&mut ranges, copy(8, 8, 2));
    insert_range(&mut ranges, copy(4, 4, 4));
    assert_eq!(ranges, vec![copy(0, 0, 10)]);
}

fn contiguous_pieces() -> impl Strategy<Value = Vec<PackedUbCopy>> {
    prop::collection::vec(1u32..16, 1..10)
        .prop_map(|sizes| {
            let mut offset = 0;
            sizes
                .into_iter()
                .map(|size| {
                    let piece = copy(offset, offset, size);
                    offset += size;
                    piece
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

proptest! {
    /// Pieces of one contiguous copy merge back into it in any order.
    #[test]
    fn pieces_merge_in_any_order(pieces in contiguous_pieces()) {
        let total: u32 = pieces.iter().map(|p| p.size).sum();
        let mut ranges = Vec::new();
        for piece in pieces {
            insert_range(&mut ranges, piece);
        }
        prop_assert_eq!(ranges, vec![copy(0, 0, total)]);
    }
}
