#![allow(clippy::unwrap_used, clippy::expect_used)]

use hlslcc_ir::visit::walk_instructions;
use hlslcc_ir::{
    Assignment, ExprOp, Function, Instruction, Rvalue, ShaderStage, Swizzle, TypeId, UniformBlock,
    VarId, VarMode, Variable, WriteMask,
};
use hlslcc_syntax::ScalarKind;
use pretty_assertions::assert_eq;

use super::*;

struct Builder {
    module: Module,
    float4: TypeId,
}

impl Builder {
    fn new() -> Self {
        let mut module = Module::new(ShaderStage::Pixel);
        let float4 = module.types.vector(ScalarKind::Float, 4);
        Builder { module, float4 }
    }

    fn local(&mut self, name: &str, ty: TypeId) -> VarId {
        self.module.add_variable(Variable::new(name, ty, VarMode::Auto))
    }

    fn input(&mut self, name: &str, ty: TypeId) -> VarId {
        self.module
            .add_variable(Variable::new(name, ty, VarMode::In).global())
    }

    fn var(&self, var: VarId) -> Rvalue {
        Rvalue::var(var, self.module[var].ty)
    }

    fn finish(mut self, body: Vec<Instruction>) -> Module {
        let main = self.module.add_function(Function {
            name: "Main".to_owned(),
            return_type: TypeId::VOID,
            params: Vec::new(),
            body,
        });
        self.module.entry = Some(main);
        self.module
    }
}

fn assign(lhs: Rvalue, rhs: Rvalue) -> Instruction {
    Instruction::assign(lhs, rhs)
}

fn add(a: Rvalue, b: Rvalue) -> Rvalue {
    Rvalue::expr(a.ty, ExprOp::Add, vec![a, b])
}

fn mul(a: Rvalue, b: Rvalue) -> Rvalue {
    Rvalue::expr(a.ty, ExprOp::Mul, vec![a, b])
}

fn body(module: &Module) -> &[Instruction] {
    &module.entry_function().unwrap().body
}

/// Right-hand side of the last assignment to `var`.
fn last_rhs(module: &Module, var: VarId) -> Rvalue {
    let mut found = None;
    walk_instructions(body(module), &mut |i| {
        if let Instruction::Assign(a) = i {
            if a.lhs.root_var() == Some(var) {
                found = Some(a.rhs.clone());
            }
        }
    });
    found.expect("an assignment")
}

// ── Whole-variable copies ──

#[test]
fn copy_reads_become_source_reads() {
    let mut b = Builder::new();
    let (a, src, o) = (b.local("a", b.float4), b.input("src", b.float4), b.local("o", b.float4));
    let code = vec![
        Instruction::Declare(a),
        assign(b.var(a), b.var(src)),
        assign(b.var(o), add(b.var(a), b.var(a))),
        Instruction::Return(Some(b.var(o))),
    ];
    let vsrc = b.var(src);
    let mut module = b.finish(code);

    assert!(copy_propagation(&mut module));
    assert_eq!(last_rhs(&module, o), add(vsrc.clone(), vsrc));
}

#[test]
fn self_assignment_is_marked_dead() {
    let mut b = Builder::new();
    let (x, y) = (b.local("x", b.float4), b.local("y", b.float4));
    let code = vec![assign(b.var(x), b.var(y)), assign(b.var(y), b.var(x))];
    let mut module = b.finish(code);

    assert!(copy_propagation(&mut module));
    let Instruction::Assign(second) = &body(&module)[1] else {
        panic!("expected an assignment");
    };
    assert!(second.is_dead());
    assert!(dead_code(&mut module, false));
    assert_eq!(body(&module).len(), 0);
}

#[test]
fn writing_the_source_kills_the_copy() {
    let mut b = Builder::new();
    let (a, src, other, o) = (
        b.local("a", b.float4),
        b.local("src", b.float4),
        b.input("other", b.float4),
        b.local("o", b.float4),
    );
    let code = vec![
        assign(b.var(a), b.var(src)),
        assign(b.var(src), b.var(other)),
        assign(b.var(o), b.var(a)),
    ];
    let va = b.var(a);
    let mut module = b.finish(code);

    copy_propagation(&mut module);
    assert_eq!(last_rhs(&module, o), va);
}

#[test]
fn branch_kills_reach_the_parent() {
    let mut b = Builder::new();
    let (a, src, other, o) = (
        b.local("a", b.float4),
        b.local("src", b.float4),
        b.input("other", b.float4),
        b.local("o", b.float4),
    );
    let code = vec![
        assign(b.var(a), b.var(src)),
        Instruction::If {
            condition: Rvalue::bool(true),
            then_branch: vec![assign(b.var(src), b.var(other))],
            else_branch: Vec::new(),
        },
        assign(b.var(o), b.var(a)),
    ];
    let va = b.var(a);
    let mut module = b.finish(code);

    copy_propagation(&mut module);
    assert_eq!(last_rhs(&module, o), va);
}

#[test]
fn loops_only_use_copies_they_never_break() {
    let mut b = Builder::new();
    let (a, src, other, o, p) = (
        b.local("a", b.float4),
        b.local("src", b.float4),
        b.input("other", b.float4),
        b.local("o", b.float4),
        b.local("p", b.float4),
    );
    let c = b.local("c", b.float4);
    let code = vec![
        assign(b.var(a), b.var(src)),
        assign(b.var(c), b.var(other)),
        Instruction::Loop {
            body: vec![
                assign(b.var(o), b.var(a)),
                assign(b.var(p), b.var(c)),
                assign(b.var(src), b.var(p)),
                Instruction::Break,
            ],
        },
    ];
    let (va, vother) = (b.var(a), b.var(other));
    let mut module = b.finish(code);

    copy_propagation(&mut module);
    // `src` is written in the loop, so `a = src` is unusable inside it.
    assert_eq!(last_rhs(&module, o), va);
    // `c = other` survives the whole loop.
    assert_eq!(last_rhs(&module, p), vother);
}

// ── Per-channel copies ──

#[test]
fn partial_kill_narrows_channel_copies() {
    let mut b = Builder::new();
    let float2 = b.module.types.vector(ScalarKind::Float, 2);
    let (v, w) = (b.local("v", b.float4), b.input("w", b.float4));
    let (o, o2) = (b.local("o", TypeId::FLOAT), b.local("o2", float2));
    let zw = b.var(w).swizzle(Swizzle::new(&[2, 3]).unwrap(), float2);
    let code = vec![
        Instruction::Assign(Assignment::masked(b.var(v), zw, WriteMask::X | WriteMask::Y)),
        Instruction::Assign(Assignment::masked(b.var(v), Rvalue::float(1.0), WriteMask::X)),
        assign(
            b.var(o),
            b.var(v).swizzle(Swizzle::single(1), TypeId::FLOAT),
        ),
        assign(b.var(o2), b.var(v).swizzle(Swizzle::new(&[0, 1]).unwrap(), float2)),
    ];
    let expected = b.var(w).swizzle(Swizzle::single(3), TypeId::FLOAT);
    let unchanged = b.var(v).swizzle(Swizzle::new(&[0, 1]).unwrap(), float2);
    let mut module = b.finish(code);

    assert!(copy_propagation_elements(&mut module));
    assert_eq!(last_rhs(&module, o), expected);
    // `.x` no longer comes from `w`.
    assert_eq!(last_rhs(&module, o2), unchanged);
}

#[test]
fn channel_reads_from_two_sources_are_left_alone() {
    let mut b = Builder::new();
    let (v, w, u) = (b.local("v", b.float4), b.input("w", b.float4), b.input("u", b.float4));
    let o = b.local("o", b.float4);
    let code = vec![
        Instruction::Assign(Assignment::masked(
            b.var(v),
            b.var(w).swizzle(Swizzle::new(&[0, 1]).unwrap(), b.module.types.vector(ScalarKind::Float, 2)),
            WriteMask::X | WriteMask::Y,
        )),
        Instruction::Assign(Assignment::masked(
            b.var(v),
            b.var(u).swizzle(Swizzle::new(&[2, 3]).unwrap(), b.module.types.vector(ScalarKind::Float, 2)),
            WriteMask::Z | WriteMask::W,
        )),
        assign(b.var(o), b.var(v)),
    ];
    let vv = b.var(v);
    let mut module = b.finish(code);

    copy_propagation_elements(&mut module);
    assert_eq!(last_rhs(&module, o), vv);
}

// ── CSE ──

#[test]
fn repeated_expression_is_computed_once() {
    let mut b = Builder::new();
    let (x, y) = (b.local("x", b.float4), b.local("y", b.float4));
    let (p, q, r) = (b.input("p", b.float4), b.input("q", b.float4), b.input("r", b.float4));
    let expr = add(mul(b.var(p), b.var(q)), b.var(r));
    let code = vec![assign(b.var(x), expr.clone()), assign(b.var(y), expr.clone())];
    let mut module = b.finish(code);

    assert!(common_subexpressions(&mut module));
    let code = body(&module);
    assert_eq!(code.len(), 4);
    let Instruction::Declare(temp) = code[0] else {
        panic!("expected the temporary first");
    };
    assert_eq!(module[temp].mode, VarMode::Temporary);
    let Instruction::Assign(init) = &code[1] else {
        panic!("expected the temporary's assignment");
    };
    assert_eq!(init.rhs, expr);
    let temp_value = Rvalue::var(temp, expr.ty);
    assert_eq!(last_rhs(&module, x), temp_value);
    assert_eq!(last_rhs(&module, y), temp_value);
}

#[test]
fn write_between_occurrences_blocks_cse() {
    let mut b = Builder::new();
    let (x, y, p) = (b.local("x", b.float4), b.local("y", b.float4), b.local("p", b.float4));
    let (q, r) = (b.input("q", b.float4), b.input("r", b.float4));
    let expr = add(mul(b.var(p), b.var(q)), b.var(r));
    let code = vec![
        assign(b.var(x), expr.clone()),
        assign(b.var(p), b.var(r)),
        assign(b.var(y), expr),
    ];
    let mut module = b.finish(code);

    assert!(!common_subexpressions(&mut module));
}

#[test]
fn single_operator_is_not_merged() {
    let mut b = Builder::new();
    let (x, y) = (b.local("x", b.float4), b.local("y", b.float4));
    let (p, q) = (b.input("p", b.float4), b.input("q", b.float4));
    let code = vec![
        assign(b.var(x), add(b.var(p), b.var(q))),
        assign(b.var(y), add(b.var(p), b.var(q))),
    ];
    let mut module = b.finish(code);

    assert!(!common_subexpressions(&mut module));
}

// ── DCE ──

#[test]
fn unread_locals_are_removed() {
    let mut b = Builder::new();
    let (unused, kept) = (b.local("unused", b.float4), b.local("kept", b.float4));
    let p = b.input("p", b.float4);
    let code = vec![
        Instruction::Declare(unused),
        Instruction::Declare(kept),
        assign(b.var(unused), b.var(p)),
        assign(b.var(kept), b.var(p)),
        Instruction::Return(Some(b.var(kept))),
    ];
    let mut module = b.finish(code);

    assert!(dead_code(&mut module, false));
    assert_eq!(body(&module).len(), 3);
    assert!(!dead_code(&mut module, false));
}

#[test]
fn global_removal_spares_cbuffer_members() {
    let mut b = Builder::new();
    let loose = b
        .module
        .add_variable(Variable::new("Loose", b.float4, VarMode::Uniform).global());
    let mut member = Variable::new("Member", b.float4, VarMode::Uniform).global();
    member.block = Some(0);
    let member = b.module.add_variable(member);
    b.module.globals = vec![loose, member];
    b.module.uniform_blocks.push(UniformBlock {
        name: "CB".to_owned(),
        members: vec![member],
        register: None,
    });
    let mut module = b.finish(vec![Instruction::Return(None)]);

    dead_code(&mut module, false);
    assert_eq!(module.globals.len(), 2);
    assert!(dead_code(&mut module, true));
    assert_eq!(module.globals, vec![member]);
}

// ── Fixed point ──

#[test]
fn copy_chain_collapses() {
    let mut b = Builder::new();
    let (a, c, o) = (b.local("a", b.float4), b.local("c", b.float4), b.local("o", b.float4));
    let src = b.input("src", b.float4);
    let code = vec![
        Instruction::Declare(a),
        Instruction::Declare(c),
        Instruction::Declare(o),
        assign(b.var(a), b.var(src)),
        assign(b.var(c), b.var(a)),
        assign(b.var(o), b.var(c)),
        Instruction::Return(Some(b.var(o))),
    ];
    let vsrc = b.var(src);
    let mut module = b.finish(code);

    optimize_ir(&mut module);
    assert_eq!(
        body(&module),
        &[Instruction::Return(Some(vsrc))][..]
    );
}
