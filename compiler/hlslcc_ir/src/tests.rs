#![allow(clippy::unwrap_used, clippy::expect_used)]

use hlslcc_syntax::ScalarKind;
use pretty_assertions::assert_eq;

use super::*;

/// Structurally equal types intern to the same id.
#[test]
fn types_are_interned() {
    let mut types = TypeTable::new();
    let a = types.vector(ScalarKind::Float, 4);
    let b = types.intern(Type::Vector(ScalarKind::Float, 4));
    assert_eq!(a, b);
    assert_eq!(types.vector(ScalarKind::Float, 1), TypeId::FLOAT);
    assert_eq!(types.scalar(ScalarKind::Uint), TypeId::UINT);
    assert_eq!(types.name(a), "float4");
}

#[test]
fn matrix_rows_and_components() {
    let mut types = TypeTable::new();
    let m = types.matrix(ScalarKind::Half, 3, 4);
    let row = types.element(m).unwrap();
    assert_eq!(types.name(row), "half4");
    assert_eq!(types.components(m), 12);
    assert_eq!(types.name(m), "half3x4");
    assert_eq!(types.with_scalar(m, ScalarKind::Float), types.matrix(ScalarKind::Float, 3, 4));
}

#[test]
fn array_dims_outermost_first() {
    let mut types = TypeTable::new();
    let inner = types.array(TypeId::FLOAT, 3);
    let outer = types.array(inner, 2);
    assert_eq!(types.array_dims(outer), (vec![2, 3], TypeId::FLOAT));
    assert_eq!(types.name(outer), "float[3][2]");
}

#[test]
fn swizzle_parse_and_compose() {
    let zyx = Swizzle::parse("zyx").unwrap();
    assert_eq!(zyx.components(), &[2, 1, 0]);
    assert_eq!(Swizzle::parse("bgr"), Some(zyx));
    assert_eq!(Swizzle::parse("xg"), None);
    assert_eq!(Swizzle::parse("xyzwx"), None);

    // (v.zyx).xx == v.zz
    let xx = Swizzle::parse("xx").unwrap();
    assert_eq!(xx.compose(zyx).letters(), "zz");
    assert!(Swizzle::identity(3).is_identity_for(3));
    assert!(!Swizzle::identity(3).is_identity_for(4));
}

#[test]
fn write_mask_channels() {
    let mask = WriteMask::X | WriteMask::Z;
    assert_eq!(mask.count(), 2);
    assert_eq!(mask.channels().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(mask.as_swizzle().unwrap().letters(), "xz");
    assert_eq!(WriteMask::first(3), WriteMask::X | WriteMask::Y | WriteMask::Z);
    assert_eq!(Swizzle::parse("yy").unwrap().mask(), WriteMask::Y);
}

/// Every operator appears once in `ALL`, at its own index.
#[test]
fn expr_op_table_is_dense() {
    for (i, op) in ExprOp::ALL.iter().enumerate() {
        assert_eq!(op.index(), i, "{op:?}");
    }
    assert!(!ExprOp::Ddx.is_pure());
    assert_eq!(ExprOp::Lerp.arity(), Some(3));
    assert_eq!(ExprOp::Construct.arity(), None);
}

#[test]
fn swizzle_of_swizzle_folds() {
    let mut types = TypeTable::new();
    let f4 = types.vector(ScalarKind::Float, 4);
    let f2 = types.vector(ScalarKind::Float, 2);
    let v = Rvalue::var(VarId::new(0), f4)
        .swizzle(Swizzle::parse("wzyx").unwrap(), f4)
        .swizzle(Swizzle::parse("xy").unwrap(), f2);
    match &v.kind {
        RvalueKind::Swizzle { base, swizzle } => {
            assert_eq!(base.as_var(), Some(VarId::new(0)));
            assert_eq!(swizzle.letters(), "wz");
        }
        other => panic!("expected swizzle, got {other:?}"),
    }
}

#[test]
fn reads_exclude_assigned_root() {
    let mut module = Module::new(ShaderStage::Pixel);
    let arr_ty = module.types.array(TypeId::FLOAT, 4);
    let a = module.add_variable(Variable::new("a", arr_ty, VarMode::Auto));
    let i = module.add_variable(Variable::new("i", TypeId::INT, VarMode::Auto));
    let b = module.add_variable(Variable::new("b", TypeId::FLOAT, VarMode::Auto));

    // a[i] = b;
    let body = vec![Instruction::assign(
        Rvalue::var(a, arr_ty).index(Rvalue::var(i, TypeId::INT), TypeId::FLOAT),
        Rvalue::var(b, TypeId::FLOAT),
    )];
    let reads = visit::read_vars(&body);
    assert!(reads.contains(&i));
    assert!(reads.contains(&b));
    assert!(!reads.contains(&a));
    assert!(visit::written_vars(&body).contains(&a));
}

#[test]
fn dead_assignment_detection() {
    let mut assign = Assignment::new(
        Rvalue::var(VarId::new(0), TypeId::FLOAT),
        Rvalue::float(1.0),
    );
    assert!(!assign.is_dead());
    assign.condition = Some(Rvalue::bool(false));
    assert!(assign.is_dead());
}

#[test]
fn derivative_makes_tree_impure() {
    let x = Rvalue::var(VarId::new(0), TypeId::FLOAT);
    let pure = Rvalue::expr(TypeId::FLOAT, ExprOp::Add, vec![x.clone(), Rvalue::float(1.0)]);
    assert!(pure.is_pure());
    let ddx = Rvalue::expr(TypeId::FLOAT, ExprOp::Ddx, vec![x]);
    assert!(!Rvalue::expr(TypeId::FLOAT, ExprOp::Abs, vec![ddx]).is_pure());
}
