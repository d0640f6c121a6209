use pretty_assertions::assert_eq;

use super::*;
use crate::{FileId, NumericType, ScalarKind, SourceLocation};

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new(FileId::PRIMARY, line)
}

/// Binary nodes use the first two slots; conditional uses all three.
#[test]
fn operand_slots() {
    let mut names = NameTable::new();
    let mut arena = AstArena::new();
    let a = arena.alloc_expr(Expression::identifier(names.intern("a"), loc(1)));
    let b = arena.alloc_expr(Expression::literal(Literal::Float(2.0), loc(1)));
    let sum = arena.alloc_expr(Expression::binary(Operator::Add, a, b, loc(1)));
    let cond = arena.alloc_expr(Expression::conditional(a, sum, b, loc(2)));

    assert_eq!(arena[sum].sub, [Some(a), Some(b), None]);
    assert_eq!(arena[cond].operand(2), Some(b));
    assert_eq!(arena[b].op, Operator::FloatConstant);
    assert_eq!(arena.expr_count(), 4);
}

#[test]
fn compound_assignment_maps_to_binary() {
    assert_eq!(Operator::AddAssign.compound_binary(), Some(Operator::Add));
    assert_eq!(Operator::XorAssign.compound_binary(), Some(Operator::BitXor));
    assert_eq!(Operator::Assign.compound_binary(), None);
    assert!(Operator::LeftShiftAssign.is_assignment());
    assert!(!Operator::LeftShift.is_assignment());
}

#[test]
fn type_specifier_hlsl_spelling() {
    let names = NameTable::new();
    let mut ty = TypeSpecifier::new(TypeName::Texture(crate::TextureKind::Texture2DMS), loc(1));
    ty.inner = Some(Box::new(TypeSpecifier::new(
        TypeName::Numeric(NumericType::vector(ScalarKind::Float, 4)),
        loc(1),
    )));
    ty.sample_count = Some(4);
    assert_eq!(ty.to_hlsl(&names), "Texture2DMS<float4, 4>");
}

/// `find_struct` sees structs declared at top level.
#[test]
fn translation_unit_lookup() {
    let mut names = NameTable::new();
    let vs_out = names.intern("VSOut");
    let spec = StructSpecifier {
        name: Some(vs_out),
        parent: None,
        members: Vec::new(),
        loc: loc(1),
    };
    let list = DeclaratorList {
        ty: FullySpecifiedType {
            qualifier: TypeQualifier::empty(),
            specifier: TypeSpecifier::new(TypeName::Struct(Box::new(spec)), loc(1)),
        },
        declarations: Vec::new(),
        loc: loc(1),
    };
    let unit = TranslationUnit {
        arena: AstArena::new(),
        declarations: vec![TopLevel::Declaration(list)],
        names,
        files: crate::SourceFiles::new("t.usf"),
    };
    assert!(unit.find_struct("VSOut").is_some());
    assert!(unit.find_struct("Other").is_none());
    assert!(unit.find_function("Main").is_none());
}
