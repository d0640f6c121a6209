#![allow(clippy::unwrap_used, clippy::expect_used)]

use hlslcc_syntax::ast::{
    Attribute, CaseLabel, Operator, StmtKind, TopLevel, TypeName, TypeQualifier,
};
use pretty_assertions::assert_eq;

use super::*;
use crate::grammar::{DeclFlags, STATEMENT_RULES};

fn parse_source(source: &str) -> Result<TranslationUnit, SourceError> {
    let stream = hlslcc_lexer::lex(source, "test.usf");
    parse(&stream)
}

fn parse_ok(source: &str) -> TranslationUnit {
    match parse_source(source) {
        Ok(unit) => unit,
        Err(e) => panic!("parse failed: {e}"),
    }
}

fn parse_err(source: &str) -> SourceError {
    match parse_source(source) {
        Ok(_) => panic!("expected a parse error for {source:?}"),
        Err(e) => e,
    }
}

fn body_of<'u>(unit: &'u TranslationUnit, name: &str) -> &'u [StmtId] {
    unit.find_function(name)
        .and_then(|f| f.body.as_deref())
        .expect("function with body")
}

// ── Top level ──

/// A definition and a global are told apart by the `(` after the name.
#[test]
fn function_versus_global_declaration() {
    let unit = parse_ok("float4 Color : register(c0);\nfloat4 Main() : SV_Target0 { return Color; }");
    assert_eq!(unit.declarations.len(), 2);
    let TopLevel::Declaration(global) = &unit.declarations[0] else {
        panic!("expected a global declaration");
    };
    assert_eq!(unit.names.resolve(global.declarations[0].identifier), "Color");
    assert_eq!(
        global.declarations[0].register.map(|r| unit.names.resolve(r)),
        Some("c0")
    );

    let main = unit.find_function("Main").unwrap();
    assert_eq!(
        main.prototype.return_semantic.map(|s| unit.names.resolve(s)),
        Some("SV_Target0")
    );
    assert!(main.prototype.parameters.is_empty());
}

/// Forward declarations carry no body and are skipped by `functions()`.
#[test]
fn forward_declaration() {
    let unit = parse_ok("float f(float x);\nfloat f(float x) { return x; }");
    assert_eq!(unit.declarations.len(), 2);
    assert_eq!(unit.functions().count(), 1);
}

#[test]
fn cbuffer_members_and_register() {
    let unit = parse_ok("cbuffer View : register(b1) { float4x4 ViewProj; float3 Eye, Dir; };");
    let TopLevel::CBuffer(cb) = &unit.declarations[0] else {
        panic!("expected a cbuffer");
    };
    assert_eq!(unit.names.resolve(cb.name), "View");
    assert_eq!(cb.register.map(|r| unit.names.resolve(r)), Some("b1"));
    assert_eq!(cb.members.len(), 2);
    assert_eq!(cb.members[1].declarations.len(), 2);
}

/// Stray semicolons at file scope produce no node.
#[test]
fn stray_semicolons() {
    let unit = parse_ok(";; float x; ;");
    assert_eq!(unit.declarations.len(), 1);
}

/// Attributes before a function are attached to its prototype.
#[test]
fn function_attributes() {
    let unit = parse_ok("[numthreads(8, 8, 1)] void CS() {}");
    let cs = unit.find_function("CS").unwrap();
    assert_eq!(cs.prototype.attributes.len(), 1);
    assert_eq!(unit.names.resolve(cs.prototype.attributes[0].name), "numthreads");
    assert_eq!(cs.prototype.attributes[0].arguments.len(), 3);
}

#[test]
fn struct_definition_and_use() {
    let unit = parse_ok(
        "struct VOut { float4 Pos : SV_Position; float2 UV : TEXCOORD0; };\n\
         VOut Main(in float4 P : ATTRIBUTE0) { VOut o; o.Pos = P; o.UV = P.xy; return o; }",
    );
    let vout = unit.find_struct("VOut").unwrap();
    assert_eq!(vout.members.len(), 2);
    let main = unit.find_function("Main").unwrap();
    assert_eq!(main.prototype.return_type.specifier.name, TypeName::Named(vout.name.unwrap()));
    assert_eq!(main.prototype.parameters[0].ty.qualifier, TypeQualifier::IN);
}

/// A file-scope struct is a global declaration, not a function that
/// failed to parse.
#[test]
fn top_level_struct_definitions() {
    let unit = parse_ok(
        "struct Base { float a; };\n\
         static const struct Derived : Base { float b; } Zero;\n\
         struct { float c; } Anonymous;\n\
         Base Make() { Base r; r.a = 1.0; return r; }",
    );
    assert_eq!(unit.declarations.len(), 4);
    let TopLevel::Declaration(base) = &unit.declarations[0] else {
        panic!("expected a struct declaration");
    };
    assert!(base.declarations.is_empty());
    let derived = unit.find_struct("Derived").unwrap();
    assert_eq!(derived.parent.map(|p| unit.names.resolve(p)), Some("Base"));
    let TopLevel::Declaration(zero) = &unit.declarations[1] else {
        panic!("expected a global declaration");
    };
    assert_eq!(unit.names.resolve(zero.declarations[0].identifier), "Zero");
    assert!(unit.find_function("Make").is_some());
}

/// A function may still return a struct declared without a body.
#[test]
fn function_returning_struct_keyword_type() {
    let unit = parse_ok("struct S { float x; };\nstruct S Make() { S s; s.x = 0.0; return s; }");
    let make = unit.find_function("Make").unwrap();
    assert!(matches!(make.prototype.return_type.specifier.name, TypeName::Named(_)));
}

/// Every top-level construct reaches the callback exactly once.
#[test]
fn parse_with_reports_each_declaration() {
    let stream = hlslcc_lexer::lex("float a; cbuffer B { float b; }; ; void f() {}", "test.usf");
    let mut seen = 0;
    let unit = parse_with(&stream, |_, _| seen += 1).unwrap();
    assert_eq!(seen, 3);
    assert_eq!(unit.declarations.len(), 3);
}

// ── Scopes ──

/// A struct declared inside one function is not a type in its sibling.
#[test]
fn local_struct_does_not_leak_into_sibling_function() {
    parse_ok("void a() { struct S { float x; }; S s; s.x = 1.0; }");
    let err = parse_err(
        "void a() { struct S { float x; }; S s; }\n\
         void b() { S s; }",
    );
    assert_eq!(err.line(), 2);
}

/// A file-scope struct stays visible in every function.
#[test]
fn global_struct_is_visible_everywhere() {
    parse_ok("struct S { float x; };\nvoid a() { S s; }\nvoid b() { S t; }");
}

// ── Backtracking ──

fn declare_then_decline(p: &mut Parser<'_>, _: Vec<Attribute>) -> ParseResult<()> {
    let _ = p.parse_type_specifier(true)?;
    Ok(ParseOutcome::NotMatched)
}

fn skip_struct(p: &mut Parser<'_>, _: Vec<Attribute>) -> ParseResult<()> {
    while !p.is_at_end() {
        p.cursor.advance();
    }
    Ok(ParseOutcome::Matched(()))
}

/// Types declared by a rule that declines are forgotten with its tokens.
#[test]
fn declined_rule_takes_back_its_types() {
    let stream = hlslcc_lexer::lex("struct Temp { float x; };", "test.usf");
    let temp = stream.names.get("Temp").unwrap();
    let mut parser = Parser::new(&stream);
    let rules = [Rule::any(declare_then_decline), Rule::any(skip_struct)];
    let outcome = parser.try_rules(&rules, "test rule", true).unwrap();
    assert!(outcome.is_matched());
    assert!(parser.is_at_end());
    assert!(!parser.is_type_name(temp));

    let mut parser = Parser::new(&stream);
    let outcome = parser.try_rules(&rules[..1], "test rule", false).unwrap();
    assert_eq!(outcome, ParseOutcome::NotMatched);
    assert_eq!(parser.position(), 0);
    assert!(!parser.is_type_name(temp));
}

/// A declaration attempt on an expression declines without moving the
/// cursor; the statement table then matches an expression statement.
#[test]
fn declaration_declines_on_call_statement() {
    let stream = hlslcc_lexer::lex("int x; foo();", "test.usf");
    let mut parser = Parser::new(&stream);
    let first = parser.try_rules(STATEMENT_RULES, "statement", true).unwrap();
    assert!(first.is_matched());
    let before = parser.position();
    assert_eq!(before, 3);

    let outcome = parser.parse_general_declaration(DeclFlags::LOCAL).unwrap();
    assert_eq!(outcome, ParseOutcome::NotMatched);
    assert_eq!(parser.position(), before);

    let stmt = parser
        .try_rules(STATEMENT_RULES, "statement", true)
        .unwrap()
        .into_option()
        .unwrap();
    let StmtKind::Expression(Some(call)) = &parser.arena()[stmt].kind else {
        panic!("expected an expression statement");
    };
    assert_eq!(parser.arena()[*call].op, Operator::FunctionCall);
    assert!(parser.is_at_end());
}

/// `float4(...)` starts like a declaration; the failed attempt rewinds and
/// the constructor parses as an expression.
#[test]
fn constructor_statement_after_declaration_attempt() {
    let unit = parse_ok("void f() { float4(1, 0, 0, 1); }");
    let body = body_of(&unit, "f");
    let StmtKind::Expression(Some(e)) = &unit.arena[body[0]].kind else {
        panic!("expected an expression statement");
    };
    assert_eq!(unit.arena[*e].op, Operator::Constructor);
    assert_eq!(unit.arena[*e].arguments.len(), 4);
}

/// `(float)x` is a cast; `(x)` is a parenthesized expression.
#[test]
fn cast_versus_parentheses() {
    let unit = parse_ok("void f(int x) { float y = (float)x; int z = (x) + 1; }");
    let body = body_of(&unit, "f");
    let StmtKind::Declaration(y) = &unit.arena[body[0]].kind else {
        panic!()
    };
    let init = y.declarations[0].initializer.unwrap();
    assert_eq!(unit.arena[init].op, Operator::TypeCast);

    let StmtKind::Declaration(z) = &unit.arena[body[1]].kind else {
        panic!()
    };
    let init = z.declarations[0].initializer.unwrap();
    assert_eq!(unit.arena[init].op, Operator::Add);
}

// ── Expressions ──

#[test]
fn precedence_and_associativity() {
    let unit = parse_ok("void f() { int a, b, c; a = b = 1 + 2 * c; }");
    let body = body_of(&unit, "f");
    let StmtKind::Expression(Some(assign)) = &unit.arena[body[1]].kind else {
        panic!()
    };
    let outer = &unit.arena[*assign];
    assert_eq!(outer.op, Operator::Assign);
    let inner = &unit.arena[outer.operand(1).unwrap()];
    assert_eq!(inner.op, Operator::Assign);
    let sum = &unit.arena[inner.operand(1).unwrap()];
    assert_eq!(sum.op, Operator::Add);
    assert_eq!(unit.arena[sum.operand(1).unwrap()].op, Operator::Mul);
}

#[test]
fn conditional_and_postfix() {
    let unit = parse_ok("void f(float4 v[2], int i) { float r = i > 0 ? v[i].x : v[0].y; i++; }");
    let body = body_of(&unit, "f");
    let StmtKind::Declaration(r) = &unit.arena[body[0]].kind else {
        panic!()
    };
    let cond = &unit.arena[r.declarations[0].initializer.unwrap()];
    assert_eq!(cond.op, Operator::Conditional);
    let then = &unit.arena[cond.operand(1).unwrap()];
    assert_eq!(then.op, Operator::FieldSelection);
    assert_eq!(unit.arena[then.operand(0).unwrap()].op, Operator::ArrayIndex);
}

#[test]
fn initializer_lists_nest() {
    let unit = parse_ok("static const float2 K[2] = { {1, 2}, {3, 4}, };");
    let TopLevel::Declaration(k) = &unit.declarations[0] else {
        panic!()
    };
    let init = &unit.arena[k.declarations[0].initializer.unwrap()];
    assert_eq!(init.op, Operator::InitializerList);
    assert_eq!(init.arguments.len(), 2);
    assert_eq!(unit.arena[init.arguments[0]].op, Operator::InitializerList);
}

// ── Statements ──

/// Consecutive labels share a case; fallthrough statements follow them.
#[test]
fn switch_groups_labels() {
    let unit = parse_ok(
        "void f(int i) { switch (i) { case 0: case 1: i = 2; break; default: i = 3; } }",
    );
    let body = body_of(&unit, "f");
    let StmtKind::Switch { body: switch, .. } = &unit.arena[body[0]].kind else {
        panic!("expected a switch")
    };
    assert_eq!(switch.cases.len(), 2);
    assert_eq!(switch.cases[0].labels.len(), 2);
    assert_eq!(switch.cases[0].statements.len(), 2);
    assert_eq!(switch.cases[1].labels, vec![CaseLabel::Default]);
}

#[test]
fn duplicate_default_is_an_error() {
    let err = parse_err("void f(int i) { switch (i) { default: break; default: break; } }");
    assert_eq!(err.code(), ErrorCode::E1008);
}

#[test]
fn loop_attributes_and_for_scope() {
    let unit = parse_ok("void f() { [unroll] for (int i = 0; i < 4; ++i) { } int i = 2; }");
    let body = body_of(&unit, "f");
    let stmt = &unit.arena[body[0]];
    assert_eq!(stmt.attributes.len(), 1);
    let StmtKind::For { init, condition, step, .. } = &stmt.kind else {
        panic!("expected a for loop")
    };
    assert!(init.is_some() && condition.is_some() && step.is_some());
}

#[test]
fn if_else_and_loops() {
    let unit = parse_ok(
        "void f(int i) { if (i) i = 1; else { i = 2; } while (i) i--; do { i++; } while (i < 3); discard; }",
    );
    let body = body_of(&unit, "f");
    assert!(matches!(
        unit.arena[body[0]].kind,
        StmtKind::If { else_branch: Some(_), .. }
    ));
    assert!(matches!(unit.arena[body[1]].kind, StmtKind::While { .. }));
    assert!(matches!(unit.arena[body[2]].kind, StmtKind::DoWhile { .. }));
    assert!(matches!(unit.arena[body[3]].kind, StmtKind::Discard));
}

// ── Qualifier errors ──

#[test]
fn duplicate_qualifier_is_an_error() {
    let err = parse_err("static static float x;");
    assert_eq!(err.code(), ErrorCode::E1006);
}

#[test]
fn inout_with_in_is_an_error() {
    let err = parse_err("void f(in inout float x) {}");
    assert_eq!(err.code(), ErrorCode::E1007);
    let err = parse_err("void f(inout out float x) {}");
    assert_eq!(err.code(), ErrorCode::E1007);
}

#[test]
fn in_and_out_combine() {
    let unit = parse_ok("void f(in out float x) {}");
    let f = unit.find_function("f").unwrap();
    assert_eq!(f.prototype.parameters[0].ty.qualifier, TypeQualifier::INOUT);
}

#[test]
fn parameter_qualifier_not_allowed_on_global() {
    let err = parse_err("inout float x;");
    assert_eq!(err.code(), ErrorCode::E1012);
}

#[test]
fn unsized_local_array_is_an_error() {
    let err = parse_err("void f() { float a[]; }");
    assert_eq!(err.code(), ErrorCode::E1009);
}

#[test]
fn error_position_and_format() {
    let err = parse_err("float x;\nfloat y = ;");
    assert_eq!(err.code(), ErrorCode::E1002);
    assert_eq!(err.to_string(), "test.usf(2): error E1002: expected expression, found ';'");
}
