use super::*;

#[test]
fn returns_the_closure_result() {
    assert_eq!(ensure_sufficient_stack(|| 42), 42);
}

#[test]
fn deep_nesting_does_not_overflow() {
    fn nest(depth: u32) -> u32 {
        ensure_sufficient_stack(|| if depth == 0 { 0 } else { nest(depth - 1) + 1 })
    }

    assert_eq!(nest(100_000), 100_000);
}
