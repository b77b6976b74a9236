// tarn-vm - Property-based tests for compilation and execution
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Property-based tests:
//! - Int arithmetic and comparisons agree with the host's semantics
//! - container literals preserve order and length
//! - round-tripped literals survive compile + run unchanged

use proptest::prelude::*;

use tarn_vm::compiler::{Compiler, Options};
use tarn_vm::{Value, Vm};

fn compile_and_run(src: &str) -> Value {
    let program = tarn_syntax::parse(src).expect("parse error");
    let mut compiler = Compiler::new(Options::default()).expect("compiler setup");
    let scope = compiler.compile(&program).expect("compile error");
    let mut vm = Vm::new(scope);
    vm.run().expect("runtime error");
    vm.top().expect("expected a value on the stack")
}

/// Integers small enough that sums and products stay in range.
fn arb_small_int() -> impl Strategy<Value = i64> {
    -1_000_000i64..1_000_000i64
}

proptest! {
    #[test]
    fn int_addition_matches_host(a in arb_small_int(), b in arb_small_int()) {
        let result = compile_and_run(&format!("{} + {}", a, b));
        prop_assert_eq!(result, Value::Int(a + b));
    }

    #[test]
    fn int_subtraction_matches_host(a in arb_small_int(), b in arb_small_int()) {
        let result = compile_and_run(&format!("{} - {}", a, b));
        prop_assert_eq!(result, Value::Int(a - b));
    }

    #[test]
    fn int_multiplication_matches_host(a in -30_000i64..30_000, b in -30_000i64..30_000) {
        let result = compile_and_run(&format!("{} * {}", a, b));
        prop_assert_eq!(result, Value::Int(a * b));
    }

    #[test]
    fn int_division_matches_host(a in arb_small_int(), b in arb_small_int()) {
        prop_assume!(b != 0);
        let result = compile_and_run(&format!("{} / {}", a, b));
        prop_assert_eq!(result, Value::Int(a / b));
    }

    #[test]
    fn comparisons_match_host(a in arb_small_int(), b in arb_small_int()) {
        prop_assert_eq!(compile_and_run(&format!("{} < {}", a, b)), Value::Bool(a < b));
        prop_assert_eq!(compile_and_run(&format!("{} <= {}", a, b)), Value::Bool(a <= b));
        prop_assert_eq!(compile_and_run(&format!("{} > {}", a, b)), Value::Bool(a > b));
        prop_assert_eq!(compile_and_run(&format!("{} >= {}", a, b)), Value::Bool(a >= b));
        prop_assert_eq!(compile_and_run(&format!("{} == {}", a, b)), Value::Bool(a == b));
        prop_assert_eq!(compile_and_run(&format!("{} != {}", a, b)), Value::Bool(a != b));
    }

    #[test]
    fn bitwise_matches_host(a in any::<i64>(), b in any::<i64>()) {
        // i64::MIN has no literal spelling (the lexer reads the magnitude first).
        prop_assume!(a != i64::MIN && b != i64::MIN);
        prop_assert_eq!(compile_and_run(&format!("({}) & ({})", a, b)), Value::Int(a & b));
        prop_assert_eq!(compile_and_run(&format!("({}) | ({})", a, b)), Value::Int(a | b));
        prop_assert_eq!(compile_and_run(&format!("({}) ^ ({})", a, b)), Value::Int(a ^ b));
    }

    #[test]
    fn int_literals_round_trip(n in any::<i64>()) {
        prop_assume!(n != i64::MIN); // -(i64::MIN) is not a literal the lexer can produce
        let result = compile_and_run(&format!("({})", n));
        prop_assert_eq!(result, Value::Int(n));
    }

    #[test]
    fn list_literals_preserve_order(items in proptest::collection::vec(arb_small_int(), 0..20)) {
        let rendered: Vec<String> = items.iter().map(|n| n.to_string()).collect();
        let result = compile_and_run(&format!("[{}]", rendered.join(", ")));
        let expected = Value::list(items.into_iter().map(Value::Int).collect());
        prop_assert_eq!(result, expected);
    }

    #[test]
    fn unary_negation_round_trips(n in arb_small_int()) {
        let result = compile_and_run(&format!("-({})", n));
        prop_assert_eq!(result, Value::Int(-n));
    }
}
