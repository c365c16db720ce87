//! Property-based tests for the WASM-to-AVM2 compiler.
//!
//! Run over symbolic reference semantics via `sim::assert_stack_balance`/
//! `check_labels` rather than a live AVM2 VM, which this crate never links.

#![cfg(feature = "test-harness")]

use proptest::prelude::*;

use wasm_avm2::sim::{assert_stack_balance, check_labels};
use wasm_avm2::test_harness::{assert_has_pattern, compile_wat, find_method};

fn check_every_method_balances(class: &wasm_avm2::abc::AbcClass) {
    for method in &class.methods {
        assert_stack_balance(&method.body.instructions, method.body.max_stack)
            .unwrap_or_else(|e| panic!("method `{}` unbalanced: {e}", method.name));
        check_labels(&method.body.instructions)
            .unwrap_or_else(|e| panic!("method `{}` has malformed labels: {e}", method.name));
    }
    assert_stack_balance(&class.instance_init.instructions, class.instance_init.max_stack)
        .expect("instance initializer unbalanced");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Arithmetic round-trips (§8): `i32.add` with any pair of constant
    /// operands lowers to a stack-balanced, label-well-formed method,
    /// regardless of whether either operand needed `pushint` or fit `pushbyte`.
    #[test]
    fn i32_add_const_always_balances(a in any::<i32>(), b in any::<i32>()) {
        let wat = format!(
            r#"(module
                (func (export "main") (result i32)
                    i32.const {a}
                    i32.const {b}
                    i32.add))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// `i32.const` chooses `pushbyte` exactly for values representable in
    /// an `i8`, and `pushint` otherwise — the boundary is never off by one.
    #[test]
    fn i32_const_encoding_matches_i8_boundary(value in any::<i32>()) {
        let wat = format!(
            r#"(module (func (export "main") (result i32) i32.const {value}))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        let method = find_method(&class, "main").expect("method present");
        let expect_byte = i8::try_from(value).is_ok();
        let has_pushbyte = assert_has_pattern(&method.body.instructions, &["pushbyte"]);
        let has_pushint = assert_has_pattern(&method.body.instructions, &["pushint"]);
        prop_assert_eq!(has_pushbyte, expect_byte, "value={value}");
        prop_assert_eq!(has_pushint, !expect_byte, "value={value}");
    }

    /// Peephole equivalence (§8): chaining `i32.add`/`i32.sub`/`i32.mul` any
    /// number of times still produces a balanced, well-labeled method, and
    /// every accumulation step still carries its `convert_i` rewrap.
    #[test]
    fn i32_arithmetic_chain_balances(ops in prop::collection::vec(0u8..3, 1..12)) {
        let mut body = String::from("local.get 0\n");
        for (i, op) in ops.iter().enumerate() {
            let opname = match op {
                0 => "i32.add",
                1 => "i32.sub",
                _ => "i32.mul",
            };
            body.push_str(&format!("i32.const {}\n{opname}\n", i as i32 + 1));
        }
        let wat = format!(
            r#"(module (func (export "main") (param i32) (result i32) {body}))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// Unsigned and signed comparisons both balance for any constant pair,
    /// whether or not the comparison folds into a branch.
    #[test]
    fn comparisons_balance_standalone_and_in_branch(a in any::<i32>(), b in any::<i32>(), branch in any::<bool>()) {
        let tail = if branch {
            "(if (then (i32.const 1) (return)) (else (i32.const 0) (return)))"
        } else {
            ""
        };
        let wat = format!(
            r#"(module
                (func (export "main") (result i32)
                    i32.const {a}
                    i32.const {b}
                    i32.lt_u
                    {tail}))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// Nested blocks of any depth still balance and resolve every label.
    #[test]
    fn nested_blocks_balance(depth in 1usize..12) {
        let mut body = String::new();
        for _ in 0..depth {
            body.push_str("(block ");
        }
        body.push_str("nop");
        for _ in 0..depth {
            body.push(')');
        }
        let wat = format!(
            r#"(module (func (export "main") (param i32) (result i32) {body} local.get 0))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// Nested loops of any depth still balance and resolve every label.
    #[test]
    fn nested_loops_balance(depth in 1usize..8) {
        let mut body = String::new();
        for _ in 0..depth {
            body.push_str("(block (loop ");
        }
        body.push_str("nop");
        for _ in 0..depth {
            body.push_str("))");
        }
        let wat = format!(
            r#"(module (func (export "main") (param i32) (result i32) {body} local.get 0))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// Functions of any param count still balance (every param is coerced
    /// through `convert_i`/`convert_d` in the prologue, none left behind).
    #[test]
    fn varying_param_counts_balance(num_params in 1usize..12) {
        let params: String = (0..num_params).map(|_| "(param i32)").collect::<Vec<_>>().join(" ");
        let wat = format!(
            r#"(module (func (export "main") {params} (result i32) local.get 0))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// A module-level global of any constant i32 initial value still
    /// produces a balanced instance initializer.
    #[test]
    fn global_init_balances(init_val in any::<i32>()) {
        let wat = format!(
            r#"(module
                (global $g (mut i32) (i32.const {init_val}))
                (func (export "main") (result i32) global.get $g))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// `i32.reinterpret_f32`/`f32.reinterpret_i32`/`f32.demote_f64` all route
    /// through the scratch-buffer helpers and balance for any constant input.
    #[test]
    fn reinterpret_and_demote_balance(variant in 0u8..3) {
        let wat = match variant {
            0 => r#"(module (func (export "main") (result i32) f32.const 1.5 i32.reinterpret_f32))"#.to_string(),
            1 => r#"(module (func (export "main") (result f32) i32.const 1 f32.reinterpret_i32))"#.to_string(),
            _ => r#"(module (func (export "main") (result f32) f64.const 1.5 f32.demote_f64))"#.to_string(),
        };
        let class = compile_wat(&wat).expect("compiles");
        check_every_method_balances(&class);
    }

    /// `local.get k; i32.const ±1; i32.add; local.set/tee k` folds into
    /// `inclocal_i`/`declocal_i` and still balances, for any local slot and
    /// either tee or plain set.
    #[test]
    fn inc_dec_local_peephole_balances(num_params in 1usize..6, delta in prop::sample::select(vec![1i32, -1i32]), use_tee in any::<bool>()) {
        let params: String = (0..num_params).map(|_| "(param i32)").collect::<Vec<_>>().join(" ");
        let set_or_tee = if use_tee { "local.tee 0" } else { "local.set 0" };
        let wat = format!(
            r#"(module
                (func (export "main") {params} (result i32)
                    local.get 0
                    i32.const {delta}
                    i32.add
                    {set_or_tee}
                    local.get 0))"#
        );
        let class = compile_wat(&wat).expect("compiles");
        let method = find_method(&class, "main").expect("method present");
        assert!(assert_has_pattern(
            &method.body.instructions,
            if delta == 1 { &["inclocal_i"] } else { &["declocal_i"] },
        ));
        check_every_method_balances(&class);
    }
}
