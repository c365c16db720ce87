//! End-to-end scenarios: compiles small WAT fixtures and asserts on the
//! emitted instruction shape, mirroring the six scenarios the lowering
//! engine is built against.

#![cfg(feature = "test-harness")]

use wasm_avm2::sim::{assert_stack_balance, check_labels};
use wasm_avm2::test_harness::{assert_has_pattern, compile_wat, find_method};

#[test]
fn sample_add_i32_adds_its_two_params() {
    let wat = r#"
        (module
            (func (export "sample_add_i32") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let method = find_method(&class, "sample_add_i32").expect("method present");
    assert!(assert_has_pattern(
        &method.body.instructions,
        &["getlocal", "getlocal", "add", "convert_i", "returnvalue"],
    ));
    assert_stack_balance(&method.body.instructions, method.body.max_stack).expect("balanced");
    check_labels(&method.body.instructions).expect("labels well-formed");
}

#[test]
fn sample_add_f32_and_f64_skip_the_int_coercion() {
    let wat = r#"
        (module
            (func (export "sample_add_f32") (param f32 f32) (result f32)
                local.get 0
                local.get 1
                f32.add)
            (func (export "sample_add_f64") (param f64 f64) (result f64)
                local.get 0
                local.get 1
                f64.add))
    "#;
    let class = compile_wat(wat).expect("compiles");

    let add_f32 = find_method(&class, "sample_add_f32").expect("method present");
    assert!(assert_has_pattern(
        &add_f32.body.instructions,
        &["getlocal", "getlocal", "add", "returnvalue"],
    ));
    assert_stack_balance(&add_f32.body.instructions, add_f32.body.max_stack).expect("balanced");

    let add_f64 = find_method(&class, "sample_add_f64").expect("method present");
    assert!(assert_has_pattern(
        &add_f64.body.instructions,
        &["getlocal", "getlocal", "add", "returnvalue"],
    ));
    assert_stack_balance(&add_f64.body.instructions, add_f64.body.max_stack).expect("balanced");
}

#[test]
fn memory_grow_calls_the_memory_grow_helper() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (func (export "grow_by_one") (param i32) (result i32)
                local.get 0
                memory.grow))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let method = find_method(&class, "grow_by_one").expect("method present");
    assert!(assert_has_pattern(
        &method.body.instructions,
        &["getlocal", "getlocal", "swap", "callproperty", "convert_i", "returnvalue"],
    ));
    assert_stack_balance(&method.body.instructions, method.body.max_stack).expect("balanced");

    let helper = find_method(&class, "wasm$memory_grow").expect("helper present");
    assert_stack_balance(&helper.body.instructions, helper.body.max_stack).expect("balanced");
}

#[test]
fn indirect_call_reads_the_callee_from_the_table_before_invoking_it() {
    let wat = r#"
        (module
            (type $binop (func (param i32 i32) (result i32)))
            (table (export "table") 1 funcref)
            (func $add (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add)
            (elem (i32.const 0) $add)
            (func (export "call_it") (param i32 i32 i32) (result i32)
                local.get 1
                local.get 2
                local.get 0
                call_indirect (type $binop)))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let method = find_method(&class, "call_it").expect("method present");
    // Table lookup happens before the call, and both arguments are reloaded
    // in their original left-to-right order ahead of it.
    assert!(assert_has_pattern(
        &method.body.instructions,
        &["getpropertylate", "pushnull", "getlocal", "getlocal", "callproperty"],
    ));
    assert_stack_balance(&method.body.instructions, method.body.max_stack).expect("balanced");
    check_labels(&method.body.instructions).expect("labels well-formed");
}

#[test]
fn data_segment_is_written_through_the_memory_init_helper() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (data (i32.const 16) "hello"))
    "#;
    let class = compile_wat(wat).expect("compiles");
    assert!(assert_has_pattern(
        &class.instance_init.instructions,
        &["getlocal", "pushint", "pushstring", "callpropvoid"],
    ));
    assert_stack_balance(&class.instance_init.instructions, class.instance_init.max_stack)
        .expect("balanced");
}

#[test]
fn i32_store_swaps_address_under_value_to_the_top_before_si32() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (func (export "store_it") (param i32 i32)
                local.get 0
                local.get 1
                i32.store))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let method = find_method(&class, "store_it").expect("method present");
    // Wasm pushes pointer then value; `si32` pops address first, then
    // value, so a single `swap` has to bring the address back to the top.
    assert!(assert_has_pattern(
        &method.body.instructions,
        &["getlocal", "getlocal", "swap", "si32"],
    ));
    assert_stack_balance(&method.body.instructions, method.body.max_stack).expect("balanced");
}

#[test]
fn i32_store_with_offset_folds_the_offset_onto_the_address_after_the_swap() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (func (export "store_it") (param i32 i32)
                local.get 0
                local.get 1
                i32.store offset=4))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let method = find_method(&class, "store_it").expect("method present");
    assert!(assert_has_pattern(
        &method.body.instructions,
        &["getlocal", "getlocal", "swap", "pushbyte", "add", "convert_i", "si32"],
    ));
    assert_stack_balance(&method.body.instructions, method.body.max_stack).expect("balanced");
}

#[test]
fn memory_init_helper_stores_the_byte_value_before_the_address() {
    let wat = r#"
        (module
            (memory (export "memory") 1)
            (data (i32.const 16) "hello"))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let helper = find_method(&class, "wasm$memory_init").expect("helper present");
    // `si8` pops address first, then value: the char-code computation has to
    // appear (and finish) before the address computation that immediately
    // precedes `si8`, not after it.
    assert!(assert_has_pattern(
        &helper.body.instructions,
        &[
            "getlocal", "getlocal", "callproperty", "convert_i", "getlocal", "getlocal", "add",
            "convert_i", "si8",
        ],
    ));
    assert_stack_balance(&helper.body.instructions, helper.body.max_stack).expect("balanced");
}

#[test]
fn unsigned_less_than_reinterprets_both_operands_before_comparing() {
    let wat = r#"
        (module
            (func (export "lt_u") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.lt_u))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let method = find_method(&class, "lt_u").expect("method present");
    assert!(assert_has_pattern(
        &method.body.instructions,
        &[
            "getlocal", "getlocal", "swap", "convert_u", "swap", "convert_u", "lessthan",
            "convert_i",
        ],
    ));
    assert_stack_balance(&method.body.instructions, method.body.max_stack).expect("balanced");
}

#[test]
fn unreachable_throws() {
    let wat = r#"
        (module
            (func (export "trap")
                unreachable))
    "#;
    let class = compile_wat(wat).expect("compiles");
    let method = find_method(&class, "trap").expect("method present");
    assert!(assert_has_pattern(&method.body.instructions, &["pushstring", "throw"]));
    assert_stack_balance(&method.body.instructions, method.body.max_stack).expect("balanced");
}
