//! Direct and indirect call lowering (§4.1.6).
//!
//! By the time either `Call` or `CallIndirect` is reached, Wasm's postfix
//! encoding has already pushed every operand (and, for `call_indirect`, the
//! table index on top of them) in the program's original evaluation order —
//! walking the flat operator stream in order is itself what preserves that
//! ordering, so this module only has to get AVM2's call convention (receiver
//! or callee *before* the arguments) back from a stack that already has them
//! in the opposite arrangement.
//!
//! A direct call needs `this` inserted below 0/1/N already-pushed arguments:
//! for 0 args there's nothing to reorder, for 1 a single `swap` suffices, for
//! 2+ the general case buffers every argument through a temporary local.
//! `call_indirect` additionally has to derive the callee itself (`this.
//! wasm$table[idx]`) from a value that sits on *top* of all the arguments, so
//! it always takes the temporary-local path.

use wasmparser::Operator;

use crate::abc::Instruction;
use crate::error::Result;
use crate::wasm_module::{FuncType, NumType};

use super::Ctx;

pub fn lower(ctx: &mut Ctx, op: &Operator) -> Result<bool> {
    match op {
        Operator::Call { function_index } => {
            lower_call(ctx, *function_index)?;
            Ok(true)
        }
        Operator::CallIndirect { type_index, .. } => {
            lower_call_indirect(ctx, *type_index)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// The callee's trait name and declared signature, resolved across the
/// imports-then-locals function index space.
fn callee_info(ctx: &Ctx, function_index: u32) -> Result<(String, FuncType)> {
    let num_imported = ctx.module.num_imported_funcs();
    if function_index < num_imported {
        let import = &ctx.module.imports[function_index as usize];
        let ty = ctx
            .module
            .import_func_type(import)
            .ok_or_else(|| ctx.err_malformed(format!("import {function_index} has no type")))?;
        Ok((format!("func${}", import.base), ty.clone()))
    } else {
        let local_idx = (function_index - num_imported) as usize;
        let name = ctx
            .module
            .function_names
            .get(local_idx)
            .ok_or_else(|| ctx.err_malformed(format!("call target {function_index} out of range")))?
            .clone();
        let ty = ctx
            .module
            .local_func_type(local_idx)
            .ok_or_else(|| ctx.err_malformed(format!("function {function_index} has no type")))?;
        Ok((name, ty.clone()))
    }
}

fn lower_call(ctx: &mut Ctx, function_index: u32) -> Result<()> {
    let (name, ty) = callee_info(ctx, function_index)?;
    let argc = ty.params.len() as u32;
    insert_receiver_below_args(ctx, argc);
    let qname = ctx.pool.intern_qname(name);
    emit_call_property(ctx, qname, argc, ty.results.first().copied());
    Ok(())
}

/// Gets `this` under the `argc` values already sitting on top of the stack.
fn insert_receiver_below_args(ctx: &mut Ctx, argc: u32) {
    match argc {
        0 => ctx.emit(Instruction::GetLocal(0)),
        1 => {
            ctx.emit(Instruction::GetLocal(0));
            ctx.emit(Instruction::Swap);
        }
        _ => {
            let temps = buffer_into_temps(ctx, argc);
            ctx.emit(Instruction::GetLocal(0));
            reload_temps(ctx, &temps);
        }
    }
}

/// Pops `count` values off the top of the stack into fresh temporaries, in
/// argument order (the last-pushed value is popped first).
fn buffer_into_temps(ctx: &mut Ctx, count: u32) -> Vec<u32> {
    let temps: Vec<u32> = (0..count).map(|_| ctx.free.acquire()).collect();
    for &slot in temps.iter().rev() {
        ctx.emit(Instruction::SetLocal(slot));
    }
    temps
}

/// Pushes each temporary back in order and releases it.
fn reload_temps(ctx: &mut Ctx, temps: &[u32]) {
    for &slot in temps {
        ctx.emit(Instruction::GetLocal(slot));
    }
    for &slot in temps {
        ctx.free.release(slot);
    }
}

fn emit_call_property(ctx: &mut Ctx, name: u32, argc: u32, result: Option<NumType>) {
    match result {
        None => ctx.emit(Instruction::CallPropVoid { name, argc }),
        Some(ty) => {
            ctx.emit(Instruction::CallProperty { name, argc });
            coerce_result(ctx, ty);
        }
    }
}

fn coerce_result(ctx: &mut Ctx, ty: NumType) {
    match ty {
        NumType::I32 => ctx.emit(Instruction::ConvertI),
        NumType::F32 | NumType::F64 => ctx.emit(Instruction::ConvertD),
    }
}

fn lower_call_indirect(ctx: &mut Ctx, type_index: u32) -> Result<()> {
    let ty = ctx
        .module
        .func_types
        .get(type_index as usize)
        .ok_or_else(|| ctx.err_malformed(format!("call_indirect type {type_index} out of range")))?
        .clone();
    let argc = ty.params.len() as u32;

    // The table index sits on top of the already-pushed arguments.
    let idx_temp = ctx.free.acquire();
    ctx.emit(Instruction::SetLocal(idx_temp));
    let arg_temps = buffer_into_temps(ctx, argc);

    let table_name = ctx.pool.intern_qname("wasm$table");
    ctx.emit(Instruction::GetLocal(0));
    ctx.emit(Instruction::GetProperty(table_name));
    ctx.emit(Instruction::GetLocal(idx_temp));
    let late_name = ctx.pool.intern_late_multiname_public();
    ctx.emit(Instruction::GetPropertyLate(late_name)); // the callee Function value

    ctx.emit(Instruction::PushNull); // `this` for Function.call
    reload_temps(ctx, &arg_temps);
    ctx.free.release(idx_temp);

    let call_name = ctx.pool.intern_qname("call");
    emit_call_property(ctx, call_name, argc + 1, ty.results.first().copied());
    Ok(())
}
