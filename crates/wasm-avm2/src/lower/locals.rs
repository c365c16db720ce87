//! Local and global variable access (§4.1.5).
//!
//! Globals live as Slot traits on the instance (`global$<name>`), discovered
//! lazily as they're first referenced (§9) rather than enumerated up front,
//! so access goes through `getproperty`/`setproperty` by qname instead of a
//! slot index the module assembler hasn't settled on yet at this point in
//! lowering.

use wasmparser::Operator;

use crate::abc::Instruction;
use crate::error::Result;

use super::Ctx;

pub fn lower(ctx: &mut Ctx, op: &Operator) -> Result<bool> {
    match op {
        Operator::LocalGet { local_index } => {
            ctx.emit(Instruction::GetLocal(Ctx::avm_local(*local_index)));
            Ok(true)
        }
        Operator::LocalSet { local_index } => {
            let target = Ctx::avm_local(*local_index);
            match fold_inc_dec(ctx, target) {
                Some(instr) => ctx.emit(instr),
                None => ctx.emit(Instruction::SetLocal(target)),
            }
            Ok(true)
        }
        Operator::LocalTee { local_index } => {
            let target = Ctx::avm_local(*local_index);
            match fold_inc_dec(ctx, target) {
                Some(instr) => {
                    ctx.emit(instr);
                    ctx.emit(Instruction::GetLocal(target));
                }
                None => {
                    ctx.emit(Instruction::Dup);
                    ctx.emit(Instruction::SetLocal(target));
                }
            }
            Ok(true)
        }
        Operator::GlobalGet { global_index } => {
            let name = global_name(ctx, *global_index)?;
            ctx.refs.register_global(&name);
            let qname = ctx.pool.intern_qname(format!("global${name}"));
            ctx.emit(Instruction::GetLocal(0));
            ctx.emit(Instruction::GetProperty(qname));
            Ok(true)
        }
        Operator::GlobalSet { global_index } => {
            let name = global_name(ctx, *global_index)?;
            ctx.refs.register_global(&name);
            let qname = ctx.pool.intern_qname(format!("global${name}"));
            // Value is already on the stack; `this` has to go underneath it.
            ctx.emit(Instruction::GetLocal(0));
            ctx.emit(Instruction::Swap);
            ctx.emit(Instruction::SetProperty(qname));
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Peephole (§4.1.5): `local.get k; i32.const ±1; i32.add` immediately
/// before a `local.set`/`local.tee k` already sits at the tail of `ctx.out`
/// by the time the `local.set`/`local.tee` operator arrives (Wasm's postfix
/// encoding evaluates the value first), so the fold is a look-behind over
/// the already-emitted instructions rather than a look-ahead over the
/// operator stream. Returns the replacement instruction and deletes the
/// four instructions it replaces; `None` leaves `ctx.out` untouched.
fn fold_inc_dec(ctx: &mut Ctx, target: u32) -> Option<Instruction> {
    let len = ctx.out.len();
    if len < 4 {
        return None;
    }
    let delta = match &ctx.out[len - 4..] {
        [Instruction::GetLocal(s), Instruction::PushByte(c), Instruction::Add, Instruction::ConvertI]
            if *s == target && (*c == 1 || *c == -1) =>
        {
            *c
        }
        _ => return None,
    };
    for instr in ctx.out.drain(len - 4..) {
        let (pops, pushes) = instr.stack_effect();
        ctx.stack.rewind(pops, pushes);
    }
    Some(if delta == 1 {
        Instruction::IncLocalI(target)
    } else {
        Instruction::DecLocalI(target)
    })
}

fn global_name(ctx: &Ctx, global_index: u32) -> Result<String> {
    ctx.module
        .globals
        .get(global_index as usize)
        .map(|g| g.name.clone().unwrap_or_else(|| format!("g{global_index}")))
        .ok_or_else(|| ctx.err_malformed(format!("global index {global_index} out of range")))
}
