//! Linear-memory load/store lowering onto AVM2's domain-memory opcodes
//! (§4.1.4). `li*`/`si*` always address the `ByteArray` currently attached as
//! the running script's domain memory (wired up once, in the function
//! lowerer's prologue and the instance initializer, §4.2/§4.3) — this module
//! only ever emits the address arithmetic and the access itself.
//!
//! A non-zero `memarg.offset` has to be folded into the address. Wasm's
//! postfix encoding pushes pointer then value, but AVM2's `si*` opcodes pop
//! address first and then value — the reverse order — so every store needs
//! one `swap` to bring the address to the top before the offset (if any) is
//! added, and no swap back: unlike the call-argument reordering in
//! `calls.rs` this never needs a temporary local.

use wasmparser::{MemArg, Operator};

use crate::abc::Instruction;
use crate::error::Result;

use super::Ctx;

pub fn lower(ctx: &mut Ctx, op: &Operator) -> Result<bool> {
    match op {
        Operator::I32Load { memarg } => {
            adjust_top_address(ctx, memarg);
            ctx.emit(Instruction::Li32);
            Ok(true)
        }
        Operator::I32Load8S { memarg } => {
            adjust_top_address(ctx, memarg);
            ctx.emit(Instruction::Li8);
            Ok(true)
        }
        Operator::I32Load8U { memarg } => {
            adjust_top_address(ctx, memarg);
            ctx.emit(Instruction::Li8);
            ctx.emit(Instruction::PushShort(0xff));
            ctx.emit(Instruction::BitAnd);
            Ok(true)
        }
        Operator::I32Load16S { memarg } => {
            adjust_top_address(ctx, memarg);
            ctx.emit(Instruction::Li16);
            Ok(true)
        }
        Operator::I32Load16U { memarg } => {
            adjust_top_address(ctx, memarg);
            ctx.emit(Instruction::Li16);
            ctx.emit(Instruction::PushShort(0xffff));
            ctx.emit(Instruction::BitAnd);
            Ok(true)
        }
        Operator::F32Load { memarg } => {
            adjust_top_address(ctx, memarg);
            ctx.emit(Instruction::Lf32);
            Ok(true)
        }
        Operator::F64Load { memarg } => {
            adjust_top_address(ctx, memarg);
            ctx.emit(Instruction::Lf64);
            Ok(true)
        }

        Operator::I32Store { memarg } => {
            adjust_buried_address(ctx, memarg);
            ctx.emit(Instruction::Si32);
            Ok(true)
        }
        Operator::I32Store8 { memarg } => {
            adjust_buried_address(ctx, memarg);
            ctx.emit(Instruction::Si8);
            Ok(true)
        }
        Operator::I32Store16 { memarg } => {
            adjust_buried_address(ctx, memarg);
            ctx.emit(Instruction::Si16);
            Ok(true)
        }
        Operator::F32Store { memarg } => {
            adjust_buried_address(ctx, memarg);
            ctx.emit(Instruction::Sf32);
            Ok(true)
        }
        Operator::F64Store { memarg } => {
            adjust_buried_address(ctx, memarg);
            ctx.emit(Instruction::Sf64);
            Ok(true)
        }

        _ => Ok(false),
    }
}

/// `[addr]` -> `[addr + offset]`, for loads where the address is already on top.
fn adjust_top_address(ctx: &mut Ctx, memarg: &MemArg) {
    if memarg.offset == 0 {
        return;
    }
    push_offset(ctx, memarg.offset);
    ctx.emit(Instruction::Add);
    ctx.emit(Instruction::ConvertI);
}

/// `[addr, value]` -> `[value, addr + offset]`. Wasm pushes pointer then
/// value; AVM2's `si*` pops address first, then value, so the buried address
/// always needs exactly one `swap` to reach the top, regardless of whether
/// there's an offset to fold in.
fn adjust_buried_address(ctx: &mut Ctx, memarg: &MemArg) {
    ctx.emit(Instruction::Swap);
    if memarg.offset == 0 {
        return;
    }
    push_offset(ctx, memarg.offset);
    ctx.emit(Instruction::Add);
    ctx.emit(Instruction::ConvertI);
}

fn push_offset(ctx: &mut Ctx, offset: u64) {
    let offset = offset as u32;
    if let Ok(v) = i8::try_from(offset) {
        ctx.emit(Instruction::PushByte(v));
    } else {
        let idx = ctx.pool.intern_int(offset as i32);
        ctx.emit(Instruction::PushInt(idx));
    }
}
