//! `select`, `drop`, and the two host intrinsics `memory.size`/`memory.grow`
//! (§4.1.7) — whatever the other lowering groups don't claim.

use wasmparser::Operator;

use crate::abc::Instruction;
use crate::error::Result;

use super::Ctx;

pub fn lower(ctx: &mut Ctx, op: &Operator) -> Result<bool> {
    match op {
        Operator::Select => {
            lower_select(ctx);
            Ok(true)
        }
        Operator::Drop => {
            ctx.emit(Instruction::Pop);
            Ok(true)
        }
        Operator::MemorySize { .. } => {
            ctx.emit(Instruction::GetLocal(0));
            let name = ctx.pool.intern_qname("wasm$memory_size");
            ctx.emit(Instruction::CallProperty { name, argc: 0 });
            ctx.emit(Instruction::ConvertI);
            Ok(true)
        }
        Operator::MemoryGrow { .. } => {
            // `pages` is already on top of the stack; `this` has to go beneath it.
            ctx.emit(Instruction::GetLocal(0));
            ctx.emit(Instruction::Swap);
            let name = ctx.pool.intern_qname("wasm$memory_grow");
            ctx.emit(Instruction::CallProperty { name, argc: 1 });
            ctx.emit(Instruction::ConvertI);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Both arms are already on the stack (`[if_true, if_false, cond]`), pushed
/// in Wasm's own order, so both were evaluated unconditionally exactly as
/// Wasm's `select` requires. Only the *choice* is conditional: fold it into
/// a jump over a `swap` that brings the dead value to the top, then drop it.
fn lower_select(ctx: &mut Ctx) {
    let do_swap = ctx.labels.fresh();
    let after = ctx.labels.fresh();
    ctx.emit(Instruction::IfFalse(do_swap));
    ctx.emit(Instruction::Jump(after));
    ctx.emit(Instruction::Label(do_swap));
    ctx.emit(Instruction::Swap);
    ctx.emit(Instruction::Label(after));
    ctx.emit(Instruction::Pop);
}
