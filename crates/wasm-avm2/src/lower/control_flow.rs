//! Structured control flow: `block`/`loop`/`if`/`br`/`br_if`/`br_table`,
//! `return`, `unreachable` (§4.1.1), and conditional-jump folding (§4.1.2).

use wasmparser::BrTable;

use crate::abc::{Instruction, LabelId};
use crate::error::Result;

use super::cursor::OpCursor;
use super::expr::{lower_ops, Stop};
use super::labels::FrameKind;
use super::{Ctx, PendingCompare, SignedCompareOp, UnsignedCompareOp};

pub fn lower_block(ctx: &mut Ctx, cursor: &mut OpCursor) -> Result<()> {
    let name = ctx.fresh_label_name("block");
    ctx.labels.push_unbound(FrameKind::Block, name);
    let stop = lower_ops(ctx, cursor, false)?;
    if stop != Stop::End {
        return Err(ctx.err_malformed("block body did not close with `end`"));
    }
    let frame = ctx.labels.pop();
    if ctx.labels.is_used(frame.label) {
        ctx.emit(Instruction::Label(frame.label));
    }
    Ok(())
}

pub fn lower_loop(ctx: &mut Ctx, cursor: &mut OpCursor) -> Result<()> {
    let name = ctx.fresh_label_name("loop");
    ctx.labels.push_loop(name, &mut ctx.out);
    let stop = lower_ops(ctx, cursor, false)?;
    if stop != Stop::End {
        return Err(ctx.err_malformed("loop body did not close with `end`"));
    }
    ctx.labels.pop();
    Ok(())
}

pub fn lower_if(ctx: &mut Ctx, cursor: &mut OpCursor) -> Result<()> {
    let cond = ctx.pending_compare.take();
    let else_or_end = ctx.labels.fresh();
    emit_conditional_jump(ctx, cond, else_or_end, true);

    let name = ctx.fresh_label_name("if");
    let end_label = ctx.labels.push_unbound(FrameKind::If, name);
    let stop = lower_ops(ctx, cursor, false)?;
    match stop {
        Stop::Else => {
            ctx.emit(Instruction::Jump(end_label));
            ctx.labels.mark_used(end_label);
            ctx.emit(Instruction::Label(else_or_end));
            let stop2 = lower_ops(ctx, cursor, false)?;
            if stop2 != Stop::End {
                return Err(ctx.err_malformed("if-else body did not close with `end`"));
            }
        }
        Stop::End => {
            ctx.emit(Instruction::Label(else_or_end));
        }
        Stop::FunctionEnd => return Err(ctx.err_malformed("if body ran past function end")),
    }
    let frame = ctx.labels.pop();
    if ctx.labels.is_used(frame.label) {
        ctx.emit(Instruction::Label(frame.label));
    }
    Ok(())
}

pub fn lower_br(ctx: &mut Ctx, relative_depth: u32) -> Result<()> {
    let label = ctx
        .labels
        .resolve_relative_depth(relative_depth)
        .ok_or_else(|| ctx.err_malformed(format!("br target depth {relative_depth} out of range")))?;
    ctx.emit(Instruction::Jump(label));
    Ok(())
}

pub fn lower_br_if(ctx: &mut Ctx, relative_depth: u32) -> Result<()> {
    let label = ctx
        .labels
        .resolve_relative_depth(relative_depth)
        .ok_or_else(|| ctx.err_malformed(format!("br_if target depth {relative_depth} out of range")))?;
    let cond = ctx.pending_compare.take();
    emit_conditional_jump(ctx, cond, label, false);
    Ok(())
}

pub fn lower_br_table(ctx: &mut Ctx, targets: &BrTable) -> Result<()> {
    let mut cases = Vec::new();
    for depth in targets.targets() {
        let depth = depth.map_err(|e| ctx.err_malformed(format!("{e}")))?;
        let label = ctx
            .labels
            .resolve_relative_depth(depth)
            .ok_or_else(|| ctx.err_malformed(format!("br_table target depth {depth} out of range")))?;
        cases.push(label);
    }
    let default_label = ctx
        .labels
        .resolve_relative_depth(targets.default())
        .ok_or_else(|| ctx.err_malformed("br_table default target out of range"))?;
    ctx.emit(Instruction::LookupSwitch {
        default: default_label,
        cases,
    });
    Ok(())
}

pub fn lower_return(ctx: &mut Ctx) -> Result<()> {
    if ctx.result_type.is_some() {
        ctx.emit(Instruction::ReturnValue);
    } else {
        ctx.emit(Instruction::ReturnVoid);
    }
    Ok(())
}

pub fn lower_unreachable(ctx: &mut Ctx) -> Result<()> {
    let idx = ctx.pool.intern_string("unreachable executed");
    ctx.emit(Instruction::PushString(idx));
    ctx.emit(Instruction::Throw);
    Ok(())
}

/// Emits the conditional jump to `target`, folding a pending comparison
/// directly into a comparator-branch (§4.1.2) instead of materializing a
/// Boolean first. `invert` selects `if`'s "jump away when false" polarity
/// versus `br_if`'s "jump to the target when true".
fn emit_conditional_jump(ctx: &mut Ctx, cond: Option<PendingCompare>, target: LabelId, invert: bool) {
    match cond {
        None => {
            if invert {
                ctx.emit(Instruction::IfFalse(target));
            } else {
                ctx.emit(Instruction::IfTrue(target));
            }
        }
        Some(PendingCompare::EqZero) => {
            // eqz(v) is true when v == 0. `if` jumps away when the
            // condition is false (v != 0); `br_if` jumps when it's true.
            if invert {
                ctx.emit(Instruction::IfTrue(target));
            } else {
                ctx.emit(Instruction::IfFalse(target));
            }
        }
        Some(PendingCompare::Signed(op)) => {
            let instr = match (op, invert) {
                (SignedCompareOp::Eq, false) => Instruction::IfEq(target),
                (SignedCompareOp::Eq, true) => Instruction::IfNe(target),
                (SignedCompareOp::Ne, false) => Instruction::IfNe(target),
                (SignedCompareOp::Ne, true) => Instruction::IfEq(target),
                (SignedCompareOp::Lt, false) => Instruction::IfLt(target),
                (SignedCompareOp::Lt, true) => Instruction::IfNLt(target),
                (SignedCompareOp::Le, false) => Instruction::IfLe(target),
                (SignedCompareOp::Le, true) => Instruction::IfNLe(target),
                (SignedCompareOp::Gt, false) => Instruction::IfGt(target),
                (SignedCompareOp::Gt, true) => Instruction::IfNGt(target),
                (SignedCompareOp::Ge, false) => Instruction::IfGe(target),
                (SignedCompareOp::Ge, true) => Instruction::IfNGe(target),
            };
            ctx.emit(instr);
        }
        Some(PendingCompare::Unsigned(op)) => {
            let instr = match (op, invert) {
                (UnsignedCompareOp::Lt, false) => Instruction::IfLt(target),
                (UnsignedCompareOp::Lt, true) => Instruction::IfNLt(target),
                (UnsignedCompareOp::Le, false) => Instruction::IfLe(target),
                (UnsignedCompareOp::Le, true) => Instruction::IfNLe(target),
                (UnsignedCompareOp::Gt, false) => Instruction::IfGt(target),
                (UnsignedCompareOp::Gt, true) => Instruction::IfNGt(target),
                (UnsignedCompareOp::Ge, false) => Instruction::IfGe(target),
                (UnsignedCompareOp::Ge, true) => Instruction::IfNGe(target),
            };
            ctx.emit(instr);
        }
    }
    ctx.labels.mark_used(target);
}
