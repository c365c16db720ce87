//! The expression lowerer's main dispatch loop (§4.1).
//!
//! Wasm's binary encoding is already a flat, stack-based token stream: each
//! structured construct (`block`/`loop`/`if`) recurses into its own nested
//! run of operators terminated by a matching `end` (or `else`). Walking it
//! with a recursive-descent function over that stream reconstructs exactly
//! the same nesting §4.1.1 describes as a tree walk — it only changes how
//! the tree is discovered, not what gets emitted for it.

use wasmparser::Operator;

use crate::error::Result;

use super::cursor::OpCursor;
use super::{calls, control_flow, locals, memory, misc, numeric, Ctx};

/// Why a nested `lower_ops` call returned: the `end`/`else` that closes its
/// own enclosing construct, or (only at the top level) the function body's
/// own closing `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    FunctionEnd,
    End,
    Else,
}

/// Lowers operators until the construct this call was invoked for closes.
/// `top_level` is true only for the function body's own outermost sequence.
pub fn lower_ops(ctx: &mut Ctx, cursor: &mut OpCursor, top_level: bool) -> Result<Stop> {
    loop {
        let op = cursor.next().map_err(|e| ctx.err_malformed(format!("{e}")))?;
        match op {
            Operator::End => {
                return Ok(if top_level { Stop::FunctionEnd } else { Stop::End });
            }
            Operator::Else => return Ok(Stop::Else),

            Operator::Block { .. } => control_flow::lower_block(ctx, cursor)?,
            Operator::Loop { .. } => control_flow::lower_loop(ctx, cursor)?,
            Operator::If { .. } => control_flow::lower_if(ctx, cursor)?,
            Operator::Br { relative_depth } => control_flow::lower_br(ctx, relative_depth)?,
            Operator::BrIf { relative_depth } => {
                control_flow::lower_br_if(ctx, relative_depth)?;
            }
            Operator::BrTable { ref targets } => control_flow::lower_br_table(ctx, targets)?,
            Operator::Return => control_flow::lower_return(ctx)?,
            Operator::Unreachable => control_flow::lower_unreachable(ctx)?,
            Operator::Nop => ctx.emit(crate::abc::Instruction::Nop),

            other => dispatch_leaf(ctx, cursor, &other)?,
        }
    }
}

/// Every non-structural operator: numeric, memory, locals/globals, calls,
/// and the remaining misc ops (`select`/`drop`/`memory.size`/`memory.grow`).
/// Tried in turn; each lowering group claims only the operators it owns.
fn dispatch_leaf(ctx: &mut Ctx, cursor: &mut OpCursor, op: &Operator) -> Result<()> {
    if numeric::lower(ctx, cursor, op)? {
        return Ok(());
    }
    if memory::lower(ctx, op)? {
        return Ok(());
    }
    if locals::lower(ctx, op)? {
        return Ok(());
    }
    if calls::lower(ctx, op)? {
        return Ok(());
    }
    if misc::lower(ctx, op)? {
        return Ok(());
    }
    Err(ctx.err_unsupported(format!("{op:?}")))
}
