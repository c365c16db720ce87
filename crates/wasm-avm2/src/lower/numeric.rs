//! Constant, unary and binary numeric operator lowering (§4.1.3).
//!
//! AVM2 has no integer divide/modulo opcode and no unsigned comparator:
//! `divide`/`modulo` always compute ECMAScript Number arithmetic, and `<`/`>`
//! always compare mathematical value. Signed results are recovered by
//! truncating through `convert_i` (ECMAScript's `ToInt32`, which truncates
//! toward zero the same way Wasm's signed division does); unsigned ones by
//! reinterpreting both operands through `convert_u` first. Shifts need no
//! such treatment: `lshift`/`rshift`/`urshift` already perform `ToInt32`/
//! `ToUint32` internally per ECMAScript, matching Wasm's shift semantics
//! directly.
//!
//! `clz`/`ctz`/`popcnt`, `rotl`/`rotr`, `copysign`, `trunc` and `nearest` have
//! no cheap AVM2 encoding beyond `clz` (provided as a runtime helper method,
//! §4.3) and are otherwise rejected as unsupported: normalized input is
//! expected to have had them removed upstream, so seeing one here signals an
//! upstream-pass failure rather than something this lowerer should paper
//! over by inventing an approximation.
//!
//! `demote f64→f32` and the `i32`/`f32` `reinterpret` pair route through a
//! dedicated scratch `ByteArray` (distinct from the module's linear memory):
//! writing at one width and reading back at another forces either the
//! precision loss (`demote`) or the bit reinterpretation (`reinterpret`) that
//! AVM2's shared `Number` representation can't otherwise express.

use wasmparser::Operator;

use crate::abc::Instruction;
use crate::error::Result;

use super::cursor::OpCursor;
use super::{PendingCompare, SignedCompareOp, UnsignedCompareOp};

/// Tries to lower `op` as a constant/unary/binary numeric instruction.
/// Returns `Ok(false)` when `op` belongs to a different lowering group so
/// the caller can try the next one.
pub fn lower(ctx: &mut super::Ctx, cursor: &mut OpCursor, op: &Operator) -> Result<bool> {
    match op {
        Operator::I32Const { value } => {
            push_i32_const(ctx, *value);
            Ok(true)
        }
        Operator::F32Const { value } => {
            push_f64_const(ctx, f64::from(f32::from_bits(value.bits())));
            Ok(true)
        }
        Operator::F64Const { value } => {
            push_f64_const(ctx, f64::from_bits(value.bits()));
            Ok(true)
        }

        Operator::I32Eqz => {
            lower_eqz(ctx, cursor)?;
            Ok(true)
        }

        Operator::I32Eq | Operator::F32Eq | Operator::F64Eq => {
            lower_compare(ctx, cursor, SignedCompareOp::Eq)?;
            Ok(true)
        }
        Operator::I32Ne | Operator::F32Ne | Operator::F64Ne => {
            lower_compare(ctx, cursor, SignedCompareOp::Ne)?;
            Ok(true)
        }
        Operator::I32LtS | Operator::F32Lt | Operator::F64Lt => {
            lower_compare(ctx, cursor, SignedCompareOp::Lt)?;
            Ok(true)
        }
        Operator::I32LeS | Operator::F32Le | Operator::F64Le => {
            lower_compare(ctx, cursor, SignedCompareOp::Le)?;
            Ok(true)
        }
        Operator::I32GtS | Operator::F32Gt | Operator::F64Gt => {
            lower_compare(ctx, cursor, SignedCompareOp::Gt)?;
            Ok(true)
        }
        Operator::I32GeS | Operator::F32Ge | Operator::F64Ge => {
            lower_compare(ctx, cursor, SignedCompareOp::Ge)?;
            Ok(true)
        }
        Operator::I32LtU => {
            lower_unsigned_compare(ctx, cursor, UnsignedCompareOp::Lt)?;
            Ok(true)
        }
        Operator::I32LeU => {
            lower_unsigned_compare(ctx, cursor, UnsignedCompareOp::Le)?;
            Ok(true)
        }
        Operator::I32GtU => {
            lower_unsigned_compare(ctx, cursor, UnsignedCompareOp::Gt)?;
            Ok(true)
        }
        Operator::I32GeU => {
            lower_unsigned_compare(ctx, cursor, UnsignedCompareOp::Ge)?;
            Ok(true)
        }

        Operator::I32Add | Operator::F32Add | Operator::F64Add => {
            ctx.emit(Instruction::Add);
            convert_result(ctx, op);
            Ok(true)
        }
        Operator::I32Sub | Operator::F32Sub | Operator::F64Sub => {
            ctx.emit(Instruction::Subtract);
            convert_result(ctx, op);
            Ok(true)
        }
        Operator::I32Mul | Operator::F32Mul | Operator::F64Mul => {
            ctx.emit(Instruction::Multiply);
            convert_result(ctx, op);
            Ok(true)
        }
        Operator::F32Div | Operator::F64Div => {
            ctx.emit(Instruction::Divide);
            Ok(true)
        }
        Operator::I32DivS => {
            ctx.emit(Instruction::Divide);
            ctx.emit(Instruction::ConvertI);
            Ok(true)
        }
        Operator::I32DivU => {
            emit_unsigned_both(ctx);
            ctx.emit(Instruction::Divide);
            ctx.emit(Instruction::ConvertU);
            Ok(true)
        }
        Operator::I32RemS => {
            ctx.emit(Instruction::Modulo);
            ctx.emit(Instruction::ConvertI);
            Ok(true)
        }
        Operator::I32RemU => {
            emit_unsigned_both(ctx);
            ctx.emit(Instruction::Modulo);
            ctx.emit(Instruction::ConvertU);
            Ok(true)
        }
        Operator::I32And => {
            ctx.emit(Instruction::BitAnd);
            Ok(true)
        }
        Operator::I32Or => {
            ctx.emit(Instruction::BitOr);
            Ok(true)
        }
        Operator::I32Xor => {
            ctx.emit(Instruction::BitXor);
            Ok(true)
        }
        Operator::I32Shl => {
            ctx.emit(Instruction::LShift);
            Ok(true)
        }
        Operator::I32ShrS => {
            ctx.emit(Instruction::RShift);
            Ok(true)
        }
        Operator::I32ShrU => {
            ctx.emit(Instruction::URShift);
            Ok(true)
        }

        Operator::I32Clz => {
            emit_call_helper(ctx, "clz32", 1);
            Ok(true)
        }

        Operator::F32Neg | Operator::F64Neg => {
            ctx.emit(Instruction::Negate);
            Ok(true)
        }

        Operator::F32Abs | Operator::F64Abs => {
            emit_math_call(ctx, "abs", 1);
            Ok(true)
        }
        Operator::F32Sqrt | Operator::F64Sqrt => {
            emit_math_call(ctx, "sqrt", 1);
            Ok(true)
        }
        Operator::F32Ceil | Operator::F64Ceil => {
            emit_math_call(ctx, "ceil", 1);
            Ok(true)
        }
        Operator::F32Floor | Operator::F64Floor => {
            emit_math_call(ctx, "floor", 1);
            Ok(true)
        }
        Operator::F32Min | Operator::F64Min => {
            emit_math_call(ctx, "min", 2);
            Ok(true)
        }
        Operator::F32Max | Operator::F64Max => {
            emit_math_call(ctx, "max", 2);
            Ok(true)
        }

        Operator::I32TruncF32S | Operator::I32TruncF64S => {
            ctx.emit(Instruction::ConvertI);
            Ok(true)
        }
        Operator::I32TruncF32U | Operator::I32TruncF64U => {
            ctx.emit(Instruction::ConvertU);
            Ok(true)
        }
        Operator::F32ConvertI32S | Operator::F64ConvertI32S => {
            ctx.emit(Instruction::ConvertD);
            Ok(true)
        }
        Operator::F32ConvertI32U | Operator::F64ConvertI32U => {
            ctx.emit(Instruction::ConvertU);
            ctx.emit(Instruction::ConvertD);
            Ok(true)
        }
        Operator::F64PromoteF32 => {
            // Both Wasm types share the AVM2 Number representation: widening
            // f32 to f64 changes nothing about the bits already on the stack.
            Ok(true)
        }
        Operator::F32DemoteF64 => {
            // Narrowing does lose precision, and AVM2 has no dedicated f32
            // storage to force the rounding: `sf32` truncates its operand to
            // IEEE-754 single on the way into the scratch buffer, and `lf32`
            // widens it back out, so the round-trip reproduces exactly the
            // precision loss Wasm's `demote` requires.
            emit_call_helper(ctx, "wasm$demote_f64_f32", 1);
            Ok(true)
        }
        Operator::I32ReinterpretF32 => {
            // Same scratch-buffer trick, but writing and reading at the two
            // different integer/float widths reinterprets the bit pattern
            // instead of converting the value.
            emit_call_helper(ctx, "wasm$reinterpret_i32_f32", 1);
            Ok(true)
        }
        Operator::F32ReinterpretI32 => {
            emit_call_helper(ctx, "wasm$reinterpret_f32_i32", 1);
            Ok(true)
        }
        Operator::I32Extend8S => {
            ctx.emit(Instruction::SignExtend8);
            Ok(true)
        }
        Operator::I32Extend16S => {
            ctx.emit(Instruction::SignExtend16);
            Ok(true)
        }

        Operator::I32RotlS
        | Operator::I32Rotl
        | Operator::I32Rotr
        | Operator::I32Ctz
        | Operator::I32Popcnt
        | Operator::F32Copysign
        | Operator::F64Copysign
        | Operator::F32Trunc
        | Operator::F64Trunc
        | Operator::F32Nearest
        | Operator::F64Nearest => Err(ctx.err_unsupported(format!("{op:?}"))),

        _ => Ok(false),
    }
}

fn push_i32_const(ctx: &mut super::Ctx, value: i32) {
    if let Ok(v) = i8::try_from(value) {
        ctx.emit(Instruction::PushByte(v));
    } else {
        let idx = ctx.pool.intern_int(value);
        ctx.emit(Instruction::PushInt(idx));
    }
}

fn push_f64_const(ctx: &mut super::Ctx, value: f64) {
    if value.is_nan() {
        ctx.emit(Instruction::PushNan);
    } else {
        let idx = ctx.pool.intern_double(value);
        ctx.emit(Instruction::PushDouble(idx));
    }
}

/// `i32.add`/`i32.sub`/`i32.mul` need `convert_i` to wrap back into int32
/// range; float variants are already Number end to end.
fn convert_result(ctx: &mut super::Ctx, op: &Operator) {
    if matches!(
        op,
        Operator::I32Add | Operator::I32Sub | Operator::I32Mul
    ) {
        ctx.emit(Instruction::ConvertI);
    }
}

/// `urshift`/`lshift`/`rshift` don't need this, but `/`, `%` and unsigned
/// comparisons do: reinterpret both stack operands as unsigned in place.
fn emit_unsigned_both(ctx: &mut super::Ctx) {
    ctx.emit(Instruction::Swap);
    ctx.emit(Instruction::ConvertU);
    ctx.emit(Instruction::Swap);
    ctx.emit(Instruction::ConvertU);
}

fn emit_math_call(ctx: &mut super::Ctx, method: &str, arity: u32) {
    let temps: Vec<u32> = (0..arity).map(|_| ctx.free.acquire()).collect();
    for &slot in temps.iter().rev() {
        ctx.emit(Instruction::SetLocal(slot));
    }
    let math_name = ctx.pool.intern_qname("Math");
    ctx.emit(Instruction::GetLex(math_name));
    for &slot in &temps {
        ctx.emit(Instruction::GetLocal(slot));
    }
    let method_name = ctx.pool.intern_qname(method);
    ctx.emit(Instruction::CallProperty {
        name: method_name,
        argc: arity,
    });
    for slot in temps {
        ctx.free.release(slot);
    }
}

fn emit_call_helper(ctx: &mut super::Ctx, method: &str, arity: u32) {
    let temps: Vec<u32> = (0..arity).map(|_| ctx.free.acquire()).collect();
    for &slot in temps.iter().rev() {
        ctx.emit(Instruction::SetLocal(slot));
    }
    ctx.emit(Instruction::GetLocal(0)); // `this`: runtime helpers are instance methods
    for &slot in &temps {
        ctx.emit(Instruction::GetLocal(slot));
    }
    let method_name = ctx.pool.intern_qname(method);
    ctx.emit(Instruction::CallProperty {
        name: method_name,
        argc: arity,
    });
    for slot in temps {
        ctx.free.release(slot);
    }
}

/// `i32.eqz`: folds into the following branch when possible (§4.1.2),
/// otherwise materializes `value == 0` as an int.
fn lower_eqz(ctx: &mut super::Ctx, cursor: &mut OpCursor) -> Result<()> {
    if matches!(cursor.peek()?, Operator::If { .. } | Operator::BrIf { .. }) {
        ctx.pending_compare = Some(PendingCompare::EqZero);
        return Ok(());
    }
    ctx.emit(Instruction::PushByte(0));
    ctx.emit(Instruction::StrictEquals);
    ctx.emit(Instruction::ConvertI);
    Ok(())
}

fn lower_compare(ctx: &mut super::Ctx, cursor: &mut OpCursor, kind: SignedCompareOp) -> Result<()> {
    if matches!(cursor.peek()?, Operator::If { .. } | Operator::BrIf { .. }) {
        ctx.pending_compare = Some(PendingCompare::Signed(kind));
        return Ok(());
    }
    match kind {
        SignedCompareOp::Eq => ctx.emit(Instruction::StrictEquals),
        SignedCompareOp::Ne => {
            ctx.emit(Instruction::StrictEquals);
            ctx.emit(Instruction::Not);
        }
        SignedCompareOp::Lt => ctx.emit(Instruction::LessThan),
        SignedCompareOp::Le => ctx.emit(Instruction::LessEquals),
        SignedCompareOp::Gt => ctx.emit(Instruction::GreaterThan),
        SignedCompareOp::Ge => ctx.emit(Instruction::GreaterEquals),
    }
    ctx.emit(Instruction::ConvertI);
    Ok(())
}

fn lower_unsigned_compare(
    ctx: &mut super::Ctx,
    cursor: &mut OpCursor,
    kind: UnsignedCompareOp,
) -> Result<()> {
    if matches!(cursor.peek()?, Operator::If { .. } | Operator::BrIf { .. }) {
        emit_unsigned_both(ctx);
        ctx.pending_compare = Some(PendingCompare::Unsigned(kind));
        return Ok(());
    }
    emit_unsigned_both(ctx);
    match kind {
        UnsignedCompareOp::Lt => ctx.emit(Instruction::LessThan),
        UnsignedCompareOp::Le => ctx.emit(Instruction::LessEquals),
        UnsignedCompareOp::Gt => ctx.emit(Instruction::GreaterThan),
        UnsignedCompareOp::Ge => ctx.emit(Instruction::GreaterEquals),
    }
    ctx.emit(Instruction::ConvertI);
    Ok(())
}

