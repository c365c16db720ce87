//! AVM2 instruction stream and its byte encoding.
//!
//! Branch targets are resolved in two passes, mirroring the deferred-fixup
//! style the teacher uses for call targets: every instruction has a
//! statically known encoded length (ABC branch operands are a fixed-width
//! `s24`), so a first pass over the instruction list gives the byte offset
//! of every instruction before any label is resolved; a second pass then
//! re-encodes each branch's offset as `target_offset - instruction_end`.

use super::opcode::Opcode;

/// A jump target. Allocated by the label stack (`lower::labels`), bound at
/// most once by inserting a `Label` marker instruction at the bind site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone)]
pub enum Instruction {
    Nop,
    Throw,
    /// A no-op marker bound at a jump target; required so backward jumps
    /// land on an instruction boundary the verifier recognizes.
    Label(LabelId),

    PushNull,
    PushUndefined,
    PushByte(i8),
    PushShort(i32),
    PushTrue,
    PushFalse,
    PushNan,
    PushString(u32),
    PushInt(u32),
    PushUInt(u32),
    PushDouble(u32),

    Pop,
    Dup,
    Swap,

    GetLocal(u32),
    SetLocal(u32),
    Kill(u32),

    GetGlobalScope,
    PushScope,
    FindPropStrict(u32),
    FindProperty(u32),
    GetLex(u32),
    GetProperty(u32),
    SetProperty(u32),
    /// `getproperty` against a `MultinameL` operand: the property name is
    /// popped from the stack at runtime rather than being the fixed QName
    /// `GetProperty` carries, so it pops one more operand (§4.1.6 table
    /// lookup for `call_indirect`). Same opcode byte as `GetProperty`.
    GetPropertyLate(u32),
    /// `setproperty` against a `MultinameL` operand; see `GetPropertyLate`.
    SetPropertyLate(u32),
    InitProperty(u32),
    GetSlot(u32),
    SetSlot(u32),

    ConvertI,
    ConvertU,
    ConvertD,
    ConvertB,
    CoerceA,

    Negate,
    Increment,
    IncLocal(u32),
    Decrement,
    DecLocal(u32),
    Not,
    BitNot,

    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    LShift,
    RShift,
    URShift,
    BitAnd,
    BitOr,
    BitXor,
    Equals,
    StrictEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,

    IncrementI,
    DecrementI,
    AddI,
    SubtractI,
    MultiplyI,
    NegateI,
    IncLocalI(u32),
    DecLocalI(u32),

    Jump(LabelId),
    IfTrue(LabelId),
    IfFalse(LabelId),
    IfEq(LabelId),
    IfNe(LabelId),
    IfLt(LabelId),
    IfLe(LabelId),
    IfGt(LabelId),
    IfGe(LabelId),
    IfNLt(LabelId),
    IfNLe(LabelId),
    IfNGt(LabelId),
    IfNGe(LabelId),
    IfStrictEq(LabelId),
    IfStrictNe(LabelId),
    LookupSwitch {
        default: LabelId,
        cases: Vec<LabelId>,
    },

    CallProperty {
        name: u32,
        argc: u32,
    },
    CallPropVoid {
        name: u32,
        argc: u32,
    },
    CallPropLex {
        name: u32,
        argc: u32,
    },
    ConstructSuper {
        argc: u32,
    },
    ConstructProp {
        name: u32,
        argc: u32,
    },
    NewArray {
        count: u32,
    },
    ReturnVoid,
    ReturnValue,

    Li8,
    Li16,
    Li32,
    Lf32,
    Lf64,
    Si8,
    Si16,
    Si32,
    Sf32,
    Sf64,
    SignExtend8,
    SignExtend16,

    DebugLine(u32),
    DebugFile(u32),
}

impl Instruction {
    /// Whether control falls through to the next instruction. Used by the
    /// static stack simulator (`crate::sim`) and by the label allocator to
    /// decide whether a bound-but-unreachable label still needs a marker.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump(_) | Self::ReturnVoid | Self::ReturnValue | Self::Throw | Self::LookupSwitch { .. }
        )
    }

    /// Operand stack effect: (values popped, values pushed). Used both by
    /// the static simulator and, at emission time, by the method builder to
    /// maintain the `max_stack` high-watermark incrementally.
    #[must_use]
    pub fn stack_effect(&self) -> (u32, u32) {
        use Instruction::{
            Add, AddI, BitAnd, BitNot, BitOr, BitXor, CallPropLex, CallProperty, CallPropVoid,
            CoerceA, ConstructProp, ConstructSuper, ConvertB, ConvertD, ConvertI, ConvertU, DebugFile, DebugLine,
            DecLocal, DecLocalI, Decrement, DecrementI, Divide, Dup, Equals, FindProperty,
            FindPropStrict, GetGlobalScope, GetLex, GetLocal, GetProperty, GetPropertyLate, GetSlot,
            GreaterEquals, GreaterThan, IfEq, IfFalse, IfGe, IfGt, IfLe, IfLt, IfNGe, IfNGt,
            IfNLe, IfNLt, IfNe, IfStrictEq, IfStrictNe, IfTrue, IncLocal, IncLocalI, Increment,
            IncrementI, InitProperty, Jump, Kill, Label, Lf32, Lf64, Li16, Li32, Li8, LShift,
            LessEquals, LessThan, LookupSwitch, Modulo, Multiply, MultiplyI, Negate, NegateI,
            NewArray, Nop, Not, Pop, PushByte, PushDouble, PushFalse, PushInt, PushNan, PushNull,
            PushScope, PushShort, PushString, PushTrue, PushUInt, PushUndefined, ReturnValue,
            ReturnVoid, RShift, SetLocal, SetProperty, SetPropertyLate, SetSlot, Sf32, Sf64, Si16, Si32, Si8,
            SignExtend16, SignExtend8, StrictEquals, Subtract, SubtractI, Swap, Throw, URShift,
        };
        match self {
            Nop | Label(_) | DebugLine(_) | DebugFile(_) | GetGlobalScope | PushScope => (0, 0),
            Throw | ReturnValue | Pop | IfTrue(_) | IfFalse(_) => (1, 0),
            ReturnVoid => (0, 0),
            PushNull | PushUndefined | PushByte(_) | PushShort(_) | PushTrue | PushFalse
            | PushNan | PushString(_) | PushInt(_) | PushUInt(_) | PushDouble(_)
            | GetLocal(_) | FindPropStrict(_) | FindProperty(_) | GetLex(_) => (0, 1),
            Dup => (1, 2),
            Swap => (2, 2),
            SetLocal(_) | Kill(_) => (1, 0),
            GetProperty(_) => (1, 1),
            SetProperty(_) => (2, 0),
            GetPropertyLate(_) => (2, 1),
            SetPropertyLate(_) => (3, 0),
            InitProperty(_) => (2, 0),
            GetSlot(_) => (1, 1),
            SetSlot(_) => (2, 0),
            ConvertI | ConvertU | ConvertD | ConvertB | CoerceA | Negate | Not | BitNot
            | NegateI => (1, 1),
            Increment | Decrement | IncrementI | DecrementI => (1, 1),
            IncLocal(_) | DecLocal(_) | IncLocalI(_) | DecLocalI(_) => (0, 0),
            Add | Subtract | Multiply | Divide | Modulo | LShift | RShift | URShift | BitAnd
            | BitOr | BitXor | Equals | StrictEquals | LessThan | LessEquals | GreaterThan
            | GreaterEquals | AddI | SubtractI | MultiplyI => (2, 1),
            Jump(_) => (0, 0),
            IfEq(_) | IfNe(_) | IfLt(_) | IfLe(_) | IfGt(_) | IfGe(_) | IfNLt(_) | IfNLe(_)
            | IfNGt(_) | IfNGe(_) | IfStrictEq(_) | IfStrictNe(_) => (2, 0),
            LookupSwitch { .. } => (1, 0),
            CallProperty { argc, .. } | CallPropLex { argc, .. } => (argc + 1, 1),
            CallPropVoid { argc, .. } => (argc + 1, 0),
            ConstructSuper { argc } => (argc + 1, 0),
            ConstructProp { argc, .. } => (argc + 1, 1),
            NewArray { count } => (*count, 1),
            Li8 | Li16 | Li32 | Lf32 | Lf64 => (1, 1),
            Si8 | Si16 | Si32 | Sf32 | Sf64 => (2, 0),
            SignExtend8 | SignExtend16 => (1, 1),
        }
    }
}

pub(crate) fn encode_u30(value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    let mut value = value;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

fn encode_s24(value: i32) -> [u8; 3] {
    let bytes = value.to_le_bytes();
    [bytes[0], bytes[1], bytes[2]]
}

/// Fixed encoded length of every non-branch instruction, known without
/// resolving any label. Branch instructions also have a fixed length (1
/// byte opcode + 3 byte `s24` operand, or more for `lookupswitch`), so the
/// whole stream's byte offsets can be computed in one linear pass.
fn encoded_len(instr: &Instruction) -> usize {
    match instr {
        Instruction::Label(_) => 0,
        Instruction::Nop
        | Instruction::Throw
        | Instruction::PushNull
        | Instruction::PushUndefined
        | Instruction::PushTrue
        | Instruction::PushFalse
        | Instruction::PushNan
        | Instruction::Pop
        | Instruction::Dup
        | Instruction::Swap
        | Instruction::GetGlobalScope
        | Instruction::PushScope
        | Instruction::ConvertI
        | Instruction::ConvertU
        | Instruction::ConvertD
        | Instruction::ConvertB
        | Instruction::CoerceA
        | Instruction::Negate
        | Instruction::Increment
        | Instruction::Decrement
        | Instruction::Not
        | Instruction::BitNot
        | Instruction::Add
        | Instruction::Subtract
        | Instruction::Multiply
        | Instruction::Divide
        | Instruction::Modulo
        | Instruction::LShift
        | Instruction::RShift
        | Instruction::URShift
        | Instruction::BitAnd
        | Instruction::BitOr
        | Instruction::BitXor
        | Instruction::Equals
        | Instruction::StrictEquals
        | Instruction::LessThan
        | Instruction::LessEquals
        | Instruction::GreaterThan
        | Instruction::GreaterEquals
        | Instruction::IncrementI
        | Instruction::DecrementI
        | Instruction::AddI
        | Instruction::SubtractI
        | Instruction::MultiplyI
        | Instruction::NegateI
        | Instruction::ReturnVoid
        | Instruction::ReturnValue
        | Instruction::Li8
        | Instruction::Li16
        | Instruction::Li32
        | Instruction::Lf32
        | Instruction::Lf64
        | Instruction::Si8
        | Instruction::Si16
        | Instruction::Si32
        | Instruction::Sf32
        | Instruction::Sf64
        | Instruction::SignExtend8
        | Instruction::SignExtend16 => 1,
        Instruction::PushByte(_) => 2,
        Instruction::PushShort(v) => 1 + encode_u30(*v as u32).len(),
        Instruction::PushString(i)
        | Instruction::PushInt(i)
        | Instruction::PushUInt(i)
        | Instruction::PushDouble(i)
        | Instruction::GetLocal(i)
        | Instruction::SetLocal(i)
        | Instruction::Kill(i)
        | Instruction::FindPropStrict(i)
        | Instruction::FindProperty(i)
        | Instruction::GetLex(i)
        | Instruction::GetProperty(i)
        | Instruction::SetProperty(i)
        | Instruction::GetPropertyLate(i)
        | Instruction::SetPropertyLate(i)
        | Instruction::InitProperty(i)
        | Instruction::GetSlot(i)
        | Instruction::SetSlot(i)
        | Instruction::IncLocal(i)
        | Instruction::DecLocal(i)
        | Instruction::IncLocalI(i)
        | Instruction::DecLocalI(i)
        | Instruction::DebugLine(i)
        | Instruction::DebugFile(i) => 1 + encode_u30(*i).len(),
        Instruction::Jump(_)
        | Instruction::IfTrue(_)
        | Instruction::IfFalse(_)
        | Instruction::IfEq(_)
        | Instruction::IfNe(_)
        | Instruction::IfLt(_)
        | Instruction::IfLe(_)
        | Instruction::IfGt(_)
        | Instruction::IfGe(_)
        | Instruction::IfNLt(_)
        | Instruction::IfNLe(_)
        | Instruction::IfNGt(_)
        | Instruction::IfNGe(_)
        | Instruction::IfStrictEq(_)
        | Instruction::IfStrictNe(_) => 4,
        Instruction::LookupSwitch { cases, .. } => {
            1 + 3 + encode_u30(cases.len() as u32).len() + cases.len() * 3
        }
        Instruction::CallProperty { name, argc }
        | Instruction::CallPropLex { name, argc }
        | Instruction::CallPropVoid { name, argc } => {
            1 + encode_u30(*name).len() + encode_u30(*argc).len()
        }
        Instruction::ConstructSuper { argc } | Instruction::NewArray { count: argc } => {
            1 + encode_u30(*argc).len()
        }
        Instruction::ConstructProp { name, argc } => {
            1 + encode_u30(*name).len() + encode_u30(*argc).len()
        }
    }
}

/// Encodes a full method body's instruction stream, resolving every label
/// reference to a relative `s24` byte offset. Panics (an internal invariant
/// violation, §7) if a branch targets a label that was never bound via
/// `Instruction::Label`.
pub fn encode_method_body(instructions: &[Instruction]) -> Vec<u8> {
    let mut offsets = vec![0usize; instructions.len()];
    let mut cursor = 0usize;
    for (i, instr) in instructions.iter().enumerate() {
        offsets[i] = cursor;
        cursor += encoded_len(instr);
    }

    let mut label_offsets = std::collections::HashMap::new();
    for (i, instr) in instructions.iter().enumerate() {
        if let Instruction::Label(id) = instr {
            label_offsets.insert(*id, offsets[i]);
        }
    }
    let resolve = |id: LabelId| -> i32 {
        *label_offsets
            .get(&id)
            .unwrap_or_else(|| panic!("unbound label {id:?} referenced by a branch")) as i32
    };

    let mut out = Vec::with_capacity(cursor);
    for (i, instr) in instructions.iter().enumerate() {
        let here_end = offsets[i] + encoded_len(instr);
        encode_one(instr, here_end as i32, &resolve, &mut out);
    }
    out
}

fn encode_one(
    instr: &Instruction,
    instr_end: i32,
    resolve: &dyn Fn(LabelId) -> i32,
    out: &mut Vec<u8>,
) {
    macro_rules! op {
        ($op:expr) => {
            out.push($op as u8)
        };
    }
    macro_rules! branch {
        ($op:expr, $label:expr) => {{
            out.push($op as u8);
            let target = resolve($label);
            out.extend(encode_s24(target - instr_end));
        }};
    }

    match instr {
        Instruction::Label(_) => {}
        Instruction::Nop => op!(Opcode::Nop),
        Instruction::Throw => op!(Opcode::Throw),
        Instruction::PushNull => op!(Opcode::PushNull),
        Instruction::PushUndefined => op!(Opcode::PushUndefined),
        Instruction::PushByte(v) => {
            op!(Opcode::PushByte);
            out.push(*v as u8);
        }
        Instruction::PushShort(v) => {
            op!(Opcode::PushShort);
            out.extend(encode_u30(*v as u32));
        }
        Instruction::PushTrue => op!(Opcode::PushTrue),
        Instruction::PushFalse => op!(Opcode::PushFalse),
        Instruction::PushNan => op!(Opcode::PushNan),
        Instruction::PushString(i) => {
            op!(Opcode::PushString);
            out.extend(encode_u30(*i));
        }
        Instruction::PushInt(i) => {
            op!(Opcode::PushInt);
            out.extend(encode_u30(*i));
        }
        Instruction::PushUInt(i) => {
            op!(Opcode::PushUInt);
            out.extend(encode_u30(*i));
        }
        Instruction::PushDouble(i) => {
            op!(Opcode::PushDouble);
            out.extend(encode_u30(*i));
        }
        Instruction::Pop => op!(Opcode::Pop),
        Instruction::Dup => op!(Opcode::Dup),
        Instruction::Swap => op!(Opcode::Swap),
        Instruction::GetLocal(i) => match i {
            0 => op!(Opcode::GetLocal0),
            1 => op!(Opcode::GetLocal1),
            2 => op!(Opcode::GetLocal2),
            3 => op!(Opcode::GetLocal3),
            _ => {
                op!(Opcode::GetLocal);
                out.extend(encode_u30(*i));
            }
        },
        Instruction::SetLocal(i) => match i {
            0 => op!(Opcode::SetLocal0),
            1 => op!(Opcode::SetLocal1),
            2 => op!(Opcode::SetLocal2),
            3 => op!(Opcode::SetLocal3),
            _ => {
                op!(Opcode::SetLocal);
                out.extend(encode_u30(*i));
            }
        },
        Instruction::Kill(i) => {
            out.push(0x08); // OP_kill
            out.extend(encode_u30(*i));
        }
        Instruction::GetGlobalScope => op!(Opcode::GetGlobalScope),
        Instruction::PushScope => op!(Opcode::PushScope),
        Instruction::FindPropStrict(i) => {
            op!(Opcode::FindPropStrict);
            out.extend(encode_u30(*i));
        }
        Instruction::FindProperty(i) => {
            op!(Opcode::FindProperty);
            out.extend(encode_u30(*i));
        }
        Instruction::GetLex(i) => {
            op!(Opcode::GetLex);
            out.extend(encode_u30(*i));
        }
        Instruction::GetProperty(i) => {
            op!(Opcode::GetProperty);
            out.extend(encode_u30(*i));
        }
        Instruction::SetProperty(i) => {
            op!(Opcode::SetProperty);
            out.extend(encode_u30(*i));
        }
        Instruction::GetPropertyLate(i) => {
            op!(Opcode::GetProperty);
            out.extend(encode_u30(*i));
        }
        Instruction::SetPropertyLate(i) => {
            op!(Opcode::SetProperty);
            out.extend(encode_u30(*i));
        }
        Instruction::InitProperty(i) => {
            op!(Opcode::InitProperty);
            out.extend(encode_u30(*i));
        }
        Instruction::GetSlot(i) => {
            op!(Opcode::GetSlot);
            out.extend(encode_u30(*i));
        }
        Instruction::SetSlot(i) => {
            op!(Opcode::SetSlot);
            out.extend(encode_u30(*i));
        }
        Instruction::ConvertI => op!(Opcode::ConvertI),
        Instruction::ConvertU => op!(Opcode::ConvertU),
        Instruction::ConvertD => op!(Opcode::ConvertD),
        Instruction::ConvertB => op!(Opcode::ConvertB),
        Instruction::CoerceA => op!(Opcode::CoerceA),
        Instruction::Negate => op!(Opcode::Negate),
        Instruction::Increment => op!(Opcode::Increment),
        Instruction::IncLocal(i) => {
            op!(Opcode::IncLocal);
            out.extend(encode_u30(*i));
        }
        Instruction::Decrement => op!(Opcode::Decrement),
        Instruction::DecLocal(i) => {
            op!(Opcode::DecLocal);
            out.extend(encode_u30(*i));
        }
        Instruction::Not => op!(Opcode::Not),
        Instruction::BitNot => op!(Opcode::BitNot),
        Instruction::Add => op!(Opcode::Add),
        Instruction::Subtract => op!(Opcode::Subtract),
        Instruction::Multiply => op!(Opcode::Multiply),
        Instruction::Divide => op!(Opcode::Divide),
        Instruction::Modulo => op!(Opcode::Modulo),
        Instruction::LShift => op!(Opcode::LShift),
        Instruction::RShift => op!(Opcode::RShift),
        Instruction::URShift => op!(Opcode::URShift),
        Instruction::BitAnd => op!(Opcode::BitAnd),
        Instruction::BitOr => op!(Opcode::BitOr),
        Instruction::BitXor => op!(Opcode::BitXor),
        Instruction::Equals => op!(Opcode::Equals),
        Instruction::StrictEquals => op!(Opcode::StrictEquals),
        Instruction::LessThan => op!(Opcode::LessThan),
        Instruction::LessEquals => op!(Opcode::LessEquals),
        Instruction::GreaterThan => op!(Opcode::GreaterThan),
        Instruction::GreaterEquals => op!(Opcode::GreaterEquals),
        Instruction::IncrementI => op!(Opcode::IncrementI),
        Instruction::DecrementI => op!(Opcode::DecrementI),
        Instruction::AddI => op!(Opcode::AddI),
        Instruction::SubtractI => op!(Opcode::SubtractI),
        Instruction::MultiplyI => op!(Opcode::MultiplyI),
        Instruction::NegateI => op!(Opcode::NegateI),
        Instruction::IncLocalI(i) => {
            op!(Opcode::IncLocalI);
            out.extend(encode_u30(*i));
        }
        Instruction::DecLocalI(i) => {
            op!(Opcode::DecLocalI);
            out.extend(encode_u30(*i));
        }
        Instruction::Jump(l) => branch!(Opcode::Jump, *l),
        Instruction::IfTrue(l) => branch!(Opcode::IfTrue, *l),
        Instruction::IfFalse(l) => branch!(Opcode::IfFalse, *l),
        Instruction::IfEq(l) => branch!(Opcode::IfEq, *l),
        Instruction::IfNe(l) => branch!(Opcode::IfNe, *l),
        Instruction::IfLt(l) => branch!(Opcode::IfLt, *l),
        Instruction::IfLe(l) => branch!(Opcode::IfLe, *l),
        Instruction::IfGt(l) => branch!(Opcode::IfGt, *l),
        Instruction::IfGe(l) => branch!(Opcode::IfGe, *l),
        Instruction::IfNLt(l) => branch!(Opcode::IfNLt, *l),
        Instruction::IfNLe(l) => branch!(Opcode::IfNLe, *l),
        Instruction::IfNGt(l) => branch!(Opcode::IfNGt, *l),
        Instruction::IfNGe(l) => branch!(Opcode::IfNGe, *l),
        Instruction::IfStrictEq(l) => branch!(Opcode::IfStrictEq, *l),
        Instruction::IfStrictNe(l) => branch!(Opcode::IfStrictNe, *l),
        Instruction::LookupSwitch { default, cases } => {
            op!(Opcode::LookupSwitch);
            out.extend(encode_s24(resolve(*default) - instr_end));
            out.extend(encode_u30(cases.len() as u32));
            for case in cases {
                out.extend(encode_s24(resolve(*case) - instr_end));
            }
        }
        Instruction::CallProperty { name, argc } => {
            op!(Opcode::CallProperty);
            out.extend(encode_u30(*name));
            out.extend(encode_u30(*argc));
        }
        Instruction::CallPropLex { name, argc } => {
            op!(Opcode::CallPropLex);
            out.extend(encode_u30(*name));
            out.extend(encode_u30(*argc));
        }
        Instruction::CallPropVoid { name, argc } => {
            op!(Opcode::CallPropVoid);
            out.extend(encode_u30(*name));
            out.extend(encode_u30(*argc));
        }
        Instruction::ConstructSuper { argc } => {
            op!(Opcode::ConstructSuper);
            out.extend(encode_u30(*argc));
        }
        Instruction::NewArray { count } => {
            op!(Opcode::NewArray);
            out.extend(encode_u30(*count));
        }
        Instruction::ConstructProp { name, argc } => {
            op!(Opcode::ConstructProp);
            out.extend(encode_u30(*name));
            out.extend(encode_u30(*argc));
        }
        Instruction::ReturnVoid => op!(Opcode::ReturnVoid),
        Instruction::ReturnValue => op!(Opcode::ReturnValue),
        Instruction::Li8 => op!(Opcode::Li8),
        Instruction::Li16 => op!(Opcode::Li16),
        Instruction::Li32 => op!(Opcode::Li32),
        Instruction::Lf32 => op!(Opcode::Lf32),
        Instruction::Lf64 => op!(Opcode::Lf64),
        Instruction::Si8 => op!(Opcode::Si8),
        Instruction::Si16 => op!(Opcode::Si16),
        Instruction::Si32 => op!(Opcode::Si32),
        Instruction::Sf32 => op!(Opcode::Sf32),
        Instruction::Sf64 => op!(Opcode::Sf64),
        Instruction::SignExtend8 => op!(Opcode::SignExtend8),
        Instruction::SignExtend16 => op!(Opcode::SignExtend16),
        Instruction::DebugLine(i) => {
            op!(Opcode::DebugLine);
            out.extend(encode_u30(*i));
        }
        Instruction::DebugFile(i) => {
            op!(Opcode::DebugFile);
            out.extend(encode_u30(*i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u30_round_trips_small_values() {
        assert_eq!(encode_u30(0), vec![0]);
        assert_eq!(encode_u30(127), vec![0x7f]);
        assert_eq!(encode_u30(128), vec![0x80, 0x01]);
    }

    #[test]
    fn forward_jump_resolves_to_positive_offset() {
        let l = LabelId(0);
        let stream = vec![
            Instruction::PushTrue,
            Instruction::IfFalse(l),
            Instruction::PushByte(1),
            Instruction::Label(l),
            Instruction::ReturnVoid,
        ];
        let bytes = encode_method_body(&stream);
        // PushTrue(1) + IfFalse(4) + PushByte(2) + Label(0) + ReturnVoid(1) = 8 bytes
        assert_eq!(bytes.len(), 8);
    }

    #[test]
    #[should_panic(expected = "unbound label")]
    fn unbound_label_panics() {
        let stream = vec![Instruction::Jump(LabelId(99))];
        let _ = encode_method_body(&stream);
    }
}
