//! WAT-driven test fixtures and instruction-pattern assertions (§8 "End-to-end
//! scenarios"), gated behind the `test-harness` feature exactly like the
//! teacher gates its own WAT-based fixture helpers.

use crate::abc::{AbcClass, Instruction, Method};
use crate::config::LowerConfig;
use crate::error::Result;
use crate::lower::lower_to_class;

/// Assembles a WAT text fixture into a binary Wasm module.
///
/// # Panics
/// Panics if `wat` is not valid WAT; fixtures are controlled by the test
/// author, so a parse failure means the test itself is broken.
#[must_use]
pub fn wat_to_wasm(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).expect("invalid WAT fixture")
}

/// Compiles a WAT fixture straight to the synthesized class, skipping SWF
/// and constant-pool encoding, so tests can assert on `Method` bodies.
pub fn compile_wat(wat: &str) -> Result<AbcClass> {
    compile_wat_with_config(wat, &LowerConfig::default())
}

pub fn compile_wat_with_config(wat: &str, config: &LowerConfig) -> Result<AbcClass> {
    let wasm = wat_to_wasm(wat);
    lower_to_class(&wasm, config)
}

/// Finds a synthesized method by name (a Wasm function's export/`func$N`
/// name, or one of the runtime helper names from `lower::function`).
#[must_use]
pub fn find_method<'a>(class: &'a AbcClass, name: &str) -> Option<&'a Method> {
    class.methods.iter().find(|m| m.name == name)
}

/// A short tag identifying an `Instruction`'s variant while ignoring its
/// operands (pool indices are compiler-assigned and irrelevant to shape
/// assertions; see `kind_of`).
pub type Kind = &'static str;

/// Maps an instruction to its shape tag, e.g. `GetLocal(3)` and `GetLocal(7)`
/// both map to `"getlocal"`. Mirrors how the teacher's own tests assert on
/// instruction *patterns* rather than concrete operand values.
#[must_use]
pub fn kind_of(instr: &Instruction) -> Kind {
    match instr {
        Instruction::Nop => "nop",
        Instruction::Throw => "throw",
        Instruction::Label(_) => "label",
        Instruction::PushNull => "pushnull",
        Instruction::PushUndefined => "pushundefined",
        Instruction::PushByte(_) => "pushbyte",
        Instruction::PushShort(_) => "pushshort",
        Instruction::PushTrue => "pushtrue",
        Instruction::PushFalse => "pushfalse",
        Instruction::PushNan => "pushnan",
        Instruction::PushString(_) => "pushstring",
        Instruction::PushInt(_) => "pushint",
        Instruction::PushUInt(_) => "pushuint",
        Instruction::PushDouble(_) => "pushdouble",
        Instruction::Pop => "pop",
        Instruction::Dup => "dup",
        Instruction::Swap => "swap",
        Instruction::GetLocal(_) => "getlocal",
        Instruction::SetLocal(_) => "setlocal",
        Instruction::Kill(_) => "kill",
        Instruction::GetGlobalScope => "getglobalscope",
        Instruction::PushScope => "pushscope",
        Instruction::FindPropStrict(_) => "findpropstrict",
        Instruction::FindProperty(_) => "findproperty",
        Instruction::GetLex(_) => "getlex",
        Instruction::GetProperty(_) => "getproperty",
        Instruction::SetProperty(_) => "setproperty",
        Instruction::GetPropertyLate(_) => "getpropertylate",
        Instruction::SetPropertyLate(_) => "setpropertylate",
        Instruction::InitProperty(_) => "initproperty",
        Instruction::GetSlot(_) => "getslot",
        Instruction::SetSlot(_) => "setslot",
        Instruction::ConvertI => "convert_i",
        Instruction::ConvertU => "convert_u",
        Instruction::ConvertD => "convert_d",
        Instruction::ConvertB => "convert_b",
        Instruction::CoerceA => "coerce_a",
        Instruction::Negate => "negate",
        Instruction::Increment => "increment",
        Instruction::IncLocal(_) => "inclocal",
        Instruction::Decrement => "decrement",
        Instruction::DecLocal(_) => "declocal",
        Instruction::Not => "not",
        Instruction::BitNot => "bitnot",
        Instruction::Add => "add",
        Instruction::Subtract => "subtract",
        Instruction::Multiply => "multiply",
        Instruction::Divide => "divide",
        Instruction::Modulo => "modulo",
        Instruction::LShift => "lshift",
        Instruction::RShift => "rshift",
        Instruction::URShift => "urshift",
        Instruction::BitAnd => "bitand",
        Instruction::BitOr => "bitor",
        Instruction::BitXor => "bitxor",
        Instruction::Equals => "equals",
        Instruction::StrictEquals => "strictequals",
        Instruction::LessThan => "lessthan",
        Instruction::LessEquals => "lessequals",
        Instruction::GreaterThan => "greaterthan",
        Instruction::GreaterEquals => "greaterequals",
        Instruction::IncrementI => "increment_i",
        Instruction::DecrementI => "decrement_i",
        Instruction::AddI => "add_i",
        Instruction::SubtractI => "subtract_i",
        Instruction::MultiplyI => "multiply_i",
        Instruction::NegateI => "negate_i",
        Instruction::IncLocalI(_) => "inclocal_i",
        Instruction::DecLocalI(_) => "declocal_i",
        Instruction::Jump(_) => "jump",
        Instruction::IfTrue(_) => "iftrue",
        Instruction::IfFalse(_) => "iffalse",
        Instruction::IfEq(_) => "ifeq",
        Instruction::IfNe(_) => "ifne",
        Instruction::IfLt(_) => "iflt",
        Instruction::IfLe(_) => "ifle",
        Instruction::IfGt(_) => "ifgt",
        Instruction::IfGe(_) => "ifge",
        Instruction::IfNLt(_) => "ifnlt",
        Instruction::IfNLe(_) => "ifnle",
        Instruction::IfNGt(_) => "ifngt",
        Instruction::IfNGe(_) => "ifnge",
        Instruction::IfStrictEq(_) => "ifstricteq",
        Instruction::IfStrictNe(_) => "ifstrictne",
        Instruction::LookupSwitch { .. } => "lookupswitch",
        Instruction::CallProperty { .. } => "callproperty",
        Instruction::CallPropVoid { .. } => "callpropvoid",
        Instruction::CallPropLex { .. } => "callproplex",
        Instruction::ConstructSuper { .. } => "constructsuper",
        Instruction::ConstructProp { .. } => "constructprop",
        Instruction::NewArray { .. } => "newarray",
        Instruction::ReturnVoid => "returnvoid",
        Instruction::ReturnValue => "returnvalue",
        Instruction::Li8 => "li8",
        Instruction::Li16 => "li16",
        Instruction::Li32 => "li32",
        Instruction::Lf32 => "lf32",
        Instruction::Lf64 => "lf64",
        Instruction::Si8 => "si8",
        Instruction::Si16 => "si16",
        Instruction::Si32 => "si32",
        Instruction::Sf32 => "sf32",
        Instruction::Sf64 => "sf64",
        Instruction::SignExtend8 => "sxi8",
        Instruction::SignExtend16 => "sxi16",
        Instruction::DebugLine(_) => "debugline",
        Instruction::DebugFile(_) => "debugfile",
    }
}

/// True if `kinds` occurs as a contiguous subsequence of `instructions`'
/// shape tags, skipping `Label` markers (they carry no runtime effect and
/// would otherwise force every pattern to account for branch targets).
#[must_use]
pub fn assert_has_pattern(instructions: &[Instruction], kinds: &[Kind]) -> bool {
    let tags: Vec<Kind> = instructions
        .iter()
        .map(kind_of)
        .filter(|k| *k != "label")
        .collect();
    if kinds.is_empty() {
        return true;
    }
    tags.windows(kinds.len()).any(|w| w == kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_matches_contiguous_subsequence() {
        let stream = vec![
            Instruction::GetLocal(1),
            Instruction::GetLocal(2),
            Instruction::AddI,
            Instruction::ReturnValue,
        ];
        assert!(assert_has_pattern(&stream, &["getlocal", "getlocal", "add_i", "returnvalue"]));
        assert!(!assert_has_pattern(&stream, &["add_i", "getlocal"]));
    }

    #[test]
    fn pattern_ignores_label_markers() {
        let stream = vec![
            Instruction::GetLocal(1),
            Instruction::Label(crate::abc::LabelId(0)),
            Instruction::ReturnValue,
        ];
        assert!(assert_has_pattern(&stream, &["getlocal", "returnvalue"]));
    }
}
