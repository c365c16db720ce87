//! A static instruction-stream simulator (§8 Testable Properties): walks an
//! emitted AVM2 instruction stream and checks operand-stack balance and
//! label well-formedness without a real AVM2 VM. This crate never links one,
//! so this is how those properties are checked — statically, not by running
//! the bytecode.

use std::collections::HashSet;

use crate::abc::{Instruction, LabelId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackReport {
    pub max_stack: u32,
    pub final_depth: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SimError {
    #[error("operand stack underflow at instruction {index}: would drop to depth {depth}")]
    Underflow { index: usize, depth: i64 },
    #[error("operand stack holds {depth} value(s) at a return (instruction {index})")]
    NonEmptyAtReturn { index: usize, depth: i64 },
    #[error("declared max_stack {declared} is below the observed high-watermark {observed}")]
    MaxStackTooLow { declared: u32, observed: u32 },
    #[error("label {0:?} is bound by more than one `Label` marker")]
    LabelBoundTwice(LabelId),
    #[error("branch at instruction {index} targets label {label:?}, which is never bound")]
    UnboundLabel { index: usize, label: LabelId },
}

/// Walks the stream once, applying each instruction's `stack_effect()`.
/// Fails on underflow, and requires the stack to be exactly empty at every
/// `ReturnValue`/`ReturnVoid` (§8 "Stack balance").
pub fn simulate_stack(instructions: &[Instruction]) -> Result<StackReport, SimError> {
    let mut depth: i64 = 0;
    let mut max_stack: u32 = 0;
    for (index, instr) in instructions.iter().enumerate() {
        let (pops, pushes) = instr.stack_effect();
        depth -= i64::from(pops);
        if depth < 0 {
            return Err(SimError::Underflow { index, depth });
        }
        depth += i64::from(pushes);
        max_stack = max_stack.max(u32::try_from(depth).unwrap_or(u32::MAX));

        if matches!(instr, Instruction::ReturnValue | Instruction::ReturnVoid) && depth != 0 {
            return Err(SimError::NonEmptyAtReturn { index, depth });
        }
    }
    Ok(StackReport {
        max_stack,
        final_depth: depth,
    })
}

/// Runs `simulate_stack` and additionally checks the high-watermark against
/// a method's declared `max_stack` (what `encode_method_body` will actually
/// write into the ABC file).
pub fn assert_stack_balance(instructions: &[Instruction], declared_max_stack: u32) -> Result<StackReport, SimError> {
    let report = simulate_stack(instructions)?;
    if report.max_stack > declared_max_stack {
        return Err(SimError::MaxStackTooLow {
            declared: declared_max_stack,
            observed: report.max_stack,
        });
    }
    Ok(report)
}

/// §8 "Label well-formedness": every label is bound at most once, and every
/// branch targets a label that is bound somewhere in the same stream
/// (forward or backward — this crate only ever emits single-method
/// instruction lists, so "in scope" collapses to "present in this slice").
pub fn check_labels(instructions: &[Instruction]) -> Result<(), SimError> {
    let mut bound = HashSet::new();
    for instr in instructions {
        if let Instruction::Label(id) = instr {
            if !bound.insert(*id) {
                return Err(SimError::LabelBoundTwice(*id));
            }
        }
    }
    for (index, instr) in instructions.iter().enumerate() {
        for label in branch_targets(instr) {
            if !bound.contains(&label) {
                return Err(SimError::UnboundLabel { index, label });
            }
        }
    }
    Ok(())
}

fn branch_targets(instr: &Instruction) -> Vec<LabelId> {
    match instr {
        Instruction::Jump(l)
        | Instruction::IfTrue(l)
        | Instruction::IfFalse(l)
        | Instruction::IfEq(l)
        | Instruction::IfNe(l)
        | Instruction::IfLt(l)
        | Instruction::IfLe(l)
        | Instruction::IfGt(l)
        | Instruction::IfGe(l)
        | Instruction::IfNLt(l)
        | Instruction::IfNLe(l)
        | Instruction::IfNGt(l)
        | Instruction::IfNGe(l)
        | Instruction::IfStrictEq(l)
        | Instruction::IfStrictNe(l) => vec![*l],
        Instruction::LookupSwitch { default, cases } => {
            let mut targets = vec![*default];
            targets.extend(cases.iter().copied());
            targets
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_add_then_return_is_ok() {
        let stream = vec![
            Instruction::GetLocal(1),
            Instruction::GetLocal(2),
            Instruction::AddI,
            Instruction::ReturnValue,
        ];
        let report = assert_stack_balance(&stream, 2).unwrap();
        assert_eq!(report.max_stack, 2);
        assert_eq!(report.final_depth, 0);
    }

    #[test]
    fn underflow_is_detected() {
        let stream = vec![Instruction::Pop];
        assert_eq!(
            simulate_stack(&stream),
            Err(SimError::Underflow { index: 0, depth: -1 })
        );
    }

    #[test]
    fn nonempty_at_return_is_rejected() {
        let stream = vec![Instruction::PushByte(1), Instruction::ReturnVoid];
        assert!(matches!(
            simulate_stack(&stream),
            Err(SimError::NonEmptyAtReturn { .. })
        ));
    }

    #[test]
    fn declared_max_stack_too_low_is_rejected() {
        let stream = vec![
            Instruction::GetLocal(1),
            Instruction::GetLocal(2),
            Instruction::AddI,
            Instruction::ReturnValue,
        ];
        assert_eq!(
            assert_stack_balance(&stream, 1),
            Err(SimError::MaxStackTooLow {
                declared: 1,
                observed: 2
            })
        );
    }

    #[test]
    fn unbound_label_is_rejected() {
        let stream = vec![Instruction::Jump(LabelId(0)), Instruction::ReturnVoid];
        assert_eq!(
            check_labels(&stream),
            Err(SimError::UnboundLabel {
                index: 0,
                label: LabelId(0)
            })
        );
    }

    #[test]
    fn label_bound_twice_is_rejected() {
        let l = LabelId(0);
        let stream = vec![
            Instruction::Label(l),
            Instruction::Label(l),
            Instruction::ReturnVoid,
        ];
        assert_eq!(check_labels(&stream), Err(SimError::LabelBoundTwice(l)));
    }

    #[test]
    fn forward_and_backward_jumps_both_resolve() {
        let top = LabelId(0);
        let bottom = LabelId(1);
        let stream = vec![
            Instruction::Label(top),
            Instruction::Jump(bottom),
            Instruction::Jump(top),
            Instruction::Label(bottom),
            Instruction::ReturnVoid,
        ];
        assert!(check_labels(&stream).is_ok());
    }
}
