use log::debug;

use lir::*;

use crate::CodegenError;

/// Gives every pseudo-register its own stack slot, recording the assignment
/// in the function's frame
pub fn replace_pseudos(program: &mut Program) -> Result<(), CodegenError> {
    let func = &mut program.func;
    let mut frame = StackFrame::new();

    for instruction in func.instructions.iter_mut() {
        replace_instruction(instruction, &mut frame)?;
    }

    debug!(
        "assigned {} stack slots in '{}', lowest offset {}",
        frame.slot_count(),
        func.name,
        frame.lowest_offset()
    );

    func.frame = frame;

    Ok(())
}

fn replace_instruction(
    instruction: &mut Instruction,
    frame: &mut StackFrame,
) -> Result<(), CodegenError> {
    match instruction {
        Instruction::Mov { src, dest } | Instruction::Binary { src, dest, .. } => {
            replace_operand(src, frame);
            replace_operand(dest, frame);
        }
        Instruction::Unary { dest, .. } => replace_operand(dest, frame),
        Instruction::Idiv(op) => replace_operand(op, frame),
        Instruction::Cdq | Instruction::Ret => {}
        Instruction::AllocateStack(_) => return Err(CodegenError::FrameAlreadyAllocated),
    }

    Ok(())
}

fn replace_operand(operand: &mut Operand, frame: &mut StackFrame) {
    if let Operand::Pseudo(var) = operand {
        *operand = Operand::Stack(frame.allocate(var));
    }
}
