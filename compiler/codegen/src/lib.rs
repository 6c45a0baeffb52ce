use log::debug;
use thiserror::Error;

use lir::*;
use mir::tacky;

pub use crate::fix_instructions::{check_legal, fix_invalid_instructions};
pub use crate::replace_pseudoregisters::replace_pseudos;

mod fix_instructions;
mod replace_pseudoregisters;

#[cfg(test)]
mod interpreter;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("internal error: pseudo-register '{0}' has no stack slot")]
    UnresolvedPseudo(String),
    #[error("internal error: stack frame allocated before pseudo-registers were replaced")]
    FrameAlreadyAllocated,
    #[error("internal error: instruction {index} violates operand constraints: {instruction}")]
    IllegalInstruction { index: usize, instruction: String },
}

/// Lowers TACKY into legal x86-64 assembly: instruction selection, stack
/// slot assignment, then fixup of operand combinations the hardware rejects
pub fn gen_assm(tacky: &tacky::TranslationUnit) -> Result<Program, CodegenError> {
    let mut program = select_instructions(tacky);

    replace_pseudos(&mut program)?;
    fix_invalid_instructions(&mut program);
    check_legal(&program)?;

    debug!(
        "generated {} assembly instructions with a {} byte frame",
        program.func.instructions.len(),
        program.func.frame.bytes_required()
    );

    Ok(program)
}

pub fn select_instructions(tacky: &tacky::TranslationUnit) -> Program {
    Program {
        func: gen_func(&tacky.func),
    }
}

fn gen_func(func: &tacky::Func) -> Func {
    Func {
        name: func.name.clone(),
        instructions: gen_instructions(&func.instructions),
        frame: StackFrame::new(),
    }
}

fn gen_instructions(instructions: &[tacky::Instruction]) -> Vec<Instruction> {
    let mut assm_instr = vec![];

    for i in instructions {
        match i {
            tacky::Instruction::Return(val) => {
                assm_instr.push(Instruction::Mov {
                    src: gen_operand(val),
                    dest: Operand::Register(Register::AX),
                });
                assm_instr.push(Instruction::Ret);
            }
            tacky::Instruction::Unary { op, src, dest } => {
                assm_instr.push(Instruction::Mov {
                    src: gen_operand(src),
                    dest: Operand::Pseudo(dest.clone()),
                });
                assm_instr.push(Instruction::Unary {
                    op: gen_unary(op),
                    dest: Operand::Pseudo(dest.clone()),
                });
            }
            tacky::Instruction::Binary {
                op: op @ (tacky::BinaryOp::Divide | tacky::BinaryOp::Modulo),
                first,
                second,
                dest,
            } => {
                // quotient lands in EAX, remainder in EDX
                let result = if *op == tacky::BinaryOp::Divide {
                    Register::AX
                } else {
                    Register::DX
                };

                assm_instr.push(Instruction::Mov {
                    src: gen_operand(first),
                    dest: Operand::Register(Register::AX),
                });
                assm_instr.push(Instruction::Cdq);
                assm_instr.push(Instruction::Idiv(gen_operand(second)));
                assm_instr.push(Instruction::Mov {
                    src: Operand::Register(result),
                    dest: Operand::Pseudo(dest.clone()),
                });
            }
            tacky::Instruction::Binary {
                op: op @ (tacky::BinaryOp::BitshiftLeft | tacky::BinaryOp::BitshiftRight),
                first,
                second,
                dest,
            } => {
                assm_instr.push(Instruction::Mov {
                    src: gen_operand(first),
                    dest: Operand::Pseudo(dest.clone()),
                });

                // the shift count has to be an 8 bit immediate or live in CL
                let count = match second {
                    tacky::Val::Constant(val) if (0..=255).contains(val) => Operand::Imm(*val),
                    _ => {
                        assm_instr.push(Instruction::Mov {
                            src: gen_operand(second),
                            dest: Operand::Register(Register::CX),
                        });
                        Operand::Register(Register::CX)
                    }
                };

                assm_instr.push(Instruction::Binary {
                    op: gen_binary(op),
                    src: count,
                    dest: Operand::Pseudo(dest.clone()),
                });
            }
            tacky::Instruction::Binary {
                op,
                first,
                second,
                dest,
            } => {
                assm_instr.push(Instruction::Mov {
                    src: gen_operand(first),
                    dest: Operand::Pseudo(dest.clone()),
                });
                assm_instr.push(Instruction::Binary {
                    op: gen_binary(op),
                    src: gen_operand(second),
                    dest: Operand::Pseudo(dest.clone()),
                });
            }
        }
    }

    assm_instr
}

fn gen_unary(operator: &tacky::UnaryOp) -> UnaryOp {
    match operator {
        tacky::UnaryOp::Complement => UnaryOp::Not,
        tacky::UnaryOp::Negate => UnaryOp::Neg,
    }
}

/// Division and remainder never get here, they lower to `idiv`
fn gen_binary(operator: &tacky::BinaryOp) -> BinaryOp {
    match operator {
        tacky::BinaryOp::Add => BinaryOp::Add,
        tacky::BinaryOp::Subtract => BinaryOp::Sub,
        tacky::BinaryOp::Multiply => BinaryOp::Mult,
        tacky::BinaryOp::BitwiseAnd => BinaryOp::And,
        tacky::BinaryOp::BitwiseOr => BinaryOp::Or,
        tacky::BinaryOp::BitwiseXor => BinaryOp::Xor,
        tacky::BinaryOp::BitshiftLeft => BinaryOp::Sal,
        tacky::BinaryOp::BitshiftRight => BinaryOp::Sar,
        tacky::BinaryOp::Divide | tacky::BinaryOp::Modulo => {
            unreachable!("Internal Error: {:?} is lowered through idiv", operator)
        }
    }
}

fn gen_operand(operand: &tacky::Val) -> Operand {
    match operand {
        tacky::Val::Constant(val) => Operand::Imm(*val),
        tacky::Val::Var(var) => Operand::Pseudo(var.clone()),
    }
}
