use log::trace;

use lir::*;

use crate::CodegenError;

// Scratch registers, nothing but the fixup pass may use these
const SRC_SCRATCH: Operand = Operand::Register(Register::R10);
const DEST_SCRATCH: Operand = Operand::Register(Register::R11);

/// Rewrites instructions the hardware cannot encode and prepends the stack
/// allocation for the function's frame
pub fn fix_invalid_instructions(program: &mut Program) {
    let func = &mut program.func;

    let mut fixed_instr = Vec::with_capacity(func.instructions.len() + 1);
    fixed_instr.push(Instruction::AllocateStack(func.frame.bytes_required()));

    for instruction in func.instructions.drain(..) {
        fix_instruction(instruction, &mut fixed_instr);
    }

    func.instructions = fixed_instr;
}

fn fix_instruction(instruction: Instruction, fixed_instr: &mut Vec<Instruction>) {
    match instruction {
        Instruction::Mov {
            src: src @ Operand::Stack(_),
            dest: dest @ Operand::Stack(_),
        } => {
            trace!("splitting memory to memory mov {:?} -> {:?}", src, dest);

            fixed_instr.push(Instruction::Mov {
                src,
                dest: SRC_SCRATCH,
            });
            fixed_instr.push(Instruction::Mov {
                src: SRC_SCRATCH,
                dest,
            });
        }
        Instruction::Idiv(imm @ Operand::Imm(_)) => {
            trace!("moving immediate divisor {:?} into a register", imm);

            fixed_instr.push(Instruction::Mov {
                src: imm,
                dest: SRC_SCRATCH,
            });
            fixed_instr.push(Instruction::Idiv(SRC_SCRATCH));
        }
        Instruction::Binary {
            op: BinaryOp::Mult,
            src,
            dest: dest @ Operand::Stack(_),
        } => {
            trace!("routing imul into {:?} through a register", dest);

            // imul can only write to a register
            fixed_instr.push(Instruction::Mov {
                src: dest.clone(),
                dest: DEST_SCRATCH,
            });

            let src = if src.is_memory() {
                fixed_instr.push(Instruction::Mov {
                    src,
                    dest: SRC_SCRATCH,
                });
                SRC_SCRATCH
            } else {
                src
            };

            fixed_instr.push(Instruction::Binary {
                op: BinaryOp::Mult,
                src,
                dest: DEST_SCRATCH,
            });
            fixed_instr.push(Instruction::Mov {
                src: DEST_SCRATCH,
                dest,
            });
        }
        Instruction::Binary {
            op,
            src: src @ Operand::Stack(_),
            dest: dest @ Operand::Stack(_),
        } => {
            trace!("splitting memory to memory {:?}", op);

            fixed_instr.push(Instruction::Mov {
                src,
                dest: SRC_SCRATCH,
            });
            fixed_instr.push(Instruction::Binary {
                op,
                src: SRC_SCRATCH,
                dest,
            });
        }
        _ => fixed_instr.push(instruction),
    }
}

/// Verifies that every instruction is encodable: no pseudo-registers left,
/// at most one memory operand, no immediate divisor, no memory destination
/// for imul, and shift counts in an imm8 or CL
pub fn check_legal(program: &Program) -> Result<(), CodegenError> {
    for (index, instruction) in program.func.instructions.iter().enumerate() {
        if let Some(name) = pseudo_in(instruction) {
            return Err(CodegenError::UnresolvedPseudo(name.to_string()));
        }

        let legal = match instruction {
            Instruction::Mov { src, dest } => !(src.is_memory() && dest.is_memory()),
            Instruction::Binary {
                op: BinaryOp::Mult,
                dest,
                ..
            } => !dest.is_memory(),
            Instruction::Binary {
                op: BinaryOp::Sal | BinaryOp::Sar,
                src,
                ..
            } => matches!(
                src,
                Operand::Imm(0..=255) | Operand::Register(Register::CX)
            ),
            Instruction::Binary { src, dest, .. } => !(src.is_memory() && dest.is_memory()),
            Instruction::Idiv(op) => !matches!(op, Operand::Imm(_)),
            Instruction::AllocateStack(bytes) => {
                index == 0 && *bytes >= 0 && bytes % FRAME_ALIGNMENT == 0
            }
            Instruction::Unary { .. } | Instruction::Cdq | Instruction::Ret => true,
        };

        if !legal {
            return Err(CodegenError::IllegalInstruction {
                index,
                instruction: format!("{:?}", instruction),
            });
        }
    }

    Ok(())
}

fn pseudo_in(instruction: &Instruction) -> Option<&str> {
    let operands: Vec<&Operand> = match instruction {
        Instruction::Mov { src, dest } | Instruction::Binary { src, dest, .. } => vec![src, dest],
        Instruction::Unary { dest, .. } => vec![dest],
        Instruction::Idiv(op) => vec![op],
        Instruction::Cdq | Instruction::AllocateStack(_) | Instruction::Ret => vec![],
    };

    operands.into_iter().find_map(|op| match op {
        Operand::Pseudo(name) => Some(name.as_str()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(instructions: Vec<Instruction>, slots: usize) -> Vec<Instruction> {
        let mut frame = StackFrame::new();
        for i in 0..slots {
            frame.allocate(&format!("tmp.{}", i));
        }

        let mut program = Program {
            func: Func {
                name: "main".to_string(),
                instructions,
                frame,
            },
        };

        fix_invalid_instructions(&mut program);
        check_legal(&program).unwrap();

        program.func.instructions
    }

    fn r10() -> Operand {
        Operand::Register(Register::R10)
    }

    fn r11() -> Operand {
        Operand::Register(Register::R11)
    }

    #[test]
    fn prepends_rounded_frame() {
        let out = fixed(vec![Instruction::Ret], 5);

        assert_eq!(out, vec![Instruction::AllocateStack(32), Instruction::Ret]);
    }

    #[test]
    fn mov_between_stack_slots() {
        let out = fixed(
            vec![Instruction::Mov {
                src: Operand::Stack(-4),
                dest: Operand::Stack(-8),
            }],
            2,
        );

        assert_eq!(
            out[1..],
            [
                Instruction::Mov {
                    src: Operand::Stack(-4),
                    dest: r10(),
                },
                Instruction::Mov {
                    src: r10(),
                    dest: Operand::Stack(-8),
                },
            ]
        );
    }

    #[test]
    fn legal_mov_passes_through() {
        let mov = Instruction::Mov {
            src: Operand::Imm(3),
            dest: Operand::Stack(-4),
        };

        assert_eq!(fixed(vec![mov.clone()], 1)[1..], [mov]);
    }

    #[test]
    fn immediate_divisor() {
        let out = fixed(vec![Instruction::Idiv(Operand::Imm(3))], 0);

        assert_eq!(
            out[1..],
            [
                Instruction::Mov {
                    src: Operand::Imm(3),
                    dest: r10(),
                },
                Instruction::Idiv(r10()),
            ]
        );
    }

    #[test]
    fn stack_divisor_passes_through() {
        let idiv = Instruction::Idiv(Operand::Stack(-4));

        assert_eq!(fixed(vec![idiv.clone()], 1)[1..], [idiv]);
    }

    #[test]
    fn add_and_xor_between_stack_slots() {
        for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::And, BinaryOp::Or, BinaryOp::Xor] {
            let out = fixed(
                vec![Instruction::Binary {
                    op,
                    src: Operand::Stack(-4),
                    dest: Operand::Stack(-8),
                }],
                2,
            );

            assert_eq!(
                out[1..],
                [
                    Instruction::Mov {
                        src: Operand::Stack(-4),
                        dest: r10(),
                    },
                    Instruction::Binary {
                        op,
                        src: r10(),
                        dest: Operand::Stack(-8),
                    },
                ]
            );
        }
    }

    #[test]
    fn multiply_immediate_into_stack() {
        let out = fixed(
            vec![Instruction::Binary {
                op: BinaryOp::Mult,
                src: Operand::Imm(3),
                dest: Operand::Stack(-4),
            }],
            1,
        );

        assert_eq!(
            out[1..],
            [
                Instruction::Mov {
                    src: Operand::Stack(-4),
                    dest: r11(),
                },
                Instruction::Binary {
                    op: BinaryOp::Mult,
                    src: Operand::Imm(3),
                    dest: r11(),
                },
                Instruction::Mov {
                    src: r11(),
                    dest: Operand::Stack(-4),
                },
            ]
        );
    }

    #[test]
    fn multiply_stack_into_stack() {
        let out = fixed(
            vec![Instruction::Binary {
                op: BinaryOp::Mult,
                src: Operand::Stack(-8),
                dest: Operand::Stack(-4),
            }],
            2,
        );

        assert_eq!(
            out[1..],
            [
                Instruction::Mov {
                    src: Operand::Stack(-4),
                    dest: r11(),
                },
                Instruction::Mov {
                    src: Operand::Stack(-8),
                    dest: r10(),
                },
                Instruction::Binary {
                    op: BinaryOp::Mult,
                    src: r10(),
                    dest: r11(),
                },
                Instruction::Mov {
                    src: r11(),
                    dest: Operand::Stack(-4),
                },
            ]
        );
    }

    fn single(instruction: Instruction) -> Program {
        Program {
            func: Func {
                name: "main".to_string(),
                instructions: vec![Instruction::AllocateStack(16), instruction],
                frame: StackFrame::new(),
            },
        }
    }

    #[test]
    fn check_rejects_memory_to_memory() {
        let program = single(Instruction::Binary {
            op: BinaryOp::Add,
            src: Operand::Stack(-4),
            dest: Operand::Stack(-8),
        });

        assert!(matches!(
            check_legal(&program),
            Err(CodegenError::IllegalInstruction { index: 1, .. })
        ));
    }

    #[test]
    fn check_rejects_immediate_divisor() {
        assert!(check_legal(&single(Instruction::Idiv(Operand::Imm(2)))).is_err());
    }

    #[test]
    fn check_rejects_multiply_into_memory() {
        let program = single(Instruction::Binary {
            op: BinaryOp::Mult,
            src: Operand::Imm(2),
            dest: Operand::Stack(-4),
        });

        assert!(check_legal(&program).is_err());
    }

    #[test]
    fn check_rejects_shift_count_in_memory() {
        let program = single(Instruction::Binary {
            op: BinaryOp::Sal,
            src: Operand::Stack(-8),
            dest: Operand::Stack(-4),
        });

        assert!(check_legal(&program).is_err());
    }

    #[test]
    fn check_rejects_leftover_pseudo() {
        let program = single(Instruction::Unary {
            op: UnaryOp::Neg,
            dest: Operand::Pseudo("tmp.0".to_string()),
        });

        assert_eq!(
            check_legal(&program),
            Err(CodegenError::UnresolvedPseudo("tmp.0".to_string()))
        );
    }

    #[test]
    fn check_rejects_misaligned_frame() {
        let mut program = single(Instruction::Ret);
        program.func.instructions[0] = Instruction::AllocateStack(12);

        assert!(check_legal(&program).is_err());
    }
}
