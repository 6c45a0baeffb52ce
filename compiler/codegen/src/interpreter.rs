//! Executes legalized assembly so tests can check what a program returns
//! without going through an assembler.

use std::collections::HashMap;

use lir::*;

struct Machine {
    registers: HashMap<Register, i32>,
    stack: HashMap<i32, i32>,
    frame_bytes: Option<i32>,
}

impl Machine {
    fn read(&self, op: &Operand) -> i32 {
        match op {
            Operand::Imm(val) => *val,
            Operand::Register(reg) => *self
                .registers
                .get(reg)
                .unwrap_or_else(|| panic!("read of uninitialized {:?}", reg)),
            Operand::Stack(offset) => {
                self.check_in_frame(*offset);
                *self
                    .stack
                    .get(offset)
                    .unwrap_or_else(|| panic!("read of uninitialized slot {}", offset))
            }
            Operand::Pseudo(name) => panic!("pseudo-register {} reached execution", name),
        }
    }

    fn write(&mut self, op: &Operand, val: i32) {
        match op {
            Operand::Register(reg) => {
                self.registers.insert(*reg, val);
            }
            Operand::Stack(offset) => {
                self.check_in_frame(*offset);
                self.stack.insert(*offset, val);
            }
            Operand::Imm(_) | Operand::Pseudo(_) => panic!("cannot write to {:?}", op),
        }
    }

    fn check_in_frame(&self, offset: i32) {
        let bytes = self.frame_bytes.expect("stack used before allocation");
        assert!(
            offset < 0 && offset >= -bytes,
            "slot {} outside a {} byte frame",
            offset,
            bytes
        );
    }
}

/// Runs the function and returns EAX at `ret`
pub fn run(program: &Program) -> i32 {
    let mut machine = Machine {
        registers: HashMap::new(),
        stack: HashMap::new(),
        frame_bytes: None,
    };

    for instruction in &program.func.instructions {
        match instruction {
            Instruction::AllocateStack(bytes) => machine.frame_bytes = Some(*bytes),
            Instruction::Mov { src, dest } => {
                let val = machine.read(src);
                machine.write(dest, val);
            }
            Instruction::Unary { op, dest } => {
                let val = machine.read(dest);
                let result = match op {
                    UnaryOp::Neg => val.wrapping_neg(),
                    UnaryOp::Not => !val,
                };
                machine.write(dest, result);
            }
            Instruction::Binary { op, src, dest } => {
                let rhs = machine.read(src);
                let lhs = machine.read(dest);
                let result = match op {
                    BinaryOp::Add => lhs.wrapping_add(rhs),
                    BinaryOp::Sub => lhs.wrapping_sub(rhs),
                    BinaryOp::Mult => lhs.wrapping_mul(rhs),
                    BinaryOp::And => lhs & rhs,
                    BinaryOp::Or => lhs | rhs,
                    BinaryOp::Xor => lhs ^ rhs,
                    // hardware masks 32 bit shift counts to 5 bits
                    BinaryOp::Sal => lhs.wrapping_shl(rhs as u32 & 31),
                    BinaryOp::Sar => lhs.wrapping_shr(rhs as u32 & 31),
                };
                machine.write(dest, result);
            }
            Instruction::Cdq => {
                let ax = machine.read(&Operand::Register(Register::AX));
                machine.write(&Operand::Register(Register::DX), if ax < 0 { -1 } else { 0 });
            }
            Instruction::Idiv(op) => {
                let divisor = machine.read(op);
                let ax = machine.read(&Operand::Register(Register::AX));
                let dx = machine.read(&Operand::Register(Register::DX));
                let dividend = ((dx as i64) << 32) | (ax as u32 as i64);

                machine.write(
                    &Operand::Register(Register::AX),
                    (dividend / divisor as i64) as i32,
                );
                machine.write(
                    &Operand::Register(Register::DX),
                    (dividend % divisor as i64) as i32,
                );
            }
            Instruction::Ret => return machine.read(&Operand::Register(Register::AX)),
        }
    }

    panic!("function fell off the end without ret")
}
