use crate::StackFrame;

/// Defines assembly tree datatypes

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub func: Func,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Func {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// Stack slots handed out to pseudo-registers, empty until they are replaced
    pub frame: StackFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Mov {
        src: Operand,
        dest: Operand,
    },
    Unary {
        op: UnaryOp,
        dest: Operand,
    },
    Binary {
        op: BinaryOp,
        src: Operand,
        dest: Operand,
    },
    Idiv(Operand),
    /// Sign extends EAX into EDX ahead of a division
    Cdq,
    AllocateStack(i32),
    Ret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    And,
    Or,
    Xor,
    Sal,
    Sar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Imm(i32),
    Register(Register),
    Pseudo(String),
    Stack(i32),
}

impl Operand {
    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Stack(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    AX,
    CX,
    DX,
    // R10 and R11 are reserved as scratch registers for instruction fixup
    R10,
    R11,
}
