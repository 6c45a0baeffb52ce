use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use lir::*;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("internal error: pseudo-register '{0}' reached emission")]
    UnresolvedPseudo(String),
    #[error("unable to write assembly")]
    Io(#[from] std::io::Error),
}

type EmitResult = Result<(), EmitError>;

/// Symbol naming convention of the platform the assembly is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
}

impl Platform {
    pub fn host() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    fn symbol(&self, name: &str) -> String {
        match self {
            Platform::Linux => name.to_string(),
            Platform::MacOs => format!("_{}", name),
        }
    }
}

/// Writes finished assembly text next to `path` and renames it into place,
/// so a failed write never leaves a truncated file at `path`
pub fn write_assembly(path: &Path, text: &str) -> EmitResult {
    let staging = staging_path(path);

    if let Err(err) = fs::write(&staging, text).and_then(|_| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }

    debug!("wrote assembly to {}", path.display());

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

pub fn emit_to_string(assm: &Program, platform: Platform) -> Result<String, EmitError> {
    let mut buffer = Vec::new();

    emit_program(&mut buffer, assm, platform)?;

    // every piece written above is valid UTF-8
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn emit_program<W: Write>(writer: &mut W, assm: &Program, platform: Platform) -> EmitResult {
    emit_func(writer, &assm.func, platform)?;

    if platform == Platform::Linux {
        emit_stack_note(writer)?;
    }

    Ok(())
}

fn emit_func<W: Write>(writer: &mut W, func: &Func, platform: Platform) -> EmitResult {
    let symbol = platform.symbol(&func.name);

    writeln!(writer, "\t.globl {}", symbol)?;
    writeln!(writer, "{}:", symbol)?;
    writeln!(writer, "\tpushq %rbp")?;
    writeln!(writer, "\tmovq %rsp, %rbp")?;

    for instruction in &func.instructions {
        emit_instruction(writer, instruction)?;
    }

    Ok(())
}

fn emit_instruction<W: Write>(writer: &mut W, instruction: &Instruction) -> EmitResult {
    match instruction {
        Instruction::Mov { src, dest } => writeln!(
            writer,
            "\tmovl {}, {}",
            show_operand(src)?,
            show_operand(dest)?
        )?,
        Instruction::Ret => {
            writeln!(writer, "\tmovq %rbp, %rsp")?;
            writeln!(writer, "\tpopq %rbp")?;
            writeln!(writer, "\tret")?
        }
        Instruction::Unary { op, dest } => {
            writeln!(writer, "\t{} {}", show_unary(op), show_operand(dest)?)?;
        }
        Instruction::Binary {
            op: op @ (BinaryOp::Sal | BinaryOp::Sar),
            src,
            dest,
        } => {
            writeln!(
                writer,
                "\t{} {}, {}",
                show_binary(op),
                show_byte_operand(src)?,
                show_operand(dest)?
            )?;
        }
        Instruction::Binary { op, src, dest } => {
            writeln!(
                writer,
                "\t{} {}, {}",
                show_binary(op),
                show_operand(src)?,
                show_operand(dest)?
            )?;
        }
        Instruction::Idiv(op) => {
            writeln!(writer, "\tidivl {}", show_operand(op)?)?;
        }
        Instruction::Cdq => {
            writeln!(writer, "\tcdq")?;
        }
        Instruction::AllocateStack(amt) => {
            writeln!(writer, "\tsubq ${}, %rsp", amt)?;
        }
    }

    Ok(())
}

fn show_unary(op: &UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "negl",
        UnaryOp::Not => "notl",
    }
}

fn show_binary(op: &BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "addl",
        BinaryOp::Sub => "subl",
        BinaryOp::Mult => "imull",
        BinaryOp::And => "andl",
        BinaryOp::Or => "orl",
        BinaryOp::Xor => "xorl",
        BinaryOp::Sal => "sall",
        BinaryOp::Sar => "sarl",
    }
}

fn show_byte_reg(reg: &Register) -> &'static str {
    match reg {
        Register::AX => "%al",
        Register::CX => "%cl",
        Register::DX => "%dl",
        Register::R10 => "%r10b",
        Register::R11 => "%r11b",
    }
}

fn show_reg(reg: &Register) -> &'static str {
    match reg {
        Register::AX => "%eax",
        Register::CX => "%ecx",
        Register::DX => "%edx",
        Register::R10 => "%r10d",
        Register::R11 => "%r11d",
    }
}

fn show_byte_operand(op: &Operand) -> Result<String, EmitError> {
    match op {
        Operand::Register(reg) => Ok(show_byte_reg(reg).to_string()),
        _ => show_operand(op),
    }
}

fn show_operand(op: &Operand) -> Result<String, EmitError> {
    match op {
        Operand::Register(reg) => Ok(show_reg(reg).to_string()),
        Operand::Stack(amt) => Ok(format!("{}(%rbp)", amt)),
        Operand::Imm(val) => Ok(format!("${}", val)),
        Operand::Pseudo(name) => Err(EmitError::UnresolvedPseudo(name.clone())),
    }
}

fn emit_stack_note<W: Write>(writer: &mut W) -> EmitResult {
    writeln!(writer, "\t.section .note.GNU-stack,\"\",@progbits")?;
    Ok(())
}
