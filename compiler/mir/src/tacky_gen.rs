use log::debug;
use unique_ident::NameGen;

use crate::tacky;
use crate::tacky::{Instruction, Val};

pub fn gen_tacky(ast: ast::TranslationUnit) -> tacky::TranslationUnit {
    // temporaries are numbered per compilation
    let mut names = NameGen::new();

    let func = tacky_func(ast.func, &mut names);

    debug!(
        "generated {} TACKY instructions using {} temporaries",
        func.instructions.len(),
        names.temps_created()
    );

    tacky::TranslationUnit { func }
}

fn tacky_func(func: ast::Func, names: &mut NameGen) -> tacky::Func {
    let mut instructions = vec![];

    tacky_stmt(func.body, &mut instructions, names);

    tacky::Func {
        name: func.ident,
        instructions,
    }
}

fn tacky_stmt(stmt: ast::Stmt, instructions: &mut Vec<Instruction>, names: &mut NameGen) {
    match stmt {
        ast::Stmt::Return { expr } => {
            let value = tacky_expr(expr, instructions, names);
            instructions.push(Instruction::Return(value));
        }
    }
}

/// Appends the instructions computing `expr` and returns where its value lives
fn tacky_expr(expr: ast::Expr, instructions: &mut Vec<Instruction>, names: &mut NameGen) -> Val {
    match expr {
        ast::Expr::Constant(val) => Val::Constant(val),
        ast::Expr::Unary { op, expr } => {
            let src = tacky_expr(*expr, instructions, names);
            let dest = names.make_temp();

            instructions.push(Instruction::Unary {
                op: tacky_unop(op),
                src,
                dest: dest.clone(),
            });

            Val::Var(dest)
        }
        ast::Expr::Binary { op, left, right } => {
            let first = tacky_expr(*left, instructions, names);
            let second = tacky_expr(*right, instructions, names);
            let dest = names.make_temp();

            instructions.push(Instruction::Binary {
                op: tacky_binop(op),
                first,
                second,
                dest: dest.clone(),
            });

            Val::Var(dest)
        }
    }
}

fn tacky_unop(op: ast::UnaryOp) -> tacky::UnaryOp {
    match op {
        ast::UnaryOp::Complement => tacky::UnaryOp::Complement,
        ast::UnaryOp::Negate => tacky::UnaryOp::Negate,
    }
}

fn tacky_binop(op: ast::BinaryOp) -> tacky::BinaryOp {
    match op {
        ast::BinaryOp::Add => tacky::BinaryOp::Add,
        ast::BinaryOp::Subtract => tacky::BinaryOp::Subtract,
        ast::BinaryOp::Multiply => tacky::BinaryOp::Multiply,
        ast::BinaryOp::Divide => tacky::BinaryOp::Divide,
        ast::BinaryOp::Modulo => tacky::BinaryOp::Modulo,

        // Bitwise
        ast::BinaryOp::BitwiseAnd => tacky::BinaryOp::BitwiseAnd,
        ast::BinaryOp::BitwiseOr => tacky::BinaryOp::BitwiseOr,
        ast::BinaryOp::BitwiseXor => tacky::BinaryOp::BitwiseXor,
        ast::BinaryOp::BitshiftLeft => tacky::BinaryOp::BitshiftLeft,
        ast::BinaryOp::BitshiftRight => tacky::BinaryOp::BitshiftRight,
    }
}

#[cfg(test)]
mod tests {
    use lexer::Lexer;
    use parser::Parser;

    use super::*;
    use crate::tacky::{BinaryOp, UnaryOp};

    fn tacky_for(src: &str) -> Vec<Instruction> {
        let tokens = Lexer::new(src).tokenize().collect();
        let ast = Parser::new(tokens).parse().unwrap();
        gen_tacky(ast).func.instructions
    }

    fn var(name: &str) -> Val {
        Val::Var(name.to_string())
    }

    #[test]
    fn constant_needs_no_temporaries() {
        assert_eq!(
            tacky_for("int main(void) { return 7; }"),
            vec![Instruction::Return(Val::Constant(7))]
        )
    }

    #[test]
    fn nested_unary() {
        assert_eq!(
            tacky_for("int main(void) { return -(~2); }"),
            vec![
                Instruction::Unary {
                    op: UnaryOp::Complement,
                    src: Val::Constant(2),
                    dest: "tmp.0".to_string(),
                },
                Instruction::Unary {
                    op: UnaryOp::Negate,
                    src: var("tmp.0"),
                    dest: "tmp.1".to_string(),
                },
                Instruction::Return(var("tmp.1")),
            ]
        )
    }

    #[test]
    fn left_operand_is_evaluated_first() {
        assert_eq!(
            tacky_for("int main(void) { return -1 * (2 - 3); }"),
            vec![
                Instruction::Unary {
                    op: UnaryOp::Negate,
                    src: Val::Constant(1),
                    dest: "tmp.0".to_string(),
                },
                Instruction::Binary {
                    op: BinaryOp::Subtract,
                    first: Val::Constant(2),
                    second: Val::Constant(3),
                    dest: "tmp.1".to_string(),
                },
                Instruction::Binary {
                    op: BinaryOp::Multiply,
                    first: var("tmp.0"),
                    second: var("tmp.1"),
                    dest: "tmp.2".to_string(),
                },
                Instruction::Return(var("tmp.2")),
            ]
        )
    }

    #[test]
    fn each_temporary_is_written_once_before_use() {
        let instructions = tacky_for("int main(void) { return (1 + 2) * 3 - 4 / ~5 % 6 << 1; }");
        let mut written: Vec<String> = vec![];

        for instruction in &instructions {
            let (reads, dest) = match instruction {
                Instruction::Return(v) => (vec![v], None),
                Instruction::Unary { src, dest, .. } => (vec![src], Some(dest)),
                Instruction::Binary {
                    first,
                    second,
                    dest,
                    ..
                } => (vec![first, second], Some(dest)),
            };

            for read in reads {
                if let Val::Var(name) = read {
                    assert!(written.contains(name), "{} read before written", name);
                }
            }

            if let Some(dest) = dest {
                assert!(!written.contains(dest), "{} written twice", dest);
                written.push(dest.clone());
            }
        }
    }

    #[test]
    fn counter_restarts_per_compilation() {
        let first = tacky_for("int main(void) { return -1; }");
        let second = tacky_for("int main(void) { return -1; }");

        assert_eq!(first, second);
    }
}
