use std::fmt::{Display, Formatter};
use std::iter::Peekable;

use itertools::Itertools;
use log::debug;
use thiserror::Error;

use ast::*;
use lexer::*;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ParseError {
    fn new(message: String) -> Self {
        Self { message }
    }

    fn end_of_file() -> Self {
        Self::new("Unexpected end of file".to_string())
    }

    fn nested_too_deeply() -> Self {
        Self::new(format!(
            "Expression nested too deeply, the limit is {} levels",
            MAX_NESTING
        ))
    }
}

macro_rules! match_token_types {
    ($( $token:pat ),+ ) => {
        $(
        Some(Token{ kind: $token, ..})
        )|+
    };
}

const FACTOR_STARTS: [TokenType; 4] = [
    TokenType::Constant,
    TokenType::Minus,
    TokenType::Tilde,
    TokenType::OpenParen,
];

/// Bound on both parenthesis/unary nesting and expression tree height, later
/// stages walk the tree recursively
pub const MAX_NESTING: usize = 256;

pub struct Parser {
    tokens: Peekable<std::vec::IntoIter<Token>>,
    // Factors currently being parsed, one per open paren or unary operator
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            depth: 0,
        }
    }

    pub fn parse(&mut self) -> Result<TranslationUnit, ParseError> {
        let func = self.parse_func()?;
        self.expect_empty()?;

        debug!("parsed function '{}'", func.ident);

        Ok(TranslationUnit { func })
    }

    fn parse_func(&mut self) -> Result<Func, ParseError> {
        self.expect(TokenType::Int)?;
        let name = self.parse_ident()?;

        self.expect(TokenType::OpenParen)?;
        self.expect(TokenType::Void)?;
        self.expect(TokenType::CloseParen)?;
        self.expect(TokenType::OpenBrace)?;

        let body = self.parse_stmt()?;

        self.expect(TokenType::CloseBrace)?;

        Ok(Func { ident: name, body })
    }

    fn parse_ident(&mut self) -> Result<String, ParseError> {
        match self.tokens.next() {
            Some(Token {
                kind: TokenType::Identifier,
                value: TokenValue::Ident(ident),
                ..
            }) => Ok(ident),
            Some(t) => Err(ParseError::new(format!(
                "Expected an identifier, but found {}",
                t
            ))),
            None => Err(ParseError::new(
                "Expected an identifier, but found end of file instead".to_string(),
            )),
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenType::Return)?;

        let (expr, _) = self.parse_expr(0)?;

        self.expect(TokenType::Semicolon)?;

        Ok(Stmt::Return { expr })
    }

    /// Precedence climbing: the right operand is parsed with a minimum one
    /// above the operator's own so equal-precedence chains fold to the left.
    /// Returns the expression along with the height of its tree.
    fn parse_expr(&mut self, min_prec: i32) -> Result<(Expr, usize), ParseError> {
        let (mut left, mut height) = self.parse_factor()?;

        while let Some(prec) = self.tokens.peek().and_then(|t| get_precedence(t.kind)) {
            if prec < min_prec {
                break;
            }

            let op = self.parse_binop()?;
            let (right, right_height) = self.parse_expr(prec + 1)?;

            height = check_height(height.max(right_height) + 1)?;
            left = Expr::binary(op, left, right);
        }

        Ok((left, height))
    }

    fn parse_factor(&mut self) -> Result<(Expr, usize), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::nested_too_deeply());
        }

        self.depth += 1;
        let factor = self.parse_factor_inner();
        self.depth -= 1;

        factor
    }

    fn parse_factor_inner(&mut self) -> Result<(Expr, usize), ParseError> {
        match self.tokens.peek() {
            match_token_types!(TokenType::Minus, TokenType::Tilde, TokenType::MinusMinus) => {
                let unop = self.parse_unop()?;
                let (expr, height) = self.parse_factor()?;

                Ok((Expr::unary(unop, expr), check_height(height + 1)?))
            }
            Some(Token {
                kind: TokenType::OpenParen,
                ..
            }) => {
                self.tokens.next();
                let expr = self.parse_expr(0)?;
                self.expect(TokenType::CloseParen)?;

                Ok(expr)
            }
            Some(Token {
                kind: TokenType::Constant,
                value: TokenValue::Integer(val),
                ..
            }) => {
                let val = *val;
                self.tokens.next();
                Ok((Expr::Constant(val), 1))
            }
            Some(t) => Err(ParseError::new(format!(
                "Expected one of {}, but found {}",
                FACTOR_STARTS.iter().map(|k| format!("{:?}", k)).join(", "),
                t
            ))),
            None => Err(ParseError::new(
                "Expected an expression, but found end of file instead".to_string(),
            )),
        }
    }

    fn parse_unop(&mut self) -> Result<UnaryOp, ParseError> {
        match self.tokens.next() {
            Some(Token {
                kind: TokenType::Minus,
                ..
            }) => Ok(UnaryOp::Negate),
            Some(Token {
                kind: TokenType::Tilde,
                ..
            }) => Ok(UnaryOp::Complement),
            Some(t @ Token {
                kind: TokenType::MinusMinus,
                ..
            }) => Err(ParseError::new(format!("Invalid operator {}", t))),
            Some(t) => Err(ParseError::new(format!(
                "Expected unary operator, found {}",
                t
            ))),
            None => Err(ParseError::end_of_file()),
        }
    }

    fn parse_binop(&mut self) -> Result<BinaryOp, ParseError> {
        let t = self.tokens.next().ok_or_else(ParseError::end_of_file)?;

        match t.kind {
            TokenType::Plus => Ok(BinaryOp::Add),
            TokenType::Minus => Ok(BinaryOp::Subtract),
            TokenType::Star => Ok(BinaryOp::Multiply),
            TokenType::Slash => Ok(BinaryOp::Divide),
            TokenType::Percent => Ok(BinaryOp::Modulo),

            // Bitwise
            TokenType::Amp => Ok(BinaryOp::BitwiseAnd),
            TokenType::Pipe => Ok(BinaryOp::BitwiseOr),
            TokenType::Xor => Ok(BinaryOp::BitwiseXor),
            TokenType::LessLess => Ok(BinaryOp::BitshiftLeft),
            TokenType::GreaterGreater => Ok(BinaryOp::BitshiftRight),
            _ => Err(ParseError::new(format!(
                "Expected binary operator, found {}",
                t
            ))),
        }
    }

    /// Checks if next token is of correct expected type
    fn expect(&mut self, expected: TokenType) -> Result<Token, ParseError> {
        match self.tokens.next() {
            Some(t) if t.kind == expected => Ok(t),
            Some(t) => Err(ParseError::new(format!(
                "Expected {:?}, but found {}",
                expected, t
            ))),
            None => Err(ParseError::new(format!(
                "Expected {:?}, but found end of file instead",
                expected
            ))),
        }
    }

    fn expect_empty(&mut self) -> Result<(), ParseError> {
        match self.tokens.next() {
            Some(t) => Err(ParseError::new(format!(
                "Expected end of file, but found {}",
                t
            ))),
            None => Ok(()),
        }
    }
}

fn check_height(height: usize) -> Result<usize, ParseError> {
    if height > MAX_NESTING {
        Err(ParseError::nested_too_deeply())
    } else {
        Ok(height)
    }
}

/// Binding power of each binary operator, following C's ordering
fn get_precedence(token: TokenType) -> Option<i32> {
    match token {
        TokenType::Star | TokenType::Slash | TokenType::Percent => Some(50),
        TokenType::Plus | TokenType::Minus => Some(45),
        TokenType::LessLess | TokenType::GreaterGreater => Some(40),
        TokenType::Amp => Some(25),
        TokenType::Xor => Some(20),
        TokenType::Pipe => Some(15),
        _ => None,
    }
}
