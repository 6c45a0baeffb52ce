use std::fmt::{Display, Formatter};
use std::str::Chars;

use log::debug;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character")]
    UnexpectedChar,
    #[error("invalid identifier")]
    InvalidIdentifier,
    #[error("constant out of range")]
    ConstantOutOfRange,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    pub kind: TokenType,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub value: TokenValue,
    pub line: i32,
    pub col: i32,
}

impl Token {
    fn new(
        kind: TokenType,
        text: &str,
        start: usize,
        end: usize,
        value: TokenValue,
        line: i32,
        col: i32,
    ) -> Self {
        Self {
            kind,
            text: text.to_string(),
            start,
            end,
            value,
            line,
            col,
        }
    }

    pub fn error(&self) -> Option<&LexError> {
        match &self.value {
            TokenValue::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} '{}' at {}:{}",
            self.kind, self.text, self.line, self.col
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenValue {
    None,
    Integer(i32),
    Ident(String),
    Error(LexError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    // Single-character tokens
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    Semicolon,
    Tilde,
    Plus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Xor,

    // One or two character tokens
    Minus,
    MinusMinus,
    LessLess,
    GreaterGreater,

    // Literals
    Identifier,
    Constant,

    // Keywords
    Int,
    Void,
    Return,

    // Informational
    Whitespace,
    Eof,
    InvalidIdent,
    InvalidConstant,
    Unknown,
}

const EOF: char = '\0';

/// Token stream borrowed from a [`Lexer`], ends before `Eof`
pub struct Tokens<'l, 'a> {
    lexer: &'l mut Lexer<'a>,
}

impl Iterator for Tokens<'_, '_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let token = self.lexer.scan_token();
            match token.kind {
                TokenType::Eof => return None,
                TokenType::Whitespace => continue,
                _ => return Some(token),
            }
        }
    }
}

pub struct Lexer<'a> {
    /// Source Text
    source: &'a str,

    /// Remaining source characters
    chars: Chars<'a>,
    line: i32,
    col: i32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars(),
            line: 1,
            col: 1,
        }
    }

    /// Lazily scans the source, skipping whitespace. Lexical errors are
    /// yielded in-stream as tokens carrying a `TokenValue::Error`.
    pub fn tokenize(&mut self) -> Tokens<'_, 'a> {
        Tokens { lexer: self }
    }

    /// Scans the whole source, failing with every error token if any were found
    pub fn tokenize_all(&mut self) -> Result<Vec<Token>, Vec<Token>> {
        let (tokens, errors): (Vec<_>, Vec<_>) =
            self.tokenize().partition(|t| t.error().is_none());

        debug!(
            "lexer produced {} tokens and {} errors",
            tokens.len(),
            errors.len()
        );

        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn scan_token(&mut self) -> Token {
        let start = self.offset();
        let line = self.line;
        let col = self.col;

        let c = match self.advance() {
            Some(c) => c,
            None => {
                return Token::new(
                    TokenType::Eof,
                    "",
                    start,
                    self.offset(),
                    TokenValue::None,
                    self.line,
                    self.col,
                )
            }
        };

        let token_type = match c {
            '(' => TokenType::OpenParen,
            ')' => TokenType::CloseParen,
            '{' => TokenType::OpenBrace,
            '}' => TokenType::CloseBrace,
            ';' => TokenType::Semicolon,
            '~' => TokenType::Tilde,
            '+' => TokenType::Plus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '%' => TokenType::Percent,
            '&' => TokenType::Amp,
            '|' => TokenType::Pipe,
            '^' => TokenType::Xor,
            '-' => match self.peek() {
                '-' => {
                    self.advance();
                    TokenType::MinusMinus
                }
                _ => TokenType::Minus,
            },
            '<' => match self.peek() {
                '<' => {
                    self.advance();
                    TokenType::LessLess
                }
                _ => TokenType::Unknown,
            },
            '>' => match self.peek() {
                '>' => {
                    self.advance();
                    TokenType::GreaterGreater
                }
                _ => TokenType::Unknown,
            },
            '0'..='9' => self.number(),
            'a'..='z' | 'A'..='Z' | '_' => self.identifier(start),
            ' ' | '\r' | '\t' => TokenType::Whitespace,
            '\n' => {
                self.line += 1;
                self.col = 1;
                TokenType::Whitespace
            }
            _ => TokenType::Unknown,
        };

        let end = self.offset();
        let text = &self.source[start..end];

        let (token_type, token_value) = match token_type {
            TokenType::Constant => match text.parse::<i32>() {
                Ok(val) => (token_type, TokenValue::Integer(val)),
                Err(_) => (
                    TokenType::InvalidConstant,
                    TokenValue::Error(LexError::ConstantOutOfRange),
                ),
            },
            TokenType::Identifier => (token_type, TokenValue::Ident(text.to_string())),
            TokenType::Unknown => (token_type, TokenValue::Error(LexError::UnexpectedChar)),
            TokenType::InvalidIdent => {
                (token_type, TokenValue::Error(LexError::InvalidIdentifier))
            }
            _ => (token_type, TokenValue::None),
        };

        Token::new(token_type, text, start, end, token_value, line, col)
    }

    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // digits running straight into an identifier are neither a constant nor an identifier
        if is_ident_char(self.peek()) {
            while is_ident_char(self.peek()) {
                self.advance();
            }
            return TokenType::InvalidIdent;
        }

        TokenType::Constant
    }

    fn identifier(&mut self, start: usize) -> TokenType {
        while is_ident_char(self.peek()) {
            self.advance();
        }

        match &self.source[start..self.offset()] {
            "int" => TokenType::Int,
            "void" => TokenType::Void,
            "return" => TokenType::Return,
            _ => TokenType::Identifier,
        }
    }

    /// Get offset into source text
    fn offset(&self) -> usize {
        self.source.len() - self.chars.as_str().len()
    }

    fn peek(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.col += 1;

        Some(c)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
