// tarn-syntax - Lexer and parser for the Tarn programming language
// Copyright (c) 2026 Tarn contributors. MIT licensed.

//! Lexer (tokeniser) for Tarn source code.
//!
//! Converts a source string into a stream of tokens. Newlines are tokens of
//! their own: the parser treats them as statement separators.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::token::{Token, lookup_keyword};

/// Lexer error with position information.
#[derive(Debug, Clone)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lexer error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexerError {}

/// The lexer converts source code into tokens.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over the given source.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Current line (1-indexed).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Current column (1-indexed).
    pub fn column(&self) -> usize {
        self.column
    }

    fn error(&self, message: impl Into<String>) -> LexerError {
        LexerError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Consume the next character if it matches.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('/') => {
                    // Only a comment if followed by a second slash.
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();

        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };

        if c == '\n' {
            self.advance();
            return Ok(Token::Newline);
        }
        if c.is_ascii_digit() {
            return self.read_number();
        }
        if c == '"' {
            return self.read_string();
        }
        if c.is_alphabetic() || c == '_' {
            return self.read_ident();
        }

        self.advance();
        let token = match c {
            '+' => {
                if self.eat('+') {
                    Token::PlusPlus
                } else if self.eat('=') {
                    Token::PlusAssign
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    Token::MinusMinus
                } else if self.eat('=') {
                    Token::MinusAssign
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    Token::Power
                } else if self.eat('=') {
                    Token::StarAssign
                } else {
                    Token::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    Token::SlashAssign
                } else {
                    Token::Slash
                }
            }
            '%' => Token::Percent,
            '&' => {
                if self.eat('&') {
                    Token::And
                } else {
                    Token::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            '^' => Token::Caret,
            '!' => {
                if self.eat('=') {
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '<' => {
                if self.eat('<') {
                    Token::LShift
                } else if self.eat('=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    Token::RShift
                } else if self.eat('=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            '.' => Token::Dot,
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            other => return Err(self.error(format!("unexpected character {:?}", other))),
        };
        Ok(token)
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // A fractional part requires a digit after the dot, so `1.abs()`
        // still lexes as an attribute access on an int.
        let mut is_float = false;
        if self.peek() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                text.push('.');
                self.advance();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float literal {:?}", text)))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error(format!("invalid integer literal {:?}", text)))
        }
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string literal")),
                Some('"') => return Ok(Token::Str(text)),
                Some('\\') => match self.advance() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(other) => {
                        return Err(self.error(format!("invalid escape sequence \\{}", other)));
                    }
                    None => return Err(self.error("unterminated string literal")),
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn read_ident(&mut self) -> Result<Token, LexerError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(lookup_keyword(&text).unwrap_or(Token::Ident(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().expect("lex error");
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("+ ++ += - -- -= * ** *= / /="),
            vec![
                Token::Plus,
                Token::PlusPlus,
                Token::PlusAssign,
                Token::Minus,
                Token::MinusMinus,
                Token::MinusAssign,
                Token::Star,
                Token::Power,
                Token::StarAssign,
                Token::Slash,
                Token::SlashAssign,
            ]
        );
        assert_eq!(
            tokens("&& & || | == = != ! <= << < >= >> >"),
            vec![
                Token::And,
                Token::Amp,
                Token::Or,
                Token::Pipe,
                Token::Eq,
                Token::Assign,
                Token::NotEq,
                Token::Bang,
                Token::LtEq,
                Token::LShift,
                Token::Lt,
                Token::GtEq,
                Token::RShift,
                Token::Gt,
            ]
        );
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            tokens("var x = nil"),
            vec![
                Token::Var,
                Token::Ident("x".to_string()),
                Token::Assign,
                Token::Nil,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokens("42"), vec![Token::Int(42)]);
        assert_eq!(tokens("3.14"), vec![Token::Float(3.14)]);
        // A dot not followed by a digit is attribute access.
        assert_eq!(
            tokens("1.x"),
            vec![Token::Int(1), Token::Dot, Token::Ident("x".to_string())]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(tokens("\"hi\\n\""), vec![Token::Str("hi\n".to_string())]);
        let mut lexer = Lexer::new("\"unterminated");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_comments_and_newlines() {
        assert_eq!(
            tokens("1 // comment\n2"),
            vec![Token::Int(1), Token::Newline, Token::Int(2)]
        );
    }

    #[test]
    fn test_position_tracking() {
        let mut lexer = Lexer::new("a\n  b");
        lexer.next_token().unwrap(); // a
        lexer.next_token().unwrap(); // newline
        lexer.next_token().unwrap(); // b
        assert_eq!(lexer.line(), 2);
    }
}
