//! BIF tokenizer.
//!
//! Splits source text into punctuation and word tokens while tracking
//! 1-based line/column positions for diagnostics. `//` line comments and
//! `/* ... */` block comments count as whitespace. A word is any run of
//! characters excluding whitespace and the structural characters
//! `{ } ( ) , = :`, which covers file paths as well as keywords and
//! attribute values.

use crate::error::{Error, Result};

/// One lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    Equals,
    Colon,
    /// Path, keyword or attribute value
    Word(String),
}

/// Source position, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

/// Token with the position of its first character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub pos: Pos,
}

pub struct Lexer<'a> {
    origin: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, origin: &'a str) -> Self {
        Self {
            origin,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input.
    ///
    /// Total: every character lands in a token or in trivia; the only
    /// failure is an unterminated block comment.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else { break };
            let pos = Pos {
                line: self.line,
                column: self.column,
            };
            let token = match c {
                '{' => {
                    self.advance();
                    Token::LBrace
                }
                '}' => {
                    self.advance();
                    Token::RBrace
                }
                '(' => {
                    self.advance();
                    Token::LParen
                }
                ')' => {
                    self.advance();
                    Token::RParen
                }
                ',' => {
                    self.advance();
                    Token::Comma
                }
                '=' => {
                    self.advance();
                    Token::Equals
                }
                ':' => {
                    self.advance();
                    Token::Colon
                }
                _ => Token::Word(self.read_word()),
            };
            tokens.push(Spanned { token, pos });
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.advance(),
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let start = Pos {
            line: self.line,
            column: self.column,
        };
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => {
                    return Err(Error::parse(
                        self.origin,
                        start.line,
                        start.column,
                        "unterminated block comment",
                    ));
                }
                Some('*') if self.peek_next() == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '{' | '}' | '(' | ')' | ',' | '=' | ':') {
                break;
            }
            word.push(c);
            self.advance();
        }
        word
    }
}
