//! Tokenizer for the reference parser

use super::parser::ParseError;
use super::{Node, Position, Range};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Lowercase name, possibly qualified (`List.map`)
    Lower { qualifiers: Vec<String>, name: String },
    /// Uppercase name, possibly qualified (`Maybe.Just`)
    Upper { qualifiers: Vec<String>, name: String },
    /// `.field`
    DotField(String),
    Keyword(Keyword),
    Operator(String),
    Integer(i64),
    Float(f64),
    Str(String),
    Char(char),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Equals,
    Colon,
    Arrow,
    Pipe,
    DotDot,
    Backslash,
    Underscore,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    Module,
    Port,
    Exposing,
    Import,
    As,
    Type,
    Alias,
    If,
    Then,
    Else,
    Let,
    In,
    Case,
    Of,
    Infix,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "module" => Keyword::Module,
            "port" => Keyword::Port,
            "exposing" => Keyword::Exposing,
            "import" => Keyword::Import,
            "as" => Keyword::As,
            "type" => Keyword::Type,
            "alias" => Keyword::Alias,
            "if" => Keyword::If,
            "then" => Keyword::Then,
            "else" => Keyword::Else,
            "let" => Keyword::Let,
            "in" => Keyword::In,
            "case" => Keyword::Case,
            "of" => Keyword::Of,
            "infix" => Keyword::Infix,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub range: Range,
    /// Byte offsets into the source
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Tokenized source plus the comments found along the way
pub(crate) struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Node<String>>,
}

pub(crate) struct Lexer<'src> {
    source: &'src str,
    chars: std::iter::Peekable<std::str::CharIndices<'src>>,
    offset: usize,
    line: u32,
    column: u32,
}

const OPERATOR_CHARS: &str = "+-*/<>=|&^%!?:.$#~@";

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Lexed, ParseError> {
        let mut tokens = Vec::new();
        let mut comments = Vec::new();

        loop {
            self.skip_whitespace();
            let start = self.position();
            let start_offset = self.offset;

            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    range: Range::new(start, start),
                    start_offset,
                    end_offset: start_offset,
                });
                break;
            };

            if c == '-' && self.peek_second() == Some('-') {
                let text = self.line_comment();
                comments.push(Node::new(Range::new(start, self.position()), text));
                continue;
            }
            if c == '{' && self.peek_second() == Some('-') {
                let text = self.block_comment(start)?;
                comments.push(Node::new(Range::new(start, self.position()), text));
                continue;
            }

            let kind = self.next_kind(start)?;
            tokens.push(Token {
                kind,
                range: Range::new(start, self.position()),
                start_offset,
                end_offset: self.offset,
            });
        }

        Ok(Lexed { tokens, comments })
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.offset..].chars().nth(1)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) -> &'src str {
        let start = self.offset;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.advance();
        }
        &self.source[start..self.offset]
    }

    fn skip_whitespace(&mut self) {
        self.advance_while(char::is_whitespace);
    }

    fn line_comment(&mut self) -> String {
        self.advance_while(|c| c != '\n').to_string()
    }

    fn block_comment(&mut self, start: Position) -> Result<String, ParseError> {
        let start_offset = self.offset;
        let mut depth = 0usize;
        loop {
            match (self.peek(), self.peek_second()) {
                (Some('{'), Some('-')) => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                (Some('-'), Some('}')) => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.source[start_offset..self.offset].to_string());
                    }
                }
                (Some(_), _) => {
                    self.advance();
                }
                (None, _) => {
                    return Err(ParseError::Lex {
                        position: start,
                        message: "unterminated block comment".to_string(),
                    })
                }
            }
        }
    }

    fn next_kind(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        let Some(c) = self.peek() else {
            return Ok(TokenKind::Eof);
        };

        if c.is_ascii_digit() {
            return self.number(start);
        }
        if c.is_alphabetic() {
            return Ok(self.name());
        }

        match c {
            '"' => return self.string(start),
            '\'' => return self.char_literal(start),
            '_' => {
                let word = self.advance_while(|c| c.is_alphanumeric() || c == '_');
                if word == "_" {
                    return Ok(TokenKind::Underscore);
                }
                return Err(ParseError::Lex {
                    position: start,
                    message: format!("invalid name `{}`", word),
                });
            }
            '.' if self.peek_second().is_some_and(|n| n.is_lowercase()) => {
                self.advance();
                let field = self.advance_while(|c| c.is_alphanumeric() || c == '_');
                return Ok(TokenKind::DotField(field.to_string()));
            }
            _ => {}
        }

        let single = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ',' => Some(TokenKind::Comma),
            '\\' => Some(TokenKind::Backslash),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(kind);
        }

        if OPERATOR_CHARS.contains(c) {
            let op = self.advance_while(|c| OPERATOR_CHARS.contains(c));
            return Ok(match op {
                "=" => TokenKind::Equals,
                ":" => TokenKind::Colon,
                "->" => TokenKind::Arrow,
                "|" => TokenKind::Pipe,
                ".." => TokenKind::DotDot,
                other => TokenKind::Operator(other.to_string()),
            });
        }

        Err(ParseError::Lex {
            position: start,
            message: format!("unexpected character `{}`", c),
        })
    }

    fn name(&mut self) -> TokenKind {
        let mut qualifiers = Vec::new();
        loop {
            let word = self
                .advance_while(|c| c.is_alphanumeric() || c == '_')
                .to_string();
            let is_upper = word.starts_with(|c: char| c.is_uppercase());

            // `Module.name` continues only after an uppercase segment with no whitespace
            let continues = is_upper
                && self.peek() == Some('.')
                && self.peek_second().is_some_and(char::is_alphabetic);
            if continues {
                qualifiers.push(word);
                self.advance();
                continue;
            }

            if is_upper {
                return TokenKind::Upper {
                    qualifiers,
                    name: word,
                };
            }
            if qualifiers.is_empty() {
                if let Some(keyword) = Keyword::from_word(&word) {
                    return TokenKind::Keyword(keyword);
                }
            }
            return TokenKind::Lower {
                qualifiers,
                name: word,
            };
        }
    }

    fn number(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        if self.peek() == Some('0') && self.peek_second() == Some('x') {
            self.advance();
            self.advance();
            let digits = self.advance_while(|c| c.is_ascii_hexdigit());
            return i64::from_str_radix(digits, 16)
                .map(TokenKind::Integer)
                .map_err(|e| ParseError::Lex {
                    position: start,
                    message: format!("invalid hex literal: {}", e),
                });
        }

        let start_offset = self.offset;
        self.advance_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.advance_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('-') | Some('+')) {
                self.advance();
            }
            self.advance_while(|c| c.is_ascii_digit());
        }

        let text = &self.source[start_offset..self.offset];
        let invalid = |message: String| ParseError::Lex {
            position: start,
            message,
        };
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|e| invalid(format!("invalid float literal: {}", e)))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|e| invalid(format!("invalid integer literal: {}", e)))
        }
    }

    fn escape(&mut self, start: Position) -> Result<char, ParseError> {
        let escaped = self.advance().ok_or_else(|| ParseError::Lex {
            position: start,
            message: "unterminated escape sequence".to_string(),
        })?;
        Ok(match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            other => other,
        })
    }

    fn string(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        let triple = self.source[self.offset..].starts_with("\"\"\"");
        let quotes = if triple { 3 } else { 1 };
        for _ in 0..quotes {
            self.advance();
        }

        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::Lex {
                        position: start,
                        message: "unterminated string literal".to_string(),
                    })
                }
                Some('\n') if !triple => {
                    return Err(ParseError::Lex {
                        position: start,
                        message: "unterminated string literal".to_string(),
                    })
                }
                Some('"') if !triple || self.source[self.offset..].starts_with("\"\"\"") => {
                    for _ in 0..quotes {
                        self.advance();
                    }
                    return Ok(TokenKind::Str(value));
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.escape(start)?);
                }
                Some(_) => {
                    if let Some(c) = self.advance() {
                        value.push(c);
                    }
                }
            }
        }
    }

    fn char_literal(&mut self, start: Position) -> Result<TokenKind, ParseError> {
        self.advance();
        let value = match self.advance() {
            Some('\\') => self.escape(start)?,
            Some(c) => c,
            None => {
                return Err(ParseError::Lex {
                    position: start,
                    message: "unterminated char literal".to_string(),
                })
            }
        };
        if self.advance() != Some('\'') {
            return Err(ParseError::Lex {
                position: start,
                message: "char literal must contain exactly one character".to_string(),
            });
        }
        Ok(TokenKind::Char(value))
    }
}
