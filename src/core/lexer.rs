//! Purpose: Tokenize `.proto` source text for the recursive-descent parser.
//! Exports: `Lexer`, `Token`, `Spanned`.
//! Role: First stage of schema compilation; positions are 1-based line/column.
//! Invariants: Whitespace, `//` line comments, and `/* */` block comments never reach the parser.
//! Invariants: Every lex failure carries the exact line/column of the offending character.

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// Identifier or keyword; the parser decides which by spelling.
    Ident(String),
    IntLit(u64),
    FloatLit(f64),
    StrLit(String),
    Punct(char),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("`{name}`"),
            Token::IntLit(value) => format!("integer `{value}`"),
            Token::FloatLit(value) => format!("float `{value}`"),
            Token::StrLit(_) => "string literal".to_string(),
            Token::Punct(c) => format!("`{c}`"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

const PUNCTUATION: &str = ";={}[]()<>,.-+";

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Lex the whole input eagerly. The parser works from the full token
    /// list so it can report expected/found pairs without re-lexing.
    pub fn tokenize(source: &'a str) -> Result<Vec<Spanned>, Error> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some(spanned) = lexer.next_token()? {
            tokens.push(spanned);
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Option<Spanned>, Error> {
        self.skip_trivia()?;
        let line = self.line;
        let column = self.column;
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        let token = if c == '_' || c.is_ascii_alphabetic() {
            self.lex_ident()
        } else if c.is_ascii_digit() {
            self.lex_number()?
        } else if c == '"' || c == '\'' {
            self.lex_string()?
        } else if PUNCTUATION.contains(c) {
            self.bump();
            Token::Punct(c)
        } else {
            return Err(self
                .error(format!("unrecognized character `{c}`"))
                .with_line_col(line, column));
        };

        Ok(Some(Spanned {
            token,
            line,
            column,
        }))
    }

    fn skip_trivia(&mut self) -> Result<(), Error> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    match self.chars.peek() {
                        Some('/') => {
                            while let Some(&c) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.skip_block_comment(line, column)?;
                        }
                        _ => {
                            return Err(self
                                .error("unrecognized character `/`")
                                .with_line_col(line, column));
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self, line: u32, column: u32) -> Result<(), Error> {
        let mut prev_star = false;
        while let Some(&c) = self.chars.peek() {
            self.bump();
            if prev_star && c == '/' {
                return Ok(());
            }
            prev_star = c == '*';
        }
        Err(self
            .error("unterminated block comment")
            .with_line_col(line, column))
    }

    fn lex_ident(&mut self) -> Token {
        let mut name = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '_' || c.is_ascii_alphanumeric() {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::Ident(name)
    }

    fn lex_number(&mut self) -> Result<Token, Error> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        let mut is_float = false;

        if self.chars.peek() == Some(&'0') {
            text.push('0');
            self.bump();
            if matches!(self.chars.peek(), Some('x') | Some('X')) {
                self.bump();
                let mut digits = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_hexdigit() {
                        digits.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                let value = u64::from_str_radix(&digits, 16).map_err(|err| {
                    self.error("invalid hexadecimal literal")
                        .with_line_col(line, column)
                        .with_source(err)
                })?;
                return Ok(Token::IntLit(value));
            }
        }

        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' || c == 'e' || c == 'E' {
                is_float = true;
                text.push(c);
                self.bump();
                if (c == 'e' || c == 'E')
                    && matches!(self.chars.peek(), Some('+') | Some('-'))
                {
                    text.push(*self.chars.peek().unwrap_or(&'+'));
                    self.bump();
                }
            } else {
                break;
            }
        }

        if is_float {
            let value = text.parse::<f64>().map_err(|err| {
                self.error("invalid float literal")
                    .with_line_col(line, column)
                    .with_source(err)
            })?;
            Ok(Token::FloatLit(value))
        } else if text.len() > 1 && text.starts_with('0') {
            // Octal, per proto IDL.
            let value = u64::from_str_radix(&text[1..], 8).map_err(|err| {
                self.error("invalid octal literal")
                    .with_line_col(line, column)
                    .with_source(err)
            })?;
            Ok(Token::IntLit(value))
        } else {
            let value = text.parse::<u64>().map_err(|err| {
                self.error("integer literal out of range")
                    .with_line_col(line, column)
                    .with_source(err)
            })?;
            Ok(Token::IntLit(value))
        }
    }

    fn lex_string(&mut self) -> Result<Token, Error> {
        let (line, column) = (self.line, self.column);
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self
                    .error("unterminated string literal")
                    .with_line_col(line, column));
            };
            if c == quote {
                return Ok(Token::StrLit(value));
            }
            if c == '\n' {
                return Err(self
                    .error("unterminated string literal")
                    .with_line_col(line, column));
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            let (esc_line, esc_column) = (self.line, self.column);
            let Some(esc) = self.bump() else {
                return Err(self
                    .error("unterminated string literal")
                    .with_line_col(line, column));
            };
            match esc {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                'a' => value.push('\x07'),
                'b' => value.push('\x08'),
                'f' => value.push('\x0c'),
                'v' => value.push('\x0b'),
                '\\' => value.push('\\'),
                '\'' => value.push('\''),
                '"' => value.push('"'),
                '0' => value.push('\0'),
                'x' | 'X' => {
                    let mut digits = String::new();
                    for _ in 0..2 {
                        match self.chars.peek() {
                            Some(&c) if c.is_ascii_hexdigit() => {
                                digits.push(c);
                                self.bump();
                            }
                            _ => break,
                        }
                    }
                    let byte = u8::from_str_radix(&digits, 16).map_err(|err| {
                        self.error("invalid hex escape in string literal")
                            .with_line_col(esc_line, esc_column)
                            .with_source(err)
                    })?;
                    value.push(byte as char);
                }
                other => {
                    return Err(self
                        .error(format!("invalid escape `\\{other}` in string literal"))
                        .with_line_col(esc_line, esc_column));
                }
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Lex).with_message(message)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}
