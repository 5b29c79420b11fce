//! Tokenizer for the candidate scripting language (SPEC_FULL.md §4.B').
//!
//! Whitespace-sensitive like Python: indentation drives block structure, so
//! the lexer emits `Indent`/`Dedent` tokens the parser consumes as block
//! delimiters instead of relying on braces.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Keyword(&'static str),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

const KEYWORDS: &[&str] = &[
    "def", "if", "elif", "else", "for", "in", "while", "return", "import", "and", "or", "not",
    "True", "False", "None", "break", "continue", "raise",
];

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    indent_stack: Vec<usize>,
    at_line_start: bool,
    paren_depth: i32,
    pending_dedents: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            indent_stack: vec![0],
            at_line_start: true,
            paren_depth: 0,
            pending_dedents: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            if self.pending_dedents > 0 {
                self.pending_dedents -= 1;
                tokens.push(Token::Dedent);
                continue;
            }
            if self.at_line_start && self.paren_depth == 0 {
                if let Some(tok) = self.handle_indentation()? {
                    tokens.push(tok);
                    continue;
                }
            }
            match self.next_token()? {
                Token::Eof => {
                    tokens.push(Token::Newline);
                    while self.indent_stack.len() > 1 {
                        self.indent_stack.pop();
                        tokens.push(Token::Dedent);
                    }
                    tokens.push(Token::Eof);
                    break;
                }
                Token::Newline if self.paren_depth > 0 => {
                    // Newlines inside parens are insignificant.
                }
                tok => tokens.push(tok),
            }
        }
        Ok(tokens)
    }

    /// Consumes leading whitespace on a fresh line and returns at most one
    /// `Indent`/`Dedent` token; additional dedents queue in `pending_dedents`
    /// so the driving loop can drain them one at a time.
    fn handle_indentation(&mut self) -> Result<Option<Token>, LexError> {
        let start = self.pos;
        let mut width = 0usize;
        while self.peek() == Some(b' ') || self.peek() == Some(b'\t') {
            width += 1;
            self.pos += 1;
        }
        // Blank line or comment-only line: skip without affecting indentation.
        if matches!(self.peek(), Some(b'\n') | Some(b'#') | None) {
            if self.peek() == Some(b'#') {
                while self.peek().is_some() && self.peek() != Some(b'\n') {
                    self.pos += 1;
                }
            }
            if self.peek() == Some(b'\n') {
                self.pos += 1;
                self.line += 1;
            } else if self.peek().is_none() {
                self.pos = start;
                self.at_line_start = false;
                return Ok(None);
            }
            return Ok(None);
        }
        self.at_line_start = false;
        let current = *self.indent_stack.last().unwrap();
        if width > current {
            self.indent_stack.push(width);
            return Ok(Some(Token::Indent));
        }
        if width < current {
            let mut popped = 0usize;
            while *self.indent_stack.last().unwrap() > width {
                self.indent_stack.pop();
                popped += 1;
            }
            if *self.indent_stack.last().unwrap() != width {
                return Err(self.err("inconsistent indentation".to_string()));
            }
            self.pending_dedents = popped - 1;
            return Ok(Some(Token::Dedent));
        }
        Ok(None)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            match self.peek() {
                None => return Ok(Token::Eof),
                Some(b' ') | Some(b'\t') => {
                    self.pos += 1;
                }
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                Some(b'#') => {
                    while self.peek().is_some() && self.peek() != Some(b'\n') {
                        self.pos += 1;
                    }
                }
                Some(b'\n') => {
                    self.pos += 1;
                    self.line += 1;
                    if self.paren_depth == 0 {
                        self.at_line_start = true;
                        return Ok(Token::Newline);
                    }
                }
                _ => break,
            }
        }

        let c = self.peek().unwrap();

        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).map(|b| b.is_ascii_digit()).unwrap_or(false))
        {
            return self.lex_number();
        }
        if c == b'"' || c == b'\'' {
            return self.lex_string(c);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return self.lex_ident();
        }

        self.lex_operator()
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == b'.' && !is_float {
                is_float = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|e| self.err(format!("invalid float literal: {}", e)))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|e| self.err(format!("invalid int literal: {}", e)))
        }
    }

    fn lex_string(&mut self, quote: u8) -> Result<Token, LexError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated string literal".to_string())),
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'n') => out.push('\n'),
                        Some(b't') => out.push('\t'),
                        Some(b'\\') => out.push('\\'),
                        Some(b'"') => out.push('"'),
                        Some(b'\'') => out.push('\''),
                        Some(other) => out.push(other as char),
                        None => return Err(self.err("unterminated escape".to_string())),
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c as char);
                    self.pos += 1;
                }
            }
        }
        Ok(Token::Str(out))
    }

    fn lex_ident(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if let Some(kw) = KEYWORDS.iter().find(|k| **k == text) {
            Ok(Token::Keyword(kw))
        } else {
            Ok(Token::Ident(text.to_string()))
        }
    }

    fn lex_operator(&mut self) -> Result<Token, LexError> {
        let three = self.lookahead_str(3);
        if three == "**=" {
            self.pos += 3;
            return Ok(Token::Op("**="));
        }
        let two = self.lookahead_str(2);
        let two_ops = ["**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/="];
        if let Some(op) = two_ops.iter().find(|o| **o == two) {
            self.pos += 2;
            return Ok(Token::Op(op));
        }
        let c = self.peek().unwrap();
        let single = match c {
            b'(' => {
                self.paren_depth += 1;
                "("
            }
            b')' => {
                self.paren_depth -= 1;
                ")"
            }
            b'[' => {
                self.paren_depth += 1;
                "["
            }
            b']' => {
                self.paren_depth -= 1;
                "]"
            }
            b'{' => {
                self.paren_depth += 1;
                "{"
            }
            b'}' => {
                self.paren_depth -= 1;
                "}"
            }
            b':' => ":",
            b',' => ",",
            b'.' => ".",
            b'+' => "+",
            b'-' => "-",
            b'*' => "*",
            b'/' => "/",
            b'%' => "%",
            b'<' => "<",
            b'>' => ">",
            b'=' => "=",
            other => {
                return Err(self.err(format!("unexpected character '{}'", other as char)));
            }
        };
        self.pos += 1;
        Ok(Token::Op(single))
    }

    fn lookahead_str(&self, n: usize) -> String {
        let end = (self.pos + n).min(self.src.len());
        String::from_utf8_lossy(&self.src[self.pos..end]).to_string()
    }

    fn err(&self, message: String) -> LexError {
        LexError {
            message,
            line: self.line,
        }
    }
}
