//! Flat JSON tokenizer
//!
//! Splits a JSON text into an order-preserving sequence of typed tokens with
//! byte offsets, without building a tree. Containers record how many
//! immediate children they hold (array elements, object keys), which is all
//! the reply decoders need to sweep the sequence with a [`TokenCursor`].

use thiserror::Error;

/// Token buffer size used unless the client is configured otherwise
pub const DEFAULT_TOKEN_CAPACITY: usize = 128;

/// Kind of a JSON token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Object,
    Array,
    String,
    /// Number, `true`, `false` or `null`
    Primitive,
}

/// One token of a JSON text
///
/// `start..end` is a byte range into the tokenized text. For strings the
/// range excludes the surrounding quotes; for containers it includes the
/// brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Number of immediate children (array elements or object keys)
    pub size: usize,
}

impl Token {
    /// Raw text of the token
    pub fn text<'a>(&self, json: &'a str) -> &'a str {
        &json[self.start..self.end]
    }

    /// Text of the token as a standalone JSON value (strings keep their quotes)
    pub fn fragment<'a>(&self, json: &'a str) -> &'a str {
        match self.kind {
            TokenKind::String => &json[self.start - 1..self.end + 1],
            _ => self.text(json),
        }
    }

    fn is_container(&self) -> bool {
        matches!(self.kind, TokenKind::Object | TokenKind::Array)
    }
}

/// Reasons a text is rejected by the tokenizer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("input ended before the JSON value was complete")]
    Truncated,

    #[error("more than {capacity} tokens")]
    TooManyTokens { capacity: usize },

    #[error("unterminated string starting at byte {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid escape sequence at byte {offset}")]
    InvalidEscape { offset: usize },

    #[error("unexpected {found:?} at byte {offset}")]
    Unexpected { offset: usize, found: char },

    #[error("invalid literal {literal:?} at byte {offset}")]
    InvalidPrimitive { offset: usize, literal: String },
}

/// Tokenize `json`, failing if it needs more than `capacity` tokens
pub fn tokenize(json: &str, capacity: usize) -> Result<Vec<Token>, TokenError> {
    Tokenizer::new(json, capacity).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    ValueOrClose,
    Key,
    KeyOrClose,
    Colon,
    CommaOrClose,
    End,
}

struct Tokenizer<'a> {
    json: &'a str,
    bytes: &'a [u8],
    capacity: usize,
    tokens: Vec<Token>,
    /// Indices of containers that are still open, innermost last
    open: Vec<usize>,
    expect: Expect,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(json: &'a str, capacity: usize) -> Self {
        Self {
            json,
            bytes: json.as_bytes(),
            capacity,
            tokens: Vec::with_capacity(capacity.min(32)),
            open: Vec::new(),
            expect: Expect::Value,
            pos: 0,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, TokenError> {
        while let Some(&byte) = self.bytes.get(self.pos) {
            match byte {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                b'{' | b'[' => self.open_container(byte)?,
                b'}' | b']' => self.close_container(byte)?,
                b'"' => self.string()?,
                b':' => {
                    self.require(&[Expect::Colon])?;
                    self.expect = Expect::Value;
                    self.pos += 1;
                }
                b',' => {
                    self.require(&[Expect::CommaOrClose])?;
                    self.expect = match self.parent_kind() {
                        Some(TokenKind::Object) => Expect::Key,
                        _ => Expect::Value,
                    };
                    self.pos += 1;
                }
                _ => self.primitive()?,
            }
        }

        if self.expect == Expect::End {
            Ok(self.tokens)
        } else {
            Err(TokenError::Truncated)
        }
    }

    fn open_container(&mut self, byte: u8) -> Result<(), TokenError> {
        self.require(&[Expect::Value, Expect::ValueOrClose])?;
        let kind = if byte == b'{' {
            TokenKind::Object
        } else {
            TokenKind::Array
        };

        self.count_value();
        let index = self.push(kind, self.pos, self.pos)?;
        self.open.push(index);
        self.expect = match kind {
            TokenKind::Object => Expect::KeyOrClose,
            _ => Expect::ValueOrClose,
        };
        self.pos += 1;
        Ok(())
    }

    fn close_container(&mut self, byte: u8) -> Result<(), TokenError> {
        let (kind, empty_close) = if byte == b'}' {
            (TokenKind::Object, Expect::KeyOrClose)
        } else {
            (TokenKind::Array, Expect::ValueOrClose)
        };

        let Some(&index) = self.open.last() else {
            return Err(self.unexpected());
        };
        if self.tokens[index].kind != kind {
            return Err(self.unexpected());
        }
        self.require(&[Expect::CommaOrClose, empty_close])?;

        self.tokens[index].end = self.pos + 1;
        self.open.pop();
        self.expect = self.after_value();
        self.pos += 1;
        Ok(())
    }

    fn string(&mut self) -> Result<(), TokenError> {
        let is_key = matches!(self.expect, Expect::Key | Expect::KeyOrClose);
        if !is_key {
            self.require(&[Expect::Value, Expect::ValueOrClose])?;
        }

        let opening = self.pos;
        let start = opening + 1;
        let mut i = start;
        loop {
            match self.bytes.get(i) {
                None => return Err(TokenError::UnterminatedString { offset: opening }),
                Some(b'"') => break,
                Some(b'\\') => match self.bytes.get(i + 1) {
                    Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => i += 2,
                    Some(b'u') => {
                        let hex = self.bytes.get(i + 2..i + 6);
                        if hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                            i += 6;
                        } else {
                            return Err(TokenError::InvalidEscape { offset: i });
                        }
                    }
                    None => return Err(TokenError::UnterminatedString { offset: opening }),
                    Some(_) => return Err(TokenError::InvalidEscape { offset: i }),
                },
                Some(&b) if b < 0x20 => {
                    return Err(TokenError::Unexpected {
                        offset: i,
                        found: char::from(b),
                    })
                }
                Some(_) => i += 1,
            }
        }

        if is_key {
            if let Some(&parent) = self.open.last() {
                self.tokens[parent].size += 1;
            }
            self.push(TokenKind::String, start, i)?;
            self.expect = Expect::Colon;
        } else {
            self.count_value();
            self.push(TokenKind::String, start, i)?;
            self.expect = self.after_value();
        }
        self.pos = i + 1;
        Ok(())
    }

    fn primitive(&mut self) -> Result<(), TokenError> {
        self.require(&[Expect::Value, Expect::ValueOrClose])?;

        let start = self.pos;
        let mut end = start;
        while let Some(&b) = self.bytes.get(end) {
            if matches!(
                b,
                b' ' | b'\t' | b'\n' | b'\r' | b',' | b':' | b']' | b'}' | b'[' | b'{' | b'"'
            ) {
                break;
            }
            end += 1;
        }

        let literal = &self.json[start..end];
        if !matches!(literal, "true" | "false" | "null") && !is_number(literal) {
            return Err(TokenError::InvalidPrimitive {
                offset: start,
                literal: literal.to_string(),
            });
        }

        self.count_value();
        self.push(TokenKind::Primitive, start, end)?;
        self.expect = self.after_value();
        self.pos = end;
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) -> Result<usize, TokenError> {
        if self.tokens.len() >= self.capacity {
            return Err(TokenError::TooManyTokens {
                capacity: self.capacity,
            });
        }
        self.tokens.push(Token {
            kind,
            start,
            end,
            size: 0,
        });
        Ok(self.tokens.len() - 1)
    }

    /// Object keys are counted when the key is read, so only arrays count values
    fn count_value(&mut self) {
        if let Some(&parent) = self.open.last() {
            if self.tokens[parent].kind == TokenKind::Array {
                self.tokens[parent].size += 1;
            }
        }
    }

    fn parent_kind(&self) -> Option<TokenKind> {
        self.open.last().map(|&index| self.tokens[index].kind)
    }

    fn after_value(&self) -> Expect {
        if self.open.is_empty() {
            Expect::End
        } else {
            Expect::CommaOrClose
        }
    }

    fn require(&self, allowed: &[Expect]) -> Result<(), TokenError> {
        if allowed.contains(&self.expect) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> TokenError {
        TokenError::Unexpected {
            offset: self.pos,
            found: self.json[self.pos..].chars().next().unwrap_or('\0'),
        }
    }
}

/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?`
fn is_number(literal: &str) -> bool {
    let bytes = literal.as_bytes();
    let digits = |i: &mut usize| {
        let from = *i;
        while bytes.get(*i).is_some_and(u8::is_ascii_digit) {
            *i += 1;
        }
        *i > from
    };

    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            digits(&mut i);
        }
        _ => return false,
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        if !digits(&mut i) {
            return false;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        if !digits(&mut i) {
            return false;
        }
    }
    i == bytes.len()
}

/// Scan position over a flat token sequence
pub struct TokenCursor<'a> {
    json: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    /// Cursor positioned at token `pos`
    pub fn at(json: &'a str, tokens: &'a [Token], pos: usize) -> Self {
        Self { json, tokens, pos }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    /// Skip every token nested inside `token`
    ///
    /// `token` must be the one most recently returned by the cursor.
    pub fn skip_children(&mut self, token: &Token) {
        if !token.is_container() {
            return;
        }
        while self.peek().is_some_and(|next| next.start < token.end) {
            self.pos += 1;
        }
    }

    pub fn text(&self, token: &Token) -> &'a str {
        token.text(self.json)
    }

    pub fn fragment(&self, token: &Token) -> &'a str {
        token.fragment(self.json)
    }
}

impl<'a> Iterator for TokenCursor<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }
}
