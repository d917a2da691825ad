//! Shape-specific decoding of reply values
//!
//! A reply's `value` is a JSON fragment whose shape depends on the command:
//! a scalar, a flat array of numbers, or the two-segment array of strings
//! returned by `GetSupportedDeviceTypes`.

use crate::error::{CamillaError, Result};
use crate::tokens::{tokenize, Token, TokenCursor, TokenKind};
use crate::types::SupportedDeviceTypes;
use std::fmt::Display;
use std::str::FromStr;

/// A tokenized reply value
pub(crate) struct Fragment<'a> {
    field: &'static str,
    json: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Fragment<'a> {
    /// Tokenize `json`, the value of a reply to the command named `field`
    pub(crate) fn parse(field: &'static str, json: &'a str, capacity: usize) -> Result<Self> {
        if json.trim().is_empty() {
            return Err(CamillaError::decode(field, "reply carries no value"));
        }
        let tokens = tokenize(json, capacity)?;
        Ok(Self {
            field,
            json,
            tokens,
        })
    }

    fn single(&self, kind: TokenKind) -> Result<&Token> {
        match self.tokens.as_slice() {
            [token] if token.kind == kind => Ok(token),
            _ => Err(CamillaError::decode(
                self.field,
                format!("expected a {:?}, got {}", kind, self.json),
            )),
        }
    }

    fn unquote(&self, token: &Token) -> Result<String> {
        serde_json::from_str(token.fragment(self.json))
            .map_err(|e| CamillaError::decode(self.field, e.to_string()))
    }

    pub(crate) fn string(&self) -> Result<String> {
        let token = self.single(TokenKind::String)?;
        self.unquote(token)
    }

    /// A string, or `None` when the engine sent `null`
    pub(crate) fn optional_string(&self) -> Result<Option<String>> {
        match self.tokens.as_slice() {
            [token] if token.kind == TokenKind::Primitive && token.text(self.json) == "null" => {
                Ok(None)
            }
            _ => self.string().map(Some),
        }
    }

    pub(crate) fn number<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let token = self.single(TokenKind::Primitive)?;
        parse_number(self.field, token.text(self.json))
    }

    pub(crate) fn boolean(&self) -> Result<bool> {
        match self.single(TokenKind::Primitive)?.text(self.json) {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(CamillaError::decode(
                self.field,
                format!("{:?} is not a boolean", other),
            )),
        }
    }

    /// Every number of an array, in order
    ///
    /// Nested array tokens are stepped over, so `[[-3.0],[-4.5]]` decodes the
    /// same as `[-3.0,-4.5]`.
    pub(crate) fn numbers(&self) -> Result<Vec<f32>> {
        let cursor = self.array_cursor()?;
        let mut levels = Vec::new();

        for token in cursor {
            match token.kind {
                TokenKind::Array => continue,
                TokenKind::Primitive => levels.push(parse_number(self.field, token.text(self.json))?),
                _ => {
                    return Err(CamillaError::decode(
                        self.field,
                        format!("unexpected element {}", token.fragment(self.json)),
                    ))
                }
            }
        }

        Ok(levels)
    }

    /// Split `[[playback...],[capture...]]` into its two lists
    ///
    /// Strings belong to the playback list until the first nested array token
    /// after the opening of the first list; every string from there on belongs
    /// to the capture list.
    pub(crate) fn device_types(&self) -> Result<SupportedDeviceTypes> {
        let mut cursor = self.array_cursor()?;
        if cursor.peek().is_some_and(|t| t.kind == TokenKind::Array) {
            cursor.next();
        }

        let mut types = SupportedDeviceTypes::default();
        let mut end_of_playback = false;

        for token in cursor {
            match token.kind {
                TokenKind::Array => end_of_playback = true,
                TokenKind::String => {
                    let name = self.unquote(token)?;
                    if end_of_playback {
                        types.capture.push(name);
                    } else {
                        types.playback.push(name);
                    }
                }
                _ => {
                    return Err(CamillaError::decode(
                        self.field,
                        format!("unexpected element {}", token.fragment(self.json)),
                    ))
                }
            }
        }

        Ok(types)
    }

    /// Cursor positioned after the outer array token
    fn array_cursor(&self) -> Result<TokenCursor<'_>> {
        match self.tokens.first() {
            Some(token) if token.kind == TokenKind::Array => {
                Ok(TokenCursor::at(self.json, &self.tokens, 1))
            }
            _ => Err(CamillaError::decode(
                self.field,
                format!("expected an array, got {}", self.json),
            )),
        }
    }
}

fn parse_number<T>(field: &'static str, text: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    text.parse()
        .map_err(|e| CamillaError::decode(field, format!("{:?} is not a valid number: {}", text, e)))
}
