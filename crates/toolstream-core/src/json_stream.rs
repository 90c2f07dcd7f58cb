//! Push decoder for the top-level members of a JSON object.
//!
//! Tool-call arguments arrive as arbitrary slices of one JSON document. The
//! decoder is fed those slices in order and reports every top-level
//! `key: value` pair as soon as the value is complete, without re-reading
//! what it has already consumed. Nested objects, arrays and strings are
//! delimited by a small scanner and handed to `serde_json` once closed, so a
//! member value may nest at most [`MAX_VALUE_DEPTH`] levels deep.

use serde_json::Value;
use thiserror::Error;

/// Nesting limit of a member value, inherited from `serde_json`'s parser.
pub const MAX_VALUE_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub enum JsonEvent {
    /// A top-level member whose value is fully decoded.
    Value { key: String, value: Value },
    /// The closing brace of the object.
    End,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected a JSON object, found {found:?} at byte {offset}")]
    NotAnObject { found: char, offset: usize },

    #[error("unexpected character {found:?} at byte {offset}")]
    UnexpectedCharacter { found: char, offset: usize },

    #[error("invalid object key at byte {offset}: {message}")]
    InvalidKey { offset: usize, message: String },

    /// Malformed value text, or a value nested deeper than [`MAX_VALUE_DEPTH`].
    #[error("invalid value for key {key:?}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("unexpected data after the end of the object at byte {offset}")]
    TrailingData { offset: usize },

    #[error("decoder stopped after an earlier error")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeObject,
    BeforeKey { first: bool },
    InKey,
    AfterKey,
    BeforeValue,
    InString,
    InContainer,
    InScalar,
    AfterValue,
    Done,
    Failed,
}

#[derive(Debug)]
pub struct JsonObjectDecoder {
    state: State,
    offset: usize,
    // Raw text of the current key and value, quotes and escapes included.
    key: String,
    value: String,
    brackets: Vec<char>,
    in_string: bool,
    escaped: bool,
}

impl Default for JsonObjectDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonObjectDecoder {
    pub fn new() -> Self {
        Self {
            state: State::BeforeObject,
            offset: 0,
            key: String::new(),
            value: String::new(),
            brackets: Vec::new(),
            in_string: false,
            escaped: false,
        }
    }

    /// True once the closing brace has been consumed.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    pub fn is_failed(&self) -> bool {
        self.state == State::Failed
    }

    /// Feeds the next fragment.
    ///
    /// Events decoded before a malformed character are still pushed to
    /// `events`, so callers can apply them before handling the error. After
    /// an error every further call returns [`DecodeError::Stopped`].
    pub fn write(&mut self, fragment: &str, events: &mut Vec<JsonEvent>) -> Result<(), DecodeError> {
        if self.state == State::Failed {
            return Err(DecodeError::Stopped);
        }

        for ch in fragment.chars() {
            if let Err(err) = self.step(ch, events) {
                self.state = State::Failed;
                return Err(err);
            }
            self.offset += ch.len_utf8();
        }
        Ok(())
    }

    fn step(&mut self, ch: char, events: &mut Vec<JsonEvent>) -> Result<(), DecodeError> {
        match self.state {
            State::BeforeObject => match ch {
                c if is_json_whitespace(c) => {}
                '{' => self.state = State::BeforeKey { first: true },
                found => {
                    return Err(DecodeError::NotAnObject {
                        found,
                        offset: self.offset,
                    });
                }
            },
            State::BeforeKey { first } => match ch {
                c if is_json_whitespace(c) => {}
                '"' => {
                    self.key.clear();
                    self.key.push(ch);
                    self.escaped = false;
                    self.state = State::InKey;
                }
                '}' if first => {
                    self.state = State::Done;
                    events.push(JsonEvent::End);
                }
                found => return Err(self.unexpected(found)),
            },
            State::InKey => {
                self.key.push(ch);
                if self.scan_string_char(ch) {
                    self.state = State::AfterKey;
                }
            }
            State::AfterKey => match ch {
                c if is_json_whitespace(c) => {}
                ':' => self.state = State::BeforeValue,
                found => return Err(self.unexpected(found)),
            },
            State::BeforeValue => match ch {
                c if is_json_whitespace(c) => {}
                '"' => {
                    self.begin_value(ch);
                    self.state = State::InString;
                }
                '{' | '[' => {
                    self.begin_value(ch);
                    self.brackets.push(ch);
                    self.state = State::InContainer;
                }
                c if is_scalar_char(c) => {
                    self.begin_value(ch);
                    self.state = State::InScalar;
                }
                found => return Err(self.unexpected(found)),
            },
            State::InString => {
                self.value.push(ch);
                if self.scan_string_char(ch) {
                    self.finish_value(events)?;
                }
            }
            State::InContainer => {
                self.value.push(ch);
                if self.in_string {
                    if self.scan_string_char(ch) {
                        self.in_string = false;
                    }
                    return Ok(());
                }
                match ch {
                    '"' => {
                        self.in_string = true;
                        self.escaped = false;
                    }
                    '{' | '[' => self.brackets.push(ch),
                    '}' | ']' => {
                        let opener = if ch == '}' { '{' } else { '[' };
                        if self.brackets.pop() != Some(opener) {
                            return Err(self.unexpected(ch));
                        }
                        if self.brackets.is_empty() {
                            self.finish_value(events)?;
                        }
                    }
                    _ => {}
                }
            }
            State::InScalar => {
                if is_scalar_char(ch) {
                    self.value.push(ch);
                } else {
                    // The delimiter belongs to the object, not the scalar.
                    self.finish_value(events)?;
                    self.step(ch, events)?;
                }
            }
            State::AfterValue => match ch {
                c if is_json_whitespace(c) => {}
                ',' => self.state = State::BeforeKey { first: false },
                '}' => {
                    self.state = State::Done;
                    events.push(JsonEvent::End);
                }
                found => return Err(self.unexpected(found)),
            },
            State::Done => {
                if !is_json_whitespace(ch) {
                    return Err(DecodeError::TrailingData {
                        offset: self.offset,
                    });
                }
            }
            State::Failed => return Err(DecodeError::Stopped),
        }
        Ok(())
    }

    /// Tracks escapes inside a string. Returns true on the closing quote.
    fn scan_string_char(&mut self, ch: char) -> bool {
        if self.escaped {
            self.escaped = false;
            false
        } else if ch == '\\' {
            self.escaped = true;
            false
        } else {
            ch == '"'
        }
    }

    fn begin_value(&mut self, ch: char) {
        self.value.clear();
        self.value.push(ch);
        self.brackets.clear();
        self.in_string = false;
        self.escaped = false;
    }

    fn finish_value(&mut self, events: &mut Vec<JsonEvent>) -> Result<(), DecodeError> {
        let key: String =
            serde_json::from_str(&self.key).map_err(|e| DecodeError::InvalidKey {
                offset: self.offset,
                message: e.to_string(),
            })?;
        let value: Value =
            serde_json::from_str(&self.value).map_err(|e| DecodeError::InvalidValue {
                key: key.clone(),
                message: e.to_string(),
            })?;

        self.key.clear();
        self.value.clear();
        self.state = State::AfterValue;
        events.push(JsonEvent::Value { key, value });
        Ok(())
    }

    fn unexpected(&self, found: char) -> DecodeError {
        DecodeError::UnexpectedCharacter {
            found,
            offset: self.offset,
        }
    }
}

// Only the four characters JSON allows between tokens.
fn is_json_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

fn is_scalar_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '+' | '.')
}
