//! Template scanner - cursor over literal segments.
//!
//! A template is a list of literal segments with one expression between
//! each pair of neighbours:
//!
//! ```text
//! statics:  ["<div class=", ">", "</div>"]
//! exprs:                  ^0   ^1
//! ```
//!
//! The cursor is `(segment, offset)`. An expression can only be consumed
//! when the cursor sits at the end of a segment; consuming it moves to the
//! start of the next segment.

use crate::error::ParseError;

/// Identifier start: `[a-zA-Z_]`.
fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

/// Identifier body: `[\w-]`.
fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'-'
}

#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    statics: &'a [&'a str],
    text: &'a str,
    segment: usize,
    offset: usize,
}

/// Saved cursor position, see [`Scanner::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    segment: usize,
    offset: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(statics: &'a [&'a str]) -> Result<Self, ParseError> {
        let Some(first) = statics.first() else {
            return Err(ParseError::new("Template is empty.", 0, 0));
        };
        Ok(Self {
            statics,
            text: first,
            segment: 0,
            offset: 0,
        })
    }

    /// Number of expressions in the template.
    pub fn expr_count(&self) -> usize {
        self.statics.len() - 1
    }

    pub fn segment(&self) -> usize {
        self.segment
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Current segment text.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Remaining text of the current segment.
    pub fn rest(&self) -> &'a str {
        &self.text[self.offset..]
    }

    pub fn at_segment_end(&self) -> bool {
        self.offset == self.text.len()
    }

    pub fn is_end(&self) -> bool {
        self.at_segment_end() && self.segment == self.expr_count()
    }

    pub fn save(&self) -> Mark {
        Mark {
            segment: self.segment,
            offset: self.offset,
        }
    }

    pub fn restore(&mut self, mark: Mark) {
        self.segment = mark.segment;
        self.offset = mark.offset;
        self.text = self.statics[mark.segment];
    }

    // -------------------------------------------------------------------------
    // Characters
    // -------------------------------------------------------------------------

    pub fn peek_byte(&self) -> Option<u8> {
        self.text.as_bytes().get(self.offset).copied()
    }

    pub fn peek_byte_at(&self, n: usize) -> Option<u8> {
        self.text.as_bytes().get(self.offset + n).copied()
    }

    pub fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Advance by `n` bytes inside the current segment.
    pub fn advance(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.text.len());
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset.min(self.text.len());
    }

    pub fn eat_byte(&mut self, c: u8) -> bool {
        if self.peek_byte() == Some(c) {
            self.offset += 1;
            true
        } else {
            false
        }
    }

    pub fn peek_str(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn eat_str(&mut self, s: &str) -> bool {
        let found = self.peek_str(s);
        if found {
            self.offset += s.len();
        }
        found
    }

    /// `[a-zA-Z_][\w-]*`
    pub fn identifier(&mut self) -> Option<&'a str> {
        self.take_word(is_ident_start, is_ident_char)
    }

    /// `[a-zA-Z_$]\w*`
    pub fn js_property(&mut self) -> Option<&'a str> {
        self.take_word(
            |c| c.is_ascii_alphabetic() || c == b'_' || c == b'$',
            |c| c.is_ascii_alphanumeric() || c == b'_',
        )
    }

    fn take_word(&mut self, start: fn(u8) -> bool, body: fn(u8) -> bool) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        let begin = self.offset;
        if !bytes.get(begin).is_some_and(|&c| start(c)) {
            return None;
        }
        let mut end = begin + 1;
        while bytes.get(end).is_some_and(|&c| body(c)) {
            end += 1;
        }
        self.offset = end;
        Some(&self.text[begin..end])
    }

    // -------------------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------------------

    /// Index of the expression at the cursor, without consuming it.
    pub fn peek_expr(&self) -> Option<usize> {
        (self.at_segment_end() && self.segment < self.expr_count()).then_some(self.segment)
    }

    /// Consume the expression at the cursor.
    pub fn expr(&mut self) -> Option<usize> {
        let index = self.peek_expr()?;
        self.segment += 1;
        self.offset = 0;
        self.text = self.statics[self.segment];
        Some(index)
    }

    // -------------------------------------------------------------------------
    // Errors
    // -------------------------------------------------------------------------

    pub fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.segment, self.offset)
    }

    pub fn error_at(&self, message: impl Into<String>, offset: usize) -> ParseError {
        ParseError::new(message, self.segment, offset)
    }
}
