//! Markup syntax parser.
//!
//! ```text
//! <div class="static" id=${0} .value=${1} *checked=${2} ~color=${3} @click=${4} ${5}>
//!   text ${6}
//!   <img />
//! </div>
//! ```
//!
//! Whitespace between nodes is dropped when the run contains a newline and
//! collapses to a single space otherwise. Inside text every run collapses
//! to one space; runs at the edges of a text node follow the between-nodes
//! rule.

use std::borrow::Cow;

use bitflags::bitflags;

use super::ir::{is_void_element, normalize, Element, Node, Prop, PropKind, PropValue, TemplateIr};
use super::scanner::Scanner;
use crate::error::ParseError;

/// Longest text node a template may contain.
pub(crate) const MAX_TEXT_LEN: usize = 1 << 16;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Whitespace: u8 {
        const PRESENT      = 1 << 0;
        const NEWLINE      = 1 << 1;
        const VERTICAL_TAB = 1 << 2;
        const TEXT_CONTENT = 1 << 3;
    }
}

impl Whitespace {
    /// Whether a run between two nodes turns into a space.
    fn is_significant(self) -> bool {
        self.contains(Whitespace::PRESENT)
            && (!self.contains(Whitespace::NEWLINE) || self.contains(Whitespace::VERTICAL_TAB))
    }
}

/// Parse a markup template.
pub fn parse(statics: &[&str], svg: bool) -> Result<TemplateIr, ParseError> {
    let mut parser = Parser {
        s: Scanner::new(statics)?,
    };
    let roots = parser.parse_children()?;
    if !parser.s.is_end() {
        return Err(parser.s.error("Unexpected closing tag."));
    }
    Ok(TemplateIr {
        svg,
        roots: normalize(roots),
    })
}

struct Parser<'a> {
    s: Scanner<'a>,
}

impl<'a> Parser<'a> {
    fn parse_children(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut children = Vec::new();
        let mut ws = self.whitespace();
        while !self.s.is_end() {
            match self.s.peek_byte() {
                Some(b'<') => {
                    if ws.is_significant() {
                        children.push(Node::Text(" ".into()));
                    }
                    if self.s.peek_byte_at(1) == Some(b'/') {
                        break;
                    }
                    children.push(Node::Element(self.parse_element()?));
                }
                Some(_) => {
                    let text = self.parse_text(ws)?;
                    if !text.is_empty() {
                        children.push(Node::Text(text));
                    }
                }
                None => match self.s.expr() {
                    Some(index) => {
                        if ws.is_significant() {
                            children.push(Node::Text(" ".into()));
                        }
                        children.push(Node::Expr(index));
                    }
                    None => break,
                },
            }
            ws = self.whitespace();
        }
        Ok(children)
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        if !self.s.eat_byte(b'<') {
            return Err(self.s.error("Expected a '<' character."));
        }
        let Some(tag) = self.s.identifier() else {
            return Err(self.s.error("Expected a valid tag name."));
        };
        self.whitespace();
        let props = self.parse_attributes()?;

        let mut children = Vec::new();
        if self.s.eat_byte(b'/') {
            if !self.s.eat_byte(b'>') {
                return Err(self.s.error("Expected a '>' character."));
            }
        } else {
            if !self.s.eat_byte(b'>') {
                return Err(self.s.error("Expected a '>' character."));
            }
            if is_void_element(tag) {
                self.void_tail(tag)?;
            } else {
                children = self.parse_children()?;
                if !self.s.eat_byte(b'<') {
                    return Err(self.s.error("Expected a '<' character."));
                }
                if !self.s.eat_byte(b'/') {
                    return Err(self.s.error("Expected a '/' character."));
                }
                if !self.s.eat_str(tag) {
                    return Err(self.s.error(format!("Expected a '{tag}' tag name.")));
                }
                self.whitespace();
                if !self.s.eat_byte(b'>') {
                    return Err(self.s.error("Expected a '>' character."));
                }
            }
        }

        Ok(Element {
            tag: tag.to_string(),
            props,
            children,
        })
    }

    /// Void elements need no closing tag. An explicit `</tag>` right after
    /// the start tag is accepted; content followed by `</tag>` is an error.
    fn void_tail(&mut self, tag: &str) -> Result<(), ParseError> {
        let mark = self.s.save();
        self.whitespace();
        if self.closing_tag(tag) {
            return Ok(());
        }
        self.s.restore(mark);

        let gave_children = matches!(self.parse_children(), Ok(c) if !c.is_empty())
            && self.closing_tag(tag);
        self.s.restore(mark);
        if gave_children {
            self.whitespace();
            return Err(self.s.error(format!("Void element '{tag}' cannot have children.")));
        }
        Ok(())
    }

    fn closing_tag(&mut self, tag: &str) -> bool {
        let mark = self.s.save();
        if self.s.eat_str("</") && self.s.eat_str(tag) {
            self.whitespace();
            if self.s.eat_byte(b'>') {
                return true;
            }
        }
        self.s.restore(mark);
        false
    }

    fn parse_attributes(&mut self) -> Result<Vec<Prop>, ParseError> {
        let mut props = Vec::new();
        while !self.s.is_end() {
            let Some(c) = self.s.peek_byte() else {
                // `${}` in attribute position
                let Some(index) = self.s.expr() else {
                    break;
                };
                props.push(Prop {
                    kind: PropKind::Directive,
                    key: String::new(),
                    value: PropValue::Expr(index),
                });
                self.whitespace();
                continue;
            };

            match c {
                b'/' | b'>' => return Ok(props),
                b'.' => {
                    self.s.advance(1);
                    let Some(key) = self.s.js_property() else {
                        return Err(self.s.error("Expected a valid property name."));
                    };
                    props.push(self.dynamic_prop(PropKind::Value, key)?);
                }
                b'*' => {
                    self.s.advance(1);
                    let Some(key) = self.s.js_property() else {
                        return Err(self.s.error("Expected a valid property name."));
                    };
                    props.push(self.dynamic_prop(PropKind::DomValue, key)?);
                }
                b'~' => {
                    self.s.advance(1);
                    let Some(key) = self.s.identifier() else {
                        return Err(self.s.error("Expected a valid style name."));
                    };
                    if !self.s.eat_byte(b'=') {
                        return Err(self.s.error("Expected a '=' character."));
                    }
                    let value = self.string_or_expr()?;
                    props.push(Prop {
                        kind: PropKind::Style,
                        key: key.to_string(),
                        value,
                    });
                }
                b'@' => {
                    self.s.advance(1);
                    let Some(key) = self.s.identifier() else {
                        return Err(self.s.error("Expected a valid event name."));
                    };
                    props.push(self.dynamic_prop(PropKind::Event, key)?);
                }
                _ => {
                    let Some(key) = self.s.identifier() else {
                        return Err(self.s.error("Expected a valid attribute name."));
                    };
                    let value = if self.s.eat_byte(b'=') {
                        self.string_or_expr()?
                    } else {
                        PropValue::True
                    };
                    props.push(Prop {
                        kind: PropKind::Attribute,
                        key: key.to_string(),
                        value,
                    });
                }
            }
            self.whitespace();
        }
        Err(self.s.error("Expected a '>' character."))
    }

    fn dynamic_prop(&mut self, kind: PropKind, key: &str) -> Result<Prop, ParseError> {
        if !self.s.eat_byte(b'=') {
            return Err(self.s.error("Expected a '=' character."));
        }
        let Some(index) = self.s.expr() else {
            return Err(self.s.error("Expected an expression."));
        };
        Ok(Prop {
            kind,
            key: key.to_string(),
            value: PropValue::Expr(index),
        })
    }

    fn string_or_expr(&mut self) -> Result<PropValue, ParseError> {
        match self.s.peek_byte() {
            Some(b'"' | b'\'') => Ok(PropValue::Static(self.parse_attribute_string()?)),
            Some(_) => Err(self.s.error("Expected a string or an expression.")),
            None => self
                .s
                .expr()
                .map(PropValue::Expr)
                .ok_or_else(|| self.s.error("Expected a string or an expression.")),
        }
    }

    fn parse_attribute_string(&mut self) -> Result<String, ParseError> {
        let Some(quote) = self.s.peek_char() else {
            return Err(self.s.error("Expected ' or \" character."));
        };
        let rest = &self.s.rest()[1..];
        match rest.find(quote) {
            Some(end) => {
                let value = decode_entities(&rest[..end]).into_owned();
                self.s.advance(end + 2);
                Ok(value)
            }
            None => Err(self.s.error_at(
                format!("Attribute string should be closed with a '{quote}' character"),
                self.s.text().len(),
            )),
        }
    }

    fn parse_text(&mut self, mut state: Whitespace) -> Result<String, ParseError> {
        let mut text = String::new();
        let mut len = 0usize;
        while !self.s.is_end() {
            let Some(c) = self.s.peek_char() else {
                break;
            };
            match c {
                '<' => break,
                ' ' | '\t' => state |= Whitespace::PRESENT,
                '\n' | '\r' => state |= Whitespace::PRESENT | Whitespace::NEWLINE,
                '\u{b}' => state |= Whitespace::PRESENT | Whitespace::VERTICAL_TAB,
                c => {
                    if state.contains(Whitespace::PRESENT)
                        && (state.intersects(Whitespace::TEXT_CONTENT | Whitespace::VERTICAL_TAB)
                            || !state.contains(Whitespace::NEWLINE))
                    {
                        text.push(' ');
                        len += 1;
                    }
                    state = Whitespace::TEXT_CONTENT;
                    text.push(c);
                    len += 1;
                }
            }
            self.s.advance(c.len_utf8());
        }
        if state.is_significant() {
            text.push(' ');
            len += 1;
        }
        if len > MAX_TEXT_LEN {
            return Err(self.s.error("Text string is too long (>64k)"));
        }
        Ok(decode_entities(&text).into_owned())
    }

    fn whitespace(&mut self) -> Whitespace {
        let mut state = Whitespace::empty();
        while let Some(c) = self.s.peek_byte() {
            match c {
                b' ' | b'\t' => {}
                b'\n' | b'\r' => state |= Whitespace::NEWLINE,
                0x0b => state |= Whitespace::VERTICAL_TAB,
                _ => break,
            }
            state |= Whitespace::PRESENT;
            self.s.advance(1);
        }
        state
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Decode the character references the markup syntax supports.
pub(crate) fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}
