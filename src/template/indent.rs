//! Indentation syntax parser.
//!
//! ```text
//! div.app :id=${0} @click=${1}
//!   h1 'Title'
//!   p.note =${2}
//!   ul
//!     ${3}
//! ```
//!
//! Children are the following lines indented deeper than their parent.
//! Nodes written on the same line after the properties are inline
//! children. Text is always quoted; `#'...'#` fences allow the quote
//! character inside the string.

use super::ir::{is_void_element, normalize, Element, Node, Prop, PropKind, PropValue, TemplateIr};
use super::markup::MAX_TEXT_LEN;
use super::scanner::Scanner;
use crate::error::ParseError;

/// Indentation level assigned to everything after a tag name on the same
/// line, so inline nodes always nest deeper than the line they start on.
const INLINE_INDENT: isize = 1 << 16;

/// Parse an indentation-syntax template.
pub fn parse(statics: &[&str], svg: bool) -> Result<TemplateIr, ParseError> {
    let mut parser = Parser {
        s: Scanner::new(statics)?,
        indent: 0,
    };
    let roots = parser.parse_children(-1)?;
    if !parser.s.is_end() {
        return Err(parser.s.error("Unexpected character."));
    }
    Ok(TemplateIr {
        svg,
        roots: normalize(roots),
    })
}

struct Parser<'a> {
    s: Scanner<'a>,
    indent: isize,
}

impl<'a> Parser<'a> {
    fn parse_children(&mut self, indent: isize) -> Result<Vec<Node>, ParseError> {
        let mut children = Vec::new();
        self.skip_whitespace();
        while self.indent > indent && !self.s.is_end() {
            match self.s.peek_byte() {
                Some(b'\'' | b'"' | b'#') => {
                    children.push(Node::Text(self.quoted("Text")?));
                }
                Some(_) => children.push(Node::Element(self.parse_element()?)),
                None => match self.s.expr() {
                    Some(index) => children.push(Node::Expr(index)),
                    None => break,
                },
            }
            self.skip_whitespace();
        }
        Ok(children)
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        let indent = self.indent;
        let Some(tag) = self.s.identifier() else {
            return Err(self.s.error("Expected a valid tag name."));
        };
        if indent < INLINE_INDENT {
            self.indent = INLINE_INDENT;
        }

        let mut props = Vec::new();
        if let Some(index) = self.s.expr() {
            props.push(Prop {
                kind: PropKind::Attribute,
                key: "class".into(),
                value: PropValue::Expr(index),
            });
        } else {
            let mut classes: Option<String> = None;
            while self.s.eat_byte(b'.') {
                let Some(name) = self.s.identifier() else {
                    return Err(self.s.error("Expected a valid class name."));
                };
                match classes.as_mut() {
                    Some(list) => {
                        list.push(' ');
                        list.push_str(name);
                    }
                    None => classes = Some(name.to_string()),
                }
            }
            if let Some(list) = classes {
                props.push(Prop {
                    kind: PropKind::Attribute,
                    key: "class".into(),
                    value: PropValue::Static(list),
                });
            }
        }

        self.skip_whitespace();
        while self.indent > indent {
            let Some(c) = self.s.peek_byte() else {
                break;
            };
            let prop = match c {
                b':' => {
                    self.s.advance(1);
                    let Some(key) = self.s.identifier() else {
                        return Err(self.s.error("Expected a valid attribute name."));
                    };
                    let value = if self.s.eat_byte(b'=') {
                        self.string_or_expr()?
                    } else {
                        PropValue::True
                    };
                    Prop {
                        kind: PropKind::Attribute,
                        key: key.to_string(),
                        value,
                    }
                }
                b'=' => {
                    self.s.advance(1);
                    let Some(index) = self.s.expr() else {
                        return Err(self.s.error("Expected a text content expression."));
                    };
                    Prop {
                        kind: PropKind::Value,
                        key: "textContent".into(),
                        value: PropValue::Expr(index),
                    }
                }
                b'.' | b'*' => {
                    self.s.advance(1);
                    let Some(key) = self.s.js_property() else {
                        return Err(self.s.error("Expected a valid property name."));
                    };
                    let kind = if c == b'.' {
                        PropKind::Value
                    } else {
                        PropKind::DomValue
                    };
                    self.dynamic_prop(kind, key)?
                }
                b'~' => {
                    self.s.advance(1);
                    let Some(key) = self.s.identifier() else {
                        return Err(self.s.error("Expected a valid style name."));
                    };
                    if !self.s.eat_byte(b'=') {
                        return Err(self.s.error("Expected a '=' character."));
                    }
                    Prop {
                        kind: PropKind::Style,
                        key: key.to_string(),
                        value: self.string_or_expr()?,
                    }
                }
                b'@' => {
                    self.s.advance(1);
                    let Some(key) = self.s.identifier() else {
                        return Err(self.s.error("Expected a valid event name."));
                    };
                    self.dynamic_prop(PropKind::Event, key)?
                }
                b'$' => {
                    self.s.advance(1);
                    let Some(index) = self.s.expr() else {
                        return Err(self.s.error("Expected an attribute directive expression."));
                    };
                    Prop {
                        kind: PropKind::Directive,
                        key: String::new(),
                        value: PropValue::Expr(index),
                    }
                }
                _ => break,
            };
            props.push(prop);
            self.skip_whitespace();
        }

        let children = if is_void_element(tag) {
            if self.indent > indent && !self.s.is_end() {
                return Err(self.s.error(format!("Void element '{tag}' cannot have children.")));
            }
            Vec::new()
        } else {
            self.parse_children(indent)?
        };

        Ok(Element {
            tag: tag.to_string(),
            props,
            children,
        })
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
            Some(b'\'' | b'"' | b'#') => Ok(PropValue::Static(self.quoted("Attribute")?)),
            Some(_) => Err(self.s.error("Expected a string or an expression.")),
            None => self
                .s
                .expr()
                .map(PropValue::Expr)
                .ok_or_else(|| self.s.error("Expected a string or an expression.")),
        }
    }

    /// `'...'`, `"..."` or a `#`-fenced variant such as `#'it's'#`.
    fn quoted(&mut self, what: &str) -> Result<String, ParseError> {
        let text = self.s.rest();
        let base = self.s.offset();
        let bytes = text.as_bytes();

        let mut i = 0;
        while bytes.get(i) == Some(&b'#') {
            i += 1;
        }
        let fence = i;
        let quote = match bytes.get(i) {
            Some(&q @ (b'\'' | b'"')) => q,
            _ => return Err(self.s.error_at("Expected ' or \" character.", base + i)),
        };
        i += 1;
        let start = i;

        while i < bytes.len() {
            if bytes[i] == quote {
                let close = i + 1 + fence;
                if close > bytes.len() {
                    return Err(self.s.error_at(
                        format!("{what} string should be closed with {fence} '#' characters."),
                        base + i + 1,
                    ));
                }
                if bytes[i + 1..close].iter().all(|&c| c == b'#') {
                    let value = &text[start..i];
                    if value.len() > MAX_TEXT_LEN {
                        return Err(self.s.error_at("Text string is too long (>64k)", base + i));
                    }
                    self.s.advance(close);
                    return Ok(value.to_string());
                }
            }
            i += 1;
        }

        Err(self.s.error_at(
            format!("{what} string should be closed with a '{}' character", quote as char),
            base + i,
        ))
    }

    /// Skip spaces and newlines, tracking the indentation of the current
    /// line. Spaces after inline content keep counting up from the inline
    /// level.
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.s.peek_byte() {
            match c {
                b' ' | b'\t' => self.indent += 1,
                b'\n' | b'\r' => self.indent = 0,
                _ => break,
            }
            self.s.advance(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::markup;
    use pretty_assertions::assert_eq;

    fn root(ir: &TemplateIr) -> &Element {
        match &ir.roots[0] {
            Node::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn test_same_ir_as_markup() {
        let ir = parse(&["div.app :id=", "\n  span 'hello'\n  ", "\n"], false).unwrap();
        let expected = markup::parse(
            &["<div class=\"app\" id=", "><span>hello</span>", "</div>"],
            false,
        )
        .unwrap();
        assert_eq!(ir, expected);
    }

    #[test]
    fn test_inline_children() {
        let ir = parse(&["p 'a' b 'c'"], false).unwrap();
        let p = root(&ir);
        assert_eq!(p.children.len(), 2);
        let Node::Element(b) = &p.children[1] else {
            panic!("expected element");
        };
        assert_eq!(b.children, vec![Node::Text("c".into())]);
    }

    #[test]
    fn test_sibling_lines_at_same_indent() {
        let ir = parse(&["ul\n  li 'a'\n  li 'b'\np 'c'"], false).unwrap();
        assert_eq!(ir.roots.len(), 2);
        let ul = root(&ir);
        assert_eq!(ul.children.len(), 2);
    }

    #[test]
    fn test_dynamic_class_and_bindings() {
        let statics = ["div", " =", " .value=", " *checked=", " ~color=", " @click=", " $", ""];
        let ir = parse(&statics, false).unwrap();
        let div = root(&ir);
        let kinds: Vec<_> = div.props.iter().map(|p| (p.kind, p.key.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (PropKind::Attribute, "class"),
                (PropKind::Value, "textContent"),
                (PropKind::Value, "value"),
                (PropKind::DomValue, "checked"),
                (PropKind::Style, "color"),
                (PropKind::Event, "click"),
                (PropKind::Directive, ""),
            ]
        );
        assert_eq!(div.props[6].value, PropValue::Expr(6));
    }

    #[test]
    fn test_static_attributes_and_styles() {
        let ir = parse(&["input :type='checkbox' :disabled ~color=\"red\""], false).unwrap();
        let input = root(&ir);
        assert_eq!(input.props[0].value, PropValue::Static("checkbox".into()));
        assert_eq!(input.props[1].value, PropValue::True);
        assert_eq!(input.props[2].kind, PropKind::Style);
    }

    #[test]
    fn test_fenced_text_string() {
        let ir = parse(&["p #'it's \"quoted\"'#"], false).unwrap();
        assert_eq!(root(&ir).children, vec![Node::Text("it's \"quoted\"".into())]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse(&["p 'abc"], false).unwrap_err();
        assert_eq!(err.message, "Text string should be closed with a ''' character");
        let err = parse(&["p #'abc'"], false).unwrap_err();
        assert_eq!(err.message, "Text string should be closed with 1 '#' characters.");
    }

    #[test]
    fn test_void_element_children_error() {
        let err = parse(&["img\n  span"], false).unwrap_err();
        assert_eq!(err.message, "Void element 'img' cannot have children.");
        assert!(parse(&["div\n  img\n  span"], false).is_ok());
    }

    #[test]
    fn test_bad_class_name() {
        let err = parse(&["div.1"], false).unwrap_err();
        assert_eq!(err.message, "Expected a valid class name.");
    }
}
