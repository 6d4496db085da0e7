//! Template intermediate representation.
//!
//! Both surface syntaxes parse into this tree; the compiler only ever sees
//! IR. Expression holes are referenced by their template-global slot index
//! (the position of the expression between the literal segments).

/// Property binding kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropKind {
    /// `name="v"` / `name=${}` - element attribute.
    Attribute,
    /// `.name=${}` - DOM property assignment.
    Value,
    /// `*name=${}` - DOM property, diffed against the live DOM value.
    DomValue,
    /// `~name=${}` - style property.
    Style,
    /// `@name=${}` - event listener.
    Event,
    /// `${}` in attribute position - element directive.
    Directive,
}

/// Property value: static text, bare boolean attribute or expression slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropValue {
    Static(String),
    True,
    Expr(usize),
}

impl PropValue {
    pub fn expr(&self) -> Option<usize> {
        match self {
            PropValue::Expr(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prop {
    pub kind: PropKind,
    /// Attribute/property/style/event name; empty for directives.
    pub key: String,
    pub value: PropValue,
}

impl Prop {
    pub fn is_dynamic(&self) -> bool {
        matches!(self.value, PropValue::Expr(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    pub tag: String,
    pub props: Vec<Prop>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Element(Element),
    Text(String),
    Expr(usize),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateIr {
    pub svg: bool,
    pub roots: Vec<Node>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements that can never have children.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Merge adjacent text nodes, recursively.
pub fn normalize(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                if let Some(Node::Text(prev)) = out.last_mut() {
                    prev.push_str(&text);
                } else {
                    out.push(Node::Text(text));
                }
            }
            Node::Element(mut el) => {
                el.children = normalize(el.children);
                out.push(Node::Element(el));
            }
            expr => out.push(expr),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_merges_adjacent_text() {
        let nodes = vec![
            Node::Text("a".into()),
            Node::Text("b".into()),
            Node::Expr(0),
            Node::Text(String::new()),
            Node::Text("c".into()),
        ];
        assert_eq!(
            normalize(nodes),
            vec![Node::Text("ab".into()), Node::Expr(0), Node::Text("c".into())]
        );
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("img"));
        assert!(is_void_element("input"));
        assert!(!is_void_element("div"));
        assert!(!is_void_element("textarea"));
    }
}
