//! In-memory DOM.
//!
//! A small arena-backed document used by the engine's own tests and by
//! embedders that want to exercise rendering without a browser. Every
//! mutation bumps a counter in [`MutationStats`], and an optional shared
//! journal records a readable line per structural change, so tests can
//! assert both "how many" and "in which order".

use std::cell::RefCell;
use std::rc::Rc;

use super::{Dom, NodeId, NodeKind};
use crate::template::compiler::{escape_attr, escape_text};
use crate::types::{Event, Handler, Value};

/// Shared log of structural mutations, e.g. `"remove <div>"`.
pub type Journal = Rc<RefCell<Vec<String>>>;

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Counters for every mutating call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    /// Nodes created with `create_*`.
    pub created: usize,
    /// `clone_node` calls (a deep clone counts once).
    pub cloned: usize,
    /// Detached nodes inserted into a parent.
    pub inserted: usize,
    /// Attached nodes moved to a new position.
    pub moved: usize,
    pub removed: usize,
    pub text_writes: usize,
    pub attribute_writes: usize,
    pub property_writes: usize,
    pub style_writes: usize,
    pub listener_writes: usize,
}

impl MutationStats {
    pub fn total(&self) -> usize {
        self.created
            + self.cloned
            + self.inserted
            + self.moved
            + self.removed
            + self.text_writes
            + self.attribute_writes
            + self.property_writes
            + self.style_writes
            + self.listener_writes
    }
}

#[derive(Clone)]
struct NodeData {
    kind: NodeKind,
    tag: String,
    svg: bool,
    text: String,
    attrs: Vec<(String, String)>,
    props: Vec<(String, Value)>,
    style: Vec<(String, String)>,
    listeners: Vec<(String, Handler)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: String::new(),
            svg: false,
            text: String::new(),
            attrs: Vec::new(),
            props: Vec::new(),
            style: Vec::new(),
            listeners: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Arena-backed DOM implementation.
#[derive(Clone, Default)]
pub struct MemoryDom {
    nodes: Vec<NodeData>,
    stats: MutationStats,
    journal: Option<Journal>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record structural mutations into `journal`.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> MutationStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = MutationStats::default();
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.nodes[node.index()]
            .listeners
            .iter()
            .filter(|(kind, _)| kind == event)
            .count()
    }

    pub fn is_svg(&self, node: NodeId) -> bool {
        self.nodes[node.index()].svg
    }

    /// Dispatch an event on `target`, bubbling through its ancestors.
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, target: NodeId, kind: &str) -> usize {
        let event = Event::new(kind, target);
        let mut calls = 0;
        let mut current = Some(target);
        while let Some(node) = current {
            event.current_target.set(node);
            // Listeners may be swapped by a re-render triggered from inside a
            // handler, so iterate over a snapshot.
            let listeners: Vec<Handler> = self.nodes[node.index()]
                .listeners
                .iter()
                .filter(|(k, _)| k == kind)
                .map(|(_, h)| h.clone())
                .collect();
            for handler in listeners {
                handler.call(&event);
                calls += 1;
            }
            if event.is_propagation_stopped() {
                break;
            }
            current = self.nodes[node.index()].parent;
        }
        calls
    }

    /// Serialize a node and its subtree.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialize the children of a node.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in &self.nodes[node.index()].children {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let data = &self.nodes[node.index()];
        match data.kind {
            NodeKind::Text => out.push_str(&escape_text(&data.text)),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&data.text);
                out.push_str("-->");
            }
            NodeKind::Element => {
                out.push('<');
                out.push_str(&data.tag);
                for (name, value) in &data.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                if !data.style.is_empty() {
                    out.push_str(" style=\"");
                    out.push_str(&escape_attr(&serialize_style(&data.style)));
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&data.tag.as_str()) && data.children.is_empty() {
                    return;
                }
                for &child in &data.children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(&data.tag);
                out.push('>');
            }
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(data);
        id
    }

    fn log(&self, entry: impl FnOnce() -> String) {
        if let Some(journal) = &self.journal {
            journal.borrow_mut().push(entry());
        }
    }

    fn describe(&self, node: NodeId) -> String {
        let data = &self.nodes[node.index()];
        match data.kind {
            NodeKind::Element => format!("<{}>", data.tag),
            NodeKind::Text => format!("{:?}", data.text),
            NodeKind::Comment => "<!---->".to_string(),
        }
    }

    fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.nodes[node.index()].parent else {
            return false;
        };
        let siblings = &mut self.nodes[parent.index()].children;
        if let Some(pos) = siblings.iter().position(|&c| c == node) {
            siblings.remove(pos);
        }
        self.nodes[node.index()].parent = None;
        true
    }

    fn deep_clone(&mut self, node: NodeId, deep: bool) -> NodeId {
        let source = &self.nodes[node.index()];
        let mut copy = NodeData::new(source.kind);
        copy.tag = source.tag.clone();
        copy.svg = source.svg;
        copy.text = source.text.clone();
        copy.attrs = source.attrs.clone();
        copy.style = source.style.clone();
        let children = if deep { source.children.clone() } else { Vec::new() };
        let id = self.alloc(copy);
        for child in children {
            let cloned = self.deep_clone(child, true);
            self.nodes[cloned.index()].parent = Some(id);
            self.nodes[id.index()].children.push(cloned);
        }
        id
    }
}

impl Dom for MemoryDom {
    fn create_element(&mut self, tag: &str, svg: bool) -> NodeId {
        self.stats.created += 1;
        let mut data = NodeData::new(NodeKind::Element);
        data.tag = tag.to_ascii_lowercase();
        data.svg = svg;
        self.alloc(data)
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.stats.created += 1;
        let mut data = NodeData::new(NodeKind::Text);
        data.text = text.to_string();
        self.alloc(data)
    }

    fn create_comment(&mut self, text: &str) -> NodeId {
        self.stats.created += 1;
        let mut data = NodeData::new(NodeKind::Comment);
        data.text = text.to_string();
        self.alloc(data)
    }

    fn clone_node(&mut self, node: NodeId, deep: bool) -> NodeId {
        self.stats.cloned += 1;
        self.deep_clone(node, deep)
    }

    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if reference == Some(node) {
            return;
        }
        let moved = self.detach(node);
        if moved {
            self.stats.moved += 1;
            self.log(|| format!("move {}", self.describe(node)));
        } else {
            self.stats.inserted += 1;
            self.log(|| format!("insert {}", self.describe(node)));
        }
        let children = &mut self.nodes[parent.index()].children;
        let pos = reference.and_then(|r| children.iter().position(|&c| c == r));
        debug_assert!(
            reference.is_none() || pos.is_some(),
            "insert_before: reference node is not a child of parent"
        );
        match pos {
            Some(pos) => children.insert(pos, node),
            None => children.push(node),
        }
        self.nodes[node.index()].parent = Some(parent);
    }

    fn remove_child(&mut self, parent: NodeId, node: NodeId) {
        debug_assert_eq!(self.nodes[node.index()].parent, Some(parent));
        if self.detach(node) {
            self.stats.removed += 1;
            self.log(|| format!("remove {}", self.describe(node)));
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].children.first().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.index()].parent?;
        let siblings = &self.nodes[parent.index()].children;
        let pos = siblings.iter().position(|&c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.index()].kind
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        let data = &self.nodes[node.index()];
        (data.kind == NodeKind::Element).then_some(data.tag.as_str())
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        let data = &self.nodes[node.index()];
        (data.kind != NodeKind::Element).then_some(data.text.as_str())
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        self.stats.text_writes += 1;
        self.nodes[node.index()].text = text.to_string();
        self.log(|| format!("text {text:?}"));
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        self.stats.text_writes += 1;
        let children = std::mem::take(&mut self.nodes[node.index()].children);
        for child in children {
            self.nodes[child.index()].parent = None;
        }
        if !text.is_empty() {
            let mut data = NodeData::new(NodeKind::Text);
            data.text = text.to_string();
            data.parent = Some(node);
            let id = self.alloc(data);
            self.nodes[node.index()].children.push(id);
        }
        self.log(|| format!("text-content {text:?}"));
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        if name == "style" {
            // Serialized on demand; see `set_attribute`.
            return None;
        }
        self.nodes[node.index()]
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        self.stats.attribute_writes += 1;
        let data = &mut self.nodes[node.index()];
        if name == "style" {
            data.style = parse_style(value);
            return;
        }
        match data.attrs.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => data.attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.stats.attribute_writes += 1;
        let data = &mut self.nodes[node.index()];
        if name == "style" {
            data.style.clear();
        } else {
            data.attrs.retain(|(n, _)| n != name);
        }
    }

    fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        self.nodes[node.index()]
            .props
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: Value) {
        self.stats.property_writes += 1;
        let props = &mut self.nodes[node.index()].props;
        match props.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => props.push((name.to_string(), value)),
        }
    }

    fn style(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.index()]
            .style
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_style(&mut self, node: NodeId, name: &str, value: &str) {
        self.stats.style_writes += 1;
        let style = &mut self.nodes[node.index()].style;
        match style.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => style.push((name.to_string(), value.to_string())),
        }
    }

    fn remove_style(&mut self, node: NodeId, name: &str) {
        self.stats.style_writes += 1;
        self.nodes[node.index()].style.retain(|(n, _)| n != name);
    }

    fn add_listener(&mut self, node: NodeId, event: &str, handler: &Handler) {
        self.stats.listener_writes += 1;
        let listeners = &mut self.nodes[node.index()].listeners;
        if !listeners.iter().any(|(k, h)| k == event && h.same(handler)) {
            listeners.push((event.to_string(), handler.clone()));
        }
    }

    fn remove_listener(&mut self, node: NodeId, event: &str, handler: &Handler) {
        self.stats.listener_writes += 1;
        self.nodes[node.index()]
            .listeners
            .retain(|(k, h)| !(k == event && h.same(handler)));
    }
}

fn parse_style(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn serialize_style(style: &[(String, String)]) -> String {
    style
        .iter()
        .map(|(n, v)| format!("{n}:{v}"))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_insert_and_serialize() {
        let mut dom = MemoryDom::new();
        let div = dom.create_element("div", false);
        let text = dom.create_text("a<b");
        dom.append_child(div, text);
        dom.set_attribute(div, "id", "x");
        dom.set_style(div, "color", "red");
        assert_eq!(dom.to_html(div), r#"<div id="x" style="color:red">a&lt;b</div>"#);
    }

    #[test]
    fn test_serialized_markup_matches_static_template_escaping() {
        use crate::template::{StaticSource, TemplateCache, TemplateRoot};

        let mut cache = TemplateCache::new();
        let markup = r#"<p title="a&quot;b&amp;c">x &lt; y &amp; z &gt; w</p>"#;
        let tpl = cache.html(&[markup]).unwrap();
        let static_html = match tpl.roots() {
            [TemplateRoot::Block(d)] => match &d.source {
                StaticSource::Markup(html) => html.clone(),
                StaticSource::Element(tag) => panic!("expected static markup for <{tag}>"),
            },
            other => panic!("expected one block, got {other:?}"),
        };

        let mut dom = MemoryDom::new();
        let p = dom.create_element("p", false);
        dom.set_attribute(p, "title", "a\"b&c");
        let text = dom.create_text("x < y & z > w");
        dom.append_child(p, text);
        assert_eq!(dom.to_html(p), markup);
        assert_eq!(static_html, markup);
    }

    #[test]
    fn test_move_counts_separately_from_insert() {
        let mut dom = MemoryDom::new();
        let parent = dom.create_element("ul", false);
        let a = dom.create_element("li", false);
        let b = dom.create_element("li", false);
        dom.append_child(parent, a);
        dom.append_child(parent, b);
        dom.reset_stats();

        dom.insert_before(parent, b, Some(a));
        assert_eq!(dom.children(parent), &[b, a]);
        assert_eq!(dom.stats().moved, 1);
        assert_eq!(dom.stats().inserted, 0);
        assert_eq!(dom.stats().total(), 1);
    }

    #[test]
    fn test_clone_copies_structure_not_listeners() {
        let mut dom = MemoryDom::new();
        let div = dom.create_element("div", false);
        let span = dom.create_element("span", false);
        dom.append_child(div, span);
        dom.add_listener(div, "click", &Handler::new(|_| {}));

        let copy = dom.clone_node(div, true);
        assert_eq!(dom.to_html(copy), "<div><span></span></div>");
        assert_eq!(dom.listener_count(copy, "click"), 0);
        assert_ne!(dom.first_child(copy), Some(span));
    }

    #[test]
    fn test_style_attribute_shares_style_store() {
        let mut dom = MemoryDom::new();
        let div = dom.create_element("div", false);
        dom.set_attribute(div, "style", "color: red; top: 1px");
        assert_eq!(dom.style(div, "top"), Some("1px"));
        dom.remove_style(div, "color");
        assert_eq!(dom.to_html(div), r#"<div style="top:1px"></div>"#);
    }

    #[test]
    fn test_dispatch_bubbles_until_stopped() {
        let mut dom = MemoryDom::new();
        let outer = dom.create_element("div", false);
        let inner = dom.create_element("button", false);
        dom.append_child(outer, inner);

        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        dom.add_listener(outer, "click", &Handler::new(move |_| h.set(h.get() + 1)));
        let h = hits.clone();
        dom.add_listener(inner, "click", &Handler::new(move |_| h.set(h.get() + 10)));
        assert_eq!(dom.dispatch(inner, "click"), 2);
        assert_eq!(hits.get(), 11);

        let stopper = Handler::new(|e: &Event| e.stop_propagation());
        dom.add_listener(inner, "click", &stopper);
        assert_eq!(dom.dispatch(inner, "click"), 2);
        assert_eq!(hits.get(), 21);
    }

    #[test]
    fn test_journal_records_structure() {
        let journal = Journal::default();
        let mut dom = MemoryDom::with_journal(journal.clone());
        let div = dom.create_element("div", false);
        let p = dom.create_element("p", false);
        dom.append_child(div, p);
        dom.remove(p);
        assert_eq!(*journal.borrow(), vec!["insert <p>", "remove <p>"]);
    }

    #[test]
    fn test_text_content_replaces_children() {
        let mut dom = MemoryDom::new();
        let div = dom.create_element("div", false);
        let span = dom.create_element("span", false);
        dom.append_child(div, span);
        dom.set_text_content(div, "hello");
        assert_eq!(dom.to_html(div), "<div>hello</div>");
        assert_eq!(dom.parent(span), None);
        dom.set_text_content(div, "");
        assert_eq!(dom.to_html(div), "<div></div>");
    }
}
