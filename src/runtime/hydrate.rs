//! Template hydration - adopt pre-rendered DOM instead of creating it.
//!
//! The static tree of the descriptor is walked left to right with a
//! cursor over the existing children:
//!
//! ```text
//! static Element  ──► adopt if tag matches, else create before cursor
//! static Text     ──► adopt text node (fixing its data), else create
//! Separator       ──► nothing; comments are skipped and removed
//! Expr(input)     ──► Hydrator::child hydrates the child op
//! leftovers       ──► removed
//! ```
//!
//! Bindings are then compared against what the DOM already holds and
//! only differences are written.

use tracing::warn;

use super::{input, set_class, TemplateState};
use crate::dom::{Dom, NodeId, NodeKind};
use crate::error::RenderError;
use crate::template::{Descriptor, PropOp, StaticElement, StaticNode};
use crate::types::Value;

/// Callbacks the template walk needs from the reconciler.
pub trait Hydrator {
    fn dom(&mut self) -> &mut dyn Dom;

    /// Whether mismatches are reported.
    fn warnings(&self) -> bool;

    /// Node that ends the hydrated range; never adopted or removed.
    fn end(&self) -> Option<NodeId>;

    /// Hydrate child expression `input` at `cursor` inside `parent`.
    /// Returns the cursor after the child's nodes.
    fn child(
        &mut self,
        input: usize,
        parent: NodeId,
        cursor: Option<NodeId>,
    ) -> Result<Option<NodeId>, RenderError>;
}

/// Adopt an instance of `descriptor` at `cursor` inside `parent`.
/// Returns the instance and the cursor after its root.
pub fn adopt(
    h: &mut dyn Hydrator,
    descriptor: &Descriptor,
    values: &[Value],
    parent: NodeId,
    cursor: Option<NodeId>,
) -> Result<(TemplateState, Option<NodeId>), RenderError> {
    let text_content = text_content_slots(descriptor);
    let mut walk = Walk {
        svg: descriptor.is_svg(),
        end: h.end(),
        slots: vec![None; descriptor.state_slots().max(1)],
        text_content: &text_content,
    };
    let (root, next) = walk.element(h, &descriptor.root, parent, cursor)?;
    walk.slots[0] = Some(root);

    let slots: Box<[NodeId]> = walk.slots.iter().map(|s| s.unwrap_or(root)).collect();
    let state = TemplateState { slots };
    hydrate_props(h.dom(), descriptor, &state, values);
    Ok((state, next))
}

/// Slots whose children are owned by a text content binding.
fn text_content_slots(descriptor: &Descriptor) -> Vec<usize> {
    let mut slot = 0;
    let mut out = Vec::new();
    for op in &descriptor.prop_ops {
        match *op {
            PropOp::SetNode { slot: s } => slot = s,
            PropOp::TextContent { .. } => out.push(slot),
            _ => {}
        }
    }
    out
}

/// Remove comment nodes at the cursor, stopping at `end`.
pub(crate) fn skip_comments(
    dom: &mut dyn Dom,
    mut cursor: Option<NodeId>,
    end: Option<NodeId>,
) -> Option<NodeId> {
    while let Some(node) = cursor {
        if cursor == end || dom.kind(node) != NodeKind::Comment {
            break;
        }
        cursor = dom.next_sibling(node);
        dom.remove(node);
    }
    cursor
}

/// Remove `cursor` and every sibling after it.
pub(crate) fn remove_rest(dom: &mut dyn Dom, mut cursor: Option<NodeId>) {
    while let Some(node) = cursor {
        cursor = dom.next_sibling(node);
        dom.remove(node);
    }
}

pub(crate) fn describe(dom: &dyn Dom, node: Option<NodeId>) -> String {
    match node {
        None => "nothing".into(),
        Some(n) => match dom.kind(n) {
            NodeKind::Element => format!("<{}>", dom.tag(n).unwrap_or_default()),
            NodeKind::Text => format!("text {:?}", dom.text(n).unwrap_or_default()),
            NodeKind::Comment => "comment".into(),
        },
    }
}

struct Walk<'a> {
    svg: bool,
    end: Option<NodeId>,
    slots: Vec<Option<NodeId>>,
    text_content: &'a [usize],
}

impl Walk<'_> {
    fn element(
        &mut self,
        h: &mut dyn Hydrator,
        el: &StaticElement,
        parent: NodeId,
        cursor: Option<NodeId>,
    ) -> Result<(NodeId, Option<NodeId>), RenderError> {
        let warnings = h.warnings();
        let dom = h.dom();
        let cursor = skip_comments(dom, cursor, self.end);

        let (node, next) = match cursor {
            Some(n)
                if cursor != self.end
                    && dom.kind(n) == NodeKind::Element
                    && dom.tag(n) == Some(el.tag.as_str()) =>
            {
                (n, dom.next_sibling(n))
            }
            other => {
                if warnings {
                    warn!(
                        expected = %format!("<{}>", el.tag),
                        found = %describe(dom, other),
                        "hydration mismatch"
                    );
                }
                let created = dom.create_element(&el.tag, self.svg);
                for (name, value) in &el.attrs {
                    dom.set_attribute(created, name, value);
                }
                dom.insert_before(parent, created, other);
                (created, other)
            }
        };
        if let Some(slot) = el.slot {
            self.slots[slot] = Some(node);
        }
        if el.slot.is_some_and(|s| self.text_content.contains(&s)) {
            return Ok((node, next));
        }

        let mut child = h.dom().first_child(node);
        for static_child in &el.children {
            match static_child {
                StaticNode::Element(e) => child = self.element(h, e, node, child)?.1,
                StaticNode::Text { value, slot } => {
                    let dom = h.dom();
                    let cursor = skip_comments(dom, child, self.end);
                    let text = match cursor {
                        Some(n) if cursor != self.end && dom.kind(n) == NodeKind::Text => {
                            if dom.text(n) != Some(value.as_str()) {
                                if warnings {
                                    warn!(
                                        expected = %value,
                                        found = %describe(dom, Some(n)),
                                        "hydration text mismatch"
                                    );
                                }
                                dom.set_text(n, value);
                            }
                            child = dom.next_sibling(n);
                            n
                        }
                        other => {
                            if warnings {
                                warn!(
                                    expected = %value,
                                    found = %describe(dom, other),
                                    "hydration mismatch"
                                );
                            }
                            let created = dom.create_text(value);
                            dom.insert_before(node, created, other);
                            child = other;
                            created
                        }
                    };
                    if let Some(slot) = slot {
                        self.slots[*slot] = Some(text);
                    }
                }
                StaticNode::Separator => {}
                StaticNode::Expr(i) => child = h.child(*i, node, child)?,
            }
        }
        remove_rest(h.dom(), child);
        Ok((node, next))
    }
}

fn hydrate_props(dom: &mut dyn Dom, descriptor: &Descriptor, state: &TemplateState, values: &[Value]) {
    let mut node = state.root();
    for op in &descriptor.prop_ops {
        match *op {
            PropOp::SetNode { slot } => node = state.slots[slot],
            PropOp::ClassName { input: i } => {
                let want = input(descriptor, values, i).attr_string().unwrap_or_default();
                if dom.attribute(node, "class").unwrap_or_default() != want {
                    set_class(dom, descriptor, node, &want);
                }
            }
            PropOp::TextContent { input: i } => {
                let want = input(descriptor, values, i).text().unwrap_or_default();
                let first = dom.first_child(node);
                let matches = match first {
                    None => want.is_empty(),
                    Some(t) => {
                        dom.kind(t) == NodeKind::Text
                            && dom.text(t) == Some(want.as_str())
                            && dom.next_sibling(t).is_none()
                    }
                };
                if !matches {
                    dom.set_text_content(node, &want);
                }
            }
            PropOp::Attribute { data, input: i } => {
                let name = &descriptor.data[data];
                let want = input(descriptor, values, i).attr_string();
                if dom.attribute(node, name) != want.as_deref() {
                    match want {
                        Some(value) => dom.set_attribute(node, name, &value),
                        None => dom.remove_attribute(node, name),
                    }
                }
            }
            PropOp::Property { data, input: i } | PropOp::DomProperty { data, input: i } => {
                let name = &descriptor.data[data];
                let want = input(descriptor, values, i);
                let current = dom.property(node, name).unwrap_or_default();
                if !current.same(want) {
                    dom.set_property(node, name, want.clone());
                }
            }
            PropOp::Style { data, input: i } => {
                let name = &descriptor.data[data];
                let want = input(descriptor, values, i).attr_string();
                if dom.style(node, name) != want.as_deref() {
                    match want {
                        Some(value) => dom.set_style(node, name, &value),
                        None => dom.remove_style(node, name),
                    }
                }
            }
            PropOp::Event { data, input: i } => {
                if let Value::Handler(handler) = input(descriptor, values, i) {
                    dom.add_listener(node, &descriptor.data[data], handler);
                }
            }
            PropOp::Directive { input: i } => {
                if let Value::Directive(directive) = input(descriptor, values, i) {
                    directive.apply(dom, node, true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use crate::template::{html, TemplateRoot};
    use std::rc::Rc;

    /// Hydrator that renders child expressions as text.
    struct TextChildren<'a> {
        dom: &'a mut MemoryDom,
        values: Vec<Value>,
        descriptor: Rc<Descriptor>,
        end: Option<NodeId>,
    }

    impl Hydrator for TextChildren<'_> {
        fn dom(&mut self) -> &mut dyn Dom {
            &mut *self.dom
        }

        fn warnings(&self) -> bool {
            false
        }

        fn end(&self) -> Option<NodeId> {
            self.end
        }

        fn child(
            &mut self,
            i: usize,
            parent: NodeId,
            cursor: Option<NodeId>,
        ) -> Result<Option<NodeId>, RenderError> {
            let text = input(&self.descriptor, &self.values, i).text().unwrap_or_default();
            let cursor = skip_comments(self.dom, cursor, self.end);
            match cursor {
                Some(n) if self.dom.kind(n) == NodeKind::Text => {
                    if self.dom.text(n) != Some(text.as_str()) {
                        self.dom.set_text(n, &text);
                    }
                    Ok(self.dom.next_sibling(n))
                }
                other => {
                    let t = self.dom.create_text(&text);
                    self.dom.insert_before(parent, t, other);
                    Ok(other)
                }
            }
        }
    }

    fn descriptor(statics: &[&str]) -> Rc<Descriptor> {
        match &html(statics).unwrap().roots()[0] {
            TemplateRoot::Block(d) => d.clone(),
            _ => panic!("expected block"),
        }
    }

    fn server_dom(build: impl FnOnce(&mut MemoryDom, NodeId)) -> (MemoryDom, NodeId) {
        let mut dom = MemoryDom::new();
        let container = dom.create_element("body", false);
        build(&mut dom, container);
        dom.reset_stats();
        (dom, container)
    }

    #[test]
    fn test_adopts_matching_markup_without_writes() {
        let d = descriptor(&["<p class=", ">a ", " b</p>"]);
        let (mut dom, container) = server_dom(|dom, c| {
            let p = dom.create_element("p", false);
            dom.set_attribute(p, "class", "x");
            dom.append_child(c, p);
            let a = dom.create_text("a ");
            let s1 = dom.create_comment("");
            let v = dom.create_text("1");
            let s2 = dom.create_comment("");
            let b = dom.create_text(" b");
            for n in [a, s1, v, s2, b] {
                dom.append_child(p, n);
            }
        });
        let first = dom.first_child(container);
        let mut h = TextChildren {
            dom: &mut dom,
            values: vec!["x".into(), 1.into()],
            descriptor: d.clone(),
            end: None,
        };
        let (state, next) = adopt(&mut h, &d, &["x".into(), 1.into()], container, first).unwrap();
        assert_eq!(next, None);
        assert_eq!(Some(state.root()), first);
        assert_eq!(dom.inner_html(container), "<p class=\"x\">a 1 b</p>");
        assert_eq!(dom.stats().created, 0);
        assert_eq!(dom.text(state.slots[1]), Some(" b"));
    }

    #[test]
    fn test_mismatch_creates_expected_node_and_drops_leftovers() {
        let d = descriptor(&["<div><b>x</b></div>"]);
        let (mut dom, container) = server_dom(|dom, c| {
            let div = dom.create_element("div", false);
            let i = dom.create_element("i", false);
            dom.append_child(c, div);
            dom.append_child(div, i);
        });
        let first = dom.first_child(container);
        let mut h = TextChildren {
            dom: &mut dom,
            values: vec![],
            descriptor: d.clone(),
            end: None,
        };
        adopt(&mut h, &d, &[], container, first).unwrap();
        assert_eq!(dom.inner_html(container), "<div><b>x</b></div>");
    }

    #[test]
    fn test_bindings_fixed_against_existing_dom() {
        let d = descriptor(&["<a href=", " title=", "></a>"]);
        let (mut dom, container) = server_dom(|dom, c| {
            let a = dom.create_element("a", false);
            dom.set_attribute(a, "href", "/x");
            dom.set_attribute(a, "title", "stale");
            dom.append_child(c, a);
        });
        let first = dom.first_child(container);
        let values: Vec<Value> = vec!["/x".into(), Value::Null];
        let mut h = TextChildren {
            dom: &mut dom,
            values: values.clone(),
            descriptor: d.clone(),
            end: None,
        };
        adopt(&mut h, &d, &values, container, first).unwrap();
        assert_eq!(dom.stats().attribute_writes, 1);
        assert_eq!(dom.inner_html(container), "<a href=\"/x\"></a>");
    }

    #[test]
    fn test_end_marker_is_never_adopted_or_removed() {
        let d = descriptor(&["<div></div>"]);
        let (mut dom, container) = server_dom(|dom, c| {
            let end = dom.create_comment("end");
            dom.append_child(c, end);
        });
        let end = dom.first_child(container);
        let mut h = TextChildren {
            dom: &mut dom,
            values: vec![],
            descriptor: d.clone(),
            end,
        };
        let (state, next) = adopt(&mut h, &d, &[], container, end).unwrap();
        assert_eq!(next, end);
        assert_eq!(dom.inner_html(container), "<div></div><!--end-->");
        assert_eq!(dom.next_sibling(state.root()), end);
    }
}
