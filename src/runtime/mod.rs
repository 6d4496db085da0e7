//! Template runtime - instantiate and patch compiled templates.
//!
//! ```text
//! mount:   create root (bare) | clone prototype
//!            └─► state ops fill the slot array [root, n1, n2, ...]
//!                  └─► prop ops apply every binding
//! update:  prop ops again, writing only bindings whose value changed
//! adopt:   hydration counterpart, see `hydrate`
//! ```
//!
//! Values are the template-global array shared by all blocks of one
//! template render; local input `i` of a block reads
//! `values[descriptor.exprs[i]]`. Child expressions are not handled here,
//! the reconciler drives them through the descriptor's child ops.

mod hydrate;
mod prototype;

pub use hydrate::{adopt, Hydrator};
pub(crate) use hydrate::{describe, skip_comments};
pub use prototype::Prototypes;

use std::rc::Rc;

use crate::dom::{Dom, NodeId};
use crate::template::{Descriptor, PropOp, StateOp, StaticSource};
use crate::types::Value;

const NULL: &Value = &Value::Null;

/// Live DOM of one template instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateState {
    /// Slot 0 is the root element.
    pub slots: Box<[NodeId]>,
}

impl TemplateState {
    pub fn root(&self) -> NodeId {
        self.slots[0]
    }
}

/// Value of local input `input`.
pub(crate) fn input<'v>(descriptor: &Descriptor, values: &'v [Value], input: usize) -> &'v Value {
    descriptor
        .exprs
        .get(input)
        .and_then(|&global| values.get(global))
        .unwrap_or(NULL)
}

// =============================================================================
// Mount
// =============================================================================

/// Create the DOM of a template instance. The root is left detached.
pub fn mount(
    dom: &mut dyn Dom,
    prototypes: &mut Prototypes,
    descriptor: &Rc<Descriptor>,
    values: &[Value],
) -> TemplateState {
    let root = match &descriptor.source {
        StaticSource::Element(tag) => dom.create_element(tag, descriptor.is_svg()),
        StaticSource::Markup(_) => {
            let prototype = prototypes.get(dom, descriptor);
            dom.clone_node(prototype, true)
        }
    };

    let mut slots = vec![root; descriptor.state_slots().max(1)];
    if !descriptor.state_ops.is_empty() {
        let first = dom.first_child(root);
        let mut next = 1;
        assign_slots(dom, &descriptor.state_ops, first, &mut slots, &mut next);
    }

    let mut node = root;
    for op in &descriptor.prop_ops {
        match *op {
            PropOp::SetNode { slot } => node = slots[slot],
            PropOp::ClassName { input: i } => {
                if let Some(class) = input(descriptor, values, i).attr_string() {
                    if !class.is_empty() {
                        set_class(dom, descriptor, node, &class);
                    }
                }
            }
            PropOp::TextContent { input: i } => {
                if let Some(text) = input(descriptor, values, i).text() {
                    if !text.is_empty() {
                        dom.set_text_content(node, &text);
                    }
                }
            }
            PropOp::Attribute { data, input: i } => {
                if let Some(value) = input(descriptor, values, i).attr_string() {
                    dom.set_attribute(node, &descriptor.data[data], &value);
                }
            }
            PropOp::Property { data, input: i } | PropOp::DomProperty { data, input: i } => {
                let value = input(descriptor, values, i);
                if !matches!(value, Value::Null) {
                    dom.set_property(node, &descriptor.data[data], value.clone());
                }
            }
            PropOp::Style { data, input: i } => {
                if let Some(value) = input(descriptor, values, i).attr_string() {
                    dom.set_style(node, &descriptor.data[data], &value);
                }
            }
            PropOp::Event { data, input: i } => {
                if let Value::Handler(handler) = input(descriptor, values, i) {
                    dom.add_listener(node, &descriptor.data[data], handler);
                }
            }
            PropOp::Directive { input: i } => {
                if let Value::Directive(directive) = input(descriptor, values, i) {
                    directive.apply(dom, node, false);
                }
            }
        }
    }

    TemplateState {
        slots: slots.into_boxed_slice(),
    }
}

/// Execute state ops over one sibling level starting at `node`.
fn assign_slots(
    dom: &mut dyn Dom,
    ops: &[StateOp],
    mut node: Option<NodeId>,
    slots: &mut [NodeId],
    next: &mut usize,
) {
    let mut i = 0;
    while i < ops.len() {
        let Some(mut current) = node else {
            break;
        };
        match ops[i] {
            StateOp::Visit { save, enter } => {
                if save {
                    slots[*next] = current;
                    *next += 1;
                }
                i += 1;
                if enter > 0 {
                    let end = (i + enter).min(ops.len());
                    let first = dom.first_child(current);
                    assign_slots(dom, &ops[i..end], first, slots, next);
                    i = end;
                }
            }
            StateOp::Remove => {
                let after = dom.next_sibling(current);
                dom.remove(current);
                let Some(text) = after else {
                    break;
                };
                slots[*next] = text;
                *next += 1;
                current = text;
                i += 1;
            }
        }
        node = dom.next_sibling(current);
    }
}

fn set_class(dom: &mut dyn Dom, descriptor: &Descriptor, node: NodeId, class: &str) {
    if descriptor.is_svg() {
        dom.set_attribute(node, "class", class);
    } else {
        dom.set_class_name(node, class);
    }
}

// =============================================================================
// Update
// =============================================================================

/// Re-apply bindings, touching the DOM only for changed values.
pub fn update(
    dom: &mut dyn Dom,
    descriptor: &Descriptor,
    state: &TemplateState,
    prev: &[Value],
    next: &[Value],
) {
    let mut node = state.root();
    for op in &descriptor.prop_ops {
        if let PropOp::SetNode { slot } = *op {
            node = state.slots[slot];
            continue;
        }
        let i = prop_input(op);
        let (old, new) = (input(descriptor, prev, i), input(descriptor, next, i));

        if let PropOp::DomProperty { data, .. } = *op {
            let name = &descriptor.data[data];
            let current = dom.property(node, name).unwrap_or_default();
            if !current.same(new) {
                dom.set_property(node, name, new.clone());
            }
            continue;
        }
        if old.same(new) {
            continue;
        }

        match *op {
            PropOp::ClassName { .. } => {
                set_class(dom, descriptor, node, &new.attr_string().unwrap_or_default());
            }
            PropOp::TextContent { .. } => {
                dom.set_text_content(node, &new.text().unwrap_or_default());
            }
            PropOp::Attribute { data, .. } => {
                let name = &descriptor.data[data];
                match new.attr_string() {
                    Some(value) => dom.set_attribute(node, name, &value),
                    None => dom.remove_attribute(node, name),
                }
            }
            PropOp::Property { data, .. } => {
                dom.set_property(node, &descriptor.data[data], new.clone());
            }
            PropOp::Style { data, .. } => {
                let name = &descriptor.data[data];
                match new.attr_string() {
                    Some(value) => dom.set_style(node, name, &value),
                    None => dom.remove_style(node, name),
                }
            }
            PropOp::Event { data, .. } => {
                let name = &descriptor.data[data];
                if let Value::Handler(handler) = old {
                    dom.remove_listener(node, name, handler);
                }
                if let Value::Handler(handler) = new {
                    dom.add_listener(node, name, handler);
                }
            }
            PropOp::Directive { .. } => {
                if let Value::Directive(directive) = new {
                    directive.apply(dom, node, false);
                }
            }
            PropOp::SetNode { .. } | PropOp::DomProperty { .. } => {}
        }
    }
}

fn prop_input(op: &PropOp) -> usize {
    match *op {
        PropOp::SetNode { .. } => 0,
        PropOp::ClassName { input }
        | PropOp::TextContent { input }
        | PropOp::Directive { input }
        | PropOp::Attribute { input, .. }
        | PropOp::Property { input, .. }
        | PropOp::DomProperty { input, .. }
        | PropOp::Style { input, .. }
        | PropOp::Event { input, .. } => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::dom::MemoryDom;
    use crate::template::{html, svg, TemplateRoot};
    use crate::types::{Directive, Handler};
    use pretty_assertions::assert_eq;

    fn descriptor(template: crate::template::Template) -> Rc<Descriptor> {
        match &template.roots()[0] {
            TemplateRoot::Block(d) => d.clone(),
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn test_mount_static_markup_with_bindings() {
        let d = descriptor(html(&["<div class=", "><b id=", ">x</b></div>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let state = mount(&mut dom, &mut prototypes, &d, &["a".into(), 7.into()]);
        assert_eq!(dom.to_html(state.root()), "<div class=\"a\"><b id=\"7\">x</b></div>");
        assert_eq!(state.slots.len(), 2);
    }

    #[test]
    fn test_separator_is_removed_and_text_saved() {
        let d = descriptor(html(&["<p>a ", " b</p>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let state = mount(&mut dom, &mut prototypes, &d, &[Value::Null]);
        assert_eq!(dom.to_html(state.root()), "<p>a  b</p>");
        assert_eq!(dom.text(state.slots[1]), Some(" b"));
        assert_eq!(dom.children(state.root()).len(), 2);
    }

    #[test]
    fn test_update_writes_only_changed_bindings() {
        let d = descriptor(html(&["<div title=", " ~color=", " .value=", "></div>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let prev: Vec<Value> = vec!["t".into(), "red".into(), 1.into()];
        let state = mount(&mut dom, &mut prototypes, &d, &prev);
        dom.reset_stats();

        update(&mut dom, &d, &state, &prev, &prev.clone());
        assert_eq!(dom.stats().total(), 0);

        let next: Vec<Value> = vec!["t".into(), "blue".into(), 1.into()];
        update(&mut dom, &d, &state, &prev, &next);
        assert_eq!(dom.stats().style_writes, 1);
        assert_eq!(dom.stats().total(), 1);
        assert_eq!(dom.style(state.root(), "color"), Some("blue"));
    }

    #[test]
    fn test_attribute_binding_semantics() {
        let d = descriptor(html(&["<div data-x=", "></div>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let state = mount(&mut dom, &mut prototypes, &d, &[Value::from("")]);
        let root = state.root();
        assert_eq!(dom.attribute(root, "data-x"), Some(""));

        update(&mut dom, &d, &state, &[Value::from("")], &[Value::Bool(false)]);
        assert_eq!(dom.attribute(root, "data-x"), None);
        update(&mut dom, &d, &state, &[Value::Bool(false)], &[Value::Int(0)]);
        assert_eq!(dom.attribute(root, "data-x"), Some("0"));
        update(&mut dom, &d, &state, &[Value::Int(0)], &[Value::Null]);
        assert_eq!(dom.attribute(root, "data-x"), None);
        update(&mut dom, &d, &state, &[Value::Null], &[Value::Bool(true)]);
        assert_eq!(dom.attribute(root, "data-x"), Some(""));
    }

    #[test]
    fn test_dom_property_compares_against_live_value() {
        let d = descriptor(html(&["<input *value=", ">"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let v = [Value::from("a")];
        let state = mount(&mut dom, &mut prototypes, &d, &v);
        dom.set_property(state.root(), "value", Value::from("typed"));
        dom.reset_stats();
        update(&mut dom, &d, &state, &v, &v);
        assert_eq!(dom.stats().property_writes, 1);
        assert_eq!(dom.property(state.root(), "value"), Some(Value::from("a")));
    }

    #[test]
    fn test_event_handlers_swap_only_on_change() {
        let d = descriptor(html(&["<button @click=", "></button>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let clicks = Rc::new(Cell::new(0));
        let c = clicks.clone();
        let a = Value::from(Handler::new(move |_| c.set(c.get() + 1)));
        let state = mount(&mut dom, &mut prototypes, &d, &[a.clone()]);
        dom.reset_stats();
        update(&mut dom, &d, &state, &[a.clone()], &[a.clone()]);
        assert_eq!(dom.stats().listener_writes, 0);

        let b = Value::from(Handler::new(|_| {}));
        update(&mut dom, &d, &state, &[a], &[b]);
        assert_eq!(dom.listener_count(state.root(), "click"), 1);
        dom.dispatch(state.root(), "click");
        assert_eq!(clicks.get(), 0);
    }

    #[test]
    fn test_directive_runs_on_mount() {
        let d = descriptor(html(&["<div ", "></div>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let directive = Directive::new(|dom, node, hydrating| {
            assert!(!hydrating);
            dom.set_attribute(node, "seen", "");
        });
        let state = mount(&mut dom, &mut prototypes, &d, &[directive.into()]);
        assert_eq!(dom.attribute(state.root(), "seen"), Some(""));
    }

    #[test]
    fn test_svg_template_uses_namespace_and_class_attribute() {
        let d = descriptor(svg(&["<circle class=", "></circle>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let state = mount(&mut dom, &mut prototypes, &d, &["dot".into()]);
        assert!(dom.is_svg(state.root()));
        assert_eq!(dom.attribute(state.root(), "class"), Some("dot"));
    }

    #[test]
    fn test_text_content_binding() {
        let d = descriptor(html(&["<p .textContent=", "></p>"]).unwrap());
        let mut dom = MemoryDom::new();
        let mut prototypes = Prototypes::new();
        let state = mount(&mut dom, &mut prototypes, &d, &["hi".into()]);
        assert_eq!(dom.to_html(state.root()), "<p>hi</p>");
        update(&mut dom, &d, &state, &["hi".into()], &[Value::Null]);
        assert_eq!(dom.to_html(state.root()), "<p></p>");
    }
}
