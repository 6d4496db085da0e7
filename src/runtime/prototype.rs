//! Clone prototypes.
//!
//! Templates with static parts are instantiated by deep-cloning a detached
//! prototype tree instead of replaying the markup. The prototype of a
//! descriptor is built on first mount and kept for the renderer's lifetime.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::dom::{Dom, NodeId};
use crate::template::{Descriptor, StaticElement, StaticNode};

/// Prototype nodes by descriptor identity.
///
/// The map holds the descriptor `Rc` so its address cannot be reused by
/// another descriptor while the entry lives.
#[derive(Default)]
pub struct Prototypes {
    nodes: HashMap<*const Descriptor, (Rc<Descriptor>, NodeId)>,
}

impl Prototypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prototype root for `descriptor`, built on first use.
    pub fn get(&mut self, dom: &mut dyn Dom, descriptor: &Rc<Descriptor>) -> NodeId {
        let key = Rc::as_ptr(descriptor);
        if let Some((_, node)) = self.nodes.get(&key) {
            return *node;
        }
        let node = build(dom, &descriptor.root, descriptor.is_svg());
        trace!(tag = descriptor.tag(), "built template prototype");
        self.nodes.insert(key, (descriptor.clone(), node));
        node
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Create a detached element for a static tree. Expression positions are
/// left empty; separators become empty comments.
pub(crate) fn build(dom: &mut dyn Dom, el: &StaticElement, svg: bool) -> NodeId {
    let node = dom.create_element(&el.tag, svg);
    for (name, value) in &el.attrs {
        dom.set_attribute(node, name, value);
    }
    for child in &el.children {
        let child = match child {
            StaticNode::Element(e) => build(dom, e, svg),
            StaticNode::Text { value, .. } => dom.create_text(value),
            StaticNode::Separator => dom.create_comment(""),
            StaticNode::Expr(_) => continue,
        };
        dom.append_child(node, child);
    }
    node
}
