//! DOM capability.
//!
//! The engine never talks to a concrete DOM. Everything it needs goes
//! through the object-safe [`Dom`] trait, handed in by the embedder:
//!
//! ```text
//! Renderer ──► Reconciler ──► runtime (templates) ──► &mut dyn Dom
//!                                  ▲
//!                  layout effects ─┘ (&dyn Dom, read only)
//! ```
//!
//! Nodes are addressed by [`NodeId`] handles owned by the implementation,
//! the same way components are addressed by indices in an ECS registry.
//! [`MemoryDom`] is the in-crate implementation used by tests.

mod memory;

pub use memory::{Journal, MemoryDom, MutationStats};

use crate::types::{Handler, Value};

/// Handle to a node owned by a [`Dom`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

/// Mutation and read interface over a DOM tree.
pub trait Dom {
    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create an element; `svg` selects the SVG namespace.
    fn create_element(&mut self, tag: &str, svg: bool) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;
    fn create_comment(&mut self, text: &str) -> NodeId;
    /// Clone a node, with its subtree when `deep` is set. Listeners and
    /// properties are not cloned.
    fn clone_node(&mut self, node: NodeId, deep: bool) -> NodeId;

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Insert (or move) `node` into `parent` before `reference`, or at the
    /// end when `reference` is `None`.
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>);
    fn remove_child(&mut self, parent: NodeId, node: NodeId);

    fn append_child(&mut self, parent: NodeId, node: NodeId) {
        self.insert_before(parent, node, None);
    }

    /// Detach `node` from its parent, if it has one.
    fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            self.remove_child(parent, node);
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn first_child(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn kind(&self, node: NodeId) -> NodeKind;
    /// Lowercase tag name of an element.
    fn tag(&self, node: NodeId) -> Option<&str>;
    /// Character data of a text or comment node.
    fn text(&self, node: NodeId) -> Option<&str>;
    fn set_text(&mut self, node: NodeId, text: &str);
    /// Replace all children of an element with a single text node.
    fn set_text_content(&mut self, node: NodeId, text: &str);

    // -------------------------------------------------------------------------
    // Attributes, properties, style
    // -------------------------------------------------------------------------

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);

    /// HTML elements go through `className`; SVG elements keep `class` as a
    /// plain attribute. Implementations without that distinction can rely on
    /// the default.
    fn set_class_name(&mut self, node: NodeId, value: &str) {
        self.set_attribute(node, "class", value);
    }

    fn property(&self, node: NodeId, name: &str) -> Option<Value>;
    fn set_property(&mut self, node: NodeId, name: &str, value: Value);

    fn style(&self, node: NodeId, name: &str) -> Option<&str>;
    fn set_style(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_style(&mut self, node: NodeId, name: &str);

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    fn add_listener(&mut self, node: NodeId, event: &str, handler: &Handler);
    fn remove_listener(&mut self, node: NodeId, event: &str, handler: &Handler);
}
