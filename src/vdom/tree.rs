//! Stateful tree - the live mirror of the last committed op tree.
//!
//! SNodes live in a generational arena and refer to each other by
//! [`SNodeId`]. Ids handed out to component handles can outlive their
//! node; a stale id simply stops resolving once the slot is reused.
//!
//! ```text
//! entries: [ gen 3 | SNode ] [ gen 1 | free ] [ gen 7 | SNode ] ...
//!                               ▲
//!                   free list ──┘
//! ```

use std::ops::{Index, IndexMut};

use bitflags::bitflags;

use super::component::ComponentState;
use super::op::Op;
use crate::dom::NodeId;
use crate::runtime::TemplateState;

/// Generational handle to an SNode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SNodeId {
    index: u32,
    generation: u32,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SNodeFlags: u8 {
        /// Component must re-render on the next dirty check.
        const DIRTY         = 1 << 0;
        /// Some descendant is dirty.
        const DIRTY_SUBTREE = 1 << 1;
    }
}

/// Per-kind live state.
pub(crate) enum NodeState {
    /// Component slot reserved while the instance is being created.
    Mounting,
    Text(NodeId),
    Element(TemplateState),
    Component(ComponentState),
    Context,
    List,
    TrackByKey,
    /// DOM node the listeners are attached to.
    Events(NodeId),
    Ref,
}

pub(crate) struct SNode {
    /// Op committed by the last render of this position.
    pub op: Op,
    pub parent: Option<SNodeId>,
    /// Child slots. Elements: one per child expression in child-op order.
    /// Lists: one per entry, `None` for holes. Wrappers: exactly one.
    pub children: Vec<Option<SNodeId>>,
    pub flags: SNodeFlags,
    pub state: NodeState,
}

impl SNode {
    pub fn new(op: Op, parent: Option<SNodeId>, state: NodeState) -> Self {
        Self {
            op,
            parent,
            children: Vec::new(),
            flags: SNodeFlags::empty(),
            state,
        }
    }
}

struct Entry {
    generation: u32,
    node: Option<SNode>,
}

/// Arena of SNodes.
#[derive(Default)]
pub(crate) struct Tree {
    entries: Vec<Entry>,
    free: Vec<u32>,
    len: usize,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: SNode) -> SNodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.node = Some(node);
            return SNodeId {
                index,
                generation: entry.generation,
            };
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            node: Some(node),
        });
        SNodeId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: SNodeId) -> Option<&SNode> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.node.as_ref())
    }

    pub fn get_mut(&mut self, id: SNodeId) -> Option<&mut SNode> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.node.as_mut())
    }

    pub fn contains(&self, id: SNodeId) -> bool {
        self.get(id).is_some()
    }

    /// Release a node. Its id and every copy of it stop resolving.
    pub fn remove(&mut self, id: SNodeId) -> Option<SNode> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let node = entry.node.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flag `id` dirty and every ancestor as having a dirty subtree.
    /// Returns false for a stale id.
    pub fn mark_dirty(&mut self, id: SNodeId) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        node.flags |= SNodeFlags::DIRTY;
        let mut parent = node.parent;
        while let Some(p) = parent {
            let Some(node) = self.get_mut(p) else {
                break;
            };
            node.flags |= SNodeFlags::DIRTY_SUBTREE;
            parent = node.parent;
        }
        true
    }
}

impl Index<SNodeId> for Tree {
    type Output = SNode;

    fn index(&self, id: SNodeId) -> &SNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale SNode id {id:?}"),
        }
    }
}

impl IndexMut<SNodeId> for Tree {
    fn index_mut(&mut self, id: SNodeId) -> &mut SNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale SNode id {id:?}"),
        }
    }
}
