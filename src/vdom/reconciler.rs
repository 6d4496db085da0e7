//! Reconciler - diff an op tree against the stateful tree.
//!
//! DOM insertion runs right to left. The reconciler carries an insertion
//! cursor `(parent, next)`: every mounted or visited node leaves `next`
//! pointing at its first DOM node, so the sibling to its left is inserted
//! before it.
//!
//! ```text
//! patch(prev, op)
//!   ├─ no prev ............... mount
//!   ├─ op is Hole ............ unmount
//!   ├─ incompatible .......... unmount, mount at the same cursor
//!   ├─ same op value ......... dirty check
//!   └─ otherwise ............. update in place
//! ```
//!
//! Unmount is post-order: children first, then the node's own hooks and
//! cleanups, then one DOM removal per top-level node.

use std::rc::Rc;

use tracing::trace;

use super::component::{ComponentHandle, ComponentState, Scope};
use super::context::ContextStack;
use super::op::{validate_keys, ComponentOp, Op};
use super::tree::{NodeState, SNode, SNodeFlags, SNodeId, Tree};
use crate::config::RenderConfig;
use crate::dom::{Dom, NodeId};
use crate::error::RenderError;
use crate::runtime::{self, Prototypes};
use crate::scheduler::Scheduler;
use crate::template::ir::is_void_element;
use crate::template::{ChildOp, Descriptor};

type Result<T> = std::result::Result<T, RenderError>;

/// Component hook queued for the end of the commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Attached,
    AfterUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildMode {
    Mount,
    Update,
    DirtyCheck,
}

/// One reconciliation pass over the tree.
pub(crate) struct Reconciler<'a> {
    pub(super) dom: &'a mut dyn Dom,
    pub(super) tree: &'a mut Tree,
    pub(super) prototypes: &'a mut Prototypes,
    pub(super) scheduler: &'a Scheduler,
    pub(super) config: &'a RenderConfig,
    pub(super) context: ContextStack,
    lifecycle: Vec<(SNodeId, Lifecycle)>,
    pub(super) parent: NodeId,
    pub(super) next: Option<NodeId>,
    /// Node ending the range being hydrated.
    pub(super) hydrate_end: Option<NodeId>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        dom: &'a mut dyn Dom,
        tree: &'a mut Tree,
        prototypes: &'a mut Prototypes,
        scheduler: &'a Scheduler,
        config: &'a RenderConfig,
    ) -> Self {
        Self {
            dom,
            tree,
            prototypes,
            scheduler,
            config,
            context: ContextStack::default(),
            lifecycle: Vec::new(),
            parent: NodeId(0),
            next: None,
            hydrate_end: None,
        }
    }

    /// Place the insertion cursor for a root.
    pub fn at(&mut self, container: NodeId, next: Option<NodeId>) -> &mut Self {
        self.parent = container;
        self.next = next;
        self
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Render `op` over the root subtree `prev`.
    pub fn render(&mut self, prev: Option<SNodeId>, op: &Op) -> Result<Option<SNodeId>> {
        self.patch(None, prev, op)
    }

    /// Re-render dirty components below `id`.
    pub fn refresh(&mut self, id: SNodeId) -> Result<()> {
        self.dirty_check(id)
    }

    /// Remove a whole root subtree.
    pub fn remove(&mut self, id: SNodeId) {
        self.unmount(id);
    }

    pub fn contains(&self, id: SNodeId) -> bool {
        self.tree.contains(id)
    }

    /// Whether a dirty check from `id` has anything to do.
    pub fn needs_refresh(&self, id: SNodeId) -> bool {
        self.tree
            .get(id)
            .is_some_and(|sn| sn.flags.intersects(SNodeFlags::DIRTY | SNodeFlags::DIRTY_SUBTREE))
    }

    /// Run the `attached` / `after_update` hooks queued by this pass,
    /// children before parents.
    pub fn run_lifecycle(&mut self) {
        for (id, hook) in std::mem::take(&mut self.lifecycle) {
            let Some(SNode {
                state: NodeState::Component(state),
                ..
            }) = self.tree.get_mut(id)
            else {
                continue;
            };
            match hook {
                Lifecycle::Attached => state.instance.attached(),
                Lifecycle::AfterUpdate => state.instance.after_update(),
            }
        }
    }

    pub(super) fn push_attached(&mut self, id: SNodeId) {
        self.lifecycle.push((id, Lifecycle::Attached));
    }

    // =========================================================================
    // Patch
    // =========================================================================

    pub(super) fn patch(
        &mut self,
        parent: Option<SNodeId>,
        prev: Option<SNodeId>,
        op: &Op,
    ) -> Result<Option<SNodeId>> {
        if let Op::Keyed(k) = op {
            return Err(RenderError::KeyOutsideList { key: k.key.clone() });
        }
        let Some(id) = prev.filter(|id| self.tree.contains(*id)) else {
            return self.mount(parent, op);
        };
        if op.is_hole() {
            self.unmount(id);
            return Ok(None);
        }
        if !compatible(&self.tree[id].op, op) {
            if let Op::TrackByKey(entries) = op {
                validate_keys(entries)?;
            }
            trace!(?id, "replace");
            self.unmount(id);
            return self.mount(parent, op);
        }
        self.update(id, op)?;
        Ok(Some(id))
    }

    /// Insert `node` at the cursor and make it the new cursor.
    pub(super) fn insert(&mut self, node: NodeId) {
        self.dom.insert_before(self.parent, node, self.next);
        self.next = Some(node);
    }

    // =========================================================================
    // Mount
    // =========================================================================

    /// Mount `op` at the cursor. On error everything this call created is
    /// torn down again and the cursor is restored.
    pub(super) fn mount(&mut self, parent: Option<SNodeId>, op: &Op) -> Result<Option<SNodeId>> {
        let next = self.next;
        let mut created = None;
        let result = self.mount_op(parent, op, &mut created);
        if result.is_err() {
            if let Some(id) = created {
                trace!(?id, "rolling back failed mount");
                self.unmount(id);
            }
            self.next = next;
        }
        result
    }

    /// Mount without rollback. `created` is set as soon as the SNode
    /// exists; children are attached to it as they are mounted.
    fn mount_op(
        &mut self,
        parent: Option<SNodeId>,
        op: &Op,
        created: &mut Option<SNodeId>,
    ) -> Result<Option<SNodeId>> {
        match op {
            Op::Hole => Ok(None),
            Op::Keyed(k) => Err(RenderError::KeyOutsideList { key: k.key.clone() }),
            Op::Text(text) => {
                let node = self.dom.create_text(text);
                self.insert(node);
                Ok(Some(self.tree.insert(SNode::new(op.clone(), parent, NodeState::Text(node)))))
            }
            Op::Element(e) => {
                let descriptor = &e.descriptor;
                check_element(descriptor, e.values.len())?;
                let state = runtime::mount(self.dom, self.prototypes, descriptor, &e.values);
                let root = state.root();
                let mut node = SNode::new(op.clone(), parent, NodeState::Element(state));
                node.children = vec![None; descriptor.child_slots()];
                let id = self.tree.insert(node);
                *created = Some(id);
                self.element_children(id, ChildMode::Mount)?;
                self.insert(root);
                trace!(tag = descriptor.tag(), "mount element");
                Ok(Some(id))
            }
            Op::Component(c) => self.mount_component(parent, op, c, created).map(Some),
            Op::Context(c) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Context));
                *created = Some(id);
                self.context.push(c.id, c.value.clone());
                let child = self.mount(Some(id), &c.child);
                self.context.pop();
                self.tree[id].children = vec![child?];
                Ok(Some(id))
            }
            Op::List(ops) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::List));
                *created = Some(id);
                self.mount_entries(id, ops.iter())?;
                Ok(Some(id))
            }
            Op::TrackByKey(entries) => {
                validate_keys(entries)?;
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::TrackByKey));
                *created = Some(id);
                self.mount_entries(id, entries.iter().map(entry_child))?;
                Ok(Some(id))
            }
            Op::Events(e) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Mounting));
                *created = Some(id);
                let child = self.mount(Some(id), &e.child)?;
                self.tree[id].children = vec![child];
                let node = self.single_node(id, "Events")?;
                for (event, handler) in &e.events {
                    self.dom.add_listener(node, event, handler);
                }
                self.tree[id].state = NodeState::Events(node);
                Ok(Some(id))
            }
            Op::Ref(r) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Ref));
                *created = Some(id);
                let child = self.mount(Some(id), &r.child)?;
                self.tree[id].children = vec![child];
                let node = self.ref_node(id)?;
                r.node_ref.set(node);
                Ok(Some(id))
            }
        }
    }

    /// Mount list entries right to left, attaching each to `id` at once.
    fn mount_entries<'o, I>(&mut self, id: SNodeId, ops: I) -> Result<()>
    where
        I: DoubleEndedIterator<Item = &'o Op> + ExactSizeIterator,
    {
        self.tree[id].children = vec![None; ops.len()];
        for (i, op) in ops.enumerate().rev() {
            let child = self.mount(Some(id), op)?;
            self.tree[id].children[i] = child;
        }
        Ok(())
    }

    fn mount_component(
        &mut self,
        parent: Option<SNodeId>,
        op: &Op,
        c: &ComponentOp,
        created: &mut Option<SNodeId>,
    ) -> Result<SNodeId> {
        let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Mounting));
        *created = Some(id);
        let handle = ComponentHandle::new(id, self.scheduler, c.factory.name);
        let mut instance = (c.factory.create)(&*c.props, &handle);
        let child_op = instance.render(&*c.props, &Scope::new(&handle, &self.context));
        trace!(component = c.factory.name, "mount component");
        self.tree[id].state = NodeState::Component(ComponentState { instance, handle });

        let child = self.mount(Some(id), &child_op)?;
        self.tree[id].children = vec![child];
        self.push_attached(id);
        Ok(id)
    }

    // =========================================================================
    // Update
    // =========================================================================

    fn update(&mut self, id: SNodeId, op: &Op) -> Result<()> {
        if self.tree[id].op.same(op) {
            return self.dirty_check(id);
        }
        self.tree[id].flags.remove(SNodeFlags::DIRTY_SUBTREE);

        match op {
            Op::Text(text) => {
                let prev = std::mem::replace(&mut self.tree[id].op, op.clone());
                if let NodeState::Text(node) = self.tree[id].state {
                    if matches!(&prev, Op::Text(old) if old != text) {
                        self.dom.set_text(node, text);
                    }
                    self.next = Some(node);
                }
            }
            Op::Element(next) => {
                check_element(&next.descriptor, next.values.len())?;
                let prev = std::mem::replace(&mut self.tree[id].op, op.clone());
                let Op::Element(prev) = &prev else {
                    return Ok(());
                };
                let NodeState::Element(state) = &self.tree[id].state else {
                    return Ok(());
                };
                let root = state.root();
                runtime::update(self.dom, &next.descriptor, state, &prev.values, &next.values);
                self.element_children(id, ChildMode::Update)?;
                self.next = Some(root);
            }
            Op::Component(next) => self.update_component(id, op, next)?,
            Op::Context(c) => {
                self.tree[id].op = op.clone();
                let prev = self.only_child(id);
                self.context.push(c.id, c.value.clone());
                let child = self.patch(Some(id), prev, &c.child);
                self.context.pop();
                self.tree[id].children = vec![child?];
            }
            Op::List(ops) => {
                // Children are written back one by one so a failed entry
                // leaves every slot owned by the tree.
                let children = &mut self.tree[id].children;
                let trailing = children.split_off(ops.len().min(children.len()));
                children.resize(ops.len(), None);
                for child in trailing.into_iter().flatten() {
                    self.unmount(child);
                }
                for (i, entry) in ops.iter().enumerate().rev() {
                    let prev = self.tree[id].children[i];
                    let child = self.patch(Some(id), prev, entry)?;
                    self.tree[id].children[i] = child;
                }
                self.tree[id].op = op.clone();
            }
            Op::TrackByKey(next) => {
                validate_keys(next)?;
                let prev = std::mem::replace(&mut self.tree[id].op, op.clone());
                if let Op::TrackByKey(prev) = &prev {
                    self.update_keyed(id, prev, next)?;
                }
            }
            Op::Events(next) => {
                let prev = std::mem::replace(&mut self.tree[id].op, op.clone());
                let child = self.patch(Some(id), self.only_child(id), &next.child)?;
                self.tree[id].children = vec![child];
                let node = self.single_node(id, "Events")?;
                let (Op::Events(prev), NodeState::Events(old)) = (&prev, &self.tree[id].state) else {
                    return Ok(());
                };
                if node != *old {
                    for (event, handler) in &next.events {
                        self.dom.add_listener(node, event, handler);
                    }
                } else {
                    for (event, handler) in &prev.events {
                        if !next.events.iter().any(|(e, h)| e == event && h.same(handler)) {
                            self.dom.remove_listener(node, event, handler);
                        }
                    }
                    for (event, handler) in &next.events {
                        if !prev.events.iter().any(|(e, h)| e == event && h.same(handler)) {
                            self.dom.add_listener(node, event, handler);
                        }
                    }
                }
                self.tree[id].state = NodeState::Events(node);
            }
            Op::Ref(next) => {
                let prev = std::mem::replace(&mut self.tree[id].op, op.clone());
                let child = self.patch(Some(id), self.only_child(id), &next.child)?;
                self.tree[id].children = vec![child];
                let node = self.ref_node(id)?;
                if let Op::Ref(prev) = &prev {
                    if !prev.node_ref.same(&next.node_ref) {
                        prev.node_ref.set(None);
                    }
                }
                next.node_ref.set(node);
            }
            Op::Hole | Op::Keyed(_) => {}
        }
        Ok(())
    }

    fn update_component(&mut self, id: SNodeId, op: &Op, next: &ComponentOp) -> Result<()> {
        let rerender = {
            let sn = &self.tree[id];
            let Op::Component(prev) = &sn.op else {
                return Ok(());
            };
            let equal = next
                .factory
                .props_eq
                .as_ref()
                .is_some_and(|eq| eq(&*prev.props, &*next.props));
            sn.flags.contains(SNodeFlags::DIRTY)
                || (!equal
                    && match &sn.state {
                        NodeState::Component(state) => {
                            state.instance.should_update(&*prev.props, &*next.props)
                        }
                        _ => true,
                    })
        };
        self.tree[id].op = op.clone();
        if rerender {
            self.rerender(id)
        } else {
            trace!(?id, "component props unchanged");
            match self.only_child(id) {
                Some(child) => self.dirty_check(child),
                None => Ok(()),
            }
        }
    }

    /// Render a component again with its current props and patch the result.
    fn rerender(&mut self, id: SNodeId) -> Result<()> {
        let child_op = {
            let sn = &mut self.tree[id];
            sn.flags.remove(SNodeFlags::DIRTY | SNodeFlags::DIRTY_SUBTREE);
            let Op::Component(c) = &sn.op else {
                return Ok(());
            };
            let props = c.props.clone();
            let NodeState::Component(state) = &mut sn.state else {
                return Ok(());
            };
            trace!(component = state.handle.name(), "render component");
            state.instance.before_update();
            state.instance.render(&*props, &Scope::new(&state.handle, &self.context))
        };
        let prev = self.only_child(id);
        let child = self.patch(Some(id), prev, &child_op)?;
        self.tree[id].children = vec![child];
        self.lifecycle.push((id, Lifecycle::AfterUpdate));
        Ok(())
    }

    /// Walk the child ops of an element, right to left.
    fn element_children(&mut self, id: SNodeId, mode: ChildMode) -> Result<()> {
        let (element, slots) = {
            let sn = &self.tree[id];
            let (Op::Element(e), NodeState::Element(state)) = (&sn.op, &sn.state) else {
                return Ok(());
            };
            (e.clone(), state.slots.clone())
        };
        let descriptor = &element.descriptor;
        if descriptor.child_ops.is_empty() {
            return Ok(());
        }

        let saved = (self.parent, self.next);
        self.parent = slots[0];
        self.next = None;
        let mut k = 0;
        let mut result = Ok(());
        for op in &descriptor.child_ops {
            match *op {
                ChildOp::SetParent(slot) => {
                    self.parent = slots[slot];
                    self.next = None;
                }
                ChildOp::SetNext(slot) => self.next = Some(slots[slot]),
                ChildOp::Child(input) => {
                    let prev = self.tree[id].children[k];
                    let child = match mode {
                        ChildMode::Mount => {
                            let op = runtime::input(descriptor, &element.values, input).to_op();
                            self.mount(Some(id), &op)
                        }
                        ChildMode::Update => {
                            let op = runtime::input(descriptor, &element.values, input).to_op();
                            self.patch(Some(id), prev, &op)
                        }
                        ChildMode::DirtyCheck => match prev {
                            Some(child) => self.dirty_check(child).map(|_| prev),
                            None => Ok(None),
                        },
                    };
                    match child {
                        Ok(child) => self.tree[id].children[k] = child,
                        Err(err) => {
                            result = Err(err);
                            break;
                        }
                    }
                    k += 1;
                }
            }
        }
        (self.parent, self.next) = saved;
        result
    }

    // =========================================================================
    // Dirty check
    // =========================================================================

    /// Descend into flagged subtrees only, re-rendering dirty components.
    pub(super) fn dirty_check(&mut self, id: SNodeId) -> Result<()> {
        let Some(sn) = self.tree.get(id) else {
            return Ok(());
        };
        let flags = sn.flags;
        let is_component = matches!(sn.state, NodeState::Component(_));
        if is_component && flags.contains(SNodeFlags::DIRTY) {
            return self.rerender(id);
        }
        if !flags.contains(SNodeFlags::DIRTY_SUBTREE) {
            if let Some(node) = self.first_dom_node(id) {
                self.next = Some(node);
            }
            return Ok(());
        }
        self.tree[id].flags.remove(SNodeFlags::DIRTY_SUBTREE);

        match &self.tree[id].state {
            NodeState::Text(node) => self.next = Some(*node),
            NodeState::Element(state) => {
                let root = state.root();
                self.element_children(id, ChildMode::DirtyCheck)?;
                self.next = Some(root);
            }
            NodeState::Context => {
                let Op::Context(c) = &self.tree[id].op else {
                    return Ok(());
                };
                let c = c.clone();
                self.context.push(c.id, c.value.clone());
                let result = match self.only_child(id) {
                    Some(child) => self.dirty_check(child),
                    None => Ok(()),
                };
                self.context.pop();
                result?;
            }
            NodeState::List | NodeState::TrackByKey => {
                let children = self.tree[id].children.clone();
                for child in children.into_iter().rev().flatten() {
                    self.dirty_check(child)?;
                }
            }
            NodeState::Component(_) | NodeState::Events(_) | NodeState::Ref => {
                if let Some(child) = self.only_child(id) {
                    self.dirty_check(child)?;
                }
            }
            NodeState::Mounting => {}
        }
        Ok(())
    }

    // =========================================================================
    // Unmount
    // =========================================================================

    /// Tear down `id` and remove its DOM.
    pub(super) fn unmount(&mut self, id: SNodeId) {
        let mut nodes = Vec::new();
        self.dom_nodes(id, &mut nodes);
        self.release(id);
        for node in nodes {
            self.dom.remove(node);
        }
    }

    /// Post-order teardown of the SNode subtree; leaves the DOM alone.
    fn release(&mut self, id: SNodeId) {
        let Some(sn) = self.tree.get_mut(id) else {
            return;
        };
        let children = std::mem::take(&mut sn.children);
        for child in children.into_iter().flatten() {
            self.release(child);
        }
        let Some(mut sn) = self.tree.remove(id) else {
            return;
        };
        if let NodeState::Component(state) = &mut sn.state {
            trace!(component = state.handle.name(), "unmount component");
            state.instance.detached();
            state.handle.teardown();
        }
        if let Op::Ref(r) = &sn.op {
            r.node_ref.set(None);
        }
    }

    // =========================================================================
    // DOM helpers
    // =========================================================================

    pub(super) fn only_child(&self, id: SNodeId) -> Option<SNodeId> {
        self.tree[id].children.first().copied().flatten()
    }

    pub(super) fn first_dom_node(&self, id: SNodeId) -> Option<NodeId> {
        let sn = self.tree.get(id)?;
        match &sn.state {
            NodeState::Text(node) => Some(*node),
            NodeState::Element(state) => Some(state.root()),
            _ => sn
                .children
                .iter()
                .flatten()
                .find_map(|&child| self.first_dom_node(child)),
        }
    }

    /// Top-level DOM nodes of a subtree, left to right.
    pub(crate) fn dom_nodes(&self, id: SNodeId, out: &mut Vec<NodeId>) {
        collect_dom_nodes(&*self.tree, id, out);
    }

    /// The one DOM node a wrapper requires.
    pub(super) fn single_node(&self, id: SNodeId, wrapper: &'static str) -> Result<NodeId> {
        let mut nodes = Vec::new();
        self.dom_nodes(id, &mut nodes);
        match nodes[..] {
            [node] => Ok(node),
            _ => Err(RenderError::MultiRoot {
                wrapper,
                found: nodes.len(),
            }),
        }
    }

    /// Nearest DOM node for a `Ref`; more than one is an error.
    pub(super) fn ref_node(&self, id: SNodeId) -> Result<Option<NodeId>> {
        let mut nodes = Vec::new();
        self.dom_nodes(id, &mut nodes);
        if nodes.len() > 1 {
            return Err(RenderError::MultiRoot {
                wrapper: "Ref",
                found: nodes.len(),
            });
        }
        Ok(nodes.first().copied())
    }
}

/// Top-level DOM nodes of a subtree, left to right.
pub(crate) fn collect_dom_nodes(tree: &Tree, id: SNodeId, out: &mut Vec<NodeId>) {
    let Some(sn) = tree.get(id) else {
        return;
    };
    match &sn.state {
        NodeState::Text(node) => out.push(*node),
        NodeState::Element(state) => out.push(state.root()),
        _ => {
            for &child in sn.children.iter().flatten() {
                collect_dom_nodes(tree, child, out);
            }
        }
    }
}

/// Whether `next` can patch the node last rendered from `prev`.
fn compatible(prev: &Op, next: &Op) -> bool {
    match (prev, next) {
        (Op::Text(_), Op::Text(_)) => true,
        (Op::Element(a), Op::Element(b)) => Rc::ptr_eq(&a.descriptor, &b.descriptor),
        (Op::Component(a), Op::Component(b)) => Rc::ptr_eq(&a.factory, &b.factory),
        (Op::Context(a), Op::Context(b)) => a.id == b.id,
        (Op::List(_), Op::List(_))
        | (Op::TrackByKey(_), Op::TrackByKey(_))
        | (Op::Events(_), Op::Events(_))
        | (Op::Ref(_), Op::Ref(_)) => true,
        _ => false,
    }
}

/// Reject values of the wrong arity and child slots on void elements.
/// Descriptors may be built or deserialized without the compiler.
pub(super) fn check_element(descriptor: &Descriptor, values: usize) -> Result<()> {
    if descriptor.arity != values {
        return Err(RenderError::ValueCount {
            expected: descriptor.arity,
            found: values,
        });
    }
    if is_void_element(descriptor.tag()) && !descriptor.child_ops.is_empty() {
        return Err(RenderError::VoidChildren {
            tag: descriptor.tag().to_string(),
        });
    }
    Ok(())
}

/// Child of a validated keyed list entry.
pub(super) fn entry_child(entry: &Op) -> &Op {
    match entry {
        Op::Keyed(k) => &k.child,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpdateMode;
    use crate::dom::MemoryDom;
    use crate::types::{Handler, Key, NodeRef, Value};
    use pretty_assertions::assert_eq;

    struct Fixture {
        dom: MemoryDom,
        tree: Tree,
        prototypes: Prototypes,
        scheduler: Scheduler,
        config: RenderConfig,
        container: NodeId,
        root: Option<SNodeId>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut dom = MemoryDom::new();
            let container = dom.create_element("main", false);
            Self {
                dom,
                tree: Tree::new(),
                prototypes: Prototypes::new(),
                scheduler: Scheduler::new(UpdateMode::Sync),
                config: RenderConfig::default(),
                container,
                root: None,
            }
        }

        fn render(&mut self, op: &Op) -> Result<()> {
            let mut rec = Reconciler::new(
                &mut self.dom,
                &mut self.tree,
                &mut self.prototypes,
                &self.scheduler,
                &self.config,
            );
            rec.at(self.container, None);
            self.root = rec.render(self.root, op)?;
            rec.run_lifecycle();
            Ok(())
        }

        fn html(&self) -> String {
            self.dom.inner_html(self.container)
        }
    }

    fn div() -> Rc<Descriptor> {
        Rc::new(Descriptor::element("div", false))
    }

    #[test]
    fn test_mount_and_patch_text() {
        let mut f = Fixture::new();
        f.render(&Op::text("a")).unwrap();
        assert_eq!(f.html(), "a");
        f.dom.reset_stats();
        f.render(&Op::text("a")).unwrap();
        assert_eq!(f.dom.stats().total(), 0);
        f.render(&Op::text("b")).unwrap();
        assert_eq!(f.html(), "b");
        assert_eq!(f.dom.stats().text_writes, 1);
    }

    #[test]
    fn test_list_grows_and_shrinks() {
        let mut f = Fixture::new();
        f.render(&Op::list(vec![Op::text("a"), Op::Hole, Op::text("c")])).unwrap();
        assert_eq!(f.html(), "ac");
        f.render(&Op::list(vec![Op::text("a"), Op::text("b"), Op::text("c"), Op::text("d")]))
            .unwrap();
        assert_eq!(f.html(), "abcd");
        f.render(&Op::list(vec![Op::text("x")])).unwrap();
        assert_eq!(f.html(), "x");
        assert_eq!(f.tree.len(), 2);
    }

    #[test]
    fn test_incompatible_op_replaces_in_place() {
        let mut f = Fixture::new();
        let d = div();
        f.render(&Op::list(vec![Op::text("a"), Op::text("b")])).unwrap();
        f.render(&Op::list(vec![Op::element(d, vec![]), Op::text("b")])).unwrap();
        assert_eq!(f.html(), "<div></div>b");
    }

    #[test]
    fn test_element_requires_matching_value_count() {
        let mut f = Fixture::new();
        let err = f.render(&Op::element(div(), vec![Value::Int(1)])).unwrap_err();
        assert_eq!(err, RenderError::ValueCount { expected: 0, found: 1 });
    }

    #[test]
    fn test_keyed_outside_list_is_an_error() {
        let mut f = Fixture::new();
        let err = f.render(&Op::list(vec![Op::keyed(1, Op::Hole)])).unwrap_err();
        assert_eq!(err, RenderError::KeyOutsideList { key: Key::Int(1) });
    }

    #[test]
    fn test_events_attach_and_diff() {
        let mut f = Fixture::new();
        let d = div();
        let a = Handler::new(|_| {});
        let b = Handler::new(|_| {});
        f.render(&Op::events(vec![("click", a.clone())], Op::element(d.clone(), vec![])))
            .unwrap();
        let node = f.dom.first_child(f.container).unwrap();
        assert_eq!(f.dom.listener_count(node, "click"), 1);

        f.dom.reset_stats();
        f.render(&Op::events(vec![("click", a.clone())], Op::element(d.clone(), vec![])))
            .unwrap();
        assert_eq!(f.dom.stats().listener_writes, 0);

        f.render(&Op::events(vec![("click", b)], Op::element(d, vec![]))).unwrap();
        assert_eq!(f.dom.listener_count(node, "click"), 1);
        assert_eq!(f.dom.stats().listener_writes, 2);
    }

    #[test]
    fn test_events_need_exactly_one_node() {
        let mut f = Fixture::new();
        let op = Op::events(vec![], Op::list(vec![Op::text("a"), Op::text("b")]));
        assert_eq!(
            f.render(&op).unwrap_err(),
            RenderError::MultiRoot { wrapper: "Events", found: 2 }
        );
        let mut f = Fixture::new();
        assert_eq!(
            f.render(&Op::events(vec![], Op::Hole)).unwrap_err(),
            RenderError::MultiRoot { wrapper: "Events", found: 0 }
        );
    }

    #[test]
    fn test_ref_set_and_cleared() {
        let mut f = Fixture::new();
        let node_ref = NodeRef::new();
        f.render(&Op::with_ref(&node_ref, Op::text("x"))).unwrap();
        assert_eq!(node_ref.get(), f.dom.first_child(f.container));
        f.render(&Op::Hole).unwrap();
        assert_eq!(node_ref.get(), None);
        assert!(f.tree.is_empty());
    }

    fn input_with_child_slot() -> Rc<Descriptor> {
        let mut d = Descriptor::element("input", false);
        d.flags = crate::template::TemplateFlags::new(1, 1, false);
        d.child_ops = vec![ChildOp::Child(0)];
        d.exprs = vec![0];
        d.arity = 1;
        Rc::new(d)
    }

    #[test]
    fn test_void_element_with_child_slot_is_rejected() {
        let mut f = Fixture::new();
        let op = Op::element(input_with_child_slot(), vec![Value::from("x")]);
        let err = f.render(&op).unwrap_err();
        assert_eq!(err, RenderError::VoidChildren { tag: "input".into() });
        assert_eq!(f.html(), "");
        assert!(f.tree.is_empty());
    }

    #[test]
    fn test_failed_component_mount_is_torn_down() {
        let mut f = Fixture::new();
        let torn_down = Rc::new(std::cell::Cell::new(false));
        let flag = torn_down.clone();
        let broken = crate::vdom::Factory::stateless("Broken", move |_: &(), scope| {
            let flag = flag.clone();
            scope.handle().on_cleanup(move || flag.set(true));
            Op::list(vec![Op::text("kept?"), Op::keyed(1, Op::Hole)])
        });
        let err = f.render(&broken.op(())).unwrap_err();
        assert_eq!(err, RenderError::KeyOutsideList { key: Key::Int(1) });
        assert!(torn_down.get());
        assert_eq!(f.html(), "");
        assert!(f.tree.is_empty());
    }
}
