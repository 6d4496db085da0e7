//! Hydration - build the stateful tree over server-rendered DOM.
//!
//! The op tree is walked left to right with a forward cursor over the
//! existing children. Each op adopts the nodes at the cursor and returns
//! the cursor after them:
//!
//! ```text
//! container: [ <!--> "hi" <div>...</div> <p>..</p> ]
//!                     ▲      ▲               ▲
//!   Text("hi") ───────┘      │               │
//!   Element(div) ────────────┘ (template walk, see runtime::adopt)
//!   leftovers ───────────────────────────────┘ removed
//! ```
//!
//! A root created before a marker node hydrates only up to that marker.

use std::rc::Rc;

use tracing::{debug_span, trace, warn};

use super::component::{ComponentHandle, ComponentState, Scope};
use super::op::{validate_keys, Op};
use super::reconciler::{check_element, entry_child, Reconciler};
use super::tree::{NodeState, SNode, SNodeId};
use crate::dom::{Dom, NodeId, NodeKind};
use crate::error::RenderError;
use crate::runtime::{self, Hydrator};
use crate::template::Descriptor;
use crate::types::Value;

type Result<T> = std::result::Result<T, RenderError>;

/// Hydration step result: the new SNode and the cursor after its nodes.
type Step = (Option<SNodeId>, Option<NodeId>);

impl Reconciler<'_> {
    /// Adopt the children of the cursor's container for `op`. The cursor's
    /// `next` ends the range: it is never adopted or removed, and nodes
    /// the server did not send are created before it.
    ///
    /// On error the partial tree is unmounted and the range is cleared.
    pub fn hydrate(&mut self, op: &Op) -> Result<Option<SNodeId>> {
        let _span = debug_span!("hydrate").entered();
        let container = self.parent;
        let end = self.next;
        self.hydrate_end = end;
        let first = self.dom.first_child(container);
        let step = self.hydrate_op(None, op, container, first);
        let (id, cursor) = match step {
            Ok(step) => step,
            Err(err) => {
                let first = self.dom.first_child(container);
                self.remove_until(first, end, false);
                return Err(err);
            }
        };
        self.remove_until(cursor, end, self.config.hydration_warnings);
        Ok(id)
    }

    /// Remove `cursor` and its siblings up to, not including, `end`.
    fn remove_until(&mut self, mut cursor: Option<NodeId>, end: Option<NodeId>, report: bool) {
        while let Some(node) = cursor {
            if Some(node) == end {
                break;
            }
            cursor = self.dom.next_sibling(node);
            if report {
                warn!(found = %runtime_describe(&*self.dom, node), "hydration: removing unmatched node");
            }
            self.dom.remove(node);
        }
    }

    /// Hydrate `op` at `cursor`. On error everything this call adopted or
    /// created is unmounted.
    pub(super) fn hydrate_op(
        &mut self,
        parent: Option<SNodeId>,
        op: &Op,
        dom_parent: NodeId,
        cursor: Option<NodeId>,
    ) -> Result<Step> {
        let mut created = None;
        let result = self.hydrate_node(parent, op, dom_parent, cursor, &mut created);
        if result.is_err() {
            if let Some(id) = created {
                trace!(?id, "rolling back failed hydration");
                self.unmount(id);
            }
        }
        result
    }

    fn hydrate_node(
        &mut self,
        parent: Option<SNodeId>,
        op: &Op,
        dom_parent: NodeId,
        cursor: Option<NodeId>,
        created: &mut Option<SNodeId>,
    ) -> Result<Step> {
        let end = self.hydrate_end;
        match op {
            Op::Hole => Ok((None, cursor)),
            Op::Keyed(k) => Err(RenderError::KeyOutsideList { key: k.key.clone() }),
            Op::Text(text) => {
                let cursor = runtime::skip_comments(self.dom, cursor, end);
                let (node, next) = match cursor {
                    Some(n) if cursor != end && self.dom.kind(n) == NodeKind::Text => {
                        if self.dom.text(n) != Some(&**text) {
                            if self.config.hydration_warnings {
                                warn!(expected = %text, found = ?self.dom.text(n), "hydration text mismatch");
                            }
                            self.dom.set_text(n, text);
                        }
                        (n, self.dom.next_sibling(n))
                    }
                    other => {
                        if self.config.hydration_warnings {
                            let found = other.map(|n| runtime_describe(&*self.dom, n));
                            warn!(expected = %text, ?found, "hydration mismatch");
                        }
                        let fresh = self.dom.create_text(text);
                        self.dom.insert_before(dom_parent, fresh, other);
                        (fresh, other)
                    }
                };
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Text(node)));
                Ok((Some(id), next))
            }
            Op::Element(e) => {
                check_element(&e.descriptor, e.values.len())?;
                let mut node = SNode::new(op.clone(), parent, NodeState::Mounting);
                node.children = vec![None; e.descriptor.child_slots()];
                let id = self.tree.insert(node);
                *created = Some(id);
                let mut block = BlockHydrator {
                    rec: self,
                    id,
                    descriptor: e.descriptor.clone(),
                    values: e.values.clone(),
                };
                let (state, next) =
                    runtime::adopt(&mut block, &e.descriptor, &e.values, dom_parent, cursor)?;
                self.tree[id].state = NodeState::Element(state);
                trace!(tag = e.descriptor.tag(), "hydrate element");
                Ok((Some(id), next))
            }
            Op::Component(c) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Mounting));
                *created = Some(id);
                let handle = ComponentHandle::new(id, self.scheduler, c.factory.name);
                let mut instance = (c.factory.create)(&*c.props, &handle);
                let child_op = instance.render(&*c.props, &Scope::new(&handle, &self.context));
                self.tree[id].state = NodeState::Component(ComponentState { instance, handle });
                let (child, next) = self.hydrate_op(Some(id), &child_op, dom_parent, cursor)?;
                self.tree[id].children = vec![child];
                self.push_attached(id);
                Ok((Some(id), next))
            }
            Op::Context(c) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Context));
                *created = Some(id);
                self.context.push(c.id, c.value.clone());
                let step = self.hydrate_op(Some(id), &c.child, dom_parent, cursor);
                self.context.pop();
                let (child, next) = step?;
                self.tree[id].children = vec![child];
                Ok((Some(id), next))
            }
            Op::List(ops) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::List));
                *created = Some(id);
                let next = self.hydrate_entries(id, ops.iter(), dom_parent, cursor)?;
                Ok((Some(id), next))
            }
            Op::TrackByKey(entries) => {
                validate_keys(entries)?;
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::TrackByKey));
                *created = Some(id);
                let next =
                    self.hydrate_entries(id, entries.iter().map(entry_child), dom_parent, cursor)?;
                Ok((Some(id), next))
            }
            Op::Events(e) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Mounting));
                *created = Some(id);
                let (child, next) = self.hydrate_op(Some(id), &e.child, dom_parent, cursor)?;
                self.tree[id].children = vec![child];
                let node = self.single_node(id, "Events")?;
                for (event, handler) in &e.events {
                    self.dom.add_listener(node, event, handler);
                }
                self.tree[id].state = NodeState::Events(node);
                Ok((Some(id), next))
            }
            Op::Ref(r) => {
                let id = self.tree.insert(SNode::new(op.clone(), parent, NodeState::Ref));
                *created = Some(id);
                let (child, next) = self.hydrate_op(Some(id), &r.child, dom_parent, cursor)?;
                self.tree[id].children = vec![child];
                r.node_ref.set(self.ref_node(id)?);
                Ok((Some(id), next))
            }
        }
    }

    fn hydrate_entries<'o>(
        &mut self,
        id: SNodeId,
        ops: impl Iterator<Item = &'o Op>,
        dom_parent: NodeId,
        mut cursor: Option<NodeId>,
    ) -> Result<Option<NodeId>> {
        for op in ops {
            let (child, next) = self.hydrate_op(Some(id), op, dom_parent, cursor)?;
            self.tree[id].children.push(child);
            cursor = next;
        }
        Ok(cursor)
    }
}

fn runtime_describe(dom: &dyn Dom, node: NodeId) -> String {
    runtime::describe(dom, Some(node))
}

/// Feeds child expressions of a template back into the reconciler.
struct BlockHydrator<'r, 'a> {
    rec: &'r mut Reconciler<'a>,
    id: SNodeId,
    descriptor: Rc<Descriptor>,
    values: Rc<[Value]>,
}

impl Hydrator for BlockHydrator<'_, '_> {
    fn dom(&mut self) -> &mut dyn Dom {
        &mut *self.rec.dom
    }

    fn warnings(&self) -> bool {
        self.rec.config.hydration_warnings
    }

    fn end(&self) -> Option<NodeId> {
        self.rec.hydrate_end
    }

    fn child(
        &mut self,
        input: usize,
        parent: NodeId,
        cursor: Option<NodeId>,
    ) -> Result<Option<NodeId>> {
        let op = runtime::input(&self.descriptor, &self.values, input).to_op();
        let (child, next) = self.rec.hydrate_op(Some(self.id), &op, parent, cursor)?;
        if let Some(k) = self.descriptor.child_index(input) {
            self.rec.tree[self.id].children[k] = child;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RenderConfig, UpdateMode};
    use crate::dom::MemoryDom;
    use crate::runtime::Prototypes;
    use crate::scheduler::Scheduler;
    use crate::template::TemplateCache;
    use crate::vdom::tree::Tree;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn hydrate(dom: &mut MemoryDom, container: NodeId, op: &Op) -> (Tree, Option<SNodeId>) {
        let mut tree = Tree::new();
        let mut prototypes = Prototypes::new();
        let scheduler = Scheduler::new(UpdateMode::Sync);
        let config = RenderConfig::default();
        let mut rec = Reconciler::new(dom, &mut tree, &mut prototypes, &scheduler, &config);
        rec.at(container, None);
        let id = rec.hydrate(op).unwrap();
        (tree, id)
    }

    #[test]
    fn test_hydrates_list_of_text_and_block() {
        let mut cache = TemplateCache::new();
        let block = cache.html(&["<b>", "</b>"]).unwrap().render(vec!["x".into()]);

        let mut dom = MemoryDom::new();
        let container = dom.create_element("div", false);
        let hi = dom.create_text("hi");
        let comment = dom.create_comment("");
        let b = dom.create_element("b", false);
        let x = dom.create_text("x");
        dom.append_child(b, x);
        for n in [hi, comment, b] {
            dom.append_child(container, n);
        }
        dom.reset_stats();

        let op = Op::list(vec![Op::text("hi"), block]);
        let (tree, id) = hydrate(&mut dom, container, &op);
        assert!(id.is_some());
        assert_eq!(dom.inner_html(container), "hi<b>x</b>");
        assert_eq!(dom.stats().created, 0);
        assert_eq!(dom.children(container), &[hi, b]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_repairs_missing_and_extra_nodes() {
        let mut dom = MemoryDom::new();
        let container = dom.create_element("div", false);
        let stray = dom.create_element("span", false);
        dom.append_child(container, stray);

        let op = Op::list(vec![Op::text("a")]);
        let (_, _) = hydrate(&mut dom, container, &op);
        assert_eq!(dom.inner_html(container), "a");
    }

    #[test]
    fn test_text_mismatch_is_fixed_in_place() {
        let mut dom = MemoryDom::new();
        let container = dom.create_element("div", false);
        let t = dom.create_text("old");
        dom.append_child(container, t);
        hydrate(&mut dom, container, &Op::text("new"));
        assert_eq!(dom.children(container), &[t]);
        assert_eq!(dom.text(t), Some("new"));
    }

    #[test]
    fn test_void_element_with_child_slot_is_rejected() {
        let mut d = Descriptor::element("br", false);
        d.flags = crate::template::TemplateFlags::new(1, 1, false);
        d.child_ops = vec![crate::template::ChildOp::Child(0)];
        d.exprs = vec![0];
        d.arity = 1;
        let op = Op::element(Rc::new(d), vec![Value::from("x")]);

        let mut dom = MemoryDom::new();
        let container = dom.create_element("div", false);
        let br = dom.create_element("br", false);
        dom.append_child(container, br);
        let mut tree = Tree::new();
        let mut prototypes = Prototypes::new();
        let scheduler = Scheduler::new(UpdateMode::Sync);
        let config = RenderConfig::default();
        let mut rec = Reconciler::new(&mut dom, &mut tree, &mut prototypes, &scheduler, &config);
        rec.at(container, None);
        let err = rec.hydrate(&op).unwrap_err();
        assert_eq!(err, RenderError::VoidChildren { tag: "br".into() });
        assert!(tree.is_empty());
        assert_eq!(dom.inner_html(container), "");
    }

    /// Counts `warn` events.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Hydrate `"new"` over `["old", <span>]` and count the warnings.
    fn mismatch_warnings(hydration_warnings: bool) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let mut dom = MemoryDom::new();
            let container = dom.create_element("div", false);
            let old = dom.create_text("old");
            let stray = dom.create_element("span", false);
            dom.append_child(container, old);
            dom.append_child(container, stray);

            let mut tree = Tree::new();
            let mut prototypes = Prototypes::new();
            let scheduler = Scheduler::new(UpdateMode::Sync);
            let config = RenderConfig {
                hydration_warnings,
                ..RenderConfig::default()
            };
            let mut rec = Reconciler::new(&mut dom, &mut tree, &mut prototypes, &scheduler, &config);
            rec.at(container, None);
            rec.hydrate(&Op::text("new")).unwrap();
            assert_eq!(dom.inner_html(container), "new");
        });
        count.load(Ordering::Relaxed)
    }

    #[test]
    fn test_hydration_warnings_toggle() {
        assert_eq!(mismatch_warnings(false), 0);
        assert_eq!(mismatch_warnings(true), 2);
    }
}
