//! Renderer - owns the DOM and the stateful tree and runs flushes.
//!
//! ```text
//! render / hydrate ──► queue root render ──► flush
//! render_next_frame ─► queue root render ──► FrameHost::request_frame
//! handle.invalidate ─► queue message ─────► flush (sync) | frame (frame)
//!
//! flush pass:
//!   BeforeMutation   tasks
//!   Commit           invalidations -> dirty flags
//!                    root renders / hydrations
//!                    dirty check of flagged roots
//!                    attached / after_update hooks
//!                    mutation effects
//!   AfterMutation    tasks
//!   Layout           effects (&dyn Dom)
//! ```
//!
//! In sync mode a flush repeats passes while work keeps arriving, up to
//! `RenderConfig::max_sync_passes`. In frame mode work that arrives during
//! a flush requests the next frame instead.

use std::rc::Rc;

use tracing::{debug, debug_span, warn};

use crate::config::{self, RenderConfig, UpdateMode};
use crate::dom::{Dom, NodeId};
use crate::error::RenderError;
use crate::runtime::Prototypes;
use crate::scheduler::{FrameHost, PendingRender, Phase, Scheduler};
use crate::vdom::reconciler::{collect_dom_nodes, Reconciler};
use crate::vdom::tree::Tree;
use crate::vdom::{Op, SNodeId};

/// Handle to a root created with [`Renderer::create_root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(usize);

impl RootId {
    pub fn index(self) -> usize {
        self.0
    }
}

struct RootState {
    container: NodeId,
    /// Root content is inserted before this node.
    next: Option<NodeId>,
    node: Option<SNodeId>,
}

pub struct Renderer<D: Dom> {
    dom: D,
    tree: Tree,
    prototypes: Prototypes,
    roots: Vec<Option<RootState>>,
    scheduler: Scheduler,
    config: RenderConfig,
}

impl<D: Dom> Renderer<D> {
    /// Renderer using this thread's current [`config`](crate::config::config).
    pub fn new(dom: D) -> Self {
        Self::with_config(dom, config::config())
    }

    pub fn with_config(dom: D, config: RenderConfig) -> Self {
        Self {
            dom,
            tree: Tree::new(),
            prototypes: Prototypes::new(),
            roots: Vec::new(),
            scheduler: Scheduler::new(config.update_mode),
            config,
        }
    }

    /// Host asked for frames in frame mode and by `render_next_frame`.
    pub fn with_host(self, host: impl FrameHost + 'static) -> Self {
        self.scheduler.set_host(Rc::new(host));
        self
    }

    // =========================================================================
    // Roots
    // =========================================================================

    /// Root rendering into the end of `container`.
    pub fn create_root(&mut self, container: NodeId) -> RootId {
        self.create_root_before(container, None)
    }

    /// Root rendering into `container` before `next`.
    pub fn create_root_before(&mut self, container: NodeId, next: Option<NodeId>) -> RootId {
        self.roots.push(Some(RootState {
            container,
            next,
            node: None,
        }));
        RootId(self.roots.len() - 1)
    }

    fn check_root(&self, root: RootId) -> Result<(), RenderError> {
        match self.roots.get(root.0) {
            Some(Some(_)) => Ok(()),
            _ => Err(RenderError::UnknownRoot(root.0)),
        }
    }

    /// Render `op` into `root` and flush.
    pub fn render(&mut self, root: RootId, op: Op) -> Result<(), RenderError> {
        self.check_root(root)?;
        self.scheduler.push_render(PendingRender {
            root: root.0,
            op,
            hydrate: false,
        });
        self.flush()
    }

    /// Render `op` into `root` on the next frame.
    pub fn render_next_frame(&mut self, root: RootId, op: Op) -> Result<(), RenderError> {
        self.check_root(root)?;
        self.scheduler.push_render(PendingRender {
            root: root.0,
            op,
            hydrate: false,
        });
        self.scheduler.request_frame();
        Ok(())
    }

    /// Adopt the existing children of the root's container for `op` and
    /// flush.
    pub fn hydrate(&mut self, root: RootId, op: Op) -> Result<(), RenderError> {
        self.check_root(root)?;
        self.scheduler.push_render(PendingRender {
            root: root.0,
            op,
            hydrate: true,
        });
        self.flush()
    }

    /// Tear down everything rendered into `root` and forget the root.
    pub fn unmount(&mut self, root: RootId) -> Result<(), RenderError> {
        let state = self
            .roots
            .get_mut(root.0)
            .and_then(Option::take)
            .ok_or(RenderError::UnknownRoot(root.0))?;
        if let Some(node) = state.node {
            self.reconciler().remove(node);
        }
        debug!(root = root.0, "root unmounted");
        Ok(())
    }

    /// Top-level DOM nodes of a root, left to right.
    pub fn root_nodes(&self, root: RootId) -> Result<Vec<NodeId>, RenderError> {
        let Some(Some(state)) = self.roots.get(root.0) else {
            return Err(RenderError::UnknownRoot(root.0));
        };
        let mut nodes = Vec::new();
        if let Some(node) = state.node {
            collect_dom_nodes(&self.tree, node, &mut nodes);
        }
        Ok(nodes)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn is_frame_pending(&self) -> bool {
        self.scheduler.is_frame_pending()
    }

    /// Live SNodes across all roots.
    pub fn node_count(&self) -> usize {
        self.tree.len()
    }

    fn reconciler(&mut self) -> Reconciler<'_> {
        Reconciler::new(
            &mut self.dom,
            &mut self.tree,
            &mut self.prototypes,
            &self.scheduler,
            &self.config,
        )
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Run all queued work now. Cancels a pending frame.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        self.scheduler.cancel_frame();
        self.run_flush()
    }

    /// Frame callback: flush if a frame was requested, else do nothing.
    pub fn frame(&mut self) -> Result<(), RenderError> {
        if !self.scheduler.cancel_frame() {
            return Ok(());
        }
        self.run_flush()
    }

    fn run_flush(&mut self) -> Result<(), RenderError> {
        let span = debug_span!("flush");
        let _entered = span.enter();
        let mut result = Ok(());
        {
            let _running = self.scheduler.enter();
            let mut passes = 0;
            while self.scheduler.has_work() {
                if passes == self.config.max_sync_passes.max(1) {
                    warn!(passes, "flush pass limit reached, deferring remaining work");
                    break;
                }
                passes += 1;
                result = self.pass();
                if result.is_err() || self.scheduler.mode() == UpdateMode::Frame {
                    break;
                }
            }
            debug!(passes, "flush done");
        }
        if self.scheduler.has_work() {
            self.scheduler.request_update();
        }
        result
    }

    /// One pass through every phase. A commit error is returned after the
    /// remaining phases have run.
    fn pass(&mut self) -> Result<(), RenderError> {
        self.scheduler.set_phase(Phase::BeforeMutation);
        drain(|| self.scheduler.take_before(), |task| task());

        self.scheduler.set_phase(Phase::Commit);
        let committed = self.commit();
        drain(|| self.scheduler.take_mutation(), |task| task());

        self.scheduler.set_phase(Phase::AfterMutation);
        drain(|| self.scheduler.take_after(), |task| task());

        self.scheduler.set_phase(Phase::Layout);
        let dom: &dyn Dom = &self.dom;
        drain(|| self.scheduler.take_layout(), |task| task(dom));
        committed
    }

    /// Apply queued renders and invalidations. Every root is processed
    /// even when one fails; the first error is returned.
    fn commit(&mut self) -> Result<(), RenderError> {
        for id in self.scheduler.take_invalidated() {
            self.tree.mark_dirty(id);
        }
        let renders = self.scheduler.take_renders();

        let mut rec = Reconciler::new(
            &mut self.dom,
            &mut self.tree,
            &mut self.prototypes,
            &self.scheduler,
            &self.config,
        );
        let mut first_err = None;
        for render in renders {
            let Some(Some(root)) = self.roots.get_mut(render.root) else {
                debug!(root = render.root, "dropping render for unmounted root");
                continue;
            };
            rec.at(root.container, root.next);
            let result = if render.hydrate {
                if let Some(old) = root.node.take() {
                    rec.remove(old);
                }
                rec.hydrate(&render.op)
            } else {
                rec.render(root.node, &render.op)
            };
            match result {
                Ok(node) => {
                    root.node = node;
                    debug!(root = render.root, hydrate = render.hydrate, "root rendered");
                }
                Err(err) => {
                    if root.node.is_some_and(|node| !rec.contains(node)) {
                        root.node = None;
                    }
                    warn!(root = render.root, error = %err, "root render failed");
                    first_err.get_or_insert(err);
                }
            }
        }

        for (index, root) in self.roots.iter().enumerate() {
            let Some((root, node)) = root.as_ref().and_then(|r| Some((r, r.node?))) else {
                continue;
            };
            if rec.needs_refresh(node) {
                rec.at(root.container, root.next);
                if let Err(err) = rec.refresh(node) {
                    warn!(root = index, error = %err, "root refresh failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        rec.run_lifecycle();
        first_err.map_or(Ok(()), Err)
    }
}

/// Run queued tasks until the queue stays empty.
fn drain<T>(mut take: impl FnMut() -> Vec<T>, mut run: impl FnMut(T)) {
    loop {
        let tasks = take();
        if tasks.is_empty() {
            break;
        }
        for task in tasks {
            run(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::dom::MemoryDom;
    use crate::scheduler::ManualHost;
    use crate::types::{Cleanup, Key};
    use crate::vdom::{
        use_effect, use_state, Component, ComponentHandle, ContextKey, Effect, Factory, Scope,
        State,
    };
    use pretty_assertions::assert_eq;

    fn setup(mode: UpdateMode) -> (Renderer<MemoryDom>, RootId, NodeId) {
        let mut dom = MemoryDom::new();
        let container = dom.create_element("main", false);
        let mut renderer = Renderer::with_config(
            dom,
            RenderConfig {
                update_mode: mode,
                ..RenderConfig::default()
            },
        );
        let root = renderer.create_root(container);
        (renderer, root, container)
    }

    thread_local! {
        static HANDLES: RefCell<Vec<ComponentHandle>> = const { RefCell::new(Vec::new()) };
    }

    /// Renders a shared counter; its handle is published for the test.
    struct Counter {
        value: Rc<Cell<u32>>,
    }

    impl Component for Counter {
        type Props = Rc<Cell<u32>>;

        fn create(props: &Self::Props, handle: &ComponentHandle) -> Self {
            HANDLES.with(|h| h.borrow_mut().push(handle.clone()));
            Self {
                value: props.clone(),
            }
        }

        fn render(&mut self, _props: &Self::Props, _scope: &Scope<'_>) -> Op {
            Op::text(self.value.get().to_string())
        }
    }

    fn last_handle() -> ComponentHandle {
        HANDLES.with(|h| h.borrow().last().cloned()).unwrap()
    }

    #[test]
    fn test_render_and_unmount() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        r.render(root, Op::list(vec![Op::text("a"), Op::text("b")])).unwrap();
        assert_eq!(r.dom().inner_html(container), "ab");
        assert_eq!(r.root_nodes(root).unwrap().len(), 2);
        r.unmount(root).unwrap();
        assert_eq!(r.dom().inner_html(container), "");
        assert_eq!(r.node_count(), 0);
        assert_eq!(r.render(root, Op::Hole), Err(RenderError::UnknownRoot(0)));
    }

    #[test]
    fn test_root_before_marker() {
        let (mut r, _, container) = setup(UpdateMode::Sync);
        let marker = r.dom_mut().create_comment("end");
        r.dom_mut().append_child(container, marker);
        let root = r.create_root_before(container, Some(marker));
        r.render(root, Op::text("x")).unwrap();
        assert_eq!(r.dom().inner_html(container), "x<!--end-->");
    }

    #[test]
    fn test_sync_invalidation_waits_for_flush() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        let value = Rc::new(Cell::new(1));
        let counter = Factory::stateful::<Counter>("Counter");
        r.render(root, counter.op(value.clone())).unwrap();
        assert_eq!(r.dom().inner_html(container), "1");

        value.set(2);
        last_handle().invalidate();
        assert!(r.scheduler().is_sync_pending());
        assert_eq!(r.dom().inner_html(container), "1");
        r.flush().unwrap();
        assert_eq!(r.dom().inner_html(container), "2");
        assert!(!r.scheduler().is_sync_pending());
    }

    #[test]
    fn test_frame_mode_invalidation_requests_frame() {
        let host = ManualHost::new();
        let (r, root, container) = setup(UpdateMode::Frame);
        let mut r = r.with_host(host.clone());
        let value = Rc::new(Cell::new(1));
        r.render(root, Factory::stateful::<Counter>("Counter").op(value.clone()))
            .unwrap();

        value.set(5);
        last_handle().invalidate();
        last_handle().invalidate();
        assert_eq!(host.requests(), 1);
        assert!(r.is_frame_pending());
        r.frame().unwrap();
        assert_eq!(r.dom().inner_html(container), "5");
        assert!(!r.is_frame_pending());
        // A frame without a request does nothing.
        r.frame().unwrap();
    }

    #[test]
    fn test_sync_flush_cancels_pending_frame() {
        let host = ManualHost::new();
        let (r, root, container) = setup(UpdateMode::Sync);
        let mut r = r.with_host(host.clone());
        r.render_next_frame(root, Op::text("later")).unwrap();
        assert!(r.is_frame_pending());
        assert_eq!(r.dom().inner_html(container), "");
        r.flush().unwrap();
        assert!(!r.is_frame_pending());
        assert_eq!(r.dom().inner_html(container), "later");
    }

    #[test]
    fn test_memo_skips_equal_props_but_sees_dirty_children() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        let renders = Rc::new(Cell::new(0));
        let count = renders.clone();
        let counter = Factory::stateful::<Counter>("Counter");
        let value = Rc::new(Cell::new(1));
        let inner = counter.op(value.clone());
        let outer = Factory::stateless("Outer", move |n: &u32, _| {
            count.set(count.get() + 1);
            Op::list(vec![Op::text(n.to_string()), inner.clone()])
        })
        .memo();

        r.render(root, outer.op(1)).unwrap();
        r.render(root, outer.op(1)).unwrap();
        assert_eq!(renders.get(), 1);

        value.set(7);
        last_handle().invalidate();
        r.flush().unwrap();
        assert_eq!(renders.get(), 1);
        assert_eq!(r.dom().inner_html(container), "17");
    }

    #[test]
    fn test_context_visible_during_dirty_check() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        let theme = ContextKey::<&'static str>::new();

        struct Reader {
            key: ContextKey<&'static str>,
        }
        impl Component for Reader {
            type Props = ContextKey<&'static str>;
            fn create(props: &Self::Props, handle: &ComponentHandle) -> Self {
                HANDLES.with(|h| h.borrow_mut().push(handle.clone()));
                Self { key: *props }
            }
            fn render(&mut self, _: &Self::Props, scope: &Scope<'_>) -> Op {
                Op::text(scope.context(&self.key).unwrap_or("none"))
            }
        }

        let reader = Factory::stateful::<Reader>("Reader");
        r.render(root, theme.provide("dark", reader.op(theme))).unwrap();
        assert_eq!(r.dom().inner_html(container), "dark");
        last_handle().invalidate();
        r.flush().unwrap();
        assert_eq!(r.dom().inner_html(container), "dark");
    }

    #[test]
    fn test_effects_run_after_dom_and_clean_up() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        let log = Rc::new(RefCell::new(Vec::<String>::new()));

        struct Logger {
            effect: Effect<u32>,
        }
        thread_local! {
            static LOG: RefCell<Option<Rc<RefCell<Vec<String>>>>> = const { RefCell::new(None) };
        }
        impl Component for Logger {
            type Props = u32;
            fn create(_: &u32, handle: &ComponentHandle) -> Self {
                let log = LOG.with(|l| l.borrow().clone()).unwrap();
                let effect = use_effect(handle, move |n: &u32| {
                    log.borrow_mut().push(format!("effect {n}"));
                    let log = log.clone();
                    let n = *n;
                    Some(Box::new(move || log.borrow_mut().push(format!("cleanup {n}"))) as Cleanup)
                });
                Self { effect }
            }
            fn render(&mut self, n: &u32, _: &Scope<'_>) -> Op {
                self.effect.run(n);
                Op::text(n.to_string())
            }
        }

        LOG.with(|l| *l.borrow_mut() = Some(log.clone()));
        let logger = Factory::stateful::<Logger>("Logger");
        r.render(root, logger.op(1)).unwrap();
        r.render(root, logger.op(2)).unwrap();
        r.render(root, Op::Hole).unwrap();
        assert_eq!(r.dom().inner_html(container), "");
        assert_eq!(
            *log.borrow(),
            vec!["effect 1", "cleanup 1", "effect 2", "cleanup 2"]
        );
    }

    #[test]
    fn test_runaway_invalidation_is_bounded() {
        let mut dom = MemoryDom::new();
        let container = dom.create_element("main", false);
        let mut r = Renderer::with_config(
            dom,
            RenderConfig {
                max_sync_passes: 3,
                ..RenderConfig::default()
            },
        );
        let root = r.create_root(container);
        let renders = Rc::new(Cell::new(0));
        let count = renders.clone();
        let looping = Factory::stateless("Loop", move |_: &(), scope| {
            count.set(count.get() + 1);
            scope.invalidate();
            Op::Hole
        });
        r.render(root, looping.op(())).unwrap();
        assert_eq!(renders.get(), 3);
        assert!(r.scheduler().is_sync_pending());
    }

    fn dup_keys() -> Op {
        Op::keyed_list([1, 1], |n| *n, |n| Op::text(n.to_string()))
    }

    #[test]
    fn test_hydrate_keeps_end_marker() {
        let (mut r, _, container) = setup(UpdateMode::Sync);
        let a = r.dom_mut().create_text("a");
        let marker = r.dom_mut().create_comment("end");
        r.dom_mut().append_child(container, a);
        r.dom_mut().append_child(container, marker);
        let root = r.create_root_before(container, Some(marker));

        r.hydrate(root, Op::list(vec![Op::text("a"), Op::text("b")])).unwrap();
        assert_eq!(r.dom().inner_html(container), "ab<!--end-->");
        assert_eq!(r.dom().parent(marker), Some(container));
        assert_eq!(r.dom().first_child(container), Some(a));

        r.render(root, Op::list(vec![Op::text("a"), Op::text("c"), Op::text("d")]))
            .unwrap();
        assert_eq!(r.dom().inner_html(container), "acd<!--end-->");
    }

    #[test]
    fn test_hydrate_removes_leftovers_only_up_to_end_marker() {
        let (mut r, _, container) = setup(UpdateMode::Sync);
        let a = r.dom_mut().create_text("a");
        let stray = r.dom_mut().create_element("span", false);
        let marker = r.dom_mut().create_comment("end");
        let tail = r.dom_mut().create_text("tail");
        for node in [a, stray, marker, tail] {
            r.dom_mut().append_child(container, node);
        }
        let root = r.create_root_before(container, Some(marker));

        r.hydrate(root, Op::text("a")).unwrap();
        assert_eq!(r.dom().inner_html(container), "a<!--end-->tail");
        assert_eq!(r.dom().children(container), &[a, marker, tail]);
    }

    #[test]
    fn test_failed_hydration_clears_its_range() {
        let (mut r, _, container) = setup(UpdateMode::Sync);
        let a = r.dom_mut().create_text("a");
        let marker = r.dom_mut().create_comment("end");
        r.dom_mut().append_child(container, a);
        r.dom_mut().append_child(container, marker);
        let root = r.create_root_before(container, Some(marker));

        let err = r.hydrate(root, Op::list(vec![Op::text("a"), dup_keys()]));
        assert_eq!(err, Err(RenderError::DuplicateKey { key: Key::Int(1) }));
        assert_eq!(r.dom().inner_html(container), "<!--end-->");
        assert_eq!(r.node_count(), 0);

        r.render(root, Op::text("b")).unwrap();
        assert_eq!(r.dom().inner_html(container), "b<!--end-->");
    }

    #[test]
    fn test_failing_root_does_not_block_other_roots() {
        let host = ManualHost::new();
        let (r, first, container) = setup(UpdateMode::Sync);
        let mut r = r.with_host(host);
        let aside = r.dom_mut().create_element("aside", false);
        let second = r.create_root(aside);
        let after = Rc::new(Cell::new(false));
        let flag = after.clone();

        r.render_next_frame(first, dup_keys()).unwrap();
        r.render_next_frame(second, Op::text("two")).unwrap();
        r.scheduler().schedule_after_mutation(move || flag.set(true));

        assert_eq!(r.frame(), Err(RenderError::DuplicateKey { key: Key::Int(1) }));
        assert_eq!(r.dom().inner_html(aside), "two");
        assert_eq!(r.dom().inner_html(container), "");
        assert!(after.get());
        assert!(!r.scheduler().has_work());
    }

    #[test]
    fn test_failed_mount_leaves_nothing_behind() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        let err = r.render(root, Op::list(vec![dup_keys(), Op::text("a")]));
        assert_eq!(err, Err(RenderError::DuplicateKey { key: Key::Int(1) }));
        assert_eq!(r.dom().inner_html(container), "");
        assert_eq!(r.node_count(), 0);

        r.render(root, Op::text("b")).unwrap();
        assert_eq!(r.dom().inner_html(container), "b");
        assert_eq!(r.node_count(), 1);
    }

    #[test]
    fn test_failed_list_update_keeps_children_owned() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        r.render(root, Op::list(vec![Op::text("x")])).unwrap();
        let err = r.render(root, Op::list(vec![Op::text("y"), dup_keys()]));
        assert!(err.is_err());
        assert_eq!(r.dom().inner_html(container), "x");

        r.render(root, Op::text("b")).unwrap();
        assert_eq!(r.dom().inner_html(container), "b");
        assert_eq!(r.node_count(), 1);
    }

    #[test]
    fn test_failed_keyed_update_is_remounted_next_render() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        let list = |keys: &[u32]| {
            Op::keyed_list(keys.iter().copied(), |n| *n, |n| match *n {
                3 => Op::events(vec![], Op::Hole),
                n => Op::text(n.to_string()),
            })
        };
        r.render(root, list(&[1, 2])).unwrap();
        let err = r.render(root, list(&[1, 2, 3]));
        assert_eq!(err, Err(RenderError::MultiRoot { wrapper: "Events", found: 0 }));
        assert_eq!(r.dom().inner_html(container), "");
        assert_eq!(r.node_count(), 1);

        r.render(root, list(&[2, 1])).unwrap();
        assert_eq!(r.dom().inner_html(container), "21");
        assert_eq!(r.node_count(), 3);
    }

    /// Publishes its state so the test can write to it.
    struct Toggle {
        on: State<bool>,
    }

    impl Component for Toggle {
        type Props = Rc<RefCell<Option<State<bool>>>>;

        fn create(slot: &Self::Props, handle: &ComponentHandle) -> Self {
            let on = use_state(handle, false);
            *slot.borrow_mut() = Some(on.clone());
            Self { on }
        }

        fn render(&mut self, _: &Self::Props, _: &Scope<'_>) -> Op {
            Op::text(if self.on.get() { "on" } else { "off" })
        }
    }

    #[test]
    fn test_state_hook_rerenders_on_change() {
        let (mut r, root, container) = setup(UpdateMode::Sync);
        let slot = Rc::new(RefCell::new(None));
        r.render(root, Factory::stateful::<Toggle>("Toggle").op(slot.clone()))
            .unwrap();
        assert_eq!(r.dom().inner_html(container), "off");
        let on = slot.borrow().clone().unwrap();

        on.set(false);
        assert!(!r.scheduler().is_sync_pending());

        on.set(true);
        assert!(r.scheduler().is_sync_pending());
        assert_eq!(r.dom().inner_html(container), "off");
        r.flush().unwrap();
        assert_eq!(r.dom().inner_html(container), "on");

        on.update(|v| !v);
        r.flush().unwrap();
        assert_eq!(r.dom().inner_html(container), "off");
    }
}
