//! Components - stateless render closures and stateful instances.
//!
//! A [`Factory`] is the identity of a component type: two component ops
//! patch each other only if they were built from the same factory. The
//! reconciler only ever sees the type-erased [`Instance`] table, so
//! props travel as `Rc<dyn Any>` and are downcast at the boundary.
//!
//! ```text
//! Factory<P> ──op(props)──► Op::Component ──mount──► Box<dyn Instance>
//!                                                     ├─ Stateless<P>
//!                                                     └─ Stateful<C>
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use super::context::{ContextKey, ContextStack};
use super::op::{ComponentOp, Op};
use super::tree::SNodeId;
use crate::scheduler::Scheduler;
use crate::types::Cleanup;

// =============================================================================
// Component trait
// =============================================================================

/// Stateful component. `create` runs once per mount; `render` on mount,
/// on invalidation and when props change.
pub trait Component: 'static {
    type Props: 'static;

    fn create(props: &Self::Props, handle: &ComponentHandle) -> Self
    where
        Self: Sized;

    fn render(&mut self, props: &Self::Props, scope: &Scope<'_>) -> Op;

    /// Called when new props arrive; returning `false` keeps the last
    /// render and only dirty-checks the subtree.
    fn should_update(&self, _prev: &Self::Props, _next: &Self::Props) -> bool {
        true
    }

    /// After the first render is in the DOM.
    fn attached(&mut self) {}

    /// Before the component's DOM is removed.
    fn detached(&mut self) {}

    fn before_update(&mut self) {}

    fn after_update(&mut self) {}
}

/// Object-safe view of a component instance.
pub(crate) trait Instance {
    fn render(&mut self, props: &dyn Any, scope: &Scope<'_>) -> Op;
    fn should_update(&self, prev: &dyn Any, next: &dyn Any) -> bool;
    fn attached(&mut self);
    fn detached(&mut self);
    fn before_update(&mut self);
    fn after_update(&mut self);
}

struct Stateful<C>(C);

impl<C: Component> Instance for Stateful<C> {
    fn render(&mut self, props: &dyn Any, scope: &Scope<'_>) -> Op {
        match props.downcast_ref::<C::Props>() {
            Some(props) => self.0.render(props, scope),
            None => Op::Hole,
        }
    }

    fn should_update(&self, prev: &dyn Any, next: &dyn Any) -> bool {
        match (prev.downcast_ref::<C::Props>(), next.downcast_ref::<C::Props>()) {
            (Some(prev), Some(next)) => self.0.should_update(prev, next),
            _ => true,
        }
    }

    fn attached(&mut self) {
        self.0.attached();
    }

    fn detached(&mut self) {
        self.0.detached();
    }

    fn before_update(&mut self) {
        self.0.before_update();
    }

    fn after_update(&mut self) {
        self.0.after_update();
    }
}

type RenderFn<P> = Rc<dyn Fn(&P, &Scope<'_>) -> Op>;

struct Stateless<P: 'static>(RenderFn<P>);

impl<P: 'static> Instance for Stateless<P> {
    fn render(&mut self, props: &dyn Any, scope: &Scope<'_>) -> Op {
        match props.downcast_ref::<P>() {
            Some(props) => (self.0)(props, scope),
            None => Op::Hole,
        }
    }

    fn should_update(&self, _prev: &dyn Any, _next: &dyn Any) -> bool {
        true
    }

    fn attached(&mut self) {}
    fn detached(&mut self) {}
    fn before_update(&mut self) {}
    fn after_update(&mut self) {}
}

// =============================================================================
// Factory
// =============================================================================

type CreateFn = Rc<dyn Fn(&dyn Any, &ComponentHandle) -> Box<dyn Instance>>;
type PropsEqFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

pub(crate) struct FactoryInner {
    pub name: &'static str,
    pub create: CreateFn,
    pub props_eq: Option<PropsEqFn>,
}

/// Component type identity plus its constructor.
pub struct Factory<P> {
    inner: Rc<FactoryInner>,
    _props: PhantomData<fn(P)>,
}

impl<P> Clone for Factory<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _props: PhantomData,
        }
    }
}

impl<P: 'static> Factory<P> {
    /// Component that is just a render function of its props.
    pub fn stateless(name: &'static str, render: impl Fn(&P, &Scope<'_>) -> Op + 'static) -> Self {
        let render: RenderFn<P> = Rc::new(render);
        Self::from_inner(FactoryInner {
            name,
            create: Rc::new(move |_: &dyn Any, _: &ComponentHandle| {
                Box::new(Stateless(render.clone())) as Box<dyn Instance>
            }),
            props_eq: None,
        })
    }

    /// Component backed by a [`Component`] instance.
    pub fn stateful<C: Component<Props = P>>(name: &'static str) -> Self {
        Self::from_inner(FactoryInner {
            name,
            create: Rc::new(|props: &dyn Any, handle: &ComponentHandle| match props.downcast_ref::<P>() {
                Some(props) => Box::new(Stateful(C::create(props, handle))) as Box<dyn Instance>,
                // Props are only ever built through `Factory::op`.
                None => unreachable!("component props of the wrong type"),
            }),
            props_eq: None,
        })
    }

    /// Skip re-rendering when new props equal the previous ones under `eq`.
    /// The result is a new component type.
    pub fn with_props_eq(&self, eq: impl Fn(&P, &P) -> bool + 'static) -> Self {
        self.with_erased_eq(Rc::new(move |a: &dyn Any, b: &dyn Any| {
            match (a.downcast_ref::<P>(), b.downcast_ref::<P>()) {
                (Some(a), Some(b)) => eq(a, b),
                _ => false,
            }
        }))
    }

    fn with_erased_eq(&self, eq: PropsEqFn) -> Self {
        Self::from_inner(FactoryInner {
            name: self.inner.name,
            create: self.inner.create.clone(),
            props_eq: Some(eq),
        })
    }

    fn from_inner(inner: FactoryInner) -> Self {
        Self {
            inner: Rc::new(inner),
            _props: PhantomData,
        }
    }

    pub fn op(&self, props: P) -> Op {
        Op::Component(Rc::new(ComponentOp {
            factory: self.inner.clone(),
            props: Rc::new(props),
        }))
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn same(&self, other: &Factory<P>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<P: PartialEq + 'static> Factory<P> {
    /// Skip re-rendering on `==` props.
    pub fn memo(&self) -> Self {
        self.with_props_eq(|a, b| a == b)
    }
}

// =============================================================================
// Live state
// =============================================================================

pub(crate) struct ComponentState {
    pub instance: Box<dyn Instance>,
    pub handle: ComponentHandle,
}

struct HandleInner {
    node: SNodeId,
    scheduler: Scheduler,
    alive: Cell<bool>,
    cleanups: RefCell<Vec<Cleanup>>,
    name: &'static str,
}

/// Handle given to a component instance: invalidation and cleanup
/// registration. Cheap to clone; stays valid (but inert) after unmount.
#[derive(Clone)]
pub struct ComponentHandle(Rc<HandleInner>);

impl ComponentHandle {
    pub(crate) fn new(node: SNodeId, scheduler: &Scheduler, name: &'static str) -> Self {
        Self(Rc::new(HandleInner {
            node,
            scheduler: scheduler.clone(),
            alive: Cell::new(true),
            cleanups: RefCell::new(Vec::new()),
            name,
        }))
    }

    /// Re-render this component on the next flush.
    pub fn invalidate(&self) {
        if self.0.alive.get() {
            self.0.scheduler.invalidate(self.0.node);
        }
    }

    /// Run `cleanup` when the component is unmounted. Registered after
    /// unmount, it runs immediately.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        if self.0.alive.get() {
            self.0.cleanups.borrow_mut().push(Box::new(cleanup));
        } else {
            cleanup();
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.0.scheduler
    }

    pub fn is_mounted(&self) -> bool {
        self.0.alive.get()
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    pub(crate) fn node(&self) -> SNodeId {
        self.0.node
    }

    /// Run cleanups in registration order and mark the handle dead.
    pub(crate) fn teardown(&self) {
        self.0.alive.set(false);
        let cleanups = std::mem::take(&mut *self.0.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
    }
}

/// What a component sees while rendering.
pub struct Scope<'a> {
    handle: &'a ComponentHandle,
    context: &'a ContextStack,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(handle: &'a ComponentHandle, context: &'a ContextStack) -> Self {
        Self { handle, context }
    }

    pub fn handle(&self) -> &ComponentHandle {
        self.handle
    }

    /// Innermost provided value of `key`.
    pub fn context<T: Clone + 'static>(&self, key: &ContextKey<T>) -> Option<T> {
        self.context.get(key.id())
    }

    pub fn invalidate(&self) {
        self.handle.invalidate();
    }
}
