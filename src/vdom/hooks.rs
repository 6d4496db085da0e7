//! Hooks for stateful components: local state and effects.
//!
//! [`State`] and [`Reducer`] hold a value owned by one component; writing
//! a different value invalidates the component.
//!
//! An [`Effect`] is created once (usually in `Component::create`) and run
//! from `render` with the current props. Running only schedules: the
//! hook fires once per flush in its phase, after the DOM writes of the
//! render that queued it.
//!
//! ```text
//! render ─► effect.run(props) ─► props changed? ─► queue (once)
//!                                                    │
//!   flush: Commit ──► use_effect hooks               ▼
//!          Layout ──► use_layout_effect hooks   prev cleanup ─► hook
//! unmount ──────────► last cleanup
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::component::ComponentHandle;
use crate::dom::Dom;
use crate::types::Cleanup;

type EffectFn<P> = Box<dyn Fn(&P) -> Option<Cleanup>>;
type LayoutFn<P> = Box<dyn Fn(&P, &dyn Dom) -> Option<Cleanup>>;
type EqFn<P> = Box<dyn Fn(&P, &P) -> bool>;

enum Hook<P> {
    Mutation(EffectFn<P>),
    Layout(LayoutFn<P>),
}

struct EffectInner<P> {
    handle: ComponentHandle,
    hook: Hook<P>,
    eq: Option<EqFn<P>>,
    props: RefCell<Option<P>>,
    /// Props the hook last ran with, for the eq check.
    last: RefCell<Option<P>>,
    cleanup: RefCell<Option<Cleanup>>,
    scheduled: Cell<bool>,
}

/// Effect runner bound to one component.
pub struct Effect<P: 'static> {
    inner: Rc<EffectInner<P>>,
}

impl<P: 'static> Clone for Effect<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Effect that runs in the commit phase, after DOM mutations.
pub fn use_effect<P: Clone + 'static>(
    handle: &ComponentHandle,
    hook: impl Fn(&P) -> Option<Cleanup> + 'static,
) -> Effect<P> {
    Effect::new(handle, Hook::Mutation(Box::new(hook)), None)
}

/// Like [`use_effect`], skipped while `eq(prev, next)` holds.
pub fn use_effect_with_eq<P: Clone + 'static>(
    handle: &ComponentHandle,
    hook: impl Fn(&P) -> Option<Cleanup> + 'static,
    eq: impl Fn(&P, &P) -> bool + 'static,
) -> Effect<P> {
    Effect::new(handle, Hook::Mutation(Box::new(hook)), Some(Box::new(eq)))
}

/// Effect that runs in the layout phase with read access to the DOM.
pub fn use_layout_effect<P: Clone + 'static>(
    handle: &ComponentHandle,
    hook: impl Fn(&P, &dyn Dom) -> Option<Cleanup> + 'static,
) -> Effect<P> {
    Effect::new(handle, Hook::Layout(Box::new(hook)), None)
}

pub fn use_layout_effect_with_eq<P: Clone + 'static>(
    handle: &ComponentHandle,
    hook: impl Fn(&P, &dyn Dom) -> Option<Cleanup> + 'static,
    eq: impl Fn(&P, &P) -> bool + 'static,
) -> Effect<P> {
    Effect::new(handle, Hook::Layout(Box::new(hook)), Some(Box::new(eq)))
}

impl<P: Clone + 'static> Effect<P> {
    fn new(handle: &ComponentHandle, hook: Hook<P>, eq: Option<EqFn<P>>) -> Self {
        let inner = Rc::new(EffectInner {
            handle: handle.clone(),
            hook,
            eq,
            props: RefCell::new(None),
            last: RefCell::new(None),
            cleanup: RefCell::new(None),
            scheduled: Cell::new(false),
        });
        let weak: Weak<EffectInner<P>> = Rc::downgrade(&inner);
        handle.on_cleanup(move || {
            if let Some(inner) = weak.upgrade() {
                let cleanup = inner.cleanup.borrow_mut().take();
                if let Some(cleanup) = cleanup {
                    cleanup();
                }
            }
        });
        Self { inner }
    }

    /// Queue the hook with `props`. Skipped when the eq predicate says the
    /// props did not change since the last run.
    pub fn run(&self, props: &P) {
        let inner = &self.inner;
        if let Some(eq) = &inner.eq {
            if let Some(last) = inner.last.borrow().as_ref() {
                if eq(last, props) {
                    return;
                }
            }
        }
        *inner.props.borrow_mut() = Some(props.clone());
        if inner.scheduled.replace(true) {
            return;
        }

        let scheduler = inner.handle.scheduler().clone();
        match inner.hook {
            Hook::Mutation(_) => {
                let effect = self.clone();
                scheduler.schedule_mutation_effect(move || effect.fire(None));
            }
            Hook::Layout(_) => {
                let effect = self.clone();
                scheduler.schedule_layout_effect(move |dom| effect.fire(Some(dom)));
            }
        }
    }

    fn fire(&self, dom: Option<&dyn Dom>) {
        let inner = &self.inner;
        inner.scheduled.set(false);
        if !inner.handle.is_mounted() {
            return;
        }
        let Some(props) = inner.props.borrow_mut().take() else {
            return;
        };
        let previous = inner.cleanup.borrow_mut().take();
        if let Some(cleanup) = previous {
            cleanup();
        }
        let cleanup = match (&inner.hook, dom) {
            (Hook::Mutation(hook), _) => hook(&props),
            (Hook::Layout(hook), Some(dom)) => hook(&props, dom),
            (Hook::Layout(_), None) => None,
        };
        *inner.cleanup.borrow_mut() = cleanup;
        *inner.last.borrow_mut() = Some(props);
    }
}

// =============================================================================
// State
// =============================================================================

struct StateInner<S> {
    handle: ComponentHandle,
    value: RefCell<S>,
}

impl<S: PartialEq> StateInner<S> {
    /// Store `next`; invalidates when it differs from the current value.
    fn replace(&self, next: S) {
        let changed = *self.value.borrow() != next;
        if changed {
            *self.value.borrow_mut() = next;
            self.handle.invalidate();
        }
    }
}

/// Component-local value. Clones share the value.
pub struct State<S: 'static> {
    inner: Rc<StateInner<S>>,
}

impl<S: 'static> Clone for State<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Local state starting at `initial`.
pub fn use_state<S: PartialEq + 'static>(handle: &ComponentHandle, initial: S) -> State<S> {
    State {
        inner: Rc::new(StateInner {
            handle: handle.clone(),
            value: RefCell::new(initial),
        }),
    }
}

impl<S: PartialEq + 'static> State<S> {
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value. The component re-renders only if it changed.
    pub fn set(&self, next: S) {
        self.inner.replace(next);
    }

    /// Compute the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&S) -> S) {
        let next = f(&self.inner.value.borrow());
        self.inner.replace(next);
    }
}

/// State changed through actions.
pub struct Reducer<S: 'static, A: 'static> {
    state: State<S>,
    reduce: Rc<dyn Fn(&S, A) -> S>,
}

impl<S: 'static, A: 'static> Clone for Reducer<S, A> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            reduce: self.reduce.clone(),
        }
    }
}

/// Local state starting at `initial`, advanced by `reduce`.
pub fn use_reducer<S: PartialEq + 'static, A: 'static>(
    handle: &ComponentHandle,
    initial: S,
    reduce: impl Fn(&S, A) -> S + 'static,
) -> Reducer<S, A> {
    Reducer {
        state: use_state(handle, initial),
        reduce: Rc::new(reduce),
    }
}

impl<S: PartialEq + 'static, A: 'static> Reducer<S, A> {
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.state.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.state.with(f)
    }

    /// Apply `action`; the component re-renders if the state changed.
    pub fn dispatch(&self, action: A) {
        let reduce = &self.reduce;
        self.state.update(|state| reduce(state, action));
    }
}
