//! Context - values provided to a subtree.
//!
//! A context value is only visible while the reconciler is inside the
//! providing `Op::Context`; the stack is rebuilt on every descent, so
//! dirty-checking a component deep in the tree still sees the values of
//! its ancestors.

use std::any::Any;
use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use super::op::{ContextOp, Op};

thread_local! {
    /// Counter for context key ids.
    static NEXT_CONTEXT_ID: Cell<usize> = const { Cell::new(0) };
}

/// Typed context key. Keys are compared by id, so every `ContextKey::new`
/// creates an independent context.
pub struct ContextKey<T> {
    id: usize,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T: 'static> ContextKey<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let id = NEXT_CONTEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        Self {
            id,
            _value: PhantomData,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Provide `value` to everything rendered inside `child`.
    pub fn provide(&self, value: T, child: Op) -> Op {
        Op::Context(Rc::new(ContextOp {
            id: self.id,
            value: Rc::new(value),
            child,
        }))
    }
}

/// Values of the providers enclosing the current position.
#[derive(Default)]
pub(crate) struct ContextStack {
    entries: Vec<(usize, Rc<dyn Any>)>,
}

impl ContextStack {
    pub fn push(&mut self, id: usize, value: Rc<dyn Any>) {
        self.entries.push((id, value));
    }

    pub fn pop(&mut self) {
        self.entries.pop();
    }

    /// Innermost value for `id`.
    pub fn get<T: Clone + 'static>(&self, id: usize) -> Option<T> {
        self.entries
            .iter()
            .rev()
            .find(|(entry, _)| *entry == id)
            .and_then(|(_, value)| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
