//! Virtual DOM - op trees, the stateful tree and the reconciler.
//!
//! ```text
//! render ──► Op tree (immutable, per render)
//!               │ patch
//!               ▼
//!            Tree of SNodes (live) ──► Dom
//! ```
//!
//! - [`op`] - the op vocabulary
//! - [`component`] - factories, the `Component` trait, handles and scopes
//! - [`context`] - typed context keys
//! - [`hooks`] - state and effect hooks
//! - `tree` / `reconciler` / `keyed` / `hydrate` - the diffing machinery,
//!   driven by [`Renderer`](crate::pipeline::Renderer)

pub mod component;
pub mod context;
pub mod hooks;
mod hydrate;
mod keyed;
pub mod op;
pub(crate) mod reconciler;
pub(crate) mod tree;

pub use component::{Component, ComponentHandle, Factory, Scope};
pub use context::ContextKey;
pub use hooks::{
    use_effect, use_effect_with_eq, use_layout_effect, use_layout_effect_with_eq, use_reducer,
    use_state, Effect, Reducer, State,
};
pub use op::{ComponentOp, ContextOp, ElementOp, EventsOp, KeyedOp, Op, RefOp};
pub use tree::{SNodeFlags, SNodeId};
