//! # spark-dom
//!
//! Declarative DOM rendering engine.
//!
//! ## Architecture
//!
//! UI is described by interpolated templates that compile once into
//! descriptors, and by an immutable op tree rebuilt on every render. The
//! reconciler diffs each new op tree against the live stateful tree and
//! applies the minimum DOM mutations through the [`Dom`](dom::Dom)
//! capability. A scheduler batches invalidations and effects into phased
//! flushes.
//!
//! ```text
//! statics ──► template::{markup,indent} ──► TemplateIr ──► compiler ──► Descriptor
//!                                                                         │
//! Template::render(values) / Factory::op(props) / Op::* ──► Op tree ◄─────┘
//!                                                              │
//!                  Renderer ──► Scheduler ──► Reconciler ──► runtime ──► Dom
//! ```
//!
//! ## Modules
//!
//! - [`template`] - template parsers, compiler and cache
//! - [`runtime`] - instantiate, patch and adopt compiled templates
//! - [`vdom`] - op tree, components, hooks, context and the reconciler
//! - [`scheduler`] - effect queues, phases and frame requests
//! - [`pipeline`] - the [`Renderer`]
//! - [`dom`] - the DOM capability and an in-memory implementation
//! - [`config`] - per-thread render configuration
//!
//! ## Example
//!
//! ```ignore
//! use spark_dom::{MemoryDom, Renderer, TemplateCache};
//!
//! let mut cache = TemplateCache::new();
//! let mut dom = MemoryDom::new();
//! let container = dom.create_element("main", false);
//! let mut renderer = Renderer::new(dom);
//! let root = renderer.create_root(container);
//!
//! let op = cache.html(&["<p class=", ">", "</p>"])?.render(vec!["note".into(), "hi".into()]);
//! renderer.render(root, op)?;
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod pipeline;
pub mod runtime;
pub mod scheduler;
pub mod template;
pub mod types;
pub mod vdom;

pub use types::*;

pub use config::{RenderConfig, UpdateMode};
pub use dom::{Dom, Journal, MemoryDom, MutationStats, NodeId, NodeKind};
pub use error::{CompileError, ParseError, RenderError, TemplateError};
pub use pipeline::{Renderer, RootId};
pub use scheduler::{FrameHost, ManualHost, Phase, Scheduler};
pub use template::{htm, htm_svg, html, svg, Descriptor, Syntax, Template, TemplateCache};
pub use vdom::{
    use_effect, use_effect_with_eq, use_layout_effect, use_layout_effect_with_eq, use_reducer,
    use_state, Component, ComponentHandle, ContextKey, Effect, Factory, Op, Reducer, Scope, State,
};
