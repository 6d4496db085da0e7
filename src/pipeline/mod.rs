//! Rendering pipeline.
//!
//! ```text
//! Op ──► Renderer::render ──► Scheduler queue ──► flush passes
//!                                                   │
//!                                  Reconciler ◄─────┘ (commit phase)
//!                                      │
//!                                      ▼
//!                                    Dom
//! ```
//!
//! The [`Renderer`] is the only entry point that mutates the DOM; every
//! other part of the crate either describes UI (templates, ops) or queues
//! work for it (component handles, effects).

mod renderer;

pub use renderer::{Renderer, RootId};
