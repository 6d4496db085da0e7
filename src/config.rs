//! Render Configuration - Per-thread defaults for new renderers.
//!
//! A renderer snapshots the current configuration when it is created with
//! [`Renderer::new`](crate::pipeline::Renderer::new); later changes only
//! affect renderers created afterwards.
//!
//! # Example
//!
//! ```ignore
//! use spark_dom::config::{self, RenderConfig, UpdateMode};
//!
//! config::set_config(RenderConfig {
//!     update_mode: UpdateMode::Frame,
//!     ..RenderConfig::default()
//! });
//! ```

use std::cell::RefCell;

/// How component invalidations are flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Invalidations wait for the next explicit `flush()`/`render()` call
    /// and are drained within that call.
    #[default]
    Sync,
    /// Invalidations request an animation frame from the frame host.
    Frame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub update_mode: UpdateMode,
    /// Log hydration mismatches at `warn` level.
    pub hydration_warnings: bool,
    /// Upper bound on commit passes per synchronous flush. Work queued by
    /// the last allowed pass is left for the next flush.
    pub max_sync_passes: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            update_mode: UpdateMode::Sync,
            hydration_warnings: true,
            max_sync_passes: 64,
        }
    }
}

// =============================================================================
// Thread-local current config
// =============================================================================

thread_local! {
    static CONFIG: RefCell<RenderConfig> = RefCell::new(RenderConfig::default());
}

/// Current configuration for this thread.
pub fn config() -> RenderConfig {
    CONFIG.with(|c| c.borrow().clone())
}

pub fn set_config(config: RenderConfig) {
    CONFIG.with(|c| *c.borrow_mut() = config);
}

/// Restore the default configuration (for testing).
pub fn reset_config() {
    set_config(RenderConfig::default());
}
