//! Scheduler - effect queues and flush phases.
//!
//! ```text
//! flush ──► BeforeMutation   tasks that must see the old DOM
//!       ──► Commit           root renders, dirty check, attached /
//!                            after_update hooks, mutation effects
//!       ──► AfterMutation    tasks that run after every DOM write
//!       ──► Layout           read-only effects (&dyn Dom)
//! ```
//!
//! The scheduler never touches the tree itself. Component handles and
//! effects only push messages onto the shared queue; the renderer drains
//! it on the next flush. A flush is triggered synchronously
//! (`Renderer::flush`) or on the next frame (`FrameHost::request_frame`,
//! then `Renderer::frame`). A synchronous flush cancels a pending frame.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bitflags::bitflags;
use tracing::{trace, warn};

use crate::config::UpdateMode;
use crate::dom::Dom;
use crate::vdom::{Op, SNodeId};

pub type Task = Box<dyn FnOnce()>;
pub type LayoutTask = Box<dyn FnOnce(&dyn Dom)>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SchedulerFlags: u8 {
        /// A flush is executing.
        const RUNNING       = 1 << 0;
        /// A frame was requested from the host and has not run yet.
        const FRAME_PENDING = 1 << 1;
        /// Work was queued in sync mode outside a flush.
        const SYNC_PENDING  = 1 << 2;
    }
}

/// Flush phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    BeforeMutation,
    Commit,
    AfterMutation,
    Layout,
}

// =============================================================================
// Frame host
// =============================================================================

/// Embedder hook for frame-deferred flushing. `request_frame` must
/// eventually lead to one `Renderer::frame` call.
pub trait FrameHost {
    fn request_frame(&self);
}

/// Host that only counts requests; the owner calls `Renderer::frame`
/// itself.
#[derive(Debug, Clone, Default)]
pub struct ManualHost {
    requests: Rc<Cell<usize>>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl FrameHost for ManualHost {
    fn request_frame(&self) {
        self.requests.set(self.requests.get() + 1);
    }
}

// =============================================================================
// Queues
// =============================================================================

/// Root render waiting for the commit phase.
pub(crate) struct PendingRender {
    pub root: usize,
    pub op: Op,
    pub hydrate: bool,
}

#[derive(Default)]
struct Queues {
    before: Vec<Task>,
    mutation: Vec<Task>,
    after: Vec<Task>,
    layout: Vec<LayoutTask>,
    renders: Vec<PendingRender>,
    invalidated: Vec<SNodeId>,
}

impl Queues {
    fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.mutation.is_empty()
            && self.after.is_empty()
            && self.layout.is_empty()
            && self.renders.is_empty()
            && self.invalidated.is_empty()
    }
}

struct Inner {
    flags: Cell<SchedulerFlags>,
    phase: Cell<Option<Phase>>,
    mode: Cell<UpdateMode>,
    host: RefCell<Option<Rc<dyn FrameHost>>>,
    queues: RefCell<Queues>,
}

/// Shared handle to the scheduler of one renderer.
#[derive(Clone)]
pub struct Scheduler(Rc<Inner>);

impl Scheduler {
    pub fn new(mode: UpdateMode) -> Self {
        Self(Rc::new(Inner {
            flags: Cell::new(SchedulerFlags::empty()),
            phase: Cell::new(None),
            mode: Cell::new(mode),
            host: RefCell::new(None),
            queues: RefCell::new(Queues::default()),
        }))
    }

    pub fn set_host(&self, host: Rc<dyn FrameHost>) {
        *self.0.host.borrow_mut() = Some(host);
    }

    pub fn mode(&self) -> UpdateMode {
        self.0.mode.get()
    }

    pub fn set_mode(&self, mode: UpdateMode) {
        self.0.mode.set(mode);
    }

    pub fn flags(&self) -> SchedulerFlags {
        self.0.flags.get()
    }

    pub fn is_running(&self) -> bool {
        self.flags().contains(SchedulerFlags::RUNNING)
    }

    pub fn is_frame_pending(&self) -> bool {
        self.flags().contains(SchedulerFlags::FRAME_PENDING)
    }

    pub fn is_sync_pending(&self) -> bool {
        self.flags().contains(SchedulerFlags::SYNC_PENDING)
    }

    /// Phase of the running flush.
    pub fn phase(&self) -> Option<Phase> {
        self.0.phase.get()
    }

    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn set_flag(&self, flag: SchedulerFlags, on: bool) {
        let mut flags = self.0.flags.get();
        flags.set(flag, on);
        self.0.flags.set(flags);
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    pub fn schedule_before_mutation(&self, task: impl FnOnce() + 'static) {
        self.check_late(Phase::BeforeMutation, "before-mutation task");
        self.0.queues.borrow_mut().before.push(Box::new(task));
        self.request_update();
    }

    pub fn schedule_mutation_effect(&self, task: impl FnOnce() + 'static) {
        self.check_late(Phase::Commit, "mutation effect");
        self.0.queues.borrow_mut().mutation.push(Box::new(task));
        self.request_update();
    }

    pub fn schedule_after_mutation(&self, task: impl FnOnce() + 'static) {
        self.check_late(Phase::AfterMutation, "after-mutation task");
        self.0.queues.borrow_mut().after.push(Box::new(task));
        self.request_update();
    }

    pub fn schedule_layout_effect(&self, task: impl FnOnce(&dyn Dom) + 'static) {
        self.check_late(Phase::Layout, "layout effect");
        self.0.queues.borrow_mut().layout.push(Box::new(task));
        self.request_update();
    }

    /// Effects queued after their phase ran wait for the next flush.
    fn check_late(&self, phase: Phase, what: &'static str) {
        if let Some(current) = self.phase() {
            if current > phase {
                warn!(what, ?current, "queued after its phase ran; deferred to the next flush");
            }
        }
    }

    /// Mark a component for re-render on the next flush.
    pub(crate) fn invalidate(&self, node: SNodeId) {
        trace!(?node, "invalidate");
        self.0.queues.borrow_mut().invalidated.push(node);
        self.request_update();
    }

    pub(crate) fn push_render(&self, render: PendingRender) {
        self.0.queues.borrow_mut().renders.push(render);
    }

    /// Ask for a flush according to the update mode. Inside a running
    /// flush this is a no-op: the flush loop picks the work up, or asks
    /// for a frame when it ends.
    pub fn request_update(&self) {
        if self.is_running() {
            return;
        }
        match self.mode() {
            UpdateMode::Sync => self.set_flag(SchedulerFlags::SYNC_PENDING, true),
            UpdateMode::Frame => self.request_frame(),
        }
    }

    /// Request a frame from the host unless one is already pending.
    pub fn request_frame(&self) {
        if self.is_frame_pending() {
            return;
        }
        self.set_flag(SchedulerFlags::FRAME_PENDING, true);
        let host = self.0.host.borrow().clone();
        match host {
            Some(host) => host.request_frame(),
            None => trace!("frame requested without a host"),
        }
    }

    // -------------------------------------------------------------------------
    // Flush support
    // -------------------------------------------------------------------------

    /// Drop the pending frame; returns whether one was pending.
    pub(crate) fn cancel_frame(&self) -> bool {
        let pending = self.is_frame_pending();
        self.set_flag(SchedulerFlags::FRAME_PENDING, false);
        pending
    }

    pub(crate) fn has_work(&self) -> bool {
        !self.0.queues.borrow().is_empty()
    }

    /// Mark the flush as running until the guard drops.
    pub(crate) fn enter(&self) -> RunningGuard {
        self.set_flag(SchedulerFlags::RUNNING, true);
        self.set_flag(SchedulerFlags::SYNC_PENDING, false);
        RunningGuard(self.clone())
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.0.phase.set(Some(phase));
    }

    pub(crate) fn take_before(&self) -> Vec<Task> {
        std::mem::take(&mut self.0.queues.borrow_mut().before)
    }

    pub(crate) fn take_mutation(&self) -> Vec<Task> {
        std::mem::take(&mut self.0.queues.borrow_mut().mutation)
    }

    pub(crate) fn take_after(&self) -> Vec<Task> {
        std::mem::take(&mut self.0.queues.borrow_mut().after)
    }

    pub(crate) fn take_layout(&self) -> Vec<LayoutTask> {
        std::mem::take(&mut self.0.queues.borrow_mut().layout)
    }

    pub(crate) fn take_renders(&self) -> Vec<PendingRender> {
        std::mem::take(&mut self.0.queues.borrow_mut().renders)
    }

    pub(crate) fn take_invalidated(&self) -> Vec<SNodeId> {
        std::mem::take(&mut self.0.queues.borrow_mut().invalidated)
    }
}

/// Clears `RUNNING` and the phase when the flush ends, including by panic.
pub(crate) struct RunningGuard(Scheduler);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.set_flag(SchedulerFlags::RUNNING, false);
        self.0 .0.phase.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_mode_marks_pending() {
        let scheduler = Scheduler::new(UpdateMode::Sync);
        scheduler.schedule_mutation_effect(|| {});
        assert!(scheduler.is_sync_pending());
        assert!(scheduler.has_work());
        assert!(!scheduler.is_frame_pending());
    }

    #[test]
    fn test_frame_mode_requests_one_frame() {
        let host = ManualHost::new();
        let scheduler = Scheduler::new(UpdateMode::Frame);
        scheduler.set_host(Rc::new(host.clone()));
        scheduler.schedule_after_mutation(|| {});
        scheduler.schedule_after_mutation(|| {});
        assert!(scheduler.is_frame_pending());
        assert_eq!(host.requests(), 1);
        assert!(scheduler.cancel_frame());
        assert!(!scheduler.is_frame_pending());
    }

    #[test]
    fn test_guard_clears_running_on_drop() {
        let scheduler = Scheduler::new(UpdateMode::Sync);
        {
            let _guard = scheduler.enter();
            scheduler.set_phase(Phase::Layout);
            assert!(scheduler.is_running());
            scheduler.schedule_mutation_effect(|| {});
            assert!(!scheduler.is_sync_pending());
        }
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.phase(), None);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let scheduler = Scheduler::new(UpdateMode::Sync);
        let s = scheduler.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = s.enter();
            panic!("effect failed");
        }));
        assert!(result.is_err());
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_phases_are_ordered() {
        assert!(Phase::BeforeMutation < Phase::Commit);
        assert!(Phase::Commit < Phase::AfterMutation);
        assert!(Phase::AfterMutation < Phase::Layout);
    }
}
