//! Pointer-event suspension while the viewport is scrolling.
//!
//! Scrolling flips the guard into `scrolling` and starts a frame loop. Each
//! frame checks how long ago the last scroll happened and either ends the
//! loop (re-enabling pointer events) or asks for another frame. The loop is
//! an explicit [`FrameHandle`]; only the handle currently stored in the guard
//! is honoured, and it is cancelled on teardown.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::trace;

pub const QUIESCENCE_THRESHOLD: Duration = Duration::from_millis(150);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Schedules a callback for the host's next paint opportunity.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Monotonic time since an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Debug, Default)]
struct FrameQueueState {
    next_id: u64,
    pending: Vec<FrameHandle>,
    cancelled: usize,
}

/// Frame requests waiting for the host loop's next tick. Clones share the
/// queue, so the host drains what the viewer requested.
#[derive(Clone, Debug, Default)]
pub struct FrameQueue {
    state: Rc<RefCell<FrameQueueState>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles due this tick. Each fires once.
    pub fn take_due(&self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.state.borrow_mut().pending)
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn cancelled(&self) -> usize {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let handle = FrameHandle(state.next_id);
        state.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut state = self.state.borrow_mut();
        state.pending.retain(|h| *h != handle);
        state.cancelled += 1;
    }
}

#[derive(Debug)]
pub struct ScrollGuard {
    threshold: Duration,
    is_scrolling: bool,
    last_activity: Duration,
    pending: Option<FrameHandle>,
}

impl ScrollGuard {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            is_scrolling: false,
            last_activity: Duration::ZERO,
            pending: None,
        }
    }

    pub fn is_scrolling(&self) -> bool {
        self.is_scrolling
    }

    pub fn pointer_events_enabled(&self) -> bool {
        !self.is_scrolling
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Records scroll activity and starts the quiescence loop if it is not
    /// already running.
    pub fn on_scroll(&mut self, now: Duration, frames: &mut dyn FrameScheduler) {
        self.last_activity = now;
        if self.is_scrolling && self.pending.is_some() {
            return;
        }
        if let Some(stale) = self.pending.take() {
            frames.cancel_frame(stale);
        }
        self.is_scrolling = true;
        self.pending = Some(frames.request_frame());
        trace!(target: "guard", "pointer_events_disabled");
    }

    /// Runs one loop iteration. Returns true when pointer events were just
    /// re-enabled.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        now: Duration,
        frames: &mut dyn FrameScheduler,
    ) -> bool {
        if self.pending != Some(handle) {
            trace!(target: "guard", ?handle, "stale_frame_ignored");
            return false;
        }
        self.pending = None;

        if now.saturating_sub(self.last_activity) >= self.threshold {
            self.is_scrolling = false;
            trace!(target: "guard", "pointer_events_enabled");
            return true;
        }
        self.pending = Some(frames.request_frame());
        false
    }

    pub fn teardown(&mut self, frames: &mut dyn FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            frames.cancel_frame(handle);
        }
        self.is_scrolling = false;
    }
}
