//! Animation-frame scheduling
//!
//! [`FrameQueue`] stands in for the host's animation-frame callback list: a
//! callback is requested for the next display refresh and can be cancelled
//! until it runs. [`RenderLoop`] keeps exactly one request alive while it
//! is running.

use tracing::debug;

/// Id of a requested animation frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

/// Pending animation-frame requests
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Vec<FrameHandle>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a callback on the next frame
    pub fn request(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending.push(handle);
        handle
    }

    /// Withdraw a request; returns false if it already ran or was unknown
    pub fn cancel(&mut self, handle: FrameHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| *pending != handle);
        self.pending.len() != before
    }

    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.pending.contains(&handle)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Requests due this frame, in request order.
    /// Requests made while dispatching them wait for the next frame.
    pub fn take_pending(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }
}

/// Pausable frame clock over host timestamps in milliseconds
#[derive(Debug, Clone, Default)]
pub struct Clock {
    running: bool,
    last_ms: Option<f64>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.last_ms = None;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.last_ms = None;
    }

    /// Forget the last timestamp
    pub fn reset(&mut self) {
        self.last_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds since the previous call; zero on the first call after a
    /// start or reset, while stopped, or if time went backwards
    pub fn delta(&mut self, now_ms: f64) -> f32 {
        if !self.running {
            return 0.0;
        }
        let delta = match self.last_ms {
            Some(last) => ((now_ms - last) / 1000.0).max(0.0),
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        delta as f32
    }
}

/// Running/stopped state of the per-frame driver
#[derive(Debug, Default)]
pub struct RenderLoop {
    handle: Option<FrameHandle>,
    pub clock: Clock,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start ticking; a no-op while already running
    pub fn start(&mut self, frames: &mut FrameQueue) -> bool {
        if self.handle.is_some() {
            return false;
        }
        self.clock.reset();
        self.clock.start();
        self.handle = Some(frames.request());
        debug!("render loop started");
        true
    }

    /// Stop ticking and cancel the outstanding frame
    pub fn stop(&mut self, frames: &mut FrameQueue) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        frames.cancel(handle);
        self.clock.stop();
        debug!("render loop stopped");
        true
    }

    /// True when `handle` is this loop's outstanding frame
    pub fn owns(&self, handle: FrameHandle) -> bool {
        self.handle == Some(handle)
    }

    /// Request the next tick after the current one ran
    pub fn reschedule(&mut self, frames: &mut FrameQueue) {
        if self.handle.is_some() {
            self.handle = Some(frames.request());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cancelled_frames_never_run() {
        let mut frames = FrameQueue::new();
        let first = frames.request();
        let second = frames.request();
        assert!(frames.cancel(first));
        assert!(!frames.cancel(first));
        assert_eq!(frames.take_pending(), vec![second]);
        assert_eq!(frames.pending_count(), 0);
    }

    #[test]
    fn start_is_idempotent() {
        let mut frames = FrameQueue::new();
        let mut render_loop = RenderLoop::new();
        assert!(render_loop.start(&mut frames));
        assert!(!render_loop.start(&mut frames));
        assert_eq!(frames.pending_count(), 1);
    }

    #[test]
    fn stop_cancels_and_blocks_rescheduling() {
        let mut frames = FrameQueue::new();
        let mut render_loop = RenderLoop::new();
        render_loop.start(&mut frames);
        assert!(render_loop.stop(&mut frames));
        assert!(!render_loop.stop(&mut frames));
        assert_eq!(frames.pending_count(), 0);

        render_loop.reschedule(&mut frames);
        assert_eq!(frames.pending_count(), 0);
        assert!(!render_loop.is_running());
    }

    #[test]
    fn clock_reports_seconds_between_ticks() {
        let mut clock = Clock::new();
        assert_eq!(clock.delta(100.0), 0.0);
        clock.start();
        assert_eq!(clock.delta(1000.0), 0.0);
        assert_relative_eq!(clock.delta(1016.0), 0.016, epsilon = 1e-6);
        assert_eq!(clock.delta(900.0), 0.0);

        clock.stop();
        assert_eq!(clock.delta(2000.0), 0.0);
        clock.start();
        assert_eq!(clock.delta(3000.0), 0.0);
        clock.reset();
        assert_eq!(clock.delta(3016.0), 0.0);
    }
}
