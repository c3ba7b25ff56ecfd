// ============================================================================
// FRAME SCHEDULER — cancellable per-frame callback requests
// ============================================================================
//
// The host owns the real frame clock (winit redraws, or a plain loop when
// headless).  The effect only holds a token saying "one more tick wanted".
// Cancelling drops the token, so a redraw that arrives after teardown finds
// nothing to run.
// ============================================================================

/// Identifies one scheduled frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHandle(u64);

#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Option<FrameHandle>,
    cancelled: bool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a frame.  A second request before the first is consumed
    /// collapses into the existing one.  Returns `None` once cancelled.
    pub fn schedule(&mut self) -> Option<FrameHandle> {
        if self.cancelled {
            return None;
        }
        if let Some(handle) = self.pending {
            return Some(handle);
        }
        let handle = FrameHandle(self.next_id);
        self.next_id += 1;
        self.pending = Some(handle);
        Some(handle)
    }

    /// Consume the pending request, if any.  The host calls this when its
    /// frame callback fires.
    pub fn take(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any pending request and refuse all future ones.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.cancelled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_then_take() {
        let mut s = FrameScheduler::new();
        let h = s.schedule();
        assert!(h.is_some());
        assert!(s.is_pending());
        assert_eq!(s.take(), h);
        assert!(!s.is_pending());
        assert_eq!(s.take(), None);
    }

    #[test]
    fn repeated_requests_collapse() {
        let mut s = FrameScheduler::new();
        let a = s.schedule();
        let b = s.schedule();
        assert_eq!(a, b);
        s.take();
        let c = s.schedule();
        assert_ne!(a, c);
    }

    #[test]
    fn cancel_drops_pending_and_blocks_new() {
        let mut s = FrameScheduler::new();
        s.schedule();
        s.cancel();
        assert_eq!(s.take(), None);
        assert_eq!(s.schedule(), None);
        assert!(!s.is_pending());
    }
}
