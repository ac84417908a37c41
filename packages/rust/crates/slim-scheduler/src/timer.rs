//! Single-threaded timer queue with cancellable handles.

use serde::Serialize;

/// What a timer is for. At most one timer per kind is armed at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Mutation debounce.
    Debounce,
    /// Periodic container re-resolution.
    Rebind,
    /// Bounded fallback for a scheduled apply pass.
    IdleFallback,
    /// Periodic stats publication.
    Stats,
    /// Soft-hide retry while the page has no items yet.
    SoftHideRetry,
}

/// Handle to one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy)]
struct Timer {
    handle: TimerHandle,
    kind: TimerKind,
    deadline: u64,
}

/// Armed timers keyed by kind. Re-arming a kind replaces its deadline.
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<Timer>,
    next_handle: u64,
}

impl TimerQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` to fire at `deadline`, cancelling any earlier arming.
    pub fn arm(&mut self, kind: TimerKind, deadline: u64) -> TimerHandle {
        self.cancel_kind(kind);
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.timers.push(Timer {
            handle,
            kind,
            deadline,
        });
        handle
    }

    /// Cancel by handle. `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    /// Cancel whatever is armed for `kind`.
    pub fn cancel_kind(&mut self, kind: TimerKind) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.kind != kind);
        self.timers.len() != before
    }

    /// Whether `kind` is armed.
    #[must_use]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|t| t.kind == kind)
    }

    /// Deadline of `kind`, if armed.
    #[must_use]
    pub fn deadline(&self, kind: TimerKind) -> Option<u64> {
        self.timers.iter().find(|t| t.kind == kind).map(|t| t.deadline)
    }

    /// Earliest deadline across all timers.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    /// Remove and return the earliest timer due at `now`. Ties fire in arming order.
    pub fn pop_due(&mut self, now: u64) -> Option<TimerKind> {
        let (position, _) = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.handle))?;
        Some(self.timers.remove(position).kind)
    }

    /// Number of armed timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether nothing is armed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rearm_replaces_deadline() {
        let mut queue = TimerQueue::new();
        let first = queue.arm(TimerKind::Debounce, 150);
        queue.arm(TimerKind::Debounce, 300);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.deadline(TimerKind::Debounce), Some(300));
        assert!(!queue.cancel(first));
    }

    #[test]
    fn test_pop_due_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.arm(TimerKind::Stats, 2000);
        queue.arm(TimerKind::Rebind, 1000);
        queue.arm(TimerKind::Debounce, 1000);
        assert_eq!(queue.next_deadline(), Some(1000));
        assert_eq!(queue.pop_due(999), None);
        assert_eq!(queue.pop_due(1000), Some(TimerKind::Rebind));
        assert_eq!(queue.pop_due(1000), Some(TimerKind::Debounce));
        assert_eq!(queue.pop_due(5000), Some(TimerKind::Stats));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel_by_handle() {
        let mut queue = TimerQueue::new();
        let handle = queue.arm(TimerKind::IdleFallback, 10);
        assert!(queue.cancel(handle));
        assert!(!queue.is_armed(TimerKind::IdleFallback));
    }
}
