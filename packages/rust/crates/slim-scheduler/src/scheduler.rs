//! Change-detection scheduler: a pure state machine over a timer queue.
//!
//! The scheduler never touches the tree. The session feeds it mutation
//! batches and requests, polls it for due work, and brackets each pass with
//! [`Scheduler::begin_apply`] / [`Scheduler::finish_apply`].

use serde::Serialize;
use slim_host::MutationRecord;
use slim_types::ApplyMode;
use tracing::debug;

use crate::config::{RecheckPolicy, SchedulerConfig};
use crate::timer::{TimerKind, TimerQueue};

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing pending.
    #[default]
    Idle,
    /// A pass is waiting for an idle slot.
    ApplyScheduled,
    /// A pass is running.
    Applying,
}

/// Why an apply was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Session start.
    Init,
    /// Debounced host mutation.
    Mutation,
    /// Retention config change.
    Config,
    /// User asked for a forced pass.
    SoftHide,
    /// Keep-last-exchange shortcut.
    KeepLastExchange,
    /// Deferred re-check after a pass.
    Recheck,
}

/// One apply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplyRequest {
    /// Pass mode.
    pub mode: ApplyMode,
    /// Run even inside a suspend window.
    pub bypass_suspend: bool,
    /// Origin.
    pub trigger: Trigger,
}

impl ApplyRequest {
    /// Automatic, suspend-respecting normal pass.
    #[must_use]
    pub const fn normal(trigger: Trigger) -> Self {
        Self {
            mode: ApplyMode::Normal,
            bypass_suspend: false,
            trigger,
        }
    }

    /// User-forced, pin-ignoring pass that bypasses suspension.
    #[must_use]
    pub const fn forced(trigger: Trigger) -> Self {
        Self {
            mode: ApplyMode::ForceIgnorePin,
            bypass_suspend: true,
            trigger,
        }
    }

    /// Combine with a later request: the stronger mode and bypass win, the
    /// later trigger is kept.
    #[must_use]
    pub fn merge(self, later: Self) -> Self {
        let mode = if self.mode.ignores_pin() || later.mode.ignores_pin() {
            ApplyMode::ForceIgnorePin
        } else {
            ApplyMode::Normal
        };
        Self {
            mode,
            bypass_suspend: self.bypass_suspend || later.bypass_suspend,
            trigger: later.trigger,
        }
    }

    /// User-forced: ignores pins or bypasses suspension.
    #[must_use]
    pub fn is_forced(self) -> bool {
        self.mode.ignores_pin() || self.bypass_suspend
    }

    fn is_stronger_than(self, other: Self) -> bool {
        (self.mode.ignores_pin() && !other.mode.ignores_pin())
            || (self.bypass_suspend && !other.bypass_suspend)
    }
}

/// What became of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A pass is now scheduled.
    Scheduled,
    /// Merged into the already scheduled pass, making it stronger.
    Upgraded,
    /// Remembered as the single post-pass re-check.
    Deferred,
    /// Dropped: a pass is already scheduled or running.
    Dropped,
    /// Skipped: inside the suspend window.
    Suspended,
    /// Disabled: auto-apply is off.
    Disabled,
    /// Waiting for items to appear before retrying.
    Waiting,
}

/// Work due at a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// The scheduled pass reached its idle fallback; run it now.
    Apply,
    /// Mutation debounce fired.
    Debounce,
    /// Time to re-resolve the container.
    Rebind,
    /// Time to publish stats.
    Stats,
    /// Retry a soft-hide that found no items.
    SoftHide {
        /// 1-based attempt number.
        attempt: u32,
    },
}

/// Running totals, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerCounters {
    /// Requests received.
    pub requested: u64,
    /// Requests dropped by coalescing.
    pub dropped: u64,
    /// Requests skipped by suspension (at request or run time).
    pub suspended: u64,
    /// Passes executed.
    pub passes: u64,
    /// Structural mutation batches seen.
    pub mutation_batches: u64,
}

/// The scheduler state machine.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    phase: Phase,
    pending: Option<ApplyRequest>,
    recheck: Option<ApplyRequest>,
    suspend_until: u64,
    soft_hide_attempt: u32,
    timers: TimerQueue,
    counters: SchedulerCounters,
}

impl Scheduler {
    /// Idle scheduler with no timers armed.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            pending: None,
            recheck: None,
            suspend_until: 0,
            soft_hide_attempt: 0,
            timers: TimerQueue::new(),
            counters: SchedulerCounters::default(),
        }
    }

    /// Timings in effect.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Request waiting for its idle slot.
    #[must_use]
    pub fn pending(&self) -> Option<ApplyRequest> {
        self.pending
    }

    /// Counters so far.
    #[must_use]
    pub fn counters(&self) -> SchedulerCounters {
        self.counters
    }

    /// Suspension deadline (0 when never suspended).
    #[must_use]
    pub fn suspend_until(&self) -> u64 {
        self.suspend_until
    }

    /// Whether automatic passes are suspended at `now`.
    #[must_use]
    pub fn is_suspended(&self, now: u64) -> bool {
        now < self.suspend_until
    }

    /// Earliest timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Whether a timer of `kind` is armed.
    #[must_use]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    /// Arm the periodic rebind and stats timers.
    pub fn start(&mut self, now: u64) {
        self.timers.arm(TimerKind::Rebind, now + self.config.rebind_ms);
        self.timers.arm(TimerKind::Stats, now + self.config.stats_ms);
    }

    /// Cancel every timer and forget pending work.
    pub fn stop(&mut self) {
        for kind in [
            TimerKind::Debounce,
            TimerKind::Rebind,
            TimerKind::IdleFallback,
            TimerKind::Stats,
            TimerKind::SoftHideRetry,
        ] {
            self.timers.cancel_kind(kind);
        }
        self.phase = Phase::Idle;
        self.pending = None;
        self.recheck = None;
    }

    /// Extend the suspend window to at least `now + duration_ms`.
    pub fn suspend(&mut self, now: u64, duration_ms: u64) -> u64 {
        self.suspend_until = self.suspend_until.max(now + duration_ms);
        self.suspend_until
    }

    /// Ask for an apply pass. The pass itself runs later, at an idle slot
    /// or when the idle fallback timer fires.
    pub fn request_apply(&mut self, request: ApplyRequest, now: u64) -> RequestOutcome {
        self.counters.requested += 1;
        if !request.bypass_suspend && self.is_suspended(now) {
            self.counters.suspended += 1;
            debug!(trigger = ?request.trigger, until = self.suspend_until, "apply request suspended");
            return RequestOutcome::Suspended;
        }
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::ApplyScheduled;
                self.pending = Some(request);
                self.timers.arm(TimerKind::IdleFallback, now + self.config.idle_fallback_ms);
                RequestOutcome::Scheduled
            }
            Phase::ApplyScheduled => match self.pending {
                Some(pending) if request.is_stronger_than(pending) => {
                    self.pending = Some(pending.merge(request));
                    RequestOutcome::Upgraded
                }
                _ => {
                    self.counters.dropped += 1;
                    RequestOutcome::Dropped
                }
            },
            Phase::Applying => match self.config.recheck {
                RecheckPolicy::Coalesce => self.defer(request),
                RecheckPolicy::Drop if request.is_forced() => self.defer(request),
                RecheckPolicy::Drop => {
                    self.counters.dropped += 1;
                    debug!(trigger = ?request.trigger, "apply request dropped mid-pass");
                    RequestOutcome::Dropped
                }
            },
        }
    }

    fn defer(&mut self, request: ApplyRequest) -> RequestOutcome {
        self.recheck = Some(self.recheck.map_or(request, |earlier| earlier.merge(request)));
        RequestOutcome::Deferred
    }

    /// Feed one batch of mutation records. Structural batches (re)arm the
    /// debounce; returns whether this batch did.
    pub fn on_mutations(&mut self, records: &[MutationRecord], now: u64) -> bool {
        if !records.iter().any(MutationRecord::is_structural) {
            return false;
        }
        self.counters.mutation_batches += 1;
        self.timers.arm(TimerKind::Debounce, now + self.config.debounce_ms);
        true
    }

    /// Take the scheduled request and enter `Applying`.
    ///
    /// Suspension is re-checked here: a non-bypass request whose window
    /// opened after it was scheduled is discarded and the phase returns to
    /// `Idle`.
    pub fn begin_apply(&mut self, now: u64) -> Option<ApplyRequest> {
        if self.phase != Phase::ApplyScheduled {
            return None;
        }
        self.timers.cancel_kind(TimerKind::IdleFallback);
        let request = self.pending.take()?;
        if !request.bypass_suspend && self.is_suspended(now) {
            self.phase = Phase::Idle;
            self.counters.suspended += 1;
            debug!(trigger = ?request.trigger, "scheduled pass skipped: suspended");
            return None;
        }
        self.phase = Phase::Applying;
        self.counters.passes += 1;
        Some(request)
    }

    /// Leave `Applying`. A coalesced re-check is scheduled right away.
    pub fn finish_apply(&mut self, now: u64) -> Option<RequestOutcome> {
        if self.phase != Phase::Applying {
            return None;
        }
        self.phase = Phase::Idle;
        let recheck = self.recheck.take()?;
        Some(self.request_apply(
            ApplyRequest {
                trigger: Trigger::Recheck,
                ..recheck
            },
            now,
        ))
    }

    /// Start (or restart) the soft-hide wait for items to appear.
    pub fn wait_for_items(&mut self, now: u64) -> RequestOutcome {
        self.soft_hide_attempt = 1;
        self.timers.arm(TimerKind::SoftHideRetry, now + self.config.soft_hide_retry_ms);
        RequestOutcome::Waiting
    }

    /// Re-arm the soft-hide wait after attempt `attempt` found nothing.
    /// Returns `false` once attempts are exhausted.
    pub fn retry_soft_hide(&mut self, attempt: u32, now: u64) -> bool {
        if attempt >= self.config.soft_hide_attempts {
            self.soft_hide_attempt = 0;
            return false;
        }
        self.soft_hide_attempt = attempt + 1;
        self.timers.arm(TimerKind::SoftHideRetry, now + self.config.soft_hide_retry_ms);
        true
    }

    /// Abandon a soft-hide wait.
    pub fn cancel_soft_hide(&mut self) {
        self.soft_hide_attempt = 0;
        self.timers.cancel_kind(TimerKind::SoftHideRetry);
    }

    /// Next due task at `now`, re-arming periodic timers as they fire.
    pub fn poll(&mut self, now: u64) -> Option<Task> {
        let kind = self.timers.pop_due(now)?;
        Some(match kind {
            TimerKind::Debounce => Task::Debounce,
            TimerKind::IdleFallback => Task::Apply,
            TimerKind::Rebind => {
                self.timers.arm(TimerKind::Rebind, now + self.config.rebind_ms);
                Task::Rebind
            }
            TimerKind::Stats => {
                self.timers.arm(TimerKind::Stats, now + self.config.stats_ms);
                Task::Stats
            }
            TimerKind::SoftHideRetry => Task::SoftHide {
                attempt: self.soft_hide_attempt.max(1),
            },
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slim_types::NodeId;

    fn structural() -> MutationRecord {
        MutationRecord {
            target: NodeId(1),
            added: vec![NodeId(2)],
            removed: vec![],
        }
    }

    #[test]
    fn test_request_schedules_then_drops() {
        let mut scheduler = Scheduler::default();
        let normal = ApplyRequest::normal(Trigger::Mutation);
        assert_eq!(scheduler.request_apply(normal, 0), RequestOutcome::Scheduled);
        assert_eq!(scheduler.phase(), Phase::ApplyScheduled);
        assert_eq!(scheduler.request_apply(normal, 1), RequestOutcome::Dropped);
        assert_eq!(scheduler.counters().dropped, 1);
    }

    #[test]
    fn test_forced_request_upgrades_scheduled_pass() {
        let mut scheduler = Scheduler::default();
        scheduler.request_apply(ApplyRequest::normal(Trigger::Config), 0);
        assert_eq!(
            scheduler.request_apply(ApplyRequest::forced(Trigger::SoftHide), 0),
            RequestOutcome::Upgraded
        );
        let pending = scheduler.pending().unwrap();
        assert_eq!(pending.mode, ApplyMode::ForceIgnorePin);
        assert!(pending.bypass_suspend);
    }

    #[test]
    fn test_normal_requests_mid_pass_are_dropped_by_default() {
        let mut scheduler = Scheduler::default();
        scheduler.request_apply(ApplyRequest::normal(Trigger::Init), 0);
        assert!(scheduler.begin_apply(0).is_some());
        assert_eq!(
            scheduler.request_apply(ApplyRequest::normal(Trigger::Mutation), 0),
            RequestOutcome::Dropped
        );
        assert_eq!(scheduler.finish_apply(0), None);
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn test_forced_request_mid_pass_runs_after_it() {
        let mut scheduler = Scheduler::default();
        scheduler.request_apply(ApplyRequest::normal(Trigger::Init), 0);
        assert!(scheduler.begin_apply(0).is_some());
        assert_eq!(
            scheduler.request_apply(ApplyRequest::forced(Trigger::SoftHide), 0),
            RequestOutcome::Deferred
        );
        assert_eq!(
            scheduler.request_apply(ApplyRequest::normal(Trigger::Mutation), 0),
            RequestOutcome::Dropped
        );
        assert_eq!(scheduler.finish_apply(0), Some(RequestOutcome::Scheduled));
        let pending = scheduler.pending().unwrap();
        assert_eq!(pending.mode, ApplyMode::ForceIgnorePin);
        assert_eq!(pending.trigger, Trigger::Recheck);
        assert_eq!(scheduler.counters().dropped, 1);
    }

    #[test]
    fn test_coalesce_policy_keeps_one_recheck() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            recheck: RecheckPolicy::Coalesce,
            ..SchedulerConfig::default()
        });
        scheduler.request_apply(ApplyRequest::normal(Trigger::Init), 0);
        scheduler.begin_apply(0);
        let normal = ApplyRequest::normal(Trigger::Mutation);
        assert_eq!(scheduler.request_apply(normal, 0), RequestOutcome::Deferred);
        assert_eq!(scheduler.request_apply(normal, 0), RequestOutcome::Deferred);
        assert_eq!(scheduler.finish_apply(0), Some(RequestOutcome::Scheduled));
        assert_eq!(scheduler.pending().unwrap().trigger, Trigger::Recheck);
    }

    #[test]
    fn test_suspension_blocks_automatic_but_not_forced() {
        let mut scheduler = Scheduler::default();
        scheduler.suspend(100, 1500);
        assert_eq!(
            scheduler.request_apply(ApplyRequest::normal(Trigger::Mutation), 200),
            RequestOutcome::Suspended
        );
        assert_eq!(
            scheduler.request_apply(ApplyRequest::forced(Trigger::SoftHide), 200),
            RequestOutcome::Scheduled
        );
        assert!(scheduler.begin_apply(300).is_some());
    }

    #[test]
    fn test_suspension_rechecked_at_run_time() {
        let mut scheduler = Scheduler::default();
        scheduler.request_apply(ApplyRequest::normal(Trigger::Config), 0);
        scheduler.suspend(10, 1500);
        assert_eq!(scheduler.begin_apply(20), None);
        assert_eq!(scheduler.phase(), Phase::Idle);
        assert_eq!(scheduler.counters().suspended, 1);
    }

    #[test]
    fn test_suspend_keeps_later_deadline() {
        let mut scheduler = Scheduler::default();
        scheduler.suspend(0, 10_000);
        scheduler.suspend(100, 1500);
        assert_eq!(scheduler.suspend_until(), 10_000);
    }

    #[test]
    fn test_debounce_rearms_on_each_structural_batch() {
        let mut scheduler = Scheduler::default();
        assert!(scheduler.on_mutations(&[structural()], 0));
        assert!(scheduler.on_mutations(&[structural()], 100));
        assert_eq!(scheduler.poll(200), None);
        assert_eq!(scheduler.poll(250), Some(Task::Debounce));

        let attr_only = MutationRecord {
            target: NodeId(1),
            added: vec![],
            removed: vec![],
        };
        assert!(!scheduler.on_mutations(&[attr_only], 300));
    }

    #[test]
    fn test_periodic_timers_rearm() {
        let mut scheduler = Scheduler::default();
        scheduler.start(0);
        assert_eq!(scheduler.poll(1000), Some(Task::Rebind));
        assert_eq!(scheduler.poll(1000), None);
        // Equal deadlines fire in arming order; rebind was re-armed last.
        assert_eq!(scheduler.poll(2000), Some(Task::Stats));
        assert_eq!(scheduler.poll(2000), Some(Task::Rebind));
        assert_eq!(scheduler.next_deadline(), Some(3000));
    }

    #[test]
    fn test_idle_fallback_fires_apply() {
        let mut scheduler = Scheduler::default();
        scheduler.request_apply(ApplyRequest::normal(Trigger::Init), 0);
        assert_eq!(scheduler.poll(999), None);
        assert_eq!(scheduler.poll(1000), Some(Task::Apply));
    }

    #[test]
    fn test_soft_hide_retry_exhausts() {
        let mut scheduler = Scheduler::default();
        scheduler.wait_for_items(0);
        let mut now = 0;
        let mut attempts = 0;
        loop {
            now += 250;
            let Some(Task::SoftHide { attempt }) = scheduler.poll(now) else {
                break;
            };
            attempts += 1;
            if !scheduler.retry_soft_hide(attempt, now) {
                break;
            }
        }
        assert_eq!(attempts, 8);
        assert!(!scheduler.is_armed(TimerKind::SoftHideRetry));
    }
}
