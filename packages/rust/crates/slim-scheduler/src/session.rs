//! Session: one window, one scheduler, one host tree.
//!
//! The session is the only place where timers, settings, and the tree meet.
//! Hosts call [`Session::sync_mutations`] after their own changes,
//! [`Session::on_idle`] from an idle slot, and [`Session::pump`] whenever a
//! timer deadline passes; user commands map one-to-one onto methods.

use serde_json::json;
use slim_events::{EventBus, sources, topics};
use slim_host::HostTree;
use slim_types::{ItemId, KeepLast, NodeId, Settings, SubscriptionId, TokenId, parse_keep_last_input};
use slim_window::{
    ApplyReport, ClipPolicy, Confirm, ExpandOutcome, Item, PurgeOutcome, SettingsStore, Window,
    WindowStats, clip_long_code,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::scheduler::{ApplyRequest, RequestOutcome, Scheduler, Task, Trigger};

/// Attribute mirroring the reduce-motion preference onto the container.
const REDUCE_MOTION_ATTR: &str = "data-slim-reduce-motion";

/// Keep-count used by [`Session::keep_last_exchange`].
const LAST_EXCHANGE_KEEP: i64 = 2;

/// Visibility manager bound to one live tree.
#[derive(Debug)]
pub struct Session<T: HostTree, C: Clock> {
    tree: T,
    clock: C,
    window: Window,
    scheduler: Scheduler,
    settings: Settings,
    store: Option<SettingsStore>,
    bus: EventBus,
    bound_root: Option<NodeId>,
    subscription: Option<SubscriptionId>,
    last_report: Option<ApplyReport>,
}

impl<T: HostTree, C: Clock> Session<T, C> {
    /// Session with default settings and timings. Call [`Session::start`]
    /// before pumping.
    pub fn new(tree: T, clock: C) -> Self {
        Self {
            tree,
            clock,
            window: Window::new(),
            scheduler: Scheduler::default(),
            settings: Settings::default(),
            store: None,
            bus: EventBus::default(),
            bound_root: None,
            subscription: None,
            last_report: None,
        }
    }

    /// Use these settings (not persisted until changed).
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Load settings from `store` and write changes back to it.
    #[must_use]
    pub fn with_store(mut self, store: SettingsStore) -> Self {
        self.settings = store.load();
        self.store = Some(store);
        self
    }

    /// Override scheduler timings.
    #[must_use]
    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = Scheduler::new(config);
        self
    }

    /// Publish on an existing bus.
    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Current time on the session clock.
    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// The host tree.
    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// The host tree, for host-side mutation. Follow with
    /// [`Session::sync_mutations`].
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    /// Give the tree back.
    pub fn into_tree(self) -> T {
        self.tree
    }

    /// Window bookkeeping (read-only).
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Scheduler state (read-only).
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Settings in effect.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Container currently observed.
    pub fn bound_root(&self) -> Option<NodeId> {
        self.bound_root
    }

    /// Report of the most recent pass.
    pub fn last_report(&self) -> Option<&ApplyReport> {
        self.last_report.as_ref()
    }

    /// Bind to the container, arm periodic timers, clip long code, and
    /// schedule the initial pass when auto-apply is on.
    pub fn start(&mut self) {
        let now = self.now();
        self.rebind();
        self.scheduler.start(now);
        self.refresh_overlays();
        let outcome = self.request_auto(Trigger::Init);
        info!(
            keep_last = self.settings.retention.keep(),
            auto_apply = self.settings.retention.auto_apply,
            ?outcome,
            "session started"
        );
    }

    /// Cancel timers and stop observing.
    pub fn stop(&mut self) {
        self.scheduler.stop();
        if let Some(subscription) = self.subscription.take() {
            self.tree.disconnect(subscription);
        }
        self.bound_root = None;
        debug!("session stopped");
    }

    /// Drain host mutation records into the scheduler.
    /// Returns whether the debounce was (re)armed.
    pub fn sync_mutations(&mut self) -> bool {
        let Some(subscription) = self.subscription else {
            return false;
        };
        let records = self.tree.take_records(subscription);
        if records.is_empty() {
            return false;
        }
        let now = self.now();
        self.scheduler.on_mutations(&records, now)
    }

    /// Idle slot: run the scheduled pass, if any. Returns its report.
    pub fn on_idle(&mut self) -> Option<ApplyReport> {
        self.run_pass()
    }

    /// Run every task due at the current time. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.now();
            let Some(task) = self.scheduler.poll(now) else {
                break;
            };
            self.run_task(task, now);
            ran += 1;
        }
        ran
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    fn run_task(&mut self, task: Task, now: u64) {
        match task {
            Task::Apply => {
                self.run_pass();
            }
            Task::Debounce => {
                self.request_auto(Trigger::Mutation);
                self.refresh_overlays();
            }
            Task::Rebind => {
                self.rebind();
            }
            Task::Stats => {
                let stats = self.stats();
                self.bus
                    .emit(sources::SESSION, topics::STATS_UPDATED, json!(stats));
            }
            Task::SoftHide { attempt } => {
                if self.window.locate(&self.tree).is_empty() {
                    if !self.scheduler.retry_soft_hide(attempt, now) {
                        debug!(attempt, "soft hide gave up: no items");
                    }
                } else {
                    self.request(ApplyRequest::forced(Trigger::SoftHide));
                }
            }
        }
    }

    fn request(&mut self, request: ApplyRequest) -> RequestOutcome {
        let now = self.now();
        let outcome = self.scheduler.request_apply(request, now);
        if outcome == RequestOutcome::Dropped {
            self.bus.emit(
                sources::SCHEDULER,
                topics::SCHEDULER_DROPPED,
                json!({ "trigger": request.trigger, "mode": request.mode }),
            );
        }
        outcome
    }

    fn request_auto(&mut self, trigger: Trigger) -> RequestOutcome {
        if !self.settings.retention.auto_apply {
            return RequestOutcome::Disabled;
        }
        self.request(ApplyRequest::normal(trigger))
    }

    fn run_pass(&mut self) -> Option<ApplyReport> {
        let now = self.now();
        let request = self.scheduler.begin_apply(now)?;
        self.rebind();
        let retention = self.settings.retention;
        let report = self.window.apply(&mut self.tree, &retention, request.mode);
        self.discard_own_mutations();
        if report.changed() {
            info!(
                trigger = ?request.trigger,
                mode = ?request.mode,
                collapsed = report.collapsed.len(),
                total = report.total,
                "apply pass"
            );
            self.bus.emit(
                sources::WINDOW,
                topics::WINDOW_APPLIED,
                serde_json::to_value(&report).unwrap_or_default(),
            );
        }
        let now = self.now();
        if let Some(outcome) = self.scheduler.finish_apply(now) {
            debug!(?outcome, "post-pass re-check");
        }
        self.last_report = Some(report.clone());
        Some(report)
    }

    /// Our own edits are already accounted for; feeding them back would
    /// only schedule a no-op pass.
    fn discard_own_mutations(&mut self) {
        if let Some(subscription) = self.subscription {
            self.tree.take_records(subscription);
        }
    }

    /// Re-resolve the container. When it changed, move the observer and
    /// release placeholders stranded in the old tree.
    pub fn rebind(&mut self) -> bool {
        let root = self.tree.container();
        if root == self.bound_root {
            return false;
        }
        if let Some(subscription) = self.subscription.take() {
            self.tree.disconnect(subscription);
        }
        let released = self.window.prune_detached(&mut self.tree);
        self.bound_root = root;
        if let Some(root) = root {
            self.subscription = Some(self.tree.observe(root));
            self.apply_reduce_motion();
        }
        info!(root = ?root, released, "bound to container");
        self.bus.emit(
            sources::SCHEDULER,
            topics::SCHEDULER_REBOUND,
            json!({ "root": root, "released": released }),
        );
        true
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(&self.settings) {
            warn!(path = %store.path().display(), error = %err, "failed to persist settings");
        } else {
            self.bus.emit(
                sources::SESSION,
                topics::SETTINGS_CHANGED,
                json!(self.settings),
            );
        }
    }

    /// Change the keep-count; schedules a normal pass when auto-apply is on.
    pub fn set_keep_last(&mut self, keep_last: i64) -> RequestOutcome {
        self.settings.retention.keep_last = KeepLast::new(keep_last);
        self.persist();
        self.request_auto(Trigger::Config)
    }

    /// Keep-count from free-form user input (see [`parse_keep_last_input`]).
    pub fn set_keep_last_input(&mut self, input: &str) -> RequestOutcome {
        self.set_keep_last(parse_keep_last_input(input))
    }

    /// Toggle automatic application; enabling schedules a normal pass.
    pub fn set_auto_apply(&mut self, enabled: bool) -> RequestOutcome {
        self.settings.retention.auto_apply = enabled;
        self.persist();
        if enabled {
            self.request_auto(Trigger::Config)
        } else {
            self.scheduler.cancel_soft_hide();
            RequestOutcome::Disabled
        }
    }

    /// Toggle long-code clipping and re-run it.
    pub fn set_collapse_long_code(&mut self, enabled: bool) -> usize {
        self.settings.prefs.collapse_long_code = enabled;
        self.persist();
        clip_long_code(&mut self.tree, &ClipPolicy::from(&self.settings.prefs))
    }

    /// Toggle the reduce-motion preference.
    pub fn set_reduce_motion(&mut self, enabled: bool) {
        self.settings.prefs.reduce_motion = enabled;
        self.persist();
        self.apply_reduce_motion();
    }

    fn apply_reduce_motion(&mut self) {
        if let Some(root) = self.bound_root {
            let value = self.settings.prefs.reduce_motion.then_some("on");
            self.tree.set_attr(root, REDUCE_MOTION_ATTR, value);
        }
    }

    /// Forced, pin-ignoring pass that bypasses suspension. When the page has
    /// no items yet, waits for them with bounded retries.
    pub fn soft_hide(&mut self) -> RequestOutcome {
        if self.window.locate(&self.tree).is_empty() {
            let now = self.now();
            return self.scheduler.wait_for_items(now);
        }
        self.request(ApplyRequest::forced(Trigger::SoftHide))
    }

    fn after_expand(&mut self, outcome: ExpandOutcome) -> ExpandOutcome {
        if let ExpandOutcome::Expanded { item, node } = outcome {
            self.discard_own_mutations();
            let now = self.now();
            let until = self
                .scheduler
                .suspend(now, self.scheduler.config().expand_suspend_ms);
            debug!(%item, until, "expanded; auto-apply suspended");
            self.bus.emit(
                sources::WINDOW,
                topics::WINDOW_EXPANDED,
                json!({ "item": item, "node": node, "suspendUntil": until }),
            );
        }
        outcome
    }

    /// Restore one collapsed item (pins it, short suspension).
    pub fn expand(&mut self, token: TokenId) -> ExpandOutcome {
        let outcome = self.window.expand(&mut self.tree, token);
        self.after_expand(outcome)
    }

    /// Restore the item behind a clicked placeholder.
    pub fn expand_placeholder(&mut self, placeholder: NodeId) -> ExpandOutcome {
        let outcome = self.window.expand_placeholder(&mut self.tree, placeholder);
        self.after_expand(outcome)
    }

    /// Restore everything and suspend auto-apply for the long window.
    pub fn expand_all(&mut self) -> usize {
        let expanded = self.window.expand_all(&mut self.tree);
        self.discard_own_mutations();
        let now = self.now();
        let until = self
            .scheduler
            .suspend(now, self.scheduler.config().expand_all_suspend_ms);
        self.bus.emit(
            sources::WINDOW,
            topics::WINDOW_EXPANDED,
            json!({ "count": expanded, "suspendUntil": until }),
        );
        expanded
    }

    /// Keep only the last exchange: keep-count 2, expand everything, then a
    /// forced pass that ignores the fresh suspension.
    pub fn keep_last_exchange(&mut self) -> RequestOutcome {
        self.settings.retention.keep_last = KeepLast::new(LAST_EXCHANGE_KEEP);
        self.persist();
        self.expand_all();
        self.request(ApplyRequest::forced(Trigger::KeepLastExchange))
    }

    /// Permanently remove items older than the keep window after `confirm`
    /// accepts.
    pub fn hard_purge(&mut self, confirm: &mut dyn Confirm) -> PurgeOutcome {
        let retention = self.settings.retention;
        let outcome = self.window.hard_purge(&mut self.tree, &retention, confirm);
        self.discard_own_mutations();
        if let PurgeOutcome::Purged { removed } = outcome {
            self.bus
                .emit(sources::WINDOW, topics::WINDOW_PURGED, json!({ "removed": removed }));
        }
        outcome
    }

    /// Flip selection mode; returns the new value.
    pub fn toggle_selection_mode(&mut self) -> bool {
        self.set_selection_mode(!self.settings.prefs.selection_mode)
    }

    /// Set selection mode; returns it.
    pub fn set_selection_mode(&mut self, enabled: bool) -> bool {
        self.settings.prefs.selection_mode = enabled;
        self.persist();
        self.refresh_overlays();
        enabled
    }

    /// Select or deselect one item.
    pub fn set_selected(&mut self, item: ItemId, selected: bool) {
        self.window.set_selected(item, selected);
        self.selection_changed();
    }

    /// Flip one item's selection; returns the new value.
    pub fn toggle_selected(&mut self, item: ItemId) -> bool {
        let selected = !self.window.flags(item).selected;
        self.set_selected(item, selected);
        selected
    }

    /// Turn on selection mode and select every realized item.
    pub fn select_all_visible(&mut self) -> usize {
        if !self.settings.prefs.selection_mode {
            self.settings.prefs.selection_mode = true;
            self.persist();
        }
        let selected = self.window.select_all_visible(&self.tree);
        self.selection_changed();
        selected
    }

    /// Clear all selections.
    pub fn select_none(&mut self) -> usize {
        let cleared = self.window.select_none();
        self.selection_changed();
        cleared
    }

    fn selection_changed(&mut self) {
        self.refresh_overlays();
        let stats = self.stats();
        self.bus.emit(
            sources::WINDOW,
            topics::WINDOW_SELECTION,
            json!({ "selected": stats.selected }),
        );
    }

    /// Export set: selected items, else the last `keepLast` items.
    pub fn selected_items(&mut self) -> Vec<Item> {
        let retention = self.settings.retention;
        self.window.selected_items(&self.tree, &retention)
    }

    /// Every located item, realized or collapsed, in order.
    pub fn items(&mut self) -> Vec<Item> {
        self.window.locate(&self.tree)
    }

    /// Live counts.
    pub fn stats(&mut self) -> WindowStats {
        self.window.stats(&self.tree)
    }

    /// Selection overlays plus long-code clipping. Attribute-only, so it
    /// never feeds back into the debounce.
    pub fn refresh_overlays(&mut self) {
        let overlays = self
            .window
            .refresh_overlays(&mut self.tree, self.settings.prefs.selection_mode);
        let clipped = clip_long_code(&mut self.tree, &ClipPolicy::from(&self.settings.prefs));
        self.bus.emit(
            sources::SESSION,
            topics::OVERLAY_REFRESH,
            json!({ "overlays": overlays, "clipped": clipped }),
        );
    }
}
