//! Event topic constants for type-safe routing.

/// Items collapsed by an apply pass
pub const WINDOW_APPLIED: &str = "window/applied";
/// One item collapsed outside an apply pass
pub const WINDOW_COLLAPSED: &str = "window/collapsed";
/// Item(s) restored from placeholders
pub const WINDOW_EXPANDED: &str = "window/expanded";
/// Items permanently removed
pub const WINDOW_PURGED: &str = "window/purged";
/// Selection flags changed
pub const WINDOW_SELECTION: &str = "window/selection";

/// Observer moved to a new container
pub const SCHEDULER_REBOUND: &str = "scheduler/rebound";
/// Apply request dropped while a pass was pending or running
pub const SCHEDULER_DROPPED: &str = "scheduler/dropped";
/// Automatic application suspended
pub const SCHEDULER_SUSPENDED: &str = "scheduler/suspended";

/// Fresh stats snapshot
pub const STATS_UPDATED: &str = "stats/updated";
/// Overlay and clip pass ran
pub const OVERLAY_REFRESH: &str = "overlay/refresh";

/// Settings changed and persisted
pub const SETTINGS_CHANGED: &str = "settings/changed";
/// Export written
pub const EXPORT_WRITTEN: &str = "export/written";
