//! slim-window: windowed visibility manager for long conversations.
//!
//! Keeps the most recent turns fully rendered and swaps older ones for
//! lightweight placeholders that own the original content until it is
//! restored. Flags (pinned, selected) live on a stable item identity so they
//! survive collapse/expand cycles and host re-renders.
//!
//! ```text
//! locate() ──► retention::plan() ──► Window::collapse ──► PlaceholderRegistry
//!                                         ▲                       │
//!                                         └──── Window::expand ◄──┘
//! ```

mod clip;
mod item;
mod locator;
mod persistence;
mod purge;
mod registry;
pub mod retention;
mod settings;
mod stats;
mod visibility;
mod window;

pub use clip::{ClipPolicy, ClipState, clip_long_code, clip_state, toggle_clip};
pub use item::{Item, ItemKey, ItemSlot};
pub use persistence::atomic_write_text;
pub use purge::{Confirm, PurgeOutcome};
pub use registry::{PlaceholderRegistry, PlaceholderToken};
pub use retention::{RetentionCandidate, RetentionPlan};
pub use settings::{SettingsStore, default_settings_path};
pub use stats::WindowStats;
pub use visibility::{Visibility, VisibilityFlags, VisibilityTable};
pub use window::{ApplyReport, ExpandOutcome, Window};
