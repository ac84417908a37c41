//! slim-scheduler: drives the visibility manager against a live tree.
//!
//! ```text
//! host mutations ──► Scheduler (debounce) ──► ApplyScheduled ──► idle slot ──► Window::apply
//!                        ▲   suspend window ◄── expand / expand_all
//!                        └── rebind tick, stats tick
//! ```
//!
//! [`Scheduler`] is the pure state machine; [`Session`] binds it to one
//! tree, one window, and the settings store; [`drive`] runs a session on
//! tokio.

mod clock;
mod config;
mod driver;
mod scheduler;
mod session;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::{RecheckPolicy, SchedulerConfig};
pub use driver::{SessionCommand, TreeEdit, drive};
pub use scheduler::{
    ApplyRequest, Phase, RequestOutcome, Scheduler, SchedulerCounters, Task, Trigger,
};
pub use session::Session;
pub use timer::{TimerHandle, TimerKind, TimerQueue};
