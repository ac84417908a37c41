//! slim-types - Common type definitions for Thread Slim
//!
//! Shared handles, configuration and error types used across the `slim-*`
//! crates. Everything here is plain data: no tree access, no I/O.
//!
//! # Layout
//!
//! ```text
//! slim-types/src/
//! ├── lib.rs      # Re-exports (this file)
//! ├── ids.rs      # NodeId / ItemId / TokenId / SubscriptionId handles
//! ├── config.rs   # RetentionConfig, Prefs, Settings, ApplyMode, Role
//! └── error.rs    # SlimError
//! ```

#![allow(clippy::doc_markdown)]

mod config;
mod error;
mod ids;

pub use config::{
    ApplyMode, DEFAULT_KEEP_LAST, KeepLast, Prefs, RetentionConfig, Role, Settings,
    parse_keep_last_input,
};
pub use error::{SlimError, SlimResult};
pub use ids::{ItemId, NodeId, SubscriptionId, TokenId};
