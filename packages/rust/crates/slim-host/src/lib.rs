//! slim-host - The live content tree the window manager edits but does not own.
//!
//! [`HostTree`] is the seam between the window core and whatever renders the
//! conversation. [`MemoryTree`] is an arena-backed implementation with
//! MutationObserver-style subscriptions, used by tests, the CLI and as the
//! reference host.
//!
//! ```rust
//! use slim_host::{HostTree, MemoryTree, Transcript};
//!
//! let transcript = Transcript::from_json(r#"{"turns":[{"role":"user","paragraphs":["hi"]}]}"#)?;
//! let tree = MemoryTree::from_transcript(&transcript);
//! assert!(tree.container().is_some());
//! # Ok::<(), slim_types::SlimError>(())
//! ```

mod inspect;
mod memory;
mod transcript;
mod tree;

pub use inspect::{
    ItemQuery, code_regions, descendants, detect_role, find_first, matches_item_query, preview,
    text_content,
};
pub use memory::MemoryTree;
pub use transcript::{CodeSpec, Transcript, TurnSpec};
pub use tree::{HostTree, MutationRecord, PLACEHOLDER_CLASS, PlaceholderView};
