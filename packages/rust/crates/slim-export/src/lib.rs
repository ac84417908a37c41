//! slim-export: turn extraction and export documents.
//!
//! Extraction reads item content straight from the host tree, so collapsed
//! items export without being expanded. Rendering is pure; only
//! [`Export::write_to`] touches the filesystem.

mod extract;
mod render;

pub use extract::{CodeBlock, TurnRecord, extract_turn};
pub use render::{
    DEFAULT_TITLE, Export, ExportFormat, ExportKind, export_filename, export_items, render_code_only,
    render_json, render_markdown, sanitize_title, snapshot,
};
