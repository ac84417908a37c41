//! Export documents and filenames.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::Serialize;
use slim_host::HostTree;
use slim_types::{SlimError, SlimResult};
use slim_window::{Item, atomic_write_text};
use tracing::info;

use crate::extract::{TurnRecord, extract_turn};

/// Runs of characters not allowed in export filenames.
static RE_UNSAFE_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\w.-]+").unwrap_or_else(|err| panic!("invalid RE_UNSAFE_FILENAME regex: {err}"))
});

/// Title used when the page has none.
pub const DEFAULT_TITLE: &str = "Conversation";

const MAX_TITLE_CHARS: usize = 80;
const NO_CODE_BLOCKS: &str = "*No code blocks in selection.*";

/// Output format of a selection export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// One markdown document.
    #[default]
    Markdown,
    /// `{ title, exportedAt, turns }`.
    Json,
    /// Fenced code blocks only.
    CodeOnly,
}

impl FromStr for ExportFormat {
    type Err = SlimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "code" | "code-only" | "codeblocks" => Ok(Self::CodeOnly),
            other => Err(SlimError::InvalidInput(format!(
                "unknown export format `{other}` (expected md, json or code)"
            ))),
        }
    }
}

/// Which export produced a file; part of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Selected items.
    Selection,
    /// Code blocks of selected items.
    CodeBlocks,
    /// Every item, expanded.
    Snapshot,
}

impl ExportKind {
    fn marker(self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::CodeBlocks => "codeblocks",
            Self::Snapshot => "snapshot",
        }
    }
}

/// A rendered export, ready to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Suggested file name.
    pub filename: String,
    /// File content.
    pub content: String,
}

impl Export {
    /// Write into `dir` through the atomic writer; returns the full path.
    pub fn write_to(&self, dir: &Path) -> SlimResult<PathBuf> {
        let path = dir.join(&self.filename);
        atomic_write_text(&path, &self.content)
            .map_err(|err| SlimError::Persistence(format!("{err:#}")))?;
        info!(path = %path.display(), bytes = self.content.len(), "export written");
        Ok(path)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDocument<'a> {
    title: &'a str,
    exported_at: String,
    turns: &'a [TurnRecord],
}

fn display_title(title: &str) -> &str {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        DEFAULT_TITLE
    } else {
        trimmed
    }
}

/// Title made safe for a filename: unsafe runs become `_`, at most 80 chars.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    RE_UNSAFE_FILENAME
        .replace_all(display_title(title), "_")
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// `<title>__<kind>__<timestamp>.<ext>`, timestamp in UTC with `:` and `.`
/// replaced by `-`.
#[must_use]
pub fn export_filename(title: &str, kind: ExportKind, extension: &str, at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    format!(
        "{}__{}__{stamp}.{extension}",
        sanitize_title(title),
        kind.marker()
    )
}

fn markdown_document(title: &str, caption: &str, turns: &[TurnRecord], at: DateTime<Utc>) -> String {
    let local = at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let mut lines = vec![
        format!("# {}", display_title(title)),
        format!("_{caption} {local}_"),
        String::new(),
    ];
    lines.extend(turns.iter().map(|t| t.markdown.clone()));
    lines.join("\n")
}

/// Markdown document: title, export time, then each turn.
#[must_use]
pub fn render_markdown(title: &str, turns: &[TurnRecord], at: DateTime<Utc>) -> String {
    markdown_document(title, "Exported", turns, at)
}

/// Pretty JSON document.
pub fn render_json(title: &str, turns: &[TurnRecord], at: DateTime<Utc>) -> SlimResult<String> {
    let doc = JsonDocument {
        title: display_title(title),
        exported_at: at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        turns,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Code blocks only, grouped under per-turn headers.
#[must_use]
pub fn render_code_only(turns: &[TurnRecord]) -> String {
    let sections: Vec<String> = turns
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.code_blocks.is_empty())
        .map(|(i, t)| {
            let codes = t
                .code_blocks
                .iter()
                .map(crate::CodeBlock::fenced)
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("\n\n----- Turn {} ({}) -----\n\n{codes}", i + 1, t.role)
        })
        .collect();
    if sections.is_empty() {
        NO_CODE_BLOCKS.to_string()
    } else {
        sections.join("\n")
    }
}

/// Extract and render `items` in `format`.
pub fn export_items<T: HostTree + ?Sized>(
    tree: &T,
    items: &[Item],
    title: &str,
    format: ExportFormat,
    at: DateTime<Utc>,
) -> SlimResult<Export> {
    let turns: Vec<TurnRecord> = items.iter().map(|item| extract_turn(tree, item.node)).collect();
    let (kind, extension, content) = match format {
        ExportFormat::Markdown => (ExportKind::Selection, "md", render_markdown(title, &turns, at)),
        ExportFormat::Json => (ExportKind::Selection, "json", render_json(title, &turns, at)?),
        ExportFormat::CodeOnly => (ExportKind::CodeBlocks, "md", render_code_only(&turns)),
    };
    Ok(Export {
        filename: export_filename(title, kind, extension, at),
        content,
    })
}

/// Markdown snapshot of `items`. Callers expand everything first.
pub fn snapshot<T: HostTree + ?Sized>(
    tree: &T,
    items: &[Item],
    title: &str,
    at: DateTime<Utc>,
) -> Export {
    let turns: Vec<TurnRecord> = items.iter().map(|item| extract_turn(tree, item.node)).collect();
    Export {
        filename: export_filename(title, ExportKind::Snapshot, "md", at),
        content: markdown_document(title, "Snapshot", &turns, at),
    }
}
