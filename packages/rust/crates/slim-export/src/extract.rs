//! Turn extraction: pull role, heading, prose, tables and code out of one item.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use slim_host::{HostTree, code_regions, descendants, detect_role, find_first, text_content};
use slim_types::{NodeId, Role};

/// `language-xyz` class on a code element.
static RE_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^language-([\w+-]+)$")
        .unwrap_or_else(|err| panic!("invalid RE_LANGUAGE regex: {err}"))
});

const MARKDOWN_CLASS: &str = "markdown";

/// One fenced code region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    /// Language tag, empty when unknown.
    pub language: String,
    /// Source text.
    pub text: String,
}

impl CodeBlock {
    /// Markdown fence.
    #[must_use]
    pub fn fenced(&self) -> String {
        format!("```{}\n{}\n```", self.language, self.text)
    }
}

/// Exportable content of one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRecord {
    /// Detected author.
    pub role: Role,
    /// First `h1`..`h3`, if any.
    pub heading: Option<String>,
    /// Paragraphs, list items and tables as markdown.
    pub body_text: String,
    /// The whole turn rendered as markdown.
    pub markdown: String,
    /// Raw text of the turn.
    pub text: String,
    /// Code regions in order.
    pub code_blocks: Vec<CodeBlock>,
}

/// Extract one turn. Works on detached (collapsed) content too.
pub fn extract_turn<T: HostTree + ?Sized>(tree: &T, turn: NodeId) -> TurnRecord {
    let role = detect_role(tree, turn);
    let heading = find_first(tree, turn, |n| matches!(tree.tag(n), Some("h1" | "h2" | "h3")))
        .map(|h| text_content(tree, h).trim().to_string())
        .filter(|h| !h.is_empty());

    let mut parts: Vec<String> = descendants(tree, turn)
        .into_iter()
        .filter(|n| matches!(tree.tag(*n), Some("p" | "li")))
        .filter(|n| inside_markdown(tree, *n, turn))
        .map(|n| text_content(tree, n).trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    for table in descendants(tree, turn)
        .into_iter()
        .filter(|n| tree.tag(*n) == Some("table") && inside_markdown(tree, *n, turn))
    {
        let lines = table_markdown(tree, table);
        if !lines.is_empty() {
            parts.push(lines.join("\n"));
        }
    }
    let body_text = parts.join("\n\n");

    let code_blocks: Vec<CodeBlock> = code_regions(tree, turn)
        .into_iter()
        .map(|pre| code_block(tree, pre))
        .collect();

    let header = match &heading {
        Some(h) => format!("### {}: {h}", role.label()),
        None => format!("### {}", role.label()),
    };
    let markdown = std::iter::once(header)
        .chain(std::iter::once(body_text.clone()))
        .chain(code_blocks.iter().map(CodeBlock::fenced))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    TurnRecord {
        role,
        heading,
        body_text,
        markdown,
        text: text_content(tree, turn),
        code_blocks,
    }
}

fn inside_markdown<T: HostTree + ?Sized>(tree: &T, node: NodeId, turn: NodeId) -> bool {
    let mut current = tree.parent(node);
    while let Some(n) = current {
        if tree.has_class(n, MARKDOWN_CLASS) {
            return true;
        }
        if n == turn {
            return false;
        }
        current = tree.parent(n);
    }
    false
}

fn code_block<T: HostTree + ?Sized>(tree: &T, pre: NodeId) -> CodeBlock {
    let code = find_first(tree, pre, |n| tree.tag(n) == Some("code")).unwrap_or(pre);
    let language = tree
        .classes(code)
        .iter()
        .find_map(|class| RE_LANGUAGE.captures(class))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    CodeBlock {
        language,
        text: text_content(tree, code),
    }
}

fn table_markdown<T: HostTree + ?Sized>(tree: &T, table: NodeId) -> Vec<String> {
    let mut rows: Vec<Vec<String>> = descendants(tree, table)
        .into_iter()
        .filter(|n| tree.tag(*n) == Some("tr"))
        .map(|tr| {
            descendants(tree, tr)
                .into_iter()
                .filter(|c| matches!(tree.tag(*c), Some("th" | "td")))
                .map(|c| text_content(tree, c).replace('|', "\\|").trim().to_string())
                .collect()
        })
        .collect();
    if rows.is_empty() {
        return Vec::new();
    }
    let header = rows.remove(0);
    let mut lines = vec![
        format!("| {} |", header.join(" | ")),
        format!("| {} |", vec!["---"; header.len()].join(" | ")),
    ];
    lines.extend(rows.iter().map(|r| format!("| {} |", r.join(" | "))));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use slim_host::{CodeSpec, MemoryTree, TurnSpec};

    #[test]
    fn test_extract_assistant_turn() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let turn = tree.push_turn(
            main,
            &TurnSpec::assistant("Here you go.")
                .with_heading("Setup")
                .with_code(CodeSpec::new("rust", "fn main() {}")),
        );
        let record = extract_turn(&tree, turn);
        assert_eq!(record.role, Role::Assistant);
        assert_eq!(record.heading.as_deref(), Some("Setup"));
        assert_eq!(record.body_text, "Here you go.");
        assert_eq!(
            record.code_blocks,
            vec![CodeBlock {
                language: "rust".into(),
                text: "fn main() {}".into()
            }]
        );
        assert_eq!(
            record.markdown,
            "### Assistant: Setup\n\nHere you go.\n\n```rust\nfn main() {}\n```"
        );
    }

    #[test]
    fn test_extract_user_turn_without_extras() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let turn = tree.push_turn(main, &TurnSpec::user("hello"));
        let record = extract_turn(&tree, turn);
        assert_eq!(record.markdown, "### User\n\nhello");
        assert!(record.code_blocks.is_empty());
    }

    #[test]
    fn test_table_and_list_items() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let turn = tree.push_turn(main, &TurnSpec::assistant("intro"));
        let markdown = find_first(&tree, turn, |n| tree.has_class(n, "markdown")).unwrap();

        let list = tree.element("ul", &[]);
        let li = tree.element("li", &[]);
        tree.set_text(li, "point");
        tree.append_child(list, li);
        tree.append_child(markdown, list);

        let table = tree.element("table", &[]);
        for cells in [["a", "b"], ["1", "x|y"]] {
            let tr = tree.element("tr", &[]);
            for cell in cells {
                let td = tree.element("td", &[]);
                tree.set_text(td, cell);
                tree.append_child(tr, td);
            }
            tree.append_child(table, tr);
        }
        tree.append_child(markdown, table);

        let record = extract_turn(&tree, turn);
        assert_eq!(
            record.body_text,
            "intro\n\npoint\n\n| a | b |\n| --- | --- |\n| 1 | x\\|y |"
        );
    }
}
