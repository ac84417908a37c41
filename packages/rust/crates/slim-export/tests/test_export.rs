//! Export over a windowed tree.

use chrono::{TimeZone, Utc};
use slim_export::{ExportFormat, export_items, snapshot};
use slim_host::{CodeSpec, MemoryTree, TurnSpec};
use slim_types::{ApplyMode, RetentionConfig};
use slim_window::Window;

fn windowed() -> (MemoryTree, Window) {
    let mut tree = MemoryTree::new();
    let main = tree.mount_main();
    tree.push_turn(main, &TurnSpec::user("How do I read a file?"));
    tree.push_turn(
        main,
        &TurnSpec::assistant("Use std::fs.")
            .with_code(CodeSpec::new("rust", "let s = std::fs::read_to_string(p)?;")),
    );
    tree.push_turn(main, &TurnSpec::user("Thanks"));
    let mut window = Window::new();
    window.apply(&mut tree, &RetentionConfig::keeping(1), ApplyMode::Normal);
    (tree, window)
}

#[test]
fn test_collapsed_items_export_without_expanding() {
    let (tree, mut window) = windowed();
    let items = window.locate(&tree);
    assert!(items[1].is_collapsed());
    window.set_selected(items[1].id, true);

    let selected = window.selected_items(&tree, &RetentionConfig::keeping(1));
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().unwrap();
    let export = export_items(&tree, &selected, "File IO", ExportFormat::Markdown, at).unwrap();

    assert!(export.filename.starts_with("File_IO__selection__"));
    assert!(export.filename.ends_with(".md"));
    assert!(export.content.starts_with("# File IO\n_Exported "));
    assert!(export.content.contains("### Assistant\n\nUse std::fs.\n\n```rust\n"));
    assert!(!export.content.contains("How do I read a file?"));
}

#[test]
fn test_json_and_code_only_exports() {
    let (tree, mut window) = windowed();
    let items = window.locate(&tree);
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().unwrap();

    let json = export_items(&tree, &items, "t", ExportFormat::Json, at).unwrap();
    assert!(json.filename.ends_with(".json"));
    let value: serde_json::Value = serde_json::from_str(&json.content).unwrap();
    assert_eq!(value["title"], "t");
    assert_eq!(value["exportedAt"], "2026-01-02T03:04:05.000Z");
    assert_eq!(value["turns"].as_array().unwrap().len(), 3);
    assert_eq!(value["turns"][1]["role"], "assistant");
    assert_eq!(value["turns"][1]["codeBlocks"][0]["language"], "rust");

    let code = export_items(&tree, &items, "t", ExportFormat::CodeOnly, at).unwrap();
    assert!(code.filename.contains("__codeblocks__"));
    assert!(code.content.contains("----- Turn 2 (assistant) -----"));
    assert!(!code.content.contains("Turn 1"));
}

#[test]
fn test_snapshot_written_atomically() {
    let (mut tree, mut window) = windowed();
    window.expand_all(&mut tree);
    let items = window.locate(&tree);
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().unwrap();
    let export = snapshot(&tree, &items, "", at);
    assert!(export.filename.starts_with("Conversation__snapshot__"));
    assert!(export.content.contains("_Snapshot "));
    assert_eq!(export.content.matches("### ").count(), 3);

    let dir = tempfile::tempdir().unwrap();
    let path = export.write_to(dir.path()).unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), export.content);
}
