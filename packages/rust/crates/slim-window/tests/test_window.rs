//! Window behavior over an in-memory host tree.

use slim_host::{CodeSpec, HostTree, MemoryTree, TurnSpec, text_content};
use slim_types::{ApplyMode, RetentionConfig};
use slim_window::{ExpandOutcome, Item, PurgeOutcome, Window};

fn conversation(turns: usize) -> MemoryTree {
    let mut tree = MemoryTree::new();
    let main = tree.mount_main();
    for i in 0..turns {
        let spec = if i % 2 == 0 {
            TurnSpec::user(&format!("question {i}"))
        } else {
            TurnSpec::assistant(&format!("answer {i}"))
                .with_code(CodeSpec::new("rust", &format!("fn f{i}() {{}}")))
        };
        tree.push_turn(main, &spec.with_id(&format!("msg-{i}")));
    }
    tree
}

fn collapsed_indices(items: &[Item]) -> Vec<usize> {
    items
        .iter()
        .filter(|item| item.is_collapsed())
        .map(|item| item.index)
        .collect()
}

fn realized_indices(items: &[Item]) -> Vec<usize> {
    items
        .iter()
        .filter(|item| !item.is_collapsed())
        .map(|item| item.index)
        .collect()
}

#[test]
fn test_recency_window_scenario() {
    let mut tree = conversation(10);
    let mut window = Window::new();
    let report = window.apply(&mut tree, &RetentionConfig::keeping(3), ApplyMode::Normal);

    assert_eq!(report.total, 10);
    assert_eq!(report.cutoff, 7);
    assert_eq!(report.collapsed, (0..7).collect::<Vec<_>>());
    let items = window.locate(&tree);
    assert_eq!(collapsed_indices(&items), (0..7).collect::<Vec<_>>());
    assert_eq!(realized_indices(&items), vec![7, 8, 9]);
}

#[test]
fn test_selected_item_is_exempt() {
    let mut tree = conversation(10);
    let mut window = Window::new();
    let items = window.locate(&tree);
    window.set_selected(items[2].id, true);

    let report = window.apply(&mut tree, &RetentionConfig::keeping(3), ApplyMode::Normal);
    assert_eq!(report.collapsed, vec![0, 1, 3, 4, 5, 6]);
    assert_eq!(report.skipped_selected, vec![2]);

    let after = window.locate(&tree);
    assert_eq!(realized_indices(&after), vec![2, 7, 8, 9]);

    window.apply(&mut tree, &RetentionConfig::keeping(3), ApplyMode::ForceIgnorePin);
    assert!(!window.locate(&tree)[2].is_collapsed());
}

#[test]
fn test_expanded_item_is_pinned_until_forced() {
    let mut tree = conversation(10);
    let mut window = Window::new();
    let config = RetentionConfig::keeping(3);
    window.apply(&mut tree, &config, ApplyMode::Normal);

    let token = window.locate(&tree)[4].token().unwrap();
    let ExpandOutcome::Expanded { item, .. } = window.expand(&mut tree, token) else {
        panic!("expected expand to succeed");
    };
    assert!(window.flags(item).pinned);

    let report = window.apply(&mut tree, &config, ApplyMode::Normal);
    assert!(report.collapsed.is_empty());
    assert_eq!(report.skipped_pinned, vec![4]);
    assert!(!window.locate(&tree)[4].is_collapsed());

    let forced = window.apply(&mut tree, &config, ApplyMode::ForceIgnorePin);
    assert_eq!(forced.collapsed, vec![4]);
    assert!(window.locate(&tree)[4].is_collapsed());
}

#[test]
fn test_total_is_conserved_across_transitions() {
    let mut tree = conversation(8);
    let mut window = Window::new();
    let config = RetentionConfig::keeping(2);

    let check = |window: &mut Window, tree: &MemoryTree| {
        let stats = window.stats(tree);
        assert_eq!(stats.total, 8);
        assert_eq!(stats.realized + stats.collapsed, stats.total);
    };

    check(&mut window, &tree);
    window.apply(&mut tree, &config, ApplyMode::Normal);
    check(&mut window, &tree);
    let token = window.locate(&tree)[1].token().unwrap();
    window.expand(&mut tree, token);
    check(&mut window, &tree);
    window.apply(&mut tree, &config, ApplyMode::ForceIgnorePin);
    check(&mut window, &tree);
    assert_eq!(window.expand_all(&mut tree), 6);
    check(&mut window, &tree);
}

#[test]
fn test_apply_twice_is_idempotent() {
    let mut tree = conversation(6);
    let mut window = Window::new();
    let config = RetentionConfig::keeping(2);
    window.apply(&mut tree, &config, ApplyMode::Normal);
    let once = collapsed_indices(&window.locate(&tree));
    let node_count = tree.node_count();

    let second = window.apply(&mut tree, &config, ApplyMode::Normal);
    assert!(second.collapsed.is_empty());
    assert!(!second.changed());
    assert_eq!(collapsed_indices(&window.locate(&tree)), once);
    assert_eq!(tree.node_count(), node_count);
}

#[test]
fn test_expand_restores_position_and_content() {
    let mut tree = conversation(5);
    let main = tree.container().unwrap();
    let original_children = tree.children(main).to_vec();
    let target = original_children[1];
    let original_text = text_content(&tree, target);

    let mut window = Window::new();
    window.apply(&mut tree, &RetentionConfig::keeping(1), ApplyMode::Normal);
    assert!(!tree.is_attached(target));

    let token = window.locate(&tree)[1].token().unwrap();
    let outcome = window.expand(&mut tree, token);
    assert!(matches!(outcome, ExpandOutcome::Expanded { node, .. } if node == target));
    assert_eq!(tree.children(main)[1], target);
    assert_eq!(text_content(&tree, target), original_text);

    // The token is spent.
    assert_eq!(window.expand(&mut tree, token), ExpandOutcome::Stale);
}

#[test]
fn test_placeholder_click_expands() {
    let mut tree = conversation(3);
    let mut window = Window::new();
    window.apply(&mut tree, &RetentionConfig::keeping(1), ApplyMode::Normal);
    let main = tree.container().unwrap();
    let placeholder = tree.children(main)[0];
    assert!(tree.has_class(placeholder, slim_host::PLACEHOLDER_CLASS));

    assert!(matches!(
        window.expand_placeholder(&mut tree, placeholder),
        ExpandOutcome::Expanded { .. }
    ));
    assert_eq!(
        window.expand_placeholder(&mut tree, placeholder),
        ExpandOutcome::Stale
    );
}

#[test]
fn test_flags_survive_host_rerender() {
    let mut tree = conversation(4);
    let mut window = Window::new();
    let items = window.locate(&tree);
    window.set_selected(items[0].id, true);

    // Host rebuilds the thread from scratch with the same message ids.
    let main = tree.remount_main();
    for i in 0..4 {
        tree.push_turn(main, &TurnSpec::user(&format!("q{i}")).with_id(&format!("msg-{i}")));
    }
    let rebuilt = window.locate(&tree);
    assert_eq!(rebuilt[0].id, items[0].id);
    assert!(window.flags(rebuilt[0].id).selected);
}

#[test]
fn test_collapsed_selection_survives_host_rerender() {
    let mut tree = conversation(6);
    let mut window = Window::new();
    let config = RetentionConfig::keeping(2);
    window.apply(&mut tree, &config, ApplyMode::Normal);
    let items = window.locate(&tree);
    assert!(items[0].is_collapsed());
    window.set_selected(items[0].id, true);

    // Host rebuilds the thread with the same message ids; our placeholders go with it.
    let main = tree.remount_main();
    for i in 0..6 {
        tree.push_turn(main, &TurnSpec::user(&format!("q{i}")).with_id(&format!("msg-{i}")));
    }
    let report = window.apply(&mut tree, &config, ApplyMode::Normal);
    assert_eq!(report.reconciled, 4);
    assert_eq!(report.collapsed, vec![1, 2, 3]);
    assert_eq!(report.skipped_selected, vec![0]);

    let rebuilt = window.locate(&tree);
    assert_eq!(rebuilt[0].id, items[0].id);
    assert!(!rebuilt[0].is_collapsed());
    assert!(window.flags(rebuilt[0].id).selected);
    let exported = window.selected_items(&tree, &config);
    assert_eq!(exported.iter().map(|i| i.id).collect::<Vec<_>>(), vec![items[0].id]);
    // The released content was destroyed with its placeholder.
    assert!(!tree.contains(items[0].node));
}

#[test]
fn test_pin_survives_host_rerender_after_forced_collapse() {
    let mut tree = conversation(4);
    let mut window = Window::new();
    let config = RetentionConfig::keeping(1);
    window.apply(&mut tree, &config, ApplyMode::Normal);
    let token = window.locate(&tree)[0].token().unwrap();
    let ExpandOutcome::Expanded { item, .. } = window.expand(&mut tree, token) else {
        panic!("expected expand");
    };
    window.apply(&mut tree, &config, ApplyMode::ForceIgnorePin);
    assert!(window.locate(&tree)[0].is_collapsed());

    let main = tree.remount_main();
    for i in 0..4 {
        tree.push_turn(main, &TurnSpec::user(&format!("q{i}")).with_id(&format!("msg-{i}")));
    }
    let report = window.apply(&mut tree, &config, ApplyMode::Normal);
    assert_eq!(report.skipped_pinned, vec![0]);
    assert!(window.flags(item).pinned);
}

#[test]
fn test_hard_purge_declined_leaves_tree() {
    let mut tree = conversation(6);
    let mut window = Window::new();
    let before = tree.node_count();
    let mut asked = None;
    let outcome = window.hard_purge(&mut tree, &RetentionConfig::keeping(2), &mut |prompt: &str| {
        asked = Some(prompt.to_string());
        false
    });
    assert_eq!(outcome, PurgeOutcome::Declined { candidates: 4 });
    assert!(asked.unwrap().contains("4 older items"));
    assert_eq!(tree.node_count(), before);
}

#[test]
fn test_hard_purge_removes_old_items_except_selected() {
    let mut tree = conversation(6);
    let mut window = Window::new();
    let config = RetentionConfig::keeping(2);
    let items = window.locate(&tree);
    window.set_selected(items[1].id, true);
    window.apply(&mut tree, &config, ApplyMode::Normal);

    let outcome = window.hard_purge(&mut tree, &config, &mut |_: &str| true);
    assert_eq!(outcome, PurgeOutcome::Purged { removed: 3 });

    let left = window.locate(&tree);
    assert_eq!(left.len(), 3);
    assert_eq!(left[0].id, items[1].id);
    assert!(window.registry().is_empty());
    assert_eq!(
        window.hard_purge(&mut tree, &config, &mut |_: &str| true),
        PurgeOutcome::NothingToPurge
    );
}

#[test]
fn test_selection_falls_back_to_last_keep_items() {
    let mut tree = conversation(5);
    let mut window = Window::new();
    let config = RetentionConfig::keeping(2);

    let fallback = window.selected_items(&tree, &config);
    assert_eq!(fallback.iter().map(|i| i.index).collect::<Vec<_>>(), vec![3, 4]);

    let items = window.locate(&tree);
    window.set_selected(items[0].id, true);
    window.set_selected(items[2].id, true);
    let chosen = window.selected_items(&tree, &config);
    assert_eq!(chosen.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 2]);

    assert_eq!(window.select_none(), 2);
    assert_eq!(window.select_all_visible(&tree), 5);
}

#[test]
fn test_stats_split_code_blocks() {
    let mut tree = conversation(6);
    let mut window = Window::new();
    window.apply(&mut tree, &RetentionConfig::keeping(2), ApplyMode::Normal);
    let stats = window.stats(&tree);
    assert_eq!(stats.collapsed, 4);
    assert_eq!(stats.realized, 2);
    // Odd indices carry one code block each.
    assert_eq!(stats.collapsed_code_blocks, 2);
    assert_eq!(stats.realized_code_blocks, 1);
    assert_eq!(stats.code_blocks(), 3);
    assert_eq!(stats.to_string(), "6 turns: 2 visible, 4 collapsed, 3 code blocks");
}

#[test]
fn test_hidden_primary_items_are_not_counted() {
    let mut tree = MemoryTree::new();
    let main = tree.mount_main();
    tree.push_turn(main, &TurnSpec::user("shown"));
    tree.push_turn(main, &TurnSpec::user("hidden").hidden());
    let mut window = Window::new();
    assert_eq!(window.locate(&tree).len(), 1);
}

#[test]
fn test_empty_tree_is_noop() {
    let mut tree = MemoryTree::empty();
    let mut window = Window::new();
    let report = window.apply(&mut tree, &RetentionConfig::default(), ApplyMode::ForceIgnorePin);
    assert_eq!(report.total, 0);
    assert!(window.locate(&tree).is_empty());
    assert_eq!(window.expand_all(&mut tree), 0);
}
