//! Long-code clipping: hide the bulk of very long code regions behind a toggle.
//!
//! State lives on the `pre` element itself as `data-slim-clip`, so a region
//! is only ever marked once and host re-renders start clean.

use serde::Serialize;
use slim_host::{HostTree, code_regions, text_content};
use slim_types::{NodeId, Prefs};
use tracing::debug;

pub(crate) const CLIP_ATTR: &str = "data-slim-clip";

/// When a code region counts as long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipPolicy {
    /// Clipping switched on.
    pub enabled: bool,
    /// Clip at this many lines or more.
    pub line_threshold: usize,
    /// Clip when taller than this (px).
    pub height_threshold: u32,
}

impl From<&Prefs> for ClipPolicy {
    fn from(prefs: &Prefs) -> Self {
        Self {
            enabled: prefs.collapse_long_code,
            line_threshold: prefs.code_line_threshold,
            height_threshold: prefs.code_height_threshold,
        }
    }
}

impl ClipPolicy {
    /// Whether a region with these measurements should be clipped.
    #[must_use]
    pub fn qualifies(&self, lines: usize, height: u32) -> bool {
        self.enabled && (lines >= self.line_threshold || height > self.height_threshold)
    }
}

/// Display state of a clipped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipState {
    /// Clipped to a short preview.
    Clipped,
    /// Clip control present, full content shown.
    Unclipped,
}

impl ClipState {
    fn as_attr(self) -> &'static str {
        match self {
            Self::Clipped => "clipped",
            Self::Unclipped => "unclipped",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        match value {
            "clipped" => Some(Self::Clipped),
            "unclipped" => Some(Self::Unclipped),
            _ => None,
        }
    }
}

/// Mark every qualifying, not-yet-marked code region in the container.
/// Returns how many regions were newly clipped.
pub fn clip_long_code<T: HostTree + ?Sized>(tree: &mut T, policy: &ClipPolicy) -> usize {
    if !policy.enabled {
        return 0;
    }
    let Some(root) = tree.container() else {
        return 0;
    };
    let fresh: Vec<NodeId> = code_regions(&*tree, root)
        .into_iter()
        .filter(|pre| tree.attr(*pre, CLIP_ATTR).is_none())
        .filter(|pre| {
            let lines = text_content(&*tree, *pre).lines().count();
            policy.qualifies(lines, tree.rendered_height(*pre))
        })
        .collect();
    for pre in &fresh {
        tree.set_attr(*pre, CLIP_ATTR, Some(ClipState::Clipped.as_attr()));
    }
    if !fresh.is_empty() {
        debug!(clipped = fresh.len(), "clipped long code regions");
    }
    fresh.len()
}

/// Current clip state of a region, if it was ever clipped.
#[must_use]
pub fn clip_state<T: HostTree + ?Sized>(tree: &T, pre: NodeId) -> Option<ClipState> {
    tree.attr(pre, CLIP_ATTR).and_then(ClipState::from_attr)
}

/// Flip a clipped region between clipped and unclipped.
/// `None` for regions that were never clipped.
pub fn toggle_clip<T: HostTree + ?Sized>(tree: &mut T, pre: NodeId) -> Option<ClipState> {
    let next = match clip_state(&*tree, pre)? {
        ClipState::Clipped => ClipState::Unclipped,
        ClipState::Unclipped => ClipState::Clipped,
    };
    tree.set_attr(pre, CLIP_ATTR, Some(next.as_attr()));
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slim_host::{CodeSpec, MemoryTree, TurnSpec};

    fn policy() -> ClipPolicy {
        ClipPolicy::from(&Prefs::default())
    }

    fn long_code(lines: usize) -> String {
        (0..lines).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_clip_marks_long_regions_once() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        tree.push_turn(
            main,
            &TurnSpec::assistant("long")
                .with_code(CodeSpec::new("py", &long_code(150)))
                .with_code(CodeSpec::new("py", "short")),
        );
        assert_eq!(clip_long_code(&mut tree, &policy()), 1);
        assert_eq!(clip_long_code(&mut tree, &policy()), 0);
    }

    #[test]
    fn test_clip_by_height() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let mut code = CodeSpec::new("", "tiny");
        code.height = Some(900);
        tree.push_turn(main, &TurnSpec::assistant("tall").with_code(code));
        assert_eq!(clip_long_code(&mut tree, &policy()), 1);
    }

    #[test]
    fn test_disabled_policy_is_noop() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        tree.push_turn(
            main,
            &TurnSpec::assistant("long").with_code(CodeSpec::new("py", &long_code(500))),
        );
        let mut prefs = Prefs::default();
        prefs.collapse_long_code = false;
        assert_eq!(clip_long_code(&mut tree, &ClipPolicy::from(&prefs)), 0);
    }

    #[test]
    fn test_toggle_clip() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let turn = tree.push_turn(
            main,
            &TurnSpec::assistant("long").with_code(CodeSpec::new("py", &long_code(130))),
        );
        let pre = code_regions(&tree, turn)[0];
        assert_eq!(toggle_clip(&mut tree, pre), None);
        clip_long_code(&mut tree, &policy());
        assert_eq!(toggle_clip(&mut tree, pre), Some(ClipState::Unclipped));
        assert_eq!(toggle_clip(&mut tree, pre), Some(ClipState::Clipped));
        assert_eq!(clip_state(&tree, pre), Some(ClipState::Clipped));
    }
}
