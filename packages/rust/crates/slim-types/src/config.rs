//! Retention configuration, cosmetic preferences and small shared enums.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Default number of most recent items kept fully rendered.
pub const DEFAULT_KEEP_LAST: i64 = 8;

/// Author role of a conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Turn written by the human.
    #[default]
    User,
    /// Turn produced by the model.
    Assistant,
}

impl Role {
    /// Parse a host role attribute (`data-message-author-role`).
    #[must_use]
    pub fn from_attr(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Capitalized label used in headings and badges.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an apply pass treats pinned items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Pinned and selected items are both exempt.
    #[default]
    Normal,
    /// Pinned items are collapsed too. Selected items stay exempt.
    ForceIgnorePin,
}

impl ApplyMode {
    /// Whether this mode overrides the pinned exemption.
    #[must_use]
    pub const fn ignores_pin(self) -> bool {
        matches!(self, Self::ForceIgnorePin)
    }
}

/// Configured keep-count, stored as written and coerced when read.
///
/// Deserialization is lenient: numbers, numeric strings (`"12"`, `"12px"`)
/// and garbage are all accepted. Anything non-numeric reads as `0`, which
/// [`KeepLast::effective`] lifts to `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeepLast(i64);

impl KeepLast {
    /// Wrap a raw configured value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Value as configured, possibly `<= 0`.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Keep-count used by the retention policy, always `>= 1`.
    #[must_use]
    pub fn effective(self) -> usize {
        usize::try_from(self.0.max(1)).unwrap_or(1)
    }
}

impl Default for KeepLast {
    fn default() -> Self {
        Self(DEFAULT_KEEP_LAST)
    }
}

impl From<i64> for KeepLast {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl<'de> Deserialize<'de> for KeepLast {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self(lenient_integer(&value)))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => parse_int_prefix(s).unwrap_or(0),
        _ => 0,
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits.
fn parse_int_prefix(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let magnitude: i64 = digits.parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse keep-count text typed into the settings panel.
///
/// Empty, non-numeric and zero input fall back to [`DEFAULT_KEEP_LAST`];
/// negative input clamps to `1`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_keep_last_input(input: &str) -> i64 {
    let parsed = input.trim().parse::<f64>().ok().filter(|f| f.is_finite());
    match parsed {
        Some(value) if value != 0.0 => (value.trunc() as i64).max(1),
        _ => DEFAULT_KEEP_LAST,
    }
}

/// Retention configuration consumed by the window core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetentionConfig {
    /// Number of most recent items kept fully rendered.
    pub keep_last: KeepLast,
    /// Whether mutation-triggered application is enabled.
    pub auto_apply: bool,
}

impl RetentionConfig {
    /// Build a config with the given keep-count and auto-apply on.
    #[must_use]
    pub fn keeping(keep_last: i64) -> Self {
        Self {
            keep_last: KeepLast::new(keep_last),
            auto_apply: true,
        }
    }

    /// Effective keep-count, always `>= 1`.
    #[must_use]
    pub fn keep(&self) -> usize {
        self.keep_last.effective()
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_last: KeepLast::default(),
            auto_apply: true,
        }
    }
}

/// Cosmetic and clipping preferences owned by the panel collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prefs {
    /// Clip long code regions behind an expand control.
    pub collapse_long_code: bool,
    /// Line count at which a code region is clipped.
    pub code_line_threshold: usize,
    /// Rendered height (px) above which a code region is clipped.
    pub code_height_threshold: u32,
    /// Disable host animations.
    pub reduce_motion: bool,
    /// Show per-item selection overlays.
    pub selection_mode: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            collapse_long_code: true,
            code_line_threshold: 120,
            code_height_threshold: 600,
            reduce_motion: false,
            selection_mode: false,
        }
    }
}

/// Everything that persists across sessions, as one flat key-value document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Retention policy inputs.
    #[serde(flatten)]
    pub retention: RetentionConfig,
    /// Cosmetic preferences.
    #[serde(flatten)]
    pub prefs: Prefs,
}
