//! Serializable conversation description used to populate a [`MemoryTree`](crate::MemoryTree).

use std::path::Path;

use serde::{Deserialize, Serialize};
use slim_types::{Role, SlimError, SlimResult};

/// A conversation as a list of turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcript {
    /// Page title, used for export headings and filenames.
    #[serde(default)]
    pub title: String,
    /// Turns in conversation order.
    #[serde(default)]
    pub turns: Vec<TurnSpec>,
}

/// One rendered turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnSpec {
    /// Host message id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Author role.
    pub role: Role,
    /// Optional heading rendered above the body.
    #[serde(default)]
    pub heading: Option<String>,
    /// Body paragraphs.
    #[serde(default)]
    pub paragraphs: Vec<String>,
    /// Fenced code regions.
    #[serde(default)]
    pub code: Vec<CodeSpec>,
    /// Present in the tree but not laid out.
    #[serde(default)]
    pub hidden: bool,
}

/// A code region inside a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeSpec {
    /// Language tag (`rust`, `sh`, ...), empty when unknown.
    #[serde(default)]
    pub language: String,
    /// Source text.
    pub text: String,
    /// Rendered height override in pixels.
    #[serde(default)]
    pub height: Option<u32>,
}

impl Transcript {
    /// Parse a transcript from JSON text.
    pub fn from_json(json: &str) -> SlimResult<Self> {
        let transcript: Self = serde_json::from_str(json)?;
        Ok(transcript)
    }

    /// Read and parse a transcript file.
    pub fn load(path: &Path) -> SlimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|err| match err {
            SlimError::Serialization(inner) => {
                SlimError::InvalidInput(format!("{}: {inner}", path.display()))
            }
            other => other,
        })
    }
}

impl TurnSpec {
    /// User turn with one paragraph.
    #[must_use]
    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            paragraphs: vec![text.to_string()],
            ..Self::default()
        }
    }

    /// Assistant turn with one paragraph.
    #[must_use]
    pub fn assistant(text: &str) -> Self {
        Self {
            role: Role::Assistant,
            paragraphs: vec![text.to_string()],
            ..Self::default()
        }
    }

    /// Set the host message id.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Set the heading.
    #[must_use]
    pub fn with_heading(mut self, heading: &str) -> Self {
        self.heading = Some(heading.to_string());
        self
    }

    /// Append a code region.
    #[must_use]
    pub fn with_code(mut self, code: CodeSpec) -> Self {
        self.code.push(code);
        self
    }

    /// Mark the turn as not laid out.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

impl CodeSpec {
    /// Code region with the given language and text.
    #[must_use]
    pub fn new(language: &str, text: &str) -> Self {
        Self {
            language: language.to_string(),
            text: text.to_string(),
            height: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_from_json_defaults() {
        let transcript = Transcript::from_json(
            r#"{"title":"t","turns":[{"role":"assistant","code":[{"text":"x"}]}]}"#,
        )
        .unwrap();
        assert_eq!(transcript.turns.len(), 1);
        let turn = &transcript.turns[0];
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.paragraphs.is_empty());
        assert_eq!(turn.code[0].language, "");
        assert!(!turn.hidden);
    }

    #[test]
    fn test_transcript_rejects_bad_role() {
        assert!(Transcript::from_json(r#"{"turns":[{"role":"robot"}]}"#).is_err());
    }
}
