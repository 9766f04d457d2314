mod clock;
mod store;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use clock::{LogicalClock, now_millis};
pub use store::{AnnotationStore, ResolutionReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationKind {
    Deletion,
    Insertion,
    Replacement,
    Comment,
    GlobalComment,
}

impl AnnotationKind {
    /// Every kind except deletion carries user-authored text.
    pub fn requires_text(self) -> bool {
        !matches!(self, AnnotationKind::Deletion)
    }

    pub fn is_global(self) -> bool {
        matches!(self, AnnotationKind::GlobalComment)
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnotationKind::Deletion => "deletion",
            AnnotationKind::Insertion => "insertion",
            AnnotationKind::Replacement => "replacement",
            AnnotationKind::Comment => "comment",
            AnnotationKind::GlobalComment => "global comment",
        };
        f.write_str(name)
    }
}

/// Cached rendering position used to re-highlight a range after re-render.
/// Best effort only; text-scan relocation is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationHint {
    /// Tag of the element directly containing the text node.
    pub parent_tag: String,
    /// Index of that element among all elements with the same tag, in preorder.
    pub parent_index: usize,
    /// Character offset within the parent element's text.
    pub text_offset: usize,
}

/// Where an annotation sits in the rendered plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    /// Soft reference to `Block::id`; goes stale when the plan is re-parsed.
    pub block_id: String,
    /// Character offsets within the block's rendered text.
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_meta: Option<RelocationHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_meta: Option<RelocationHint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    /// Targeted text. Empty for global comments.
    pub original_text: String,
    /// Replacement, inserted or comment text. Absent for deletions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_paths: Vec<String>,
    /// Logical timestamp; total order of creation.
    pub created_at: u64,
    /// Unset for restored annotations until the resolver runs.
    #[serde(flatten)]
    pub anchor: Option<Anchor>,
    /// Target text could not be found in the current plan.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub orphaned: bool,
}

impl Annotation {
    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("{kind} annotations require text")]
    MissingText { kind: AnnotationKind },
    #[error("deletion annotations cannot carry text")]
    UnexpectedText,
    #[error("{kind} annotations must target some text")]
    MissingOriginalText { kind: AnnotationKind },
    #[error("no annotation with id {0}")]
    NotFound(String),
}

/// Input to `AnnotationStore::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDraft {
    pub kind: AnnotationKind,
    pub original_text: String,
    pub anchor: Option<Anchor>,
    pub text: Option<String>,
    pub author: Option<String>,
    pub image_paths: Vec<String>,
}

impl AnnotationDraft {
    pub fn new(kind: AnnotationKind, original_text: impl Into<String>) -> Self {
        AnnotationDraft {
            kind,
            original_text: original_text.into(),
            anchor: None,
            text: None,
            author: None,
            image_paths: Vec::new(),
        }
    }

    pub fn global(text: impl Into<String>) -> Self {
        AnnotationDraft::new(AnnotationKind::GlobalComment, "").with_text(text)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.image_paths = images;
        self
    }

    /// Check the draft against the per-kind text rules.
    pub fn validate(&self) -> Result<(), AnnotationError> {
        validate_text(self.kind, self.text.as_deref())?;
        if !self.kind.is_global() && self.original_text.is_empty() {
            return Err(AnnotationError::MissingOriginalText { kind: self.kind });
        }
        Ok(())
    }
}

pub(crate) fn validate_text(kind: AnnotationKind, text: Option<&str>) -> Result<(), AnnotationError> {
    match (kind.requires_text(), text) {
        (true, Some(t)) if !t.trim().is_empty() => Ok(()),
        (true, _) => Err(AnnotationError::MissingText { kind }),
        (false, Some(_)) => Err(AnnotationError::UnexpectedText),
        (false, None) => Ok(()),
    }
}
