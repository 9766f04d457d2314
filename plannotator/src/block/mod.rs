use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// The structural kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Paragraph,
    Heading,
    Blockquote,
    ListItem,
    Code,
    Hr,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading => "heading",
            BlockKind::Blockquote => "blockquote",
            BlockKind::ListItem => "list-item",
            BlockKind::Code => "code",
            BlockKind::Hr => "hr",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structural unit of a parsed plan.
/// Blocks are immutable once parsed; re-parsing replaces the whole sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Stable identifier, `block-{order}`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Raw inline markdown for text blocks, literal text for code, empty for rules.
    pub content: String,
    /// Heading level 1-6. Only set for headings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// Fence info string of a code block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Task-list state of a list item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Position in the document, starting at 0.
    pub order: usize,
    /// 1-based source line of the block's first character.
    pub start_line: usize,
    /// Byte span in source for diagnostics.
    #[serde(skip)]
    pub span: Range<usize>,
}

impl Block {
    pub fn id_for(order: usize) -> String {
        format!("block-{order}")
    }

    /// Inverse of `id_for`.
    pub fn order_of(id: &str) -> Option<usize> {
        id.strip_prefix("block-")?.parse().ok()
    }

    pub fn is_code(&self) -> bool {
        self.kind == BlockKind::Code
    }
}
