//! Mapping between annotations and positions in a rendered plan.
//!
//! The forward direction turns a selection into block-relative offsets plus
//! relocation hints. The reverse direction finds a bare text snippet again,
//! which is how shared annotations are re-anchored after restoration.
//! Everything here is a pure function of the rendered document.

mod forward;
mod reverse;

use thiserror::Error;

use crate::annotation::{Anchor, Annotation};
use crate::document::{DomPoint, RenderedDocument};

pub use forward::{Selected, hint_for, select};
pub use reverse::{locate, relocate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("selection point {0:?} is not a text node")]
    NotTextNode(Vec<usize>),
    #[error("offset {offset} is past the end of a {len}-character text node")]
    OffsetOutOfBounds { offset: usize, len: usize },
    #[error("selection point is not inside a block")]
    OutsideBlock,
    #[error("selection spans blocks {start} and {end}")]
    CrossBlock { start: String, end: String },
}

/// A located range in the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub block_id: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub start: DomPoint,
    pub end: DomPoint,
}

impl Located {
    pub fn to_anchor(&self, doc: &RenderedDocument) -> Anchor {
        Anchor {
            block_id: self.block_id.clone(),
            start_offset: self.start_offset,
            end_offset: self.end_offset,
            start_meta: hint_for(doc, &self.start),
            end_meta: hint_for(doc, &self.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Anchored(Located),
    /// Global comments have nothing to anchor.
    Global,
    Orphaned,
}

/// Find where an annotation belongs in `doc`.
///
/// Relocation hints are tried first and accepted only if they still cover
/// exactly `original_text`; otherwise the first text match wins.
pub fn highlight(doc: &RenderedDocument, annotation: &Annotation) -> Resolution {
    if annotation.kind.is_global() {
        return Resolution::Global;
    }

    if let Some(located) = annotation
        .anchor
        .as_ref()
        .and_then(|anchor| from_hints(doc, anchor, &annotation.original_text))
    {
        return Resolution::Anchored(located);
    }

    tracing::trace!(id = %annotation.id, "relocation hints unusable, scanning text");
    match locate(doc, &annotation.original_text) {
        Some(located) => Resolution::Anchored(located),
        None => Resolution::Orphaned,
    }
}

fn from_hints(doc: &RenderedDocument, anchor: &Anchor, original: &str) -> Option<Located> {
    let start = relocate(doc, anchor.start_meta.as_ref()?)?;
    let end = relocate(doc, anchor.end_meta.as_ref()?)?;
    if doc.extract(&start, &end)? != original {
        return None;
    }
    let (start_block, start_offset) = forward::block_offset(doc, &start).ok()?;
    let (end_block, end_offset) = forward::block_offset(doc, &end).ok()?;
    if start_block != end_block {
        return None;
    }
    Some(Located {
        block_id: start_block,
        start_offset,
        end_offset,
        start,
        end,
    })
}
