use crate::annotation::{Anchor, RelocationHint};
use crate::document::{DomPoint, DomRange, Node, RenderedDocument, char_len};
use crate::resolver::ResolveError;

/// A resolved user selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selected {
    pub anchor: Anchor,
    /// The selected text, which becomes the annotation's `original_text`.
    pub text: String,
}

/// Resolve a selection into block-relative offsets and relocation hints.
pub fn select(doc: &RenderedDocument, range: &DomRange) -> Result<Selected, ResolveError> {
    let (start, end) = if (&range.end.path, range.end.offset) < (&range.start.path, range.start.offset) {
        (&range.end, &range.start)
    } else {
        (&range.start, &range.end)
    };

    let (start_block, start_offset) = block_offset(doc, start)?;
    let (end_block, end_offset) = block_offset(doc, end)?;
    if start_block != end_block {
        return Err(ResolveError::CrossBlock {
            start: start_block,
            end: end_block,
        });
    }

    let text = doc.extract(start, end).unwrap_or_default();
    Ok(Selected {
        anchor: Anchor {
            block_id: start_block,
            start_offset,
            end_offset,
            start_meta: hint_for(doc, start),
            end_meta: hint_for(doc, end),
        },
        text,
    })
}

/// Owning block id and character offset of `point` within that block's text.
pub(crate) fn block_offset(
    doc: &RenderedDocument,
    point: &DomPoint,
) -> Result<(String, usize), ResolveError> {
    let text = doc
        .text_at(&point.path)
        .ok_or_else(|| ResolveError::NotTextNode(point.path.clone()))?;
    let len = char_len(text);
    if point.offset > len {
        return Err(ResolveError::OffsetOutOfBounds {
            offset: point.offset,
            len,
        });
    }

    let (&block_index, within) = point.path.split_first().ok_or(ResolveError::OutsideBlock)?;
    let block = match doc.root.children.get(block_index) {
        Some(Node::Element(e)) => e,
        _ => return Err(ResolveError::OutsideBlock),
    };
    let block_id = block.block_id.clone().ok_or(ResolveError::OutsideBlock)?;

    let mut preceding = 0;
    for (rel, node_text) in block.text_nodes() {
        if rel == within {
            return Ok((block_id, preceding + point.offset));
        }
        preceding += char_len(node_text);
    }
    Err(ResolveError::OutsideBlock)
}

/// Structural context of a text point: parent tag, its index among
/// same-tag elements in preorder, and the offset within the parent's text.
pub fn hint_for(doc: &RenderedDocument, point: &DomPoint) -> Option<RelocationHint> {
    let (_, parent_path) = point.path.split_last()?;
    if parent_path.is_empty() {
        return None;
    }
    let parent = doc.element_at(parent_path)?;

    let parent_index = doc
        .elements()
        .into_iter()
        .filter(|(_, e)| e.tag == parent.tag)
        .position(|(path, _)| path == parent_path)?;

    let child_index = point.path.last()?;
    let mut text_offset = point.offset;
    for (rel, text) in parent.text_nodes() {
        if rel.first()? >= child_index {
            break;
        }
        text_offset += char_len(text);
    }

    Some(RelocationHint {
        parent_tag: parent.tag.clone(),
        parent_index,
        text_offset,
    })
}
