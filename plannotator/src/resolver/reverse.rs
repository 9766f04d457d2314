use crate::annotation::RelocationHint;
use crate::document::{DomPoint, Node, RenderedDocument, char_len};
use crate::resolver::Located;

/// Find the first exact occurrence of `needle`, walking blocks in document
/// order and text nodes within each block, accumulating text length.
///
/// Code blocks are matched against their bound raw text instead of the
/// flowing text. Returns `None` for an empty needle or no occurrence.
pub fn locate(doc: &RenderedDocument, needle: &str) -> Option<Located> {
    if needle.is_empty() {
        return None;
    }
    let needle_len = char_len(needle);

    for (index, node) in doc.root.children.iter().enumerate() {
        let Node::Element(block) = node else {
            continue;
        };
        let Some(block_id) = &block.block_id else {
            continue;
        };

        if let Some(bind_id) = &block.bind_id {
            let Some(raw) = doc.bound_text(bind_id) else {
                continue;
            };
            if let Some(start) = find_chars(raw, needle) {
                let end = start + needle_len;
                return Some(Located {
                    block_id: block_id.clone(),
                    start_offset: start,
                    end_offset: end,
                    start: DomPoint::new(vec![index, 0], start),
                    end: DomPoint::new(vec![index, 0], end),
                });
            }
            continue;
        }

        // (absolute path, first char, one past last char)
        let mut segments: Vec<(Vec<usize>, usize, usize)> = Vec::new();
        let mut text = String::new();
        let mut acc = 0;
        for (rel, node_text) in block.text_nodes() {
            let len = char_len(node_text);
            let mut path = Vec::with_capacity(rel.len() + 1);
            path.push(index);
            path.extend(rel);
            segments.push((path, acc, acc + len));
            text.push_str(node_text);
            acc += len;
        }

        if let Some(start) = find_chars(&text, needle) {
            let end = start + needle_len;
            let start_point = segments
                .iter()
                .find(|(_, from, to)| start >= *from && start < *to)
                .map(|(path, from, _)| DomPoint::new(path.clone(), start - from))?;
            let end_point = segments
                .iter()
                .find(|(_, from, to)| end > *from && end <= *to)
                .map(|(path, from, _)| DomPoint::new(path.clone(), end - from))?;
            return Some(Located {
                block_id: block_id.clone(),
                start_offset: start,
                end_offset: end,
                start: start_point,
                end: end_point,
            });
        }
    }

    None
}

/// Turn a relocation hint back into a point, if the structure still matches.
pub fn relocate(doc: &RenderedDocument, hint: &RelocationHint) -> Option<DomPoint> {
    let (path, parent) = doc
        .elements()
        .into_iter()
        .filter(|(_, e)| e.tag == hint.parent_tag)
        .nth(hint.parent_index)?;

    let mut acc = 0;
    for (rel, text) in parent.text_nodes() {
        let len = char_len(text);
        if hint.text_offset <= acc + len {
            let mut full = path.clone();
            full.extend(rel);
            return Some(DomPoint::new(full, hint.text_offset - acc));
        }
        acc += len;
    }
    None
}

/// Character index of the first occurrence of `needle` in `haystack`.
fn find_chars(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte| char_len(&haystack[..byte]))
}
