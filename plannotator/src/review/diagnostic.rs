use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::Plan;
use crate::annotation::{Anchor, Annotation, AnnotationKind};
use crate::document::{RenderedDocument, char_len};

/// Convert annotations to codespan-reporting diagnostics against the plan source.
pub fn annotation_diagnostics(
    plan: &Plan,
    doc: &RenderedDocument,
    source: &str,
    annotations: &[Annotation],
    file_id: usize,
) -> Vec<Diagnostic<usize>> {
    annotations
        .iter()
        .map(|annotation| to_diagnostic(plan, doc, source, annotation, file_id))
        .collect()
}

fn to_diagnostic(
    plan: &Plan,
    doc: &RenderedDocument,
    source: &str,
    annotation: &Annotation,
    file_id: usize,
) -> Diagnostic<usize> {
    let mut notes = Vec::new();
    if let Some(author) = &annotation.author {
        notes.push(format!("by {}", author));
    }
    for image in &annotation.image_paths {
        notes.push(format!("attachment: {}", image));
    }

    if annotation.kind.is_global() {
        return Diagnostic::note()
            .with_message(format!(
                "global comment: {}",
                annotation.text.as_deref().unwrap_or_default()
            ))
            .with_notes(notes);
    }

    let anchored = annotation
        .anchor
        .as_ref()
        .and_then(|anchor| Some((anchor, plan.block(&anchor.block_id)?)));

    match anchored {
        Some((anchor, block)) if !annotation.orphaned => {
            let occurrence = occurrence_index(doc, anchor, &annotation.original_text);
            let span = source_span(
                source,
                block.span.clone(),
                &annotation.original_text,
                occurrence,
            );
            Diagnostic::note()
                .with_message(annotation.kind.to_string())
                .with_labels(vec![Label::primary(file_id, span).with_message(label(annotation))])
                .with_notes(notes)
        }
        _ => {
            notes.insert(0, format!("original text: {:?}", annotation.original_text));
            Diagnostic::warning()
                .with_message(format!(
                    "{} could not be located in the plan",
                    annotation.kind
                ))
                .with_notes(notes)
        }
    }
}

fn label(annotation: &Annotation) -> String {
    let text = annotation.text.as_deref().unwrap_or_default();
    match annotation.kind {
        AnnotationKind::Deletion => "remove this".to_string(),
        AnnotationKind::Replacement => format!("replace with: {}", text),
        AnnotationKind::Insertion => format!("insert: {}", text),
        AnnotationKind::Comment | AnnotationKind::GlobalComment => text.to_string(),
    }
}

/// How many earlier occurrences of `needle` precede the anchored one in the
/// block's rendered text.
fn occurrence_index(doc: &RenderedDocument, anchor: &Anchor, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let Some(element) = doc
        .blocks()
        .find(|e| e.block_id.as_deref() == Some(anchor.block_id.as_str()))
    else {
        return 0;
    };
    let text = element.text_content();
    text.match_indices(needle)
        .take_while(|(byte, _)| char_len(&text[..*byte]) < anchor.start_offset)
        .count()
}

/// Narrow a block span to the `occurrence`-th verbatim copy of the annotated
/// text in the source. Rendered text can differ from markdown, so the first
/// occurrence also falls back to the first line of the text. Anything else
/// labels the whole block.
fn source_span(
    source: &str,
    block: Range<usize>,
    needle: &str,
    occurrence: usize,
) -> Range<usize> {
    let Some(slice) = source.get(block.clone()) else {
        return block;
    };
    if needle.is_empty() {
        return block;
    }
    if let Some((pos, _)) = slice.match_indices(needle).nth(occurrence) {
        let start = block.start + pos;
        return start..start + needle.len();
    }
    if occurrence == 0 {
        let first_line = needle.lines().next().unwrap_or_default();
        if let Some(pos) = slice.find(first_line).filter(|_| !first_line.is_empty()) {
            let start = block.start + pos;
            return start..start + first_line.len();
        }
    }
    block
}
