use std::cmp::Ordering;
use std::fmt::Write;

use plannotator::annotation::{Annotation, AnnotationKind};
use plannotator::block::Block;

const SECTIONS: &[(AnnotationKind, &str)] = &[
    (AnnotationKind::Deletion, "Deletions"),
    (AnnotationKind::Replacement, "Replacements"),
    (AnnotationKind::Insertion, "Insertions"),
    (AnnotationKind::Comment, "Comments"),
    (AnnotationKind::GlobalComment, "General"),
];

/// Render annotations as markdown feedback for the plan author.
///
/// Sections follow a fixed kind order. Inside a section, anchored items come
/// in source order and unanchored ones follow by creation time; numbering
/// runs across sections.
pub fn export_feedback(annotations: &[Annotation], global_attachments: &[String]) -> String {
    let mut out = String::from("# Plan Feedback\n\n");
    let _ = writeln!(out, "{}\n", count_line(annotations.len()));

    let mut number = 0;
    for (kind, title) in SECTIONS {
        let mut items: Vec<&Annotation> = annotations.iter().filter(|a| a.kind == *kind).collect();
        if items.is_empty() {
            continue;
        }
        items.sort_by(|a, b| source_order(a, b));

        let _ = writeln!(out, "## {}\n", title);
        for annotation in items {
            number += 1;
            write_item(&mut out, number, annotation);
        }
        out.push('\n');
    }

    if !global_attachments.is_empty() {
        out.push_str("## Attachments\n\n");
        for path in global_attachments {
            let _ = writeln!(out, "- {}", path);
        }
        out.push('\n');
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

fn count_line(n: usize) -> String {
    match n {
        0 => "No annotations.".to_string(),
        1 => "1 annotation.".to_string(),
        n => format!("{} annotations.", n),
    }
}

/// (block order, start offset) for anchored items, then `created_at`.
fn source_order(a: &Annotation, b: &Annotation) -> Ordering {
    let position = |annotation: &Annotation| {
        annotation.anchor.as_ref().map(|anchor| {
            (
                Block::order_of(&anchor.block_id).unwrap_or(usize::MAX),
                anchor.start_offset,
            )
        })
    };
    match (position(a), position(b)) {
        (Some(pa), Some(pb)) => pa.cmp(&pb).then(a.created_at.cmp(&b.created_at)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.created_at.cmp(&b.created_at),
    }
}

fn write_item(out: &mut String, number: usize, annotation: &Annotation) {
    let text = annotation.text.as_deref().unwrap_or_default();
    let original = &annotation.original_text;
    let headline = match annotation.kind {
        AnnotationKind::Deletion => format!("Remove {}", quote(original)),
        AnnotationKind::Replacement => {
            format!("Replace {} with {}", quote(original), quote(text))
        }
        AnnotationKind::Insertion => format!("After {}, insert {}", quote(original), quote(text)),
        AnnotationKind::Comment => format!("On {}: {}", quote(original), text),
        AnnotationKind::GlobalComment => text.to_string(),
    };

    let _ = writeln!(out, "{}. {}", number, indent(&headline));
    if annotation.orphaned {
        out.push_str("   _Not found in the current plan._\n");
    }
    if let Some(author) = &annotation.author {
        let _ = writeln!(out, "   (by {})", author);
    }
    for image in &annotation.image_paths {
        let _ = writeln!(out, "   - attachment: {}", image);
    }
}

fn quote(text: &str) -> String {
    if text.contains('\n') {
        format!("\n```\n{}\n```\n", text)
    } else {
        format!("\"{}\"", text)
    }
}

/// Keep continuation lines inside the numbered list item.
fn indent(text: &str) -> String {
    let mut lines = text.lines();
    let mut out = lines.next().unwrap_or_default().trim_end().to_string();
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str("   ");
            out.push_str(line.trim_end());
        }
    }
    out
}
