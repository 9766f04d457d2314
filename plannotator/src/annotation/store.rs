use crate::annotation::{Annotation, AnnotationDraft, AnnotationError, LogicalClock, validate_text};
use crate::document::RenderedDocument;
use crate::resolver::{self, Resolution};

/// Session-owned, ordered collection of annotations.
/// Order is creation order (`created_at`), which is also share-tuple order.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    clock: LogicalClock,
}

/// Outcome of resolving every annotation against a rendered plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub anchored: usize,
    pub global: usize,
    /// Ids of annotations whose target text is missing from the plan.
    pub orphaned: Vec<String>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        AnnotationStore::default()
    }

    /// Validate and append a new annotation. Nothing is stored on error.
    pub fn create(&mut self, draft: AnnotationDraft) -> Result<&Annotation, AnnotationError> {
        draft.validate()?;
        let created_at = self.clock.tick();
        let global = draft.kind.is_global();
        let annotation = Annotation {
            id: format!("ann-{created_at}"),
            kind: draft.kind,
            original_text: if global { String::new() } else { draft.original_text },
            text: draft.text,
            author: draft.author,
            image_paths: draft.image_paths,
            created_at,
            anchor: if global { None } else { draft.anchor },
            orphaned: false,
        };
        tracing::debug!(id = %annotation.id, kind = %annotation.kind, "annotation created");
        let idx = self.annotations.len();
        self.annotations.push(annotation);
        Ok(&self.annotations[idx])
    }

    /// Author edit of the annotation text. The per-kind text rules still apply.
    pub fn update_text(&mut self, id: &str, text: Option<String>) -> Result<(), AnnotationError> {
        let annotation = self
            .annotations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AnnotationError::NotFound(id.to_string()))?;
        validate_text(annotation.kind, text.as_deref())?;
        annotation.text = text;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Annotation> {
        let idx = self.annotations.iter().position(|a| a.id == id)?;
        Some(self.annotations.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
    }

    /// Add annotations rebuilt from a share payload, keeping their order and
    /// moving the clock past them.
    pub fn extend_restored(&mut self, restored: Vec<Annotation>) {
        for annotation in restored {
            self.clock.observe(annotation.created_at);
            self.annotations.push(annotation);
        }
        self.annotations.sort_by_key(|a| a.created_at);
    }

    /// Anchor every annotation in `doc`. Unlocatable ones are kept and flagged.
    pub fn resolve(&mut self, doc: &RenderedDocument) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        for annotation in &mut self.annotations {
            match resolver::highlight(doc, annotation) {
                Resolution::Anchored(located) => {
                    annotation.anchor = Some(located.to_anchor(doc));
                    annotation.orphaned = false;
                    report.anchored += 1;
                }
                Resolution::Global => report.global += 1,
                Resolution::Orphaned => {
                    tracing::warn!(
                        id = %annotation.id,
                        original = %annotation.original_text,
                        "annotation target not found in plan"
                    );
                    annotation.anchor = None;
                    annotation.orphaned = true;
                    report.orphaned.push(annotation.id.clone());
                }
            }
        }
        report
    }
}
