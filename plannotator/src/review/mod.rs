mod diagnostic;

pub use diagnostic::annotation_diagnostics;

use codespan_reporting::diagnostic::Diagnostic;

use crate::Plan;
use crate::annotation::{
    Annotation, AnnotationDraft, AnnotationError, AnnotationKind, AnnotationStore, ResolutionReport,
};
use crate::document::{DomRange, RenderedDocument, render};
use crate::parser::Parser;
use crate::resolver::{self, ResolveError};
use crate::share::{self, ShareError};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("text not found in plan: {0:?}")]
    TextNotFound(String),
}

/// One review session: a plan, its rendering, and the annotations on it.
/// The session exclusively owns its annotation list.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    source: String,
    plan: Plan,
    document: RenderedDocument,
    annotations: AnnotationStore,
    global_attachments: Vec<String>,
}

impl ReviewSession {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let plan = Parser::new(source.clone(), 0).parse();
        let document = render(&plan.blocks);
        ReviewSession {
            source,
            plan,
            document,
            annotations: AnnotationStore::new(),
            global_attachments: Vec::new(),
        }
    }

    /// Restore a shared session. `None` when the input holds no valid payload.
    pub fn from_share(input: &str) -> Option<Self> {
        let payload = share::decode_fragment(input)?;
        let restored = share::restore(payload);
        let mut session = ReviewSession::new(restored.plan);
        session.annotations.extend_restored(restored.annotations);
        session.global_attachments = restored.global_attachments;
        let report = session.resolve();
        tracing::info!(
            anchored = report.anchored,
            orphaned = report.orphaned.len(),
            "restored shared review"
        );
        Some(session)
    }

    /// Swap in a new plan text, keeping annotations and re-anchoring them.
    pub fn with_plan(mut self, source: impl Into<String>) -> Self {
        let source = source.into();
        self.plan = Parser::new(source.clone(), self.plan.source_id).parse();
        self.document = render(&self.plan.blocks);
        self.source = source;
        self.resolve();
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn document(&self) -> &RenderedDocument {
        &self.document
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut AnnotationStore {
        &mut self.annotations
    }

    pub fn global_attachments(&self) -> &[String] {
        &self.global_attachments
    }

    pub fn attach_global(&mut self, path: impl Into<String>) {
        self.global_attachments.push(path.into());
    }

    pub fn resolve(&mut self) -> ResolutionReport {
        self.annotations.resolve(&self.document)
    }

    /// Forward path: annotate a selection in the rendered plan.
    pub fn annotate(
        &mut self,
        kind: AnnotationKind,
        range: &DomRange,
        text: Option<String>,
        author: Option<String>,
    ) -> Result<&Annotation, ReviewError> {
        let selected = resolver::select(&self.document, range)?;
        let draft = AnnotationDraft {
            kind,
            original_text: selected.text,
            anchor: Some(selected.anchor),
            text,
            author,
            image_paths: Vec::new(),
        };
        Ok(self.annotations.create(draft)?)
    }

    /// Annotate the first occurrence of `needle` in the plan.
    pub fn annotate_text(
        &mut self,
        kind: AnnotationKind,
        needle: &str,
        text: Option<String>,
        author: Option<String>,
    ) -> Result<&Annotation, ReviewError> {
        let located = resolver::locate(&self.document, needle)
            .ok_or_else(|| ReviewError::TextNotFound(needle.to_string()))?;
        let draft = AnnotationDraft {
            kind,
            original_text: needle.to_string(),
            anchor: Some(located.to_anchor(&self.document)),
            text,
            author,
            image_paths: Vec::new(),
        };
        Ok(self.annotations.create(draft)?)
    }

    pub fn add_global_comment(
        &mut self,
        text: impl Into<String>,
        author: Option<String>,
    ) -> Result<&Annotation, ReviewError> {
        let mut draft = AnnotationDraft::global(text);
        draft.author = author;
        Ok(self.annotations.create(draft)?)
    }

    pub fn orphans(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(|a| a.orphaned)
    }

    /// One note per anchored annotation, one warning per orphan.
    pub fn diagnostics(&self, file_id: usize) -> Vec<Diagnostic<usize>> {
        annotation_diagnostics(
            &self.plan,
            &self.document,
            &self.source,
            self.annotations.as_slice(),
            file_id,
        )
    }

    /// Encode the session as a share fragment (without `#`).
    pub fn share_fragment(&self) -> Result<String, ShareError> {
        share::encode(
            &self.source,
            self.annotations.as_slice(),
            &self.global_attachments,
        )
    }
}
