use codespan_reporting::diagnostic::Severity;
use plannotator::annotation::AnnotationKind;
use plannotator::document::{DomPoint, DomRange};
use plannotator::review::{ReviewError, ReviewSession};

const PLAN: &str = "# Title\n\nSome text here.\n\n- step one\n- step two\n";

#[test]
fn annotate_selection() {
    let mut session = ReviewSession::new(PLAN);
    let range = DomRange {
        start: DomPoint::new(vec![1, 0], 5),
        end: DomPoint::new(vec![1, 0], 14),
    };
    let annotation = session
        .annotate(
            AnnotationKind::Replacement,
            &range,
            Some("content here".to_string()),
            None,
        )
        .unwrap();
    assert_eq!(annotation.original_text, "text here");
    assert_eq!(annotation.anchor.as_ref().unwrap().block_id, "block-1");
}

#[test]
fn invalid_annotations_are_not_stored() {
    let mut session = ReviewSession::new(PLAN);
    let err = session
        .annotate_text(AnnotationKind::Comment, "step one", None, None)
        .unwrap_err();
    assert!(matches!(err, ReviewError::Annotation(_)));

    let err = session
        .annotate_text(AnnotationKind::Deletion, "not in plan", None, None)
        .unwrap_err();
    assert!(matches!(err, ReviewError::TextNotFound(_)));

    assert!(session.annotations().is_empty());
}

#[test]
fn shared_session_restores_anchored() {
    let mut session = ReviewSession::new(PLAN);
    session
        .annotate_text(
            AnnotationKind::Replacement,
            "text here",
            Some("content here".to_string()),
            Some("ada".to_string()),
        )
        .unwrap();
    session
        .annotate_text(AnnotationKind::Deletion, "step two", None, None)
        .unwrap();
    session.add_global_comment("looks good overall", None).unwrap();
    session.attach_global("/tmp/sketch.png");

    let fragment = session.share_fragment().unwrap();
    let restored = ReviewSession::from_share(&format!("https://share.plannotator.ai/#{fragment}"))
        .expect("valid share");

    assert_eq!(restored.source(), PLAN);
    assert_eq!(restored.global_attachments(), ["/tmp/sketch.png".to_string()]);
    assert_eq!(restored.annotations().len(), 3);
    assert_eq!(restored.orphans().count(), 0);

    let annotations = restored.annotations().as_slice();
    assert_eq!(annotations[0].kind, AnnotationKind::Replacement);
    assert_eq!(annotations[0].author.as_deref(), Some("ada"));
    assert_eq!(annotations[0].anchor.as_ref().unwrap().block_id, "block-1");
    assert_eq!(annotations[1].anchor.as_ref().unwrap().block_id, "block-3");
    assert!(annotations[2].anchor.is_none());
    assert!(annotations[0].created_at < annotations[1].created_at);
}

#[test]
fn no_share_data_is_not_an_error() {
    assert!(ReviewSession::from_share("").is_none());
    assert!(ReviewSession::from_share("https://share.plannotator.ai/").is_none());
    assert!(ReviewSession::from_share("#definitely-not-a-payload").is_none());
}

#[test]
fn edited_plan_orphans_missing_targets() {
    let mut session = ReviewSession::new(PLAN);
    session
        .annotate_text(AnnotationKind::Deletion, "step two", None, None)
        .unwrap();
    session
        .annotate_text(
            AnnotationKind::Comment,
            "Title",
            Some("rename".to_string()),
            None,
        )
        .unwrap();

    let session = session.with_plan("# Title\n\n- step one\n");
    let orphans: Vec<&str> = session
        .orphans()
        .map(|a| a.original_text.as_str())
        .collect();
    assert_eq!(orphans, vec!["step two"]);
    assert_eq!(session.annotations().len(), 2);

    // Orphans still travel with the share
    let fragment = session.share_fragment().unwrap();
    let restored = ReviewSession::from_share(&fragment).unwrap();
    assert_eq!(restored.orphans().count(), 1);
}

#[test]
fn diagnostics_cover_every_annotation() {
    let mut session = ReviewSession::new(PLAN);
    session
        .annotate_text(
            AnnotationKind::Comment,
            "step one",
            Some("why first?".to_string()),
            None,
        )
        .unwrap();
    session.add_global_comment("ship it", None).unwrap();
    let mut session = session.with_plan("# Title\n\nSome text here.\n");

    let diagnostics = session.diagnostics(0);
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(diagnostics[1].severity, Severity::Note);
    assert!(diagnostics[1].labels.is_empty());

    session.annotations_mut().clear();
    session
        .annotate_text(AnnotationKind::Deletion, "text here", None, None)
        .unwrap();
    let diagnostics = session.diagnostics(0);
    let label = &diagnostics[0].labels[0];
    assert_eq!(&session.source()[label.range.clone()], "text here");
}

#[test]
fn numbered_step_heading_survives_share() {
    let plan = "# Plan\n\n### 2. Migrate the schema\n\nRun the migration.\n";
    let mut session = ReviewSession::new(plan);
    let annotation = session
        .annotate_text(
            AnnotationKind::Comment,
            "2. Migrate the schema",
            Some("which schema?".to_string()),
            None,
        )
        .unwrap();
    assert_eq!(annotation.anchor.as_ref().unwrap().block_id, "block-1");

    let fragment = session.share_fragment().unwrap();
    let restored = ReviewSession::from_share(&fragment).unwrap();
    assert_eq!(restored.orphans().count(), 0);
}

#[test]
fn diagnostic_labels_the_selected_occurrence() {
    let mut session = ReviewSession::new("Say hi and hi again.\n");
    let range = DomRange {
        start: DomPoint::new(vec![0, 0], 11),
        end: DomPoint::new(vec![0, 0], 13),
    };
    session
        .annotate(
            AnnotationKind::Comment,
            &range,
            Some("second one".to_string()),
            None,
        )
        .unwrap();

    let diagnostics = session.diagnostics(0);
    assert_eq!(diagnostics[0].labels[0].range, 11..13);
}
