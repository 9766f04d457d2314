use plannotator::annotation::{
    AnnotationDraft, AnnotationError, AnnotationKind, AnnotationStore, LogicalClock,
};
use plannotator::document::render;
use plannotator::parser::parse_blocks;
use plannotator::share;

#[test]
fn clock_is_strictly_increasing() {
    let mut clock = LogicalClock::new();
    let mut last = 0;
    for _ in 0..1000 {
        let next = clock.tick();
        assert!(next > last);
        last = next;
    }
}

#[test]
fn clock_moves_past_observed_timestamps() {
    let mut clock = LogicalClock::new();
    let far_future = u64::MAX / 2;
    clock.observe(far_future);
    assert_eq!(clock.tick(), far_future + 1);
    clock.observe(3);
    assert_eq!(clock.last(), far_future + 1);
}

#[test]
fn text_rules_per_kind() {
    let mut store = AnnotationStore::new();

    let err = store
        .create(AnnotationDraft::new(AnnotationKind::Comment, "foo"))
        .unwrap_err();
    assert_eq!(
        err,
        AnnotationError::MissingText {
            kind: AnnotationKind::Comment
        }
    );

    let err = store
        .create(AnnotationDraft::new(AnnotationKind::Replacement, "foo").with_text("   "))
        .unwrap_err();
    assert!(matches!(err, AnnotationError::MissingText { .. }));

    let err = store
        .create(AnnotationDraft::new(AnnotationKind::Deletion, "foo").with_text("bar"))
        .unwrap_err();
    assert_eq!(err, AnnotationError::UnexpectedText);

    let err = store
        .create(AnnotationDraft::new(AnnotationKind::Insertion, "").with_text("bar"))
        .unwrap_err();
    assert_eq!(
        err,
        AnnotationError::MissingOriginalText {
            kind: AnnotationKind::Insertion
        }
    );

    assert!(store.is_empty());
}

#[test]
fn created_annotations_are_ordered() {
    let mut store = AnnotationStore::new();
    store
        .create(AnnotationDraft::new(AnnotationKind::Deletion, "a"))
        .unwrap();
    store
        .create(AnnotationDraft::new(AnnotationKind::Comment, "b").with_text("c"))
        .unwrap();
    store.create(AnnotationDraft::global("d")).unwrap();

    let stamps: Vec<u64> = store.iter().map(|a| a.created_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));

    let ids: Vec<&str> = store.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| id.starts_with("ann-")));
}

#[test]
fn global_comments_drop_target_and_anchor() {
    let mut store = AnnotationStore::new();
    let mut draft = AnnotationDraft::global("overall fine");
    draft.original_text = "ignored".to_string();
    let annotation = store.create(draft).unwrap();
    assert_eq!(annotation.original_text, "");
    assert!(annotation.anchor.is_none());
}

#[test]
fn update_and_remove() {
    let mut store = AnnotationStore::new();
    let id = store
        .create(AnnotationDraft::new(AnnotationKind::Comment, "x").with_text("first"))
        .unwrap()
        .id
        .clone();

    store.update_text(&id, Some("second".to_string())).unwrap();
    assert_eq!(store.get(&id).unwrap().text.as_deref(), Some("second"));

    assert_eq!(
        store.update_text(&id, None),
        Err(AnnotationError::MissingText {
            kind: AnnotationKind::Comment
        })
    );
    assert_eq!(store.get(&id).unwrap().text.as_deref(), Some("second"));

    assert_eq!(
        store.update_text("missing", Some("x".to_string())),
        Err(AnnotationError::NotFound("missing".to_string()))
    );

    assert!(store.remove(&id).is_some());
    assert!(store.remove(&id).is_none());
    assert!(store.is_empty());
}

#[test]
fn new_annotations_sort_after_restored_ones() {
    let payload = share::SharePayload {
        p: "plan".to_string(),
        a: vec![share::ShareableAnnotation::Deletion {
            original: "plan".to_string(),
            attribution: share::Attribution::default(),
        }],
        g: None,
    };
    let far_future = u64::MAX / 4;
    let restored = share::restore_at(payload, far_future);

    let mut store = AnnotationStore::new();
    store.extend_restored(restored.annotations);
    let created = store
        .create(AnnotationDraft::global("after"))
        .unwrap()
        .created_at;
    assert!(created > far_future);
    assert_eq!(store.as_slice().last().unwrap().text.as_deref(), Some("after"));
}

#[test]
fn resolve_flags_orphans_and_keeps_them() {
    let doc = render(&parse_blocks("# Title\n\nSome text here."));
    let mut store = AnnotationStore::new();
    store
        .create(AnnotationDraft::new(AnnotationKind::Deletion, "text here"))
        .unwrap();
    let orphan_id = store
        .create(AnnotationDraft::new(AnnotationKind::Comment, "gone").with_text("?"))
        .unwrap()
        .id
        .clone();
    store.create(AnnotationDraft::global("ok")).unwrap();

    let report = store.resolve(&doc);
    assert_eq!(report.anchored, 1);
    assert_eq!(report.global, 1);
    assert_eq!(report.orphaned, vec![orphan_id.clone()]);

    assert_eq!(store.len(), 3);
    let orphan = store.get(&orphan_id).unwrap();
    assert!(orphan.orphaned);
    assert!(orphan.anchor.is_none());

    let anchored = &store.as_slice()[0];
    let anchor = anchored.anchor.as_ref().unwrap();
    assert_eq!(anchor.block_id, "block-1");
    assert_eq!((anchor.start_offset, anchor.end_offset), (5, 14));
    assert!(!anchored.orphaned);
}

#[test]
fn annotation_json_shape() {
    let doc = render(&parse_blocks("Some text here."));
    let mut store = AnnotationStore::new();
    store
        .create(AnnotationDraft::new(AnnotationKind::Replacement, "text").with_text("words"))
        .unwrap();
    store.resolve(&doc);

    let value = serde_json::to_value(&store.as_slice()[0]).unwrap();
    assert_eq!(value["type"], "REPLACEMENT");
    assert_eq!(value["originalText"], "text");
    assert_eq!(value["text"], "words");
    assert_eq!(value["blockId"], "block-0");
    assert_eq!(value["startOffset"], 5);
    assert_eq!(value["endOffset"], 9);
    assert_eq!(value["startMeta"]["parentTag"], "p");
    assert!(value.get("author").is_none());
}
