use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use plannotator::annotation::{AnnotationDraft, AnnotationKind, AnnotationStore};
use plannotator::share::{
    self, Attribution, ShareError, SharePayload, ShareableAnnotation, decode, encode,
};
use proptest::prelude::*;
use serde_json::json;

const PLAN: &str = "# Title\n\nSome text here.";

fn store_with(drafts: Vec<AnnotationDraft>) -> AnnotationStore {
    let mut store = AnnotationStore::new();
    for draft in drafts {
        store.create(draft).expect("valid draft");
    }
    store
}

fn deflate_base64(bytes: &[u8]) -> String {
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(bytes).unwrap();
    URL_SAFE_NO_PAD.encode(encoder.finish().unwrap())
}

#[test]
fn replacement_round_trip() {
    let store = store_with(vec![
        AnnotationDraft::new(AnnotationKind::Replacement, "text here").with_text("content here"),
    ]);
    let fragment = encode(PLAN, store.as_slice(), &[]).unwrap();
    let restored = share::restore_at(decode(&fragment).unwrap(), 1_000);

    assert_eq!(restored.plan, PLAN);
    assert_eq!(restored.annotations.len(), 1);
    let annotation = &restored.annotations[0];
    assert_eq!(annotation.kind, AnnotationKind::Replacement);
    assert_eq!(annotation.original_text, "text here");
    assert_eq!(annotation.text.as_deref(), Some("content here"));
    assert_eq!(annotation.id, "shared-1000-0");
    assert_eq!(annotation.created_at, 1_000);
    assert!(annotation.anchor.is_none());
}

#[test]
fn deletion_tuple_has_null_author() {
    let store = store_with(vec![AnnotationDraft::new(AnnotationKind::Deletion, "foo")]);
    let payload = decode(&encode(PLAN, store.as_slice(), &[]).unwrap()).unwrap();

    assert_eq!(serde_json::to_value(&payload.a).unwrap(), json!([["D", "foo", null]]));

    let restored = share::restore_at(payload, 0);
    assert_eq!(restored.annotations[0].author, None);
    assert_eq!(restored.annotations[0].text, None);
}

#[test]
fn global_comment_tuple() {
    let store = store_with(vec![AnnotationDraft::global("looks good overall")]);
    let payload = decode(&encode(PLAN, store.as_slice(), &[]).unwrap()).unwrap();

    assert_eq!(
        serde_json::to_value(&payload.a).unwrap(),
        json!([["G", "looks good overall", null]])
    );

    let restored = share::restore_at(payload, 0);
    let annotation = &restored.annotations[0];
    assert_eq!(annotation.kind, AnnotationKind::GlobalComment);
    assert_eq!(annotation.original_text, "");
    assert_eq!(annotation.text.as_deref(), Some("looks good overall"));
}

#[test]
fn attribution_is_written_only_when_present() {
    let store = store_with(vec![
        AnnotationDraft::new(AnnotationKind::Comment, "Title")
            .with_text("rename")
            .with_author("ada"),
        AnnotationDraft::new(AnnotationKind::Insertion, "here")
            .with_text(" and there")
            .with_images(vec!["/tmp/a.png".to_string()]),
    ]);
    let payload = decode(&encode(PLAN, store.as_slice(), &[]).unwrap()).unwrap();

    assert_eq!(
        serde_json::to_value(&payload.a).unwrap(),
        json!([
            ["C", "Title", "rename", "ada"],
            ["I", "here", " and there", null, ["/tmp/a.png"]],
        ])
    );
}

#[test]
fn global_attachments_are_optional() {
    let bare = decode(&encode(PLAN, &[], &[]).unwrap()).unwrap();
    assert_eq!(bare.g, None);

    let with = decode(&encode(PLAN, &[], &["/tmp/diagram.png".to_string()]).unwrap()).unwrap();
    assert_eq!(with.g, Some(vec!["/tmp/diagram.png".to_string()]));
    assert_eq!(
        share::restore_at(with, 0).global_attachments,
        vec!["/tmp/diagram.png".to_string()]
    );
}

#[test]
fn restored_order_follows_array_order() {
    let store = store_with(vec![
        AnnotationDraft::new(AnnotationKind::Deletion, "Title"),
        AnnotationDraft::new(AnnotationKind::Comment, "Some").with_text("why"),
        AnnotationDraft::global("ok"),
    ]);
    let payload = decode(&encode(PLAN, store.as_slice(), &[]).unwrap()).unwrap();
    let restored = share::restore_at(payload, 500);

    let kinds: Vec<AnnotationKind> = restored.annotations.iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![
            AnnotationKind::Deletion,
            AnnotationKind::Comment,
            AnnotationKind::GlobalComment
        ]
    );
    let stamps: Vec<u64> = restored.annotations.iter().map(|a| a.created_at).collect();
    assert_eq!(stamps, vec![500, 501, 502]);
}

#[test]
fn decode_accepts_urls_and_padding() {
    let fragment = encode(PLAN, &[], &[]).unwrap();
    let expected = decode(&fragment).unwrap();

    let url = share::share_url("https://share.plannotator.ai/", &fragment);
    assert_eq!(url, format!("https://share.plannotator.ai/#{fragment}"));
    assert_eq!(decode(&url).unwrap(), expected);
    assert_eq!(decode(&format!("#{fragment}")).unwrap(), expected);

    // Same bytes in the standard alphabet with padding
    let raw = URL_SAFE_NO_PAD.decode(&fragment).unwrap();
    assert_eq!(decode(&STANDARD.encode(raw)).unwrap(), expected);
}

#[test]
fn malformed_input_is_recoverable() {
    assert!(matches!(decode("!!not base64!!"), Err(ShareError::Base64(_))));
    assert!(matches!(
        decode(&URL_SAFE_NO_PAD.encode(b"\xff\xfe\xfd garbage")),
        Err(ShareError::Inflate(_))
    ));
    assert!(matches!(
        decode(&deflate_base64(b"{\"p\": 3}")),
        Err(ShareError::Json(_))
    ));

    assert_eq!(share::decode_fragment(""), None);
    assert_eq!(share::decode_fragment("https://share.plannotator.ai/#"), None);
    assert_eq!(share::decode_fragment("#@@@@"), None);
}

#[test]
fn unknown_tag_is_rejected() {
    let json = br#"{"p":"plan","a":[["X","foo",null]]}"#;
    assert!(matches!(decode(&deflate_base64(json)), Err(ShareError::Json(_))));
}

#[test]
fn short_tuples_tolerate_missing_attribution() {
    let json = br#"{"p":"plan","a":[["D","foo"],["C","a","b",null,null,"future"]]}"#;
    let payload = decode(&deflate_base64(json)).unwrap();
    assert_eq!(
        payload.a,
        vec![
            ShareableAnnotation::Deletion {
                original: "foo".to_string(),
                attribution: Attribution::default(),
            },
            ShareableAnnotation::Comment {
                original: "a".to_string(),
                comment: "b".to_string(),
                attribution: Attribution::default(),
            },
        ]
    );
}

#[test]
fn oversized_payload_is_rejected() {
    let huge = format!(r#"{{"p":"{}","a":[]}}"#, "a".repeat(9 * 1024 * 1024));
    assert!(matches!(
        decode(&deflate_base64(huge.as_bytes())),
        Err(ShareError::TooLarge)
    ));
}

#[test]
fn reencoding_is_idempotent() {
    let payload = SharePayload {
        p: PLAN.to_string(),
        a: vec![ShareableAnnotation::Replacement {
            original: "text here".to_string(),
            replacement: "content here".to_string(),
            attribution: Attribution {
                author: Some("ada".to_string()),
                images: Vec::new(),
            },
        }],
        g: None,
    };
    let once = decode(&share::encode_payload(&payload).unwrap()).unwrap();
    let twice = decode(&share::encode_payload(&once).unwrap()).unwrap();
    assert_eq!(once, payload);
    assert_eq!(twice, payload);
}

fn kind_strategy() -> impl Strategy<Value = AnnotationKind> {
    prop_oneof![
        Just(AnnotationKind::Deletion),
        Just(AnnotationKind::Insertion),
        Just(AnnotationKind::Replacement),
        Just(AnnotationKind::Comment),
        Just(AnnotationKind::GlobalComment),
    ]
}

fn draft_strategy() -> impl Strategy<Value = AnnotationDraft> {
    (
        kind_strategy(),
        "[a-z ]{1,12}",
        "[a-zA-Z0-9 ]{0,8}[a-z]",
        proptest::option::of("[a-z]{1,6}"),
        proptest::collection::vec("/tmp/[a-z]{1,6}\\.png", 0..2),
    )
        .prop_map(|(kind, original, text, author, images)| {
            let mut draft = if kind.is_global() {
                AnnotationDraft::global(text)
            } else if kind.requires_text() {
                AnnotationDraft::new(kind, original).with_text(text)
            } else {
                AnnotationDraft::new(kind, original)
            };
            draft.author = author;
            draft.with_images(images)
        })
}

proptest! {
    #[test]
    fn share_round_trip_preserves_annotations(
        plan in "\\PC{0,80}",
        drafts in proptest::collection::vec(draft_strategy(), 0..6),
    ) {
        let store = store_with(drafts);
        let fragment = encode(&plan, store.as_slice(), &[]).unwrap();
        let restored = share::restore_at(decode(&fragment).unwrap(), 10);

        prop_assert_eq!(&restored.plan, &plan);
        prop_assert_eq!(restored.annotations.len(), store.len());
        for (before, after) in store.iter().zip(&restored.annotations) {
            prop_assert_eq!(before.kind, after.kind);
            prop_assert_eq!(&before.original_text, &after.original_text);
            prop_assert_eq!(&before.text, &after.text);
            prop_assert_eq!(&before.author, &after.author);
            prop_assert_eq!(&before.image_paths, &after.image_paths);
        }
    }
}
