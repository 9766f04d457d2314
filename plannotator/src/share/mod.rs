//! URL share payloads.
//!
//! `#<base64url(deflate-raw(JSON({p, a, g?})))>`
//!
//! The wire form drops ids, block references, offsets and relocation hints;
//! restored annotations are re-anchored by text scan once the plan is rendered.

mod wire;

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::{Annotation, AnnotationKind, now_millis};

pub use wire::{Attribution, ShareableAnnotation};

/// Upper bound on the inflated JSON size.
pub const MAX_INFLATED_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    /// Plan markdown.
    pub p: String,
    /// Annotations in creation order.
    pub a: Vec<ShareableAnnotation>,
    /// Global attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("share data is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("share data could not be inflated: {0}")]
    Inflate(#[source] std::io::Error),
    #[error("share data inflates past 8 MiB")]
    TooLarge,
    #[error("share data is not a valid payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("share data could not be compressed: {0}")]
    Deflate(#[source] std::io::Error),
}

/// Annotations and attachments rebuilt from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredShare {
    pub plan: String,
    pub annotations: Vec<Annotation>,
    pub global_attachments: Vec<String>,
}

/// Project an annotation onto its wire tuple.
pub fn to_shareable(annotation: &Annotation) -> ShareableAnnotation {
    let attribution = Attribution {
        author: annotation.author.clone(),
        images: annotation.image_paths.clone(),
    };
    let original = annotation.original_text.clone();
    let text = annotation.text.clone().unwrap_or_default();
    match annotation.kind {
        AnnotationKind::Deletion => ShareableAnnotation::Deletion {
            original,
            attribution,
        },
        AnnotationKind::Replacement => ShareableAnnotation::Replacement {
            original,
            replacement: text,
            attribution,
        },
        AnnotationKind::Comment => ShareableAnnotation::Comment {
            original,
            comment: text,
            attribution,
        },
        AnnotationKind::Insertion => ShareableAnnotation::Insertion {
            context: original,
            inserted: text,
            attribution,
        },
        AnnotationKind::GlobalComment => ShareableAnnotation::GlobalComment {
            comment: text,
            attribution,
        },
    }
}

/// Rebuild an annotation from its tuple. `base + index` becomes `created_at`,
/// so array order is the only ordering signal that survives the wire.
pub fn from_shareable(shareable: ShareableAnnotation, index: usize, base: u64) -> Annotation {
    let (kind, original_text, text, attribution) = match shareable {
        ShareableAnnotation::Deletion {
            original,
            attribution,
        } => (AnnotationKind::Deletion, original, None, attribution),
        ShareableAnnotation::Replacement {
            original,
            replacement,
            attribution,
        } => (AnnotationKind::Replacement, original, Some(replacement), attribution),
        ShareableAnnotation::Comment {
            original,
            comment,
            attribution,
        } => (AnnotationKind::Comment, original, Some(comment), attribution),
        ShareableAnnotation::Insertion {
            context,
            inserted,
            attribution,
        } => (AnnotationKind::Insertion, context, Some(inserted), attribution),
        ShareableAnnotation::GlobalComment {
            comment,
            attribution,
        } => (AnnotationKind::GlobalComment, String::new(), Some(comment), attribution),
    };

    Annotation {
        id: format!("shared-{base}-{index}"),
        kind,
        original_text,
        text,
        author: attribution.author,
        image_paths: attribution.images,
        created_at: base + index as u64,
        anchor: None,
        orphaned: false,
    }
}

/// Serialize, deflate and base64url-encode a plan with its annotations.
/// The result has no leading `#`.
pub fn encode(
    plan: &str,
    annotations: &[Annotation],
    global_attachments: &[String],
) -> Result<String, ShareError> {
    let payload = SharePayload {
        p: plan.to_string(),
        a: annotations.iter().map(to_shareable).collect(),
        g: if global_attachments.is_empty() {
            None
        } else {
            Some(global_attachments.to_vec())
        },
    };
    encode_payload(&payload)
}

pub fn encode_payload(payload: &SharePayload) -> Result<String, ShareError> {
    let json = serde_json::to_vec(payload)?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(ShareError::Deflate)?;
    let compressed = encoder.finish().map_err(ShareError::Deflate)?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

/// Inverse of `encode`. Accepts a bare fragment, `#fragment`, or a full URL.
pub fn decode(input: &str) -> Result<SharePayload, ShareError> {
    let fragment = fragment_of(input);
    // Tolerate padding and the standard alphabet
    let normalized: String = fragment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    let compressed = URL_SAFE_NO_PAD.decode(normalized.as_bytes())?;

    let mut json = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_INFLATED_BYTES + 1)
        .read_to_end(&mut json)
        .map_err(ShareError::Inflate)?;
    if json.len() as u64 > MAX_INFLATED_BYTES {
        return Err(ShareError::TooLarge);
    }

    Ok(serde_json::from_slice(&json)?)
}

/// `decode` for callers that treat bad input as "no share data".
pub fn decode_fragment(input: &str) -> Option<SharePayload> {
    if fragment_of(input).is_empty() {
        return None;
    }
    match decode(input) {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring invalid share data");
            None
        }
    }
}

/// Rebuild annotations with ids and timestamps based on the current time.
pub fn restore(payload: SharePayload) -> RestoredShare {
    restore_at(payload, now_millis())
}

/// Rebuild annotations with ids and timestamps based on `base`.
pub fn restore_at(payload: SharePayload, base: u64) -> RestoredShare {
    let annotations = payload
        .a
        .into_iter()
        .enumerate()
        .map(|(index, shareable)| from_shareable(shareable, index, base))
        .collect();
    RestoredShare {
        plan: payload.p,
        annotations,
        global_attachments: payload.g.unwrap_or_default(),
    }
}

/// Join a share base URL and an encoded fragment.
pub fn share_url(base_url: &str, fragment: &str) -> String {
    format!("{}/#{}", base_url.trim_end_matches('/'), fragment)
}

fn fragment_of(input: &str) -> &str {
    let input = input.trim();
    match input.rfind('#') {
        Some(pos) => &input[pos + 1..],
        None => input,
    }
}
