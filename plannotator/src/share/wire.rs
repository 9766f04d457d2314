use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Author and attachments carried by every shared annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    pub author: Option<String>,
    pub images: Vec<String>,
}

/// Compact wire form of an annotation: a positional JSON array whose
/// first element is a one-letter tag selecting the layout.
///
/// | Tag | Fields after the tag |
/// |-----|----------------------|
/// | `D` | original, author, images? |
/// | `R` | original, replacement, author, images? |
/// | `C` | original, comment, author, images? |
/// | `I` | context, inserted, author, images? |
/// | `G` | comment, author, images? |
///
/// `author` is always written (null when absent); `images` only when non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareableAnnotation {
    Deletion {
        original: String,
        attribution: Attribution,
    },
    Replacement {
        original: String,
        replacement: String,
        attribution: Attribution,
    },
    Comment {
        original: String,
        comment: String,
        attribution: Attribution,
    },
    Insertion {
        context: String,
        inserted: String,
        attribution: Attribution,
    },
    GlobalComment {
        comment: String,
        attribution: Attribution,
    },
}

const TAGS: &[&str] = &["D", "R", "C", "I", "G"];

impl ShareableAnnotation {
    pub fn tag(&self) -> &'static str {
        match self {
            ShareableAnnotation::Deletion { .. } => "D",
            ShareableAnnotation::Replacement { .. } => "R",
            ShareableAnnotation::Comment { .. } => "C",
            ShareableAnnotation::Insertion { .. } => "I",
            ShareableAnnotation::GlobalComment { .. } => "G",
        }
    }

    pub fn attribution(&self) -> &Attribution {
        match self {
            ShareableAnnotation::Deletion { attribution, .. }
            | ShareableAnnotation::Replacement { attribution, .. }
            | ShareableAnnotation::Comment { attribution, .. }
            | ShareableAnnotation::Insertion { attribution, .. }
            | ShareableAnnotation::GlobalComment { attribution, .. } => attribution,
        }
    }

    /// The text fields between the tag and the author.
    fn texts(&self) -> Vec<&str> {
        match self {
            ShareableAnnotation::Deletion { original, .. } => vec![original.as_str()],
            ShareableAnnotation::Replacement {
                original,
                replacement,
                ..
            } => vec![original.as_str(), replacement.as_str()],
            ShareableAnnotation::Comment {
                original, comment, ..
            } => vec![original.as_str(), comment.as_str()],
            ShareableAnnotation::Insertion {
                context, inserted, ..
            } => vec![context.as_str(), inserted.as_str()],
            ShareableAnnotation::GlobalComment { comment, .. } => vec![comment.as_str()],
        }
    }
}

impl Serialize for ShareableAnnotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let texts = self.texts();
        let attribution = self.attribution();
        let with_images = !attribution.images.is_empty();
        let len = 2 + texts.len() + usize::from(with_images);

        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(self.tag())?;
        for text in texts {
            seq.serialize_element(text)?;
        }
        seq.serialize_element(&attribution.author)?;
        if with_images {
            seq.serialize_element(&attribution.images)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ShareableAnnotation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(TupleVisitor)
    }
}

struct TupleVisitor;

impl<'de> Visitor<'de> for TupleVisitor {
    type Value = ShareableAnnotation;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tagged annotation tuple")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let tag: String = required(&mut seq, 0)?;
        let annotation = match tag.as_str() {
            "D" => {
                let original = required(&mut seq, 1)?;
                ShareableAnnotation::Deletion {
                    original,
                    attribution: attribution(&mut seq)?,
                }
            }
            "R" => {
                let original = required(&mut seq, 1)?;
                let replacement = required(&mut seq, 2)?;
                ShareableAnnotation::Replacement {
                    original,
                    replacement,
                    attribution: attribution(&mut seq)?,
                }
            }
            "C" => {
                let original = required(&mut seq, 1)?;
                let comment = required(&mut seq, 2)?;
                ShareableAnnotation::Comment {
                    original,
                    comment,
                    attribution: attribution(&mut seq)?,
                }
            }
            "I" => {
                let context = required(&mut seq, 1)?;
                let inserted = required(&mut seq, 2)?;
                ShareableAnnotation::Insertion {
                    context,
                    inserted,
                    attribution: attribution(&mut seq)?,
                }
            }
            "G" => {
                let comment = required(&mut seq, 1)?;
                ShareableAnnotation::GlobalComment {
                    comment,
                    attribution: attribution(&mut seq)?,
                }
            }
            other => return Err(de::Error::unknown_variant(other, TAGS)),
        };

        // Newer writers may append fields
        while seq.next_element::<IgnoredAny>()?.is_some() {}

        Ok(annotation)
    }
}

fn required<'de, A: SeqAccess<'de>>(seq: &mut A, index: usize) -> Result<String, A::Error> {
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, &"a text field"))
}

/// Trailing `author|null, images?` fields; both may be missing.
fn attribution<'de, A: SeqAccess<'de>>(seq: &mut A) -> Result<Attribution, A::Error> {
    let author: Option<String> = seq.next_element::<Option<String>>()?.flatten();
    let images: Vec<String> = seq
        .next_element::<Option<Vec<String>>>()?
        .flatten()
        .unwrap_or_default();
    Ok(Attribution { author, images })
}
