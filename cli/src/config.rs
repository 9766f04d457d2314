use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use plannotator::annotation::{AnnotationDraft, AnnotationKind, ResolutionReport};
use plannotator::review::ReviewSession;

pub const DEFAULT_CONFIG_FILE: &str = "plannotator.toml";
pub const DEFAULT_SHARE_URL: &str = "https://share.plannotator.ai";
pub const SHARE_URL_ENV: &str = "PLANNOTATOR_SHARE_URL";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub share: ShareConfig,
    pub review: ReviewConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub base_url: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        ShareConfig {
            base_url: DEFAULT_SHARE_URL.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Author for annotations that do not name one.
    pub author: Option<String>,
}

impl Config {
    /// Load `path`, or `plannotator.toml` in the working directory if it
    /// exists. The share URL environment variable wins over both.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => read_config(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    read_config(default)?
                } else {
                    Config::default()
                }
            }
        };

        if let Ok(url) = std::env::var(SHARE_URL_ENV) {
            if !url.trim().is_empty() {
                config.share.base_url = url;
            }
        }
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config '{}'", path.display()))?;
    let config = toml::from_str(&text)
        .with_context(|| format!("invalid config '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// One `[[annotation]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationEntry {
    /// `DELETION`, `INSERTION`, `REPLACEMENT`, `COMMENT` or `GLOBAL_COMMENT`.
    pub kind: AnnotationKind,
    /// Target text. Omitted for global comments.
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A TOML list of annotations plus global attachments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnnotationFile {
    pub annotation: Vec<AnnotationEntry>,
    pub attachments: Vec<String>,
}

impl AnnotationFile {
    pub fn load(path: &Path) -> Result<AnnotationFile> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read annotations '{}'", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("invalid annotations '{}'", path.display()))
    }

    /// Add every annotation to `session` in file order, then anchor them.
    /// Targets missing from the plan stay in the session as orphans.
    pub fn apply(
        &self,
        session: &mut ReviewSession,
        default_author: Option<&str>,
    ) -> Result<ResolutionReport> {
        for (index, entry) in self.annotation.iter().enumerate() {
            let mut draft = if entry.kind.is_global() {
                AnnotationDraft::global(entry.text.clone().unwrap_or_default())
            } else {
                let mut draft = AnnotationDraft::new(entry.kind, entry.original.clone());
                draft.text = entry.text.clone();
                draft
            };
            draft.author = entry
                .author
                .clone()
                .or_else(|| default_author.map(str::to_string));
            draft.image_paths = entry.images.clone();

            session
                .annotations_mut()
                .create(draft)
                .with_context(|| format!("annotation #{} ({})", index + 1, entry.kind))?;
        }
        for path in &self.attachments {
            session.attach_global(path.clone());
        }
        Ok(session.resolve())
    }
}
