use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use plannotator::review::ReviewSession;
use plannotator::share::{ShareableAnnotation, to_shareable};

use crate::config::AnnotationEntry;

const FIXTURE_SUFFIX: &str = ".review.md";

#[derive(Debug, Deserialize)]
pub struct FixtureConfig {
    /// Human-readable fixture description.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub annotation: Vec<AnnotationEntry>,

    #[serde(default)]
    pub attachments: Vec<String>,

    /// Expected number of parsed blocks.
    #[serde(default)]
    pub expect_blocks: Option<usize>,

    /// Original texts expected to be orphaned, in annotation order.
    #[serde(default)]
    pub expect_orphans: Vec<String>,
}

/// Split a `.review.md` file into its TOML frontmatter and plan body.
fn parse_fixture(content: &str) -> Result<(FixtureConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let plan = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: FixtureConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, plan))
}

pub enum Outcome {
    Pass,
    Fail(String),
}

pub struct FixtureResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: Outcome,
}

fn run_fixture(path: &Path) -> FixtureResult {
    let fail = |description: Option<String>, reason: String| FixtureResult {
        path: path.to_path_buf(),
        description,
        outcome: Outcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, plan) = match parse_fixture(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };
    let description = config.description.clone();

    let mut session = ReviewSession::new(plan);
    let annotations = crate::config::AnnotationFile {
        annotation: config.annotation,
        attachments: config.attachments,
    };
    if let Err(e) = annotations.apply(&mut session, None) {
        return fail(description, format!("invalid annotation: {:#}", e));
    }

    if let Some(expected) = config.expect_blocks {
        let actual = session.plan().blocks.len();
        if actual != expected {
            return fail(
                description,
                format!("expected {} block(s), got {}", expected, actual),
            );
        }
    }

    let orphans: Vec<&str> = session
        .orphans()
        .map(|a| a.original_text.as_str())
        .collect();
    if orphans != config.expect_orphans {
        return fail(
            description,
            format!(
                "orphan mismatch\n  expected: {:?}\n  actual:   {:?}",
                config.expect_orphans, orphans
            ),
        );
    }

    if let Some(reason) = check_round_trip(&session) {
        return fail(description, reason);
    }

    FixtureResult {
        path: path.to_path_buf(),
        description,
        outcome: Outcome::Pass,
    }
}

/// Share the session and restore it; the wire projection and plan must survive.
fn check_round_trip(session: &ReviewSession) -> Option<String> {
    let fragment = match session.share_fragment() {
        Ok(f) => f,
        Err(e) => return Some(format!("encode failed: {}", e)),
    };
    let Some(restored) = ReviewSession::from_share(&fragment) else {
        return Some("share fragment did not decode".into());
    };

    if restored.source() != session.source() {
        return Some("plan text changed across share".into());
    }
    if restored.global_attachments() != session.global_attachments() {
        return Some("global attachments changed across share".into());
    }

    let before: Vec<ShareableAnnotation> = session.annotations().iter().map(to_shareable).collect();
    let after: Vec<ShareableAnnotation> = restored.annotations().iter().map(to_shareable).collect();
    if before != after {
        return Some(format!(
            "annotations changed across share\n  before: {:?}\n  after:  {:?}",
            before, after
        ));
    }

    let orphans_before = session.orphans().count();
    let orphans_after = restored.orphans().count();
    if orphans_before != orphans_after {
        return Some(format!(
            "{} orphan(s) before share, {} after",
            orphans_before, orphans_after
        ));
    }
    None
}

/// Fixture files grouped by subfolder relative to `root`; files directly in
/// `root` get category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_fixtures(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_fixtures(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_fixtures(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(FIXTURE_SUFFIX) {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} fixtures)", label, files.len());
    }
}

struct Style {
    no_color: bool,
}

impl Style {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.no_color {
            s.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, s)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }
}

fn label_for(result: &FixtureResult) -> String {
    result.description.clone().unwrap_or_else(|| {
        result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.trim_end_matches(FIXTURE_SUFFIX).to_string())
            .unwrap_or_else(|| "?".to_string())
    })
}

/// Run every fixture under `path`, or a single fixture file. A non-empty
/// `categories` restricts the run to those subfolders. Returns the exit code.
pub fn run_fixtures(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { no_color };

    let selected: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        filter_categories(all, categories)
    };

    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<FixtureResult> = Vec::new();

    for (cat, files) in &selected {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", style.bold(header));
        }

        for file in files {
            let result = run_fixture(file);
            let label = label_for(&result);
            match &result.outcome {
                Outcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), label);
                }
                Outcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), label);
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let Outcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("check result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        let failed = failures.len();
        eprintln!(
            "check result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

fn filter_categories(
    all: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all;
    }

    let mut filtered = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let matching: Vec<&String> = all
            .keys()
            .filter(|cat| *cat == req || cat.starts_with(&format!("{}/", req)))
            .collect();
        if matching.is_empty() {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        for cat in matching {
            filtered.insert(cat.clone(), all[cat].clone());
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontmatter_and_plan_are_split() {
        let content = "---\ndescription = \"x\"\nexpect_blocks = 2\n\n[[annotation]]\nkind = \"DELETION\"\noriginal = \"foo\"\n---\n# Plan\n\nfoo\n";
        let (config, plan) = parse_fixture(content).unwrap();
        assert_eq!(config.description.as_deref(), Some("x"));
        assert_eq!(config.expect_blocks, Some(2));
        assert_eq!(config.annotation.len(), 1);
        assert_eq!(plan, "# Plan\n\nfoo\n");
    }

    #[test]
    fn missing_frontmatter_is_an_error() {
        assert!(parse_fixture("# Plan\n").is_err());
        assert!(parse_fixture("---\ndescription = \"x\"\n").is_err());
    }
}
