pub mod article;
pub mod faq;
pub mod layout;

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::config::Settings;
use crate::pages::{self, PageFile};
use crate::utils::write_atomic;

static REACT_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^import\b[^"']*?from\s*["']react["'];?"#).unwrap());
static USE_CLIENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^["']use client["'];?"#).unwrap());
// `[^"']` spans newlines, so multi-line `import { a, b } from "x"` is one match.
static ANY_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^import\b(?:[^"']*?\bfrom)?\s*["'][^"']+["'];?"#).unwrap()
});

#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("No FAQ data found")]
    NoFaqData,
    #[error("No metadata found")]
    NoMetadata,
    #[error("Could not find {0}")]
    MissingAnchor(&'static str),
    #[error("Failed to encode schema data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file that was either rewritten or deliberately left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(String),
    AlreadyApplied(&'static str),
}

/// Result of a pure source transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Rewritten { content: String, message: String },
    Unchanged(&'static str),
}

/// Run `transform` over the file at `path` and write the result back in one atomic step.
pub fn apply_to_file<F>(path: &Path, transform: F) -> Result<Outcome, InjectError>
where
    F: FnOnce(&str) -> Result<Change, InjectError>,
{
    let source = fs::read_to_string(path)?;
    match transform(&source)? {
        Change::Rewritten { content, message } => {
            write_atomic(path, &content)?;
            Ok(Outcome::Applied(message))
        }
        Change::Unchanged(reason) => Ok(Outcome::AlreadyApplied(reason)),
    }
}

/// Add `import_line` after the react import, the `"use client"` directive, or
/// the last import statement, whichever is found first.
pub fn insert_import(source: &str, import_line: &str) -> Result<String, InjectError> {
    if let Some(m) = REACT_IMPORT_RE.find(source) {
        return Ok(splice(source, m.end(), &format!("\n{}", import_line)));
    }
    if let Some(m) = USE_CLIENT_RE.find(source) {
        return Ok(splice(source, m.end(), &format!("\n\n{}", import_line)));
    }
    if let Some(m) = ANY_IMPORT_RE.find_iter(source).last() {
        return Ok(splice(source, m.end(), &format!("\n{}", import_line)));
    }
    Err(InjectError::MissingAnchor("import block"))
}

fn splice(source: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(source.len() + insert.len());
    out.push_str(&source[..at]);
    out.push_str(insert);
    out.push_str(&source[at..]);
    out
}

/// Escape a value for a double-quoted JSX attribute.
fn attr(value: &str) -> String {
    value.replace('"', "&quot;")
}

#[derive(Debug, Default)]
pub struct InjectSummary {
    pub layout: Option<Outcome>,
    pub articles_added: usize,
    pub articles_skipped: usize,
    pub faq_pages: usize,
    pub faq_added: usize,
}

/// Layout schema, then article schema on every eligible page, then FAQ discovery
/// (and insertion when `apply_faq` is set).
pub fn run(settings: &Settings, apply_faq: bool) -> anyhow::Result<InjectSummary> {
    let mut summary = InjectSummary::default();

    info!("Adding Organization and WebSite schema to {}", settings.layout_file.display());
    if !settings.layout_file.exists() {
        warn!("Layout file not found: {}", settings.layout_file.display());
    } else {
        match apply_to_file(&settings.layout_file, |src| layout::transform(src, &settings.site)) {
            Ok(outcome) => {
                report("layout", &outcome);
                summary.layout = Some(outcome);
            }
            Err(e) => warn!("layout: {}", e),
        }
    }

    let pages = pages::discover(&settings.pages_dir)?;
    let defaults = article::ArticleDefaults {
        date_published: settings.date_published.clone(),
        author_name: settings.author_name.clone(),
    };

    info!("Deploying ArticleSchema to resource pages");
    for page in pages.iter().filter(|p| !p.is_index() && !p.is_programmatic()) {
        match apply_to_file(&page.path, |src| article::transform(src, &defaults)) {
            Ok(outcome @ Outcome::Applied(_)) => {
                report(display_route(page), &outcome);
                summary.articles_added += 1;
            }
            Ok(outcome) => {
                report(display_route(page), &outcome);
                summary.articles_skipped += 1;
            }
            Err(e) => {
                info!("{}: skipped ({})", display_route(page), e);
                summary.articles_skipped += 1;
            }
        }
    }

    info!("Scanning pages for FAQ sections");
    for (page, found) in find_faq_pages(&pages) {
        summary.faq_pages += 1;
        info!("{}: found {} FAQ items", display_route(page), found);
        if !apply_faq {
            continue;
        }
        match apply_to_file(&page.path, faq::transform) {
            Ok(outcome) => {
                if matches!(outcome, Outcome::Applied(_)) {
                    summary.faq_added += 1;
                }
                report(display_route(page), &outcome);
            }
            Err(e) => warn!("{}: {}", display_route(page), e),
        }
    }

    Ok(summary)
}

/// Pages with at least one extractable FAQ pair, with the pair count.
/// Unreadable pages are skipped with a warning.
pub fn find_faq_pages(pages: &[PageFile]) -> Vec<(&PageFile, usize)> {
    let mut found = Vec::new();
    for page in pages {
        let source = match fs::read_to_string(&page.path) {
            Ok(source) => source,
            Err(e) => {
                warn!("{}: skipped ({})", display_route(page), e);
                continue;
            }
        };
        let count = crate::extract::extract_faqs(&source).len();
        if count > 0 {
            found.push((page, count));
        }
    }
    found
}

pub fn display_route(page: &PageFile) -> &str {
    if page.is_index() {
        "."
    } else {
        &page.route
    }
}

fn report(label: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Applied(msg) => info!("{}: {}", label, msg),
        Outcome::AlreadyApplied(reason) => info!("{}: {}", label, reason),
    }
}
