use std::sync::LazyLock;

use regex::Regex;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)export const metadata.*?title:\s*["']([^"']+)["']"#).unwrap()
});
static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"description:\s*["']([^"']+)["']"#).unwrap());

/// Title and description lifted from a page's `metadata` export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
}

/// `None` when the page has no titled `metadata` export.
pub fn extract_metadata(source: &str) -> Option<PageMetadata> {
    let title = TITLE_RE.captures(source)?.get(1)?.as_str().to_string();
    let description = DESCRIPTION_RE
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Some(PageMetadata { title, description })
}
