use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// Multi-line arrays close with a `]` in column 0;
// the single-line forms stop at the first `]`.
static CATEGORIES_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)const faqCategories(?::[^=]+)?\s*=\s*\[(.*?)^\]").unwrap()
});
static CATEGORIES_INLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)const faqCategories(?::[^=]+)?\s*=\s*\[(.*?)\]").unwrap());
static QUESTIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)questions:\s*\[(.*?)\]").unwrap());
static SHORT_QA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*q:\s*"([^"]+)"\s*,\s*a:\s*"([^"]+)""#).unwrap());

static FAQS_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?ms)const faqs(?::[^=]+)?\s*=\s*\[(.*?)^\]").unwrap());
static FAQS_INLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)const faqs(?::[^=]+)?\s*=\s*\[(.*?)\]").unwrap());
static LONG_QA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*question:\s*"([^"]+)"\s*,\s*answer:\s*"([^"]+)""#).unwrap()
});

/// One question/answer pair, serialized in the shape the FAQ schema component takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

/// Pull FAQ pairs out of page source.
///
/// A grouped `faqCategories` array (`{ q, a }` entries) wins; a flat `faqs`
/// array (`{ question, answer }` entries) is the fallback.
pub fn extract_faqs(source: &str) -> Vec<FaqItem> {
    let grouped = array_body(source, &CATEGORIES_BLOCK_RE, &CATEGORIES_INLINE_RE)
        .map(|body| {
            QUESTIONS_RE
                .captures_iter(body)
                .flat_map(|c| pairs(c.get(1).map_or("", |m| m.as_str()), &SHORT_QA_RE))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if !grouped.is_empty() {
        return grouped;
    }

    array_body(source, &FAQS_BLOCK_RE, &FAQS_INLINE_RE)
        .map(|body| pairs(body, &LONG_QA_RE))
        .unwrap_or_default()
}

fn array_body<'a>(source: &'a str, block: &Regex, inline: &Regex) -> Option<&'a str> {
    block
        .captures(source)
        .or_else(|| inline.captures(source))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn pairs(body: &str, re: &Regex) -> Vec<FaqItem> {
    re.captures_iter(body)
        .map(|c| FaqItem {
            question: c[1].to_string(),
            answer: c[2].to_string(),
        })
        .collect()
}
