use std::sync::LazyLock;

use regex::Regex;

/// Anything shorter than this is treated as a failed extraction.
pub const MIN_TEXT_CHARS: usize = 100;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^import .*$").unwrap());
static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^export .*$").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)function\s+\w+\s*\([^)]*\)\s*\{[^}]*\}").unwrap());
static CONST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)const\s+\w+\s*=.*?;").unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[{}\[\]();,]").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Best-effort plain text from page source: markup, declarations and noise removed.
///
/// Order matters: tags go before code statements so that text inside a
/// component body survives, and URLs go before punctuation so that a URL
/// inside parentheses is still recognised.
pub fn strip_markup(source: &str) -> String {
    let text = IMPORT_RE.replace_all(source, "");
    let text = EXPORT_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    let text = FUNCTION_RE.replace_all(&text, "");
    let text = CONST_RE.replace_all(&text, "");
    let text = URL_RE.replace_all(&text, "");
    let text = PUNCT_RE.replace_all(&text, " ");
    WS_RE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"import Link from "next/link"
import { Metadata } from "next"

export const metadata: Metadata = { title: "Guide" }

function helper(x) { return x * 2 }

const year = 2026;

export default function Page() {
  return (
    <main className="prose">
      <h1>AI Hiring Compliance Guide</h1>
      <p>Employers using automated tools must run a bias audit (see https://example.com/ll144).</p>
      <Link href="/resources">Back to resources</Link>
    </main>
  )
}
"#;

    #[test]
    fn keeps_visible_text() {
        let text = strip_markup(PAGE);
        assert!(text.contains("AI Hiring Compliance Guide"));
        assert!(text.contains("Employers using automated tools must run a bias audit"));
        assert!(text.contains("Back to resources"));
    }

    #[test]
    fn drops_code_and_noise() {
        let text = strip_markup(PAGE);
        assert!(!text.contains("import"));
        assert!(!text.contains("export"));
        assert!(!text.contains("className"));
        assert!(!text.contains("helper"));
        assert!(!text.contains("2026"));
        assert!(!text.contains("https://"));
        assert!(!text.contains('('));
        assert!(!text.contains("  "));
        assert_eq!(text, text.trim());
    }

    #[test]
    fn short_pages_fall_below_threshold() {
        let text = strip_markup("export default function Page() {\n  return <div>Hi</div>\n}\n");
        assert!(text.chars().count() < MIN_TEXT_CHARS);
    }
}
