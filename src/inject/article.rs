use std::sync::LazyLock;

use regex::Regex;

use super::{attr, insert_import, splice, Change, InjectError};
use crate::extract::extract_metadata;

const ARTICLE_IMPORT: &str = "import { ArticleSchema } from \"@/components/article-schema\"";

static ARTICLE_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"import.*ArticleSchema.*from.*article-schema").unwrap());
// Opening tag of the element a page component returns.
static RETURN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"return\s*\(\s*(?:<>|<(?:div|main|section)\b[^>]*>)").unwrap()
});

/// Values every article schema gets that the page itself does not carry.
#[derive(Debug, Clone)]
pub struct ArticleDefaults {
    pub date_published: String,
    pub author_name: String,
}

pub fn transform(source: &str, defaults: &ArticleDefaults) -> Result<Change, InjectError> {
    if ARTICLE_IMPORT_RE.is_match(source) {
        return Ok(Change::Unchanged("Already using ArticleSchema"));
    }

    let meta = extract_metadata(source).ok_or(InjectError::NoMetadata)?;
    let anchor = RETURN_RE
        .find(source)
        .ok_or(InjectError::MissingAnchor("return statement"))?;

    let element = format!(
        "\n      <ArticleSchema\n        title=\"{}\"\n        description=\"{}\"\n        datePublished=\"{}\"\n        authorName=\"{}\"\n      />",
        attr(&meta.title),
        attr(&meta.description),
        attr(&defaults.date_published),
        attr(&defaults.author_name),
    );

    // element first: the import anchor always precedes the component body
    let with_element = splice(source, anchor.end(), &element);
    let content = insert_import(&with_element, ARTICLE_IMPORT)?;

    Ok(Change::Rewritten {
        content,
        message: format!("Added ArticleSchema for: {}", meta.title),
    })
}
