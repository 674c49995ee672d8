use std::sync::LazyLock;

use regex::Regex;

use super::{insert_import, splice, Change, InjectError};
use crate::extract::extract_faqs;

const FAQ_IMPORT: &str = "import { FAQSchema } from \"@/components/faq-schema\"";
/// Name of the constant holding the extracted pairs, kept distinct from the page's own `faqs`.
const FAQ_CONST: &str = "faqSchemaItems";

static FAQ_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)import.*faqschema.*from.*faq-schema").unwrap());
static EXPORT_FN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^export (?:default )?function").unwrap());

/// Add the FAQSchema import and a constant with the page's FAQ pairs ahead of its component.
pub fn transform(source: &str) -> Result<Change, InjectError> {
    if FAQ_IMPORT_RE.is_match(source) {
        return Ok(Change::Unchanged("Already using FAQSchema"));
    }

    let faqs = extract_faqs(source);
    if faqs.is_empty() {
        return Err(InjectError::NoFaqData);
    }
    let anchor = EXPORT_FN_RE
        .find(source)
        .ok_or(InjectError::MissingAnchor("exported component"))?;

    let json = serde_json::to_string_pretty(&faqs)?;
    let constant = format!("const {} = {}\n\n", FAQ_CONST, json);

    let with_const = splice(source, anchor.start(), &constant);
    let content = insert_import(&with_const, FAQ_IMPORT)?;

    Ok(Change::Rewritten {
        content,
        message: format!("Added FAQSchema import and FAQ data for {} questions", faqs.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#""use client"

import { useState } from "react"

const faqs = [
  { question: "Is a bias audit required?", answer: "Yes, annually." },
  { question: "Who performs it?", answer: "An independent auditor." },
]

export default function FaqPage() {
  return <div />
}
"#;

    #[test]
    fn adds_import_and_constant() {
        let Change::Rewritten { content, message } = transform(PAGE).unwrap() else {
            panic!("expected a rewrite");
        };
        assert_eq!(message, "Added FAQSchema import and FAQ data for 2 questions");
        assert!(content.contains(
            "import { useState } from \"react\"\nimport { FAQSchema } from \"@/components/faq-schema\"\n"
        ));
        assert!(content.contains("const faqSchemaItems = [\n  {\n    \"question\": \"Is a bias audit required?\""));
        let const_at = content.find("const faqSchemaItems").unwrap();
        let export_at = content.find("export default function FaqPage").unwrap();
        assert!(const_at < export_at);
    }

    #[test]
    fn existing_import_is_left_alone() {
        let src = PAGE.replace(
            "import { useState } from \"react\"",
            "import { useState } from \"react\"\nimport { FaqSchema } from \"@/components/faq-schema\"",
        );
        assert_eq!(transform(&src).unwrap(), Change::Unchanged("Already using FAQSchema"));
    }

    #[test]
    fn no_faq_data() {
        assert!(matches!(
            transform("export default function P() { return null }"),
            Err(InjectError::NoFaqData)
        ));
    }

    #[test]
    fn no_exported_component() {
        let src = PAGE.replace("export default function FaqPage()", "function FaqPage()");
        assert!(matches!(
            transform(&src),
            Err(InjectError::MissingAnchor("exported component"))
        ));
    }
}
