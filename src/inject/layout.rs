use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use super::{splice, Change, InjectError};
use crate::config::SiteIdentity;

static ORGANIZATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']@type["']\s*:\s*["']Organization["']"#).unwrap());
static BODY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<body[^>]*>").unwrap());

/// Insert site-wide Organization and WebSite JSON-LD right after `<body>`.
pub fn transform(source: &str, site: &SiteIdentity) -> Result<Change, InjectError> {
    if ORGANIZATION_RE.is_match(source) {
        return Ok(Change::Unchanged("Organization schema already present"));
    }
    let body = BODY_RE
        .find(source)
        .ok_or(InjectError::MissingAnchor("body element"))?;

    let graph = serde_json::to_string_pretty(&site_graph(site))?;
    let graph = graph.replace('\n', "\n          ");
    let block = format!(
        "\n      {{/* JSON-LD structured data */}}\n      <script\n        type=\"application/ld+json\"\n        dangerouslySetInnerHTML={{{{\n          __html: JSON.stringify({}),\n        }}}}\n      />",
        graph
    );

    Ok(Change::Rewritten {
        content: splice(source, body.end(), &block),
        message: "Added Organization and WebSite schema to layout".to_string(),
    })
}

fn site_graph(site: &SiteIdentity) -> Value {
    let base = site.url.trim_end_matches('/');
    let org_id = format!("{}/#organization", base);

    let mut organization = json!({
        "@type": "Organization",
        "@id": org_id,
        "name": site.name,
        "url": base,
        "logo": { "@type": "ImageObject", "url": site.logo },
    });
    let mut website = json!({
        "@type": "WebSite",
        "@id": format!("{}/#website", base),
        "url": base,
        "name": site.name,
        "publisher": { "@id": org_id },
        "potentialAction": {
            "@type": "SearchAction",
            "target": {
                "@type": "EntryPoint",
                "urlTemplate": format!("{}/search?q={{search_term_string}}", base),
            },
            "query-input": "required name=search_term_string",
        },
    });

    if !site.description.is_empty() {
        organization["description"] = json!(site.description);
        website["description"] = json!(site.description);
    }
    if !site.founder.is_empty() {
        organization["founder"] = json!({ "@type": "Person", "name": site.founder });
    }

    json!({
        "@context": "https://schema.org",
        "@graph": [organization, website],
    })
}
