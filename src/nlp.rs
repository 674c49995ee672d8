use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::snapshot::{CategoryScore, EntityScore};
use crate::utils::truncate_chars;

/// Documents longer than this are cut before sending.
pub const MAX_CONTENT_CHARS: usize = 100_000;
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    document: Document<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

impl<'a> AnalyzeRequest<'a> {
    fn plain_text(text: &'a str, encoding_type: Option<&'static str>) -> Self {
        AnalyzeRequest {
            document: Document {
                kind: "PLAIN_TEXT",
                content: truncate_chars(text, MAX_CONTENT_CHARS),
            },
            encoding_type,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EntityAnalysis {
    #[serde(default)]
    pub entities: Vec<ApiEntity>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiEntity {
    pub name: Option<String>,
    pub salience: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub categories: Vec<ApiCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCategory {
    pub name: Option<String>,
    pub confidence: Option<f64>,
}

impl EntityAnalysis {
    /// Nameless entities are dropped; missing salience counts as zero.
    pub fn into_scores(self) -> Vec<EntityScore> {
        self.entities
            .into_iter()
            .filter_map(|e| {
                Some(EntityScore {
                    name: e.name?,
                    salience: e.salience.unwrap_or(0.0),
                    kind: e.kind,
                })
            })
            .collect()
    }
}

impl Classification {
    pub fn into_scores(self) -> Vec<CategoryScore> {
        self.categories
            .into_iter()
            .filter_map(|c| {
                Some(CategoryScore {
                    name: c.name?,
                    confidence: c.confidence,
                })
            })
            .collect()
    }
}

/// Client for the `documents:*` natural-language endpoints, keyed by API key.
pub struct NlpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NlpClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(NlpClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Non-200 responses are logged and come back as an empty analysis.
    pub async fn analyze_entities(&self, text: &str) -> Result<EntityAnalysis> {
        let request = AnalyzeRequest::plain_text(text, Some("UTF8"));
        match self.post("analyzeEntities", &request).await? {
            Ok(analysis) => Ok(analysis),
            Err(status) => {
                warn!("Entity analysis failed: {}", status);
                Ok(EntityAnalysis::default())
            }
        }
    }

    /// Classification is routinely refused for short or off-topic text, so a
    /// non-200 response is only noted at debug level.
    pub async fn classify_text(&self, text: &str) -> Result<Classification> {
        let request = AnalyzeRequest::plain_text(text, None);
        match self.post("classifyText", &request).await? {
            Ok(classification) => Ok(classification),
            Err(status) => {
                debug!("Classification unavailable: {}", status);
                Ok(Classification::default())
            }
        }
    }

    /// Outer error: transport or decoding failure. Inner error: non-200 status.
    async fn post<T: DeserializeOwned>(
        &self,
        method: &str,
        request: &AnalyzeRequest<'_>,
    ) -> Result<std::result::Result<T, StatusCode>> {
        let url = format!("{}/documents:{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .with_context(|| format!("Request to documents:{} failed", method))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok(Err(status));
        }
        let body = response
            .json::<T>()
            .await
            .with_context(|| format!("Invalid documents:{} response", method))?;
        Ok(Ok(body))
    }
}
