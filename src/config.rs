use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "seo_toolkit.toml";
const ENV_PREFIX: &str = "SEO";

/// Runtime settings: defaults, then `seo_toolkit.toml` (or `--config`), then `SEO_*` env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Natural-language API credential. Only `analyze` needs it.
    pub api_key: Option<String>,
    pub api_base: String,
    /// Root of the resource pages (`page.tsx` files are discovered below it).
    pub pages_dir: PathBuf,
    pub layout_file: PathBuf,
    /// Where the previous run's snapshots live.
    pub baseline_dir: PathBuf,
    /// Where this run's snapshots and COMPARISON.md are written.
    pub output_dir: PathBuf,
    pub rate_limit_ms: u64,
    pub date_published: String,
    pub author_name: String,
    pub site: SiteIdentity,
}

/// Organization/WebSite identity rendered into the layout JSON-LD.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteIdentity {
    pub name: String,
    pub url: String,
    pub description: String,
    pub founder: String,
    pub logo: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_key: None,
            api_base: "https://language.googleapis.com/v1".to_string(),
            pages_dir: PathBuf::from("src/app/(marketing)/resources"),
            layout_file: PathBuf::from("src/app/(marketing)/layout.tsx"),
            baseline_dir: PathBuf::from("content-analysis"),
            output_dir: PathBuf::from("content-analysis/post-optimization"),
            rate_limit_ms: 2000,
            date_published: "2026-01-01".to_string(),
            author_name: "Editorial Team".to_string(),
            site: SiteIdentity::default(),
        }
    }
}

impl Default for SiteIdentity {
    fn default() -> Self {
        SiteIdentity {
            name: "Example".to_string(),
            url: "https://example.com".to_string(),
            description: "".to_string(),
            founder: "".to_string(),
            logo: "https://example.com/logo.png".to_string(),
        }
    }
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;

        Ok(settings)
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("SEO_API_KEY (or `api_key` in {}) must be set", DEFAULT_CONFIG_FILE))
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}
