use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use walkdir::WalkDir;

const PAGE_FILE_NAME: &str = "page.tsx";
const INDEX_SLUG: &str = "resources-index";
/// Programmatic page trees that get no per-page article schema.
const PROGRAMMATIC_SEGMENTS: &[&str] = &["guides", "templates"];

/// A page source file discovered under the pages root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    /// Relative parent directory with `-` separators, or `resources-index` for the root page.
    pub slug: String,
    /// Relative parent directory as written on disk (`""` for the root page).
    pub route: String,
    pub path: PathBuf,
}

impl PageFile {
    pub fn is_index(&self) -> bool {
        self.route.is_empty()
    }

    pub fn is_programmatic(&self) -> bool {
        PROGRAMMATIC_SEGMENTS.iter().any(|seg| self.route.contains(seg))
    }
}

/// Walk `root` and return every page file, sorted by slug.
pub fn discover(root: &Path) -> Result<Vec<PageFile>> {
    if !root.is_dir() {
        anyhow::bail!("Pages directory not found: {}", root.display());
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() || entry.file_name() != PAGE_FILE_NAME {
            continue;
        }
        let rel_dir = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .unwrap_or_else(|| Path::new(""));
        let route = rel_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        pages.push(PageFile {
            slug: slug_for(&route),
            route,
            path: entry.path().to_path_buf(),
        });
    }

    pages.sort_by(|a, b| a.slug.cmp(&b.slug));
    info!("Discovered {} page files under {}", pages.len(), root.display());
    Ok(pages)
}

/// `compliance/nyc-ll144` -> `compliance-nyc-ll144`; the root page gets a fixed slug.
pub fn slug_for(route: &str) -> String {
    if route.is_empty() {
        INDEX_SLUG.to_string()
    } else {
        route.replace('/', "-")
    }
}
