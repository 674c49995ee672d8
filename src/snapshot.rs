use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::utils::write_atomic;

/// Current on-disk snapshot layout. Files without a `version` field are legacy.
pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityScore {
    pub name: String,
    pub salience: f64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Persisted result of one analysis run for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub version: u32,
    pub slug: String,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub text_length: usize,
    /// `None` only for legacy files that stored a count without the list.
    pub entities: Option<Vec<EntityScore>>,
    pub entity_count: usize,
    pub categories: Vec<CategoryScore>,
    pub language: Option<String>,
}

impl AnalysisSnapshot {
    pub fn new(
        slug: &str,
        text_length: usize,
        entities: Vec<EntityScore>,
        categories: Vec<CategoryScore>,
        language: Option<String>,
        analyzed_at: DateTime<Utc>,
    ) -> Self {
        AnalysisSnapshot {
            version: SCHEMA_VERSION,
            slug: slug.to_string(),
            analyzed_at: Some(analyzed_at),
            text_length,
            entity_count: entities.len(),
            entities: Some(entities),
            categories,
            language,
        }
    }

    pub fn entities(&self) -> &[EntityScore] {
        self.entities.as_deref().unwrap_or(&[])
    }

    /// Length of the entity list, or the stored count when the list is unavailable.
    pub fn entity_count(&self) -> usize {
        self.entities
            .as_ref()
            .map(Vec::len)
            .unwrap_or(self.entity_count)
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    /// Bring any supported on-disk shape up to the current schema.
    pub fn from_json(slug_hint: &str, raw: Value) -> AnalysisSnapshot {
        let version = raw.get("version").and_then(Value::as_u64);
        if version == Some(u64::from(SCHEMA_VERSION)) {
            match serde_json::from_value::<AnalysisSnapshot>(raw.clone()) {
                Ok(snapshot) => return snapshot,
                Err(e) => warn!(
                    "Snapshot {} claims v{} but does not parse ({}), migrating",
                    slug_hint, SCHEMA_VERSION, e
                ),
            }
        } else {
            debug!("Migrating legacy snapshot for {}", slug_hint);
        }
        migrate_legacy(slug_hint, &raw)
    }
}

/// Legacy files come in two shapes: flat lists (`entities: [...]`) and the raw
/// API responses nested one level down (`entities: {entities: [...], language}`).
fn migrate_legacy(slug_hint: &str, raw: &Value) -> AnalysisSnapshot {
    let slug = raw
        .get("slug")
        .and_then(Value::as_str)
        .unwrap_or(slug_hint)
        .to_string();

    let analyzed_at = raw
        .get("analyzed_at")
        .or_else(|| raw.get("analyzedAt"))
        .and_then(Value::as_str)
        .and_then(parse_timestamp);

    let entities_field = raw.get("entities");
    let entities = unwrap_list(entities_field, "entities").map(|items| {
        items
            .iter()
            .filter_map(|e| {
                let name = e.get("name")?.as_str()?.to_string();
                Some(EntityScore {
                    name,
                    salience: e.get("salience").and_then(Value::as_f64).unwrap_or(0.0),
                    kind: e.get("type").and_then(Value::as_str).map(String::from),
                })
            })
            .collect::<Vec<_>>()
    });

    let categories = unwrap_list(raw.get("categories"), "categories")
        .map(|items| {
            items
                .iter()
                .filter_map(|c| {
                    Some(CategoryScore {
                        name: c.get("name")?.as_str()?.to_string(),
                        confidence: c.get("confidence").and_then(Value::as_f64),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let stored_count = raw
        .get("entity_count")
        .and_then(Value::as_u64)
        .map(|n| n as usize);
    if let (Some(list), Some(stored)) = (&entities, stored_count) {
        if list.len() != stored {
            warn!(
                "Snapshot {}: entity_count is {} but {} entities are listed; using the list",
                slug,
                stored,
                list.len()
            );
        }
    }
    let entity_count = entities
        .as_ref()
        .map(Vec::len)
        .or(stored_count)
        .unwrap_or(0);

    let language = raw
        .get("language")
        .or_else(|| entities_field.and_then(|e| e.get("language")))
        .and_then(Value::as_str)
        .map(String::from);

    AnalysisSnapshot {
        version: SCHEMA_VERSION,
        slug,
        analyzed_at,
        text_length: raw
            .get("text_length")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
        entities,
        entity_count,
        categories,
        language,
    }
}

/// A flat array, or an object wrapping the array under `key`.
fn unwrap_list<'a>(field: Option<&'a Value>, key: &str) -> Option<&'a Vec<Value>> {
    match field? {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get(key).and_then(Value::as_array),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

/// One `<slug>.json` file per page.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SnapshotStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slug))
    }

    /// `Ok(None)` when no snapshot exists for `slug`.
    pub fn load(&self, slug: &str) -> Result<Option<AnalysisSnapshot>> {
        let path = self.path_for(slug);
        if !path.exists() {
            return Ok(None);
        }
        read_snapshot(&path, slug).map(Some)
    }

    pub fn save(&self, snapshot: &AnalysisSnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(&snapshot.slug);
        let json = serde_json::to_string_pretty(snapshot)?;
        write_atomic(&path, &json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Every readable snapshot in the directory, ordered by slug. Unreadable files are skipped.
    pub fn load_all(&self) -> Result<Vec<AnalysisSnapshot>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut snapshots = Vec::with_capacity(paths.len());
        for path in paths {
            let slug = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            match read_snapshot(&path, &slug) {
                Ok(s) => snapshots.push(s),
                Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
            }
        }
        Ok(snapshots)
    }
}

fn read_snapshot(path: &Path, slug: &str) -> Result<AnalysisSnapshot> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(AnalysisSnapshot::from_json(slug, raw))
}
