//! Entity diff between two analysis snapshots of the same page.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::snapshot::{AnalysisSnapshot, EntityScore};

/// Salience moves at or below this magnitude are noise.
pub const SALIENCE_THRESHOLD: f64 = 0.01;
pub const MAX_SALIENCE_CHANGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    New,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalienceChange {
    pub entity: String,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChange {
    pub previous: Vec<String>,
    pub current: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub slug: String,
    pub status: Status,
    /// `None` for pages without a previous snapshot.
    pub previous_count: Option<usize>,
    pub current_count: usize,
    pub entity_count_delta: i64,
    pub new_entities: BTreeSet<String>,
    pub removed_entities: BTreeSet<String>,
    pub salience_changes: Vec<SalienceChange>,
    pub category_change: Option<CategoryChange>,
}

/// Diff `current` against `previous`. Pure; never fails.
pub fn compare(previous: Option<&AnalysisSnapshot>, current: &AnalysisSnapshot) -> ComparisonResult {
    let current_map = SalienceMap::build(current.entities());
    let current_count = current.entity_count();

    let Some(previous) = previous else {
        return ComparisonResult {
            slug: current.slug.clone(),
            status: Status::New,
            previous_count: None,
            current_count,
            entity_count_delta: current_count as i64,
            new_entities: current_map.names().map(String::from).collect(),
            removed_entities: BTreeSet::new(),
            salience_changes: Vec::new(),
            category_change: None,
        };
    };

    let previous_map = SalienceMap::build(previous.entities());
    let previous_count = previous.entity_count();

    let new_entities = current_map
        .names()
        .filter(|n| !previous_map.contains(n))
        .map(String::from)
        .collect();
    let removed_entities = previous_map
        .names()
        .filter(|n| !current_map.contains(n))
        .map(String::from)
        .collect();

    ComparisonResult {
        slug: current.slug.clone(),
        status: Status::Updated,
        previous_count: Some(previous_count),
        current_count,
        entity_count_delta: current_count as i64 - previous_count as i64,
        new_entities,
        removed_entities,
        salience_changes: salience_changes(&previous_map, &current_map),
        category_change: Some(CategoryChange {
            previous: previous.category_names().into_iter().map(String::from).collect(),
            current: current.category_names().into_iter().map(String::from).collect(),
        }),
    }
}

/// Shared entities whose salience moved by more than the threshold, largest move first.
fn salience_changes(previous: &SalienceMap, current: &SalienceMap) -> Vec<SalienceChange> {
    let mut changes: Vec<SalienceChange> = current
        .iter()
        .filter_map(|(name, curr)| {
            let prev = previous.get(name)?;
            let delta = curr - prev;
            (delta.abs() > SALIENCE_THRESHOLD).then(|| SalienceChange {
                entity: name.to_string(),
                previous: prev,
                current: curr,
                delta,
            })
        })
        .collect();

    // stable: equal moves keep first-seen order
    changes.sort_by(|a, b| b.delta.abs().total_cmp(&a.delta.abs()));
    changes.truncate(MAX_SALIENCE_CHANGES);
    changes
}

/// Name -> salience with later duplicates overwriting earlier ones,
/// iterated in first-seen order.
struct SalienceMap<'a> {
    order: Vec<&'a str>,
    values: HashMap<&'a str, f64>,
}

impl<'a> SalienceMap<'a> {
    fn build(entities: &'a [EntityScore]) -> Self {
        let mut order = Vec::new();
        let mut values = HashMap::with_capacity(entities.len());
        for e in entities {
            if values.insert(e.name.as_str(), e.salience).is_none() {
                order.push(e.name.as_str());
            }
        }
        SalienceMap { order, values }
    }

    fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.order.iter().copied()
    }

    fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + '_ {
        self.order.iter().map(|n| (*n, self.values[n]))
    }

    fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}
