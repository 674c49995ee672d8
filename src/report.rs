use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::compare::{ComparisonResult, Status};
use crate::snapshot::AnalysisSnapshot;
use crate::utils::truncate_chars;

pub const REPORT_FILE_NAME: &str = "COMPARISON.md";

const TOP_N: usize = 10;
const MAX_CATEGORY_ROWS: usize = 15;
const NEEDS_WORK_CATEGORY_WIDTH: usize = 50;
const CATEGORY_CHANGE_WIDTH: usize = 40;

/// Batch-level numbers for the executive summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub pages: usize,
    pub total_entity_change: i64,
    /// Over pages that had a previous snapshot; `None` when none did.
    pub avg_before: Option<f64>,
    pub avg_after: f64,
    /// `None` when there is no usable baseline.
    pub improvement_pct: Option<f64>,
}

impl Summary {
    pub fn compute(results: &[AnalysisSnapshot], comparisons: &[ComparisonResult]) -> Summary {
        let total_entity_change = comparisons.iter().map(|c| c.entity_count_delta).sum();

        let before: Vec<usize> = comparisons.iter().filter_map(|c| c.previous_count).collect();
        let avg_before = mean(&before);

        let after: Vec<usize> = results.iter().map(AnalysisSnapshot::entity_count).collect();
        let avg_after = mean(&after).unwrap_or(0.0);

        let improvement_pct = avg_before
            .filter(|b| *b > 0.0)
            .map(|b| (avg_after - b) / b * 100.0);

        Summary {
            pages: results.len(),
            total_entity_change,
            avg_before,
            avg_after,
            improvement_pct,
        }
    }
}

fn mean(values: &[usize]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<usize>() as f64 / values.len() as f64)
    }
}

/// Render the batch comparison as markdown.
pub fn render(
    results: &[AnalysisSnapshot],
    comparisons: &[ComparisonResult],
    generated_at: DateTime<Utc>,
) -> String {
    let summary = Summary::compute(results, comparisons);
    let mut out = String::new();

    out.push_str("# Post-Optimization NLP Analysis Comparison\n\n");
    out.push_str(&format!(
        "**Analysis Date:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("**Pages Analyzed:** {}\n\n", summary.pages));

    out.push_str("## Executive Summary\n\n");
    out.push_str(&format!(
        "- **Total Entity Change:** {:+}\n",
        summary.total_entity_change
    ));
    out.push_str(&format!(
        "- **Average Entities Before:** {:.1}\n",
        summary.avg_before.unwrap_or(0.0)
    ));
    out.push_str(&format!(
        "- **Average Entities After:** {:.1}\n",
        summary.avg_after
    ));
    match summary.improvement_pct {
        Some(pct) => out.push_str(&format!("- **Improvement:** {:.1}%\n", pct)),
        None => out.push_str("- **Improvement:** N/A (first run)\n"),
    }

    render_top_improvements(&mut out, comparisons);
    render_needs_work(&mut out, results);
    render_category_changes(&mut out, comparisons);
    render_details(&mut out, results, comparisons);

    out
}

fn render_top_improvements(out: &mut String, comparisons: &[ComparisonResult]) {
    out.push_str("\n## Top Improvements\n\n");

    let mut improved: Vec<&ComparisonResult> = comparisons
        .iter()
        .filter(|c| c.entity_count_delta > 0)
        .collect();
    improved.sort_by(|a, b| b.entity_count_delta.cmp(&a.entity_count_delta));
    improved.truncate(TOP_N);

    if improved.is_empty() {
        out.push_str("_No pages gained entities._\n");
        return;
    }
    out.push_str("| Page | Before | After | Change |\n");
    out.push_str("|------|--------|-------|--------|\n");
    for c in improved {
        out.push_str(&format!(
            "| {} | {} | {} | {:+} |\n",
            c.slug,
            c.previous_count.unwrap_or(0),
            c.current_count,
            c.entity_count_delta
        ));
    }
}

fn render_needs_work(out: &mut String, results: &[AnalysisSnapshot]) {
    out.push_str("\n## Pages Needing More Work\n\n");
    out.push_str("| Page | Entity Count | Categories |\n");
    out.push_str("|------|--------------|------------|\n");

    let mut lowest: Vec<&AnalysisSnapshot> = results.iter().collect();
    lowest.sort_by_key(|r| r.entity_count());
    for page in lowest.into_iter().take(TOP_N) {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            page.slug,
            page.entity_count(),
            category_label(page.category_names(), NEEDS_WORK_CATEGORY_WIDTH)
        ));
    }
}

fn render_category_changes(out: &mut String, comparisons: &[ComparisonResult]) {
    out.push_str("\n## Category Alignment Changes\n\n");

    let changed: Vec<(&str, String, String)> = comparisons
        .iter()
        .filter_map(|c| {
            let cc = c.category_change.as_ref()?;
            let prev = category_label(cc.previous.iter().map(String::as_str), CATEGORY_CHANGE_WIDTH);
            let curr = category_label(cc.current.iter().map(String::as_str), CATEGORY_CHANGE_WIDTH);
            (prev != curr).then_some((c.slug.as_str(), prev, curr))
        })
        .take(MAX_CATEGORY_ROWS)
        .collect();

    if changed.is_empty() {
        out.push_str("_No category changes detected._\n");
        return;
    }
    out.push_str("| Page | Previous Categories | Current Categories |\n");
    out.push_str("|------|---------------------|--------------------|\n");
    for (slug, prev, curr) in changed {
        out.push_str(&format!("| {} | {} | {} |\n", slug, prev, curr));
    }
}

fn render_details(out: &mut String, results: &[AnalysisSnapshot], comparisons: &[ComparisonResult]) {
    out.push_str("\n## Detailed Page Results\n\n");
    out.push_str("| Page | Entities | Categories | Status |\n");
    out.push_str("|------|----------|------------|--------|\n");

    let by_slug: HashMap<&str, &ComparisonResult> =
        comparisons.iter().map(|c| (c.slug.as_str(), c)).collect();

    let mut ordered: Vec<&AnalysisSnapshot> = results.iter().collect();
    ordered.sort_by(|a, b| b.entity_count().cmp(&a.entity_count()));
    for page in ordered {
        let status = match by_slug.get(page.slug.as_str()) {
            Some(c) if c.status == Status::New => "🆕 New".to_string(),
            Some(c) => format!("{:+}", c.entity_count_delta),
            None => "+0".to_string(),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            page.slug,
            page.entity_count(),
            page.categories.len(),
            status
        ));
    }
}

/// Last path segment of each category (`/Law & Government/Legal` -> `Legal`),
/// joined and cut to `width` chars; `None` when empty.
fn category_label<'a>(names: impl IntoIterator<Item = &'a str>, width: usize) -> String {
    let joined = names
        .into_iter()
        .map(|n| n.rsplit('/').next().unwrap_or(n))
        .collect::<Vec<_>>()
        .join(", ");
    let label = truncate_chars(&joined, width);
    if label.is_empty() {
        "None".to_string()
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::snapshot::{CategoryScore, EntityScore};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn snap(slug: &str, n: usize, categories: &[&str]) -> AnalysisSnapshot {
        AnalysisSnapshot::new(
            slug,
            2000,
            (0..n)
                .map(|i| EntityScore {
                    name: format!("{}-{}", slug, i),
                    salience: 0.1,
                    kind: None,
                })
                .collect(),
            categories
                .iter()
                .map(|c| CategoryScore {
                    name: c.to_string(),
                    confidence: None,
                })
                .collect(),
            None,
            at(),
        )
    }

    #[test]
    fn first_run_has_no_improvement_figure() {
        let results = vec![snap("a", 4, &[]), snap("b", 6, &[])];
        let comparisons: Vec<_> = results.iter().map(|r| compare(None, r)).collect();
        let s = Summary::compute(&results, &comparisons);
        assert_eq!(s.avg_before, None);
        assert_eq!(s.avg_after, 5.0);
        assert_eq!(s.improvement_pct, None);
        assert_eq!(s.total_entity_change, 10);

        let md = render(&results, &comparisons, at());
        assert!(md.contains("- **Improvement:** N/A (first run)\n"));
        assert!(md.contains("- **Average Entities Before:** 0.0\n"));
        assert!(md.contains("| a | 4 | 0 | 🆕 New |"));
    }

    #[test]
    fn baseline_average_skips_new_pages() {
        let prev_a = snap("a", 10, &[]);
        let results = vec![snap("a", 15, &[]), snap("b", 5, &[])];
        let comparisons = vec![compare(Some(&prev_a), &results[0]), compare(None, &results[1])];
        let s = Summary::compute(&results, &comparisons);
        assert_eq!(s.avg_before, Some(10.0));
        assert_eq!(s.avg_after, 10.0);
        assert_eq!(s.improvement_pct, Some(0.0));
        assert_eq!(s.total_entity_change, 10);
    }

    #[test]
    fn zero_baseline_is_not_applicable() {
        let prev = snap("a", 0, &[]);
        let results = vec![snap("a", 3, &[])];
        let comparisons = vec![compare(Some(&prev), &results[0])];
        let s = Summary::compute(&results, &comparisons);
        assert_eq!(s.avg_before, Some(0.0));
        assert_eq!(s.improvement_pct, None);
    }

    #[test]
    fn empty_batch_renders() {
        let md = render(&[], &[], at());
        assert!(md.contains("**Pages Analyzed:** 0"));
        assert!(md.contains("N/A (first run)"));
        assert!(md.contains("_No pages gained entities._"));
    }

    #[test]
    fn sections_in_order() {
        let md = render(&[snap("a", 1, &[])], &[], at());
        let headers = [
            "## Executive Summary",
            "## Top Improvements",
            "## Pages Needing More Work",
            "## Category Alignment Changes",
            "## Detailed Page Results",
        ];
        let positions: Vec<usize> = headers.iter().map(|h| md.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(md.starts_with("# Post-Optimization NLP Analysis Comparison\n\n**Analysis Date:** 2026-03-01 09:00:00\n"));
    }

    #[test]
    fn rankings() {
        let prevs = [snap("a", 5, &["/Law/Legal"]), snap("b", 5, &["/Jobs"]), snap("c", 9, &[])];
        let results = vec![
            snap("a", 8, &["/Law/Legal"]),
            snap("b", 12, &["/Business/Jobs"]),
            snap("c", 3, &[]),
        ];
        let comparisons: Vec<_> = prevs
            .iter()
            .zip(&results)
            .map(|(p, r)| compare(Some(p), r))
            .collect();
        let md = render(&results, &comparisons, at());

        let improvements = md.split("## Top Improvements").nth(1).unwrap();
        let b_row = improvements.find("| b | 5 | 12 | +7 |").unwrap();
        let a_row = improvements.find("| a | 5 | 8 | +3 |").unwrap();
        assert!(b_row < a_row);
        let before_needs_work = improvements.split("## Pages Needing More Work").next().unwrap();
        assert!(!before_needs_work.contains("| c |"));

        let needs_work = md.split("## Pages Needing More Work").nth(1).unwrap();
        assert!(needs_work.find("| c | 3 | None |").unwrap() < needs_work.find("| a | 8 | Legal |").unwrap());

        // "Jobs" vs "Jobs" compares equal after normalization
        let cats = md.split("## Category Alignment Changes").nth(1).unwrap();
        let cats = cats.split("## Detailed Page Results").next().unwrap();
        assert!(cats.contains("_No category changes detected._"));

        let details = md.split("## Detailed Page Results").nth(1).unwrap();
        let order: Vec<usize> = ["| b | 12 | 1 | +7 |", "| a | 8 | 1 | +3 |", "| c | 3 | 0 | -6 |"]
            .iter()
            .map(|row| details.find(row).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn category_change_rows() {
        let prev = snap("a", 1, &["/Law & Government/Legal", "/Jobs & Education/Jobs"]);
        let curr = snap("a", 1, &["/Business & Industrial/Human Resources"]);
        let c = compare(Some(&prev), &curr);
        let md = render(&[curr.clone()], &[c], at());
        assert!(md.contains("| a | Legal, Jobs | Human Resources |"));
    }

    #[test]
    fn labels_truncate() {
        let long = ["/A/Aaaaaaaaaaaaaaaaaaaa", "/B/Bbbbbbbbbbbbbbbbbbbb", "/C/Cccccccccccccccccccc"];
        let label = category_label(long.iter().copied(), 40);
        assert_eq!(label.chars().count(), 40);
        assert_eq!(category_label(std::iter::empty(), 40), "None");
    }

    #[test]
    fn stable_ties() {
        let results = vec![snap("x", 2, &[]), snap("y", 2, &[]), snap("z", 2, &[])];
        let md = render(&results, &[], at());
        let details = md.split("## Detailed Page Results").nth(1).unwrap();
        assert!(details.find("| x |").unwrap() < details.find("| y |").unwrap());
        assert!(details.find("| y |").unwrap() < details.find("| z |").unwrap());
    }
}
