use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::compare::{compare, ComparisonResult};
use crate::config::Settings;
use crate::extract::{strip_markup, MIN_TEXT_CHARS};
use crate::nlp::NlpClient;
use crate::pages::{self, PageFile};
use crate::report::{self, Summary, REPORT_FILE_NAME};
use crate::snapshot::{AnalysisSnapshot, SnapshotStore};
use crate::utils::write_atomic;

/// Which pages an `analyze` run covers.
#[derive(Debug, Default, Clone)]
pub struct AnalyzeOptions {
    pub limit: Option<usize>,
    pub slug: Option<String>,
}

impl AnalyzeOptions {
    /// True when only part of the site is analyzed.
    pub fn is_partial(&self) -> bool {
        self.limit.is_some() || self.slug.is_some()
    }
}

pub struct BatchOutcome {
    pub snapshots: Vec<AnalysisSnapshot>,
    pub comparisons: Vec<ComparisonResult>,
    pub skipped: usize,
    pub summary: Summary,
    /// `None` for partial or empty runs, which leave the existing report alone.
    pub report_path: Option<PathBuf>,
}

/// Analyze every selected page one at a time, persist each snapshot and diff it
/// against the baseline. A full run finishes with `COMPARISON.md` in the output directory.
pub async fn analyze(
    settings: &Settings,
    client: &NlpClient,
    opts: &AnalyzeOptions,
) -> Result<BatchOutcome> {
    let pages = select_pages(pages::discover(&settings.pages_dir)?, opts);
    let baseline = SnapshotStore::new(&settings.baseline_dir);
    let output = SnapshotStore::new(&settings.output_dir);
    let delay = settings.rate_limit();

    info!(
        "Analyzing {} pages (baseline: {}, output: {})",
        pages.len(),
        baseline.dir().display(),
        output.dir().display()
    );

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut snapshots = Vec::new();
    let mut comparisons = Vec::new();
    let mut skipped = 0usize;

    for page in &pages {
        pb.set_message(page.slug.clone());
        let current = match analyze_page(client, page, delay).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                skipped += 1;
                pb.inc(1);
                continue;
            }
            Err(e) => {
                warn!("{}: skipped ({:#})", page.slug, e);
                skipped += 1;
                pb.inc(1);
                continue;
            }
        };

        // read before writing: baseline and output may be the same directory
        let previous = load_previous(&baseline, &page.slug);
        output.save(&current)?;

        let comparison = compare(previous.as_ref(), &current);
        info!(
            "{}: {} entities ({:+}), {} new, {} removed",
            page.slug,
            comparison.current_count,
            comparison.entity_count_delta,
            comparison.new_entities.len(),
            comparison.removed_entities.len()
        );
        snapshots.push(current);
        comparisons.push(comparison);
        pb.inc(1);

        tokio::time::sleep(delay).await;
    }
    pb.finish_and_clear();

    let report_path = if opts.is_partial() || snapshots.is_empty() {
        info!(
            "Partial or empty run, {} left untouched (use `report` to rebuild it)",
            output.dir().join(REPORT_FILE_NAME).display()
        );
        None
    } else {
        Some(write_report(output.dir(), &snapshots, &comparisons)?)
    };
    Ok(BatchOutcome {
        summary: Summary::compute(&snapshots, &comparisons),
        snapshots,
        comparisons,
        skipped,
        report_path,
    })
}

/// Rebuild `COMPARISON.md` from the snapshots already in the output directory.
///
/// Fails when baseline and output are the same directory: every snapshot would
/// be compared against itself.
pub fn rebuild_report(settings: &Settings) -> Result<(PathBuf, Summary)> {
    if same_dir(&settings.baseline_dir, &settings.output_dir) {
        anyhow::bail!(
            "Baseline and output are both {}; the report needs a separate baseline directory",
            settings.output_dir.display()
        );
    }
    let baseline = SnapshotStore::new(&settings.baseline_dir);
    let output = SnapshotStore::new(&settings.output_dir);

    let snapshots = output.load_all()?;
    let comparisons: Vec<ComparisonResult> = snapshots
        .iter()
        .map(|current| compare(load_previous(&baseline, &current.slug).as_ref(), current))
        .collect();

    let path = write_report(output.dir(), &snapshots, &comparisons)?;
    Ok((path, Summary::compute(&snapshots, &comparisons)))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn select_pages(pages: Vec<PageFile>, opts: &AnalyzeOptions) -> Vec<PageFile> {
    pages
        .into_iter()
        .filter(|p| opts.slug.as_deref().map_or(true, |s| p.slug == s))
        .take(opts.limit.unwrap_or(usize::MAX))
        .collect()
}

/// `Ok(None)` when the page has too little text to be worth a request.
async fn analyze_page(
    client: &NlpClient,
    page: &PageFile,
    delay: Duration,
) -> Result<Option<AnalysisSnapshot>> {
    let source = fs::read_to_string(&page.path)
        .with_context(|| format!("Failed to read {}", page.path.display()))?;
    let text = strip_markup(&source);
    let text_length = text.chars().count();
    if text_length < MIN_TEXT_CHARS {
        warn!("{}: only {} chars of text extracted, skipping", page.slug, text_length);
        return Ok(None);
    }

    let analysis = client.analyze_entities(&text).await?;
    tokio::time::sleep(delay).await;
    let categories = client.classify_text(&text).await?.into_scores();

    let language = analysis.language.clone();
    Ok(Some(AnalysisSnapshot::new(
        &page.slug,
        text_length,
        analysis.into_scores(),
        categories,
        language,
        Utc::now(),
    )))
}

/// An unreadable baseline is treated as no baseline.
fn load_previous(store: &SnapshotStore, slug: &str) -> Option<AnalysisSnapshot> {
    match store.load(slug) {
        Ok(previous) => previous,
        Err(e) => {
            warn!("{}: ignoring previous snapshot ({:#})", slug, e);
            None
        }
    }
}

fn write_report(
    dir: &Path,
    snapshots: &[AnalysisSnapshot],
    comparisons: &[ComparisonResult],
) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(REPORT_FILE_NAME);
    let markdown = report::render(snapshots, comparisons, Utc::now());
    write_atomic(&path, &markdown)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Report written to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Status;
    use mockito::Matcher;

    const LONG_PAGE: &str = r#"import Link from "next/link"

export default function Page() {
  return (
    <main>
      <h1>Colorado AI Act</h1>
      <p>Employers using automated decision tools in Colorado must complete impact assessments and notify candidates before any consequential decision is made.</p>
    </main>
  )
}
"#;

    fn site(root: &Path) -> Settings {
        let pages_dir = root.join("resources");
        for (rel, body) in [
            ("colorado/page.tsx", LONG_PAGE),
            ("nyc/page.tsx", LONG_PAGE),
            ("stub/page.tsx", "export default function P() { return <div>tiny</div> }"),
        ] {
            let p = pages_dir.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, body).unwrap();
        }
        Settings {
            api_key: Some("k".into()),
            pages_dir,
            baseline_dir: root.join("baseline"),
            output_dir: root.join("post"),
            rate_limit_ms: 0,
            ..Settings::default()
        }
    }

    async fn mock_api(server: &mut mockito::ServerGuard) {
        server
            .mock("POST", "/documents:analyzeEntities")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"entities":[{"name":"Colorado","salience":0.5},{"name":"AI Act","salience":0.3}],"language":"en"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/documents:classifyText")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"categories":[{"name":"/Law & Government/Legal","confidence":0.9}]}"#)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn batch_against_legacy_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        fs::create_dir_all(&settings.baseline_dir).unwrap();
        fs::write(
            settings.baseline_dir.join("colorado.json"),
            r#"{"slug":"colorado","entities":{"entities":[{"name":"Colorado","salience":0.4}]},"categories":{"categories":[]}}"#,
        )
        .unwrap();

        let mut server = mockito::Server::new_async().await;
        mock_api(&mut server).await;
        let client = NlpClient::new(&server.url(), "k").unwrap();

        let outcome = analyze(&settings, &client, &AnalyzeOptions::default()).await.unwrap();
        assert_eq!(outcome.snapshots.len(), 2);
        assert_eq!(outcome.skipped, 1);

        let colorado = &outcome.comparisons[0];
        assert_eq!(colorado.slug, "colorado");
        assert_eq!(colorado.status, Status::Updated);
        assert_eq!(colorado.entity_count_delta, 1);
        assert_eq!(colorado.salience_changes.len(), 1);
        assert_eq!(outcome.comparisons[1].status, Status::New);

        assert!(settings.output_dir.join("colorado.json").exists());
        assert!(!settings.output_dir.join("stub.json").exists());
        let report_path = outcome.report_path.clone().unwrap();
        let md = fs::read_to_string(&report_path).unwrap();
        assert!(md.contains("**Pages Analyzed:** 2"));
        assert!(md.contains("- **Improvement:** 100.0%"));

        let (path, summary) = rebuild_report(&settings).unwrap();
        assert_eq!(path, report_path);
        assert_eq!(summary, outcome.summary);
    }

    #[tokio::test]
    async fn same_directory_for_baseline_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = site(dir.path());
        settings.baseline_dir = settings.output_dir.clone();

        let mut server = mockito::Server::new_async().await;
        mock_api(&mut server).await;
        let client = NlpClient::new(&server.url(), "k").unwrap();
        let opts = AnalyzeOptions {
            limit: None,
            slug: Some("nyc".into()),
        };

        let first = analyze(&settings, &client, &opts).await.unwrap();
        assert_eq!(first.comparisons.len(), 1);
        assert_eq!(first.comparisons[0].status, Status::New);

        let second = analyze(&settings, &client, &opts).await.unwrap();
        assert_eq!(second.comparisons[0].status, Status::Updated);
        assert_eq!(second.comparisons[0].entity_count_delta, 0);

        // offline rebuild would compare each snapshot with itself
        let err = rebuild_report(&settings).unwrap_err();
        assert!(err.to_string().contains("separate baseline"));
        assert!(!settings.output_dir.join(REPORT_FILE_NAME).exists());
    }

    #[test]
    fn rebuild_refuses_equivalent_paths() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("post");
        SnapshotStore::new(&output)
            .save(&AnalysisSnapshot::new("a", 500, Vec::new(), Vec::new(), None, Utc::now()))
            .unwrap();
        let settings = Settings {
            baseline_dir: dir.path().join("post/../post"),
            output_dir: output.clone(),
            ..Settings::default()
        };
        assert!(rebuild_report(&settings).is_err());
        assert!(!output.join(REPORT_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn partial_runs_leave_the_report_alone() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        fs::create_dir_all(&settings.output_dir).unwrap();
        let report = settings.output_dir.join(REPORT_FILE_NAME);
        fs::write(&report, "full run").unwrap();

        let mut server = mockito::Server::new_async().await;
        mock_api(&mut server).await;
        let client = NlpClient::new(&server.url(), "k").unwrap();

        let by_slug = AnalyzeOptions {
            limit: None,
            slug: Some("nyc".into()),
        };
        let outcome = analyze(&settings, &client, &by_slug).await.unwrap();
        assert_eq!(outcome.snapshots.len(), 1);
        assert!(outcome.report_path.is_none());

        let typo = AnalyzeOptions {
            limit: None,
            slug: Some("nyx".into()),
        };
        assert!(analyze(&settings, &client, &typo).await.unwrap().snapshots.is_empty());

        let limited = AnalyzeOptions {
            limit: Some(1),
            slug: None,
        };
        assert!(analyze(&settings, &client, &limited).await.unwrap().report_path.is_none());
        assert_eq!(fs::read_to_string(&report).unwrap(), "full run");
    }

    #[tokio::test]
    async fn transport_errors_skip_pages() {
        let dir = tempfile::tempdir().unwrap();
        let settings = site(dir.path());
        let client = NlpClient::new("http://127.0.0.1:9", "k").unwrap();

        let outcome = analyze(&settings, &client, &AnalyzeOptions::default()).await.unwrap();
        assert!(outcome.snapshots.is_empty());
        assert_eq!(outcome.skipped, 3);
        assert!(outcome.report_path.is_none());
        assert!(!settings.output_dir.join(REPORT_FILE_NAME).exists());
    }

    #[test]
    fn selection_honors_slug_and_limit() {
        let page = |slug: &str| PageFile {
            slug: slug.into(),
            route: slug.into(),
            path: PathBuf::from(slug),
        };
        let all = vec![page("a"), page("b"), page("c")];
        let limited = select_pages(
            all.clone(),
            &AnalyzeOptions {
                limit: Some(2),
                slug: None,
            },
        );
        assert_eq!(limited, vec![page("a"), page("b")]);
        let one = select_pages(
            all,
            &AnalyzeOptions {
                limit: None,
                slug: Some("c".into()),
            },
        );
        assert_eq!(one, vec![page("c")]);
    }
}
