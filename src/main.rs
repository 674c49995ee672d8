mod compare;
mod config;
mod extract;
mod inject;
mod nlp;
mod pages;
mod pipeline;
mod report;
mod snapshot;
mod utils;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::inject::Outcome;
use crate::pipeline::AnalyzeOptions;

#[derive(Parser)]
#[command(name = "seo_toolkit", about = "Structured-data injection and NLP entity tracking for marketing pages")]
struct Cli {
    /// Settings file (default: ./seo_toolkit.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add Organization, Article and FAQ schema to page sources
    Inject {
        /// Also insert FAQ schema data (default: only list FAQ pages)
        #[arg(long)]
        apply_faq: bool,
        /// Pages root (overrides settings)
        #[arg(long)]
        pages: Option<PathBuf>,
        /// Layout file (overrides settings)
        #[arg(long)]
        layout: Option<PathBuf>,
    },
    /// Analyze pages with the NLP API and compare against the baseline
    Analyze {
        /// Max pages to analyze (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Only analyze the page with this slug
        #[arg(short, long)]
        slug: Option<String>,
        #[arg(long)]
        pages: Option<PathBuf>,
        /// Directory holding the previous run's snapshots
        #[arg(long)]
        baseline: Option<PathBuf>,
        /// Directory for this run's snapshots and report
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rebuild COMPARISON.md from snapshots on disk
    Report {
        #[arg(long)]
        baseline: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List pages with FAQ content
    Faqs {
        #[arg(long)]
        pages: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Inject { apply_faq, pages, layout } => {
            override_path(&mut settings.pages_dir, pages);
            override_path(&mut settings.layout_file, layout);
            let s = inject::run(&settings, apply_faq)?;

            let layout = match &s.layout {
                Some(Outcome::Applied(_)) => "added",
                Some(Outcome::AlreadyApplied(_)) => "already present",
                None => "not modified",
            };
            println!("Layout schema:  {}", layout);
            println!("ArticleSchema:  {} added, {} skipped", s.articles_added, s.articles_skipped);
            if apply_faq {
                println!("FAQSchema:      {} added ({} FAQ pages)", s.faq_added, s.faq_pages);
            } else {
                println!(
                    "FAQ pages:      {} found (re-run with --apply-faq to insert schema data)",
                    s.faq_pages
                );
            }
            Ok(())
        }
        Commands::Analyze { limit, slug, pages, baseline, output } => {
            override_path(&mut settings.pages_dir, pages);
            override_path(&mut settings.baseline_dir, baseline);
            override_path(&mut settings.output_dir, output);

            let client = nlp::NlpClient::new(&settings.api_base, settings.api_key()?)?;
            let opts = AnalyzeOptions { limit, slug };
            let batch = pipeline::analyze(&settings, &client, &opts).await?;

            let gained: usize = batch.comparisons.iter().map(|c| c.new_entities.len()).sum();
            let lost: usize = batch.comparisons.iter().map(|c| c.removed_entities.len()).sum();
            println!(
                "Analyzed {} pages ({} skipped): {} entities gained, {} lost.",
                batch.snapshots.len(),
                batch.skipped,
                gained,
                lost
            );
            print_summary(&batch.summary);
            match &batch.report_path {
                Some(path) => println!("Report: {}", path.display()),
                None => println!("Report not updated (partial or empty run); use `report` to rebuild it."),
            }
            Ok(())
        }
        Commands::Report { baseline, output } => {
            override_path(&mut settings.baseline_dir, baseline);
            override_path(&mut settings.output_dir, output);
            let (path, summary) = pipeline::rebuild_report(&settings)?;
            print_summary(&summary);
            println!("Report: {}", path.display());
            Ok(())
        }
        Commands::Faqs { pages } => {
            override_path(&mut settings.pages_dir, pages);
            let all = pages::discover(&settings.pages_dir)?;
            let found = inject::find_faq_pages(&all);
            if found.is_empty() {
                println!("No FAQ sections found.");
                return Ok(());
            }
            for (page, count) in &found {
                println!("{:>3}  {}", count, inject::display_route(page));
            }
            println!("\n{} pages with FAQ content", found.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn override_path(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn print_summary(s: &report::Summary) {
    println!("Total entity change: {:+}", s.total_entity_change);
    match s.improvement_pct {
        Some(pct) => println!(
            "Average entities:    {:.1} -> {:.1} ({:+.1}%)",
            s.avg_before.unwrap_or(0.0),
            s.avg_after,
            pct
        ),
        None => println!("Average entities:    {:.1} (first run)", s.avg_after),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
