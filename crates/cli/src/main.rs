use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use flatsort_cli::wiring;
use flatsort_core::config::{self, AppConfig};
use flatsort_core::matcher::PatternMatcher;
use flatsort_core::models::ClassificationReport;
use flatsort_core::query::{filter_classifications, sort_classifications, ClassificationFilter, SortKey, SortOrder};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify {
            json,
            csv,
            review_only,
            min_confidence,
            sort,
            asc,
        } => {
            let listing = Listing {
                review_only,
                min_confidence,
                sort: parse_sort_key(&sort)?,
                order: if asc { SortOrder::Asc } else { SortOrder::Desc },
            };
            run_classify(cfg, json, csv, listing).await
        }
        Commands::Rules { json } => show_rules(&cfg, json),
        Commands::TestPattern { pattern, name } => test_pattern(&cfg, &pattern, &name),
    }
}

#[derive(Parser)]
#[command(name = "flatsort")]
#[command(about = "Classify flat files on the local machine and the EC2 host", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify both environments and write the reports
    Classify {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
        /// Write the CSV export to this path (overrides reports.write_csv)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// List only files that need manual review
        #[arg(long, default_value_t = false)]
        review_only: bool,
        /// Only list files at or above this confidence
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Sort key for the listing: confidence|filetype|path|size
        #[arg(long, default_value = "confidence")]
        sort: String,
        /// Sort ascending instead of descending
        #[arg(long, default_value_t = false)]
        asc: bool,
    },
    /// Show the loaded rule table
    Rules {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Score one glob pattern against a file name
    TestPattern {
        /// Glob pattern, e.g. "deploy*.sh"
        pattern: String,
        /// File name to test
        name: String,
    },
}

struct Listing {
    review_only: bool,
    min_confidence: Option<f64>,
    sort: SortKey,
    order: SortOrder,
}

fn parse_sort_key(raw: &str) -> Result<SortKey> {
    Ok(match raw.to_ascii_lowercase().as_str() {
        "confidence" => SortKey::Confidence,
        "filetype" | "file_type" | "type" => SortKey::FileType,
        "path" => SortKey::Path,
        "size" => SortKey::Size,
        other => bail!("unknown sort key {other:?} (expected confidence|filetype|path|size)"),
    })
}

async fn run_classify(cfg: AppConfig, json: bool, csv: Option<PathBuf>, listing: Listing) -> Result<()> {
    let report = wiring::classify(&cfg, csv).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_summary(&report, &listing);
    Ok(())
}

fn print_summary(report: &ClassificationReport, listing: &Listing) {
    println!("report {}", report.report_id);
    for (environment, result) in &report.environment_results {
        match result.errors.first() {
            Some(err) => println!("{environment}: failed: {err}"),
            None => println!(
                "{environment}: {} files, {} need review, avg confidence {:.2}, {} file errors, {} ms",
                result.total_files,
                result.statistics.requires_review,
                result.statistics.average_confidence,
                result.file_errors.len(),
                result.processing_time
            ),
        }
    }

    let all: Vec<_> = report.all_classifications().cloned().collect();
    let filter = ClassificationFilter {
        min_confidence: listing.min_confidence,
        requires_review: listing.review_only.then_some(true),
        ..ClassificationFilter::default()
    };
    let listed = sort_classifications(&filter_classifications(&all, &filter), listing.sort, listing.order);
    for c in &listed {
        let target = if c.target_path.is_empty() { "-" } else { c.target_path.as_str() };
        let flag = if c.requires_review { " [review]" } else { "" };
        println!(
            "  {:.2} {:<20} {}:{} -> {}{}",
            c.confidence,
            c.file_type.as_str(),
            c.file.environment,
            c.file.path,
            target,
            flag
        );
    }

    for w in &report.warnings {
        println!("warning: {w}");
    }
    for r in &report.recommendations {
        println!("recommendation: {r}");
    }
}

fn build_matcher(cfg: &AppConfig) -> Result<PatternMatcher> {
    Ok(PatternMatcher::new(
        cfg.classification.classification_rules.clone(),
        &cfg.classification.matching,
    )?)
}

fn show_rules(cfg: &AppConfig, json: bool) -> Result<()> {
    let matcher = build_matcher(cfg)?;
    let stats = matcher.statistics();
    if json {
        let out = serde_json::json!({
            "statistics": stats,
            "rules": matcher.rules(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!(
        "{} rules ({} enabled, {} disabled)",
        stats.total_rules, stats.enabled_rules, stats.disabled_rules
    );
    for rule in matcher.rules().rules() {
        println!(
            "  {}.{:<14} priority {:>2}{}  [{}] -> {}",
            rule.category,
            rule.name,
            rule.priority,
            if rule.enabled { "" } else { " (disabled)" },
            rule.patterns.join(", "),
            rule.file_type()
        );
    }
    Ok(())
}

fn test_pattern(cfg: &AppConfig, pattern: &str, name: &str) -> Result<()> {
    let confidence = build_matcher(cfg)?.test_pattern(pattern, name)?;
    println!("{pattern} vs {name}: {confidence:.2}");
    Ok(())
}
