//! Builds scanners and the manager from configuration, and runs one classification pass.

use anyhow::{anyhow, Context, Result};
use flatsort_core::classifier::FileClassifier;
use flatsort_core::config::{AppConfig, ScanConfig};
use flatsort_core::manager::ClassificationManager;
use flatsort_core::models::{ClassificationReport, Environment};
use flatsort_core::report::JsonReportSink;
use scanners::{LocalScanner, ManifestScanner, ScanScope, ScannerRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_EC2_HOST: &str = "ec2";

pub fn build_registry(scan: &ScanConfig) -> Result<ScannerRegistry> {
    let local = LocalScanner::new(&scan.local_root)
        .with_content_limit(scan.content_limit)
        .with_excludes(&scan.exclude)
        .context("invalid scan.exclude pattern")?;
    let mut registry = ScannerRegistry::new().with_scanner(Environment::Local, Arc::new(local));

    let host = scan.ec2_host.as_deref().unwrap_or(DEFAULT_EC2_HOST);
    if scan.ec2_project_manifest.is_some() || scan.ec2_home_manifest.is_some() {
        let mut remote = ManifestScanner::new(host);
        if let Some(p) = &scan.ec2_project_manifest {
            remote = remote.with_manifest(ScanScope::Project, p);
        }
        if let Some(p) = &scan.ec2_home_manifest {
            remote = remote.with_manifest(ScanScope::Home, p);
        }
        registry = registry.with_scanner(Environment::Ec2, Arc::new(remote));
    } else if let Some(root) = &scan.ec2_mount_root {
        let mut mounted = LocalScanner::new(root)
            .with_environment(Environment::Ec2)
            .with_content_limit(scan.content_limit)
            .with_excludes(&scan.exclude)
            .context("invalid scan.exclude pattern")?;
        if let Some(home) = &scan.ec2_mount_home {
            mounted = mounted.with_home(home);
        }
        registry = registry.with_scanner(Environment::Ec2, Arc::new(mounted));
    } else {
        warn!(host, "no ec2 source configured; ec2 will be reported as not configured");
    }
    Ok(registry)
}

pub fn build_manager(cfg: &AppConfig) -> Result<ClassificationManager> {
    let classifier = FileClassifier::new(&cfg.classification)?;
    let mut manager = ClassificationManager::new(classifier, build_registry(&cfg.scan)?);
    if cfg.reports.write_json {
        manager = manager.with_sink(Arc::new(JsonReportSink::new(&cfg.reports.dir)));
    }
    Ok(manager)
}

/// Runs both environments under the configured timeout. Expiry is an error.
pub async fn run_classification(
    manager: &ClassificationManager,
    cfg: &AppConfig,
) -> Result<ClassificationReport> {
    let limit = Duration::from_secs(cfg.orchestration.timeout_secs);
    let report = tokio::time::timeout(limit, manager.execute_integrated_classification())
        .await
        .map_err(|_| anyhow!("classification timed out after {}s", limit.as_secs()))??;
    Ok(report)
}

/// CSV destination: explicit path, or `<reports.dir>/<report_id>.csv` when CSV output is enabled.
pub fn csv_path(cfg: &AppConfig, report: &ClassificationReport, explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        cfg.reports
            .write_csv
            .then(|| PathBuf::from(&cfg.reports.dir).join(format!("{}.csv", report.report_id)))
    })
}

pub async fn classify(cfg: &AppConfig, csv: Option<PathBuf>) -> Result<ClassificationReport> {
    let manager = build_manager(cfg)?;
    let report = run_classification(&manager, cfg).await?;
    if let Some(path) = csv_path(cfg, &report, csv) {
        match manager.export_report_to_csv(&report, &path).await {
            Ok(rows) => info!(path = %path.display(), rows, "csv written"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to export csv"),
        }
    }
    Ok(report)
}
