//! Report sinks and CSV export.

use crate::error::ReportError;
use crate::models::ClassificationReport;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str = "Environment,FilePath,FileName,FileType,TargetPath,Confidence,RequiresReview,FileSize,LastModified,Reasoning";

#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, report: &ClassificationReport) -> Result<(), ReportError>;
}

/// Writes `<dir>/<report_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    dir: PathBuf,
}

impl JsonReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, report: &ClassificationReport) -> PathBuf {
        self.dir.join(format!("{}.json", report.report_id))
    }
}

#[async_trait::async_trait]
impl ReportSink for JsonReportSink {
    async fn persist(&self, report: &ClassificationReport) -> Result<(), ReportError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(report)?;
        let path = self.path_for(report);
        tokio::fs::write(&path, body).await?;
        tracing::info!(path = ?path, "report written");
        Ok(())
    }
}

/// Flattens every environment into one CSV document.
///
/// Fields are wrapped in double quotes as-is; embedded quotes are not escaped,
/// so a value containing `"` produces a malformed row.
pub fn render_csv(report: &ClassificationReport) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for result in report.all_classifications() {
        let row = [
            result.file.environment.to_string(),
            result.file.path.clone(),
            result.file.name.clone(),
            result.file_type.to_string(),
            result.target_path.clone(),
            format!("{:.2}", result.confidence),
            result.requires_review.to_string(),
            result.file.size.to_string(),
            result.file.last_modified.to_rfc3339(),
            result.reasoning.join("; "),
        ];
        let quoted: Vec<String> = row.iter().map(|field| format!("\"{field}\"")).collect();
        out.push_str(&quoted.join(","));
        out.push('\n');
    }
    out
}

pub async fn write_csv(report: &ClassificationReport, path: &Path) -> Result<usize, ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = render_csv(report);
    tokio::fs::write(path, body).await?;
    Ok(report.all_classifications().count())
}
