//! Runs the classifier over every environment and assembles the report.
//!
//! Environments run as separate tasks. A failed scan or a panicking pipeline
//! becomes an errored, zero-file entry for that environment; the other
//! environment and the report itself are unaffected.

use crate::classifier::{failed_placeholder, FileClassifier};
use crate::error::{ClassificationError, ReportError};
use crate::models::{
    ClassificationReport, ClassificationResult, ClassificationStatistics, Environment,
    EnvironmentClassificationResult, FileType,
};
use crate::query::{self, ClassificationFilter, SortKey, SortOrder};
use crate::report::{self, ReportSink};
use crate::stats;
use chrono::{DateTime, Utc};
use scanners::ScannerRegistry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

pub const LOW_AVERAGE_CONFIDENCE: f64 = 0.6;
pub const REVIEW_VOLUME_LIMIT: usize = 10;
pub const PHASED_ORGANIZATION_LIMIT: usize = 100;
pub const UNKNOWN_VOLUME_LIMIT: usize = 5;
pub const SLOW_ENVIRONMENT_MS: u64 = 30_000;

pub struct ClassificationManager {
    classifier: Arc<FileClassifier>,
    scanners: ScannerRegistry,
    sink: Option<Arc<dyn ReportSink>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationOutcome {
    pub valid: Vec<ClassificationResult>,
    pub invalid: Vec<ClassificationResult>,
    pub validation_errors: Vec<String>,
}

impl ClassificationManager {
    pub fn new(classifier: FileClassifier, scanners: ScannerRegistry) -> Self {
        Self {
            classifier: Arc::new(classifier),
            scanners,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn classifier(&self) -> &FileClassifier {
        &self.classifier
    }

    /// Exclusive access for rule administration; copies the classifier if a run still holds it.
    pub fn classifier_mut(&mut self) -> &mut FileClassifier {
        Arc::make_mut(&mut self.classifier)
    }

    pub async fn execute_integrated_classification(
        &self,
    ) -> Result<ClassificationReport, ClassificationError> {
        info!("starting integrated classification");
        let local = self.spawn_environment(Environment::Local);
        let ec2 = self.spawn_environment(Environment::Ec2);
        let (local, ec2) = tokio::join!(local, ec2);

        let results = vec![
            settle(Environment::Local, local),
            settle(Environment::Ec2, ec2),
        ];
        let report = assemble_report(results, Utc::now())?;
        info!(
            report_id = %report.report_id,
            files = report.all_classifications().count(),
            warnings = report.warnings.len(),
            "integrated classification finished"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.persist(&report).await {
                warn!(report_id = %report.report_id, error = %e, "failed to persist report");
            }
        }
        Ok(report)
    }

    fn spawn_environment(&self, environment: Environment) -> JoinHandle<EnvironmentClassificationResult> {
        let classifier = Arc::clone(&self.classifier);
        let scanners = self.scanners.clone();
        tokio::spawn(async move { run_environment(&classifier, &scanners, environment).await })
    }

    pub async fn classify_environment(&self, environment: Environment) -> EnvironmentClassificationResult {
        run_environment(&self.classifier, &self.scanners, environment).await
    }

    /// Splits results by the classifier's validity rules plus basic shape checks.
    pub fn validate_classifications(&self, results: &[ClassificationResult]) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        for result in results {
            let mut errors = shape_errors(result);
            errors.extend(self.classifier.validation_errors(&result.file, result));
            if errors.is_empty() {
                outcome.valid.push(result.clone());
            } else {
                outcome
                    .validation_errors
                    .extend(errors.into_iter().map(|e| format!("{}: {e}", result.file.path)));
                outcome.invalid.push(result.clone());
            }
        }
        outcome
    }

    pub fn filter_classifications(
        &self,
        results: &[ClassificationResult],
        filter: &ClassificationFilter,
    ) -> Vec<ClassificationResult> {
        query::filter_classifications(results, filter)
    }

    pub fn sort_classifications(
        &self,
        results: &[ClassificationResult],
        key: SortKey,
        order: SortOrder,
    ) -> Vec<ClassificationResult> {
        query::sort_classifications(results, key, order)
    }

    pub async fn export_report_to_csv(
        &self,
        report: &ClassificationReport,
        path: &Path,
    ) -> Result<usize, ReportError> {
        let rows = report::write_csv(report, path).await?;
        info!(path = ?path, rows, "csv report exported");
        Ok(rows)
    }
}

fn settle(
    environment: Environment,
    joined: Result<EnvironmentClassificationResult, JoinError>,
) -> EnvironmentClassificationResult {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!(%environment, error = %e, "environment pipeline aborted");
            EnvironmentClassificationResult::failed(
                environment,
                format!("environment pipeline aborted: {e}"),
                0,
            )
        }
    }
}

async fn run_environment(
    classifier: &FileClassifier,
    scanners: &ScannerRegistry,
    environment: Environment,
) -> EnvironmentClassificationResult {
    let started = Instant::now();
    info!(%environment, "scanning environment");

    let files = match scanners.scan_environment(environment).await {
        Ok(files) => files,
        Err(e) => {
            error!(%environment, error = %e, "scan failed");
            return EnvironmentClassificationResult::failed(environment, e.to_string(), elapsed_ms(started));
        }
    };

    let mut classifications = Vec::with_capacity(files.len());
    let mut file_errors = Vec::new();
    for file in &files {
        match classifier.classify_file(file) {
            Ok(result) => classifications.push(result),
            Err(e) => {
                warn!(%environment, file = %file.path, error = %e, "file classification failed");
                file_errors.push(e.to_string());
                classifications.push(failed_placeholder(file, &e, Utc::now()));
            }
        }
    }

    let statistics = stats::generate(&classifications);
    let processing_time = elapsed_ms(started);
    info!(
        %environment,
        files = files.len(),
        failed = file_errors.len(),
        processing_time,
        "environment classified"
    );

    EnvironmentClassificationResult {
        environment,
        total_files: files.len(),
        classifications,
        statistics,
        errors: Vec::new(),
        file_errors,
        processing_time,
    }
}

/// Joins per-environment results into a report. Each environment must appear exactly once.
pub fn assemble_report(
    results: Vec<EnvironmentClassificationResult>,
    generated_at: DateTime<Utc>,
) -> Result<ClassificationReport, ClassificationError> {
    let mut environment_results = BTreeMap::new();
    for result in results {
        let environment = result.environment;
        if environment_results.insert(environment, result).is_some() {
            return Err(ClassificationError::Aggregation(format!(
                "duplicate result for environment {environment}"
            )));
        }
    }
    if let Some(missing) = Environment::ALL
        .iter()
        .find(|env| !environment_results.contains_key(*env))
    {
        return Err(ClassificationError::Aggregation(format!(
            "missing result for environment {missing}"
        )));
    }

    let overall_statistics = stats::generate_from(
        environment_results
            .values()
            .flat_map(|env| env.classifications.iter()),
    );
    let recommendations = derive_recommendations(&overall_statistics, &environment_results);
    let warnings = derive_warnings(&environment_results);

    Ok(ClassificationReport {
        report_id: format!("classification-{}", generated_at.timestamp_millis()),
        generated_at,
        environment_results,
        overall_statistics,
        recommendations,
        warnings,
    })
}

pub fn derive_recommendations(
    overall: &ClassificationStatistics,
    environments: &BTreeMap<Environment, EnvironmentClassificationResult>,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    let classified: usize = overall.by_file_type.values().sum();

    if classified > 0 && overall.average_confidence < LOW_AVERAGE_CONFIDENCE {
        recommendations.push(format!(
            "Average confidence is {:.2}; review the classification rules and patterns",
            overall.average_confidence
        ));
    }
    if overall.requires_review > REVIEW_VOLUME_LIMIT {
        recommendations.push(format!(
            "{} files require manual review; schedule a review pass before moving files",
            overall.requires_review
        ));
    }
    for (environment, result) in environments {
        if !result.errors.is_empty() {
            recommendations.push(format!(
                "Check connectivity and access for the {environment} environment ({} errors)",
                result.errors.len()
            ));
        }
        if result.total_files > PHASED_ORGANIZATION_LIMIT {
            recommendations.push(format!(
                "{environment} has {} files; organize them in phases",
                result.total_files
            ));
        }
    }
    let unknown = overall
        .by_file_type
        .get(&FileType::Unknown)
        .copied()
        .unwrap_or(0);
    if unknown > UNKNOWN_VOLUME_LIMIT {
        recommendations.push(format!(
            "{unknown} files could not be classified; add rules covering them"
        ));
    }
    recommendations
}

pub fn derive_warnings(
    environments: &BTreeMap<Environment, EnvironmentClassificationResult>,
) -> Vec<String> {
    let mut warnings = Vec::new();
    for (environment, result) in environments {
        if let Some(first) = result.errors.first() {
            warnings.push(format!("{environment} classification failed: {first}"));
        }
        if result.processing_time > SLOW_ENVIRONMENT_MS {
            warnings.push(format!(
                "{environment} classification took {} ms",
                result.processing_time
            ));
        }
        let sensitive = result
            .classifications
            .iter()
            .filter(|c| c.file_type.is_security())
            .count();
        if sensitive > 0 {
            warnings.push(format!(
                "{environment} contains {sensitive} security-sensitive files (keys or secrets)"
            ));
        }
    }
    warnings
}

fn shape_errors(result: &ClassificationResult) -> Vec<String> {
    let mut errors = Vec::new();
    if result.file.name.trim().is_empty() {
        errors.push("file name is missing".to_string());
    }
    if result.file.path.trim().is_empty() {
        errors.push("file path is missing".to_string());
    }
    if result.applied_rule.trim().is_empty() {
        errors.push("applied rule is missing".to_string());
    }
    if result.reasoning.is_empty() {
        errors.push("reasoning is missing".to_string());
    }
    errors
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
