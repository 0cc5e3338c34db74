//! Turns the best rule match into a typed, scored classification with a target path.

use crate::config::{ClassificationConfig, ValidationConfig};
use crate::error::{ClassificationError, ConfigError};
use crate::matcher::PatternMatcher;
use crate::models::{ClassificationResult, ClassificationStatistics, FileInfo, FileType};
use crate::stats;
use chrono::{DateTime, Duration, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::{RegexSet, RegexSetBuilder};
use tracing::{debug, info, warn};

pub const RULE_IGNORE: &str = "ignore";
pub const RULE_PRESERVE: &str = "preserve";
pub const RULE_UNKNOWN: &str = "unknown";
pub const RULE_ERROR: &str = "error";

const UNKNOWN_CONFIDENCE: f64 = 0.1;
const REVIEW_THRESHOLD: f64 = 0.5;
const EMPTY_FILE_FACTOR: f64 = 0.8;
const EXTENSION_MISMATCH_FACTOR: f64 = 0.6;
const STALE_FILE_FACTOR: f64 = 0.9;
const STALE_AFTER_DAYS: i64 = 365;
const LARGE_FILE_BYTES: u64 = 1024 * 1024;

const SENSITIVE_NAME_PATTERNS: &[&str] = &[
    r".pem$",
    r".key$",
    r".env$",
    "password",
    "secret",
    "credential",
];

#[derive(Debug, Clone)]
pub struct FileClassifier {
    matcher: PatternMatcher,
    ignore: GlobSet,
    preserve: GlobSet,
    review: GlobSet,
    sensitive: RegexSet,
    validation: ValidationConfig,
}

/// Results of a batch, with every per-file failure kept alongside.
#[derive(Debug, Default)]
pub struct BatchClassification {
    pub results: Vec<ClassificationResult>,
    pub failures: Vec<ClassificationError>,
}

impl FileClassifier {
    pub fn new(config: &ClassificationConfig) -> Result<Self, ConfigError> {
        let matcher = PatternMatcher::new(config.classification_rules.clone(), &config.matching)?;
        let sensitive = RegexSetBuilder::new(SENSITIVE_NAME_PATTERNS)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Pattern {
                pattern: SENSITIVE_NAME_PATTERNS.join("|"),
                source,
            })?;
        Ok(Self {
            matcher,
            ignore: build_name_globs(&config.special_rules.ignore_files)?,
            preserve: build_name_globs(&config.special_rules.preserve_files)?,
            review: build_name_globs(&config.special_rules.require_review)?,
            sensitive,
            validation: config.validation.clone(),
        })
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Rule administration. Not to be interleaved with a running batch.
    pub fn matcher_mut(&mut self) -> &mut PatternMatcher {
        &mut self.matcher
    }

    pub fn classify_file(&self, file: &FileInfo) -> Result<ClassificationResult, ClassificationError> {
        self.classify_file_at(file, Utc::now())
    }

    /// Classifies `file` as of `now`, which drives the staleness penalty and the timestamp.
    pub fn classify_file_at(
        &self,
        file: &FileInfo,
        now: DateTime<Utc>,
    ) -> Result<ClassificationResult, ClassificationError> {
        check_shape(file)?;

        if self.ignore.is_match(&file.name) {
            return Ok(ClassificationResult {
                file: file.clone(),
                file_type: FileType::Unknown,
                target_path: String::new(),
                confidence: 1.0,
                reasoning: vec!["matched ignore rule".to_string()],
                requires_review: false,
                classification_time: now,
                applied_rule: RULE_IGNORE.to_string(),
            });
        }

        if self.preserve.is_match(&file.name) {
            return Ok(ClassificationResult {
                file: file.clone(),
                file_type: FileType::Unknown,
                target_path: file.path.clone(),
                confidence: 1.0,
                reasoning: vec!["matched preserve rule, kept in place".to_string()],
                requires_review: false,
                classification_time: now,
                applied_rule: RULE_PRESERVE.to_string(),
            });
        }

        let Some(best) = self.matcher.find_best_match(file) else {
            debug!(file = %file.path, "no rule matched");
            return Ok(ClassificationResult {
                file: file.clone(),
                file_type: FileType::Unknown,
                target_path: format!("{}{}", FileType::Unknown.base_target_path(), file.name),
                confidence: UNKNOWN_CONFIDENCE,
                reasoning: vec![
                    "no classification rule matched".to_string(),
                    format!("classification: {}", FileType::Unknown),
                ],
                requires_review: true,
                classification_time: now,
                applied_rule: RULE_UNKNOWN.to_string(),
            });
        };

        let file_type = best.rule.file_type();
        let directory = adjust_path_for_environment(file_type.base_target_path(), file);
        let target_path = resolve_duplicate_path(&directory, &file.name);
        let confidence = self.adjust_confidence(best.confidence, file, file_type, now);
        let requires_review = self.requires_review(confidence, file);

        let mut reasoning = vec![best.reason.clone()];
        if file.size > LARGE_FILE_BYTES {
            reasoning.push("large file".to_string());
        }
        if self.is_sensitive_file(file) {
            reasoning.push("sensitive file".to_string());
        }
        if file.is_hidden {
            reasoning.push("hidden file".to_string());
        }
        reasoning.push(format!("classification: {file_type}"));

        Ok(ClassificationResult {
            file: file.clone(),
            file_type,
            target_path,
            confidence,
            reasoning,
            requires_review,
            classification_time: now,
            applied_rule: format!("{}.{}", best.rule.category, best.rule.name),
        })
    }

    /// Classifies in input order; a failing file never aborts the batch.
    pub fn classify_files(&self, files: &[FileInfo]) -> BatchClassification {
        let mut batch = BatchClassification::default();
        for file in files {
            match self.classify_file(file) {
                Ok(result) => batch.results.push(result),
                Err(e) => {
                    warn!(file = %file.path, error = %e, "classification failed");
                    batch.failures.push(e);
                }
            }
        }
        if !batch.failures.is_empty() {
            info!(
                classified = batch.results.len(),
                failed = batch.failures.len(),
                "batch finished with failures"
            );
        }
        batch
    }

    /// Applies the empty-file, extension-family and staleness penalties. Never raises confidence.
    pub fn adjust_confidence(
        &self,
        base: f64,
        file: &FileInfo,
        file_type: FileType,
        now: DateTime<Utc>,
    ) -> f64 {
        let mut confidence = base;
        if file.size == 0 {
            confidence *= EMPTY_FILE_FACTOR;
        }
        if !file_type.family().accepts_extension(&file.extension) {
            confidence *= EXTENSION_MISMATCH_FACTOR;
        }
        if now.signed_duration_since(file.last_modified) > Duration::days(STALE_AFTER_DAYS) {
            confidence *= STALE_FILE_FACTOR;
        }
        confidence.clamp(0.0, 1.0)
    }

    pub fn requires_review(&self, confidence: f64, file: &FileInfo) -> bool {
        confidence < REVIEW_THRESHOLD
            || self.review.is_match(&file.name)
            || file.size > self.validation.max_file_size / 10
            || self.is_sensitive_file(file)
    }

    pub fn is_sensitive_file(&self, file: &FileInfo) -> bool {
        self.sensitive.is_match(&file.name)
    }

    pub fn validate_classification(&self, file: &FileInfo, result: &ClassificationResult) -> bool {
        let errors = self.validation_errors(file, result);
        if !errors.is_empty() {
            debug!(file = %file.path, errors = ?errors, "classification failed validation");
        }
        errors.is_empty()
    }

    /// Every reason `result` is not acceptable for `file`; empty when valid.
    pub fn validation_errors(&self, file: &FileInfo, result: &ClassificationResult) -> Vec<String> {
        let mut errors = Vec::new();
        let target = result.target_path.as_str();

        if target.is_empty() {
            errors.push("target path is empty".to_string());
        }
        if !(0.0..=1.0).contains(&result.confidence) {
            errors.push(format!("confidence {} outside [0, 1]", result.confidence));
        }
        if !result.file_type.family().accepts_extension(&file.extension) {
            errors.push(format!(
                "extension {:?} does not fit {}",
                file.extension, result.file_type
            ));
        }
        if target.contains("..") || target.contains("//") {
            errors.push(format!("target path {target:?} is not normalized"));
        }
        let top = target.split('/').next().unwrap_or("");
        if !target.is_empty()
            && !self
                .validation
                .required_directories
                .iter()
                .any(|dir| dir == top)
        {
            errors.push(format!(
                "target path {target:?} is outside the required directories"
            ));
        }
        if result.file_type.is_security() && file.permissions != "600" {
            errors.push(format!(
                "{} requires permissions 600, found {}",
                result.file_type, file.permissions
            ));
        }
        if result.file_type.family() == crate::models::FileFamily::Script
            && !is_executable(&file.permissions)
        {
            errors.push(format!(
                "script is not executable (permissions {})",
                file.permissions
            ));
        }
        errors
    }

    pub fn generate_classification_statistics(
        &self,
        results: &[ClassificationResult],
    ) -> ClassificationStatistics {
        stats::generate(results)
    }
}

/// Stand-in for a file whose classification failed inside a batch.
pub fn failed_placeholder(
    file: &FileInfo,
    error: &ClassificationError,
    now: DateTime<Utc>,
) -> ClassificationResult {
    ClassificationResult {
        file: file.clone(),
        file_type: FileType::Unknown,
        target_path: format!("{}{}", FileType::Unknown.base_target_path(), file.name),
        confidence: 0.0,
        reasoning: vec![format!("classification error: {error}")],
        requires_review: true,
        classification_time: now,
        applied_rule: RULE_ERROR.to_string(),
    }
}

/// Environment-specific relocation hook. Returns the base path unchanged for every environment.
pub fn adjust_path_for_environment(base: &str, _file: &FileInfo) -> String {
    base.to_string()
}

/// Joins directory and file name. Collisions between target names are not detected.
pub fn resolve_duplicate_path(directory: &str, name: &str) -> String {
    format!("{directory}{name}")
}

/// Octal (`755`, `0755`) or symbolic (`rwxr-xr-x`, `-rwxr-xr-x`) owner execute bit.
pub fn is_executable(permissions: &str) -> bool {
    let p = permissions.trim();
    if p == "755" {
        return true;
    }
    if !p.is_empty() && p.chars().all(|c| c.is_digit(8)) {
        let digits: Vec<u32> = p.chars().filter_map(|c| c.to_digit(8)).collect();
        return digits.len() >= 3 && digits[digits.len() - 3] & 1 == 1;
    }
    let chars: Vec<char> = p.chars().collect();
    let owner = match chars.len() {
        10 => &chars[1..4],
        9 => &chars[0..3],
        _ => return false,
    };
    matches!(owner[2], 'x' | 's')
}

fn check_shape(file: &FileInfo) -> Result<(), ClassificationError> {
    let cause = if file.name.trim().is_empty() {
        Some("file name is empty")
    } else if file.name.contains(['/', '\\']) {
        Some("file name contains a path separator")
    } else if file.path.trim().is_empty() {
        Some("file path is empty")
    } else {
        None
    };
    match cause {
        Some(cause) => Err(ClassificationError::Failed {
            path: file.path.clone(),
            environment: file.environment,
            cause: cause.to_string(),
        }),
        None => Ok(()),
    }
}

fn build_name_globs(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}
