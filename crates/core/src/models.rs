use crate::rules::ClassificationRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use scanners::{Environment, FileInfo};

/// Semantic type assigned to a flat file. Every variant owns one base target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    ScriptDeployment,
    ScriptSetup,
    ScriptTesting,
    ScriptUtility,
    ScriptMaintenance,
    DocReadme,
    DocGuide,
    DocApi,
    DocReport,
    DocChangelog,
    ConfigBuild,
    ConfigEnvironment,
    ConfigDeployment,
    ConfigApplication,
    TestUnit,
    TestIntegration,
    TestData,
    TempLog,
    TempCache,
    TempBackup,
    ArchiveOld,
    ArchiveDeprecated,
    SecurityKeys,
    SecuritySecrets,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFamily {
    Script,
    Doc,
    Config,
    Test,
    Temp,
    Archive,
    Security,
    Unknown,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::ScriptDeployment => "SCRIPT_DEPLOYMENT",
            FileType::ScriptSetup => "SCRIPT_SETUP",
            FileType::ScriptTesting => "SCRIPT_TESTING",
            FileType::ScriptUtility => "SCRIPT_UTILITY",
            FileType::ScriptMaintenance => "SCRIPT_MAINTENANCE",
            FileType::DocReadme => "DOC_README",
            FileType::DocGuide => "DOC_GUIDE",
            FileType::DocApi => "DOC_API",
            FileType::DocReport => "DOC_REPORT",
            FileType::DocChangelog => "DOC_CHANGELOG",
            FileType::ConfigBuild => "CONFIG_BUILD",
            FileType::ConfigEnvironment => "CONFIG_ENVIRONMENT",
            FileType::ConfigDeployment => "CONFIG_DEPLOYMENT",
            FileType::ConfigApplication => "CONFIG_APPLICATION",
            FileType::TestUnit => "TEST_UNIT",
            FileType::TestIntegration => "TEST_INTEGRATION",
            FileType::TestData => "TEST_DATA",
            FileType::TempLog => "TEMP_LOG",
            FileType::TempCache => "TEMP_CACHE",
            FileType::TempBackup => "TEMP_BACKUP",
            FileType::ArchiveOld => "ARCHIVE_OLD",
            FileType::ArchiveDeprecated => "ARCHIVE_DEPRECATED",
            FileType::SecurityKeys => "SECURITY_KEYS",
            FileType::SecuritySecrets => "SECURITY_SECRETS",
            FileType::Unknown => "UNKNOWN",
        }
    }

    /// Directory (with trailing slash) the file is moved under.
    pub fn base_target_path(&self) -> &'static str {
        match self {
            FileType::ScriptDeployment => "development/scripts/deployment/",
            FileType::ScriptSetup => "development/scripts/setup/",
            FileType::ScriptTesting => "development/scripts/testing/",
            FileType::ScriptUtility => "development/scripts/utilities/",
            FileType::ScriptMaintenance => "development/scripts/maintenance/",
            FileType::DocReadme => "documentation/project/",
            FileType::DocGuide => "documentation/guides/",
            FileType::DocApi => "documentation/api/",
            FileType::DocReport => "documentation/reports/",
            FileType::DocChangelog => "documentation/project/changelog/",
            FileType::ConfigBuild => "config/build/",
            FileType::ConfigEnvironment => "config/environment/",
            FileType::ConfigDeployment => "config/deployment/",
            FileType::ConfigApplication => "config/application/",
            FileType::TestUnit => "tests/unit/",
            FileType::TestIntegration => "tests/integration/",
            FileType::TestData => "tests/fixtures/",
            FileType::TempLog => "tmp/logs/",
            FileType::TempCache => "tmp/cache/",
            FileType::TempBackup => "tmp/backup/",
            FileType::ArchiveOld => "archive/old/",
            FileType::ArchiveDeprecated => "archive/deprecated/",
            FileType::SecurityKeys => "security/keys/",
            FileType::SecuritySecrets => "security/secrets/",
            FileType::Unknown => "tmp/unclassified/",
        }
    }

    pub fn family(&self) -> FileFamily {
        match self {
            FileType::ScriptDeployment
            | FileType::ScriptSetup
            | FileType::ScriptTesting
            | FileType::ScriptUtility
            | FileType::ScriptMaintenance => FileFamily::Script,
            FileType::DocReadme
            | FileType::DocGuide
            | FileType::DocApi
            | FileType::DocReport
            | FileType::DocChangelog => FileFamily::Doc,
            FileType::ConfigBuild
            | FileType::ConfigEnvironment
            | FileType::ConfigDeployment
            | FileType::ConfigApplication => FileFamily::Config,
            FileType::TestUnit | FileType::TestIntegration | FileType::TestData => FileFamily::Test,
            FileType::TempLog | FileType::TempCache | FileType::TempBackup => FileFamily::Temp,
            FileType::ArchiveOld | FileType::ArchiveDeprecated => FileFamily::Archive,
            FileType::SecurityKeys | FileType::SecuritySecrets => FileFamily::Security,
            FileType::Unknown => FileFamily::Unknown,
        }
    }

    pub fn is_security(&self) -> bool {
        matches!(self, FileType::SecurityKeys | FileType::SecuritySecrets)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FileFamily {
    /// Extensions a file of this family is expected to carry; `None` means unconstrained.
    pub fn expected_extensions(&self) -> Option<&'static [&'static str]> {
        match self {
            FileFamily::Script => Some(&[".sh"]),
            FileFamily::Doc => Some(&[".md", ".txt", ".doc", ".docx"]),
            FileFamily::Config => Some(&[".json", ".js", ".ts", ".yml", ".yaml", ".env"]),
            FileFamily::Test
            | FileFamily::Temp
            | FileFamily::Archive
            | FileFamily::Security
            | FileFamily::Unknown => None,
        }
    }

    pub fn accepts_extension(&self, extension: &str) -> bool {
        match self.expected_extensions() {
            Some(allowed) => allowed.iter().any(|e| e.eq_ignore_ascii_case(extension)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Name,
    Extension,
    Content,
    Path,
    Size,
}

impl SignalKind {
    pub fn weight(&self) -> f64 {
        match self {
            SignalKind::Name => 0.6,
            SignalKind::Extension => 0.3,
            SignalKind::Content => 0.4,
            SignalKind::Path => 0.2,
            SignalKind::Size => 0.1,
        }
    }

    /// Name, extension and path derive from the rule's own patterns; content and size are per category.
    pub fn is_pattern_based(&self) -> bool {
        matches!(self, SignalKind::Name | SignalKind::Extension | SignalKind::Path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMatch {
    pub kind: SignalKind,
    pub confidence: f64,
}

/// Outcome of evaluating one rule against one file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    pub confidence: f64,
    pub reason: String,
    pub matched_pattern: Option<String>,
    pub signals: Vec<SignalMatch>,
    pub rule: ClassificationRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub file: FileInfo,
    pub file_type: FileType,
    /// Empty means "do not move".
    pub target_path: String,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub requires_review: bool,
    pub classification_time: DateTime<Utc>,
    pub applied_rule: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBuckets {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationStatistics {
    pub by_file_type: BTreeMap<FileType, usize>,
    pub by_confidence: ConfidenceBuckets,
    pub requires_review: usize,
    pub average_confidence: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentClassificationResult {
    pub environment: Environment,
    pub total_files: usize,
    pub classifications: Vec<ClassificationResult>,
    pub statistics: ClassificationStatistics,
    /// Scan or pipeline failures for the whole environment.
    pub errors: Vec<String>,
    /// Files replaced by a placeholder because their classification failed.
    #[serde(default)]
    pub file_errors: Vec<String>,
    pub processing_time: u64,
}

impl EnvironmentClassificationResult {
    /// Zero-result entry for an environment whose pipeline failed.
    pub fn failed(environment: Environment, error: impl Into<String>, processing_time: u64) -> Self {
        Self {
            environment,
            total_files: 0,
            classifications: Vec::new(),
            statistics: ClassificationStatistics::default(),
            errors: vec![error.into()],
            file_errors: Vec::new(),
            processing_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub environment_results: BTreeMap<Environment, EnvironmentClassificationResult>,
    pub overall_statistics: ClassificationStatistics,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

impl ClassificationReport {
    pub fn all_classifications(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.environment_results
            .values()
            .flat_map(|env| env.classifications.iter())
    }
}
