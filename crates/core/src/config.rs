use crate::error::ConfigError;
use crate::rules::RuleTable;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub classification: ClassificationConfig,
    pub scan: ScanConfig,
    pub reports: ReportConfig,
    pub orchestration: OrchestrationConfig,
}

/// Everything the classifier needs: rule table, special rules, validation and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    pub classification_rules: RuleTable,
    pub special_rules: SpecialRules,
    pub validation: ValidationConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialRules {
    #[serde(default)]
    pub ignore_files: Vec<String>,
    #[serde(default)]
    pub preserve_files: Vec<String>,
    #[serde(default)]
    pub require_review: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub max_file_size: u64,
    pub required_directories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// Weighted signal sum divided by the number of signals that fired.
    #[default]
    MatchedSignals,
    /// Weighted signal sum divided by the summed weights of the signals that fired.
    MatchedWeights,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub averaging: Averaging,
    /// When true, a rule matches only if its name, extension or path signal fired;
    /// the category-wide content and size signals alone are not enough.
    #[serde(default)]
    pub require_pattern_signal: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub local_root: String,
    pub content_limit: u64,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub ec2_host: Option<String>,
    /// Inventories exported from the remote host; take precedence over a mount.
    #[serde(default)]
    pub ec2_project_manifest: Option<String>,
    #[serde(default)]
    pub ec2_home_manifest: Option<String>,
    /// Remote project and home directories mounted locally (sshfs and the like).
    #[serde(default)]
    pub ec2_mount_root: Option<String>,
    #[serde(default)]
    pub ec2_mount_home: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub dir: String,
    pub write_json: bool,
    pub write_csv: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    pub timeout_secs: u64,
}

impl Default for ClassificationConfig {
    /// The built-in rule table and special rules.
    fn default() -> Self {
        match load(None) {
            Ok(cfg) => cfg.classification,
            Err(e) => {
                // Only reachable if the embedded defaults are broken.
                tracing::error!(error = %e, "built-in configuration failed to load");
                ClassificationConfig {
                    classification_rules: RuleTable::new(),
                    special_rules: SpecialRules::default(),
                    validation: ValidationConfig {
                        max_file_size: 100 * 1024 * 1024,
                        required_directories: Vec::new(),
                    },
                    matching: MatchingConfig::default(),
                }
            }
        }
    }
}

/// Layers the optional user file over the built-in defaults.
pub fn load(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut settings = config::Config::builder()
        .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    }
    let cfg: AppConfig = settings.build()?.try_deserialize()?;
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.classification.validation.required_directories.is_empty() {
        return Err(ConfigError::Invalid(
            "validation.required_directories must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Category;

    #[test]
    fn embedded_defaults_load() {
        let cfg = load(None).unwrap();
        let rules = &cfg.classification.classification_rules;
        assert_eq!(rules.len(), 24);
        for category in Category::ALL {
            assert!(rules.rules_in(category).next().is_some(), "no rules for {category}");
        }
        assert!(!cfg.classification.special_rules.preserve_files.is_empty());
        assert!(!cfg.classification.matching.require_pattern_signal);

        // Default must come from the embedded file, not the empty fallback.
        let fallback = ClassificationConfig::default();
        assert_eq!(fallback.classification_rules.len(), rules.len());
        assert!(!fallback.validation.required_directories.is_empty());
    }
}
