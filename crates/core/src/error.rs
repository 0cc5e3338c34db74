use crate::models::Environment;
use thiserror::Error;

pub use scanners::ScanError;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("[{environment}] failed to classify {path}: {cause}")]
    Failed {
        path: String,
        environment: Environment,
        cause: String,
    },
    #[error("report assembly failed: {0}")]
    Aggregation(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid glob {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
