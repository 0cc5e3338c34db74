//! Reads file inventories collected from the remote host by an external tool.
//!
//! Each scope has its own manifest: a JSON array of `FileInfo` records.

use crate::{Environment, FileInfo, FileScanner, ScanError, ScanScope};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ManifestScanner {
    host: String,
    project: Option<PathBuf>,
    home: Option<PathBuf>,
    environment: Environment,
}

impl ManifestScanner {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            project: None,
            home: None,
            environment: Environment::Ec2,
        }
    }

    pub fn with_manifest(mut self, scope: ScanScope, path: impl Into<PathBuf>) -> Self {
        match scope {
            ScanScope::Project => self.project = Some(path.into()),
            ScanScope::Home => self.home = Some(path.into()),
        }
        self
    }

    fn manifest_for(&self, scope: ScanScope) -> Option<&PathBuf> {
        match scope {
            ScanScope::Project => self.project.as_ref(),
            ScanScope::Home => self.home.as_ref(),
        }
    }
}

#[async_trait::async_trait]
impl FileScanner for ManifestScanner {
    async fn scan(&self, scope: ScanScope) -> Result<Vec<FileInfo>, ScanError> {
        let environment = self.environment;
        let path = self.manifest_for(scope).ok_or_else(|| ScanError::Remote {
            host: self.host.clone(),
            environment,
            message: format!("no {scope} manifest configured"),
        })?;

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ScanError::Io {
                root: path.clone(),
                environment,
                source,
            })?;
        let mut files: Vec<FileInfo> =
            serde_json::from_str(&raw).map_err(|source| ScanError::Manifest {
                path: path.clone(),
                environment,
                source,
            })?;
        for file in &mut files {
            file.environment = environment;
        }
        tracing::debug!(host = %self.host, %scope, count = files.len(), "manifest loaded");
        Ok(files)
    }
}
