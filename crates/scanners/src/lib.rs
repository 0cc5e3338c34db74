//! Scanner abstractions for the local project tree and the remote host.
//!
//! The classification engine never walks a directory or opens a remote
//! session itself. It only consumes `FileInfo` snapshots produced by a
//! `FileScanner` registered for an environment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod local;
pub mod manifest;
pub mod memory;

pub use local::LocalScanner;
pub use manifest::ManifestScanner;
pub use memory::MemoryScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Ec2,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Local, Environment::Ec2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Ec2 => "ec2",
        }
    }

    /// Scopes scanned for this environment, in order. Results are concatenated.
    pub fn scan_scopes(&self) -> &'static [ScanScope] {
        match self {
            Environment::Local => &[ScanScope::Project],
            Environment::Ec2 => &[ScanScope::Project, ScanScope::Home],
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanScope {
    Project,
    Home,
}

impl fmt::Display for ScanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanScope::Project => f.write_str("project"),
            ScanScope::Home => f.write_str("home"),
        }
    }
}

/// Immutable snapshot of a discovered file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    /// Lower-cased with a leading dot, empty when the name has no extension.
    pub extension: String,
    pub size: u64,
    pub permissions: String,
    pub last_modified: DateTime<Utc>,
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub environment: Environment,
}

impl FileInfo {
    /// Builds a snapshot from a path, deriving name, extension and hidden flag.
    pub fn new(path: impl Into<String>, size: u64, environment: Environment) -> Self {
        let path = path.into();
        let name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path.as_str())
            .to_string();
        let extension = extension_of(&name);
        let is_hidden = name.starts_with('.');
        Self {
            path,
            name,
            extension,
            size,
            permissions: "644".to_string(),
            last_modified: Utc::now(),
            is_hidden,
            content: None,
            environment,
        }
    }

    pub fn with_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.permissions = permissions.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }
}

/// `".tar.gz"`-style double extensions are not special-cased: only the last
/// segment counts. Dotfiles without a further dot (`.env`) use the whole name.
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx..].to_lowercase(),
        _ => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("[{environment}] failed to scan {root:?}: {source}")]
    Io {
        root: PathBuf,
        environment: Environment,
        #[source]
        source: std::io::Error,
    },
    #[error("[{environment}] invalid manifest {path:?}: {source}")]
    Manifest {
        path: PathBuf,
        environment: Environment,
        #[source]
        source: serde_json::Error,
    },
    #[error("[{environment}] remote scan of {host} failed: {message}")]
    Remote {
        host: String,
        environment: Environment,
        message: String,
    },
    #[error("[{0}] no scanner configured")]
    NotConfigured(Environment),
}

impl ScanError {
    pub fn environment(&self) -> Environment {
        match self {
            ScanError::Io { environment, .. }
            | ScanError::Manifest { environment, .. }
            | ScanError::Remote { environment, .. } => *environment,
            ScanError::NotConfigured(env) => *env,
        }
    }
}

#[async_trait::async_trait]
pub trait FileScanner: Send + Sync {
    async fn scan(&self, scope: ScanScope) -> Result<Vec<FileInfo>, ScanError>;
}

#[derive(Default, Clone)]
pub struct ScannerRegistry {
    scanners: HashMap<Environment, Arc<dyn FileScanner>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scanner(mut self, environment: Environment, scanner: Arc<dyn FileScanner>) -> Self {
        self.scanners.insert(environment, scanner);
        self
    }

    pub fn scanner(&self, environment: Environment) -> Result<Arc<dyn FileScanner>, ScanError> {
        self.scanners
            .get(&environment)
            .cloned()
            .ok_or(ScanError::NotConfigured(environment))
    }

    /// Runs every scope of `environment` sequentially and concatenates the results.
    pub async fn scan_environment(&self, environment: Environment) -> Result<Vec<FileInfo>, ScanError> {
        let scanner = self.scanner(environment)?;
        let mut files = Vec::new();
        for scope in environment.scan_scopes() {
            let mut batch = scanner.scan(*scope).await?;
            tracing::debug!(%environment, %scope, count = batch.len(), "scope scanned");
            files.append(&mut batch);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased_with_dot() {
        assert_eq!(extension_of("Deploy.SH"), ".sh");
        assert_eq!(extension_of(".env"), ".env");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn file_info_derives_name_and_hidden_flag() {
        let info = FileInfo::new("/srv/app/.env.local", 12, Environment::Ec2);
        assert_eq!(info.name, ".env.local");
        assert_eq!(info.extension, ".local");
        assert!(info.is_hidden);
        assert_eq!(info.environment, Environment::Ec2);
    }

    #[test]
    fn ec2_scans_project_then_home() {
        assert_eq!(
            Environment::Ec2.scan_scopes(),
            &[ScanScope::Project, ScanScope::Home]
        );
        assert_eq!(Environment::Local.scan_scopes(), &[ScanScope::Project]);
    }
}
