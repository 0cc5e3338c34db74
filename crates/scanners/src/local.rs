//! Lists the flat files sitting directly under a root directory.

use crate::{extension_of, Environment, FileInfo, FileScanner, ScanError, ScanScope};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task;
use walkdir::WalkDir;

pub const DEFAULT_CONTENT_LIMIT: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct LocalScanner {
    root: PathBuf,
    home: Option<PathBuf>,
    excludes: GlobSet,
    content_limit: u64,
    environment: Environment,
}

impl LocalScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            home: None,
            excludes: GlobSet::empty(),
            content_limit: DEFAULT_CONTENT_LIMIT,
            environment: Environment::Local,
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_content_limit(mut self, limit: u64) -> Self {
        self.content_limit = limit;
        self
    }

    /// Tags produced snapshots with another environment, e.g. a mounted remote tree.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_excludes(mut self, patterns: &[String]) -> Result<Self, globset::Error> {
        self.excludes = build_globset(patterns)?;
        Ok(self)
    }

    fn root_for(&self, scope: ScanScope) -> Option<&Path> {
        match scope {
            ScanScope::Project => Some(self.root.as_path()),
            ScanScope::Home => self.home.as_deref(),
        }
    }
}

#[async_trait::async_trait]
impl FileScanner for LocalScanner {
    async fn scan(&self, scope: ScanScope) -> Result<Vec<FileInfo>, ScanError> {
        let Some(root) = self.root_for(scope).map(Path::to_path_buf) else {
            return Ok(Vec::new());
        };
        let excludes = self.excludes.clone();
        let content_limit = self.content_limit;
        let environment = self.environment;

        let walk_root = root.clone();
        let walked = task::spawn_blocking(move || {
            list_flat_files(&walk_root, &excludes, content_limit, environment)
        })
        .await
        .map_err(|e| ScanError::Io {
            root: root.clone(),
            environment,
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

        walked.map_err(|source| ScanError::Io {
            root,
            environment,
            source,
        })
    }
}

fn list_flat_files(
    root: &Path,
    excludes: &GlobSet,
    content_limit: u64,
    environment: Environment,
) -> std::io::Result<Vec<FileInfo>> {
    // Surface a missing or unreadable root as a scan failure instead of an empty listing.
    fs::read_dir(root)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || excludes.is_match(entry.file_name()) {
            continue;
        }
        match snapshot(entry.path(), content_limit, environment) {
            Ok(info) => files.push(info),
            Err(e) => tracing::debug!(path = ?entry.path(), error = %e, "skipping file"),
        }
    }
    Ok(files)
}

fn snapshot(path: &Path, content_limit: u64, environment: Environment) -> std::io::Result<FileInfo> {
    let meta = fs::metadata(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let last_modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let content = if meta.len() <= content_limit {
        fs::read(path)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    } else {
        None
    };

    Ok(FileInfo {
        path: path.to_string_lossy().into_owned(),
        extension: extension_of(&name),
        is_hidden: name.starts_with('.'),
        name,
        size: meta.len(),
        permissions: permissions_string(&meta),
        last_modified,
        content,
        environment,
    })
}

#[cfg(unix)]
fn permissions_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permissions_string(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "444".to_string()
    } else {
        "644".to_string()
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    builder.build()
}
