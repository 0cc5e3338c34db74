use crate::{Environment, FileInfo, FileScanner, ScanError, ScanScope};
use std::collections::HashMap;

/// In-memory scanner returning fixed listings, or a fixed failure.
#[derive(Debug, Clone, Default)]
pub struct MemoryScanner {
    listings: HashMap<ScanScope, Vec<FileInfo>>,
    failure: Option<(Environment, String)>,
}

impl MemoryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(mut self, scope: ScanScope, files: Vec<FileInfo>) -> Self {
        self.listings.entry(scope).or_default().extend(files);
        self
    }

    pub fn failing(environment: Environment, message: impl Into<String>) -> Self {
        Self {
            listings: HashMap::new(),
            failure: Some((environment, message.into())),
        }
    }
}

#[async_trait::async_trait]
impl FileScanner for MemoryScanner {
    async fn scan(&self, scope: ScanScope) -> Result<Vec<FileInfo>, ScanError> {
        if let Some((environment, message)) = &self.failure {
            return Err(ScanError::Remote {
                host: "memory".to_string(),
                environment: *environment,
                message: message.clone(),
            });
        }
        Ok(self.listings.get(&scope).cloned().unwrap_or_default())
    }
}
