use crate::models::{ClassificationResult, Environment, FileType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Conjunction of optional predicates; an unset field accepts everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationFilter {
    pub file_types: Option<Vec<FileType>>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    pub requires_review: Option<bool>,
    pub environment: Option<Environment>,
}

impl ClassificationFilter {
    pub fn matches(&self, result: &ClassificationResult) -> bool {
        if let Some(types) = &self.file_types {
            if !types.contains(&result.file_type) {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if result.confidence < min {
                return false;
            }
        }
        if let Some(max) = self.max_confidence {
            if result.confidence > max {
                return false;
            }
        }
        if let Some(review) = self.requires_review {
            if result.requires_review != review {
                return false;
            }
        }
        if let Some(env) = self.environment {
            if result.file.environment != env {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Confidence,
    FileType,
    Path,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Keeps input order among the results that pass.
pub fn filter_classifications(
    results: &[ClassificationResult],
    filter: &ClassificationFilter,
) -> Vec<ClassificationResult> {
    results.iter().filter(|r| filter.matches(r)).cloned().collect()
}

/// Stable in both directions: equal keys keep their input order.
pub fn sort_classifications(
    results: &[ClassificationResult],
    key: SortKey,
    order: SortOrder,
) -> Vec<ClassificationResult> {
    let mut sorted = results.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    sorted
}

fn compare(a: &ClassificationResult, b: &ClassificationResult, key: SortKey) -> Ordering {
    match key {
        SortKey::Confidence => a.confidence.total_cmp(&b.confidence),
        SortKey::FileType => a.file_type.as_str().cmp(b.file_type.as_str()),
        SortKey::Path => a.file.path.cmp(&b.file.path),
        SortKey::Size => a.file.size.cmp(&b.file.size),
    }
}
