use crate::models::{ClassificationResult, ClassificationStatistics, ConfidenceBuckets};
use std::collections::BTreeMap;

pub const HIGH_CONFIDENCE: f64 = 0.8;
pub const MEDIUM_CONFIDENCE: f64 = 0.5;

/// Order-independent aggregate over a set of classifications.
pub fn generate(results: &[ClassificationResult]) -> ClassificationStatistics {
    generate_from(results.iter())
}

pub fn generate_from<'a>(
    results: impl Iterator<Item = &'a ClassificationResult>,
) -> ClassificationStatistics {
    let mut by_file_type = BTreeMap::new();
    let mut by_confidence = ConfidenceBuckets::default();
    let mut requires_review = 0;
    let mut total_confidence = 0.0;
    let mut successful = 0;
    let mut count = 0usize;

    for result in results {
        count += 1;
        *by_file_type.entry(result.file_type).or_insert(0) += 1;
        if result.confidence >= HIGH_CONFIDENCE {
            by_confidence.high += 1;
        } else if result.confidence >= MEDIUM_CONFIDENCE {
            by_confidence.medium += 1;
        } else {
            by_confidence.low += 1;
        }
        if result.requires_review {
            requires_review += 1;
        }
        if result.confidence >= MEDIUM_CONFIDENCE {
            successful += 1;
        }
        total_confidence += result.confidence;
    }

    let (average_confidence, success_rate) = if count == 0 {
        (0.0, 0.0)
    } else {
        (
            total_confidence / count as f64,
            successful as f64 / count as f64,
        )
    };

    ClassificationStatistics {
        by_file_type,
        by_confidence,
        requires_review,
        average_confidence,
        success_rate,
    }
}
