//! Reduction of per-unit results into one verdict.

use std::collections::HashMap;

use crate::error::{DeeptraceError, Result};
use crate::media::{AggregatedResult, ClassificationResult, Label};

/// Majority vote over unit labels, with mean confidence over all units.
///
/// Exact ties go to the least trusting label (manipulated, then error, then
/// no face, then authentic). Error units count toward the mean with their
/// zero confidence.
///
/// # Errors
///
/// Returns [`DeeptraceError::InvalidInput`] for an empty slice.
pub fn aggregate(results: &[ClassificationResult]) -> Result<AggregatedResult> {
    if results.is_empty() {
        return Err(DeeptraceError::InvalidInput(
            "Cannot aggregate an empty result list".into(),
        ));
    }

    let mut counts: HashMap<Label, usize> = HashMap::new();
    for result in results {
        *counts.entry(result.label).or_default() += 1;
    }

    let label = counts
        .into_iter()
        .max_by_key(|(label, count)| (*count, label.tie_rank()))
        .map(|(label, _)| label)
        .unwrap_or(Label::Error);

    let confidence = results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64;

    Ok(AggregatedResult { label, confidence })
}
