//! Correlation-threshold filtering for redundant feature pairs.

use crate::correlate::{correlation_matrix, CorrelationMethod};
use crate::data::ProfileTable;
use crate::error::{ProfileError, Result};

/// Find features to drop among highly correlated pairs.
///
/// Computes the pairwise correlation matrix over the candidate features and
/// flags every pair whose signed correlation exceeds `threshold`. Within a
/// flagged pair, the feature with the larger total absolute correlation to
/// all other candidates is dropped; exact ties fall back to original column
/// order, earliest kept. NaN correlations never exceed the threshold.
///
/// # Arguments
/// * `table` - Fitting rows
/// * `features` - Candidate feature columns
/// * `threshold` - Signed correlation cutoff (0.0 to 1.0)
/// * `method` - Correlation method
///
/// # Returns
/// The excluded feature names, in candidate order; empty when no pair
/// exceeds the threshold.
pub fn select_correlation(
    table: &ProfileTable,
    features: &[String],
    threshold: f64,
    method: CorrelationMethod,
) -> Result<Vec<String>> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ProfileError::InvalidParameter(format!(
            "Correlation threshold must be between 0 and 1 (got {})",
            threshold
        )));
    }
    if features.len() < 2 {
        return Ok(Vec::new());
    }

    let data = table.numeric_matrix(features)?;
    let corr = correlation_matrix(&data, method);
    let n = features.len();

    // Total absolute correlation per feature, diagonal and NaN skipped
    let sums: Vec<f64> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| corr[(i, j)])
                .filter(|r| !r.is_nan())
                .map(f64::abs)
                .sum()
        })
        .collect();

    // Ascending redundancy order; stable sort keeps original column order on ties
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        sums[a]
            .partial_cmp(&sums[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut rank = vec![0usize; n];
    for (pos, &idx) in order.iter().enumerate() {
        rank[idx] = pos;
    }

    let mut drop = vec![false; n];
    for i in 0..n {
        for j in 0..i {
            if corr[(i, j)] > threshold {
                let victim = if rank[i] > rank[j] { i } else { j };
                drop[victim] = true;
            }
        }
    }

    Ok(features
        .iter()
        .enumerate()
        .filter(|(i, _)| drop[*i])
        .map(|(_, name)| name.clone())
        .collect())
}
