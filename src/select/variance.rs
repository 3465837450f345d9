//! Variance/frequency filtering for near-constant features.

use crate::data::ProfileTable;
use crate::error::{ProfileError, Result};
use rayon::prelude::*;
use std::collections::HashMap;

/// Find features dominated by a single value or with too few distinct values.
///
/// A feature is excluded when the count of its second-most-common value
/// divided by the count of its most-common value falls below `freq_cut`
/// (columns with fewer than two distinct values always fail this test), or
/// when its distinct-value count divided by the row count falls below
/// `unique_cut`. NaN cells never count as values.
///
/// # Arguments
/// * `table` - Fitting rows
/// * `features` - Candidate feature columns
/// * `freq_cut` - Minimum second-most-common / most-common ratio (0.0 to 1.0)
/// * `unique_cut` - Minimum distinct-value / row-count ratio (0.0 to 1.0)
///
/// # Returns
/// The excluded feature names, in candidate order.
pub fn select_variance(
    table: &ProfileTable,
    features: &[String],
    freq_cut: f64,
    unique_cut: f64,
) -> Result<Vec<String>> {
    if !(0.0..=1.0).contains(&freq_cut) {
        return Err(ProfileError::InvalidParameter(format!(
            "Frequency cut must be between 0 and 1 (got {})",
            freq_cut
        )));
    }
    if !(0.0..=1.0).contains(&unique_cut) {
        return Err(ProfileError::InvalidParameter(format!(
            "Unique cut must be between 0 and 1 (got {})",
            unique_cut
        )));
    }

    let n_rows = table.n_rows();
    let flags: Vec<bool> = features
        .par_iter()
        .map(|name| {
            let values = table.numeric_column(name)?;
            let counts = value_counts(values);

            let mut ordered: Vec<usize> = counts.values().copied().collect();
            ordered.sort_unstable_by(|a, b| b.cmp(a));
            let dominated = match (ordered.first(), ordered.get(1)) {
                (Some(&most), Some(&second)) => (second as f64 / most as f64) < freq_cut,
                // Zero or one distinct value
                _ => true,
            };

            let sparse = n_rows > 0 && (counts.len() as f64 / n_rows as f64) < unique_cut;
            Ok(dominated || sparse)
        })
        .collect::<Result<Vec<bool>>>()?;

    Ok(features
        .iter()
        .zip(flags)
        .filter(|(_, excluded)| *excluded)
        .map(|(name, _)| name.clone())
        .collect())
}

/// Occurrence counts of distinct non-NaN values, keyed by bit pattern.
fn value_counts(values: &[f64]) -> HashMap<u64, usize> {
    let mut counts = HashMap::new();
    for &v in values {
        if v.is_nan() {
            continue;
        }
        // Collapse -0.0 onto 0.0 so the two compare as one value
        let v = if v == 0.0 { 0.0 } else { v };
        *counts.entry(v.to_bits()).or_insert(0) += 1;
    }
    counts
}
