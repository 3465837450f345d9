//! Replicate-noise filtering.

use crate::data::{group_rows, ProfileTable};
use crate::error::{ProfileError, Result};

/// Find features that vary too much within perturbation replicate groups.
///
/// Rows are grouped by `groups`; per feature, the sample standard deviation
/// is taken within each group and averaged across groups. Features whose
/// averaged within-group deviation exceeds `cutoff` are excluded. Groups
/// with fewer than two finite values contribute no deviation; a feature
/// with no contributing group is kept.
///
/// # Arguments
/// * `table` - Fitting rows
/// * `features` - Candidate feature columns
/// * `groups` - Metadata columns identifying replicate groups
/// * `cutoff` - Maximum tolerated mean within-group standard deviation
///
/// # Returns
/// The excluded feature names, in candidate order.
pub fn select_noise(
    table: &ProfileTable,
    features: &[String],
    groups: &[String],
    cutoff: f64,
) -> Result<Vec<String>> {
    if groups.is_empty() {
        return Err(ProfileError::InvalidParameter(
            "Noise removal requires at least one perturbation group column".to_string(),
        ));
    }
    if !cutoff.is_finite() || cutoff < 0.0 {
        return Err(ProfileError::InvalidParameter(format!(
            "Noise deviation cutoff must be non-negative (got {})",
            cutoff
        )));
    }

    let partitions = group_rows(table, groups)?;

    let mut excluded = Vec::new();
    for name in features {
        let values = table.numeric_column(name)?;
        let mut total = 0.0;
        let mut n_groups = 0usize;
        for (_, rows) in &partitions {
            let group_values: Vec<f64> = rows
                .iter()
                .map(|&r| values[r])
                .filter(|v| !v.is_nan())
                .collect();
            if let Some(stdev) = sample_stdev(&group_values) {
                total += stdev;
                n_groups += 1;
            }
        }
        if n_groups > 0 && total / n_groups as f64 > cutoff {
            excluded.push(name.clone());
        }
    }
    Ok(excluded)
}

/// Sample standard deviation (n-1 denominator); None below two values.
fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (n - 1.0)).sqrt())
}
