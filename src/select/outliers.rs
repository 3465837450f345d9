//! Outlier-magnitude filtering.

use crate::data::ProfileTable;
use crate::error::{ProfileError, Result};

/// Find features whose largest absolute value exceeds `cutoff`.
///
/// Aimed at un-normalized measurements where a handful of extreme cells
/// would otherwise dominate downstream scaling. NaN cells are skipped; an
/// all-NaN column is never flagged.
///
/// # Arguments
/// * `table` - Fitting rows
/// * `features` - Candidate feature columns
/// * `cutoff` - Maximum tolerated absolute value (must be positive)
///
/// # Returns
/// The excluded feature names, in candidate order.
pub fn select_outliers(table: &ProfileTable, features: &[String], cutoff: f64) -> Result<Vec<String>> {
    if !cutoff.is_finite() || cutoff <= 0.0 {
        return Err(ProfileError::InvalidParameter(format!(
            "Outlier cutoff must be a positive number (got {})",
            cutoff
        )));
    }

    let mut excluded = Vec::new();
    for name in features {
        let values = table.numeric_column(name)?;
        let max_abs = values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| v.abs())
            .fold(f64::NEG_INFINITY, f64::max);
        if max_abs > cutoff {
            excluded.push(name.clone());
        }
    }
    Ok(excluded)
}
