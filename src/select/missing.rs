//! Missingness filtering.

use crate::data::ProfileTable;
use crate::error::{ProfileError, Result};

/// Find features whose fraction of missing (NaN) cells exceeds `cutoff`.
///
/// # Arguments
/// * `table` - Fitting rows
/// * `features` - Candidate feature columns
/// * `cutoff` - Maximum tolerated missing fraction (0.0 to 1.0)
///
/// # Returns
/// The excluded feature names, in candidate order.
pub fn select_missing(table: &ProfileTable, features: &[String], cutoff: f64) -> Result<Vec<String>> {
    if !(0.0..=1.0).contains(&cutoff) {
        return Err(ProfileError::InvalidParameter(format!(
            "Missingness cutoff must be between 0 and 1 (got {})",
            cutoff
        )));
    }

    let n_rows = table.n_rows();
    if n_rows == 0 {
        return Ok(Vec::new());
    }

    let mut excluded = Vec::new();
    for name in features {
        let values = table.numeric_column(name)?;
        let missing = values.iter().filter(|v| v.is_nan()).count();
        if missing as f64 / n_rows as f64 > cutoff {
            excluded.push(name.clone());
        }
    }
    Ok(excluded)
}
