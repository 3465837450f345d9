//! MODZ: correlation-weighted replicate collapse.

use crate::correlate::{correlation_matrix, CorrelationMethod};
use crate::data::{group_rows, resolve_features, Column, CompartmentConfig, FeatureSpec, ProfileTable};
use crate::error::{ProfileError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// MODZ parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModzConfig {
    /// Correlation method between replicate samples.
    pub method: CorrelationMethod,
    /// Floor applied to each sample's mean correlation before
    /// normalization. 0 fully suppresses anticorrelated replicates;
    /// 1 degenerates to the unweighted mean.
    pub min_weight: f64,
    /// Digits kept when rounding correlations and weights.
    pub precision: i32,
}

impl Default for ModzConfig {
    fn default() -> Self {
        Self {
            method: CorrelationMethod::Spearman,
            min_weight: 0.01,
            precision: 4,
        }
    }
}

/// Per-sample weights from a replicate correlation matrix.
///
/// Each sample's weight is the mean of its non-negative correlations to
/// the other samples (the diagonal never participates; NaN entries are
/// skipped), floored at `min_weight`, normalized to sum to 1 and rounded.
/// A sample whose correlations are all NaN keeps a NaN weight.
pub fn modz_weights(correlations: &DMatrix<f64>, min_weight: f64, precision: i32) -> Result<Vec<f64>> {
    if !(0.0..=1.0).contains(&min_weight) {
        return Err(ProfileError::InvalidParameter(format!(
            "Minimum weight must be between 0 and 1 (got {})",
            min_weight
        )));
    }
    let n = correlations.nrows();
    if correlations.ncols() != n {
        return Err(ProfileError::DimensionMismatch {
            expected: n,
            actual: correlations.ncols(),
        });
    }

    let mut raw = Vec::with_capacity(n);
    for i in 0..n {
        let mut sum = 0.0;
        let mut count = 0usize;
        for j in 0..n {
            if j == i {
                continue;
            }
            let r = correlations[(i, j)];
            if r.is_nan() {
                continue;
            }
            sum += r.max(0.0);
            count += 1;
        }
        let mean = if count == 0 { f64::NAN } else { sum / count as f64 };
        raw.push(mean.max(min_weight));
    }

    let total: f64 = raw.iter().sum();
    Ok(raw
        .iter()
        .map(|w| round_to(w / total, precision))
        .collect())
}

/// Collapse replicates into one consensus signature per group.
///
/// Within each group the samples are correlated feature-wise, weighted by
/// [`modz_weights`], and summed. Single-sample groups pass their values
/// through verbatim. Output rows follow lexicographic group-key order with
/// missing keys first, columns are the replicate columns then the
/// features.
pub fn modz(
    table: &ProfileTable,
    replicate_columns: &[String],
    features: &FeatureSpec,
    config: &ModzConfig,
) -> Result<ProfileTable> {
    if replicate_columns.is_empty() {
        return Err(ProfileError::InvalidParameter(
            "MODZ requires at least one replicate column".to_string(),
        ));
    }

    let feature_names: Vec<String> =
        resolve_features(table, features, &CompartmentConfig::default())?
            .into_iter()
            .filter(|name| !replicate_columns.contains(name))
            .collect();
    if feature_names.is_empty() {
        return Err(ProfileError::EmptyData(
            "No feature columns left to collapse after removing replicate columns".to_string(),
        ));
    }

    let values: Vec<&[f64]> = feature_names
        .iter()
        .map(|name| table.numeric_column(name))
        .collect::<Result<Vec<_>>>()?;
    let groups = group_rows(table, replicate_columns)?;

    let signatures: Vec<Vec<f64>> = groups
        .par_iter()
        .map(|(_, rows)| group_signature(&values, rows, config))
        .collect::<Result<Vec<_>>>()?;

    let mut columns = Vec::with_capacity(replicate_columns.len() + feature_names.len());
    for (i, name) in replicate_columns.iter().enumerate() {
        let keys: Vec<Option<String>> = groups.iter().map(|(key, _)| key[i].clone()).collect();
        columns.push(Column::text(name, keys));
    }
    for (f, name) in feature_names.iter().enumerate() {
        let column: Vec<f64> = signatures.iter().map(|sig| sig[f]).collect();
        columns.push(Column::number(name, column));
    }

    ProfileTable::new(columns)
}

/// Consensus feature vector for one replicate group.
fn group_signature(values: &[&[f64]], rows: &[usize], config: &ModzConfig) -> Result<Vec<f64>> {
    let n_samples = rows.len();
    if n_samples == 1 {
        return Ok(values.iter().map(|column| column[rows[0]]).collect());
    }

    // Samples become columns so the correlation runs between replicates
    let transposed = DMatrix::from_fn(values.len(), n_samples, |f, s| values[f][rows[s]]);
    let mut correlations = correlation_matrix(&transposed, config.method);
    for entry in correlations.iter_mut() {
        *entry = round_to(*entry, config.precision);
    }
    let weights = modz_weights(&correlations, config.min_weight, config.precision)?;

    let signature = values
        .iter()
        .map(|column| {
            let mut sum = 0.0;
            for (s, &row) in rows.iter().enumerate() {
                let term = weights[s] * column[row];
                if !term.is_nan() {
                    sum += term;
                }
            }
            sum
        })
        .collect();
    Ok(signature)
}

fn round_to(x: f64, digits: i32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}
