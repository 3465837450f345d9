//! Aggregation: collapse profile rows into one row per strata group.
//!
//! Groups rows by exact value tuples over the strata columns and reduces
//! every feature column independently with a NaN-skipping mean or median.
//! Output rows follow lexicographic key order with missing values first.

use crate::data::{group_rows, resolve_features, Column, CompartmentConfig, FeatureSpec, ProfileTable};
use crate::error::{ProfileError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Column added by [`aggregate_with_counts`] holding per-group row counts.
pub const OBJECT_COUNT_COLUMN: &str = "Metadata_Object_Count";

/// Reduction applied to each feature column within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Mean,
    Median,
}

impl AggregateOp {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
        }
    }

    /// Reduce a slice of values, skipping NaN entries.
    ///
    /// Returns NaN when no finite values remain.
    pub fn reduce(&self, values: &[f64]) -> f64 {
        match self {
            Self::Mean => mean_ignore_nan(values),
            Self::Median => median_ignore_nan(values),
        }
    }
}

impl Default for AggregateOp {
    fn default() -> Self {
        Self::Median
    }
}

impl FromStr for AggregateOp {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            other => Err(ProfileError::InvalidParameter(format!(
                "Unknown aggregation operation '{}' (allowed: mean, median)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Aggregate feature columns per strata group.
///
/// Output columns are the strata (carried as their canonical string form)
/// followed by the feature columns in their original order; one row per
/// distinct strata tuple. Strata columns listed in `features` are grouped,
/// never reduced.
pub fn aggregate(
    table: &ProfileTable,
    strata: &[String],
    features: &FeatureSpec,
    op: AggregateOp,
) -> Result<ProfileTable> {
    aggregate_impl(table, strata, features, op, false)
}

/// Like [`aggregate`], plus a `Metadata_Object_Count` column recording how
/// many rows each group collapsed, placed directly after the strata.
pub fn aggregate_with_counts(
    table: &ProfileTable,
    strata: &[String],
    features: &FeatureSpec,
    op: AggregateOp,
) -> Result<ProfileTable> {
    aggregate_impl(table, strata, features, op, true)
}

fn aggregate_impl(
    table: &ProfileTable,
    strata: &[String],
    features: &FeatureSpec,
    op: AggregateOp,
    object_count: bool,
) -> Result<ProfileTable> {
    if strata.is_empty() {
        return Err(ProfileError::InvalidParameter(
            "Aggregation requires at least one stratum column".to_string(),
        ));
    }

    let feature_names: Vec<String> =
        resolve_features(table, features, &CompartmentConfig::default())?
            .into_iter()
            .filter(|name| !strata.contains(name))
            .collect();
    if feature_names.is_empty() {
        return Err(ProfileError::EmptyData(
            "No feature columns left to aggregate after removing strata".to_string(),
        ));
    }

    let groups = group_rows(table, strata)?;

    let mut columns = Vec::with_capacity(strata.len() + feature_names.len() + 1);
    for (i, stratum) in strata.iter().enumerate() {
        let values: Vec<Option<String>> = groups.iter().map(|(key, _)| key[i].clone()).collect();
        columns.push(Column::text(stratum, values));
    }
    if object_count {
        let counts: Vec<f64> = groups.iter().map(|(_, rows)| rows.len() as f64).collect();
        columns.push(Column::number(OBJECT_COUNT_COLUMN, counts));
    }

    let reduced: Vec<Column> = feature_names
        .par_iter()
        .map(|name| {
            let values = table.numeric_column(name)?;
            let per_group: Vec<f64> = groups
                .iter()
                .map(|(_, rows)| {
                    let group_values: Vec<f64> = rows.iter().map(|&r| values[r]).collect();
                    op.reduce(&group_values)
                })
                .collect();
            Ok(Column::number(name, per_group))
        })
        .collect::<Result<Vec<Column>>>()?;
    columns.extend(reduced);

    ProfileTable::new(columns)
}

fn mean_ignore_nan(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in values {
        if !v.is_nan() {
            sum += v;
            n += 1;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

fn median_ignore_nan(values: &[f64]) -> f64 {
    let mut kept: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if kept.is_empty() {
        return f64::NAN;
    }
    kept.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = kept.len() / 2;
    if kept.len() % 2 == 1 {
        kept[mid]
    } else {
        (kept[mid - 1] + kept[mid]) / 2.0
    }
}
