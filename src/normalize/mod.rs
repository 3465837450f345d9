//! Normalization: per-feature scaling fit on all samples or a control subset.
//!
//! The fitting subset comes from a sample query; the transform always
//! applies to every row. This is the control-based normalization pattern:
//! treated wells are expressed relative to the control distribution.

mod scale;
mod spherize;

pub use scale::ColumnScale;
pub use spherize::{Spherize, SpherizeConfig, SpherizeMethod};

use crate::data::{
    resolve_features, resolve_metadata, Column, CompartmentConfig, FeatureSpec, ProfileTable,
    SampleQuery,
};
use crate::error::{ProfileError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Normalization method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    /// Subtract mean, divide by population standard deviation.
    Standardize,
    /// Subtract median, divide by consistency-scaled MAD.
    Robustize,
    /// Whitening transform; see [`SpherizeConfig`].
    Spherize(SpherizeConfig),
}

impl NormalizeMethod {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Standardize => "standardize",
            Self::Robustize => "robustize",
            Self::Spherize(_) => "spherize",
        }
    }
}

impl Default for NormalizeMethod {
    fn default() -> Self {
        Self::Standardize
    }
}

impl FromStr for NormalizeMethod {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "standardize" => Ok(Self::Standardize),
            "robustize" => Ok(Self::Robustize),
            "spherize" => Ok(Self::Spherize(SpherizeConfig::default())),
            other => Err(ProfileError::InvalidParameter(format!(
                "Unknown normalization method '{}' (allowed: standardize, robustize, spherize)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Normalize feature columns, fitting on the rows matching `samples`.
///
/// Output columns are the resolved metadata columns (copied through
/// untouched) followed by the transformed features; row order is preserved
/// exactly. Sphering with a PCA variant replaces the feature columns with
/// anonymous components.
pub fn normalize(
    table: &ProfileTable,
    features: &FeatureSpec,
    meta_features: &FeatureSpec,
    samples: &SampleQuery,
    method: &NormalizeMethod,
) -> Result<ProfileTable> {
    let feature_names = resolve_features(table, features, &CompartmentConfig::default())?;
    let meta_names = resolve_metadata(table, meta_features)?;

    let fit_rows = samples.matching_rows(table)?;
    if fit_rows.is_empty() {
        return Err(ProfileError::EmptyData(
            "Sample query matched no rows for normalization fitting".to_string(),
        ));
    }

    let mut columns = Vec::with_capacity(meta_names.len() + feature_names.len());
    for name in &meta_names {
        columns.push(table.column(name)?.clone());
    }

    match method {
        NormalizeMethod::Standardize | NormalizeMethod::Robustize => {
            let robust = matches!(method, NormalizeMethod::Robustize);
            let transformed: Vec<Column> = feature_names
                .par_iter()
                .map(|name| {
                    let values = table.numeric_column(name)?;
                    let fit_values: Vec<f64> = fit_rows.iter().map(|&r| values[r]).collect();
                    let scale = if robust {
                        ColumnScale::robust_mad(&fit_values)
                    } else {
                        ColumnScale::standardize(&fit_values)
                    };
                    Ok(Column::number(name, scale.apply(values)))
                })
                .collect::<Result<Vec<Column>>>()?;
            columns.extend(transformed);
        }
        NormalizeMethod::Spherize(config) => {
            let full = table.numeric_matrix(&feature_names)?;
            let fitted = if samples.is_all() {
                Spherize::fit(&full, config)?
            } else {
                Spherize::fit(&full.select_rows(&fit_rows), config)?
            };
            let out = fitted.transform(&full)?;
            let names = fitted.output_names(&feature_names)?;
            for (k, name) in names.iter().enumerate() {
                columns.push(Column::number(name, out.column(k).iter().copied().collect()));
            }
        }
    }

    ProfileTable::new(columns)
}
