//! Sphering (whitening): decorrelate the feature space.
//!
//! Fits a linear map on a fitting subset so the transformed features have
//! identity covariance. PCA variants leave the output in component space;
//! ZCA variants rotate back to the original feature basis. The `-cor`
//! variants standardize each column first (correlation rather than
//! covariance sphering) and therefore require centering.

use crate::error::{ProfileError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sphering variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpherizeMethod {
    Pca,
    Zca,
    PcaCor,
    ZcaCor,
}

impl SpherizeMethod {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pca => "PCA",
            Self::Zca => "ZCA",
            Self::PcaCor => "PCA-cor",
            Self::ZcaCor => "ZCA-cor",
        }
    }

    fn is_correlation(&self) -> bool {
        matches!(self, Self::PcaCor | Self::ZcaCor)
    }

    fn is_component_space(&self) -> bool {
        matches!(self, Self::Pca | Self::PcaCor)
    }
}

impl FromStr for SpherizeMethod {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pca" => Ok(Self::Pca),
            "zca" => Ok(Self::Zca),
            "pca_cor" => Ok(Self::PcaCor),
            "zca_cor" => Ok(Self::ZcaCor),
            other => Err(ProfileError::InvalidParameter(format!(
                "Unknown sphering method '{}' (allowed: PCA, ZCA, PCA-cor, ZCA-cor)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SpherizeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Sphering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpherizeConfig {
    pub method: SpherizeMethod,
    /// Subtract column means before decomposing. Required for `-cor`.
    pub center: bool,
    /// Added to singular values before inversion so near-zero-variance
    /// directions do not divide by zero.
    pub epsilon: f64,
}

impl Default for SpherizeConfig {
    fn default() -> Self {
        Self {
            method: SpherizeMethod::ZcaCor,
            center: true,
            epsilon: 1e-6,
        }
    }
}

/// A fitted sphering transform.
#[derive(Debug, Clone)]
pub struct Spherize {
    method: SpherizeMethod,
    centers: Vec<f64>,
    scales: Vec<f64>,
    weights: DMatrix<f64>,
}

impl Spherize {
    /// Fit the whitening map on `data` (rows are samples, columns features).
    ///
    /// The fitting matrix must be fully finite: sphering has no per-cell
    /// missing-value policy, so impute or drop missing cells first.
    pub fn fit(data: &DMatrix<f64>, config: &SpherizeConfig) -> Result<Self> {
        let n = data.nrows();
        let p = data.ncols();
        if n == 0 || p == 0 {
            return Err(ProfileError::EmptyData(
                "Sphering requires a non-empty fitting matrix".to_string(),
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ProfileError::Numerical(
                "Sphering requires finite values; remove or impute missing cells first"
                    .to_string(),
            ));
        }
        if config.method.is_correlation() && !config.center {
            return Err(ProfileError::InvalidParameter(format!(
                "Sphering method {} requires centering",
                config.method
            )));
        }

        let centers: Vec<f64> = if config.center {
            (0..p).map(|j| data.column(j).mean()).collect()
        } else {
            vec![0.0; p]
        };
        let scales: Vec<f64> = if config.method.is_correlation() {
            let mut scales = Vec::with_capacity(p);
            for j in 0..p {
                let std = column_sample_std(data, j, centers[j]);
                if std == 0.0 {
                    return Err(ProfileError::Numerical(format!(
                        "Divide by zero sphering column {}: zero variance in the fitting rows; \
                         remove low-variance features first",
                        j
                    )));
                }
                scales.push(std);
            }
            scales
        } else {
            vec![1.0; p]
        };

        let mut fitted = data.clone();
        for j in 0..p {
            for i in 0..n {
                fitted[(i, j)] = (fitted[(i, j)] - centers[j]) / scales[j];
            }
        }

        let svd = fitted.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| ProfileError::Numerical("SVD failed to converge".to_string()))?;
        let v = v_t.transpose();

        // W_pca = V * diag(1 / (sigma + eps)) * sqrt(n - 1)
        let scale_factor = ((n.saturating_sub(1)) as f64).sqrt();
        let r = svd.singular_values.len();
        let mut w_pca = v.clone();
        for k in 0..r {
            let inv = scale_factor / (svd.singular_values[k] + config.epsilon);
            for row in 0..p {
                w_pca[(row, k)] *= inv;
            }
        }
        let weights = if config.method.is_component_space() {
            w_pca
        } else {
            // ZCA rotates back to the feature basis
            w_pca * v_t
        };

        Ok(Self {
            method: config.method,
            centers,
            scales,
            weights,
        })
    }

    /// Apply the fitted map. Rows with NaN cells produce NaN output rows.
    pub fn transform(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if data.ncols() != self.centers.len() {
            return Err(ProfileError::DimensionMismatch {
                expected: self.centers.len(),
                actual: data.ncols(),
            });
        }
        let mut adjusted = data.clone();
        for j in 0..adjusted.ncols() {
            for i in 0..adjusted.nrows() {
                adjusted[(i, j)] = (adjusted[(i, j)] - self.centers[j]) / self.scales[j];
            }
        }
        Ok(adjusted * &self.weights)
    }

    /// Number of output columns.
    pub fn n_components(&self) -> usize {
        self.weights.ncols()
    }

    /// Output column names: original names for ZCA variants, anonymous
    /// component labels for PCA variants.
    pub fn output_names(&self, features: &[String]) -> Result<Vec<String>> {
        if features.len() != self.centers.len() {
            return Err(ProfileError::DimensionMismatch {
                expected: self.centers.len(),
                actual: features.len(),
            });
        }
        if self.method.is_component_space() {
            Ok((1..=self.n_components()).map(|k| format!("PC{}", k)).collect())
        } else {
            Ok(features.to_vec())
        }
    }
}

fn column_sample_std(data: &DMatrix<f64>, j: usize, mean: f64) -> f64 {
    let n = data.nrows();
    if n < 2 {
        return 0.0;
    }
    let ss: f64 = data.column(j).iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}
