//! Per-column location/scale transforms.

/// Consistency factor making the MAD comparable to a normal-distribution
/// standard deviation.
const MAD_CONSISTENCY: f64 = 1.4826;

/// Stabilizer added to the MAD so constant columns divide by a nonzero
/// scale instead of producing infinities.
const MAD_EPSILON: f64 = 1e-18;

/// Fitted center and scale for one feature column.
///
/// Applied as `(x - center) / scale`. NaN cells pass through as NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnScale {
    pub center: f64,
    pub scale: f64,
}

impl ColumnScale {
    /// Fit mean and population standard deviation, skipping NaN cells.
    ///
    /// A zero-deviation column scales by 1, so the fitting rows transform
    /// to exactly zero.
    pub fn standardize(values: &[f64]) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if finite.is_empty() {
            return Self {
                center: f64::NAN,
                scale: 1.0,
            };
        }
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        Self {
            center: mean,
            scale: if std == 0.0 { 1.0 } else { std },
        }
    }

    /// Fit median and scaled median absolute deviation, skipping NaN cells.
    pub fn robust_mad(values: &[f64]) -> Self {
        let center = median_ignore_nan(values);
        let deviations: Vec<f64> = values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| (v - center).abs())
            .collect();
        let mad = median_ignore_nan(&deviations);
        Self {
            center,
            scale: MAD_CONSISTENCY * mad + MAD_EPSILON,
        }
    }

    /// Apply the fitted transform to a value slice.
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.center) / self.scale).collect()
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
