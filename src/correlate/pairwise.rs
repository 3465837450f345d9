//! Pairwise correlation: symmetric matrices and their long-form pair listing.

use crate::error::Result;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Correlation method for pairwise comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pearson => "pearson",
            Self::Spearman => "spearman",
            Self::Kendall => "kendall",
        }
    }
}

impl std::str::FromStr for CorrelationMethod {
    type Err = crate::error::ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            "kendall" => Ok(Self::Kendall),
            other => Err(crate::error::ProfileError::InvalidParameter(format!(
                "Unknown correlation method '{}' (allowed: pearson, spearman, kendall)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One entry of the long-form pairwise listing.
///
/// `pair_a` is the row label and `pair_b` the column label of the strict
/// lower triangle, so each unordered pair appears exactly once and the
/// orientation is stable for downstream tie-breaking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub pair_a: String,
    pub pair_b: String,
    pub correlation: f64,
}

/// Correlation between two equally long slices, over pairwise-complete rows.
///
/// Rows where either value is NaN are dropped before computing. Returns NaN
/// when fewer than two complete pairs remain or a side has zero variance.
pub fn correlation_between(x: &[f64], y: &[f64], method: CorrelationMethod) -> f64 {
    let (xs, ys) = pairwise_complete(x, y);
    if xs.len() < 2 {
        return f64::NAN;
    }
    match method {
        CorrelationMethod::Pearson => pearson(&xs, &ys),
        CorrelationMethod::Spearman => {
            let rx = rank_average(&xs);
            let ry = rank_average(&ys);
            pearson(&rx, &ry)
        }
        CorrelationMethod::Kendall => kendall_tau_b(&xs, &ys),
    }
}

/// Full symmetric correlation matrix between the columns of `data`.
///
/// The diagonal is fixed at 1.0. NaN correlations (zero-variance or
/// all-missing columns) are preserved, not coerced to zero.
pub fn correlation_matrix(data: &DMatrix<f64>, method: CorrelationMethod) -> DMatrix<f64> {
    let n = data.ncols();
    let columns: Vec<Vec<f64>> = (0..n).map(|j| data.column(j).iter().copied().collect()).collect();

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (0..i).map(move |j| (i, j)))
        .collect();
    let values: Vec<f64> = pairs
        .par_iter()
        .map(|&(i, j)| correlation_between(&columns[i], &columns[j], method))
        .collect();

    let mut matrix = DMatrix::from_element(n, n, 1.0);
    for (&(i, j), &r) in pairs.iter().zip(values.iter()) {
        matrix[(i, j)] = r;
        matrix[(j, i)] = r;
    }
    matrix
}

/// Long-form listing of a correlation matrix's strict lower triangle.
///
/// Enumerates entries with row index > column index in row-major order; the
/// diagonal and mirrored duplicates are excluded. NaN entries are kept.
pub fn pairwise_correlations(matrix: &DMatrix<f64>, labels: &[String]) -> Result<Vec<CorrelationPair>> {
    if matrix.nrows() != labels.len() || matrix.ncols() != labels.len() {
        return Err(crate::error::ProfileError::DimensionMismatch {
            expected: labels.len(),
            actual: matrix.nrows(),
        });
    }
    let mut pairs = Vec::with_capacity(labels.len() * labels.len().saturating_sub(1) / 2);
    for i in 0..labels.len() {
        for j in 0..i {
            pairs.push(CorrelationPair {
                pair_a: labels[i].clone(),
                pair_b: labels[j].clone(),
                correlation: matrix[(i, j)],
            });
        }
    }
    Ok(pairs)
}

/// Average ranks (1-based), ties receiving the mean of their rank span.
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Ranks i+1..=j+1 share the average
        let avg = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

fn pairwise_complete(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::with_capacity(x.len());
    let mut ys = Vec::with_capacity(y.len());
    for (&a, &b) in x.iter().zip(y.iter()) {
        if !a.is_nan() && !b.is_nan() {
            xs.push(a);
            ys.push(b);
        }
    }
    (xs, ys)
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        cov / denom
    }
}

fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    let mut concordant = 0i64;
    let mut discordant = 0i64;
    let mut ties_x = 0i64;
    let mut ties_y = 0i64;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i].partial_cmp(&x[j]).unwrap_or(std::cmp::Ordering::Equal);
            let dy = y[i].partial_cmp(&y[j]).unwrap_or(std::cmp::Ordering::Equal);
            match (dx, dy) {
                (std::cmp::Ordering::Equal, std::cmp::Ordering::Equal) => {}
                (std::cmp::Ordering::Equal, _) => ties_x += 1,
                (_, std::cmp::Ordering::Equal) => ties_y += 1,
                (a, b) if a == b => concordant += 1,
                _ => discordant += 1,
            }
        }
    }

    let n0 = (n * (n - 1) / 2) as f64;
    let denom = ((n0 - ties_x as f64) * (n0 - ties_y as f64)).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        (concordant - discordant) as f64 / denom
    }
}
