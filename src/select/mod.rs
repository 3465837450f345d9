//! Feature selection: independent filters producing exclusion lists.
//!
//! Each filter scans the same candidate feature list and returns the names
//! it would drop; the orchestrator unions the lists and drops the columns
//! once. Filters never see each other's exclusions, so operation order
//! cannot change the outcome.

mod blocklist;
mod correlation;
mod missing;
mod noise;
mod outliers;
mod variance;

pub use blocklist::{load_blocklist, select_blocklist, BLOCKLIST_COLUMN};
pub use correlation::select_correlation;
pub use missing::select_missing;
pub use noise::select_noise;
pub use outliers::select_outliers;
pub use variance::select_variance;

use crate::correlate::CorrelationMethod;
use crate::data::{resolve_features, CompartmentConfig, FeatureSpec, ProfileTable, SampleQuery};
use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

/// One selection filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectOp {
    VarianceThreshold,
    CorrelationThreshold,
    DropNaColumns,
    DropOutliers,
    Blocklist,
    NoiseRemoval,
}

impl SelectOp {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VarianceThreshold => "variance_threshold",
            Self::CorrelationThreshold => "correlation_threshold",
            Self::DropNaColumns => "drop_na_columns",
            Self::DropOutliers => "drop_outliers",
            Self::Blocklist => "blocklist",
            Self::NoiseRemoval => "noise_removal",
        }
    }
}

impl FromStr for SelectOp {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "variance_threshold" => Ok(Self::VarianceThreshold),
            "correlation_threshold" => Ok(Self::CorrelationThreshold),
            "drop_na_columns" => Ok(Self::DropNaColumns),
            "drop_outliers" => Ok(Self::DropOutliers),
            "blocklist" => Ok(Self::Blocklist),
            "noise_removal" => Ok(Self::NoiseRemoval),
            other => Err(ProfileError::InvalidParameter(format!(
                "Unknown selection operation '{}' (allowed: variance_threshold, \
                 correlation_threshold, drop_na_columns, drop_outliers, blocklist, \
                 noise_removal)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SelectOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parameters shared across the selection filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectConfig {
    /// Minimum second-most-common / most-common value ratio.
    pub freq_cut: f64,
    /// Minimum distinct-value / row-count ratio.
    pub unique_cut: f64,
    /// Signed correlation cutoff for redundant pairs.
    pub corr_threshold: f64,
    /// Correlation method for the redundancy filter.
    pub corr_method: CorrelationMethod,
    /// Maximum tolerated missing fraction per feature.
    pub na_cutoff: f64,
    /// Maximum tolerated absolute value per feature.
    pub outlier_cutoff: f64,
    /// Feature names to drop unconditionally.
    pub blocklist: Vec<String>,
    /// Optional blocklist file merged into `blocklist`.
    pub blocklist_file: Option<PathBuf>,
    /// Replicate grouping columns for the noise filter.
    pub noise_groups: Vec<String>,
    /// Mean within-group standard deviation cutoff for the noise filter.
    pub noise_cutoff: Option<f64>,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            freq_cut: 0.05,
            unique_cut: 0.01,
            corr_threshold: 0.9,
            corr_method: CorrelationMethod::Pearson,
            na_cutoff: 0.05,
            outlier_cutoff: 500.0,
            blocklist: Vec::new(),
            blocklist_file: None,
            noise_groups: Vec::new(),
            noise_cutoff: None,
        }
    }
}

/// Summary of one selection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Number of candidate features scanned.
    pub n_candidates: usize,
    /// Number of features kept.
    pub n_retained: usize,
    /// Union of all exclusions, sorted.
    pub excluded: Vec<String>,
    /// Exclusion count per operation, in application order.
    pub per_op: Vec<(String, usize)>,
}

impl SelectionResult {
    /// Serialize the summary to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for SelectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Feature Selection")?;
        writeln!(f, "  Candidates: {} features", self.n_candidates)?;
        writeln!(f, "  Excluded:   {} features", self.excluded.len())?;
        writeln!(f, "  Retained:   {} features", self.n_retained)?;
        for (op, count) in &self.per_op {
            writeln!(f, "    {}: {}", op, count)?;
        }
        Ok(())
    }
}

/// Apply selection filters and drop the union of their exclusions.
///
/// Filter parameters are fit on the rows matching `samples`; the column
/// drop applies to the whole table. Metadata columns are never candidates.
pub fn feature_select(
    table: &ProfileTable,
    features: &FeatureSpec,
    samples: &SampleQuery,
    ops: &[SelectOp],
    config: &SelectConfig,
) -> Result<ProfileTable> {
    let (selected, _) = feature_select_with_stats(table, features, samples, ops, config)?;
    Ok(selected)
}

/// Like [`feature_select`], also returning the per-operation summary.
pub fn feature_select_with_stats(
    table: &ProfileTable,
    features: &FeatureSpec,
    samples: &SampleQuery,
    ops: &[SelectOp],
    config: &SelectConfig,
) -> Result<(ProfileTable, SelectionResult)> {
    if ops.is_empty() {
        return Err(ProfileError::InvalidParameter(
            "Feature selection requires at least one operation".to_string(),
        ));
    }

    let candidates = resolve_features(table, features, &CompartmentConfig::default())?;

    let fit_table;
    let fit = if samples.is_all() {
        table
    } else {
        let rows = samples.matching_rows(table)?;
        if rows.is_empty() {
            return Err(ProfileError::EmptyData(
                "Sample query matched no rows for selection fitting".to_string(),
            ));
        }
        fit_table = table.subset_rows(&rows)?;
        &fit_table
    };

    let mut union: BTreeSet<String> = BTreeSet::new();
    let mut per_op = Vec::with_capacity(ops.len());
    for op in ops {
        let exclusions = match op {
            SelectOp::VarianceThreshold => {
                select_variance(fit, &candidates, config.freq_cut, config.unique_cut)?
            }
            SelectOp::CorrelationThreshold => {
                select_correlation(fit, &candidates, config.corr_threshold, config.corr_method)?
            }
            SelectOp::DropNaColumns => select_missing(fit, &candidates, config.na_cutoff)?,
            SelectOp::DropOutliers => select_outliers(fit, &candidates, config.outlier_cutoff)?,
            SelectOp::Blocklist => {
                let mut blocked = config.blocklist.clone();
                if let Some(path) = &config.blocklist_file {
                    blocked.extend(load_blocklist(path)?);
                }
                if blocked.is_empty() {
                    return Err(ProfileError::InvalidParameter(
                        "Blocklist selection requires blocklist entries or a blocklist file"
                            .to_string(),
                    ));
                }
                select_blocklist(&candidates, &blocked)
            }
            SelectOp::NoiseRemoval => {
                let cutoff = config.noise_cutoff.ok_or_else(|| {
                    ProfileError::InvalidParameter(
                        "Noise removal requires a deviation cutoff".to_string(),
                    )
                })?;
                select_noise(fit, &candidates, &config.noise_groups, cutoff)?
            }
        };
        per_op.push((op.name().to_string(), exclusions.len()));
        union.extend(exclusions);
    }

    let excluded: Vec<String> = union.into_iter().collect();
    let selected = table.drop_columns(&excluded)?;
    let result = SelectionResult {
        n_candidates: candidates.len(),
        n_retained: candidates.len() - excluded.len(),
        excluded,
        per_op,
    };
    Ok((selected, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn create_test_table() -> ProfileTable {
        ProfileTable::new(vec![
            Column::text(
                "Metadata_treatment",
                vec!["ctrl", "ctrl", "ctrl", "drug", "drug", "drug"]
                    .into_iter()
                    .map(|s| Some(s.to_string()))
                    .collect(),
            ),
            Column::number("Cells_x", vec![1.0, 3.0, 8.0, 5.0, 2.0, 2.0]),
            Column::number("Cells_y", vec![1.0, 2.0, 8.0, 5.0, 2.0, 1.0]),
            Column::number("Cells_const", vec![7.0, 7.0, 7.0, 7.0, 7.0, 7.0]),
            Column::number(
                "Cells_holes",
                vec![f64::NAN, f64::NAN, f64::NAN, 1.0, 2.0, 3.0],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_union_of_filters() {
        let table = create_test_table();
        let (selected, result) = feature_select_with_stats(
            &table,
            &FeatureSpec::Infer,
            &SampleQuery::All,
            &[
                SelectOp::VarianceThreshold,
                SelectOp::CorrelationThreshold,
                SelectOp::DropNaColumns,
            ],
            &SelectConfig::default(),
        )
        .unwrap();

        assert_eq!(result.n_candidates, 4);
        assert_eq!(result.excluded, vec!["Cells_const", "Cells_holes", "Cells_y"]);
        assert_eq!(
            selected.column_names(),
            vec!["Metadata_treatment", "Cells_x"]
        );
        assert_eq!(result.n_retained, 1);
    }

    #[test]
    fn test_filters_see_full_candidate_list() {
        // The correlation filter alone drops Cells_y; running variance first
        // must not change that, because filters are independent
        let table = create_test_table();
        let (_, lone) = feature_select_with_stats(
            &table,
            &FeatureSpec::Infer,
            &SampleQuery::All,
            &[SelectOp::CorrelationThreshold],
            &SelectConfig::default(),
        )
        .unwrap();
        let (_, combined) = feature_select_with_stats(
            &table,
            &FeatureSpec::Infer,
            &SampleQuery::All,
            &[SelectOp::VarianceThreshold, SelectOp::CorrelationThreshold],
            &SelectConfig::default(),
        )
        .unwrap();

        let lone_corr = lone.per_op.iter().find(|(op, _)| op == "correlation_threshold");
        let combined_corr = combined
            .per_op
            .iter()
            .find(|(op, _)| op == "correlation_threshold");
        assert_eq!(lone_corr, combined_corr);
    }

    #[test]
    fn test_fitting_subset_from_query() {
        let table = create_test_table();
        let query = SampleQuery::parse("Metadata_treatment == 'drug'").unwrap();
        // Within the drug rows Cells_holes is complete, so the missingness
        // filter no longer flags it
        let (_, result) = feature_select_with_stats(
            &table,
            &FeatureSpec::Infer,
            &query,
            &[SelectOp::DropNaColumns],
            &SelectConfig::default(),
        )
        .unwrap();
        assert!(result.excluded.is_empty());
    }

    #[test]
    fn test_blocklist_requires_entries() {
        let table = create_test_table();
        let result = feature_select(
            &table,
            &FeatureSpec::Infer,
            &SampleQuery::All,
            &[SelectOp::Blocklist],
            &SelectConfig::default(),
        );
        assert!(matches!(result, Err(ProfileError::InvalidParameter(_))));
    }

    #[test]
    fn test_explicit_blocklist_applied() {
        let table = create_test_table();
        let config = SelectConfig {
            blocklist: vec!["Cells_x".to_string()],
            ..SelectConfig::default()
        };
        let selected = feature_select(
            &table,
            &FeatureSpec::Infer,
            &SampleQuery::All,
            &[SelectOp::Blocklist],
            &config,
        )
        .unwrap();
        assert!(!selected.has_column("Cells_x"));
        assert!(selected.has_column("Cells_y"));
    }

    #[test]
    fn test_no_operations_rejected() {
        let table = create_test_table();
        let result = feature_select(
            &table,
            &FeatureSpec::Infer,
            &SampleQuery::All,
            &[],
            &SelectConfig::default(),
        );
        assert!(matches!(result, Err(ProfileError::InvalidParameter(_))));
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!(
            "variance_threshold".parse::<SelectOp>().unwrap(),
            SelectOp::VarianceThreshold
        );
        assert_eq!(
            "DROP_NA_COLUMNS".parse::<SelectOp>().unwrap(),
            SelectOp::DropNaColumns
        );
        let err = "magic".parse::<SelectOp>().unwrap_err().to_string();
        assert!(err.contains("magic"));
        assert!(err.contains("variance_threshold"));
    }

    #[test]
    fn test_result_display() {
        let result = SelectionResult {
            n_candidates: 4,
            n_retained: 2,
            excluded: vec!["Cells_a".to_string(), "Cells_b".to_string()],
            per_op: vec![("variance_threshold".to_string(), 2)],
        };
        let text = format!("{}", result);
        assert!(text.contains("Candidates: 4"));
        assert!(text.contains("variance_threshold: 2"));

        let json = result.to_json().unwrap();
        assert!(json.contains("\"n_candidates\": 4"));
        assert!(json.contains("Cells_b"));
    }
}
