//! Consensus signatures across replicate profiles.
//!
//! Collapses every replicate group to a single row, either by plain
//! aggregation or by MODZ, which downweights replicates that disagree
//! with their siblings.

mod modz;

pub use modz::{modz, modz_weights, ModzConfig};

use crate::aggregate::{aggregate, AggregateOp};
use crate::data::{FeatureSpec, ProfileTable};
use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How replicates are collapsed into a consensus row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusOp {
    /// Per-feature median across replicates.
    Median,
    /// Per-feature mean across replicates.
    Mean,
    /// Correlation-weighted average.
    Modz(ModzConfig),
}

impl ConsensusOp {
    /// Get the descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            ConsensusOp::Median => "median",
            ConsensusOp::Mean => "mean",
            ConsensusOp::Modz(_) => "modz",
        }
    }
}

impl Default for ConsensusOp {
    fn default() -> Self {
        ConsensusOp::Median
    }
}

impl FromStr for ConsensusOp {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "median" => Ok(ConsensusOp::Median),
            "mean" => Ok(ConsensusOp::Mean),
            "modz" => Ok(ConsensusOp::Modz(ModzConfig::default())),
            other => Err(ProfileError::InvalidParameter(format!(
                "Unknown consensus operation '{}' (allowed: median, mean, modz)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ConsensusOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Build one consensus signature per replicate group.
///
/// # Arguments
///
/// * `table` - Profiles with one row per replicate
/// * `replicate_columns` - Metadata columns identifying a replicate group
/// * `features` - Feature columns to collapse
/// * `op` - Collapse operation
///
/// # Returns
///
/// A table with one row per group: the replicate columns followed by the
/// collapsed features.
pub fn consensus(
    table: &ProfileTable,
    replicate_columns: &[String],
    features: &FeatureSpec,
    op: ConsensusOp,
) -> Result<ProfileTable> {
    match op {
        ConsensusOp::Median => aggregate(table, replicate_columns, features, AggregateOp::Median),
        ConsensusOp::Mean => aggregate(table, replicate_columns, features, AggregateOp::Mean),
        ConsensusOp::Modz(config) => modz(table, replicate_columns, features, &config),
    }
}
