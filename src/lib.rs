//! Composable Cell Painting Profile Processing Library
//!
//! This library provides modular primitives for turning image-based
//! morphological profiles into analysis-ready feature tables.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (ProfileTable, feature inference, sample queries)
//! - **aggregate**: Per-group collapse of single-object rows (mean/median)
//! - **annotate**: Plate-map and external metadata joins
//! - **normalize**: Per-feature scaling (standardize, robustize) and sphering
//! - **correlate**: Pairwise correlation (Pearson, Spearman, Kendall)
//! - **select**: Feature selection filters (variance, correlation, missingness, ...)
//! - **consensus**: Replicate collapse into consensus signatures (MODZ)
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use cytoprofile::prelude::*;
//!
//! // Load per-object profiles
//! let profiles = ProfileTable::from_path("profiles.csv").unwrap();
//!
//! // Process to selected per-well profiles
//! let processed = Pipeline::new()
//!     .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
//!     .normalize(NormalizeMethod::Standardize)
//!     .feature_select_default()
//!     .run(profiles)
//!     .unwrap();
//! ```

pub mod aggregate;
pub mod annotate;
pub mod consensus;
pub mod correlate;
pub mod data;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod select;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::aggregate::{
        aggregate, aggregate_with_counts, AggregateOp, OBJECT_COUNT_COLUMN,
    };
    pub use crate::annotate::{annotate, annotate_external, AnnotateConfig};
    pub use crate::consensus::{consensus, modz, modz_weights, ConsensusOp, ModzConfig};
    pub use crate::correlate::{
        correlation_between, correlation_matrix, pairwise_correlations, CorrelationMethod,
        CorrelationPair,
    };
    pub use crate::data::{
        group_rows, infer_features, infer_metadata, resolve_features, resolve_metadata,
        Column, ColumnData, CompartmentConfig, FeatureSpec, ProfileSource, ProfileTable,
        SampleQuery, METADATA_PREFIX,
    };
    pub use crate::error::{ProfileError, Result};
    pub use crate::normalize::{
        normalize, ColumnScale, NormalizeMethod, Spherize, SpherizeConfig, SpherizeMethod,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineStep};
    pub use crate::select::{
        // Individual filters
        select_blocklist, select_correlation, select_missing, select_noise, select_outliers,
        select_variance,
        // Orchestration
        feature_select, feature_select_with_stats, load_blocklist, SelectConfig, SelectOp,
        SelectionResult,
    };
}
