//! Data structures for profile processing.

mod features;
mod grouping;
mod profile_table;
mod query;
mod source;

pub use features::{
    infer_features, infer_metadata, resolve_features, resolve_metadata, CompartmentConfig,
    FeatureSpec, METADATA_PREFIX,
};
pub use grouping::{format_key, group_rows, GroupKey};
pub use profile_table::{Column, ColumnData, ProfileTable};
pub use query::{CompareOp, QueryExpr, QueryValue, SampleQuery};
pub use source::ProfileSource;
