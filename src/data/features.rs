//! Feature and metadata column resolution.

use crate::data::ProfileTable;
use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};

/// Reserved prefix identifying metadata columns.
pub const METADATA_PREFIX: &str = "Metadata_";

/// How the columns of one kind (features or metadata) are specified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureSpec {
    /// Use exactly these columns.
    Explicit(Vec<String>),
    /// Infer by name-prefix convention.
    Infer,
    /// No columns of this kind.
    None,
}

/// Compartment prefixes used for feature inference.
///
/// Compartment names are case-insensitive; columns match when they start with
/// the title-cased name followed by an underscore (`cells` matches
/// `Cells_AreaShape_Area` but not `CElls_AreaShape_Area`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompartmentConfig {
    /// Compartment names to match.
    pub compartments: Vec<String>,
    /// Also match the `Image_` pseudo-compartment.
    pub include_image: bool,
}

impl Default for CompartmentConfig {
    fn default() -> Self {
        Self {
            compartments: vec![
                "cells".to_string(),
                "cytoplasm".to_string(),
                "nuclei".to_string(),
            ],
            include_image: false,
        }
    }
}

impl CompartmentConfig {
    /// Default compartments plus the `Image_` pseudo-compartment.
    pub fn with_image(mut self) -> Self {
        self.include_image = true;
        self
    }

    fn prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self
            .compartments
            .iter()
            .map(|c| format!("{}_", title_case(c)))
            .collect();
        if self.include_image {
            prefixes.push("Image_".to_string());
        }
        prefixes
    }
}

/// Resolve the feature columns of a table according to a spec.
///
/// `FeatureSpec::None` is invalid here: every numeric operation needs a
/// feature list.
pub fn resolve_features(
    table: &ProfileTable,
    spec: &FeatureSpec,
    config: &CompartmentConfig,
) -> Result<Vec<String>> {
    match spec {
        FeatureSpec::Explicit(columns) => {
            for name in columns {
                table.column(name)?;
            }
            Ok(columns.clone())
        }
        FeatureSpec::Infer => infer_features(table, config),
        FeatureSpec::None => Err(ProfileError::InvalidParameter(
            "Feature specification 'none' is not valid here; use an explicit list or inference"
                .to_string(),
        )),
    }
}

/// Resolve the metadata columns of a table according to a spec.
pub fn resolve_metadata(table: &ProfileTable, spec: &FeatureSpec) -> Result<Vec<String>> {
    match spec {
        FeatureSpec::Explicit(columns) => {
            for name in columns {
                table.column(name)?;
            }
            Ok(columns.clone())
        }
        FeatureSpec::Infer => infer_metadata(table),
        FeatureSpec::None => Ok(Vec::new()),
    }
}

/// Infer feature columns from compartment-name prefixes, in table order.
///
/// Zero matches is a hard error: downstream numeric operations on an empty
/// feature set would silently produce degenerate output.
pub fn infer_features(table: &ProfileTable, config: &CompartmentConfig) -> Result<Vec<String>> {
    let prefixes = config.prefixes();
    let features: Vec<String> = table
        .column_names()
        .iter()
        .filter(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())))
        .map(|s| s.to_string())
        .collect();

    if features.is_empty() {
        return Err(ProfileError::EmptyData(format!(
            "No compartment features found (prefixes: {})",
            prefixes.join(", ")
        )));
    }
    Ok(features)
}

/// Infer metadata columns from the `Metadata_` prefix, in table order.
pub fn infer_metadata(table: &ProfileTable) -> Result<Vec<String>> {
    let metadata: Vec<String> = table
        .column_names()
        .iter()
        .filter(|name| name.starts_with(METADATA_PREFIX))
        .map(|s| s.to_string())
        .collect();

    if metadata.is_empty() {
        return Err(ProfileError::EmptyData(format!(
            "No metadata columns found (prefix: {})",
            METADATA_PREFIX
        )));
    }
    Ok(metadata)
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
