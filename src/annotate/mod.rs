//! Annotate profiles with plate-map metadata.

use crate::data::{ProfileTable, METADATA_PREFIX};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Plate-map join parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Plate-map join column paired with the profile join column. The
    /// plate-map side names the column after recoding.
    pub join_on: (String, String),
    /// Prefix plate-map columns with `Metadata_` before joining.
    pub recode_platemap: bool,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            join_on: (
                "Metadata_well_position".to_string(),
                "Metadata_Well".to_string(),
            ),
            recode_platemap: true,
        }
    }
}

/// Merge plate-map metadata into a profile table.
///
/// Plate-map columns are recoded with the `Metadata_` prefix unless already
/// prefixed, then inner-joined against the profiles. The plate-map join
/// column is dropped afterwards; the profile side keeps the key. Output
/// columns are the plate-map metadata followed by the profile columns, rows
/// in plate-map order.
///
/// # Arguments
///
/// * `profiles` - Profile table with a join key column
/// * `platemap` - Plate layout, one row per well
/// * `config` - Join columns and recoding behavior
///
/// # Returns
///
/// The annotated profile table.
pub fn annotate(
    profiles: &ProfileTable,
    platemap: &ProfileTable,
    config: &AnnotateConfig,
) -> Result<ProfileTable> {
    let platemap = if config.recode_platemap {
        recode_metadata(platemap)?
    } else {
        platemap.clone()
    };
    let (platemap_col, profile_col) = (&config.join_on.0, &config.join_on.1);
    let joined = platemap.inner_join(profiles, platemap_col, profile_col)?;
    joined.drop_columns(&[platemap_col.clone()])
}

/// Enrich annotated profiles with a second metadata table.
///
/// Left join so profiles without a match survive with missing cells. The
/// external table is recoded like a plate map; `external_col` names its join
/// column after recoding and is dropped from the output.
pub fn annotate_external(
    profiles: &ProfileTable,
    external: &ProfileTable,
    profile_col: &str,
    external_col: &str,
) -> Result<ProfileTable> {
    let external = recode_metadata(external)?;
    // Same-name keys would collide in the merged table
    let (external, external_col) = if external_col == profile_col {
        let renamed = format!("{}_external", external_col);
        (rename_column(&external, external_col, &renamed)?, renamed)
    } else {
        (external, external_col.to_string())
    };
    let joined = profiles.left_join(&external, profile_col, &external_col)?;
    joined.drop_columns(&[external_col])
}

/// Recode column names with the metadata prefix unless already prefixed.
fn recode_metadata(table: &ProfileTable) -> Result<ProfileTable> {
    let columns = table
        .columns()
        .iter()
        .map(|col| {
            if col.name().starts_with(METADATA_PREFIX) {
                col.clone()
            } else {
                col.renamed(&format!("{}{}", METADATA_PREFIX, col.name()))
            }
        })
        .collect();
    ProfileTable::new(columns)
}

fn rename_column(table: &ProfileTable, from: &str, to: &str) -> Result<ProfileTable> {
    let columns = table
        .columns()
        .iter()
        .map(|col| {
            if col.name() == from {
                col.renamed(to)
            } else {
                col.clone()
            }
        })
        .collect();
    ProfileTable::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn text(name: &str, values: &[&str]) -> Column {
        Column::text(name, values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn test_profiles() -> ProfileTable {
        ProfileTable::new(vec![
            text("Metadata_Well", &["A01", "A02", "B01"]),
            Column::number("Cells_area", vec![10.0, 20.0, 30.0]),
        ])
        .unwrap()
    }

    fn test_platemap() -> ProfileTable {
        // Deliberately not in profile row order
        ProfileTable::new(vec![
            text("well_position", &["B01", "A01", "A02"]),
            text("gene", &["Ctrl", "TP53", "KRAS"]),
            Column::number("dose", vec![0.0, 1.0, 2.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_annotate_recodes_and_joins() {
        let out = annotate(&test_profiles(), &test_platemap(), &AnnotateConfig::default()).unwrap();

        assert_eq!(
            out.column_names(),
            vec!["Metadata_gene", "Metadata_dose", "Metadata_Well", "Cells_area"]
        );
        // Rows follow the plate map
        let wells: Vec<_> = (0..3)
            .map(|r| out.column("Metadata_Well").unwrap().cell_key(r))
            .collect();
        assert_eq!(
            wells,
            vec![
                Some("B01".to_string()),
                Some("A01".to_string()),
                Some("A02".to_string())
            ]
        );
        assert_eq!(out.numeric_column("Cells_area").unwrap(), &[30.0, 10.0, 20.0]);
    }

    #[test]
    fn test_prefixed_platemap_columns_kept() {
        let platemap = ProfileTable::new(vec![
            text("well_position", &["A01", "A02", "B01"]),
            text("Metadata_gene", &["TP53", "KRAS", "Ctrl"]),
        ])
        .unwrap();
        let out = annotate(&test_profiles(), &platemap, &AnnotateConfig::default()).unwrap();
        assert!(out.has_column("Metadata_gene"));
        assert!(!out.has_column("Metadata_Metadata_gene"));
    }

    #[test]
    fn test_inner_join_drops_unmatched_rows() {
        let platemap = ProfileTable::new(vec![
            text("well_position", &["A01", "D04"]),
            text("gene", &["TP53", "EMPTY"]),
        ])
        .unwrap();
        let out = annotate(&test_profiles(), &platemap, &AnnotateConfig::default()).unwrap();

        // A02/B01 have no plate-map row, D04 has no profile
        assert_eq!(out.n_rows(), 1);
        assert_eq!(
            out.column("Metadata_gene").unwrap().cell_key(0),
            Some("TP53".to_string())
        );
    }

    #[test]
    fn test_custom_join_without_recode() {
        let platemap = ProfileTable::new(vec![
            text("Metadata_pos", &["A01", "A02", "B01"]),
            text("Metadata_gene", &["TP53", "KRAS", "Ctrl"]),
        ])
        .unwrap();
        let config = AnnotateConfig {
            join_on: ("Metadata_pos".to_string(), "Metadata_Well".to_string()),
            recode_platemap: false,
        };
        let out = annotate(&test_profiles(), &platemap, &config).unwrap();
        assert!(!out.has_column("Metadata_pos"));
        assert_eq!(out.n_rows(), 3);
    }

    #[test]
    fn test_external_enrichment_keeps_unmatched() {
        let annotated = annotate(&test_profiles(), &test_platemap(), &AnnotateConfig::default()).unwrap();
        let external = ProfileTable::new(vec![
            text("gene", &["TP53", "KRAS"]),
            text("pathway", &["p53", "RAS"]),
        ])
        .unwrap();

        let out =
            annotate_external(&annotated, &external, "Metadata_gene", "Metadata_gene").unwrap();

        assert_eq!(out.n_rows(), 3);
        assert!(out.has_column("Metadata_pathway"));
        assert!(!out.has_column("Metadata_gene_external"));
        // Ctrl row has no external match
        let pathways: Vec<_> = (0..3)
            .map(|r| out.column("Metadata_pathway").unwrap().cell_key(r))
            .collect();
        assert_eq!(
            pathways,
            vec![None, Some("p53".to_string()), Some("RAS".to_string())]
        );
    }

    #[test]
    fn test_missing_join_column_fails() {
        let platemap = ProfileTable::new(vec![
            text("plate_row", &["A", "A", "B"]),
            text("gene", &["TP53", "KRAS", "Ctrl"]),
        ])
        .unwrap();
        let result = annotate(&test_profiles(), &platemap, &AnnotateConfig::default());
        assert!(result.is_err());
    }
}
