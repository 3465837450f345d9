//! Pipeline runner for composing and executing profile processing steps.

use crate::aggregate::{aggregate, aggregate_with_counts, AggregateOp};
use crate::annotate::{annotate, annotate_external, AnnotateConfig};
use crate::consensus::{consensus, ConsensusOp};
use crate::data::{FeatureSpec, ProfileSource, ProfileTable, SampleQuery};
use crate::error::{ProfileError, Result};
use crate::normalize::{normalize, NormalizeMethod};
use crate::select::{feature_select, SelectConfig, SelectOp};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A step in the profile processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineStep {
    /// Collapse rows into one profile per strata group.
    Aggregate {
        #[serde(default = "default_strata")]
        strata: Vec<String>,
        #[serde(default = "default_features")]
        features: FeatureSpec,
        #[serde(default)]
        operation: AggregateOp,
        /// Record per-group row counts in `Metadata_Object_Count`.
        #[serde(default)]
        object_counts: bool,
    },
    /// Join plate-map metadata loaded from a file.
    Annotate {
        platemap: PathBuf,
        #[serde(default)]
        config: AnnotateConfig,
        /// Second metadata file merged after the plate map.
        #[serde(default)]
        external: Option<PathBuf>,
        /// Profile and external join columns, required with `external`.
        #[serde(default)]
        external_join: Option<(String, String)>,
    },
    /// Scale or sphere features, fit on all rows or a query subset.
    Normalize {
        #[serde(default)]
        method: NormalizeMethod,
        #[serde(default = "default_features")]
        features: FeatureSpec,
        #[serde(default = "default_features")]
        meta_features: FeatureSpec,
        #[serde(default = "default_samples")]
        samples: String,
    },
    /// Drop uninformative or redundant features.
    FeatureSelect {
        #[serde(default = "default_select_ops")]
        operations: Vec<SelectOp>,
        #[serde(default = "default_features")]
        features: FeatureSpec,
        #[serde(default = "default_samples")]
        samples: String,
        #[serde(default)]
        config: SelectConfig,
    },
    /// Collapse replicates into one consensus signature per group.
    Consensus {
        replicate_columns: Vec<String>,
        #[serde(default = "default_features")]
        features: FeatureSpec,
        #[serde(default)]
        operation: ConsensusOp,
    },
}

fn default_strata() -> Vec<String> {
    vec!["Metadata_Plate".to_string(), "Metadata_Well".to_string()]
}

fn default_features() -> FeatureSpec {
    FeatureSpec::Infer
}

fn default_samples() -> String {
    "all".to_string()
}

fn default_select_ops() -> Vec<SelectOp> {
    vec![
        SelectOp::VarianceThreshold,
        SelectOp::CorrelationThreshold,
        SelectOp::DropNaColumns,
    ]
}

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Steps to execute.
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(ProfileError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ProfileError::from)
    }
}

/// Builder for constructing and running processing pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    name: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            name: "unnamed".to_string(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            name: config.name.clone(),
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Add per-well aggregation over the given strata columns.
    pub fn aggregate(mut self, strata: &[&str], operation: AggregateOp) -> Self {
        self.steps.push(PipelineStep::Aggregate {
            strata: strata.iter().map(|s| s.to_string()).collect(),
            features: FeatureSpec::Infer,
            operation,
            object_counts: false,
        });
        self
    }

    /// Add aggregation that also records per-group object counts.
    pub fn aggregate_with_counts(mut self, strata: &[&str], operation: AggregateOp) -> Self {
        self.steps.push(PipelineStep::Aggregate {
            strata: strata.iter().map(|s| s.to_string()).collect(),
            features: FeatureSpec::Infer,
            operation,
            object_counts: true,
        });
        self
    }

    /// Add a plate-map join with the default well-position columns.
    pub fn annotate(mut self, platemap: impl Into<PathBuf>) -> Self {
        self.steps.push(PipelineStep::Annotate {
            platemap: platemap.into(),
            config: AnnotateConfig::default(),
            external: None,
            external_join: None,
        });
        self
    }

    /// Add normalization fit on every row.
    pub fn normalize(self, method: NormalizeMethod) -> Self {
        self.normalize_against(method, "all")
    }

    /// Add normalization fit on the rows matching a sample query.
    ///
    /// The query is parsed when the pipeline runs, e.g.
    /// `Metadata_treatment == 'control'`.
    pub fn normalize_against(mut self, method: NormalizeMethod, samples: &str) -> Self {
        self.steps.push(PipelineStep::Normalize {
            method,
            features: FeatureSpec::Infer,
            meta_features: FeatureSpec::Infer,
            samples: samples.to_string(),
        });
        self
    }

    /// Add feature selection with the given operations.
    pub fn feature_select(mut self, operations: &[SelectOp]) -> Self {
        self.steps.push(PipelineStep::FeatureSelect {
            operations: operations.to_vec(),
            features: FeatureSpec::Infer,
            samples: "all".to_string(),
            config: SelectConfig::default(),
        });
        self
    }

    /// Add feature selection with the standard operation set
    /// (variance, correlation, and missingness filters).
    pub fn feature_select_default(self) -> Self {
        let ops = default_select_ops();
        self.feature_select(&ops)
    }

    /// Add replicate collapse into consensus signatures.
    pub fn consensus(mut self, replicate_columns: &[&str], operation: ConsensusOp) -> Self {
        self.steps.push(PipelineStep::Consensus {
            replicate_columns: replicate_columns.iter().map(|s| s.to_string()).collect(),
            features: FeatureSpec::Infer,
            operation,
        });
        self
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            steps: self.steps.clone(),
        }
    }

    /// Run the pipeline on a profile source.
    ///
    /// Steps execute in order, each consuming the previous table. A failing
    /// step aborts the run with an error naming the step and its position.
    pub fn run(&self, source: impl Into<ProfileSource>) -> Result<ProfileTable> {
        let mut state = PipelineState::new(source.into().resolve()?);

        for (i, step) in self.steps.iter().enumerate() {
            state = state.apply(step).map_err(|e| {
                ProfileError::Pipeline(format!("Step {} ({:?}) failed: {}", i + 1, step, e))
            })?;
        }

        Ok(state.table)
    }
}

/// Internal state during pipeline execution.
struct PipelineState {
    table: ProfileTable,
}

impl PipelineState {
    fn new(table: ProfileTable) -> Self {
        Self { table }
    }

    fn apply(mut self, step: &PipelineStep) -> Result<Self> {
        match step {
            PipelineStep::Aggregate {
                strata,
                features,
                operation,
                object_counts,
            } => {
                self.table = if *object_counts {
                    aggregate_with_counts(&self.table, strata, features, *operation)?
                } else {
                    aggregate(&self.table, strata, features, *operation)?
                };
            }

            PipelineStep::Annotate {
                platemap,
                config,
                external,
                external_join,
            } => {
                let platemap_table = ProfileTable::from_path(platemap)?;
                self.table = annotate(&self.table, &platemap_table, config)?;
                if let Some(path) = external {
                    let (profile_col, external_col) = external_join.as_ref().ok_or_else(|| {
                        ProfileError::InvalidParameter(
                            "External metadata requires external_join columns".to_string(),
                        )
                    })?;
                    let external_table = ProfileTable::from_path(path)?;
                    self.table = annotate_external(
                        &self.table,
                        &external_table,
                        profile_col,
                        external_col,
                    )?;
                }
            }

            PipelineStep::Normalize {
                method,
                features,
                meta_features,
                samples,
            } => {
                let query = SampleQuery::parse(samples)?;
                self.table = normalize(&self.table, features, meta_features, &query, method)?;
            }

            PipelineStep::FeatureSelect {
                operations,
                features,
                samples,
                config,
            } => {
                let query = SampleQuery::parse(samples)?;
                self.table = feature_select(&self.table, features, &query, operations, config)?;
            }

            PipelineStep::Consensus {
                replicate_columns,
                features,
                operation,
            } => {
                self.table = consensus(&self.table, replicate_columns, features, *operation)?;
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ModzConfig;
    use crate::data::Column;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_profiles() -> ProfileTable {
        let wells = ["A01", "A01", "A02", "A02", "B01", "B01", "B02", "B02"];
        ProfileTable::new(vec![
            Column::text("Metadata_Plate", vec![Some("p1".to_string()); 8]),
            Column::text(
                "Metadata_Well",
                wells.iter().map(|s| Some(s.to_string())).collect(),
            ),
            Column::number(
                "Cells_area",
                vec![10.0, 12.0, 20.0, 22.0, 30.0, 34.0, 40.0, 46.0],
            ),
            Column::number("Cells_const", vec![5.0; 8]),
            Column::number("Nuclei_count", vec![1.0, 3.0, 2.0, 4.0, 3.0, 5.0, 4.0, 6.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder() {
        let pipeline = Pipeline::new()
            .name("standard")
            .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
            .normalize(NormalizeMethod::Standardize)
            .feature_select_default()
            .consensus(&["Metadata_Plate"], ConsensusOp::Median);

        let config = pipeline.to_config(Some("Standard profile pipeline"));
        assert_eq!(config.steps.len(), 4);
        assert_eq!(config.name, "standard");
    }

    #[test]
    fn test_pipeline_run() {
        let result = Pipeline::new()
            .name("per-well")
            .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
            .normalize(NormalizeMethod::Standardize)
            .feature_select(&[SelectOp::VarianceThreshold, SelectOp::DropNaColumns])
            .run(create_test_profiles())
            .unwrap();

        assert_eq!(result.n_rows(), 4);
        assert!(result.has_column("Metadata_Well"));
        assert!(result.has_column("Cells_area"));
        // Constant feature standardizes to a constant and gets dropped
        assert!(!result.has_column("Cells_const"));
    }

    #[test]
    fn test_pipeline_consensus_collapses_plate() {
        let result = Pipeline::new()
            .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
            .consensus(&["Metadata_Plate"], ConsensusOp::Median)
            .run(create_test_profiles())
            .unwrap();

        assert_eq!(result.n_rows(), 1);
        // Well medians 11, 21, 32, 43 collapse to their median
        assert_eq!(result.numeric_column("Cells_area").unwrap(), &[26.5]);
    }

    #[test]
    fn test_pipeline_annotate_step() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "well_position\tgene").unwrap();
        for (well, gene) in [("A01", "TP53"), ("A02", "KRAS"), ("B01", "Ctrl"), ("B02", "EMPTY")] {
            writeln!(file, "{}\t{}", well, gene).unwrap();
        }
        file.flush().unwrap();

        let result = Pipeline::new()
            .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
            .annotate(file.path())
            .run(create_test_profiles())
            .unwrap();

        assert_eq!(result.n_rows(), 4);
        assert!(result.has_column("Metadata_gene"));
        assert!(!result.has_column("Metadata_well_position"));
    }

    #[test]
    fn test_pipeline_error_names_failing_step() {
        let err = Pipeline::new()
            .normalize_against(NormalizeMethod::Standardize, "Metadata_Plate == 'absent'")
            .run(create_test_profiles())
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Step 1"));
        assert!(message.contains("failed"));
    }

    #[test]
    fn test_pipeline_config_yaml() {
        let pipeline = Pipeline::new()
            .name("example")
            .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
            .normalize(NormalizeMethod::Standardize)
            .feature_select_default()
            .consensus(&["Metadata_Plate"], ConsensusOp::Modz(ModzConfig::default()));

        let config = pipeline.to_config(Some("Example profile pipeline"));
        let yaml = config.to_yaml().unwrap();

        // Verify it can be parsed back
        let parsed = PipelineConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.name, "example");
        assert_eq!(parsed.steps.len(), 4);
    }

    #[test]
    fn test_yaml_step_defaults() {
        let yaml = "name: minimal\nsteps:\n  - !Aggregate\n    strata: [Metadata_Plate]\n";
        let config = PipelineConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.steps.len(), 1);
        match &config.steps[0] {
            PipelineStep::Aggregate {
                strata,
                features,
                operation,
                object_counts,
            } => {
                assert_eq!(strata, &["Metadata_Plate".to_string()]);
                assert_eq!(features, &FeatureSpec::Infer);
                assert_eq!(*operation, AggregateOp::Median);
                assert!(!object_counts);
            }
            other => panic!("expected an aggregate step, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_round_trip() {
        let config = PipelineConfig {
            name: "configured".to_string(),
            description: None,
            steps: vec![PipelineStep::Aggregate {
                strata: default_strata(),
                features: FeatureSpec::Infer,
                operation: AggregateOp::Mean,
                object_counts: true,
            }],
        };

        let result = Pipeline::from_config(&config).run(create_test_profiles()).unwrap();
        assert_eq!(result.n_rows(), 4);
        assert!(result.has_column(crate::aggregate::OBJECT_COUNT_COLUMN));
        assert_eq!(
            result.numeric_column(crate::aggregate::OBJECT_COUNT_COLUMN).unwrap(),
            &[2.0, 2.0, 2.0, 2.0]
        );
    }
}
