//! cytoprofile - Cell Painting profile processing CLI
//!
//! Command-line interface for composable morphological profile processing.

use clap::{Parser, Subcommand};
use cytoprofile::aggregate::{aggregate, aggregate_with_counts, AggregateOp};
use cytoprofile::annotate::{annotate, annotate_external, AnnotateConfig};
use cytoprofile::consensus::{consensus, ConsensusOp, ModzConfig};
use cytoprofile::data::{FeatureSpec, ProfileTable, SampleQuery};
use cytoprofile::error::{ProfileError, Result};
use cytoprofile::normalize::{normalize, NormalizeMethod, SpherizeConfig};
use cytoprofile::pipeline::{Pipeline, PipelineConfig};
use cytoprofile::select::{feature_select_with_stats, SelectConfig, SelectOp};
use std::path::{Path, PathBuf};

/// Composable Cell Painting profile processing
#[derive(Parser)]
#[command(name = "cytoprofile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collapse rows into one profile per strata group
    Aggregate {
        /// Input profile CSV (tab-delimited for .tsv/.txt)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Strata columns (comma-separated)
        #[arg(long, default_value = "Metadata_Plate,Metadata_Well")]
        strata: String,

        /// Feature columns: 'infer' or a comma-separated list
        #[arg(long, default_value = "infer")]
        features: String,

        /// Aggregation operation: mean or median
        #[arg(long, default_value = "median")]
        operation: String,

        /// Record per-group row counts in Metadata_Object_Count
        #[arg(long)]
        object_counts: bool,
    },

    /// Join plate-map metadata into profiles
    Annotate {
        /// Input profile CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Plate-map file (tab-delimited for .tsv/.txt)
        #[arg(short, long)]
        platemap: PathBuf,

        /// Plate-map and profile join columns (comma-separated pair)
        #[arg(long, default_value = "Metadata_well_position,Metadata_Well")]
        join_on: String,

        /// Skip recoding plate-map columns with the Metadata_ prefix
        #[arg(long)]
        no_recode: bool,

        /// External metadata file for a second join
        #[arg(long)]
        external: Option<PathBuf>,

        /// Profile and external join columns (comma-separated pair)
        #[arg(long)]
        external_join: Option<String>,
    },

    /// Scale or sphere feature columns
    Normalize {
        /// Input profile CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Normalization method: standardize, robustize, or spherize
        #[arg(long, default_value = "standardize")]
        method: String,

        /// Sphering variant: PCA, ZCA, PCA-cor, or ZCA-cor
        #[arg(long, default_value = "ZCA-cor")]
        spherize_method: String,

        /// Regularization added to each singular value when sphering
        #[arg(long, default_value = "1e-6")]
        spherize_epsilon: f64,

        /// Skip centering before sphering
        #[arg(long)]
        no_center: bool,

        /// Feature columns: 'infer' or a comma-separated list
        #[arg(long, default_value = "infer")]
        features: String,

        /// Metadata columns: 'infer', 'none', or a comma-separated list
        #[arg(long, default_value = "infer")]
        meta_features: String,

        /// Rows to fit on: 'all' or a query like "Metadata_treatment == 'control'"
        #[arg(long, default_value = "all")]
        samples: String,
    },

    /// Drop uninformative or redundant features
    FeatureSelect {
        /// Input profile CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Operations (comma-separated): variance_threshold, correlation_threshold,
        /// drop_na_columns, drop_outliers, blocklist, noise_removal
        #[arg(long, default_value = "variance_threshold,correlation_threshold,drop_na_columns")]
        operations: String,

        /// Feature columns: 'infer' or a comma-separated list
        #[arg(long, default_value = "infer")]
        features: String,

        /// Rows to fit the filters on: 'all' or a query
        #[arg(long, default_value = "all")]
        samples: String,

        /// Minimum second-most-common / most-common value ratio
        #[arg(long, default_value = "0.05")]
        freq_cut: f64,

        /// Minimum distinct-value / row-count ratio
        #[arg(long, default_value = "0.01")]
        unique_cut: f64,

        /// Correlation cutoff for redundant pairs
        #[arg(long, default_value = "0.9")]
        corr_threshold: f64,

        /// Correlation method: pearson, spearman, or kendall
        #[arg(long, default_value = "pearson")]
        corr_method: String,

        /// Maximum tolerated missing fraction per feature
        #[arg(long, default_value = "0.05")]
        na_cutoff: f64,

        /// Maximum tolerated absolute value per feature
        #[arg(long, default_value = "500")]
        outlier_cutoff: f64,

        /// Blocklist file (single 'blocklist' column of feature names)
        #[arg(long)]
        blocklist_file: Option<PathBuf>,

        /// Replicate-group columns for noise removal (comma-separated)
        #[arg(long)]
        noise_groups: Option<String>,

        /// Mean within-group standard deviation cutoff for noise removal
        #[arg(long)]
        noise_cutoff: Option<f64>,

        /// Write the selection summary as JSON
        #[arg(long)]
        stats_file: Option<PathBuf>,
    },

    /// Collapse replicates into consensus signatures
    Consensus {
        /// Input profile CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Replicate-group columns (comma-separated)
        #[arg(long, default_value = "Metadata_Plate,Metadata_Well")]
        replicate_columns: String,

        /// Feature columns: 'infer' or a comma-separated list
        #[arg(long, default_value = "infer")]
        features: String,

        /// Consensus operation: median, mean, or modz
        #[arg(long, default_value = "median")]
        operation: String,

        /// Replicate correlation method for modz
        #[arg(long, default_value = "spearman")]
        modz_method: String,

        /// Weight floor for modz
        #[arg(long, default_value = "0.01")]
        min_weight: f64,

        /// Rounding precision for modz correlations and weights
        #[arg(long, default_value = "4")]
        precision: i32,
    },

    /// Run a pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Input profile CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate an example pipeline configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "pipeline.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Aggregate {
            input,
            output,
            strata,
            features,
            operation,
            object_counts,
        } => cmd_aggregate(&input, &output, &strata, &features, &operation, object_counts),

        Commands::Annotate {
            input,
            output,
            platemap,
            join_on,
            no_recode,
            external,
            external_join,
        } => cmd_annotate(
            &input,
            &output,
            &platemap,
            &join_on,
            no_recode,
            external.as_ref(),
            external_join.as_deref(),
        ),

        Commands::Normalize {
            input,
            output,
            method,
            spherize_method,
            spherize_epsilon,
            no_center,
            features,
            meta_features,
            samples,
        } => cmd_normalize(
            &input,
            &output,
            &method,
            &spherize_method,
            spherize_epsilon,
            no_center,
            &features,
            &meta_features,
            &samples,
        ),

        Commands::FeatureSelect {
            input,
            output,
            operations,
            features,
            samples,
            freq_cut,
            unique_cut,
            corr_threshold,
            corr_method,
            na_cutoff,
            outlier_cutoff,
            blocklist_file,
            noise_groups,
            noise_cutoff,
            stats_file,
        } => cmd_feature_select(
            &input,
            &output,
            &operations,
            &features,
            &samples,
            freq_cut,
            unique_cut,
            corr_threshold,
            &corr_method,
            na_cutoff,
            outlier_cutoff,
            blocklist_file,
            noise_groups.as_deref(),
            noise_cutoff,
            stats_file.as_deref(),
        ),

        Commands::Consensus {
            input,
            output,
            replicate_columns,
            features,
            operation,
            modz_method,
            min_weight,
            precision,
        } => cmd_consensus(
            &input,
            &output,
            &replicate_columns,
            &features,
            &operation,
            &modz_method,
            min_weight,
            precision,
        ),

        Commands::Run {
            config,
            input,
            output,
        } => cmd_run(&config, &input, &output),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Split a comma-delimited flag value into trimmed, non-empty entries.
fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse a feature flag: `infer`, `none`, or an explicit column list.
fn parse_features(s: &str) -> FeatureSpec {
    match s.trim().to_lowercase().as_str() {
        "infer" => FeatureSpec::Infer,
        "none" => FeatureSpec::None,
        _ => FeatureSpec::Explicit(parse_list(s)),
    }
}

/// Parse a two-column join flag value.
fn parse_pair(s: &str, flag: &str) -> Result<(String, String)> {
    let parts = parse_list(s);
    if parts.len() != 2 {
        return Err(ProfileError::InvalidParameter(format!(
            "{} expects two comma-separated column names (got '{}')",
            flag, s
        )));
    }
    Ok((parts[0].clone(), parts[1].clone()))
}

fn load_profiles(path: &PathBuf) -> Result<ProfileTable> {
    eprintln!("Loading profiles from {:?}...", path);
    let table = ProfileTable::from_path(path)?;
    eprintln!("Loaded {} rows x {} columns", table.n_rows(), table.n_columns());
    Ok(table)
}

fn write_output(table: &ProfileTable, path: &PathBuf) -> Result<()> {
    eprintln!(
        "Writing {} rows x {} columns to {:?}...",
        table.n_rows(),
        table.n_columns(),
        path
    );
    table.write_path(path)
}

/// Aggregate profiles per strata group
fn cmd_aggregate(
    input: &PathBuf,
    output: &PathBuf,
    strata_str: &str,
    features_str: &str,
    operation_str: &str,
    object_counts: bool,
) -> Result<()> {
    let table = load_profiles(input)?;

    let strata = parse_list(strata_str);
    let features = parse_features(features_str);
    let operation: AggregateOp = operation_str.parse()?;

    eprintln!("Aggregating by {} ({})...", strata.join(", "), operation);
    let result = if object_counts {
        aggregate_with_counts(&table, &strata, &features, operation)?
    } else {
        aggregate(&table, &strata, &features, operation)?
    };

    write_output(&result, output)
}

/// Annotate profiles with plate-map metadata
fn cmd_annotate(
    input: &PathBuf,
    output: &PathBuf,
    platemap_path: &PathBuf,
    join_on: &str,
    no_recode: bool,
    external: Option<&PathBuf>,
    external_join: Option<&str>,
) -> Result<()> {
    let profiles = load_profiles(input)?;

    eprintln!("Loading plate map from {:?}...", platemap_path);
    let platemap = ProfileTable::from_path(platemap_path)?;

    let config = AnnotateConfig {
        join_on: parse_pair(join_on, "--join-on")?,
        recode_platemap: !no_recode,
    };
    let mut result = annotate(&profiles, &platemap, &config)?;

    if let Some(external_path) = external {
        let pair = external_join.ok_or_else(|| {
            ProfileError::InvalidParameter("--external requires --external-join".to_string())
        })?;
        let (profile_col, external_col) = parse_pair(pair, "--external-join")?;
        eprintln!("Joining external metadata from {:?}...", external_path);
        let external_table = ProfileTable::from_path(external_path)?;
        result = annotate_external(&result, &external_table, &profile_col, &external_col)?;
    }

    write_output(&result, output)
}

/// Normalize feature columns
#[allow(clippy::too_many_arguments)]
fn cmd_normalize(
    input: &PathBuf,
    output: &PathBuf,
    method_str: &str,
    spherize_method: &str,
    spherize_epsilon: f64,
    no_center: bool,
    features_str: &str,
    meta_features_str: &str,
    samples_str: &str,
) -> Result<()> {
    let table = load_profiles(input)?;

    let method = if method_str.eq_ignore_ascii_case("spherize") {
        NormalizeMethod::Spherize(SpherizeConfig {
            method: spherize_method.parse()?,
            center: !no_center,
            epsilon: spherize_epsilon,
        })
    } else {
        method_str.parse()?
    };
    let features = parse_features(features_str);
    let meta_features = parse_features(meta_features_str);
    let samples = SampleQuery::parse(samples_str)?;

    eprintln!("Normalizing ({}) fit on samples: {}", method, samples);
    let result = normalize(&table, &features, &meta_features, &samples, &method)?;

    write_output(&result, output)
}

/// Select informative features
#[allow(clippy::too_many_arguments)]
fn cmd_feature_select(
    input: &PathBuf,
    output: &PathBuf,
    operations_str: &str,
    features_str: &str,
    samples_str: &str,
    freq_cut: f64,
    unique_cut: f64,
    corr_threshold: f64,
    corr_method: &str,
    na_cutoff: f64,
    outlier_cutoff: f64,
    blocklist_file: Option<PathBuf>,
    noise_groups: Option<&str>,
    noise_cutoff: Option<f64>,
    stats_file: Option<&Path>,
) -> Result<()> {
    let table = load_profiles(input)?;

    let operations = parse_list(operations_str)
        .iter()
        .map(|s| s.parse())
        .collect::<Result<Vec<SelectOp>>>()?;
    let features = parse_features(features_str);
    let samples = SampleQuery::parse(samples_str)?;
    let config = SelectConfig {
        freq_cut,
        unique_cut,
        corr_threshold,
        corr_method: corr_method.parse()?,
        na_cutoff,
        outlier_cutoff,
        blocklist: Vec::new(),
        blocklist_file,
        noise_groups: noise_groups.map(parse_list).unwrap_or_default(),
        noise_cutoff,
    };

    eprintln!(
        "Selecting features ({})...",
        operations
            .iter()
            .map(|op| op.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    let (result, stats) = feature_select_with_stats(&table, &features, &samples, &operations, &config)?;
    eprintln!("{}", stats);

    if let Some(path) = stats_file {
        std::fs::write(path, stats.to_json()?)?;
        eprintln!("Wrote selection summary to {:?}", path);
    }

    write_output(&result, output)
}

/// Collapse replicates into consensus signatures
#[allow(clippy::too_many_arguments)]
fn cmd_consensus(
    input: &PathBuf,
    output: &PathBuf,
    replicate_str: &str,
    features_str: &str,
    operation_str: &str,
    modz_method: &str,
    min_weight: f64,
    precision: i32,
) -> Result<()> {
    let table = load_profiles(input)?;

    let replicate_columns = parse_list(replicate_str);
    let features = parse_features(features_str);
    let operation = if operation_str.eq_ignore_ascii_case("modz") {
        ConsensusOp::Modz(ModzConfig {
            method: modz_method.parse()?,
            min_weight,
            precision,
        })
    } else {
        operation_str.parse()?
    };

    eprintln!(
        "Building {} consensus over {}...",
        operation,
        replicate_columns.join(", ")
    );
    let result = consensus(&table, &replicate_columns, &features, operation)?;

    write_output(&result, output)
}

/// Run a pipeline from configuration
fn cmd_run(config_path: &PathBuf, input: &PathBuf, output: &PathBuf) -> Result<()> {
    eprintln!("Loading pipeline configuration from {:?}...", config_path);
    let config_str = std::fs::read_to_string(config_path)?;
    let config = PipelineConfig::from_yaml(&config_str)?;

    eprintln!(
        "Running pipeline '{}' ({} steps) on {:?}...",
        config.name,
        config.steps.len(),
        input
    );
    let result = Pipeline::from_config(&config).run(input.clone())?;

    write_output(&result, output)
}

/// Generate example pipeline configuration
fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let pipeline = Pipeline::new()
        .name("example-profile-pipeline")
        .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
        .normalize(NormalizeMethod::Standardize)
        .feature_select_default()
        .consensus(&["Metadata_Plate"], ConsensusOp::Modz(ModzConfig::default()));

    let config = pipeline.to_config(Some(
        "Example Cell Painting pipeline: per-well aggregation, standardization, \
         feature selection, and MODZ consensus",
    ));
    let yaml = config.to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example pipeline to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
