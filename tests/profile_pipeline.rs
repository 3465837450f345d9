//! Integration tests for the profile processing pipeline.

use cytoprofile::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a synthetic plate with per-site rows and known per-well medians.
fn create_synthetic_plate() -> ProfileTable {
    // 4 wells x 5 sites. Sites within a well step by 0.5, so the well
    // median is base + 1.0.
    // - Cells_AreaShape_Area: varies by well (A wells ~100/110, B wells ~200/220)
    // - Nuclei_Number_Count: exactly 2x the area (perfectly correlated)
    // - Cytoplasm_Intensity_Mean: constant 42 everywhere
    let wells = ["A01", "A02", "B01", "B02"];
    let bases = [100.0, 110.0, 200.0, 220.0];

    let mut plate = Vec::new();
    let mut well = Vec::new();
    let mut area = Vec::new();
    let mut count = Vec::new();
    let mut constant = Vec::new();
    for (w, base) in wells.iter().zip(bases) {
        for site in 0..5 {
            plate.push(Some("plate_1".to_string()));
            well.push(Some((*w).to_string()));
            let a = base + site as f64 * 0.5;
            area.push(a);
            count.push(2.0 * a);
            constant.push(42.0);
        }
    }

    ProfileTable::new(vec![
        Column::text("Metadata_Plate", plate),
        Column::text("Metadata_Well", well),
        Column::number("Cells_AreaShape_Area", area),
        Column::number("Nuclei_Number_Count", count),
        Column::number("Cytoplasm_Intensity_Mean", constant),
    ])
    .unwrap()
}

/// Create a tab-delimited plate map with two genes across the four wells.
fn create_platemap() -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".txt").unwrap();
    writeln!(file, "well_position\tgene\tdose").unwrap();
    writeln!(file, "A01\tKRAS\t1.0").unwrap();
    writeln!(file, "A02\tKRAS\t1.0").unwrap();
    writeln!(file, "B01\tTP53\t2.0").unwrap();
    writeln!(file, "B02\tTP53\t2.0").unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_full_profile_pipeline() {
    let profiles = create_synthetic_plate();
    let platemap = create_platemap();

    let result = Pipeline::new()
        .name("cell-painting-test")
        .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
        .annotate(platemap.path())
        .normalize(NormalizeMethod::Standardize)
        .feature_select_default()
        .run(profiles)
        .unwrap();

    // One profile per well, annotated with the plate map
    assert_eq!(result.n_rows(), 4);
    assert!(result.has_column("Metadata_gene"));
    assert!(result.has_column("Metadata_dose"));
    assert!(result.has_column("Metadata_Plate"));
    assert!(
        !result.has_column("Metadata_well_position"),
        "Join column should be dropped after annotation"
    );

    // The constant feature falls to the variance filter and one of the
    // perfectly correlated pair falls to the correlation filter
    assert!(!result.has_column("Cytoplasm_Intensity_Mean"));
    let survivors: Vec<&str> = result
        .column_names()
        .into_iter()
        .filter(|name| !name.starts_with("Metadata_"))
        .collect();
    assert_eq!(
        survivors.len(),
        1,
        "Exactly one of the correlated pair should survive, got {:?}",
        survivors
    );

    // Standardization fit on all four profiles: the survivor averages to zero
    let values = result.numeric_column(survivors[0]).unwrap();
    let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
    assert!(mean.abs() < 1e-9, "Standardized mean should be ~0, got {}", mean);
}

#[test]
fn test_median_consensus_by_gene() {
    let profiles = create_synthetic_plate();
    let platemap = create_platemap();

    let result = Pipeline::new()
        .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
        .annotate(platemap.path())
        .consensus(&["Metadata_gene"], ConsensusOp::Median)
        .run(profiles)
        .unwrap();

    // Two genes, replicate wells collapsed
    assert_eq!(result.n_rows(), 2);
    let genes: Vec<_> = (0..2)
        .map(|row| result.column("Metadata_gene").unwrap().cell_key(row))
        .collect();
    assert_eq!(genes, vec![Some("KRAS".to_string()), Some("TP53".to_string())]);

    // Well medians are base + 1.0; gene-level median of two wells is their midpoint
    let area = result.numeric_column("Cells_AreaShape_Area").unwrap();
    assert_eq!(area, &[106.0, 211.0]);
    let count = result.numeric_column("Nuclei_Number_Count").unwrap();
    assert_eq!(count, &[212.0, 422.0]);
}

#[test]
fn test_modz_consensus_weights_replicates_equally_when_concordant() {
    let profiles = create_synthetic_plate();
    let platemap = create_platemap();

    let result = Pipeline::new()
        .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
        .annotate(platemap.path())
        .consensus(&["Metadata_gene"], ConsensusOp::Modz(ModzConfig::default()))
        .run(profiles)
        .unwrap();

    // Replicate wells rank features identically, so Spearman weights are
    // 0.5/0.5 and the MODZ signature equals the replicate mean
    assert_eq!(result.n_rows(), 2);
    let area = result.numeric_column("Cells_AreaShape_Area").unwrap();
    assert_eq!(area, &[106.0, 211.0]);
}

#[test]
fn test_yaml_config_round_trip() {
    let profiles = create_synthetic_plate();
    let platemap = create_platemap();

    let pipeline = Pipeline::new()
        .name("round-trip")
        .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
        .annotate(platemap.path())
        .normalize(NormalizeMethod::Standardize)
        .feature_select_default();

    let direct = pipeline.run(profiles.clone()).unwrap();

    let yaml = pipeline.to_config(Some("round trip check")).to_yaml().unwrap();
    let reloaded = PipelineConfig::from_yaml(&yaml).unwrap();
    assert_eq!(reloaded.name, "round-trip");
    assert_eq!(reloaded.steps.len(), 4);

    let replayed = Pipeline::from_config(&reloaded).run(profiles).unwrap();
    assert_eq!(replayed.column_names(), direct.column_names());
    assert_eq!(replayed.n_rows(), direct.n_rows());
    for name in direct.column_names() {
        let a = direct.column(name).unwrap();
        let b = replayed.column(name).unwrap();
        if a.is_numeric() {
            assert_eq!(a.as_numbers().unwrap(), b.as_numbers().unwrap());
        } else {
            for row in 0..direct.n_rows() {
                assert_eq!(a.cell_key(row), b.cell_key(row));
            }
        }
    }
}

#[test]
fn test_pipeline_from_csv_file() {
    let profiles = create_synthetic_plate();

    let temp = NamedTempFile::with_suffix(".csv").unwrap();
    profiles.write_path(temp.path()).unwrap();

    let result = Pipeline::new()
        .aggregate(&["Metadata_Plate", "Metadata_Well"], AggregateOp::Median)
        .run(temp.path())
        .unwrap();

    assert_eq!(result.n_rows(), 4);
    assert_eq!(
        result.column_names(),
        vec![
            "Metadata_Plate",
            "Metadata_Well",
            "Cells_AreaShape_Area",
            "Nuclei_Number_Count",
            "Cytoplasm_Intensity_Mean"
        ]
    );
    let area = result.numeric_column("Cells_AreaShape_Area").unwrap();
    assert_eq!(area, &[101.0, 111.0, 201.0, 221.0]);
}
