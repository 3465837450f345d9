//! Blocklist filtering: drop features known a priori to be unreliable.

use crate::data::ProfileTable;
use crate::error::Result;
use std::collections::HashSet;
use std::path::Path;

/// Header of the single column expected in a blocklist file.
pub const BLOCKLIST_COLUMN: &str = "blocklist";

/// Intersect the candidate features with a blocklist.
///
/// Blocklisted names absent from the candidates are ignored.
pub fn select_blocklist(features: &[String], blocklist: &[String]) -> Vec<String> {
    let blocked: HashSet<&str> = blocklist.iter().map(String::as_str).collect();
    features
        .iter()
        .filter(|name| blocked.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Load a blocklist file: a one-column table headed `blocklist`.
pub fn load_blocklist<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let table = ProfileTable::from_path(path)?;
    let column = table.column(BLOCKLIST_COLUMN)?;
    Ok((0..table.n_rows()).filter_map(|row| column.cell_key(row)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_intersection_with_candidates() {
        let features = vec![
            "Cells_a".to_string(),
            "Nuclei_b".to_string(),
            "Cytoplasm_c".to_string(),
        ];
        let blocklist = vec!["Nuclei_b".to_string(), "Cells_unknown".to_string()];
        assert_eq!(select_blocklist(&features, &blocklist), vec!["Nuclei_b"]);
    }

    #[test]
    fn test_empty_blocklist_excludes_nothing() {
        let features = vec!["Cells_a".to_string()];
        assert!(select_blocklist(&features, &[]).is_empty());
    }

    #[test]
    fn test_load_blocklist_file() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "blocklist").unwrap();
        writeln!(file, "Nuclei_Correlation_Manders_AGP_DNA").unwrap();
        writeln!(file, "Cells_AreaShape_Zernike_0_0").unwrap();
        file.flush().unwrap();

        let blocklist = load_blocklist(file.path()).unwrap();
        assert_eq!(
            blocklist,
            vec![
                "Nuclei_Correlation_Manders_AGP_DNA",
                "Cells_AreaShape_Zernike_0_0"
            ]
        );
    }

    #[test]
    fn test_load_blocklist_missing_header() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "features").unwrap();
        writeln!(file, "Cells_a").unwrap();
        file.flush().unwrap();

        assert!(load_blocklist(file.path()).is_err());
    }
}
