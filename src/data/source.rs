//! Polymorphic profile input: a path to load or an in-memory table.

use crate::data::ProfileTable;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Input accepted at an operation boundary.
///
/// Resolved exactly once before any transform runs; core transforms are
/// strictly table-to-table.
#[derive(Debug, Clone)]
pub enum ProfileSource {
    Path(PathBuf),
    Table(ProfileTable),
}

impl ProfileSource {
    /// Resolve to an in-memory table, loading from disk when needed.
    pub fn resolve(self) -> Result<ProfileTable> {
        match self {
            ProfileSource::Path(path) => ProfileTable::from_path(path),
            ProfileSource::Table(table) => Ok(table),
        }
    }
}

impl From<ProfileTable> for ProfileSource {
    fn from(table: ProfileTable) -> Self {
        ProfileSource::Table(table)
    }
}

impl From<PathBuf> for ProfileSource {
    fn from(path: PathBuf) -> Self {
        ProfileSource::Path(path)
    }
}

impl From<&Path> for ProfileSource {
    fn from(path: &Path) -> Self {
        ProfileSource::Path(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_resolve_table_passthrough() {
        let table =
            ProfileTable::new(vec![Column::number("Cells_x", vec![1.0, 2.0])]).unwrap();
        let source = ProfileSource::from(table.clone());
        let resolved = source.resolve().unwrap();
        assert_eq!(resolved.n_rows(), table.n_rows());
    }

    #[test]
    fn test_resolve_path_loads_file() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Metadata_well,Cells_x").unwrap();
        writeln!(file, "A01,1.5").unwrap();
        file.flush().unwrap();

        let source = ProfileSource::from(file.path());
        let table = source.resolve().unwrap();
        assert_eq!(table.n_rows(), 1);
        assert!(table.has_column("Cells_x"));
    }

    #[test]
    fn test_resolve_missing_path_fails() {
        let source = ProfileSource::Path(PathBuf::from("/nonexistent/profiles.csv"));
        assert!(source.resolve().is_err());
    }
}
