//! Profile tables: named columns of text or numeric data over a fixed row count.

use crate::error::{ProfileError, Result};
use nalgebra::DMatrix;
use std::collections::HashSet;
use std::path::Path;

/// Values stored in a single table column.
///
/// Numeric columns use `NaN` to encode missing cells; text columns use `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Number(Vec<f64>),
}

impl ColumnData {
    /// Number of cells in the column.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Number(v) => v.len(),
        }
    }

    /// Check if the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if this column holds numeric data.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Number(_))
    }
}

/// A named column of a profile table.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a text column.
    pub fn text(name: &str, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.to_string(),
            data: ColumnData::Text(values),
        }
    }

    /// Create a numeric column.
    pub fn number(name: &str, values: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            data: ColumnData::Number(values),
        }
    }

    /// Copy of this column under a different name.
    pub fn renamed(&self, name: &str) -> Column {
        Column {
            name: name.to_string(),
            data: self.data.clone(),
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying data.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if this column holds numeric data.
    pub fn is_numeric(&self) -> bool {
        self.data.is_numeric()
    }

    /// Numeric values of this column, or an error for text columns.
    pub fn as_numbers(&self) -> Result<&[f64]> {
        match &self.data {
            ColumnData::Number(v) => Ok(v),
            ColumnData::Text(_) => Err(ProfileError::NonNumericColumn {
                column: self.name.clone(),
                reason: "text column".to_string(),
            }),
        }
    }

    /// Canonical string form of a cell, used for grouping and join keys.
    ///
    /// Missing cells (empty text, numeric NaN) map to `None`. Integral floats
    /// render without a fractional part so `2.0` and `"2"` key identically.
    pub fn cell_key(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Text(v) => v[row].clone(),
            ColumnData::Number(v) => {
                let x = v[row];
                if x.is_nan() {
                    None
                } else {
                    Some(format!("{}", x))
                }
            }
        }
    }

    fn subset(&self, rows: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
            ColumnData::Number(v) => ColumnData::Number(rows.iter().map(|&r| v[r]).collect()),
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }

    fn subset_missing(&self, rows: &[Option<usize>]) -> Column {
        let data = match &self.data {
            ColumnData::Text(v) => {
                ColumnData::Text(rows.iter().map(|r| r.and_then(|r| v[r].clone())).collect())
            }
            ColumnData::Number(v) => {
                ColumnData::Number(rows.iter().map(|r| r.map_or(f64::NAN, |r| v[r])).collect())
            }
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }
}

/// A row-oriented profile table with named, typed columns.
///
/// Each row is one observation (a well, a single cell, or a consensus
/// signature). Columns partition into metadata columns (identified by the
/// `Metadata_` prefix) and numeric feature columns; the table itself does not
/// enforce the partition, which is resolved in [`crate::data::features`].
#[derive(Debug, Clone)]
pub struct ProfileTable {
    columns: Vec<Column>,
    n_rows: usize,
}

impl ProfileTable {
    /// Create a table from columns, validating equal lengths and unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ProfileError::EmptyData("Table has no columns".to_string()));
        }
        let n_rows = columns[0].len();
        for col in &columns {
            if col.len() != n_rows {
                return Err(ProfileError::DimensionMismatch {
                    expected: n_rows,
                    actual: col.len(),
                });
            }
        }
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name().to_string()) {
                return Err(ProfileError::InvalidParameter(format!(
                    "Duplicate column name '{}'",
                    col.name()
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// All columns in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name() == name)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| ProfileError::MissingColumn(name.to_string()))
    }

    /// Numeric values of a column by name.
    pub fn numeric_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name)?.as_numbers()
    }

    /// New table containing the named columns, in the given order.
    pub fn select_columns(&self, names: &[String]) -> Result<ProfileTable> {
        let columns = names
            .iter()
            .map(|n| self.column(n).cloned())
            .collect::<Result<Vec<_>>>()?;
        ProfileTable::new(columns)
    }

    /// New table with the named columns removed; other columns keep their order.
    pub fn drop_columns(&self, names: &[String]) -> Result<ProfileTable> {
        let drop: HashSet<&str> = names.iter().map(|s| s.as_str()).collect();
        let columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| !drop.contains(c.name()))
            .cloned()
            .collect();
        ProfileTable::new(columns)
    }

    /// New table containing only the given rows, in the given order.
    pub fn subset_rows(&self, rows: &[usize]) -> Result<ProfileTable> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(ProfileError::InvalidParameter(format!(
                "Row index {} out of bounds ({} rows)",
                bad, self.n_rows
            )));
        }
        let columns = self.columns.iter().map(|c| c.subset(rows)).collect();
        ProfileTable::new(columns)
    }

    /// Replace the values of an existing numeric column, preserving its position.
    pub fn with_numeric_column(mut self, name: &str, values: Vec<f64>) -> Result<ProfileTable> {
        if values.len() != self.n_rows {
            return Err(ProfileError::DimensionMismatch {
                expected: self.n_rows,
                actual: values.len(),
            });
        }
        let col = self
            .columns
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| ProfileError::MissingColumn(name.to_string()))?;
        col.data = ColumnData::Number(values);
        Ok(self)
    }

    /// Dense rows × features matrix of the named numeric columns.
    pub fn numeric_matrix(&self, features: &[String]) -> Result<DMatrix<f64>> {
        let mut mat = DMatrix::zeros(self.n_rows, features.len());
        for (j, name) in features.iter().enumerate() {
            let values = self.numeric_column(name)?;
            for (i, &v) in values.iter().enumerate() {
                mat[(i, j)] = v;
            }
        }
        Ok(mat)
    }

    /// Inner join with another table on a pair of key columns.
    ///
    /// Output columns are `self`'s columns followed by `right`'s; both key
    /// columns are kept. Row order follows `self`, expanding each row by its
    /// matches in `right`'s order. Missing keys match other missing keys.
    pub fn inner_join(
        &self,
        right: &ProfileTable,
        left_on: &str,
        right_on: &str,
    ) -> Result<ProfileTable> {
        let left_key = self.column(left_on)?;
        let right_key = right.column(right_on)?;

        for col in right.columns() {
            if col.name() != right_on && self.has_column(col.name()) {
                return Err(ProfileError::InvalidParameter(format!(
                    "Join would duplicate column '{}'",
                    col.name()
                )));
            }
        }

        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for li in 0..self.n_rows {
            let lk = left_key.cell_key(li);
            for ri in 0..right.n_rows {
                if lk == right_key.cell_key(ri) {
                    left_rows.push(li);
                    right_rows.push(ri);
                }
            }
        }

        let mut columns: Vec<Column> = self.columns.iter().map(|c| c.subset(&left_rows)).collect();
        columns.extend(right.columns.iter().map(|c| c.subset(&right_rows)));
        ProfileTable::new(columns)
    }

    /// Left join with another table on a pair of key columns.
    ///
    /// Like [`ProfileTable::inner_join`] but left rows without a match are
    /// kept, with the right-hand columns filled in as missing.
    pub fn left_join(
        &self,
        right: &ProfileTable,
        left_on: &str,
        right_on: &str,
    ) -> Result<ProfileTable> {
        let left_key = self.column(left_on)?;
        let right_key = right.column(right_on)?;

        for col in right.columns() {
            if col.name() != right_on && self.has_column(col.name()) {
                return Err(ProfileError::InvalidParameter(format!(
                    "Join would duplicate column '{}'",
                    col.name()
                )));
            }
        }

        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        for li in 0..self.n_rows {
            let lk = left_key.cell_key(li);
            let mut matched = false;
            for ri in 0..right.n_rows {
                if lk == right_key.cell_key(ri) {
                    left_rows.push(li);
                    right_rows.push(Some(ri));
                    matched = true;
                }
            }
            if !matched {
                left_rows.push(li);
                right_rows.push(None);
            }
        }

        let mut columns: Vec<Column> = self.columns.iter().map(|c| c.subset(&left_rows)).collect();
        columns.extend(right.columns.iter().map(|c| c.subset_missing(&right_rows)));
        ProfileTable::new(columns)
    }

    /// Load a table from a CSV file (tab-delimited for `.tsv`/`.txt`).
    ///
    /// Column types are inferred: a column is numeric when every non-missing
    /// cell parses as a float. Empty cells, `NA`, and `NaN` are missing.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ProfileError::FileNotFound(path.display().to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_for(path))
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() {
            return Err(ProfileError::EmptyData(
                "Profile file has no header".to_string(),
            ));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (j, field) in record.iter().enumerate() {
                if j < headers.len() {
                    cells[j].push(field.to_string());
                }
            }
            for column in cells.iter_mut().skip(record.len()) {
                column.push(String::new());
            }
        }

        if cells[0].is_empty() {
            return Err(ProfileError::EmptyData(
                "Profile file has no data rows".to_string(),
            ));
        }

        let columns = headers
            .iter()
            .zip(cells.iter())
            .map(|(name, values)| infer_column(name, values))
            .collect();
        ProfileTable::new(columns)
    }

    /// Write the table as CSV (tab-delimited for `.tsv`/`.txt`).
    ///
    /// Missing cells are written empty.
    pub fn write_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter_for(path))
            .from_path(path)?;

        writer.write_record(self.column_names())?;
        for row in 0..self.n_rows {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.cell_key(row).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    }
}

fn is_missing(raw: &str) -> bool {
    let v = raw.trim();
    v.is_empty() || v == "NA" || v == "na" || v == "NaN" || v == "nan"
}

fn infer_column(name: &str, values: &[String]) -> Column {
    let all_numeric = values
        .iter()
        .all(|v| is_missing(v) || v.trim().parse::<f64>().is_ok());
    if all_numeric {
        let parsed = values
            .iter()
            .map(|v| {
                if is_missing(v) {
                    f64::NAN
                } else {
                    v.trim().parse::<f64>().unwrap_or(f64::NAN)
                }
            })
            .collect();
        Column::number(name, parsed)
    } else {
        let parsed = values
            .iter()
            .map(|v| {
                if is_missing(v) {
                    None
                } else {
                    Some(v.trim().to_string())
                }
            })
            .collect();
        Column::text(name, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_table() -> ProfileTable {
        ProfileTable::new(vec![
            Column::text(
                "Metadata_plate",
                vec![
                    Some("a".into()),
                    Some("a".into()),
                    Some("b".into()),
                    Some("b".into()),
                ],
            ),
            Column::number("Cells_x", vec![1.0, 2.0, 8.0, 2.0]),
            Column::number("Nuclei_y", vec![5.0, f64::NAN, 3.0, 1.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let table = create_test_table();
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.n_columns(), 3);
        assert_eq!(
            table.column_names(),
            vec!["Metadata_plate", "Cells_x", "Nuclei_y"]
        );
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = ProfileTable::new(vec![
            Column::number("a", vec![1.0, 2.0]),
            Column::number("b", vec![1.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ProfileTable::new(vec![
            Column::number("a", vec![1.0]),
            Column::number("a", vec![2.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_column_access() {
        let table = create_test_table();
        let values = table.numeric_column("Cells_x").unwrap();
        assert_eq!(values, &[1.0, 2.0, 8.0, 2.0]);

        assert!(table.numeric_column("Metadata_plate").is_err());
        assert!(table.column("absent").is_err());
    }

    #[test]
    fn test_select_and_drop_columns() {
        let table = create_test_table();

        let selected = table
            .select_columns(&["Nuclei_y".to_string(), "Cells_x".to_string()])
            .unwrap();
        assert_eq!(selected.column_names(), vec!["Nuclei_y", "Cells_x"]);

        let dropped = table.drop_columns(&["Nuclei_y".to_string()]).unwrap();
        assert_eq!(dropped.column_names(), vec!["Metadata_plate", "Cells_x"]);
        assert_eq!(dropped.n_rows(), 4);
    }

    #[test]
    fn test_subset_rows() {
        let table = create_test_table();
        let subset = table.subset_rows(&[2, 0]).unwrap();
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(subset.numeric_column("Cells_x").unwrap(), &[8.0, 1.0]);
        assert_eq!(
            subset.column("Metadata_plate").unwrap().cell_key(0),
            Some("b".to_string())
        );

        assert!(table.subset_rows(&[9]).is_err());
    }

    #[test]
    fn test_numeric_matrix() {
        let table = create_test_table();
        let mat = table
            .numeric_matrix(&["Cells_x".to_string(), "Nuclei_y".to_string()])
            .unwrap();
        assert_eq!(mat.nrows(), 4);
        assert_eq!(mat.ncols(), 2);
        assert_eq!(mat[(2, 0)], 8.0);
        assert!(mat[(1, 1)].is_nan());
    }

    #[test]
    fn test_cell_key_formats_integral_floats() {
        let col = Column::number("x", vec![2.0, 2.5, f64::NAN]);
        assert_eq!(col.cell_key(0), Some("2".to_string()));
        assert_eq!(col.cell_key(1), Some("2.5".to_string()));
        assert_eq!(col.cell_key(2), None);
    }

    #[test]
    fn test_csv_type_inference() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Metadata_well,Cells_a,Cells_b").unwrap();
        writeln!(file, "A01,1.5,3").unwrap();
        writeln!(file, "A02,,4").unwrap();
        writeln!(file, "A03,2.5,NA").unwrap();
        file.flush().unwrap();

        let table = ProfileTable::from_path(file.path()).unwrap();
        assert!(!table.column("Metadata_well").unwrap().is_numeric());
        assert!(table.column("Cells_a").unwrap().is_numeric());

        let a = table.numeric_column("Cells_a").unwrap();
        assert_eq!(a[0], 1.5);
        assert!(a[1].is_nan());

        let b = table.numeric_column("Cells_b").unwrap();
        assert!(b[2].is_nan());
    }

    #[test]
    fn test_missing_file() {
        let err = ProfileTable::from_path("/nonexistent/profiles.csv").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_csv_roundtrip() {
        let table = create_test_table();
        let file = NamedTempFile::with_suffix(".csv").unwrap();
        table.write_path(file.path()).unwrap();

        let loaded = ProfileTable::from_path(file.path()).unwrap();
        assert_eq!(loaded.n_rows(), table.n_rows());
        assert_eq!(loaded.column_names(), table.column_names());
        assert_eq!(
            loaded.numeric_column("Cells_x").unwrap(),
            table.numeric_column("Cells_x").unwrap()
        );
        assert!(loaded.numeric_column("Nuclei_y").unwrap()[1].is_nan());
    }

    #[test]
    fn test_tsv_delimiter() {
        let mut file = NamedTempFile::with_suffix(".tsv").unwrap();
        writeln!(file, "well_position\tgene").unwrap();
        writeln!(file, "A01\tTP53").unwrap();
        file.flush().unwrap();

        let table = ProfileTable::from_path(file.path()).unwrap();
        assert_eq!(table.column_names(), vec!["well_position", "gene"]);
        assert_eq!(
            table.column("gene").unwrap().cell_key(0),
            Some("TP53".to_string())
        );
    }

    #[test]
    fn test_inner_join() {
        let profiles = ProfileTable::new(vec![
            Column::text(
                "Metadata_Well",
                vec![Some("A01".into()), Some("A02".into()), Some("A03".into())],
            ),
            Column::number("Cells_x", vec![1.0, 2.0, 3.0]),
        ])
        .unwrap();
        let platemap = ProfileTable::new(vec![
            Column::text(
                "Metadata_well_position",
                vec![Some("A02".into()), Some("A01".into())],
            ),
            Column::text(
                "Metadata_gene",
                vec![Some("TP53".into()), Some("EGFR".into())],
            ),
        ])
        .unwrap();

        let joined = platemap
            .inner_join(&profiles, "Metadata_well_position", "Metadata_Well")
            .unwrap();
        assert_eq!(joined.n_rows(), 2);
        // Left (platemap) row order preserved
        assert_eq!(
            joined.column("Metadata_gene").unwrap().cell_key(0),
            Some("TP53".to_string())
        );
        assert_eq!(
            joined.column("Metadata_Well").unwrap().cell_key(0),
            Some("A02".to_string())
        );
        assert_eq!(joined.numeric_column("Cells_x").unwrap(), &[2.0, 1.0]);
    }

    #[test]
    fn test_with_numeric_column() {
        let table = create_test_table();
        let updated = table
            .with_numeric_column("Cells_x", vec![0.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(
            updated.numeric_column("Cells_x").unwrap(),
            &[0.0, 0.0, 0.0, 0.0]
        );
        // Position preserved
        assert_eq!(updated.column_names()[1], "Cells_x");
    }
}
