//! Row grouping by metadata strata.

use crate::data::ProfileTable;
use crate::error::Result;
use std::collections::BTreeMap;

/// A grouping key: one entry per stratum column, `None` for a missing cell.
pub type GroupKey = Vec<Option<String>>;

/// Partition table rows by the value tuple of the strata columns.
///
/// Groups come back in lexicographic key order, missing values ordering
/// before any present value. Rows with missing strata values form their own
/// group rather than being dropped. Within a group, row indices keep input
/// order.
pub fn group_rows(table: &ProfileTable, strata: &[String]) -> Result<Vec<(GroupKey, Vec<usize>)>> {
    let key_columns = strata
        .iter()
        .map(|s| table.column(s))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for row in 0..table.n_rows() {
        let key: GroupKey = key_columns.iter().map(|c| c.cell_key(row)).collect();
        groups.entry(key).or_default().push(row);
    }
    Ok(groups.into_iter().collect())
}

/// Render a group key for error messages.
pub fn format_key(key: &GroupKey) -> String {
    key.iter()
        .map(|k| k.as_deref().unwrap_or("<missing>"))
        .collect::<Vec<_>>()
        .join("/")
}
