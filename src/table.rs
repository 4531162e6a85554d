use crate::schema::Schema;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A stored cell. `None` is the null marker used for padding.
pub type Cell = Option<String>;

/// Force a raw row to exactly `width` cells.
///
/// Short rows are right-padded with `None`, long rows truncated, and an empty
/// row becomes a full-width row of `None`. Applying it twice changes nothing.
pub fn reconcile(raw: Vec<String>, width: usize) -> Vec<Cell> {
    let mut row: Vec<Cell> = raw.into_iter().take(width).map(Some).collect();
    row.resize(width, None);
    row
}

/// Text of a cell when it holds something other than whitespace.
pub fn present(cell: &Cell) -> Option<&str> {
    cell.as_deref().filter(|v| !v.trim().is_empty())
}

/// Read-side view of one range: the schema plus shape-reconciled rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// A table with no schema and no rows, as returned for an unreachable
    /// or uninitialized sheet.
    pub fn empty() -> Self {
        Table::default()
    }

    /// Build a table from raw values as returned by the store: the first row
    /// is the schema, every other row is reconciled to its width.
    ///
    /// # Arguments
    /// * `values` - Rows as read from the store, header row first
    ///
    /// # Returns
    /// A table whose rows all have the schema's width. No values yields
    /// [`Table::empty`].
    ///
    /// # Examples
    /// ```
    /// use sheetdesk::table::Table;
    ///
    /// let table = Table::from_values(vec![
    ///     vec!["Name".to_string(), "Topic".to_string()],
    ///     vec!["Sam".to_string(), "Repair".to_string(), "extra".to_string()],
    ///     vec![],
    /// ]);
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.rows()[0].len(), 2);
    /// assert_eq!(table.rows()[1], vec![None, None]);
    /// ```
    pub fn from_values(values: Vec<Vec<String>>) -> Self {
        let mut values = values.into_iter();
        let schema = match values.next() {
            Some(headers) => Schema::new(headers),
            None => return Table::empty(),
        };

        let width = schema.len();
        let rows = values.map(|raw| reconcile(raw, width)).collect();
        Table { schema, rows }
    }

    /// The header row this table was read with.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Data rows, each exactly as wide as the schema.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of data rows (the header row is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at zero-based `row` and `col`, or `None` outside the table.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Every cell of column `index`, or `None` when the schema is narrower.
    pub fn column(&self, index: usize) -> Option<impl Iterator<Item = &Cell> + '_> {
        if index >= self.schema.len() {
            return None;
        }
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// Like [`Table::column`], looked up by exact header text.
    pub fn column_by_name(&self, header: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        self.schema.position(header).and_then(|i| self.column(i))
    }

    /// Non-blank values of a column in order of first appearance.
    pub fn distinct_values(&self, index: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        if let Some(column) = self.column(index) {
            for value in column.filter_map(present) {
                if seen.insert(value) {
                    out.push(value.to_string());
                }
            }
        }
        out
    }

    /// Row `index` as a header → value map. Duplicate headers keep the
    /// right-most value.
    pub fn record(&self, index: usize) -> Option<HashMap<String, Cell>> {
        let row = self.rows.get(index)?;
        Some(
            self.schema
                .headers()
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reconcile_is_total_for_any_length() {
        for width in 0..6 {
            for len in 0..9 {
                let raw: Vec<String> = (0..len).map(|i| format!("v{i}")).collect();
                let row = reconcile(raw, width);
                assert_eq!(row.len(), width, "width {width} len {len}");
                for (i, cell) in row.iter().enumerate() {
                    if i < len {
                        assert_eq!(cell.as_deref(), Some(format!("v{i}").as_str()));
                    } else {
                        assert_eq!(*cell, None);
                    }
                }
            }
        }
    }

    #[test]
    fn reconcile_of_full_width_row_is_unchanged() {
        let once = reconcile(strings(&["a", "b", "c"]), 3);
        let again = reconcile(once.iter().map(|c| c.clone().unwrap_or_default()).collect(), 3);
        assert_eq!(once, again);
    }

    #[test]
    fn blank_line_becomes_null_row() {
        let table = Table::from_values(vec![strings(&["A", "B", "C"]), vec![], strings(&["x"])]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec![None, None, None]);
        assert_eq!(table.rows()[1], vec![Some("x".to_string()), None, None]);
    }

    #[test]
    fn long_rows_are_truncated() {
        let table = Table::from_values(vec![strings(&["A", "B"]), strings(&["1", "2", "3", "4"])]);
        assert_eq!(table.rows()[0].len(), 2);
        assert_eq!(table.cell(0, 1), Some(&Some("2".to_string())));
        assert_eq!(table.cell(0, 2), None);
    }

    #[test]
    fn header_only_sheet_has_schema_and_no_rows() {
        let table = Table::from_values(vec![strings(&["Name", "Topic"])]);
        assert_eq!(table.schema().len(), 2);
        assert!(table.is_empty());
        assert!(Table::from_values(vec![]).schema().is_empty());
    }

    #[test]
    fn columns_by_index_and_name() {
        let table = Table::from_values(vec![
            strings(&["Name", "Topic"]),
            strings(&["Sam", "Repair"]),
            strings(&["Dara"]),
            strings(&["Sam", " "]),
        ]);
        let topics: Vec<_> = table.column_by_name("Topic").unwrap().cloned().collect();
        assert_eq!(topics, vec![Some("Repair".into()), None, Some(" ".into())]);
        assert!(table.column(2).is_none());
        assert_eq!(table.distinct_values(0), vec!["Sam", "Dara"]);
        assert_eq!(table.distinct_values(1), vec!["Repair"]);
        assert!(table.distinct_values(7).is_empty());
    }

    #[test]
    fn record_maps_headers_to_cells() {
        let table = Table::from_values(vec![strings(&["Name", "Topic"]), strings(&["Sam"])]);
        let record = table.record(0).unwrap();
        assert_eq!(record["Name"].as_deref(), Some("Sam"));
        assert_eq!(record["Topic"], None);
        assert!(table.record(1).is_none());
    }
}
