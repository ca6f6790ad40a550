// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Column and table descriptions.
*/

use std::collections::BTreeMap;

use crate::types::{empty_array, CellValue, DataType};

/// The description of one column: its element type, whether it holds scalars
/// or arrays, and free-form keywords such as `UNIT`.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDesc {
    name: String,
    data_type: DataType,
    ndim: usize,
    comment: String,
    keywords: BTreeMap<String, String>,
}

impl ColumnDesc {
    pub fn scalar(name: &str, data_type: DataType, comment: &str) -> Self {
        Self::array(name, data_type, 0, comment)
    }

    /// An array column whose cells have `ndim` dimensions. Cell shapes may
    /// vary from row to row.
    pub fn array(name: &str, data_type: DataType, ndim: usize, comment: &str) -> Self {
        ColumnDesc {
            name: name.to_owned(),
            data_type,
            ndim,
            comment: comment.to_owned(),
            keywords: BTreeMap::new(),
        }
    }

    pub fn with_unit(self, unit: &str) -> Self {
        self.with_keyword("UNIT", unit)
    }

    pub fn with_keyword(mut self, key: &str, value: &str) -> Self {
        self.keywords.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn is_scalar(&self) -> bool {
        self.ndim == 0
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn keywords(&self) -> &BTreeMap<String, String> {
        &self.keywords
    }

    pub fn unit(&self) -> Option<&str> {
        self.keywords.get("UNIT").map(|s| s.as_str())
    }

    /// The value of a cell in a freshly added row.
    pub fn default_cell(&self) -> CellValue {
        match (self.data_type, self.ndim) {
            (DataType::Int, 0) => CellValue::Int(0),
            (DataType::Double, 0) => CellValue::Double(0.),
            (DataType::String, _) => CellValue::String(String::new()),
            (DataType::Int, n) => CellValue::IntArray(empty_array(n)),
            (DataType::Double, n) => CellValue::DoubleArray(empty_array(n)),
        }
    }

    /// Whether a value may be stored in this column.
    pub fn accepts(&self, value: &CellValue) -> bool {
        value.data_type() == self.data_type && value.ndim() == self.ndim
    }

    pub fn describe(&self) -> String {
        match self.ndim {
            0 => format!("scalar {}", self.data_type),
            n => format!("{}-dimensional {}", n, self.data_type),
        }
    }
}

/// An ordered collection of column descriptions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableDesc {
    columns: Vec<ColumnDesc>,
}

impl TableDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. A column with the same name is replaced.
    pub fn with_column(mut self, col: ColumnDesc) -> Self {
        self.add_column(col);
        self
    }

    pub fn add_column(&mut self, col: ColumnDesc) {
        match self.position(col.name()) {
            Some(i) => self.columns[i] = col,
            None => self.columns.push(col),
        }
    }

    pub fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDesc> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_acceptance() {
        let c = ColumnDesc::array("MASKLIST", DataType::Int, 2, "List of mask ranges");
        let d = c.default_cell();
        assert_eq!(d.shape(), &[0, 0]);
        assert!(c.accepts(&d));
        assert!(!c.accepts(&CellValue::Int(0)));

        let t = ColumnDesc::scalar("TIME", DataType::Double, "Time in MJD").with_unit("d");
        assert_eq!(t.unit(), Some("d"));
        assert_eq!(t.default_cell(), CellValue::Double(0.));
    }

    #[test]
    fn replace_on_add() {
        let desc = TableDesc::new()
            .with_column(ColumnDesc::scalar("A", DataType::Int, ""))
            .with_column(ColumnDesc::scalar("B", DataType::Int, ""))
            .with_column(ColumnDesc::scalar("A", DataType::Double, ""));
        assert_eq!(desc.len(), 2);
        assert_eq!(desc.get("A").unwrap().data_type(), DataType::Double);
        assert_eq!(desc.position("B"), Some(1));
    }
}
