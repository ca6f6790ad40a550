// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The table type.
*/

use log::debug;
use ndarray::{ArrayD, Axis, Slice};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::desc::{ColumnDesc, TableDesc};
use crate::errors::{Result, TableError};
use crate::lock::TableLock;
use crate::snapshot;
use crate::types::{ArrayElement, CellData, CellValue};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableOpenMode {
    Read,
    ReadWrite,
}

/// A table of typed columns with table-level string keywords.
///
/// All cells live in memory. A table may be backed by a snapshot directory
/// on disk, in which case `flush()` writes the current contents back; a
/// memory table has no backing and disappears when dropped.
#[derive(Clone, Debug)]
pub struct Table {
    desc: TableDesc,
    n_rows: usize,
    columns: Vec<Vec<CellValue>>,
    keywords: BTreeMap<String, String>,
    path: Option<PathBuf>,
    writable: bool,
}

impl Table {
    /// Create a table with no on-disk backing.
    pub fn new_memory(desc: TableDesc, n_rows: usize) -> Table {
        let columns = desc
            .columns()
            .iter()
            .map(|c| vec![c.default_cell(); n_rows])
            .collect();

        Table {
            desc,
            n_rows,
            columns,
            keywords: BTreeMap::new(),
            path: None,
            writable: true,
        }
    }

    /// Create a new table on disk. Fails if a table already exists at `path`.
    pub fn create<P: AsRef<Path>>(path: P, desc: TableDesc, n_rows: usize) -> Result<Table> {
        let path = path.as_ref();

        if snapshot::is_table_dir(path) {
            return Err(TableError::AlreadyExists(path.to_owned()));
        }

        let mut t = Table::new_memory(desc, n_rows);
        t.path = Some(path.to_owned());
        t.flush()?;
        Ok(t)
    }

    /// Load the table stored at `path`.
    pub fn open<P: AsRef<Path>>(path: P, mode: TableOpenMode) -> Result<Table> {
        let path = path.as_ref();
        debug!("opening table {} ({:?})", path.display(), mode);
        let contents = snapshot::read_snapshot(path)?;

        Ok(Table {
            desc: contents.desc,
            n_rows: contents.n_rows,
            columns: contents.columns,
            keywords: contents.keywords,
            path: Some(path.to_owned()),
            writable: mode == TableOpenMode::ReadWrite,
        })
    }

    /// Copy this table into a writable memory table.
    pub fn to_memory(&self) -> Table {
        let mut t = self.clone();
        t.path = None;
        t.writable = true;
        t
    }

    /// Write a full copy of this table to `dest`, replacing whatever snapshot
    /// may already be there. This table is unaffected.
    pub fn copy_to<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        debug!("copying table to {}", dest.as_ref().display());
        snapshot::write_snapshot(
            dest.as_ref(),
            &self.desc,
            self.n_rows,
            &self.columns,
            &self.keywords,
        )
    }

    /// Write the contents back to the backing snapshot.
    pub fn flush(&mut self) -> Result<()> {
        self.check_writable()?;

        match self.path {
            Some(ref p) => snapshot::write_snapshot(
                p,
                &self.desc,
                self.n_rows,
                &self.columns,
                &self.keywords,
            ),
            None => Err(TableError::NotOnDisk),
        }
    }

    /// Take the advisory lock on the backing snapshot.
    pub fn lock(&self, timeout: Duration) -> Result<TableLock> {
        match self.path {
            Some(ref p) => TableLock::acquire(p, timeout),
            None => Err(TableError::NotOnDisk),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.desc.len()
    }

    pub fn desc(&self) -> &TableDesc {
        &self.desc
    }

    pub fn column_names(&self) -> Vec<String> {
        self.desc.columns().iter().map(|c| c.name().to_owned()).collect()
    }

    pub fn get_col_desc(&self, col_name: &str) -> Result<&ColumnDesc> {
        self.desc
            .get(col_name)
            .ok_or_else(|| TableError::NoSuchColumn(col_name.to_owned()))
    }

    pub fn get_col_keyword(&self, col_name: &str, keyword: &str) -> Result<Option<&str>> {
        Ok(self
            .get_col_desc(col_name)?
            .keywords()
            .get(keyword)
            .map(|s| s.as_str()))
    }

    fn col_index(&self, col_name: &str) -> Result<usize> {
        self.desc
            .position(col_name)
            .ok_or_else(|| TableError::NoSuchColumn(col_name.to_owned()))
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.n_rows {
            Err(TableError::RowOutOfRange {
                row,
                n_rows: self.n_rows,
            })
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(TableError::NotWritable)
        }
    }

    fn mismatch(&self, icol: usize, expected: &str, actual: String) -> TableError {
        TableError::UnexpectedType {
            column: self.desc.columns()[icol].name().to_owned(),
            expected: expected.to_owned(),
            actual,
        }
    }

    fn convert<T: CellData>(&self, icol: usize, cell: &CellValue) -> Result<T> {
        T::from_cell(cell).ok_or_else(|| self.mismatch(icol, T::DESCRIPTION, cell.describe()))
    }

    fn validate(&self, icol: usize, cell: &CellValue) -> Result<()> {
        let cdesc = &self.desc.columns()[icol];

        if cdesc.accepts(cell) {
            Ok(())
        } else {
            Err(self.mismatch(icol, &cdesc.describe(), cell.describe()))
        }
    }

    pub fn get_cell_value(&self, col_name: &str, row: usize) -> Result<&CellValue> {
        let icol = self.col_index(col_name)?;
        self.check_row(row)?;
        Ok(&self.columns[icol][row])
    }

    pub fn get_cell<T: CellData>(&self, col_name: &str, row: usize) -> Result<T> {
        let icol = self.col_index(col_name)?;
        self.check_row(row)?;
        self.convert(icol, &self.columns[icol][row])
    }

    pub fn put_cell<T: CellData>(&mut self, col_name: &str, row: usize, value: T) -> Result<()> {
        self.check_writable()?;
        let icol = self.col_index(col_name)?;
        self.check_row(row)?;
        let cell = value.into_cell();
        self.validate(icol, &cell)?;
        self.columns[icol][row] = cell;
        Ok(())
    }

    pub fn get_col_as_vec<T: CellData>(&self, col_name: &str) -> Result<Vec<T>> {
        self.get_col_range(col_name, 0, None, 1)
    }

    /// Replace a whole column. `values` must have one entry per row.
    pub fn put_col_from_vec<T: CellData>(&mut self, col_name: &str, values: Vec<T>) -> Result<()> {
        if values.len() != self.n_rows {
            return Err(TableError::LengthMismatch {
                expected: self.n_rows,
                actual: values.len(),
            });
        }

        self.put_col_range(col_name, 0, values, 1)
    }

    /// Fetch the cells of rows `start`, `start + incr`, ..., at most `n` of
    /// them, or through the end of the table if `n` is None.
    pub fn get_col_range<T: CellData>(
        &self,
        col_name: &str,
        start: usize,
        n: Option<usize>,
        incr: usize,
    ) -> Result<Vec<T>> {
        let icol = self.col_index(col_name)?;
        let rows = self.row_range(col_name, start, n, incr)?;
        rows.map(|r| self.convert(icol, &self.columns[icol][r]))
            .collect()
    }

    /// Store `values` into rows `start`, `start + incr`, ...
    pub fn put_col_range<T: CellData>(
        &mut self,
        col_name: &str,
        start: usize,
        values: Vec<T>,
        incr: usize,
    ) -> Result<()> {
        self.check_writable()?;
        let icol = self.col_index(col_name)?;
        let rows: Vec<usize> = self
            .row_range(col_name, start, Some(values.len()), incr)?
            .collect();

        if rows.len() != values.len() {
            return Err(TableError::LengthMismatch {
                expected: rows.len(),
                actual: values.len(),
            });
        }

        let cells: Vec<CellValue> = values.into_iter().map(|v| v.into_cell()).collect();

        for cell in &cells {
            self.validate(icol, cell)?;
        }

        for (r, cell) in rows.into_iter().zip(cells) {
            self.columns[icol][r] = cell;
        }

        Ok(())
    }

    fn row_range(
        &self,
        col_name: &str,
        start: usize,
        n: Option<usize>,
        incr: usize,
    ) -> Result<impl Iterator<Item = usize>> {
        if incr == 0 {
            return Err(TableError::BadSlice {
                column: col_name.to_owned(),
                reason: "row increment may not be zero".to_owned(),
            });
        }

        if start > self.n_rows {
            return Err(TableError::RowOutOfRange {
                row: start,
                n_rows: self.n_rows,
            });
        }

        let available = (self.n_rows - start + incr - 1) / incr;
        let n = n.map_or(available, |n| n.min(available));
        Ok((0..n).map(move |i| start + i * incr))
    }

    /// Fetch the part of an array cell between the inclusive corners `blc`
    /// and `trc`, stepping by `incr` along each axis.
    pub fn get_cell_slice<E: ArrayElement>(
        &self,
        col_name: &str,
        row: usize,
        blc: &[usize],
        trc: &[usize],
        incr: &[usize],
    ) -> Result<ArrayD<E>> {
        let icol = self.col_index(col_name)?;
        self.check_row(row)?;
        let cell = &self.columns[icol][row];
        let a = E::array_ref(cell)
            .ok_or_else(|| self.mismatch(icol, "array", cell.describe()))?;

        let mut view = a.view();
        let slices = slice_spec(col_name, a.shape(), blc, trc, incr)?;

        for (ax, s) in slices.into_iter().enumerate() {
            view.slice_axis_inplace(Axis(ax), s);
        }

        Ok(view.to_owned())
    }

    /// Store `value` into the part of an array cell selected as in
    /// `get_cell_slice`. The shape of `value` must match the selection.
    pub fn put_cell_slice<E: ArrayElement>(
        &mut self,
        col_name: &str,
        row: usize,
        value: &ArrayD<E>,
        blc: &[usize],
        trc: &[usize],
        incr: &[usize],
    ) -> Result<()> {
        self.check_writable()?;
        let icol = self.col_index(col_name)?;
        self.check_row(row)?;
        let mismatch = self.mismatch(icol, "array", self.columns[icol][row].describe());
        let a = E::array_mut(&mut self.columns[icol][row]).ok_or(mismatch)?;

        let slices = slice_spec(col_name, a.shape(), blc, trc, incr)?;
        let mut view = a.view_mut();

        for (ax, s) in slices.into_iter().enumerate() {
            view.slice_axis_inplace(Axis(ax), s);
        }

        if view.shape() != value.shape() {
            return Err(TableError::BadSlice {
                column: col_name.to_owned(),
                reason: format!(
                    "selection has shape {:?} but value has shape {:?}",
                    view.shape(),
                    value.shape()
                ),
            });
        }

        view.assign(value);
        Ok(())
    }

    /// Append `n` rows holding default values.
    pub fn add_rows(&mut self, n: usize) -> Result<()> {
        self.check_writable()?;

        for (cdesc, cells) in self.desc.columns().iter().zip(self.columns.iter_mut()) {
            cells.resize(self.n_rows + n, cdesc.default_cell());
        }

        self.n_rows += n;
        Ok(())
    }

    pub fn keyword_names(&self) -> Vec<String> {
        self.keywords.keys().cloned().collect()
    }

    pub fn has_keyword(&self, name: &str) -> bool {
        self.keywords.contains_key(name)
    }

    pub fn get_keyword(&self, name: &str) -> Result<&str> {
        self.keywords
            .get(name)
            .map(|s| s.as_str())
            .ok_or_else(|| TableError::NoSuchKeyword(name.to_owned()))
    }

    pub fn put_keyword(&mut self, name: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.keywords.insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    /// A memory table holding copies of the given rows, in the given order,
    /// along with all table keywords.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Table> {
        for r in rows {
            self.check_row(*r)?;
        }

        let columns = self
            .columns
            .iter()
            .map(|cells| rows.iter().map(|r| cells[*r].clone()).collect())
            .collect();

        Ok(Table {
            desc: self.desc.clone(),
            n_rows: rows.len(),
            columns,
            keywords: self.keywords.clone(),
            path: None,
            writable: true,
        })
    }

    /// A memory table of the rows for which `predicate` returns true.
    pub fn query<F>(&self, mut predicate: F) -> Result<Table>
    where
        F: FnMut(&Table, usize) -> Result<bool>,
    {
        let mut rows = Vec::new();

        for r in 0..self.n_rows {
            if predicate(self, r)? {
                rows.push(r);
            }
        }

        self.select_rows(&rows)
    }
}

fn slice_spec(
    col_name: &str,
    shape: &[usize],
    blc: &[usize],
    trc: &[usize],
    incr: &[usize],
) -> Result<Vec<Slice>> {
    let bad = |reason: String| TableError::BadSlice {
        column: col_name.to_owned(),
        reason,
    };

    if blc.len() != shape.len() || trc.len() != shape.len() || incr.len() != shape.len() {
        return Err(bad(format!(
            "cell is {}-dimensional but slice corners have lengths {}, {}, {}",
            shape.len(),
            blc.len(),
            trc.len(),
            incr.len()
        )));
    }

    let mut slices = Vec::with_capacity(shape.len());

    for ax in 0..shape.len() {
        if blc[ax] > trc[ax] || trc[ax] >= shape[ax] || incr[ax] == 0 {
            return Err(bad(format!(
                "axis {} of length {} cannot be sliced as {}..={} by {}",
                ax, shape[ax], blc[ax], trc[ax], incr[ax]
            )));
        }

        slices.push(Slice::new(
            blc[ax] as isize,
            Some(trc[ax] as isize + 1),
            incr[ax] as isize,
        ));
    }

    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use ndarray::{array, Array2};

    fn desc() -> TableDesc {
        TableDesc::new()
            .with_column(ColumnDesc::scalar("ROW", DataType::Int, "Row number"))
            .with_column(ColumnDesc::scalar("TIME", DataType::Double, "Time").with_unit("d"))
            .with_column(ColumnDesc::scalar("TARGET", DataType::String, "Target name"))
            .with_column(ColumnDesc::array("FLAG", DataType::Int, 2, "Flags"))
    }

    #[test]
    fn cells_and_columns() {
        let mut t = Table::new_memory(desc(), 3);
        t.put_col_from_vec("ROW", vec![10, 11, 12]).unwrap();
        t.put_cell("TARGET", 1, "M100".to_owned()).unwrap();
        assert_eq!(t.get_cell::<i32>("ROW", 2).unwrap(), 12);
        assert_eq!(t.get_cell::<String>("TARGET", 1).unwrap(), "M100");
        assert_eq!(t.get_col_range::<i32>("ROW", 1, None, 1).unwrap(), vec![11, 12]);
        assert_eq!(t.get_col_range::<i32>("ROW", 0, None, 2).unwrap(), vec![10, 12]);
        assert_eq!(t.get_col_keyword("TIME", "UNIT").unwrap(), Some("d"));

        assert!(matches!(
            t.get_cell::<f64>("ROW", 0),
            Err(TableError::UnexpectedType { .. })
        ));
        assert!(matches!(
            t.put_cell("ROW", 0, 1.5f64),
            Err(TableError::UnexpectedType { .. })
        ));
        assert!(matches!(
            t.get_cell::<i32>("ROW", 3),
            Err(TableError::RowOutOfRange { row: 3, n_rows: 3 })
        ));
        assert!(matches!(
            t.get_cell::<i32>("NOPE", 0),
            Err(TableError::NoSuchColumn(_))
        ));
        assert!(matches!(
            t.put_col_from_vec("ROW", vec![1]),
            Err(TableError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn add_rows_fills_defaults() {
        let mut t = Table::new_memory(desc(), 0);
        t.add_rows(2).unwrap();
        t.add_rows(0).unwrap();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.get_cell::<f64>("TIME", 1).unwrap(), 0.);
        assert_eq!(t.get_cell_value("FLAG", 1).unwrap().shape(), &[0, 0]);
    }

    #[test]
    fn cell_slices() {
        let mut t = Table::new_memory(desc(), 1);
        t.put_cell("FLAG", 0, Array2::<i32>::ones((2, 4))).unwrap();

        let online = array![[0], [0]].into_dyn();
        t.put_cell_slice("FLAG", 0, &online, &[0, 3], &[1, 3], &[1, 1])
            .unwrap();

        let got: Array2<i32> = t.get_cell("FLAG", 0).unwrap();
        assert_eq!(got, array![[1, 1, 1, 0], [1, 1, 1, 0]]);

        let sub: ArrayD<i32> = t.get_cell_slice("FLAG", 0, &[1, 2], &[1, 3], &[1, 1]).unwrap();
        assert_eq!(sub, array![[1, 0]].into_dyn());

        assert!(matches!(
            t.get_cell_slice::<i32>("FLAG", 0, &[0, 0], &[2, 0], &[1, 1]),
            Err(TableError::BadSlice { .. })
        ));
        assert!(matches!(
            t.put_cell_slice("FLAG", 0, &online, &[0, 0], &[0, 1], &[1, 1]),
            Err(TableError::BadSlice { .. })
        ));
    }

    #[test]
    fn keywords_and_query() {
        let mut t = Table::new_memory(desc(), 4);
        t.put_col_from_vec("ROW", vec![0, 1, 2, 3]).unwrap();
        t.put_keyword("FILENAME", "uid___A002.ms").unwrap();
        assert!(t.has_keyword("FILENAME"));
        assert!(matches!(t.get_keyword("X"), Err(TableError::NoSuchKeyword(_))));

        let q = t
            .query(|t, r| Ok(t.get_cell::<i32>("ROW", r)? % 2 == 1))
            .unwrap();
        assert_eq!(q.n_rows(), 2);
        assert_eq!(q.get_col_as_vec::<i32>("ROW").unwrap(), vec![1, 3]);
        assert_eq!(q.get_keyword("FILENAME").unwrap(), "uid___A002.ms");
    }

    #[test]
    fn snapshot_roundtrip_and_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("RO");

        let mut t = Table::create(&path, desc(), 2).unwrap();
        t.put_cell("TIME", 1, 58000.25).unwrap();
        t.put_cell("FLAG", 0, array![[1, 0, 1]]).unwrap();
        t.put_keyword("DIRECTION_REF", "J2000").unwrap();
        t.flush().unwrap();

        assert!(matches!(
            Table::create(&path, desc(), 0),
            Err(TableError::AlreadyExists(_))
        ));

        let mut r = Table::open(&path, TableOpenMode::Read).unwrap();
        assert_eq!(r.get_cell::<f64>("TIME", 1).unwrap(), 58000.25);
        assert_eq!(r.get_cell::<Array2<i32>>("FLAG", 0).unwrap(), array![[1, 0, 1]]);
        assert_eq!(r.get_keyword("DIRECTION_REF").unwrap(), "J2000");
        assert_eq!(r.get_col_desc("TIME").unwrap().unit(), Some("d"));
        assert!(matches!(r.put_cell("ROW", 0, 1), Err(TableError::NotWritable)));
        assert!(matches!(r.add_rows(1), Err(TableError::NotWritable)));

        let mut m = r.to_memory();
        m.put_cell("ROW", 0, 7).unwrap();
        assert!(matches!(m.flush(), Err(TableError::NotOnDisk)));

        let copy = dir.path().join("COPY");
        m.copy_to(&copy).unwrap();
        let c = Table::open(&copy, TableOpenMode::ReadWrite).unwrap();
        assert_eq!(c.get_cell::<i32>("ROW", 0).unwrap(), 7);
        assert_eq!(c.n_rows(), 2);
    }
}
