// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The data table: two column stores presented as one row store.

A `DataTable` owns an in-memory working copy of its read-only and read-write
stores. Nothing touches the disk except `import_from()`, `export_to()` and
`sync()`; a snapshot on disk is a directory holding the two stores as the
subdirectories `RO` and `RW`.

Every column access goes through a capability-tagged handle. Columns of the
read-only store can never be written through the public accessors; columns
of the read-write store can be written unless the table was opened with
`OpenMode::ReadOnly`.

*/

use log::{debug, info};
use ndarray::{Array2, ArrayD};
use sdindex_coltable::{ArrayElement, CellData, CellValue, Table, TableError, TableOpenMode};
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::columns::{self, MaskRange};
use crate::errors::{DataTableError, Result};
use crate::keyword::KeywordValue;
use crate::schema::{self, ColumnAccess, ColumnKind, Observation, Store};

pub const RO_TABLE_NAME: &str = "RO";
pub const RW_TABLE_NAME: &str = "RW";

/// The RO-store keyword naming the celestial frame of the pointing columns.
pub const DIRECTION_REF_KEY: &str = "DIRECTION_REF";

/// The path of the read-only store within the snapshot at `snapshot`.
pub fn ro_table_path<P: AsRef<Path>>(snapshot: P) -> PathBuf {
    snapshot.as_ref().join(RO_TABLE_NAME)
}

/// The path of the read-write store within the snapshot at `snapshot`.
pub fn rw_table_path<P: AsRef<Path>>(snapshot: P) -> PathBuf {
    snapshot.as_ref().join(RW_TABLE_NAME)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
    /// No column, keyword or row count may be changed.
    ReadOnly,

    /// Read-write columns and keywords may be changed.
    ReadWrite,
}

#[derive(Clone, Copy, Debug)]
struct ColumnHandle {
    store: Store,
    kind: ColumnKind,
    access: ColumnAccess,
}

fn column_handles(mode: OpenMode) -> BTreeMap<&'static str, ColumnHandle> {
    let rw_access = match mode {
        OpenMode::ReadOnly => ColumnAccess::ReadOnly,
        OpenMode::ReadWrite => ColumnAccess::ReadWrite,
    };

    let ro = schema::RO_COLUMNS.iter().map(|name| {
        (
            *name,
            ColumnHandle {
                store: Store::Ro,
                kind: schema::kind_of(name),
                access: ColumnAccess::ReadOnly,
            },
        )
    });

    let rw = schema::RW_COLUMNS.iter().map(|name| {
        (
            *name,
            ColumnHandle {
                store: Store::Rw,
                kind: schema::kind_of(name),
                access: rw_access,
            },
        )
    });

    ro.chain(rw).collect()
}

#[derive(Debug)]
pub struct DataTable {
    ro: Table,
    rw: Table,
    columns: BTreeMap<&'static str, ColumnHandle>,
    mode: OpenMode,
    plain_path: Option<PathBuf>,
}

impl Default for DataTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DataTable {
    /// A new, empty, writable table that is not associated with any
    /// snapshot.
    pub fn new() -> DataTable {
        Self::empty(OpenMode::ReadWrite)
    }

    fn empty(mode: OpenMode) -> DataTable {
        DataTable {
            ro: Table::new_memory(schema::ro_table_desc(), 0),
            rw: Table::new_memory(schema::rw_table_desc(), 0),
            columns: column_handles(mode),
            mode,
            plain_path: None,
        }
    }

    /// Open the data table snapshot at `path`.
    ///
    /// An empty path gives a fresh table. A path that does not exist gives a
    /// fresh table that remembers the path, so that a later `export_to(None,
    /// ..)` writes there. Otherwise the snapshot is imported.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<DataTable> {
        let path = path.as_ref();
        let mut dt = Self::empty(mode);

        if path.as_os_str().is_empty() {
            return Ok(dt);
        }

        if !path.exists() {
            dt.plain_path = Some(std::path::absolute(path)?);
            return Ok(dt);
        }

        dt.import_from(path, false)?;
        Ok(dt)
    }

    /// Replace the working copy with the contents of the snapshot at
    /// `path`.
    ///
    /// If `minimal` is true and `path` is the snapshot this table is
    /// already associated with, the read-only store is not re-read.
    pub fn import_from<P: AsRef<Path>>(&mut self, path: P, minimal: bool) -> Result<()> {
        let abspath = std::path::absolute(path.as_ref())?;
        debug!("importing data table from {}", abspath.display());

        let rw = Table::open(rw_table_path(&abspath), TableOpenMode::Read)?.to_memory();

        let ro = if minimal && self.plain_path.as_deref() == Some(abspath.as_path()) {
            None
        } else {
            Some(Table::open(ro_table_path(&abspath), TableOpenMode::Read)?.to_memory())
        };

        let ro_rows = ro.as_ref().map_or(self.ro.n_rows(), |t| t.n_rows());

        if ro_rows != rw.n_rows() {
            return Err(DataTableError::InternalConsistency(format!(
                "snapshot {} has {} read-only rows but {} read-write rows",
                abspath.display(),
                ro_rows,
                rw.n_rows()
            )));
        }

        if let Some(ro) = ro {
            self.ro = ro;
        }

        self.rw = rw;
        self.plain_path = Some(abspath);
        Ok(())
    }

    /// Re-read the snapshot this table is associated with.
    pub fn sync(&mut self, minimal: bool) -> Result<()> {
        let path = self.plain_path.clone().ok_or(DataTableError::NoSnapshotPath)?;
        self.import_from(path, minimal)
    }

    /// Write the working copy out as a snapshot.
    ///
    /// With `path` of None, the snapshot this table is associated with is
    /// overwritten. An existing snapshot at an explicit `path` is only
    /// replaced if `overwrite` is true. If `minimal` is true and the target
    /// already has a read-only store, that store is left alone.
    pub fn export_to(&mut self, path: Option<&Path>, minimal: bool, overwrite: bool) -> Result<()> {
        let (target, overwrite) = match path {
            Some(p) if !p.as_os_str().is_empty() => (std::path::absolute(p)?, overwrite),
            _ => match self.plain_path {
                Some(ref p) => (p.clone(), true),
                None => return Err(DataTableError::NoSnapshotPath),
            },
        };

        debug!("exporting data table to {}", target.display());

        if !target.exists() {
            fs::create_dir_all(&target)?;
        } else if overwrite {
            debug!("overwriting existing data table {}", target.display());
        } else {
            return Err(DataTableError::AlreadyExists(target));
        }

        let ro_target = ro_table_path(&target);

        if !minimal || !ro_target.exists() {
            self.ro.copy_to(&ro_target)?;
        }

        self.rw.copy_to(rw_table_path(&target))?;
        self.plain_path = Some(target);
        Ok(())
    }

    /// Discard the working copy.
    pub fn close(self) {}

    /// The snapshot this table is associated with, if any.
    pub fn name(&self) -> Option<&Path> {
        self.plain_path.as_deref()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn row_count(&self) -> usize {
        self.ro.n_rows()
    }

    /// The row counts of the read-only and read-write stores. They are
    /// always equal.
    pub fn store_row_counts(&self) -> (usize, usize) {
        (self.ro.n_rows(), self.rw.n_rows())
    }

    pub fn ro_table(&self) -> &Table {
        &self.ro
    }

    pub fn rw_table(&self) -> &Table {
        &self.rw
    }

    fn check_mutable(&self, what: &str) -> Result<()> {
        match self.mode {
            OpenMode::ReadOnly => Err(DataTableError::ReadOnlyViolation(what.to_owned())),
            OpenMode::ReadWrite => Ok(()),
        }
    }

    /// Append `n` rows to both stores.
    ///
    /// The read-write columns with a fixed encoding are initialized: empty
    /// mask list, unset NOCHANGE and no position group. Columns whose shape
    /// depends on the number of polarizations are left empty; use
    /// `append_observations()` to get fully initialized rows.
    pub fn addrows(&mut self, n: usize) -> Result<()> {
        self.check_mutable("data table")?;
        let start = self.row_count();
        self.ro.add_rows(n)?;
        self.rw.add_rows(n)?;

        for row in start..start + n {
            self.init_rw_row(row, None)?;
        }

        Ok(())
    }

    fn init_rw_row(&mut self, row: usize, npol: Option<usize>) -> Result<()> {
        if let Some(npol) = npol {
            self.rw.put_cell(
                schema::STATISTICS,
                row,
                Array2::<f64>::zeros((npol, schema::NUM_STATISTICS)),
            )?;
            self.rw.put_cell(
                schema::FLAG,
                row,
                Array2::<i32>::ones((npol, schema::NUM_STATISTICS)),
            )?;
            self.rw.put_cell(
                schema::FLAG_PERMANENT,
                row,
                Array2::<i32>::ones((npol, schema::NUM_PERMANENT_FLAGS)),
            )?;
            self.rw.put_cell(schema::FLAG_SUMMARY, row, vec![1i32; npol])?;
        }

        self.rw.put_cell(schema::NMASK, row, 0)?;
        self.rw.put_cell(schema::MASKLIST, row, columns::encode_mask_list(&[]))?;
        self.rw.put_cell(schema::NOCHANGE, row, columns::NOCHANGE_UNSET)?;
        self.rw.put_cell(schema::POSGRP, row, -1)?;
        Ok(())
    }

    /// Append one row per observation, filling in the read-only store and
    /// initializing the read-write store: statistics zero, all flags valid,
    /// empty mask list, NOCHANGE unset, no position group.
    ///
    /// Returns the range of the new rows.
    pub fn append_observations(&mut self, obs: &[Observation]) -> Result<Range<usize>> {
        self.check_mutable("data table")?;

        for o in obs {
            if o.npol < 0 {
                return Err(DataTableError::InvalidValue {
                    column: schema::NPOL.to_owned(),
                    reason: format!("polarization count may not be negative (got {})", o.npol),
                });
            }
        }

        let start = self.row_count();
        self.ro.add_rows(obs.len())?;
        self.rw.add_rows(obs.len())?;

        for (i, o) in obs.iter().enumerate() {
            let r = start + i;
            let ro = &mut self.ro;
            ro.put_cell(schema::ROW, r, o.row)?;
            ro.put_cell(schema::SCAN, r, o.scan)?;
            ro.put_cell(schema::IF, r, o.spw)?;
            ro.put_cell(schema::NPOL, r, o.npol)?;
            ro.put_cell(schema::BEAM, r, o.beam)?;
            ro.put_cell(schema::DATE, r, o.date.clone())?;
            ro.put_cell(schema::TIME, r, o.time)?;
            ro.put_cell(schema::ELAPSED, r, o.elapsed)?;
            ro.put_cell(schema::EXPOSURE, r, o.exposure)?;
            ro.put_cell(schema::RA, r, o.ra)?;
            ro.put_cell(schema::DEC, r, o.dec)?;
            ro.put_cell(schema::SHIFT_RA, r, o.shift_ra)?;
            ro.put_cell(schema::SHIFT_DEC, r, o.shift_dec)?;
            ro.put_cell(schema::OFS_RA, r, o.ofs_ra)?;
            ro.put_cell(schema::OFS_DEC, r, o.ofs_dec)?;
            ro.put_cell(schema::AZ, r, o.az)?;
            ro.put_cell(schema::EL, r, o.el)?;
            ro.put_cell(schema::NCHAN, r, o.nchan)?;
            ro.put_cell(schema::TSYS, r, o.tsys.clone())?;
            ro.put_cell(schema::TARGET, r, o.target.clone())?;
            ro.put_cell(schema::ANTENNA, r, o.antenna)?;
            ro.put_cell(schema::SRCTYPE, r, o.srctype)?;
            ro.put_cell(schema::FIELD_ID, r, o.field_id)?;
            self.init_rw_row(r, Some(o.npol as usize))?;
        }

        info!("appended {} rows to the data table", obs.len());
        Ok(start..start + obs.len())
    }

    /// Names of all columns, read-only store first.
    pub fn column_names(&self) -> Vec<&'static str> {
        schema::RO_COLUMNS
            .iter()
            .chain(schema::RW_COLUMNS.iter())
            .copied()
            .collect()
    }

    pub fn column_access(&self, name: &str) -> Result<ColumnAccess> {
        Ok(self.handle(name)?.access)
    }

    fn handle(&self, name: &str) -> Result<ColumnHandle> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| TableError::NoSuchColumn(name.to_owned()).into())
    }

    fn writable_handle(&self, name: &str) -> Result<ColumnHandle> {
        let h = self.handle(name)?;

        match h.access {
            ColumnAccess::ReadWrite => Ok(h),
            ColumnAccess::ReadOnly => Err(DataTableError::ReadOnlyViolation(name.to_owned())),
        }
    }

    fn store(&self, h: ColumnHandle) -> &Table {
        match h.store {
            Store::Ro => &self.ro,
            Store::Rw => &self.rw,
        }
    }

    fn store_mut(&mut self, h: ColumnHandle) -> &mut Table {
        match h.store {
            Store::Ro => &mut self.ro,
            Store::Rw => &mut self.rw,
        }
    }

    fn decode<T: CellData>(name: &str, h: ColumnHandle, stored: &CellValue) -> Result<T> {
        let cell = columns::decode_cell(h.kind, stored);

        T::from_cell(&cell).ok_or_else(|| {
            TableError::UnexpectedType {
                column: name.to_owned(),
                expected: T::DESCRIPTION.to_owned(),
                actual: cell.describe(),
            }
            .into()
        })
    }

    pub fn get_cell<T: CellData>(&self, name: &str, row: usize) -> Result<T> {
        let h = self.handle(name)?;
        let stored = self.store(h).get_cell_value(name, row)?;
        Self::decode(name, h, stored)
    }

    pub fn put_cell<T: CellData>(&mut self, name: &str, row: usize, value: T) -> Result<()> {
        let h = self.writable_handle(name)?;
        let cell = columns::encode_cell(h.kind, value.into_cell())?;
        self.store_mut(h).put_cell(name, row, cell)?;
        Ok(())
    }

    pub fn get_column<T: CellData>(&self, name: &str) -> Result<Vec<T>> {
        self.get_col_range(name, 0, None, 1)
    }

    /// Replace a whole column; `values` must have one entry per row.
    pub fn put_column<T: CellData>(&mut self, name: &str, values: Vec<T>) -> Result<()> {
        self.writable_handle(name)?;

        if values.len() != self.row_count() {
            return Err(TableError::LengthMismatch {
                expected: self.row_count(),
                actual: values.len(),
            }
            .into());
        }

        self.put_col_range(name, 0, values, 1)
    }

    pub fn get_col_range<T: CellData>(
        &self,
        name: &str,
        start: usize,
        n: Option<usize>,
        incr: usize,
    ) -> Result<Vec<T>> {
        let h = self.handle(name)?;
        let cells: Vec<CellValue> = self.store(h).get_col_range(name, start, n, incr)?;
        cells.iter().map(|c| Self::decode(name, h, c)).collect()
    }

    pub fn put_col_range<T: CellData>(
        &mut self,
        name: &str,
        start: usize,
        values: Vec<T>,
        incr: usize,
    ) -> Result<()> {
        let h = self.writable_handle(name)?;
        let cells = values
            .into_iter()
            .map(|v| columns::encode_cell(h.kind, v.into_cell()))
            .collect::<Result<Vec<_>>>()?;
        self.store_mut(h).put_col_range(name, start, cells, incr)?;
        Ok(())
    }

    fn check_sliceable(name: &str, h: ColumnHandle) -> Result<()> {
        if h.kind == ColumnKind::Plain {
            Ok(())
        } else {
            Err(DataTableError::InvalidValue {
                column: name.to_owned(),
                reason: "encoded columns cannot be accessed by slice".to_owned(),
            })
        }
    }

    /// Fetch the part of an array cell between the inclusive corners `blc`
    /// and `trc`.
    pub fn get_cell_slice<E: ArrayElement>(
        &self,
        name: &str,
        row: usize,
        blc: &[usize],
        trc: &[usize],
        incr: &[usize],
    ) -> Result<ArrayD<E>> {
        let h = self.handle(name)?;
        Self::check_sliceable(name, h)?;
        Ok(self.store(h).get_cell_slice(name, row, blc, trc, incr)?)
    }

    pub fn put_cell_slice<E: ArrayElement>(
        &mut self,
        name: &str,
        row: usize,
        value: &ArrayD<E>,
        blc: &[usize],
        trc: &[usize],
        incr: &[usize],
    ) -> Result<()> {
        let h = self.writable_handle(name)?;
        Self::check_sliceable(name, h)?;
        self.store_mut(h)
            .put_cell_slice(name, row, value, blc, trc, incr)?;
        Ok(())
    }

    pub fn get_mask_list(&self, row: usize) -> Result<Vec<MaskRange>> {
        let stored: Array2<i32> = self.rw.get_cell(schema::MASKLIST, row)?;
        columns::decode_mask_list(&stored)
    }

    pub fn put_mask_list(&mut self, row: usize, ranges: &[MaskRange]) -> Result<()> {
        self.writable_handle(schema::MASKLIST)?;
        self.rw
            .put_cell(schema::MASKLIST, row, columns::encode_mask_list(ranges))?;
        Ok(())
    }

    pub fn get_nochange(&self, row: usize) -> Result<Option<bool>> {
        columns::decode_nochange(self.rw.get_cell(schema::NOCHANGE, row)?)
    }

    pub fn put_nochange(&mut self, row: usize, value: Option<bool>) -> Result<()> {
        self.writable_handle(schema::NOCHANGE)?;
        self.rw
            .put_cell(schema::NOCHANGE, row, columns::encode_nochange(value))?;
        Ok(())
    }

    /// Store a Tsys spectrum. TSYS belongs to the read-only store; only
    /// calibration transfer writes it after ingest.
    pub(crate) fn put_tsys(&mut self, row: usize, tsys: Vec<f64>) -> Result<()> {
        self.check_mutable(schema::TSYS)?;
        self.ro.put_cell(schema::TSYS, row, tsys)?;
        Ok(())
    }

    pub fn get_col_keyword(&self, column: &str, keyword: &str) -> Result<Option<String>> {
        let h = self.handle(column)?;
        Ok(self
            .store(h)
            .get_col_keyword(column, keyword)?
            .map(|s| s.to_owned()))
    }

    pub fn keyword_names(&self) -> Vec<String> {
        self.rw.keyword_names()
    }

    pub fn has_keyword(&self, name: &str) -> bool {
        self.rw.has_keyword(name)
    }

    pub fn get_keyword(&self, name: &str) -> Result<KeywordValue> {
        let text = self.rw.get_keyword(name)?;
        Ok(KeywordValue::parse(text)?)
    }

    /// Set a keyword, replacing any previous value.
    pub fn put_keyword(&mut self, name: &str, value: &KeywordValue) -> Result<()> {
        self.check_mutable(name)?;
        self.rw.put_keyword(name, &value.to_text()?)?;
        Ok(())
    }

    /// Set a keyword only if it is not yet present. Returns whether the
    /// value was stored.
    pub fn register_keyword(&mut self, name: &str, value: &KeywordValue) -> Result<bool> {
        if self.has_keyword(name) {
            debug!("keyword {} is already registered; leaving it alone", name);
            return Ok(false);
        }

        self.put_keyword(name, value)?;
        Ok(true)
    }

    pub fn direction_ref(&self) -> Option<&str> {
        self.ro.get_keyword(DIRECTION_REF_KEY).ok()
    }

    /// Record the direction reference frame. Only the first value set is
    /// kept; returns whether `value` was stored.
    pub fn set_direction_ref(&mut self, value: &str) -> Result<bool> {
        self.check_mutable(DIRECTION_REF_KEY)?;

        if self.ro.has_keyword(DIRECTION_REF_KEY) {
            return Ok(false);
        }

        self.ro.put_keyword(DIRECTION_REF_KEY, value)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{observation, table_with_rows};
    use ndarray::array;

    #[test]
    fn addrows_keeps_stores_in_step() {
        let mut dt = DataTable::new();

        for n in [0, 1, 5, 0, 3] {
            let before = dt.row_count();
            dt.addrows(n).unwrap();
            let (ro, rw) = dt.store_row_counts();
            assert_eq!(ro, rw);
            assert_eq!(ro, before + n);
        }

        assert!(dt.get_mask_list(8).unwrap().is_empty());
        assert_eq!(dt.get_nochange(8).unwrap(), None);
        assert_eq!(dt.get_cell::<i32>(schema::POSGRP, 8).unwrap(), -1);
    }

    #[test]
    fn read_only_columns_reject_writes() {
        let mut dt = table_with_rows(2);

        for name in schema::RO_COLUMNS {
            assert_eq!(dt.column_access(name).unwrap(), ColumnAccess::ReadOnly);
            assert!(matches!(
                dt.put_cell(name, 0, 1),
                Err(DataTableError::ReadOnlyViolation(ref c)) if c == name
            ));
            assert!(matches!(
                dt.put_column(name, vec![1, 2]),
                Err(DataTableError::ReadOnlyViolation(_))
            ));
        }

        assert!(matches!(
            dt.put_cell_slice(
                schema::TSYS,
                0,
                &array![1.0].into_dyn(),
                &[0],
                &[0],
                &[1]
            ),
            Err(DataTableError::ReadOnlyViolation(_))
        ));
        assert!(matches!(
            dt.put_cell("NOPE", 0, 1),
            Err(DataTableError::Table(TableError::NoSuchColumn(_)))
        ));
    }

    #[test]
    fn observations_initialize_both_stores() {
        let dt = table_with_rows(3);
        assert_eq!(dt.row_count(), 3);
        assert_eq!(dt.get_column::<i32>(schema::ROW).unwrap(), vec![0, 1, 2]);
        assert_eq!(dt.get_cell::<Vec<f64>>(schema::TSYS, 1).unwrap(), vec![100., 110.]);
        assert_eq!(
            dt.get_cell::<Array2<i32>>(schema::FLAG_PERMANENT, 2).unwrap(),
            Array2::<i32>::ones((2, schema::NUM_PERMANENT_FLAGS))
        );
        assert_eq!(
            dt.get_cell::<Array2<f64>>(schema::STATISTICS, 0).unwrap().shape(),
            &[2, schema::NUM_STATISTICS]
        );
        assert_eq!(dt.get_cell::<Vec<i32>>(schema::FLAG_SUMMARY, 0).unwrap(), vec![1, 1]);
        assert_eq!(
            dt.get_col_keyword(schema::TIME, "UNIT").unwrap().as_deref(),
            Some("d")
        );

        let mut bad = observation(0, 0, 0, 0, 0.);
        bad.npol = -1;
        let mut dt = DataTable::new();
        assert!(matches!(
            dt.append_observations(&[bad]),
            Err(DataTableError::InvalidValue { .. })
        ));
        assert_eq!(dt.store_row_counts(), (0, 0));
    }

    #[test]
    fn mask_list_hides_sentinel() {
        let mut dt = table_with_rows(2);

        dt.put_mask_list(0, &[]).unwrap();
        assert!(dt.get_mask_list(0).unwrap().is_empty());
        assert_eq!(
            dt.rw_table().get_cell::<Array2<i32>>(schema::MASKLIST, 0).unwrap(),
            array![[-1, -1]]
        );

        dt.put_mask_list(1, &[[5, 10], [200, 300]]).unwrap();
        assert_eq!(dt.get_mask_list(1).unwrap(), vec![[5, 10], [200, 300]]);

        // The generic accessors apply the same translation.
        dt.put_cell(schema::MASKLIST, 1, Array2::<i32>::zeros((0, 2))).unwrap();
        assert_eq!(
            dt.get_cell::<Array2<i32>>(schema::MASKLIST, 1).unwrap().shape(),
            &[0, 2]
        );
        assert_eq!(
            dt.rw_table().get_cell::<Array2<i32>>(schema::MASKLIST, 1).unwrap(),
            array![[-1, -1]]
        );
        assert!(dt
            .get_cell_slice::<i32>(schema::MASKLIST, 1, &[0, 0], &[0, 1], &[1, 1])
            .is_err());
    }

    #[test]
    fn nochange_is_tri_state() {
        let mut dt = table_with_rows(1);
        assert_eq!(dt.get_nochange(0).unwrap(), None);
        dt.put_nochange(0, Some(true)).unwrap();
        assert_eq!(dt.get_cell::<i32>(schema::NOCHANGE, 0).unwrap(), 1);
        dt.put_nochange(0, Some(false)).unwrap();
        assert_eq!(dt.get_nochange(0).unwrap(), Some(false));
        dt.put_cell(schema::NOCHANGE, 0, -1).unwrap();
        assert_eq!(dt.get_nochange(0).unwrap(), None);

        assert!(matches!(
            dt.put_cell(schema::NOCHANGE, 0, 5),
            Err(DataTableError::InvalidValue { .. })
        ));
        assert_eq!(dt.get_nochange(0).unwrap(), None);
    }

    #[test]
    fn keywords() {
        let mut dt = table_with_rows(1);
        let v = KeywordValue::from(vec![1i64, 2]);
        assert!(dt.register_keyword("K", &v).unwrap());
        assert!(!dt
            .register_keyword("K", &KeywordValue::from("other"))
            .unwrap());
        assert_eq!(dt.get_keyword("K").unwrap(), v);

        dt.put_keyword("K", &KeywordValue::from(3i64)).unwrap();
        assert_eq!(dt.get_keyword("K").unwrap(), KeywordValue::Int(3));
        assert!(matches!(
            dt.get_keyword("MISSING"),
            Err(DataTableError::Table(TableError::NoSuchKeyword(_)))
        ));

        assert_eq!(dt.direction_ref(), None);
        assert!(dt.set_direction_ref("J2000").unwrap());
        assert!(!dt.set_direction_ref("GALACTIC").unwrap());
        assert_eq!(dt.direction_ref(), Some("J2000"));
    }

    #[test]
    fn export_and_import() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("uid___A002.ms.datatable");

        let mut dt = table_with_rows(4);
        dt.put_mask_list(2, &[[1, 2]]).unwrap();
        dt.put_keyword("FILENAME", &KeywordValue::from("uid___A002.ms"))
            .unwrap();
        dt.set_direction_ref("J2000").unwrap();
        assert!(matches!(
            dt.export_to(None, false, false),
            Err(DataTableError::NoSnapshotPath)
        ));
        dt.export_to(Some(snap.as_path()), false, false).unwrap();
        assert!(ro_table_path(&snap).join("table.dat").exists());
        assert!(rw_table_path(&snap).join("table.dat").exists());

        assert!(matches!(
            dt.export_to(Some(snap.as_path()), false, false),
            Err(DataTableError::AlreadyExists(_))
        ));
        dt.export_to(Some(snap.as_path()), false, true).unwrap();

        let back = DataTable::open(&snap, OpenMode::ReadWrite).unwrap();
        assert_eq!(back.row_count(), 4);
        assert_eq!(back.get_mask_list(2).unwrap(), vec![[1, 2]]);
        assert_eq!(back.get_keyword("FILENAME").unwrap().as_str(), Some("uid___A002.ms"));
        assert_eq!(back.direction_ref(), Some("J2000"));
        assert_eq!(back.name(), Some(snap.as_path()));

        // Changes stay in memory until exported; sync discards them.
        let mut back = back;
        back.put_nochange(0, Some(true)).unwrap();
        back.sync(true).unwrap();
        assert_eq!(back.get_nochange(0).unwrap(), None);

        back.put_nochange(0, Some(true)).unwrap();
        back.export_to(None, true, false).unwrap();
        let again = DataTable::open(&snap, OpenMode::ReadOnly).unwrap();
        assert_eq!(again.get_nochange(0).unwrap(), Some(true));
    }

    #[test]
    fn open_missing_path_remembers_it() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("new.datatable");

        let mut dt = DataTable::open(&snap, OpenMode::ReadWrite).unwrap();
        assert_eq!(dt.row_count(), 0);
        dt.append_observations(&[observation(0, 1, 17, 2, 60000.)])
            .unwrap();
        dt.export_to(None, false, false).unwrap();

        let back = DataTable::open(&snap, OpenMode::ReadWrite).unwrap();
        assert_eq!(back.get_cell::<i32>(schema::ANTENNA, 0).unwrap(), 1);

        let fresh = DataTable::open("", OpenMode::ReadWrite).unwrap();
        assert_eq!(fresh.name(), None);
    }

    #[test]
    fn read_only_mode() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("dt");
        table_with_rows(2).export_to(Some(snap.as_path()), false, false).unwrap();

        let mut dt = DataTable::open(&snap, OpenMode::ReadOnly).unwrap();
        assert_eq!(dt.mode(), OpenMode::ReadOnly);
        assert!(matches!(
            dt.put_nochange(0, None),
            Err(DataTableError::ReadOnlyViolation(_))
        ));
        assert!(matches!(dt.addrows(1), Err(DataTableError::ReadOnlyViolation(_))));
        assert!(matches!(
            dt.put_keyword("K", &KeywordValue::Int(1)),
            Err(DataTableError::ReadOnlyViolation(_))
        ));
        assert_eq!(dt.row_count(), 2);
    }
}
