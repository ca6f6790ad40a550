// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Flushing the read-write store into a shared snapshot.

Several processes may each own a working copy of the same data table and
update disjoint sets of rows. To write their results back without
clobbering each other, each process locks the on-disk read-write store,
reads it, merges in just its dirty rows, and writes it back. The lock is
released when its guard drops, on every path out of the flush.

*/

use log::{debug, info};
use sdindex_coltable::{CellValue, Table, TableLock, TableOpenMode, DEFAULT_LOCK_TIMEOUT};
use std::time::Duration;

use crate::errors::{DataTableError, Result};
use crate::schema;
use crate::table::{rw_table_path, DataTable};

/// Columns merged in row chunks. MASKLIST and NOCHANGE are merged cell by
/// cell.
const ORDINARY_COLUMNS: &[&str] = &[
    schema::STATISTICS,
    schema::FLAG,
    schema::FLAG_PERMANENT,
    schema::FLAG_SUMMARY,
    schema::NMASK,
    schema::POSGRP,
];

#[derive(Clone, Debug)]
pub struct FlushOptions {
    /// Rows read and written at a time for ordinary columns.
    pub chunk_rows: usize,

    /// How long to wait for another process to release the lock.
    pub lock_timeout: Duration,
}

impl Default for FlushOptions {
    fn default() -> Self {
        FlushOptions {
            chunk_rows: 2000,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl DataTable {
    /// Merge rows of the in-memory read-write store into the read-write
    /// store of the snapshot this table is associated with, holding that
    /// store's lock while doing so.
    ///
    /// `dirty_rows` of None means every row; `columns` of None means every
    /// read-write column.
    pub fn export_rw_exclusive(
        &self,
        dirty_rows: Option<&[usize]>,
        columns: Option<&[&str]>,
        options: &FlushOptions,
    ) -> Result<()> {
        let snapshot = self.name().ok_or(DataTableError::NoSnapshotPath)?;
        let rw_path = rw_table_path(snapshot);

        let columns: Vec<&str> = columns
            .map(|c| c.to_vec())
            .unwrap_or_else(|| schema::RW_COLUMNS.to_vec());

        for c in &columns {
            if !schema::RW_COLUMNS.contains(c) {
                return Err(DataTableError::ReadOnlyViolation((*c).to_owned()));
            }
        }

        let chunk_rows = options.chunk_rows.max(1);

        let _lock = TableLock::acquire(&rw_path, options.lock_timeout)?;
        let mut dest = Table::open(&rw_path, TableOpenMode::ReadWrite)?;

        let mut rows: Vec<usize> = match dirty_rows {
            Some(r) => r.to_vec(),
            None => (0..dest.n_rows()).collect(),
        };
        rows.sort_unstable();
        rows.dedup();

        let (first, last) = match (rows.first(), rows.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => {
                debug!("no dirty rows to flush");
                return Ok(());
            }
        };

        for col in columns.iter().filter(|c| ORDINARY_COLUMNS.contains(c)) {
            let mut start = first;

            while start <= last {
                let size = chunk_rows.min(last + 1 - start);
                let src: Vec<CellValue> =
                    self.rw_table().get_col_range(col, start, Some(size), 1)?;
                let mut chunk: Vec<CellValue> = dest.get_col_range(col, start, Some(size), 1)?;

                if src.len() != size || chunk.len() != size {
                    return Err(DataTableError::OutOfRange {
                        index: start + size - 1,
                        limit: src.len().min(chunk.len()) + start,
                    });
                }

                let lo = rows.partition_point(|r| *r < start);
                let hi = rows.partition_point(|r| *r < start + size);

                for r in &rows[lo..hi] {
                    chunk[r - start] = src[r - start].clone();
                }

                dest.put_col_range(col, start, chunk, 1)?;
                start += size;
            }
        }

        for col in [schema::MASKLIST, schema::NOCHANGE] {
            if !columns.contains(&col) {
                continue;
            }

            for r in &rows {
                let cell = self.rw_table().get_cell_value(col, *r)?.clone();
                dest.put_cell(col, *r, cell)?;
            }
        }

        dest.flush()?;
        info!(
            "flushed {} rows of {} columns to {}",
            rows.len(),
            columns.len(),
            rw_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::OpenMode;
    use crate::testing::table_with_rows;

    #[test]
    fn merges_only_dirty_rows() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("shared.datatable");
        table_with_rows(5)
            .export_to(Some(snap.as_path()), false, false)
            .unwrap();

        // Two workers with their own copies update different rows.
        let mut a = DataTable::open(&snap, OpenMode::ReadWrite).unwrap();
        let mut b = DataTable::open(&snap, OpenMode::ReadWrite).unwrap();

        for r in 0..5 {
            a.put_cell(schema::NMASK, r, 10).unwrap();
            b.put_cell(schema::NMASK, r, 20).unwrap();
        }

        a.put_mask_list(1, &[[3, 4]]).unwrap();
        a.put_nochange(1, Some(false)).unwrap();
        b.put_cell(schema::POSGRP, 4, 7).unwrap();

        let opts = FlushOptions {
            chunk_rows: 2,
            ..Default::default()
        };
        a.export_rw_exclusive(Some(&[3, 1]), None, &opts).unwrap();
        b.export_rw_exclusive(Some(&[4, 2]), Some(&[schema::NMASK, schema::POSGRP]), &opts)
            .unwrap();

        let merged = DataTable::open(&snap, OpenMode::ReadOnly).unwrap();
        assert_eq!(
            merged.get_column::<i32>(schema::NMASK).unwrap(),
            vec![0, 10, 20, 10, 20]
        );
        assert_eq!(merged.get_mask_list(1).unwrap(), vec![[3, 4]]);
        assert!(merged.get_mask_list(3).unwrap().is_empty());
        assert_eq!(merged.get_nochange(1).unwrap(), Some(false));
        assert_eq!(merged.get_cell::<i32>(schema::POSGRP, 4).unwrap(), 7);

        // The lock was released.
        assert!(TableLock::try_acquire(rw_table_path(&snap)).unwrap().is_some());
    }

    #[test]
    fn lock_contention_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let snap = dir.path().join("dt");
        let mut dt = table_with_rows(2);

        assert!(matches!(
            dt.export_rw_exclusive(None, None, &FlushOptions::default()),
            Err(DataTableError::NoSnapshotPath)
        ));

        dt.export_to(Some(snap.as_path()), false, false).unwrap();

        let held = TableLock::try_acquire(rw_table_path(&snap)).unwrap();
        assert!(held.is_some());
        let opts = FlushOptions {
            lock_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        assert!(dt.export_rw_exclusive(None, None, &opts).is_err());
        drop(held);

        assert!(matches!(
            dt.export_rw_exclusive(None, Some(&[schema::TSYS]), &opts),
            Err(DataTableError::ReadOnlyViolation(_))
        ));

        // A row the snapshot does not have fails, and the lock is still
        // released.
        dt.addrows(1).unwrap();
        assert!(dt.export_rw_exclusive(Some(&[2]), None, &opts).is_err());
        assert!(TableLock::try_acquire(rw_table_path(&snap)).unwrap().is_some());
    }
}
