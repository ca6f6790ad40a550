// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Online flags.

The online slot of FLAG_PERMANENT records whether the correlator data of a
row were usable at all. It is derived from the visibility table the data
table was filled from, and must be set before any other flagging.

*/

use log::info;
use ndarray::{Array2, ArrayD};
use sdindex_coltable::Table;
use std::path::Path;

use crate::errors::{DataTableError, Result};
use crate::schema;
use crate::table::DataTable;

/// The keyword recording the name of the file a data table was filled from.
pub const FILENAME_KEY: &str = "FILENAME";

/// Visibility table column: per-row flag, nonzero if the whole row is bad.
pub const MS_FLAG_ROW: &str = "FLAG_ROW";

/// Visibility table column: (npol, nchan) flags, nonzero where flagged.
pub const MS_FLAG: &str = "FLAG";

fn basename(p: &str) -> &str {
    Path::new(p)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(p)
}

/// The online flag of each polarization: 0 if the row is flagged or every
/// channel of the polarization is, 1 otherwise.
pub fn online_flags(flag: &Array2<i32>, row_flagged: bool) -> Vec<i32> {
    flag.rows()
        .into_iter()
        .map(|chans| {
            if row_flagged || chans.iter().all(|f| *f != 0) {
                0
            } else {
                1
            }
        })
        .collect()
}

impl DataTable {
    /// Set the online flags from the visibility table `ms`, which was read
    /// from the file `ms_name`.
    ///
    /// The ROW column maps each row of this table to a row of `ms`. The
    /// FILENAME keyword must name the same file as `ms_name`.
    pub fn update_online_flag(&mut self, ms_name: &str, ms: &Table) -> Result<()> {
        info!("Updating online flag for {}", basename(ms_name));

        let filename = self.get_keyword(FILENAME_KEY)?;
        let filename = filename.as_str().ok_or_else(|| DataTableError::MalformedKeyword {
            key: FILENAME_KEY.to_owned(),
            reason: "expected a string".to_owned(),
        })?;

        if basename(filename) != basename(ms_name) {
            return Err(DataTableError::FileMismatch {
                expected: filename.to_owned(),
                actual: ms_name.to_owned(),
            });
        }

        let ms_rows: Vec<i32> = self.get_column(schema::ROW)?;

        for (dt_row, ms_row) in ms_rows.into_iter().enumerate() {
            let ms_row = usize::try_from(ms_row).map_err(|_| DataTableError::InvalidValue {
                column: schema::ROW.to_owned(),
                reason: format!("negative row number {ms_row}"),
            })?;

            let flag: Array2<i32> = ms.get_cell(MS_FLAG, ms_row)?;
            let row_flagged = ms.get_cell::<i32>(MS_FLAG_ROW, ms_row)? != 0;
            let online = online_flags(&flag, row_flagged);
            let npol = online.len();

            if npol == 0 {
                continue;
            }

            let value = ArrayD::from_shape_vec(vec![npol, 1], online).map_err(|e| {
                DataTableError::InternalConsistency(format!("bad online flag shape: {e}"))
            })?;

            self.put_cell_slice(
                schema::FLAG_PERMANENT,
                dt_row,
                &value,
                &[0, schema::ONLINE_FLAG_INDEX],
                &[npol - 1, schema::ONLINE_FLAG_INDEX],
                &[1, 1],
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::KeywordValue;
    use crate::testing::table_with_rows;
    use ndarray::array;
    use sdindex_coltable::{ColumnDesc, DataType, TableDesc};

    fn ms_table() -> Table {
        let desc = TableDesc::new()
            .with_column(ColumnDesc::array(MS_FLAG, DataType::Int, 2, "Flags"))
            .with_column(ColumnDesc::scalar(MS_FLAG_ROW, DataType::Int, "Row flag"));
        let mut t = Table::new_memory(desc, 3);
        t.put_cell(MS_FLAG, 0, array![[0, 0, 1], [1, 1, 1]]).unwrap();
        t.put_cell(MS_FLAG, 1, array![[0, 0, 0], [0, 0, 0]]).unwrap();
        t.put_cell(MS_FLAG_ROW, 1, 1).unwrap();
        t.put_cell(MS_FLAG, 2, array![[0, 0, 0], [0, 1, 0]]).unwrap();
        t
    }

    #[test]
    fn per_polarization() {
        assert_eq!(online_flags(&array![[0, 1], [1, 1]], false), vec![1, 0]);
        assert_eq!(online_flags(&array![[0, 1], [0, 0]], true), vec![0, 0]);
    }

    #[test]
    fn online_flags_from_ms() {
        let mut dt = table_with_rows(3);
        dt.put_keyword(FILENAME_KEY, &KeywordValue::from("uid___A002.ms"))
            .unwrap();

        assert!(matches!(
            dt.update_online_flag("/data/other.ms", &ms_table()),
            Err(DataTableError::FileMismatch { .. })
        ));

        dt.update_online_flag("/data/uid___A002.ms", &ms_table())
            .unwrap();

        let perm = |r| {
            dt.get_cell::<Array2<i32>>(schema::FLAG_PERMANENT, r)
                .unwrap()
        };
        assert_eq!(perm(0), array![[1, 1, 1, 1], [1, 1, 1, 0]]);
        assert_eq!(perm(1), array![[1, 1, 1, 0], [1, 1, 1, 0]]);
        assert_eq!(perm(2), array![[1, 1, 1, 1], [1, 1, 1, 1]]);
    }

    #[test]
    fn requires_filename() {
        let mut dt = table_with_rows(1);
        assert!(dt.update_online_flag("a.ms", &ms_table()).is_err());
    }
}
