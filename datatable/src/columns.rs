// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Encodings layered on top of the read-write store.

`MASKLIST` holds a list of inclusive `[start, end]` channel ranges per row,
stored as an `(n, 2)` int array. The store never holds a zero-length list:
the empty list is written as the single entry `[[-1, -1]]`, and that entry
reads back as an empty list.

`NOCHANGE` is tri-state. It is stored as an int: -1 for unset, 1 for true
and 0 for false.

*/

use ndarray::{Array2, ArrayView2, Ix2};
use sdindex_coltable::CellValue;
use std::borrow::Cow;

use crate::errors::{DataTableError, Result};
use crate::schema::{ColumnKind, MASKLIST, NOCHANGE};

/// One masked channel range, inclusive at both ends.
pub type MaskRange = [i32; 2];

pub const NO_MASK: MaskRange = [-1, -1];

pub const NOCHANGE_UNSET: i32 = -1;

fn is_sentinel(a: ArrayView2<i32>) -> bool {
    a.nrows() == 1 && a.ncols() == 2 && a[[0, 0]] < 0 && a[[0, 1]] < 0
}

pub fn encode_mask_list(ranges: &[MaskRange]) -> Array2<i32> {
    if ranges.is_empty() {
        return Array2::from_shape_fn((1, 2), |(_, j)| NO_MASK[j]);
    }

    Array2::from_shape_fn((ranges.len(), 2), |(i, j)| ranges[i][j])
}

pub fn decode_mask_list(stored: &Array2<i32>) -> Result<Vec<MaskRange>> {
    if stored.nrows() == 0 || is_sentinel(stored.view()) {
        return Ok(Vec::new());
    }

    if stored.ncols() != 2 {
        return Err(DataTableError::InvalidValue {
            column: MASKLIST.to_owned(),
            reason: format!("expected ranges of 2 channels but found {}", stored.ncols()),
        });
    }

    Ok(stored.rows().into_iter().map(|r| [r[0], r[1]]).collect())
}

pub fn encode_nochange(value: Option<bool>) -> i32 {
    match value {
        None => NOCHANGE_UNSET,
        Some(true) => 1,
        Some(false) => 0,
    }
}

pub fn decode_nochange(code: i32) -> Result<Option<bool>> {
    match code {
        NOCHANGE_UNSET => Ok(None),
        1 => Ok(Some(true)),
        0 => Ok(Some(false)),
        other => Err(DataTableError::InvalidValue {
            column: NOCHANGE.to_owned(),
            reason: format!("{other} is not one of -1 (unset), 0 (false) or 1 (true)"),
        }),
    }
}

/// Translate a caller's cell into its stored form.
pub(crate) fn encode_cell(kind: ColumnKind, cell: CellValue) -> Result<CellValue> {
    match kind {
        ColumnKind::Plain => Ok(cell),

        ColumnKind::MaskList => match cell {
            CellValue::IntArray(a) if a.ndim() == 2 && a.shape()[1] == 2 => {
                if a.len() == 0 {
                    Ok(CellValue::IntArray(encode_mask_list(&[]).into_dyn()))
                } else {
                    Ok(CellValue::IntArray(a))
                }
            }
            other => Err(DataTableError::InvalidValue {
                column: MASKLIST.to_owned(),
                reason: format!(
                    "expected an (n, 2) int array but got a {} cell of shape {:?}",
                    other.describe(),
                    other.shape()
                ),
            }),
        },

        ColumnKind::NoChange => match cell {
            CellValue::Int(code) => {
                decode_nochange(code)?;
                Ok(CellValue::Int(code))
            }
            other => Err(DataTableError::InvalidValue {
                column: NOCHANGE.to_owned(),
                reason: format!("expected an int code but got {}", other.describe()),
            }),
        },
    }
}

/// Translate a stored cell into what callers see.
pub(crate) fn decode_cell(kind: ColumnKind, cell: &CellValue) -> Cow<'_, CellValue> {
    if kind != ColumnKind::MaskList {
        return Cow::Borrowed(cell);
    }

    if let CellValue::IntArray(a) = cell {
        if let Ok(a2) = a.view().into_dimensionality::<Ix2>() {
            if a2.nrows() == 0 || is_sentinel(a2) {
                return Cow::Owned(CellValue::IntArray(Array2::<i32>::zeros((0, 2)).into_dyn()));
            }
        }
    }

    Cow::Borrowed(cell)
}
