// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Cell values and the mapping between them and Rust types.
*/

use ndarray::{Array, ArrayD, Ix1, Ix2, IxDyn};
use sdindex_core::num::DimFromShapeSlice;
use std::fmt;

use crate::errors::{Result, TableError};

/// The element type of a column.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum DataType {
    Int = 1,
    Double = 2,
    String = 3,
}

impl DataType {
    pub fn try_from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(DataType::Int),
            2 => Ok(DataType::Double),
            3 => Ok(DataType::String),
            _ => Err(TableError::Format(format!("illegal data type code {code}"))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(match *self {
            DataType::Int => "int",
            DataType::Double => "double",
            DataType::String => "string",
        })
    }
}

/// The contents of one cell of a table.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Int(i32),
    Double(f64),
    String(String),
    IntArray(ArrayD<i32>),
    DoubleArray(ArrayD<f64>),
}

impl CellValue {
    pub fn data_type(&self) -> DataType {
        match self {
            CellValue::Int(_) | CellValue::IntArray(_) => DataType::Int,
            CellValue::Double(_) | CellValue::DoubleArray(_) => DataType::Double,
            CellValue::String(_) => DataType::String,
        }
    }

    /// The array dimensionality, or 0 for scalars.
    pub fn ndim(&self) -> usize {
        match self {
            CellValue::IntArray(a) => a.ndim(),
            CellValue::DoubleArray(a) => a.ndim(),
            _ => 0,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            CellValue::IntArray(a) => a.shape(),
            CellValue::DoubleArray(a) => a.shape(),
            _ => &[],
        }
    }

    pub fn describe(&self) -> String {
        match self.ndim() {
            0 => format!("scalar {}", self.data_type()),
            n => format!("{}-dimensional {}", n, self.data_type()),
        }
    }
}

/// A Rust type that can be stored in, and fetched from, a table cell.
pub trait CellData: Sized {
    /// Used in error messages.
    const DESCRIPTION: &'static str;

    fn from_cell(cell: &CellValue) -> Option<Self>;

    fn into_cell(self) -> CellValue;
}

impl CellData for i32 {
    const DESCRIPTION: &'static str = "scalar int";

    fn from_cell(cell: &CellValue) -> Option<Self> {
        match cell {
            CellValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn into_cell(self) -> CellValue {
        CellValue::Int(self)
    }
}

impl CellData for f64 {
    const DESCRIPTION: &'static str = "scalar double";

    fn from_cell(cell: &CellValue) -> Option<Self> {
        match cell {
            CellValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    fn into_cell(self) -> CellValue {
        CellValue::Double(self)
    }
}

impl CellData for String {
    const DESCRIPTION: &'static str = "scalar string";

    fn from_cell(cell: &CellValue) -> Option<Self> {
        match cell {
            CellValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn into_cell(self) -> CellValue {
        CellValue::String(self)
    }
}

impl CellData for CellValue {
    const DESCRIPTION: &'static str = "any";

    fn from_cell(cell: &CellValue) -> Option<Self> {
        Some(cell.clone())
    }

    fn into_cell(self) -> CellValue {
        self
    }
}

/// Array element types, with access to the corresponding array cells.
pub trait ArrayElement: Clone + Sized {
    fn array_ref(cell: &CellValue) -> Option<&ArrayD<Self>>;

    fn array_mut(cell: &mut CellValue) -> Option<&mut ArrayD<Self>>;

    fn wrap(array: ArrayD<Self>) -> CellValue;
}

impl ArrayElement for i32 {
    fn array_ref(cell: &CellValue) -> Option<&ArrayD<Self>> {
        match cell {
            CellValue::IntArray(a) => Some(a),
            _ => None,
        }
    }

    fn array_mut(cell: &mut CellValue) -> Option<&mut ArrayD<Self>> {
        match cell {
            CellValue::IntArray(a) => Some(a),
            _ => None,
        }
    }

    fn wrap(array: ArrayD<Self>) -> CellValue {
        CellValue::IntArray(array)
    }
}

impl ArrayElement for f64 {
    fn array_ref(cell: &CellValue) -> Option<&ArrayD<Self>> {
        match cell {
            CellValue::DoubleArray(a) => Some(a),
            _ => None,
        }
    }

    fn array_mut(cell: &mut CellValue) -> Option<&mut ArrayD<Self>> {
        match cell {
            CellValue::DoubleArray(a) => Some(a),
            _ => None,
        }
    }

    fn wrap(array: ArrayD<Self>) -> CellValue {
        CellValue::DoubleArray(array)
    }
}

/// Vecs map to one-dimensional array cells. Fetching a multidimensional cell
/// as a Vec is refused rather than silently flattened.
impl<E: ArrayElement> CellData for Vec<E> {
    const DESCRIPTION: &'static str = "1-dimensional array";

    fn from_cell(cell: &CellValue) -> Option<Self> {
        let a = E::array_ref(cell)?;

        if a.ndim() != 1 {
            return None;
        }

        Some(a.iter().cloned().collect())
    }

    fn into_cell(self) -> CellValue {
        E::wrap(Array::from_vec(self).into_dyn())
    }
}

macro_rules! impl_ndarray_cell {
    ($dim:ty, $desc:expr) => {
        impl<E: ArrayElement> CellData for Array<E, $dim> {
            const DESCRIPTION: &'static str = $desc;

            fn from_cell(cell: &CellValue) -> Option<Self> {
                let a = E::array_ref(cell)?;
                let dim = <$dim>::from_shape_slice(a.shape()).ok()?;
                Array::from_shape_vec(dim, a.iter().cloned().collect()).ok()
            }

            fn into_cell(self) -> CellValue {
                E::wrap(self.into_dyn())
            }
        }
    };
}

impl_ndarray_cell! { Ix1, "1-dimensional array" }
impl_ndarray_cell! { Ix2, "2-dimensional array" }
impl_ndarray_cell! { IxDyn, "array" }

/// A zero-sized array of the given dimensionality, used as the initial value
/// of array cells in freshly added rows.
pub(crate) fn empty_array<E: ArrayElement>(ndim: usize) -> ArrayD<E> {
    ArrayD::from_shape_simple_fn(IxDyn(&vec![0; ndim]), || unreachable!())
}
