// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

General helpers for numerics.

*/

use ndarray::{IntoDimension, Ix0, Ix1, Ix2, Ix3, IxDyn};

use crate::CoreError;

/// Adapt a slice representing an array shape into an `ndarray::Dimension` type.
///
/// In `ndarray` array dimensionalities are statically typed, but the cells of
/// a column table carry their shapes at runtime. This trait makes it possible
/// to convert a runtime-flexible array shape into one of the compile-time
/// types … if the two dimensionalities are in fact the same.
pub trait DimFromShapeSlice<T>: Sized {
    /// Try to create the implementing type from the specified array shape,
    /// specified as a slice.
    ///
    /// Returns `CoreError::DimensionMismatch` if the slice size does not
    /// match the expected dimensionality.
    fn from_shape_slice(shape: &[T]) -> Result<Self, CoreError>;
}

macro_rules! impl_dim_from_shape_slice {
    ($dimtype:ty; $ndim:expr; $($numbers:expr);*) => {
        impl DimFromShapeSlice<usize> for $dimtype {
            fn from_shape_slice(shape: &[usize]) -> Result<Self, CoreError> {
                if shape.len() == $ndim {
                    Ok([$(shape[$numbers]),*].into_dimension())
                } else {
                    Err(CoreError::DimensionMismatch($ndim, shape.len()))
                }
            }
        }
    }
}

impl_dim_from_shape_slice! { Ix0; 0; }
impl_dim_from_shape_slice! { Ix1; 1; 0 }
impl_dim_from_shape_slice! { Ix2; 2; 0;1 }
impl_dim_from_shape_slice! { Ix3; 3; 0;1;2 }

impl DimFromShapeSlice<usize> for IxDyn {
    fn from_shape_slice(shape: &[usize]) -> Result<Self, CoreError> {
        Ok(IxDyn(shape))
    }
}

/// The number of elements in an array of the given shape.
///
/// An empty shape describes a scalar, which has one element.
pub fn shape_size(shape: &[usize]) -> usize {
    shape.iter().product()
}
