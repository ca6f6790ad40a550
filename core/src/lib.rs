// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Core types and traits for sdindex, the single-dish scan-metadata index.

This crate is small. It provides the error type shared by the other crates,
big-endian framing helpers used by the on-disk snapshot format, helpers for
going between runtime array shapes and `ndarray` dimension types, and (with
the `notifications` feature) a framework for reporting progress to users of
command-line tools.

*/

use thiserror::Error;

pub mod io;
pub mod num;

#[cfg(feature = "notifications")]
#[macro_use]
pub mod notify;

// convenience re-exports
pub use ndarray::{Array, ArrayD, Array1, Array2};

#[cfg(feature = "notifications")]
pub use anyhow;

/// The error type for the low-level helpers in this crate.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An array did not have the expected dimensionality.
    #[error("expected {0}-dimensional array but found one that was {1}-dimensional")]
    DimensionMismatch(usize, usize),

    /// A framed record had a length field that cannot be right.
    #[error("implausible framed length {0} in stream")]
    BadFrameLength(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A “chained try” macro.
///
/// Attempts an operation that returns a Result and returns its Ok value if
/// the operation is successful. If not, it returns an `anyhow::Error` that
/// chains to the error that was returned, with explanatory text formatted
/// using the `format!` macro. Example:
///
/// ```rust,ignore
/// let table = ctry!(Table::open(&path, TableOpenMode::Read);
///                   "failed to open \"{}\"", path.display());
/// ```
///
/// Note that the operation to be attempted and the arguments to `format!` are
/// separated by a semicolon within the `ctry!()` parentheses.
#[cfg(feature = "notifications")]
#[macro_export]
macro_rules! ctry {
    ($op:expr ; $( $chain_fmt_args:expr ),*) => {
        {
            use $crate::anyhow::Context;
            $op.with_context(|| format!($( $chain_fmt_args ),*))?
        }
    }
}
