// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Error types for the sdindex_coltable crate.
*/

use sdindex_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("no such column \"{0}\"")]
    NoSuchColumn(String),

    #[error("no such keyword \"{0}\"")]
    NoSuchKeyword(String),

    #[error("column \"{column}\" holds {expected} values, not {actual}")]
    UnexpectedType {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("row {row} is out of range for a table with {n_rows} rows")]
    RowOutOfRange { row: usize, n_rows: usize },

    #[error("expected {expected} values but got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("bad slice of column \"{column}\": {reason}")]
    BadSlice { column: String, reason: String },

    #[error("the table was not opened for writing")]
    NotWritable,

    #[error("the table is not backed by a snapshot on disk")]
    NotOnDisk,

    #[error("a table already exists at \"{0}\"")]
    AlreadyExists(PathBuf),

    #[error("timed out waiting for the lock on \"{0}\"")]
    Locked(PathBuf),

    #[error("malformed table snapshot: {0}")]
    Format(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TableError>;
