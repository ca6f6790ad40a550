// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Error types for the sdindex_datatable crate.

Lookups of unregistered groupings, index translation failures, and writes to
immutable columns each get their own variant so that callers can react to
them; everything from the storage layer is passed through.

*/

use sdindex_coltable::TableError;
use std::path::PathBuf;
use thiserror::Error;

use crate::keyword::KeywordParseError;

#[derive(Error, Debug)]
pub enum DataTableError {
    #[error("column \"{0}\" is read-only")]
    ReadOnlyViolation(String),

    #[error("invalid value for column \"{column}\": {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("antenna {antenna} spw {spw} pol {pol} is not in the position group list")]
    GroupNotFound { antenna: i32, spw: i32, pol: i32 },

    #[error("time table for {0} is not configured properly")]
    TimeTableNotConfigured(String),

    #[error("index {index} is out of range (limit {limit})")]
    OutOfRange { index: usize, limit: usize },

    #[error("unknown origin file \"{0}\"")]
    UnknownFile(String),

    #[error("no nearest field for Tsys update")]
    NoNearestField,

    #[error("field {0} is not described by the observation")]
    UnknownField(i32),

    #[error("spectral window {0} is not described by the observation")]
    UnknownSpectralWindow(i32),

    #[error("table was filled from \"{expected}\" but flags were requested from \"{actual}\"")]
    FileMismatch { expected: String, actual: String },

    #[error("the file {0} exists")]
    AlreadyExists(PathBuf),

    #[error("internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("keyword \"{key}\" has an unexpected structure: {reason}")]
    MalformedKeyword { key: String, reason: String },

    #[error("no snapshot path is known; one must be specified")]
    NoSnapshotPath,

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Keyword(#[from] KeywordParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DataTableError>;
