// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Translation between serial row indices and per-file row indices.

When a dataset is split across several origin files, each file gets its own
data table. A serial index numbers the rows of all of them as if the tables
were concatenated in a fixed file order. The order is set when the
translator is built and never changes afterwards, since cached groupings
refer to serial indices.

*/

use log::debug;
use sdindex_coltable::{Table, TableOpenMode};
use std::path::Path;

use crate::errors::{DataTableError, Result};
use crate::table::ro_table_path;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RowIndexTranslator {
    files: Vec<String>,
    nrow_per_file: Vec<usize>,
}

impl RowIndexTranslator {
    /// Build a translator from `(file name, row count)` pairs, in serial
    /// order.
    pub fn new<I, S>(files: I) -> RowIndexTranslator
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let (files, nrow_per_file): (Vec<String>, Vec<usize>) =
            files.into_iter().map(|(f, n)| (f.into(), n)).unzip();

        RowIndexTranslator {
            files,
            nrow_per_file,
        }
    }

    /// Build a translator from the per-file data tables stored under
    /// `datatable_dir`: file `name` has its read-only store at
    /// `<datatable_dir>/<name>/RO`.
    pub fn from_datatable_dir<P, S>(datatable_dir: P, basenames: &[S]) -> Result<RowIndexTranslator>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let dir = datatable_dir.as_ref();
        let mut pairs = Vec::with_capacity(basenames.len());

        for name in basenames {
            let name = name.as_ref();
            let t = Table::open(ro_table_path(dir.join(name)), TableOpenMode::Read)?;
            debug!("{}: {} rows", name, t.n_rows());
            pairs.push((name.to_owned(), t.n_rows()));
        }

        Ok(Self::new(pairs))
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    pub fn total_rows(&self) -> usize {
        self.nrow_per_file.iter().sum()
    }

    fn file_position(&self, file: &str) -> Result<usize> {
        self.files
            .iter()
            .position(|f| f == file)
            .ok_or_else(|| DataTableError::UnknownFile(file.to_owned()))
    }

    /// The serial indices belonging to file number `j`, as a half-open
    /// range.
    fn serial_range(&self, j: usize) -> (usize, usize) {
        let base: usize = self.nrow_per_file[..j].iter().sum();
        (base, base + self.nrow_per_file[j])
    }

    /// The file owning serial index `i`, and the row index within that
    /// file.
    pub fn serial_to_local(&self, i: usize) -> Result<(&str, usize)> {
        let total = self.total_rows();

        if i >= total {
            return Err(DataTableError::OutOfRange { index: i, limit: total });
        }

        let mut base = 0;

        for (name, n) in self.files.iter().zip(&self.nrow_per_file) {
            let past_base = base;
            base += n;

            if i < base {
                return Ok((name.as_str(), i - past_base));
            }
        }

        Err(DataTableError::InternalConsistency(format!(
            "serial index {i} is not owned by any file"
        )))
    }

    pub fn local_to_serial(&self, file: &str, i: usize) -> Result<usize> {
        let j = self.file_position(file)?;
        let (base, end) = self.serial_range(j);

        if i >= end - base {
            return Err(DataTableError::OutOfRange {
                index: i,
                limit: end - base,
            });
        }

        Ok(base + i)
    }

    /// The serial indices owned by `file`, rebased to row indices within
    /// that file. Order is preserved.
    pub fn select_for_file(&self, file: &str, serial: &[usize]) -> Result<Vec<usize>> {
        let (base, end) = self.serial_range(self.file_position(file)?);

        Ok(serial
            .iter()
            .filter(|i| (base..end).contains(*i))
            .map(|i| i - base)
            .collect())
    }
}
