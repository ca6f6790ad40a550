// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The on-disk snapshot format.

A table on disk is a directory holding a single file, `table.dat`:

```text
magic "SDIXTBL\0" | version: u32
n_columns: u64 | per column: name, type code: u8, ndim: u32, comment, keywords
n_rows: u64
per column, per row: one cell
n_keywords: u64 | per keyword: name, value
```

All integers are big-endian, and strings and arrays are framed with a `u64`
length as done by `sdindex_core::io`. Array cells are written as their shape
followed by their elements in logical (row-major) order.

*/

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{ArrayD, IxDyn};
use sdindex_core::io::{EofReadExactExt, FramedReadExt, FramedWriteExt};
use sdindex_core::num::shape_size;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::desc::{ColumnDesc, TableDesc};
use crate::errors::{Result, TableError};
use crate::types::{CellValue, DataType};

const MAGIC: &[u8; 8] = b"SDIXTBL\0";
const VERSION: u32 = 1;

pub const DATA_FILE_NAME: &str = "table.dat";

/// Everything a snapshot holds.
#[derive(Debug)]
pub(crate) struct SnapshotContents {
    pub desc: TableDesc,
    pub n_rows: usize,
    pub columns: Vec<Vec<CellValue>>,
    pub keywords: BTreeMap<String, String>,
}

pub(crate) fn data_path(dir: &Path) -> PathBuf {
    dir.join(DATA_FILE_NAME)
}

/// Whether `dir` looks like a table snapshot.
pub fn is_table_dir<P: AsRef<Path>>(dir: P) -> bool {
    data_path(dir.as_ref()).is_file()
}

fn write_cell<W: Write>(dest: &mut W, cell: &CellValue) -> Result<()> {
    match cell {
        CellValue::Int(v) => dest.write_i32::<BigEndian>(*v)?,
        CellValue::Double(v) => dest.write_f64::<BigEndian>(*v)?,
        CellValue::String(s) => dest.write_framed_str(s)?,
        CellValue::IntArray(a) => {
            let shape: Vec<u64> = a.shape().iter().map(|n| *n as u64).collect();
            dest.write_framed_u64s(&shape)?;
            let data: Vec<i32> = a.iter().cloned().collect();
            dest.write_framed_i32s(&data)?;
        }
        CellValue::DoubleArray(a) => {
            let shape: Vec<u64> = a.shape().iter().map(|n| *n as u64).collect();
            dest.write_framed_u64s(&shape)?;
            let data: Vec<f64> = a.iter().cloned().collect();
            dest.write_framed_f64s(&data)?;
        }
    }

    Ok(())
}

fn read_cell<R: Read>(src: &mut R, col: &ColumnDesc) -> Result<CellValue> {
    let cell = match (col.data_type(), col.ndim()) {
        (DataType::Int, 0) => CellValue::Int(src.read_i32::<BigEndian>()?),
        (DataType::Double, 0) => CellValue::Double(src.read_f64::<BigEndian>()?),
        (DataType::String, _) => CellValue::String(src.read_framed_string()?),
        (DataType::Int, _) => {
            let shape = read_shape(src)?;
            let data = src.read_framed_i32s()?;
            CellValue::IntArray(shaped(col, shape, data)?)
        }
        (DataType::Double, _) => {
            let shape = read_shape(src)?;
            let data = src.read_framed_f64s()?;
            CellValue::DoubleArray(shaped(col, shape, data)?)
        }
    };

    Ok(cell)
}

fn read_shape<R: Read>(src: &mut R) -> Result<Vec<usize>> {
    Ok(src.read_framed_u64s()?.into_iter().map(|n| n as usize).collect())
}

fn shaped<E>(col: &ColumnDesc, shape: Vec<usize>, data: Vec<E>) -> Result<ArrayD<E>> {
    if shape.len() != col.ndim() {
        return Err(TableError::Format(format!(
            "cell of column \"{}\" has {} dimensions, expected {}",
            col.name(),
            shape.len(),
            col.ndim()
        )));
    }

    if shape_size(&shape) != data.len() {
        return Err(TableError::Format(format!(
            "cell of column \"{}\" has shape {:?} but {} elements",
            col.name(),
            shape,
            data.len()
        )));
    }

    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| {
        TableError::Format(format!("bad array cell in column \"{}\": {}", col.name(), e))
    })
}

/// Write a snapshot into `dir`, creating the directory if needed and
/// replacing any previous snapshot there.
///
/// The data are written to a temporary file that is then renamed into place,
/// so a reader never sees a half-written table.
pub(crate) fn write_snapshot(
    dir: &Path,
    desc: &TableDesc,
    n_rows: usize,
    columns: &[Vec<CellValue>],
    keywords: &BTreeMap<String, String>,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    let final_path = data_path(dir);
    let tmp_path = dir.join(format!("{DATA_FILE_NAME}.tmp"));

    {
        let mut dest = BufWriter::new(fs::File::create(&tmp_path)?);

        dest.write_all(MAGIC)?;
        dest.write_u32::<BigEndian>(VERSION)?;

        dest.write_frame_len(desc.len())?;

        for col in desc.columns() {
            dest.write_framed_str(col.name())?;
            dest.write_u8(col.data_type() as u8)?;
            dest.write_u32::<BigEndian>(col.ndim() as u32)?;
            dest.write_framed_str(col.comment())?;
            dest.write_frame_len(col.keywords().len())?;

            for (k, v) in col.keywords() {
                dest.write_framed_str(k)?;
                dest.write_framed_str(v)?;
            }
        }

        dest.write_u64::<BigEndian>(n_rows as u64)?;

        for cells in columns {
            for cell in cells {
                write_cell(&mut dest, cell)?;
            }
        }

        dest.write_frame_len(keywords.len())?;

        for (k, v) in keywords {
            dest.write_framed_str(k)?;
            dest.write_framed_str(v)?;
        }

        dest.flush()?;
    }

    fs::rename(&tmp_path, &final_path)?;
    Ok(())
}

pub(crate) fn read_snapshot(dir: &Path) -> Result<SnapshotContents> {
    let mut src = BufReader::new(fs::File::open(data_path(dir))?);

    let mut magic = [0u8; 8];

    if !src.eof_read_exact::<TableError>(&mut magic)? {
        return Err(TableError::Format(format!(
            "snapshot \"{}\" is empty",
            dir.display()
        )));
    }

    if &magic != MAGIC {
        return Err(TableError::Format(format!(
            "\"{}\" is not a table snapshot",
            dir.display()
        )));
    }

    let version = src.read_u32::<BigEndian>()?;

    if version != VERSION {
        return Err(TableError::Format(format!(
            "unsupported snapshot version {version}"
        )));
    }

    let n_cols = src.read_frame_len()?;
    let mut desc = TableDesc::new();

    for _ in 0..n_cols {
        let name = src.read_framed_string()?;
        let data_type = DataType::try_from_code(src.read_u8()?)?;
        let ndim = src.read_u32::<BigEndian>()? as usize;
        let comment = src.read_framed_string()?;
        let mut col = ColumnDesc::array(&name, data_type, ndim, &comment);

        for _ in 0..src.read_frame_len()? {
            let k = src.read_framed_string()?;
            let v = src.read_framed_string()?;
            col = col.with_keyword(&k, &v);
        }

        desc.add_column(col);
    }

    let n_rows = src.read_u64::<BigEndian>()? as usize;
    let mut columns = Vec::with_capacity(desc.len());

    for col in desc.columns() {
        let mut cells = Vec::with_capacity(n_rows);

        for _ in 0..n_rows {
            cells.push(read_cell(&mut src, col)?);
        }

        columns.push(cells);
    }

    let mut keywords = BTreeMap::new();

    for _ in 0..src.read_frame_len()? {
        let k = src.read_framed_string()?;
        let v = src.read_framed_string()?;
        keywords.insert(k, v);
    }

    Ok(SnapshotContents {
        desc,
        n_rows,
        columns,
        keywords,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn desc() -> TableDesc {
        TableDesc::new()
            .with_column(ColumnDesc::scalar("NAME", DataType::String, "Name"))
            .with_column(
                ColumnDesc::array("SPEC", DataType::Double, 2, "Spectrum").with_unit("K"),
            )
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let columns = vec![
            vec![CellValue::String("a".to_owned()), CellValue::String("b".to_owned())],
            vec![
                CellValue::DoubleArray(array![[1., 2.], [3., 4.]].into_dyn()),
                CellValue::DoubleArray(ArrayD::zeros(IxDyn(&[0, 3]))),
            ],
        ];
        let mut keywords = BTreeMap::new();
        keywords.insert("K".to_owned(), "{\"a\": 1}".to_owned());

        assert!(!is_table_dir(dir.path()));
        write_snapshot(dir.path(), &desc(), 2, &columns, &keywords).unwrap();
        assert!(is_table_dir(dir.path()));
        assert!(!dir.path().join("table.dat.tmp").exists());

        let back = read_snapshot(dir.path()).unwrap();
        assert_eq!(back.desc, desc());
        assert_eq!(back.n_rows, 2);
        assert_eq!(back.columns, columns);
        assert_eq!(back.keywords, keywords);
    }

    #[test]
    fn bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(data_path(dir.path()), b"").unwrap();
        assert!(matches!(read_snapshot(dir.path()), Err(TableError::Format(_))));

        fs::write(data_path(dir.path()), b"NOTATABLE").unwrap();
        assert!(matches!(read_snapshot(dir.path()), Err(TableError::Format(_))));

        fs::write(data_path(dir.path()), b"SDIX").unwrap();
        assert!(matches!(read_snapshot(dir.path()), Err(TableError::Io(_))));
    }
}
