// Copyright 2017-2026 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*!
Typed column tables.

A [`Table`] is a set of named, typed columns sharing a row count, plus a set
of string-valued table keywords. Cells are scalars (int, double, string) or
n-dimensional int/double arrays whose shapes may vary from row to row. Tables
live in memory and may be backed by a snapshot directory on disk; nothing is
written to disk except by an explicit `flush()` or `copy_to()`.

```rust
use sdindex_coltable::{ColumnDesc, DataType, Table, TableDesc};

let desc = TableDesc::new()
    .with_column(ColumnDesc::scalar("SCAN", DataType::Int, "Scan number"))
    .with_column(ColumnDesc::array("TSYS", DataType::Double, 1, "Tsys").with_unit("K"));

let mut t = Table::new_memory(desc, 0);
t.add_rows(2).unwrap();
t.put_cell("TSYS", 1, vec![150.0, 152.5]).unwrap();
assert_eq!(t.get_cell::<Vec<f64>>("TSYS", 1).unwrap(), vec![150.0, 152.5]);
```

*/

pub mod desc;
pub mod errors;
pub mod lock;
pub mod snapshot;
pub mod table;
pub mod types;

pub use desc::{ColumnDesc, TableDesc};
pub use errors::{Result, TableError};
pub use lock::{TableLock, DEFAULT_LOCK_TIMEOUT};
pub use table::{Table, TableOpenMode};
pub use types::{ArrayElement, CellData, CellValue, DataType};
