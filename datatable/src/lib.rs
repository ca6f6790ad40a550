// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The scan-metadata index for single-dish radio data.

A [`DataTable`] holds one row per integration of a dataset. Each row pairs
observational descriptors that are fixed once the table is filled (time,
pointing, spectral window, system temperature, ...) with pipeline state
that later processing stages update (statistics, flags, baseline masks,
position group membership). The two halves live in separate stores, a
read-only one and a read-write one, so that the read-write half can be
written back on its own.

Table keywords cache the groupings that processing stages compute: time
groups per antenna and spectral window, position groups, and the time gaps
between them. A [`RowIndexTranslator`] maps between serial row numbers
spanning several per-file tables and row numbers within a single file.

```rust
use sdindex_datatable::{DataTable, Observation, schema};

let mut dt = DataTable::new();
let obs = Observation { npol: 2, tsys: vec![150.0, 160.0], ..Default::default() };
dt.append_observations(&[obs.clone(), obs]).unwrap();
dt.put_mask_list(1, &[[10, 40]]).unwrap();

assert_eq!(dt.row_count(), 2);
assert!(dt.get_mask_list(0).unwrap().is_empty());
assert!(dt.put_cell(schema::TSYS, 0, vec![1.0, 2.0]).is_err());
```

*/

pub mod columns;
pub mod errors;
pub mod flags;
pub mod flush;
pub mod groups;
pub mod indexer;
pub mod keyword;
pub mod schema;
pub mod table;
pub mod tsys;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{DataTableError, Result};
pub use flush::FlushOptions;
pub use groups::{
    GroupMembers, PositionEntry, TimeGap, TimeGranularity, TimeGroupAssignment, TimeTable,
    TimeTableSelector,
};
pub use indexer::RowIndexTranslator;
pub use keyword::KeywordValue;
pub use schema::{ColumnAccess, Observation};
pub use table::{DataTable, OpenMode};
pub use tsys::{FieldInfo, FieldSelection, ObservationInfo, SpwInfo};
