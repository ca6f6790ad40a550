// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

//! Fixtures shared by the unit tests.

use crate::schema::Observation;
use crate::table::DataTable;

/// A two-polarization integration on M100 with TSYS of 100 K and 110 K.
pub fn observation(row: i32, antenna: i32, spw: i32, field: i32, time: f64) -> Observation {
    Observation {
        row,
        scan: 1,
        spw,
        npol: 2,
        date: "2020/01/01/00:00:00".to_owned(),
        time,
        exposure: 1.0,
        ra: 185.73,
        dec: 15.82,
        az: 120.0,
        el: 45.0,
        nchan: 4,
        tsys: vec![100.0, 110.0],
        target: "M100".to_owned(),
        antenna,
        field_id: field,
        ..Default::default()
    }
}

/// A table of `n` integrations of antenna 0 on spectral window 17, one
/// second apart, with ROW numbered from zero. No keywords are set.
pub fn table_with_rows(n: usize) -> DataTable {
    let obs: Vec<Observation> = (0..n)
        .map(|i| observation(i as i32, 0, 17, 1, 58849.0 + i as f64 / 86400.0))
        .collect();

    let mut dt = DataTable::new();
    dt.append_observations(&obs).unwrap();
    dt
}
