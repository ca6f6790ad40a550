// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
The column layout of the two stores.

The read-only ("RO") store holds what was observed; nothing in the pipeline
changes it after ingest. The read-write ("RW") store holds state derived by
the pipeline. Both stores always have the same number of rows.

*/

use sdindex_coltable::{ColumnDesc, DataType, TableDesc};

pub const ROW: &str = "ROW";
pub const SCAN: &str = "SCAN";
pub const IF: &str = "IF";
pub const NPOL: &str = "NPOL";
pub const BEAM: &str = "BEAM";
pub const DATE: &str = "DATE";
pub const TIME: &str = "TIME";
pub const ELAPSED: &str = "ELAPSED";
pub const EXPOSURE: &str = "EXPOSURE";
pub const RA: &str = "RA";
pub const DEC: &str = "DEC";
pub const SHIFT_RA: &str = "SHIFT_RA";
pub const SHIFT_DEC: &str = "SHIFT_DEC";
pub const OFS_RA: &str = "OFS_RA";
pub const OFS_DEC: &str = "OFS_DEC";
pub const AZ: &str = "AZ";
pub const EL: &str = "EL";
pub const NCHAN: &str = "NCHAN";
pub const TSYS: &str = "TSYS";
pub const TARGET: &str = "TARGET";
pub const ANTENNA: &str = "ANTENNA";
pub const SRCTYPE: &str = "SRCTYPE";
pub const FIELD_ID: &str = "FIELD_ID";

pub const STATISTICS: &str = "STATISTICS";
pub const FLAG: &str = "FLAG";
pub const FLAG_PERMANENT: &str = "FLAG_PERMANENT";
pub const FLAG_SUMMARY: &str = "FLAG_SUMMARY";
pub const NMASK: &str = "NMASK";
pub const MASKLIST: &str = "MASKLIST";
pub const NOCHANGE: &str = "NOCHANGE";
pub const POSGRP: &str = "POSGRP";

pub const RO_COLUMNS: &[&str] = &[
    ROW, SCAN, IF, NPOL, BEAM, DATE, TIME, ELAPSED, EXPOSURE, RA, DEC, SHIFT_RA, SHIFT_DEC,
    OFS_RA, OFS_DEC, AZ, EL, NCHAN, TSYS, TARGET, ANTENNA, SRCTYPE, FIELD_ID,
];

pub const RW_COLUMNS: &[&str] = &[
    STATISTICS,
    FLAG,
    FLAG_PERMANENT,
    FLAG_SUMMARY,
    NMASK,
    MASKLIST,
    NOCHANGE,
    POSGRP,
];

/// Number of entries per polarization in the STATISTICS and FLAG columns.
///
/// STATISTICS: low-frequency RMS, new RMS, old RMS, new RMS diff, old RMS
/// diff, expected RMS, expected RMS. FLAG holds the corresponding flags.
/// In all flag columns 1 means valid and 0 invalid.
pub const NUM_STATISTICS: usize = 7;

/// Slots per polarization in the FLAG_PERMANENT column.
pub const NUM_PERMANENT_FLAGS: usize = 4;

pub const WEATHER_FLAG_INDEX: usize = 0;
pub const TSYS_FLAG_INDEX: usize = 1;
pub const USER_FLAG_INDEX: usize = 2;
pub const ONLINE_FLAG_INDEX: usize = 3;

/// Whether a column may be written through the public accessors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnAccess {
    ReadOnly,
    ReadWrite,
}

/// Which store a column lives in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Store {
    Ro,
    Rw,
}

/// How the cells of a column are encoded on top of the store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnKind {
    Plain,
    MaskList,
    NoChange,
}

pub fn store_of(name: &str) -> Option<Store> {
    if RO_COLUMNS.contains(&name) {
        Some(Store::Ro)
    } else if RW_COLUMNS.contains(&name) {
        Some(Store::Rw)
    } else {
        None
    }
}

pub fn kind_of(name: &str) -> ColumnKind {
    match name {
        MASKLIST => ColumnKind::MaskList,
        NOCHANGE => ColumnKind::NoChange,
        _ => ColumnKind::Plain,
    }
}

pub fn ro_table_desc() -> TableDesc {
    use DataType::*;

    TableDesc::new()
        .with_column(ColumnDesc::scalar(ROW, Int, "Row number"))
        .with_column(ColumnDesc::scalar(SCAN, Int, "Scan number"))
        .with_column(ColumnDesc::scalar(IF, Int, "IF number"))
        .with_column(ColumnDesc::scalar(NPOL, Int, "Number of Polarizations"))
        .with_column(ColumnDesc::scalar(BEAM, Int, "Beam number"))
        .with_column(ColumnDesc::scalar(DATE, String, "Date"))
        .with_column(ColumnDesc::scalar(TIME, Double, "Time in MJD").with_unit("d"))
        .with_column(ColumnDesc::scalar(ELAPSED, Double, "Elapsed time since first scan").with_unit("d"))
        .with_column(ColumnDesc::scalar(EXPOSURE, Double, "Exposure time").with_unit("s"))
        .with_column(ColumnDesc::scalar(RA, Double, "Right Ascension").with_unit("deg"))
        .with_column(ColumnDesc::scalar(DEC, Double, "Declination").with_unit("deg"))
        .with_column(ColumnDesc::scalar(SHIFT_RA, Double, "Shifted Right Ascension").with_unit("deg"))
        .with_column(ColumnDesc::scalar(SHIFT_DEC, Double, "Shifted Declination").with_unit("deg"))
        .with_column(ColumnDesc::scalar(OFS_RA, Double, "Offset Right Ascension").with_unit("deg"))
        .with_column(ColumnDesc::scalar(OFS_DEC, Double, "Offset Declination").with_unit("deg"))
        .with_column(ColumnDesc::scalar(AZ, Double, "Azimuth").with_unit("deg"))
        .with_column(ColumnDesc::scalar(EL, Double, "Elevation").with_unit("deg"))
        .with_column(ColumnDesc::scalar(NCHAN, Int, "Number of channels"))
        .with_column(ColumnDesc::array(TSYS, Double, 1, "Tsys").with_unit("K"))
        .with_column(ColumnDesc::scalar(TARGET, String, "Target name"))
        .with_column(ColumnDesc::scalar(ANTENNA, Int, "Antenna index"))
        .with_column(ColumnDesc::scalar(SRCTYPE, Int, "Source type enum"))
        .with_column(ColumnDesc::scalar(FIELD_ID, Int, "Field ID"))
}

pub fn rw_table_desc() -> TableDesc {
    use DataType::*;

    TableDesc::new()
        .with_column(ColumnDesc::array(STATISTICS, Double, 2, "Statistics"))
        .with_column(ColumnDesc::array(FLAG, Int, 2, "Flags"))
        .with_column(ColumnDesc::array(FLAG_PERMANENT, Int, 2, "Permanent flags"))
        .with_column(ColumnDesc::array(FLAG_SUMMARY, Int, 1, "Actual flag"))
        .with_column(ColumnDesc::scalar(NMASK, Int, "Number of mask regions"))
        .with_column(ColumnDesc::array(MASKLIST, Int, 2, "List of mask ranges"))
        .with_column(ColumnDesc::scalar(NOCHANGE, Int, "Unchanged row or not"))
        .with_column(ColumnDesc::scalar(POSGRP, Int, "Position group id"))
}

/// The observational descriptors of one integration.
///
/// Angles are in degrees, `time` and `elapsed` in days (MJD for `time`), and
/// `exposure` in seconds. `tsys` has one entry per polarization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    pub row: i32,
    pub scan: i32,
    pub spw: i32,
    pub npol: i32,
    pub beam: i32,
    pub date: String,
    pub time: f64,
    pub elapsed: f64,
    pub exposure: f64,
    pub ra: f64,
    pub dec: f64,
    pub shift_ra: f64,
    pub shift_dec: f64,
    pub ofs_ra: f64,
    pub ofs_dec: f64,
    pub az: f64,
    pub el: f64,
    pub nchan: i32,
    pub tsys: Vec<f64>,
    pub target: String,
    pub antenna: i32,
    pub srctype: i32,
    pub field_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_match_column_lists() {
        let ro = ro_table_desc();
        let rw = rw_table_desc();
        assert_eq!(ro.len(), RO_COLUMNS.len());
        assert_eq!(rw.len(), RW_COLUMNS.len());

        for (c, name) in ro.columns().iter().zip(RO_COLUMNS) {
            assert_eq!(c.name(), *name);
            assert_eq!(store_of(name), Some(Store::Ro));
        }

        for (c, name) in rw.columns().iter().zip(RW_COLUMNS) {
            assert_eq!(c.name(), *name);
            assert_eq!(store_of(name), Some(Store::Rw));
        }

        assert_eq!(store_of("BOGUS"), None);
        assert_eq!(ro.get(TSYS).unwrap().unit(), Some("K"));
        assert_eq!(kind_of(MASKLIST), ColumnKind::MaskList);
        assert_eq!(kind_of(FLAG), ColumnKind::Plain);
    }
}
