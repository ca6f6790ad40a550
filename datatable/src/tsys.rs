// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Transfer of system temperatures from a calibration table.

A Tsys calibration table samples each antenna and atmospheric-calibration
spectral window at its own times. For each science row of a data table the
calibration spectra are averaged over the channels that cover the science
window, skipping flagged channels, and interpolated linearly in time to the
row's timestamp. Outside the range of calibration times the nearest edge
value is used.

The calibration table has these columns:

| column | type | content |
|---|---|---|
| `FIELD_ID` | int | field of the measurement |
| `SPECTRAL_WINDOW_ID` | int | spectral window of the measurement |
| `TIME` | double | time of the measurement, in seconds |
| `ANTENNA1` | int | antenna |
| `FPARAM` | double, (npol, nchan) | Tsys spectrum |
| `FLAG` | int, (npol, nchan) | nonzero where `FPARAM` is flagged |

*/

use log::{debug, info};
use ndarray::Array2;
use sdindex_coltable::{ColumnDesc, DataType, Table, TableDesc};
use std::collections::BTreeSet;
use std::time::Instant;

use crate::errors::{DataTableError, Result};
use crate::schema;
use crate::table::DataTable;

pub const CAL_FIELD_ID: &str = "FIELD_ID";
pub const CAL_SPECTRAL_WINDOW_ID: &str = "SPECTRAL_WINDOW_ID";
pub const CAL_TIME: &str = "TIME";
pub const CAL_ANTENNA: &str = "ANTENNA1";
pub const CAL_FPARAM: &str = "FPARAM";
pub const CAL_FLAG: &str = "FLAG";

pub const ATMOSPHERE_INTENT: &str = "ATMOSPHERE";

const SECONDS_PER_DAY: f64 = 86400.;

pub fn cal_table_desc() -> TableDesc {
    TableDesc::new()
        .with_column(ColumnDesc::scalar(CAL_FIELD_ID, DataType::Int, "Field ID"))
        .with_column(ColumnDesc::scalar(
            CAL_SPECTRAL_WINDOW_ID,
            DataType::Int,
            "Spectral window ID",
        ))
        .with_column(ColumnDesc::scalar(CAL_TIME, DataType::Double, "Time").with_unit("s"))
        .with_column(ColumnDesc::scalar(CAL_ANTENNA, DataType::Int, "Antenna"))
        .with_column(ColumnDesc::array(CAL_FPARAM, DataType::Double, 2, "Tsys").with_unit("K"))
        .with_column(ColumnDesc::array(CAL_FLAG, DataType::Int, 2, "Flags"))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldInfo {
    pub id: i32,
    pub name: String,
    /// The name with characters that are awkward in file names replaced.
    pub clean_name: String,
    pub intents: Vec<String>,
    /// Right ascension and declination, in radians.
    pub direction: (f64, f64),
}

impl FieldInfo {
    pub fn has_intent(&self, intent: &str) -> bool {
        self.intents.iter().any(|i| i == intent)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpwInfo {
    pub id: i32,
    pub chan_freqs: Vec<f64>,
    pub is_science: bool,
    /// For each polarization of the data, the index of the matching
    /// polarization in the calibration spectra.
    pub corr_index: Vec<usize>,
}

/// What the calibration transfer needs to know about the observation a data
/// table was filled from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationInfo {
    pub name: String,
    pub antennas: Vec<i32>,
    pub fields: Vec<FieldInfo>,
    pub spws: Vec<SpwInfo>,
}

impl ObservationInfo {
    pub fn field(&self, id: i32) -> Result<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| f.id == id)
            .ok_or(DataTableError::UnknownField(id))
    }

    pub fn spw(&self, id: i32) -> Result<&SpwInfo> {
        self.spws
            .iter()
            .find(|s| s.id == id)
            .ok_or(DataTableError::UnknownSpectralWindow(id))
    }
}

/// How the calibration fields are chosen.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldSelection {
    /// The field nearest to the target.
    Nearest,

    /// A comma-separated list of field names or ids.
    Named(String),
}

impl FieldSelection {
    pub fn parse(text: &str) -> FieldSelection {
        if text.eq_ignore_ascii_case("nearest") {
            FieldSelection::Nearest
        } else {
            FieldSelection::Named(text.to_owned())
        }
    }
}

/// The angle between two directions given as (longitude, latitude) in
/// radians.
pub fn angular_separation(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (l1, b1) = a;
    let (l2, b2) = b;
    let dl = l2 - l1;

    let x = (b2.cos() * dl.sin()).powi(2)
        + (b1.cos() * b2.sin() - b1.sin() * b2.cos() * dl.cos()).powi(2);
    let y = b1.sin() * b2.sin() + b1.cos() * b2.cos() * dl.cos();
    x.sqrt().atan2(y)
}

/// The ids of the fields whose calibration applies to `target_field`.
///
/// For `Nearest`: the target itself if it has the ATMOSPHERE intent;
/// otherwise the atmospheric fields named `<target>_OFF_...`; otherwise the
/// atmospheric field closest on the sky, the first one found winning ties.
pub fn select_cal_fields(
    info: &ObservationInfo,
    target_field: i32,
    selection: &FieldSelection,
) -> Result<Vec<i32>> {
    let pattern = match selection {
        FieldSelection::Named(p) => p,
        FieldSelection::Nearest => return nearest_fields(info, target_field),
    };

    let wanted: Vec<&str> = pattern.split(',').map(|s| s.trim()).collect();

    Ok(info
        .fields
        .iter()
        .filter(|f| wanted.iter().any(|w| *w == f.name || *w == f.id.to_string()))
        .map(|f| f.id)
        .collect())
}

fn nearest_fields(info: &ObservationInfo, target_field: i32) -> Result<Vec<i32>> {
    let target = info.field(target_field)?;

    if target.has_intent(ATMOSPHERE_INTENT) {
        return Ok(vec![target_field]);
    }

    let atm: Vec<&FieldInfo> = info
        .fields
        .iter()
        .filter(|f| f.has_intent(ATMOSPHERE_INTENT))
        .collect();

    let prefix = format!("{}_OFF_", target.clean_name);
    let off: Vec<i32> = atm
        .iter()
        .filter(|f| f.clean_name.starts_with(&prefix))
        .map(|f| f.id)
        .collect();

    if !off.is_empty() {
        return Ok(off);
    }

    let mut best: Option<(f64, i32)> = None;

    for f in &atm {
        let r = angular_separation(target.direction, f.direction);

        if best.map_or(true, |(rmin, _)| r < rmin) {
            best = Some((r, f.id));
        }
    }

    match best {
        Some((_, id)) => Ok(vec![id]),
        None => Err(DataTableError::NoNearestField),
    }
}

/// The inclusive channel range of `atm` that covers the frequency range of
/// `science`. The range always spans at least two channels.
pub fn map_spwchans(atm: &SpwInfo, science: &SpwInfo) -> Result<(usize, usize)> {
    for s in [atm, science] {
        if s.chan_freqs.is_empty() {
            return Err(DataTableError::InternalConsistency(format!(
                "spectral window {} has no channels",
                s.id
            )));
        }
    }

    let fmin = science.chan_freqs.iter().copied().fold(f64::INFINITY, f64::min);
    let fmax = science.chan_freqs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let dist = |f: f64| -> Vec<f64> { atm.chan_freqs.iter().map(|c| (c - f).abs()).collect() };

    let dmin = dist(fmin);
    let best = dmin.iter().copied().fold(f64::INFINITY, f64::min);
    let min_chan = dmin.iter().position(|d| *d == best).unwrap_or(0);

    let dmax = dist(fmax);
    let best = dmax.iter().copied().fold(f64::INFINITY, f64::min);
    let max_chan = dmax.iter().rposition(|d| *d == best).unwrap_or(0);

    let start = min_chan.min(max_chan);
    let mut end = min_chan.max(max_chan);

    if end == start {
        end = start + 1;
    }

    Ok((start, end))
}

/// Average a calibration spectrum over channels `start..=end` for each of
/// the polarizations in `corr_index`, skipping flagged channels. A
/// polarization with every channel flagged averages to zero. `end` is
/// clipped to the spectrum, but `start` must lie within it.
pub fn channel_average(
    fparam: &Array2<f64>,
    flag: &Array2<i32>,
    corr_index: &[usize],
    start: usize,
    end: usize,
) -> Result<Vec<f64>> {
    if fparam.shape() != flag.shape() {
        return Err(DataTableError::InvalidValue {
            column: CAL_FLAG.to_owned(),
            reason: format!(
                "flag shape {:?} does not match Tsys shape {:?}",
                flag.shape(),
                fparam.shape()
            ),
        });
    }

    let (npol, nchan) = fparam.dim();

    if start >= nchan {
        return Err(DataTableError::OutOfRange {
            index: start,
            limit: nchan,
        });
    }

    let mut result = Vec::with_capacity(corr_index.len());

    for &p in corr_index {
        if p >= npol {
            return Err(DataTableError::OutOfRange { index: p, limit: npol });
        }

        let mut sum = 0.;
        let mut n = 0;

        for c in start..=end.min(nchan.saturating_sub(1)) {
            if flag[[p, c]] == 0 {
                sum += fparam[[p, c]];
                n += 1;
            }
        }

        result.push(if n > 0 { sum / n as f64 } else { 0. });
    }

    Ok(result)
}

/// Interpolate `values`, sampled at the ascending `times`, to `tref`.
///
/// Before the first sample the first value is returned and after the last
/// sample the last one. A sample exactly at `tref` is returned as-is.
pub fn interpolate(values: &[Vec<f64>], times: &[f64], tref: f64) -> Vec<f64> {
    let n = values.len().min(times.len());

    if n == 0 {
        return Vec::new();
    }

    let idx = times[..n].partition_point(|t| *t < tref);

    if idx == 0 {
        return values[0].clone();
    }

    if idx == n {
        return values[n - 1].clone();
    }

    if times[idx] == tref {
        return values[idx].clone();
    }

    let t1 = times[idx] - tref;
    let t0 = tref - times[idx - 1];
    let dt = times[idx] - times[idx - 1];

    values[idx]
        .iter()
        .zip(&values[idx - 1])
        .map(|(hi, lo)| (hi * t0 + lo * t1) / dt)
        .collect()
}

struct CalRow {
    spw: i32,
    antenna: i32,
    time: f64,
    fparam: Array2<f64>,
    flag: Array2<i32>,
}

fn read_cal_rows(cal: &Table, fields: &[i32]) -> Result<Vec<CalRow>> {
    let sel = cal.query(|t, r| Ok(fields.contains(&t.get_cell::<i32>(CAL_FIELD_ID, r)?)))?;
    let mut rows = Vec::with_capacity(sel.n_rows());

    for r in 0..sel.n_rows() {
        rows.push(CalRow {
            spw: sel.get_cell(CAL_SPECTRAL_WINDOW_ID, r)?,
            antenna: sel.get_cell(CAL_ANTENNA, r)?,
            time: sel.get_cell(CAL_TIME, r)?,
            fparam: sel.get_cell(CAL_FPARAM, r)?,
            flag: sel.get_cell(CAL_FLAG, r)?,
        });
    }

    Ok(rows)
}

impl DataTable {
    /// Fill the TSYS column of the rows of `target_field` from the
    /// calibration table `cal`.
    ///
    /// `spw_map[spw_to]` names the calibration spectral window whose
    /// measurements apply to science window `spw_to`. Returns the number of
    /// rows updated.
    pub fn transfer_calibration(
        &mut self,
        info: &ObservationInfo,
        cal: &Table,
        spw_map: &[i32],
        target_field: i32,
        selection: &FieldSelection,
    ) -> Result<usize> {
        let t0 = Instant::now();
        info!("to_fieldid={}", target_field);
        let from_fields = select_cal_fields(info, target_field, selection)?;
        info!("from_fields = {:?}", from_fields);

        let cal_rows = read_cal_rows(cal, &from_fields)?;
        let atm_spws: BTreeSet<i32> = cal_rows.iter().map(|c| c.spw).collect();

        let dt_antenna: Vec<i32> = self.get_column(schema::ANTENNA)?;
        let dt_spw: Vec<i32> = self.get_column(schema::IF)?;
        let dt_field: Vec<i32> = self.get_column(schema::FIELD_ID)?;
        let dt_time: Vec<f64> = self.get_column(schema::TIME)?;
        let mut n_updated = 0;

        for (spw_to, spw_from) in spw_map.iter().enumerate() {
            let spw_to = spw_to as i32;

            if !atm_spws.contains(spw_from) {
                continue;
            }

            if !info.spws.iter().any(|s| s.id == spw_to && s.is_science) {
                continue;
            }

            let atm_spw = info.spw(*spw_from)?;
            let science_spw = info.spw(spw_to)?;
            let (start, end) = map_spwchans(atm_spw, science_spw)?;
            info!(
                "Transfer Tsys from spw {} (chans: {}~{}) to {}",
                spw_from, start, end, spw_to
            );

            for ant in &info.antennas {
                let mut samples = Vec::new();

                for c in cal_rows.iter().filter(|c| c.spw == *spw_from && c.antenna == *ant) {
                    let avg = channel_average(
                        &c.fparam,
                        &c.flag,
                        &science_spw.corr_index,
                        start,
                        end,
                    )?;
                    samples.push((c.time, avg));
                }

                if samples.is_empty() {
                    continue;
                }

                samples.sort_by(|a, b| a.0.total_cmp(&b.0));
                let (times, atsys): (Vec<f64>, Vec<Vec<f64>>) = samples.into_iter().unzip();

                let dtrows: Vec<usize> = (0..self.row_count())
                    .filter(|i| {
                        dt_field[*i] == target_field
                            && dt_antenna[*i] == *ant
                            && dt_spw[*i] == spw_to
                    })
                    .collect();
                debug!("ant {} spw {}: {} rows", ant, spw_to, dtrows.len());

                for i in dtrows {
                    let tsys = if atsys.len() == 1 {
                        atsys[0].clone()
                    } else {
                        interpolate(&atsys, &times, dt_time[i] * SECONDS_PER_DAY)
                    };

                    self.put_tsys(i, tsys)?;
                    n_updated += 1;
                }
            }
        }

        info!(
            "transfer_calibration for {}: {} rows, elapsed {:?}",
            info.name,
            n_updated,
            t0.elapsed()
        );
        Ok(n_updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::observation;
    use ndarray::array;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn interpolation() {
        let v = vec![vec![2.0], vec![4.0]];
        let t = [10., 20.];
        assert_eq!(interpolate(&v, &t, 15.), vec![3.0]);
        assert_eq!(interpolate(&v, &t, 5.), vec![2.0]);
        assert_eq!(interpolate(&v, &t, 25.), vec![4.0]);
        assert_eq!(interpolate(&v, &t, 10.), vec![2.0]);
        assert_eq!(interpolate(&v, &t, 20.), vec![4.0]);
        assert!(interpolate(&[], &[], 1.).is_empty());

        let v = vec![vec![0., 10.], vec![4., 20.], vec![8., 0.]];
        assert!(close(&interpolate(&v, &[0., 4., 8.], 6.), &[6., 10.]));
    }

    #[test]
    fn separation() {
        use std::f64::consts::{FRAC_PI_2, PI};
        assert!((angular_separation((0., 0.), (0., FRAC_PI_2)) - FRAC_PI_2).abs() < 1e-12);
        assert!((angular_separation((0., 0.), (PI, 0.)) - PI).abs() < 1e-12);
        assert!(angular_separation((1., 0.3), (1., 0.3)).abs() < 1e-12);
    }

    fn spw(id: i32, chan_freqs: Vec<f64>, is_science: bool) -> SpwInfo {
        SpwInfo {
            id,
            chan_freqs,
            is_science,
            corr_index: vec![0, 1],
        }
    }

    #[test]
    fn channel_mapping() {
        let atm = spw(9, (0..10).map(|i| 100. + i as f64).collect(), false);
        let sci = spw(17, vec![103.2, 104.0, 105.9], true);
        assert_eq!(map_spwchans(&atm, &sci).unwrap(), (3, 6));

        // Descending frequencies give the same ordered range.
        let atm_rev = spw(9, (0..10).map(|i| 109. - i as f64).collect(), false);
        assert_eq!(map_spwchans(&atm_rev, &sci).unwrap(), (3, 6));

        let narrow = spw(18, vec![104.1], true);
        assert_eq!(map_spwchans(&atm, &narrow).unwrap(), (4, 5));

        assert!(map_spwchans(&spw(1, vec![], false), &sci).is_err());
    }

    #[test]
    fn masked_average() {
        let fparam = array![[1., 10., 20., 1.], [5., 30., 50., 5.]];
        let flag = array![[0, 0, 0, 0], [0, 0, 1, 0]];
        assert_eq!(
            channel_average(&fparam, &flag, &[0, 1], 1, 2).unwrap(),
            vec![15., 30.]
        );
        assert_eq!(channel_average(&fparam, &flag, &[1], 2, 2).unwrap(), vec![0.]);
        assert_eq!(channel_average(&fparam, &flag, &[0], 3, 4).unwrap(), vec![1.]);
        assert!(channel_average(&fparam, &flag, &[2], 0, 1).is_err());
    }

    #[test]
    fn average_window_past_spectrum() {
        let fparam = array![[1., 10., 20., 1.]];
        let flag = Array2::<i32>::zeros((1, 4));
        assert!(matches!(
            channel_average(&fparam, &flag, &[0], 4, 6),
            Err(DataTableError::OutOfRange { index: 4, limit: 4 })
        ));
        assert!(matches!(
            channel_average(&Array2::zeros((1, 0)), &Array2::zeros((1, 0)), &[0], 0, 0),
            Err(DataTableError::OutOfRange { index: 0, limit: 0 })
        ));
    }

    fn field(id: i32, name: &str, intents: &[&str], direction: (f64, f64)) -> FieldInfo {
        FieldInfo {
            id,
            name: name.to_owned(),
            clean_name: name.to_owned(),
            intents: intents.iter().map(|s| s.to_string()).collect(),
            direction,
        }
    }

    fn obs_info(fields: Vec<FieldInfo>) -> ObservationInfo {
        ObservationInfo {
            name: "uid___A002.ms".to_owned(),
            antennas: vec![0, 1],
            fields,
            spws: vec![
                spw(9, vec![100., 101., 102., 103.], false),
                spw(17, vec![101.1, 101.5, 101.9], true),
            ],
        }
    }

    #[test]
    fn field_selection() {
        let info = obs_info(vec![
            field(0, "M100", &["TARGET"], (0., 0.)),
            field(1, "cal_far", &[ATMOSPHERE_INTENT], (1.0, 0.)),
            field(2, "cal_near", &[ATMOSPHERE_INTENT], (0.1, 0.)),
            field(3, "cal_near_too", &[ATMOSPHERE_INTENT], (-0.1, 0.)),
            field(4, "M100_OFF_0", &[ATMOSPHERE_INTENT], (2.0, 0.)),
            field(5, "Sky", &[ATMOSPHERE_INTENT, "TARGET"], (0., 1.)),
            field(6, "NGC253", &["TARGET"], (0.5, 0.)),
        ]);

        let near = FieldSelection::parse("NEAREST");
        assert_eq!(near, FieldSelection::Nearest);
        assert_eq!(select_cal_fields(&info, 5, &near).unwrap(), vec![5]);
        assert_eq!(select_cal_fields(&info, 0, &near).unwrap(), vec![4]);
        assert_eq!(select_cal_fields(&info, 6, &near).unwrap(), vec![2]);
        assert!(matches!(
            select_cal_fields(&info, 42, &near),
            Err(DataTableError::UnknownField(42))
        ));

        let named = FieldSelection::parse("cal_far, 3");
        assert_eq!(select_cal_fields(&info, 0, &named).unwrap(), vec![1, 3]);

        let lonely = obs_info(vec![field(0, "M100", &["TARGET"], (0., 0.))]);
        assert!(matches!(
            select_cal_fields(&lonely, 0, &near),
            Err(DataTableError::NoNearestField)
        ));
    }

    #[test]
    fn nearest_ties_go_to_first() {
        let info = obs_info(vec![
            field(0, "M100", &["TARGET"], (0., 0.)),
            field(2, "a", &[ATMOSPHERE_INTENT], (0.1, 0.)),
            field(3, "b", &[ATMOSPHERE_INTENT], (-0.1, 0.)),
        ]);
        assert_eq!(
            select_cal_fields(&info, 0, &FieldSelection::Nearest).unwrap(),
            vec![2]
        );
    }

    fn add_cal_row(
        cal: &mut Table,
        (fld, spw, time, ant): (i32, i32, f64, i32),
        fparam: Array2<f64>,
        flag: Array2<i32>,
    ) {
        let r = cal.n_rows();
        cal.add_rows(1).unwrap();
        cal.put_cell(CAL_FIELD_ID, r, fld).unwrap();
        cal.put_cell(CAL_SPECTRAL_WINDOW_ID, r, spw).unwrap();
        cal.put_cell(CAL_TIME, r, time).unwrap();
        cal.put_cell(CAL_ANTENNA, r, ant).unwrap();
        cal.put_cell(CAL_FPARAM, r, fparam).unwrap();
        cal.put_cell(CAL_FLAG, r, flag).unwrap();
    }

    #[test]
    fn transfer() {
        let info = obs_info(vec![
            field(1, "M100", &["TARGET"], (0., 0.)),
            field(2, "M100_OFF_0", &[ATMOSPHERE_INTENT], (0.01, 0.)),
            field(3, "other", &[ATMOSPHERE_INTENT], (0.001, 0.)),
        ]);

        let mut cal = Table::new_memory(cal_table_desc(), 0);
        let no_flags = Array2::<i32>::zeros((2, 4));
        // Out of time order on purpose.
        add_cal_row(
            &mut cal,
            (2, 9, 200., 0),
            array![[1., 30., 40., 1.], [5., 50., 70., 5.]],
            no_flags.clone(),
        );
        add_cal_row(
            &mut cal,
            (2, 9, 100., 0),
            array![[1., 10., 20., 1.], [5., 30., 50., 5.]],
            array![[0, 0, 0, 0], [0, 0, 1, 0]],
        );
        add_cal_row(
            &mut cal,
            (3, 9, 150., 0),
            Array2::from_elem((2, 4), 1000.),
            no_flags.clone(),
        );
        add_cal_row(
            &mut cal,
            (2, 9, 100., 1),
            Array2::from_elem((2, 4), 7.),
            no_flags,
        );

        let mut dt = DataTable::new();
        dt.append_observations(&[
            observation(0, 0, 17, 1, 150. / SECONDS_PER_DAY),
            observation(1, 0, 17, 1, 50. / SECONDS_PER_DAY),
            observation(2, 0, 17, 1, 300. / SECONDS_PER_DAY),
            observation(3, 0, 17, 5, 150. / SECONDS_PER_DAY),
            observation(4, 1, 17, 1, 150. / SECONDS_PER_DAY),
            observation(5, 0, 18, 1, 150. / SECONDS_PER_DAY),
        ])
        .unwrap();

        let mut spw_map = vec![-1; 19];
        spw_map[17] = 9;
        spw_map[18] = 9;

        let n = dt
            .transfer_calibration(&info, &cal, &spw_map, 1, &FieldSelection::Nearest)
            .unwrap();
        assert_eq!(n, 4);

        let tsys = |r| dt.get_cell::<Vec<f64>>(schema::TSYS, r).unwrap();
        assert!(close(&tsys(0), &[25., 45.]));
        assert!(close(&tsys(1), &[15., 30.]));
        assert!(close(&tsys(2), &[35., 60.]));
        assert_eq!(tsys(3), vec![100., 110.]);
        assert!(close(&tsys(4), &[7., 7.]));
        // Spectral window 18 is not a science window of this observation.
        assert_eq!(tsys(5), vec![100., 110.]);
    }
}
