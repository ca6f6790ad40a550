// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
Position and time groupings, cached as table keywords.

Both groupings are computed elsewhere from a full analysis of the pointing
and timing columns. This module stores them as keywords of the read-write
store and reconstructs them on request, so that every pipeline stage sees
the same grouping.

Keywords used:

- `POSGRP_LIST`: `{"<ant>": {"<spw>": {"<pol>": [group ids]}}}`
- `POSGRP_REP`: `{"<group id>": representative row index}`
- `TIMETABLE_<SMALL|LARGE>_...`: `{"0": [[rows], [row indices]], "1": ...}`,
  one entry per time group in ascending group id order; see
  [`timetable_key`] for the rest of the name.
- `TIMEGAP_S`, `TIMEGAP_L`: `{"<ant>": {"<spw>": {"<pol>": [row indices]}}}`,
  or `{"<file>": {"<ant>": {"<spw>": {"<field>": [row indices]}}}}` for
  per-file gaps.

*/

use log::{debug, info, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use crate::errors::{DataTableError, Result};
use crate::keyword::KeywordValue;
use crate::schema;
use crate::table::DataTable;

pub const POSGRP_LIST_KEY: &str = "POSGRP_LIST";
pub const POSGRP_REP_KEY: &str = "POSGRP_REP";
pub const TIMEGAP_SMALL_KEY: &str = "TIMEGAP_S";
pub const TIMEGAP_LARGE_KEY: &str = "TIMEGAP_L";

/// The first element of a redirect entry in a position dictionary.
pub const REDIRECT_MARKER: i64 = -1;

/// The two gap thresholds at which time groups are computed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeGranularity {
    Small,
    Large,
}

impl TimeGranularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGranularity::Small => "SMALL",
            TimeGranularity::Large => "LARGE",
        }
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace dots so that a file name can be part of a keyword name.
pub fn normalize_file_name(name: &str) -> String {
    name.replace('.', "_")
}

/// Which time table is meant.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TimeTableSelector {
    pub antenna: i32,
    pub spw: i32,
    pub pol: Option<i32>,
    pub file: Option<String>,
    pub field: Option<i32>,
}

impl TimeTableSelector {
    pub fn new(antenna: i32, spw: i32) -> Self {
        TimeTableSelector {
            antenna,
            spw,
            ..Default::default()
        }
    }

    pub fn pol(mut self, pol: i32) -> Self {
        self.pol = Some(pol);
        self
    }

    pub fn file(mut self, file: &str) -> Self {
        self.file = Some(file.to_owned());
        self
    }

    pub fn field(mut self, field: i32) -> Self {
        self.field = Some(field);
        self
    }

    pub fn key(&self, granularity: TimeGranularity) -> String {
        timetable_key(
            granularity,
            self.antenna,
            self.spw,
            self.pol,
            self.file.as_deref(),
            self.field,
        )
    }
}

impl fmt::Display for TimeTableSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "antenna {} spw {}", self.antenna, self.spw)?;

        if let Some(p) = self.pol {
            write!(f, " pol {p}")?;
        }

        if let Some(ref n) = self.file {
            write!(f, " file {n}")?;
        }

        if let Some(fld) = self.field {
            write!(f, " field {fld}")?;
        }

        Ok(())
    }
}

/// The keyword name of a time table:
/// `TIMETABLE_<granularity>_[<file>_][FIELD<id>_]ANT<id>_SPW<id>[_POL<id>]`,
/// with dots in the file name replaced by underscores.
pub fn timetable_key(
    granularity: TimeGranularity,
    antenna: i32,
    spw: i32,
    pol: Option<i32>,
    file: Option<&str>,
    field: Option<i32>,
) -> String {
    let mut key = format!("TIMETABLE_{granularity}");

    if let Some(f) = file {
        key.push('_');
        key.push_str(&normalize_file_name(f));
    }

    if let Some(id) = field {
        key.push_str(&format!("_FIELD{id}"));
    }

    key.push_str(&format!("_ANT{antenna}_SPW{spw}"));

    if let Some(p) = pol {
        key.push_str(&format!("_POL{p}"));
    }

    key
}

/// The members of one group: the values of their ROW column and their row
/// indices in this table.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GroupMembers {
    pub rows: Vec<i64>,
    pub indices: Vec<i64>,
}

impl GroupMembers {
    fn to_keyword(&self) -> KeywordValue {
        KeywordValue::from(vec![self.rows.clone(), self.indices.clone()])
    }

    fn from_keyword(key: &str, v: &KeywordValue) -> Result<GroupMembers> {
        let malformed = || DataTableError::MalformedKeyword {
            key: key.to_owned(),
            reason: "expected a pair of int lists".to_owned(),
        };

        match v.as_list() {
            Some([rows, indices]) => Ok(GroupMembers {
                rows: rows.as_int_list().ok_or_else(malformed)?,
                indices: indices.as_int_list().ok_or_else(malformed)?,
            }),
            _ => Err(malformed()),
        }
    }
}

/// A time grouping at both granularities.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TimeTable {
    pub small: Vec<GroupMembers>,
    pub large: Vec<GroupMembers>,
}

/// A per-row group assignment at one granularity. `per_row[i]` is the group
/// of row index `i`; only groups listed in `group_ids` are tabulated.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TimeGroupAssignment {
    pub group_ids: Vec<i64>,
    pub per_row: Vec<i64>,
}

/// The rows at which large and small time gaps occur.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TimeGap {
    pub small: Vec<i64>,
    pub large: Vec<i64>,
}

/// One entry of a position dictionary.
///
/// For a representative row, `rows` and `indices` list the members of its
/// group. For any other member, the entry is a redirect: `rows` is
/// `[REDIRECT_MARKER, representative row]` and `indices` holds the
/// representative's row index.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PositionEntry {
    pub rows: Vec<i64>,
    pub indices: Vec<i64>,
}

impl PositionEntry {
    pub fn is_redirect(&self) -> bool {
        self.rows.len() == 2 && self.rows[0] == REDIRECT_MARKER && self.indices.len() == 1
    }

    /// The representative row this entry redirects to, if it is a redirect.
    pub fn representative(&self) -> Option<i64> {
        if self.is_redirect() {
            Some(self.rows[1])
        } else {
            None
        }
    }
}

fn tabulate(rows: &[i32], a: &TimeGroupAssignment) -> Vec<GroupMembers> {
    let ids: BTreeSet<i64> = a.group_ids.iter().copied().collect();
    let mut groups: BTreeMap<i64, GroupMembers> =
        ids.iter().map(|id| (*id, GroupMembers::default())).collect();

    for (idx, gid) in a.per_row.iter().enumerate() {
        if let Some(g) = groups.get_mut(gid) {
            g.rows.push(rows[idx] as i64);
            g.indices.push(idx as i64);
        }
    }

    groups.into_values().collect()
}

fn timetable_keyword(groups: &[GroupMembers]) -> KeywordValue {
    KeywordValue::Map(
        groups
            .iter()
            .enumerate()
            .map(|(i, g)| (i.to_string(), g.to_keyword()))
            .collect(),
    )
}

fn lookup<'a>(v: &'a KeywordValue, path: &[String]) -> Option<&'a KeywordValue> {
    path.iter().try_fold(v, |v, k| v.get(k))
}

fn max_map_key(key: &str, v: &KeywordValue) -> Result<Option<i64>> {
    let m = v.as_map().ok_or_else(|| DataTableError::MalformedKeyword {
        key: key.to_owned(),
        reason: "expected a map".to_owned(),
    })?;

    let mut max = None;

    for k in m.keys() {
        let id: i64 = k.parse().map_err(|_| DataTableError::MalformedKeyword {
            key: key.to_owned(),
            reason: format!("map key \"{k}\" is not an integer"),
        })?;
        max = Some(max.map_or(id, |m: i64| m.max(id)));
    }

    Ok(max)
}

impl DataTable {
    /// Tabulate and register the time grouping for `sel`.
    ///
    /// Each granularity is registered separately and an existing keyword is
    /// never replaced. Returns whether either keyword was written.
    /// Groups are ordered by ascending group id.
    pub fn set_timetable(
        &mut self,
        sel: &TimeTableSelector,
        small: &TimeGroupAssignment,
        large: &TimeGroupAssignment,
    ) -> Result<bool> {
        info!("set_timetable start");
        let t0 = Instant::now();

        for a in [small, large] {
            if a.per_row.len() > self.row_count() {
                return Err(DataTableError::OutOfRange {
                    index: a.per_row.len(),
                    limit: self.row_count(),
                });
            }
        }

        let rows: Vec<i32> = self.get_column(schema::ROW)?;
        let table = TimeTable {
            small: tabulate(&rows, small),
            large: tabulate(&rows, large),
        };
        info!("construct timetable: elapsed {:?}", t0.elapsed());
        trace!("timetable={:?}", table);

        let key_small = sel.key(TimeGranularity::Small);
        let key_large = sel.key(TimeGranularity::Large);
        debug!(
            "add time table: keys for small gap '{}' large gap '{}'",
            key_small, key_large
        );

        let small = timetable_keyword(&table.small);
        let large = timetable_keyword(&table.large);
        let wrote_small = self.register_keyword(&key_small, &small)?;
        let wrote_large = self.register_keyword(&key_large, &large)?;
        info!("set_timetable end: elapsed {:?}", t0.elapsed());
        Ok(wrote_small || wrote_large)
    }

    pub fn get_timetable(&self, sel: &TimeTableSelector) -> Result<TimeTable> {
        let key_small = sel.key(TimeGranularity::Small);
        let key_large = sel.key(TimeGranularity::Large);
        debug!(
            "get time table: keys for small gap '{}' large gap '{}'",
            key_small, key_large
        );

        if !(self.has_keyword(&key_small) && self.has_keyword(&key_large)) {
            return Err(DataTableError::TimeTableNotConfigured(sel.to_string()));
        }

        Ok(TimeTable {
            small: self.read_timetable(&key_small)?,
            large: self.read_timetable(&key_large)?,
        })
    }

    fn read_timetable(&self, key: &str) -> Result<Vec<GroupMembers>> {
        let v = self.get_keyword(key)?;
        let m = v.as_map().ok_or_else(|| DataTableError::MalformedKeyword {
            key: key.to_owned(),
            reason: "expected a map".to_owned(),
        })?;

        (0..m.len())
            .map(|i| {
                let g = m
                    .get(&i.to_string())
                    .ok_or_else(|| DataTableError::MalformedKeyword {
                        key: key.to_owned(),
                        reason: format!("group {i} is missing"),
                    })?;
                GroupMembers::from_keyword(key, g)
            })
            .collect()
    }

    /// The rows just before which time gaps occur for the given antenna,
    /// spw and polarization, or for the given file, antenna, spw and field
    /// if `file_field` is given. With `as_row`, values of the ROW column
    /// are returned rather than row indices.
    pub fn get_timegap(
        &self,
        antenna: i32,
        spw: i32,
        pol: i32,
        as_row: bool,
        file_field: Option<(&str, i32)>,
    ) -> Result<TimeGap> {
        let path: Vec<String> = match file_field {
            None => vec![antenna.to_string(), spw.to_string(), pol.to_string()],
            Some((file, field)) => vec![
                normalize_file_name(file),
                antenna.to_string(),
                spw.to_string(),
                field.to_string(),
            ],
        };

        let not_configured = || {
            let what = match file_field {
                None => format!("antenna {antenna} spw {spw} pol {pol}"),
                Some((file, field)) => {
                    format!("file {file} field {field} antenna {antenna} spw {spw}")
                }
            };
            DataTableError::TimeTableNotConfigured(what)
        };

        let mut gaps = Vec::with_capacity(2);

        for key in [TIMEGAP_SMALL_KEY, TIMEGAP_LARGE_KEY] {
            if !self.has_keyword(key) {
                return Err(not_configured());
            }

            let v = self.get_keyword(key)?;
            let indices = lookup(&v, &path)
                .ok_or_else(not_configured)?
                .as_int_list()
                .ok_or_else(|| DataTableError::MalformedKeyword {
                    key: key.to_owned(),
                    reason: "expected a list of row indices".to_owned(),
                })?;
            gaps.push(indices);
        }

        let large = gaps.pop().unwrap_or_default();
        let small = gaps.pop().unwrap_or_default();

        if !as_row {
            return Ok(TimeGap { small, large });
        }

        let rows: Vec<i32> = self.get_column(schema::ROW)?;
        let to_rows = |idxs: Vec<i64>| -> Result<Vec<i64>> {
            idxs.into_iter()
                .map(|i| {
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| rows.get(i))
                        .map(|r| *r as i64)
                        .ok_or_else(|| DataTableError::OutOfRange {
                            index: i.max(0) as usize,
                            limit: rows.len(),
                        })
                })
                .collect()
        };

        Ok(TimeGap {
            small: to_rows(small)?,
            large: to_rows(large)?,
        })
    }

    /// Register a position grouping for one antenna, spw and polarization.
    ///
    /// `members` maps each group id to the row indices in the group; the
    /// first index of each group becomes its representative. The POSGRP
    /// column of every member is set. Nothing is changed if any index is
    /// out of range or listed twice, any group is empty, the key is already
    /// registered, or any group id is already in use.
    pub fn register_position_groups(
        &mut self,
        antenna: i32,
        spw: i32,
        pol: i32,
        members: &BTreeMap<i64, Vec<usize>>,
    ) -> Result<()> {
        let nrow = self.row_count();
        let mut seen = BTreeSet::new();

        for (gid, idxs) in members {
            if idxs.is_empty() {
                return Err(DataTableError::InvalidValue {
                    column: schema::POSGRP.to_owned(),
                    reason: format!("position group {gid} has no members"),
                });
            }

            if let Some(bad) = idxs.iter().find(|i| **i >= nrow) {
                return Err(DataTableError::OutOfRange {
                    index: *bad,
                    limit: nrow,
                });
            }

            for i in idxs {
                if !seen.insert(*i) {
                    return Err(DataTableError::InvalidValue {
                        column: schema::POSGRP.to_owned(),
                        reason: format!("row {i} is listed in more than one position group"),
                    });
                }
            }
        }

        let mut list = if self.has_keyword(POSGRP_LIST_KEY) {
            self.get_keyword(POSGRP_LIST_KEY)?
        } else {
            KeywordValue::Map(BTreeMap::new())
        };

        let mut reps = if self.has_keyword(POSGRP_REP_KEY) {
            self.get_keyword(POSGRP_REP_KEY)?
        } else {
            KeywordValue::Map(BTreeMap::new())
        };

        let path = [antenna.to_string(), spw.to_string(), pol.to_string()];

        if lookup(&list, &path).is_some() {
            return Err(DataTableError::InvalidValue {
                column: schema::POSGRP.to_owned(),
                reason: format!(
                    "position groups of antenna {antenna} spw {spw} pol {pol} are already registered"
                ),
            });
        }

        let mut used = BTreeSet::new();
        collect_ints(&list, &mut used);

        if let Some(m) = reps.as_map() {
            used.extend(m.keys().filter_map(|k| k.parse::<i64>().ok()));
        }

        if let Some(gid) = members.keys().find(|g| used.contains(*g)) {
            return Err(DataTableError::InvalidValue {
                column: schema::POSGRP.to_owned(),
                reason: format!("position group id {gid} is already in use"),
            });
        }

        let ids: Vec<i64> = members.keys().copied().collect();
        set_path(POSGRP_LIST_KEY, &mut list, &path, KeywordValue::from(ids))?;

        for (gid, idxs) in members {
            set_path(
                POSGRP_REP_KEY,
                &mut reps,
                &[gid.to_string()],
                KeywordValue::from(idxs[0]),
            )?;
        }

        for (gid, idxs) in members {
            for i in idxs {
                self.put_cell(schema::POSGRP, *i, *gid as i32)?;
            }
        }

        self.put_keyword(POSGRP_LIST_KEY, &list)?;
        self.put_keyword(POSGRP_REP_KEY, &reps)?;
        Ok(())
    }

    /// Reconstruct the position groups of one antenna, spw and
    /// polarization.
    ///
    /// The result is keyed by the ROW value of each group's representative
    /// and lists the group's members. Every other member also gets a
    /// redirect entry pointing at its representative.
    pub fn get_posdict(
        &self,
        antenna: i32,
        spw: i32,
        pol: i32,
    ) -> Result<BTreeMap<i64, PositionEntry>> {
        let not_found = || DataTableError::GroupNotFound { antenna, spw, pol };

        if !self.has_keyword(POSGRP_LIST_KEY) {
            return Err(not_found());
        }

        let list = self.get_keyword(POSGRP_LIST_KEY)?;
        let mygrp: BTreeSet<i64> = lookup(
            &list,
            &[antenna.to_string(), spw.to_string(), pol.to_string()],
        )
        .ok_or_else(not_found)?
        .as_int_list()
        .ok_or_else(|| DataTableError::MalformedKeyword {
            key: POSGRP_LIST_KEY.to_owned(),
            reason: "expected a list of group ids".to_owned(),
        })?
        .into_iter()
        .collect();

        let reps = self.get_keyword(POSGRP_REP_KEY)?;
        let rows: Vec<i32> = self.get_column(schema::ROW)?;
        let posgrp: Vec<i32> = self.get_column(schema::POSGRP)?;

        let rep_of = |gid: i64| -> Result<usize> {
            reps.get(&gid.to_string())
                .and_then(|v| v.as_int())
                .and_then(|i| usize::try_from(i).ok())
                .filter(|i| *i < rows.len())
                .ok_or_else(|| DataTableError::MalformedKeyword {
                    key: POSGRP_REP_KEY.to_owned(),
                    reason: format!("no usable representative for group {gid}"),
                })
        };

        let mut posdict = BTreeMap::new();

        for gid in &mygrp {
            let rep = rep_of(*gid)?;
            posdict.insert(rows[rep] as i64, PositionEntry::default());
        }

        for (idx, grp) in posgrp.iter().enumerate() {
            let grp = *grp as i64;

            if !mygrp.contains(&grp) {
                continue;
            }

            let row = rows[idx] as i64;
            let rep = rep_of(grp)?;
            let key = rows[rep] as i64;

            let entry = posdict.get_mut(&key).ok_or_else(|| {
                DataTableError::InternalConsistency(format!(
                    "representative row {key} of position group {grp} is missing"
                ))
            })?;
            entry.rows.push(row);
            entry.indices.push(idx as i64);

            if row != key {
                posdict.insert(
                    row,
                    PositionEntry {
                        rows: vec![REDIRECT_MARKER, key],
                        indices: vec![rep as i64],
                    },
                );
            }
        }

        Ok(posdict)
    }

    /// The next unused position group id.
    pub fn position_group_id(&self) -> Result<i64> {
        if !self.has_keyword(POSGRP_REP_KEY) {
            return Ok(0);
        }

        let v = self.get_keyword(POSGRP_REP_KEY)?;
        Ok(max_map_key(POSGRP_REP_KEY, &v)?.map_or(0, |m| m + 1))
    }

    pub fn time_group_id_small(&self) -> Result<i64> {
        self.time_group_id(TimeGranularity::Small)
    }

    pub fn time_group_id_large(&self) -> Result<i64> {
        self.time_group_id(TimeGranularity::Large)
    }

    /// The next unused time group id: one more than the largest group index
    /// in any registered time table of this granularity.
    fn time_group_id(&self, granularity: TimeGranularity) -> Result<i64> {
        let prefix = format!("TIMETABLE_{granularity}_");
        let mut next = 0;

        for key in self.keyword_names() {
            if !key.starts_with(&prefix) {
                continue;
            }

            let v = self.get_keyword(&key)?;

            if let Some(m) = max_map_key(&key, &v)? {
                next = next.max(m + 1);
            }
        }

        Ok(next)
    }
}

/// Gather every int stored anywhere within `v`.
fn collect_ints(v: &KeywordValue, out: &mut BTreeSet<i64>) {
    match v {
        KeywordValue::Int(i) => {
            out.insert(*i);
        }
        KeywordValue::List(l) => l.iter().for_each(|x| collect_ints(x, out)),
        KeywordValue::Map(m) => m.values().for_each(|x| collect_ints(x, out)),
        _ => {}
    }
}

fn set_path(key: &str, root: &mut KeywordValue, path: &[String], value: KeywordValue) -> Result<()> {
    let mut cur = root;

    for (i, k) in path.iter().enumerate() {
        let m = match cur {
            KeywordValue::Map(m) => m,
            _ => {
                return Err(DataTableError::MalformedKeyword {
                    key: key.to_owned(),
                    reason: format!("expected a map at level {i}"),
                })
            }
        };

        if i + 1 == path.len() {
            m.insert(k.clone(), value);
            return Ok(());
        }

        cur = m
            .entry(k.clone())
            .or_insert_with(|| KeywordValue::Map(BTreeMap::new()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::table_with_rows;

    #[test]
    fn key_format() {
        assert_eq!(
            timetable_key(TimeGranularity::Small, 1, 17, None, None, None),
            "TIMETABLE_SMALL_ANT1_SPW17"
        );
        assert_eq!(
            timetable_key(
                TimeGranularity::Large,
                0,
                19,
                Some(1),
                Some("uid___A002_X1.ms"),
                Some(2)
            ),
            "TIMETABLE_LARGE_uid___A002_X1_ms_FIELD2_ANT0_SPW19_POL1"
        );

        let sel = TimeTableSelector::new(3, 5).pol(0).field(1);
        assert_eq!(sel.key(TimeGranularity::Small), "TIMETABLE_SMALL_FIELD1_ANT3_SPW5_POL0");
    }

    fn assignment(group_ids: &[i64], per_row: &[i64]) -> TimeGroupAssignment {
        TimeGroupAssignment {
            group_ids: group_ids.to_vec(),
            per_row: per_row.to_vec(),
        }
    }

    #[test]
    fn timetable_registration() {
        let mut dt = table_with_rows(6);
        let sel = TimeTableSelector::new(0, 17).pol(0);

        assert!(matches!(
            dt.get_timetable(&sel),
            Err(DataTableError::TimeTableNotConfigured(_))
        ));

        let small = assignment(&[2, 0, 1], &[0, 0, 1, 1, 2, 2]);
        let large = assignment(&[0], &[0, 0, 0, 0, 0, 0]);
        assert!(dt.set_timetable(&sel, &small, &large).unwrap());

        let tt = dt.get_timetable(&sel).unwrap();
        assert_eq!(tt.small.len(), 3);
        assert_eq!(tt.small[0].indices, vec![0, 1]);
        assert_eq!(tt.small[2].rows, vec![4, 5]);
        assert_eq!(tt.large.len(), 1);
        assert_eq!(tt.large[0].indices, vec![0, 1, 2, 3, 4, 5]);

        // A second registration leaves the first in place.
        let other = assignment(&[0], &[0, 0, 0, 0, 0, 0]);
        assert!(!dt.set_timetable(&sel, &other, &other).unwrap());
        assert_eq!(dt.get_timetable(&sel).unwrap(), tt);

        // Other selectors are independent.
        assert!(dt.get_timetable(&TimeTableSelector::new(0, 17)).is_err());
        assert!(dt
            .get_timetable(&TimeTableSelector::new(0, 17).pol(0).file("a.ms"))
            .is_err());

        assert_eq!(dt.time_group_id_small().unwrap(), 3);
        assert_eq!(dt.time_group_id_large().unwrap(), 1);
    }

    #[test]
    fn timetable_rejects_long_assignments() {
        let mut dt = table_with_rows(2);
        let sel = TimeTableSelector::new(0, 17);
        let a = assignment(&[0], &[0, 0, 0]);
        assert!(matches!(
            dt.set_timetable(&sel, &a, &a),
            Err(DataTableError::OutOfRange { .. })
        ));
        assert!(dt.keyword_names().is_empty());
    }

    #[test]
    fn timetable_keeps_lone_existing_key() {
        let mut dt = table_with_rows(3);
        let sel = TimeTableSelector::new(0, 17);
        let lone = KeywordValue::parse(r#"{"0": [[0], [0]]}"#).unwrap();
        dt.put_keyword("TIMETABLE_SMALL_ANT0_SPW17", &lone).unwrap();

        let a = assignment(&[0], &[0, 0, 0]);
        assert!(dt.set_timetable(&sel, &a, &a).unwrap());
        assert_eq!(dt.get_keyword("TIMETABLE_SMALL_ANT0_SPW17").unwrap(), lone);

        let tt = dt.get_timetable(&sel).unwrap();
        assert_eq!(tt.small.len(), 1);
        assert_eq!(tt.small[0].indices, vec![0]);
        assert_eq!(tt.large[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn position_groups() {
        let mut dt = table_with_rows(7);
        assert_eq!(dt.position_group_id().unwrap(), 0);
        assert!(matches!(
            dt.get_posdict(0, 17, 0),
            Err(DataTableError::GroupNotFound { antenna: 0, spw: 17, pol: 0 })
        ));

        let mut members = BTreeMap::new();
        members.insert(0i64, vec![0usize, 1, 2]);
        members.insert(1i64, vec![5usize, 6]);
        dt.register_position_groups(0, 17, 0, &members).unwrap();

        let pd = dt.get_posdict(0, 17, 0).unwrap();
        assert_eq!(pd[&0].rows, vec![0, 1, 2]);
        assert_eq!(pd[&0].indices, vec![0, 1, 2]);
        assert!(!pd[&0].is_redirect());
        assert_eq!(pd[&5].rows, vec![5, 6]);

        let r1 = &pd[&1];
        assert_eq!(r1.rows, vec![-1, 0]);
        assert_eq!(r1.indices, vec![0]);
        assert_eq!(r1.representative(), Some(0));
        assert_eq!(pd[&6].representative(), Some(5));
        assert!(!pd.contains_key(&3));
        assert_eq!(pd.len(), 5);

        assert_eq!(dt.get_cell::<i32>(schema::POSGRP, 6).unwrap(), 1);
        assert_eq!(dt.position_group_id().unwrap(), 2);
        assert!(dt.get_posdict(1, 17, 0).is_err());

        let mut bad = BTreeMap::new();
        bad.insert(2i64, vec![3usize, 99]);
        assert!(matches!(
            dt.register_position_groups(1, 17, 0, &bad),
            Err(DataTableError::OutOfRange { index: 99, .. })
        ));
        assert_eq!(dt.get_cell::<i32>(schema::POSGRP, 3).unwrap(), -1);
        assert_eq!(dt.position_group_id().unwrap(), 2);
    }

    #[test]
    fn position_group_ids_are_not_reused() {
        let mut dt = table_with_rows(7);
        let mut first = BTreeMap::new();
        first.insert(0i64, vec![0usize, 1, 2]);
        dt.register_position_groups(0, 17, 0, &first).unwrap();
        let before = dt.get_posdict(0, 17, 0).unwrap();

        // Group 0 belongs to antenna 0 already.
        let mut clash = BTreeMap::new();
        clash.insert(0i64, vec![5usize, 6]);
        assert!(matches!(
            dt.register_position_groups(1, 17, 0, &clash),
            Err(DataTableError::InvalidValue { .. })
        ));

        // So does the key itself.
        let mut again = BTreeMap::new();
        again.insert(3i64, vec![3usize]);
        assert!(matches!(
            dt.register_position_groups(0, 17, 0, &again),
            Err(DataTableError::InvalidValue { .. })
        ));

        assert_eq!(dt.get_posdict(0, 17, 0).unwrap(), before);
        assert!(dt.get_posdict(1, 17, 0).is_err());
        assert_eq!(dt.get_cell::<i32>(schema::POSGRP, 5).unwrap(), -1);
        assert_eq!(dt.get_cell::<i32>(schema::POSGRP, 3).unwrap(), -1);
        assert_eq!(dt.position_group_id().unwrap(), 1);
    }

    #[test]
    fn position_groups_reject_shared_rows() {
        let mut dt = table_with_rows(4);
        let mut members = BTreeMap::new();
        members.insert(0i64, vec![0usize, 1]);
        members.insert(1i64, vec![1usize, 2]);

        assert!(matches!(
            dt.register_position_groups(0, 17, 0, &members),
            Err(DataTableError::InvalidValue { .. })
        ));
        assert!(dt.keyword_names().is_empty());
        assert!(dt
            .get_column::<i32>(schema::POSGRP)
            .unwrap()
            .iter()
            .all(|g| *g == -1));
    }

    #[test]
    fn time_gaps() {
        let mut dt = table_with_rows(4);
        assert!(matches!(
            dt.get_timegap(0, 17, 0, true, None),
            Err(DataTableError::TimeTableNotConfigured(_))
        ));

        let s = KeywordValue::parse(
            r#"{"0": {"17": {"0": [2]}}, "uid___A002_ms": {"0": {"17": {"1": [1, 3]}}}}"#,
        )
        .unwrap();
        let l = KeywordValue::parse(
            r#"{"0": {"17": {"0": []}}, "uid___A002_ms": {"0": {"17": {"1": [3]}}}}"#,
        )
        .unwrap();
        dt.put_keyword(TIMEGAP_SMALL_KEY, &s).unwrap();
        dt.put_keyword(TIMEGAP_LARGE_KEY, &l).unwrap();

        let g = dt.get_timegap(0, 17, 0, false, None).unwrap();
        assert_eq!(g.small, vec![2]);
        assert!(g.large.is_empty());

        let g = dt
            .get_timegap(0, 17, 0, true, Some(("uid___A002.ms", 1)))
            .unwrap();
        assert_eq!(g.small, vec![1, 3]);
        assert_eq!(g.large, vec![3]);

        assert!(dt.get_timegap(1, 17, 0, true, None).is_err());
    }
}
