// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*! The main sdindex driver command

This provides command-line access to data table snapshots: summaries of
their contents, the cached time and position groupings, and the mapping
between serial row numbers and the per-file tables of a split dataset.

*/

use anyhow::{bail, Result};
use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use sdindex_core::notify::{ClapNotificationArgsExt, NotificationBackend};
use sdindex_core::{ctry, sd_note, sd_warning};
use sdindex_datatable::{DataTable, OpenMode, RowIndexTranslator, TimeTableSelector};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

fn main() {
    let matches = make_app().get_matches();
    setup_logging(matches.get_count("verbose"));

    process::exit(sdindex_core::notify::run_with_notifications(
        matches,
        |matches, nbe| -> Result<i32> {
            match matches.subcommand() {
                Some(("info", m)) => do_info(m, nbe),
                Some(("timetable", m)) => do_timetable(m, nbe),
                Some(("posgroups", m)) => do_posgroups(m, nbe),
                Some(("locate", m)) => do_locate(m, nbe),
                _ => {
                    make_app().print_long_help()?;
                    Ok(0)
                }
            }
        },
    ));
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.format_target(false);

    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Warn),
        1 => builder.filter_level(log::LevelFilter::Info),
        2 => builder.filter_level(log::LevelFilter::Debug),
        _ => builder.filter_level(log::LevelFilter::Trace),
    };

    builder.init();
}

fn snapshot_arg() -> Arg {
    Arg::new("SNAPSHOT")
        .help("The path to the data table snapshot directory")
        .value_parser(value_parser!(PathBuf))
        .required(true)
        .index(1)
}

fn int_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("ID")
        .help(help)
        .value_parser(value_parser!(i32))
}

fn make_app() -> Command {
    Command::new("sdindex")
        .version(crate_version!())
        .about("Inspect single-dish scan-metadata index snapshots")
        .sdindex_notify_args()
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log more; may be repeated")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("info")
                .about("Summarize the contents of a data table")
                .arg(snapshot_arg()),
        )
        .subcommand(
            Command::new("timetable")
                .about("Print the cached time groups of one antenna and spectral window")
                .arg(snapshot_arg())
                .arg(int_arg("ant", "The antenna ID").required(true))
                .arg(int_arg("spw", "The spectral window ID").required(true))
                .arg(int_arg("pol", "The polarization ID"))
                .arg(int_arg("field", "The field ID"))
                .arg(
                    Arg::new("file")
                        .long("file")
                        .value_name("NAME")
                        .help("The origin file name, for per-file time tables"),
                ),
        )
        .subcommand(
            Command::new("posgroups")
                .about("Print the cached position groups of one antenna and spectral window")
                .arg(snapshot_arg())
                .arg(int_arg("ant", "The antenna ID").required(true))
                .arg(int_arg("spw", "The spectral window ID").required(true))
                .arg(int_arg("pol", "The polarization ID").default_value("0")),
        )
        .subcommand(
            Command::new("locate")
                .about("Find the file and row that a serial row number refers to")
                .arg(
                    Arg::new("DIR")
                        .help("The directory holding the per-file data tables")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("FILES")
                        .help("The file names, in serial order")
                        .required(true)
                        .num_args(1..)
                        .index(2),
                )
                .arg(
                    Arg::new("serial")
                        .long("serial")
                        .value_name("N")
                        .help("The serial row number(s) to locate")
                        .value_parser(value_parser!(usize))
                        .action(ArgAction::Append)
                        .required(true),
                ),
        )
}

fn open_snapshot(matches: &ArgMatches) -> Result<DataTable> {
    let Some(path) = matches.get_one::<PathBuf>("SNAPSHOT") else {
        bail!("no snapshot path given");
    };

    if !path.exists() {
        bail!("no data table at \"{}\"", path.display());
    }

    Ok(ctry!(DataTable::open(path, OpenMode::ReadOnly);
             "failed to open the data table \"{}\"", path.display()))
}

/// Summarize a data table.
fn do_info(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let dt = open_snapshot(matches)?;

    println!("rows: {}", dt.row_count());

    if let Some(dref) = dt.direction_ref() {
        println!("direction reference: {dref}");
    }

    println!();
    println!("columns:");

    for name in dt.column_names() {
        let access = dt.column_access(name)?;
        let desc = match dt.ro_table().get_col_desc(name) {
            Ok(d) => d,
            Err(_) => dt.rw_table().get_col_desc(name)?,
        };
        let unit = desc.unit().map(|u| format!(" [{u}]")).unwrap_or_default();
        println!("    {name:<16} {:<26} {access:?}{unit}", desc.describe());
    }

    let antennas: Vec<i32> = dt.get_column(sdindex_datatable::schema::ANTENNA)?;
    let spws: Vec<i32> = dt.get_column(sdindex_datatable::schema::IF)?;
    let mut counts = BTreeMap::new();

    for key in antennas.into_iter().zip(spws) {
        *counts.entry(key).or_insert(0usize) += 1;
    }

    println!();
    println!("antenna  spw      rows");

    for ((ant, spw), n) in &counts {
        println!("{ant:<8} {spw:<8} {n}");
    }

    let keywords = dt.keyword_names();

    if !keywords.is_empty() {
        println!();
        println!("keywords:");

        for kw in &keywords {
            match dt.get_keyword(kw) {
                Ok(v) => {
                    let text = v.to_string();

                    if text.chars().count() > 60 {
                        let head: String = text.chars().take(57).collect();
                        println!("    {kw} = {head}...");
                    } else {
                        println!("    {kw} = {text}");
                    }
                }

                Err(e) => {
                    sd_warning!(nbe, "keyword {} is unreadable", kw; e.into());
                }
            }
        }
    }

    Ok(0)
}

/// Print a cached time table.
fn do_timetable(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let dt = open_snapshot(matches)?;

    let ant = matches.get_one::<i32>("ant").copied().unwrap_or_default();
    let spw = matches.get_one::<i32>("spw").copied().unwrap_or_default();
    let mut sel = TimeTableSelector::new(ant, spw);

    if let Some(pol) = matches.get_one::<i32>("pol") {
        sel = sel.pol(*pol);
    }

    if let Some(field) = matches.get_one::<i32>("field") {
        sel = sel.field(*field);
    }

    if let Some(file) = matches.get_one::<String>("file") {
        sel = sel.file(file);
    }

    let tt = ctry!(dt.get_timetable(&sel); "no time table for {}", sel);
    sd_note!(
        nbe,
        "{}: {} small and {} large time groups",
        sel,
        tt.small.len(),
        tt.large.len()
    );

    for (label, groups) in [("small", &tt.small), ("large", &tt.large)] {
        println!("{label}:");

        for (i, g) in groups.iter().enumerate() {
            println!("    {i:4}  {:?}", g.indices);
        }
    }

    Ok(0)
}

/// Print a cached position dictionary.
fn do_posgroups(matches: &ArgMatches, nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let dt = open_snapshot(matches)?;

    let ant = matches.get_one::<i32>("ant").copied().unwrap_or_default();
    let spw = matches.get_one::<i32>("spw").copied().unwrap_or_default();
    let pol = matches.get_one::<i32>("pol").copied().unwrap_or_default();

    let pd = ctry!(dt.get_posdict(ant, spw, pol);
                   "no position groups for antenna {} spw {} pol {}", ant, spw, pol);

    let mut n_groups = 0;

    for (row, entry) in &pd {
        if let Some(rep) = entry.representative() {
            println!("{row:8}  -> {rep}");
        } else {
            n_groups += 1;
            println!("{row:8}  {:?}", entry.rows);
        }
    }

    sd_note!(nbe, "{} position groups over {} rows", n_groups, pd.len());
    Ok(0)
}

/// Translate serial row numbers.
fn do_locate(matches: &ArgMatches, _nbe: &mut dyn NotificationBackend) -> Result<i32> {
    let Some(dir) = matches.get_one::<PathBuf>("DIR") else {
        bail!("no data table directory given");
    };

    let files: Vec<&String> = matches
        .get_many::<String>("FILES")
        .map(|v| v.collect())
        .unwrap_or_default();

    let translator = ctry!(RowIndexTranslator::from_datatable_dir(dir, &files);
                           "failed to read the data tables in \"{}\"", dir.display());

    for serial in matches.get_many::<usize>("serial").into_iter().flatten() {
        let (file, row) = translator.serial_to_local(*serial)?;
        println!("{serial}  {file}  {row}");
    }

    Ok(0)
}
