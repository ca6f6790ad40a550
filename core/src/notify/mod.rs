// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
A framework for notifying users about what tools are doing.

This module provides a way for sdindex programs to notify the user about
actions taken, problems, and so on. It is narrowly targeted at the
command-line use case; library code logs through the `log` facade instead.

*/

pub mod termcolor;

use anyhow::Error;
use std::fmt::Arguments;
use std::result::Result as StdResult;

/// How chatty the notification system should be.
#[repr(usize)]
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ChatterLevel {
    /// A minimal level of output: only warnings and errors will be reported.
    Minimal = 0,

    /// The normal level of output: informational messages will be reported.
    Normal,
}

/// The kind of notification that is being produced.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NotificationKind {
    /// An informational notice.
    Note,

    /// Warning of an unusual condition; the program will likely perform as intended.
    Warning,

    /// Notification of a severe problem; the program will likely fail but will attempt to contine.
    Severe,

    /// Notification of a fatal error; the program must give up.
    Fatal,
}

/// Trait for type that handle notifications to the user.
pub trait NotificationBackend {
    /// Notify the user about an event.
    ///
    /// If `err` is not `None`, the information contained in the object should
    /// be reported after the main message.
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>);
}

/// Send an informational notification to the user.
///
/// Standard usage looks like this:
///
/// ```rust,ignore
/// sd_note!(nb, "exported {} rows", n_rows);
/// ```
///
/// where `nb` is a type implementing the NotificationBackend trait. You may
/// also provide an Error value after a semicolon; the information it contains
/// will be printed after the informational message.
#[macro_export]
macro_rules! sd_note {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Note, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// Warn the user of a problematic condition.
///
/// See the documentation of `sd_note!` for usage information.
#[macro_export]
macro_rules! sd_warning {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Warning, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// Notify the user of a severe problem.
///
/// See the documentation of `sd_note!` for usage information.
#[macro_export]
macro_rules! sd_severe {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Severe, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Severe, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// Notify the user of a fatal problem.
///
/// See the documentation of `sd_note!` for usage information. The
/// command-line interface exits almost immediately after issuing one.
#[macro_export]
macro_rules! sd_fatal {
    ($dest:expr, $( $fmt_args:expr ),*) => {
        $dest.notify($crate::notify::NotificationKind::Fatal, format_args!($( $fmt_args ),*), None)
    };
    ($dest:expr, $( $fmt_args:expr ),* ; $err:expr) => {
        $dest.notify($crate::notify::NotificationKind::Fatal, format_args!($( $fmt_args ),*), Some($err))
    };
}

/// A notification backend that records everything it is told.
///
/// Handy in tests of code that takes a `&mut dyn NotificationBackend`.
#[derive(Debug, Default)]
pub struct RecordingNotificationBackend {
    pub records: Vec<(NotificationKind, String)>,
}

impl RecordingNotificationBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationBackend for RecordingNotificationBackend {
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>) {
        let mut text = format!("{args}");

        if let Some(e) = err {
            text.push_str(&format!(" ({e})"));
        }

        self.records.push((kind, text));
    }
}

/// An extension trait for adding standard notification arguments to a clap
/// Command object.
pub trait ClapNotificationArgsExt {
    /// Add the standard notification-related arguments to this Command.
    fn sdindex_notify_args(self) -> Self;
}

impl ClapNotificationArgsExt for clap::Command {
    fn sdindex_notify_args(self) -> Self {
        self.arg(
            clap::Arg::new("chatter_level")
                .long("chatter")
                .short('c')
                .value_name("LEVEL")
                .help("How much chatter to print when running")
                .value_parser(["default", "minimal"])
                .default_value("default"),
        )
    }
}

/// Run a function with colorized reporting of errors.
pub fn run_with_notifications<E, F>(matches: clap::ArgMatches, inner: F) -> i32
where
    E: Into<Error>,
    F: FnOnce(clap::ArgMatches, &mut dyn NotificationBackend) -> StdResult<i32, E>,
{
    let chatter = match matches.get_one::<String>("chatter_level").map(|s| s.as_str()) {
        Some("minimal") => ChatterLevel::Minimal,
        _ => ChatterLevel::Normal,
    };

    let mut tnb = termcolor::TermcolorNotificationBackend::new(chatter);

    match inner(matches, &mut tnb) {
        Ok(ret) => ret,

        Err(e) => {
            tnb.bare_error(e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_backend() {
        let mut nb = RecordingNotificationBackend::new();
        sd_note!(nb, "imported {} rows", 12);
        sd_warning!(nb, "odd"; anyhow::anyhow!("because"));
        assert_eq!(nb.records.len(), 2);
        assert_eq!(nb.records[0], (NotificationKind::Note, "imported 12 rows".to_owned()));
        assert_eq!(nb.records[1].1, "odd (because)");
        assert!(ChatterLevel::Minimal < ChatterLevel::Normal);
    }
}
