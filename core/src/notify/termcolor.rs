// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!
A notification backend that sends colorized output to the terminal.
*/

use anyhow::Error;
use std::backtrace::BacktraceStatus;
use std::fmt::Arguments;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::{ChatterLevel, NotificationBackend, NotificationKind};

/// A notification backend that writes colorized output to the terminal.
///
/// Notes go to standard output; everything else goes to standard error.
pub struct TermcolorNotificationBackend {
    chatter: ChatterLevel,
    stdout: StandardStream,
    stderr: StandardStream,
    note_spec: ColorSpec,
    warning_spec: ColorSpec,
    error_spec: ColorSpec,
}

impl TermcolorNotificationBackend {
    /// Create a new TermcolorNotificationBackend.
    pub fn new(chatter: ChatterLevel) -> TermcolorNotificationBackend {
        let mut note_spec = ColorSpec::new();
        note_spec.set_fg(Some(Color::Green)).set_bold(true);

        let mut warning_spec = ColorSpec::new();
        warning_spec.set_fg(Some(Color::Yellow)).set_bold(true);

        let mut error_spec = ColorSpec::new();
        error_spec.set_fg(Some(Color::Red)).set_bold(true);

        TermcolorNotificationBackend {
            chatter,
            stdout: StandardStream::stdout(ColorChoice::Auto),
            stderr: StandardStream::stderr(ColorChoice::Auto),
            note_spec,
            warning_spec,
            error_spec,
        }
    }

    fn message(&mut self, kind: NotificationKind, prefix: Option<&str>, args: Arguments) {
        if kind == NotificationKind::Note && self.chatter <= ChatterLevel::Minimal {
            return;
        }

        let prefix = prefix.unwrap_or(match kind {
            NotificationKind::Note => "note:",
            NotificationKind::Warning => "warning:",
            NotificationKind::Severe => "severe:",
            NotificationKind::Fatal => "fatal:",
        });

        let (spec, stream) = match kind {
            NotificationKind::Note => (&self.note_spec, &mut self.stdout),
            NotificationKind::Warning => (&self.warning_spec, &mut self.stderr),
            NotificationKind::Severe | NotificationKind::Fatal => {
                (&self.error_spec, &mut self.stderr)
            }
        };

        // Nothing sensible can be done if the terminal refuses our output.
        let _ = stream.set_color(spec);
        let _ = write!(stream, "{prefix}");
        let _ = stream.reset();
        let _ = writeln!(stream, " {args}");
    }

    fn chain(&mut self, kind: NotificationKind, err: &Error) {
        for cause in err.chain().skip(1) {
            self.message(kind, Some("caused by:"), format_args!("{cause}"));
        }

        let backtrace = err.backtrace();

        if backtrace.status() == BacktraceStatus::Captured {
            self.message(kind, Some("debugging:"), format_args!("backtrace follows:"));
            let _ = writeln!(self.stderr, "{backtrace}");
        }
    }

    /// Print the information contained in an Error object.
    ///
    /// This prints the error, the errors that caused it, and its backtrace if
    /// one was captured.
    pub fn bare_error<E: Into<Error>>(&mut self, err: E) {
        let err = err.into();
        self.message(NotificationKind::Severe, Some("error:"), format_args!("{err}"));
        self.chain(NotificationKind::Severe, &err);
    }
}

impl NotificationBackend for TermcolorNotificationBackend {
    fn notify(&mut self, kind: NotificationKind, args: Arguments, err: Option<Error>) {
        self.message(kind, None, args);

        if let Some(e) = err {
            self.message(kind, Some("caused by:"), format_args!("{e}"));
            self.chain(kind, &e);
        }
    }
}
