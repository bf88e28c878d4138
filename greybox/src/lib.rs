/*!
Greybox, a small mutational grey-box fuzzer for targets that read their input from stdin.

The building blocks follow the usual split: [`rands`] for randomness, [`inputs`] and
[`corpus`] for test cases, [`mutators`] to derive new inputs, an
[`executors::CommandExecutor`] to run the target, an [`observers::StdErrObserver`] to
turn the target's stderr trace into coverage, [`feedbacks`] to judge a run, and
[`monitors`] to report progress. [`fuzzer::StdFuzzer`] ties them together.
*/
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(
    clippy::unreadable_literal,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]
#![cfg_attr(not(test), warn(
    missing_debug_implementations,
    missing_docs,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
))]
#![cfg_attr(test, deny(
    missing_debug_implementations,
    missing_docs,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_must_use,
))]

pub mod corpus;
pub mod executors;
pub mod feedbacks;
pub mod fuzzer;
pub mod inputs;
pub mod monitors;
pub mod mutators;
pub mod observers;
pub mod rands;
pub mod report;

use core::{
    fmt::{self, Display},
    num::{ParseFloatError, ParseIntError},
    time::Duration,
};
use std::{
    io,
    time::{SystemTime, UNIX_EPOCH},
};

/// Components report under a fixed name, e.g. in log lines.
pub trait Named {
    /// The name of this component
    fn name(&self) -> &str;
}

/// Everything that can go wrong while fuzzing
#[derive(Debug)]
pub enum Error {
    /// The target could not be started, fed or waited for
    Target(String),
    /// Reading or writing a seed, queue, crash or stats file failed
    File(io::Error),
    /// A command line value, dictionary or edge pattern is unusable
    Config(String),
    /// The stats CSV could not be read back or written
    Stats(String),
    /// Nothing to pick from
    Empty(String),
    /// An internal precondition did not hold
    IllegalState(String),
    /// A stop condition triggered before a crash was found
    ShuttingDown,
}

impl Error {
    /// The target could not be run
    #[must_use]
    pub fn target<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Target(arg.into())
    }
    /// A file operation failed
    #[must_use]
    pub fn file(arg: io::Error) -> Self {
        Error::File(arg)
    }
    /// Bad configuration
    #[must_use]
    pub fn config<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Config(arg.into())
    }
    /// Bad stats data
    #[must_use]
    pub fn stats<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Stats(arg.into())
    }
    /// `what` has no elements
    #[must_use]
    pub fn empty<S>(what: S) -> Self
    where
        S: Into<String>,
    {
        Error::Empty(what.into())
    }
    /// Broken internal precondition
    #[must_use]
    pub fn illegal_state<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::IllegalState(arg.into())
    }
    /// The run is over without a crash
    #[must_use]
    pub fn shutting_down() -> Self {
        Error::ShuttingDown
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Target(s) => write!(f, "Target failed: {s}"),
            Self::File(err) => write!(f, "File IO failed: {err}"),
            Self::Config(s) => write!(f, "Bad configuration: {s}"),
            Self::Stats(s) => write!(f, "Bad stats: {s}"),
            Self::Empty(s) => write!(f, "No items in {s}"),
            Self::IllegalState(s) => write!(f, "Illegal state: {s}"),
            Self::ShuttingDown => write!(f, "Shutting down!"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::file(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::stats(format!("JSON snapshot: {err}"))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::config(format!("invalid edge pattern: {err}"))
    }
}

impl From<ParseIntError> for Error {
    fn from(err: ParseIntError) -> Self {
        Self::stats(format!("not an integer: {err}"))
    }
}

impl From<ParseFloatError> for Error {
    fn from(err: ParseFloatError) -> Self {
        Self::stats(format!("not a number: {err}"))
    }
}

#[cfg(unix)]
impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Self {
        Self::target(format!("system call failed: {err}"))
    }
}

/// Wall clock time since [`UNIX_EPOCH`], zero if the clock is before it
#[must_use]
pub fn current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Nanoseconds of [`current_time`], the default RNG seed
#[must_use]
pub fn current_nanos() -> u64 {
    current_time().as_nanos() as u64
}

/// Renders an elapsed run time as `HH:MM:SS`, hours may exceed two digits
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, rest) = (total / 3600, total % 3600);
    format!("{hours:02}:{:02}:{:02}", rest / 60, rest % 60)
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use crate::{format_elapsed, Error};

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_elapsed(Duration::from_millis(999)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::config("bad").to_string(), "Bad configuration: bad");
        assert_eq!(Error::shutting_down().to_string(), "Shutting down!");
        let err: Error = "x".parse::<u64>().unwrap_err().into();
        assert!(matches!(err, Error::Stats(_)));
        let err: Error = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
