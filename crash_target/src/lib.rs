/*!
A tiny fault injection target.

It reads at most [`buffer::BUFFER_CAPACITY`] bytes from stdin in a single read,
traces what it received to stderr and aborts the process if the input starts
with the bytes `crash`. Fuzzers use it to check that they detect a crash
hidden behind a chain of byte comparisons.
*/
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
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

pub mod buffer;
pub mod report;
pub mod trigger;

use core::fmt::{self, Display};
use std::io::{self, Read, Write};

pub use buffer::InputBuffer;
pub use report::{Marker, Reporter};
pub use trigger::{State, Verdict};

/// Errors that end a run of the target without a crash.
///
/// All of them map to exit status `1`.
#[derive(Debug)]
pub enum Error {
    /// Stdin was at end-of-input before a single byte arrived
    EmptyInput,
    /// The read from stdin failed
    Read(io::Error),
}

impl Error {
    /// Stdin delivered no bytes
    #[must_use]
    pub fn empty_input() -> Self {
        Error::EmptyInput
    }

    /// The single read attempt failed
    #[must_use]
    pub fn read(err: io::Error) -> Self {
        Error::Read(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "No input available on stdin"),
            Self::Read(err) => write!(f, "Reading stdin failed: {err:?}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EmptyInput => None,
            Self::Read(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::read(err)
    }
}

/// Exit status used when nothing could be read.
pub const EXIT_NO_INPUT: i32 = 1;

/// Runs the target once: read, report, then walk the crash state machine.
///
/// Returns the [`Verdict`] the caller must act on. The caller is in charge of
/// actually aborting, so this stays testable in-process.
pub fn run<R, W>(input: &mut R, diagnostics: W) -> Result<Verdict, Error>
where
    R: Read,
    W: Write,
{
    let buffer = InputBuffer::read_once(input)?;
    let mut reporter = Reporter::new(diagnostics);
    reporter.received(&buffer);
    Ok(trigger::evaluate(&buffer, &mut reporter))
}
