//! Diagnostic trace written to stderr.
//!
//! Every line starts with [`TRACE_PREFIX`]. The branch markers are what a
//! fuzzer without compile-time instrumentation can use as coverage.

use core::fmt::{self, Display};
use std::io::Write;

use crate::buffer::InputBuffer;

/// Prefix of every diagnostic line.
pub const TRACE_PREFIX: &str = "[crash_target]";

/// A comparison branch that was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Offset 0 matched `c`
    BranchC,
    /// Offset 1 matched `r`
    BranchR,
    /// Offsets 2..5 matched `ash`, the process is about to abort
    Crash,
}

impl Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BranchC => write!(f, "Hit Branch 1 (c)"),
            Self::BranchR => write!(f, "Hit Branch 2 (r)"),
            Self::Crash => write!(f, "Hit Crash Branch!"),
        }
    }
}

/// The text shown for a buffer: received bytes up to the first zero byte,
/// non-printable bytes escaped so a diagnostic never spans lines.
#[must_use]
pub fn display_text(buffer: &InputBuffer) -> String {
    let received = buffer.received();
    let visible = received
        .iter()
        .position(|&b| b == 0)
        .map_or(received, |nul| &received[..nul]);
    visible.escape_ascii().to_string()
}

/// Writes the trace. Write errors are logged and otherwise ignored: losing a
/// diagnostic must never change the exit behavior.
#[derive(Debug)]
pub struct Reporter<W> {
    out: W,
}

impl<W> Reporter<W>
where
    W: Write,
{
    /// Creates a reporter writing to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Reports the byte count and the contents of a freshly read buffer
    pub fn received(&mut self, buffer: &InputBuffer) {
        let line = format!(
            "{TRACE_PREFIX} Received {} bytes: [{}]",
            buffer.len(),
            display_text(buffer)
        );
        self.emit(&line);
    }

    /// Reports a taken branch
    pub fn marker(&mut self, marker: Marker) {
        self.emit(&format!("{TRACE_PREFIX} {marker}"));
    }

    fn emit(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            log::warn!("could not write diagnostic: {err}");
        }
    }

    /// Gives back the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}
