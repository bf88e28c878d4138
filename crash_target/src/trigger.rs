//! The crash trigger, a linear state machine over the first five buffer bytes.
//!
//! ```text
//! Start --'c'@0--> SawC --'r'@1--> SawCr --"ash"@2..5--> Crashed
//!   |                |                |
//!   +----------------+----------------+------ otherwise ----> Exited
//! ```

use std::io::Write;

use crate::{
    buffer::InputBuffer,
    report::{Marker, Reporter},
};

/// The full pattern that makes the target abort.
pub const CRASH_PATTERN: &[u8; 5] = b"crash";

/// States of the trigger. [`State::Crashed`] and [`State::Exited`] are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Nothing checked yet
    Start,
    /// Offset 0 was `c`
    SawC,
    /// Offsets 0 and 1 were `cr`
    SawCr,
    /// The whole pattern matched
    Crashed,
    /// Some comparison failed
    Exited,
}

/// What the process has to do once the machine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Return normally with status `0`
    Exit,
    /// Abort the process
    Crash,
}

impl State {
    /// `true` for [`State::Crashed`] and [`State::Exited`]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Crashed | Self::Exited)
    }

    /// Performs one transition.
    ///
    /// Returns the next state and the marker to emit for the branch taken, if any.
    /// Terminal states map to themselves.
    #[must_use]
    pub fn step(self, buffer: &InputBuffer) -> (State, Option<Marker>) {
        match self {
            Self::Start if buffer.byte_at(0) == CRASH_PATTERN[0] => {
                (Self::SawC, Some(Marker::BranchC))
            }
            Self::SawC if buffer.byte_at(1) == CRASH_PATTERN[1] => {
                (Self::SawCr, Some(Marker::BranchR))
            }
            Self::SawCr
                if (2..CRASH_PATTERN.len()).all(|i| buffer.byte_at(i) == CRASH_PATTERN[i]) =>
            {
                (Self::Crashed, Some(Marker::Crash))
            }
            Self::Start | Self::SawC | Self::SawCr => (Self::Exited, None),
            Self::Crashed | Self::Exited => (self, None),
        }
    }
}

/// Runs the machine from [`State::Start`] to a terminal state, reporting every taken branch.
pub fn evaluate<W>(buffer: &InputBuffer, reporter: &mut Reporter<W>) -> Verdict
where
    W: Write,
{
    let mut state = State::Start;
    while !state.is_terminal() {
        let (next, marker) = state.step(buffer);
        if let Some(marker) = marker {
            reporter.marker(marker);
        }
        log::trace!("{state:?} -> {next:?}");
        state = next;
    }
    if state == State::Crashed {
        Verdict::Crash
    } else {
        Verdict::Exit
    }
}
