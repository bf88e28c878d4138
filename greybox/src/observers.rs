//! Observers look at the result of a run.
//!
//! The [`StdErrObserver`] captures the stderr of the target and turns the trace lines
//! in it into coverage.

use core::hash::{BuildHasher, Hasher};
use std::borrow::Cow;

use ahash::RandomState;
use hashbrown::HashSet;
use regex::Regex;

use crate::{Error, Named};

/// Stderr lines that count as coverage by default: a `[name]` prefix directly followed by
/// a `Hit ` marker. The `Received` line echoes the input and never matches.
pub const DEFAULT_EDGE_PATTERN: &str = r"^\[[^\]]+\] Hit ";

/// The id of an edge line. Fixed hasher seeds keep ids equal across runs and processes.
#[must_use]
pub fn edge_id(line: &str) -> u64 {
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(line.as_bytes());
    hasher.finish()
}

/// An observer that captures stderr of a target.
///
/// Every line matching the edge pattern is one edge, identified by the hash of the
/// trimmed line. Identical lines are the same edge.
#[derive(Debug, Clone)]
pub struct StdErrObserver {
    name: Cow<'static, str>,
    edge_pattern: Regex,
    stderr: Option<String>,
}

impl StdErrObserver {
    /// Creates a new [`StdErrObserver`] with the given name and edge pattern.
    pub fn new<N>(name: N, edge_pattern: &str) -> Result<Self, Error>
    where
        N: Into<Cow<'static, str>>,
    {
        Ok(Self {
            name: name.into(),
            edge_pattern: Regex::new(edge_pattern)?,
            stderr: None,
        })
    }

    /// The pattern that marks an edge line
    #[must_use]
    pub fn edge_pattern(&self) -> &Regex {
        &self.edge_pattern
    }

    /// Stderr of the last run, `None` if it was not captured
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    /// Clears the previous capture before a run
    pub fn pre_exec(&mut self) {
        self.stderr = None;
    }

    /// Stores the stderr of a finished run
    pub fn post_exec(&mut self, stderr: String) {
        self.stderr = Some(stderr);
    }

    /// The trimmed lines of the last capture that match the edge pattern
    pub fn edge_lines(&self) -> impl Iterator<Item = &str> {
        self.stderr
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|line| self.edge_pattern.is_match(line))
    }

    /// The edges hit in the last run
    #[must_use]
    pub fn edges(&self) -> HashSet<u64> {
        self.edge_lines()
            .map(edge_id)
            .collect()
    }
}

impl Named for StdErrObserver {
    fn name(&self) -> &str {
        &self.name
    }
}
