//! The feedbacks reduce observer state after each run to a single `is_interesting`-value.
//! If a testcase is interesting, it may be added to a corpus.

use hashbrown::HashSet;

use crate::{executors::ExitKind, observers::StdErrObserver, Error, Named};

/// Feedbacks evaluate the observers.
/// Basically, they reduce the information provided by an observer to a value,
/// indicating the "interestingness" of the last run.
pub trait Feedback: Named {
    /// `is_interesting ` return if an input is worth the addition to the corpus
    fn is_interesting(
        &mut self,
        observer: &StdErrObserver,
        exit_kind: ExitKind,
    ) -> Result<bool, Error>;
}

/// A feedback that is interesting if the run hit edges never seen before.
#[derive(Clone, Debug, Default)]
pub struct NewEdgesFeedback {
    visited: HashSet<u64>,
    last_new_edges: usize,
}

impl Feedback for NewEdgesFeedback {
    fn is_interesting(
        &mut self,
        observer: &StdErrObserver,
        _exit_kind: ExitKind,
    ) -> Result<bool, Error> {
        let edges = observer.edges();
        let before = self.visited.len();
        self.visited.extend(edges);
        self.last_new_edges = self.visited.len() - before;
        Ok(self.last_new_edges > 0)
    }
}

impl Named for NewEdgesFeedback {
    #[inline]
    fn name(&self) -> &str {
        "NewEdgesFeedback"
    }
}

impl NewEdgesFeedback {
    /// Creates a new [`NewEdgesFeedback`] with nothing visited
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct edges seen so far
    #[must_use]
    pub fn coverage(&self) -> usize {
        self.visited.len()
    }

    /// Number of edges the last run added
    #[must_use]
    pub fn last_new_edges(&self) -> usize {
        self.last_new_edges
    }
}

/// A feedback that is interesting if the run crashed
#[derive(Clone, Debug, Default)]
pub struct CrashFeedback {}

impl Feedback for CrashFeedback {
    fn is_interesting(
        &mut self,
        _observer: &StdErrObserver,
        exit_kind: ExitKind,
    ) -> Result<bool, Error> {
        Ok(exit_kind == ExitKind::Crash)
    }
}

impl Named for CrashFeedback {
    #[inline]
    fn name(&self) -> &str {
        "CrashFeedback"
    }
}

impl CrashFeedback {
    /// Creates a new [`CrashFeedback`]
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

/// A feedback that is interesting if the run timed out
#[derive(Clone, Debug, Default)]
pub struct TimeoutFeedback {}

impl Feedback for TimeoutFeedback {
    fn is_interesting(
        &mut self,
        _observer: &StdErrObserver,
        exit_kind: ExitKind,
    ) -> Result<bool, Error> {
        Ok(exit_kind == ExitKind::Timeout)
    }
}

impl Named for TimeoutFeedback {
    #[inline]
    fn name(&self) -> &str {
        "TimeoutFeedback"
    }
}

impl TimeoutFeedback {
    /// Creates a new [`TimeoutFeedback`]
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        executors::ExitKind,
        feedbacks::{CrashFeedback, Feedback, NewEdgesFeedback, TimeoutFeedback},
        observers::StdErrObserver,
    };

    fn observer_with(stderr: &str) -> StdErrObserver {
        let mut observer = StdErrObserver::new("stderr", "Hit ").unwrap();
        observer.post_exec(stderr.to_string());
        observer
    }

    #[test]
    fn test_new_edges() {
        let mut feedback = NewEdgesFeedback::new();

        let nothing = observer_with("[crash_target] Received 1 bytes: [x]\n");
        assert!(!feedback.is_interesting(&nothing, ExitKind::Ok).unwrap());
        assert_eq!(feedback.coverage(), 0);

        let c = observer_with("Hit Branch 1 (c)\n");
        assert!(feedback.is_interesting(&c, ExitKind::Ok).unwrap());
        assert_eq!(feedback.last_new_edges(), 1);
        assert!(!feedback.is_interesting(&c, ExitKind::Ok).unwrap());
        assert_eq!(feedback.last_new_edges(), 0);

        let cr = observer_with("Hit Branch 1 (c)\nHit Branch 2 (r)\n");
        assert!(feedback.is_interesting(&cr, ExitKind::Ok).unwrap());
        assert_eq!(feedback.last_new_edges(), 1);
        assert_eq!(feedback.coverage(), 2);
    }

    #[test]
    fn test_timeout_has_no_coverage() {
        let mut feedback = NewEdgesFeedback::new();
        let mut observer = observer_with("Hit Branch 1 (c)\n");
        observer.pre_exec();
        assert!(!feedback.is_interesting(&observer, ExitKind::Timeout).unwrap());
    }

    #[test]
    fn test_exit_kind_feedbacks() {
        let observer = observer_with("");
        let mut crash = CrashFeedback::new();
        let mut timeout = TimeoutFeedback::new();
        assert!(crash.is_interesting(&observer, ExitKind::Crash).unwrap());
        assert!(!crash.is_interesting(&observer, ExitKind::Ok).unwrap());
        assert!(!crash.is_interesting(&observer, ExitKind::Timeout).unwrap());
        assert!(timeout.is_interesting(&observer, ExitKind::Timeout).unwrap());
        assert!(!timeout.is_interesting(&observer, ExitKind::Oom).unwrap());
    }
}
