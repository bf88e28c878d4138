//! The `StdFuzzer` runs the mutate, execute, evaluate cycle.

use core::time::Duration;
use std::path::PathBuf;

use crate::{
    corpus::{queue_filename, InMemoryCorpus, OnDiskStore, Testcase},
    current_time,
    executors::{CommandExecutor, ExitKind},
    feedbacks::{CrashFeedback, Feedback, NewEdgesFeedback, TimeoutFeedback},
    inputs::BytesInput,
    monitors::{write_stats_json, Monitor, STATS_JSON_FILENAME},
    mutators::{MutationResult, Mutator},
    observers::StdErrObserver,
    rands::Rand,
    Error,
};

/// Default number of executions between two stats samples
pub const DEFAULT_STATS_INTERVAL: u64 = 100;

/// Minimum time between two heartbeat lines of the monitor
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Where new coverage is saved unless configured otherwise
pub const DEFAULT_SEED_DIR: &str = "seeds";

/// Where solutions are saved unless configured otherwise
pub const DEFAULT_OUT_DIR: &str = "out";

/// Name of the directory under the output directory that keeps the timeouts
pub const HANGS_DIRNAME: &str = "hangs";

/// An input that made the target crash, and where it was saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// The crashing input
    pub input: BytesInput,
    /// The file the input was saved to
    pub path: PathBuf,
}

/// When to stop fuzzing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopConditions {
    /// Keep fuzzing after a solution was found
    pub keep_going: bool,
    /// Stop after this many executions
    pub max_execs: Option<u64>,
    /// Stop after this much time
    pub max_time: Option<Duration>,
}

/// The standard fuzzer
#[derive(Debug)]
pub struct StdFuzzer<R, MU, M>
where
    R: Rand,
    MU: Mutator<R>,
    M: Monitor,
{
    rand: R,
    corpus: InMemoryCorpus,
    mutator: MU,
    executor: CommandExecutor,
    observer: StdErrObserver,
    feedback: NewEdgesFeedback,
    objective: CrashFeedback,
    timeout_feedback: TimeoutFeedback,
    monitor: M,
    queue_store: OnDiskStore,
    solutions_store: OnDiskStore,
    hangs_store: OnDiskStore,
    out_dir: PathBuf,
    stop: StopConditions,
    stats_interval: u64,
    executions: u64,
    solutions: usize,
    hangs: usize,
    last_heartbeat: Duration,
}

impl<R, MU, M> StdFuzzer<R, MU, M>
where
    R: Rand,
    MU: Mutator<R>,
    M: Monitor,
{
    /// Creates a new [`StdFuzzer`].
    ///
    /// New coverage is saved to [`DEFAULT_SEED_DIR`], solutions to [`DEFAULT_OUT_DIR`] and
    /// timeouts to its `hangs` directory, until [`Self::with_dirs`] says otherwise.
    pub fn new(
        rand: R,
        corpus: InMemoryCorpus,
        mutator: MU,
        executor: CommandExecutor,
        observer: StdErrObserver,
        monitor: M,
    ) -> Self {
        let out_dir = PathBuf::from(DEFAULT_OUT_DIR);
        let mut fuzzer = Self {
            rand,
            corpus,
            mutator,
            executor,
            observer,
            feedback: NewEdgesFeedback::new(),
            objective: CrashFeedback::new(),
            timeout_feedback: TimeoutFeedback::new(),
            monitor,
            queue_store: OnDiskStore::new(DEFAULT_SEED_DIR),
            solutions_store: OnDiskStore::new(&out_dir),
            hangs_store: OnDiskStore::new(out_dir.join(HANGS_DIRNAME)),
            out_dir,
            stop: StopConditions::default(),
            stats_interval: DEFAULT_STATS_INTERVAL,
            executions: 0,
            solutions: 0,
            hangs: 0,
            last_heartbeat: current_time(),
        };
        fuzzer.update_stats();
        fuzzer
    }

    /// Saves new coverage to `seed_dir`, solutions to `out_dir` and timeouts to
    /// `out_dir/hangs`
    #[must_use]
    pub fn with_dirs<P, Q>(mut self, seed_dir: P, out_dir: Q) -> Self
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        self.out_dir = out_dir.into();
        self.queue_store = OnDiskStore::new(seed_dir);
        self.solutions_store = OnDiskStore::new(&self.out_dir);
        self.hangs_store = OnDiskStore::new(self.out_dir.join(HANGS_DIRNAME));
        self
    }

    /// Sets the conditions that end [`Self::fuzz_loop`]
    #[must_use]
    pub fn with_stop_conditions(mut self, stop: StopConditions) -> Self {
        self.stop = stop;
        self
    }

    /// Sets how many executions pass between two stats samples
    #[must_use]
    pub fn with_stats_interval(mut self, stats_interval: u64) -> Self {
        self.stats_interval = stats_interval.max(1);
        self
    }

    /// The corpus
    #[must_use]
    pub fn corpus(&self) -> &InMemoryCorpus {
        &self.corpus
    }

    /// The monitor
    #[must_use]
    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    /// Number of target executions so far
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Number of distinct edges seen so far
    #[must_use]
    pub fn coverage(&self) -> usize {
        self.feedback.coverage()
    }

    fn update_stats(&mut self) {
        let stats = self.monitor.stats_mut();
        stats.executions = self.executions;
        stats.corpus_size = self.corpus.count();
        stats.objective_size = self.solutions;
        stats.hang_size = self.hangs;
        stats.coverage = self.feedback.coverage();
    }

    fn save_solution(&mut self, input: &BytesInput) -> Result<PathBuf, Error> {
        let stem = format!("crash_{}", current_time().as_secs());
        let path = self.solutions_store.save_unique(&stem, "txt", input)?;
        self.solutions += 1;
        Ok(path)
    }

    fn save_hang(&mut self, input: &BytesInput) -> Result<PathBuf, Error> {
        let stem = format!("hang_{}", current_time().as_secs());
        let path = self.hangs_store.save_unique(&stem, "txt", input)?;
        self.hangs += 1;
        Ok(path)
    }

    /// Picks a corpus entry, mutates a copy, runs it and evaluates the result.
    ///
    /// Returns the solution if the run crashed the target. A skipped mutation is not run.
    pub fn fuzz_one(&mut self) -> Result<Option<Solution>, Error> {
        let mut input = self.corpus.random(&mut self.rand)?.input().clone();
        if self.mutator.mutate(&mut self.rand, &mut input)? == MutationResult::Skipped {
            log::trace!("mutation skipped, not running {}", input.preview());
            return Ok(None);
        }

        let exit_kind = self.executor.run_target(&input, &mut self.observer)?;
        self.executions += 1;
        log::trace!("exec {} -> {exit_kind:?}", self.executions);

        if self.feedback.is_interesting(&self.observer, exit_kind)? {
            let filename = queue_filename(self.corpus.count() + 1);
            let path = self.queue_store.save(&filename, &input)?;
            self.corpus
                .add(Testcase::with_filename(input.clone(), filename));
            log::info!(
                "[*] new path: {} | new edges: {} | total edges: {} | saved to {}",
                input.preview(),
                self.feedback.last_new_edges(),
                self.feedback.coverage(),
                path.display()
            );
            self.update_stats();
            self.monitor.display("New Testcase");
        }

        if self.objective.is_interesting(&self.observer, exit_kind)? {
            let path = self.save_solution(&input)?;
            log::warn!(
                "crash found with input {} ({} bytes), saved to {}",
                input.bytes().escape_ascii(),
                input.len(),
                path.display()
            );
            self.update_stats();
            self.monitor.display("Objective");
            return Ok(Some(Solution { input, path }));
        }

        if self.timeout_feedback.is_interesting(&self.observer, exit_kind)? {
            let path = self.save_hang(&input)?;
            log::warn!(
                "timeout after {:?} with input {}, saved to {}",
                self.executor.timeout(),
                input.preview(),
                path.display()
            );
            self.update_stats();
            self.monitor.display("Timeout");
        } else if exit_kind == ExitKind::Oom {
            log::debug!("target was killed with SIGKILL");
        }

        if self.executions % self.stats_interval == 0 {
            self.update_stats();
            self.monitor.record()?;
        }

        let cur_time = current_time();
        if cur_time.saturating_sub(self.last_heartbeat) >= HEARTBEAT_INTERVAL {
            self.last_heartbeat = cur_time;
            self.update_stats();
            self.monitor.display("Heartbeat");
        }

        Ok(None)
    }

    fn should_stop(&self, start_time: Duration) -> bool {
        if let Some(max_execs) = self.stop.max_execs {
            if self.executions >= max_execs {
                log::info!("reached {max_execs} executions");
                return true;
            }
        }
        if let Some(max_time) = self.stop.max_time {
            if current_time().saturating_sub(start_time) >= max_time {
                log::info!("reached the time limit of {}s", max_time.as_secs());
                return true;
            }
        }
        false
    }

    fn fuzz_until_stopped(&mut self) -> Result<Solution, Error> {
        let start_time = current_time();
        let mut first_solution = None;
        loop {
            if self.should_stop(start_time) {
                return first_solution.ok_or(Error::ShuttingDown);
            }
            if let Some(solution) = self.fuzz_one()? {
                if !self.stop.keep_going {
                    return Ok(solution);
                }
                first_solution.get_or_insert(solution);
            }
        }
    }

    /// Fuzzes until the first solution, or, when keeping going, until a stop condition
    /// triggers.
    ///
    /// A stop condition without any solution ends the loop with [`Error::ShuttingDown`].
    /// When keeping going, the first solution found is returned.
    /// The totals are written to `fuzzer_stats.json` in the output directory in any case.
    pub fn fuzz_loop(&mut self) -> Result<Solution, Error> {
        log::info!(
            "fuzzing with {} initial inputs, output in {}",
            self.corpus.count(),
            self.out_dir.display()
        );
        let res = self.fuzz_until_stopped();

        self.update_stats();
        self.monitor.display("Finished");
        if let Err(err) = self.write_snapshot() {
            log::error!("failed to write the stats snapshot: {err}");
        }
        res
    }

    /// Writes the current totals to `fuzzer_stats.json`
    pub fn write_snapshot(&self) -> Result<PathBuf, Error> {
        let path = self.snapshot_path();
        write_stats_json(&path, self.monitor.stats())?;
        Ok(path)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.out_dir.join(STATS_JSON_FILENAME)
    }
}
