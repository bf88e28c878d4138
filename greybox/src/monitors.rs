//! Monitors keep the statistics of a fuzzing run and display or persist them.

use core::{fmt, fmt::Debug, time::Duration};
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde_json::json;

use crate::{current_time, format_elapsed, Error};

/// Name of the CSV file the [`OnDiskCsvMonitor`] writes into the output directory
pub const STATS_CSV_FILENAME: &str = "fuzz_stats.csv";

/// Name of the JSON snapshot written at the end of a run
pub const STATS_JSON_FILENAME: &str = "fuzzer_stats.json";

/// Header of the stats CSV
pub const STATS_CSV_HEADER: &str = "timestamp,exec_count,coverage";

/// The statistics of one fuzzing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzerStats {
    /// When the run started, since the epoch
    pub start_time: Duration,
    /// Number of target executions
    pub executions: u64,
    /// Number of entries in the corpus
    pub corpus_size: usize,
    /// Number of solutions found
    pub objective_size: usize,
    /// Number of timeouts saved
    pub hang_size: usize,
    /// Number of distinct edges seen
    pub coverage: usize,
}

impl Default for FuzzerStats {
    fn default() -> Self {
        Self::new(current_time())
    }
}

impl FuzzerStats {
    /// Creates empty stats for a run started at `start_time`
    #[must_use]
    pub fn new(start_time: Duration) -> Self {
        Self {
            start_time,
            executions: 0,
            corpus_size: 0,
            objective_size: 0,
            hang_size: 0,
            coverage: 0,
        }
    }

    /// Time elapsed since the start of the run
    #[must_use]
    pub fn run_time(&self, cur_time: Duration) -> Duration {
        cur_time.saturating_sub(self.start_time)
    }

    /// Executions per second, 0 before the first second has passed
    #[must_use]
    pub fn execs_per_sec(&self, cur_time: Duration) -> f64 {
        let secs = self.run_time(cur_time).as_secs_f64();
        if secs > 0.0 {
            self.executions as f64 / secs
        } else {
            0.0
        }
    }
}

/// The monitor trait keeps track of all the client's monitor, and offers methods to display them.
pub trait Monitor {
    /// The stats, mutable
    fn stats_mut(&mut self) -> &mut FuzzerStats;

    /// The stats
    fn stats(&self) -> &FuzzerStats;

    /// Show the monitor to the user
    fn display(&mut self, event_msg: &str);

    /// Persist a sample of the current stats. Monitors without a backing store do nothing.
    fn record(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Tracking monitor during fuzzing.
#[derive(Clone)]
pub struct SimpleMonitor<F>
where
    F: FnMut(&str),
{
    print_fn: F,
    stats: FuzzerStats,
}

impl<F> Debug for SimpleMonitor<F>
where
    F: FnMut(&str),
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleMonitor")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<F> Monitor for SimpleMonitor<F>
where
    F: FnMut(&str),
{
    fn stats_mut(&mut self) -> &mut FuzzerStats {
        &mut self.stats
    }

    fn stats(&self) -> &FuzzerStats {
        &self.stats
    }

    fn display(&mut self, event_msg: &str) {
        let cur_time = current_time();
        let fmt = format!(
            "[{}] run time: {}, corpus: {}, objectives: {}, executions: {}, exec/sec: {:.2}, edges: {}",
            event_msg,
            format_elapsed(self.stats.run_time(cur_time)),
            self.stats.corpus_size,
            self.stats.objective_size,
            self.stats.executions,
            self.stats.execs_per_sec(cur_time),
            self.stats.coverage,
        );
        (self.print_fn)(&fmt);
    }
}

impl<F> SimpleMonitor<F>
where
    F: FnMut(&str),
{
    /// Creates the monitor, using the `current_time` as `start_time`.
    pub fn new(print_fn: F) -> Self {
        Self {
            print_fn,
            stats: FuzzerStats::default(),
        }
    }
}

/// Wrap a monitor and append a row to a CSV file every time a sample is recorded.
#[derive(Debug)]
pub struct OnDiskCsvMonitor<M>
where
    M: Monitor,
{
    base: M,
    filename: PathBuf,
    writer: BufWriter<File>,
}

impl<M> Monitor for OnDiskCsvMonitor<M>
where
    M: Monitor,
{
    fn stats_mut(&mut self) -> &mut FuzzerStats {
        self.base.stats_mut()
    }

    fn stats(&self) -> &FuzzerStats {
        self.base.stats()
    }

    fn display(&mut self, event_msg: &str) {
        self.base.display(event_msg);
    }

    fn record(&mut self) -> Result<(), Error> {
        let stats = self.base.stats();
        writeln!(
            self.writer,
            "{:.2},{},{}",
            stats.run_time(current_time()).as_secs_f64(),
            stats.executions,
            stats.coverage
        )?;
        self.writer.flush()?;
        self.base.record()
    }
}

impl<M> OnDiskCsvMonitor<M>
where
    M: Monitor,
{
    /// Create a new [`OnDiskCsvMonitor`], truncating `filename` and writing the header.
    pub fn new<P>(filename: P, base: M) -> Result<Self, Error>
    where
        P: Into<PathBuf>,
    {
        let filename = filename.into();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&filename)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{STATS_CSV_HEADER}")?;
        writer.flush()?;
        Ok(Self {
            base,
            filename,
            writer,
        })
    }

    /// The CSV file
    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.filename
    }
}

/// Writes the totals of a run as a JSON object to `path`
pub fn write_stats_json(path: &Path, stats: &FuzzerStats) -> Result<(), Error> {
    let cur_time = current_time();
    let run_time = stats.run_time(cur_time);
    let value = json!({
        "start_time": stats.start_time.as_secs(),
        "run_time": run_time.as_secs_f64(),
        "run_time_pretty": format_elapsed(run_time),
        "executions": stats.executions,
        "exec_sec": stats.execs_per_sec(cur_time),
        "corpus": stats.corpus_size,
        "objectives": stats.objective_size,
        "hangs": stats.hang_size,
        "coverage": stats.coverage,
    });
    let mut file = File::create(path)?;
    serde_json::to_writer_pretty(&mut file, &value)?;
    writeln!(file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::{cell::RefCell, fs};

    use crate::{
        current_nanos,
        monitors::{
            write_stats_json, FuzzerStats, Monitor, OnDiskCsvMonitor, SimpleMonitor,
            STATS_CSV_HEADER,
        },
    };

    #[test]
    fn test_execs_per_sec() {
        let mut stats = FuzzerStats::new(Duration::from_secs(10));
        stats.executions = 500;
        assert!((stats.execs_per_sec(Duration::from_secs(20)) - 50.0).abs() < f64::EPSILON);
        assert!(stats.execs_per_sec(Duration::from_secs(10)).abs() < f64::EPSILON);
        assert_eq!(stats.run_time(Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn test_simple_monitor_line() {
        let lines = RefCell::new(vec![]);
        let mut monitor = SimpleMonitor::new(|s| lines.borrow_mut().push(s.to_string()));
        monitor.stats_mut().corpus_size = 3;
        monitor.stats_mut().coverage = 2;
        monitor.display("New Testcase");
        drop(monitor);
        let lines = lines.into_inner();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[New Testcase] run time: "));
        assert!(lines[0].contains("corpus: 3"));
        assert!(lines[0].ends_with("edges: 2"));
    }

    #[test]
    fn test_csv_rows() {
        let path = std::env::temp_dir().join(format!("greybox_csv_{}", current_nanos()));
        fs::write(&path, "stale").unwrap();
        let mut monitor = OnDiskCsvMonitor::new(&path, SimpleMonitor::new(|_| {})).unwrap();
        monitor.stats_mut().executions = 100;
        monitor.stats_mut().coverage = 1;
        monitor.record().unwrap();
        monitor.stats_mut().executions = 200;
        monitor.stats_mut().coverage = 3;
        monitor.record().unwrap();
        drop(monitor);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], STATS_CSV_HEADER);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(",100,1"));
        assert!(lines[2].ends_with(",200,3"));
        assert!(lines[1].split(',').next().unwrap().parse::<f64>().is_ok());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_json_snapshot() {
        let path = std::env::temp_dir().join(format!("greybox_json_{}", current_nanos()));
        let mut stats = FuzzerStats::default();
        stats.executions = 42;
        stats.objective_size = 1;
        write_stats_json(&path, &stats).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["executions"], 42);
        assert_eq!(value["objectives"], 1);
        assert_eq!(value["hangs"], 0);
        fs::remove_file(&path).unwrap();
    }
}
