//! Turns the stats CSV of a run into a markdown report.

use core::fmt::Write as _;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{monitors::STATS_CSV_FILENAME, Error};

/// Name of the report written into the output directory
pub const REPORT_FILENAME: &str = "report.md";

/// Rows of the coverage table at most
pub const MAX_COVERAGE_SAMPLES: usize = 10;

/// One sample of the stats CSV
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRow {
    /// Seconds since the start of the run
    pub timestamp: f64,
    /// Executions so far
    pub exec_count: u64,
    /// Edges seen so far
    pub coverage: u64,
}

impl StatsRow {
    fn parse(line: &str) -> Result<Self, Error> {
        let mut fields = line.split(',').map(str::trim);
        let (Some(timestamp), Some(exec_count), Some(coverage), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::stats(format!(
                "Expected 3 fields in stats line: {line}"
            )));
        };
        Ok(Self {
            timestamp: timestamp.parse()?,
            exec_count: exec_count.parse()?,
            coverage: coverage.parse()?,
        })
    }
}

/// Parses the stats CSV, skipping the header and empty lines
pub fn parse_stats(content: &str) -> Result<Vec<StatsRow>, Error> {
    content
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(StatsRow::parse)
        .collect()
}

/// Totals of a run, taken from the last sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Run time in seconds
    pub total_time: f64,
    /// Executions
    pub total_execs: u64,
    /// Average executions per second, 0 if no time passed
    pub execs_per_sec: u64,
    /// Edges at the end of the run
    pub coverage: u64,
}

impl Summary {
    /// Summarizes the samples of a run
    pub fn from_rows(rows: &[StatsRow]) -> Result<Self, Error> {
        let last = rows.last().ok_or_else(|| Error::empty("stats file"))?;
        let execs_per_sec = if last.timestamp > 0.0 {
            (last.exec_count as f64 / last.timestamp) as u64
        } else {
            0
        };
        Ok(Self {
            total_time: last.timestamp,
            total_execs: last.exec_count,
            execs_per_sec,
            coverage: last.coverage,
        })
    }
}

/// Picks at most `max` evenly spaced rows, always keeping the first and the last
#[must_use]
pub fn sample_rows(rows: &[StatsRow], max: usize) -> Vec<StatsRow> {
    if rows.len() <= max {
        return rows.to_vec();
    }
    if max <= 1 {
        return rows.last().copied().into_iter().collect();
    }
    (0..max)
        .map(|i| rows[i * (rows.len() - 1) / (max - 1)])
        .collect()
}

/// Renders the markdown report
#[must_use]
pub fn render_report(rows: &[StatsRow], summary: &Summary, out_dir: &Path) -> String {
    let mut report = String::new();
    report.push_str("# Fuzzing Report\n\n");

    report.push_str("## 1. Core statistics\n");
    // writing to a String does not fail
    let _ = writeln!(report, "- **Total run time**: {:.2} s", summary.total_time);
    let _ = writeln!(report, "- **Total executions**: {}", summary.total_execs);
    let _ = writeln!(
        report,
        "- **Average speed**: {} execs/s",
        summary.execs_per_sec
    );
    let _ = writeln!(report, "- **Final coverage**: {} edges", summary.coverage);

    report.push_str("\n## 2. Coverage growth\n\n");
    report.push_str("| time (s) | executions | edges |\n");
    report.push_str("|---:|---:|---:|\n");
    for row in sample_rows(rows, MAX_COVERAGE_SAMPLES) {
        let _ = writeln!(
            report,
            "| {:.2} | {} | {} |",
            row.timestamp, row.exec_count, row.coverage
        );
    }

    report.push_str("\n## 3. Conclusions\n");
    report.push_str(
        "- If the coverage stays flat towards the end, the fuzzer is stuck on a comparison it cannot pass.\n",
    );
    let _ = writeln!(
        report,
        "- Crashing inputs are saved in `{}`.",
        out_dir.display()
    );
    report
}

/// Reads `fuzz_stats.csv` from `out_dir` and writes `report.md` next to it.
pub fn generate_report(out_dir: &Path) -> Result<(PathBuf, Summary), Error> {
    let csv_path = out_dir.join(STATS_CSV_FILENAME);
    if !csv_path.is_file() {
        return Err(Error::stats(format!(
            "stats file not found: {}",
            csv_path.display()
        )));
    }
    let rows = parse_stats(&fs::read_to_string(&csv_path)?)?;
    let summary = Summary::from_rows(&rows)?;

    let report_path = out_dir.join(REPORT_FILENAME);
    fs::write(&report_path, render_report(&rows, &summary, out_dir))?;
    log::info!("report written to {}", report_path.display());
    Ok((report_path, summary))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use crate::{
        current_nanos,
        report::{generate_report, parse_stats, sample_rows, Summary, MAX_COVERAGE_SAMPLES},
        Error,
    };

    const CSV: &str = "timestamp,exec_count,coverage\n0.50,100,1\n1.00,200,2\n2.00,400,3\n";

    #[test]
    fn test_parse_and_summarize() {
        let rows = parse_stats(CSV).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].exec_count, 200);
        let summary = Summary::from_rows(&rows).unwrap();
        assert_eq!(summary.total_execs, 400);
        assert_eq!(summary.execs_per_sec, 200);
        assert_eq!(summary.coverage, 3);

        assert!(parse_stats("timestamp,exec_count,coverage\n1,2\n").is_err());
        assert!(parse_stats("timestamp,exec_count,coverage\nx,2,3\n").is_err());
        assert!(matches!(
            Summary::from_rows(&parse_stats("timestamp,exec_count,coverage\n").unwrap()),
            Err(Error::Empty(_))
        ));
    }

    #[test]
    fn test_zero_time() {
        let rows = parse_stats("timestamp,exec_count,coverage\n0.00,100,1\n").unwrap();
        assert_eq!(Summary::from_rows(&rows).unwrap().execs_per_sec, 0);
    }

    #[test]
    fn test_sampling() {
        let csv: String = (1..=95).fold(String::from("h\n"), |mut s, i| {
            s.push_str(&format!("{i}.0,{},{}\n", i * 100, i));
            s
        });
        let rows = parse_stats(&csv).unwrap();
        let samples = sample_rows(&rows, MAX_COVERAGE_SAMPLES);
        assert_eq!(samples.len(), MAX_COVERAGE_SAMPLES);
        assert_eq!(samples[0], rows[0]);
        assert_eq!(samples[9], rows[94]);
        assert_eq!(sample_rows(&rows[..3], MAX_COVERAGE_SAMPLES).len(), 3);
    }

    #[test]
    fn test_generate_report() {
        let dir = std::env::temp_dir().join(format!("greybox_report_{}", current_nanos()));
        fs::create_dir_all(&dir).unwrap();
        assert!(generate_report(&dir).is_err());

        fs::write(dir.join("fuzz_stats.csv"), CSV).unwrap();
        let (path, summary) = generate_report(&dir).unwrap();
        assert_eq!(summary.total_execs, 400);
        let report = fs::read_to_string(&path).unwrap();
        assert!(report.contains("- **Total executions**: 400"));
        assert!(report.contains("- **Average speed**: 200 execs/s"));
        assert!(report.contains("| 2.00 | 400 | 3 |"));
        assert!(report.contains(&format!("`{}`", Path::new(&dir).display())));
        fs::remove_dir_all(&dir).unwrap();
    }
}
