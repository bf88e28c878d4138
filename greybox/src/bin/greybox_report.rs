//! `greybox-report` writes a markdown summary of a finished fuzzing run.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use greybox::report::generate_report;

#[derive(Debug, Parser)]
#[command(
    name = "greybox-report",
    about = "Summarize the stats CSV of a greybox run into report.md"
)]
struct Opt {
    /// output directory of the run
    #[arg(short = 'o', default_value = "out")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opt = Opt::parse();

    match generate_report(&opt.output_dir) {
        Ok((path, summary)) => {
            println!(
                "[+] {} executions in {:.2}s ({} execs/s), {} edges",
                summary.total_execs, summary.total_time, summary.execs_per_sec, summary.coverage
            );
            println!("[+] report written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
