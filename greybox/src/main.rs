//! `greybox`, an afl-fuzz like front-end for the greybox library.

use core::time::Duration;
use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use greybox::{
    corpus::{create_dir_if_not_exists, load_initial_inputs},
    current_nanos,
    executors::{check_binary, CommandExecutor, DEFAULT_CRASH_EXITCODE},
    fuzzer::{StdFuzzer, StopConditions, DEFAULT_STATS_INTERVAL},
    monitors::{OnDiskCsvMonitor, SimpleMonitor, STATS_CSV_FILENAME},
    mutators::{havoc::DEFAULT_MAX_SIZE, HavocMutator, Tokens},
    observers::{StdErrObserver, DEFAULT_EDGE_PATTERN},
    rands::StdRand,
    Error,
};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "greybox",
    about = "A grey-box fuzzer for programs that read their input from stdin"
)]
/// The Configuration
struct Opt {
    /// the program to fuzz
    executable: PathBuf,
    /// arguments passed to the program, after `--`
    #[arg(last = true)]
    target_args: Vec<String>,

    /// seed directory, new coverage is saved here as well
    #[arg(short = 'i', default_value = "seeds")]
    input_dir: PathBuf,
    /// output directory for crashes, hangs and stats
    #[arg(short = 'o', default_value = "out")]
    output_dir: PathBuf,
    /// use a fixed seed for the RNG
    #[arg(short = 's')]
    rng_seed: Option<u64>,
    /// timeout of one execution, in milliseconds
    #[arg(short = 't', default_value_t = 500)]
    hang_timeout: u64,
    /// fuzz for this many seconds
    #[arg(short = 'V')]
    fuzz_for_seconds: Option<u64>,
    /// stop after this many executions
    #[arg(long)]
    max_execs: Option<u64>,
    /// maximum length of a generated input
    #[arg(short = 'G', default_value_t = DEFAULT_MAX_SIZE)]
    max_input_len: usize,
    /// fuzzer dictionary, may be given several times
    #[arg(short = 'x')]
    dicts: Vec<PathBuf>,
    /// exit code of the target that counts as a crash
    #[arg(long, default_value_t = DEFAULT_CRASH_EXITCODE)]
    crash_exitcode: i32,
    /// executions between two rows of the stats CSV
    #[arg(long, default_value_t = DEFAULT_STATS_INTERVAL)]
    stats_interval: u64,
    /// regex for the stderr lines of the target that count as edges
    #[arg(long, default_value = DEFAULT_EDGE_PATTERN)]
    edge_pattern: String,
    /// keep fuzzing after the first crash
    #[arg(long)]
    keep_going: bool,
    /// show the target's stdout
    #[arg(long)]
    debug_child: bool,
}

fn run(opt: &Opt) -> Result<(), Error> {
    let executable = check_binary(&opt.executable)?;
    create_dir_if_not_exists(&opt.output_dir)?;

    let mut tokens = Tokens::default();
    for dict in &opt.dicts {
        let added = tokens.add_from_file(dict)?;
        log::info!("loaded {added} tokens from {}", dict.display());
    }

    let corpus = load_initial_inputs(&opt.input_dir)?;

    let executor = CommandExecutor::builder()
        .program(&executable)
        .args(&opt.target_args)
        .timeout(Duration::from_millis(opt.hang_timeout))
        .crash_exitcode(Some(opt.crash_exitcode))
        .debug_child(opt.debug_child)
        .build()?;
    let observer = StdErrObserver::new("stderr", &opt.edge_pattern)?;

    let monitor = OnDiskCsvMonitor::new(
        opt.output_dir.join(STATS_CSV_FILENAME),
        SimpleMonitor::new(|s| println!("{s}")),
    )?;

    let seed = opt.rng_seed.unwrap_or_else(current_nanos);
    log::info!("RNG seed: {seed}");

    println!(
        "[+] fuzzing {} with {} initial inputs",
        executable.display(),
        corpus.count()
    );

    let mut fuzzer = StdFuzzer::new(
        StdRand::with_seed(seed),
        corpus,
        HavocMutator::new(tokens).with_max_size(opt.max_input_len),
        executor,
        observer,
        monitor,
    )
    .with_dirs(&opt.input_dir, &opt.output_dir)
    .with_stats_interval(opt.stats_interval)
    .with_stop_conditions(StopConditions {
        keep_going: opt.keep_going,
        max_execs: opt.max_execs,
        max_time: opt.fuzz_for_seconds.map(Duration::from_secs),
    });

    let solution = fuzzer.fuzz_loop()?;
    println!();
    println!("{}", "!".repeat(20));
    println!("[!] crash found");
    println!("[!] input: {}", solution.input.bytes().escape_ascii());
    println!("[!] saved to {}", solution.path.display());
    println!("{}", "!".repeat(20));
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opt = Opt::parse();

    match run(&opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::ShuttingDown) => {
            println!("Fuzzing stopped. Good bye.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
