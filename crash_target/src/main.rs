//! Reads stdin once and aborts if it starts with `crash`.
use std::{io, process};

use crash_target::{Verdict, EXIT_NO_INPUT};

fn main() {
    env_logger::init();

    let stdin = io::stdin();
    let res = crash_target::run(&mut stdin.lock(), io::stderr().lock());
    match res {
        Ok(Verdict::Exit) => process::exit(0),
        Ok(Verdict::Crash) => {
            log::debug!("crash pattern matched, aborting");
            process::abort()
        }
        Err(err) => {
            log::debug!("{err}");
            process::exit(EXIT_NO_INPUT)
        }
    }
}
