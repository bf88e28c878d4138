//! The command executor runs the target as a child process for each input,
//! feeding the input to its stdin.

use core::time::Duration;
use std::{
    ffi::{OsStr, OsString},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStderr, ChildStdin, Command, ExitStatus, Stdio},
    thread::{self, JoinHandle},
};

use wait_timeout::ChildExt;

use crate::{inputs::BytesInput, observers::StdErrObserver, Error};

/// Default time a single execution may take
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default exit code that the target uses to report a crash without a signal
pub const DEFAULT_CRASH_EXITCODE: i32 = 66;

/// How an execution finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitKind {
    /// The run exited normally.
    Ok,
    /// The run resulted in a target crash.
    Crash,
    /// The run hit an out of memory error.
    Oom,
    /// The run timed out
    Timeout,
}

/// A `CommandExecutor` is a wrapper around [`std::process::Command`] to execute a target as a child process.
/// Use [`CommandExecutor::builder()`] to construct one.
#[derive(Debug)]
pub struct CommandExecutor {
    command: Command,
    timeout: Duration,
    crash_exitcode: Option<i32>,
    last_status: Option<ExitStatus>,
}

impl CommandExecutor {
    /// Creates a builder for a new [`CommandExecutor`].
    ///
    /// It mimics the api of [`Command`], specifically, you will use
    /// `arg`, `args`, `env`, and so on.
    #[must_use]
    pub fn builder() -> CommandExecutorBuilder {
        CommandExecutorBuilder::new()
    }

    /// The time a single run may take
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exit status of the last run that finished on its own
    #[must_use]
    pub fn last_status(&self) -> Option<ExitStatus> {
        self.last_status
    }

    /// Spawns the target, then hands the input to a feeder thread and stderr to a drain
    /// thread, so neither pipe can stall the deadline in [`Self::run_target`].
    fn spawn_child(&mut self, input: &BytesInput) -> Result<(Child, StderrDrain), Error> {
        let mut child = self.command.spawn()?;
        let (Some(stdin), Some(stderr)) = (child.stdin.take(), child.stderr.take()) else {
            kill_and_reap(&mut child);
            return Err(Error::illegal_state(
                "stdin and stderr of the child must be piped",
            ));
        };

        let bytes = input.bytes().to_vec();
        let feeder = thread::Builder::new()
            .name("greybox-stdin".into())
            .spawn(move || feed_stdin(stdin, &bytes));
        // the feeder is detached: a target that never reads must not hold us past the deadline
        if let Err(err) = feeder {
            kill_and_reap(&mut child);
            return Err(err.into());
        }

        let drain = thread::Builder::new()
            .name("greybox-stderr".into())
            .spawn(move || drain_stderr(stderr));
        match drain {
            Ok(drain) => Ok((child, drain)),
            Err(err) => {
                kill_and_reap(&mut child);
                Err(err.into())
            }
        }
    }

    /// Runs the target once with `input` on its stdin.
    ///
    /// The child's stderr is handed to `observer` unless the run timed out.
    /// The deadline covers the whole run, including feeding stdin.
    pub fn run_target(
        &mut self,
        input: &BytesInput,
        observer: &mut StdErrObserver,
    ) -> Result<ExitKind, Error> {
        observer.pre_exec();
        self.last_status = None;

        let (mut child, drain) = self.spawn_child(input)?;
        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                kill_and_reap(&mut child);
                return Ok(ExitKind::Timeout);
            }
            Err(err) => {
                kill_and_reap(&mut child);
                return Err(err.into());
            }
        };
        self.last_status = Some(status);

        let stderr = drain
            .join()
            .map_err(|_| Error::illegal_state("the stderr drain thread panicked"))??;
        observer.post_exec(String::from_utf8_lossy(&stderr).into_owned());

        Ok(self.classify(status))
    }

    /// Maps an exit status to an [`ExitKind`]
    #[must_use]
    pub fn classify(&self, status: ExitStatus) -> ExitKind {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;

            use nix::sys::signal::Signal;

            // for reference: https://www.man7.org/linux/man-pages/man7/signal.7.html
            if let Some(signal) = status.signal() {
                return match Signal::try_from(signal) {
                    Ok(Signal::SIGKILL) => ExitKind::Oom,
                    Ok(sig) => {
                        log::debug!("target terminated by {sig}");
                        ExitKind::Crash
                    }
                    Err(_) => {
                        log::debug!("target terminated by unknown signal {signal}");
                        ExitKind::Crash
                    }
                };
            }
        }
        match status.code() {
            Some(code) if Some(code) == self.crash_exitcode => ExitKind::Crash,
            _ => ExitKind::Ok,
        }
    }
}

type StderrDrain = JoinHandle<io::Result<Vec<u8>>>;

fn kill_and_reap(child: &mut Child) {
    // if this fails, there is not much we can do. let's hope it failed because the process finished
    // in the meantime.
    drop(child.kill());
    // finally, try to wait to properly clean up system resources.
    drop(child.wait());
}

fn feed_stdin(mut stdin: ChildStdin, bytes: &[u8]) {
    match stdin.write_all(bytes).and_then(|()| stdin.flush()) {
        Ok(()) => {}
        // The target may exit without consuming everything we sent.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            log::trace!("target closed stdin early");
        }
        Err(err) => log::warn!("feeding the input to the target failed: {err}"),
    }
}

fn drain_stderr(mut stderr: ChildStderr) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stderr.read_to_end(&mut buf)?;
    Ok(buf)
}

/// The builder for a [`CommandExecutor`]
#[derive(Debug, Clone)]
pub struct CommandExecutorBuilder {
    debug_child: bool,
    program: Option<OsString>,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    timeout: Duration,
    crash_exitcode: Option<i32>,
}

impl Default for CommandExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutorBuilder {
    /// Create a new [`CommandExecutorBuilder`]
    #[must_use]
    fn new() -> CommandExecutorBuilder {
        CommandExecutorBuilder {
            program: None,
            args: vec![],
            cwd: None,
            envs: vec![],
            debug_child: false,
            timeout: DEFAULT_TIMEOUT,
            crash_exitcode: Some(DEFAULT_CRASH_EXITCODE),
        }
    }

    /// Set the binary to execute
    /// This option is required.
    pub fn program<O>(&mut self, program: O) -> &mut Self
    where
        O: AsRef<OsStr>,
    {
        self.program = Some(program.as_ref().to_owned());
        self
    }

    /// Adds an argument to the program's commandline.
    pub fn arg<O: AsRef<OsStr>>(&mut self, arg: O) -> &mut CommandExecutorBuilder {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Adds a range of arguments to the program's commandline.
    pub fn args<IT, O>(&mut self, args: IT) -> &mut CommandExecutorBuilder
    where
        IT: IntoIterator<Item = O>,
        O: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    /// Adds a range of environment variables to the executed command.
    pub fn envs<IT, K, V>(&mut self, vars: IT) -> &mut CommandExecutorBuilder
    where
        IT: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        for (ref key, ref val) in vars {
            self.env(key.as_ref(), val.as_ref());
        }
        self
    }

    /// Adds an environment variable to the executed command.
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut CommandExecutorBuilder
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.envs
            .push((key.as_ref().to_owned(), val.as_ref().to_owned()));
        self
    }

    /// Sets the working directory for the child process.
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut CommandExecutorBuilder {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// If set to true, the child's stdout won't be redirected to `/dev/null`.
    /// Defaults to `false`.
    pub fn debug_child(&mut self, debug_child: bool) -> &mut CommandExecutorBuilder {
        self.debug_child = debug_child;
        self
    }

    /// Sets the time a single run may take. Defaults to [`DEFAULT_TIMEOUT`].
    pub fn timeout(&mut self, timeout: Duration) -> &mut CommandExecutorBuilder {
        self.timeout = timeout;
        self
    }

    /// Sets the exit code counted as a crash, `None` to only count signals.
    /// Defaults to [`DEFAULT_CRASH_EXITCODE`].
    pub fn crash_exitcode(&mut self, code: Option<i32>) -> &mut CommandExecutorBuilder {
        self.crash_exitcode = code;
        self
    }

    /// Builds the `CommandExecutor`
    pub fn build(&self) -> Result<CommandExecutor, Error> {
        let Some(program) = &self.program else {
            return Err(Error::config(
                "CommandExecutor::builder: no program set!",
            ));
        };
        if self.timeout.is_zero() {
            return Err(Error::config(
                "CommandExecutor::builder: timeout must not be zero",
            ));
        }
        let mut command = Command::new(program);
        command.args(&self.args);
        command.envs(
            self.envs
                .iter()
                .map(|(k, v)| (k.as_os_str(), v.as_os_str())),
        );
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command.stdin(Stdio::piped());
        command.stderr(Stdio::piped());
        if self.debug_child {
            command.stdout(Stdio::inherit());
        } else {
            command.stdout(Stdio::null());
        }

        Ok(CommandExecutor {
            command,
            timeout: self.timeout,
            crash_exitcode: self.crash_exitcode,
            last_status: None,
        })
    }
}

/// Searches `$PATH` for an executable called `name`
#[cfg(unix)]
fn find_executable_in_path(name: &Path) -> Option<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|candidate| {
                candidate.is_file()
                    && candidate
                        .metadata()
                        .is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
            })
    })
}

/// Resolves and validates the target binary.
///
/// A bare program name is looked up in `$PATH`. The result must be a regular,
/// executable file of at least four bytes.
#[cfg(unix)]
pub fn check_binary(executable: &Path) -> Result<PathBuf, Error> {
    use std::os::unix::fs::PermissionsExt;

    let bin_path = if executable.components().count() == 1 && !executable.exists() {
        find_executable_in_path(executable).ok_or_else(|| {
            Error::config(format!(
                "Program '{}' not found or not executable",
                executable.display()
            ))
        })?
    } else {
        executable.to_path_buf()
    };

    let metadata = bin_path.metadata().map_err(|_| {
        Error::config(format!(
            "Program '{}' not found or not executable",
            bin_path.display()
        ))
    })?;
    let is_executable = metadata.permissions().mode() & 0o111 != 0;
    if !bin_path.is_file() || !is_executable || metadata.len() < 4 {
        return Err(Error::config(format!(
            "Program '{}' not found or not executable",
            bin_path.display()
        )));
    }
    Ok(bin_path)
}

/// Validates the target binary: it must be an existing regular file.
#[cfg(not(unix))]
pub fn check_binary(executable: &Path) -> Result<PathBuf, Error> {
    if executable.is_file() {
        Ok(executable.to_path_buf())
    } else {
        Err(Error::config(format!(
            "Program '{}' not found",
            executable.display()
        )))
    }
}
