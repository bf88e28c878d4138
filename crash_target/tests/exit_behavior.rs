//! Drives the built `crash_target` binary and checks how it terminates.
#[cfg(unix)]
mod tests {
    use std::{
        io::Write,
        os::unix::process::ExitStatusExt,
        process::{Command, Output, Stdio},
    };

    const SIGABRT: i32 = 6;

    fn run_target(input: &[u8]) -> Output {
        let mut child = Command::new(env!("CARGO_BIN_EXE_crash_target"))
            .env_remove("RUST_LOG")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn crash_target");
        {
            let mut stdin = child.stdin.take().unwrap();
            stdin.write_all(input).unwrap();
        }
        child.wait_with_output().unwrap()
    }

    fn stderr_lines(output: &Output) -> Vec<String> {
        String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_hello_exits_cleanly() {
        let output = run_target(b"hello");
        assert_eq!(output.status.code(), Some(0));
        assert_eq!(
            stderr_lines(&output),
            ["[crash_target] Received 5 bytes: [hello]"]
        );
    }

    #[test]
    fn test_crash_aborts() {
        let output = run_target(b"crash");
        assert_eq!(output.status.code(), None);
        assert_eq!(output.status.signal(), Some(SIGABRT));
        assert_eq!(
            stderr_lines(&output),
            [
                "[crash_target] Received 5 bytes: [crash]",
                "[crash_target] Hit Branch 1 (c)",
                "[crash_target] Hit Branch 2 (r)",
                "[crash_target] Hit Crash Branch!",
            ]
        );
    }

    #[test]
    fn test_crash_prefix_aborts() {
        let output = run_target(b"crash!\n");
        assert_eq!(output.status.signal(), Some(SIGABRT));
    }

    #[test]
    fn test_partial_match_exits_cleanly() {
        let output = run_target(b"craXXX");
        assert_eq!(output.status.code(), Some(0));
        let lines = stderr_lines(&output);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "[crash_target] Hit Branch 1 (c)");
        assert_eq!(lines[2], "[crash_target] Hit Branch 2 (r)");
    }

    #[test]
    fn test_c_only() {
        let output = run_target(b"cab");
        assert_eq!(output.status.code(), Some(0));
        assert_eq!(stderr_lines(&output).len(), 2);
    }

    #[test]
    fn test_full_buffer() {
        let input = [b'q'; 100];
        let output = run_target(&input);
        assert_eq!(output.status.code(), Some(0));
        let lines = stderr_lines(&output);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            format!("[crash_target] Received 100 bytes: [{}]", "q".repeat(100))
        );
    }

    #[test]
    fn test_empty_input() {
        let output = run_target(b"");
        assert_eq!(output.status.code(), Some(1));
        assert!(output.stderr.is_empty());
    }
}
