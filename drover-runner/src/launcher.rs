use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use drover_core::{CommandLine, EnvVars};
use tracing::debug;

/// Process-execution capability injected into the driver.
///
/// Implementations run the command to completion in `pwd` with the prepared
/// environment, write any process output to `sink`, and return the raw exit
/// code. Spawn failures and waits cut short surface as `io::Error`.
pub trait Launcher: Send + Sync {
    fn run(
        &self,
        command: &CommandLine,
        pwd: &Path,
        env: &EnvVars,
        sink: &mut dyn Write,
    ) -> io::Result<i32>;
}

/// Launcher backed by `std::process::Command`.
///
/// The prepared environment is merged over the inherited one, stdin is
/// closed, and once the process exits its stdout followed by its stderr is
/// written to the sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn run(
        &self,
        command: &CommandLine,
        pwd: &Path,
        env: &EnvVars,
        sink: &mut dyn Write,
    ) -> io::Result<i32> {
        debug!(command = %command, pwd = %pwd.display(), "Spawning process");

        let output = Command::new(command.program())
            .args(command.arg_values())
            .current_dir(pwd)
            .envs(env)
            .stdin(Stdio::null())
            .output()?;

        sink.write_all(&output.stdout)?;
        sink.write_all(&output.stderr)?;
        sink.flush()?;

        exit_code(output.status)
    }
}

fn exit_code(status: ExitStatus) -> io::Result<i32> {
    match status.code() {
        Some(code) => Ok(code),
        None => Err(interrupted(status)),
    }
}

// A status without a code means the process was killed by a signal; the
// wait was cut short rather than the command having failed on its own.
#[cfg(unix)]
fn interrupted(status: ExitStatus) -> io::Error {
    use std::os::unix::process::ExitStatusExt;

    let detail = match status.signal() {
        Some(signal) => format!("process terminated by signal {}", signal),
        None => "process terminated without an exit code".to_string(),
    };
    io::Error::new(io::ErrorKind::Interrupted, detail)
}

#[cfg(not(unix))]
fn interrupted(_status: ExitStatus) -> io::Error {
    io::Error::new(
        io::ErrorKind::Interrupted,
        "process terminated without an exit code",
    )
}

/// Resolves a tool on the caller's PATH, for preflight diagnostics. Returns
/// the executable's location, or `None` when the tool is not installed.
pub fn find_tool(name: &str) -> Option<PathBuf> {
    match which::which(name) {
        Ok(path) => {
            debug!(tool = name, path = %path.display(), "Tool resolved on PATH");
            Some(path)
        }
        Err(_) => {
            debug!(tool = name, "Tool not found on PATH");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_reports_missing_programs() {
        let command = CommandLine::new("drover-no-such-tool");
        let mut sink = Vec::new();
        let err = SystemLauncher
            .run(&command, Path::new("."), &EnvVars::new(), &mut sink)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_find_tool_misses_unknown_tools() {
        assert!(find_tool("drover-no-such-tool").is_none());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn sh(script: &str) -> CommandLine {
            CommandLine::new("sh").arg("-c").arg(script)
        }

        #[test]
        fn test_run_returns_the_exit_code() {
            let mut sink = Vec::new();
            let code = SystemLauncher
                .run(&sh("exit 3"), Path::new("."), &EnvVars::new(), &mut sink)
                .unwrap();
            assert_eq!(code, 3);
        }

        #[test]
        fn test_run_writes_stdout_then_stderr() {
            let mut sink = Vec::new();
            let code = SystemLauncher
                .run(
                    &sh("echo out; echo err >&2"),
                    Path::new("."),
                    &EnvVars::new(),
                    &mut sink,
                )
                .unwrap();
            assert_eq!(code, 0);
            assert_eq!(String::from_utf8_lossy(&sink), "out\nerr\n");
        }

        #[test]
        fn test_run_merges_the_prepared_environment() {
            let mut env = EnvVars::new();
            env.insert("DROVER_TEST_FLAG".to_string(), "on".to_string());

            let mut sink = Vec::new();
            SystemLauncher
                .run(
                    &sh("printf '%s' \"$DROVER_TEST_FLAG:$PATH\""),
                    Path::new("."),
                    &env,
                    &mut sink,
                )
                .unwrap();

            let text = String::from_utf8_lossy(&sink);
            assert!(text.starts_with("on:"));
            // Inherited variables stay visible alongside the prepared ones.
            assert_ne!(text.as_ref(), "on:");
        }

        #[test]
        fn test_run_uses_the_working_directory() {
            let dir = tempfile::tempdir().unwrap();
            let expected = dir.path().canonicalize().unwrap();

            let mut sink = Vec::new();
            SystemLauncher
                .run(&sh("pwd"), dir.path(), &EnvVars::new(), &mut sink)
                .unwrap();

            let reported = String::from_utf8_lossy(&sink);
            assert_eq!(
                Path::new(reported.trim_end()).canonicalize().unwrap(),
                expected
            );
        }

        #[test]
        fn test_run_surfaces_signal_death_as_interrupted() {
            let mut sink = Vec::new();
            let err = SystemLauncher
                .run(
                    &sh("kill -TERM $$"),
                    Path::new("."),
                    &EnvVars::new(),
                    &mut sink,
                )
                .unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::Interrupted);
            assert!(err.to_string().contains("signal"));
        }

        #[test]
        fn test_find_tool_locates_sh() {
            assert!(find_tool("sh").is_some());
        }
    }
}
