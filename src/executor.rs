use crate::error::Result;
use crate::types::ExecutionResult;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Runs a shell command, streaming output to the user while capturing it.
pub trait CommandRunner {
    fn run(&mut self, command: &str) -> Result<ExecutionResult>;
}

pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> Result<ExecutionResult> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // both channels stream live and are captured; reader threads keep
        // the pipes drained so the child never blocks on a full buffer
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let out_handle = thread::spawn(move || tee(stdout_pipe, std::io::stdout()));
        let err_handle = thread::spawn(move || tee(stderr_pipe, std::io::stderr()));

        let status = child.wait()?;
        let stdout = out_handle.join().unwrap_or_default();
        let stderr = err_handle.join().unwrap_or_default();

        Ok(ExecutionResult {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

fn tee<R: Read, W: Write>(pipe: Option<R>, mut sink: W) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };
    let mut captured = String::new();
    for line in BufReader::new(pipe).lines() {
        let Ok(line) = line else { break };
        let _ = writeln!(sink, "{}", line);
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let result = ShellRunner.run("echo hello").unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "");
    }

    #[test]
    fn captures_stderr_separately() {
        let result = ShellRunner.run("echo oops 1>&2").unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stderr, "oops\n");
    }

    #[test]
    fn nonzero_exit_is_reported_not_raised() {
        let result = ShellRunner.run("exit 3").unwrap();
        assert_eq!(result.exit_code, 3);
    }
}
