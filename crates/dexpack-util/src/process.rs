//! Process execution helpers for dexpack.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};

use crate::error::UtilError;

/// Structured output from a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Render a command as a single shell-like line, for verbose logs.
pub fn display_command(cmd: &Command) -> String {
    let mut line = program_name(cmd);
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Execute a command and capture its output.
///
/// # Errors
/// Returns an error if the command cannot be spawned (e.g. binary not found).
/// A non-zero exit code is **not** an error; check `CommandOutput::success` instead.
pub fn run_command(cmd: &mut Command) -> Result<CommandOutput, UtilError> {
    let output = cmd.output().map_err(|source| UtilError::CommandExec {
        program: program_name(cmd),
        source,
    })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        exit_code: output.status.code(),
    })
}

/// Execute a command, handing each stderr line to `on_stderr_line` as soon as
/// it is written.
///
/// Stdout is drained on a helper thread so a chatty tool cannot block on a
/// full pipe. The returned `CommandOutput` still carries the complete text of
/// both streams.
///
/// # Errors
/// Returns an error if the command cannot be spawned or its pipes cannot be read.
/// A non-zero exit code is **not** an error.
pub fn run_command_streaming(
    cmd: &mut Command,
    mut on_stderr_line: impl FnMut(&str),
) -> Result<CommandOutput, UtilError> {
    let program = program_name(cmd);
    let exec_err = |source| UtilError::CommandExec {
        program: program.clone(),
        source,
    };

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(exec_err)?;

    let stdout_pipe = child.stdout.take();
    let stdout_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout_pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    });

    // Tools echo source text in the platform encoding, so lines are decoded
    // lossily instead of failing on the first non-UTF-8 byte.
    let mut stderr = String::new();
    let mut read_failure = None;
    if let Some(pipe) = child.stderr.take() {
        let mut reader = BufReader::new(pipe);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&raw);
                    let line = text.trim_end_matches(['\n', '\r']);
                    on_stderr_line(line);
                    stderr.push_str(line);
                    stderr.push('\n');
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    read_failure = Some(e);
                    break;
                }
            }
        }
    }

    // Always reap the child, even when its stderr could not be read.
    let status = child.wait().map_err(exec_err)?;
    let stdout = stdout_reader.join().unwrap_or_default();
    if let Some(e) = read_failure {
        return Err(exec_err(e));
    }

    Ok(CommandOutput {
        stdout,
        stderr,
        success: status.success(),
        exit_code: status.code(),
    })
}
