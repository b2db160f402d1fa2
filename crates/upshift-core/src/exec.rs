//! Shell command execution with placeholder substitution.
//!
//! Commands come either as newline-separated shell lines or as pre-tokenized
//! argument vectors (the VCS adapters use the latter). Every piece of text is
//! run through `{name}` substitution before execution.
//!
//! # Execution modes
//!
//! Mutually exclusive, in priority order:
//!
//! 1. **dry-run**: log the would-be command, execute nothing
//! 2. **verbose**: stream child output to the terminal, fail on non-zero exit
//! 3. **quiet**: capture combined stdout/stderr and return it on success
//!
//! A non-zero exit aborts the remaining lines of the same invocation.

use std::process::{Command, Stdio};

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors from command execution.
#[derive(Error, Debug)]
pub enum ExecError {
    /// Failed to spawn the child process.
    #[error("failed to execute {command:?}: {source}")]
    Spawn {
        /// The command that could not be spawned.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The child exited with a non-zero status.
    #[error("command {command:?} failed with exit code {code:?}")]
    CommandFailed {
        /// The command that failed (after substitution).
        command: String,
        /// The exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured combined output, empty in verbose mode.
        output: String,
    },
}

/// Result alias for command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// A command specification: shell lines or pre-tokenized argument vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSet {
    /// One or more newline-separated shell command lines, run via `sh -c`.
    Shell(String),
    /// Argument vectors executed directly, without a shell.
    Argv(Vec<Vec<String>>),
}

impl From<&str> for CommandSet {
    fn from(value: &str) -> Self {
        Self::Shell(value.to_owned())
    }
}

/// Named `{placeholder}` values substituted into commands before execution.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    pairs: Vec<(&'static str, String)>,
}

impl Substitutions {
    /// An empty substitution set.
    pub const fn none() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Add a named value, builder style.
    #[must_use]
    pub fn set(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.pairs.push((name, value.into()));
        self
    }

    /// Replace every `{name}` token with its value. Unknown tokens pass
    /// through untouched.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for (name, value) in &self.pairs {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}

/// Execute a command set, honoring the dry-run/verbose/quiet mode split.
///
/// Returns the concatenated captured output (quiet mode only; empty
/// otherwise). An empty command set is a no-op.
pub fn execute(
    commands: &CommandSet,
    substitutions: &Substitutions,
    workdir: &Utf8Path,
    verbose: bool,
    dryrun: bool,
) -> ExecResult<String> {
    let mut captured = String::new();

    match commands {
        CommandSet::Shell(block) => {
            for line in block.lines() {
                let line = substitutions.apply(line.trim());
                if line.is_empty() {
                    continue;
                }
                captured.push_str(&run_line(&line, workdir, verbose, dryrun)?);
            }
        }
        CommandSet::Argv(argvs) => {
            for argv in argvs {
                let argv: Vec<String> =
                    argv.iter().map(|part| substitutions.apply(part)).collect();
                let Some((program, args)) = argv.split_first() else {
                    continue;
                };
                captured.push_str(&run_argv(program, args, workdir, verbose, dryrun)?);
            }
        }
    }

    Ok(captured)
}

/// Run one shell line via `sh -c`.
fn run_line(line: &str, workdir: &Utf8Path, verbose: bool, dryrun: bool) -> ExecResult<String> {
    let mut command = Command::new("sh");
    command.args(["-c", line]).current_dir(workdir.as_std_path());
    run_command(command, line, verbose, dryrun)
}

/// Run one pre-tokenized argument vector directly.
fn run_argv(
    program: &str,
    args: &[String],
    workdir: &Utf8Path,
    verbose: bool,
    dryrun: bool,
) -> ExecResult<String> {
    let mut command = Command::new(program);
    command.args(args).current_dir(workdir.as_std_path());

    let mut cmdline = program.to_owned();
    for arg in args {
        cmdline.push(' ');
        cmdline.push_str(arg);
    }
    run_command(command, &cmdline, verbose, dryrun)
}

fn run_command(
    mut command: Command,
    cmdline: &str,
    verbose: bool,
    dryrun: bool,
) -> ExecResult<String> {
    if dryrun {
        info!(command = cmdline, "dry run, not executing");
        return Ok(String::new());
    }

    if verbose {
        debug!(command = cmdline, "executing (verbose)");
        let status = command
            .stdin(Stdio::inherit())
            .status()
            .map_err(|source| ExecError::Spawn {
                command: cmdline.to_owned(),
                source,
            })?;
        if !status.success() {
            return Err(ExecError::CommandFailed {
                command: cmdline.to_owned(),
                code: status.code(),
                output: String::new(),
            });
        }
        return Ok(String::new());
    }

    debug!(command = cmdline, "executing");
    let output = command.output().map_err(|source| ExecError::Spawn {
        command: cmdline.to_owned(),
        source,
    })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        error!(
            command = cmdline,
            code = ?output.status.code(),
            output = combined.trim(),
            "command failed"
        );
        return Err(ExecError::CommandFailed {
            command: cmdline.to_owned(),
            code: output.status.code(),
            output: combined,
        });
    }

    Ok(combined)
}
