//! The destination capability contract
//!
//! Every backend implements [`System`] so one reconciliation pass can drive
//! disk mutation, diff generation or archive emission interchangeably.

use crate::error::{Error, Result};
use crate::info::FileInfo;
use crate::mode::Mode;
use crate::state::PersistentState;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Reads from and writes to a destination, executes idempotent commands,
/// runs scripts, and persists state.
///
/// Mutating operations must be safe to repeat when the destination already
/// matches the requested outcome.
pub trait System: PersistentState {
    /// Set permission bits on an existing entry
    fn chmod(&mut self, path: &Path, mode: Mode) -> Result<()>;

    /// Paths matching a glob pattern
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    /// Run a command whose repeated execution has no unintended side effects
    /// and return its standard output
    fn idempotent_cmd_output(&self, cmd: &mut Command) -> Result<Vec<u8>>;

    /// Metadata without following a final symlink
    fn lstat(&self, path: &Path) -> Result<FileInfo>;

    /// Create a single directory
    fn mkdir(&mut self, path: &Path, mode: Mode) -> Result<()>;

    /// Entries of a directory, sorted by name
    fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>>;

    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    fn readlink(&self, path: &Path) -> Result<PathBuf>;

    /// Remove a path and everything below it; a missing path is not an error
    fn remove_all(&mut self, path: &Path) -> Result<()>;

    fn rename(&mut self, old: &Path, new: &Path) -> Result<()>;

    /// Execute `contents` as a script identified by `name`
    fn run_script(&mut self, name: &Path, contents: &[u8]) -> Result<()>;

    /// Metadata following symlinks
    fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Write `data` to `path` with exactly `mode`
    fn write_file(&mut self, path: &Path, data: &[u8], mode: Mode) -> Result<()>;

    /// Make `link` a symlink pointing at `target`
    fn write_symlink(&mut self, target: &Path, link: &Path) -> Result<()>;
}

/// Render a command line for logs and error messages
pub fn describe_command(cmd: &Command) -> String {
    let mut words = vec![cmd.get_program().to_string_lossy().into_owned()];
    words.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    shell_quote_args(&words)
}

/// Join words into a shell-safe string, quoting only where needed
pub fn shell_quote_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| shell_quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "%+,-./:=@_".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Run a command to completion, capturing stdout
pub(crate) fn command_output(cmd: &mut Command) -> Result<Vec<u8>> {
    let command = describe_command(cmd);
    let output = cmd.output().map_err(|e| Error::CommandFailed {
        command: command.clone(),
        message: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed {
            command,
            message: format!("{}: {}", output.status, stderr.trim()),
        });
    }
    Ok(output.stdout)
}
