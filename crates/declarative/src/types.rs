//! Core types for reconciliation

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use system::Mode;

/// When a script entry runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunCondition {
    /// Every pass
    #[default]
    Always,
    /// At most once per distinct (name, contents)
    Once,
    /// Whenever the contents differ from the last successful run
    OnChange,
}

impl FromStr for RunCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "once" => Ok(Self::Once),
            "onchange" => Ok(Self::OnChange),
            other => Err(format!("unknown run condition: {other}")),
        }
    }
}

/// Category of target entry, used for `--include` filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Files,
    Dirs,
    Symlinks,
    Scripts,
    Remove,
}

/// Set of entry types taking part in a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTypeSet {
    pub files: bool,
    pub dirs: bool,
    pub symlinks: bool,
    pub scripts: bool,
    pub remove: bool,
}

impl EntryTypeSet {
    pub fn all() -> Self {
        Self {
            files: true,
            dirs: true,
            symlinks: true,
            scripts: true,
            remove: true,
        }
    }

    pub fn none() -> Self {
        Self {
            files: false,
            dirs: false,
            symlinks: false,
            scripts: false,
            remove: false,
        }
    }

    pub fn contains(&self, entry_type: EntryType) -> bool {
        match entry_type {
            EntryType::Files => self.files,
            EntryType::Dirs => self.dirs,
            EntryType::Symlinks => self.symlinks,
            EntryType::Scripts => self.scripts,
            EntryType::Remove => self.remove,
        }
    }
}

impl Default for EntryTypeSet {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for EntryTypeSet {
    type Err = String;

    /// Parse a comma-separated list such as `files,dirs` or `all`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::none();
        for element in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match element {
                "all" => set = Self::all(),
                "files" | "f" => set.files = true,
                "dirs" | "d" => set.dirs = true,
                "symlinks" | "s" => set.symlinks = true,
                "scripts" => set.scripts = true,
                "remove" => set.remove = true,
                other => return Err(format!("unknown entry type: {other}")),
            }
        }
        Ok(set)
    }
}

/// A single System call needed to converge one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Mkdir { mode: Mode },
    WriteFile { contents: Vec<u8>, mode: Mode },
    WriteSymlink { target: PathBuf },
    Chmod { mode: Mode },
    RemoveAll,
    RunScript { contents: Vec<u8> },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Mkdir { mode } => write!(f, "mkdir ({mode})"),
            Action::WriteFile { contents, mode } => {
                write!(f, "write {} bytes ({mode})", contents.len())
            }
            Action::WriteSymlink { target } => write!(f, "symlink -> {}", target.display()),
            Action::Chmod { mode } => write!(f, "chmod {mode}"),
            Action::RemoveAll => write!(f, "remove"),
            Action::RunScript { .. } => write!(f, "run script"),
        }
    }
}

/// Result of applying one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Already converged
    NoChange,
    /// Entry was created
    Created,
    /// Entry was modified
    Modified,
    /// Entry was removed
    Removed,
    /// Script was executed
    Ran,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed | Self::Ran)
    }
}

/// One entry that could not be converged
#[derive(Debug)]
pub struct EntryFailure {
    /// Target path relative to the destination
    pub path: String,
    pub error: Error,
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

/// Summary of a reconciliation pass
#[derive(Debug, Default)]
pub struct ApplySummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub ran: usize,
    pub skipped: usize,
    pub no_change: usize,
    /// Every failed entry, in pass order
    pub failures: Vec<EntryFailure>,
}

impl ApplySummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed + self.ran
    }

    /// Check if the pass was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of entries processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.no_change + self.failures.len()
    }

    /// Add a successful result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Ran => self.ran += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
            // Counted through `failures`
            ApplyResult::Failed { .. } => {}
        }
    }
}

/// Options for a reconciliation pass
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Destination root; empty means paths are used as-is (archives)
    pub dest_dir: PathBuf,
    /// Compute and report actions without performing them
    pub dry_run: bool,
    /// Continue with the next entry after a failure
    pub keep_going: bool,
}

impl ApplyOptions {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::new(),
            dry_run: false,
            keep_going: true,
        }
    }
}
