//! Diff computation - the minimal actions that converge one path

use crate::error::Result;
use crate::types::{Action, ApplyResult};
use std::path::{Path, PathBuf};
use system::{FileInfo, Mode, System};

/// Permission bits are only compared where the platform has them
pub const POSIX_FILE_MODES: bool = cfg!(unix);

/// Fully resolved desired state of a destination path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desired {
    File { contents: Vec<u8>, mode: Mode },
    Dir { mode: Mode },
    Symlink { target: PathBuf },
    Absent,
}

/// Actions needed to converge one path, and what they amount to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDiff {
    pub actions: Vec<Action>,
    /// Result reported once every action succeeds
    pub outcome: ApplyResult,
}

impl EntryDiff {
    fn unchanged() -> Self {
        Self {
            actions: Vec::new(),
            outcome: ApplyResult::NoChange,
        }
    }

    fn created(action: Action) -> Self {
        Self {
            actions: vec![action],
            outcome: ApplyResult::Created,
        }
    }

    fn modified(actions: Vec<Action>) -> Self {
        Self {
            actions,
            outcome: ApplyResult::Modified,
        }
    }

    /// Whether the path already matches
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Compare the current state of `path` against `desired`
pub fn compute_diff<S: System + ?Sized>(
    system: &S,
    path: &Path,
    desired: &Desired,
) -> Result<EntryDiff> {
    let current = match system.lstat(path) {
        Ok(info) => Some(info),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    let diff = match (desired, current) {
        (Desired::Absent, None) => EntryDiff::unchanged(),
        (Desired::Absent, Some(_)) => EntryDiff {
            actions: vec![Action::RemoveAll],
            outcome: ApplyResult::Removed,
        },

        (Desired::Dir { mode }, None) => EntryDiff::created(Action::Mkdir { mode: *mode }),
        (Desired::Dir { mode }, Some(info)) if info.is_dir() => chmod_if_needed(&info, *mode),
        (Desired::Dir { mode }, Some(_)) => {
            EntryDiff::modified(vec![Action::RemoveAll, Action::Mkdir { mode: *mode }])
        }

        (Desired::File { contents, mode }, None) => EntryDiff::created(Action::WriteFile {
            contents: contents.clone(),
            mode: *mode,
        }),
        (Desired::File { contents, mode }, Some(info)) if info.is_file() => {
            if system.read_file(path)? == *contents {
                chmod_if_needed(&info, *mode)
            } else {
                EntryDiff::modified(vec![Action::WriteFile {
                    contents: contents.clone(),
                    mode: *mode,
                }])
            }
        }
        (Desired::File { contents, mode }, Some(_)) => EntryDiff::modified(vec![
            Action::RemoveAll,
            Action::WriteFile {
                contents: contents.clone(),
                mode: *mode,
            },
        ]),

        (Desired::Symlink { target }, None) => EntryDiff::created(Action::WriteSymlink {
            target: target.clone(),
        }),
        (Desired::Symlink { target }, Some(info)) if info.is_symlink() => {
            if system.readlink(path)? == *target {
                EntryDiff::unchanged()
            } else {
                EntryDiff::modified(vec![Action::WriteSymlink {
                    target: target.clone(),
                }])
            }
        }
        (Desired::Symlink { target }, Some(_)) => EntryDiff::modified(vec![
            Action::RemoveAll,
            Action::WriteSymlink {
                target: target.clone(),
            },
        ]),
    };
    Ok(diff)
}

fn chmod_if_needed(info: &FileInfo, mode: Mode) -> EntryDiff {
    if POSIX_FILE_MODES && info.mode != mode {
        EntryDiff::modified(vec![Action::Chmod { mode }])
    } else {
        EntryDiff::unchanged()
    }
}
