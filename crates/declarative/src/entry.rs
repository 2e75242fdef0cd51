//! Target entries: the desired state of one destination path
//!
//! Entries are produced by a source-state loader and consumed by the
//! executor. Paths are relative to the destination root and use `/` as
//! separator.

use crate::context::ApplyContext;
use crate::error::Result;
use crate::types::{EntryType, RunCondition};
use std::path::PathBuf;
use system::Mode;

/// Raw contents of a file or script plus how to turn them into bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contents {
    pub data: Vec<u8>,
    /// Render through the template engine
    pub template: bool,
    /// Decrypt with the encryption tool before rendering
    pub encrypted: bool,
}

impl Contents {
    /// Plain contents, used as-is
    pub fn plain(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Template contents, rendered on resolution
    pub fn template(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            template: true,
            encrypted: false,
        }
    }

    /// Produce the final bytes: decrypt first, then render
    pub fn resolve(&self, name: &str, ctx: &mut ApplyContext<'_>) -> Result<Vec<u8>> {
        let mut data = if self.encrypted {
            match ctx.encryption {
                Some(tool) => tool.decrypt(name, &self.data)?,
                None => {
                    return Err(system::Error::Encryption(format!(
                        "{name} is encrypted but no encryption tool is configured"
                    ))
                    .into());
                }
            }
        } else {
            self.data.clone()
        };
        if self.template {
            data = ctx.templates.execute_template_data(name, &data)?;
        }
        Ok(data)
    }
}

/// What the destination path should be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File { contents: Contents, mode: Mode },
    Dir { mode: Mode },
    Symlink { target: PathBuf },
    /// The path should not exist
    Remove,
    Script {
        contents: Contents,
        condition: RunCondition,
    },
}

/// A desired destination entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    /// Path relative to the destination root
    pub path: String,
    pub kind: EntryKind,
}

impl TargetEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn file(path: impl Into<String>, data: impl Into<Vec<u8>>, mode: Mode) -> Self {
        Self::new(
            path,
            EntryKind::File {
                contents: Contents::plain(data),
                mode,
            },
        )
    }

    pub fn dir(path: impl Into<String>, mode: Mode) -> Self {
        Self::new(path, EntryKind::Dir { mode })
    }

    pub fn symlink(path: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self::new(
            path,
            EntryKind::Symlink {
                target: target.into(),
            },
        )
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::new(path, EntryKind::Remove)
    }

    pub fn script(path: impl Into<String>, data: impl Into<Vec<u8>>, condition: RunCondition) -> Self {
        Self::new(
            path,
            EntryKind::Script {
                contents: Contents::plain(data),
                condition,
            },
        )
    }

    /// Category used by [`crate::EntryTypeSet`] filtering
    pub fn entry_type(&self) -> EntryType {
        match self.kind {
            EntryKind::File { .. } => EntryType::Files,
            EntryKind::Dir { .. } => EntryType::Dirs,
            EntryKind::Symlink { .. } => EntryType::Symlinks,
            EntryKind::Remove => EntryType::Remove,
            EntryKind::Script { .. } => EntryType::Scripts,
        }
    }

    /// Whether this entry lies at or below `target`
    pub fn is_under(&self, target: &str) -> bool {
        let target = target.trim_end_matches('/');
        target.is_empty()
            || self.path == target
            || self
                .path
                .strip_prefix(target)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
