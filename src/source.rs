//! Source state: the `stencil.toml` manifest in the source directory

use anyhow::{Context, Result, bail};
use declarative::{Contents, EntryKind, RunCondition, TargetEntry};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use system::Mode;

/// Manifest file name inside the source directory
pub const MANIFEST_FILE: &str = "stencil.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    /// Globs excluded from every pass
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default, rename = "entry")]
    entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ManifestType {
    File,
    Dir,
    Symlink,
    Script,
    Remove,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    path: String,
    #[serde(rename = "type")]
    kind: ManifestType,
    /// File relative to the source directory
    source: Option<String>,
    /// Inline contents
    contents: Option<String>,
    #[serde(default)]
    template: bool,
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    executable: bool,
    #[serde(default)]
    private: bool,
    /// Symlink target
    target: Option<String>,
    #[serde(default)]
    run: RunCondition,
}

/// Desired entries and ignore patterns read from a source directory
#[derive(Debug, Default)]
pub struct SourceState {
    pub entries: Vec<TargetEntry>,
    pub ignore: Vec<String>,
}

impl SourceState {
    /// Read `stencil.toml` from `source_dir`
    pub fn load(source_dir: &Path, umask: Mode) -> Result<Self> {
        let path = source_dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content, source_dir, umask)
            .with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Parse a manifest; `source` paths are resolved against `source_dir`
    pub fn parse(content: &str, source_dir: &Path, umask: Mode) -> Result<Self> {
        let manifest: Manifest = toml::from_str(content)?;

        let mut entries = manifest
            .entries
            .into_iter()
            .map(|entry| entry.into_target(source_dir, umask))
            .collect::<Result<Vec<_>>>()?;
        // Sorting by path puts parents before their children
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].path == pair[1].path) {
            bail!("Duplicate entry {}", pair[0].path);
        }

        log::debug!("Loaded {} entries", entries.len());
        Ok(Self {
            entries,
            ignore: manifest.ignore,
        })
    }
}

impl ManifestEntry {
    fn into_target(self, source_dir: &Path, umask: Mode) -> Result<TargetEntry> {
        let path = normalize(&self.path)?;
        let kind = match self.kind {
            ManifestType::File => {
                let base = if self.executable {
                    Mode::EXECUTABLE
                } else {
                    Mode::FILE
                };
                EntryKind::File {
                    contents: self.contents(source_dir, &path)?,
                    mode: self.finish_mode(base, umask),
                }
            }
            ManifestType::Dir => EntryKind::Dir {
                mode: self.finish_mode(Mode::EXECUTABLE, umask),
            },
            ManifestType::Symlink => match &self.target {
                Some(target) => EntryKind::Symlink {
                    target: PathBuf::from(target),
                },
                None => bail!("{path}: symlink needs a target"),
            },
            ManifestType::Script => EntryKind::Script {
                contents: self.contents(source_dir, &path)?,
                condition: self.run,
            },
            ManifestType::Remove => EntryKind::Remove,
        };
        Ok(TargetEntry::new(path, kind))
    }

    fn finish_mode(&self, base: Mode, umask: Mode) -> Mode {
        let mode = base.apply_umask(umask);
        if self.private { mode.private() } else { mode }
    }

    fn contents(&self, source_dir: &Path, path: &str) -> Result<Contents> {
        let data = match (&self.source, &self.contents) {
            (Some(source), None) => {
                let file = source_dir.join(source);
                fs::read(&file).with_context(|| format!("Could not read {}", file.display()))?
            }
            (None, Some(contents)) => contents.clone().into_bytes(),
            (None, None) => bail!("{path}: needs either source or contents"),
            (Some(_), Some(_)) => bail!("{path}: source and contents are exclusive"),
        };
        Ok(Contents {
            data,
            template: self.template,
            encrypted: self.encrypted,
        })
    }
}

/// Reject absolute paths and `..` so entries stay inside the destination
fn normalize(path: &str) -> Result<String> {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if path.starts_with('/') || parts.is_empty() || parts.contains(&"..") {
        bail!("Invalid entry path: {path:?}");
    }
    Ok(parts.join("/"))
}
