//! Diff-producing decorator
//!
//! Reads go straight to the wrapped system. Mutations are not performed;
//! instead each one appends a git-style unified diff of the would-be change,
//! using the wrapped system's current state as the "before" side.
//! Paths removed earlier in the run count as absent. A removal followed by a
//! write to the same path is emitted as one type change.
//! Persistent state reads pass through but writes are dropped, so a diff run
//! never marks a script as already run.

use crate::error::{Error, Result};
use crate::info::FileInfo;
use crate::mode::{FileKind, Mode};
use crate::state::PersistentState;
use crate::system::System;
use similar::TextDiff;
use std::path::{Path, PathBuf};
use std::process::Command;

const CONTEXT_LINES: usize = 3;

/// Wraps a [`System`] and records mutations as a unified diff
pub struct GitDiffSystem<S> {
    inner: S,
    prefix: PathBuf,
    output: String,
    removed: Vec<PathBuf>,
    pending: Option<(PathBuf, Snapshot)>,
}

/// One side of a diff
#[derive(Debug, Clone)]
struct Snapshot {
    kind: FileKind,
    mode: Mode,
    contents: Vec<u8>,
}

impl Snapshot {
    fn git_mode(&self) -> u32 {
        match self.kind {
            FileKind::Symlink => FileKind::Symlink.git_prefix(),
            kind => kind.git_prefix() | self.mode.bits(),
        }
    }
}

impl<S: System> GitDiffSystem<S> {
    /// Paths in the diff are shown relative to `prefix`
    pub fn new(inner: S, prefix: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            output: String::new(),
            removed: Vec::new(),
            pending: None,
        }
    }

    /// Diff emitted so far, without a removal still held for a possible type change
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Finish and return the accumulated diff
    pub fn finish(mut self) -> String {
        self.flush_pending();
        self.output
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.prefix).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn snapshot(&self, path: &Path) -> Result<Option<Snapshot>> {
        if self.removed.iter().any(|removed| path.starts_with(removed)) {
            return Ok(None);
        }
        let info = match self.inner.lstat(path) {
            Ok(info) => info,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let contents = match info.kind {
            FileKind::File => self.inner.read_file(path)?,
            FileKind::Symlink => self
                .inner
                .readlink(path)?
                .to_string_lossy()
                .into_owned()
                .into_bytes(),
            _ => Vec::new(),
        };

        Ok(Some(Snapshot {
            kind: info.kind,
            mode: info.mode,
            contents,
        }))
    }

    fn encode(&mut self, path: &Path, old: Option<&Snapshot>, new: Option<&Snapshot>) {
        let name = self.relative(path);
        let same = match (old, new) {
            (Some(o), Some(n)) => o.git_mode() == n.git_mode() && o.contents == n.contents,
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }

        let mut out = format!("diff --git a/{name} b/{name}\n");
        match (old, new) {
            (None, Some(n)) => out.push_str(&format!("new file mode {:06o}\n", n.git_mode())),
            (Some(o), None) => out.push_str(&format!("deleted file mode {:06o}\n", o.git_mode())),
            (Some(o), Some(n)) if o.git_mode() != n.git_mode() => {
                out.push_str(&format!("old mode {:06o}\n", o.git_mode()));
                out.push_str(&format!("new mode {:06o}\n", n.git_mode()));
            }
            _ => {}
        }

        let empty = Vec::new();
        let old_contents = old.map_or(&empty, |s| &s.contents);
        let new_contents = new.map_or(&empty, |s| &s.contents);
        let from = old.map_or("/dev/null".to_string(), |_| format!("a/{name}"));
        let to = new.map_or("/dev/null".to_string(), |_| format!("b/{name}"));

        if old_contents != new_contents {
            if is_binary(old_contents) || is_binary(new_contents) {
                out.push_str(&format!("Binary files {from} and {to} differ\n"));
            } else {
                let old_text = String::from_utf8_lossy(old_contents);
                let new_text = String::from_utf8_lossy(new_contents);
                let diff = TextDiff::from_lines(old_text.as_ref(), new_text.as_ref());
                out.push_str(
                    &diff
                        .unified_diff()
                        .context_radius(CONTEXT_LINES)
                        .header(&from, &to)
                        .to_string(),
                );
            }
        }

        self.output.push_str(&out);
    }

    fn encode_dir_removal(&mut self, path: &Path) -> Result<()> {
        for child in self.inner.read_dir(path)? {
            let child = path.join(&child.name);
            match self.snapshot(&child)? {
                Some(old) if old.kind == FileKind::Dir => self.encode_dir_removal(&child)?,
                Some(old) => self.encode(&child, Some(&old), None),
                None => {}
            }
        }
        Ok(())
    }

    fn flush_pending(&mut self) {
        if let Some((path, old)) = self.pending.take() {
            self.encode(&path, Some(&old), None);
        }
    }

    /// "Before" side for a write to `path`
    fn before(&mut self, path: &Path) -> Result<Option<Snapshot>> {
        if let Some((pending, _)) = &self.pending
            && pending == path
        {
            return Ok(self.pending.take().map(|(_, old)| old));
        }
        self.flush_pending();
        self.snapshot(path)
    }
}

fn is_binary(data: &[u8]) -> bool {
    data.contains(&0)
}

impl<S: System> PersistentState for GitDiffSystem<S> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&mut self, bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        log::debug!("Not recording {bucket} state while diffing");
        Ok(())
    }

    fn delete(&mut self, bucket: &str, _key: &[u8]) -> Result<()> {
        log::debug!("Not deleting {bucket} state while diffing");
        Ok(())
    }
}

impl<S: System> System for GitDiffSystem<S> {
    fn chmod(&mut self, path: &Path, mode: Mode) -> Result<()> {
        self.flush_pending();
        let old = self
            .snapshot(path)?
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
        let new = Snapshot {
            mode,
            ..old.clone()
        };
        self.encode(path, Some(&old), Some(&new));
        Ok(())
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        self.inner.glob(pattern)
    }

    fn idempotent_cmd_output(&self, cmd: &mut Command) -> Result<Vec<u8>> {
        self.inner.idempotent_cmd_output(cmd)
    }

    fn lstat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.lstat(path)
    }

    fn mkdir(&mut self, path: &Path, mode: Mode) -> Result<()> {
        let old = self.before(path)?;
        let new = Snapshot {
            kind: FileKind::Dir,
            mode,
            contents: Vec::new(),
        };
        self.encode(path, old.as_ref(), Some(&new));
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        self.inner.read_dir(path)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        self.inner.readlink(path)
    }

    fn remove_all(&mut self, path: &Path) -> Result<()> {
        self.flush_pending();
        let Some(old) = self.snapshot(path)? else {
            return Ok(());
        };

        if old.kind == FileKind::Dir {
            self.encode_dir_removal(path)?;
        } else {
            self.pending = Some((path.to_path_buf(), old));
        }
        self.removed.push(path.to_path_buf());
        Ok(())
    }

    fn rename(&mut self, old: &Path, new: &Path) -> Result<()> {
        self.flush_pending();
        let (from, to) = (self.relative(old), self.relative(new));
        self.output.push_str(&format!(
            "diff --git a/{from} b/{to}\nrename from {from}\nrename to {to}\n"
        ));
        Ok(())
    }

    fn run_script(&mut self, name: &Path, contents: &[u8]) -> Result<()> {
        self.flush_pending();
        let new = Snapshot {
            kind: FileKind::File,
            mode: Mode::new(0o755),
            contents: contents.to_vec(),
        };
        self.encode(name, None, Some(&new));
        Ok(())
    }

    fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path)
    }

    fn write_file(&mut self, path: &Path, data: &[u8], mode: Mode) -> Result<()> {
        let old = self.before(path)?;
        let new = Snapshot {
            kind: FileKind::File,
            mode,
            contents: data.to_vec(),
        };
        self.encode(path, old.as_ref(), Some(&new));
        Ok(())
    }

    fn write_symlink(&mut self, target: &Path, link: &Path) -> Result<()> {
        let old = self.before(link)?;
        let new = Snapshot {
            kind: FileKind::Symlink,
            mode: Mode::new(0o777),
            contents: target.to_string_lossy().into_owned().into_bytes(),
        };
        self.encode(link, old.as_ref(), Some(&new));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{NullSystem, RealSystem};
    use crate::state::MemoryPersistentState;
    use tempfile::TempDir;

    fn real_with_file(tmp: &TempDir, name: &str, contents: &[u8]) -> RealSystem<MemoryPersistentState> {
        let mut real = RealSystem::new(MemoryPersistentState::new());
        real.write_file(&tmp.path().join(name), contents, Mode::new(0o644))
            .unwrap();
        real
    }

    #[test]
    fn test_modified_file() {
        let tmp = TempDir::new().unwrap();
        let real = real_with_file(&tmp, "a", b"old\n");
        let mut s = GitDiffSystem::new(real, tmp.path());

        s.write_file(&tmp.path().join("a"), b"new\n", Mode::new(0o644))
            .unwrap();
        let diff = s.finish();

        assert!(diff.starts_with("diff --git a/a b/a\n"));
        assert!(diff.contains("--- a/a\n+++ b/a\n"));
        assert!(diff.contains("-old\n"));
        assert!(diff.contains("+new\n"));
        assert!(!diff.contains("old mode"));
        // Nothing was written
        assert_eq!(std::fs::read(tmp.path().join("a")).unwrap(), b"old\n");
    }

    #[test]
    fn test_new_and_deleted_files() {
        let tmp = TempDir::new().unwrap();
        let real = real_with_file(&tmp, "gone", b"bye\n");
        let mut s = GitDiffSystem::new(real, tmp.path());

        s.write_file(&tmp.path().join("fresh"), b"hi\n", Mode::new(0o600))
            .unwrap();
        s.remove_all(&tmp.path().join("gone")).unwrap();
        s.remove_all(&tmp.path().join("never-existed")).unwrap();
        let diff = s.finish();

        assert!(diff.contains("diff --git a/fresh b/fresh\nnew file mode 100600\n"));
        assert!(diff.contains("--- /dev/null\n+++ b/fresh\n"));
        assert!(diff.contains("+hi\n"));
        assert!(diff.contains("deleted file mode 100644\n"));
        assert!(diff.contains("--- a/gone\n+++ /dev/null\n"));
        assert!(diff.contains("-bye\n"));
        assert!(!diff.contains("never-existed"));
        assert!(tmp.path().join("gone").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_change_and_unchanged_write() {
        let tmp = TempDir::new().unwrap();
        let real = real_with_file(&tmp, "run", b"#!/bin/sh\n");
        let mut s = GitDiffSystem::new(real, tmp.path());
        let path = tmp.path().join("run");

        s.write_file(&path, b"#!/bin/sh\n", Mode::new(0o644)).unwrap();
        assert_eq!(s.output(), "");

        s.chmod(&path, Mode::new(0o755)).unwrap();
        assert_eq!(
            s.output(),
            "diff --git a/run b/run\nold mode 100644\nnew mode 100755\n"
        );
    }

    #[test]
    fn test_directory_removal_lists_files() {
        let tmp = TempDir::new().unwrap();
        let mut real = RealSystem::new(MemoryPersistentState::new());
        let dir = tmp.path().join("dir");
        real.mkdir(&dir, Mode::new(0o755)).unwrap();
        real.write_file(&dir.join("x"), b"1\n", Mode::new(0o644))
            .unwrap();
        real.write_file(&dir.join("y"), b"2\n", Mode::new(0o644))
            .unwrap();

        let mut s = GitDiffSystem::new(real, tmp.path());
        s.remove_all(&dir).unwrap();
        let diff = s.finish();
        assert!(diff.contains("diff --git a/dir/x b/dir/x\ndeleted file mode"));
        assert!(diff.contains("diff --git a/dir/y b/dir/y\ndeleted file mode"));
    }

    #[test]
    fn test_symlink_mkdir_rename_and_script() {
        let mut s = GitDiffSystem::new(NullSystem::new(), "/home/u");

        s.write_symlink(Path::new(".config/vim"), Path::new("/home/u/.vimrc"))
            .unwrap();
        s.mkdir(Path::new("/home/u/.config"), Mode::new(0o755)).unwrap();
        s.rename(Path::new("/home/u/a"), Path::new("/home/u/b")).unwrap();
        s.run_script(Path::new("/home/u/install.sh"), b"echo hi\n")
            .unwrap();
        let diff = s.finish();

        assert!(diff.contains("diff --git a/.vimrc b/.vimrc\nnew file mode 120000\n"));
        assert!(diff.contains("+.config/vim"));
        assert!(diff.contains("No newline at end of file"));
        assert!(diff.contains("diff --git a/.config b/.config\nnew file mode 040755\n"));
        assert!(diff.contains("rename from a\nrename to b\n"));
        assert!(diff.contains("+++ b/install.sh\n"));
        assert!(diff.contains("+echo hi\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_replaced_by_file_is_one_type_change() {
        let tmp = TempDir::new().unwrap();
        let mut real = RealSystem::new(MemoryPersistentState::new());
        let link = tmp.path().join("x");
        real.write_symlink(Path::new("old-target"), &link).unwrap();

        let mut s = GitDiffSystem::new(real, tmp.path());
        s.remove_all(&link).unwrap();
        s.write_file(&link, b"new\n", Mode::new(0o644)).unwrap();
        let diff = s.finish();

        assert_eq!(diff.matches("diff --git a/x b/x").count(), 1);
        assert!(diff.contains("old mode 120000\nnew mode 100644\n"));
        assert!(diff.contains("-old-target"));
        assert!(diff.contains("+new\n"));
        assert!(!diff.contains("deleted file mode"));
    }

    #[test]
    fn test_write_after_dir_removal_is_new_file() {
        let tmp = TempDir::new().unwrap();
        let mut real = RealSystem::new(MemoryPersistentState::new());
        let dir = tmp.path().join("conf");
        real.mkdir(&dir, Mode::new(0o755)).unwrap();
        real.write_file(&dir.join("inner"), b"1\n", Mode::new(0o644))
            .unwrap();

        let mut s = GitDiffSystem::new(real, tmp.path());
        s.remove_all(&dir).unwrap();
        s.write_file(&dir, b"flat\n", Mode::new(0o644)).unwrap();
        let diff = s.finish();

        assert!(diff.contains("diff --git a/conf/inner b/conf/inner\ndeleted file mode"));
        assert!(diff.contains("diff --git a/conf b/conf\nnew file mode 100644\n"));
        assert_eq!(diff.matches("diff --git a/conf b/conf").count(), 1);
    }

    #[test]
    fn test_binary_contents() {
        let mut s = GitDiffSystem::new(NullSystem::new(), "/");
        s.write_file(Path::new("/bin.dat"), b"\0\x01", Mode::new(0o644))
            .unwrap();
        assert!(s.output().contains("Binary files /dev/null and b/bin.dat differ\n"));
    }

    #[test]
    fn test_state_writes_are_dropped() {
        let mut real = RealSystem::new(MemoryPersistentState::new());
        real.set("script", b"seen", b"1").unwrap();
        let mut s = GitDiffSystem::new(real, "/");

        assert_eq!(s.get("script", b"seen").unwrap(), Some(b"1".to_vec()));
        s.set("script", b"new", b"1").unwrap();
        s.delete("script", b"seen").unwrap();
        assert_eq!(s.get("script", b"new").unwrap(), None);
        assert_eq!(s.get("script", b"seen").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_chmod_missing_is_forwarded() {
        let mut s = GitDiffSystem::new(NullSystem::new(), "/");
        let err = s.chmod(Path::new("/missing"), Mode::new(0o644)).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(s.output(), "");
    }
}
