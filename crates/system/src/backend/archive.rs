//! Archive-emitting backend
//!
//! Files, directories, symlinks and scripts become archive entries sharing
//! one header template. The destination always looks empty and persistent
//! state is not kept. Removals, renames and chmods cannot be expressed in
//! an archive and fail with [`Error::UnsupportedOperation`].

use crate::error::{Error, Result};
use crate::info::FileInfo;
use crate::mode::Mode;
use crate::state::PersistentState;
use crate::system::{System, command_output};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Builder, EntryType, Header};

/// Mode given to scripts stored in the archive
const SCRIPT_MODE: Mode = Mode::new(0o700);

/// Owner and timestamps shared by every archive entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTemplate {
    pub uid: u64,
    pub gid: u64,
    pub username: String,
    pub groupname: String,
    /// Seconds since the Unix epoch, used for mtime, atime and ctime
    pub time: u64,
}

impl HeaderTemplate {
    /// Template for the current account at the current time
    ///
    /// Owner fields stay zero when the account cannot be resolved.
    pub fn current() -> Self {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            time,
            ..current_owner()
        }
    }

    fn header(&self, entry_type: EntryType, mode: Mode, size: u64) -> io::Result<Header> {
        let mut header = Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_mode(mode.bits());
        header.set_size(size);
        header.set_uid(self.uid);
        header.set_gid(self.gid);
        header.set_username(&self.username)?;
        header.set_groupname(&self.groupname)?;
        header.set_mtime(self.time);
        if let Some(gnu) = header.as_gnu_mut() {
            gnu.set_atime(self.time);
            gnu.set_ctime(self.time);
        }
        Ok(header)
    }
}

#[cfg(unix)]
fn current_owner() -> HeaderTemplate {
    let uid = uzers::get_current_uid();
    let gid = uzers::get_current_gid();
    let username = uzers::get_user_by_uid(uid)
        .map(|u| u.name().to_string_lossy().into_owned())
        .unwrap_or_default();
    let groupname = uzers::get_group_by_gid(gid)
        .map(|g| g.name().to_string_lossy().into_owned())
        .unwrap_or_default();
    HeaderTemplate {
        uid: u64::from(uid),
        gid: u64::from(gid),
        username,
        groupname,
        time: 0,
    }
}

#[cfg(not(unix))]
fn current_owner() -> HeaderTemplate {
    HeaderTemplate::default()
}

/// Writes a tar stream to `W`
pub struct TarSystem<W: Write> {
    builder: Option<Builder<W>>,
    template: HeaderTemplate,
}

impl<W: Write> TarSystem<W> {
    pub fn new(writer: W, template: HeaderTemplate) -> Self {
        Self {
            builder: Some(Builder::new(writer)),
            template,
        }
    }

    /// Write the archive trailer and return the writer
    ///
    /// Any later write fails with [`Error::ArchiveClosed`].
    pub fn close(&mut self) -> Result<W> {
        let builder = self.builder.take().ok_or(Error::ArchiveClosed)?;
        builder
            .into_inner()
            .map_err(|e| Error::from_io("archive trailer", e))
    }

    fn append(&mut self, path: &Path, entry_type: EntryType, mode: Mode, data: &[u8]) -> Result<()> {
        let builder = self.builder.as_mut().ok_or(Error::ArchiveClosed)?;
        let mut header = self
            .template
            .header(entry_type, mode, data.len() as u64)
            .map_err(|e| Error::from_io(path, e))?;
        builder
            .append_data(&mut header, path, data)
            .map_err(|e| Error::from_io(path, e))
    }

    fn unsupported(operation: &'static str, path: &Path) -> Error {
        Error::UnsupportedOperation {
            operation,
            path: path.to_path_buf(),
        }
    }
}

impl<W: Write + Send + Sync> PersistentState for TarSystem<W> {
    fn get(&self, _bucket: &str, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&mut self, _bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&mut self, _bucket: &str, _key: &[u8]) -> Result<()> {
        Ok(())
    }
}

impl<W: Write + Send + Sync> System for TarSystem<W> {
    fn chmod(&mut self, path: &Path, _mode: Mode) -> Result<()> {
        Err(Self::unsupported("chmod", path))
    }

    fn glob(&self, _pattern: &str) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn idempotent_cmd_output(&self, cmd: &mut Command) -> Result<Vec<u8>> {
        command_output(cmd)
    }

    fn lstat(&self, path: &Path) -> Result<FileInfo> {
        Err(Error::NotFound(path.to_path_buf()))
    }

    fn mkdir(&mut self, path: &Path, mode: Mode) -> Result<()> {
        self.append(path, EntryType::Directory, mode, &[])
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        Err(Error::NotFound(path.to_path_buf()))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        Err(Error::NotFound(path.to_path_buf()))
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        Err(Error::NotFound(path.to_path_buf()))
    }

    fn remove_all(&mut self, path: &Path) -> Result<()> {
        Err(Self::unsupported("remove_all", path))
    }

    fn rename(&mut self, old: &Path, _new: &Path) -> Result<()> {
        Err(Self::unsupported("rename", old))
    }

    fn run_script(&mut self, name: &Path, contents: &[u8]) -> Result<()> {
        self.append(name, EntryType::Regular, SCRIPT_MODE, contents)
    }

    fn stat(&self, path: &Path) -> Result<FileInfo> {
        Err(Error::NotFound(path.to_path_buf()))
    }

    fn write_file(&mut self, path: &Path, data: &[u8], mode: Mode) -> Result<()> {
        self.append(path, EntryType::Regular, mode, data)
    }

    fn write_symlink(&mut self, target: &Path, link: &Path) -> Result<()> {
        let builder = self.builder.as_mut().ok_or(Error::ArchiveClosed)?;
        let mut header = self
            .template
            .header(EntryType::Symlink, Mode::new(0o777), 0)
            .map_err(|e| Error::from_io(link, e))?;
        builder
            .append_link(&mut header, link, target)
            .map_err(|e| Error::from_io(link, e))
    }
}
