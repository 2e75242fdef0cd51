//! Backend that mutates the actual filesystem and runs real processes

use crate::error::{Error, Result};
use crate::info::FileInfo;
use crate::mode::Mode;
use crate::state::PersistentState;
use crate::system::{System, command_output};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// The real filesystem, with persistent state delegated to `P`
pub struct RealSystem<P> {
    state: P,
    script_dir: Option<PathBuf>,
}

impl<P: PersistentState> RealSystem<P> {
    pub fn new(state: P) -> Self {
        Self {
            state,
            script_dir: None,
        }
    }

    /// Run scripts with this working directory
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> &P {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut P {
        &mut self.state
    }

    pub fn into_state(self) -> P {
        self.state
    }
}

impl<P: PersistentState> PersistentState for RealSystem<P> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.state.get(bucket, key)
    }

    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.state.set(bucket, key, value)
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<()> {
        self.state.delete(bucket, key)
    }
}

impl<P: PersistentState> System for RealSystem<P> {
    fn chmod(&mut self, path: &Path, mode: Mode) -> Result<()> {
        set_mode(path, mode)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let paths = glob::glob(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;

        let mut matches = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => matches.push(path),
                Err(e) => {
                    let path = e.path().to_path_buf();
                    return Err(Error::from_io(path, e.into_error()));
                }
            }
        }
        Ok(matches)
    }

    fn idempotent_cmd_output(&self, cmd: &mut Command) -> Result<Vec<u8>> {
        command_output(cmd)
    }

    fn lstat(&self, path: &Path) -> Result<FileInfo> {
        let meta = fs::symlink_metadata(path).map_err(|e| Error::from_io(path, e))?;
        Ok(FileInfo::from_metadata(file_name(path), &meta))
    }

    fn mkdir(&mut self, path: &Path, mode: Mode) -> Result<()> {
        fs::create_dir(path).map_err(|e| Error::from_io(path, e))?;
        // create_dir honours the process umask; force the requested bits
        set_mode(path, mode)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        let mut infos = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| Error::from_io(path, e))? {
            let entry = entry.map_err(|e| Error::from_io(path, e))?;
            let meta = entry
                .metadata()
                .map_err(|e| Error::from_io(entry.path(), e))?;
            infos.push(FileInfo::from_metadata(
                entry.file_name().to_string_lossy().into_owned(),
                &meta,
            ));
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::from_io(path, e))
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).map_err(|e| Error::from_io(path, e))
    }

    fn remove_all(&mut self, path: &Path) -> Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::from_io(path, e)),
        };

        let removed = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        removed.map_err(|e| Error::from_io(path, e))
    }

    fn rename(&mut self, old: &Path, new: &Path) -> Result<()> {
        fs::rename(old, new).map_err(|e| Error::from_io(old, e))
    }

    fn run_script(&mut self, name: &Path, contents: &[u8]) -> Result<()> {
        let failed = |message: String| Error::CommandFailed {
            command: name.display().to_string(),
            message,
        };

        let mut file = tempfile::Builder::new()
            .prefix("stencil-script-")
            .tempfile()
            .map_err(|e| failed(e.to_string()))?;
        file.write_all(contents)
            .map_err(|e| Error::from_io(file.path(), e))?;
        // Close the handle before exec to avoid ETXTBSY
        let script = file.into_temp_path();
        set_mode(&script, Mode::new(0o700))?;

        let mut cmd = if cfg!(unix) && !contents.starts_with(b"#!") {
            let mut sh = Command::new("sh");
            sh.arg(&*script);
            sh
        } else {
            Command::new(&*script)
        };
        if let Some(dir) = &self.script_dir {
            cmd.current_dir(dir);
        }

        log::info!("Running script {}", name.display());
        let status = cmd
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| failed(e.to_string()))?;

        if !status.success() {
            return Err(failed(status.to_string()));
        }
        Ok(())
    }

    fn stat(&self, path: &Path) -> Result<FileInfo> {
        let meta = fs::metadata(path).map_err(|e| Error::from_io(path, e))?;
        Ok(FileInfo::from_metadata(file_name(path), &meta))
    }

    fn write_file(&mut self, path: &Path, data: &[u8], mode: Mode) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // Write beside the target and rename over it so readers never see
        // a partial file
        let mut file = tempfile::Builder::new()
            .prefix(".stencil-")
            .tempfile_in(dir)
            .map_err(|e| Error::from_io(dir, e))?;
        file.write_all(data)
            .map_err(|e| Error::from_io(file.path(), e))?;
        set_mode(file.path(), mode)?;
        file.persist(path)
            .map_err(|e| Error::from_io(path, e.error))?;
        Ok(())
    }

    #[cfg(unix)]
    fn write_symlink(&mut self, target: &Path, link: &Path) -> Result<()> {
        if fs::symlink_metadata(link).is_ok() {
            fs::remove_file(link).map_err(|e| Error::from_io(link, e))?;
        }
        std::os::unix::fs::symlink(target, link).map_err(|e| Error::from_io(link, e))
    }

    #[cfg(not(unix))]
    fn write_symlink(&mut self, _target: &Path, link: &Path) -> Result<()> {
        Err(Error::UnsupportedOperation {
            operation: "write_symlink",
            path: link.to_path_buf(),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Mode) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
        .map_err(|e| Error::from_io(path, e))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: Mode) -> Result<()> {
    let mut perms = fs::metadata(path)
        .map_err(|e| Error::from_io(path, e))?
        .permissions();
    perms.set_readonly(mode.bits() & 0o200 == 0);
    fs::set_permissions(path, perms).map_err(|e| Error::from_io(path, e))
}
