//! Backend with no destination at all
//!
//! Mutations succeed without effect and every read reports not found.
//! Commands still execute, since templates need read-only probes such as
//! version queries.

use crate::error::{Error, Result};
use crate::info::FileInfo;
use crate::mode::Mode;
use crate::state::PersistentState;
use crate::system::{System, command_output};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSystem;

impl NullSystem {
    pub fn new() -> Self {
        Self
    }
}

impl PersistentState for NullSystem {
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

impl System for NullSystem {
    fn chmod(&mut self, _path: &Path, _mode: Mode) -> Result<()> {
        Ok(())
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

    fn mkdir(&mut self, _path: &Path, _mode: Mode) -> Result<()> {
        Ok(())
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

    fn remove_all(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn rename(&mut self, _old: &Path, _new: &Path) -> Result<()> {
        Ok(())
    }

    fn run_script(&mut self, _name: &Path, _contents: &[u8]) -> Result<()> {
        Ok(())
    }

    fn stat(&self, path: &Path) -> Result<FileInfo> {
        Err(Error::NotFound(path.to_path_buf()))
    }

    fn write_file(&mut self, _path: &Path, _data: &[u8], _mode: Mode) -> Result<()> {
        Ok(())
    }

    fn write_symlink(&mut self, _target: &Path, _link: &Path) -> Result<()> {
        Ok(())
    }
}
