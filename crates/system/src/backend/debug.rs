//! Tracing decorator
//!
//! Every call runs on a scoped thread while the caller waits for it with a
//! timeout. A call that finishes in time logs one line with its duration.
//! A slower call logs the call immediately when the timeout fires, then
//! logs again on completion. The timeout never cancels the call, and results
//! are forwarded unchanged.

use crate::error::Result;
use crate::info::FileInfo;
use crate::mode::Mode;
use crate::state::PersistentState;
use crate::system::{System, describe_command};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Log target for trace lines
pub const TRACE_TARGET: &str = "stencil::debug";

/// How long a call may run before a progress line is logged
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Wraps a [`System`] and logs every call it forwards
pub struct DebugSystem<S> {
    inner: S,
    timeout: Duration,
}

impl<S: System> DebugSystem<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Run `f` on a scoped thread, logging `call` around it
pub fn trace<T, F>(timeout: Duration, call: &str, f: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> Result<T> + Send,
{
    let start = Instant::now();
    let result = thread::scope(|scope| {
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let handle = scope.spawn(move || {
            let result = f();
            // Only wakes the timed wait early; `done_rx` outlives the join
            let _ = done_tx.send(());
            result
        });

        if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
            log::debug!(target: TRACE_TARGET, "{call}");
        }

        handle
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
    });

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => log::debug!(target: TRACE_TARGET, "{call} ({elapsed:?})"),
        Err(e) => log::debug!(target: TRACE_TARGET, "{call} == {e} ({elapsed:?})"),
    }
    result
}

impl<S: System> PersistentState for DebugSystem<S> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let call = format!("Get({bucket:?}, {:?})", String::from_utf8_lossy(key));
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.get(bucket, key))
    }

    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let call = format!(
            "Set({bucket:?}, {:?}, {:?})",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        );
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.set(bucket, key, value))
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<()> {
        let call = format!("Delete({bucket:?}, {:?})", String::from_utf8_lossy(key));
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.delete(bucket, key))
    }
}

impl<S: System> System for DebugSystem<S> {
    fn chmod(&mut self, path: &Path, mode: Mode) -> Result<()> {
        let call = format!("Chmod({path:?}, 0o{mode})");
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.chmod(path, mode))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let call = format!("Glob({pattern:?})");
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.glob(pattern))
    }

    fn idempotent_cmd_output(&self, cmd: &mut Command) -> Result<Vec<u8>> {
        let call = format!("IdempotentCmdOutput({:?})", describe_command(cmd));
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.idempotent_cmd_output(cmd))
    }

    fn lstat(&self, path: &Path) -> Result<FileInfo> {
        let call = format!("Lstat({path:?})");
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.lstat(path))
    }

    fn mkdir(&mut self, path: &Path, mode: Mode) -> Result<()> {
        let call = format!("Mkdir({path:?}, 0o{mode})");
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.mkdir(path, mode))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<FileInfo>> {
        let call = format!("ReadDir({path:?})");
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.read_dir(path))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let call = format!("ReadFile({path:?})");
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.read_file(path))
    }

    fn readlink(&self, path: &Path) -> Result<PathBuf> {
        let call = format!("Readlink({path:?})");
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.readlink(path))
    }

    fn remove_all(&mut self, path: &Path) -> Result<()> {
        let call = format!("RemoveAll({path:?})");
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.remove_all(path))
    }

    fn rename(&mut self, old: &Path, new: &Path) -> Result<()> {
        let call = format!("Rename({old:?}, {new:?})");
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.rename(old, new))
    }

    fn run_script(&mut self, name: &Path, contents: &[u8]) -> Result<()> {
        let call = format!("RunScript({name:?}, _)");
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.run_script(name, contents))
    }

    fn stat(&self, path: &Path) -> Result<FileInfo> {
        let call = format!("Stat({path:?})");
        let inner = &self.inner;
        trace(self.timeout, &call, || inner.stat(path))
    }

    fn write_file(&mut self, path: &Path, data: &[u8], mode: Mode) -> Result<()> {
        let call = format!("WriteFile({path:?}, _, 0o{mode})");
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.write_file(path, data, mode))
    }

    fn write_symlink(&mut self, target: &Path, link: &Path) -> Result<()> {
        let call = format!("WriteSymlink({target:?}, {link:?})");
        let inner = &mut self.inner;
        trace(self.timeout, &call, || inner.write_symlink(target, link))
    }
}
