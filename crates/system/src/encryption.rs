//! Encryption tool contract
//!
//! Concrete tools are external programs; only the interface matters to the
//! engine. Decrypted plaintext written to disk is held by a [`TempPath`]
//! guard which removes the file when dropped, on every exit path.

use crate::error::{Error, Result};
use crate::system::describe_command;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempPath;

/// Encrypts and decrypts data
pub trait EncryptionTool: Send + Sync {
    /// Decrypt `ciphertext`; `filename_hint` names the target for messages
    fn decrypt(&self, filename_hint: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Encrypt the contents of a file
    fn encrypt_file(&self, path: &Path) -> Result<Vec<u8>> {
        let plaintext = std::fs::read(path).map_err(|e| Error::from_io(path, e))?;
        self.encrypt(&plaintext)
    }

    /// Decrypt into a private temporary file
    ///
    /// The file is deleted when the returned guard is dropped.
    fn decrypt_to_file(&self, filename_hint: &str, ciphertext: &[u8]) -> Result<TempPath> {
        let plaintext = self.decrypt(filename_hint, ciphertext)?;
        let mut file = tempfile::Builder::new()
            .prefix("stencil-decrypted-")
            .tempfile()
            .map_err(|e| Error::Encryption(format!("{filename_hint}: {e}")))?;
        file.write_all(&plaintext)
            .map_err(|e| Error::from_io(file.path(), e))?;
        Ok(file.into_temp_path())
    }
}

/// Pipes data through an external program such as `gpg` or `age`
#[derive(Debug, Clone)]
pub struct CommandEncryptionTool {
    pub command: String,
    pub encrypt_args: Vec<String>,
    pub decrypt_args: Vec<String>,
}

impl CommandEncryptionTool {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            encrypt_args: Vec::new(),
            decrypt_args: Vec::new(),
        }
    }

    fn pipe(&self, args: &[String], input: &[u8]) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let command = describe_command(&cmd);

        let failed = |message: String| Error::CommandFailed {
            command: command.clone(),
            message,
        };

        let mut child = cmd.spawn().map_err(|e| failed(e.to_string()))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failed("stdin not captured".to_string()))?;

        // Feed stdin on another thread so a full stdout pipe cannot deadlock us.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
            written.and(output)
        })
        .map_err(|e| failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("{}: {}", output.status, stderr.trim())));
        }
        Ok(output.stdout)
    }
}

impl EncryptionTool for CommandEncryptionTool {
    fn decrypt(&self, filename_hint: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        log::debug!("Decrypting {filename_hint} with {}", self.command);
        self.pipe(&self.decrypt_args, ciphertext)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.pipe(&self.encrypt_args, plaintext)
    }
}
