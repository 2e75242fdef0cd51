//! User configuration (`~/.config/stencil/stencil.toml`)

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use system::{CommandEncryptionTool, Mode};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("stencil"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    source_dir: Option<String>,
    dest_dir: Option<String>,
    state_path: Option<String>,
    umask: Option<String>,
    data: BTreeMap<String, toml::Value>,
    secret: SecretConfig,
    encryption: Option<EncryptionConfig>,
}

/// Generic secret command used by the `secret` template function
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionConfig {
    pub command: String,
    #[serde(default)]
    pub encrypt_args: Vec<String>,
    #[serde(default)]
    pub decrypt_args: Vec<String>,
}

impl EncryptionConfig {
    pub fn tool(&self) -> CommandEncryptionTool {
        CommandEncryptionTool {
            command: self.command.clone(),
            encrypt_args: self.encrypt_args.clone(),
            decrypt_args: self.decrypt_args.clone(),
        }
    }
}

/// Resolved configuration with every path expanded
#[derive(Debug, Clone)]
pub struct Config {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub state_path: PathBuf,
    pub umask: Mode,
    pub data: BTreeMap<String, toml::Value>,
    pub secret: SecretConfig,
    pub encryption: Option<EncryptionConfig>,
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_dir()?.join("stencil.toml"),
        };

        let raw = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            Self::parse_raw(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            RawConfig::default()
        };
        Self::resolve(raw)
    }

    /// Parse config from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        Self::resolve(Self::parse_raw(content)?)
    }

    fn parse_raw(content: &str) -> Result<RawConfig> {
        Ok(toml::from_str(content)?)
    }

    fn resolve(raw: RawConfig) -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        let source_dir = match raw.source_dir {
            Some(dir) => expand(&dir),
            None => home.join(".local").join("share").join("stencil"),
        };
        let dest_dir = match raw.dest_dir {
            Some(dir) => expand(&dir),
            None => home.clone(),
        };
        let state_path = match raw.state_path {
            Some(path) => expand(&path),
            None => home
                .join(".local")
                .join("state")
                .join("stencil")
                .join("state.db"),
        };
        let umask = match raw.umask {
            Some(umask) => match Mode::parse_octal(&umask) {
                Some(mode) => mode,
                None => bail!("Invalid umask: {umask}"),
            },
            None => Mode::DEFAULT_UMASK,
        };

        Ok(Self {
            source_dir,
            dest_dir,
            state_path,
            umask,
            data: raw.data,
            secret: raw.secret,
            encryption: raw.encryption,
        })
    }

    /// Apply `--source` / `--destination` overrides
    pub fn with_overrides(mut self, source: Option<&Path>, destination: Option<&Path>) -> Self {
        if let Some(source) = source {
            self.source_dir = expand(&source.to_string_lossy());
        }
        if let Some(destination) = destination {
            self.dest_dir = expand(&destination.to_string_lossy());
        }
        self
    }
}

/// Expand `~` and environment variables in a configured path
fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            log::warn!("Could not expand {path}: {e}");
            PathBuf::from(shellexpand::tilde(path).as_ref())
        }
    }
}
