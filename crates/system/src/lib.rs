//! # System
//!
//! Destination backends for materializing a file tree.
//!
//! One reconciliation algorithm drives any [`System`]: the real filesystem,
//! a no-op destination, a unified diff, or a tar archive. Decorators add
//! timed tracing around any other backend.
//!
//! ## Core Concepts
//!
//! - **System**: filesystem, process and persistent-state capabilities
//! - **PersistentState**: durable bucket/key/value store used for
//!   run-once bookkeeping
//! - **PatternSet**: include/exclude glob filter
//! - **EncryptionTool**: encrypt/decrypt collaborator
//!
//! ## Example
//!
//! ```no_run
//! use system::{GitDiffSystem, Mode, RealSystem, SqliteState, System};
//! use std::path::Path;
//!
//! let state = SqliteState::open(Path::new("/tmp/state.db"))?;
//! let mut diff = GitDiffSystem::new(RealSystem::new(state), "/home/user");
//! diff.write_file(Path::new("/home/user/.bashrc"), b"set -o vi\n", Mode::new(0o644))?;
//! print!("{}", diff.finish());
//! # Ok::<(), system::Error>(())
//! ```

pub mod backend;
pub mod cache;
pub mod encryption;
pub mod error;
pub mod info;
pub mod mode;
pub mod patternset;
pub mod state;
pub mod system;

pub use backend::{
    DebugSystem, GitDiffSystem, HeaderTemplate, NullSystem, RealSystem, TarSystem,
};
pub use cache::CommandCache;
pub use encryption::{CommandEncryptionTool, EncryptionTool};
pub use error::{Error, Result};
pub use info::FileInfo;
pub use mode::{FileKind, Mode};
pub use patternset::PatternSet;
pub use state::{
    MemoryPersistentState, NullPersistentState, PersistentState, SqliteState, StateRecord,
};
pub use system::{System, describe_command, shell_quote_args};
