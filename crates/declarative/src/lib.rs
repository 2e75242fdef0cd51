//! # Declarative
//!
//! Reconciliation engine: converges a destination toward a desired tree.
//!
//! The engine is the only caller of [`system::System`] mutations. It reads
//! the current state of each path, computes the minimal actions needed and
//! performs them through whichever backend it is handed, so the same pass
//! can write to disk, emit a diff or build an archive.
//!
//! ## Core Concepts
//!
//! - **TargetEntry**: desired state of one destination path
//! - **ApplyPlan**: ordered entries selected by patterns, types and targets
//! - **EntryDiff**: actions converging one path
//! - **Scripts**: `always`, `once` and `onchange` run conditions backed by
//!   persistent state
//!
//! ## Example
//!
//! ```no_run
//! use declarative::{ApplyOptions, ApplyPlan, RunCondition, TargetEntry, apply_simple};
//! use system::{Mode, NullPersistentState, RealSystem};
//!
//! let plan = ApplyPlan::new(vec![
//!     TargetEntry::dir(".config", Mode::new(0o755)),
//!     TargetEntry::file(".config/app.toml", "key = 1\n", Mode::new(0o644)),
//!     TargetEntry::script("install.sh", "echo installed", RunCondition::Once),
//! ]);
//!
//! let mut system = RealSystem::new(NullPersistentState);
//! let summary = apply_simple(&plan, &mut system, &ApplyOptions::new("/home/user"))?;
//! println!("{} changes", summary.total_changes());
//! # Ok::<(), declarative::Error>(())
//! ```
//!
//! ## Collaborator Traits
//!
//! - [`TemplateEngine`]: renders template contents
//! - [`ProgressCallback`]: receives progress updates
//! - [`system::EncryptionTool`]: decrypts encrypted contents

pub mod context;
pub mod diff;
pub mod entry;
pub mod error;
pub mod executor;
pub mod planner;
pub mod scripts;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, NoTemplates, ProgressCallback, TemplateEngine};
pub use diff::{Desired, EntryDiff, POSIX_FILE_MODES, compute_diff};
pub use entry::{Contents, EntryKind, TargetEntry};
pub use error::{Error, Result};
pub use executor::{apply, apply_simple};
pub use planner::ApplyPlan;
pub use scripts::{SCRIPT_BUCKET, SCRIPT_ON_CHANGE_BUCKET, ScriptRecord};
pub use types::{
    Action, ApplyOptions, ApplyResult, ApplySummary, EntryFailure, EntryType, EntryTypeSet,
    RunCondition,
};
