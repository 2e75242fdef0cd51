//! Implementations of [`System`](crate::System)
//!
//! - [`RealSystem`]: the actual filesystem and process table
//! - [`NullSystem`]: no destination at all
//! - [`DebugSystem`]: wraps any system and logs timed traces
//! - [`GitDiffSystem`]: wraps a system and records a unified diff instead of mutating
//! - [`TarSystem`]: emits a tar stream

pub mod archive;
pub mod debug;
pub mod gitdiff;
pub mod null;
pub mod real;

pub use archive::{HeaderTemplate, TarSystem};
pub use debug::DebugSystem;
pub use gitdiff::GitDiffSystem;
pub use null::NullSystem;
pub use real::RealSystem;
