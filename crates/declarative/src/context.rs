//! Apply context and collaborator traits
//!
//! These traits keep the engine independent of any particular template
//! language, encryption tool or user interface.

use crate::error::{Error, Result};
use crate::types::{Action, ApplyResult};
use system::EncryptionTool;

/// Renders template contents into bytes
pub trait TemplateEngine {
    /// Render `data`, identified by `name` in error messages
    fn execute_template_data(&mut self, name: &str, data: &[u8]) -> Result<Vec<u8>>;
}

/// Template engine that rejects every template
pub struct NoTemplates;

impl TemplateEngine for NoTemplates {
    fn execute_template_data(&mut self, name: &str, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Template {
            name: name.to_string(),
            message: "no template engine configured".to_string(),
        })
    }
}

/// Progress callback for reconciliation passes
///
/// Implement this trait to receive progress updates during a pass.
pub trait ProgressCallback {
    /// Called when starting to converge a single entry
    fn on_entry_start(&mut self, path: &str);

    /// Called for every action computed for an entry, including in dry runs
    fn on_action(&mut self, path: &str, action: &Action);

    /// Called when an entry completes
    fn on_entry_complete(&mut self, path: &str, result: &ApplyResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_entry_start(&mut self, _path: &str) {}
    fn on_action(&mut self, _path: &str, _action: &Action) {}
    fn on_entry_complete(&mut self, _path: &str, _result: &ApplyResult) {}
}

/// Collaborators passed to a reconciliation pass
pub struct ApplyContext<'a> {
    pub templates: &'a mut dyn TemplateEngine,
    pub encryption: Option<&'a dyn EncryptionTool>,
    pub progress: &'a mut dyn ProgressCallback,
}

impl<'a> ApplyContext<'a> {
    pub fn new(
        templates: &'a mut dyn TemplateEngine,
        progress: &'a mut dyn ProgressCallback,
    ) -> Self {
        Self {
            templates,
            encryption: None,
            progress,
        }
    }

    /// Attach an encryption tool for `encrypted` contents
    #[must_use]
    pub fn with_encryption(mut self, tool: &'a dyn EncryptionTool) -> Self {
        self.encryption = Some(tool);
        self
    }
}
