//! Minimal template renderer
//!
//! Supported actions:
//!
//! - `{{ .key }}` inserts a value from the `[data]` table
//! - `{{ secret "arg" ... }}` inserts the trimmed output of the configured
//!   secret command, run once per distinct argument list
//!
//! A `-` next to the braces (`{{-` / `-}}`) trims adjacent whitespace.

use declarative::TemplateEngine;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use system::{CommandCache, NullSystem, System, shell_quote_args};
use thiserror::Error;

static ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(-?)\s*(.*?)\s*(-?)\}\}").unwrap());

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap());

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is not valid UTF-8")]
    NotUtf8,

    #[error("map has no entry for key {0:?}")]
    MissingKey(String),

    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("secret: no secret command configured")]
    NoSecretCommand,

    #[error("secret: {command} {args}: {source}")]
    Secret {
        command: String,
        args: String,
        #[source]
        source: system::Error,
    },
}

/// Renders templates against config data, running secret lookups through `S`
pub struct TemplateRenderer<S = NullSystem> {
    data: BTreeMap<String, toml::Value>,
    secret_command: Option<String>,
    system: S,
    secrets: CommandCache,
}

impl<S: System> TemplateRenderer<S> {
    pub fn new(
        data: BTreeMap<String, toml::Value>,
        secret_command: Option<String>,
        system: S,
    ) -> Self {
        Self {
            data,
            secret_command,
            system,
            secrets: CommandCache::new(),
        }
    }

    /// Render `template`
    pub fn render(&mut self, template: &[u8]) -> Result<Vec<u8>, TemplateError> {
        let template = std::str::from_utf8(template).map_err(|_| TemplateError::NotUtf8)?;

        let mut output = String::with_capacity(template.len());
        let mut last = 0;
        let mut trim_next = false;
        for caps in ACTION.captures_iter(template) {
            let (Some(whole), Some(action)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let mut text = &template[last..whole.start()];
            if trim_next {
                text = text.trim_start();
            }
            if caps.get(1).is_some_and(|m| !m.is_empty()) {
                text = text.trim_end();
            }
            output.push_str(text);
            output.push_str(&self.evaluate(action.as_str())?);
            trim_next = caps.get(3).is_some_and(|m| !m.is_empty());
            last = whole.end();
        }
        let rest = &template[last..];
        output.push_str(if trim_next { rest.trim_start() } else { rest });
        Ok(output.into_bytes())
    }

    fn evaluate(&mut self, action: &str) -> Result<String, TemplateError> {
        if let Some(key) = action.strip_prefix('.') {
            return match self.data.get(key) {
                Some(toml::Value::String(s)) => Ok(s.clone()),
                Some(value) => Ok(value.to_string()),
                None => Err(TemplateError::MissingKey(key.to_string())),
            };
        }

        if let Some(rest) = action.strip_prefix("secret")
            && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            let args: Vec<String> = QUOTED
                .captures_iter(rest)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().replace(r#"\""#, "\"").replace(r"\\", r"\"))
                .collect();
            return self.secret(&args);
        }

        Err(TemplateError::UnknownAction(action.to_string()))
    }

    fn secret(&mut self, args: &[String]) -> Result<String, TemplateError> {
        let command = self
            .secret_command
            .as_deref()
            .ok_or(TemplateError::NoSecretCommand)?;
        let output = self
            .secrets
            .output(&self.system, command, args)
            .map_err(|source| TemplateError::Secret {
                command: command.to_string(),
                args: shell_quote_args(args),
                source,
            })?;
        Ok(String::from_utf8_lossy(&output).trim().to_string())
    }
}

impl<S: System> TemplateEngine for TemplateRenderer<S> {
    fn execute_template_data(&mut self, name: &str, data: &[u8]) -> declarative::Result<Vec<u8>> {
        self.render(data).map_err(|e| declarative::Error::Template {
            name: name.to_string(),
            message: e.to_string(),
        })
    }
}
