//! Per-run cache of external command output
//!
//! Secret lookups run the same command many times while rendering; the
//! cache is owned by one run and injected where needed.

use crate::error::Result;
use crate::system::System;
use std::collections::HashMap;
use std::process::Command;

/// Command output keyed by program and arguments
#[derive(Debug, Default)]
pub struct CommandCache {
    outputs: HashMap<String, Vec<u8>>,
}

impl CommandCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of `program args...`, executing it through `system` at most once
    pub fn output<S: System + ?Sized>(
        &mut self,
        system: &S,
        program: &str,
        args: &[String],
    ) -> Result<Vec<u8>> {
        let key = cache_key(program, args);
        if let Some(output) = self.outputs.get(&key) {
            return Ok(output.clone());
        }

        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = system.idempotent_cmd_output(&mut cmd)?;
        self.outputs.insert(key, output.clone());
        Ok(output)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

fn cache_key(program: &str, args: &[String]) -> String {
    let mut key = program.to_string();
    for arg in args {
        key.push('\0');
        key.push_str(arg);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_separates_args() {
        let a = cache_key("pass", &["a b".to_string()]);
        let b = cache_key("pass", &["a".to_string(), "b".to_string()]);
        assert_ne!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_cached() {
        use crate::backend::NullSystem;

        let system = NullSystem::new();
        let mut cache = CommandCache::new();
        let args = vec!["hello".to_string()];

        let first = cache.output(&system, "echo", &args).unwrap();
        let second = cache.output(&system, "echo", &args).unwrap();
        assert_eq!(first, b"hello\n");
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        cache.output(&system, "echo", &["bye".to_string()]).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
