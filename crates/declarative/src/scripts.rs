//! Run-once and run-on-change bookkeeping for scripts
//!
//! Completion facts live in [`PersistentState`]:
//!
//! - `script`: keyed by the hex BLAKE3 of `name NUL contents`; existence
//!   means the script already ran with exactly these contents.
//! - `scriptOnChange`: keyed by script name; the stored `content_hash`
//!   is compared with the current one.

use crate::error::{Error, Result};
use crate::types::RunCondition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use system::PersistentState;

/// Bucket holding completion facts for `once` scripts
pub const SCRIPT_BUCKET: &str = "script";

/// Bucket holding the last-run contents hash for `onchange` scripts
pub const SCRIPT_ON_CHANGE_BUCKET: &str = "scriptOnChange";

/// Stored value for a completed script run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub name: String,
    pub content_hash: String,
    pub run_at: DateTime<Utc>,
}

/// Hex BLAKE3 hash of script contents
pub fn content_hash(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}

/// Key for a `once` script: identity plus contents
pub fn once_key(name: &str, contents: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

/// Whether a script must run under `condition` given its recorded history
pub fn should_run<P: PersistentState + ?Sized>(
    state: &P,
    name: &str,
    contents: &[u8],
    condition: RunCondition,
) -> Result<bool> {
    match condition {
        RunCondition::Always => Ok(true),
        RunCondition::Once => {
            let key = once_key(name, contents);
            Ok(state.get(SCRIPT_BUCKET, key.as_bytes())?.is_none())
        }
        RunCondition::OnChange => {
            let Some(value) = state.get(SCRIPT_ON_CHANGE_BUCKET, name.as_bytes())? else {
                return Ok(true);
            };
            let record = decode(SCRIPT_ON_CHANGE_BUCKET, name, &value)?;
            Ok(record.content_hash != content_hash(contents))
        }
    }
}

/// Record a successful run so later passes honour `condition`
pub fn record_run<P: PersistentState + ?Sized>(
    state: &mut P,
    name: &str,
    contents: &[u8],
    condition: RunCondition,
) -> Result<()> {
    let (bucket, key) = match condition {
        RunCondition::Always => return Ok(()),
        RunCondition::Once => (SCRIPT_BUCKET, once_key(name, contents)),
        RunCondition::OnChange => (SCRIPT_ON_CHANGE_BUCKET, name.to_string()),
    };
    let record = ScriptRecord {
        name: name.to_string(),
        content_hash: content_hash(contents),
        run_at: Utc::now(),
    };
    let value = serde_json::to_vec(&record).map_err(|source| Error::CorruptRecord {
        bucket,
        key: key.clone(),
        source,
    })?;
    log::debug!("recording {bucket} {name} ({})", record.content_hash);
    state.set(bucket, key.as_bytes(), &value)?;
    Ok(())
}

fn decode(bucket: &'static str, key: &str, value: &[u8]) -> Result<ScriptRecord> {
    serde_json::from_slice(value).map_err(|source| Error::CorruptRecord {
        bucket,
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::MemoryPersistentState;

    #[test]
    fn test_always_runs() {
        let mut state = MemoryPersistentState::new();
        record_run(&mut state, "a.sh", b"x", RunCondition::Always).unwrap();
        assert!(should_run(&state, "a.sh", b"x", RunCondition::Always).unwrap());
        assert!(state.buckets().is_empty());
    }

    #[test]
    fn test_once_keyed_by_name_and_contents() {
        let mut state = MemoryPersistentState::new();
        assert!(should_run(&state, "install.sh", b"echo hi", RunCondition::Once).unwrap());

        record_run(&mut state, "install.sh", b"echo hi", RunCondition::Once).unwrap();
        assert!(!should_run(&state, "install.sh", b"echo hi", RunCondition::Once).unwrap());
        assert!(should_run(&state, "install.sh", b"echo bye", RunCondition::Once).unwrap());
        assert!(should_run(&state, "other.sh", b"echo hi", RunCondition::Once).unwrap());

        let key = once_key("install.sh", b"echo hi");
        let value = state.get(SCRIPT_BUCKET, key.as_bytes()).unwrap().unwrap();
        let record: ScriptRecord = serde_json::from_slice(&value).unwrap();
        assert_eq!(record.name, "install.sh");
        assert_eq!(record.content_hash, content_hash(b"echo hi"));
    }

    #[test]
    fn test_onchange_compares_hash() {
        let mut state = MemoryPersistentState::new();
        assert!(should_run(&state, "sync.sh", b"v1", RunCondition::OnChange).unwrap());

        record_run(&mut state, "sync.sh", b"v1", RunCondition::OnChange).unwrap();
        assert!(!should_run(&state, "sync.sh", b"v1", RunCondition::OnChange).unwrap());
        assert!(should_run(&state, "sync.sh", b"v2", RunCondition::OnChange).unwrap());

        record_run(&mut state, "sync.sh", b"v2", RunCondition::OnChange).unwrap();
        assert!(!should_run(&state, "sync.sh", b"v2", RunCondition::OnChange).unwrap());
        assert!(should_run(&state, "sync.sh", b"v1", RunCondition::OnChange).unwrap());
    }

    #[test]
    fn test_corrupt_record() {
        let mut state = MemoryPersistentState::new();
        state
            .set(SCRIPT_ON_CHANGE_BUCKET, b"sync.sh", b"not json")
            .unwrap();
        let err = should_run(&state, "sync.sh", b"v1", RunCondition::OnChange).unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }

    #[test]
    fn test_once_key_separates_name_from_contents() {
        assert_ne!(once_key("ab", b"c"), once_key("a", b"bc"));
    }
}
