//! `stencil state` - inspect and edit persistent state

use crate::Context;
use crate::cli::StateCommand;
use crate::ui;
use anyhow::{Context as AnyhowContext, Result};
use std::collections::BTreeMap;
use system::{PersistentState, SqliteState, StateRecord};

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    let path = &ctx.config.state_path;
    let mut state = SqliteState::open(path)
        .with_context(|| format!("Could not open state {}", path.display()))?;

    match cmd {
        StateCommand::Dump => {
            let dump = dump(&state.records()?);
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        StateCommand::Delete { bucket, key } => {
            state.delete(&bucket, key.as_bytes())?;
            if !ctx.quiet {
                ui::success(&format!("Deleted {bucket}/{key}"));
            }
        }
        StateCommand::Reset { bucket } => {
            let removed = state.delete_bucket(&bucket)?;
            if !ctx.quiet {
                ui::success(&format!("Deleted {removed} keys from {bucket}"));
            }
        }
    }
    Ok(())
}

/// Bucket -> key -> value, with bytes shown as (lossy) UTF-8
fn dump(records: &[StateRecord]) -> BTreeMap<String, BTreeMap<String, String>> {
    let mut buckets: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for record in records {
        buckets.entry(record.bucket.clone()).or_default().insert(
            String::from_utf8_lossy(&record.key).into_owned(),
            String::from_utf8_lossy(&record.value).into_owned(),
        );
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_groups_by_bucket() {
        let mut state = SqliteState::open_in_memory().unwrap();
        state.set("script", b"k1", b"v1").unwrap();
        state.set("script", b"k2", b"v2").unwrap();
        state.set("scriptOnChange", b"sync.sh", b"{}").unwrap();

        let dump = dump(&state.records().unwrap());
        assert_eq!(dump.len(), 2);
        assert_eq!(dump["script"]["k2"], "v2");
        assert_eq!(dump["scriptOnChange"]["sync.sh"], "{}");
    }
}
