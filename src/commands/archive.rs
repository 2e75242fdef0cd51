//! `stencil archive` - write the source state as a tar archive

use crate::Context;
use crate::cli::ArchiveArgs;
use anyhow::{Context as AnyhowContext, Result};
use declarative::{ApplyOptions, NoProgress};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{self, Write};
use system::{DebugSystem, HeaderTemplate, TarSystem};

pub fn run(ctx: &Context, args: ArchiveArgs) -> Result<()> {
    let plan = super::plan(ctx, &args.select)?;

    // Entry paths are archived relative to the destination
    let opts = ApplyOptions::default();
    let archive = TarSystem::new(Vec::new(), HeaderTemplate::current());

    let (tar, summary) = if ctx.debug {
        let mut system = DebugSystem::new(archive);
        let summary = super::reconcile(ctx, &plan, &mut system, &opts, &mut NoProgress)?;
        (system.into_inner().close()?, summary)
    } else {
        let mut system = archive;
        let summary = super::reconcile(ctx, &plan, &mut system, &opts, &mut NoProgress)?;
        (system.close()?, summary)
    };

    let bytes = if args.gzip { gzip(&tar)? } else { tar };
    match &args.output {
        Some(path) => {
            fs::write(path, &bytes).with_context(|| format!("Could not write {}", path.display()))?;
        }
        None => io::stdout()
            .lock()
            .write_all(&bytes)
            .context("Could not write archive")?,
    }
    super::check_failures(&summary)
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
