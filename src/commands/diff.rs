//! `stencil diff` - show what `apply` would change as a git-style diff

use crate::Context;
use crate::cli::SelectArgs;
use anyhow::{Context as AnyhowContext, Result};
use declarative::{ApplyOptions, ApplyPlan, ApplySummary, NoProgress};
use std::io::{self, Write};
use system::{
    DebugSystem, GitDiffSystem, NullPersistentState, PersistentState, RealSystem, SqliteState,
    System,
};

pub fn run(ctx: &Context, args: SelectArgs) -> Result<()> {
    let plan = super::plan(ctx, &args)?;

    // Reads only: a missing store is not created
    let state = SqliteState::open_existing(&ctx.config.state_path).with_context(|| {
        format!(
            "Could not open state {}",
            ctx.config.state_path.display()
        )
    })?;
    let (output, summary) = match state {
        Some(state) => render_with(ctx, &plan, RealSystem::new(state))?,
        None => render_with(ctx, &plan, RealSystem::new(NullPersistentState))?,
    };

    io::stdout()
        .lock()
        .write_all(output.as_bytes())
        .context("Could not write diff")?;
    super::check_failures(&summary)
}

fn render_with<P: PersistentState>(
    ctx: &Context,
    plan: &ApplyPlan,
    system: RealSystem<P>,
) -> Result<(String, ApplySummary)> {
    if ctx.debug {
        render(ctx, plan, DebugSystem::new(system))
    } else {
        render(ctx, plan, system)
    }
}

fn render<S: System>(ctx: &Context, plan: &ApplyPlan, inner: S) -> Result<(String, ApplySummary)> {
    let mut system = GitDiffSystem::new(inner, &ctx.config.dest_dir);
    let opts = ApplyOptions::new(&ctx.config.dest_dir);
    let summary = super::reconcile(ctx, plan, &mut system, &opts, &mut NoProgress)?;
    Ok((system.finish(), summary))
}
