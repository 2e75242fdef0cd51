//! Subcommands and the plumbing they share

pub mod apply;
pub mod archive;
pub mod diff;
pub mod execute_template;
pub mod state;

use crate::Context;
use crate::cli::SelectArgs;
use crate::source::SourceState;
use crate::template::TemplateRenderer;
use crate::ui;
use anyhow::{Result, anyhow, bail};
use declarative::{
    ApplyContext, ApplyOptions, ApplyPlan, ApplySummary, EntryTypeSet, ProgressCallback,
};
use std::path::Path;
use system::{NullSystem, PatternSet, System};

/// Load the source state and select the entries named by `select`
pub(crate) fn plan(ctx: &Context, select: &SelectArgs) -> Result<ApplyPlan> {
    let source = SourceState::load(&ctx.config.source_dir, ctx.config.umask)?;

    let mut patterns = PatternSet::new();
    if select.matches.is_empty() {
        patterns.add("**", true)?;
    }
    for pattern in &select.matches {
        patterns.add(pattern, true)?;
    }
    for pattern in source.ignore.iter().chain(&select.exclude) {
        patterns.add(pattern, false)?;
    }

    let types: EntryTypeSet = select.include.parse().map_err(|e: String| anyhow!(e))?;
    let targets = select
        .targets
        .iter()
        .map(|target| relative_target(&ctx.config.dest_dir, target))
        .collect::<Result<Vec<_>>>()?;

    let plan = ApplyPlan::select(
        source.entries,
        &patterns,
        &types,
        &targets,
        select.recursive,
    );
    log::info!("Selected {} entries", plan.len());
    Ok(plan)
}

/// Turn a CLI target into a path relative to the destination
fn relative_target(dest_dir: &Path, target: &str) -> Result<String> {
    let path = Path::new(target);
    if !path.is_absolute() {
        return Ok(target.trim_start_matches("./").to_string());
    }
    match path.strip_prefix(dest_dir) {
        Ok(rel) => Ok(rel.to_string_lossy().into_owned()),
        Err(_) => bail!("{target} is not in {}", dest_dir.display()),
    }
}

/// Template renderer over the configured data, running secrets directly
pub(crate) fn renderer(ctx: &Context) -> TemplateRenderer<NullSystem> {
    TemplateRenderer::new(
        ctx.config.data.clone(),
        ctx.config.secret.command.clone(),
        NullSystem,
    )
}

/// Run one pass with templates and encryption wired from the config
pub(crate) fn reconcile<S: System + ?Sized>(
    ctx: &Context,
    plan: &ApplyPlan,
    system: &mut S,
    opts: &ApplyOptions,
    progress: &mut dyn ProgressCallback,
) -> Result<ApplySummary> {
    let mut templates = renderer(ctx);
    let tool = ctx.config.encryption.as_ref().map(|e| e.tool());
    let mut apply_ctx = ApplyContext::new(&mut templates, progress);
    if let Some(tool) = &tool {
        apply_ctx = apply_ctx.with_encryption(tool);
    }
    Ok(declarative::apply(plan, system, opts, &mut apply_ctx)?)
}

/// Report per-entry failures and turn them into an error exit
pub(crate) fn check_failures(summary: &ApplySummary) -> Result<()> {
    if summary.is_success() {
        return Ok(());
    }
    for failure in &summary.failures {
        ui::error(&failure.to_string());
    }
    bail!("{} of {} entries failed", summary.failures.len(), summary.total())
}
