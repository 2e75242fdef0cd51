//! `stencil apply` - converge the destination onto the source state

use crate::Context;
use crate::cli::ApplyArgs;
use crate::ui::{self, Reporter};
use anyhow::{Context as AnyhowContext, Result};
use declarative::ApplyOptions;
use system::{DebugSystem, RealSystem, SqliteState};

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let plan = super::plan(ctx, &args.select)?;
    if plan.is_empty() {
        ui::dim("Nothing selected");
        return Ok(());
    }

    let state = SqliteState::open(&ctx.config.state_path).with_context(|| {
        format!(
            "Could not open state {}",
            ctx.config.state_path.display()
        )
    })?;
    let system = RealSystem::new(state).with_script_dir(&ctx.config.dest_dir);

    let opts = ApplyOptions {
        dest_dir: ctx.config.dest_dir.clone(),
        dry_run: args.dry_run,
        keep_going: !args.fail_fast,
    };
    let mut reporter = Reporter {
        verbose: ctx.verbose > 0,
        dry_run: args.dry_run,
    };

    let summary = if ctx.debug {
        let mut system = DebugSystem::new(system);
        super::reconcile(ctx, &plan, &mut system, &opts, &mut reporter)?
    } else {
        let mut system = system;
        super::reconcile(ctx, &plan, &mut system, &opts, &mut reporter)?
    };

    if !ctx.quiet {
        ui::print_summary(&summary, args.dry_run);
    }
    super::check_failures(&summary)
}
