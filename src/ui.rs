use colored::Colorize;
use declarative::{Action, ApplyResult, ApplySummary, ProgressCallback};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

// ============================================================================
// Apply progress
// ============================================================================

/// Prints actions as they are computed and entries as they complete
pub struct Reporter {
    pub verbose: bool,
    pub dry_run: bool,
}

impl ProgressCallback for Reporter {
    fn on_entry_start(&mut self, path: &str) {
        log::trace!("{path}: start");
    }

    fn on_action(&mut self, path: &str, action: &Action) {
        if self.verbose || self.dry_run {
            println!("  {} {} {}", "→".cyan(), path, action.to_string().dimmed());
        }
    }

    fn on_entry_complete(&mut self, path: &str, result: &ApplyResult) {
        match result {
            ApplyResult::Failed { error: e } => error(&format!("{path}: {e}")),
            ApplyResult::Created if self.verbose => success(&format!("{path} created")),
            ApplyResult::Modified if self.verbose => success(&format!("{path} updated")),
            ApplyResult::Removed if self.verbose => success(&format!("{path} removed")),
            ApplyResult::Ran if self.verbose => success(&format!("{path} ran")),
            _ => {}
        }
    }
}

/// Print the outcome of a pass
pub fn print_summary(summary: &ApplySummary, dry_run: bool) {
    if dry_run {
        info("Dry run - no changes made");
        return;
    }
    if summary.total_changes() == 0 && summary.is_success() {
        dim("Already up to date");
        return;
    }

    println!();
    if summary.is_success() {
        println!("  {} Applied successfully", "✓".green().bold());
    } else {
        println!("  {} Applied with errors", "⚠".yellow().bold());
    }

    let lines = [
        (summary.created, "created"),
        (summary.modified, "modified"),
        (summary.removed, "removed"),
        (summary.ran, "scripts run"),
        (summary.skipped, "skipped"),
    ];
    for (count, label) in lines {
        if count > 0 {
            println!("    • {count} {label}");
        }
    }
    if !summary.failures.is_empty() {
        println!("    • {} {}", summary.failures.len(), "failed".red());
    }
}
