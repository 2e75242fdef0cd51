use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stencil")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile your home directory against a declarative source tree", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Trace every destination call
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file (default: ~/.config/stencil/stencil.toml)
    #[arg(short, long, global = true, env = "STENCIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source directory
    #[arg(short = 'S', long, global = true)]
    pub source: Option<PathBuf>,

    /// Destination directory
    #[arg(short = 'D', long, global = true)]
    pub destination: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Update the destination to match the source state
    Apply(ApplyArgs),

    /// Print the diff between the source state and the destination
    Diff(SelectArgs),

    /// Generate a tar archive of the source state
    Archive(ArchiveArgs),

    /// Execute the given templates
    ExecuteTemplate {
        /// Templates to render; reads stdin when none are given
        templates: Vec<String>,
    },

    /// Inspect and edit persistent state
    #[command(subcommand)]
    State(StateCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Entry selection
// ============================================================================

#[derive(Args, Clone, Default)]
pub struct SelectArgs {
    /// Target paths relative to the destination
    pub targets: Vec<String>,

    /// Entry types: all, files, dirs, symlinks, scripts, remove (comma-separated)
    #[arg(short, long, default_value = "all")]
    pub include: String,

    /// Only entries matching these globs
    #[arg(short = 'm', long = "match")]
    pub matches: Vec<String>,

    /// Skip entries matching these globs
    #[arg(short = 'x', long)]
    pub exclude: Vec<String>,

    /// Include entries below the given targets
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Show what would change without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Stop at the first failing entry
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Args)]
pub struct ArchiveArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Compress the output with gzip
    #[arg(short = 'z', long)]
    pub gzip: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// ============================================================================
// State Commands
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// Print every bucket as JSON
    Dump,

    /// Delete a single key
    Delete {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },

    /// Delete a whole bucket
    Reset {
        #[arg(long)]
        bucket: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::parse_from([
            "stencil",
            "-vv",
            "apply",
            "--dry-run",
            "-i",
            "files,dirs",
            "-x",
            ".cache/**",
            "-r",
            ".config",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.dry_run);
        assert!(args.select.recursive);
        assert_eq!(args.select.include, "files,dirs");
        assert_eq!(args.select.exclude, vec![".cache/**"]);
        assert_eq!(args.select.targets, vec![".config"]);
    }

    #[test]
    fn test_parse_state_delete() {
        let cli = Cli::parse_from([
            "stencil", "state", "delete", "--bucket", "script", "--key", "abc",
        ]);
        assert!(matches!(
            cli.command,
            Command::State(StateCommand::Delete { .. })
        ));
    }
}
