mod cli;
mod commands;
mod config;
mod source;
mod template;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Config;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Wrap destination backends in a tracing decorator
    pub debug: bool,
    pub config: Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        log_level
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level).format_timestamp(None);
    if cli.debug {
        builder.filter_module(system::backend::debug::TRACE_TARGET, log::LevelFilter::Debug);
    }
    builder.init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "stencil", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?
        .with_overrides(cli.source.as_deref(), cli.destination.as_deref());
    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        debug: cli.debug,
        config,
    };

    match cli.command {
        Command::Apply(args) => commands::apply::run(&ctx, args),
        Command::Diff(args) => commands::diff::run(&ctx, args),
        Command::Archive(args) => commands::archive::run(&ctx, args),
        Command::ExecuteTemplate { templates } => commands::execute_template::run(&ctx, templates),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Completions { .. } => Ok(()),
    }
}
