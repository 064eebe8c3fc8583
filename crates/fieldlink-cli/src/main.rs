//! `fieldlink` command line.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use fieldlink_cli::config::Config;
use fieldlink_cli::logging::{LogConfig, LogFormat, init_logging};
use fieldlink_model::SyncStatus;
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{
    Session, run_approve, run_audit, run_bulk_approve, run_diff, run_mappings, run_merge,
    run_override, run_pull, run_push, run_reject, run_remap, run_resolve, run_sync_log,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(1);
        }
    };
    let session = Session::new(config, cli.data_dir.clone(), cli.actor.clone());

    let result = match &cli.command {
        Command::Resolve(args) => run_resolve(&session, args).map(|()| 0),
        Command::Mappings(args) => run_mappings(&session, args).map(|()| 0),
        Command::Approve(args) => run_approve(&session, args).map(|()| 0),
        Command::Reject(args) => run_reject(&session, args).map(|()| 0),
        Command::Override(args) => run_override(&session, args).map(|()| 0),
        Command::BulkApprove(args) => run_bulk_approve(&session, args).map(|()| 0),
        Command::Remap(args) => run_remap(&session, args).map(|()| 0),
        Command::Merge(args) => run_merge(&session, args).map(|()| 0),
        Command::Audit(args) => run_audit(&session, args).map(|()| 0),
        Command::Pull(args) => run_pull(&session, args).map(exit_code),
        Command::Push(args) => run_push(&session, args).map(exit_code),
        Command::Diff(args) => run_diff(&session, args).map(|()| 0),
        Command::SyncLog(args) => run_sync_log(&session, args).map(|()| 0),
    };
    let code = match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(code);
}

/// A sync call that moved nothing because every object failed exits 1.
fn exit_code(status: SyncStatus) -> i32 {
    match status {
        SyncStatus::Failed => 1,
        SyncStatus::Success | SyncStatus::Partial => 0,
    }
}

/// Explicit `--log-level` wins over `-v/-q`; either disables `RUST_LOG`.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig::default()
        .with_level_filter(cli.verbosity.tracing_level_filter())
        .with_log_file(cli.log_file.clone())
        .with_log_data(cli.log_data);
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config = config.with_format(match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    });
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
