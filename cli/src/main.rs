// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Strata CLI
//!
//! The `strata` binary inspects and exercises a layer topology declared in an
//! engine configuration manifest.
//!
//! ## Commands
//!
//! - `strata config show|validate|generate` - Configuration management
//! - `strata topology check|tree|resolve` - Certify and inspect the layer graph
//! - `strata mapping show|explain` - Inspect failure mapping tables
//! - `strata invoke <ENTITY> <VERB>` - Run one call through in-memory providers

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use strata_cli::commands::{self, ConfigCommand, InvokeArgs, MappingCommand, TopologyCommand};

/// Strata - layered services with per-boundary failure translation
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "STRATA_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STRATA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (compact, json)
    #[arg(long, global = true, env = "STRATA_LOG_FORMAT", default_value = "compact")]
    log_format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Topology inspection
    #[command(name = "topology")]
    Topology {
        #[command(subcommand)]
        command: TopologyCommand,
    },

    /// Failure mapping tables
    #[command(name = "mapping")]
    Mapping {
        #[command(subcommand)]
        command: MappingCommand,
    },

    /// Invoke one operation against in-memory providers
    #[command(name = "invoke")]
    Invoke {
        #[command(flatten)]
        args: InvokeArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Topology { command }) => {
            commands::topology::handle_command(command, cli.config).await
        }
        Some(Commands::Mapping { command }) => {
            commands::mapping::handle_command(command, cli.config).await
        }
        Some(Commands::Invoke { args }) => commands::invoke::execute(args, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        other => anyhow::bail!("Unknown log format '{}'. Expected compact or json", other),
    }

    Ok(())
}
