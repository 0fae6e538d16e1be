// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use strata_core::domain::engine_config::{ConfigSource, EngineConfigManifest};

pub const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
pub const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./strata-config.yaml)
        #[arg(short, long, default_value = "./strata-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. {}: {}", ConfigSource::Explicit, path.display()),
            None => println!("  1. {}: {}", ConfigSource::Explicit, "(not set)".dimmed()),
        }
        for (position, (source, path)) in EngineConfigManifest::search_path().iter().enumerate() {
            let marker = if path.is_file() { "" } else { " (absent)" };
            println!("  {}. {}: {}{}", position + 2, source, path.display(), marker.dimmed());
        }
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Manifest:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    println!("{}", "Topology:".bold());
    if config.spec.topology.is_empty() {
        println!("  {}", "(no layers declared)".dimmed());
    }
    for descriptor in &config.spec.topology {
        let dependencies: Vec<String> = descriptor
            .dependencies
            .iter()
            .map(ToString::to_string)
            .collect();
        if dependencies.is_empty() {
            println!("  {}", descriptor.key().to_string().bold());
        } else {
            println!(
                "  {} → {}",
                descriptor.key().to_string().bold(),
                dependencies.join(", ")
            );
        }
    }
    println!();

    println!("{}", "Mapping tables:".bold());
    println!(
        "  Configured: {} (other layers use the standard table)",
        config.spec.mapping_tables.len()
    );
    for table in &config.spec.mapping_tables {
        println!(
            "    - {}:{} ({} rules)",
            table.layer,
            table.entity,
            table.rules.rules().len()
        );
    }
    println!();

    println!("{}", "Rule sets:".bold());
    for rule_set in &config.spec.rule_sets {
        println!(
            "  {} [{}] ({} rules)",
            rule_set.entity.bold(),
            rule_set.fields.join(", "),
            rule_set.rules.len()
        );
    }
    println!();

    println!("{}", "Logging:".bold());
    println!("  Level: {}", config.spec.logging.level);
    println!("  Format: {}", config.spec.logging.format);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    let topology = config
        .build_registry()?
        .certify()
        .context("Topology certification failed")?;

    println!("{}", "✓ Configuration is valid".green());
    println!("  {} layers certified", topology.len());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
