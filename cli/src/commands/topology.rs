// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topology commands
//!
//! Commands: check, tree, resolve

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use strata_core::domain::layer::{LayerKind, LayerRef};
use strata_core::domain::operation::EntityName;
use strata_core::domain::topology::CertifiedTopology;

use super::load_manifest;

#[derive(Subcommand)]
pub enum TopologyCommand {
    /// Certify the declared topology
    Check,

    /// Print the dependency tree below the outermost layer of an entity
    Tree {
        #[arg(value_name = "ENTITY")]
        entity: String,
    },

    /// Show the outermost layer registered for an entity
    Resolve {
        #[arg(value_name = "ENTITY")]
        entity: String,
    },
}

pub async fn handle_command(
    command: TopologyCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let topology = certified(config_override)?;
    match command {
        TopologyCommand::Check => check(&topology),
        TopologyCommand::Tree { entity } => tree(&topology, &entity),
        TopologyCommand::Resolve { entity } => resolve(&topology, &entity),
    }
}

pub(crate) fn certified(config_override: Option<PathBuf>) -> Result<CertifiedTopology> {
    let config = load_manifest(config_override)?;
    let topology = config
        .build_registry()?
        .certify()
        .context("Topology certification failed")?;
    Ok(topology)
}

fn check(topology: &CertifiedTopology) -> Result<()> {
    let mut per_kind: BTreeMap<LayerKind, usize> = BTreeMap::new();
    for descriptor in topology.descriptors() {
        *per_kind.entry(descriptor.kind).or_default() += 1;
    }

    println!("{}", "✓ Topology certified".green());
    println!("  Layers: {}", topology.len());
    for (kind, count) in per_kind.iter().rev() {
        println!("    {:<14} {}", kind.to_string(), count);
    }
    Ok(())
}

fn tree(topology: &CertifiedTopology, entity: &str) -> Result<()> {
    let entity = EntityName::new(entity)?;
    let root = topology.resolve(&entity)?.key();
    for line in render_tree(topology, &root)? {
        println!("{}", line);
    }
    Ok(())
}

fn resolve(topology: &CertifiedTopology, entity: &str) -> Result<()> {
    let entity = EntityName::new(entity)?;
    let descriptor = topology.resolve(&entity)?;
    println!("{}", descriptor.key().to_string().bold());
    println!("  Kind: {}", descriptor.kind);
    println!("  Entity: {}", descriptor.entity);
    if descriptor.dependencies.is_empty() {
        println!("  Dependencies: {}", "(capability provider)".dimmed());
    } else {
        println!("  Dependencies:");
        for dependency in &descriptor.dependencies {
            println!("    - {}", dependency);
        }
    }
    Ok(())
}

/// One line per layer, indented by depth below `root`. Shared layers are
/// printed under every parent.
pub fn render_tree(topology: &CertifiedTopology, root: &LayerRef) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    walk(topology, root, 0, &mut lines)?;
    Ok(lines)
}

fn walk(
    topology: &CertifiedTopology,
    layer: &LayerRef,
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<()> {
    lines.push(format!("{}{}", "  ".repeat(depth), layer));
    let descriptor = topology.resolve_layer(layer)?;
    for dependency in &descriptor.dependencies {
        walk(topology, dependency, depth + 1, lines)?;
    }
    Ok(())
}
