// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Failure mapping commands
//!
//! Commands: show, explain

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

use strata_core::application::taxonomy_mapper::Translation;
use strata_core::application::TaxonomyMapper;
use strata_core::domain::engine_config::EngineConfigManifest;
use strata_core::domain::failure::{Failure, FailureClass, FailureOrigin};
use strata_core::domain::layer::{LayerKind, LayerRef};
use strata_core::domain::mapping::MappingTable;
use strata_core::domain::operation::EntityName;

use super::load_manifest;

#[derive(Subcommand)]
pub enum MappingCommand {
    /// Print the mapping table of a layer
    Show {
        #[arg(value_name = "ENTITY")]
        entity: String,

        /// Layer kind (default: outermost layer of the entity)
        #[arg(long)]
        layer: Option<String>,
    },

    /// Explain how a failure raised below a layer is translated at its boundary
    Explain {
        #[arg(value_name = "ENTITY")]
        entity: String,

        /// Failure class (validation, dependency_validation, dependency, service, cancellation)
        #[arg(long)]
        class: String,

        /// Concrete failure kind (default: the generic kind of the class)
        #[arg(long)]
        kind: Option<String>,

        /// Layer kind (default: outermost layer of the entity)
        #[arg(long)]
        layer: Option<String>,
    },
}

pub async fn handle_command(
    command: MappingCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let config = load_manifest(config_override)?;
    match command {
        MappingCommand::Show { entity, layer } => {
            let layer = target_layer(&config, &entity, layer.as_deref())?;
            show(&config, &layer)
        }
        MappingCommand::Explain {
            entity,
            class,
            kind,
            layer,
        } => {
            let layer = target_layer(&config, &entity, layer.as_deref())?;
            let class: FailureClass = parse_label(&class).context("Unknown failure class")?;
            explain(&config, &layer, class, kind)
        }
    }
}

/// Parse a snake_case label into any enum the manifest uses.
pub fn parse_label<T: DeserializeOwned>(label: &str) -> Result<T> {
    let value = serde_json::Value::String(label.trim().to_lowercase());
    Ok(serde_json::from_value(value)?)
}

fn target_layer(config: &EngineConfigManifest, entity: &str, layer: Option<&str>) -> Result<LayerRef> {
    let entity = EntityName::new(entity)?;
    match layer {
        Some(label) => {
            let kind: LayerKind = parse_label(label).context("Unknown layer kind")?;
            let layer = LayerRef::new(kind, entity);
            config.build_registry()?.resolve_layer(&layer)?;
            Ok(layer)
        }
        None => Ok(config.build_registry()?.resolve(&entity)?.key()),
    }
}

fn table_for(config: &EngineConfigManifest, layer: &LayerRef) -> Result<MappingTable> {
    Ok(config.policy_book()?.policy_for(layer).table.clone())
}

fn show(config: &EngineConfigManifest, layer: &LayerRef) -> Result<()> {
    let table = table_for(config, layer)?;
    let configured = config
        .spec
        .mapping_tables
        .iter()
        .any(|t| t.entity == layer.entity && t.layer == layer.kind);

    println!("{} {}", "Mapping table for".bold(), layer.to_string().bold());
    if !configured {
        println!("  {}", "(standard table)".dimmed());
    }
    for (position, rule) in table.rules().iter().enumerate() {
        let wrap = if rule.wrap_inner { "wrap" } else { "opaque" };
        println!(
            "  {}. {:<32} → {} [{}, {}, {}]",
            position + 1,
            rule.source.to_string(),
            rule.outer.kind.bold(),
            rule.outer.class,
            wrap,
            rule.severity
        );
    }
    Ok(())
}

/// Translate a provider failure of `class` at `layer` without logging it.
pub fn explain_failure(
    table: &MappingTable,
    layer: &LayerRef,
    class: FailureClass,
    kind: Option<String>,
) -> Option<Translation> {
    let kind = kind.unwrap_or_else(|| class.generic_kind().to_string());
    let failure = Failure::new(
        class,
        kind,
        layer.entity.clone(),
        FailureOrigin::Provider,
        "explained failure",
    );
    if failure.is_cancellation() {
        return None;
    }
    Some(TaxonomyMapper::map(failure, table, &layer.entity, layer.kind))
}

fn explain(
    config: &EngineConfigManifest,
    layer: &LayerRef,
    class: FailureClass,
    kind: Option<String>,
) -> Result<()> {
    let table = table_for(config, layer)?;
    match explain_failure(&table, layer, class, kind) {
        None => {
            println!("{}", "Cancellation passes through untranslated".yellow());
        }
        Some(translation) => {
            println!("  At:       {}", layer);
            println!("  Source:   {}", translation.source_kind);
            println!("  Outer:    {}", translation.failure.kind.bold());
            println!("  Class:    {}", translation.failure.class);
            println!("  Severity: {}", translation.severity);
            match translation.failure.inner() {
                Some(inner) => println!("  Inner:    {} (kept)", inner.kind),
                None => println!("  Inner:    {}", "(discarded)".dimmed()),
            }
        }
    }
    Ok(())
}
