// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the strata CLI

pub mod config;
pub mod invoke;
pub mod mapping;
pub mod topology;

pub use self::config::ConfigCommand;
pub use self::invoke::InvokeArgs;
pub use self::mapping::MappingCommand;
pub use self::topology::TopologyCommand;

use anyhow::{Context, Result};
use std::path::PathBuf;
use strata_core::domain::engine_config::EngineConfigManifest;

/// Load and validate the manifest every command except `config` works from.
pub(crate) fn load_manifest(config_override: Option<PathBuf>) -> Result<EngineConfigManifest> {
    let config = EngineConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}
