// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Defines the configuration schema loaded once at process start:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Layer topology descriptors
// - Per-layer failure mapping tables
// - Per-entity validation rule sets
// - Logging settings

use crate::domain::layer::{LayerDescriptor, LayerKind, LayerRef};
use crate::domain::mapping::MappingTable;
use crate::domain::operation::EntityName;
use crate::domain::policy::PolicyBook;
use crate::domain::topology::{CompositionValidator, TopologyRegistry};
use crate::domain::validation::ValidationRuleSet;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "strata.dev/v1";
pub const KIND: &str = "EngineConfig";
pub const CONFIG_PATH_ENV: &str = "STRATA_CONFIG_PATH";
pub const CONFIG_FILE_NAME: &str = "strata-config.yaml";

/// Where a configuration file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit,
    Environment,
    WorkingDirectory,
    UserHome,
    System,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConfigSource::Explicit => "--config",
            ConfigSource::Environment => CONFIG_PATH_ENV,
            ConfigSource::WorkingDirectory => "working directory",
            ConfigSource::UserHome => "user home",
            ConfigSource::System => "system",
        };
        f.write_str(label)
    }
}

#[cfg(windows)]
fn system_config_path() -> PathBuf {
    PathBuf::from(r"C:\ProgramData\Strata\config.yaml")
}

#[cfg(not(windows))]
fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/strata/config.yaml")
}

/// Top-level Kubernetes-style engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "strata.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: EngineConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigSpec {
    /// Layer descriptors, in any order
    #[serde(default)]
    pub topology: Vec<LayerDescriptor>,

    /// Failure mapping tables, one per (entity, layer)
    #[serde(default)]
    pub mapping_tables: Vec<MappingTableConfig>,

    /// Validation rule sets, one per entity
    #[serde(default)]
    pub rule_sets: Vec<ValidationRuleSet>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingTableConfig {
    pub entity: EntityName,
    pub layer: LayerKind,
    pub rules: MappingTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for EngineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "strata-engine".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: EngineConfigSpec::default(),
        }
    }
}

impl EngineConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate configuration files, highest precedence first.
    pub fn search_path() -> Vec<(ConfigSource, PathBuf)> {
        let mut candidates = Vec::with_capacity(4);
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            candidates.push((ConfigSource::Environment, PathBuf::from(path)));
        }
        candidates.push((ConfigSource::WorkingDirectory, PathBuf::from(CONFIG_FILE_NAME)));
        if let Some(home) = dirs::home_dir() {
            candidates.push((ConfigSource::UserHome, home.join(".strata").join("config.yaml")));
        }
        candidates.push((ConfigSource::System, system_config_path()));
        candidates
    }

    /// First existing file on the search path.
    pub fn discover_config() -> Option<(ConfigSource, PathBuf)> {
        Self::search_path()
            .into_iter()
            .find(|(_, path)| path.is_file())
    }

    /// Load from `cli_path` when given (which must then exist), otherwise from
    /// the first discovered file, otherwise fall back to an empty manifest.
    /// Environment overrides apply in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let located = match cli_path {
            Some(path) => Some((ConfigSource::Explicit, path)),
            None => Self::discover_config(),
        };

        let mut config = match located {
            Some((source, path)) => {
                tracing::info!(source = %source, path = %path.display(), "Loading configuration");
                Self::from_yaml_file(&path)
                    .with_context(|| format!("Failed to load config at {:?}", path))?
            }
            None => {
                tracing::warn!("No configuration file found; using an empty topology");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("STRATA_LOG_LEVEL") {
            if level.trim().is_empty() {
                tracing::warn!("Ignoring empty STRATA_LOG_LEVEL");
            } else {
                tracing::info!("Environment override: STRATA_LOG_LEVEL={}", level);
                self.spec.logging.level = level;
            }
        }

        if let Ok(format) = std::env::var("STRATA_LOG_FORMAT") {
            match format.to_lowercase().as_str() {
                "compact" | "json" => {
                    tracing::info!("Environment override: STRATA_LOG_FORMAT={}", format);
                    self.spec.logging.format = format.to_lowercase();
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for STRATA_LOG_FORMAT: '{}'. Expected compact/json. Ignoring.",
                        format
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if !matches!(self.spec.logging.format.as_str(), "compact" | "json") {
            anyhow::bail!(
                "Invalid logging format: '{}'. Must be 'compact' or 'json'",
                self.spec.logging.format
            );
        }

        let mut layers = HashSet::new();
        for descriptor in &self.spec.topology {
            CompositionValidator::check(descriptor)?;
            if !layers.insert(descriptor.key()) {
                anyhow::bail!("Layer {} is declared more than once", descriptor.key());
            }
        }

        let mut tables = HashSet::new();
        for table in &self.spec.mapping_tables {
            let layer = LayerRef::new(table.layer, table.entity.clone());
            if !tables.insert(layer.clone()) {
                anyhow::bail!("Mapping table for {} is declared more than once", layer);
            }
            if !layers.contains(&layer) {
                anyhow::bail!("Mapping table for {} has no matching topology entry", layer);
            }
        }

        let mut entities = HashSet::new();
        for rule_set in &self.spec.rule_sets {
            EntityName::new(rule_set.entity.as_str())?;
            if !entities.insert(rule_set.entity.clone()) {
                anyhow::bail!("Rule set for '{}' is declared more than once", rule_set.entity);
            }
            rule_set.check_shape()?;
        }

        Ok(())
    }

    /// Register every declared layer into a fresh registry.
    pub fn build_registry(&self) -> anyhow::Result<TopologyRegistry> {
        let registry = TopologyRegistry::new();
        for descriptor in &self.spec.topology {
            registry.register(descriptor.clone())?;
        }
        Ok(registry)
    }

    pub fn policy_book(&self) -> anyhow::Result<PolicyBook> {
        let mut book = PolicyBook::new();
        for table in &self.spec.mapping_tables {
            book = book.with_table(
                LayerRef::new(table.layer, table.entity.clone()),
                table.rules.clone(),
            );
        }
        for rule_set in &self.spec.rule_sets {
            book = book.with_rule_set(EntityName::new(rule_set.entity.as_str())?, rule_set.clone());
        }
        Ok(book)
    }
}
