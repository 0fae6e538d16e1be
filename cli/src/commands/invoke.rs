// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Invoke command
//!
//! Assembles the configured topology over in-memory capability providers (one
//! per foundation), sends a single call into the outermost layer of an entity
//! and prints the outcome together with every translation recorded on the way
//! back up.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use strata_core::application::{LayerFactory, LayerRequest};
use strata_core::domain::engine_config::EngineConfigManifest;
use strata_core::domain::events::TranslationRecord;
use strata_core::domain::failure::{Failure, FailureClass};
use strata_core::domain::layer::LayerKind;
use strata_core::domain::operation::{EntityName, LogicalOperation, OperationShape};
use strata_core::domain::validation::ValidationScope;
use strata_core::infrastructure::{
    FanOutLogSink, InMemoryCapabilityProvider, InMemoryLogSink, TracingLogSink,
};

use super::load_manifest;
use super::mapping::parse_label;

#[derive(Args, Debug, Clone)]
pub struct InvokeArgs {
    /// Entity the operation concerns
    #[arg(value_name = "ENTITY")]
    pub entity: String,

    /// Operation verb (ensure-exists, upsert, verify-exists, remove, ...)
    #[arg(value_name = "VERB")]
    pub verb: String,

    /// JSON payload
    #[arg(long, default_value = "{}")]
    pub payload: String,

    /// Enter through the outermost layer of this entity instead
    #[arg(long, value_name = "ENTITY")]
    pub via: Option<String>,

    /// Validate only these fields (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "FIELDS")]
    pub used_fields: Vec<String>,

    /// Substitute rule defaults for absent used fields instead of failing
    #[arg(long, requires = "used_fields")]
    pub coerce: bool,

    /// JSON file with initial records: { "<Entity>": [ {...}, ... ] }
    #[arg(long, value_name = "FILE")]
    pub seed: Option<PathBuf>,

    /// Make every provider fail a primitive verb, e.g. `add=dependency`
    #[arg(long, value_name = "VERB=CLASS")]
    pub fail: Vec<String>,
}

/// Everything observed during one invocation.
#[derive(Debug)]
pub struct InvokeReport {
    pub result: Result<Value, Failure>,
    pub records: Vec<TranslationRecord>,
    pub provider_calls: BTreeMap<EntityName, Vec<String>>,
}

pub async fn execute(args: InvokeArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = load_manifest(config_override)?;
    let report = run(&args, &config).await?;

    println!("{}", "Provider calls:".bold());
    for (entity, calls) in &report.provider_calls {
        if !calls.is_empty() {
            println!("  {}: {}", entity, calls.join(" → "));
        }
    }
    println!();

    if !report.records.is_empty() {
        println!("{}", "Translations:".bold());
        for record in &report.records {
            println!(
                "  [{}] {}:{} {} → {}",
                record.severity, record.layer, record.entity, record.source_kind, record.outer_kind
            );
        }
        println!();
    }

    match report.result {
        Ok(value) => {
            println!("{}", "✓ Succeeded".green());
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(failure) => {
            println!("{}", "✗ Failed".red());
            for (depth, link) in failure.chain().enumerate() {
                println!(
                    "  {}{} ({}, from {}): {}",
                    "  ".repeat(depth),
                    link.kind.bold(),
                    link.class,
                    link.origin,
                    link.message
                );
                for violation in &link.violations {
                    println!("  {}  - {}: {}", "  ".repeat(depth), violation.field, violation.reason);
                }
            }
            anyhow::bail!("Invocation failed with {}", failure.kind)
        }
    }
}

/// Assemble the topology and perform the call described by `args`.
pub async fn run(args: &InvokeArgs, config: &EngineConfigManifest) -> Result<InvokeReport> {
    let topology = config
        .build_registry()?
        .certify()
        .context("Topology certification failed")?;

    let seeds = match &args.seed {
        Some(path) => read_seed(path)?,
        None => BTreeMap::new(),
    };
    let failures = args
        .fail
        .iter()
        .map(String::as_str)
        .map(parse_injection)
        .collect::<Result<Vec<_>>>()?;

    let memory = Arc::new(InMemoryLogSink::new());
    let sink = FanOutLogSink::new()
        .with(Arc::new(TracingLogSink::new()))
        .with(memory.clone());

    let mut providers = BTreeMap::new();
    let mut factory = LayerFactory::new(topology.clone(), config.policy_book()?, Arc::new(sink));
    for descriptor in topology.descriptors() {
        if descriptor.kind != LayerKind::Foundation {
            continue;
        }
        let provider = Arc::new(InMemoryCapabilityProvider::new(descriptor.entity.clone()));
        if let Some(records) = seeds.get(descriptor.entity.as_str()) {
            provider.seed(records.iter().cloned());
        }
        for (verb, class) in &failures {
            provider.inject_failure(
                verb.clone(),
                Failure::provider(*class, descriptor.entity.clone(), "injected failure"),
            );
        }
        factory = factory.with_provider(descriptor.entity.clone(), provider.clone());
        providers.insert(descriptor.entity.clone(), provider);
    }

    let entity = EntityName::new(args.entity.as_str())?;
    let entry = match &args.via {
        Some(via) => EntityName::new(via.as_str())?,
        None => entity.clone(),
    };
    let endpoint = factory.build(&entry)?;
    info!(
        entity = %entity,
        verb = %args.verb,
        entry = %endpoint.layer(),
        "Invoking operation"
    );

    let payload: Value = serde_json::from_str(&args.payload).context("Payload is not valid JSON")?;
    let scope = if args.used_fields.is_empty() {
        ValidationScope::Full
    } else if args.coerce {
        ValidationScope::used_fields(args.used_fields.iter().cloned()).coercing()
    } else {
        ValidationScope::used_fields(args.used_fields.iter().cloned())
    };
    let operation = LogicalOperation::new(entity, args.verb.as_str(), OperationShape::PassThrough)?;

    let result = endpoint
        .call(LayerRequest::new(operation, scope, payload))
        .await;

    Ok(InvokeReport {
        result,
        records: memory.records(),
        provider_calls: providers
            .into_iter()
            .map(|(entity, provider)| (entity, provider.calls()))
            .collect(),
    })
}

fn read_seed(path: &Path) -> Result<BTreeMap<String, Vec<Value>>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid seed file {:?}", path))
}

/// Parse `verb=class`.
fn parse_injection(spec: &str) -> Result<(String, FailureClass)> {
    let (verb, class) = spec
        .split_once('=')
        .with_context(|| format!("Expected VERB=CLASS, got '{}'", spec))?;
    let class = parse_label(class).with_context(|| format!("Unknown failure class in '{}'", spec))?;
    Ok((verb.trim().to_string(), class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::config::EXAMPLES_TEMPLATE;
    use strata_core::domain::mapping::LogSeverity;

    fn config() -> EngineConfigManifest {
        EngineConfigManifest::from_yaml_str(EXAMPLES_TEMPLATE).unwrap()
    }

    fn args(entity: &str, verb: &str, payload: &str) -> InvokeArgs {
        InvokeArgs {
            entity: entity.to_string(),
            verb: verb.to_string(),
            payload: payload.to_string(),
            via: None,
            used_fields: vec![],
            coerce: false,
            seed: None,
            fail: vec![],
        }
    }

    fn student() -> EntityName {
        EntityName::new("Student").unwrap()
    }

    #[tokio::test]
    async fn test_ensure_exists_through_school() {
        let mut args = args("Student", "ensure-exists", r#"{"id": "s-1", "name": "Ada", "courses": []}"#);
        args.via = Some("School".to_string());

        let report = run(&args, &config()).await.unwrap();

        assert!(report.result.is_ok());
        assert!(report.records.is_empty());
        assert_eq!(report.provider_calls[&student()], vec!["retrieve-by-id", "add"]);
        assert!(report.provider_calls[&EntityName::new("Course").unwrap()].is_empty());
    }

    #[tokio::test]
    async fn test_invalid_payload_never_reaches_provider() {
        let report = run(&args("Student", "ensure-exists", r#"{"id": null, "name": "Ada", "courses": []}"#), &config())
            .await
            .unwrap();

        let failure = report.result.unwrap_err();
        assert_eq!(failure.kind, "StudentProcessingValidationFailure");
        assert!(report.provider_calls[&student()].is_empty());
        assert!(report.records.is_empty());
    }

    #[tokio::test]
    async fn test_injected_dependency_failure_is_translated() {
        let mut args = args("Student", "ensure-exists", r#"{"id": "s-1", "name": "Ada", "courses": []}"#);
        args.fail = vec!["add=dependency".to_string()];

        let report = run(&args, &config()).await.unwrap();

        let failure = report.result.unwrap_err();
        assert_eq!(failure.kind, "StudentProcessingDependencyFailure");
        assert!(failure.inner().is_none());
        assert_eq!(report.records.len(), 2);
        assert!(report
            .records
            .iter()
            .all(|record| record.severity == LogSeverity::Critical));
    }

    #[tokio::test]
    async fn test_seeded_record_is_not_added_again() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(&seed, r#"{"Student": [{"id": "s-1", "name": "Ada", "courses": []}]}"#).unwrap();

        let mut args = args("Student", "ensure-exists", r#"{"id": "s-1", "name": "Ada", "courses": []}"#);
        args.seed = Some(seed);

        let report = run(&args, &config()).await.unwrap();

        assert!(report.result.is_ok());
        assert_eq!(report.provider_calls[&student()], vec!["retrieve-by-id"]);
    }

    #[test]
    fn test_parse_injection() {
        assert_eq!(
            parse_injection("add = service").unwrap(),
            ("add".to_string(), FailureClass::Service)
        );
        assert!(parse_injection("add").is_err());
        assert!(parse_injection("add=boom").is_err());
    }
}
