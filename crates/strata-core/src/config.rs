use std::path::Path;

use anyhow::{anyhow, Context, Result};
use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::compositor::CompositionOptions;

/// Regions the host renderer is known to expose.
pub const DEFAULT_REGIONS: &[&str] = &[
    "globalNavigation",
    "pageHeader",
    "breadcrumbs",
    "viewToolbar",
    "main",
    "contextPanel",
];

pub const DEFAULT_PERFORMANCE_BUDGET_MS: u64 = 50;

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct CompositionConfig {
    /// Report trait conflicts as warnings instead of blocking composition.
    pub conflicts_as_warnings: bool,
    /// Treat any field collision as a fatal composition error.
    pub collisions_fatal: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Soft budget for one composition-layer validation run, in milliseconds.
    pub performance_budget_ms: u64,
    /// Collect every structural error instead of stopping at the first.
    pub collect_all_errors: bool,
    /// Drop properties the registered schema does not declare.
    pub strip_unknown: bool,
    /// Convert string scalars into the type the schema declares.
    pub coerce_types: bool,
    pub known_regions: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            performance_budget_ms: DEFAULT_PERFORMANCE_BUDGET_MS,
            collect_all_errors: true,
            strip_unknown: false,
            coerce_types: false,
            known_regions: DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct StrataConfig {
    #[serde(default)]
    pub composition: CompositionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(StrataConfig);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

/// Returns the JSON schema describing the configuration structure.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(StrataConfig);
    serde_json::to_value(&schema).expect("schema json")
}

impl StrataConfig {
    /// Parse TOML, check it against the generated schema, then apply env overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: toml::Value = toml::from_str(content).context("config is not valid TOML")?;
        let json_value = serde_json::to_value(&raw)?;
        let validation_errors: Vec<_> = CONFIG_SCHEMA
            .iter_errors(&json_value)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        if !validation_errors.is_empty() {
            return Err(anyhow!(validation_errors.join(", ")));
        }
        let mut cfg: StrataConfig = toml::from_str(content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Defaults plus whatever the environment overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(flag) = env_flag("STRATA_CONFLICTS_AS_WARNINGS") {
            self.composition.conflicts_as_warnings = flag;
        }
        if let Some(flag) = env_flag("STRATA_COLLISIONS_FATAL") {
            self.composition.collisions_fatal = flag;
        }
        if let Ok(raw) = std::env::var("STRATA_VALIDATION_BUDGET_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.validation.performance_budget_ms = ms,
                Err(err) => warn!(value = %raw, %err, "ignoring invalid STRATA_VALIDATION_BUDGET_MS"),
            }
        }
    }

    pub fn composition_options(&self) -> CompositionOptions {
        CompositionOptions {
            conflicts_as_warnings: self.composition.conflicts_as_warnings,
            collisions_fatal: self.composition.collisions_fatal,
        }
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<StrataConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    StrataConfig::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(var = name, value = %raw, "ignoring unrecognised boolean");
            None
        }
    }
}
