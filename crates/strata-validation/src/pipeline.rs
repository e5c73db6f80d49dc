use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use once_cell::sync::Lazy;
use serde_json::Value;
use strata_core::ValidationConfig;
use strata_protocol::{
    ComposedObject, Issue, IssueDomain, TraitDefinition, ValidationResult,
};
use tracing::{debug, info_span};

use crate::composition::CompositionValidator;
use crate::rules::CompositionRule;
use crate::structural::{StructuralOptions, StructuralOutcome, StructuralValidator};
use crate::PipelineSetupError;

/// Name under which the generated trait-definition schema is registered.
pub const TRAIT_DEFINITION_SCHEMA: &str = "trait_definition";

static TRAIT_SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    let schema = schemars::schema_for!(TraitDefinition);
    serde_json::to_value(&schema).expect("trait definition schema json")
});

/// JSON schema generated from [`TraitDefinition`].
pub fn trait_definition_schema() -> Value {
    TRAIT_SCHEMA_JSON.clone()
}

/// Synchronous named check over an arbitrary JSON payload.
pub type ValidatorFn = Box<dyn Fn(&Value) -> ValidationResult + Send + Sync>;

/// Host-supplied check that may need I/O, such as a remote schema lookup.
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    fn name(&self) -> &str;
    async fn validate(&self, value: &Value) -> ValidationResult;
}

/// How registered async validators are awaited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanOut {
    #[default]
    Sequential,
    Parallel,
}

/// Entry point for CI: structural and composition layers plus named validators.
///
/// Register schemas and validators first; validation itself only reads the tables.
pub struct ValidationPipeline {
    structural: StructuralValidator,
    composition: CompositionValidator,
    validators: BTreeMap<String, ValidatorFn>,
    async_validators: Vec<Arc<dyn AsyncValidator>>,
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("structural", &self.structural)
            .field("composition", &self.composition)
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("async_validators", &self.async_validators.len())
            .finish()
    }
}

impl ValidationPipeline {
    pub fn new(cfg: &ValidationConfig) -> Self {
        Self {
            structural: StructuralValidator::new(StructuralOptions::from(cfg)),
            composition: CompositionValidator::from_config(cfg),
            validators: BTreeMap::new(),
            async_validators: Vec::new(),
        }
    }

    /// A pipeline with the `trait_definition` schema already registered.
    pub fn with_builtin_schemas(cfg: &ValidationConfig) -> Result<Self, PipelineSetupError> {
        let mut pipeline = Self::new(cfg);
        pipeline.register_schema(TRAIT_DEFINITION_SCHEMA, trait_definition_schema())?;
        Ok(pipeline)
    }

    pub fn register_schema(
        &mut self,
        name: impl Into<String>,
        schema: Value,
    ) -> Result<(), PipelineSetupError> {
        self.structural.register(name, schema)
    }

    pub fn register_validator<F>(&mut self, name: impl Into<String>, validator: F)
    where
        F: Fn(&Value) -> ValidationResult + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(validator = %name, "registered validator");
        self.validators.insert(name, Box::new(validator));
    }

    pub fn register_async_validator(&mut self, validator: Arc<dyn AsyncValidator>) {
        self.async_validators.push(validator);
    }

    pub fn add_composition_rule(&mut self, rule: impl CompositionRule + 'static) {
        self.composition.add_rule(rule);
    }

    pub fn structural(&self) -> &StructuralValidator {
        &self.structural
    }

    pub fn composition(&self) -> &CompositionValidator {
        &self.composition
    }

    pub fn validate_structure(&self, schema: &str, value: &Value) -> ValidationResult {
        self.structural.validate(schema, value).result
    }

    /// Structural check that also returns the stripped/coerced instance.
    pub fn validate_structure_with_value(&self, schema: &str, value: &Value) -> StructuralOutcome {
        self.structural.validate(schema, value)
    }

    pub fn validate_composition(&self, composed: &ComposedObject) -> ValidationResult {
        self.composition.validate(composed)
    }

    /// Both layers, structural first; issues from each are kept in layer order.
    pub fn validate_all(
        &self,
        schema: &str,
        params: &Value,
        composed: &ComposedObject,
    ) -> ValidationResult {
        let span = info_span!("validate_all", schema, object = %composed.name);
        let _enter = span.enter();
        ValidationResult::aggregate([
            self.validate_structure(schema, params),
            self.validate_composition(composed),
        ])
    }

    /// Schema check plus the semantic checks applied when a trait definition is loaded.
    pub fn validate_trait_definition(&self, raw: &Value) -> ValidationResult {
        let structural = if self.structural.has_schema(TRAIT_DEFINITION_SCHEMA) {
            self.validate_structure(TRAIT_DEFINITION_SCHEMA, raw)
        } else {
            ValidationResult::ok()
        };
        if !structural.valid {
            return structural;
        }
        let semantic = match TraitDefinition::from_value(raw.clone()) {
            Ok(_) => ValidationResult::ok(),
            Err(err) => ValidationResult::single(
                Issue::error("invalid_trait", err.to_string())
                    .in_domain(IssueDomain::Structural)
                    .from_source("trait-loader"),
            ),
        };
        structural.merge(semantic)
    }

    /// [`Self::validate_trait_definition`] for a definition loaded from `file`; every issue names it.
    pub fn validate_trait_document(&self, file: &str, raw: &Value) -> ValidationResult {
        let result = self.validate_trait_definition(raw);
        if result.issues.is_empty() {
            return result;
        }
        debug!(file, issues = result.issues.len(), "trait document has issues");
        ValidationResult::from_issues(
            result
                .issues
                .into_iter()
                .map(|issue| issue.in_file(file))
                .collect(),
        )
    }

    pub fn has_validator(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    pub fn run_validator(&self, name: &str, value: &Value) -> ValidationResult {
        match self.validators.get(name) {
            Some(validator) => validator(value),
            None => ValidationResult::single(
                Issue::error(
                    "validator_not_found",
                    format!("validator `{name}` is not registered"),
                )
                .in_domain(IssueDomain::Infrastructure)
                .from_source("pipeline"),
            ),
        }
    }

    /// Await every registered async validator; all results are collected before aggregation.
    pub async fn run_async_validators(&self, value: &Value, fan_out: FanOut) -> ValidationResult {
        let results = match fan_out {
            FanOut::Sequential => {
                let mut results = Vec::with_capacity(self.async_validators.len());
                for validator in &self.async_validators {
                    debug!(validator = validator.name(), "running async validator");
                    results.push(validator.validate(value).await);
                }
                results
            }
            FanOut::Parallel => {
                join_all(self.async_validators.iter().map(|v| v.validate(value))).await
            }
        };
        ValidationResult::aggregate(results)
    }

    pub fn is_within_performance_budget(&self) -> bool {
        self.composition.is_within_performance_budget()
    }

    pub fn get_exit_code(&self, result: &ValidationResult) -> i32 {
        get_exit_code(result)
    }
}

/// CI exit code: 1 when any error, 2 when only warnings, else 0.
pub fn get_exit_code(result: &ValidationResult) -> i32 {
    result.exit_code()
}
